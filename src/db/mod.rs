mod repository;
mod schema;

pub use repository::{FeedCursor, Repository};
