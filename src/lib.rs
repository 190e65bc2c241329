pub mod ai;
pub mod app;
pub mod config;
pub mod db;
pub mod delivery;
pub mod error;
pub mod feed;
pub mod filter;
pub mod format;
pub mod http;
pub mod models;
pub mod pipeline;
pub mod services;

pub use error::{AppError, Result};
