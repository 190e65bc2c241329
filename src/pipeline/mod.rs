mod context;
mod cycle;
mod processor;

pub use context::{PipelineContext, PipelineSettings};
pub use cycle::{CycleCoordinator, CycleReport};
pub use processor::{process_subscription, SubscriptionOutcome, MIN_AI_INPUT_CHARS};
