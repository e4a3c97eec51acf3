mod engine;

pub use engine::{DEFAULT_QUEUE_NAME, EngineConfig};
