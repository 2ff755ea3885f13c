pub mod engine;
pub mod series;

pub use engine::{duration_label, Counters, Engine, EngineConfig, DEFAULT_PREFIX};
pub use series::Series;
