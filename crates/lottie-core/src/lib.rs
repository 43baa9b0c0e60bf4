pub mod animatable;
pub mod config;
pub mod error;
pub mod optimization;

pub use config::{MergeConfig, ReductionConfig};
pub use error::{ReduceError, ReduceResult};
pub use optimization::{reduce_composition, ReductionStats};
