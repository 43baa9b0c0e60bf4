//! Composition scene graph plus the passes that shrink it without changing
//! what it draws.

pub mod animation;
pub mod canonicalizer;
pub mod compactor;
pub mod config;
pub mod error;
pub mod evaluate;
pub mod graph;
pub mod object;
pub mod optimizer;
pub mod properties;
pub mod scene;
pub mod stats;
pub mod value_optimizer;
pub mod visibility;

pub use config::{CompactorConfig, OptimizerConfig};
pub use error::{SceneError, SceneResult};
pub use object::{CompositionObject, ObjectId, ObjectKind};
pub use optimizer::{optimize, OptimizeReport};
pub use scene::{Scene, SceneDocument};
pub use stats::Stats;
