//! Size reductions on Lottie JSON that keep the rendered result unchanged.

pub mod gradient;
pub mod keyframes;
pub mod layer_group;
pub mod layer_merge;
pub mod layers_graph;
pub mod precomps;
pub mod reducer;

pub use gradient::{optimize_gradient_stops, remove_redundant_stops, GradientStop, RawStop};
pub use keyframes::{remove_redundant_keyframes, trim_keyframes};
pub use layer_group::{LayerGroup, MergeResult, TimeRange};
pub use layer_merge::{merge_layers, remove_unused_assets, LayerMerger};
pub use layers_graph::{GroupMerger, LayersGraph};
pub use precomps::collapse_precomps;
pub use reducer::{reduce_composition, PropertyVisitor, ReductionStats};
