use crate::canonicalizer::canonicalize_scene;
use crate::compactor::compact;
use crate::config::OptimizerConfig;
use crate::error::SceneResult;
use crate::object::ObjectId;
use crate::scene::Scene;
use crate::stats::Stats;
use crate::value_optimizer::optimize_property_values;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizeReport {
    pub root: ObjectId,
    pub before: Stats,
    pub after: Stats,
    /// Objects dropped once nothing referenced them.
    pub collected: usize,
}

/// Runs the whole pipeline over the tree under `root`: canonicalize,
/// simplify property values, compact, then simplify and canonicalize again
/// what compaction exposed, and drop unreachable objects.
pub fn optimize(scene: &mut Scene, root: ObjectId, config: &OptimizerConfig) -> SceneResult<OptimizeReport> {
    let before = Stats::of(scene, root)?;

    canonicalize_scene(scene, root, config.ignore_comment_properties)?;
    optimize_property_values(scene, root)?;
    let root = compact(scene, root, &config.compactor)?;
    optimize_property_values(scene, root)?;
    canonicalize_scene(scene, root, config.ignore_comment_properties)?;
    let collected = scene.collect_garbage(root)?;

    let after = Stats::of(scene, root)?;
    info!(
        objects_before = before.objects,
        objects_after = after.objects,
        key_frames_before = before.key_frames,
        key_frames_after = after.key_frames,
        "optimized scene"
    );
    Ok(OptimizeReport {
        root,
        before,
        after,
        collected,
    })
}
