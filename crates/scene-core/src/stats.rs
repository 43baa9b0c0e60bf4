use crate::error::SceneResult;
use crate::object::{ObjectId, ObjectKind};
use crate::scene::Scene;
use indexmap::IndexMap;
use serde::Serialize;

/// Size of the tree reachable from a root.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stats {
    pub objects: usize,
    /// Reachable objects per kind, in first-seen order.
    pub kinds: IndexMap<&'static str, usize>,
    pub animators: usize,
    pub key_frames: usize,
}

impl Stats {
    pub fn of(scene: &Scene, root: ObjectId) -> SceneResult<Self> {
        let mut stats = Stats::default();
        for id in scene.reachable_from(root)? {
            let object = scene.get(id)?;
            stats.objects += 1;
            *stats.kinds.entry(object.kind.name()).or_default() += 1;
            stats.animators += object.animators.len();
            if let ObjectKind::KeyFrameAnimation(animation) = &object.kind {
                stats.key_frames += animation.key_frames().len();
            }
        }
        Ok(stats)
    }

    pub fn count(&self, kind: &str) -> usize {
        self.kinds.get(kind).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{ContainerShape, ShapeVisual};

    #[test]
    fn counts_only_reachable_objects() {
        let mut scene = Scene::new();
        let orphan = scene.add_kind(ObjectKind::ContainerShape(ContainerShape::default()));
        let shape = scene.add_kind(ObjectKind::ContainerShape(ContainerShape::default()));
        let root = scene.add_kind(ObjectKind::ShapeVisual(ShapeVisual {
            shapes: vec![shape],
            ..Default::default()
        }));

        let stats = Stats::of(&scene, root).unwrap();
        assert_eq!(stats.objects, 2);
        assert_eq!(stats.count("ContainerShape"), 1);
        assert_eq!(stats.count("ShapeVisual"), 1);
        assert!(scene.contains(orphan));
    }
}
