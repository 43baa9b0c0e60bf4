use crate::error::{SceneError, SceneResult};
use crate::object::{CompositionObject, ObjectId, ObjectKind};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Arena owning every composition object of one compilation.
///
/// Ids are indices into the arena and stay stable for the arena's lifetime;
/// collected objects leave an empty slot behind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    objects: Vec<Option<CompositionObject>>,
}

/// A scene together with the visual everything hangs off, as read and written
/// by the command line tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDocument {
    pub root: ObjectId,
    #[serde(flatten)]
    pub scene: Scene,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, object: CompositionObject) -> ObjectId {
        self.objects.push(Some(object));
        ObjectId(self.objects.len() - 1)
    }

    pub fn add_kind(&mut self, kind: ObjectKind) -> ObjectId {
        self.add(CompositionObject::new(kind))
    }

    pub fn get(&self, id: ObjectId) -> SceneResult<&CompositionObject> {
        self.objects
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(SceneError::UnknownObject(id))
    }

    pub fn get_mut(&mut self, id: ObjectId) -> SceneResult<&mut CompositionObject> {
        self.objects
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(SceneError::UnknownObject(id))
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        matches!(self.objects.get(id.0), Some(Some(_)))
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.objects.iter().filter(|o| o.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &CompositionObject)> {
        self.objects
            .iter()
            .enumerate()
            .filter_map(|(i, o)| o.as_ref().map(|o| (ObjectId(i), o)))
    }

    /// Ids of the live objects reachable from `root`, in depth-first
    /// pre-order. Fails on a dangling reference.
    pub fn reachable_from(&self, root: ObjectId) -> SceneResult<Vec<ObjectId>> {
        let mut visited = vec![false; self.objects.len()];
        let mut order = Vec::new();
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            let object = self.get(id)?;
            if visited[id.0] {
                continue;
            }
            visited[id.0] = true;
            order.push(id);
            stack.extend(object.references().into_iter().rev());
        }
        Ok(order)
    }

    /// Drops every object not reachable from `root`. Returns how many were
    /// dropped.
    pub fn collect_garbage(&mut self, root: ObjectId) -> SceneResult<usize> {
        let mut keep = vec![false; self.objects.len()];
        for id in self.reachable_from(root)? {
            keep[id.0] = true;
        }

        let mut dropped = 0;
        for (slot, keep) in self.objects.iter_mut().zip(keep) {
            if !keep && slot.take().is_some() {
                dropped += 1;
            }
        }
        debug!(dropped, "collected unreachable objects");
        Ok(dropped)
    }

    /// Checks that every reference of every live object resolves.
    pub fn validate(&self) -> SceneResult<()> {
        for (id, object) in self.iter() {
            for r in object.references() {
                if !self.contains(r) {
                    return Err(SceneError::invariant(format!(
                        "{} {id} references missing object {r}",
                        object.kind.name()
                    )));
                }
            }
        }
        Ok(())
    }
}

impl SceneDocument {
    pub fn from_json(text: &str) -> SceneResult<Self> {
        let document: SceneDocument = serde_json::from_str(text)?;
        document.scene.validate()?;
        document.scene.get(document.root)?;
        Ok(document)
    }

    pub fn to_json(&self) -> SceneResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
