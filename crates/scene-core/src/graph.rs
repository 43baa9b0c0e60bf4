use crate::error::{SceneError, SceneResult};
use crate::object::{NodeType, ObjectId};
use crate::scene::Scene;
use indexmap::IndexMap;
use std::collections::HashSet;

/// An inbound reference: `node` refers to the owning node, and `position`
/// orders the reference among all references of the traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vertex {
    pub node: ObjectId,
    pub position: usize,
}

#[derive(Debug, Clone)]
pub struct Node<T> {
    pub object: ObjectId,
    pub node_type: NodeType,
    /// Order in which the traversal first reached the object.
    pub position: usize,
    pub in_references: Vec<Vertex>,
    /// Representative of the node's equivalence class; the node itself until
    /// canonicalization says otherwise.
    pub canonical: ObjectId,
    /// Nodes whose canonical is this node, including itself once folded.
    pub folded: Vec<ObjectId>,
    /// The object whose children or shapes contain this one. Only tracked by
    /// [`ObjectGraph::with_parents`], and only meaningful while the visual
    /// and shape trees are trees.
    pub parent: Option<ObjectId>,
    pub data: T,
}

/// Every object reachable from a root, one node per distinct object.
#[derive(Debug, Clone)]
pub struct ObjectGraph<T> {
    root: ObjectId,
    nodes: IndexMap<ObjectId, Node<T>>,
}

impl<T: Default> ObjectGraph<T> {
    pub fn from_root(scene: &Scene, root: ObjectId) -> SceneResult<Self> {
        let order = scene.reachable_from(root)?;
        let mut nodes = IndexMap::with_capacity(order.len());
        for (position, id) in order.iter().enumerate() {
            let object = scene.get(*id)?;
            nodes.insert(
                *id,
                Node {
                    object: *id,
                    node_type: object.kind.node_type(),
                    position,
                    in_references: Vec::new(),
                    canonical: *id,
                    folded: Vec::new(),
                    parent: None,
                    data: T::default(),
                },
            );
        }

        let mut graph = Self { root, nodes };
        let mut vertex_position = 0;
        for id in order {
            for target in scene.get(id)?.references() {
                let node = graph.node_mut(target)?;
                node.in_references.push(Vertex {
                    node: id,
                    position: vertex_position,
                });
                vertex_position += 1;
            }
        }
        Ok(graph)
    }

    /// Like [`from_root`](Self::from_root), also recording each object's
    /// structural parent.
    pub fn with_parents(scene: &Scene, root: ObjectId) -> SceneResult<Self> {
        let mut graph = Self::from_root(scene, root)?;
        let ids: Vec<ObjectId> = graph.nodes.keys().copied().collect();
        for id in ids {
            for child in scene.get(id)?.structural_children() {
                graph.node_mut(child)?.parent = Some(id);
            }
        }
        Ok(graph)
    }
}

impl<T> ObjectGraph<T> {
    pub fn root(&self) -> ObjectId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: ObjectId) -> SceneResult<&Node<T>> {
        self.nodes.get(&id).ok_or(SceneError::UnknownObject(id))
    }

    pub fn node_mut(&mut self, id: ObjectId) -> SceneResult<&mut Node<T>> {
        self.nodes.get_mut(&id).ok_or(SceneError::UnknownObject(id))
    }

    /// Nodes in visit order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node<T>> {
        self.nodes.values()
    }

    /// Ids in visit order.
    pub fn ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.nodes.keys().copied()
    }

    /// The canonical representative of `id`; objects outside the graph are
    /// their own representative.
    pub fn canonical(&self, id: ObjectId) -> ObjectId {
        self.nodes.get(&id).map_or(id, |n| n.canonical)
    }

    pub fn parent(&self, id: ObjectId) -> Option<ObjectId> {
        self.nodes.get(&id).and_then(|n| n.parent)
    }

    pub fn set_parent(&mut self, id: ObjectId, parent: Option<ObjectId>) -> SceneResult<()> {
        self.node_mut(id)?.parent = parent;
        Ok(())
    }

    /// Whether `id` can be reached by following references out of `from`.
    pub fn is_reachable_from(&self, id: ObjectId, from: ObjectId) -> bool {
        let mut visited = HashSet::new();
        let mut stack: Vec<ObjectId> = match self.nodes.get(&id) {
            Some(node) => node.in_references.iter().map(|v| v.node).collect(),
            None => return false,
        };
        while let Some(current) = stack.pop() {
            if current == from {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(node) = self.nodes.get(&current) {
                stack.extend(node.in_references.iter().map(|v| v.node));
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{ColorBrush, ObjectKind, SpriteShape, ShapeVisual};

    fn shared_brush_scene() -> (Scene, ObjectId, [ObjectId; 3]) {
        let mut scene = Scene::new();
        let brush = scene.add_kind(ObjectKind::ColorBrush(ColorBrush::default()));
        let a = scene.add_kind(ObjectKind::SpriteShape(SpriteShape {
            fill_brush: Some(brush),
            ..Default::default()
        }));
        let b = scene.add_kind(ObjectKind::SpriteShape(SpriteShape {
            fill_brush: Some(brush),
            ..Default::default()
        }));
        let root = scene.add_kind(ObjectKind::ShapeVisual(ShapeVisual {
            shapes: vec![a, b],
            ..Default::default()
        }));
        (scene, root, [a, b, brush])
    }

    #[test]
    fn one_node_per_object_in_visit_order() {
        let (scene, root, [a, b, brush]) = shared_brush_scene();
        let graph = ObjectGraph::<()>::from_root(&scene, root).unwrap();

        let ids: Vec<_> = graph.ids().collect();
        assert_eq!(ids, vec![root, a, brush, b]);
        let positions: Vec<_> = graph.nodes().map(|n| n.position).collect();
        assert_eq!(positions, vec![0, 1, 2, 3]);

        let brush_refs = &graph.node(brush).unwrap().in_references;
        assert_eq!(brush_refs.len(), 2);
        assert_eq!(brush_refs[0].node, a);
        assert_eq!(brush_refs[1].node, b);
        assert!(brush_refs[0].position < brush_refs[1].position);
        assert_eq!(graph.node(brush).unwrap().node_type, NodeType::Brush);
    }

    #[test]
    fn parents_are_structural_only() {
        let (scene, root, [a, b, brush]) = shared_brush_scene();
        let graph = ObjectGraph::<()>::with_parents(&scene, root).unwrap();
        assert_eq!(graph.parent(a), Some(root));
        assert_eq!(graph.parent(b), Some(root));
        assert_eq!(graph.parent(brush), None);
        assert_eq!(graph.parent(root), None);
    }

    #[test]
    fn reachability_follows_references() {
        let (scene, root, [a, _, brush]) = shared_brush_scene();
        let graph = ObjectGraph::<()>::from_root(&scene, root).unwrap();
        assert!(graph.is_reachable_from(brush, a));
        assert!(graph.is_reachable_from(brush, root));
        assert!(!graph.is_reachable_from(a, brush));
        assert_eq!(graph.canonical(brush), brush);
    }
}
