//! Rewrites the visual and shape trees into an equivalent smaller tree by
//! removing containers and moving properties between parents and children.
//!
//! Each iteration rebuilds the parent graph and runs every pass once. Passes
//! take a snapshot of their candidates up front and then re-read the live
//! child lists before splicing, since earlier rewrites in the same pass may
//! already have moved a candidate.

use crate::config::CompactorConfig;
use crate::error::{SceneError, SceneResult};
use crate::graph::ObjectGraph;
use crate::object::{
    AnimationController, ColorBrush, CompositionObject, InsetClip, ObjectId, ObjectKind, Visual,
};
use crate::properties::{
    are_properties_orthogonal, names, non_default_container_visual_properties,
    non_default_shape_properties, non_default_visual_properties, PropertyId,
};
use crate::scene::Scene;
use crate::visibility::{
    self, is_scale_used_for_visibility, shape_visibility, visual_visibility, VisibilityDescription,
    VisibilityDriver,
};
use glam::{Affine2, Vec2};
use std::collections::HashSet;
use tracing::debug;

const TRANSFORMING: PropertyId = PropertyId::CENTER_POINT
    .union(PropertyId::OFFSET)
    .union(PropertyId::ROTATION_ANGLE_IN_DEGREES)
    .union(PropertyId::SCALE)
    .union(PropertyId::TRANSFORM_MATRIX);

/// Compacts the tree under `root` until no pass makes progress. Returns the
/// root of the compacted tree.
pub fn compact(scene: &mut Scene, root: ObjectId, config: &CompactorConfig) -> SceneResult<ObjectId> {
    for iteration in 1..=config.max_iterations {
        let graph = ObjectGraph::with_parents(scene, root)?;
        let mut compactor = Compactor {
            scene: &mut *scene,
            graph,
            root,
            made_progress: false,
        };
        compactor.compact_once()?;
        if !compactor.made_progress {
            debug!(iterations = iteration, "compaction reached a fixed point");
            return Ok(root);
        }
    }
    Err(SceneError::invariant(format!(
        "compaction still changing the tree after {} iterations",
        config.max_iterations
    )))
}

struct Compactor<'a> {
    scene: &'a mut Scene,
    graph: ObjectGraph<()>,
    root: ObjectId,
    made_progress: bool,
}

fn non_blank(text: &Option<String>) -> Option<&String> {
    text.as_ref().filter(|t| !t.trim().is_empty())
}

/// Moves a set property onto an unset one.
fn move_value<T>(from: &mut Option<T>, to: &mut Option<T>, property: &str) -> SceneResult<bool> {
    let Some(value) = from.take() else {
        return Ok(false);
    };
    if to.is_some() {
        return Err(SceneError::invariant(format!(
            "cannot move {property} onto an object that already sets it"
        )));
    }
    *to = Some(value);
    Ok(true)
}

impl Compactor<'_> {
    fn compact_once(&mut self) -> SceneResult<()> {
        self.optimize_shapes()?;
        self.optimize_visuals()
    }

    fn optimize_shapes(&mut self) -> SceneResult<()> {
        self.elide_transparent_sprite_shapes()?;

        let containers = self.nodes_of(|kind| matches!(kind, ObjectKind::ContainerShape(_)))?;
        self.coalesce_sibling_container_shapes()?;
        self.elide_empty_container_shapes(&containers)?;
        self.elide_structural_container_shapes(&containers)?;
        self.push_container_shape_transforms_down(&containers)?;
        self.coalesce_single_child_container_shapes(&containers)?;
        self.push_properties_down_to_sprite_shape(&containers)?;
        self.push_shape_visibility_down(&containers)?;

        self.push_shape_tree_visibility_into_visual_tree()
    }

    fn optimize_visuals(&mut self) -> SceneResult<()> {
        self.push_visual_visibility_up()?;
        self.push_properties_down_to_shape_visual()?;
        self.coalesce_container_visuals()?;
        self.coalesce_orthogonal_visuals()?;
        self.coalesce_orthogonal_container_visuals()?;
        self.remove_redundant_inset_clip_visuals()
    }

    fn nodes_of(&self, filter: impl Fn(&ObjectKind) -> bool) -> SceneResult<Vec<ObjectId>> {
        let mut ids = Vec::new();
        for id in self.graph.ids() {
            if filter(&self.scene.get(id)?.kind) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    fn shapes_of(&self, id: ObjectId) -> SceneResult<Vec<ObjectId>> {
        Ok(self.scene.get(id)?.shapes().cloned().unwrap_or_default())
    }

    fn shapes_mut(&mut self, id: ObjectId) -> SceneResult<&mut Vec<ObjectId>> {
        let object = self.scene.get_mut(id)?;
        let kind = object.kind.name();
        object
            .shapes_mut()
            .ok_or_else(|| SceneError::invariant(format!("{kind} {id} has no shapes")))
    }

    fn children_of(&self, id: ObjectId) -> SceneResult<Vec<ObjectId>> {
        Ok(self
            .scene
            .get(id)?
            .visual()
            .map(|v| v.children.clone())
            .unwrap_or_default())
    }

    fn children_mut(&mut self, id: ObjectId) -> SceneResult<&mut Vec<ObjectId>> {
        let object = self.scene.get_mut(id)?;
        let kind = object.kind.name();
        object
            .visual_mut()
            .map(|v| &mut v.children)
            .ok_or_else(|| SceneError::invariant(format!("{kind} {id} has no children")))
    }

    /// Parent of a shape and the shape's index in it, if the shape is still
    /// in the tree.
    fn shape_position(&self, shape: ObjectId) -> SceneResult<Option<(ObjectId, usize)>> {
        let Some(parent) = self.graph.parent(shape) else {
            return Ok(None);
        };
        Ok(self
            .shapes_of(parent)?
            .iter()
            .position(|s| *s == shape)
            .map(|index| (parent, index)))
    }

    fn visual_position(&self, visual: ObjectId) -> SceneResult<Option<(ObjectId, usize)>> {
        let Some(parent) = self.graph.parent(visual) else {
            return Ok(None);
        };
        Ok(self
            .children_of(parent)?
            .iter()
            .position(|c| *c == visual)
            .map(|index| (parent, index)))
    }

    /// The short description always moves; the long description and name
    /// only fill gaps.
    fn copy_descriptions(&mut self, from: ObjectId, to: ObjectId) -> SceneResult<()> {
        let from = self.scene.get(from)?.meta.clone();
        let to = &mut self.scene.get_mut(to)?.meta;
        if let Some(short) = non_blank(&from.short_description) {
            to.short_description = Some(short.clone());
        }
        if non_blank(&to.long_description).is_none() {
            if let Some(long) = non_blank(&from.long_description) {
                to.long_description = Some(long.clone());
            }
        }
        if non_blank(&to.name).is_none() {
            if let Some(name) = non_blank(&from.name) {
                to.name = Some(name.clone());
            }
        }
        Ok(())
    }

    /// Moves the comment and animators of `from` onto `to`. Returns whether
    /// anything moved.
    fn move_comment_and_animators(&mut self, from: ObjectId, to: ObjectId) -> SceneResult<bool> {
        let source = self.scene.get_mut(from)?;
        let mut comment = source.meta.comment.take();
        let animators = std::mem::take(&mut source.animators);

        let target = self.scene.get_mut(to)?;
        let mut moved = move_value(&mut comment, &mut target.meta.comment, "Comment")?;
        for animator in animators {
            if target.is_animated(&animator.property) {
                return Err(SceneError::invariant(format!(
                    "{to} already animates {}",
                    animator.property
                )));
            }
            target.animators.push(animator);
            moved = true;
        }
        Ok(moved)
    }

    fn transfer_shape_properties(&mut self, from: ObjectId, to: ObjectId) -> SceneResult<()> {
        let mut source = self
            .scene
            .get_mut(from)?
            .shape_mut()
            .map(std::mem::take)
            .ok_or_else(|| SceneError::invariant(format!("{from} is not a shape")))?;
        let target = self
            .scene
            .get_mut(to)?
            .shape_mut()
            .ok_or_else(|| SceneError::invariant(format!("{to} is not a shape")))?;

        let mut moved = move_value(&mut source.center_point, &mut target.center_point, names::CENTER_POINT)?;
        moved |= move_value(&mut source.offset, &mut target.offset, names::OFFSET)?;
        moved |= move_value(
            &mut source.rotation_angle_in_degrees,
            &mut target.rotation_angle_in_degrees,
            names::ROTATION_ANGLE_IN_DEGREES,
        )?;
        moved |= move_value(&mut source.scale, &mut target.scale, names::SCALE)?;
        moved |= move_value(&mut source.transform_matrix, &mut target.transform_matrix, names::TRANSFORM_MATRIX)?;
        moved |= self.move_comment_and_animators(from, to)?;
        self.made_progress |= moved;
        Ok(())
    }

    fn transfer_visual_properties(&mut self, from: ObjectId, to: ObjectId) -> SceneResult<()> {
        let source_visual = self
            .scene
            .get_mut(from)?
            .visual_mut()
            .ok_or_else(|| SceneError::invariant(format!("{from} is not a visual")))?;
        // The children stay with `from`.
        let children = std::mem::take(&mut source_visual.children);
        let mut source = std::mem::replace(
            source_visual,
            Visual {
                children,
                ..Default::default()
            },
        );
        let target = self
            .scene
            .get_mut(to)?
            .visual_mut()
            .ok_or_else(|| SceneError::invariant(format!("{to} is not a visual")))?;

        let mut moved = move_value(&mut source.center_point, &mut target.center_point, names::CENTER_POINT)?;
        moved |= move_value(&mut source.clip, &mut target.clip, names::CLIP)?;
        moved |= move_value(&mut source.is_visible, &mut target.is_visible, names::IS_VISIBLE)?;
        moved |= move_value(&mut source.offset, &mut target.offset, names::OFFSET)?;
        moved |= move_value(&mut source.opacity, &mut target.opacity, names::OPACITY)?;
        moved |= move_value(
            &mut source.rotation_angle_in_degrees,
            &mut target.rotation_angle_in_degrees,
            names::ROTATION_ANGLE_IN_DEGREES,
        )?;
        moved |= move_value(&mut source.rotation_axis, &mut target.rotation_axis, names::ROTATION_AXIS)?;
        moved |= move_value(&mut source.scale, &mut target.scale, names::SCALE)?;
        moved |= move_value(&mut source.size, &mut target.size, names::SIZE)?;
        moved |= move_value(&mut source.transform_matrix, &mut target.transform_matrix, names::TRANSFORM_MATRIX)?;
        moved |= self.move_comment_and_animators(from, to)?;
        self.made_progress |= moved;
        Ok(())
    }

    /// Replaces a container shape by its shapes in its parent. Does nothing
    /// for a container without shapes or outside the tree.
    fn elide_container_shape(&mut self, container: ObjectId) -> SceneResult<()> {
        let Some((parent, index)) = self.shape_position(container)? else {
            return Ok(());
        };
        let shapes = std::mem::take(self.shapes_mut(container)?);
        if shapes.is_empty() {
            return Ok(());
        }
        for &shape in &shapes {
            self.copy_descriptions(container, shape)?;
            self.graph.set_parent(shape, Some(parent))?;
        }
        self.shapes_mut(parent)?.splice(index..=index, shapes);
        self.graph.set_parent(container, None)?;
        self.made_progress = true;
        Ok(())
    }

    /// Replaces a container visual by its children in its parent. A
    /// container without children is removed outright. Returns false when
    /// the container is not in the tree.
    fn elide_container_visual(&mut self, container: ObjectId) -> SceneResult<bool> {
        let Some((parent, index)) = self.visual_position(container)? else {
            return Ok(false);
        };
        let children = std::mem::take(self.children_mut(container)?);
        for &child in &children {
            self.copy_descriptions(container, child)?;
            self.graph.set_parent(child, Some(parent))?;
        }
        self.children_mut(parent)?.splice(index..=index, children);
        self.graph.set_parent(container, None)?;
        self.made_progress = true;
        Ok(true)
    }

    fn is_brush_transparent(&self, brush: Option<ObjectId>) -> SceneResult<bool> {
        let Some(brush) = brush else {
            return Ok(true);
        };
        let brush = self.scene.get(brush)?;
        Ok(brush.animators.is_empty()
            && matches!(
                brush.kind,
                ObjectKind::ColorBrush(ColorBrush { color: Some(color) }) if color.a == 0
            ))
    }

    fn elide_transparent_sprite_shapes(&mut self) -> SceneResult<()> {
        for id in self.nodes_of(|kind| matches!(kind, ObjectKind::SpriteShape(_)))? {
            let ObjectKind::SpriteShape(sprite) = &self.scene.get(id)?.kind else {
                continue;
            };
            let (fill, stroke) = (sprite.fill_brush, sprite.stroke_brush);
            if !self.is_brush_transparent(fill)? || !self.is_brush_transparent(stroke)? {
                continue;
            }
            let Some((parent, index)) = self.shape_position(id)? else {
                continue;
            };
            self.shapes_mut(parent)?.remove(index);
            self.graph.set_parent(id, None)?;
            self.made_progress = true;
            debug!(shape = %id, "elided transparent sprite shape");
        }
        Ok(())
    }

    fn controllers_equivalent(&self, a: Option<ObjectId>, b: Option<ObjectId>) -> SceneResult<bool> {
        let (a, b) = match (a, b) {
            (None, None) => return Ok(true),
            (Some(a), Some(b)) if a == b => return Ok(true),
            (Some(a), Some(b)) => (self.scene.get(a)?, self.scene.get(b)?),
            _ => return Ok(false),
        };
        let (
            ObjectKind::AnimationController(AnimationController {
                is_paused: a_paused,
                is_custom: false,
            }),
            ObjectKind::AnimationController(AnimationController {
                is_paused: b_paused,
                is_custom: false,
            }),
        ) = (&a.kind, &b.kind)
        else {
            return Ok(false);
        };
        Ok(a_paused == b_paused
            && a.properties.is_empty()
            && b.properties.is_empty()
            && a.animators == b.animators)
    }

    /// Same transform, no property-set values and the same animations.
    /// Canonicalization has already made equal animations identical.
    fn is_equivalent_container(&self, a: ObjectId, b: ObjectId) -> SceneResult<bool> {
        let (a, b) = (self.scene.get(a)?, self.scene.get(b)?);
        if a.shape() != b.shape()
            || !a.properties.is_empty()
            || !b.properties.is_empty()
            || a.animators.len() != b.animators.len()
        {
            return Ok(false);
        }
        for (x, y) in a.animators.iter().zip(&b.animators) {
            if x.property != y.property
                || x.animation != y.animation
                || !self.controllers_equivalent(x.controller, y.controller)?
            {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Runs of adjacent equivalent containers; every other shape is a group
    /// of its own.
    fn group_similar_containers(&self, shapes: &[ObjectId]) -> SceneResult<Vec<Vec<ObjectId>>> {
        let mut groups: Vec<Vec<ObjectId>> = Vec::new();
        let mut container_run = false;
        for &shape in shapes {
            if !matches!(self.scene.get(shape)?.kind, ObjectKind::ContainerShape(_)) {
                groups.push(vec![shape]);
                container_run = false;
                continue;
            }
            if container_run {
                if let Some(group) = groups.last_mut() {
                    if self.is_equivalent_container(group[0], shape)? {
                        group.push(shape);
                        continue;
                    }
                }
            }
            groups.push(vec![shape]);
            container_run = true;
        }
        Ok(groups)
    }

    fn coalesce_sibling_container_shapes(&mut self) -> SceneResult<()> {
        let owners: Vec<ObjectId> = self.graph.ids().collect();
        for owner in owners {
            let shapes = self.shapes_of(owner)?;
            if shapes.len() < 2 {
                continue;
            }
            let groups = self.group_similar_containers(&shapes)?;
            if groups.iter().all(|g| g.len() == 1) {
                continue;
            }

            let mut coalesced = Vec::with_capacity(groups.len());
            for group in groups {
                let first = group[0];
                coalesced.push(first);
                for &other in &group[1..] {
                    let moved = std::mem::take(self.shapes_mut(other)?);
                    for &shape in &moved {
                        self.graph.set_parent(shape, Some(first))?;
                    }
                    self.shapes_mut(first)?.extend(moved);
                    self.graph.set_parent(other, None)?;
                }
            }
            *self.shapes_mut(owner)? = coalesced;
            self.made_progress = true;
            debug!(owner = %owner, "coalesced sibling container shapes");
        }
        Ok(())
    }

    fn elide_empty_container_shapes(&mut self, containers: &[ObjectId]) -> SceneResult<()> {
        let mut removed = HashSet::new();
        loop {
            let mut changed = false;
            for &container in containers {
                if removed.contains(&container) || !self.shapes_of(container)?.is_empty() {
                    continue;
                }
                let Some((parent, index)) = self.shape_position(container)? else {
                    continue;
                };
                self.shapes_mut(parent)?.remove(index);
                self.graph.set_parent(container, None)?;
                removed.insert(container);
                changed = true;
            }
            if !changed {
                break;
            }
            self.made_progress = true;
        }
        Ok(())
    }

    fn elide_structural_container_shapes(&mut self, containers: &[ObjectId]) -> SceneResult<()> {
        for &container in containers {
            if non_default_shape_properties(self.scene.get(container)?).is_empty() {
                self.elide_container_shape(container)?;
            }
        }
        Ok(())
    }

    /// A container that only sets a transform matrix hands the matrix to each
    /// of its shapes and disappears. The matrix applies after every other
    /// transform property, so it stays outermost on the shapes.
    fn push_container_shape_transforms_down(&mut self, containers: &[ObjectId]) -> SceneResult<()> {
        for &container in containers {
            let object = self.scene.get(container)?;
            let shapes = self.shapes_of(container)?;
            if shapes.is_empty()
                || !object.animators.is_empty()
                || !(non_default_shape_properties(object) & !PropertyId::TRANSFORM_MATRIX).is_empty()
            {
                continue;
            }
            let mut child_matrix_animated = false;
            for &shape in &shapes {
                child_matrix_animated |= self.scene.get(shape)?.is_animated(names::TRANSFORM_MATRIX);
            }
            if child_matrix_animated || self.shape_position(container)?.is_none() {
                continue;
            }

            let matrix = object.shape().and_then(|s| s.transform_matrix);
            if let Some(matrix) = matrix {
                for &shape in &shapes {
                    if let Some(shape) = self.scene.get_mut(shape)?.shape_mut() {
                        let combined = matrix * shape.transform_matrix.unwrap_or(Affine2::IDENTITY);
                        shape.transform_matrix = (combined != Affine2::IDENTITY).then_some(combined);
                    }
                }
                if let Some(shape) = self.scene.get_mut(container)?.shape_mut() {
                    shape.transform_matrix = None;
                }
            }
            debug!(container = %container, "pushed container transform down");
            self.elide_container_shape(container)?;
        }
        Ok(())
    }

    /// The only child of the container, if the container still has exactly
    /// one shape.
    fn single_shape(&self, container: ObjectId) -> SceneResult<Option<ObjectId>> {
        Ok(match self.shapes_of(container)?.as_slice() {
            [only] => Some(*only),
            _ => None,
        })
    }

    fn coalesce_single_child_container_shapes(&mut self, containers: &[ObjectId]) -> SceneResult<()> {
        for &container in containers {
            let Some(child) = self.single_shape(container)? else {
                continue;
            };
            let child_object = self.scene.get(child)?;
            if !matches!(child_object.kind, ObjectKind::ContainerShape(_))
                || !child_object.animators.is_empty()
                || !child_object.properties.is_empty()
            {
                continue;
            }
            let parent_properties = non_default_shape_properties(self.scene.get(container)?);
            let child_properties = non_default_shape_properties(child_object);
            if parent_properties != PropertyId::TRANSFORM_MATRIX
                || child_properties.intersects(PropertyId::TRANSFORM_MATRIX)
            {
                continue;
            }

            // The child's transform evaluates below the parent's matrix either way.
            self.transfer_shape_properties(child, container)?;
            self.elide_container_shape(child)?;
        }
        Ok(())
    }

    fn push_properties_down_to_sprite_shape(&mut self, containers: &[ObjectId]) -> SceneResult<()> {
        for &container in containers {
            let Some(child) = self.single_shape(container)? else {
                continue;
            };
            let child_object = self.scene.get(child)?;
            if !matches!(child_object.kind, ObjectKind::SpriteShape(_)) {
                continue;
            }
            let parent_properties = non_default_shape_properties(self.scene.get(container)?);
            let child_properties = non_default_shape_properties(child_object);
            if parent_properties.intersects(PropertyId::PROPERTIES)
                || !are_properties_orthogonal(parent_properties, child_properties)
                || self.shape_position(container)?.is_none()
            {
                continue;
            }
            self.transfer_shape_properties(container, child)?;
            self.elide_container_shape(container)?;
        }
        Ok(())
    }

    fn push_shape_visibility_down(&mut self, containers: &[ObjectId]) -> SceneResult<()> {
        for &container in containers {
            let Some(child) = self.single_shape(container)? else {
                continue;
            };
            let parent = self.scene.get(container)?;
            if non_default_shape_properties(parent) != PropertyId::SCALE
                || !is_scale_used_for_visibility(self.scene, parent)?
                || non_default_shape_properties(self.scene.get(child)?).intersects(PropertyId::SCALE)
                || self.shape_position(container)?.is_none()
            {
                continue;
            }
            self.transfer_shape_properties(container, child)?;
            self.elide_container_shape(container)?;
        }
        Ok(())
    }

    /// Combines `from` with the visibility `to` already has and writes the
    /// result onto `to`. Returns false, changing nothing, when the two
    /// cannot be combined.
    fn apply_visibility(
        &mut self,
        to: ObjectId,
        from: &VisibilityDescription,
        driver: VisibilityDriver,
    ) -> SceneResult<bool> {
        let Some(existing) = visual_visibility(self.scene, to)? else {
            return Ok(false);
        };
        let statically_hidden = self.scene.get(to)?.visual().and_then(|v| v.is_visible) == Some(false);
        if existing.is_empty() && statically_hidden {
            return Ok(false);
        }
        if !existing.is_empty() && existing.duration != from.duration {
            debug!(visual = %to, "visibility durations differ, not combining");
            return Ok(false);
        }
        let composed = VisibilityDescription::compose(from, &existing)?;
        let written = visibility::apply_visibility(self.scene, to, &composed, driver)?;
        self.made_progress |= written;
        Ok(written)
    }

    /// A shape visual showing one shape whose scale only switches it on and
    /// off gets that switch as its own `IsVisible`.
    fn push_shape_tree_visibility_into_visual_tree(&mut self) -> SceneResult<()> {
        for id in self.nodes_of(|kind| matches!(kind, ObjectKind::ShapeVisual(_)))? {
            let ObjectKind::ShapeVisual(shape_visual) = &self.scene.get(id)?.kind else {
                continue;
            };
            let ([shape], []) = (shape_visual.shapes.as_slice(), shape_visual.visual.children.as_slice())
            else {
                continue;
            };
            let shape = *shape;
            let shape_object = self.scene.get(shape)?;
            if !is_scale_used_for_visibility(self.scene, shape_object)? {
                continue;
            }
            let Some(driver) = VisibilityDriver::of(self.scene, shape_object, names::SCALE)? else {
                continue;
            };
            let from = shape_visibility(self.scene, shape)?;
            if !self.apply_visibility(id, &from, driver)? {
                continue;
            }
            let shape_object = self.scene.get_mut(shape)?;
            if let Some(s) = shape_object.shape_mut() {
                s.scale = None;
            }
            shape_object.stop_animation(names::SCALE);
            debug!(visual = %id, shape = %shape, "moved shape visibility into the visual tree");
        }
        Ok(())
    }

    fn push_visual_visibility_up(&mut self) -> SceneResult<()> {
        let visuals = self.nodes_of(|kind| {
            matches!(
                kind,
                ObjectKind::ContainerVisual(_) | ObjectKind::ShapeVisual(_) | ObjectKind::SpriteVisual(_)
            )
        })?;
        for id in visuals {
            let object = self.scene.get(id)?;
            if !object.is_animated(names::IS_VISIBLE) {
                continue;
            }
            let Some(parent) = self.graph.parent(id) else {
                continue;
            };
            let ObjectKind::ContainerVisual(parent_visual) = &self.scene.get(parent)?.kind else {
                continue;
            };
            if parent_visual.children.as_slice() != [id] {
                continue;
            }
            let Some(driver) = VisibilityDriver::of(self.scene, object, names::IS_VISIBLE)? else {
                continue;
            };
            let Some(from) = visual_visibility(self.scene, id)? else {
                continue;
            };
            if !self.apply_visibility(parent, &from, driver)? {
                continue;
            }
            let object = self.scene.get_mut(id)?;
            if let Some(v) = object.visual_mut() {
                v.is_visible = None;
            }
            object.stop_animation(names::IS_VISIBLE);
            debug!(visual = %id, parent = %parent, "pushed visibility up");
        }
        Ok(())
    }

    /// A clip with no insets and no scaling.
    fn is_zero_inset_clip(&self, clip: ObjectId) -> SceneResult<bool> {
        let clip = self.scene.get(clip)?;
        let ObjectKind::InsetClip(inset) = &clip.kind else {
            return Ok(false);
        };
        let zero = |v: Option<f32>| v.map_or(true, |v| v == 0.0);
        Ok(clip.animators.is_empty()
            && zero(inset.left_inset)
            && zero(inset.top_inset)
            && zero(inset.right_inset)
            && zero(inset.bottom_inset)
            && inset.scale.map_or(true, |s| s == Vec2::ONE))
    }

    /// A shape visual clips to its size, so a parent that only clips to the
    /// same size adds nothing.
    fn push_properties_down_to_shape_visual(&mut self) -> SceneResult<()> {
        for id in self.nodes_of(|kind| matches!(kind, ObjectKind::ShapeVisual(_)))? {
            let Some(parent) = self.graph.parent(id) else {
                continue;
            };
            let parent_object = self.scene.get(parent)?;
            let ObjectKind::ContainerVisual(parent_visual) = &parent_object.kind else {
                continue;
            };
            if parent_visual.children.as_slice() != [id] {
                continue;
            }
            let parent_properties = non_default_visual_properties(parent_object);
            if parent_properties.is_empty() || parent_properties.intersects(TRANSFORMING) {
                continue;
            }
            let Some(clip) = parent_visual.clip else {
                continue;
            };
            let child = self.scene.get(id)?;
            let child_size = child.visual().and_then(|v| v.size);
            if !self.is_zero_inset_clip(clip)?
                || non_default_visual_properties(child).intersects(TRANSFORMING)
                || parent_visual.size != child_size
                || parent_object.is_animated(names::SIZE)
                || child.is_animated(names::SIZE)
            {
                continue;
            }

            if let Some(v) = self.scene.get_mut(parent)?.visual_mut() {
                v.clip = None;
                v.size = None;
            }
            self.made_progress = true;
            debug!(visual = %parent, "dropped clip duplicated by a shape visual");
        }
        Ok(())
    }

    fn coalesce_container_visuals(&mut self) -> SceneResult<()> {
        for id in self.nodes_of(|kind| matches!(kind, ObjectKind::ContainerVisual(_)))? {
            if self.graph.parent(id).is_none()
                || !non_default_visual_properties(self.scene.get(id)?).is_empty()
            {
                continue;
            }
            self.elide_container_visual(id)?;
        }
        Ok(())
    }

    fn single_child(&self, visual: ObjectId) -> SceneResult<Option<ObjectId>> {
        Ok(match self.children_of(visual)?.as_slice() {
            [only] => Some(*only),
            _ => None,
        })
    }

    /// A container around a single sprite or shape visual hands its
    /// properties to that visual and disappears.
    fn coalesce_orthogonal_visuals(&mut self) -> SceneResult<()> {
        for id in self.nodes_of(|kind| matches!(kind, ObjectKind::ContainerVisual(_)))? {
            if self.graph.parent(id).is_none() {
                continue;
            }
            let Some(child) = self.single_child(id)? else {
                continue;
            };
            let child_object = self.scene.get(child)?;
            if !matches!(
                child_object.kind,
                ObjectKind::SpriteVisual(_) | ObjectKind::ShapeVisual(_)
            ) {
                continue;
            }
            let parent_properties = non_default_visual_properties(self.scene.get(id)?);
            let child_properties = non_default_visual_properties(child_object);
            if parent_properties.intersects(PropertyId::PROPERTIES)
                || !are_properties_orthogonal(parent_properties, child_properties)
            {
                continue;
            }
            if self.elide_container_visual(id)? {
                self.transfer_visual_properties(id, child)?;
            }
        }
        Ok(())
    }

    /// A container whose only child is a container takes over the child's
    /// properties and children. The root keeps its identity.
    fn coalesce_orthogonal_container_visuals(&mut self) -> SceneResult<()> {
        for id in self.nodes_of(|kind| matches!(kind, ObjectKind::ContainerVisual(_)))? {
            if id == self.root {
                continue;
            }
            let Some(child) = self.single_child(id)? else {
                continue;
            };
            let child_object = self.scene.get(child)?;
            if !matches!(child_object.kind, ObjectKind::ContainerVisual(_)) {
                continue;
            }
            let parent_properties = non_default_visual_properties(self.scene.get(id)?);
            let child_properties = non_default_visual_properties(child_object);
            if child_properties.intersects(PropertyId::PROPERTIES)
                || !are_properties_orthogonal(parent_properties, child_properties)
            {
                continue;
            }
            if self.elide_container_visual(child)? {
                self.transfer_visual_properties(child, id)?;
            }
        }
        Ok(())
    }

    fn plain_inset_clip(&self, clip: Option<ObjectId>) -> SceneResult<Option<InsetClip>> {
        let Some(clip) = clip else {
            return Ok(None);
        };
        let object = self.scene.get(clip)?;
        Ok(match &object.kind {
            ObjectKind::InsetClip(inset) if object.animators.is_empty() && object.properties.is_empty() => {
                Some(inset.clone())
            }
            _ => None,
        })
    }

    /// A container that only clips its single shape visual child to the
    /// same inset clip and size the child already has.
    fn remove_redundant_inset_clip_visuals(&mut self) -> SceneResult<()> {
        let expected = PropertyId::CLIP | PropertyId::SIZE | PropertyId::CHILDREN;
        for id in self.nodes_of(|kind| matches!(kind, ObjectKind::ContainerVisual(_)))? {
            let object = self.scene.get(id)?;
            if non_default_container_visual_properties(object) != expected
                || !object.animators.is_empty()
            {
                continue;
            }
            let ObjectKind::ContainerVisual(container) = &object.kind else {
                continue;
            };
            let [child] = container.children.as_slice() else {
                continue;
            };
            let child = *child;
            let ObjectKind::ShapeVisual(shape_visual) = &self.scene.get(child)?.kind else {
                continue;
            };
            let container_clip = self.plain_inset_clip(container.clip)?;
            let child_clip = self.plain_inset_clip(shape_visual.visual.clip)?;
            if container_clip.is_none()
                || container_clip != child_clip
                || container.size != shape_visual.visual.size
            {
                continue;
            }
            let Some((parent, index)) = self.visual_position(id)? else {
                continue;
            };

            self.children_mut(parent)?[index] = child;
            self.children_mut(id)?.clear();
            self.graph.set_parent(child, Some(parent))?;
            self.graph.set_parent(id, None)?;
            self.copy_descriptions(id, child)?;
            self.made_progress = true;
            debug!(container = %id, "removed redundant inset clip visual");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{AnimationValue, KeyFrameAnimation, ValueType};
    use crate::object::{Color, ContainerShape, Shape, ShapeVisual, SpriteShape, SpriteVisual};
    use glam::{Mat4, Vec3};
    use std::time::Duration;

    fn sprite(scene: &mut Scene, color: Color) -> ObjectId {
        let brush = scene.add_kind(ObjectKind::ColorBrush(ColorBrush { color: Some(color) }));
        scene.add_kind(ObjectKind::SpriteShape(SpriteShape {
            fill_brush: Some(brush),
            ..Default::default()
        }))
    }

    fn container(scene: &mut Scene, shape: Shape, shapes: Vec<ObjectId>) -> ObjectId {
        scene.add_kind(ObjectKind::ContainerShape(ContainerShape { shape, shapes }))
    }

    fn shape_visual(scene: &mut Scene, shapes: Vec<ObjectId>) -> ObjectId {
        scene.add_kind(ObjectKind::ShapeVisual(ShapeVisual {
            shapes,
            ..Default::default()
        }))
    }

    fn shapes(scene: &Scene, id: ObjectId) -> Vec<ObjectId> {
        scene.get(id).unwrap().shapes().unwrap().clone()
    }

    const RED: Color = Color::argb(255, 255, 0, 0);

    #[test]
    fn transparent_and_empty_shapes_disappear() {
        let mut scene = Scene::new();
        let visible = sprite(&mut scene, RED);
        let invisible = sprite(&mut scene, Color::TRANSPARENT);
        let empty = container(&mut scene, Shape::default(), vec![invisible]);
        let root = shape_visual(&mut scene, vec![empty, visible]);

        compact(&mut scene, root, &CompactorConfig::default()).unwrap();
        assert_eq!(shapes(&scene, root), vec![visible]);
    }

    #[test]
    fn matrix_is_pushed_into_children() {
        let mut scene = Scene::new();
        let a = sprite(&mut scene, RED);
        let b = sprite(&mut scene, RED);
        let matrix = Affine2::from_translation(Vec2::new(5.0, 0.0));
        let group = container(
            &mut scene,
            Shape {
                transform_matrix: Some(matrix),
                ..Default::default()
            },
            vec![a, b],
        );
        let root = shape_visual(&mut scene, vec![group]);

        compact(&mut scene, root, &CompactorConfig::default()).unwrap();
        assert_eq!(shapes(&scene, root), vec![a, b]);
        for id in [a, b] {
            assert_eq!(scene.get(id).unwrap().shape().unwrap().transform_matrix, Some(matrix));
        }
    }

    #[test]
    fn equal_sibling_containers_share_one() {
        let mut scene = Scene::new();
        let offset = Shape {
            offset: Some(Vec2::new(1.0, 2.0)),
            ..Default::default()
        };
        let mut spin = KeyFrameAnimation::new(ValueType::Scalar, Duration::from_secs(1));
        spin.insert_key_frame(0.0, AnimationValue::Scalar(0.0), None).unwrap();
        spin.insert_key_frame(1.0, AnimationValue::Scalar(360.0), None).unwrap();
        let spin = scene.add_kind(ObjectKind::KeyFrameAnimation(spin));
        let mut groups = Vec::new();
        let mut sprites = Vec::new();
        for _ in 0..2 {
            let a = sprite(&mut scene, RED);
            let b = sprite(&mut scene, RED);
            sprites.extend([a, b]);
            let mut container = CompositionObject::new(ObjectKind::ContainerShape(ContainerShape {
                shape: offset.clone(),
                shapes: vec![a, b],
            }));
            // Keeps the container from being folded into its children.
            container.start_animation(names::ROTATION_ANGLE_IN_DEGREES, spin, None);
            groups.push(scene.add(container));
        }
        let root = shape_visual(&mut scene, groups.clone());

        compact(&mut scene, root, &CompactorConfig::default()).unwrap();
        assert_eq!(shapes(&scene, root), vec![groups[0]]);
        assert_eq!(shapes(&scene, groups[0]), sprites);
    }

    #[test]
    fn structural_container_visuals_are_spliced() {
        let mut scene = Scene::new();
        let leaf_a = scene.add_kind(ObjectKind::SpriteVisual(SpriteVisual::default()));
        let leaf_b = scene.add_kind(ObjectKind::SpriteVisual(SpriteVisual::default()));
        let middle = scene.add(
            CompositionObject::new(ObjectKind::ContainerVisual(Visual {
                children: vec![leaf_a, leaf_b],
                ..Default::default()
            }))
            .with_name("layer"),
        );
        let root = scene.add_kind(ObjectKind::ContainerVisual(Visual {
            children: vec![middle],
            ..Default::default()
        }));

        compact(&mut scene, root, &CompactorConfig::default()).unwrap();
        let root_visual = scene.get(root).unwrap().visual().unwrap();
        assert_eq!(root_visual.children, vec![leaf_a, leaf_b]);
        assert_eq!(scene.get(leaf_a).unwrap().meta.name.as_deref(), Some("layer"));
    }

    #[test]
    fn orthogonal_container_moves_onto_its_sprite() {
        let mut scene = Scene::new();
        let leaf = scene.add_kind(ObjectKind::SpriteVisual(SpriteVisual {
            visual: Visual {
                transform_matrix: Some(Mat4::from_translation(Vec3::X)),
                ..Default::default()
            },
            ..Default::default()
        }));
        let wrapper = scene.add_kind(ObjectKind::ContainerVisual(Visual {
            children: vec![leaf],
            opacity: Some(0.5),
            ..Default::default()
        }));
        let root = scene.add_kind(ObjectKind::ContainerVisual(Visual {
            children: vec![wrapper],
            ..Default::default()
        }));

        compact(&mut scene, root, &CompactorConfig::default()).unwrap();
        assert_eq!(scene.get(root).unwrap().visual().unwrap().children, vec![leaf]);
        assert_eq!(scene.get(leaf).unwrap().visual().unwrap().opacity, Some(0.5));
    }

    #[test]
    fn offset_does_not_move_under_a_rotation() {
        let mut scene = Scene::new();
        let leaf = scene.add_kind(ObjectKind::SpriteVisual(SpriteVisual {
            visual: Visual {
                offset: Some(Vec3::X),
                ..Default::default()
            },
            ..Default::default()
        }));
        let wrapper = scene.add_kind(ObjectKind::ContainerVisual(Visual {
            children: vec![leaf],
            rotation_angle_in_degrees: Some(90.0),
            ..Default::default()
        }));
        let root = scene.add_kind(ObjectKind::ContainerVisual(Visual {
            children: vec![wrapper],
            ..Default::default()
        }));

        compact(&mut scene, root, &CompactorConfig::default()).unwrap();
        assert_eq!(scene.get(root).unwrap().visual().unwrap().children, vec![wrapper]);
    }

    #[test]
    fn visibility_moves_up_to_a_single_child_parent() {
        let mut scene = Scene::new();
        let mut animation = KeyFrameAnimation::new(ValueType::Boolean, Duration::from_secs(1));
        animation.insert_key_frame(0.0, AnimationValue::Boolean(false), None).unwrap();
        animation.insert_key_frame(0.5, AnimationValue::Boolean(true), None).unwrap();
        let animation = scene.add_kind(ObjectKind::KeyFrameAnimation(animation));
        let progress = scene.add_kind(ObjectKind::ExpressionAnimation(
            crate::animation::ExpressionAnimation::new("_.Progress"),
        ));
        let mut controller = CompositionObject::new(ObjectKind::AnimationController(AnimationController {
            is_paused: true,
            is_custom: false,
        }));
        controller.start_animation(names::PROGRESS, progress, None);
        let controller = scene.add(controller);

        let mut leaf = CompositionObject::new(ObjectKind::SpriteVisual(SpriteVisual {
            visual: Visual {
                offset: Some(Vec3::X),
                ..Default::default()
            },
            ..Default::default()
        }));
        leaf.start_animation(names::IS_VISIBLE, animation, Some(controller));
        let leaf = scene.add(leaf);
        let wrapper = scene.add_kind(ObjectKind::ContainerVisual(Visual {
            children: vec![leaf],
            rotation_angle_in_degrees: Some(30.0),
            ..Default::default()
        }));
        let sibling = scene.add_kind(ObjectKind::SpriteVisual(SpriteVisual::default()));
        let root = scene.add_kind(ObjectKind::ContainerVisual(Visual {
            children: vec![wrapper, sibling],
            ..Default::default()
        }));

        compact(&mut scene, root, &CompactorConfig::default()).unwrap();
        assert!(!scene.get(leaf).unwrap().is_animated(names::IS_VISIBLE));
        let wrapper_object = scene.get(wrapper).unwrap();
        assert!(wrapper_object.is_animated(names::IS_VISIBLE));
        assert_eq!(wrapper_object.visual().unwrap().is_visible, Some(false));
    }

    #[test]
    fn opposite_visibility_changes_at_one_progress_compact() {
        let mut scene = Scene::new();
        let switch = |scene: &mut Scene, from: bool| {
            let mut animation = KeyFrameAnimation::new(ValueType::Boolean, Duration::from_secs(1));
            animation.insert_key_frame(0.0, AnimationValue::Boolean(from), None).unwrap();
            animation.insert_key_frame(0.5, AnimationValue::Boolean(!from), None).unwrap();
            scene.add_kind(ObjectKind::KeyFrameAnimation(animation))
        };
        let shows = switch(&mut scene, false);
        let hides = switch(&mut scene, true);
        let progress = scene.add_kind(ObjectKind::ExpressionAnimation(
            crate::animation::ExpressionAnimation::new("_.Progress"),
        ));
        let mut controller = CompositionObject::new(ObjectKind::AnimationController(AnimationController {
            is_paused: true,
            is_custom: false,
        }));
        controller.start_animation(names::PROGRESS, progress, None);
        let controller = scene.add(controller);

        let mut leaf = CompositionObject::new(ObjectKind::SpriteVisual(SpriteVisual {
            visual: Visual {
                offset: Some(Vec3::X),
                ..Default::default()
            },
            ..Default::default()
        }));
        leaf.start_animation(names::IS_VISIBLE, shows, Some(controller));
        let leaf = scene.add(leaf);
        let mut wrapper = CompositionObject::new(ObjectKind::ContainerVisual(Visual {
            children: vec![leaf],
            rotation_angle_in_degrees: Some(30.0),
            ..Default::default()
        }));
        wrapper.start_animation(names::IS_VISIBLE, hides, Some(controller));
        let wrapper = scene.add(wrapper);
        let sibling = scene.add_kind(ObjectKind::SpriteVisual(SpriteVisual::default()));
        let root = scene.add_kind(ObjectKind::ContainerVisual(Visual {
            children: vec![wrapper, sibling],
            ..Default::default()
        }));

        compact(&mut scene, root, &CompactorConfig::default()).unwrap();
        assert!(!scene.get(leaf).unwrap().is_animated(names::IS_VISIBLE));
        let hidden = scene.get(wrapper).unwrap();
        assert_eq!(hidden.visual().unwrap().is_visible, Some(false));
        let animation = hidden.animator(names::IS_VISIBLE).unwrap().animation;
        let ObjectKind::KeyFrameAnimation(animation) = &scene.get(animation).unwrap().kind else {
            panic!("visibility is a key frame animation");
        };
        assert_eq!(animation.key_frames().len(), 1);
    }

    #[test]
    fn iteration_bound_is_enforced() {
        let mut scene = Scene::new();
        let a = sprite(&mut scene, RED);
        let group = container(&mut scene, Shape::default(), vec![a]);
        let root = shape_visual(&mut scene, vec![group]);

        let config = CompactorConfig { max_iterations: 1 };
        assert!(matches!(
            compact(&mut scene, root, &config),
            Err(SceneError::Invariant(_))
        ));
    }
}
