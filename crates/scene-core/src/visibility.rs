//! Visibility over the progress of an animation, and the composition of two
//! such visibilities when a visual and its parent are merged.

use crate::animation::{AnimationValue, KeyFrameAnimation, KeyFrameValue, ValueType};
use crate::error::{SceneError, SceneResult};
use crate::object::{AnimationController, CompositionObject, ObjectId, ObjectKind};
use crate::properties::names;
use crate::scene::Scene;
use glam::Vec2;
use serde::Serialize;
use std::cmp::Ordering;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VisibilityAtProgress {
    pub is_visible: bool,
    pub progress: f32,
}

impl VisibilityAtProgress {
    pub fn new(is_visible: bool, progress: f32) -> Self {
        Self { is_visible, progress }
    }

    /// By progress, then visible before invisible.
    fn order(a: &Self, b: &Self) -> Ordering {
        a.progress
            .total_cmp(&b.progress)
            .then_with(|| b.is_visible.cmp(&a.is_visible))
    }
}

/// Changes of visibility over `duration`. The state before the first entry
/// is invisible; an empty sequence means the visibility is not animated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisibilityDescription {
    pub duration: Duration,
    pub sequence: Vec<VisibilityAtProgress>,
}

impl VisibilityDescription {
    pub fn new(duration: Duration, sequence: Vec<VisibilityAtProgress>) -> Self {
        Self { duration, sequence }
    }

    pub fn unanimated() -> Self {
        Self::new(Duration::ZERO, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Visible exactly when both `a` and `b` are visible.
    pub fn compose(a: &Self, b: &Self) -> SceneResult<Self> {
        if a.is_empty() {
            return Ok(b.clone());
        }
        if b.is_empty() {
            return Ok(a.clone());
        }
        if a.duration != b.duration {
            return Err(SceneError::invariant(format!(
                "cannot compose visibilities of {:?} and {:?}",
                a.duration, b.duration
            )));
        }
        if a.sequence == b.sequence {
            return Ok(a.clone());
        }

        let mut items = sanitize(&a.sequence);
        items.extend(sanitize(&b.sequence));
        items.sort_by(VisibilityAtProgress::order);

        let mut composed = Vec::new();
        let mut visible_count = 0;
        let mut initial_state_written = false;
        for item in items {
            visible_count += if item.is_visible { 1 } else { -1 };
            if visible_count == 2 {
                if !initial_state_written {
                    initial_state_written = true;
                    if item.progress != 0.0 {
                        composed.push(VisibilityAtProgress::new(false, 0.0));
                    }
                }
                composed.push(VisibilityAtProgress::new(true, item.progress));
            } else if visible_count == 1 && !item.is_visible {
                composed.push(VisibilityAtProgress::new(false, item.progress));
            }
        }
        Ok(Self::new(a.duration, settle(composed)))
    }
}

/// One entry per progress, holding the state after every change at that
/// progress, with entries that do not change the state dropped. The first
/// entry is always kept.
fn settle(sequence: Vec<VisibilityAtProgress>) -> Vec<VisibilityAtProgress> {
    let mut settled: Vec<VisibilityAtProgress> = Vec::with_capacity(sequence.len());
    for item in sequence {
        match settled.last_mut() {
            Some(last) if last.progress == item.progress => *last = item,
            _ => settled.push(item),
        }
        let n = settled.len();
        if n >= 2 && settled[n - 1].is_visible == settled[n - 2].is_visible {
            settled.pop();
        }
    }
    settled
}

/// Sorted, with repeats of the current state removed.
fn sanitize(sequence: &[VisibilityAtProgress]) -> Vec<VisibilityAtProgress> {
    let mut sorted = sequence.to_vec();
    sorted.sort_by(VisibilityAtProgress::order);

    let mut previous = false;
    sorted.retain(|item| {
        let keep = item.is_visible != previous;
        previous = item.is_visible;
        keep
    });
    sorted
}

/// What drives the progress of a visibility animation once it moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityDriver {
    /// A fresh paused controller whose `Progress` is bound to this animation.
    Progress(ObjectId),
    /// A shared controller.
    Custom(ObjectId),
}

impl VisibilityDriver {
    /// How the `property` animator of `object` is driven. `Ok(None)` when the
    /// animator runs without a controller.
    pub fn of(scene: &Scene, object: &CompositionObject, property: &str) -> SceneResult<Option<Self>> {
        let Some(controller_id) = object.animator(property).and_then(|a| a.controller) else {
            return Ok(None);
        };
        let controller = scene.get(controller_id)?;
        let is_custom = matches!(
            controller.kind,
            ObjectKind::AnimationController(AnimationController { is_custom: true, .. })
        );
        if is_custom {
            return Ok(Some(VisibilityDriver::Custom(controller_id)));
        }
        match controller.animator(names::PROGRESS) {
            Some(progress) => Ok(Some(VisibilityDriver::Progress(progress.animation))),
            None => Err(SceneError::invariant(format!(
                "controller {controller_id} of {property} is neither custom nor driven by Progress"
            ))),
        }
    }
}

fn key_frame_animation(scene: &Scene, id: ObjectId) -> SceneResult<Option<&KeyFrameAnimation>> {
    Ok(match &scene.get(id)?.kind {
        ObjectKind::KeyFrameAnimation(a) => Some(a),
        _ => None,
    })
}

/// Visibility of a visual from its `IsVisible` animation. `Ok(None)` when
/// the animation cannot be described, for example when it uses expressions.
pub fn visual_visibility(scene: &Scene, visual: ObjectId) -> SceneResult<Option<VisibilityDescription>> {
    let object = scene.get(visual)?;
    let Some(animator) = object.animator(names::IS_VISIBLE) else {
        return Ok(Some(VisibilityDescription::unanimated()));
    };
    let Some(animation) = key_frame_animation(scene, animator.animation)? else {
        return Ok(None);
    };
    if animation.value_type() != ValueType::Boolean {
        return Ok(None);
    }

    let initially_visible = object.visual().and_then(|v| v.is_visible).unwrap_or(true);
    let mut sequence = Vec::with_capacity(animation.key_frames().len() + 1);
    for key_frame in animation.key_frames() {
        let KeyFrameValue::Value(AnimationValue::Boolean(is_visible)) = key_frame.value else {
            return Ok(None);
        };
        if sequence.is_empty() && key_frame.progress != 0.0 {
            sequence.push(VisibilityAtProgress::new(initially_visible, 0.0));
        }
        sequence.push(VisibilityAtProgress::new(is_visible, key_frame.progress));
    }
    Ok(Some(VisibilityDescription::new(animation.duration, sequence)))
}

/// Whether a shape's `Scale` only ever switches between zero and one with
/// step easings, that is, only shows and hides the shape.
pub fn is_scale_used_for_visibility(scene: &Scene, shape: &CompositionObject) -> SceneResult<bool> {
    let static_scale = shape.shape().and_then(|s| s.scale);
    if static_scale.is_some_and(|s| s != Vec2::ONE && s != Vec2::ZERO) {
        return Ok(false);
    }
    let Some(animator) = shape.animator(names::SCALE) else {
        return Ok(false);
    };
    let Some(animation) = key_frame_animation(scene, animator.animation)? else {
        return Ok(false);
    };
    for key_frame in animation.key_frames() {
        let is_step = match key_frame.easing {
            Some(easing) => matches!(scene.get(easing)?.kind, ObjectKind::StepEasing(_)),
            None => false,
        };
        let is_switch = matches!(
            key_frame.value,
            KeyFrameValue::Value(AnimationValue::Vector2(v)) if v == Vec2::ONE || v == Vec2::ZERO
        );
        if !is_step || !is_switch {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Visibility of a shape whose scale is used for visibility.
pub fn shape_visibility(scene: &Scene, shape: ObjectId) -> SceneResult<VisibilityDescription> {
    let object = scene.get(shape)?;
    if !is_scale_used_for_visibility(scene, object)? {
        return Err(SceneError::invariant(format!(
            "scale of {shape} is not used for visibility"
        )));
    }
    let animation = object
        .animator(names::SCALE)
        .map(|a| key_frame_animation(scene, a.animation))
        .transpose()?
        .flatten()
        .ok_or_else(|| SceneError::invariant(format!("{shape} has no scale animation")))?;

    let initially_visible = object.shape().and_then(|s| s.scale).map_or(true, |s| s == Vec2::ONE);
    let mut sequence = Vec::with_capacity(animation.key_frames().len() + 1);
    for key_frame in animation.key_frames() {
        let is_visible = matches!(
            key_frame.value,
            KeyFrameValue::Value(AnimationValue::Vector2(v)) if v == Vec2::ONE
        );
        if sequence.is_empty() && key_frame.progress != 0.0 {
            sequence.push(VisibilityAtProgress::new(initially_visible, 0.0));
        }
        sequence.push(VisibilityAtProgress::new(is_visible, key_frame.progress));
    }
    Ok(VisibilityDescription::new(animation.duration, sequence))
}

/// Replaces the visibility of `to` with `visibility` as a boolean key frame
/// animation. Returns whether anything was written.
pub fn apply_visibility(
    scene: &mut Scene,
    to: ObjectId,
    visibility: &VisibilityDescription,
    driver: VisibilityDriver,
) -> SceneResult<bool> {
    let Some(first) = visibility.sequence.first().copied() else {
        return Ok(false);
    };

    let mut animation = KeyFrameAnimation::new(ValueType::Boolean, visibility.duration);
    for entry in &visibility.sequence {
        animation.insert_key_frame(entry.progress, AnimationValue::Boolean(entry.is_visible), None)?;
    }
    let animation = scene.add_kind(ObjectKind::KeyFrameAnimation(animation));

    let controller = match driver {
        VisibilityDriver::Custom(controller) => controller,
        VisibilityDriver::Progress(progress) => {
            let mut controller = CompositionObject::new(ObjectKind::AnimationController(
                AnimationController {
                    is_paused: true,
                    is_custom: false,
                },
            ));
            controller.start_animation(names::PROGRESS, progress, None);
            scene.add(controller)
        }
    };

    let target = scene.get_mut(to)?;
    if first.progress == 0.0 {
        if let Some(visual) = target.visual_mut() {
            visual.is_visible = Some(first.is_visible);
        }
    }
    target.start_animation(names::IS_VISIBLE, animation, Some(controller));
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Shape, SpriteShape, StepEasing, Visual};

    fn seq(items: &[(bool, f32)]) -> Vec<VisibilityAtProgress> {
        items.iter().map(|&(v, p)| VisibilityAtProgress::new(v, p)).collect()
    }

    fn desc(items: &[(bool, f32)]) -> VisibilityDescription {
        VisibilityDescription::new(Duration::from_secs(2), seq(items))
    }

    #[test]
    fn composition_is_visible_only_when_both_are() {
        let a = desc(&[(true, 0.0), (false, 0.6)]);
        let b = desc(&[(false, 0.0), (true, 0.3)]);
        let composed = VisibilityDescription::compose(&a, &b).unwrap();
        assert_eq!(composed.sequence, seq(&[(false, 0.0), (true, 0.3), (false, 0.6)]));
    }

    #[test]
    fn coincident_opposite_changes_settle_on_one_state() {
        let a = desc(&[(true, 0.0), (false, 0.5)]);
        let b = desc(&[(false, 0.0), (true, 0.5)]);
        let composed = VisibilityDescription::compose(&a, &b).unwrap();
        assert_eq!(composed.sequence, seq(&[(false, 0.0)]));

        let a = desc(&[(true, 0.0), (false, 0.5), (true, 0.75)]);
        let b = desc(&[(true, 0.25), (false, 0.75)]);
        let composed = VisibilityDescription::compose(&a, &b).unwrap();
        assert_eq!(composed.sequence, seq(&[(false, 0.0), (true, 0.25), (false, 0.5)]));
        assert!(composed.sequence.windows(2).all(|w| w[0].progress < w[1].progress));

        let mut scene = Scene::new();
        let visual = scene.add_kind(ObjectKind::ContainerVisual(Visual::default()));
        let progress = scene.add_kind(ObjectKind::ExpressionAnimation(
            crate::animation::ExpressionAnimation::new("_.Progress"),
        ));
        assert!(apply_visibility(&mut scene, visual, &composed, VisibilityDriver::Progress(progress)).unwrap());
    }

    #[test]
    fn unanimated_side_is_neutral() {
        let a = desc(&[(true, 0.25)]);
        let none = VisibilityDescription::unanimated();
        assert_eq!(VisibilityDescription::compose(&a, &none).unwrap(), a);
        assert_eq!(VisibilityDescription::compose(&none, &a).unwrap(), a);
    }

    #[test]
    fn differing_durations_cannot_compose() {
        let a = desc(&[(true, 0.0)]);
        let b = VisibilityDescription::new(Duration::from_secs(3), seq(&[(true, 0.5)]));
        assert!(VisibilityDescription::compose(&a, &b).is_err());
    }

    #[test]
    fn repeats_are_ignored() {
        let a = desc(&[(true, 0.0), (true, 0.2), (false, 0.8), (false, 0.9)]);
        let b = desc(&[(true, 0.1)]);
        let composed = VisibilityDescription::compose(&a, &b).unwrap();
        assert_eq!(composed.sequence, seq(&[(false, 0.0), (true, 0.1), (false, 0.8)]));
    }

    #[test]
    fn static_state_fills_the_start_of_a_visual_description() {
        let mut scene = Scene::new();
        let mut animation = KeyFrameAnimation::new(ValueType::Boolean, Duration::from_secs(1));
        animation.insert_key_frame(0.5, AnimationValue::Boolean(true), None).unwrap();
        let animation = scene.add_kind(ObjectKind::KeyFrameAnimation(animation));

        let mut visual = CompositionObject::new(ObjectKind::ContainerVisual(Visual {
            is_visible: Some(false),
            ..Default::default()
        }));
        visual.start_animation(names::IS_VISIBLE, animation, None);
        let visual = scene.add(visual);

        let described = visual_visibility(&scene, visual).unwrap().unwrap();
        assert_eq!(described.sequence, seq(&[(false, 0.0), (true, 0.5)]));
    }

    #[test]
    fn scale_visibility_needs_step_easing() {
        let mut scene = Scene::new();
        let step = scene.add_kind(ObjectKind::StepEasing(StepEasing::default()));
        let mut animation = KeyFrameAnimation::new(ValueType::Vector2, Duration::from_secs(1));
        animation.insert_key_frame(0.0, AnimationValue::Vector2(Vec2::ZERO), Some(step)).unwrap();
        animation.insert_key_frame(0.4, AnimationValue::Vector2(Vec2::ONE), Some(step)).unwrap();
        let animation = scene.add_kind(ObjectKind::KeyFrameAnimation(animation));

        let mut shape = CompositionObject::new(ObjectKind::SpriteShape(SpriteShape {
            shape: Shape::default(),
            ..Default::default()
        }));
        shape.start_animation(names::SCALE, animation, None);
        let shape = scene.add(shape);

        assert!(is_scale_used_for_visibility(&scene, scene.get(shape).unwrap()).unwrap());
        let described = shape_visibility(&scene, shape).unwrap();
        assert_eq!(described.sequence, seq(&[(false, 0.0), (true, 0.4)]));

        let mut linear = KeyFrameAnimation::new(ValueType::Vector2, Duration::from_secs(1));
        linear.insert_key_frame(0.0, AnimationValue::Vector2(Vec2::ONE), None).unwrap();
        let linear = scene.add_kind(ObjectKind::KeyFrameAnimation(linear));
        scene.get_mut(shape).unwrap().start_animation(names::SCALE, linear, None);
        assert!(!is_scale_used_for_visibility(&scene, scene.get(shape).unwrap()).unwrap());
    }

    #[test]
    fn applying_visibility_adds_a_paused_controller() {
        let mut scene = Scene::new();
        let progress = scene.add_kind(ObjectKind::ExpressionAnimation(
            crate::animation::ExpressionAnimation::new("_.Progress"),
        ));
        let visual = scene.add_kind(ObjectKind::ContainerVisual(Visual::default()));

        let written = apply_visibility(
            &mut scene,
            visual,
            &desc(&[(false, 0.0), (true, 0.5)]),
            VisibilityDriver::Progress(progress),
        )
        .unwrap();
        assert!(written);

        let object = scene.get(visual).unwrap();
        assert_eq!(object.visual().unwrap().is_visible, Some(false));
        let controller = object.animator(names::IS_VISIBLE).unwrap().controller.unwrap();
        let controller = scene.get(controller).unwrap();
        assert_eq!(controller.animator(names::PROGRESS).unwrap().animation, progress);
        assert!(matches!(
            controller.kind,
            ObjectKind::AnimationController(AnimationController { is_paused: true, .. })
        ));
    }
}
