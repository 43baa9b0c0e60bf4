//! Finds objects that are indistinguishable from each other and points them
//! at one representative, so that later stages share instead of duplicate.
//!
//! Objects are grouped kind by kind, leaves first, so the key of an object
//! can use the already-settled representatives of the objects it refers to.

use crate::animation::{AnimationValue, KeyFrameValue};
use crate::error::SceneResult;
use crate::graph::ObjectGraph;
use crate::object::{Color, CompositionObject, ObjectId, ObjectKind};
use crate::properties::names;
use crate::scene::Scene;
use glam::Vec2;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyPart {
    None,
    Flag(bool),
    Int(i64),
    Float(u32),
    Text(String),
    Id(ObjectId),
    SelfRef,
    Color(Color),
    Duration(Duration),
}

/// Everything that distinguishes an object, flattened.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EqKey(Vec<KeyPart>);

impl EqKey {
    fn new(kind: &str) -> Self {
        Self(vec![KeyPart::Text(kind.to_owned())])
    }

    fn push(mut self, part: KeyPart) -> Self {
        self.0.push(part);
        self
    }

    fn float(self, value: f32) -> Self {
        // -0.0 and 0.0 render identically.
        let value = if value == 0.0 { 0.0 } else { value };
        self.push(KeyPart::Float(value.to_bits()))
    }

    fn opt_float(self, value: Option<f32>) -> Self {
        match value {
            Some(v) => self.float(v),
            None => self.push(KeyPart::None),
        }
    }

    fn vec2(self, value: Vec2) -> Self {
        self.float(value.x).float(value.y)
    }

    fn opt_vec2(self, value: Option<Vec2>) -> Self {
        match value {
            Some(v) => self.vec2(v),
            None => self.push(KeyPart::None),
        }
    }

    fn opt_int(self, value: Option<i32>) -> Self {
        self.push(value.map_or(KeyPart::None, |v| KeyPart::Int(v.into())))
    }

    fn opt_flag(self, value: Option<bool>) -> Self {
        self.push(value.map_or(KeyPart::None, KeyPart::Flag))
    }

    fn opt_text(self, value: Option<&str>) -> Self {
        self.push(value.map_or(KeyPart::None, |t| KeyPart::Text(t.to_owned())))
    }

    fn opt_color(self, value: Option<Color>) -> Self {
        self.push(value.map_or(KeyPart::None, KeyPart::Color))
    }

    fn opt_id(self, value: Option<ObjectId>) -> Self {
        self.push(value.map_or(KeyPart::None, KeyPart::Id))
    }

    fn value<T>(self, value: &AnimationValue, graph: &ObjectGraph<T>) -> Self {
        match value {
            AnimationValue::Boolean(b) => self.push(KeyPart::Text("bool".into())).push(KeyPart::Flag(*b)),
            AnimationValue::Scalar(v) => self.push(KeyPart::Text("scalar".into())).float(*v),
            AnimationValue::Vector2(v) => self.push(KeyPart::Text("vec2".into())).vec2(*v),
            AnimationValue::Vector3(v) => self
                .push(KeyPart::Text("vec3".into()))
                .float(v.x)
                .float(v.y)
                .float(v.z),
            AnimationValue::Vector4(v) => self
                .push(KeyPart::Text("vec4".into()))
                .float(v.x)
                .float(v.y)
                .float(v.z)
                .float(v.w),
            AnimationValue::Color(c) => self.push(KeyPart::Color(*c)),
            AnimationValue::Path(p) => self.push(KeyPart::Id(graph.canonical(*p))),
        }
    }
}

/// Order in which object kinds are canonicalized. Each kind only refers to
/// kinds canonicalized before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    InsetClips,
    ShapeGeometries,
    Paths,
    StaticPathGeometries,
    Easings,
    ExpressionAnimations,
    KeyFrameAnimations,
    AnimatedPathGeometries,
    ColorBrushes,
    ThemeBrushes,
    GradientStops,
}

const STEPS: [Step; 10] = [
    Step::InsetClips,
    Step::ShapeGeometries,
    Step::Paths,
    Step::StaticPathGeometries,
    Step::Easings,
    Step::ExpressionAnimations,
    Step::KeyFrameAnimations,
    Step::AnimatedPathGeometries,
    Step::ColorBrushes,
    Step::ThemeBrushes,
];

fn step_of(object: &CompositionObject) -> Option<Step> {
    match &object.kind {
        ObjectKind::InsetClip(_) => Some(Step::InsetClips),
        ObjectKind::EllipseGeometry(_)
        | ObjectKind::RectangleGeometry(_)
        | ObjectKind::RoundedRectangleGeometry(_) => Some(Step::ShapeGeometries),
        ObjectKind::Path(_) => Some(Step::Paths),
        ObjectKind::PathGeometry(_) if object.animators.is_empty() => {
            Some(Step::StaticPathGeometries)
        }
        ObjectKind::PathGeometry(_) => Some(Step::AnimatedPathGeometries),
        ObjectKind::LinearEasing
        | ObjectKind::CubicBezierEasing(_)
        | ObjectKind::StepEasing(_) => Some(Step::Easings),
        ObjectKind::ExpressionAnimation(_) => Some(Step::ExpressionAnimations),
        ObjectKind::KeyFrameAnimation(_) => Some(Step::KeyFrameAnimations),
        ObjectKind::ColorBrush(_) if object.properties.is_empty() => Some(Step::ColorBrushes),
        ObjectKind::ColorBrush(_) => Some(Step::ThemeBrushes),
        ObjectKind::ColorGradientStop(_) => Some(Step::GradientStops),
        ObjectKind::ContainerVisual(_)
        | ObjectKind::ShapeVisual(_)
        | ObjectKind::SpriteVisual(_)
        | ObjectKind::ContainerShape(_)
        | ObjectKind::SpriteShape(_)
        | ObjectKind::LinearGradientBrush(_)
        | ObjectKind::RadialGradientBrush(_)
        | ObjectKind::AnimationController(_)
        | ObjectKind::PropertySet => None,
    }
}

struct Canonicalizer<'a, T> {
    graph: &'a mut ObjectGraph<T>,
    scene: &'a Scene,
    ignore_comments: bool,
}

/// Marks every group of equivalent objects in `graph` by pointing each
/// member's `canonical` at the member first reached by the traversal.
/// Returns how many objects now have a representative other than
/// themselves.
pub fn canonicalize<T>(graph: &mut ObjectGraph<T>, scene: &Scene, ignore_comments: bool) -> SceneResult<usize> {
    let mut canonicalizer = Canonicalizer {
        graph,
        scene,
        ignore_comments,
    };
    let mut folded = 0;
    for step in STEPS {
        let count = canonicalizer.run_step(step)?;
        if count > 0 {
            debug!(?step, count, "folded equivalent objects");
        }
        folded += count;
    }
    let stops = canonicalizer.gradient_stops()?;
    if stops > 0 {
        debug!(step = ?Step::GradientStops, count = stops, "folded equivalent objects");
    }
    Ok(folded + stops)
}

/// Rewrites every reference held by an object of `graph` to the referenced
/// object's representative. Returns how many references changed.
pub fn apply_canonicalization<T>(scene: &mut Scene, graph: &ObjectGraph<T>) -> SceneResult<usize> {
    let mut rewritten = 0;
    for id in graph.ids() {
        for reference in scene.get_mut(id)?.references_mut() {
            let canonical = graph.canonical(*reference);
            if canonical != *reference {
                *reference = canonical;
                rewritten += 1;
            }
        }
    }
    Ok(rewritten)
}

/// Builds the graph, canonicalizes it and applies the result to the scene.
pub fn canonicalize_scene(scene: &mut Scene, root: ObjectId, ignore_comments: bool) -> SceneResult<usize> {
    let mut graph = ObjectGraph::<()>::from_root(scene, root)?;
    canonicalize(&mut graph, scene, ignore_comments)?;
    apply_canonicalization(scene, &graph)
}

impl<T> Canonicalizer<'_, T> {
    /// No animators, no property-set values and, unless ignored, no comment.
    fn is_plain(&self, object: &CompositionObject) -> bool {
        (self.ignore_comments || object.meta.comment.is_none())
            && object.properties.is_empty()
            && object.animators.is_empty()
    }

    fn run_step(&mut self, step: Step) -> SceneResult<usize> {
        let mut groups: IndexMap<EqKey, Vec<ObjectId>> = IndexMap::new();
        for id in self.graph.ids() {
            let object = self.scene.get(id)?;
            if step_of(object) != Some(step) {
                continue;
            }
            if let Some(key) = self.key(id, object) {
                groups.entry(key).or_default().push(id);
            }
        }
        self.fold(groups.into_values())
    }

    fn key(&self, id: ObjectId, object: &CompositionObject) -> Option<EqKey> {
        let name = object.kind.name();
        match &object.kind {
            ObjectKind::InsetClip(clip) if self.is_plain(object) => Some(
                EqKey::new(name)
                    .opt_float(clip.left_inset)
                    .opt_float(clip.top_inset)
                    .opt_float(clip.right_inset)
                    .opt_float(clip.bottom_inset)
                    .opt_vec2(clip.center_point)
                    .opt_vec2(clip.scale),
            ),
            ObjectKind::EllipseGeometry(g) if self.is_plain(object) => Some(
                trims(EqKey::new(name), &g.geometry)
                    .opt_vec2(g.center)
                    .opt_vec2(g.radius),
            ),
            ObjectKind::RectangleGeometry(g) if self.is_plain(object) => Some(
                trims(EqKey::new(name), &g.geometry)
                    .opt_vec2(g.offset)
                    .opt_vec2(g.size),
            ),
            ObjectKind::RoundedRectangleGeometry(g) if self.is_plain(object) => Some(
                trims(EqKey::new(name), &g.geometry)
                    .opt_vec2(g.offset)
                    .opt_vec2(g.size)
                    .opt_vec2(g.corner_radius),
            ),
            ObjectKind::Path(path) if self.is_plain(object) => {
                Some(EqKey::new(name).push(KeyPart::Text(path.data.to_svg())))
            }
            ObjectKind::PathGeometry(g) if self.is_plain(object) => Some(
                trims(EqKey::new(name), &g.geometry).opt_id(g.path.map(|p| self.graph.canonical(p))),
            ),
            ObjectKind::PathGeometry(g) => {
                let [animator] = object.animators.as_slice() else {
                    return None;
                };
                let plain_otherwise = (self.ignore_comments || object.meta.comment.is_none())
                    && object.properties.is_empty()
                    && animator.property == names::PATH;
                plain_otherwise.then(|| {
                    trims(EqKey::new(name), &g.geometry)
                        .opt_id(g.path.map(|p| self.graph.canonical(p)))
                        .push(KeyPart::Id(self.graph.canonical(animator.animation)))
                        .opt_id(animator.controller)
                })
            }
            ObjectKind::LinearEasing if self.is_plain(object) => Some(EqKey::new(name)),
            ObjectKind::CubicBezierEasing(e) if self.is_plain(object) => Some(
                EqKey::new(name)
                    .vec2(e.control_point1)
                    .vec2(e.control_point2),
            ),
            ObjectKind::StepEasing(e) if self.is_plain(object) => Some(
                EqKey::new(name)
                    .opt_int(e.step_count)
                    .opt_int(e.initial_step)
                    .opt_int(e.final_step)
                    .opt_flag(e.is_initial_step_single_frame)
                    .opt_flag(e.is_final_step_single_frame),
            ),
            ObjectKind::ExpressionAnimation(a) if self.is_plain(object) => {
                let mut key = EqKey::new(name)
                    .push(KeyPart::Text(a.expression.clone()))
                    .opt_text(a.target.as_deref());
                for (parameter, target) in &a.reference_parameters {
                    key = key
                        .push(KeyPart::Text(parameter.clone()))
                        .push(KeyPart::Id(self.graph.canonical(*target)));
                }
                Some(key)
            }
            ObjectKind::KeyFrameAnimation(a) if self.is_plain(object) => {
                let mut key = EqKey::new(name)
                    .push(KeyPart::Text(format!("{:?}", a.value_type())))
                    .push(KeyPart::Duration(a.duration))
                    .opt_text(a.target.as_deref());
                for key_frame in a.key_frames() {
                    key = key.float(key_frame.progress);
                    key = match &key_frame.value {
                        KeyFrameValue::Value(value) => key.value(value, &*self.graph),
                        KeyFrameValue::Expression(text) => key
                            .push(KeyPart::Text("expression".into()))
                            .push(KeyPart::Text(text.clone())),
                    };
                    key = key.opt_id(key_frame.easing.map(|e| self.graph.canonical(e)));
                }
                Some(key)
            }
            ObjectKind::ColorBrush(brush) => {
                if !(self.ignore_comments || object.meta.comment.is_none()) {
                    return None;
                }
                if object.properties.is_empty() {
                    self.color_brush_key(name, brush.color, object)
                } else {
                    self.theme_brush_key(id, name, brush.color, object)
                }
            }
            _ => None,
        }
    }

    fn color_brush_key(&self, name: &str, color: Option<Color>, object: &CompositionObject) -> Option<EqKey> {
        let key = EqKey::new(name).opt_color(color);
        match object.animators.as_slice() {
            [] => Some(key.push(KeyPart::None).push(KeyPart::None)),
            [animator] if animator.property == names::COLOR => Some(
                key.push(KeyPart::Id(self.graph.canonical(animator.animation)))
                    .opt_id(animator.controller),
            ),
            _ => None,
        }
    }

    /// A brush whose colour comes from one property-set value through an
    /// expression, as used for theming.
    fn theme_brush_key(
        &self,
        id: ObjectId,
        name: &str,
        color: Option<Color>,
        object: &CompositionObject,
    ) -> Option<EqKey> {
        if color.is_some() || object.properties.len() != 1 {
            return None;
        }
        let [animator] = object.animators.as_slice() else {
            return None;
        };
        if animator.property != names::COLOR {
            return None;
        }
        let ObjectKind::ExpressionAnimation(expression) = &self.scene.get(animator.animation).ok()?.kind
        else {
            return None;
        };
        let (property, value) = object.properties.first()?;

        let mut key = EqKey::new(name)
            .push(KeyPart::Text(expression.expression.clone()))
            .opt_text(expression.target.as_deref())
            .push(KeyPart::Text(property.clone()))
            .value(value, &*self.graph)
            .opt_id(animator.controller);
        for (parameter, target) in &expression.reference_parameters {
            let target = if *target == id {
                KeyPart::SelfRef
            } else {
                KeyPart::Id(self.graph.canonical(*target))
            };
            key = key.push(KeyPart::Text(parameter.clone())).push(target);
        }
        Some(key)
    }

    /// Stops are shared between gradients but must stay distinct within one,
    /// so equal stops of one gradient are told apart by their ordinal.
    fn gradient_stops(&mut self) -> SceneResult<usize> {
        let scene = self.scene;
        let mut gradients = Vec::new();
        for id in self.graph.ids() {
            if let Some(gradient) = scene.get(id)?.gradient() {
                gradients.push(gradient);
            }
        }

        let mut uses: HashMap<ObjectId, usize> = HashMap::new();
        for stop in gradients.iter().flat_map(|g| g.color_stops.iter()) {
            *uses.entry(*stop).or_default() += 1;
        }

        let mut groups: IndexMap<EqKey, Vec<ObjectId>> = IndexMap::new();
        for gradient in gradients {
            let mut ordinals: HashMap<(Option<Color>, u32), i64> = HashMap::new();
            for &stop_id in &gradient.color_stops {
                let object = scene.get(stop_id)?;
                let ObjectKind::ColorGradientStop(stop) = &object.kind else {
                    continue;
                };
                if uses.get(&stop_id) != Some(&1) || !self.is_plain(object) {
                    continue;
                }
                let ordinal = ordinals.entry((stop.color, stop.offset.to_bits())).or_default();
                let key = EqKey::new(object.kind.name())
                    .opt_color(stop.color)
                    .float(stop.offset)
                    .push(KeyPart::Int(*ordinal));
                *ordinal += 1;
                groups.entry(key).or_default().push(stop_id);
            }
        }
        self.fold(groups.into_values())
    }

    fn fold(&mut self, groups: impl Iterator<Item = Vec<ObjectId>>) -> SceneResult<usize> {
        let mut folded = 0;
        for group in groups {
            if group.len() < 2 {
                continue;
            }
            let mut canonical = group[0];
            for &id in &group[1..] {
                if self.graph.node(id)?.position < self.graph.node(canonical)?.position {
                    canonical = id;
                }
            }
            for &id in &group {
                self.graph.node_mut(id)?.canonical = canonical;
            }
            let node = self.graph.node_mut(canonical)?;
            node.folded.extend(group.iter().copied());
            folded += group.len() - 1;
        }
        Ok(folded)
    }
}

fn trims(key: EqKey, geometry: &crate::object::Geometry) -> EqKey {
    key.opt_float(geometry.trim_start)
        .opt_float(geometry.trim_end)
        .opt_float(geometry.trim_offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{ExpressionAnimation, KeyFrameAnimation, ValueType};
    use crate::object::{
        ColorBrush, ColorGradientStop, GradientBrush, LinearGradientBrush, ShapeVisual,
        SpriteShape,
    };

    fn sprite(scene: &mut Scene, fill: ObjectId) -> ObjectId {
        scene.add_kind(ObjectKind::SpriteShape(SpriteShape {
            fill_brush: Some(fill),
            ..Default::default()
        }))
    }

    fn shape_root(scene: &mut Scene, shapes: Vec<ObjectId>) -> ObjectId {
        scene.add_kind(ObjectKind::ShapeVisual(ShapeVisual {
            shapes,
            ..Default::default()
        }))
    }

    #[test]
    fn equal_color_brushes_share_the_first_one() {
        let mut scene = Scene::new();
        let red = Color::argb(255, 255, 0, 0);
        let a = scene.add_kind(ObjectKind::ColorBrush(ColorBrush { color: Some(red) }));
        let b = scene.add_kind(ObjectKind::ColorBrush(ColorBrush { color: Some(red) }));
        let blue = scene.add_kind(ObjectKind::ColorBrush(ColorBrush {
            color: Some(Color::argb(255, 0, 0, 255)),
        }));
        let shapes = vec![sprite(&mut scene, a), sprite(&mut scene, b), sprite(&mut scene, blue)];
        let root = shape_root(&mut scene, shapes.clone());

        let rewritten = canonicalize_scene(&mut scene, root, false).unwrap();
        assert_eq!(rewritten, 1);
        let fills: Vec<_> = shapes
            .iter()
            .map(|s| match &scene.get(*s).unwrap().kind {
                ObjectKind::SpriteShape(s) => s.fill_brush.unwrap(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(fills, vec![a, a, blue]);
    }

    #[test]
    fn comments_block_sharing_unless_ignored() {
        let mut scene = Scene::new();
        let a = scene.add(
            CompositionObject::new(ObjectKind::ColorBrush(ColorBrush::default())).with_comment("fill 1"),
        );
        let b = scene.add_kind(ObjectKind::ColorBrush(ColorBrush::default()));
        let shapes = vec![sprite(&mut scene, a), sprite(&mut scene, b)];
        let root = shape_root(&mut scene, shapes);

        let mut graph = ObjectGraph::<()>::from_root(&scene, root).unwrap();
        assert_eq!(canonicalize(&mut graph, &scene, false).unwrap(), 0);

        let mut graph = ObjectGraph::<()>::from_root(&scene, root).unwrap();
        assert_eq!(canonicalize(&mut graph, &scene, true).unwrap(), 1);
        assert_eq!(graph.canonical(b), a);
        assert_eq!(graph.node(a).unwrap().folded, vec![a, b]);
    }

    #[test]
    fn animations_fold_through_their_easings() {
        let mut scene = Scene::new();
        let mut brushes = Vec::new();
        for _ in 0..2 {
            let easing = scene.add_kind(ObjectKind::LinearEasing);
            let mut animation = KeyFrameAnimation::new(ValueType::Color, Duration::from_secs(1));
            animation
                .insert_key_frame(0.0, AnimationValue::Color(Color::TRANSPARENT), Some(easing))
                .unwrap();
            let animation = scene.add_kind(ObjectKind::KeyFrameAnimation(animation));
            let mut brush = CompositionObject::new(ObjectKind::ColorBrush(ColorBrush::default()));
            brush.start_animation(names::COLOR, animation, None);
            brushes.push(scene.add(brush));
        }
        let shapes = vec![sprite(&mut scene, brushes[0]), sprite(&mut scene, brushes[1])];
        let root = shape_root(&mut scene, shapes);

        let mut graph = ObjectGraph::<()>::from_root(&scene, root).unwrap();
        // easing, animation and brush
        assert_eq!(canonicalize(&mut graph, &scene, false).unwrap(), 3);
        assert_eq!(graph.canonical(brushes[1]), brushes[0]);
    }

    #[test]
    fn theme_brushes_compare_self_references() {
        let mut scene = Scene::new();
        let mut brushes = Vec::new();
        for _ in 0..2 {
            let brush_id = ObjectId(scene.len() + 1);
            let expression = scene.add_kind(ObjectKind::ExpressionAnimation(
                ExpressionAnimation::new("_theme.Foreground").with_reference("_theme", brush_id),
            ));
            let mut brush = CompositionObject::new(ObjectKind::ColorBrush(ColorBrush::default()));
            brush
                .properties
                .insert("Foreground".into(), AnimationValue::Color(Color::argb(255, 1, 2, 3)));
            brush.start_animation(names::COLOR, expression, None);
            let id = scene.add(brush);
            assert_eq!(id, brush_id);
            brushes.push(id);
        }
        let shapes = vec![sprite(&mut scene, brushes[0]), sprite(&mut scene, brushes[1])];
        let root = shape_root(&mut scene, shapes);

        let mut graph = ObjectGraph::<()>::from_root(&scene, root).unwrap();
        canonicalize(&mut graph, &scene, false).unwrap();
        assert_eq!(graph.canonical(brushes[1]), brushes[0]);
    }

    #[test]
    fn equal_stops_stay_distinct_within_a_gradient() {
        let mut scene = Scene::new();
        let white = Some(Color::argb(255, 255, 255, 255));
        let mut stops = Vec::new();
        for _ in 0..4 {
            stops.push(scene.add_kind(ObjectKind::ColorGradientStop(ColorGradientStop {
                color: white,
                offset: 0.5,
            })));
        }
        let gradient = |color_stops: Vec<ObjectId>| {
            ObjectKind::LinearGradientBrush(LinearGradientBrush {
                gradient: GradientBrush {
                    color_stops,
                    ..Default::default()
                },
                ..Default::default()
            })
        };
        let first = scene.add_kind(gradient(vec![stops[0], stops[1]]));
        let second = scene.add_kind(gradient(vec![stops[2], stops[3]]));
        let shapes = vec![sprite(&mut scene, first), sprite(&mut scene, second)];
        let root = shape_root(&mut scene, shapes);

        let mut graph = ObjectGraph::<()>::from_root(&scene, root).unwrap();
        assert_eq!(canonicalize(&mut graph, &scene, false).unwrap(), 2);
        assert_eq!(graph.canonical(stops[2]), stops[0]);
        assert_eq!(graph.canonical(stops[3]), stops[1]);
    }
}
