use crate::animation::{AnimationValue, ExpressionAnimation, KeyFrameAnimation};
use glam::{Affine2, Mat4, Vec2, Vec3, Vec4};
use indexmap::IndexMap;
use kurbo::BezPath;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle of an object in a [`Scene`](crate::scene::Scene) arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub usize);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub a: u8,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::argb(0, 0, 0, 0);

    pub const fn argb(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self { a, r, g, b }
    }

    /// Channels as `(r, g, b, a)` in `0..=1`.
    pub fn to_vec4(self) -> Vec4 {
        Vec4::new(
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            self.a as f32 / 255.0,
        )
    }

    pub fn from_vec4(v: Vec4) -> Self {
        let channel = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self::argb(channel(v.w), channel(v.x), channel(v.y), channel(v.z))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StrokeCap {
    #[default]
    Flat,
    Square,
    Round,
    Triangle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StrokeLineJoin {
    #[default]
    Miter,
    Bevel,
    Round,
    MiterOrBevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GradientExtendMode {
    #[default]
    Clamp,
    Wrap,
    Mirror,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ColorSpace {
    Auto,
    #[default]
    Rgb,
    RgbLinear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MappingMode {
    Absolute,
    #[default]
    Relative,
}

/// Descriptive text with no effect on what is rendered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_description: Option<String>,
}

/// A running animation bound to one property of an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Animator {
    pub property: String,
    pub animation: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<ObjectId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Visual {
    pub children: Vec<ObjectId>,
    pub center_point: Option<Vec3>,
    pub clip: Option<ObjectId>,
    pub is_visible: Option<bool>,
    pub offset: Option<Vec3>,
    pub opacity: Option<f32>,
    pub rotation_angle_in_degrees: Option<f32>,
    pub rotation_axis: Option<Vec3>,
    pub scale: Option<Vec3>,
    pub size: Option<Vec2>,
    pub transform_matrix: Option<Mat4>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShapeVisual {
    #[serde(flatten)]
    pub visual: Visual,
    #[serde(default)]
    pub shapes: Vec<ObjectId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpriteVisual {
    #[serde(flatten)]
    pub visual: Visual,
    #[serde(default)]
    pub brush: Option<ObjectId>,
}

/// Transform properties shared by every shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Shape {
    pub center_point: Option<Vec2>,
    pub offset: Option<Vec2>,
    pub rotation_angle_in_degrees: Option<f32>,
    pub scale: Option<Vec2>,
    pub transform_matrix: Option<Affine2>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerShape {
    #[serde(flatten)]
    pub shape: Shape,
    #[serde(default)]
    pub shapes: Vec<ObjectId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpriteShape {
    #[serde(flatten)]
    pub shape: Shape,
    pub geometry: Option<ObjectId>,
    pub fill_brush: Option<ObjectId>,
    pub stroke_brush: Option<ObjectId>,
    pub stroke_thickness: Option<f32>,
    pub stroke_miter_limit: Option<f32>,
    pub stroke_dash_offset: Option<f32>,
    pub stroke_start_cap: Option<StrokeCap>,
    pub stroke_end_cap: Option<StrokeCap>,
    pub stroke_dash_cap: Option<StrokeCap>,
    pub stroke_line_join: Option<StrokeLineJoin>,
    pub is_stroke_non_scaling: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorBrush {
    pub color: Option<Color>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientBrush {
    pub color_stops: Vec<ObjectId>,
    pub anchor_point: Option<Vec2>,
    pub center_point: Option<Vec2>,
    pub extend_mode: Option<GradientExtendMode>,
    pub interpolation_space: Option<ColorSpace>,
    pub mapping_mode: Option<MappingMode>,
    pub offset: Option<Vec2>,
    pub rotation_angle_in_degrees: Option<f32>,
    pub scale: Option<Vec2>,
    pub transform_matrix: Option<Affine2>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearGradientBrush {
    #[serde(flatten)]
    pub gradient: GradientBrush,
    #[serde(default)]
    pub start_point: Option<Vec2>,
    #[serde(default)]
    pub end_point: Option<Vec2>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RadialGradientBrush {
    #[serde(flatten)]
    pub gradient: GradientBrush,
    #[serde(default)]
    pub ellipse_center: Option<Vec2>,
    #[serde(default)]
    pub ellipse_radius: Option<Vec2>,
    #[serde(default)]
    pub gradient_origin_offset: Option<Vec2>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColorGradientStop {
    #[serde(default)]
    pub color: Option<Color>,
    pub offset: f32,
}

/// Trim properties shared by every geometry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Geometry {
    pub trim_start: Option<f32>,
    pub trim_end: Option<f32>,
    pub trim_offset: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EllipseGeometry {
    #[serde(flatten)]
    pub geometry: Geometry,
    #[serde(default)]
    pub center: Option<Vec2>,
    #[serde(default)]
    pub radius: Option<Vec2>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RectangleGeometry {
    #[serde(flatten)]
    pub geometry: Geometry,
    #[serde(default)]
    pub offset: Option<Vec2>,
    #[serde(default)]
    pub size: Option<Vec2>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundedRectangleGeometry {
    #[serde(flatten)]
    pub geometry: Geometry,
    #[serde(default)]
    pub offset: Option<Vec2>,
    #[serde(default)]
    pub size: Option<Vec2>,
    #[serde(default)]
    pub corner_radius: Option<Vec2>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathGeometry {
    #[serde(flatten)]
    pub geometry: Geometry,
    #[serde(default)]
    pub path: Option<ObjectId>,
}

/// Path data, serialized as an SVG path string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Path {
    #[serde(with = "svg_path")]
    pub data: BezPath,
}

mod svg_path {
    use kurbo::BezPath;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(path: &BezPath, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&path.to_svg())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BezPath, D::Error> {
        let text = String::deserialize(deserializer)?;
        BezPath::from_svg(&text).map_err(serde::de::Error::custom)
    }
}

/// Clips to the bounds of the owning visual, shrunk by the insets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsetClip {
    pub left_inset: Option<f32>,
    pub top_inset: Option<f32>,
    pub right_inset: Option<f32>,
    pub bottom_inset: Option<f32>,
    pub center_point: Option<Vec2>,
    pub scale: Option<Vec2>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CubicBezierEasing {
    pub control_point1: Vec2,
    pub control_point2: Vec2,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepEasing {
    pub step_count: Option<i32>,
    pub initial_step: Option<i32>,
    pub final_step: Option<i32>,
    pub is_initial_step_single_frame: Option<bool>,
    pub is_final_step_single_frame: Option<bool>,
}

/// Drives the animations started through it. A custom controller is shared
/// by several animators; otherwise it belongs to one animator and is usually
/// paused with its `Progress` bound to an expression.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationController {
    pub is_paused: bool,
    pub is_custom: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ObjectKind {
    ContainerVisual(Visual),
    ShapeVisual(ShapeVisual),
    SpriteVisual(SpriteVisual),
    ContainerShape(ContainerShape),
    SpriteShape(SpriteShape),
    ColorBrush(ColorBrush),
    LinearGradientBrush(LinearGradientBrush),
    RadialGradientBrush(RadialGradientBrush),
    ColorGradientStop(ColorGradientStop),
    EllipseGeometry(EllipseGeometry),
    RectangleGeometry(RectangleGeometry),
    RoundedRectangleGeometry(RoundedRectangleGeometry),
    PathGeometry(PathGeometry),
    Path(Path),
    InsetClip(InsetClip),
    LinearEasing,
    CubicBezierEasing(CubicBezierEasing),
    StepEasing(StepEasing),
    KeyFrameAnimation(KeyFrameAnimation),
    ExpressionAnimation(ExpressionAnimation),
    AnimationController(AnimationController),
    PropertySet,
}

/// Coarse category of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeType {
    Visual,
    Shape,
    Brush,
    GradientStop,
    Geometry,
    Path,
    Clip,
    Easing,
    Animation,
    Controller,
    PropertySet,
}

impl ObjectKind {
    pub fn name(&self) -> &'static str {
        match self {
            ObjectKind::ContainerVisual(_) => "ContainerVisual",
            ObjectKind::ShapeVisual(_) => "ShapeVisual",
            ObjectKind::SpriteVisual(_) => "SpriteVisual",
            ObjectKind::ContainerShape(_) => "ContainerShape",
            ObjectKind::SpriteShape(_) => "SpriteShape",
            ObjectKind::ColorBrush(_) => "ColorBrush",
            ObjectKind::LinearGradientBrush(_) => "LinearGradientBrush",
            ObjectKind::RadialGradientBrush(_) => "RadialGradientBrush",
            ObjectKind::ColorGradientStop(_) => "ColorGradientStop",
            ObjectKind::EllipseGeometry(_) => "EllipseGeometry",
            ObjectKind::RectangleGeometry(_) => "RectangleGeometry",
            ObjectKind::RoundedRectangleGeometry(_) => "RoundedRectangleGeometry",
            ObjectKind::PathGeometry(_) => "PathGeometry",
            ObjectKind::Path(_) => "Path",
            ObjectKind::InsetClip(_) => "InsetClip",
            ObjectKind::LinearEasing => "LinearEasing",
            ObjectKind::CubicBezierEasing(_) => "CubicBezierEasing",
            ObjectKind::StepEasing(_) => "StepEasing",
            ObjectKind::KeyFrameAnimation(_) => "KeyFrameAnimation",
            ObjectKind::ExpressionAnimation(_) => "ExpressionAnimation",
            ObjectKind::AnimationController(_) => "AnimationController",
            ObjectKind::PropertySet => "PropertySet",
        }
    }

    pub fn node_type(&self) -> NodeType {
        match self {
            ObjectKind::ContainerVisual(_)
            | ObjectKind::ShapeVisual(_)
            | ObjectKind::SpriteVisual(_) => NodeType::Visual,
            ObjectKind::ContainerShape(_) | ObjectKind::SpriteShape(_) => NodeType::Shape,
            ObjectKind::ColorBrush(_)
            | ObjectKind::LinearGradientBrush(_)
            | ObjectKind::RadialGradientBrush(_) => NodeType::Brush,
            ObjectKind::ColorGradientStop(_) => NodeType::GradientStop,
            ObjectKind::EllipseGeometry(_)
            | ObjectKind::RectangleGeometry(_)
            | ObjectKind::RoundedRectangleGeometry(_)
            | ObjectKind::PathGeometry(_) => NodeType::Geometry,
            ObjectKind::Path(_) => NodeType::Path,
            ObjectKind::InsetClip(_) => NodeType::Clip,
            ObjectKind::LinearEasing
            | ObjectKind::CubicBezierEasing(_)
            | ObjectKind::StepEasing(_) => NodeType::Easing,
            ObjectKind::KeyFrameAnimation(_) | ObjectKind::ExpressionAnimation(_) => {
                NodeType::Animation
            }
            ObjectKind::AnimationController(_) => NodeType::Controller,
            ObjectKind::PropertySet => NodeType::PropertySet,
        }
    }
}

/// A node of the scene: its typed properties plus the animators, named
/// property-set values and metadata every object can carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionObject {
    #[serde(flatten)]
    pub kind: ObjectKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub animators: Vec<Animator>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, AnimationValue>,
    #[serde(default)]
    pub meta: Metadata,
}

impl CompositionObject {
    pub fn new(kind: ObjectKind) -> Self {
        Self {
            kind,
            animators: Vec::new(),
            properties: IndexMap::new(),
            meta: Metadata::default(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.meta.name = Some(name.into());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.meta.comment = Some(comment.into());
        self
    }

    pub fn animator(&self, property: &str) -> Option<&Animator> {
        self.animators.iter().find(|a| a.property == property)
    }

    pub fn is_animated(&self, property: &str) -> bool {
        self.animator(property).is_some()
    }

    /// Binds `animation` to `property`, replacing any animator already there.
    pub fn start_animation(
        &mut self,
        property: impl Into<String>,
        animation: ObjectId,
        controller: Option<ObjectId>,
    ) {
        let property = property.into();
        self.stop_animation(&property);
        self.animators.push(Animator {
            property,
            animation,
            controller,
        });
    }

    pub fn stop_animation(&mut self, property: &str) -> bool {
        let before = self.animators.len();
        self.animators.retain(|a| a.property != property);
        self.animators.len() != before
    }

    pub fn visual(&self) -> Option<&Visual> {
        match &self.kind {
            ObjectKind::ContainerVisual(v) => Some(v),
            ObjectKind::ShapeVisual(v) => Some(&v.visual),
            ObjectKind::SpriteVisual(v) => Some(&v.visual),
            _ => None,
        }
    }

    pub fn visual_mut(&mut self) -> Option<&mut Visual> {
        match &mut self.kind {
            ObjectKind::ContainerVisual(v) => Some(v),
            ObjectKind::ShapeVisual(v) => Some(&mut v.visual),
            ObjectKind::SpriteVisual(v) => Some(&mut v.visual),
            _ => None,
        }
    }

    pub fn shape(&self) -> Option<&Shape> {
        match &self.kind {
            ObjectKind::ContainerShape(s) => Some(&s.shape),
            ObjectKind::SpriteShape(s) => Some(&s.shape),
            _ => None,
        }
    }

    pub fn shape_mut(&mut self) -> Option<&mut Shape> {
        match &mut self.kind {
            ObjectKind::ContainerShape(s) => Some(&mut s.shape),
            ObjectKind::SpriteShape(s) => Some(&mut s.shape),
            _ => None,
        }
    }

    /// The shape list of a container shape or shape visual.
    pub fn shapes(&self) -> Option<&Vec<ObjectId>> {
        match &self.kind {
            ObjectKind::ContainerShape(s) => Some(&s.shapes),
            ObjectKind::ShapeVisual(v) => Some(&v.shapes),
            _ => None,
        }
    }

    pub fn shapes_mut(&mut self) -> Option<&mut Vec<ObjectId>> {
        match &mut self.kind {
            ObjectKind::ContainerShape(s) => Some(&mut s.shapes),
            ObjectKind::ShapeVisual(v) => Some(&mut v.shapes),
            _ => None,
        }
    }

    pub fn gradient(&self) -> Option<&GradientBrush> {
        match &self.kind {
            ObjectKind::LinearGradientBrush(b) => Some(&b.gradient),
            ObjectKind::RadialGradientBrush(b) => Some(&b.gradient),
            _ => None,
        }
    }

    /// Objects this one owns in the tree: visual children and shapes.
    pub fn structural_children(&self) -> Vec<ObjectId> {
        let mut out = Vec::new();
        if let Some(shapes) = self.shapes() {
            out.extend_from_slice(shapes);
        }
        if let Some(visual) = self.visual() {
            out.extend_from_slice(&visual.children);
        }
        out
    }

    /// Every object referenced from this one, in traversal order.
    pub fn references(&self) -> Vec<ObjectId> {
        let mut out: Vec<ObjectId> = match &self.kind {
            ObjectKind::ContainerVisual(v) => visual_refs(v).copied().collect(),
            ObjectKind::ShapeVisual(v) => visual_refs(&v.visual)
                .chain(v.shapes.iter())
                .copied()
                .collect(),
            ObjectKind::SpriteVisual(v) => visual_refs(&v.visual)
                .chain(v.brush.iter())
                .copied()
                .collect(),
            ObjectKind::ContainerShape(s) => s.shapes.clone(),
            ObjectKind::SpriteShape(s) => s
                .geometry
                .iter()
                .chain(s.fill_brush.iter())
                .chain(s.stroke_brush.iter())
                .copied()
                .collect(),
            ObjectKind::LinearGradientBrush(b) => b.gradient.color_stops.clone(),
            ObjectKind::RadialGradientBrush(b) => b.gradient.color_stops.clone(),
            ObjectKind::PathGeometry(g) => g.path.iter().copied().collect(),
            ObjectKind::KeyFrameAnimation(a) => a
                .key_frames()
                .iter()
                .flat_map(|kf| {
                    let path = match &kf.value {
                        crate::animation::KeyFrameValue::Value(AnimationValue::Path(p)) => Some(*p),
                        _ => None,
                    };
                    path.into_iter().chain(kf.easing)
                })
                .collect(),
            ObjectKind::ExpressionAnimation(a) => {
                a.reference_parameters.values().copied().collect()
            }
            ObjectKind::ColorBrush(_)
            | ObjectKind::ColorGradientStop(_)
            | ObjectKind::EllipseGeometry(_)
            | ObjectKind::RectangleGeometry(_)
            | ObjectKind::RoundedRectangleGeometry(_)
            | ObjectKind::Path(_)
            | ObjectKind::InsetClip(_)
            | ObjectKind::LinearEasing
            | ObjectKind::CubicBezierEasing(_)
            | ObjectKind::StepEasing(_)
            | ObjectKind::AnimationController(_)
            | ObjectKind::PropertySet => Vec::new(),
        };
        for animator in &self.animators {
            out.push(animator.animation);
            out.extend(animator.controller);
        }
        out
    }

    /// Mutable access to every reference, in the same order as [`references`](Self::references).
    pub fn references_mut(&mut self) -> Vec<&mut ObjectId> {
        let mut out: Vec<&mut ObjectId> = Vec::new();
        match &mut self.kind {
            ObjectKind::ContainerVisual(v) => visual_refs_mut(v, &mut out),
            ObjectKind::ShapeVisual(v) => {
                visual_refs_mut(&mut v.visual, &mut out);
                out.extend(v.shapes.iter_mut());
            }
            ObjectKind::SpriteVisual(v) => {
                visual_refs_mut(&mut v.visual, &mut out);
                out.extend(v.brush.as_mut());
            }
            ObjectKind::ContainerShape(s) => out.extend(s.shapes.iter_mut()),
            ObjectKind::SpriteShape(s) => {
                out.extend(s.geometry.as_mut());
                out.extend(s.fill_brush.as_mut());
                out.extend(s.stroke_brush.as_mut());
            }
            ObjectKind::LinearGradientBrush(b) => out.extend(b.gradient.color_stops.iter_mut()),
            ObjectKind::RadialGradientBrush(b) => out.extend(b.gradient.color_stops.iter_mut()),
            ObjectKind::PathGeometry(g) => out.extend(g.path.as_mut()),
            ObjectKind::KeyFrameAnimation(a) => out.extend(a.references_mut()),
            ObjectKind::ExpressionAnimation(a) => out.extend(a.reference_parameters.values_mut()),
            ObjectKind::ColorBrush(_)
            | ObjectKind::ColorGradientStop(_)
            | ObjectKind::EllipseGeometry(_)
            | ObjectKind::RectangleGeometry(_)
            | ObjectKind::RoundedRectangleGeometry(_)
            | ObjectKind::Path(_)
            | ObjectKind::InsetClip(_)
            | ObjectKind::LinearEasing
            | ObjectKind::CubicBezierEasing(_)
            | ObjectKind::StepEasing(_)
            | ObjectKind::AnimationController(_)
            | ObjectKind::PropertySet => {}
        }
        for animator in &mut self.animators {
            out.push(&mut animator.animation);
            out.extend(animator.controller.as_mut());
        }
        out
    }
}

fn visual_refs(visual: &Visual) -> impl Iterator<Item = &ObjectId> {
    visual.clip.iter().chain(visual.children.iter())
}

fn visual_refs_mut<'a>(visual: &'a mut Visual, out: &mut Vec<&'a mut ObjectId>) {
    out.extend(visual.clip.as_mut());
    out.extend(visual.children.iter_mut());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_and_mutable_references_agree() {
        let mut sprite = CompositionObject::new(ObjectKind::SpriteShape(SpriteShape {
            geometry: Some(ObjectId(3)),
            fill_brush: Some(ObjectId(4)),
            ..Default::default()
        }));
        sprite.start_animation("Offset", ObjectId(5), Some(ObjectId(6)));

        let expected = vec![ObjectId(3), ObjectId(4), ObjectId(5), ObjectId(6)];
        assert_eq!(sprite.references(), expected);

        for r in sprite.references_mut() {
            r.0 += 10;
        }
        assert_eq!(
            sprite.references(),
            vec![ObjectId(13), ObjectId(14), ObjectId(15), ObjectId(16)]
        );
    }

    #[test]
    fn start_animation_replaces_existing_animator() {
        let mut visual = CompositionObject::new(ObjectKind::ContainerVisual(Visual::default()));
        visual.start_animation("Opacity", ObjectId(1), None);
        visual.start_animation("Opacity", ObjectId(2), None);
        assert_eq!(visual.animators.len(), 1);
        assert_eq!(visual.animator("Opacity").map(|a| a.animation), Some(ObjectId(2)));
        assert!(visual.stop_animation("Opacity"));
        assert!(!visual.is_animated("Opacity"));
    }

    #[test]
    fn objects_round_trip_through_json() {
        let path = CompositionObject::new(ObjectKind::Path(Path {
            data: BezPath::from_svg("M0 0L10 0L10 10Z").unwrap(),
        }))
        .with_name("triangle");
        let json = serde_json::to_value(&path).unwrap();
        assert_eq!(json["type"], "Path");
        let back: CompositionObject = serde_json::from_value(json).unwrap();
        assert_eq!(back, path);
    }

    #[test]
    fn color_channels_survive_vec4() {
        let color = Color::argb(128, 255, 64, 0);
        assert_eq!(Color::from_vec4(color.to_vec4()), color);
    }
}
