//! Samples what a scene draws at a given animation progress.
//!
//! The optimizing passes must not change what is drawn, so the same scene
//! before and after a pass renders to the same list of [`RenderedShape`]s.
//! Clips are not sampled, and expression animations are reported as
//! [`SceneError::Unsupported`].

use crate::animation::{AnimationValue, KeyFrameAnimation, KeyFrameValue};
use crate::error::{SceneError, SceneResult};
use crate::object::{
    Color, CompositionObject, CubicBezierEasing, GradientBrush, ObjectId, ObjectKind, Shape,
    StepEasing,
};
use crate::properties::{affine_to_mat4, names, shape_transform, visual_transform};
use crate::scene::Scene;
use glam::{Affine2, Mat4, Vec2, Vec3};

/// Values that can come out of an animation.
trait Sampled: Sized {
    fn into_value(self) -> AnimationValue;
    fn from_value(value: AnimationValue) -> Option<Self>;
}

macro_rules! sampled {
    ($ty:ty, $variant:ident) => {
        impl Sampled for $ty {
            fn into_value(self) -> AnimationValue {
                AnimationValue::$variant(self)
            }

            fn from_value(value: AnimationValue) -> Option<Self> {
                match value {
                    AnimationValue::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

sampled!(bool, Boolean);
sampled!(f32, Scalar);
sampled!(Vec2, Vector2);
sampled!(Vec3, Vector3);
sampled!(Color, Color);
sampled!(ObjectId, Path);

#[derive(Debug, Clone, PartialEq)]
pub enum GeometrySample {
    Ellipse { center: Vec2, radius: Vec2 },
    Rectangle { offset: Vec2, size: Vec2 },
    RoundedRectangle { offset: Vec2, size: Vec2, corner_radius: Vec2 },
    /// SVG path data.
    Path(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimSample {
    pub start: f32,
    pub end: f32,
    pub offset: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BrushSample {
    Color(Color),
    LinearGradient {
        stops: Vec<(f32, Color)>,
        start: Vec2,
        end: Vec2,
        transform: Affine2,
    },
    RadialGradient {
        stops: Vec<(f32, Color)>,
        center: Vec2,
        radius: Vec2,
        origin_offset: Vec2,
        transform: Affine2,
    },
}

/// One visible primitive, in paint order.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedShape {
    pub transform: Mat4,
    pub opacity: f32,
    pub geometry: GeometrySample,
    pub trim: TrimSample,
    pub fill: Option<BrushSample>,
    pub stroke: Option<BrushSample>,
    pub stroke_thickness: f32,
}

fn close(a: f32, b: f32, epsilon: f32) -> bool {
    (a - b).abs() <= epsilon
}

fn close2(a: Vec2, b: Vec2, epsilon: f32) -> bool {
    a.abs_diff_eq(b, epsilon)
}

fn stops_close(a: &[(f32, Color)], b: &[(f32, Color)], epsilon: f32) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|((ao, ac), (bo, bc))| close(*ao, *bo, epsilon) && ac == bc)
}

impl GeometrySample {
    pub fn approx_eq(&self, other: &Self, epsilon: f32) -> bool {
        match (self, other) {
            (
                GeometrySample::Ellipse { center: ac, radius: ar },
                GeometrySample::Ellipse { center: bc, radius: br },
            ) => close2(*ac, *bc, epsilon) && close2(*ar, *br, epsilon),
            (
                GeometrySample::Rectangle { offset: ao, size: asz },
                GeometrySample::Rectangle { offset: bo, size: bsz },
            ) => close2(*ao, *bo, epsilon) && close2(*asz, *bsz, epsilon),
            (
                GeometrySample::RoundedRectangle { offset: ao, size: asz, corner_radius: ar },
                GeometrySample::RoundedRectangle { offset: bo, size: bsz, corner_radius: br },
            ) => close2(*ao, *bo, epsilon) && close2(*asz, *bsz, epsilon) && close2(*ar, *br, epsilon),
            (GeometrySample::Path(a), GeometrySample::Path(b)) => a == b,
            _ => false,
        }
    }
}

impl BrushSample {
    pub fn approx_eq(&self, other: &Self, epsilon: f32) -> bool {
        match (self, other) {
            (BrushSample::Color(a), BrushSample::Color(b)) => a == b,
            (
                BrushSample::LinearGradient { stops: a_stops, start: a_start, end: a_end, transform: a_t },
                BrushSample::LinearGradient { stops: b_stops, start: b_start, end: b_end, transform: b_t },
            ) => {
                stops_close(a_stops, b_stops, epsilon)
                    && close2(*a_start, *b_start, epsilon)
                    && close2(*a_end, *b_end, epsilon)
                    && a_t.abs_diff_eq(*b_t, epsilon)
            }
            (
                BrushSample::RadialGradient {
                    stops: a_stops,
                    center: a_center,
                    radius: a_radius,
                    origin_offset: a_origin,
                    transform: a_t,
                },
                BrushSample::RadialGradient {
                    stops: b_stops,
                    center: b_center,
                    radius: b_radius,
                    origin_offset: b_origin,
                    transform: b_t,
                },
            ) => {
                stops_close(a_stops, b_stops, epsilon)
                    && close2(*a_center, *b_center, epsilon)
                    && close2(*a_radius, *b_radius, epsilon)
                    && close2(*a_origin, *b_origin, epsilon)
                    && a_t.abs_diff_eq(*b_t, epsilon)
            }
            _ => false,
        }
    }
}

fn brushes_close(a: &Option<BrushSample>, b: &Option<BrushSample>, epsilon: f32) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.approx_eq(b, epsilon),
        _ => false,
    }
}

impl RenderedShape {
    pub fn approx_eq(&self, other: &Self, epsilon: f32) -> bool {
        self.transform.abs_diff_eq(other.transform, epsilon)
            && close(self.opacity, other.opacity, epsilon)
            && self.geometry.approx_eq(&other.geometry, epsilon)
            && close(self.trim.start, other.trim.start, epsilon)
            && close(self.trim.end, other.trim.end, epsilon)
            && close(self.trim.offset, other.trim.offset, epsilon)
            && brushes_close(&self.fill, &other.fill, epsilon)
            && brushes_close(&self.stroke, &other.stroke, epsilon)
            && close(self.stroke_thickness, other.stroke_thickness, epsilon)
    }
}

/// Whether two renderings draw the same primitives in the same order.
pub fn frames_match(a: &[RenderedShape], b: &[RenderedShape], epsilon: f32) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(a, b)| a.approx_eq(b, epsilon))
}

/// Renders the tree under `root` at `progress` in `[0, 1]`.
pub fn render(scene: &Scene, root: ObjectId, progress: f32) -> SceneResult<Vec<RenderedShape>> {
    Evaluator { scene, progress }.render(root)
}

struct Evaluator<'a> {
    scene: &'a Scene,
    progress: f32,
}

/// Solves a cubic bezier easing curve for `x` by bisection and returns `y`.
fn cubic_bezier(easing: &CubicBezierEasing, x: f32) -> f32 {
    let bezier = |a: f32, b: f32, s: f32| {
        let inv = 1.0 - s;
        3.0 * inv * inv * s * a + 3.0 * inv * s * s * b + s * s * s
    };
    let (p1, p2) = (easing.control_point1, easing.control_point2);
    let (mut lo, mut hi) = (0.0f32, 1.0f32);
    for _ in 0..40 {
        let mid = 0.5 * (lo + hi);
        if bezier(p1.x, p2.x, mid) < x {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    bezier(p1.y, p2.y, 0.5 * (lo + hi))
}

fn step(easing: &StepEasing, t: f32) -> f32 {
    let count = easing.step_count.unwrap_or(1).max(1);
    let initial = easing.initial_step.unwrap_or(0);
    let last = easing.final_step.unwrap_or(count);
    let current = if t >= 1.0 {
        last
    } else {
        ((t * count as f32).floor() as i32).clamp(initial, last)
    };
    current as f32 / count as f32
}

/// Determinant of the xy-plane part of a transform.
fn area_scale(m: &Mat4) -> f32 {
    m.x_axis.x * m.y_axis.y - m.x_axis.y * m.y_axis.x
}

impl Evaluator<'_> {
    fn ease(&self, easing: Option<ObjectId>, t: f32) -> SceneResult<f32> {
        let Some(easing) = easing else {
            return Ok(t);
        };
        Ok(match &self.scene.get(easing)?.kind {
            ObjectKind::LinearEasing => t,
            ObjectKind::CubicBezierEasing(e) => cubic_bezier(e, t),
            ObjectKind::StepEasing(e) => step(e, t),
            other => {
                return Err(SceneError::invariant(format!(
                    "{easing} is a {} used as an easing",
                    other.name()
                )))
            }
        })
    }

    /// Progress seen by animations started through `controller`.
    fn local_progress(&self, controller: Option<ObjectId>) -> SceneResult<f32> {
        let Some(id) = controller else {
            return Ok(self.progress);
        };
        let controller = self.scene.get(id)?;
        if !controller.is_animated(names::PROGRESS) {
            return Ok(self.progress);
        }
        self.sample(controller, names::PROGRESS, self.progress)
    }

    fn sample_key_frames(
        &self,
        animation: &KeyFrameAnimation,
        progress: f32,
        static_value: AnimationValue,
    ) -> SceneResult<AnimationValue> {
        let key_frames = animation.key_frames();
        let value_of = |index: usize| match &key_frames[index].value {
            KeyFrameValue::Value(value) => Ok(value.clone()),
            KeyFrameValue::Expression(text) => Err(SceneError::unsupported(format!(
                "expression key frame {text:?}"
            ))),
        };
        let Some(index) = key_frames.iter().rposition(|kf| kf.progress <= progress) else {
            return Ok(static_value);
        };
        let Some(next) = key_frames.get(index + 1) else {
            return value_of(index);
        };
        let from = &key_frames[index];
        let span = next.progress - from.progress;
        let t = if span > 0.0 { (progress - from.progress) / span } else { 1.0 };
        let eased = self.ease(next.easing, t)?;
        value_of(index)?.lerp(&value_of(index + 1)?, eased)
    }

    /// Value of `property` on `object`, falling back to `static_value` when
    /// the property is not animated.
    fn sample<T: Sampled>(&self, object: &CompositionObject, property: &str, static_value: T) -> SceneResult<T> {
        let Some(animator) = object.animator(property) else {
            return Ok(static_value);
        };
        let progress = self.local_progress(animator.controller)?;
        let value = match &self.scene.get(animator.animation)?.kind {
            ObjectKind::KeyFrameAnimation(animation) => {
                self.sample_key_frames(animation, progress, static_value.into_value())?
            }
            ObjectKind::ExpressionAnimation(e) => {
                return Err(SceneError::unsupported(format!(
                    "expression animation {:?} on {property}",
                    e.expression
                )))
            }
            other => {
                return Err(SceneError::invariant(format!(
                    "{property} is animated by a {}",
                    other.name()
                )))
            }
        };
        T::from_value(value)
            .ok_or_else(|| SceneError::invariant(format!("{property} animated with the wrong value type")))
    }

    fn matrix_is_static(&self, object: &CompositionObject) -> SceneResult<()> {
        if object.is_animated(names::TRANSFORM_MATRIX) {
            return Err(SceneError::unsupported("animated transform matrix"));
        }
        Ok(())
    }

    fn shape_matrix(&self, object: &CompositionObject, shape: &Shape) -> SceneResult<Mat4> {
        self.matrix_is_static(object)?;
        let transform = shape_transform(
            self.sample(object, names::CENTER_POINT, shape.center_point.unwrap_or(Vec2::ZERO))?,
            self.sample(object, names::SCALE, shape.scale.unwrap_or(Vec2::ONE))?,
            self.sample(object, names::ROTATION_ANGLE_IN_DEGREES, shape.rotation_angle_in_degrees.unwrap_or(0.0))?,
            self.sample(object, names::OFFSET, shape.offset.unwrap_or(Vec2::ZERO))?,
            shape.transform_matrix.unwrap_or(Affine2::IDENTITY),
        );
        Ok(affine_to_mat4(transform))
    }

    fn render(&self, root: ObjectId) -> SceneResult<Vec<RenderedShape>> {
        let mut out = Vec::new();
        let mut stack = vec![(root, Mat4::IDENTITY, 1.0f32)];
        while let Some((id, parent_transform, parent_opacity)) = stack.pop() {
            let object = self.scene.get(id)?;
            let Some(visual) = object.visual() else {
                return Err(SceneError::invariant(format!("{id} is not a visual")));
            };
            if !self.sample(object, names::IS_VISIBLE, visual.is_visible.unwrap_or(true))? {
                continue;
            }
            self.matrix_is_static(object)?;
            let transform = parent_transform
                * visual_transform(
                    self.sample(object, names::CENTER_POINT, visual.center_point.unwrap_or(Vec3::ZERO))?,
                    self.sample(object, names::SCALE, visual.scale.unwrap_or(Vec3::ONE))?,
                    self.sample(
                        object,
                        names::ROTATION_ANGLE_IN_DEGREES,
                        visual.rotation_angle_in_degrees.unwrap_or(0.0),
                    )?,
                    self.sample(object, names::ROTATION_AXIS, visual.rotation_axis.unwrap_or(Vec3::Z))?,
                    self.sample(object, names::OFFSET, visual.offset.unwrap_or(Vec3::ZERO))?,
                    visual.transform_matrix.unwrap_or(Mat4::IDENTITY),
                );
            let opacity = parent_opacity * self.sample(object, names::OPACITY, visual.opacity.unwrap_or(1.0))?;

            match &object.kind {
                ObjectKind::ShapeVisual(shape_visual) => {
                    self.render_shapes(&shape_visual.shapes, transform, opacity, &mut out)?;
                }
                ObjectKind::SpriteVisual(sprite) => {
                    let size = self.sample(object, names::SIZE, visual.size.unwrap_or(Vec2::ZERO))?;
                    let fill = sprite.brush.map(|b| self.brush(b)).transpose()?.flatten();
                    if fill.is_some() && area_scale(&transform) != 0.0 && size != Vec2::ZERO {
                        out.push(RenderedShape {
                            transform,
                            opacity,
                            geometry: GeometrySample::Rectangle {
                                offset: Vec2::ZERO,
                                size,
                            },
                            trim: TrimSample {
                                start: 0.0,
                                end: 1.0,
                                offset: 0.0,
                            },
                            fill,
                            stroke: None,
                            stroke_thickness: 0.0,
                        });
                    }
                }
                _ => {}
            }
            for &child in visual.children.iter().rev() {
                stack.push((child, transform, opacity));
            }
        }
        Ok(out)
    }

    fn render_shapes(
        &self,
        shapes: &[ObjectId],
        transform: Mat4,
        opacity: f32,
        out: &mut Vec<RenderedShape>,
    ) -> SceneResult<()> {
        let mut stack: Vec<(ObjectId, Mat4)> = shapes.iter().rev().map(|&s| (s, transform)).collect();
        while let Some((id, parent_transform)) = stack.pop() {
            let object = self.scene.get(id)?;
            match &object.kind {
                ObjectKind::ContainerShape(container) => {
                    let transform = parent_transform * self.shape_matrix(object, &container.shape)?;
                    stack.extend(container.shapes.iter().rev().map(|&s| (s, transform)));
                }
                ObjectKind::SpriteShape(sprite) => {
                    let transform = parent_transform * self.shape_matrix(object, &sprite.shape)?;
                    if area_scale(&transform) == 0.0 {
                        continue;
                    }
                    let Some((geometry, trim)) = sprite.geometry.map(|g| self.geometry(g)).transpose()?.flatten()
                    else {
                        continue;
                    };
                    let fill = sprite.fill_brush.map(|b| self.brush(b)).transpose()?.flatten();
                    let stroke = sprite.stroke_brush.map(|b| self.brush(b)).transpose()?.flatten();
                    if fill.is_none() && stroke.is_none() {
                        continue;
                    }
                    let stroke_thickness =
                        self.sample(object, names::STROKE_THICKNESS, sprite.stroke_thickness.unwrap_or(1.0))?;
                    out.push(RenderedShape {
                        transform,
                        opacity,
                        geometry,
                        trim,
                        fill,
                        stroke,
                        stroke_thickness,
                    });
                }
                other => {
                    return Err(SceneError::invariant(format!(
                        "{id} is a {} inside a shape tree",
                        other.name()
                    )))
                }
            }
        }
        Ok(())
    }

    /// `None` when the trims leave nothing to draw.
    fn geometry(&self, id: ObjectId) -> SceneResult<Option<(GeometrySample, TrimSample)>> {
        let object = self.scene.get(id)?;
        let (geometry, trims) = match &object.kind {
            ObjectKind::EllipseGeometry(e) => (
                GeometrySample::Ellipse {
                    center: self.sample(object, names::CENTER, e.center.unwrap_or(Vec2::ZERO))?,
                    radius: self.sample(object, names::RADIUS, e.radius.unwrap_or(Vec2::ZERO))?,
                },
                &e.geometry,
            ),
            ObjectKind::RectangleGeometry(r) => (
                GeometrySample::Rectangle {
                    offset: self.sample(object, names::OFFSET, r.offset.unwrap_or(Vec2::ZERO))?,
                    size: self.sample(object, names::SIZE, r.size.unwrap_or(Vec2::ZERO))?,
                },
                &r.geometry,
            ),
            ObjectKind::RoundedRectangleGeometry(r) => (
                GeometrySample::RoundedRectangle {
                    offset: self.sample(object, names::OFFSET, r.offset.unwrap_or(Vec2::ZERO))?,
                    size: self.sample(object, names::SIZE, r.size.unwrap_or(Vec2::ZERO))?,
                    corner_radius: self.sample(object, names::CORNER_RADIUS, r.corner_radius.unwrap_or(Vec2::ZERO))?,
                },
                &r.geometry,
            ),
            ObjectKind::PathGeometry(p) => {
                let path = match p.path {
                    Some(path) => Some(self.sample(object, names::PATH, path)?),
                    None if object.is_animated(names::PATH) => {
                        return Err(SceneError::unsupported("path animated from no static path"))
                    }
                    None => None,
                };
                let data = match path {
                    Some(path) => match &self.scene.get(path)?.kind {
                        ObjectKind::Path(path) => path.data.to_svg(),
                        other => {
                            return Err(SceneError::invariant(format!(
                                "{path} is a {} used as a path",
                                other.name()
                            )))
                        }
                    },
                    None => String::new(),
                };
                (GeometrySample::Path(data), &p.geometry)
            }
            other => {
                return Err(SceneError::invariant(format!(
                    "{id} is a {} used as a geometry",
                    other.name()
                )))
            }
        };
        let trim = TrimSample {
            start: self.sample(object, names::TRIM_START, trims.trim_start.unwrap_or(0.0))?,
            end: self.sample(object, names::TRIM_END, trims.trim_end.unwrap_or(1.0))?,
            offset: self.sample(object, names::TRIM_OFFSET, trims.trim_offset.unwrap_or(0.0))?,
        };
        if trim.start == trim.end {
            return Ok(None);
        }
        Ok(Some((geometry, trim)))
    }

    fn gradient_stops(&self, gradient: &GradientBrush) -> SceneResult<Vec<(f32, Color)>> {
        let mut stops = Vec::with_capacity(gradient.color_stops.len());
        for &id in &gradient.color_stops {
            let object = self.scene.get(id)?;
            let ObjectKind::ColorGradientStop(stop) = &object.kind else {
                return Err(SceneError::invariant(format!("{id} is not a gradient stop")));
            };
            stops.push((
                self.sample(object, names::OFFSET, stop.offset)?,
                self.sample(object, names::COLOR, stop.color.unwrap_or(Color::TRANSPARENT))?,
            ));
        }
        Ok(stops)
    }

    fn gradient_transform(&self, object: &CompositionObject, gradient: &GradientBrush) -> SceneResult<Affine2> {
        self.matrix_is_static(object)?;
        Ok(shape_transform(
            self.sample(object, names::CENTER_POINT, gradient.center_point.unwrap_or(Vec2::ZERO))?,
            self.sample(object, names::SCALE, gradient.scale.unwrap_or(Vec2::ONE))?,
            self.sample(
                object,
                names::ROTATION_ANGLE_IN_DEGREES,
                gradient.rotation_angle_in_degrees.unwrap_or(0.0),
            )?,
            self.sample(object, names::OFFSET, gradient.offset.unwrap_or(Vec2::ZERO))?,
            gradient.transform_matrix.unwrap_or(Affine2::IDENTITY),
        ))
    }

    /// `None` for a brush that draws nothing.
    fn brush(&self, id: ObjectId) -> SceneResult<Option<BrushSample>> {
        let object = self.scene.get(id)?;
        let brush = match &object.kind {
            ObjectKind::ColorBrush(brush) => {
                let color = self.sample(object, names::COLOR, brush.color.unwrap_or(Color::TRANSPARENT))?;
                if color.a == 0 {
                    return Ok(None);
                }
                BrushSample::Color(color)
            }
            ObjectKind::LinearGradientBrush(brush) => BrushSample::LinearGradient {
                stops: self.gradient_stops(&brush.gradient)?,
                start: self.sample(object, names::START_POINT, brush.start_point.unwrap_or(Vec2::ZERO))?,
                end: self.sample(object, names::END_POINT, brush.end_point.unwrap_or(Vec2::X))?,
                transform: self.gradient_transform(object, &brush.gradient)?,
            },
            ObjectKind::RadialGradientBrush(brush) => BrushSample::RadialGradient {
                stops: self.gradient_stops(&brush.gradient)?,
                center: self.sample(object, names::ELLIPSE_CENTER, brush.ellipse_center.unwrap_or(Vec2::splat(0.5)))?,
                radius: self.sample(object, names::ELLIPSE_RADIUS, brush.ellipse_radius.unwrap_or(Vec2::splat(0.5)))?,
                origin_offset: brush.gradient_origin_offset.unwrap_or(Vec2::ZERO),
                transform: self.gradient_transform(object, &brush.gradient)?,
            },
            other => {
                return Err(SceneError::invariant(format!(
                    "{id} is a {} used as a brush",
                    other.name()
                )))
            }
        };
        Ok(Some(brush))
    }
}
