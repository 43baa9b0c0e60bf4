use glam::Vec2;
use lottie_data::model::{
    BezierPath, BezierTangent, Keyframe, Property, Value, Vec3DefaultZero, Vec3Scale,
};

pub trait Interpolatable: Sized + Clone + PartialEq {
    fn lerp(&self, other: &Self, t: f32) -> Self;

    fn lerp_spatial(
        &self,
        other: &Self,
        t: f32,
        _tan_in: Option<&[f32]>,
        _tan_out: Option<&[f32]>,
    ) -> Self {
        self.lerp(other, t)
    }
}

impl Interpolatable for f32 {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

fn tangent2(tangent: Option<&[f32]>) -> Vec2 {
    match tangent {
        Some(t) if t.len() >= 2 => Vec2::new(t[0], t[1]),
        _ => Vec2::ZERO,
    }
}

fn cubic_point(p0: Vec2, p1: Vec2, p2: Vec2, p3: Vec2, t: f32) -> Vec2 {
    let one_minus_t = 1.0 - t;
    let one_minus_t_sq = one_minus_t * one_minus_t;
    let t_sq = t * t;

    p0 * one_minus_t_sq * one_minus_t
        + p1 * 3.0 * one_minus_t_sq * t
        + p2 * 3.0 * one_minus_t * t_sq
        + p3 * t_sq * t
}

impl Interpolatable for [f32; 2] {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        Vec2::from(*self).lerp(Vec2::from(*other), t).to_array()
    }

    fn lerp_spatial(
        &self,
        other: &Self,
        t: f32,
        tan_in: Option<&[f32]>,
        tan_out: Option<&[f32]>,
    ) -> Self {
        let p0 = Vec2::from(*self);
        let p3 = Vec2::from(*other);
        cubic_point(p0, p0 + tangent2(tan_out), p3 + tangent2(tan_in), p3, t).to_array()
    }
}

impl Interpolatable for Vec3DefaultZero {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        Vec3DefaultZero(lerp_array(&self.0, &other.0, t))
    }

    // Motion paths are planar; Z moves linearly.
    fn lerp_spatial(
        &self,
        other: &Self,
        t: f32,
        tan_in: Option<&[f32]>,
        tan_out: Option<&[f32]>,
    ) -> Self {
        let [x0, y0, z0] = self.0;
        let [x1, y1, z1] = other.0;
        let xy = [x0, y0].lerp_spatial(&[x1, y1], t, tan_in, tan_out);
        Vec3DefaultZero([xy[0], xy[1], Interpolatable::lerp(&z0, &z1, t)])
    }
}

impl Interpolatable for Vec3Scale {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        Vec3Scale(lerp_array(&self.0, &other.0, t))
    }
}

fn lerp_array<const N: usize>(a: &[f32; N], b: &[f32; N], t: f32) -> [f32; N] {
    let mut out = *a;
    for (o, (x, y)) in out.iter_mut().zip(a.iter().zip(b.iter())) {
        *o = x + (y - x) * t;
    }
    out
}

// Colours and gradient data
impl Interpolatable for Vec<f32> {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        self.iter()
            .zip(other.iter())
            .map(|(a, b)| a + (b - a) * t)
            .collect()
    }
}

impl Interpolatable for BezierPath {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        // Paths with different topology cannot morph; they snap at the end of the segment.
        if self.v.len() != other.v.len() || self.c != other.c {
            return if t < 1.0 { self.clone() } else { other.clone() };
        }

        let lerp_points = |a: &[[f32; 2]], b: &[[f32; 2]]| -> Vec<[f32; 2]> {
            a.iter().zip(b.iter()).map(|(p, q)| p.lerp(q, t)).collect()
        };

        BezierPath {
            c: self.c,
            i: lerp_points(&self.i, &other.i),
            o: lerp_points(&self.o, &other.o),
            v: lerp_points(&self.v, &other.v),
        }
    }
}

// Cubic Bezier Easing
pub fn solve_cubic_bezier(p1: Vec2, p2: Vec2, x: f32) -> f32 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    // Newton-Raphson
    let mut t = x;
    for _ in 0..8 {
        let one_minus_t = 1.0 - t;
        let x_est = 3.0 * one_minus_t * one_minus_t * t * p1.x
            + 3.0 * one_minus_t * t * t * p2.x
            + t * t * t;

        let err = x_est - x;
        if err.abs() < 1e-4 {
            break;
        }

        let dx_dt = 3.0 * one_minus_t * one_minus_t * p1.x
            + 6.0 * one_minus_t * t * (p2.x - p1.x)
            + 3.0 * t * t * (1.0 - p2.x);

        if dx_dt.abs() < 1e-6 {
            break;
        }
        t -= err / dx_dt;
    }

    let one_minus_t = 1.0 - t;
    3.0 * one_minus_t * one_minus_t * t * p1.y + 3.0 * one_minus_t * t * t * p2.y + t * t * t
}

/// Easing of the segment that ends at a keyframe.
#[derive(Debug, Clone, PartialEq)]
pub enum Easing {
    Linear,
    /// The previous value is held until the keyframe is reached.
    Hold,
    /// Lottie bezier handles; one component per value dimension.
    CubicBezier {
        out_handle: BezierTangent,
        in_handle: BezierTangent,
    },
}

impl Easing {
    pub fn cubic(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Easing::CubicBezier {
            out_handle: BezierTangent::new(x1, y1),
            in_handle: BezierTangent::new(x2, y2),
        }
    }

    /// A cubic bezier whose control points leave the diagonal.
    pub fn is_non_linear_cubic_bezier(&self) -> bool {
        match self {
            Easing::CubicBezier {
                out_handle,
                in_handle,
            } => !(on_diagonal(out_handle) && on_diagonal(in_handle)),
            _ => false,
        }
    }

    /// Eased progress for a linear progress `t` within the segment.
    pub fn progress(&self, t: f32) -> f32 {
        match self {
            Easing::Linear => t,
            Easing::Hold => {
                if t < 1.0 {
                    0.0
                } else {
                    1.0
                }
            }
            Easing::CubicBezier {
                out_handle,
                in_handle,
            } => {
                let p1 = first_point(out_handle, 0.0);
                let p2 = first_point(in_handle, 1.0);
                solve_cubic_bezier(p1, p2, t)
            }
        }
    }
}

fn on_diagonal(handle: &BezierTangent) -> bool {
    handle.x.len() == handle.y.len() && handle.x.iter().zip(&handle.y).all(|(x, y)| x == y)
}

fn first_point(handle: &BezierTangent, default: f32) -> Vec2 {
    Vec2::new(
        handle.x.first().copied().unwrap_or(default),
        handle.y.first().copied().unwrap_or(default),
    )
}

/// Spatial tangents of the segment that ends at a keyframe, relative to the
/// segment's start and end values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpatialBezier {
    pub out_tangent: Vec<f32>,
    pub in_tangent: Vec<f32>,
}

impl SpatialBezier {
    pub fn is_linear(&self) -> bool {
        self.out_tangent
            .iter()
            .chain(self.in_tangent.iter())
            .all(|v| *v == 0.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyFrame<T> {
    pub frame: f32,
    pub value: T,
    /// Easing used to arrive at this keyframe from the previous one.
    pub easing: Easing,
    pub spatial: Option<SpatialBezier>,
}

impl<T> KeyFrame<T> {
    pub fn new(frame: f32, value: T, easing: Easing) -> Self {
        KeyFrame {
            frame,
            value,
            easing,
            spatial: None,
        }
    }

    pub fn linear(frame: f32, value: T) -> Self {
        Self::new(frame, value, Easing::Linear)
    }

    pub fn hold(frame: f32, value: T) -> Self {
        Self::new(frame, value, Easing::Hold)
    }

    /// Whether the segment ending here can move even when both ends hold the same value.
    pub fn has_visible_motion(&self) -> bool {
        self.easing.is_non_linear_cubic_bezier()
            || self.spatial.as_ref().map_or(false, |s| !s.is_linear())
    }

    pub fn with_hold_easing(mut self) -> Self {
        self.easing = Easing::Hold;
        self.spatial = None;
        self
    }
}

/// Value of a keyframe sequence at `frame`. Before the first keyframe the
/// first value is used, after the last keyframe the last value is used.
pub fn value_at<T: Interpolatable>(keyframes: &[KeyFrame<T>], frame: f32) -> Option<T> {
    let first = keyframes.first()?;

    // Find the first keyframe where kf.frame > frame; the segment is [idx-1, idx].
    let idx = keyframes.partition_point(|kf| kf.frame <= frame);
    if idx == 0 {
        return Some(first.value.clone());
    }
    if idx >= keyframes.len() {
        return keyframes.last().map(|kf| kf.value.clone());
    }

    let start = &keyframes[idx - 1];
    let end = &keyframes[idx];

    let duration = end.frame - start.frame;
    if duration <= 0.0 || end.easing == Easing::Hold {
        return Some(start.value.clone());
    }

    let local_t = end.easing.progress((frame - start.frame) / duration);
    let (tan_in, tan_out) = match &end.spatial {
        Some(s) => (Some(s.in_tangent.as_slice()), Some(s.out_tangent.as_slice())),
        None => (None, None),
    };

    Some(start.value.lerp_spatial(&end.value, local_t, tan_in, tan_out))
}

/// Converts Lottie keyframes, whose easing and tangents describe the segment
/// that starts at them, into keyframes that carry the easing of the segment
/// that ends at them. Returns `None` when a keyframe has no resolvable value.
pub fn keyframes_from_lottie<T: Clone>(keyframes: &[Keyframe<T>]) -> Option<Vec<KeyFrame<T>>> {
    let mut out = Vec::with_capacity(keyframes.len());

    for (n, kf) in keyframes.iter().enumerate() {
        let prev = n.checked_sub(1).map(|p| &keyframes[p]);

        // Legacy files store the segment end value in `e` of the previous keyframe.
        let value = kf
            .s
            .clone()
            .or_else(|| prev.and_then(|p| p.e.clone()))?;

        let (easing, spatial) = match prev {
            None => (Easing::Linear, None),
            Some(p) => (segment_easing(p), segment_spatial(p)),
        };

        out.push(KeyFrame {
            frame: kf.t,
            value,
            easing,
            spatial,
        });
    }

    Some(out)
}

fn segment_easing<T>(kf: &Keyframe<T>) -> Easing {
    if kf.h == Some(1) {
        return Easing::Hold;
    }
    match (&kf.o, &kf.i) {
        (Some(o), Some(i)) => Easing::CubicBezier {
            out_handle: o.clone(),
            in_handle: i.clone(),
        },
        _ => Easing::Linear,
    }
}

fn segment_spatial<T>(kf: &Keyframe<T>) -> Option<SpatialBezier> {
    if kf.to.is_none() && kf.ti.is_none() {
        return None;
    }
    Some(SpatialBezier {
        out_tangent: kf.to.clone().unwrap_or_default(),
        in_tangent: kf.ti.clone().unwrap_or_default(),
    })
}

pub fn keyframes_to_lottie<T: Clone>(keyframes: &[KeyFrame<T>]) -> Vec<Keyframe<T>> {
    keyframes
        .iter()
        .enumerate()
        .map(|(n, kf)| {
            let mut out = Keyframe::at(kf.frame, kf.value.clone());
            if let Some(next) = keyframes.get(n + 1) {
                match &next.easing {
                    Easing::Hold => out.h = Some(1),
                    Easing::Linear => {
                        out.o = Some(BezierTangent::new(0.0, 0.0));
                        out.i = Some(BezierTangent::new(1.0, 1.0));
                    }
                    Easing::CubicBezier {
                        out_handle,
                        in_handle,
                    } => {
                        out.o = Some(out_handle.clone());
                        out.i = Some(in_handle.clone());
                    }
                }
                if let Some(spatial) = &next.spatial {
                    out.to = Some(spatial.out_tangent.clone());
                    out.ti = Some(spatial.in_tangent.clone());
                }
            }
            out
        })
        .collect()
}

/// Keyframes of an animated property, or `None` for static and unset ones.
pub fn property_keyframes<T: Clone>(prop: &Property<T>) -> Option<Vec<KeyFrame<T>>> {
    match &prop.k {
        Value::Animated(keyframes) if !keyframes.is_empty() => keyframes_from_lottie(keyframes),
        _ => None,
    }
}

/// Stores keyframes back into a property. A single keyframe becomes a static value.
pub fn set_property_keyframes<T: Clone>(prop: &mut Property<T>, keyframes: &[KeyFrame<T>]) {
    match keyframes {
        [] => {}
        [only] => {
            prop.a = 0;
            prop.k = Value::Static(only.value.clone());
        }
        _ => {
            prop.a = 1;
            prop.k = Value::Animated(keyframes_to_lottie(keyframes));
        }
    }
}

/// Value of a property at frame 0 of its own timeline, or its static value.
pub fn initial_value<T: Clone>(prop: &Property<T>) -> Option<T> {
    match &prop.k {
        Value::Default => None,
        Value::Static(v) => Some(v.clone()),
        Value::Animated(keyframes) => {
            let first = keyframes.first()?;
            first.s.clone().or_else(|| first.e.clone())
        }
    }
}

/// Resolves a property at `frame`, falling back to `default` when unset.
pub fn resolve<T: Interpolatable>(prop: &Property<T>, frame: f32, default: T) -> T {
    match &prop.k {
        Value::Default => default,
        Value::Static(v) => v.clone(),
        Value::Animated(_) => property_keyframes(prop)
            .and_then(|kfs| value_at(&kfs, frame))
            .unwrap_or(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn prop(value: serde_json::Value) -> Property<f32> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_value_at_binary_search() {
        let kfs = vec![
            KeyFrame::linear(0.0, 0.0f32),
            KeyFrame::linear(10.0, 10.0),
            KeyFrame::linear(20.0, 30.0),
        ];

        assert_eq!(value_at(&kfs, -5.0), Some(0.0));
        assert_eq!(value_at(&kfs, 0.0), Some(0.0));
        assert_eq!(value_at(&kfs, 5.0), Some(5.0));
        assert_eq!(value_at(&kfs, 10.0), Some(10.0));
        assert_eq!(value_at(&kfs, 15.0), Some(20.0));
        assert_eq!(value_at(&kfs, 25.0), Some(30.0));
        assert_eq!(value_at::<f32>(&[], 1.0), None);
    }

    #[test]
    fn test_hold_easing_keeps_previous_value() {
        let kfs = vec![KeyFrame::linear(0.0, 1.0f32), KeyFrame::hold(10.0, 5.0)];
        assert_eq!(value_at(&kfs, 9.9), Some(1.0));
        assert_eq!(value_at(&kfs, 10.0), Some(5.0));
    }

    #[test]
    fn test_easing_moves_from_start_keyframe_to_next() {
        let p = prop(json!({
            "a": 1,
            "k": [
                { "t": 0, "s": [0], "h": 1 },
                { "t": 10, "s": [100], "o": { "x": [0.5], "y": [0] }, "i": { "x": [0.5], "y": [1] } },
                { "t": 20, "s": [50] }
            ]
        }));

        let kfs = property_keyframes(&p).unwrap();
        assert_eq!(kfs[0].easing, Easing::Linear);
        assert_eq!(kfs[1].easing, Easing::Hold);
        assert!(kfs[2].easing.is_non_linear_cubic_bezier());

        let back = keyframes_to_lottie(&kfs);
        assert_eq!(back[0].h, Some(1));
        assert_eq!(back[1].o, Some(BezierTangent::new(0.5, 0.0)));
        assert_eq!(back[2].o, None);
    }

    #[test]
    fn test_legacy_end_values() {
        let p = prop(json!({
            "a": 1,
            "k": [
                { "t": 0, "s": [0], "e": [10], "o": { "x": [0], "y": [0] }, "i": { "x": [1], "y": [1] } },
                { "t": 10 }
            ]
        }));

        let kfs = property_keyframes(&p).unwrap();
        assert_eq!(kfs.len(), 2);
        assert_eq!(kfs[1].value, 10.0);
        assert!(!kfs[1].easing.is_non_linear_cubic_bezier());
    }

    #[test]
    fn test_single_keyframe_becomes_static() {
        let mut p = prop(json!({ "a": 1, "k": [{ "t": 0, "s": [3] }, { "t": 5, "s": [3] }] }));
        set_property_keyframes(&mut p, &[KeyFrame::linear(0.0, 3.0)]);
        assert_eq!(p.a, 0);
        assert_eq!(p.k, Value::Static(3.0));
    }

    #[test]
    fn test_spatial_motion_is_visible() {
        let mut kf = KeyFrame::linear(10.0, [0.0f32, 0.0]);
        assert!(!kf.has_visible_motion());
        kf.spatial = Some(SpatialBezier {
            out_tangent: vec![5.0, 0.0],
            in_tangent: vec![0.0, 0.0],
        });
        assert!(kf.has_visible_motion());
    }
}
