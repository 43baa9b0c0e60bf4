use glam::{Vec2, Vec4};
use std::cmp::Ordering;
use std::f32::consts::PI;

/// Turning angle, in radians, under which a middle gradient stop is considered
/// to lie on the line through its neighbours.
pub const REDUNDANT_STOP_ANGLE: f32 = 0.005;

/// A stop as Lottie stores it: colour and opacity are keyed independently.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawStop {
    /// RGB colour; alpha is 1.
    Color { offset: f32, color: Vec4 },
    /// Opacity in `0..=1`.
    Opacity { offset: f32, opacity: f32 },
}

impl RawStop {
    pub fn offset(&self) -> f32 {
        match self {
            RawStop::Color { offset, .. } | RawStop::Opacity { offset, .. } => *offset,
        }
    }

    fn is_color(&self) -> bool {
        matches!(self, RawStop::Color { .. })
    }
}

/// A merged stop carrying colour and alpha together.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    pub offset: f32,
    pub color: Vec4,
}

impl GradientStop {
    pub fn new(offset: f32, color: Vec4) -> Self {
        Self { offset, color }
    }
}

/// Splits Lottie gradient data into its `color_count` colour stops of
/// `[offset, r, g, b]` followed by opacity stops of `[offset, alpha]`.
pub fn parse_gradient_stops(raw: &[f32], color_count: usize) -> Vec<RawStop> {
    let color_data_len = (color_count * 4).min(raw.len());
    let (color_data, opacity_data) = raw.split_at(color_data_len);

    let colors = color_data.chunks_exact(4).map(|c| RawStop::Color {
        offset: c[0],
        color: Vec4::new(c[1], c[2], c[3], 1.0),
    });
    let opacities = opacity_data.chunks_exact(2).map(|c| RawStop::Opacity {
        offset: c[0],
        opacity: c[1],
    });

    colors.chain(opacities).collect()
}

/// Inverse of [`parse_gradient_stops`] for merged stops. The opacity track is
/// only written when some stop is not fully opaque.
pub fn encode_gradient_stops(stops: &[GradientStop]) -> (u32, Vec<f32>) {
    let mut data = Vec::with_capacity(stops.len() * 6);
    for stop in stops {
        data.extend_from_slice(&[stop.offset, stop.color.x, stop.color.y, stop.color.z]);
    }
    if stops.iter().any(|s| s.color.w != 1.0) {
        for stop in stops {
            data.extend_from_slice(&[stop.offset, stop.color.w]);
        }
    }
    (stops.len() as u32, data)
}

// Value of y at x on the line through a and b.
fn lerp_at(a: (f32, f32), b: (f32, f32), x: f32) -> f32 {
    if b.0 == a.0 {
        return a.1;
    }
    a.1 + (x - a.0) * ((b.1 - a.1) / (b.0 - a.0))
}

fn color_at(a: (f32, Vec4), b: (f32, Vec4), x: f32) -> Vec4 {
    Vec4::new(
        lerp_at((a.0, a.1.x), (b.0, b.1.x), x),
        lerp_at((a.0, a.1.y), (b.0, b.1.y), x),
        lerp_at((a.0, a.1.z), (b.0, b.1.z), x),
        lerp_at((a.0, a.1.w), (b.0, b.1.w), x),
    )
}

/// Merges the colour and opacity tracks into one sequence of stops. Each stop
/// keeps its own channel and takes the other channel from a stop of the other
/// kind at the same offset, or by interpolating between the nearest stops of
/// the other kind on either side. With a neighbour on one side only, that
/// neighbour's value is used; with none, black or fully opaque.
pub fn optimize_gradient_stops(stops: &[RawStop]) -> Vec<GradientStop> {
    let mut ordered = stops.to_vec();
    // Colour before opacity at equal offsets.
    ordered.sort_by(|a, b| {
        a.offset()
            .partial_cmp(&b.offset())
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.is_color().cmp(&a.is_color()))
    });

    let previous_of = |i: usize, want_color: bool| {
        ordered[..i]
            .iter()
            .rev()
            .find(|s| s.is_color() == want_color)
            .copied()
    };
    let next_of = |i: usize, want_color: bool| {
        ordered[i + 1..]
            .iter()
            .find(|s| s.is_color() == want_color)
            .copied()
    };

    ordered
        .iter()
        .enumerate()
        .map(|(i, stop)| match *stop {
            RawStop::Color { offset, color } => {
                let opacity = match ordered.get(i + 1) {
                    Some(RawStop::Opacity {
                        offset: o,
                        opacity,
                    }) if *o == offset => *opacity,
                    _ => match (previous_of(i, false), next_of(i, false)) {
                        (
                            Some(RawStop::Opacity {
                                offset: po,
                                opacity: pv,
                            }),
                            Some(RawStop::Opacity {
                                offset: no,
                                opacity: nv,
                            }),
                        ) => lerp_at((po, pv), (no, nv), offset),
                        (Some(RawStop::Opacity { opacity, .. }), None)
                        | (None, Some(RawStop::Opacity { opacity, .. })) => opacity,
                        _ => 1.0,
                    },
                };
                GradientStop::new(offset, multiplied_by_opacity(color, opacity))
            }
            RawStop::Opacity { offset, opacity } => {
                let color = match i.checked_sub(1).map(|p| ordered[p]) {
                    Some(RawStop::Color { offset: o, color }) if o == offset => color,
                    _ => match (previous_of(i, true), next_of(i, true)) {
                        (
                            Some(RawStop::Color {
                                offset: po,
                                color: pc,
                            }),
                            Some(RawStop::Color {
                                offset: no,
                                color: nc,
                            }),
                        ) => color_at((po, pc), (no, nc), offset),
                        (Some(RawStop::Color { color, .. }), None)
                        | (None, Some(RawStop::Color { color, .. })) => color,
                        _ => Vec4::new(0.0, 0.0, 0.0, 1.0),
                    },
                };
                GradientStop::new(offset, multiplied_by_opacity(color, opacity))
            }
        })
        .collect()
}

fn multiplied_by_opacity(color: Vec4, opacity: f32) -> Vec4 {
    Vec4::new(color.x, color.y, color.z, color.w * opacity)
}

/// Angle between two direction vectors; a zero-length vector counts as a full turn.
fn turning_angle<V>(u: V, v: V) -> f32
where
    V: Normalize,
{
    match (u.try_normalized(), v.try_normalized()) {
        (Some(u), Some(v)) => V::dot(u, v).clamp(-1.0, 1.0).acos(),
        _ => PI,
    }
}

trait Normalize: Copy {
    fn try_normalized(self) -> Option<Self>;
    fn dot(a: Self, b: Self) -> f32;
}

impl Normalize for Vec4 {
    fn try_normalized(self) -> Option<Self> {
        self.try_normalize()
    }
    fn dot(a: Self, b: Self) -> f32 {
        a.dot(b)
    }
}

impl Normalize for Vec2 {
    fn try_normalized(self) -> Option<Self> {
        self.try_normalize()
    }
    fn dot(a: Self, b: Self) -> f32 {
        a.dot(b)
    }
}

/// Whether `b` lies on the straight gradient from `a` to `c`, jointly in
/// offset+RGB space and in offset+alpha space.
pub fn is_redundant_stop(a: &GradientStop, b: &GradientStop, c: &GradientStop) -> bool {
    if a == b && b == c {
        return true;
    }

    let rgb = |s: &GradientStop| Vec4::new(s.offset, s.color.x, s.color.y, s.color.z);
    let alpha = |s: &GradientStop| Vec2::new(s.offset, s.color.w);

    let color_angle = turning_angle(rgb(b) - rgb(a), rgb(c) - rgb(b));
    let alpha_angle = turning_angle(alpha(b) - alpha(a), alpha(c) - alpha(b));

    color_angle < REDUNDANT_STOP_ANGLE && alpha_angle < REDUNDANT_STOP_ANGLE
}

/// Removes middle stops that lie on the gradient between their neighbours.
/// Each candidate is compared against the last kept stop, so removals never
/// accumulate drift.
pub fn remove_redundant_stops(stops: &[GradientStop]) -> Vec<GradientStop> {
    if stops.len() <= 2 {
        return stops.to_vec();
    }

    let mut out = Vec::with_capacity(stops.len());
    out.push(stops[0]);
    for window in stops.windows(2).skip(1) {
        let (middle, next) = (&window[0], &window[1]);
        let kept = &out[out.len() - 1];
        if !is_redundant_stop(kept, middle, next) {
            out.push(*middle);
        }
    }
    if let Some(last) = stops.last() {
        out.push(*last);
    }
    out
}
