use super::gradient::{
    encode_gradient_stops, optimize_gradient_stops, parse_gradient_stops, remove_redundant_stops,
};
use super::keyframes::{remove_redundant_keyframes, trim_keyframes};
use super::layer_merge::merge_layers;
use super::precomps::collapse_precomps;
use crate::animatable::{property_keyframes, set_property_keyframes};
use crate::config::ReductionConfig;
use crate::error::ReduceResult;
use lottie_data::model::{
    DashProperty, GradientColors, Layer, LottieJson, PositionProperty, Property, Shape, ShapeItem,
    Transform, Value,
};
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

/// Counters reported by [`reduce_composition`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReductionStats {
    /// Layers at the top level and inside assets.
    pub layers_before: usize,
    pub layers_after: usize,
    pub keyframes_before: usize,
    pub keyframes_after: usize,
    /// Animated properties left with a single keyframe and stored as static values.
    pub properties_made_static: usize,
    pub gradient_stops_before: usize,
    pub gradient_stops_after: usize,
    pub precomps_collapsed: bool,
    pub layers_merged: usize,
}

/// Receives every animatable property of a layer.
pub trait PropertyVisitor {
    fn visit<T: Clone + PartialEq>(&mut self, prop: &mut Property<T>);

    fn visit_gradient(&mut self, colors: &mut GradientColors) {
        self.visit(&mut colors.k);
    }
}

fn visit_opt<V: PropertyVisitor, T: Clone + PartialEq>(v: &mut V, prop: &mut Option<Property<T>>) {
    if let Some(prop) = prop {
        v.visit(prop);
    }
}

fn visit_dashes<V: PropertyVisitor>(v: &mut V, dashes: &mut Option<Vec<DashProperty>>) {
    for dash in dashes.iter_mut().flatten() {
        v.visit(&mut dash.v);
    }
}

pub fn walk_transform<V: PropertyVisitor>(v: &mut V, t: &mut Transform) {
    visit_opt(v, &mut t.a);
    match &mut t.p {
        Some(PositionProperty::Unified(p)) => v.visit(p),
        Some(PositionProperty::Split(split)) => {
            v.visit(&mut split.x);
            v.visit(&mut split.y);
            visit_opt(v, &mut split.z);
        }
        None => {}
    }
    visit_opt(v, &mut t.s);
    visit_opt(v, &mut t.r);
    visit_opt(v, &mut t.rx);
    visit_opt(v, &mut t.ry);
    visit_opt(v, &mut t.rz);
    visit_opt(v, &mut t.or);
    visit_opt(v, &mut t.sk);
    visit_opt(v, &mut t.sa);
    visit_opt(v, &mut t.o);
}

pub fn walk_shapes<V: PropertyVisitor>(v: &mut V, items: &mut [ShapeItem]) {
    for item in items {
        let ShapeItem::Known(shape) = item else {
            continue;
        };
        match shape {
            Shape::Group(group) => walk_shapes(v, &mut group.it),
            Shape::Rect(rect) => {
                visit_opt(v, &mut rect.s);
                visit_opt(v, &mut rect.p);
                visit_opt(v, &mut rect.r);
            }
            Shape::Ellipse(ellipse) => {
                visit_opt(v, &mut ellipse.s);
                visit_opt(v, &mut ellipse.p);
            }
            Shape::Polystar(star) => {
                visit_opt(v, &mut star.p);
                visit_opt(v, &mut star.or);
                visit_opt(v, &mut star.os);
                visit_opt(v, &mut star.ir);
                visit_opt(v, &mut star.is);
                visit_opt(v, &mut star.r);
                visit_opt(v, &mut star.pt);
            }
            Shape::Path(path) => v.visit(&mut path.ks),
            Shape::Fill(fill) => {
                visit_opt(v, &mut fill.c);
                visit_opt(v, &mut fill.o);
            }
            Shape::Stroke(stroke) => {
                visit_opt(v, &mut stroke.c);
                visit_opt(v, &mut stroke.o);
                visit_opt(v, &mut stroke.w);
                visit_dashes(v, &mut stroke.d);
            }
            Shape::GradientFill(fill) => {
                visit_opt(v, &mut fill.o);
                visit_opt(v, &mut fill.s);
                visit_opt(v, &mut fill.e);
                v.visit_gradient(&mut fill.g);
            }
            Shape::GradientStroke(stroke) => {
                visit_opt(v, &mut stroke.o);
                visit_opt(v, &mut stroke.w);
                visit_opt(v, &mut stroke.s);
                visit_opt(v, &mut stroke.e);
                v.visit_gradient(&mut stroke.g);
                visit_dashes(v, &mut stroke.d);
            }
            Shape::Trim(trim) => {
                visit_opt(v, &mut trim.s);
                visit_opt(v, &mut trim.e);
                visit_opt(v, &mut trim.o);
            }
            Shape::Transform(transform) => walk_transform(v, &mut transform.t),
        }
    }
}

pub fn walk_layer<V: PropertyVisitor>(v: &mut V, layer: &mut Layer) {
    walk_transform(v, &mut layer.ks);
    visit_opt(v, &mut layer.tm);
    if let Some(shapes) = layer.shapes.as_mut() {
        walk_shapes(v, shapes);
    }
}

struct KeyframeReducer<'s> {
    window: Option<(f32, f32)>,
    reduce: bool,
    stats: &'s mut ReductionStats,
}

impl PropertyVisitor for KeyframeReducer<'_> {
    fn visit<T: Clone + PartialEq>(&mut self, prop: &mut Property<T>) {
        if prop.has_expression() {
            return;
        }
        let Some(keyframes) = property_keyframes(prop) else {
            return;
        };

        let before = keyframes.len();
        let mut reduced = match self.window {
            Some((start, end)) => trim_keyframes(&keyframes, start, end),
            None => keyframes,
        };
        if self.reduce {
            reduced = remove_redundant_keyframes(&reduced);
        }

        self.stats.keyframes_before += before;
        self.stats.keyframes_after += reduced.len();
        if reduced.len() != before {
            set_property_keyframes(prop, &reduced);
            if reduced.len() == 1 {
                self.stats.properties_made_static += 1;
            }
        }
    }
}

struct GradientReducer<'s> {
    stats: &'s mut ReductionStats,
}

impl PropertyVisitor for GradientReducer<'_> {
    fn visit<T: Clone + PartialEq>(&mut self, _prop: &mut Property<T>) {}

    fn visit_gradient(&mut self, colors: &mut GradientColors) {
        if colors.k.has_expression() {
            return;
        }
        let Value::Static(raw) = &colors.k.k else {
            return;
        };

        let color_count = colors.p as usize;
        let well_formed = raw.len() >= color_count * 4 && (raw.len() - color_count * 4) % 2 == 0;
        if !well_formed {
            return;
        }

        let stops = parse_gradient_stops(raw, color_count);
        let mut merged = optimize_gradient_stops(&stops);
        merged.dedup();
        let reduced = remove_redundant_stops(&merged);
        let (p, data) = encode_gradient_stops(&reduced);

        self.stats.gradient_stops_before += stops.len();
        if data.len() < raw.len() {
            self.stats.gradient_stops_after += reduced.len();
            colors.p = p;
            colors.k.k = Value::Static(data);
        } else {
            self.stats.gradient_stops_after += stops.len();
        }
    }
}

fn reduce_layer_list(layers: &mut [Layer], config: &ReductionConfig, stats: &mut ReductionStats) {
    let parents: HashSet<u32> = layers.iter().filter_map(|l| l.parent).collect();

    for layer in layers.iter_mut() {
        if config.trim_to_layer_window || config.reduce_keyframes {
            // Children read a parent's transform outside the parent's own window.
            let is_parent = layer.ind.map_or(false, |ind| parents.contains(&ind));
            let window = if config.trim_to_layer_window && !is_parent {
                layer.local_window()
            } else {
                None
            };
            let mut reducer = KeyframeReducer {
                window,
                reduce: config.reduce_keyframes,
                stats: &mut *stats,
            };
            walk_layer(&mut reducer, layer);
        }
        if config.reduce_gradients {
            if let Some(shapes) = layer.shapes.as_mut() {
                walk_shapes(&mut GradientReducer { stats: &mut *stats }, shapes);
            }
        }
    }
}

fn count_layers(lottie: &LottieJson) -> usize {
    lottie.layers.len()
        + lottie
            .assets
            .iter()
            .filter_map(|a| a.layers.as_ref())
            .map(Vec::len)
            .sum::<usize>()
}

/// Runs the composition-level reductions selected by `config`: precomp
/// collapse, layer merge, then keyframe trimming and reduction and gradient
/// stop reduction on every layer at the top level and inside assets.
pub fn reduce_composition(
    lottie: &mut LottieJson,
    config: &ReductionConfig,
) -> ReduceResult<ReductionStats> {
    let mut stats = ReductionStats {
        layers_before: count_layers(lottie),
        ..ReductionStats::default()
    };

    if config.collapse_precomps {
        stats.precomps_collapsed = collapse_precomps(lottie);
    }
    if config.merge_layers {
        stats.layers_merged = merge_layers(lottie, &config.merge)?;
    }

    reduce_layer_list(&mut lottie.layers, config, &mut stats);
    for asset in &mut lottie.assets {
        if let Some(layers) = asset.layers.as_mut() {
            reduce_layer_list(layers, config, &mut stats);
        }
    }

    stats.layers_after = count_layers(lottie);
    debug!(?stats, "reduced composition");
    Ok(stats)
}
