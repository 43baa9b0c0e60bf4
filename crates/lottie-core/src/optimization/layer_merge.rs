//! Merges layers that are never visible at the same time.
//!
//! Two layers that follow each other in time can often be replaced by one
//! layer whose properties switch from the first layer's values to the second
//! layer's values with a hold keyframe. Pre-comp layers are merged by merging
//! the layer lists of their assets into a new asset.

use super::keyframes::trim_keyframes;
use super::layer_group::{
    groups_to_layers, layers_to_groups, renumber_layers, IndexGenerator, LayerGroup, MergeResult,
    TimeRange,
};
use super::layers_graph::{GroupMerger, LayersGraph};
use crate::animatable::{property_keyframes, set_property_keyframes, KeyFrame};
use crate::config::MergeConfig;
use crate::error::ReduceResult;
use lottie_data::model::{
    Asset, DashProperty, Extra, GradientColors, Layer, LayerType, LottieJson, PositionProperty,
    Property, Shape, ShapeItem, SplitPosition, Transform, Value,
};
use std::collections::HashSet;
use tracing::{debug, trace};

// Editor bookkeeping that does not affect rendering.
const IGNORED_EXTRA_KEYS: [&str; 4] = ["mn", "ix", "cix", "np"];

fn extras_match(a: &Extra, b: &Extra) -> bool {
    let relevant = |m: &Extra| {
        m.keys()
            .filter(|k| !IGNORED_EXTRA_KEYS.contains(&k.as_str()))
            .count()
    };
    relevant(a) == relevant(b)
        && a
            .iter()
            .filter(|(k, _)| !IGNORED_EXTRA_KEYS.contains(&k.as_str()))
            .all(|(k, v)| b.get(k) == Some(v))
}

fn joined_name(a: &Option<String>, b: &Option<String>) -> Option<String> {
    match (a, b) {
        (Some(a), Some(b)) => Some(format!("{a} {b}")),
        _ => a.clone(),
    }
}

/// Time frame of a merge. Ranges are in the local time of the first layer;
/// keyframes of the second layer move by `shift` to get there.
#[derive(Debug, Clone, Copy)]
struct MergeWindow {
    a: TimeRange,
    b: TimeRange,
    shift: f32,
}

impl MergeWindow {
    fn for_layers(a: &Layer, b: &Layer) -> Self {
        Self {
            a: TimeRange::new(a.ip - a.st, a.op - a.st),
            b: TimeRange::new(b.ip - a.st, b.op - a.st),
            shift: b.st - a.st,
        }
    }
}

fn ordered<T>(keyframes: &[KeyFrame<T>]) -> bool {
    keyframes.windows(2).all(|w| w[0].frame <= w[1].frame)
}

fn trimmed_keyframes<T: Clone + PartialEq>(
    prop: &Property<T>,
    range: TimeRange,
    shift: f32,
) -> Option<Vec<KeyFrame<T>>> {
    let mut keyframes = property_keyframes(prop)?;
    for kf in &mut keyframes {
        kf.frame += shift;
    }
    Some(trim_keyframes(&keyframes, range.start, range.end))
}

fn static_value<T: Clone>(prop: &Property<T>) -> Option<T> {
    match &prop.k {
        Value::Static(v) => Some(v.clone()),
        _ => None,
    }
}

/// Merges two properties. Equal static values stay static; otherwise the
/// result plays the first property's keyframes and switches to the second
/// property's values with a hold keyframe at the start of the second range.
/// What the result shows outside both ranges is unspecified.
fn merge_property<T: Clone + PartialEq>(
    a: &Property<T>,
    b: &Property<T>,
    w: &MergeWindow,
) -> Option<Property<T>> {
    if a.has_expression() || b.has_expression() {
        return None;
    }
    if !a.is_animated() && !b.is_animated() {
        return (a.k == b.k).then(|| a.clone());
    }

    let mut merged = match a.is_animated() {
        true => trimmed_keyframes(a, w.a, 0.0)?,
        false => vec![KeyFrame::hold(w.a.start, static_value(a)?)],
    };
    match b.is_animated() {
        true => {
            let b_keyframes = trimmed_keyframes(b, w.b, w.shift)?;
            let first = b_keyframes.first()?.value.clone();
            merged.push(KeyFrame::hold(w.b.start, first));
            merged.extend(b_keyframes);
        }
        false => merged.push(KeyFrame::hold(w.b.start, static_value(b)?)),
    }

    if !ordered(&merged) {
        return None;
    }
    let mut out = a.clone();
    set_property_keyframes(&mut out, &merged);
    Some(out)
}

/// Like [`merge_property`] for opacity, but the result is also fully
/// transparent between the two ranges.
fn merge_opacity_strict(
    a: &Property<f32>,
    b: &Property<f32>,
    w: &MergeWindow,
) -> Option<Property<f32>> {
    const OPAQUE: f32 = 100.0;
    const TRANSPARENT: f32 = 0.0;

    if a.has_expression() || b.has_expression() {
        return None;
    }
    let value_of = |p: &Property<f32>| match &p.k {
        Value::Default => Some(OPAQUE),
        Value::Static(v) => Some(*v),
        Value::Animated(_) => None,
    };

    let mut merged = match a.is_animated() {
        true => trimmed_keyframes(a, w.a, 0.0)?,
        false => {
            let a_value = value_of(a)?;
            if !b.is_animated() && w.a.end == w.b.start && a.k == b.k {
                return Some(a.clone());
            }
            vec![KeyFrame::hold(w.a.start, a_value)]
        }
    };

    if w.a.end < w.b.start {
        merged.push(KeyFrame::hold(w.a.end, TRANSPARENT));
    }

    match b.is_animated() {
        true => {
            let b_keyframes = trimmed_keyframes(b, w.b, w.shift)?;
            let first = b_keyframes.first()?;
            if first.frame != w.b.start {
                merged.push(KeyFrame::hold(w.b.start, first.value));
            }
            merged.extend(b_keyframes);
        }
        false => merged.push(KeyFrame::hold(w.b.start, value_of(b)?)),
    }

    if !ordered(&merged) {
        return None;
    }
    let mut out = a.clone();
    set_property_keyframes(&mut out, &merged);
    Some(out)
}

// Outer `None` is failure; inner `None` is a property absent on both sides.
fn merge_optional<T: Clone + PartialEq>(
    a: Option<&Property<T>>,
    b: Option<&Property<T>>,
    w: &MergeWindow,
) -> Option<Option<Property<T>>> {
    match (a, b) {
        (None, None) => Some(None),
        (Some(a), Some(b)) => merge_property(a, b, w).map(Some),
        _ => None,
    }
}

fn merge_position(
    a: Option<&PositionProperty>,
    b: Option<&PositionProperty>,
    w: &MergeWindow,
) -> Option<Option<PositionProperty>> {
    match (a, b) {
        (None, None) => Some(None),
        (Some(PositionProperty::Unified(a)), Some(PositionProperty::Unified(b))) => {
            merge_property(a, b, w).map(|p| Some(PositionProperty::Unified(p)))
        }
        (Some(PositionProperty::Split(a)), Some(PositionProperty::Split(b))) if a.s == b.s => {
            Some(Some(PositionProperty::Split(SplitPosition {
                s: a.s,
                x: merge_property(&a.x, &b.x, w)?,
                y: merge_property(&a.y, &b.y, w)?,
                z: merge_optional(a.z.as_ref(), b.z.as_ref(), w)?,
            })))
        }
        _ => None,
    }
}

fn merge_transform(a: &Transform, b: &Transform, w: &MergeWindow, strict: bool) -> Option<Transform> {
    if !extras_match(&a.extra, &b.extra) {
        return None;
    }

    let o = if strict {
        let default = Property::default();
        let merged = merge_opacity_strict(
            a.o.as_ref().unwrap_or(&default),
            b.o.as_ref().unwrap_or(&default),
            w,
        )?;
        Some(merged).filter(|p| a.o.is_some() || !matches!(p.k, Value::Default))
    } else {
        merge_optional(a.o.as_ref(), b.o.as_ref(), w)?
    };

    Some(Transform {
        a: merge_optional(a.a.as_ref(), b.a.as_ref(), w)?,
        p: merge_position(a.p.as_ref(), b.p.as_ref(), w)?,
        s: merge_optional(a.s.as_ref(), b.s.as_ref(), w)?,
        r: merge_optional(a.r.as_ref(), b.r.as_ref(), w)?,
        rx: merge_optional(a.rx.as_ref(), b.rx.as_ref(), w)?,
        ry: merge_optional(a.ry.as_ref(), b.ry.as_ref(), w)?,
        rz: merge_optional(a.rz.as_ref(), b.rz.as_ref(), w)?,
        or: merge_optional(a.or.as_ref(), b.or.as_ref(), w)?,
        sk: merge_optional(a.sk.as_ref(), b.sk.as_ref(), w)?,
        sa: merge_optional(a.sa.as_ref(), b.sa.as_ref(), w)?,
        o,
        extra: a.extra.clone(),
    })
}

fn merge_dashes(
    a: Option<&Vec<DashProperty>>,
    b: Option<&Vec<DashProperty>>,
    w: &MergeWindow,
) -> Option<Option<Vec<DashProperty>>> {
    match (a, b) {
        (None, None) => Some(None),
        (Some(a), Some(b)) if a.len() == b.len() => a
            .iter()
            .zip(b)
            .map(|(x, y)| {
                if x.n != y.n || !extras_match(&x.extra, &y.extra) {
                    return None;
                }
                Some(DashProperty {
                    n: x.n.clone(),
                    v: merge_property(&x.v, &y.v, w)?,
                    extra: x.extra.clone(),
                })
            })
            .collect::<Option<Vec<_>>>()
            .map(Some),
        _ => None,
    }
}

fn merge_gradient_colors(
    a: &GradientColors,
    b: &GradientColors,
    w: &MergeWindow,
) -> Option<GradientColors> {
    if a.p != b.p {
        return None;
    }
    Some(GradientColors {
        p: a.p,
        k: merge_property(&a.k, &b.k, w)?,
    })
}

// No property anywhere in the value is animated.
fn is_static_json(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Object(map) => {
            map.get("a").and_then(serde_json::Value::as_u64) != Some(1)
                && map.values().all(is_static_json)
        }
        serde_json::Value::Array(items) => items.iter().all(is_static_json),
        _ => true,
    }
}

fn merge_shape_items(a: &[ShapeItem], b: &[ShapeItem], w: &MergeWindow) -> Option<Vec<ShapeItem>> {
    if a.len() != b.len() {
        return None;
    }
    a.iter()
        .zip(b)
        .map(|(a, b)| match (a, b) {
            (ShapeItem::Known(a), ShapeItem::Known(b)) => merge_shape(a, b, w).map(ShapeItem::Known),
            (ShapeItem::Raw(a), ShapeItem::Raw(b)) => {
                let same_timeline = w.shift == 0.0 || is_static_json(a);
                (a == b && same_timeline).then(|| ShapeItem::Raw(a.clone()))
            }
            _ => None,
        })
        .collect()
}

fn merge_shape(a: &Shape, b: &Shape, w: &MergeWindow) -> Option<Shape> {
    macro_rules! merge_opt {
        ($a:expr, $b:expr, $field:ident) => {
            merge_optional($a.$field.as_ref(), $b.$field.as_ref(), w)?
        };
    }

    let merged = match (a, b) {
        (Shape::Group(a), Shape::Group(b)) if extras_match(&a.extra, &b.extra) => {
            let mut out = a.clone();
            out.nm = joined_name(&a.nm, &b.nm);
            out.it = merge_shape_items(&a.it, &b.it, w)?;
            Shape::Group(out)
        }
        (Shape::Rect(a), Shape::Rect(b)) if extras_match(&a.extra, &b.extra) => {
            let mut out = a.clone();
            out.nm = joined_name(&a.nm, &b.nm);
            out.s = merge_opt!(a, b, s);
            out.p = merge_opt!(a, b, p);
            out.r = merge_opt!(a, b, r);
            Shape::Rect(out)
        }
        (Shape::Ellipse(a), Shape::Ellipse(b)) if extras_match(&a.extra, &b.extra) => {
            let mut out = a.clone();
            out.nm = joined_name(&a.nm, &b.nm);
            out.s = merge_opt!(a, b, s);
            out.p = merge_opt!(a, b, p);
            Shape::Ellipse(out)
        }
        (Shape::Polystar(a), Shape::Polystar(b)) if extras_match(&a.extra, &b.extra) => {
            let mut out = a.clone();
            out.nm = joined_name(&a.nm, &b.nm);
            out.p = merge_opt!(a, b, p);
            out.or = merge_opt!(a, b, or);
            out.os = merge_opt!(a, b, os);
            out.ir = merge_opt!(a, b, ir);
            out.is = merge_opt!(a, b, is);
            out.r = merge_opt!(a, b, r);
            out.pt = merge_opt!(a, b, pt);
            Shape::Polystar(out)
        }
        (Shape::Path(a), Shape::Path(b)) if extras_match(&a.extra, &b.extra) => {
            let mut out = a.clone();
            out.nm = joined_name(&a.nm, &b.nm);
            out.ks = merge_property(&a.ks, &b.ks, w)?;
            Shape::Path(out)
        }
        (Shape::Fill(a), Shape::Fill(b)) if extras_match(&a.extra, &b.extra) => {
            let mut out = a.clone();
            out.nm = joined_name(&a.nm, &b.nm);
            out.c = merge_opt!(a, b, c);
            out.o = merge_opt!(a, b, o);
            Shape::Fill(out)
        }
        (Shape::Stroke(a), Shape::Stroke(b)) if extras_match(&a.extra, &b.extra) => {
            let mut out = a.clone();
            out.nm = joined_name(&a.nm, &b.nm);
            out.c = merge_opt!(a, b, c);
            out.o = merge_opt!(a, b, o);
            out.w = merge_opt!(a, b, w);
            out.d = merge_dashes(a.d.as_ref(), b.d.as_ref(), w)?;
            Shape::Stroke(out)
        }
        (Shape::GradientFill(a), Shape::GradientFill(b)) if extras_match(&a.extra, &b.extra) => {
            let mut out = a.clone();
            out.nm = joined_name(&a.nm, &b.nm);
            out.o = merge_opt!(a, b, o);
            out.s = merge_opt!(a, b, s);
            out.e = merge_opt!(a, b, e);
            out.g = merge_gradient_colors(&a.g, &b.g, w)?;
            Shape::GradientFill(out)
        }
        (Shape::GradientStroke(a), Shape::GradientStroke(b))
            if extras_match(&a.extra, &b.extra) =>
        {
            let mut out = a.clone();
            out.nm = joined_name(&a.nm, &b.nm);
            out.o = merge_opt!(a, b, o);
            out.w = merge_opt!(a, b, w);
            out.s = merge_opt!(a, b, s);
            out.e = merge_opt!(a, b, e);
            out.g = merge_gradient_colors(&a.g, &b.g, w)?;
            out.d = merge_dashes(a.d.as_ref(), b.d.as_ref(), w)?;
            Shape::GradientStroke(out)
        }
        (Shape::Trim(a), Shape::Trim(b)) if extras_match(&a.extra, &b.extra) => {
            let mut out = a.clone();
            out.nm = joined_name(&a.nm, &b.nm);
            out.s = merge_opt!(a, b, s);
            out.e = merge_opt!(a, b, e);
            out.o = merge_opt!(a, b, o);
            Shape::Trim(out)
        }
        (Shape::Transform(a), Shape::Transform(b)) => {
            let mut out = a.clone();
            out.t = merge_transform(&a.t, &b.t, w, false)?;
            Shape::Transform(out)
        }
        _ => return None,
    };
    Some(merged)
}

/// Checks that do not depend on the layer type. `a` starts first.
fn layers_compatible(a: &Layer, b: &Layer, ignore_parent: bool) -> bool {
    a.ty == b.ty
        && a.ao == b.ao
        && a.bm == b.bm
        && a.is_3d() == b.is_3d()
        && a.is_hidden() == b.is_hidden()
        && a.tt == b.tt
        && a.td == b.td
        && !a.has_effects()
        && !b.has_effects()
        && !a.has_masks()
        && !b.has_masks()
        && (ignore_parent || a.parent == b.parent)
        && a.sr == 1.0
        && b.sr == 1.0
        && a.op <= b.ip
        && a.st <= a.ip
        && b.st <= b.ip
        && a.tm.is_none()
        && b.tm.is_none()
        && !a.extra.contains_key("tp")
        && !b.extra.contains_key("tp")
        && extras_match(&a.extra, &b.extra)
}

fn merged_layer_base(a: &Layer, b: &Layer) -> Layer {
    let mut layer = a.clone();
    layer.nm = joined_name(&a.nm, &b.nm);
    layer.op = b.op;
    layer
}

fn merge_shape_layers(a: &Layer, b: &Layer, w: &MergeWindow) -> Option<Layer> {
    let empty = Vec::new();
    let a_shapes = a.shapes.as_ref().unwrap_or(&empty);
    let b_shapes = b.shapes.as_ref().unwrap_or(&empty);
    if a_shapes.len() != b_shapes.len() {
        return None;
    }

    let mut layer = merged_layer_base(a, b);
    layer.ks = merge_transform(&a.ks, &b.ks, w, true)?;
    if a.shapes.is_some() || b.shapes.is_some() {
        layer.shapes = Some(merge_shape_items(a_shapes, b_shapes, w)?);
    }
    Some(layer)
}

fn merge_null_layers(a: &Layer, b: &Layer, w: &MergeWindow) -> Option<Layer> {
    let mut layer = merged_layer_base(a, b);
    layer.ks = merge_transform(&a.ks, &b.ks, w, false)?;
    Some(layer)
}

fn clamp_to(layer: &Layer, range: TimeRange) -> Layer {
    let mut layer = layer.clone();
    layer.ip = layer.ip.clamp(range.start, range.end);
    layer.op = layer.op.clamp(range.start, range.end);
    layer
}

/// Merges layers of the same kind whose time ranges do not intersect.
/// Pre-comp merges produce new layer-collection assets, collected in
/// [`LayerMerger::generated`].
#[derive(Debug)]
pub struct LayerMerger {
    assets: Vec<Asset>,
    generated: Vec<Asset>,
}

impl LayerMerger {
    pub fn new(assets: &[Asset]) -> Self {
        Self {
            assets: assets.to_vec(),
            generated: Vec::new(),
        }
    }

    pub fn generated(&self) -> &[Asset] {
        &self.generated
    }

    pub fn into_generated(self) -> Vec<Asset> {
        self.generated
    }

    fn asset(&self, id: &str) -> Option<&Asset> {
        self.assets
            .iter()
            .chain(self.generated.iter())
            .find(|a| a.id == id)
    }

    fn generated_id(&self, a: &str, b: &str) -> String {
        let mut n = self.generated.len();
        loop {
            let id = format!("{a} {b} {n}");
            if self.asset(&id).is_none() {
                return id;
            }
            n += 1;
        }
    }

    /// Merges two groups. Both must be mergeable and either both or neither
    /// have a matte. The merged group is not mergeable again.
    pub fn merge_layer_groups(&mut self, a: &LayerGroup, b: &LayerGroup) -> MergeResult<LayerGroup> {
        if !a.can_be_merged || !b.can_be_merged {
            return MergeResult::failed();
        }

        let main = self.merge_layers(&a.main, &b.main, false);
        if !main.is_success() {
            return MergeResult::failed();
        }

        match (&a.matte, &b.matte) {
            (None, None) => main.map(|m| LayerGroup::new(m, None, false)),
            (Some(a_matte), Some(b_matte)) => {
                let ignore_parent = a_matte.parent.is_some()
                    && a_matte.parent == a.main.ind
                    && b_matte.parent.is_some()
                    && b_matte.parent == b.main.ind;
                match self.merge_layers(a_matte, b_matte, ignore_parent).value {
                    Some(matte) => main.map(|m| LayerGroup::new(m, Some(matte), false)),
                    None => MergeResult::failed(),
                }
            }
            _ => MergeResult::failed(),
        }
    }

    /// Merges two layers whose time ranges do not intersect into one layer.
    /// `ignore_parent` skips the parent check when both parents are known to
    /// map to the same layer after the merge.
    pub fn merge_layers(&mut self, a: &Layer, b: &Layer, ignore_parent: bool) -> MergeResult<Layer> {
        if a.ip > b.ip {
            return self.merge_layers(b, a, ignore_parent);
        }
        if !layers_compatible(a, b, ignore_parent) {
            return MergeResult::failed();
        }

        let w = MergeWindow::for_layers(a, b);
        let merged = match a.layer_type() {
            LayerType::PreComp => self.merge_precomp_layers(a, b, &w),
            LayerType::Shape => merge_shape_layers(a, b, &w).map(|l| (l, 1.0)),
            LayerType::Null => merge_null_layers(a, b, &w).map(|l| (l, 1.0)),
            _ => None,
        };
        match merged {
            Some((layer, score)) => MergeResult::with_score(layer, score),
            None => MergeResult::failed(),
        }
    }

    fn merge_precomp_layers(&mut self, a: &Layer, b: &Layer, w: &MergeWindow) -> Option<(Layer, f64)> {
        if a.w != b.w || a.h != b.h {
            return None;
        }
        let a_id = a.ref_id.as_deref()?;
        let b_id = b.ref_id.as_deref()?;
        let a_asset = self.asset(a_id)?;
        let fr = a_asset.fr;
        let a_layers = a_asset.layers.clone()?;
        let b_layers: Vec<Layer> = self
            .asset(b_id)?
            .layers
            .as_ref()?
            .iter()
            .map(|l| l.with_time_offset(w.shift))
            .collect();

        let ks = merge_transform(&a.ks, &b.ks, w, true)?;
        let MergeResult {
            value: Some(layers),
            score,
        } = self.merge_layer_collections(&a_layers, w.a, &b_layers, w.b)
        else {
            return None;
        };

        let id = self.generated_id(a_id, b_id);
        let mut asset = Asset::layer_collection(id.clone(), layers);
        asset.fr = fr;
        self.generated.push(asset);

        let mut layer = merged_layer_base(a, b);
        layer.ks = ks;
        layer.ref_id = Some(id);
        Some((layer, score))
    }

    /// Merges two layer lists shown during non-intersecting ranges. Layers of
    /// `a` still visible at the end of its range may merge with layers of `b`
    /// visible from the start of its range. Scored by the number of layers
    /// saved over the size of the smaller list.
    fn merge_layer_collections(
        &mut self,
        a: &[Layer],
        a_range: TimeRange,
        b: &[Layer],
        b_range: TimeRange,
    ) -> MergeResult<Vec<Layer>> {
        if a_range.start > a_range.end || b_range.start > b_range.end {
            return MergeResult::failed();
        }

        let a_clamped: Vec<Layer> = a.iter().map(|l| clamp_to(l, a_range)).collect();
        let b_clamped: Vec<Layer> = b.iter().map(|l| clamp_to(l, b_range)).collect();

        let mut generator = IndexGenerator::default();
        let (Ok(a_layers), Ok(b_layers)) = (
            renumber_layers(&a_clamped, &mut generator),
            renumber_layers(&b_clamped, &mut generator),
        ) else {
            return MergeResult::failed();
        };

        let mut groups = layers_to_groups(&a_layers, |main, _| main.op >= a_range.end);
        groups.extend(layers_to_groups(&b_layers, |main, _| main.ip <= b_range.start));

        loop {
            let count = groups.len();
            let mut graph = LayersGraph::new(groups);
            graph.merge_all(self);
            groups = match graph.layer_groups() {
                Ok(groups) => groups,
                Err(_) => return MergeResult::failed(),
            };
            if groups.len() == count {
                break;
            }
        }

        let Ok(layers) = groups_to_layers(groups) else {
            return MergeResult::failed();
        };

        let smaller = a_layers.len().min(b_layers.len());
        let score = if smaller == 0 {
            0.0
        } else {
            let saved = (a_layers.len() + b_layers.len()) as f64 - layers.len() as f64;
            (saved / smaller as f64).clamp(0.0, 1.0)
        };
        MergeResult::with_score(layers, score)
    }
}

impl GroupMerger for LayerMerger {
    fn merge_groups(&mut self, a: &LayerGroup, b: &LayerGroup) -> MergeResult<LayerGroup> {
        self.merge_layer_groups(a, b)
    }
}

/// Top-level merger that only accepts merges scoring at least `min_score`
/// between layers at most `max_gap` frames apart.
struct ThresholdMerger<'m> {
    merger: &'m mut LayerMerger,
    min_score: f64,
    max_gap: f32,
}

impl GroupMerger for ThresholdMerger<'_> {
    fn merge_groups(&mut self, a: &LayerGroup, b: &LayerGroup) -> MergeResult<LayerGroup> {
        let (first, second) = if a.main.ip <= b.main.ip { (a, b) } else { (b, a) };
        if second.main.ip - first.main.op > self.max_gap {
            return MergeResult::failed();
        }

        let result = self.merger.merge_layer_groups(a, b);
        if result.is_success() && result.score >= self.min_score {
            result
        } else {
            MergeResult::failed()
        }
    }
}

/// Merges top-level layers of the composition that are never visible at the
/// same time. Merges with higher scores between closer layers are tried
/// first. Returns the number of layers removed.
pub fn merge_layers(lottie: &mut LottieJson, config: &MergeConfig) -> ReduceResult<usize> {
    let before = lottie.layers.len();
    let duration = lottie.duration();
    let mut layers = renumber_layers(&lottie.layers, &mut IndexGenerator::default())?;
    let mut merger = LayerMerger::new(&lottie.assets);
    let mut merged_any = false;

    for min_score in config.score_schedule() {
        let mut max_gap = 1.0f32;
        loop {
            for _ in 0..config.max_passes {
                let count = layers.len();
                let mut graph = LayersGraph::new(layers_to_groups(&layers, |_, _| true));
                let mut threshold = ThresholdMerger {
                    merger: &mut merger,
                    min_score,
                    max_gap,
                };
                if graph.merge_all(&mut threshold) == 0 {
                    break;
                }
                layers = groups_to_layers(graph.layer_groups()?)?;
                merged_any = true;
                trace!(min_score, max_gap, layers = layers.len(), "merge pass");
                if layers.len() >= count {
                    break;
                }
            }

            max_gap *= 2.0;
            if max_gap >= duration {
                break;
            }
        }
    }

    if !merged_any {
        return Ok(0);
    }

    lottie.layers = layers;
    lottie.assets.extend(merger.into_generated());
    let removed_assets = remove_unused_assets(lottie);
    debug!(
        layers_before = before,
        layers_after = lottie.layers.len(),
        removed_assets,
        "merged layers"
    );
    Ok(before.saturating_sub(lottie.layers.len()))
}

/// Drops layer-collection assets that no layer reaches, directly or through
/// other assets. Returns the number of assets removed.
pub fn remove_unused_assets(lottie: &mut LottieJson) -> usize {
    let mut used: HashSet<String> = HashSet::new();
    let mut stack: Vec<String> = lottie
        .layers
        .iter()
        .filter_map(|l| l.ref_id.clone())
        .collect();

    while let Some(id) = stack.pop() {
        if !used.insert(id.clone()) {
            continue;
        }
        if let Some(layers) = lottie.asset(&id).and_then(|a| a.layers.as_ref()) {
            stack.extend(layers.iter().filter_map(|l| l.ref_id.clone()));
        }
    }

    let before = lottie.assets.len();
    lottie
        .assets
        .retain(|a| !a.is_layer_collection() || used.contains(&a.id));
    before - lottie.assets.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value as Json};

    fn layer(value: Json) -> Layer {
        serde_json::from_value(value).unwrap()
    }

    fn rect_layer(ind: u32, ip: f32, op: f32) -> Json {
        json!({
            "ty": 4, "ind": ind, "ip": ip, "op": op, "st": ip,
            "ks": { "o": { "a": 0, "k": 100 }, "p": { "a": 0, "k": [50, 50, 0] } },
            "shapes": [
                { "ty": "rc", "s": { "a": 0, "k": [10, 10] }, "p": { "a": 0, "k": [0, 0] }, "r": { "a": 0, "k": 0 } },
                { "ty": "fl", "c": { "a": 0, "k": [1, 0, 0] }, "o": { "a": 0, "k": 100 } }
            ]
        })
    }

    mod layers {
        use super::*;

        #[test]
        fn test_identical_adjacent_shape_layers_merge() {
            let a = layer(rect_layer(1, 0.0, 10.0));
            let b = layer(rect_layer(2, 10.0, 20.0));

            let result = LayerMerger::new(&[]).merge_layers(&b, &a, false);
            assert!(result.is_success());
            assert_eq!(result.score, 1.0);

            let merged = result.value.unwrap();
            assert_eq!((merged.ip, merged.op, merged.st), (0.0, 20.0, 0.0));
            let out = serde_json::to_value(&merged).unwrap();
            assert_eq!(out["ks"]["o"], json!({ "a": 0, "k": 100.0 }));
            assert_eq!(out["shapes"][0]["s"]["k"], json!([10.0, 10.0]));
        }

        #[test]
        fn test_gap_between_shape_layers_is_transparent() {
            let a = layer(rect_layer(1, 0.0, 10.0));
            let b = layer(rect_layer(2, 20.0, 30.0));

            let merged = LayerMerger::new(&[]).merge_layers(&a, &b, false).value.unwrap();
            let out = serde_json::to_value(&merged).unwrap();
            let opacity = &out["ks"]["o"]["k"];
            assert_eq!(opacity.as_array().map(|k| k.len()), Some(3));
            assert_eq!(opacity[0]["h"], json!(1));
            assert_eq!(opacity[1]["t"], json!(10.0));
            assert_eq!(opacity[1]["s"], json!([0.0]));
            assert_eq!(opacity[2]["t"], json!(20.0));
            assert_eq!(opacity[2]["s"], json!([100.0]));
        }

        #[test]
        fn test_animated_property_switches_with_hold() {
            let a = layer(json!({
                "ty": 3, "ind": 1, "ip": 0, "op": 10, "st": 0,
                "ks": { "r": { "a": 1, "k": [{ "t": 0, "s": [0] }, { "t": 10, "s": [90] }] } }
            }));
            let b = layer(json!({
                "ty": 3, "ind": 2, "ip": 10, "op": 20, "st": 10,
                "ks": { "r": { "a": 0, "k": 45 } }
            }));

            let merged = LayerMerger::new(&[]).merge_layers(&a, &b, false).value.unwrap();
            let out = serde_json::to_value(&merged).unwrap();
            let rotation = &out["ks"]["r"]["k"];
            assert_eq!(rotation.as_array().map(|k| k.len()), Some(3));
            assert_eq!(rotation[1]["h"], json!(1));
            assert_eq!(rotation[2]["t"], json!(10.0));
            assert_eq!(rotation[2]["s"], json!([45.0]));
        }

        #[test]
        fn test_different_static_values_do_not_merge() {
            let a = layer(json!({ "ty": 3, "ind": 1, "ip": 0, "op": 10, "ks": { "r": { "a": 0, "k": 0 } } }));
            let b = layer(json!({ "ty": 3, "ind": 2, "ip": 10, "op": 20, "st": 10, "ks": { "r": { "a": 0, "k": 5 } } }));
            assert!(!LayerMerger::new(&[]).merge_layers(&a, &b, false).is_success());
        }

        #[test]
        fn test_incompatible_layers_are_rejected() {
            let a = layer(rect_layer(1, 0.0, 10.0));

            let overlapping = layer(rect_layer(2, 5.0, 20.0));
            assert!(!LayerMerger::new(&[]).merge_layers(&a, &overlapping, false).is_success());

            let mut with_effects = rect_layer(2, 10.0, 20.0);
            with_effects["ef"] = json!([{ "ty": 5 }]);
            assert!(!LayerMerger::new(&[])
                .merge_layers(&a, &layer(with_effects), false)
                .is_success());

            let mut expression = rect_layer(2, 10.0, 20.0);
            expression["ks"]["o"]["x"] = json!("wiggle(1, 2)");
            assert!(!LayerMerger::new(&[])
                .merge_layers(&a, &layer(expression), false)
                .is_success());
        }
    }

    mod compositions {
        use super::*;

        fn icon() -> LottieJson {
            let content = rect_layer(1, 0.0, 10.0);
            serde_json::from_value(json!({
                "v": "5.7.0", "fr": 30, "ip": 0, "op": 20, "w": 100, "h": 100,
                "assets": [
                    { "id": "a", "layers": [content.clone()] },
                    { "id": "b", "layers": [content] },
                    { "id": "img", "w": 10, "h": 10, "p": "img.png" }
                ],
                "layers": [
                    { "ty": 0, "ind": 1, "refId": "a", "ip": 0, "op": 10, "st": 0, "w": 100, "h": 100,
                      "ks": { "o": { "a": 0, "k": 100 } } },
                    { "ty": 0, "ind": 2, "refId": "b", "ip": 10, "op": 20, "st": 10, "w": 100, "h": 100,
                      "ks": { "o": { "a": 0, "k": 100 } } }
                ]
            }))
            .unwrap()
        }

        #[test]
        fn test_precomp_assets_merge_into_generated_asset() {
            let lottie = icon();
            let mut merger = LayerMerger::new(&lottie.assets);
            let result = merger.merge_layers(&lottie.layers[0], &lottie.layers[1], false);

            assert!(result.is_success());
            assert_eq!(result.score, 1.0);
            let merged = result.value.unwrap();
            assert_eq!(merged.ref_id.as_deref(), Some("a b 0"));

            let asset = &merger.generated()[0];
            let layers = asset.layers.as_ref().unwrap();
            assert_eq!(layers.len(), 1);
            assert_eq!((layers[0].ip, layers[0].op), (0.0, 20.0));
            assert_eq!(layers[0].ind, Some(1));
        }

        #[test]
        fn test_merge_layers_rewrites_composition() {
            let mut lottie = icon();
            let removed = merge_layers(&mut lottie, &MergeConfig::default()).unwrap();

            assert_eq!(removed, 1);
            assert_eq!(lottie.layers.len(), 1);
            assert_eq!(lottie.layers[0].ref_id.as_deref(), Some("a b 0"));

            let ids: Vec<_> = lottie.assets.iter().map(|a| a.id.as_str()).collect();
            assert_eq!(ids, vec!["img", "a b 0"]);
        }

        #[test]
        fn test_nothing_to_merge_leaves_composition_alone() {
            let mut lottie = icon();
            lottie.layers[1].w = Some(50);
            lottie.layers[1].ind = Some(7);

            assert_eq!(merge_layers(&mut lottie, &MergeConfig::default()).unwrap(), 0);
            assert_eq!(lottie.layers[1].ind, Some(7));
            assert_eq!(lottie.assets.len(), 3);
        }

        #[test]
        fn test_unused_assets_are_found_through_nested_precomps() {
            let mut lottie: LottieJson = serde_json::from_value(json!({
                "fr": 30, "ip": 0, "op": 10, "w": 10, "h": 10,
                "assets": [
                    { "id": "outer", "layers": [{ "ty": 0, "ind": 1, "refId": "inner", "ip": 0, "op": 10 }] },
                    { "id": "inner", "layers": [] },
                    { "id": "orphan", "layers": [] }
                ],
                "layers": [{ "ty": 0, "ind": 1, "refId": "outer", "ip": 0, "op": 10 }]
            }))
            .unwrap();

            assert_eq!(remove_unused_assets(&mut lottie), 1);
            let ids: Vec<_> = lottie.assets.iter().map(|a| a.id.as_str()).collect();
            assert_eq!(ids, vec!["outer", "inner"]);
        }
    }
}
