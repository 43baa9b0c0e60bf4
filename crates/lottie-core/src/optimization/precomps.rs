use lottie_data::model::{Layer, LottieJson, Marker};
use serde_json::Value;
use tracing::debug;

const START_SUFFIX: &str = "_Start";
const END_SUFFIX: &str = "_End";

/// Collapses a composition made of back-to-back precomp layers, as exported
/// for state-machine icons where every state is delimited by a
/// `<state>_Start`/`<state>_End` marker pair.
///
/// Layers that repeat an earlier layer's content are dropped and their markers
/// are moved onto the kept copy. The remaining layers are packed end to end.
/// Returns `false` and leaves the composition untouched when it does not
/// follow the pattern.
pub fn collapse_precomps(lottie: &mut LottieJson) -> bool {
    let Some(plan) = plan_collapse(lottie) else {
        return false;
    };

    let (Some(first), Some(last)) = (plan.kept.first(), plan.kept.last()) else {
        return false;
    };
    let (ip, op) = (first.ip, last.op);

    debug!(
        layers_before = lottie.layers.len(),
        layers_after = plan.kept.len(),
        ip,
        op,
        "collapsed precomp layers"
    );

    lottie.ip = ip;
    lottie.op = op;
    lottie.layers = plan.kept;
    lottie.markers = plan.markers;
    true
}

struct CollapsePlan {
    kept: Vec<Layer>,
    markers: Vec<Marker>,
}

fn plan_collapse(lottie: &LottieJson) -> Option<CollapsePlan> {
    let layers = &lottie.layers;
    if layers.is_empty() || layers.iter().any(|l| !l.is_precomp() || l.parent.is_some()) {
        return None;
    }

    let mut sorted: Vec<&Layer> = layers.iter().collect();
    sorted.sort_by(|a, b| a.ip.total_cmp(&b.ip));
    if sorted.windows(2).any(|w| w[0].op > w[1].ip) {
        return None;
    }

    if !markers_follow_pattern(&lottie.markers) {
        return None;
    }

    let mut kept: Vec<Layer> = Vec::new();
    let mut offsets = Vec::with_capacity(sorted.len());
    for layer in &sorted {
        if let Some(same) = kept.iter().find(|k| is_repeat_of(layer, k)) {
            offsets.push(same.ip - layer.ip);
            continue;
        }
        let offset = match kept.last() {
            None => -layer.ip,
            Some(previous) => previous.op - layer.ip,
        };
        offsets.push(offset);
        kept.push(layer.with_time_offset(offset));
    }

    let mut markers = lottie.markers.clone();
    for (start_index, start) in lottie.markers.iter().enumerate() {
        let Some(state) = start.name().strip_suffix(START_SUFFIX) else {
            continue;
        };
        let end_name = format!("{state}{END_SUFFIX}");
        let end_index = lottie.markers.iter().position(|m| m.name() == end_name)?;
        let end = &lottie.markers[end_index];

        let (from, to) = (start.frame(), end.frame());
        let owner = sorted
            .iter()
            .position(|l| l.ip <= from && from <= to && to <= l.op)?;

        let offset = offsets[owner];
        markers[start_index] = start.with_time_offset(offset);
        markers[end_index] = end.with_time_offset(offset);
    }

    Some(CollapsePlan { kept, markers })
}

fn markers_follow_pattern(markers: &[Marker]) -> bool {
    let starts = markers
        .iter()
        .filter(|m| m.name().ends_with(START_SUFFIX))
        .count();
    let ends = markers
        .iter()
        .filter(|m| m.name().ends_with(END_SUFFIX))
        .count();
    starts + ends == markers.len() && starts == ends
}

/// `layer` shows the same thing as `kept` for its whole duration: same asset,
/// same properties, same local start and no longer than `kept`.
fn is_repeat_of(layer: &Layer, kept: &Layer) -> bool {
    if layer.ref_id.is_none() || layer.ref_id != kept.ref_id {
        return false;
    }
    if layer.ip - layer.st != kept.ip - kept.st || layer.op - layer.ip > kept.op - kept.ip {
        return false;
    }
    match (content_of(layer), content_of(kept)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

// Layer JSON without its placement in the composition.
fn content_of(layer: &Layer) -> Option<Value> {
    let mut json = serde_json::to_value(layer).ok()?;
    if let Some(obj) = json.as_object_mut() {
        for key in ["ip", "op", "st", "ind", "nm"] {
            obj.remove(key);
        }
    }
    Some(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn precomp(ind: u32, ref_id: &str, ip: f32, op: f32) -> Value {
        json!({ "ty": 0, "ind": ind, "refId": ref_id, "ip": ip, "op": op, "st": ip,
                "w": 24, "h": 24, "ks": { "o": { "a": 0, "k": 100 } } })
    }

    fn icon(layers: Vec<Value>, markers: Value) -> LottieJson {
        serde_json::from_value(json!({
            "v": "5.7.0", "fr": 30, "ip": 0, "op": 30, "w": 24, "h": 24,
            "layers": layers,
            "assets": [{ "id": "A", "layers": [] }, { "id": "B", "layers": [] }],
            "markers": markers
        }))
        .unwrap()
    }

    fn marker_frames(lottie: &LottieJson) -> Vec<(String, f32)> {
        lottie
            .markers
            .iter()
            .map(|m| (m.name().to_string(), m.frame()))
            .collect()
    }

    // A later state folds onto an earlier one only when the whole layer
    // matches apart from its placement, the local start is the same and it is
    // no longer than the kept copy. A shared `refId` alone is not enough.
    #[test]
    fn repeated_state_is_folded_onto_first_copy() {
        let mut lottie = icon(
            vec![
                precomp(1, "A", 0.0, 10.0),
                precomp(2, "B", 10.0, 20.0),
                precomp(3, "A", 20.0, 30.0),
            ],
            json!([
                { "cm": "S1_Start", "tm": 0, "dr": 0 },
                { "cm": "S1_End", "tm": 10, "dr": 0 },
                { "cm": "S2_Start", "tm": 10, "dr": 0 },
                { "cm": "S2_End", "tm": 20, "dr": 0 },
                { "cm": "S3_Start", "tm": 20, "dr": 0 },
                { "cm": "S3_End", "tm": 30, "dr": 0 }
            ]),
        );

        assert!(collapse_precomps(&mut lottie));

        assert_eq!(lottie.layers.len(), 2);
        assert_eq!(lottie.layers[0].ref_id.as_deref(), Some("A"));
        assert_eq!((lottie.layers[0].ip, lottie.layers[0].op), (0.0, 10.0));
        assert_eq!(lottie.layers[1].ref_id.as_deref(), Some("B"));
        assert_eq!((lottie.layers[1].ip, lottie.layers[1].op), (10.0, 20.0));
        assert_eq!((lottie.ip, lottie.op), (0.0, 20.0));

        assert_eq!(
            marker_frames(&lottie),
            vec![
                ("S1_Start".to_string(), 0.0),
                ("S1_End".to_string(), 10.0),
                ("S2_Start".to_string(), 10.0),
                ("S2_End".to_string(), 20.0),
                ("S3_Start".to_string(), 0.0),
                ("S3_End".to_string(), 10.0),
            ]
        );
    }

    #[test]
    fn gaps_between_states_are_closed() {
        let mut lottie = icon(
            vec![precomp(1, "A", 5.0, 10.0), precomp(2, "B", 15.0, 25.0)],
            json!([
                { "cm": "a_Start", "tm": 5 }, { "cm": "a_End", "tm": 10 },
                { "cm": "b_Start", "tm": 15 }, { "cm": "b_End", "tm": 25 }
            ]),
        );

        assert!(collapse_precomps(&mut lottie));
        let windows: Vec<_> = lottie.layers.iter().map(|l| (l.ip, l.op, l.st)).collect();
        assert_eq!(windows, vec![(0.0, 5.0, 0.0), (5.0, 15.0, 5.0)]);
        assert_eq!(
            marker_frames(&lottie),
            vec![
                ("a_Start".to_string(), 0.0),
                ("a_End".to_string(), 5.0),
                ("b_Start".to_string(), 5.0),
                ("b_End".to_string(), 15.0),
            ]
        );
    }

    #[test]
    fn longer_repeat_of_a_state_is_kept() {
        let mut lottie = icon(
            vec![precomp(1, "A", 0.0, 10.0), precomp(2, "A", 10.0, 25.0)],
            json!([
                { "cm": "x_Start", "tm": 0 }, { "cm": "x_End", "tm": 10 },
                { "cm": "y_Start", "tm": 10 }, { "cm": "y_End", "tm": 25 }
            ]),
        );

        collapse_precomps(&mut lottie);
        let windows: Vec<_> = lottie.layers.iter().map(|l| (l.ip, l.op)).collect();
        assert_eq!(windows, vec![(0.0, 10.0), (10.0, 25.0)]);
    }

    #[test]
    fn same_asset_with_different_transform_is_kept() {
        let mut second = precomp(2, "A", 10.0, 20.0);
        second["ks"]["o"]["k"] = json!(50);
        let mut lottie = icon(
            vec![precomp(1, "A", 0.0, 10.0), second],
            json!([
                { "cm": "x_Start", "tm": 0 }, { "cm": "x_End", "tm": 10 },
                { "cm": "y_Start", "tm": 10 }, { "cm": "y_End", "tm": 20 }
            ]),
        );

        assert!(collapse_precomps(&mut lottie));
        assert_eq!(lottie.layers.len(), 2);
    }

    #[test]
    fn overlapping_layers_are_not_collapsed() {
        let mut lottie = icon(
            vec![precomp(1, "A", 0.0, 15.0), precomp(2, "B", 10.0, 20.0)],
            json!([]),
        );
        assert!(!collapse_precomps(&mut lottie));
        assert_eq!(lottie.layers.len(), 2);
    }

    #[test]
    fn unexpected_marker_names_disable_collapse() {
        let layers = vec![precomp(1, "A", 0.0, 10.0), precomp(2, "A", 10.0, 20.0)];

        let mut unnamed = icon(layers.clone(), json!([{ "cm": "intro", "tm": 0 }]));
        assert!(!collapse_precomps(&mut unnamed));

        let mut unpaired = icon(layers.clone(), json!([{ "cm": "a_Start", "tm": 0 }]));
        assert!(!collapse_precomps(&mut unpaired));

        let mut straddling = icon(
            layers,
            json!([{ "cm": "a_Start", "tm": 5 }, { "cm": "a_End", "tm": 15 }]),
        );
        assert!(!collapse_precomps(&mut straddling));
        assert_eq!(straddling.layers.len(), 2);
    }

    #[test]
    fn non_precomp_layers_disable_collapse() {
        let mut lottie = icon(
            vec![
                precomp(1, "A", 0.0, 10.0),
                json!({ "ty": 4, "ind": 2, "ip": 10, "op": 20, "st": 10, "shapes": [] }),
            ],
            json!([]),
        );
        assert!(!collapse_precomps(&mut lottie));
    }
}
