use crate::error::{ReduceError, ReduceResult};
use lottie_data::model::Layer;
use std::collections::HashMap;

/// Half-open frame interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    pub start: f32,
    pub end: f32,
}

impl TimeRange {
    pub fn new(start: f32, end: f32) -> Self {
        Self { start, end }
    }

    /// Frames during which the layer is rendered.
    pub fn of_layer(layer: &Layer) -> Self {
        Self::new(layer.ip, layer.op)
    }

    /// True when the ranges share a frame; touching ranges do not intersect.
    pub fn intersects(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn shift_left(&self, by: f32) -> Self {
        Self::new(self.start - by, self.end - by)
    }
}

/// A layer together with the matte layer that has to stay directly above it.
#[derive(Debug, Clone)]
pub struct LayerGroup {
    pub main: Layer,
    pub matte: Option<Layer>,
    pub can_be_merged: bool,
}

impl LayerGroup {
    pub fn new(main: Layer, matte: Option<Layer>, can_be_merged: bool) -> Self {
        Self {
            main,
            matte,
            can_be_merged,
        }
    }

    pub fn range(&self) -> TimeRange {
        TimeRange::of_layer(&self.main)
    }
}

/// Pairs every layer that uses a track matte with the matte layer above it.
pub fn layers_to_groups<F>(layers: &[Layer], mut can_be_merged: F) -> Vec<LayerGroup>
where
    F: FnMut(&Layer, Option<&Layer>) -> bool,
{
    let mut groups = Vec::with_capacity(layers.len());
    let mut i = 0;
    while i < layers.len() {
        match layers.get(i + 1) {
            Some(main) if main.has_matte() => {
                let matte = &layers[i];
                let mergeable = can_be_merged(main, Some(matte));
                groups.push(LayerGroup::new(main.clone(), Some(matte.clone()), mergeable));
                i += 2;
            }
            _ => {
                let main = &layers[i];
                let mergeable = can_be_merged(main, None);
                groups.push(LayerGroup::new(main.clone(), None, mergeable));
                i += 1;
            }
        }
    }
    groups
}

/// Flattens groups back into a layer list, each matte directly before its
/// main layer. Indices must come out strictly ascending.
pub fn groups_to_layers(groups: Vec<LayerGroup>) -> ReduceResult<Vec<Layer>> {
    let mut layers = Vec::with_capacity(groups.len() * 2);
    for group in groups {
        if let Some(matte) = group.matte {
            layers.push(matte);
        }
        layers.push(group.main);
    }

    for pair in layers.windows(2) {
        if pair[0].ind >= pair[1].ind {
            return Err(ReduceError::invariant(format!(
                "layer indices out of order: {:?} before {:?}",
                pair[0].ind, pair[1].ind
            )));
        }
    }
    Ok(layers)
}

/// Outcome of trying to merge two things, scored in `0..=1` by how much the
/// merge shrinks the result.
#[derive(Debug, Clone)]
pub struct MergeResult<T> {
    pub value: Option<T>,
    pub score: f64,
}

impl<T> MergeResult<T> {
    pub fn success(value: T) -> Self {
        Self::with_score(value, 1.0)
    }

    pub fn with_score(value: T, score: f64) -> Self {
        Self {
            value: Some(value),
            score,
        }
    }

    pub fn failed() -> Self {
        Self {
            value: None,
            score: 0.0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.value.is_some()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> MergeResult<U> {
        MergeResult {
            value: self.value.map(f),
            score: self.score,
        }
    }
}

/// Hands out consecutive layer indices starting at 1.
#[derive(Debug)]
pub struct IndexGenerator {
    next: u32,
}

impl Default for IndexGenerator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl IndexGenerator {
    pub fn next_index(&mut self) -> u32 {
        let index = self.next;
        self.next += 1;
        index
    }
}

/// Old-to-new layer index table, applied to `ind` and `parent` together.
#[derive(Debug, Default)]
pub struct LayersIndexMapper {
    mapping: HashMap<u32, u32>,
}

impl LayersIndexMapper {
    pub fn set_mapping(&mut self, old: u32, new: u32) {
        self.mapping.insert(old, new);
    }

    fn get(&self, old: u32) -> ReduceResult<u32> {
        self.mapping
            .get(&old)
            .copied()
            .ok_or_else(|| ReduceError::invariant(format!("layer index {old} has no mapping")))
    }

    pub fn remap_layer(&self, layer: &Layer) -> ReduceResult<Layer> {
        let mut out = layer.clone();
        let ind = layer
            .ind
            .ok_or_else(|| ReduceError::malformed("layer without an index"))?;
        out.ind = Some(self.get(ind)?);
        out.parent = layer.parent.map(|p| self.get(p)).transpose()?;
        Ok(out)
    }

    pub fn remap_group(&self, group: &LayerGroup) -> ReduceResult<LayerGroup> {
        Ok(LayerGroup {
            main: self.remap_layer(&group.main)?,
            matte: group.matte.as_ref().map(|m| self.remap_layer(m)).transpose()?,
            can_be_merged: group.can_be_merged,
        })
    }
}

/// Renumbers a layer list with indices from `generator`, keeping parent links.
/// Layers without an index get one; a parent outside the list is an error.
pub fn renumber_layers(layers: &[Layer], generator: &mut IndexGenerator) -> ReduceResult<Vec<Layer>> {
    let mut mapper = LayersIndexMapper::default();
    let mut fresh = Vec::with_capacity(layers.len());
    for layer in layers {
        let index = generator.next_index();
        if let Some(old) = layer.ind {
            if mapper.mapping.contains_key(&old) {
                return Err(ReduceError::malformed(format!("duplicate layer index {old}")));
            }
            mapper.set_mapping(old, index);
        }
        fresh.push(index);
    }

    layers
        .iter()
        .zip(fresh)
        .map(|(layer, index)| {
            let mut out = layer.clone();
            out.ind = Some(index);
            out.parent = layer.parent.map(|p| mapper.get(p)).transpose()?;
            Ok(out)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn layer(ind: u32, tt: Option<u8>, parent: Option<u32>) -> Layer {
        let mut value = json!({ "ty": 4, "ind": ind, "ip": 0, "op": 10, "st": 0 });
        if let Some(tt) = tt {
            value["tt"] = json!(tt);
        }
        if let Some(parent) = parent {
            value["parent"] = json!(parent);
        }
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_matte_pairs_are_grouped() {
        let layers = vec![
            layer(1, None, None),
            layer(2, None, None),
            layer(3, Some(1), None),
            layer(4, None, None),
        ];
        let groups = layers_to_groups(&layers, |main, _| main.ind != Some(4));

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[1].matte.as_ref().and_then(|m| m.ind), Some(2));
        assert_eq!(groups[1].main.ind, Some(3));
        assert!(!groups[2].can_be_merged);

        let back = groups_to_layers(groups).unwrap();
        let inds: Vec<_> = back.iter().map(|l| l.ind).collect();
        assert_eq!(inds, vec![Some(1), Some(2), Some(3), Some(4)]);
    }

    #[test]
    fn test_groups_to_layers_rejects_unordered_indices() {
        let groups = vec![
            LayerGroup::new(layer(2, None, None), None, true),
            LayerGroup::new(layer(1, None, None), None, true),
        ];
        assert!(matches!(
            groups_to_layers(groups),
            Err(ReduceError::Invariant(_))
        ));
    }

    #[test]
    fn test_renumber_keeps_parent_links() {
        let layers = vec![layer(10, None, None), layer(7, None, Some(10))];
        let mut generator = IndexGenerator::default();
        generator.next_index();

        let out = renumber_layers(&layers, &mut generator).unwrap();
        assert_eq!(out[0].ind, Some(2));
        assert_eq!(out[1].ind, Some(3));
        assert_eq!(out[1].parent, Some(2));
        assert_eq!(generator.next_index(), 4);
    }

    #[test]
    fn test_renumber_rejects_dangling_parent() {
        let layers = vec![layer(1, None, Some(99))];
        let result = renumber_layers(&layers, &mut IndexGenerator::default());
        assert!(matches!(result, Err(ReduceError::Invariant(_))));
    }

    #[test]
    fn test_touching_ranges_do_not_intersect() {
        let a = TimeRange::new(0.0, 10.0);
        assert!(!a.intersects(&TimeRange::new(10.0, 20.0)));
        assert!(a.intersects(&TimeRange::new(9.5, 20.0)));
        assert_eq!(a.shift_left(5.0), TimeRange::new(-5.0, 5.0));
    }
}
