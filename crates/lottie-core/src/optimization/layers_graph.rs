use super::layer_group::{IndexGenerator, LayerGroup, LayersIndexMapper, MergeResult};
use crate::error::ReduceResult;
use tracing::trace;

/// Something that can try to merge two layer groups into one.
pub trait GroupMerger {
    fn merge_groups(&mut self, a: &LayerGroup, b: &LayerGroup) -> MergeResult<LayerGroup>;
}

impl<F> GroupMerger for F
where
    F: FnMut(&LayerGroup, &LayerGroup) -> MergeResult<LayerGroup>,
{
    fn merge_groups(&mut self, a: &LayerGroup, b: &LayerGroup) -> MergeResult<LayerGroup> {
        self(a, b)
    }
}

#[derive(Debug)]
struct GraphNode {
    group: LayerGroup,
    /// Earlier groups whose time range overlaps this one and must stay above it.
    parents: Vec<usize>,
    merged_with: Option<usize>,
    merged_group: Option<LayerGroup>,
}

/// Z-order constraints between layer groups of one layer list.
///
/// A group is a child of every earlier group it overlaps in time, directly or
/// through other groups. Groups that are not related in either direction can
/// be reordered, and so can be merged, without changing what is drawn.
#[derive(Debug)]
pub struct LayersGraph {
    nodes: Vec<GraphNode>,
}

impl LayersGraph {
    pub fn new(groups: Vec<LayerGroup>) -> Self {
        let mut graph = LayersGraph {
            nodes: Vec::with_capacity(groups.len()),
        };

        for group in groups {
            let range = group.range();
            let mut parents: Vec<usize> = Vec::new();

            // Newest first, so transitive parents are already reachable and no
            // redundant links are added.
            for other in (0..graph.nodes.len()).rev() {
                let already_child = parents.contains(&other) || graph.reaches(&parents, other, false);
                if !already_child && graph.nodes[other].group.range().intersects(&range) {
                    parents.push(other);
                }
            }

            graph.nodes.push(GraphNode {
                group,
                parents,
                merged_with: None,
                merged_group: None,
            });
        }

        graph
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether `node` has `ancestor` among its direct or indirect parents.
    pub fn is_child_of(&self, node: usize, ancestor: usize) -> bool {
        self.reaches(&self.nodes[node].parents, ancestor, false)
    }

    // Merged pairs count as one node when `contracted` is set.
    fn class_of(&self, node: usize, contracted: bool) -> usize {
        match self.nodes[node].merged_with {
            Some(partner) if contracted => node.min(partner),
            _ => node,
        }
    }

    fn reaches(&self, roots: &[usize], target: usize, contracted: bool) -> bool {
        let target = self.class_of(target, contracted);
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = roots.to_vec();

        while let Some(node) = stack.pop() {
            if self.class_of(node, contracted) == target {
                return true;
            }
            if visited[node] {
                continue;
            }
            visited[node] = true;

            stack.extend_from_slice(&self.nodes[node].parents);
            if contracted {
                if let Some(partner) = self.nodes[node].merged_with {
                    stack.extend_from_slice(&self.nodes[partner].parents);
                }
            }
        }
        false
    }

    /// Pairs of mergeable groups with no ordering constraint between them.
    pub fn merge_candidates(&self) -> Vec<(usize, usize)> {
        let mut candidates = Vec::new();
        for i in 0..self.nodes.len() {
            if !self.nodes[i].group.can_be_merged {
                continue;
            }
            for j in i + 1..self.nodes.len() {
                if !self.nodes[j].group.can_be_merged {
                    continue;
                }
                if !self.is_child_of(i, j) && !self.is_child_of(j, i) {
                    candidates.push((i, j));
                }
            }
        }
        candidates
    }

    /// Merges unrelated groups pairwise, best score first. Each group takes
    /// part in at most one merge, and a merge that would make the constraints
    /// cyclic is skipped. Returns the number of merges.
    pub fn merge_all<M: GroupMerger + ?Sized>(&mut self, merger: &mut M) -> usize {
        let mut merges: Vec<(usize, usize, MergeResult<LayerGroup>)> = self
            .merge_candidates()
            .into_iter()
            .filter_map(|(a, b)| {
                let result = merger.merge_groups(&self.nodes[a].group, &self.nodes[b].group);
                result.is_success().then_some((a, b, result))
            })
            .collect();
        merges.sort_by(|x, y| y.2.score.total_cmp(&x.2.score));

        let mut merged = 0;
        for (a, b, result) in merges {
            if self.nodes[a].merged_with.is_some() || self.nodes[b].merged_with.is_some() {
                continue;
            }
            if self.reaches(&self.nodes[a].parents, b, true)
                || self.reaches(&self.nodes[b].parents, a, true)
            {
                trace!(a, b, "merge skipped: would reorder overlapping layers");
                continue;
            }

            trace!(a, b, score = result.score, "merged layer groups");
            self.nodes[a].merged_with = Some(b);
            self.nodes[b].merged_with = Some(a);
            self.nodes[a].merged_group = result.value.clone();
            self.nodes[b].merged_group = result.value;
            merged += 1;
        }
        merged
    }

    /// All groups in an order that respects every constraint, merged pairs
    /// replaced by their merged group, with layer indices renumbered from 1 in
    /// list order.
    pub fn layer_groups(&self) -> ReduceResult<Vec<LayerGroup>> {
        enum Step {
            Visit(usize),
            Emit(usize),
        }

        let mut visited = vec![false; self.nodes.len()];
        let mut ordered: Vec<&LayerGroup> = Vec::with_capacity(self.nodes.len());
        let mut mapper = LayersIndexMapper::default();
        let mut generator = IndexGenerator::default();

        for root in 0..self.nodes.len() {
            let mut stack = vec![Step::Visit(root)];
            while let Some(step) = stack.pop() {
                match step {
                    Step::Visit(i) => {
                        if visited[i] {
                            continue;
                        }
                        visited[i] = true;
                        let node = &self.nodes[i];
                        if let Some(partner) = node.merged_with {
                            visited[partner] = true;
                        }

                        stack.push(Step::Emit(i));
                        if let Some(partner) = node.merged_with {
                            for &p in self.nodes[partner].parents.iter().rev() {
                                stack.push(Step::Visit(p));
                            }
                        }
                        for &p in node.parents.iter().rev() {
                            stack.push(Step::Visit(p));
                        }
                    }
                    Step::Emit(i) => {
                        let node = &self.nodes[i];
                        let partner = node.merged_with.map(|p| &self.nodes[p]);

                        let mattes = [Some(node), partner]
                            .into_iter()
                            .flatten()
                            .filter_map(|n| n.group.matte.as_ref().and_then(|m| m.ind));
                        let mut matte_index = None;
                        for old in mattes {
                            let index = *matte_index.get_or_insert_with(|| generator.next_index());
                            mapper.set_mapping(old, index);
                        }

                        let index = generator.next_index();
                        let mains = [Some(node), partner]
                            .into_iter()
                            .flatten()
                            .filter_map(|n| n.group.main.ind);
                        for old in mains {
                            mapper.set_mapping(old, index);
                        }

                        ordered.push(node.merged_group.as_ref().unwrap_or(&node.group));
                    }
                }
            }
        }

        ordered
            .into_iter()
            .map(|group| mapper.remap_group(group))
            .collect()
    }
}
