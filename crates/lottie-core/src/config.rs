use serde::{Deserialize, Serialize};

/// Which composition-level reductions run, and how aggressively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReductionConfig {
    /// Drop keyframes outside the window in which each layer is rendered.
    pub trim_to_layer_window: bool,
    pub reduce_keyframes: bool,
    pub reduce_gradients: bool,
    /// Collapse repeated precomp layers of the `<state>_Start`/`<state>_End` icon pattern.
    pub collapse_precomps: bool,
    /// Merge layers that never overlap in time into one layer.
    pub merge_layers: bool,
    pub merge: MergeConfig,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            trim_to_layer_window: true,
            reduce_keyframes: true,
            reduce_gradients: true,
            collapse_precomps: true,
            merge_layers: false,
            merge: MergeConfig::default(),
        }
    }
}

/// Schedule of the layer merge: scores are tried from `initial_score` down to
/// `final_score`, multiplying by `score_decay` each round, and for each score
/// the allowed gap between layers doubles from one frame up to the
/// composition length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub initial_score: f64,
    pub score_decay: f64,
    pub final_score: f64,
    /// Upper bound on graph passes per schedule step.
    pub max_passes: usize,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            initial_score: 0.95,
            score_decay: 0.8,
            final_score: 0.1,
            max_passes: 64,
        }
    }
}

impl MergeConfig {
    /// Minimum scores in the order they are tried.
    pub fn score_schedule(&self) -> Vec<f64> {
        let mut scores = Vec::new();
        if !(self.score_decay > 0.0 && self.score_decay < 1.0) {
            scores.push(self.final_score);
            return scores;
        }
        let mut score = self.initial_score;
        while score > self.final_score {
            scores.push(score);
            score *= self.score_decay;
        }
        scores
    }
}
