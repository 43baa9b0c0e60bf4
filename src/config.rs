use anyhow::{Context, Result};
use lottie_core::ReductionConfig;
use scene_core::OptimizerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings file accepted by `--config`. Either section may be left out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub reduction: ReductionConfig,
    pub optimizer: OptimizerConfig,
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{ "optimizer": { "compactor": { "max_iterations": 8 } } }"#)
                .unwrap();
        assert_eq!(settings.reduction, ReductionConfig::default());
        assert_eq!(settings.optimizer.compactor.max_iterations, 8);
        assert!(!settings.optimizer.ignore_comment_properties);
    }

    #[test]
    fn no_path_means_defaults() {
        assert_eq!(Settings::load(None).unwrap(), Settings::default());
    }
}
