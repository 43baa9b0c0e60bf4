use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Treat objects that differ only in their comment as equal.
    pub ignore_comment_properties: bool,
    pub compactor: CompactorConfig,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            ignore_comment_properties: false,
            compactor: CompactorConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactorConfig {
    /// Compaction iterations allowed before the compactor gives up. Every
    /// iteration that does not reach the fixed point shrinks or reorders the
    /// tree, so real scenes settle long before this.
    pub max_iterations: usize,
}

impl Default for CompactorConfig {
    fn default() -> Self {
        Self { max_iterations: 64 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: OptimizerConfig =
            serde_json::from_str(r#"{ "ignore_comment_properties": true }"#).unwrap();
        assert!(config.ignore_comment_properties);
        assert_eq!(config.compactor.max_iterations, 64);
    }
}
