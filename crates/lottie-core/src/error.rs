pub type ReduceResult<T> = Result<T, ReduceError>;

#[derive(thiserror::Error, Debug)]
pub enum ReduceError {
    /// A structure produced by an optimization pass is inconsistent.
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// Input that an optimization cannot work with.
    #[error("malformed input: {0}")]
    Malformed(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReduceError {
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert_eq!(
            ReduceError::invariant("index 3 has no mapping").to_string(),
            "invariant violated: index 3 has no mapping"
        );
        assert_eq!(
            ReduceError::malformed("layer 2 has no ind").to_string(),
            "malformed input: layer 2 has no ind"
        );
    }

    #[test]
    fn other_preserves_source() {
        let err = ReduceError::from(anyhow::anyhow!("disk on fire"));
        assert_eq!(err.to_string(), "disk on fire");
    }
}
