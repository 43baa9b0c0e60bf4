use crate::object::ObjectId;

pub type SceneResult<T> = Result<T, SceneError>;

#[derive(thiserror::Error, Debug)]
pub enum SceneError {
    /// The scene or a pass over it broke one of the graph's rules.
    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("unknown object: {0}")]
    UnknownObject(ObjectId),

    #[error("cannot evaluate: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SceneError {
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert_eq!(
            SceneError::invariant("key frames out of order").to_string(),
            "invariant violated: key frames out of order"
        );
        assert_eq!(
            SceneError::UnknownObject(ObjectId(12)).to_string(),
            "unknown object: #12"
        );
        assert_eq!(
            SceneError::unsupported("expression animation").to_string(),
            "cannot evaluate: expression animation"
        );
    }

    #[test]
    fn other_preserves_source() {
        let err = SceneError::from(anyhow::anyhow!("out of arena"));
        assert_eq!(err.to_string(), "out of arena");
    }
}
