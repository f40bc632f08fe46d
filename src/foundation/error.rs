pub type StoryResult<T> = Result<T, StoryError>;

/// Failures that abort a composition.
///
/// Recoverable conditions (missing font, clustering failure, oversized words) are never reported
/// through this type; they degrade locally and show up in
/// [`CompositionMetadata::degraded_flags`](crate::CompositionMetadata::degraded_flags).
#[derive(thiserror::Error, Debug)]
pub enum StoryError {
    #[error("decode error: {0}")]
    Decode(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoryError {
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// `true` when the input image itself was unusable.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}
