pub type VidstyleResult<T> = Result<T, VidstyleError>;

#[derive(thiserror::Error, Debug)]
pub enum VidstyleError {
    #[error("source unreadable: {0}")]
    SourceUnreadable(String),

    #[error("unsupported style: {0}")]
    UnsupportedStyle(String),

    #[error("transform failed at frame {frame_index}: {message}")]
    TransformFailure { frame_index: u64, message: String },

    #[error("encode failure: {0}")]
    EncodeFailure(String),

    #[error("audio degraded: {0}")]
    AudioDegraded(String),

    #[error("cleanup failure: {0}")]
    CleanupFailure(String),

    #[error("run cancelled")]
    Cancelled,

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VidstyleError {
    pub fn source_unreadable(msg: impl Into<String>) -> Self {
        Self::SourceUnreadable(msg.into())
    }

    pub fn unsupported_style(msg: impl Into<String>) -> Self {
        Self::UnsupportedStyle(msg.into())
    }

    pub fn transform(frame_index: u64, msg: impl Into<String>) -> Self {
        Self::TransformFailure {
            frame_index,
            message: msg.into(),
        }
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::EncodeFailure(msg.into())
    }

    pub fn audio_degraded(msg: impl Into<String>) -> Self {
        Self::AudioDegraded(msg.into())
    }

    pub fn cleanup(msg: impl Into<String>) -> Self {
        Self::CleanupFailure(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether this error terminates a run with a reported failure.
    ///
    /// `AudioDegraded` and `CleanupFailure` are only ever logged, and `Cancelled` is a
    /// terminal outcome of its own.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::AudioDegraded(_) | Self::CleanupFailure(_) | Self::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            VidstyleError::source_unreadable("x")
                .to_string()
                .contains("source unreadable:")
        );
        assert!(
            VidstyleError::unsupported_style("x")
                .to_string()
                .contains("unsupported style:")
        );
        assert!(
            VidstyleError::transform(7, "x")
                .to_string()
                .contains("transform failed at frame 7:")
        );
        assert!(
            VidstyleError::encode("x")
                .to_string()
                .contains("encode failure:")
        );
        assert!(
            VidstyleError::validation("x")
                .to_string()
                .contains("validation error:")
        );
    }

    #[test]
    fn degraded_outcomes_are_not_fatal() {
        assert!(!VidstyleError::audio_degraded("no track").is_fatal());
        assert!(!VidstyleError::cleanup("busy").is_fatal());
        assert!(!VidstyleError::Cancelled.is_fatal());
        assert!(VidstyleError::encode("x").is_fatal());
        assert!(VidstyleError::transform(0, "x").is_fatal());
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = VidstyleError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
