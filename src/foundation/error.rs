use std::path::PathBuf;

pub type StoryreelResult<T> = Result<T, StoryreelError>;

#[derive(thiserror::Error, Debug)]
pub enum StoryreelError {
    #[error("empty input: {0}")]
    EmptyInput(String),

    #[error("missing {what} '{}'", path.display())]
    MissingAsset { what: &'static str, path: PathBuf },

    #[error("render backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("encoder unavailable: {0}")]
    EncoderUnavailable(String),

    #[error("no render strategy available (primary: {primary}; fallback: {fallback})")]
    NoRenderer { primary: String, fallback: String },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("probe error: {0}")]
    Probe(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoryreelError {
    pub fn empty_input(msg: impl Into<String>) -> Self {
        Self::EmptyInput(msg.into())
    }

    pub fn missing_asset(what: &'static str, path: impl Into<PathBuf>) -> Self {
        Self::MissingAsset {
            what,
            path: path.into(),
        }
    }

    pub fn backend_unavailable(msg: impl Into<String>) -> Self {
        Self::BackendUnavailable(msg.into())
    }

    pub fn encoder_unavailable(msg: impl Into<String>) -> Self {
        Self::EncoderUnavailable(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn probe(msg: impl Into<String>) -> Self {
        Self::Probe(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// `true` for the errors that make the orchestrator move on to the next render strategy.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::BackendUnavailable(_) | Self::EncoderUnavailable(_)
        )
    }
}
