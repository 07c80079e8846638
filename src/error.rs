pub type InkResult<T> = Result<T, InkError>;

#[derive(thiserror::Error, Debug)]
pub enum InkError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("asset error: {0}")]
    Asset(String),

    #[error("font error: {0}")]
    Font(String),

    #[error("schedule error: {0}")]
    Schedule(String),

    #[error("sink error: {0}")]
    Sink(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl InkError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn asset(msg: impl Into<String>) -> Self {
        Self::Asset(msg.into())
    }

    pub fn font(msg: impl Into<String>) -> Self {
        Self::Font(msg.into())
    }

    pub fn schedule(msg: impl Into<String>) -> Self {
        Self::Schedule(msg.into())
    }

    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink(msg.into())
    }

    /// Sink failures end the slide; everything else is recovered per layer.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Sink(_))
    }
}
