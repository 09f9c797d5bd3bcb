pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to load diagram renderer: {message}")]
    RendererLoad { message: String },

    #[error("Diagram renderer rejected its configuration: {message}")]
    RendererConfig { message: String },

    #[error("Diagram {index} failed to render: {message}")]
    Render { index: usize, message: String },

    #[error("HTML rewrite failed: {message}")]
    Rewrite { message: String },

    #[error("Invalid configuration: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn rewrite(err: impl std::fmt::Display) -> Self {
        Self::Rewrite {
            message: err.to_string(),
        }
    }
}
