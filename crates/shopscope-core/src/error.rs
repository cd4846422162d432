use thiserror::Error;

/// Errors raised while loading configuration or configured resources.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    /// A configured file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A credential needed by the selected fetch strategy is absent.
    #[error("missing credential: {0}")]
    MissingCredential(String),
}
