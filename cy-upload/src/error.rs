use thiserror::Error;

/// Result type for upload operations
pub type UploadResult<T> = Result<T, UploadError>;

/// Errors that can occur while registering or transferring content
#[derive(Error, Debug)]
pub enum UploadError {
    /// The remote side refused the declaration, or the call itself failed.
    #[error("Registration failed: {reason}")]
    Registration { reason: String },

    /// The streamed upload could not be carried out.
    #[error("Transfer failed: {reason}")]
    Transfer { reason: String },

    /// A payload whose byte count cannot match its declared size.
    /// This is a caller bug, never a remote condition.
    #[error("Malformed payload stream: {reason}")]
    MalformedStream { reason: String },

    #[error("Chunk size must be greater than zero")]
    InvalidChunkSize,

    #[error("Invalid upload configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Backend error: {source}")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

impl UploadError {
    /// Create a backend error from any error type
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            source: Box::new(error),
        }
    }

    /// Create a registration error
    pub fn registration<S: Into<String>>(reason: S) -> Self {
        Self::Registration {
            reason: reason.into(),
        }
    }

    /// Create a transfer error
    pub fn transfer<S: Into<String>>(reason: S) -> Self {
        Self::Transfer {
            reason: reason.into(),
        }
    }

    /// Create a malformed stream error
    pub fn malformed<S: Into<String>>(reason: S) -> Self {
        Self::MalformedStream {
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Errors that only cost the current session; the planner logs them
    /// and moves on.
    pub fn is_session_scoped(&self) -> bool {
        matches!(
            self,
            Self::Registration { .. } | Self::Transfer { .. } | Self::Backend { .. }
        )
    }
}
