use marquee_types::DeletionHandle;

/// Errors from asset store operations.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    /// The store refused the payload (format, size, or a 4xx from a remote).
    #[error("asset rejected: {0}")]
    Rejected(String),

    /// The store could not be reached or failed internally.
    #[error("asset store unavailable: {0}")]
    Transport(String),

    /// No asset exists for the given deletion handle.
    #[error("asset not found: {0}")]
    NotFound(DeletionHandle),

    /// I/O error from a local backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend configuration is unusable.
    #[error("configuration error: {0}")]
    Config(String),
}

impl AssetError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// `true` when the payload itself was refused, as opposed to the store
    /// failing to handle it.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

/// Result alias for asset store operations.
pub type AssetResult<T> = Result<T, AssetError>;
