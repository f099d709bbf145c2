use marquee_assets::AssetError;
use marquee_store::StoreError;
use marquee_types::{RecordKind, TypeError};
use thiserror::Error;

/// Errors surfaced by the upsert, delete and query operations.
///
/// Every variant reaches the caller unchanged; nothing in the core retries.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Bad or missing input. Never worth retrying as-is.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: RecordKind, id: String },

    /// The asset store rejected an upload or could not be reached.
    #[error("upload failed: {0}")]
    Upload(#[from] AssetError),

    /// The record store failed, including identifier conflicts.
    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl CoreError {
    pub fn not_found(kind: RecordKind, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable name for this error class.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound { .. } => "not_found",
            Self::Upload(_) => "upload",
            Self::Persistence(_) => "persistence",
            Self::Config(_) => "config",
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<TypeError> for CoreError {
    fn from(err: TypeError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        Self::Persistence(err.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
