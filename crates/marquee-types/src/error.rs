use thiserror::Error;

/// Errors produced by type parsing and schema validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid record identifier: {0}")]
    InvalidId(String),

    #[error("unknown record kind: {0}")]
    UnknownKind(String),

    #[error("{kind}: missing required field `{field}`")]
    MissingField { kind: String, field: String },

    #[error("{kind}: missing required asset `{slot}`")]
    MissingSlot { kind: String, slot: String },

    #[error("{kind}: unknown field `{field}`")]
    UnknownField { kind: String, field: String },

    #[error("{kind}: unknown asset slot `{slot}`")]
    UnknownSlot { kind: String, slot: String },

    #[error("field `{field}` does not accept `{value}` (allowed: {allowed})")]
    NotAllowed {
        field: String,
        value: String,
        allowed: String,
    },

    #[error("asset `{slot}` must be an absolute http(s) URL, got `{url}`")]
    InvalidAssetUrl { slot: String, url: String },

    #[error("record kind mismatch: expected {expected}, found {found}")]
    KindMismatch { expected: String, found: String },
}
