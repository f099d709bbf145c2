//! HTTP server for Marquee.
//!
//! Exposes the content backend as a small JSON API: multipart upserts with
//! asset uploads, filtered collection reads, and deletes that release the
//! record's assets.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::{AppConfig, ServerConfig, DEFAULT_MAX_BODY_BYTES};
pub use error::{ApiError, ServerError, ServerResult};
pub use server::MarqueeServer;
