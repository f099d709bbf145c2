//! Asset store adapters for Marquee.
//!
//! An asset store accepts a binary upload and returns a stable public URL
//! plus an opaque [`DeletionHandle`](marquee_types::DeletionHandle) that can
//! later release the binary. Records never hold local paths: every URL an
//! adapter returns is an absolute http(s) URL.
//!
//! # Backends
//!
//! All backends implement the [`AssetStore`] trait:
//!
//! - [`InMemoryAssetStore`] -- `HashMap`-based store for tests and embedding
//! - [`FsAssetStore`] -- files under a root directory, served from a base URL
//! - [`HttpAssetStore`] -- S3-style REST object store (`PUT`/`DELETE` by key)
//!
//! # Design Rules
//!
//! 1. Every backend applies the same [`UploadPolicy`] before storing.
//! 2. Keys are time-ordered and unique; two uploads never share a handle.
//! 3. Removing an unknown handle yields [`AssetError::NotFound`]; callers
//!    treat that as already satisfied.
//! 4. No retries at this layer.

pub mod config;
pub mod error;
pub mod fs;
pub mod http;
pub mod memory;
pub mod policy;
pub mod traits;

pub use config::{build_asset_store, AssetBackendConfig, AssetConfig};
pub use error::{AssetError, AssetResult};
pub use fs::FsAssetStore;
pub use http::HttpAssetStore;
pub use memory::InMemoryAssetStore;
pub use policy::{ImageFormat, UploadPolicy};
pub use traits::AssetStore;
