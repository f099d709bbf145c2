use std::fmt;

use marquee_types::{DeletionHandle, Upload};
use serde::{Deserialize, Serialize};

use crate::error::{AssetError, AssetResult};

/// Default upload ceiling: 10 MiB.
pub const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;

/// Image formats recognised by content sniffing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[serde(alias = "jpg")]
    Jpeg,
    Png,
    Webp,
    Gif,
}

impl ImageFormat {
    /// Detect the format from the leading magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(Self::Png)
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(Self::Webp)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else {
            None
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Gif => "gif",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Checks every backend applies before accepting an upload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadPolicy {
    pub max_bytes: u64,
    pub allowed_formats: Vec<ImageFormat>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            allowed_formats: vec![ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::Webp],
        }
    }
}

impl UploadPolicy {
    /// Validate `upload` and return its sniffed format.
    pub fn check(&self, upload: &Upload) -> AssetResult<ImageFormat> {
        if upload.is_empty() {
            return Err(AssetError::Rejected("empty upload".into()));
        }
        if upload.len() as u64 > self.max_bytes {
            return Err(AssetError::Rejected(format!(
                "upload is {} bytes, limit is {}",
                upload.len(),
                self.max_bytes
            )));
        }
        let format = ImageFormat::sniff(&upload.bytes).ok_or_else(|| {
            AssetError::Rejected(format!(
                "unrecognised image format{}",
                upload
                    .filename
                    .as_deref()
                    .map(|name| format!(" ({name})"))
                    .unwrap_or_default()
            ))
        })?;
        if !self.allowed_formats.contains(&format) {
            return Err(AssetError::Rejected(format!("format {format} is not allowed")));
        }
        Ok(format)
    }
}

/// Validate a folder path: relative, `/`-separated, no empty or dot segments.
pub fn normalize_folder(folder: &str) -> AssetResult<String> {
    let trimmed = folder.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Err(AssetError::Config("asset folder must not be empty".into()));
    }
    for segment in trimmed.split('/') {
        let valid = !segment.is_empty()
            && segment != "."
            && segment != ".."
            && segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(AssetError::Config(format!("invalid asset folder: {folder}")));
        }
    }
    Ok(trimmed.to_string())
}

/// Allocate a fresh object key under `folder`.
pub fn object_key(folder: &str, format: ImageFormat) -> AssetResult<String> {
    let folder = normalize_folder(folder)?;
    Ok(format!(
        "{folder}/{}.{}",
        uuid::Uuid::now_v7().simple(),
        format.extension()
    ))
}

/// Check that a deletion handle is a key this crate could have issued.
///
/// Rejects anything that could escape a backend's root.
pub fn key_from_handle(handle: &DeletionHandle) -> AssetResult<&str> {
    let key = handle.as_str();
    let (folder, file) = key
        .rsplit_once('/')
        .ok_or_else(|| AssetError::NotFound(handle.clone()))?;
    normalize_folder(folder).map_err(|_| AssetError::NotFound(handle.clone()))?;
    if folder.starts_with('/') || file.is_empty() || file.starts_with('.') || file.contains('\\') {
        return Err(AssetError::NotFound(handle.clone()));
    }
    Ok(key)
}

/// Join a public base URL and an object key with exactly one slash.
pub fn public_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key.trim_start_matches('/'))
}
