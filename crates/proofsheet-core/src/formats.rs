//! Source format allow-list.
//!
//! Formats are identified by file extension only (case-insensitive). The policy splits the
//! allow-list into formats that are resized and re-encoded and formats that must be copied
//! verbatim (animated GIFs lose their frames when decoded into a single image).

use crate::error::AppError;

/// How the derivative generator treats a source object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    /// Decoded, resized to every configured width and re-encoded.
    Resizable,
    /// Copied verbatim to the processed area under its original extension.
    Passthrough,
    /// Not on the allow-list; processing is a no-op.
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatPolicy {
    allowed_extensions: Vec<String>,
    passthrough_extensions: Vec<String>,
}

impl FormatPolicy {
    pub fn new<A, P>(allowed: A, passthrough: P) -> Self
    where
        A: IntoIterator,
        A::Item: AsRef<str>,
        P: IntoIterator,
        P::Item: AsRef<str>,
    {
        let normalize = |s: &str| s.trim().trim_start_matches('.').to_lowercase();
        Self {
            allowed_extensions: allowed
                .into_iter()
                .map(|s| normalize(s.as_ref()))
                .filter(|s| !s.is_empty())
                .collect(),
            passthrough_extensions: passthrough
                .into_iter()
                .map(|s| normalize(s.as_ref()))
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn allowed_extensions(&self) -> &[String] {
        &self.allowed_extensions
    }

    pub fn passthrough_extensions(&self) -> &[String] {
        &self.passthrough_extensions
    }

    /// Classify an object path or file name by its extension.
    pub fn classify(&self, path: &str) -> ImageKind {
        let Some(ext) = extension_of(path) else {
            return ImageKind::Unsupported;
        };
        if !self.allowed_extensions.contains(&ext) {
            ImageKind::Unsupported
        } else if self.passthrough_extensions.contains(&ext) {
            ImageKind::Passthrough
        } else {
            ImageKind::Resizable
        }
    }

    pub fn is_allowed(&self, path: &str) -> bool {
        self.classify(path) != ImageKind::Unsupported
    }

    /// Reject a file name whose extension is not on the allow-list.
    pub fn check(&self, file_name: &str) -> Result<(), AppError> {
        if self.is_allowed(file_name) {
            Ok(())
        } else {
            Err(AppError::UnsupportedFormat(format!(
                "{} (allowed: {})",
                file_name,
                self.allowed_extensions.join(", ")
            )))
        }
    }
}

impl Default for FormatPolicy {
    fn default() -> Self {
        Self::new(["jpg", "jpeg", "png", "webp", "gif"], ["gif"])
    }
}

/// Lower-cased extension of the final path segment, if it has one.
///
/// A leading dot does not start an extension (`.png` has none).
pub fn extension_of(path: &str) -> Option<String> {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext.to_lowercase()),
        _ => None,
    }
}

/// MIME type for a known image extension.
pub fn content_type_for_extension(ext: &str) -> &'static str {
    match ext.to_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        _ => "application/octet-stream",
    }
}

/// MIME type guessed from a path's extension.
pub fn content_type_for_path(path: &str) -> &'static str {
    extension_of(path)
        .map(|ext| content_type_for_extension(&ext))
        .unwrap_or("application/octet-stream")
}
