//! Object path conventions.
//!
//! Every path relationship in the pipeline is computed here and nowhere else:
//!
//! - raw upload paths: `projects/{project}/designs/{design}/versions/{version}/{variation}.{ext}`
//! - derivative paths: [`derive_path`], a pure function of the original path and a width
//! - owned prefixes used by cleanup: [`OwnedPrefix`]
//!
//! There is no persisted mapping between an original and its derivatives; the upload
//! trigger, the generator and cleanup all recompute it with these functions.

use std::fmt::Display;

use crate::constants::{DESIGNS_TABLE, FALLBACK_BASENAME, PROJECTS_ROOT, PROJECTS_TABLE};
use crate::error::AppError;

/// Derive the processed-area path for `original_path`.
///
/// `width = None` is the passthrough case: the original extension is kept. Otherwise the
/// result is `{dir}/{base}_{width}.{output_ext}`. Any existing `_<digits>` suffix on the
/// basename is stripped first, so deriving from an already-derived path never stacks
/// suffixes.
pub fn derive_path(original_path: &str, width: Option<u32>, output_ext: &str) -> String {
    let (dir, file_name) = match original_path.rsplit_once('/') {
        Some((dir, file_name)) => (Some(dir), file_name),
        None => (None, original_path),
    };

    let (stem, ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (file_name, None),
    };

    let base = strip_width_suffix(stem);
    let base = if base.is_empty() { FALLBACK_BASENAME } else { base };

    let name = match (width, ext) {
        (Some(w), _) => format!("{}_{}.{}", base, w, output_ext),
        (None, Some(ext)) => format!("{}.{}", base, ext),
        (None, None) => base.to_string(),
    };

    match dir {
        Some(dir) => format!("{}/{}", dir, name),
        None => name,
    }
}

fn strip_width_suffix(stem: &str) -> &str {
    match stem.rsplit_once('_') {
        Some((head, digits)) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
            head
        }
        _ => stem,
    }
}

/// [`derive_path`] bound to the configured derivative extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathDeriver {
    output_extension: String,
}

impl PathDeriver {
    pub fn new(output_extension: impl Into<String>) -> Self {
        Self {
            output_extension: output_extension.into(),
        }
    }

    pub fn output_extension(&self) -> &str {
        &self.output_extension
    }

    pub fn derive(&self, original_path: &str, width: Option<u32>) -> String {
        derive_path(original_path, width, &self.output_extension)
    }
}

impl Default for PathDeriver {
    fn default() -> Self {
        Self::new("webp")
    }
}

/// Raw-area path for a variation's original bytes.
pub fn raw_object_path(
    project_id: impl Display,
    design_id: impl Display,
    version_id: impl Display,
    variation_id: impl Display,
    extension: &str,
) -> String {
    format!(
        "{}/{}/designs/{}/versions/{}/{}.{}",
        PROJECTS_ROOT,
        project_id,
        design_id,
        version_id,
        variation_id,
        extension.to_lowercase()
    )
}

/// Spreadsheet-style variation letter: 0 → `A`, 25 → `Z`, 26 → `AA`.
pub fn variation_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// Reject object paths that could escape their bucket or address the bucket root.
pub fn validate_object_path(path: &str) -> Result<(), AppError> {
    if path.trim().is_empty() {
        return Err(AppError::Validation("object path is empty".to_string()));
    }
    if path.starts_with('/') || path.split('/').any(|segment| segment == "..") {
        return Err(AppError::Validation(format!(
            "object path is not a relative key: {}",
            path
        )));
    }
    if path.ends_with('/') {
        return Err(AppError::Validation(format!(
            "object path names a directory: {}",
            path
        )));
    }
    Ok(())
}

/// Entity kinds whose deletion reclaims storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentKind {
    Project,
    Design,
}

impl ParentKind {
    /// Map a record-store table name to a parent kind.
    pub fn from_table(table: &str) -> Option<Self> {
        match table {
            PROJECTS_TABLE => Some(Self::Project),
            DESIGNS_TABLE => Some(Self::Design),
            _ => None,
        }
    }
}

/// Storage prefix owned by a parent entity. Deleting the entity reclaims everything below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedPrefix(String);

impl OwnedPrefix {
    /// `projects/{id}/`
    pub fn project(project_id: impl Display) -> Result<Self, AppError> {
        let project_id = checked_id("project", project_id)?;
        Ok(Self(format!("{}/{}/", PROJECTS_ROOT, project_id)))
    }

    /// `projects/{project_id}/designs/{id}/`
    pub fn design(project_id: impl Display, design_id: impl Display) -> Result<Self, AppError> {
        let project_id = checked_id("project", project_id)?;
        let design_id = checked_id("design", design_id)?;
        Ok(Self(format!(
            "{}/{}/designs/{}/",
            PROJECTS_ROOT, project_id, design_id
        )))
    }

    /// Prefix owned by a deleted parent. Designs need their project id.
    pub fn for_parent(
        kind: ParentKind,
        parent_id: impl Display,
        project_id: Option<&str>,
    ) -> Result<Self, AppError> {
        match kind {
            ParentKind::Project => Self::project(parent_id),
            ParentKind::Design => {
                let project_id = project_id.ok_or_else(|| {
                    AppError::Validation("design deletion is missing project_id".to_string())
                })?;
                Self::design(project_id, parent_id)
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefix without the trailing slash, the form object-store listing expects.
    pub fn as_list_prefix(&self) -> &str {
        self.0.trim_end_matches('/')
    }

    pub fn contains(&self, path: &str) -> bool {
        path.starts_with(&self.0)
    }
}

impl Display for OwnedPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn checked_id(what: &str, id: impl Display) -> Result<String, AppError> {
    let id = id.to_string();
    let id = id.trim();
    if id.is_empty() || id.contains('/') || id == "." || id == ".." {
        return Err(AppError::Validation(format!("invalid {} id: {:?}", what, id)));
    }
    Ok(id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_width() {
        assert_eq!(derive_path("a/b.png", Some(200), "webp"), "a/b_200.webp");
    }

    #[test]
    fn test_derive_from_derived_does_not_stack() {
        assert_eq!(derive_path("a/b_200.webp", Some(800), "webp"), "a/b_800.webp");
    }

    #[test]
    fn test_derive_is_idempotent() {
        let samples = [
            "a/b.png",
            "x/y/z.photo.final.JPG",
            "plain.jpeg",
            "dir/with_underscore_name.png",
            "dir/_200.webp",
        ];
        for original in samples {
            let once = derive_path(original, Some(400), "webp");
            assert_eq!(derive_path(&once, Some(400), "webp"), once, "{}", original);
            assert_eq!(
                derive_path(&once, Some(1600), "webp"),
                derive_path(original, Some(1600), "webp"),
                "{}",
                original
            );
        }
    }

    #[test]
    fn test_derive_passthrough_keeps_extension() {
        assert_eq!(derive_path("x/y.gif", None, "webp"), "x/y.gif");
        assert_eq!(derive_path("x/y_3.gif", None, "webp"), "x/y.gif");
    }

    #[test]
    fn test_derive_multiple_dots() {
        assert_eq!(
            derive_path("p/my.design.v2.png", Some(200), "webp"),
            "p/my.design.v2_200.webp"
        );
    }

    #[test]
    fn test_derive_without_directory() {
        assert_eq!(derive_path("b.png", Some(200), "webp"), "b_200.webp");
        assert_eq!(derive_path("b.gif", None, "webp"), "b.gif");
    }

    #[test]
    fn test_derive_empty_basename_never_starts_with_underscore() {
        let derived = derive_path("_200.webp", Some(800), "webp");
        assert_eq!(derived, "image_800.webp");
        let nested = derive_path("dir/_5.png", Some(200), "webp");
        assert_eq!(nested, "dir/image_200.webp");
    }

    #[test]
    fn test_derive_keeps_non_numeric_suffix() {
        assert_eq!(
            derive_path("a/hero_final.png", Some(200), "webp"),
            "a/hero_final_200.webp"
        );
    }

    #[test]
    fn test_derive_no_extension() {
        assert_eq!(derive_path("a/raw", Some(200), "webp"), "a/raw_200.webp");
        assert_eq!(derive_path("a/raw", None, "webp"), "a/raw");
    }

    #[test]
    fn test_path_deriver_uses_configured_extension() {
        let deriver = PathDeriver::new("jpg");
        assert_eq!(deriver.derive("a/b.png", Some(200)), "a/b_200.jpg");
        assert_eq!(PathDeriver::default().output_extension(), "webp");
    }

    #[test]
    fn test_raw_object_path() {
        assert_eq!(
            raw_object_path("p1", "d1", "v1", "var1", "PNG"),
            "projects/p1/designs/d1/versions/v1/var1.png"
        );
    }

    #[test]
    fn test_derivatives_stay_under_owned_prefix() {
        let raw = raw_object_path("p1", "d1", "v1", "var1", "png");
        let prefix = OwnedPrefix::design("p1", "d1").unwrap();
        assert!(prefix.contains(&raw));
        assert!(prefix.contains(&derive_path(&raw, Some(200), "webp")));
    }

    #[test]
    fn test_variation_letters() {
        assert_eq!(variation_letter(0), "A");
        assert_eq!(variation_letter(25), "Z");
        assert_eq!(variation_letter(26), "AA");
        assert_eq!(variation_letter(27), "AB");
        assert_eq!(variation_letter(701), "ZZ");
        assert_eq!(variation_letter(702), "AAA");
    }

    #[test]
    fn test_owned_prefixes() {
        assert_eq!(OwnedPrefix::project("P").unwrap().as_str(), "projects/P/");
        let design = OwnedPrefix::design("P", "D").unwrap();
        assert_eq!(design.as_str(), "projects/P/designs/D/");
        assert_eq!(design.as_list_prefix(), "projects/P/designs/D");
        assert!(design.contains("projects/P/designs/D/versions/v/x.png"));
        assert!(!design.contains("projects/P/designs/D2/versions/v/x.png"));
    }

    #[test]
    fn test_owned_prefix_rejects_bad_ids() {
        assert!(OwnedPrefix::project("").is_err());
        assert!(OwnedPrefix::project("a/b").is_err());
        assert!(OwnedPrefix::design("p", "..").is_err());
    }

    #[test]
    fn test_validate_object_path() {
        assert!(validate_object_path("projects/p/a.png").is_ok());
        assert!(validate_object_path("").is_err());
        assert!(validate_object_path("/abs.png").is_err());
        assert!(validate_object_path("projects/../x.png").is_err());
        assert!(validate_object_path("projects/p/").is_err());
    }

    #[test]
    fn test_owned_prefix_for_parent() {
        assert_eq!(
            OwnedPrefix::for_parent(ParentKind::Project, "p1", None).unwrap().as_str(),
            "projects/p1/"
        );
        assert_eq!(
            OwnedPrefix::for_parent(ParentKind::Design, "d1", Some("p1"))
                .unwrap()
                .as_str(),
            "projects/p1/designs/d1/"
        );
        assert!(OwnedPrefix::for_parent(ParentKind::Design, "d1", None).is_err());
        assert_eq!(ParentKind::from_table("designs"), Some(ParentKind::Design));
        assert_eq!(ParentKind::from_table("comments"), None);
    }
}
