//! Site Path Value Object
//!
//! A normalized request/index path within a site:
//! - always a leading slash
//! - forward slashes only, no duplicate slashes
//! - no `.` or `..` segments, no empty segments
//!
//! Overlay resolution compares manifest entries against request paths, so
//! both sides must go through the same normalization or resolution breaks
//! silently. Normalization is idempotent: parsing an already-normalized
//! path yields the same path.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error when path validation fails
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("path is empty")]
    Empty,
    #[error("path '{0}' contains a '..' segment")]
    ContainsTraversal(String),
    #[error("path '{0}' contains a '.' segment")]
    ContainsCurrentDir(String),
    #[error("path '{0}' contains a backslash")]
    ContainsBackslash(String),
}

/// A validated, normalized site path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SitePath(String);

impl SitePath {
    /// Parse and normalize a raw path.
    ///
    /// A missing leading slash is added, duplicate slashes collapse, and a
    /// trailing slash is stripped (except for the root path `/`). Traversal
    /// segments are rejected, never resolved.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        if raw.is_empty() {
            return Err(PathError::Empty);
        }
        if raw.contains('\\') {
            return Err(PathError::ContainsBackslash(raw.to_string()));
        }

        let mut segments = Vec::new();
        for segment in raw.split('/') {
            match segment {
                // Empty segments come from leading/trailing/duplicate
                // slashes and are dropped by normalization.
                "" => continue,
                ".." => return Err(PathError::ContainsTraversal(raw.to_string())),
                "." => return Err(PathError::ContainsCurrentDir(raw.to_string())),
                s => segments.push(s),
            }
        }

        if segments.is_empty() {
            // "/" and "///" normalize to the root path.
            return Ok(Self("/".to_string()));
        }

        Ok(Self(format!("/{}", segments.join("/"))))
    }

    /// Get the normalized path string (always begins with `/`)
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path relative to the site root, without the leading slash.
    ///
    /// Suitable for joining onto a destination release slot.
    pub fn relative(&self) -> &str {
        self.0.strip_prefix('/').unwrap_or(&self.0)
    }

    /// Check whether this is the root path `/`
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }
}

impl fmt::Display for SitePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for SitePath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for SitePath {
    type Error = PathError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<SitePath> for String {
    fn from(path: SitePath) -> String {
        path.0
    }
}

impl AsRef<str> for SitePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn adds_leading_slash() {
        let path = SitePath::parse("index.html").unwrap();
        assert_eq!(path.as_str(), "/index.html");
    }

    #[test]
    fn keeps_leading_slash() {
        let path = SitePath::parse("/app.js").unwrap();
        assert_eq!(path.as_str(), "/app.js");
    }

    #[test]
    fn collapses_duplicate_slashes() {
        let path = SitePath::parse("//assets///logo.svg").unwrap();
        assert_eq!(path.as_str(), "/assets/logo.svg");
    }

    #[test]
    fn strips_trailing_slash() {
        let path = SitePath::parse("/docs/").unwrap();
        assert_eq!(path.as_str(), "/docs");
    }

    #[test]
    fn root_normalizes_to_single_slash() {
        assert_eq!(SitePath::parse("/").unwrap().as_str(), "/");
        assert_eq!(SitePath::parse("///").unwrap().as_str(), "/");
        assert!(SitePath::parse("/").unwrap().is_root());
    }

    #[test]
    fn rejects_empty() {
        assert!(matches!(SitePath::parse(""), Err(PathError::Empty)));
    }

    #[test]
    fn rejects_traversal() {
        assert!(matches!(
            SitePath::parse("/a/../b"),
            Err(PathError::ContainsTraversal(_))
        ));
    }

    #[test]
    fn rejects_current_dir_segment() {
        assert!(matches!(
            SitePath::parse("/a/./b"),
            Err(PathError::ContainsCurrentDir(_))
        ));
    }

    #[test]
    fn rejects_backslash() {
        assert!(matches!(
            SitePath::parse("a\\b"),
            Err(PathError::ContainsBackslash(_))
        ));
    }

    #[test]
    fn relative_strips_leading_slash() {
        let path = SitePath::parse("/assets/app.js").unwrap();
        assert_eq!(path.relative(), "assets/app.js");
    }

    #[test]
    fn equality_after_normalization() {
        let a = SitePath::parse("app.js").unwrap();
        let b = SitePath::parse("/app.js").unwrap();
        assert_eq!(a, b);
    }

    proptest! {
        #[test]
        fn normalization_is_idempotent(raw in "[a-z0-9./]{1,40}") {
            if let Ok(once) = SitePath::parse(&raw) {
                let twice = SitePath::parse(once.as_str()).unwrap();
                prop_assert_eq!(once, twice);
            }
        }

        #[test]
        fn normalized_paths_never_contain_double_slash(raw in "[a-z/]{1,40}") {
            if let Ok(path) = SitePath::parse(&raw) {
                prop_assert!(!path.as_str().contains("//"));
                prop_assert!(path.as_str().starts_with('/'));
            }
        }
    }
}
