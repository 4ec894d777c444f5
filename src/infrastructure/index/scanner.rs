//! Directory scanner
//!
//! Builds a `FileIndex` from a local artifact directory: every regular
//! file becomes an entry keyed by its site path, fingerprinted by
//! streaming its content. A `.quayignore` file at the artifact root uses
//! gitignore semantics to exclude build droppings from the index.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use crate::domain::entities::{FileIndex, FileIndexEntry, IndexError};
use crate::domain::value_objects::{Fingerprint, PathError, SitePath};

/// Name of the optional exclusion file at the artifact root
const IGNORE_FILE: &str = ".quayignore";

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("artifact directory '{0}' does not exist or is not a directory")]
    NotADirectory(PathBuf),

    #[error("invalid ignore pattern in {path}: {message}")]
    InvalidIgnorePattern { path: PathBuf, message: String },

    #[error("file name '{0}' cannot be mapped to a site path")]
    UnmappablePath(PathBuf),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Scanner knobs
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Attach content-type hints guessed from file extensions
    pub content_type_hints: bool,
    /// Explicit per-path content types from the build collaborator;
    /// takes precedence over extension guessing
    pub content_types: BTreeMap<SitePath, String>,
}

/// Build a file index over every file under `dir`.
///
/// Paths are recorded relative to `dir`. The ignore file itself is never
/// indexed.
pub fn scan_dir(dir: &Path, options: &ScanOptions) -> Result<FileIndex, ScanError> {
    if !dir.is_dir() {
        return Err(ScanError::NotADirectory(dir.to_path_buf()));
    }

    let matcher = load_ignore(dir)?;
    let mut entries = Vec::new();
    walk(dir, dir, &matcher, options, &mut entries)?;
    Ok(FileIndex::from_entries(entries)?)
}

fn load_ignore(dir: &Path) -> Result<Gitignore, ScanError> {
    let mut builder = GitignoreBuilder::new(dir);
    let ignore_path = dir.join(IGNORE_FILE);
    if ignore_path.is_file() {
        let content = fs::read_to_string(&ignore_path)?;
        for line in content.lines() {
            if let Err(e) = builder.add_line(Some(ignore_path.clone()), line) {
                return Err(ScanError::InvalidIgnorePattern {
                    path: ignore_path,
                    message: e.to_string(),
                });
            }
        }
    }
    builder
        .build()
        .map_err(|e| ScanError::InvalidIgnorePattern {
            path: ignore_path,
            message: e.to_string(),
        })
}

fn walk(
    root: &Path,
    dir: &Path,
    matcher: &Gitignore,
    options: &ScanOptions,
    entries: &mut Vec<FileIndexEntry>,
) -> Result<(), ScanError> {
    for dir_entry in fs::read_dir(dir)? {
        let dir_entry = dir_entry?;
        let path = dir_entry.path();
        let file_type = dir_entry.file_type()?;

        if matcher
            .matched(&path, file_type.is_dir())
            .is_ignore()
        {
            continue;
        }

        if file_type.is_dir() {
            walk(root, &path, matcher, options, entries)?;
            continue;
        }
        if !file_type.is_file() {
            continue;
        }
        if path.file_name().is_some_and(|n| n == IGNORE_FILE) && dir == root {
            continue;
        }

        let relative = path
            .strip_prefix(root)
            .map_err(|_| ScanError::UnmappablePath(path.clone()))?;
        let Some(relative_str) = relative.to_str() else {
            return Err(ScanError::UnmappablePath(path.clone()));
        };
        let site_path = SitePath::parse(relative_str)?;

        let metadata = dir_entry.metadata()?;
        let fingerprint = Fingerprint::from_reader(fs::File::open(&path)?)?;

        let mut entry = FileIndexEntry::new(site_path, metadata.len(), fingerprint);
        if let Some(explicit) = options.content_types.get(&entry.path) {
            entry = entry.with_content_type(explicit.clone());
        } else if options.content_type_hints {
            if let Some(hint) = guess_content_type(&path) {
                entry = entry.with_content_type(hint);
            }
        }
        entries.push(entry);
    }
    Ok(())
}

/// Static-site content types by extension; unknown extensions get no hint
fn guess_content_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?;
    let hint = match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "text/javascript",
        "json" => "application/json",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "txt" => "text/plain",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "wasm" => "application/wasm",
        _ => return None,
    };
    Some(hint)
}
