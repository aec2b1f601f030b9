//! File intake: turn a user-selected path into a pending item
//!
//! Classification rules for a candidate path:
//! - `.url` internet shortcuts are refused
//! - `.lnk` shortcuts are resolved through a [`ShortcutResolver`];
//!   unresolved or `steam://` targets are refused
//! - the (resolved) path must end in `.exe`, case-insensitive
//!
//! Extraction itself is delegated to a [`MetadataExtractor`].

use crate::batch::PendingItem;
use serde_json::Value;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Intake refusals and extraction failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntakeError {
    #[error("The selected file is a .URL file and cannot be processed.")]
    InternetShortcut,

    #[error("The shortcut is invalid or unsupported.")]
    UnresolvedShortcut,

    #[error("Steam link shortcuts are not supported.")]
    SteamLink,

    #[error("The selected file is not a supported executable (.exe): {0}")]
    NotExecutable(PathBuf),

    #[error("Failed to read file metadata: {0}")]
    Extraction(String),

    #[error("Intake worker failed: {0}")]
    Worker(String),
}

/// Structured output of a metadata extractor
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFile {
    /// Opaque version-resource metadata
    pub metadata: Value,
    /// Opaque client-side extras (icon list etc.)
    pub custom_data: Value,
    /// Encoded icon thumbnail, when available
    pub icon_preview: Option<Vec<u8>>,
}

/// Reads metadata from an executable
pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> std::io::Result<ExtractedFile>;
}

/// Resolves `.lnk` shortcut targets
pub trait ShortcutResolver: Send + Sync {
    /// Target path or URI, `None` when the shortcut cannot be read
    fn resolve(&self, shortcut: &Path) -> Option<String>;
}

/// Resolver for hosts without shortcut support
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedShortcuts;

impl ShortcutResolver for UnsupportedShortcuts {
    fn resolve(&self, _shortcut: &Path) -> Option<String> {
        None
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn is_steam_uri(target: &str) -> bool {
    target
        .get(..8)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("steam://"))
}

/// Apply the classification rules and return the executable path
pub fn resolve_candidate(
    path: &Path,
    shortcuts: &dyn ShortcutResolver,
) -> Result<PathBuf, IntakeError> {
    if has_extension(path, "url") {
        return Err(IntakeError::InternetShortcut);
    }

    let path = if has_extension(path, "lnk") {
        let target = shortcuts
            .resolve(path)
            .filter(|t| !t.trim().is_empty())
            .ok_or(IntakeError::UnresolvedShortcut)?;
        if is_steam_uri(&target) {
            return Err(IntakeError::SteamLink);
        }
        debug!(shortcut = %path.display(), target = %target, "Resolved shortcut");
        PathBuf::from(target)
    } else {
        path.to_path_buf()
    };

    if !has_extension(&path, "exe") {
        return Err(IntakeError::NotExecutable(path));
    }

    Ok(path)
}

/// Classify `path` and extract its metadata into a [`PendingItem`]
///
/// Blocking (file reads); run it on a blocking worker.
pub fn intake_file(
    path: &Path,
    shortcuts: &dyn ShortcutResolver,
    extractor: &dyn MetadataExtractor,
) -> Result<PendingItem, IntakeError> {
    let exe_path = resolve_candidate(path, shortcuts)?;
    let extracted = extractor
        .extract(&exe_path)
        .map_err(|e| IntakeError::Extraction(e.to_string()))?;

    Ok(PendingItem::from_extracted(exe_path, extracted))
}
