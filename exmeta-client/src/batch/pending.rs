//! Pending items awaiting upload
//!
//! Insertion order is preserved; the first item is the one a UI shows
//! first. Adding the same path twice keeps both entries. Removal matches
//! on the case-insensitive normalized path and drops every match.

use crate::intake::ExtractedFile;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// One selected executable with its extracted metadata
#[derive(Debug, Clone, PartialEq)]
pub struct PendingItem {
    pub file_path: PathBuf,
    pub metadata: Value,
    pub custom_data: Value,
    pub icon_preview: Option<Vec<u8>>,
}

impl PendingItem {
    pub fn new(file_path: impl Into<PathBuf>, metadata: Value, custom_data: Value) -> Self {
        Self {
            file_path: file_path.into(),
            metadata,
            custom_data,
            icon_preview: None,
        }
    }

    pub fn from_extracted(file_path: PathBuf, extracted: ExtractedFile) -> Self {
        Self {
            file_path,
            metadata: extracted.metadata,
            custom_data: extracted.custom_data,
            icon_preview: extracted.icon_preview,
        }
    }

    pub fn file_name(&self) -> String {
        self.file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Identity key used for removal
    pub fn key(&self) -> String {
        normalize_path_key(&self.file_path)
    }
}

/// Case-insensitive comparison key for a file path
///
/// Separators are unified to `/`, surrounding whitespace and trailing
/// separators are dropped, and the result is lower-cased.
///
/// # Examples
///
/// ```
/// use exmeta_client::batch::normalize_path_key;
/// use std::path::Path;
///
/// assert_eq!(
///     normalize_path_key(Path::new(r"C:\Tools\App.EXE")),
///     normalize_path_key(Path::new("c:/tools/app.exe")),
/// );
/// ```
pub fn normalize_path_key(path: &Path) -> String {
    path.to_string_lossy()
        .trim()
        .replace('\\', "/")
        .trim_end_matches('/')
        .to_lowercase()
}

/// Ordered collection of items awaiting upload
#[derive(Debug, Clone, Default)]
pub struct PendingBatch {
    items: Vec<PendingItem>,
}

impl PendingBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, item: PendingItem) {
        self.items.push(item);
    }

    /// Remove every item whose path matches; returns how many were removed
    pub fn remove(&mut self, file_path: &Path) -> usize {
        let key = normalize_path_key(file_path);
        let before = self.items.len();
        self.items.retain(|item| item.key() != key);
        before - self.items.len()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, file_path: &Path) -> bool {
        let key = normalize_path_key(file_path);
        self.items.iter().any(|item| item.key() == key)
    }

    pub fn first(&self) -> Option<&PendingItem> {
        self.items.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingItem> {
        self.items.iter()
    }

    pub fn items(&self) -> &[PendingItem] {
        &self.items
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.items.iter().map(|i| i.file_path.clone()).collect()
    }
}
