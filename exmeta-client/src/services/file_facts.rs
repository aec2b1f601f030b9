//! File-system facts extractor
//!
//! Stand-in for the PE resource reader: records the file name, size and
//! SHA-256 of the executable so the CLI has real metadata to queue.

use crate::intake::{ExtractedFile, MetadataExtractor};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Metadata extractor built on plain file reads
#[derive(Debug, Default, Clone, Copy)]
pub struct FileFactsExtractor;

impl MetadataExtractor for FileFactsExtractor {
    fn extract(&self, path: &Path) -> std::io::Result<ExtractedFile> {
        let mut file = File::open(path)?;
        let size = file.metadata()?.len();

        let mut hasher = Sha256::new();
        let mut buffer = [0u8; 8192];
        loop {
            let bytes_read = file.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }
        let hash_hex = format!("{:x}", hasher.finalize());

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(ExtractedFile {
            metadata: json!({
                "OriginalFileName": file_name,
                "FileSize": size,
                "Sha256": hash_hex,
            }),
            custom_data: json!({ "ExeIconDataList": [] }),
            icon_preview: None,
        })
    }
}
