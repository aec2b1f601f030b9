//! Pending upload batch and its upload orchestration

pub mod pending;
pub mod upload;
pub mod wire;

pub use pending::{normalize_path_key, PendingBatch, PendingItem};
pub use upload::{
    BatchError, BatchTransport, BatchUploader, Delivery, UploadError, UploadState,
};
pub use wire::{serialize_batch, ItemSerializer, JsonItemSerializer};
