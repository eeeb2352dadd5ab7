//! VHS Storage Library
//!
//! This crate provides the storage abstraction used to publish generated videos.
//! It includes the Storage trait, an object-store backend for S3, Google Cloud Storage and
//! Azure Blob Storage, a local filesystem backend, and the upload handler that names,
//! uploads and verifies output files.
//!
//! # Storage key format
//!
//! Keys are `[{prefix}/]{name}`. Keys must not contain `..` segments or a leading `/`.
//! Key generation is centralized in the `keys` module so all backends stay consistent.

pub mod content_type;
#[cfg(feature = "storage-cloud")]
pub mod cloud;
pub mod factory;
pub mod handler;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod traits;

// Re-export commonly used types
#[cfg(feature = "storage-cloud")]
pub use cloud::CloudStorage;
pub use content_type::guess_content_type;
pub use factory::create_storage;
pub use handler::{successful_urls, CloudStorageHandler, UploadResult, UploadedObject};
pub use keys::{build_object_key, KeyOptions};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use traits::{Storage, StorageError, StorageResult};
pub use vhs_core::CloudProvider;
