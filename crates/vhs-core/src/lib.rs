//! VHS Core Library
//!
//! This crate provides configuration, credential resolution, the cloud provider enum and the
//! preview model shared by the storage, processing and CLI crates.

pub mod config;
pub mod encoding;
pub mod env;
pub mod error;
pub mod preview;
pub mod provider;
pub mod secret;

// Re-export commonly used types
pub use config::{ProviderCredentials, StorageConfig, StorageOverrides, VerifyPolicy};
pub use encoding::{process_secret_key, unescape_env_value};
pub use env::EnvLayers;
pub use error::ConfigError;
pub use preview::{Preview, PreviewKind};
pub use provider::CloudProvider;
pub use secret::Secret;
