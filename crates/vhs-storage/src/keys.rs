//! Object key construction shared by every backend.
//!
//! Key format: `[{prefix}/]{name}` where `name` is the target name or the source file name,
//! with `_{index}` inserted before the extension when an index is given.

use crate::{StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How a local file is named in the bucket
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyOptions {
    /// Folder-like prefix. Trailing slashes are normalized.
    pub prefix: Option<String>,
    /// Index appended to the file stem, for multi-file outputs
    pub index: Option<u32>,
    /// Name to use instead of the source file name
    pub target_name: Option<String>,
}

impl KeyOptions {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        KeyOptions {
            prefix: Some(prefix.into()),
            ..Default::default()
        }
    }
}

/// Build the object key for uploading `source` with the given options.
pub fn build_object_key(source: &Path, opts: &KeyOptions) -> StorageResult<String> {
    let filename = match opts.target_name.as_deref().filter(|n| !n.is_empty()) {
        Some(name) => name.to_string(),
        None => source
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                StorageError::InvalidKey(format!(
                    "Cannot derive a file name from {}",
                    source.display()
                ))
            })?,
    };

    let filename = match opts.index {
        Some(index) => indexed_name(&filename, index),
        None => filename,
    };

    let key = match opts
        .prefix
        .as_deref()
        .map(|p| p.trim_end_matches('/'))
        .filter(|p| !p.is_empty())
    {
        Some(prefix) => format!("{}/{}", prefix, filename),
        None => filename,
    };

    validate_key(&key)?;
    Ok(key)
}

/// Insert `_{index}` between stem and extension: `clip.mp4` -> `clip_3.mp4`
fn indexed_name(filename: &str, index: u32) -> String {
    let path = Path::new(filename);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}_{}.{}", stem, index, ext),
        None => format!("{}_{}", stem, index),
    }
}

/// Reject keys that could escape their prefix or address the bucket root.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if key.starts_with('/') {
        return Err(StorageError::InvalidKey(format!(
            "Storage key must not start with '/': {}",
            key
        )));
    }
    if key.split('/').any(|segment| segment == "..") {
        return Err(StorageError::InvalidKey(format!(
            "Storage key must not contain '..': {}",
            key
        )));
    }
    if key.ends_with('/') {
        return Err(StorageError::InvalidKey(format!(
            "Storage key has no file name: {}",
            key
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(path: &str, opts: KeyOptions) -> String {
        build_object_key(Path::new(path), &opts).unwrap()
    }

    #[test]
    fn uses_file_name_without_prefix() {
        assert_eq!(key("/tmp/out/vhs_00001.mp4", KeyOptions::default()), "vhs_00001.mp4");
    }

    #[test]
    fn prefix_gets_exactly_one_slash() {
        assert_eq!(key("/tmp/a.mp4", KeyOptions::with_prefix("runs/7")), "runs/7/a.mp4");
        assert_eq!(key("/tmp/a.mp4", KeyOptions::with_prefix("runs/7/")), "runs/7/a.mp4");
        assert_eq!(key("/tmp/a.mp4", KeyOptions::with_prefix("runs//")), "runs/a.mp4");
        assert_eq!(key("/tmp/a.mp4", KeyOptions::with_prefix("")), "a.mp4");
    }

    #[test]
    fn index_goes_before_extension() {
        let opts = KeyOptions {
            index: Some(2),
            ..Default::default()
        };
        assert_eq!(key("/tmp/clip.mp4", opts.clone()), "clip_2.mp4");
        assert_eq!(key("/tmp/clip", opts.clone()), "clip_2");
        assert_eq!(key("/tmp/clip.tar.gz", opts), "clip.tar_2.gz");
    }

    #[test]
    fn target_name_replaces_source_name() {
        let opts = KeyOptions {
            prefix: Some("shared".to_string()),
            index: Some(0),
            target_name: Some("final.webm".to_string()),
        };
        assert_eq!(key("/tmp/vhs_00009.webm", opts), "shared/final_0.webm");
    }

    #[test]
    fn traversal_is_rejected() {
        let result = build_object_key(Path::new("/tmp/a.mp4"), &KeyOptions::with_prefix("../etc"));
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = build_object_key(Path::new("/tmp/a.mp4"), &KeyOptions::with_prefix("/abs"));
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[test]
    fn dotted_names_are_allowed() {
        assert!(validate_key("runs/v1..2/a.mp4").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("runs/").is_err());
    }

    #[test]
    fn path_without_file_name_is_rejected() {
        let result = build_object_key(Path::new("/"), &KeyOptions::default());
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }
}
