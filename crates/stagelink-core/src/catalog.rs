//! Model catalog descriptors and upload validation

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum accepted upload size (25 MB)
pub const MAX_UPLOAD_BYTES: u64 = 25 * 1024 * 1024;

/// File extensions the viewer can load
pub const ACCEPTED_EXTENSIONS: &[&str] = &["glb", "gltf", "stl", "obj", "fbx"];

/// An uploaded asset as listed in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// File name, unique within the catalog
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// URL the viewer loads the model from
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UploadError {
    #[error("Invalid file type! Only .glb/.gltf/.stl/.obj/.fbx allowed.")]
    InvalidFileType,
    #[error("File too large! Max size: 25MB")]
    TooLarge,
    #[error("File with name \"{0}\" already exists. Please choose another name.")]
    DuplicateName(String),
}

/// Validate a candidate upload before any relay traffic happens
///
/// Size is checked first so an oversized file is rejected as "too large"
/// regardless of its extension.
pub fn validate_upload(
    file_name: &str,
    size_bytes: u64,
    existing_names: &[String],
) -> Result<(), UploadError> {
    if size_bytes > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge);
    }

    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase());
    let accepted = extension
        .as_deref()
        .is_some_and(|ext| ACCEPTED_EXTENSIONS.contains(&ext));
    if !accepted {
        return Err(UploadError::InvalidFileType);
    }

    if existing_names.iter().any(|n| n == file_name) {
        return Err(UploadError::DuplicateName(file_name.to_string()));
    }

    Ok(())
}
