//! Secondary item images
//!
//! Items name an optional image asset; the file is looked up on demand
//! when the item modal opens and resolved to a URL under `/assets`.

use std::path::Path;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AssetError {
    #[error("Invalid asset name: {0}")]
    InvalidName(String),

    #[error("Asset not found: {0}")]
    NotFound(String),
}

/// Resolve `<assets_dir>/<name>.jpg` to its public URL
pub async fn resolve_secondary_image(assets_dir: &Path, name: &str) -> Result<String, AssetError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(AssetError::InvalidName(name.to_string()));
    }

    let file_name = format!("{}.jpg", name);
    match tokio::fs::metadata(assets_dir.join(&file_name)).await {
        Ok(meta) if meta.is_file() => Ok(format!("/assets/{}", file_name)),
        _ => Err(AssetError::NotFound(file_name)),
    }
}
