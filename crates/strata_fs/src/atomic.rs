use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs;

/// Writes `data` to `path` via a sibling temp file and a rename.
/// Parent directories are created as needed.
pub async fn atomic_write(path: &Path, data: impl Into<Bytes>) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let tmp_path = path.with_extension("tmp");

    fs::write(&tmp_path, data.into()).await?;
    if let Err(e) = fs::rename(&tmp_path, path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(e);
    }

    Ok(())
}

/// Hex SHA-256 of a file's content along with its size.
pub async fn sha256_file(path: &Path) -> std::io::Result<(String, u64)> {
    let data = fs::read(path).await?;
    let hash = hex::encode(Sha256::digest(&data));
    Ok((hash, data.len() as u64))
}
