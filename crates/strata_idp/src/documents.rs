use crate::error::IdpError;

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use strata_fs::atomic_write;
use tracing::info;

/// Pretty-printed with a trailing newline, written atomically.
pub async fn save_json<D: Serialize + ?Sized>(path: &Path, document: &D) -> Result<(), IdpError> {
    let mut data = serde_json::to_vec_pretty(document)?;
    data.push(b'\n');
    save_bytes(path, data).await
}

pub async fn save_bytes(path: &Path, data: Vec<u8>) -> Result<(), IdpError> {
    let size = data.len();
    atomic_write(path, data)
        .await
        .map_err(|e| IdpError::io(path, e))?;
    info!(path = %path.display(), size, "Export written");
    Ok(())
}

pub async fn load_json<D: DeserializeOwned>(path: &Path) -> Result<D, IdpError> {
    let data = load_bytes(path).await?;
    Ok(serde_json::from_slice(&data)?)
}

pub async fn load_bytes(path: &Path) -> Result<Vec<u8>, IdpError> {
    tokio::fs::read(path)
        .await
        .map_err(|e| IdpError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memberships::MembershipExport;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn saved_documents_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exports/memberships.json");
        let export = MembershipExport {
            source_org: "acme".into(),
            exported_at: "2026-01-01T00:00:00Z".into(),
            group_count: 0,
            total_members: 0,
            memberships: BTreeMap::new(),
        };

        save_json(&path, &export).await.unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("{\n  \"source_org\": \"acme\""));
        assert!(text.ends_with("}\n"));

        let loaded: MembershipExport = load_json(&path).await.unwrap();
        assert_eq!(loaded, export);
    }

    #[tokio::test]
    async fn missing_file_reports_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.json");
        let err = load_json::<MembershipExport>(&path).await.unwrap_err();
        assert!(matches!(err, IdpError::Io { path: p, .. } if p == path));
    }
}
