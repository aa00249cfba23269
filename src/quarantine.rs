//! Quarantine store for safety-blocked audio payloads.
//!
//! Each blocked item becomes one binary file plus one JSON metadata sidecar
//! so an operator can review what the filter refused. Written once, never
//! rewritten.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct QuarantineMeta {
    pub chat_id: String,
    pub mime_type: String,
    pub detail: String,
    pub quarantined_at: String,
}

pub struct QuarantineStore {
    dir: PathBuf,
}

impl QuarantineStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Persist one blocked payload and its metadata sidecar. Returns the
    /// path of the binary file.
    pub async fn quarantine(
        &self,
        payload: &[u8],
        chat_id: &str,
        mime_type: &str,
        detail: &str,
    ) -> anyhow::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let stem = format!("{}-{}", Uuid::new_v4(), Utc::now().timestamp_millis());
        let bin_path = self.dir.join(format!("{}.bin", stem));
        let meta_path = self.dir.join(format!("{}.json", stem));

        let meta = QuarantineMeta {
            chat_id: chat_id.to_string(),
            mime_type: mime_type.to_string(),
            detail: detail.to_string(),
            quarantined_at: Utc::now().to_rfc3339(),
        };

        tokio::fs::write(&bin_path, payload).await?;
        tokio::fs::write(&meta_path, serde_json::to_vec_pretty(&meta)?).await?;

        info!(
            path = %bin_path.display(),
            chat_id,
            "Quarantined safety-blocked payload"
        );
        Ok(bin_path)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_payload_and_sidecar() {
        let tmp = tempfile::tempdir().unwrap();
        let store = QuarantineStore::new(tmp.path().join("q"));

        let bin = store
            .quarantine(&[1, 2, 3], "chat-1", "audio/ogg", "candidate blocked")
            .await
            .unwrap();

        assert_eq!(tokio::fs::read(&bin).await.unwrap(), vec![1, 2, 3]);

        let sidecar = bin.with_extension("json");
        let meta: serde_json::Value =
            serde_json::from_slice(&tokio::fs::read(&sidecar).await.unwrap()).unwrap();
        assert_eq!(meta["chat_id"], "chat-1");
        assert_eq!(meta["mime_type"], "audio/ogg");
    }
}
