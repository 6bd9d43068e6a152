//! In-memory vault for downloaded video blobs.
//!
//! A stored blob gets a locally addressable reference (`/media/{uuid}`) that the
//! gateway serves back to the browser.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::provider::DownloadedAsset;

pub const MEDIA_ROUTE_PREFIX: &str = "/media/";

#[derive(Clone, Default)]
pub struct MediaVault {
    blobs: Arc<RwLock<HashMap<Uuid, Arc<DownloadedAsset>>>>,
}

impl MediaVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a blob and return its local reference.
    pub async fn insert(&self, asset: DownloadedAsset) -> String {
        let id = Uuid::new_v4();
        let size = asset.bytes.len();
        self.blobs.write().await.insert(id, Arc::new(asset));
        tracing::debug!(%id, size, "media blob stored");
        format!("{}{}", MEDIA_ROUTE_PREFIX, id)
    }

    pub async fn get(&self, id: &Uuid) -> Option<Arc<DownloadedAsset>> {
        self.blobs.read().await.get(id).cloned()
    }

    /// Resolve a reference produced by `insert`.
    pub async fn get_by_reference(&self, reference: &str) -> Option<Arc<DownloadedAsset>> {
        let id = reference
            .strip_prefix(MEDIA_ROUTE_PREFIX)
            .and_then(|s| Uuid::parse_str(s).ok())?;
        self.get(&id).await
    }

    /// Release a blob once nothing displays it anymore.
    pub async fn revoke(&self, reference: &str) -> bool {
        let Some(id) = reference
            .strip_prefix(MEDIA_ROUTE_PREFIX)
            .and_then(|s| Uuid::parse_str(s).ok())
        else {
            return false;
        };
        self.blobs.write().await.remove(&id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn insert_resolve_revoke() {
        let vault = MediaVault::new();
        let reference = vault
            .insert(DownloadedAsset {
                bytes: Bytes::from(vec![0, 0, 0, 24]),
                mime_type: "video/mp4".to_string(),
            })
            .await;
        assert!(reference.starts_with(MEDIA_ROUTE_PREFIX));

        let asset = vault.get_by_reference(&reference).await.unwrap();
        assert_eq!(asset.mime_type, "video/mp4");

        // Serving a blob hands out the stored buffer, not a copy.
        let served = asset.bytes.clone();
        assert_eq!(served.as_ptr(), asset.bytes.as_ptr());

        assert!(vault.revoke(&reference).await);
        assert!(vault.is_empty().await);
        assert!(!vault.revoke("/media/not-a-uuid").await);
    }
}
