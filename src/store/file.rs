//! JSON snapshot persistence.
//!
//! The whole auction document is rewritten after every mutation: first to
//! a sibling temp file, then renamed over the real one so a crash never
//! leaves a half-written document behind.

use super::{AuctionDocument, DocumentStore, StoreError, StoreResult};
use crate::money::FieldPath;
use crate::types::{Bid, Identity, Item, ItemId, Profile};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::RwLock;

/// Schema version for the snapshot format
/// Version 1: items + users
/// Version 2: added bidder identities so tokens resume after a restart
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Snapshot {
    schema_version: u32,
    /// Save timestamp (ISO8601)
    saved_at: String,
    document: AuctionDocument,
}

pub struct JsonFileStore {
    path: PathBuf,
    doc: RwLock<AuctionDocument>,
}

impl JsonFileStore {
    /// Load the document at `path`, starting empty if the file does not exist yet
    pub async fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let doc = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
                if snapshot.schema_version > SNAPSHOT_SCHEMA_VERSION {
                    return Err(StoreError::UnsupportedSchema {
                        found: snapshot.schema_version,
                        supported: SNAPSHOT_SCHEMA_VERSION,
                    });
                }
                tracing::info!(
                    path = %path.display(),
                    items = snapshot.document.items.len(),
                    saved_at = %snapshot.saved_at,
                    "Loaded auction document"
                );
                snapshot.document
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No auction document yet, starting empty");
                AuctionDocument::default()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            doc: RwLock::new(doc),
        })
    }

    async fn persist(&self, doc: &AuctionDocument) -> StoreResult<()> {
        let snapshot = Snapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            saved_at: chrono::Utc::now().to_rfc3339(),
            document: doc.clone(),
        };
        let json = serde_json::to_vec_pretty(&snapshot)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Apply `f` to a copy of the document and only keep it once it is on disk
    async fn mutate<T>(
        &self,
        f: impl FnOnce(&mut AuctionDocument) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut doc = self.doc.write().await;
        let mut next = doc.clone();
        let out = f(&mut next)?;
        self.persist(&next).await?;
        *doc = next;
        Ok(out)
    }
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    async fn read_item(&self, id: ItemId) -> StoreResult<Option<Item>> {
        Ok(self.doc.read().await.items.get(&id).cloned())
    }

    async fn read_all_items(&self) -> StoreResult<Vec<Item>> {
        Ok(self.doc.read().await.items.values().cloned().collect())
    }

    async fn read_profile(&self, uid: &str) -> StoreResult<Option<Profile>> {
        Ok(self.doc.read().await.users.get(uid).cloned())
    }

    async fn write_profile(&self, uid: &str, profile: Profile) -> StoreResult<()> {
        tracing::debug!(uid, "write users/{}", uid);
        self.mutate(|doc| {
            doc.users.insert(uid.to_string(), profile);
            Ok(())
        })
        .await
    }

    async fn read_identity(&self, uid: &str) -> StoreResult<Option<Identity>> {
        Ok(self.doc.read().await.identities.get(uid).cloned())
    }

    async fn find_identity_by_token(&self, token: &str) -> StoreResult<Option<Identity>> {
        Ok(self.doc.read().await.identity_by_token(token))
    }

    async fn write_identity(&self, identity: Identity) -> StoreResult<()> {
        tracing::debug!(uid = %identity.uid, "write identities/{}", identity.uid);
        self.mutate(|doc| {
            doc.identities.insert(identity.uid.clone(), identity);
            Ok(())
        })
        .await
    }

    async fn append_bid(&self, field: &FieldPath, bid: Bid) -> StoreResult<()> {
        tracing::debug!(%field, amount = bid.amount, "write auction/items");
        self.mutate(|doc| doc.set_bid(field, bid)).await
    }

    async fn append_bid_if_next(&self, field: &FieldPath, bid: Bid) -> StoreResult<bool> {
        tracing::debug!(%field, amount = bid.amount, "conditional write auction/items");
        self.mutate(|doc| doc.set_bid_if_next(field, bid)).await
    }

    async fn bulk_update_items(&self, catalog: Vec<Item>) -> StoreResult<usize> {
        self.mutate(|doc| Ok(doc.update_items(catalog))).await
    }

    async fn bulk_delete_bids(&self) -> StoreResult<usize> {
        self.mutate(|doc| Ok(doc.delete_bids())).await
    }
}
