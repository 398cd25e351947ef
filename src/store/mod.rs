//! Document store seam
//!
//! The auction lives in one shared document holding every item (with its
//! bid map), the bidder profiles and the bidder identities. Bids are appended with a
//! field-level write at `<item>.bids.<index>`.

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::InMemoryStore;

use crate::money::FieldPath;
use crate::types::{Bid, Identity, Item, ItemId, Profile, Uid};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Item {0} not found")]
    ItemNotFound(ItemId),

    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored document is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Stored document schema version {found} is newer than supported version {supported}")]
    UnsupportedSchema { found: u32, supported: u32 },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Backend collaborator consumed by the bidding, sign-up and export flows
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn read_item(&self, id: ItemId) -> StoreResult<Option<Item>>;

    /// All items ordered by id
    async fn read_all_items(&self) -> StoreResult<Vec<Item>>;

    async fn read_profile(&self, uid: &str) -> StoreResult<Option<Profile>>;

    /// Create or replace the profile owned by `uid`
    async fn write_profile(&self, uid: &str, profile: Profile) -> StoreResult<()>;

    async fn read_identity(&self, uid: &str) -> StoreResult<Option<Identity>>;

    async fn find_identity_by_token(&self, token: &str) -> StoreResult<Option<Identity>>;

    /// Create or replace the identity record keyed by its uid
    async fn write_identity(&self, identity: Identity) -> StoreResult<()>;

    /// Unconditional field write; an existing entry at the same path is overwritten
    async fn append_bid(&self, field: &FieldPath, bid: Bid) -> StoreResult<()>;

    /// Write only if `field` is exactly the next free index of the item.
    /// Returns false on conflict.
    async fn append_bid_if_next(&self, field: &FieldPath, bid: Bid) -> StoreResult<bool>;

    /// Upsert item metadata from a catalog, keeping existing bids. Returns the item count.
    async fn bulk_update_items(&self, catalog: Vec<Item>) -> StoreResult<usize>;

    /// Remove every bid on every item. Returns the number of bids removed.
    async fn bulk_delete_bids(&self) -> StoreResult<usize>;
}

/// Read an item catalog (a JSON array of items) for `bulk_update_items`
pub async fn read_catalog(path: &Path) -> StoreResult<Vec<Item>> {
    let raw = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&raw)?)
}

/// The whole auction document, shared by the in-memory and file stores
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuctionDocument {
    #[serde(default)]
    pub items: BTreeMap<ItemId, Item>,
    #[serde(default)]
    pub users: BTreeMap<Uid, Profile>,
    #[serde(default)]
    pub identities: BTreeMap<Uid, Identity>,
}

impl AuctionDocument {
    fn identity_by_token(&self, token: &str) -> Option<Identity> {
        self.identities
            .values()
            .find(|identity| identity.token == token)
            .cloned()
    }

    fn set_bid(&mut self, field: &FieldPath, bid: Bid) -> StoreResult<()> {
        let item = self
            .items
            .get_mut(&field.item_id)
            .ok_or(StoreError::ItemNotFound(field.item_id))?;
        item.bids.insert(field.bid_index, bid);
        Ok(())
    }

    fn set_bid_if_next(&mut self, field: &FieldPath, bid: Bid) -> StoreResult<bool> {
        let item = self
            .items
            .get_mut(&field.item_id)
            .ok_or(StoreError::ItemNotFound(field.item_id))?;
        let next = item.bids.len() as u32 + 1;
        if field.bid_index != next || item.bids.contains_key(&field.bid_index) {
            return Ok(false);
        }
        item.bids.insert(field.bid_index, bid);
        Ok(true)
    }

    fn update_items(&mut self, catalog: Vec<Item>) -> usize {
        let count = catalog.len();
        for mut incoming in catalog {
            if let Some(existing) = self.items.get_mut(&incoming.id) {
                incoming.bids = std::mem::take(&mut existing.bids);
            }
            self.items.insert(incoming.id, incoming);
        }
        count
    }

    fn delete_bids(&mut self) -> usize {
        self.items
            .values_mut()
            .map(|item| {
                let removed = item.bids.len();
                item.bids.clear();
                removed
            })
            .sum()
    }
}
