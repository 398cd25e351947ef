use super::{AuctionDocument, DocumentStore, StoreResult};
use crate::money::FieldPath;
use crate::types::{Bid, Identity, Item, ItemId, Profile};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Volatile store for development and tests
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    doc: Arc<RwLock<AuctionDocument>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: Vec<Item>) -> Self {
        let mut doc = AuctionDocument::default();
        doc.update_items(items);
        Self {
            doc: Arc::new(RwLock::new(doc)),
        }
    }

    #[cfg(test)]
    async fn snapshot(&self) -> AuctionDocument {
        self.doc.read().await.clone()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
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
        self.doc
            .write()
            .await
            .users
            .insert(uid.to_string(), profile);
        Ok(())
    }

    async fn read_identity(&self, uid: &str) -> StoreResult<Option<Identity>> {
        Ok(self.doc.read().await.identities.get(uid).cloned())
    }

    async fn find_identity_by_token(&self, token: &str) -> StoreResult<Option<Identity>> {
        Ok(self.doc.read().await.identity_by_token(token))
    }

    async fn write_identity(&self, identity: Identity) -> StoreResult<()> {
        tracing::debug!(uid = %identity.uid, "write identities/{}", identity.uid);
        self.doc
            .write()
            .await
            .identities
            .insert(identity.uid.clone(), identity);
        Ok(())
    }

    async fn append_bid(&self, field: &FieldPath, bid: Bid) -> StoreResult<()> {
        tracing::debug!(%field, amount = bid.amount, "write auction/items");
        self.doc.write().await.set_bid(field, bid)
    }

    async fn append_bid_if_next(&self, field: &FieldPath, bid: Bid) -> StoreResult<bool> {
        tracing::debug!(%field, amount = bid.amount, "conditional write auction/items");
        self.doc.write().await.set_bid_if_next(field, bid)
    }

    async fn bulk_update_items(&self, catalog: Vec<Item>) -> StoreResult<usize> {
        Ok(self.doc.write().await.update_items(catalog))
    }

    async fn bulk_delete_bids(&self) -> StoreResult<usize> {
        Ok(self.doc.write().await.delete_bids())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::format_field;
    use std::collections::BTreeMap;

    fn item(id: ItemId) -> Item {
        Item {
            id,
            title: format!("Item {}", id),
            detail: String::new(),
            currency: "£".to_string(),
            starting_price: None,
            minimum_increase: None,
            maximum_increase: None,
            end_time: None,
            secondary_image: None,
            bids: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_items_are_ordered_by_id() {
        let store = InMemoryStore::with_items(vec![item(3), item(1), item(2)]);
        let ids: Vec<_> = store
            .read_all_items()
            .await
            .unwrap()
            .iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_profile_roundtrip() {
        let store = InMemoryStore::new();
        assert!(store.read_profile("u1").await.unwrap().is_none());

        let profile = Profile {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            phone: String::new(),
            admin: false,
        };
        store.write_profile("u1", profile.clone()).await.unwrap();
        assert_eq!(store.read_profile("u1").await.unwrap(), Some(profile));
    }

    #[tokio::test]
    async fn test_append_bid_visible_on_read() {
        let store = InMemoryStore::with_items(vec![item(1)]);
        store
            .append_bid(
                &format_field(1, 1),
                Bid {
                    amount: 500,
                    uid: "u1".to_string(),
                },
            )
            .await
            .unwrap();

        let read = store.read_item(1).await.unwrap().unwrap();
        assert_eq!(read.bids[&1].amount, 500);
    }

    #[tokio::test]
    async fn test_concurrent_unconditional_writes_last_wins() {
        let store = InMemoryStore::with_items(vec![item(1)]);
        let field = format_field(1, 1);
        let (a, b) = tokio::join!(
            store.append_bid(
                &field,
                Bid {
                    amount: 500,
                    uid: "a".to_string()
                }
            ),
            store.append_bid(
                &field,
                Bid {
                    amount: 600,
                    uid: "b".to_string()
                }
            ),
        );
        assert!(a.is_ok() && b.is_ok());
        // Both writes succeed but only one entry survives at the shared path
        assert_eq!(store.snapshot().await.items[&1].bids.len(), 1);
    }
}
