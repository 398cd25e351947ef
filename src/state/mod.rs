pub mod bidding;
pub mod export;
pub mod session;
pub mod signup;

use crate::config::AuctionConfig;
use crate::identity::{IdentityProvider, StoredIdentities};
use crate::modal::ModalSession;
use crate::protocol::{ItemView, ServerMessage};
use crate::status::item_status;
use crate::store::{DocumentStore, InMemoryStore, StoreResult};
use crate::types::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;

/// One connected page and its modal state machine
pub struct SessionEntry {
    pub uid: Uid,
    pub modal: ModalSession,
    /// Messages pushed to this session outside of a request/response exchange
    outbox: mpsc::UnboundedSender<ServerMessage>,
    /// Deadline task for the open item's end time
    end_timer: Option<JoinHandle<()>>,
}

impl SessionEntry {
    fn send(&self, msg: ServerMessage) {
        // The socket may already be gone
        let _ = self.outbox.send(msg);
    }

    fn cancel_end_timer(&mut self) {
        if let Some(timer) = self.end_timer.take() {
            timer.abort();
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AuctionConfig>,
    pub store: Arc<dyn DocumentStore>,
    pub identities: Arc<dyn IdentityProvider>,
    pub sessions: Arc<RwLock<HashMap<SessionId, SessionEntry>>>,
    /// Broadcast channel for item updates to every session
    pub broadcast: broadcast::Sender<ServerMessage>,
}

impl AppState {
    pub fn new(
        config: AuctionConfig,
        store: Arc<dyn DocumentStore>,
        identities: Arc<dyn IdentityProvider>,
    ) -> Self {
        let (tx, _rx) = broadcast::channel(100);
        Self {
            config: Arc::new(config),
            store,
            identities,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            broadcast: tx,
        }
    }

    /// State whose identities are kept in the same store as items and profiles
    pub fn with_store(config: AuctionConfig, store: Arc<dyn DocumentStore>) -> Self {
        let identities = Arc::new(StoredIdentities::new(store.clone()));
        Self::new(config, store, identities)
    }

    /// State backed by an in-memory store seeded with `items`
    pub fn in_memory(config: AuctionConfig, items: Vec<Item>) -> Self {
        Self::with_store(config, Arc::new(InMemoryStore::with_items(items)))
    }

    /// Send a message to every connected session
    pub fn broadcast(&self, msg: ServerMessage) {
        // Ignore send errors (no receivers connected is fine)
        let _ = self.broadcast.send(msg);
    }

    /// Build the client view of an item, resolving the high bidder's name
    pub async fn item_view(&self, item: &Item, now_ms: i64) -> ItemView {
        let status = item_status(item);
        let last_bidder = match &status.winner {
            Some(uid) => match self.store.read_profile(uid).await {
                Ok(profile) => profile.map(|p| p.name),
                Err(e) => {
                    tracing::warn!(uid = %uid, "Failed to read bidder profile: {}", e);
                    None
                }
            },
            None => None,
        };
        ItemView::new(item, &status, last_bidder, now_ms)
    }

    pub async fn list_items(&self) -> StoreResult<Vec<ItemView>> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let items = self.store.read_all_items().await?;

        let mut views = Vec::with_capacity(items.len());
        for item in &items {
            views.push(self.item_view(item, now_ms).await);
        }
        Ok(views)
    }

    /// Re-read an item after it changed, refresh open modals and broadcast it.
    ///
    /// Sessions showing the item get their end timer re-armed, since a
    /// catalog update can move the end time either way.
    pub async fn publish_item_update(&self, item_id: ItemId) {
        let item = match self.store.read_item(item_id).await {
            Ok(Some(item)) => item,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(item_id, "Failed to re-read item after update: {}", e);
                return;
            }
        };

        let now_ms = chrono::Utc::now().timestamp_millis();
        {
            let mut sessions = self.sessions.write().await;
            for (session_id, entry) in sessions.iter_mut() {
                if entry.modal.is_showing_item(item_id) {
                    self.refresh_open_item(session_id, entry, &item, now_ms);
                }
            }
        }

        let view = self.item_view(&item, now_ms).await;
        self.broadcast(ServerMessage::ItemUpdated { item: view });
    }
}
