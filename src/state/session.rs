//! Session lifecycle and modal transitions
//!
//! Delayed transitions (auto close, sign-up redirect, item end) run as
//! spawned tasks and report to the session through its outbox.

use super::{AppState, SessionEntry};
use crate::assets::resolve_secondary_image;
use crate::modal::ModalSession;
use crate::protocol::{ItemView, ServerMessage};
use crate::store::StoreError;
use crate::types::*;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Unknown session")]
    UnknownSession,

    #[error("Item {0} not found")]
    ItemNotFound(ItemId),

    #[error("Could not load item: {0}")]
    Store(#[from] StoreError),
}

impl SessionError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownSession => "UNKNOWN_SESSION",
            Self::ItemNotFound(_) => "ITEM_NOT_FOUND",
            Self::Store(_) => "BACKEND_ERROR",
        }
    }
}

impl AppState {
    /// Register a connected page for `identity`
    pub async fn open_session(
        &self,
        identity: &Identity,
        outbox: mpsc::UnboundedSender<ServerMessage>,
    ) -> SessionId {
        let session_id = ulid::Ulid::new().to_string();
        let entry = SessionEntry {
            uid: identity.uid.clone(),
            modal: ModalSession::new(identity.name().map(str::to_string)),
            outbox,
            end_timer: None,
        };
        self.sessions
            .write()
            .await
            .insert(session_id.clone(), entry);
        tracing::debug!(session_id = %session_id, uid = %identity.uid, "Session opened");
        session_id
    }

    /// Drop a session. In-flight writes it started are not cancelled.
    pub async fn end_session(&self, session_id: &SessionId) {
        if let Some(mut entry) = self.sessions.write().await.remove(session_id) {
            entry.cancel_end_timer();
            tracing::debug!(session_id = %session_id, "Session closed");
        }
    }

    /// Copy of a session's modal state
    pub async fn session_modal(&self, session_id: &SessionId) -> Option<ModalSession> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|e| e.modal.clone())
    }

    /// Open the bidding modal on a freshly read item
    pub async fn open_item(
        &self,
        session_id: &SessionId,
        item_id: ItemId,
    ) -> Result<ItemView, SessionError> {
        let item = self
            .store
            .read_item(item_id)
            .await?
            .ok_or(SessionError::ItemNotFound(item_id))?;
        let now_ms = chrono::Utc::now().timestamp_millis();

        let mut view = self.item_view(&item, now_ms).await;
        if let Some(name) = &item.secondary_image {
            match resolve_secondary_image(&self.config.assets_dir, name).await {
                Ok(url) => view.secondary_image_url = Some(url),
                Err(e) => tracing::warn!(item_id, "Secondary image unavailable: {}", e),
            }
        }

        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(session_id)
            .ok_or(SessionError::UnknownSession)?;
        entry.cancel_end_timer();
        entry.modal.open_modal(ModalType::Item, Some(item.clone()));
        entry.modal.active_item_ended = view.ended;
        if !view.ended {
            entry.end_timer = self.spawn_end_timer(session_id, &item, now_ms);
        }

        Ok(view)
    }

    pub async fn open_sign_up(&self, session_id: &SessionId) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(session_id)
            .ok_or(SessionError::UnknownSession)?;
        entry.cancel_end_timer();
        entry.modal.open_modal(ModalType::SignUp, None);
        Ok(())
    }

    pub async fn close_modal(&self, session_id: &SessionId) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(session_id)
            .ok_or(SessionError::UnknownSession)?;
        entry.cancel_end_timer();
        entry.modal.close_modal();
        Ok(())
    }

    /// Close the session's modal after the configured delay.
    ///
    /// Whatever modal is open at that point gets closed.
    pub fn schedule_close(&self, session_id: &SessionId) {
        let state = self.clone();
        let session_id = session_id.clone();
        let delay = self.config.auto_close;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if state.close_modal(&session_id).await.is_ok() {
                state
                    .send_to_session(
                        &session_id,
                        ServerMessage::Modal {
                            modal: ModalType::None,
                            item: None,
                        },
                    )
                    .await;
            }
        });
    }

    /// Switch the session to the sign-up modal after the configured delay
    pub fn schedule_sign_up_redirect(&self, session_id: &SessionId) {
        let state = self.clone();
        let session_id = session_id.clone();
        let delay = self.config.auto_close;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if state.open_sign_up(&session_id).await.is_ok() {
                state
                    .send_to_session(
                        &session_id,
                        ServerMessage::Modal {
                            modal: ModalType::SignUp,
                            item: None,
                        },
                    )
                    .await;
            }
        });
    }

    pub async fn send_to_session(&self, session_id: &SessionId, msg: ServerMessage) {
        if let Some(entry) = self.sessions.read().await.get(session_id) {
            entry.send(msg);
        }
    }

    /// Apply a re-read item to a session showing it and re-arm its end timer
    /// from the item's current end time
    pub(super) fn refresh_open_item(
        &self,
        session_id: &SessionId,
        entry: &mut SessionEntry,
        item: &Item,
        now_ms: i64,
    ) {
        entry.cancel_end_timer();
        entry.modal.active_item = Some(item.clone());

        if item.has_ended(now_ms) {
            if !entry.modal.active_item_ended {
                entry.modal.active_item_ended = true;
                entry.send(ServerMessage::ItemEnded { item_id: item.id });
            }
        } else {
            entry.modal.active_item_ended = false;
            entry.end_timer = self.spawn_end_timer(session_id, item, now_ms);
        }
    }

    /// Single deadline task flagging the open item as ended once its end time passes
    fn spawn_end_timer(
        &self,
        session_id: &SessionId,
        item: &Item,
        now_ms: i64,
    ) -> Option<tokio::task::JoinHandle<()>> {
        let remaining = item.end_time? - now_ms;
        if remaining <= 0 {
            return None;
        }

        let state = self.clone();
        let session_id = session_id.clone();
        let item_id = item.id;

        Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(remaining as u64)).await;
            state.mark_item_ended(&session_id, item_id).await;
        }))
    }

    async fn mark_item_ended(&self, session_id: &SessionId, item_id: ItemId) {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let mut sessions = self.sessions.write().await;
        let Some(entry) = sessions.get_mut(session_id) else {
            return;
        };
        if !entry.modal.is_showing_item(item_id) {
            return;
        }
        let Some(item) = entry.modal.active_item.clone() else {
            return;
        };

        if item.has_ended(now_ms) {
            entry.modal.active_item_ended = true;
            entry.end_timer = None;
            entry.send(ServerMessage::ItemEnded { item_id });
            tracing::info!(item_id, "Bidding closed for open item");
        } else {
            // End time moved later while this task slept
            entry.end_timer = self.spawn_end_timer(session_id, &item, now_ms);
        }
    }
}
