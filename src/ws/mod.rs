pub mod bidder;
pub mod handlers;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};

use crate::identity::IdentityError;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::{Identity, SessionId};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Identity token from a previous `welcome`
    pub token: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    tracing::info!(
        resuming = params.token.is_some(),
        "WebSocket connection request"
    );

    ws.on_upgrade(move |socket| handle_socket(socket, params, state))
}

async fn send_json<S>(sender: &mut S, msg: &ServerMessage) -> bool
where
    S: SinkExt<Message> + Unpin,
{
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to serialize server message: {}", e);
            true
        }
    }
}

/// A signed-in session and the messages that greet it
struct SessionStart {
    session_id: SessionId,
    identity: Identity,
    /// Welcome followed by the item list
    greeting: Vec<ServerMessage>,
    broadcast_rx: broadcast::Receiver<ServerMessage>,
    outbox_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

/// Sign in, open the session and build its greeting.
///
/// Item updates are subscribed before the item list is read, so an update
/// landing in between still reaches the session.
async fn start_session(
    state: &AppState,
    token: Option<&str>,
) -> Result<SessionStart, IdentityError> {
    let identity = state.identities.sign_in(token).await?;
    let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
    let session_id = state.open_session(&identity, outbox_tx).await;
    let broadcast_rx = state.broadcast.subscribe();

    let mut greeting = vec![ServerMessage::Welcome {
        protocol: "1.0".to_string(),
        auction_name: state.config.auction_name.clone(),
        uid: identity.uid.clone(),
        token: identity.token.clone(),
        signed_in_user: identity.name().map(str::to_string),
        server_now: chrono::Utc::now().to_rfc3339(),
    }];
    greeting.extend(bidder::handle_list_items(state).await);

    Ok(SessionStart {
        session_id,
        identity,
        greeting,
        broadcast_rx,
        outbox_rx,
    })
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, params: WsQuery, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let SessionStart {
        session_id,
        identity,
        greeting,
        mut broadcast_rx,
        mut outbox_rx,
    } = match start_session(&state, params.token.as_deref()).await {
        Ok(start) => start,
        Err(e) => {
            tracing::error!("Failed to sign in: {}", e);
            let _ = send_json(
                &mut sender,
                &ServerMessage::Error {
                    code: "BACKEND_ERROR".to_string(),
                    msg: "Could not sign in, please reconnect".to_string(),
                },
            )
            .await;
            return;
        }
    };

    tracing::info!(session_id = %session_id, uid = %identity.uid, "WebSocket connected");

    for msg in &greeting {
        if !send_json(&mut sender, msg).await {
            tracing::error!("Failed to send welcome message");
            state.end_session(&session_id).await;
            return;
        }
    }

    loop {
        tokio::select! {
            broadcast_msg = broadcast_rx.recv() => {
                match broadcast_msg {
                    Ok(msg) => {
                        if !send_json(&mut sender, &msg).await {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Session lagged behind item updates");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }

            // Delayed transitions for this session (auto close, item ended)
            Some(msg) = outbox_rx.recv() => {
                if !send_json(&mut sender, &msg).await {
                    break;
                }
            }

            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message: {}", text);

                        let response = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                handlers::handle_message(client_msg, &session_id, &state).await
                            }
                            Err(e) => {
                                tracing::error!("Failed to parse client message: {}", e);
                                Some(ServerMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    msg: format!("Invalid message format: {}", e),
                                })
                            }
                        };
                        if let Some(response) = response {
                            if !send_json(&mut sender, &response).await {
                                tracing::error!("Failed to send response");
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    state.end_session(&session_id).await;
    tracing::info!(session_id = %session_id, "WebSocket connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuctionConfig;
    use crate::money::FieldPath;
    use crate::state::test_support::*;
    use crate::store::{DocumentStore, InMemoryStore, StoreResult};
    use crate::types::*;
    use async_trait::async_trait;
    use std::sync::{Arc, OnceLock};

    #[tokio::test]
    async fn test_start_session_greets_with_items() {
        let state = AppState::in_memory(AuctionConfig::default(), vec![item(1), item(2)]);
        let start = start_session(&state, None).await.unwrap();

        assert_eq!(start.greeting.len(), 2);
        match &start.greeting[0] {
            ServerMessage::Welcome { uid, token, .. } => {
                assert_eq!(uid, &start.identity.uid);
                assert_eq!(token, &start.identity.token);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            &start.greeting[1],
            ServerMessage::Items { items } if items.len() == 2
        ));
        assert!(state.session_modal(&start.session_id).await.is_some());
    }

    #[tokio::test]
    async fn test_start_session_resumes_token() {
        let state = AppState::in_memory(AuctionConfig::default(), Vec::new());
        let first = start_session(&state, None).await.unwrap();
        let again = start_session(&state, Some(&first.identity.token))
            .await
            .unwrap();
        assert_eq!(again.identity.uid, first.identity.uid);
        assert_ne!(again.session_id, first.session_id);
    }

    /// Store that announces an item update while the item list is being read
    struct UpdateDuringListing {
        inner: InMemoryStore,
        updates: OnceLock<broadcast::Sender<ServerMessage>>,
    }

    #[async_trait]
    impl DocumentStore for UpdateDuringListing {
        async fn read_item(&self, id: ItemId) -> StoreResult<Option<Item>> {
            self.inner.read_item(id).await
        }
        async fn read_all_items(&self) -> StoreResult<Vec<Item>> {
            let items = self.inner.read_all_items().await?;
            if let Some(updates) = self.updates.get() {
                let _ = updates.send(ServerMessage::Items { items: Vec::new() });
            }
            Ok(items)
        }
        async fn read_profile(&self, uid: &str) -> StoreResult<Option<Profile>> {
            self.inner.read_profile(uid).await
        }
        async fn write_profile(&self, uid: &str, profile: Profile) -> StoreResult<()> {
            self.inner.write_profile(uid, profile).await
        }
        async fn read_identity(&self, uid: &str) -> StoreResult<Option<Identity>> {
            self.inner.read_identity(uid).await
        }
        async fn find_identity_by_token(&self, token: &str) -> StoreResult<Option<Identity>> {
            self.inner.find_identity_by_token(token).await
        }
        async fn write_identity(&self, identity: Identity) -> StoreResult<()> {
            self.inner.write_identity(identity).await
        }
        async fn append_bid(&self, field: &FieldPath, bid: Bid) -> StoreResult<()> {
            self.inner.append_bid(field, bid).await
        }
        async fn append_bid_if_next(&self, field: &FieldPath, bid: Bid) -> StoreResult<bool> {
            self.inner.append_bid_if_next(field, bid).await
        }
        async fn bulk_update_items(&self, catalog: Vec<Item>) -> StoreResult<usize> {
            self.inner.bulk_update_items(catalog).await
        }
        async fn bulk_delete_bids(&self) -> StoreResult<usize> {
            self.inner.bulk_delete_bids().await
        }
    }

    #[tokio::test]
    async fn test_update_during_greeting_is_delivered() {
        let store = Arc::new(UpdateDuringListing {
            inner: InMemoryStore::with_items(vec![item(1)]),
            updates: OnceLock::new(),
        });
        let state = AppState::with_store(AuctionConfig::default(), store.clone());
        assert!(store.updates.set(state.broadcast.clone()).is_ok());

        let mut start = start_session(&state, None).await.unwrap();
        assert!(matches!(
            start.broadcast_rx.try_recv(),
            Ok(ServerMessage::Items { .. })
        ));
    }
}
