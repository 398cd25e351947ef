//! Bidder message handlers
//!
//! Browsing, modal control, bidding and sign-up for one session.

use crate::protocol::ServerMessage;
use crate::state::bidding::{BidError, BidInput};
use crate::state::signup::SignUpForm;
use crate::state::AppState;
use crate::types::{ItemId, ModalType, SessionId};

pub async fn handle_list_items(state: &AppState) -> Option<ServerMessage> {
    match state.list_items().await {
        Ok(items) => Some(ServerMessage::Items { items }),
        Err(e) => {
            tracing::error!("Failed to list items: {}", e);
            Some(ServerMessage::Error {
                code: "BACKEND_ERROR".to_string(),
                msg: "Items could not be loaded, please try again".to_string(),
            })
        }
    }
}

pub async fn handle_open_item(
    state: &AppState,
    session_id: &SessionId,
    item_id: ItemId,
) -> Option<ServerMessage> {
    match state.open_item(session_id, item_id).await {
        Ok(view) => Some(ServerMessage::Modal {
            modal: ModalType::Item,
            item: Some(view),
        }),
        Err(e) => Some(ServerMessage::Error {
            code: e.code().to_string(),
            msg: e.to_string(),
        }),
    }
}

pub async fn handle_open_sign_up(state: &AppState, session_id: &SessionId) -> Option<ServerMessage> {
    match state.open_sign_up(session_id).await {
        Ok(()) => Some(ServerMessage::Modal {
            modal: ModalType::SignUp,
            item: None,
        }),
        Err(e) => Some(ServerMessage::Error {
            code: e.code().to_string(),
            msg: e.to_string(),
        }),
    }
}

pub async fn handle_close_modal(state: &AppState, session_id: &SessionId) -> Option<ServerMessage> {
    match state.close_modal(session_id).await {
        Ok(()) => Some(ServerMessage::Modal {
            modal: ModalType::None,
            item: None,
        }),
        Err(e) => Some(ServerMessage::Error {
            code: e.code().to_string(),
            msg: e.to_string(),
        }),
    }
}

pub async fn handle_submit_bid(
    state: &AppState,
    session_id: &SessionId,
    input: BidInput,
) -> Option<ServerMessage> {
    match state.submit_bid(session_id, input).await {
        Ok(placed) => Some(ServerMessage::BidAccepted {
            item_id: placed.item_id,
            index: placed.index,
            amount: placed.amount,
            display: placed.display(),
        }),
        Err(e) => Some(bid_rejected(&e)),
    }
}

fn bid_rejected(e: &BidError) -> ServerMessage {
    ServerMessage::BidRejected {
        code: e.code().to_string(),
        msg: e.to_string(),
        recoverable: !e.is_terminal(),
    }
}

pub async fn handle_sign_up(
    state: &AppState,
    session_id: &SessionId,
    form: SignUpForm,
) -> Option<ServerMessage> {
    match state.sign_up(session_id, form).await {
        Ok(profile) => Some(ServerMessage::SignedUp { name: profile.name }),
        Err(e) => {
            tracing::debug!(code = e.code(), "Sign-up rejected: {}", e);
            Some(ServerMessage::SignUpRejected {
                code: e.code().to_string(),
                msg: e.to_string(),
            })
        }
    }
}
