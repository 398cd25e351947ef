//! WebSocket message dispatch
//!
//! Main entry point for client messages of one session.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::bidding::BidInput;
use crate::state::AppState;
use crate::types::SessionId;

use super::bidder;

/// Handle a client message and return the optional direct response
pub async fn handle_message(
    msg: ClientMessage,
    session_id: &SessionId,
    state: &AppState,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::ListItems => bidder::handle_list_items(state).await,

        ClientMessage::OpenItem { item_id } => {
            bidder::handle_open_item(state, session_id, item_id).await
        }

        ClientMessage::OpenSignUp => bidder::handle_open_sign_up(state, session_id).await,

        ClientMessage::CloseModal => bidder::handle_close_modal(state, session_id).await,

        ClientMessage::SubmitBid { amount } => {
            bidder::handle_submit_bid(state, session_id, BidInput::Typed(amount)).await
        }

        ClientMessage::QuickBid { kind } => {
            bidder::handle_submit_bid(state, session_id, BidInput::Quick(kind)).await
        }

        ClientMessage::SignUp(form) => bidder::handle_sign_up(state, session_id, form).await,
    }
}
