use crate::money::format_money;
use crate::state::signup::SignUpForm;
use crate::types::*;
use crate::validate::BidBounds;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Request the full item list
    ListItems,
    OpenItem {
        item_id: ItemId,
    },
    OpenSignUp,
    CloseModal,
    /// Bid a typed amount on the open item
    SubmitBid {
        amount: String,
    },
    /// Bid exactly the current minimum or maximum on the open item
    QuickBid {
        kind: QuickBid,
    },
    SignUp(SignUpForm),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        protocol: String,
        auction_name: String,
        uid: Uid,
        /// Pass back as `?token=` to resume this identity
        token: String,
        signed_in_user: Option<String>,
        server_now: String,
    },
    Items {
        items: Vec<ItemView>,
    },
    /// Current modal of this session
    Modal {
        modal: ModalType,
        #[serde(skip_serializing_if = "Option::is_none")]
        item: Option<ItemView>,
    },
    /// Broadcast whenever an item's bids change
    ItemUpdated {
        item: ItemView,
    },
    /// The open item modal's auction just closed
    ItemEnded {
        item_id: ItemId,
    },
    BidAccepted {
        item_id: ItemId,
        index: BidIndex,
        amount: Amount,
        display: String,
    },
    BidRejected {
        code: String,
        msg: String,
        /// False when the modal will close or redirect on its own
        recoverable: bool,
    },
    SignedUp {
        name: String,
    },
    SignUpRejected {
        code: String,
        msg: String,
    },
    Error {
        code: String,
        msg: String,
    },
}

/// Item plus everything the bidding modal shows about it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemView {
    pub id: ItemId,
    pub title: String,
    pub detail: String,
    pub currency: String,
    pub end_time: Option<i64>,
    pub amount: Amount,
    pub bids: u32,
    /// Name of the current high bidder, if any
    pub last_bidder: Option<String>,
    pub min_bid: Amount,
    pub max_bid: Amount,
    pub increment: Amount,
    pub ended: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_image_url: Option<String>,
    pub display: ItemDisplay,
}

/// Pre-formatted money strings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemDisplay {
    pub amount: String,
    pub min_bid: String,
    pub max_bid: String,
    pub increment: String,
}

impl ItemView {
    pub fn new(item: &Item, status: &BidStatus, last_bidder: Option<String>, now_ms: i64) -> Self {
        let bounds = BidBounds::for_item(item, status);
        let increment = item.minimum_increase();
        let money = |amount| format_money(&item.currency, amount);

        Self {
            id: item.id,
            title: item.title.clone(),
            detail: item.detail.clone(),
            currency: item.currency.clone(),
            end_time: item.end_time,
            amount: status.amount,
            bids: status.bids,
            last_bidder,
            min_bid: bounds.minimum,
            max_bid: bounds.maximum,
            increment,
            ended: item.has_ended(now_ms),
            secondary_image_url: None,
            display: ItemDisplay {
                amount: money(status.amount),
                min_bid: money(bounds.minimum),
                max_bid: money(bounds.maximum),
                increment: money(increment),
            },
        }
    }
}
