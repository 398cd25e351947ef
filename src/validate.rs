//! Bid validation
//!
//! Checks run in a fixed order so the reported reason is deterministic:
//! closed auction, missing identity, minimum, maximum, increment.

use crate::money::format_money;
use crate::types::{Amount, BidStatus, Identity, Item};
use thiserror::Error;

/// Why a bid was not accepted
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BidRejection {
    #[error("Please enter a valid monetary amount!")]
    InvalidAmount,

    #[error("Sorry, this item has ended!")]
    Ended,

    #[error("You must provide a username before bidding!")]
    IdentityRequired,

    #[error("Minimum bid is {}", format_money(.currency, *.minimum))]
    BelowMinimum { currency: String, minimum: Amount },

    #[error("Maximum bid is {}", format_money(.currency, *.maximum))]
    AboveMaximum { currency: String, maximum: Amount },

    #[error("Bid must be in increments of {}", format_money(.currency, *.increment))]
    BadIncrement { currency: String, increment: Amount },
}

impl BidRejection {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidAmount => "INVALID_AMOUNT",
            Self::Ended => "ITEM_ENDED",
            Self::IdentityRequired => "IDENTITY_REQUIRED",
            Self::BelowMinimum { .. } => "BELOW_MINIMUM",
            Self::AboveMaximum { .. } => "ABOVE_MAXIMUM",
            Self::BadIncrement { .. } => "BAD_INCREMENT",
        }
    }

    /// Terminal rejections end the bidding flow; everything else allows resubmission
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended | Self::IdentityRequired)
    }
}

/// Smallest and largest acceptable next bid for an item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BidBounds {
    pub minimum: Amount,
    pub maximum: Amount,
}

impl BidBounds {
    pub fn for_item(item: &Item, status: &BidStatus) -> Self {
        Self {
            minimum: status.amount.saturating_add(item.minimum_increase()),
            maximum: status.amount.saturating_add(item.maximum_increase()),
        }
    }
}

/// Decide whether `candidate` may be placed on `item` given its current `status`.
///
/// Pure: callers must derive `status` from freshly read item data.
pub fn validate_bid(
    item: &Item,
    status: &BidStatus,
    candidate: Amount,
    bidder: Option<&Identity>,
    now_ms: i64,
) -> Result<(), BidRejection> {
    if item.end_time.is_some_and(|end| end - now_ms < 0) {
        return Err(BidRejection::Ended);
    }

    if bidder.and_then(Identity::name).is_none() {
        return Err(BidRejection::IdentityRequired);
    }

    let bounds = BidBounds::for_item(item, status);
    if candidate < bounds.minimum {
        return Err(BidRejection::BelowMinimum {
            currency: item.currency.clone(),
            minimum: bounds.minimum,
        });
    }
    if candidate > bounds.maximum {
        return Err(BidRejection::AboveMaximum {
            currency: item.currency.clone(),
            maximum: bounds.maximum,
        });
    }

    let increment = item.minimum_increase();
    if (candidate - status.amount) % increment != 0 {
        return Err(BidRejection::BadIncrement {
            currency: item.currency.clone(),
            increment,
        });
    }

    Ok(())
}
