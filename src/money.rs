//! Money display, bid input parsing and bid field paths.

use crate::types::{Amount, BidIndex, ItemId};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Accepted shape of a typed bid: whole units with an optional 1-2 digit fraction
static MONETARY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(\.\d{1,2})?$").expect("valid monetary pattern"));

/// Render an amount in minor units for display, e.g. `£105` or `£105.50`
pub fn format_money(currency: &str, amount: Amount) -> String {
    let whole = amount / 100;
    let cents = amount % 100;
    if cents == 0 {
        format!("{}{}", currency, whole)
    } else {
        format!("{}{}.{:02}", currency, whole, cents)
    }
}

/// Parse a raw bid string into minor units.
///
/// Returns `None` for anything that is not a plain monetary value
/// (signs, separators, whitespace, more than two decimals, overflow).
pub fn parse_amount(raw: &str) -> Option<Amount> {
    if !MONETARY_PATTERN.is_match(raw) {
        return None;
    }

    let (whole, fraction) = match raw.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (raw, ""),
    };

    let whole: Amount = whole.parse().ok()?;
    let cents: Amount = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<Amount>().ok()? * 10,
        _ => fraction.parse().ok()?,
    };

    whole.checked_mul(100)?.checked_add(cents)
}

/// Location of one bid entry inside the shared auction document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldPath {
    pub item_id: ItemId,
    pub bid_index: BidIndex,
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.bids.{}", self.item_id, self.bid_index)
    }
}

/// Field path for the bid entry at `bid_index` of item `item_id`
pub fn format_field(item_id: ItemId, bid_index: BidIndex) -> FieldPath {
    FieldPath { item_id, bid_index }
}
