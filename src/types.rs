use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Opaque ID types for type safety
pub type ItemId = u32;
pub type BidIndex = u32;
pub type Uid = String;
pub type SessionId = String;

/// Money in minor units (cents). `10500` is 105.00.
pub type Amount = u64;

/// Default smallest allowed single-bid increase (1.00)
pub const DEFAULT_MINIMUM_INCREASE: Amount = 100;
/// Default largest allowed single-bid increase (10.00)
pub const DEFAULT_MAXIMUM_INCREASE: Amount = 1_000;

/// A single accepted bid entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Bid {
    pub amount: Amount,
    pub uid: Uid,
}

/// An auctioned item as stored in the auction document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    #[serde(default)]
    pub detail: String,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starting_price: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_increase: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_increase: Option<Amount>,
    /// Epoch milliseconds. `None` means the item never closes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_image: Option<String>,
    #[serde(default, deserialize_with = "lenient_bids")]
    pub bids: BTreeMap<BidIndex, Bid>,
}

impl Item {
    /// Minimum single-bid increase, falling back to the default when unset or zero
    pub fn minimum_increase(&self) -> Amount {
        self.minimum_increase
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_MINIMUM_INCREASE)
    }

    /// Maximum single-bid increase, falling back to the default when unset or zero
    pub fn maximum_increase(&self) -> Amount {
        self.maximum_increase
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_MAXIMUM_INCREASE)
    }

    /// Whether bidding has closed at `now_ms` (inclusive of the end instant)
    pub fn has_ended(&self, now_ms: i64) -> bool {
        self.end_time.is_some_and(|end| end - now_ms <= 0)
    }
}

/// Keep only well-formed bid entries: numeric index >= 1 and a decodable value.
fn lenient_bids<'de, D>(deserializer: D) -> Result<BTreeMap<BidIndex, Bid>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, serde_json::Value>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(key, value)| {
            let index = key.parse::<BidIndex>().ok().filter(|i| *i >= 1)?;
            let bid = serde_json::from_value::<Bid>(value).ok()?;
            Some((index, bid))
        })
        .collect())
}

/// Derived summary of an item's bidding, never persisted
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BidStatus {
    pub amount: Amount,
    pub bids: u32,
    pub winner: Option<Uid>,
}

/// Bidder contact record, keyed by identity uid
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub admin: bool,
}

/// An authenticated (anonymous) bidder identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Identity {
    pub uid: Uid,
    pub token: String,
    pub display_name: Option<String>,
}

impl Identity {
    /// Display name, if one has been set and is not blank
    pub fn name(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModalType {
    #[default]
    None,
    Item,
    SignUp,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QuickBid {
    Min,
    Max,
}
