use crate::types::{BidStatus, Item};

/// Derive the current high bid, bid count and winner from an item's bid map.
///
/// The entry at the highest index is authoritative, even if a concurrent
/// write left a smaller amount there.
pub fn item_status(item: &Item) -> BidStatus {
    match item.bids.iter().next_back() {
        Some((_, bid)) => BidStatus {
            amount: bid.amount,
            bids: item.bids.len() as u32,
            winner: Some(bid.uid.clone()),
        },
        None => BidStatus {
            amount: item.starting_price.unwrap_or(0),
            bids: 0,
            winner: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Bid;
    use std::collections::BTreeMap;

    fn item(starting_price: Option<u64>, bids: &[(u32, u64, &str)]) -> Item {
        Item {
            id: 1,
            title: "Wine".to_string(),
            detail: String::new(),
            currency: "£".to_string(),
            starting_price,
            minimum_increase: None,
            maximum_increase: None,
            end_time: None,
            secondary_image: None,
            bids: bids
                .iter()
                .map(|(i, amount, uid)| {
                    (
                        *i,
                        Bid {
                            amount: *amount,
                            uid: uid.to_string(),
                        },
                    )
                })
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn test_no_bids_uses_starting_price() {
        let status = item_status(&item(Some(2_500), &[]));
        assert_eq!(status.amount, 2_500);
        assert_eq!(status.bids, 0);
        assert!(status.winner.is_none());
    }

    #[test]
    fn test_no_bids_without_starting_price_is_zero() {
        let status = item_status(&item(None, &[]));
        assert_eq!(status.amount, 0);
        assert!(status.winner.is_none());
    }

    #[test]
    fn test_highest_index_wins() {
        for n in 1..=5u32 {
            let bids: Vec<_> = (1..=n).map(|i| (i, i as u64 * 100, "u")).collect();
            let mut it = item(Some(50), &bids);
            it.bids.get_mut(&n).unwrap().uid = "last".to_string();

            let status = item_status(&it);
            assert_eq!(status.amount, n as u64 * 100);
            assert_eq!(status.bids, n);
            assert_eq!(status.winner.as_deref(), Some("last"));
        }
    }

    #[test]
    fn test_index_order_is_numeric() {
        // "10" sorts before "9" as a string; the map key is numeric
        let bids: Vec<_> = (1..=10u32).map(|i| (i, i as u64 * 100, "u")).collect();
        let status = item_status(&item(None, &bids));
        assert_eq!(status.amount, 1_000);
    }

    #[test]
    fn test_decreasing_amount_at_later_index_is_reported_as_is() {
        let status = item_status(&item(None, &[(1, 900, "a"), (2, 700, "b")]));
        assert_eq!(status.amount, 700);
        assert_eq!(status.winner.as_deref(), Some("b"));
    }
}
