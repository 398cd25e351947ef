//! Bid submission flow
//!
//! Timestamp first, then claim the session's submit control, validate
//! against freshly read item data and issue exactly one write.

use super::AppState;
use crate::config::BidWriteMode;
use crate::identity::IdentityError;
use crate::money::{format_field, format_money, parse_amount};
use crate::status::item_status;
use crate::store::StoreError;
use crate::types::*;
use crate::validate::{validate_bid, BidBounds, BidRejection};

#[derive(Debug, thiserror::Error)]
pub enum BidError {
    #[error(transparent)]
    Rejected(#[from] BidRejection),

    #[error("Your previous bid is still being submitted")]
    InProgress,

    #[error("No item is open for bidding")]
    NoActiveItem,

    #[error("Unknown session")]
    UnknownSession,

    #[error("Item {0} no longer exists")]
    ItemNotFound(ItemId),

    #[error("Your bid could not be saved, please try again ({0})")]
    Backend(#[from] StoreError),

    #[error("Your identity could not be checked, please try again ({0})")]
    Identity(#[from] IdentityError),

    #[error("Someone else bid at the same time, please try again")]
    Conflict,
}

impl BidError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Rejected(r) => r.code(),
            Self::InProgress => "SUBMISSION_IN_PROGRESS",
            Self::NoActiveItem => "NO_ACTIVE_ITEM",
            Self::UnknownSession => "UNKNOWN_SESSION",
            Self::ItemNotFound(_) => "ITEM_NOT_FOUND",
            Self::Backend(_) | Self::Identity(_) => "BACKEND_ERROR",
            Self::Conflict => "BID_CONFLICT",
        }
    }

    /// True when the session will close or redirect on its own
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected(r) if r.is_terminal())
    }
}

/// What the bidder asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BidInput {
    /// Raw text from the amount field
    Typed(String),
    Quick(QuickBid),
}

/// Bid input after parsing; quick bids resolve against each fresh read
#[derive(Debug, Clone, Copy)]
enum Requested {
    Exact(Amount),
    Quick(QuickBid),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedBid {
    pub item_id: ItemId,
    pub index: BidIndex,
    pub amount: Amount,
    pub currency: String,
}

impl PlacedBid {
    pub fn display(&self) -> String {
        format_money(&self.currency, self.amount)
    }
}

impl AppState {
    /// Submit a bid on the item open in `session_id`.
    ///
    /// Terminal rejections schedule the follow-up transition (close or
    /// sign-up redirect); recoverable ones leave the modal open.
    pub async fn submit_bid(
        &self,
        session_id: &SessionId,
        input: BidInput,
    ) -> Result<PlacedBid, BidError> {
        // Get submission time as early as possible
        let now_ms = chrono::Utc::now().timestamp_millis();

        let (uid, item_id) = self.claim_submit(session_id).await?;
        let result = self.place_bid(&uid, item_id, &input, now_ms).await;

        match &result {
            Ok(placed) => {
                tracing::info!(
                    item_id,
                    index = placed.index,
                    amount = placed.amount,
                    uid = %uid,
                    "Bid placed"
                );
                self.publish_item_update(item_id).await;
                self.schedule_close(session_id);
            }
            Err(BidError::Rejected(BidRejection::Ended)) => {
                self.release_submit(session_id).await;
                self.schedule_close(session_id);
            }
            Err(BidError::Rejected(BidRejection::IdentityRequired)) => {
                self.schedule_sign_up_redirect(session_id);
            }
            Err(e @ (BidError::Backend(_) | BidError::Identity(_))) => {
                tracing::error!(item_id, uid = %uid, "Bid write failed: {}", e);
                self.release_submit(session_id).await;
            }
            Err(e) => {
                tracing::debug!(item_id, code = e.code(), "Bid rejected: {}", e);
                self.release_submit(session_id).await;
            }
        }

        result
    }

    /// Take the session's submit control for its open item
    async fn claim_submit(&self, session_id: &SessionId) -> Result<(Uid, ItemId), BidError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(session_id)
            .ok_or(BidError::UnknownSession)?;

        let item_id = match (&entry.modal.current_modal, &entry.modal.active_item) {
            (ModalType::Item, Some(item)) => item.id,
            _ => return Err(BidError::NoActiveItem),
        };
        if !entry.modal.begin_submit() {
            return Err(BidError::InProgress);
        }
        Ok((entry.uid.clone(), item_id))
    }

    async fn release_submit(&self, session_id: &SessionId) {
        if let Some(entry) = self.sessions.write().await.get_mut(session_id) {
            entry.modal.end_submit();
        }
    }

    async fn place_bid(
        &self,
        uid: &str,
        item_id: ItemId,
        input: &BidInput,
        now_ms: i64,
    ) -> Result<PlacedBid, BidError> {
        let requested = match input {
            BidInput::Typed(raw) => {
                Requested::Exact(parse_amount(raw).ok_or(BidRejection::InvalidAmount)?)
            }
            BidInput::Quick(kind) => Requested::Quick(*kind),
        };

        let bidder = self.identities.current_identity(uid).await?;
        let attempts = match self.config.bid_write_mode {
            BidWriteMode::LastWriteWins => 1,
            BidWriteMode::Conditional => self.config.bid_retries,
        };

        for attempt in 1..=attempts {
            let item = self
                .store
                .read_item(item_id)
                .await?
                .ok_or(BidError::ItemNotFound(item_id))?;
            let status = item_status(&item);

            let amount = match requested {
                Requested::Exact(amount) => amount,
                Requested::Quick(QuickBid::Min) => BidBounds::for_item(&item, &status).minimum,
                Requested::Quick(QuickBid::Max) => BidBounds::for_item(&item, &status).maximum,
            };

            validate_bid(&item, &status, amount, bidder.as_ref(), now_ms)?;

            let field = format_field(item_id, status.bids + 1);
            let bid = Bid {
                amount,
                uid: uid.to_string(),
            };
            let placed = PlacedBid {
                item_id,
                index: field.bid_index,
                amount,
                currency: item.currency.clone(),
            };

            match self.config.bid_write_mode {
                BidWriteMode::LastWriteWins => {
                    self.store.append_bid(&field, bid).await?;
                    return Ok(placed);
                }
                BidWriteMode::Conditional => {
                    if self.store.append_bid_if_next(&field, bid).await? {
                        return Ok(placed);
                    }
                    tracing::warn!(item_id, attempt, %field, "Bid write conflict, re-validating");
                }
            }
        }

        Err(BidError::Conflict)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::config::AuctionConfig;
    use crate::money::FieldPath;
    use crate::protocol::ServerMessage;
    use crate::store::{DocumentStore, InMemoryStore, StoreResult};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    async fn named(state: &AppState, identity: &Identity) {
        state
            .identities
            .set_display_name(&identity.uid, "Ada")
            .await
            .unwrap();
    }

    async fn next_outbox(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> ServerMessage {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("outbox message")
            .expect("open outbox")
    }

    #[tokio::test]
    async fn test_accepted_bid_appends_next_index() {
        let (state, session_id, identity, mut rx) = connected(vec![item(1)]).await;
        named(&state, &identity).await;
        state.open_item(&session_id, 1).await.unwrap();

        let placed = state
            .submit_bid(&session_id, BidInput::Typed("105".to_string()))
            .await
            .unwrap();
        assert_eq!(placed.index, 1);
        assert_eq!(placed.amount, 10_500);
        assert_eq!(placed.display(), "£105");

        let stored = state.store.read_item(1).await.unwrap().unwrap();
        assert_eq!(
            stored.bids[&1],
            Bid {
                amount: 10_500,
                uid: identity.uid.clone()
            }
        );

        // Submit control stays locked until the modal closes itself
        assert!(state.session_modal(&session_id).await.unwrap().submitting);
        assert!(matches!(
            next_outbox(&mut rx).await,
            ServerMessage::Modal {
                modal: ModalType::None,
                ..
            }
        ));
        assert!(!state.session_modal(&session_id).await.unwrap().submitting);
    }

    #[tokio::test]
    async fn test_recoverable_rejection_keeps_modal_open() {
        let (state, session_id, identity, _rx) = connected(vec![item(1)]).await;
        named(&state, &identity).await;
        state.open_item(&session_id, 1).await.unwrap();

        let err = state
            .submit_bid(&session_id, BidInput::Typed("104".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "BELOW_MINIMUM");
        assert!(!err.is_terminal());

        let modal = state.session_modal(&session_id).await.unwrap();
        assert!(modal.is_showing_item(1));
        assert!(!modal.submitting);

        // Immediate resubmission is allowed
        assert!(state
            .submit_bid(&session_id, BidInput::Typed("110".to_string()))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_invalid_amount_rejected_before_anything_else() {
        let mut ended = item(1);
        ended.end_time = Some(1);
        let (state, session_id, _identity, _rx) = connected(vec![ended]).await;
        state.open_item(&session_id, 1).await.unwrap();

        let err = state
            .submit_bid(&session_id, BidInput::Typed("12.345".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_AMOUNT");
        assert_eq!(err.to_string(), "Please enter a valid monetary amount!");
    }

    #[tokio::test]
    async fn test_ended_item_closes_modal() {
        let mut ended = item(1);
        ended.end_time = Some(1);
        let (state, session_id, identity, mut rx) = connected(vec![ended]).await;
        named(&state, &identity).await;
        state.open_item(&session_id, 1).await.unwrap();

        let err = state
            .submit_bid(&session_id, BidInput::Typed("105".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ITEM_ENDED");
        assert!(err.is_terminal());
        assert!(!state.session_modal(&session_id).await.unwrap().submitting);

        assert!(matches!(
            next_outbox(&mut rx).await,
            ServerMessage::Modal {
                modal: ModalType::None,
                ..
            }
        ));
        assert!(state.store.read_item(1).await.unwrap().unwrap().bids.is_empty());
    }

    #[tokio::test]
    async fn test_missing_identity_redirects_to_sign_up() {
        let (state, session_id, _identity, mut rx) = connected(vec![item(1)]).await;
        state.open_item(&session_id, 1).await.unwrap();

        let err = state
            .submit_bid(&session_id, BidInput::Typed("105".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "IDENTITY_REQUIRED");

        assert!(matches!(
            next_outbox(&mut rx).await,
            ServerMessage::Modal {
                modal: ModalType::SignUp,
                ..
            }
        ));
        let modal = state.session_modal(&session_id).await.unwrap();
        assert_eq!(modal.current_modal, ModalType::SignUp);
        assert!(!modal.submitting);
    }

    #[tokio::test]
    async fn test_duplicate_submission_refused() {
        let (state, session_id, identity, _rx) = connected(vec![item(1)]).await;
        named(&state, &identity).await;
        state.open_item(&session_id, 1).await.unwrap();

        state
            .submit_bid(&session_id, BidInput::Typed("105".to_string()))
            .await
            .unwrap();
        let err = state
            .submit_bid(&session_id, BidInput::Typed("110".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "SUBMISSION_IN_PROGRESS");
    }

    #[tokio::test]
    async fn test_no_open_item() {
        let (state, session_id, _identity, _rx) = connected(vec![item(1)]).await;
        let err = state
            .submit_bid(&session_id, BidInput::Quick(QuickBid::Min))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NO_ACTIVE_ITEM");
    }

    #[tokio::test]
    async fn test_quick_bids_use_fresh_status() {
        let (state, session_id, identity, _rx) = connected(vec![item(1)]).await;
        named(&state, &identity).await;
        state.open_item(&session_id, 1).await.unwrap();

        // Someone else bids after the modal was opened
        state
            .store
            .append_bid(
                &format_field(1, 1),
                Bid {
                    amount: 11_000,
                    uid: "other".to_string(),
                },
            )
            .await
            .unwrap();

        let placed = state
            .submit_bid(&session_id, BidInput::Quick(QuickBid::Max))
            .await
            .unwrap();
        assert_eq!(placed.index, 2);
        assert_eq!(placed.amount, 16_000);
    }

    #[tokio::test]
    async fn test_accepted_bid_broadcasts_update() {
        let (state, session_id, identity, _rx) = connected(vec![item(1)]).await;
        named(&state, &identity).await;
        let mut updates = state.broadcast.subscribe();
        state.open_item(&session_id, 1).await.unwrap();

        state
            .submit_bid(&session_id, BidInput::Quick(QuickBid::Min))
            .await
            .unwrap();
        match updates.recv().await.unwrap() {
            ServerMessage::ItemUpdated { item } => {
                assert_eq!(item.amount, 10_500);
                assert_eq!(item.bids, 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    /// Store whose bid writes always fail
    struct FailingWrites(InMemoryStore);

    #[async_trait]
    impl DocumentStore for FailingWrites {
        async fn read_item(&self, id: ItemId) -> StoreResult<Option<Item>> {
            self.0.read_item(id).await
        }
        async fn read_all_items(&self) -> StoreResult<Vec<Item>> {
            self.0.read_all_items().await
        }
        async fn read_profile(&self, uid: &str) -> StoreResult<Option<Profile>> {
            self.0.read_profile(uid).await
        }
        async fn write_profile(&self, uid: &str, profile: Profile) -> StoreResult<()> {
            self.0.write_profile(uid, profile).await
        }
        async fn read_identity(&self, uid: &str) -> StoreResult<Option<Identity>> {
            self.0.read_identity(uid).await
        }
        async fn find_identity_by_token(&self, token: &str) -> StoreResult<Option<Identity>> {
            self.0.find_identity_by_token(token).await
        }
        async fn write_identity(&self, identity: Identity) -> StoreResult<()> {
            self.0.write_identity(identity).await
        }
        async fn append_bid(&self, _field: &FieldPath, _bid: Bid) -> StoreResult<()> {
            Err(StoreError::Unavailable("network down".to_string()))
        }
        async fn append_bid_if_next(&self, _field: &FieldPath, _bid: Bid) -> StoreResult<bool> {
            Err(StoreError::Unavailable("network down".to_string()))
        }
        async fn bulk_update_items(&self, catalog: Vec<Item>) -> StoreResult<usize> {
            self.0.bulk_update_items(catalog).await
        }
        async fn bulk_delete_bids(&self) -> StoreResult<usize> {
            self.0.bulk_delete_bids().await
        }
    }

    #[tokio::test]
    async fn test_backend_failure_is_recoverable() {
        let state = AppState::with_store(
            fast_config(),
            Arc::new(FailingWrites(InMemoryStore::with_items(vec![item(1)]))),
        );
        let identity = state.identities.sign_in(None).await.unwrap();
        named(&state, &identity).await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session_id = state.open_session(&identity, tx).await;
        state.open_item(&session_id, 1).await.unwrap();

        let err = state
            .submit_bid(&session_id, BidInput::Typed("105".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "BACKEND_ERROR");
        assert!(!err.is_terminal());

        let modal = state.session_modal(&session_id).await.unwrap();
        assert!(modal.is_showing_item(1));
        assert!(!modal.submitting);

        // No auto close was scheduled
        let pushed = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(pushed.is_err());
    }

    /// Store that lets another bidder win the race on the first conditional write
    struct RacingStore {
        inner: InMemoryStore,
        raced: tokio::sync::Mutex<bool>,
    }

    #[async_trait]
    impl DocumentStore for RacingStore {
        async fn read_item(&self, id: ItemId) -> StoreResult<Option<Item>> {
            self.inner.read_item(id).await
        }
        async fn read_all_items(&self) -> StoreResult<Vec<Item>> {
            self.inner.read_all_items().await
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
            let mut raced = self.raced.lock().await;
            if !*raced {
                *raced = true;
                self.inner
                    .append_bid(
                        field,
                        Bid {
                            amount: 10_500,
                            uid: "rival".to_string(),
                        },
                    )
                    .await?;
            }
            self.inner.append_bid_if_next(field, bid).await
        }
        async fn bulk_update_items(&self, catalog: Vec<Item>) -> StoreResult<usize> {
            self.inner.bulk_update_items(catalog).await
        }
        async fn bulk_delete_bids(&self) -> StoreResult<usize> {
            self.inner.bulk_delete_bids().await
        }
    }

    async fn racing_state() -> (AppState, SessionId) {
        let state = AppState::with_store(
            AuctionConfig {
                bid_write_mode: BidWriteMode::Conditional,
                ..fast_config()
            },
            Arc::new(RacingStore {
                inner: InMemoryStore::with_items(vec![item(1)]),
                raced: tokio::sync::Mutex::new(false),
            }),
        );
        let identity = state.identities.sign_in(None).await.unwrap();
        named(&state, &identity).await;
        let (tx, _rx) = mpsc::unbounded_channel();
        let session_id = state.open_session(&identity, tx).await;
        state.open_item(&session_id, 1).await.unwrap();
        (state, session_id)
    }

    #[tokio::test]
    async fn test_conditional_write_revalidates_after_conflict() {
        let (state, session_id) = racing_state().await;

        // Still valid against the rival's 105: lands at index 2
        let placed = state
            .submit_bid(&session_id, BidInput::Typed("115".to_string()))
            .await
            .unwrap();
        assert_eq!(placed.index, 2);

        let stored = state.store.read_item(1).await.unwrap().unwrap();
        assert_eq!(stored.bids[&1].uid, "rival");
        assert_eq!(stored.bids[&2].amount, 11_500);
    }

    #[tokio::test]
    async fn test_conditional_write_rejects_stale_bid() {
        let (state, session_id) = racing_state().await;

        // Valid against the starting price, too low once the rival's bid lands
        let err = state
            .submit_bid(&session_id, BidInput::Typed("105".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "BELOW_MINIMUM");
        assert_eq!(err.to_string(), "Minimum bid is £110");
    }
}
