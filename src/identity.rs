//! Bidder identities
//!
//! Every connecting browser gets an identity (uid + resumable token). The
//! display name stays empty until the bidder signs up. Identities are kept
//! in the auction document, so a token resumes across restarts when the
//! store is file-backed.

use crate::store::{DocumentStore, StoreError};
use crate::types::{Identity, Uid};
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("Unknown identity {0}")]
    UnknownIdentity(Uid),

    #[error("Identity storage failed: {0}")]
    Store(#[from] StoreError),
}

/// Identity collaborator consumed by the session, bidding and sign-up flows
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resume the identity owning `token`, or create a fresh anonymous one
    async fn sign_in(&self, token: Option<&str>) -> Result<Identity, IdentityError>;

    async fn current_identity(&self, uid: &str) -> Result<Option<Identity>, IdentityError>;

    async fn set_display_name(&self, uid: &str, name: &str) -> Result<Identity, IdentityError>;
}

/// Anonymous identities stored next to the profiles they own
#[derive(Clone)]
pub struct StoredIdentities {
    store: Arc<dyn DocumentStore>,
}

impl StoredIdentities {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl IdentityProvider for StoredIdentities {
    async fn sign_in(&self, token: Option<&str>) -> Result<Identity, IdentityError> {
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            if let Some(existing) = self.store.find_identity_by_token(token).await? {
                return Ok(existing);
            }
            tracing::info!("Unknown identity token, issuing a new identity");
        }

        let identity = Identity {
            uid: ulid::Ulid::new().to_string(),
            token: ulid::Ulid::new().to_string(),
            display_name: None,
        };
        self.store.write_identity(identity.clone()).await?;
        Ok(identity)
    }

    async fn current_identity(&self, uid: &str) -> Result<Option<Identity>, IdentityError> {
        Ok(self.store.read_identity(uid).await?)
    }

    async fn set_display_name(&self, uid: &str, name: &str) -> Result<Identity, IdentityError> {
        let mut identity = self
            .store
            .read_identity(uid)
            .await?
            .ok_or_else(|| IdentityError::UnknownIdentity(uid.to_string()))?;
        identity.display_name = Some(name.to_string());
        self.store.write_identity(identity.clone()).await?;
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryStore, JsonFileStore};

    fn identities() -> StoredIdentities {
        StoredIdentities::new(Arc::new(InMemoryStore::new()))
    }

    #[tokio::test]
    async fn test_sign_in_creates_anonymous_identity() {
        let identity = identities().sign_in(None).await.unwrap();

        assert!(identity.display_name.is_none());
        assert!(!identity.uid.is_empty());
        assert_ne!(identity.uid, identity.token);
    }

    #[tokio::test]
    async fn test_sign_in_resumes_by_token() {
        let identities = identities();
        let first = identities.sign_in(None).await.unwrap();
        identities
            .set_display_name(&first.uid, "Ada")
            .await
            .unwrap();

        let resumed = identities.sign_in(Some(&first.token)).await.unwrap();
        assert_eq!(resumed.uid, first.uid);
        assert_eq!(resumed.display_name.as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn test_unknown_token_gets_new_identity() {
        let identities = identities();
        let first = identities.sign_in(None).await.unwrap();
        let other = identities.sign_in(Some("not-a-token")).await.unwrap();
        assert_ne!(first.uid, other.uid);
    }

    #[tokio::test]
    async fn test_set_display_name_unknown_uid() {
        let result = identities().set_display_name("ghost", "Ada").await;
        assert!(matches!(result, Err(IdentityError::UnknownIdentity(_))));
    }

    #[tokio::test]
    async fn test_token_resumes_after_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auction.json");

        let first = {
            let identities =
                StoredIdentities::new(Arc::new(JsonFileStore::open(&path).await.unwrap()));
            let first = identities.sign_in(None).await.unwrap();
            identities
                .set_display_name(&first.uid, "Ada")
                .await
                .unwrap();
            first
        };

        let identities = StoredIdentities::new(Arc::new(JsonFileStore::open(&path).await.unwrap()));
        let resumed = identities.sign_in(Some(&first.token)).await.unwrap();
        assert_eq!(resumed.uid, first.uid);
        assert_eq!(resumed.name(), Some("Ada"));
    }
}
