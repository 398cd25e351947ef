//! Sign-up flow: capture the bidder's name and contact details

use super::AppState;
use crate::identity::IdentityError;
use crate::store::StoreError;
use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SignUpForm {
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

impl SignUpForm {
    /// Local checks only; nothing is written when these fail
    pub fn validate(&self) -> Result<(), SignUpError> {
        if self.full_name.trim().is_empty() {
            return Err(SignUpError::NameRequired);
        }
        if self.email.trim().is_empty() && self.phone.trim().is_empty() {
            return Err(SignUpError::ContactRequired);
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SignUpError {
    #[error("Please enter your full name")]
    NameRequired,

    #[error("Please enter at least an email or phone number")]
    ContactRequired,

    #[error("Unknown session")]
    UnknownSession,

    #[error("Could not update your identity: {0}")]
    Identity(#[from] IdentityError),

    #[error("Could not save your details: {0}")]
    Store(#[from] StoreError),
}

impl SignUpError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NameRequired => "NAME_REQUIRED",
            Self::ContactRequired => "CONTACT_REQUIRED",
            Self::UnknownSession => "UNKNOWN_SESSION",
            Self::Identity(_) | Self::Store(_) => "BACKEND_ERROR",
        }
    }
}

impl AppState {
    /// Register the session's bidder and schedule the modal to close
    pub async fn sign_up(
        &self,
        session_id: &SessionId,
        form: SignUpForm,
    ) -> Result<Profile, SignUpError> {
        form.validate()?;

        let uid = self
            .sessions
            .read()
            .await
            .get(session_id)
            .map(|e| e.uid.clone())
            .ok_or(SignUpError::UnknownSession)?;

        let name = form.full_name.trim().to_string();
        self.identities.set_display_name(&uid, &name).await?;

        let profile = Profile {
            name: name.clone(),
            email: form.email.trim().to_string(),
            phone: form.phone.trim().to_string(),
            admin: false,
        };
        self.store.write_profile(&uid, profile.clone()).await?;

        if let Some(entry) = self.sessions.write().await.get_mut(session_id) {
            entry.modal.signed_in_user = Some(name);
        }
        tracing::info!(uid = %uid, "Bidder signed up");

        self.schedule_close(session_id);
        Ok(profile)
    }
}
