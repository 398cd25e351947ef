//! Per-session modal state machine
//!
//! One `ModalSession` exists per connected page. Opening a modal replaces
//! whatever is open (there is no stack); closing always returns to `None`.

use crate::types::{Item, ModalType};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModalSession {
    pub current_modal: ModalType,
    pub active_item: Option<Item>,
    pub signed_in_user: Option<String>,
    /// Set while a bid from this session is in flight
    pub submitting: bool,
    /// Set by the end-time timer once the active item closes
    pub active_item_ended: bool,
}

impl ModalSession {
    pub fn new(signed_in_user: Option<String>) -> Self {
        Self {
            signed_in_user,
            ..Self::default()
        }
    }

    pub fn open_modal(&mut self, modal: ModalType, item: Option<Item>) {
        self.current_modal = modal;
        self.active_item = item;
        self.submitting = false;
        self.active_item_ended = false;
    }

    pub fn close_modal(&mut self) {
        self.current_modal = ModalType::None;
        self.active_item = None;
        self.submitting = false;
        self.active_item_ended = false;
    }

    /// Item modal currently showing `item_id`, if any
    pub fn is_showing_item(&self, item_id: u32) -> bool {
        self.current_modal == ModalType::Item
            && self.active_item.as_ref().is_some_and(|i| i.id == item_id)
    }

    /// Claim the submit control. Returns false if a submission is already in flight.
    pub fn begin_submit(&mut self) -> bool {
        if self.submitting {
            return false;
        }
        self.submitting = true;
        true
    }

    pub fn end_submit(&mut self) {
        self.submitting = false;
    }
}
