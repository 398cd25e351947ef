// Public API for integration tests and the server binary

pub mod api;
pub mod assets;
pub mod auth;
pub mod config;
pub mod identity;
pub mod modal;
pub mod money;
pub mod protocol;
pub mod state;
pub mod status;
pub mod store;
pub mod types;
pub mod validate;
pub mod ws;
