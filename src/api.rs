//! HTTP API endpoints.
//!
//! The item listing is public. Admin endpoints (winners export, catalog
//! update, bid reset) sit behind Basic auth.

use axum::{
    extract::State,
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, put},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

use crate::auth::{admin_auth_middleware, AdminAuthConfig};
use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::store::StoreError;
use crate::types::Item;

/// Outcome of a bulk admin operation
#[derive(Debug, Clone, Serialize)]
pub struct BulkResult {
    pub affected: usize,
}

/// Routes served under `/api`, plus the WebSocket endpoint
pub fn router(auth_config: Arc<AdminAuthConfig>) -> Router<AppState> {
    let admin_routes = Router::new()
        .route("/api/admin/export", get(export_winners))
        .route("/api/admin/items", put(update_items))
        .route("/api/admin/bids", delete(delete_bids))
        .layer(middleware::from_fn_with_state(
            auth_config,
            admin_auth_middleware,
        ));

    Router::new()
        .route("/ws", get(crate::ws::ws_handler))
        .route("/api/items", get(list_items))
        .merge(admin_routes)
}

fn store_failure(context: &str, e: StoreError) -> Response {
    tracing::error!("{} failed: {}", context, e);
    (
        StatusCode::SERVICE_UNAVAILABLE,
        format!("{} failed: {}", context, e),
    )
        .into_response()
}

/// List every item with its derived bid status.
///
/// GET /api/items
pub async fn list_items(State(state): State<AppState>) -> Response {
    match state.list_items().await {
        Ok(items) => Json(items).into_response(),
        Err(e) => store_failure("Listing items", e),
    }
}

/// Download the winners report.
///
/// GET /api/admin/export
///
/// 404 when no item has a bid yet.
pub async fn export_winners(State(state): State<AppState>) -> Response {
    match state.export_winners().await {
        Ok(Some(report)) => (
            [
                (
                    header::CONTENT_TYPE,
                    "text/plain; charset=utf-8".to_string(),
                ),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", report.filename),
                ),
            ],
            report.body,
        )
            .into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "No winners to export yet!").into_response(),
        Err(e) => store_failure("Winners export", e),
    }
}

/// Upsert item metadata from a catalog. Existing bids are kept.
///
/// PUT /api/admin/items
pub async fn update_items(State(state): State<AppState>, Json(catalog): Json<Vec<Item>>) -> Response {
    let ids: Vec<_> = catalog.iter().map(|i| i.id).collect();
    match state.store.bulk_update_items(catalog).await {
        Ok(affected) => {
            tracing::info!(affected, "Item catalog updated");
            for id in ids {
                state.publish_item_update(id).await;
            }
            Json(BulkResult { affected }).into_response()
        }
        Err(e) => store_failure("Item update", e),
    }
}

/// Remove every bid on every item.
///
/// DELETE /api/admin/bids
pub async fn delete_bids(State(state): State<AppState>) -> Response {
    match state.store.bulk_delete_bids().await {
        Ok(affected) => {
            tracing::warn!(affected, "All bids deleted");
            match state.list_items().await {
                Ok(items) => state.broadcast(ServerMessage::Items { items }),
                Err(e) => tracing::warn!("Failed to refresh items after bid reset: {}", e),
            }
            Json(BulkResult { affected }).into_response()
        }
        Err(e) => store_failure("Bid reset", e),
    }
}
