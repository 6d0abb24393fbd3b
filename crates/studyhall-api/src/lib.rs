pub mod auth;
pub mod cleanup;
pub mod error;
pub mod materials;
pub mod middleware;
pub mod reports;
pub mod rooms;
pub mod storage;
pub mod users;

use std::sync::Arc;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use tracing::warn;
use uuid::Uuid;

use studyhall_db::Database;

use crate::storage::MaterialStore;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub store: MaterialStore,
    pub jwt_secret: String,
    pub max_material_bytes: u64,
}

pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login));

    let protected = Router::new()
        .route("/users/me", get(users::me).put(users::update_me))
        .route("/users/{user_id}", get(users::get_user))
        .route("/rooms", post(rooms::create_room))
        .route(
            "/rooms/{room_id}",
            get(rooms::get_room).delete(rooms::delete_room),
        )
        .route(
            "/rooms/{room_id}/members",
            post(rooms::join_room).delete(rooms::leave_room),
        )
        .route(
            "/rooms/{room_id}/materials",
            post(materials::upload_material).get(materials::list_materials),
        )
        .route("/rooms/{room_id}/reports", get(reports::list_room_reports))
        .route(
            "/materials/{material_id}/reports",
            post(reports::create_report).get(reports::list_material_reports),
        )
        .layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        .merge(public)
        .merge(protected)
        .with_state(state)
}

/// GET /health — liveness check (no auth).
async fn health() -> &'static str {
    "ok"
}

/// Row IDs are written by us as UUIDs; a parse failure means a corrupt row,
/// which we log and tolerate rather than fail the whole response.
pub(crate) fn parse_uuid(field: &str, value: &str) -> Uuid {
    value.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", field, value, e);
        Uuid::default()
    })
}
