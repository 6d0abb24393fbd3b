use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use studyhall_db::models::UserRow;
use studyhall_types::api::{Claims, UpdateUserRequest, UserResponse};

use crate::AppState;
use crate::error::ApiError;

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .get_user_by_id(&claims.sub.to_string())?
        .ok_or(ApiError::NotFound("user"))?;
    Ok(Json(user_response(user)))
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = claims.sub.to_string();
    state
        .db
        .get_user_by_id(&id)?
        .ok_or(ApiError::NotFound("user"))?;

    if let Some(name) = &req.name {
        if name.trim().is_empty() {
            return Err(ApiError::Validation("name must not be empty".into()));
        }
        state.db.update_user_name(&id, name)?;
    }

    let user = state
        .db
        .get_user_by_id(&id)?
        .ok_or(ApiError::NotFound("user"))?;
    Ok(Json(user_response(user)))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .get_user_by_id(&user_id.to_string())?
        .ok_or(ApiError::NotFound("user"))?;
    Ok(Json(user_response(user)))
}

pub(crate) fn user_response(row: UserRow) -> UserResponse {
    UserResponse {
        id: crate::parse_uuid("user id", &row.id),
        name: row.name,
        email: row.email,
        is_active: row.is_active,
        created_at: row.created_at,
    }
}
