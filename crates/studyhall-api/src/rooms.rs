use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, warn};
use uuid::Uuid;

use studyhall_db::models::{Admission, Removal, RoomRow};
use studyhall_types::api::{Claims, CreateRoomRequest, RoomResponse};

use crate::AppState;
use crate::error::ApiError;

pub async fn create_room(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateRoomRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::Validation("name must not be empty".into()));
    }
    if req.max_members <= 0 {
        return Err(ApiError::Validation("max_members must be positive".into()));
    }

    let room_id = Uuid::new_v4();
    state.db.create_room(
        &room_id.to_string(),
        &req.name,
        req.description.as_deref(),
        req.max_members,
        &claims.sub.to_string(),
        &Uuid::new_v4().to_string(),
    )?;

    let room = state
        .db
        .get_room(&room_id.to_string())?
        .ok_or(ApiError::NotFound("study room"))?;

    info!("Room {} created by {}", room_id, claims.sub);
    Ok((StatusCode::CREATED, Json(room_response(room))))
}

pub async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let room = state
        .db
        .get_room(&room_id.to_string())?
        .ok_or(ApiError::NotFound("study room"))?;
    Ok(Json(room_response(room)))
}

/// POST /rooms/{id}/members — join. The admission decision (exists, not a
/// duplicate, below capacity) is one transaction in the store; racing joins
/// serialize there and the loser comes back as RoomFull or AlreadyMember.
pub async fn join_room(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    let outcome = state.db.admit_member(
        &Uuid::new_v4().to_string(),
        &room_id.to_string(),
        &claims.sub.to_string(),
    )?;

    match outcome {
        Admission::Admitted => {
            info!("User {} joined room {}", claims.sub, room_id);
            Ok(StatusCode::NO_CONTENT)
        }
        Admission::RoomMissing => Err(ApiError::NotFound("study room")),
        Admission::AlreadyMember => Err(ApiError::Conflict("already a member of this room")),
        Admission::RoomFull => Err(ApiError::CapacityExceeded),
    }
}

pub async fn leave_room(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    let outcome = state
        .db
        .remove_member(&room_id.to_string(), &claims.sub.to_string())?;

    match outcome {
        Removal::Removed => Ok(StatusCode::NO_CONTENT),
        Removal::RoomMissing => Err(ApiError::NotFound("study room")),
        Removal::NotMember => Err(ApiError::NotFound("membership")),
        Removal::Owner => Err(ApiError::OwnerCannotLeave),
    }
}

/// DELETE /rooms/{id} — owner only. Memberships, materials and reports
/// cascade with the rows; material blobs are deleted afterwards, best
/// effort — the orphan sweep catches anything left behind.
pub async fn delete_room(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    let room = state
        .db
        .get_room(&room_id.to_string())?
        .ok_or(ApiError::NotFound("study room"))?;
    if room.created_by != claims.sub.to_string() {
        return Err(ApiError::Forbidden("only the room owner can delete it"));
    }

    let locations = state.db.delete_room(&room.id)?;
    for location in &locations {
        if let Err(e) = state.store.delete(location).await {
            warn!("Failed to delete blob {}: {}", location, e);
        }
    }

    info!(
        "Room {} deleted by {} ({} blobs removed)",
        room_id,
        claims.sub,
        locations.len()
    );
    Ok(StatusCode::NO_CONTENT)
}

fn room_response(row: RoomRow) -> RoomResponse {
    RoomResponse {
        id: crate::parse_uuid("room id", &row.id),
        name: row.name,
        description: row.description,
        max_members: row.max_members,
        member_count: row.member_count,
        created_by: crate::parse_uuid("created_by", &row.created_by),
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}
