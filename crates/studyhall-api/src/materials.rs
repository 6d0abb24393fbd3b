use axum::{
    Extension, Json,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

use studyhall_db::models::MaterialRow;
use studyhall_types::api::{Claims, MaterialResponse};

use crate::AppState;
use crate::error::ApiError;
use crate::storage::MaterialStore;

const PDF_CONTENT_TYPE: &str = "application/pdf";

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub file_name: String,
}

/// POST /rooms/{id}/materials — streaming upload.
///
/// Preconditions run before the first byte is written. The body is then
/// streamed to the blob store frame by frame with a running byte counter;
/// crossing the ceiling, or any stream/sink failure, deletes the partial
/// blob before the error is returned. The metadata row is inserted only
/// after the blob is fully on disk, and a failed insert deletes the blob
/// again — no partial artifact is ever observable.
pub async fn upload_material(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Query(query): Query<UploadQuery>,
    Extension(claims): Extension<Claims>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, ApiError> {
    let room = state
        .db
        .get_room(&room_id.to_string())?
        .ok_or(ApiError::NotFound("study room"))?;

    if !state.db.is_member(&room.id, &claims.sub.to_string())? {
        return Err(ApiError::Forbidden(
            "you must be a member of the study room to upload materials",
        ));
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if content_type != PDF_CONTENT_TYPE {
        return Err(ApiError::UnsupportedMediaType(content_type.to_string()));
    }

    if query.file_name.trim().is_empty() {
        return Err(ApiError::Validation("file_name must not be empty".into()));
    }

    let material_id = Uuid::new_v4();
    let location = MaterialStore::location(&room.id, &material_id.to_string());

    let size = stream_to_blob(&state, &location, body).await?;

    let row = persist_material(
        &state,
        &material_id.to_string(),
        &room.id,
        &claims.sub.to_string(),
        &query.file_name,
        &location,
        size,
    )
    .await?;

    info!(
        "Material {} ({} bytes) uploaded to room {} by {}",
        material_id, size, room_id, claims.sub
    );

    Ok((StatusCode::CREATED, Json(material_response(row))))
}

/// Commit the metadata row for a fully written blob. The row and the blob
/// stand or fall together: if the insert fails, the blob is deleted before
/// the error is surfaced.
async fn persist_material(
    state: &AppState,
    id: &str,
    room_id: &str,
    uploaded_by: &str,
    file_name: &str,
    location: &str,
    size: u64,
) -> Result<MaterialRow, ApiError> {
    if let Err(e) = state
        .db
        .insert_material(id, room_id, uploaded_by, file_name, location, size as i64)
    {
        if let Err(del) = state.store.delete(location).await {
            warn!("Failed to delete blob {} after DB error: {}", location, del);
        }
        return Err(e.into());
    }

    state.db.get_material(id)?.ok_or(ApiError::NotFound("material"))
}

/// Stream the request body into a fresh blob file, enforcing the byte
/// ceiling after every frame. Every failure path deletes the partial blob
/// before surfacing the error.
async fn stream_to_blob(state: &AppState, location: &str, body: Body) -> Result<u64, ApiError> {
    let mut file = state.store.create(location).await?;
    let mut stream = http_body_util::BodyStream::new(body);
    let mut written: u64 = 0;

    while let Some(frame_result) = stream.next().await {
        let frame = match frame_result {
            Ok(frame) => frame,
            Err(e) => {
                abort_blob(state, location).await;
                return Err(ApiError::Validation(format!(
                    "upload stream ended unexpectedly: {}",
                    e
                )));
            }
        };
        if let Ok(data) = frame.into_data() {
            written += data.len() as u64;
            if written > state.max_material_bytes {
                abort_blob(state, location).await;
                return Err(ApiError::PayloadTooLarge(state.max_material_bytes));
            }
            if let Err(e) = file.write_all(&data).await {
                abort_blob(state, location).await;
                return Err(anyhow::Error::from(e)
                    .context("writing material blob")
                    .into());
            }
        }
    }

    if written == 0 {
        abort_blob(state, location).await;
        return Err(ApiError::Validation("upload body is empty".into()));
    }

    if let Err(e) = file.flush().await {
        abort_blob(state, location).await;
        return Err(anyhow::Error::from(e)
            .context("flushing material blob")
            .into());
    }

    Ok(written)
}

async fn abort_blob(state: &AppState, location: &str) {
    if let Err(e) = state.store.delete(location).await {
        warn!("Failed to delete partial blob {}: {}", location, e);
    }
}

pub async fn list_materials(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let room = state
        .db
        .get_room(&room_id.to_string())?
        .ok_or(ApiError::NotFound("study room"))?;

    if !state.db.is_member(&room.id, &claims.sub.to_string())? {
        return Err(ApiError::Forbidden(
            "you must be a member of the study room to view materials",
        ));
    }

    let rows = state.db.list_materials(&room.id)?;
    let materials: Vec<MaterialResponse> = rows.into_iter().map(material_response).collect();
    Ok(Json(materials))
}

fn material_response(row: MaterialRow) -> MaterialResponse {
    MaterialResponse {
        id: crate::parse_uuid("material id", &row.id),
        room_id: crate::parse_uuid("room_id", &row.room_id),
        uploaded_by: crate::parse_uuid("uploaded_by", &row.uploaded_by),
        uploader_name: row.uploader_name,
        file_name: row.file_name,
        size: row.size_bytes as u64,
        created_at: row.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AppStateInner;
    use std::sync::Arc;
    use studyhall_db::Database;

    async fn test_state(dir: &tempfile::TempDir) -> AppState {
        let db = Database::open(&dir.path().join("test.db")).unwrap();
        let store = MaterialStore::new(dir.path().join("materials")).await.unwrap();
        Arc::new(AppStateInner {
            db,
            store,
            jwt_secret: "test-secret".into(),
            max_material_bytes: 1024,
        })
    }

    /// A failed metadata commit after the blob is fully on disk must delete
    /// the blob before surfacing the error.
    #[tokio::test]
    async fn failed_metadata_commit_deletes_blob() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir).await;

        // Blob fully written, but the room it references does not exist, so
        // the insert fails on the foreign key.
        let location = MaterialStore::location("no-such-room", "m1");
        let mut file = state.store.create(&location).await.unwrap();
        file.write_all(b"pdf bytes").await.unwrap();
        file.flush().await.unwrap();
        drop(file);
        assert!(
            tokio::fs::metadata(state.store.path(&location))
                .await
                .is_ok()
        );

        let result = persist_material(
            &state,
            "m1",
            "no-such-room",
            "no-such-user",
            "notes.pdf",
            &location,
            9,
        )
        .await;

        assert!(result.is_err());
        assert!(
            tokio::fs::metadata(state.store.path(&location))
                .await
                .is_err()
        );
        assert!(state.db.get_material("m1").unwrap().is_none());
    }
}
