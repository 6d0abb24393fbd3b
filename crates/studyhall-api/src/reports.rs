use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use studyhall_db::models::ReportRow;
use studyhall_types::api::{Claims, CreateReportRequest, ReportResponse};

use crate::AppState;
use crate::error::ApiError;

/// POST /materials/{id}/reports — any member of the owning room may file a
/// report; repeated reports from the same member are allowed.
pub async fn create_report(
    State(state): State<AppState>,
    Path(material_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateReportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.comment.trim().is_empty() {
        return Err(ApiError::Validation("comment must not be empty".into()));
    }

    let material = state
        .db
        .get_material(&material_id.to_string())?
        .ok_or(ApiError::NotFound("material"))?;

    if !state
        .db
        .is_member(&material.room_id, &claims.sub.to_string())?
    {
        return Err(ApiError::Forbidden(
            "you must be a member of the study room to report materials",
        ));
    }

    let report_id = Uuid::new_v4();
    state.db.insert_report(
        &report_id.to_string(),
        &material.id,
        &claims.sub.to_string(),
        &req.comment,
    )?;

    info!(
        "Report {} filed against material {} by {}",
        report_id, material_id, claims.sub
    );

    // Fetch back for its timestamp; the newest report is first by contract.
    let rows = state.db.reports_for_material(&material.id)?;
    let row = rows
        .into_iter()
        .find(|r| r.id == report_id.to_string())
        .ok_or(ApiError::NotFound("report"))?;

    Ok((StatusCode::CREATED, Json(report_response(row))))
}

/// GET /materials/{id}/reports — room owner only, newest first.
pub async fn list_material_reports(
    State(state): State<AppState>,
    Path(material_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let material = state
        .db
        .get_material(&material_id.to_string())?
        .ok_or(ApiError::NotFound("material"))?;

    require_room_owner(&state, &material.room_id, &claims)?;

    let rows = state.db.reports_for_material(&material.id)?;
    let reports: Vec<ReportResponse> = rows.into_iter().map(report_response).collect();
    Ok(Json(reports))
}

/// GET /rooms/{id}/reports — room owner only, aggregated across the room's
/// materials, newest first.
pub async fn list_room_reports(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_room_owner(&state, &room_id.to_string(), &claims)?;

    let rows = state.db.reports_for_room(&room_id.to_string())?;
    let reports: Vec<ReportResponse> = rows.into_iter().map(report_response).collect();
    Ok(Json(reports))
}

fn require_room_owner(state: &AppState, room_id: &str, claims: &Claims) -> Result<(), ApiError> {
    let room = state
        .db
        .get_room(room_id)?
        .ok_or(ApiError::NotFound("study room"))?;
    if room.created_by != claims.sub.to_string() {
        return Err(ApiError::Forbidden("only the room owner can read reports"));
    }
    Ok(())
}

fn report_response(row: ReportRow) -> ReportResponse {
    ReportResponse {
        id: crate::parse_uuid("report id", &row.id),
        material_id: crate::parse_uuid("material_id", &row.material_id),
        reporter_id: crate::parse_uuid("reporter_id", &row.reporter_id),
        reporter_name: row.reporter_name,
        comment: row.comment,
        created_at: row.created_at,
    }
}
