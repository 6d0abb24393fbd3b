/// Database row types — these map directly to SQLite rows.
/// Distinct from studyhall-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub is_active: bool,
    pub is_superuser: bool,
    pub last_login: Option<String>,
    pub created_at: String,
}

pub struct RoomRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub max_members: i64,
    pub member_count: i64,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct MaterialRow {
    pub id: String,
    pub room_id: String,
    pub uploaded_by: String,
    pub uploader_name: String,
    pub file_name: String,
    pub location: String,
    pub size_bytes: i64,
    pub created_at: String,
}

pub struct ReportRow {
    pub id: String,
    pub material_id: String,
    pub reporter_id: String,
    pub reporter_name: String,
    pub comment: String,
    pub created_at: String,
}

/// Outcome of the admission transaction for a join request.
#[derive(Debug, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    RoomMissing,
    AlreadyMember,
    RoomFull,
}

/// Outcome of a leave request.
#[derive(Debug, PartialEq, Eq)]
pub enum Removal {
    Removed,
    RoomMissing,
    NotMember,
    Owner,
}
