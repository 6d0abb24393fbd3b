use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("DB: running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id            TEXT PRIMARY KEY,
                name          TEXT NOT NULL,
                email         TEXT NOT NULL UNIQUE,
                password      TEXT NOT NULL,
                is_active     INTEGER NOT NULL DEFAULT 1,
                is_superuser  INTEGER NOT NULL DEFAULT 0,
                last_login    TEXT,
                created_at    TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE study_rooms (
                id            TEXT PRIMARY KEY,
                name          TEXT NOT NULL,
                description   TEXT,
                max_members   INTEGER NOT NULL CHECK (max_members > 0),
                created_by    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at    TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at    TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_study_rooms_creator ON study_rooms(created_by);

            CREATE TABLE room_members (
                id         TEXT PRIMARY KEY,
                room_id    TEXT NOT NULL REFERENCES study_rooms(id) ON DELETE CASCADE,
                user_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                joined_at  TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(room_id, user_id)
            );

            CREATE INDEX idx_room_members_room ON room_members(room_id);

            CREATE TABLE materials (
                id           TEXT PRIMARY KEY,
                room_id      TEXT NOT NULL REFERENCES study_rooms(id) ON DELETE CASCADE,
                uploaded_by  TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                file_name    TEXT NOT NULL,
                location     TEXT NOT NULL,
                size_bytes   INTEGER NOT NULL,
                created_at   TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_materials_room ON materials(room_id);

            CREATE TABLE reports (
                id           TEXT PRIMARY KEY,
                material_id  TEXT NOT NULL REFERENCES materials(id) ON DELETE CASCADE,
                reporter_id  TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                comment      TEXT NOT NULL,
                created_at   TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_reports_material ON reports(material_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    Ok(())
}
