use crate::Database;
use crate::models::{Admission, MaterialRow, Removal, ReportRow, RoomRow, UserRow};
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- Users --

    /// Insert a new user. Returns false if the email is already taken
    /// (unique constraint), true on success.
    pub fn create_user(
        &self,
        id: &str,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            match conn.execute(
                "INSERT INTO users (id, name, email, password) VALUES (?1, ?2, ?3, ?4)",
                (id, name, email, password_hash),
            ) {
                Ok(_) => Ok(true),
                Err(e) if is_unique_violation(&e) => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn update_user_name(&self, id: &str, name: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute("UPDATE users SET name = ?1 WHERE id = ?2", (name, id))?;
            Ok(())
        })
    }

    pub fn update_password(&self, id: &str, password_hash: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE users SET password = ?1 WHERE id = ?2",
                (password_hash, id),
            )?;
            Ok(())
        })
    }

    pub fn touch_last_login(&self, id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE users SET last_login = datetime('now') WHERE id = ?1",
                [id],
            )?;
            Ok(())
        })
    }

    // -- Rooms --

    /// Create a room and seat its owner as the first member in one
    /// transaction. A room is never observable without its owner membership.
    pub fn create_room(
        &self,
        id: &str,
        name: &str,
        description: Option<&str>,
        max_members: i64,
        created_by: &str,
        membership_id: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "INSERT INTO study_rooms (id, name, description, max_members, created_by)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, name, description, max_members, created_by],
            )?;
            tx.execute(
                "INSERT INTO room_members (id, room_id, user_id) VALUES (?1, ?2, ?3)",
                rusqlite::params![membership_id, id, created_by],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_room(&self, room_id: &str) -> Result<Option<RoomRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.id, r.name, r.description, r.max_members,
                        (SELECT COUNT(*) FROM room_members m WHERE m.room_id = r.id),
                        r.created_by, r.created_at, r.updated_at
                 FROM study_rooms r WHERE r.id = ?1",
            )?;
            let row = stmt
                .query_row([room_id], |row| {
                    Ok(RoomRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                        max_members: row.get(3)?,
                        member_count: row.get(4)?,
                        created_by: row.get(5)?,
                        created_at: row.get(6)?,
                        updated_at: row.get(7)?,
                    })
                })
                .optional()?;
            Ok(row)
        })
    }

    /// Admission transaction for a join request.
    ///
    /// The capacity check and the insert are one statement: the insert's
    /// WHERE clause re-evaluates the member count inside the same
    /// transaction, so a racing join that commits first shrinks the headroom
    /// this statement sees. Together with the single-writer lock this makes
    /// two overlapping joins on a nearly-full room serialize, and the loser
    /// inserts zero rows instead of pushing the count over max_members. The
    /// UNIQUE(room_id, user_id) constraint is the duplicate backstop.
    pub fn admit_member(&self, id: &str, room_id: &str, user_id: &str) -> Result<Admission> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;

            let room: Option<i64> = tx
                .query_row(
                    "SELECT max_members FROM study_rooms WHERE id = ?1",
                    [room_id],
                    |r| r.get(0),
                )
                .optional()?;
            if room.is_none() {
                return Ok(Admission::RoomMissing);
            }

            let already: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM room_members WHERE room_id = ?1 AND user_id = ?2)",
                [room_id, user_id],
                |r| r.get(0),
            )?;
            if already {
                return Ok(Admission::AlreadyMember);
            }

            let inserted = match tx.execute(
                "INSERT INTO room_members (id, room_id, user_id)
                 SELECT ?1, ?2, ?3
                 WHERE (SELECT COUNT(*) FROM room_members WHERE room_id = ?2)
                     < (SELECT max_members FROM study_rooms WHERE id = ?2)",
                rusqlite::params![id, room_id, user_id],
            ) {
                Ok(n) => n,
                Err(e) if is_unique_violation(&e) => return Ok(Admission::AlreadyMember),
                Err(e) => return Err(e.into()),
            };

            if inserted == 0 {
                return Ok(Admission::RoomFull);
            }

            tx.commit()?;
            Ok(Admission::Admitted)
        })
    }

    /// Remove a membership. The owner's membership is never removable here;
    /// deleting the room is the only way out for the owner.
    pub fn remove_member(&self, room_id: &str, user_id: &str) -> Result<Removal> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;

            let created_by: Option<String> = tx
                .query_row(
                    "SELECT created_by FROM study_rooms WHERE id = ?1",
                    [room_id],
                    |r| r.get(0),
                )
                .optional()?;
            let Some(created_by) = created_by else {
                return Ok(Removal::RoomMissing);
            };
            if created_by == user_id {
                return Ok(Removal::Owner);
            }

            let removed = tx.execute(
                "DELETE FROM room_members WHERE room_id = ?1 AND user_id = ?2",
                [room_id, user_id],
            )?;
            if removed == 0 {
                return Ok(Removal::NotMember);
            }

            tx.commit()?;
            Ok(Removal::Removed)
        })
    }

    /// Delete a room; memberships, materials and reports cascade. Returns
    /// the blob locations of the room's materials so the caller can delete
    /// the files after the rows are gone.
    pub fn delete_room(&self, room_id: &str) -> Result<Vec<String>> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;

            let mut stmt = tx.prepare("SELECT location FROM materials WHERE room_id = ?1")?;
            let locations = stmt
                .query_map([room_id], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            drop(stmt);

            tx.execute("DELETE FROM study_rooms WHERE id = ?1", [room_id])?;
            tx.commit()?;
            Ok(locations)
        })
    }

    pub fn is_member(&self, room_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let member: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM room_members WHERE room_id = ?1 AND user_id = ?2)",
                [room_id, user_id],
                |r| r.get(0),
            )?;
            Ok(member)
        })
    }

    // -- Materials --

    pub fn insert_material(
        &self,
        id: &str,
        room_id: &str,
        uploaded_by: &str,
        file_name: &str,
        location: &str,
        size_bytes: i64,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO materials (id, room_id, uploaded_by, file_name, location, size_bytes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, room_id, uploaded_by, file_name, location, size_bytes],
            )?;
            Ok(())
        })
    }

    pub fn list_materials(&self, room_id: &str) -> Result<Vec<MaterialRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.room_id, m.uploaded_by, u.name, m.file_name, m.location,
                        m.size_bytes, m.created_at
                 FROM materials m
                 LEFT JOIN users u ON m.uploaded_by = u.id
                 WHERE m.room_id = ?1
                 ORDER BY m.created_at, m.rowid",
            )?;
            let rows = stmt
                .query_map([room_id], material_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_material(&self, material_id: &str) -> Result<Option<MaterialRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.room_id, m.uploaded_by, u.name, m.file_name, m.location,
                        m.size_bytes, m.created_at
                 FROM materials m
                 LEFT JOIN users u ON m.uploaded_by = u.id
                 WHERE m.id = ?1",
            )?;
            let row = stmt.query_row([material_id], material_from_row).optional()?;
            Ok(row)
        })
    }

    /// All blob locations with a backing row; used by the orphan sweep to
    /// decide which files on disk are dead.
    pub fn all_material_locations(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT location FROM materials")?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Reports --

    pub fn insert_report(
        &self,
        id: &str,
        material_id: &str,
        reporter_id: &str,
        comment: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO reports (id, material_id, reporter_id, comment) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, material_id, reporter_id, comment],
            )?;
            Ok(())
        })
    }

    pub fn reports_for_material(&self, material_id: &str) -> Result<Vec<ReportRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT rp.id, rp.material_id, rp.reporter_id, u.name, rp.comment, rp.created_at
                 FROM reports rp
                 LEFT JOIN users u ON rp.reporter_id = u.id
                 WHERE rp.material_id = ?1
                 ORDER BY rp.created_at DESC, rp.rowid DESC",
            )?;
            let rows = stmt
                .query_map([material_id], report_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn reports_for_room(&self, room_id: &str) -> Result<Vec<ReportRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT rp.id, rp.material_id, rp.reporter_id, u.name, rp.comment, rp.created_at
                 FROM reports rp
                 JOIN materials m ON rp.material_id = m.id
                 LEFT JOIN users u ON rp.reporter_id = u.id
                 WHERE m.room_id = ?1
                 ORDER BY rp.created_at DESC, rp.rowid DESC",
            )?;
            let rows = stmt
                .query_map([room_id], report_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT id, name, email, password, is_active, is_superuser, last_login, created_at
         FROM users WHERE {} = ?1",
        column
    );
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                password: row.get(3)?,
                is_active: row.get(4)?,
                is_superuser: row.get(5)?,
                last_login: row.get(6)?,
                created_at: row.get(7)?,
            })
        })
        .optional()?;
    Ok(row)
}

fn material_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<MaterialRow, rusqlite::Error> {
    Ok(MaterialRow {
        id: row.get(0)?,
        room_id: row.get(1)?,
        uploaded_by: row.get(2)?,
        uploader_name: row
            .get::<_, Option<String>>(3)?
            .unwrap_or_else(|| "unknown".to_string()),
        file_name: row.get(4)?,
        location: row.get(5)?,
        size_bytes: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn report_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<ReportRow, rusqlite::Error> {
    Ok(ReportRow {
        id: row.get(0)?,
        material_id: row.get(1)?,
        reporter_id: row.get(2)?,
        reporter_name: row
            .get::<_, Option<String>>(3)?
            .unwrap_or_else(|| "unknown".to_string()),
        comment: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
