use std::sync::Arc;
use std::thread;

use studyhall_db::Database;
use studyhall_db::models::{Admission, Removal};
use uuid::Uuid;

fn open_db(dir: &tempfile::TempDir) -> Arc<Database> {
    Arc::new(Database::open(&dir.path().join("test.db")).unwrap())
}

fn seed_user(db: &Database, name: &str) -> String {
    let id = Uuid::new_v4().to_string();
    let email = format!("{}@example.com", Uuid::new_v4());
    assert!(db.create_user(&id, name, &email, "hash").unwrap());
    id
}

fn seed_room(db: &Database, owner: &str, max_members: i64) -> String {
    let id = Uuid::new_v4().to_string();
    db.create_room(
        &id,
        "room",
        None,
        max_members,
        owner,
        &Uuid::new_v4().to_string(),
    )
    .unwrap();
    id
}

#[test]
fn owner_is_seated_on_creation() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir);
    let owner = seed_user(&db, "alice");
    let room = seed_room(&db, &owner, 5);

    assert!(db.is_member(&room, &owner).unwrap());
    let row = db.get_room(&room).unwrap().unwrap();
    assert_eq!(row.member_count, 1);
    assert_eq!(row.created_by, owner);
}

#[test]
fn join_missing_room() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir);
    let user = seed_user(&db, "bob");

    let outcome = db
        .admit_member(&Uuid::new_v4().to_string(), &Uuid::new_v4().to_string(), &user)
        .unwrap();
    assert_eq!(outcome, Admission::RoomMissing);
}

#[test]
fn duplicate_join_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir);
    let owner = seed_user(&db, "alice");
    let bob = seed_user(&db, "bob");
    let room = seed_room(&db, &owner, 5);

    let first = db
        .admit_member(&Uuid::new_v4().to_string(), &room, &bob)
        .unwrap();
    assert_eq!(first, Admission::Admitted);

    let second = db
        .admit_member(&Uuid::new_v4().to_string(), &room, &bob)
        .unwrap();
    assert_eq!(second, Admission::AlreadyMember);

    assert_eq!(db.get_room(&room).unwrap().unwrap().member_count, 2);
}

#[test]
fn full_room_rejects_join() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir);
    let owner = seed_user(&db, "alice");
    let bob = seed_user(&db, "bob");
    let room = seed_room(&db, &owner, 1);

    let outcome = db
        .admit_member(&Uuid::new_v4().to_string(), &room, &bob)
        .unwrap();
    assert_eq!(outcome, Admission::RoomFull);
    assert_eq!(db.get_room(&room).unwrap().unwrap().member_count, 1);
}

/// Fire more concurrent joins than the room has seats. Exactly
/// max_members - 1 joins may win (the owner holds one seat); the member
/// count must never exceed max_members.
#[test]
fn concurrent_joins_never_exceed_capacity() {
    const K: i64 = 8;

    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir);
    let owner = seed_user(&db, "alice");
    let room = seed_room(&db, &owner, K);

    let contenders: Vec<String> = (0..(K + 5))
        .map(|i| seed_user(&db, &format!("user{}", i)))
        .collect();

    let handles: Vec<_> = contenders
        .into_iter()
        .map(|user| {
            let db = db.clone();
            let room = room.clone();
            thread::spawn(move || {
                db.admit_member(&Uuid::new_v4().to_string(), &room, &user)
                    .unwrap()
            })
        })
        .collect();

    let outcomes: Vec<Admission> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let admitted = outcomes
        .iter()
        .filter(|o| **o == Admission::Admitted)
        .count() as i64;
    let rejected = outcomes
        .iter()
        .filter(|o| **o == Admission::RoomFull)
        .count() as i64;

    assert_eq!(admitted, K - 1);
    assert_eq!(rejected, 6);
    assert_eq!(db.get_room(&room).unwrap().unwrap().member_count, K);
}

#[test]
fn owner_cannot_leave() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir);
    let owner = seed_user(&db, "alice");
    let room = seed_room(&db, &owner, 3);

    assert_eq!(db.remove_member(&room, &owner).unwrap(), Removal::Owner);
    assert!(db.is_member(&room, &owner).unwrap());
}

#[test]
fn leave_paths() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir);
    let owner = seed_user(&db, "alice");
    let bob = seed_user(&db, "bob");
    let room = seed_room(&db, &owner, 3);

    // Not a member yet
    assert_eq!(db.remove_member(&room, &bob).unwrap(), Removal::NotMember);

    db.admit_member(&Uuid::new_v4().to_string(), &room, &bob)
        .unwrap();
    assert_eq!(db.remove_member(&room, &bob).unwrap(), Removal::Removed);
    assert!(!db.is_member(&room, &bob).unwrap());

    // A freed seat can be taken again
    assert_eq!(
        db.admit_member(&Uuid::new_v4().to_string(), &room, &bob)
            .unwrap(),
        Admission::Admitted
    );

    assert_eq!(
        db.remove_member(&Uuid::new_v4().to_string(), &bob).unwrap(),
        Removal::RoomMissing
    );
}

#[test]
fn room_delete_cascades() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir);
    let owner = seed_user(&db, "alice");
    let bob = seed_user(&db, "bob");
    let room = seed_room(&db, &owner, 3);
    db.admit_member(&Uuid::new_v4().to_string(), &room, &bob)
        .unwrap();

    let material = Uuid::new_v4().to_string();
    let location = format!("{}/{}.pdf", room, material);
    db.insert_material(&material, &room, &bob, "notes.pdf", &location, 42)
        .unwrap();
    db.insert_report(&Uuid::new_v4().to_string(), &material, &bob, "spam")
        .unwrap();

    let locations = db.delete_room(&room).unwrap();
    assert_eq!(locations, vec![location]);

    assert!(db.get_room(&room).unwrap().is_none());
    assert!(db.get_material(&material).unwrap().is_none());
    assert!(!db.is_member(&room, &owner).unwrap());
    assert!(db.reports_for_material(&material).unwrap().is_empty());
    // Users survive room deletion
    assert!(db.get_user_by_id(&owner).unwrap().is_some());
}

#[test]
fn reports_are_newest_first_and_repeatable() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir);
    let owner = seed_user(&db, "alice");
    let bob = seed_user(&db, "bob");
    let room = seed_room(&db, &owner, 3);
    db.admit_member(&Uuid::new_v4().to_string(), &room, &bob)
        .unwrap();

    let material = Uuid::new_v4().to_string();
    db.insert_material(&material, &room, &bob, "notes.pdf", "loc", 1)
        .unwrap();

    // Same reporter three times — no uniqueness on reports
    for i in 0..3 {
        db.insert_report(
            &Uuid::new_v4().to_string(),
            &material,
            &bob,
            &format!("report {}", i),
        )
        .unwrap();
    }

    let reports = db.reports_for_material(&material).unwrap();
    assert_eq!(reports.len(), 3);
    let comments: Vec<&str> = reports.iter().map(|r| r.comment.as_str()).collect();
    assert_eq!(comments, vec!["report 2", "report 1", "report 0"]);

    let room_reports = db.reports_for_room(&room).unwrap();
    assert_eq!(room_reports.len(), 3);
    assert_eq!(room_reports[0].reporter_name, "bob");
}
