use super::*;
use gatehouse::{Credentials, SessionState};

fn temp_store() -> (tempfile::TempDir, FileStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path().join("nested").join("session.json"));
    (dir, store)
}

#[test]
fn missing_file_reads_as_empty() {
    let (_dir, store) = temp_store();
    assert_eq!(store.get("token").unwrap(), None);
    assert!(!store.path().exists());
}

#[test]
fn set_creates_parent_dirs_and_round_trips() {
    let (_dir, store) = temp_store();
    store.set("token", "t1").unwrap();
    store.set("isAdmin", "false").unwrap();

    assert_eq!(store.get("token").unwrap().as_deref(), Some("t1"));
    assert_eq!(store.get("isAdmin").unwrap().as_deref(), Some("false"));

    let on_disk: serde_json::Value = serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
    assert_eq!(on_disk, serde_json::json!({ "isAdmin": "false", "token": "t1" }));
}

#[test]
fn remove_deletes_key_and_leaves_no_temp_file() {
    let (_dir, store) = temp_store();
    store.set("token", "t1").unwrap();
    store.remove("token").unwrap();
    store.remove("token").unwrap();

    assert_eq!(store.get("token").unwrap(), None);
    assert!(!store.path().with_extension("json.tmp").exists());
}

#[test]
fn remove_on_missing_file_does_not_create_it() {
    let (_dir, store) = temp_store();
    store.remove("token").unwrap();
    assert!(!store.path().exists());
}

#[test]
fn corrupt_file_is_a_store_error_and_bootstraps_anonymous() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    fs::write(&path, "{not json").unwrap();
    let store = FileStore::new(&path);

    assert!(matches!(store.get("token"), Err(StoreError::Io { op: "parse", .. })));
    assert_eq!(gatehouse::store::restore(&store), SessionState::anonymous());
}

#[test]
fn persisted_session_survives_a_new_store_instance() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let state = SessionState::authenticated(Credentials {
        token: "t1".to_owned(),
        is_admin: true,
        is_approved: true,
        email: Some("ops@example.com".to_owned()),
    });

    gatehouse::store::persist(&FileStore::new(&path), &state).unwrap();

    assert_eq!(gatehouse::store::restore(&FileStore::new(&path)), state);
}

#[cfg(unix)]
#[test]
fn file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;
    let (_dir, store) = temp_store();
    store.set("token", "t1").unwrap();
    let mode = fs::metadata(store.path()).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}
