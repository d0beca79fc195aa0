use std::fs;
use std::path::PathBuf;

use control_plane::{
    CredentialRepository, Credentials, FileCredentialRepository, RepositoryError,
    SqliteCredentialRepository,
};
use uuid::Uuid;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("console-{}", Uuid::new_v4()))
        .join(name)
}

#[test]
fn file_repository_roundtrip() {
    let path = temp_path("credentials.json");
    let repo = FileCredentialRepository::new(&path);
    assert!(repo.load().expect("load").is_none());

    let credentials = Credentials::with_token("AC1", "secret");
    repo.save(&credentials).expect("save");
    assert_eq!(repo.load().expect("load"), Some(credentials));

    let on_disk = fs::read_to_string(&path).expect("file");
    assert!(on_disk.contains("\"accountIdentifier\": \"AC1\""));
    assert!(!on_disk.contains("apiKeyId"));

    repo.clear().expect("clear");
    assert!(!path.exists());
    repo.clear().expect("clear twice");
    assert!(repo.load().expect("load").is_none());

    if let Some(parent) = path.parent() {
        let _ = fs::remove_dir_all(parent);
    }
}

#[test]
fn file_repository_treats_empty_file_as_absent() {
    let path = temp_path("credentials.json");
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("dir");
    }
    fs::write(&path, "  \n").expect("write");
    let repo = FileCredentialRepository::new(&path);
    assert!(repo.load().expect("load").is_none());

    fs::write(&path, "{not json").expect("write");
    let err = repo.load().expect_err("corrupt");
    assert!(matches!(err, RepositoryError::Serialization(_)));

    if let Some(parent) = path.parent() {
        let _ = fs::remove_dir_all(parent);
    }
}

#[test]
fn sqlite_repository_roundtrip() {
    let repo = SqliteCredentialRepository::open(":memory:").expect("repo");
    repo.ensure_schema().expect("schema");
    assert!(repo.load().expect("load").is_none());

    repo.save(&Credentials::with_token("AC1", "one")).expect("save");
    let replacement = Credentials::with_api_key("AC1", "SK1", "two");
    repo.save(&replacement).expect("upsert");
    assert_eq!(repo.load().expect("load"), Some(replacement));

    repo.clear().expect("clear");
    repo.clear().expect("clear twice");
    assert!(repo.load().expect("load").is_none());
}

#[test]
fn sqlite_repository_persists_across_connections() {
    let path = temp_path("credentials.sqlite");
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("dir");
    }
    let path_str = path.to_string_lossy().to_string();
    {
        let repo = SqliteCredentialRepository::open(&path_str).expect("repo");
        repo.ensure_schema().expect("schema");
        repo.save(&Credentials::with_token("AC9", "secret")).expect("save");
    }
    let repo = SqliteCredentialRepository::open(&path_str).expect("reopen");
    repo.ensure_schema().expect("schema");
    let loaded = repo.load().expect("load").expect("record");
    assert_eq!(loaded.account_identifier, "AC9");

    if let Some(parent) = path.parent() {
        let _ = fs::remove_dir_all(parent);
    }
}
