//! Configuration loading from disk

use changegate_core::config::{ConfigError, EngineConfig};
use changegate_core::errors::{ExError, ExErrorKind};
use std::io::Write;
use tempfile::TempDir;

#[test]
fn test_load_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("changegate.yaml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        "targets:\n  - id: t1\n    root: {}\n    author: \"Ops <ops@example.com>\"\ndatabases:\n  - target_id: t1\n    name: inventory",
        dir.path().display()
    )
    .unwrap();

    let cfg = EngineConfig::load(&path).unwrap();
    let target = cfg.find_target("t1").unwrap();
    assert_eq!(target.author(), "Ops <ops@example.com>");
    assert_eq!(target.root, dir.path());
    assert!(cfg.find_target("t2").is_none());
}

#[test]
fn test_missing_file_is_read_error() {
    let dir = TempDir::new().unwrap();
    let err = EngineConfig::load(dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));

    let ex: ExError = err.into();
    assert_eq!(ex.kind(), ExErrorKind::Internal);
}

#[test]
fn test_invalid_database_name_rejected() {
    let text = "targets:\n  - id: t\n    root: .\ndatabases:\n  - target_id: t\n    name: \"bad-name\"\n";
    assert!(matches!(
        EngineConfig::from_yaml(text),
        Err(ConfigError::Invalid(_))
    ));
}
