use std::io::Write;
use ddc_control::config::{find_config_file, load_configs};
use ddc_control::{match_config, Error};

const CONFIG: &str = r#"[
    {
        "model": "Test Monitor",
        "match": "TEST-123",
        "features": {
            "brightness": { "vcp": "0x10", "values": { "high": "100" } }
        }
    }
]"#;

#[test]
fn load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(CONFIG.as_bytes()).unwrap();

    let configs = load_configs(file.path()).unwrap();
    assert_eq!(configs.len(), 1);
    assert_eq!(configs[0].pattern, "TEST-123");
    assert!(configs[0].presets.is_empty());
    assert_eq!(configs[0].resolve("brightness", "HIGH").unwrap(), (0x10, 0x100));

    let matched = match_config("Vendor test-123 rev2", &configs).unwrap();
    assert_eq!(matched.model, "Test Monitor");
}

#[test]
fn malformed_file_is_config_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"[{\"model\": ").unwrap();

    match load_configs(file.path()) {
        Err(Error::Config { path, .. }) => assert_eq!(path, file.path()),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn missing_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_configs(dir.path().join("monitors.json")).is_err());
}

#[test]
fn explicit_config_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(CONFIG.as_bytes()).unwrap();

    assert_eq!(find_config_file(Some(file.path())).unwrap(), file.path());
}
