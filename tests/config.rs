//! Loading configuration files

use nmeamon_core::config::{AppConfig, ConfigError};
use nmeamon_core::core::protocol::{ChecksumPolicy, OverflowPolicy};
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_load_full_file() {
    let file = write_config(
        r#"
[monitor]
capacity = 2048
notify_interval_ms = 50
chunk_size = 128

[ingest]
max_line_length = 82
overflow = "truncate"
drivers = ["nmea"]

[ingest.checksum]
"$GPGGA" = "unchecked"

[session]
auto_reconnect = true
reconnect_delay_secs = 2
max_reconnect_attempts = 3

[logging]
level = "nmeamon_core=trace"
json = true
"#,
    );

    let config = AppConfig::load_from(file.path()).unwrap();
    assert_eq!(config.monitor.capacity, 2048);
    assert_eq!(config.monitor.notify_interval_ms, 50);
    assert_eq!(config.monitor.chunk_size, 128);
    assert_eq!(config.ingest.max_line_length, 82);
    assert_eq!(config.ingest.overflow, OverflowPolicy::Truncate);
    assert_eq!(config.ingest.drivers, vec!["nmea"]);
    assert_eq!(config.ingest.checksum["$GPGGA"], ChecksumPolicy::Unchecked);
    assert!(config.session.auto_reconnect);
    assert_eq!(config.session.max_reconnect_attempts, 3);
    assert_eq!(config.logging.level, "nmeamon_core=trace");
    assert!(config.logging.json);

    let chain = config.ingest.build_chain().unwrap();
    assert_eq!(chain.dispatchers().len(), 1);
    assert_eq!(
        chain.dispatchers()[0].policy_for("$GPGGA"),
        Some(ChecksumPolicy::Unchecked)
    );
}

#[test]
fn test_empty_file_gives_defaults() {
    let file = write_config("");
    let config = AppConfig::load_from(file.path()).unwrap();
    assert_eq!(config, AppConfig::default());
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    match AppConfig::load_from(&path) {
        Err(ConfigError::Read { path: reported, source }) => {
            assert_eq!(reported, path);
            assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
        }
        other => panic!("expected read error, got {other:?}"),
    }
}

#[test]
fn test_malformed_toml() {
    let file = write_config("[monitor\ncapacity = 1");
    assert!(matches!(
        AppConfig::load_from(file.path()),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn test_unknown_driver_rejected() {
    let file = write_config("[ingest]\ndrivers = [\"nmea\", \"flarm\"]\n");
    let err = AppConfig::load_from(file.path()).unwrap_err();
    assert!(err.to_string().contains("flarm"));
}
