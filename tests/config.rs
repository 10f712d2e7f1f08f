use editqueue::config::{ConfigError, EngineConfig, TransportConfig};

#[test]
fn engine_config_defaults_fill_missing_fields() {
    let config = EngineConfig::from_json_str(r#"{ "user_id": "u1", "retention_days": 7 }"#)
        .expect("parse");
    assert_eq!(config.user_id, "u1");
    assert_eq!(config.retention_days, 7);
    assert_eq!(config.settle_delay_ms, 3000);
    assert_eq!(config.language, "lv");
    assert_eq!(config, EngineConfig {
        retention_days: 7,
        ..EngineConfig::for_user("u1")
    });
}

#[test]
fn engine_config_rejects_zero_bounds() {
    let err = EngineConfig::from_json_str(r#"{ "event_capacity": 0 }"#).expect_err("invalid");
    assert!(matches!(err, ConfigError::Invalid(_)));
    assert!(matches!(
        EngineConfig::from_json_str("{ nope"),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn engine_config_loads_from_file() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let path = dir.path().join("engine.json");
    std::fs::write(&path, r#"{ "user_id": "u9", "language": "en" }"#).expect("write");

    let config = EngineConfig::from_file(&path).expect("load");
    assert_eq!(config.user_id, "u9");
    assert_eq!(config.language, "en");
    assert!(matches!(
        EngineConfig::from_file(dir.path().join("missing.json")),
        Err(ConfigError::Io(_))
    ));
}

#[test]
fn transport_config_builds_apply_edits_url() {
    let config = TransportConfig::from_json_str(
        r#"{ "base_url": "https://gis.example.lv/api/", "bearer_token": "t" }"#,
    )
    .expect("parse");
    assert_eq!(config.timeout_ms, 30_000);
    assert_eq!(config.apply_edits_url(), "https://gis.example.lv/api/applyEdits");

    let err = TransportConfig::from_json_str(r#"{ "base_url": "ftp://x" }"#).expect_err("scheme");
    assert!(matches!(err, ConfigError::Invalid(_)));
    assert!(TransportConfig::default().validate().is_err());
}
