use pathtrail_core::config::MonitorConfig;
use std::path::PathBuf;

#[test]
fn test_config_validation_flush_interval() {
    let mut config = MonitorConfig {
        roots: vec![PathBuf::from("/srv")],
        ..MonitorConfig::default()
    };

    config.flush_interval_secs = 1;
    assert!(config.validate().is_ok());

    config.flush_interval_secs = 0;
    let result = config.validate();
    assert!(result.is_err());
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("flush_interval_secs"));
}

#[test]
fn test_config_from_toml_keeps_root_order() {
    let config = MonitorConfig::from_toml_str(
        r#"
        roots = ["/z", "/a", "relative/dir"]
        "#,
    )
    .expect("valid TOML");

    assert_eq!(
        config.roots,
        vec![
            PathBuf::from("/z"),
            PathBuf::from("/a"),
            PathBuf::from("relative/dir")
        ]
    );
}

#[test]
fn test_config_from_toml_rejects_bad_types() {
    let result = MonitorConfig::from_toml_str(r#"flush_interval_secs = "soon""#);
    assert!(result.is_err());
}
