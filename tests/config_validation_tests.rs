//! Config Validation Tests
//!
//! Exercises typo detection and range validation of `MonitorConfig`
//! independently from the rest of the pipeline.

use vitals_monitor::config::validation::{known_config_keys, suggest_correction, validate_unknown_keys};
use vitals_monitor::config::{ConfigError, MonitorConfig};
use vitals_monitor::pipeline::MonitorSettings;

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn test_typo_in_serial_section_suggests_correction() {
    let warnings = validate_unknown_keys("[serial]\nbaudrate = 9600\n");
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].field, "serial.baudrate");
    assert_eq!(warnings[0].suggestion.as_deref(), Some("serial.baud_rate"));
}

#[test]
fn test_typo_in_persistence_section_suggests_correction() {
    let warnings = validate_unknown_keys("[persistence]\nflush_intreval_secs = 5\n");
    assert_eq!(warnings.len(), 1);
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("persistence.flush_interval_secs")
    );
}

#[test]
fn test_distant_key_gets_no_suggestion() {
    let known = known_config_keys();
    assert_eq!(suggest_correction("completely_unrelated_key", &known), None);
}

#[test]
fn test_typo_still_loads_with_defaults() {
    let config = MonitorConfig::from_toml_str("[alarm]\nthreshhold_bpm = 90\n").expect("loads");
    assert_eq!(config.alarm.threshold_bpm, 120);
}

#[test]
fn test_empty_config_is_all_defaults() {
    let config = MonitorConfig::from_toml_str("").expect("loads");
    assert_eq!(config, MonitorConfig::default());
    assert_eq!(config.serial.baud_rate, 115_200);
    assert_eq!(config.persistence.flush_interval_secs, 10);
    assert!(config.buffer.visible_window < config.buffer.capacity);
}

// ============================================================================
// Range Validation
// ============================================================================

fn validation_errors(toml: &str) -> Vec<String> {
    match MonitorConfig::from_toml_str(toml) {
        Err(ConfigError::Validation(errors)) => errors,
        other => panic!("expected validation failure, got {other:?}"),
    }
}

#[test]
fn test_visible_window_larger_than_capacity_is_rejected() {
    let errors = validation_errors("[buffer]\ncapacity = 50\nvisible_window = 80\n");
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("visible_window"));
}

#[test]
fn test_every_violation_is_reported_at_once() {
    let errors = validation_errors(
        r#"
[alarm]
threshold_bpm = 0

[persistence]
flush_interval_secs = 0

[serial]
read_timeout_ms = 5000
"#,
    );
    assert_eq!(errors.len(), 3, "{errors:?}");
    assert!(errors.iter().any(|e| e.contains("threshold_bpm")));
    assert!(errors.iter().any(|e| e.contains("flush_interval_secs")));
    assert!(errors.iter().any(|e| e.contains("read_timeout_ms")));
}

#[test]
fn test_bad_server_addr_only_matters_when_enabled() {
    let errors = validation_errors("[server]\naddr = \"not-an-addr\"\n");
    assert!(errors[0].contains("server.addr"));

    let config = MonitorConfig::from_toml_str("[server]\nenabled = false\naddr = \"not-an-addr\"\n")
        .expect("disabled server is not checked");
    assert!(!config.server.enabled);
}

#[test]
fn test_wrong_type_is_a_parse_error() {
    let result = MonitorConfig::from_toml_str("[alarm]\nthreshold_bpm = \"high\"\n");
    assert!(matches!(result, Err(ConfigError::Parse(_, _))));
}

#[test]
fn test_effective_config_round_trips_through_toml() {
    let mut config = MonitorConfig::default();
    config.alarm.threshold_bpm = 140;
    config.serial.port = Some("/dev/ttyUSB1".to_string());
    let text = config.to_toml().expect("serialize");
    assert_eq!(MonitorConfig::from_toml_str(&text).expect("reload"), config);
}

#[test]
fn test_load_from_file_reports_path_on_parse_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("monitor_config.toml");
    std::fs::write(&path, "[buffer\ncapacity = 10\n").expect("write");

    let err = MonitorConfig::load_from_file(&path).expect_err("malformed toml");
    assert!(err.to_string().contains("monitor_config.toml"), "{err}");
}

#[test]
fn test_settings_follow_config() {
    let config = MonitorConfig::from_toml_str(
        r#"
[alarm]
threshold_bpm = 135

[buffer]
capacity = 300
visible_window = 60

[persistence]
data_dir = "/tmp/vitals"
flush_interval_secs = 30
"#,
    )
    .expect("valid config");

    let settings = MonitorSettings::from_config(&config);
    assert_eq!(settings.alarm.threshold_bpm, 135);
    assert_eq!(settings.buffer_capacity, 300);
    assert_eq!(settings.visible_window, 60);
    assert_eq!(settings.flush_interval, chrono::Duration::seconds(30));
    assert_eq!(settings.data_dir.as_deref(), Some(std::path::Path::new("/tmp/vitals")));
}
