use ter_config::{
    load_layered_yaml_from_strings, report_unused_keys, ConfigConsumer, ReaderSettings,
    UnusedKeyPolicy,
};

/// scenario_unused_keys_warn_or_fail
///
/// Validates:
/// 1) Unused keys are reported in WARN mode without error.
/// 2) Unused keys fail in FAIL mode with a deterministic message.
/// 3) Keys read by a consumer are never flagged for it.
/// 4) `index` does not consume reader/output keys.

const FULL_YAML: &str = r#"
reader:
  buffer_capacity: 2
source:
  delimiter: ";"
  trim: false
output:
  pretty: true
"#;

#[test]
fn warn_mode_reports_unused_keys_without_error() {
    let yaml = r#"
reader:
  buffer_capacity: 2
legacy:
  encoding: cp866
  strict: true
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report =
        report_unused_keys(ConfigConsumer::Read, &loaded.config_json, UnusedKeyPolicy::Warn)
            .expect("warn mode must not error");

    assert!(!report.is_clean());
    assert_eq!(
        report.unused_leaf_pointers,
        vec!["/legacy/encoding".to_string(), "/legacy/strict".to_string()]
    );
    assert_eq!(report.consumer, "READ");
}

#[test]
fn fail_mode_errors_on_unused_keys() {
    let yaml = "reader:\n  buffer_size: 2\n";
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let err = report_unused_keys(ConfigConsumer::Read, &loaded.config_json, UnusedKeyPolicy::Fail)
        .unwrap_err();
    let msg = err.to_string();
    assert!(msg.starts_with("CONFIG_UNUSED_KEYS (consumer=READ): 1 unused"), "{msg}");
    assert!(msg.contains("/reader/buffer_size"));
}

#[test]
fn read_consumes_every_settings_key() {
    let loaded = load_layered_yaml_from_strings(&[FULL_YAML]).unwrap();
    let report =
        report_unused_keys(ConfigConsumer::Read, &loaded.config_json, UnusedKeyPolicy::Fail)
            .unwrap();
    assert!(report.is_clean());

    let s = ReaderSettings::from_config_json(&loaded.config_json).unwrap();
    assert_eq!(s.buffer_capacity, 2);
    assert_eq!(s.delimiter, b';');
    assert!(!s.trim);
    assert!(s.pretty);
}

#[test]
fn index_leaves_reader_and_output_unused() {
    let loaded = load_layered_yaml_from_strings(&[FULL_YAML]).unwrap();
    let report =
        report_unused_keys(ConfigConsumer::Index, &loaded.config_json, UnusedKeyPolicy::Warn)
            .unwrap();
    assert_eq!(
        report.unused_leaf_pointers,
        vec![
            "/output/pretty".to_string(),
            "/reader/buffer_capacity".to_string()
        ]
    );
}

#[test]
fn empty_config_is_clean() {
    let loaded = load_layered_yaml_from_strings(&[]).unwrap();
    for consumer in [ConfigConsumer::Read, ConfigConsumer::Index] {
        let report =
            report_unused_keys(consumer, &loaded.config_json, UnusedKeyPolicy::Fail).unwrap();
        assert!(report.is_clean());
    }
}
