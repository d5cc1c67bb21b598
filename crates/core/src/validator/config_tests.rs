// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn default_is_disabled() {
    let config = ValidatorConfig::default();
    assert!(!config.enabled);
    assert!(config.fail_fast);
    assert!(config.log_violations);
    assert_eq!(config.max_reports, 256);
}

#[test]
fn diagnostic_enables() {
    assert!(ValidatorConfig::diagnostic().enabled);
}

#[test]
fn toml_fills_missing_fields_with_defaults() {
    let config = ValidatorConfig::from_toml_str("enabled = true\nmax_reports = 8\n").unwrap();
    assert!(config.enabled);
    assert_eq!(config.max_reports, 8);
    assert!(config.fail_fast);
    assert_eq!(config.timeline_capacity, 64);
}

#[test]
fn toml_rejects_unknown_types() {
    let err = ValidatorConfig::from_toml_str("enabled = \"maybe\"").unwrap_err();
    assert!(matches!(err, CoordinationError::Config(_)));
}

#[test]
fn toml_rejects_zero_report_limit() {
    let err = ValidatorConfig::from_toml_str("max_reports = 0").unwrap_err();
    assert!(err.to_string().contains("max_reports"));
}

#[test]
fn load_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lockstep.toml");
    std::fs::write(&path, "enabled = true\nfail_fast = false\n").unwrap();

    let config = ValidatorConfig::load(&path).unwrap();
    assert!(config.enabled);
    assert!(!config.fail_fast);
}

#[test]
fn load_missing_file_names_path() {
    let err = ValidatorConfig::load(Path::new("/nonexistent/lockstep.toml")).unwrap_err();
    assert!(err.to_string().contains("/nonexistent/lockstep.toml"));
}

#[parameterized(
    one = { "1", true },
    true_upper = { "TRUE", true },
    on = { "on", true },
    yes_padded = { " yes ", true },
    zero = { "0", false },
    off = { "off", false },
    empty = { "", false },
)]
fn flag_values(value: &str, expected: bool) {
    assert_eq!(parse_flag(value), expected);
}
