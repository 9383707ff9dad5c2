use arcs_core::errors::{ArcsError, ErrorInfo};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("cohort", "7A")
        .with_context("reason", "example")
}

#[test]
fn coverage_error_surface() {
    let err = ArcsError::insufficient_coverage(15, 20, 80);
    assert_eq!(err.info().code, "coverage-below-threshold");
    assert_eq!(err.info().context.get("analyzed").map(String::as_str), Some("15"));
    assert!(err.to_string().contains("75.0%"));
}

#[test]
fn stale_data_is_transient() {
    let err = ArcsError::StaleData(sample_info("S001", "concurrent write"));
    assert!(err.is_transient());
    assert!(!ArcsError::StoreUnavailable(sample_info("U001", "offline")).is_transient());
}

#[test]
fn display_includes_context_and_hint() {
    let err = ArcsError::Config(sample_info("C001", "bad rate").with_hint("use 0..1"));
    let rendered = err.to_string();
    assert!(rendered.starts_with("config error: bad rate (code: C001)"));
    assert!(rendered.contains("cohort=7A"));
    assert!(rendered.ends_with("hint: use 0..1"));
}

#[test]
fn errors_serialize_with_family_tag() {
    let err = ArcsError::empty_cohort("no students");
    let json = serde_json::to_value(&err).unwrap();
    assert_eq!(json["family"], "EmptyCohort");
    assert_eq!(json["detail"]["code"], "empty-cohort");
    let back: ArcsError = serde_json::from_value(json).unwrap();
    assert_eq!(back, err);
}

#[test]
fn coverage_gate_accepts_exact_threshold() {
    assert!(ArcsError::ensure_coverage(16, 20, 80).is_ok());
    assert!(ArcsError::ensure_coverage(799, 1000, 80).is_err());
    assert!(ArcsError::ensure_coverage(0, 0, 80).is_err());
}
