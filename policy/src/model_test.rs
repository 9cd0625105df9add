use super::*;

fn host(raw: &str) -> Hostname {
    Hostname::parse(raw).unwrap()
}

#[test]
fn default_policy_is_globally_enabled_without_overrides() {
    let policy = Policy::default();
    assert!(policy.global);
    assert!(policy.overrides.is_empty());
}

#[test]
fn partial_record_loads_with_defaults() {
    let policy: Policy = serde_json::from_str("{}").unwrap();
    assert_eq!(policy, Policy::default());

    let policy: Policy = serde_json::from_str(r#"{"overrides":{"example.com":false}}"#).unwrap();
    assert!(policy.global);
    assert_eq!(policy.override_for(&host("example.com")), Some(false));
}

#[test]
fn persisted_layout_uses_global_and_overrides_fields() {
    let mut policy = Policy::default();
    policy.set_global(false);
    policy.set_override(&host("example.com"), true);

    let json = serde_json::to_value(&policy).unwrap();
    assert_eq!(json, serde_json::json!({"global": false, "overrides": {"example.com": true}}));
}

#[test]
fn set_and_clear_override() {
    let mut policy = Policy::default();
    let h = host("example.com");

    policy.set_override(&h, true);
    assert_eq!(policy.override_for(&h), Some(true));
    policy.set_override(&h, false);
    assert_eq!(policy.override_for(&h), Some(false));

    assert!(policy.clear_override(&h));
    assert_eq!(policy.override_for(&h), None);
    assert!(!policy.clear_override(&h));
}

#[test]
fn effective_applies_override_then_global_then_heuristic() {
    let mut policy = Policy::default();
    let h = host("example.com");

    assert!(policy.effective(Some(&h), || false));
    assert!(!policy.effective(Some(&h), || true));

    policy.set_global(false);
    assert!(!policy.effective(Some(&h), || false));

    policy.set_override(&h, true);
    assert!(policy.effective(Some(&h), || true));
}

#[test]
fn hostless_page_ignores_overrides() {
    let mut policy = Policy::default();
    policy.set_override(&host("example.com"), false);
    assert!(policy.effective(None, || false));
}
