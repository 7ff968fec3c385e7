use pkgsteps::predicate::{evaluate, parse, Predicate};
use serde_json::json;

fn holds(source: &str, facts: &serde_json::Value) -> bool {
    evaluate(source, facts).unwrap_or_else(|e| panic!("{}: {}", source, e))
}

#[test]
fn typical_recipe_gates() {
    let facts = json!({
        "version": "121.0",
        "latest_patch_version": "120.0",
        "download_changed": true,
        "NAME": "Firefox",
        "sleep_time": 5
    });

    assert!(holds("version != latest_patch_version", &facts));
    assert!(holds("download_changed == YES AND NAME BEGINSWITH 'Fire'", &facts));
    assert!(holds("NOT (NAME ==[c] 'chrome')", &facts));
    assert!(holds("sleep_time BETWEEN {1, 10}", &facts));
    assert!(holds("NAME IN {'Firefox', 'Firefox ESR'}", &facts));
    assert!(!holds("missing_key != nil", &facts));
}

#[test]
fn parse_exposes_the_tree() {
    let parsed = parse("TRUEPREDICATE OR version == '1'").unwrap_or_else(|e| panic!("{}", e));
    assert!(matches!(parsed, Predicate::Or(_, _)));
}

#[test]
fn syntax_errors_carry_position() {
    let err = evaluate("version == ", &json!({})).err();
    let err = err.unwrap_or_else(|| panic!("expected a syntax error"));
    assert_eq!(err.code.as_str(), "predicate.invalid");
    assert!(err.details.get("position").is_some());
}
