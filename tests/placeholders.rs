//! Placeholder policy integration tests.
//!
//! Runs the built-in rule tables (and directory overrides) over realistic
//! templates.

use lureforge::core::placeholders::{find_placeholders, process};
use lureforge::core::{PlaceholderContext, PolicySet, RuleCategory};
use tempfile::TempDir;

const EMAIL_TEMPLATE: &str = r##"<html><head><title>Password expiry</title></head><body>
<table>
  <tr><td><img src="/images/logo.png"><span class="placeholder" data-basename="COMPANY_LOGO">[Logo]</span></td></tr>
  <tr><td>From: <span class="placeholder" data-basename="from_friendly_name">[Sender]</span></td></tr>
  <tr><td>Your password expires today. <a href="#"><span class="placeholder" data-basename="PHISHING_URL">Keep it</span></a></td></tr>
</table>
</body></html>"##;

#[test]
fn test_email_template_is_processed() {
    let policies = PolicySet::builtin().unwrap();
    let ctx = PlaceholderContext::new().with_from_name("IT Service Desk");

    let outcome = process(EMAIL_TEMPLATE, policies.get("email").unwrap(), &ctx);

    assert!(outcome.success);
    assert!(!outcome.html.contains("COMPANY_LOGO"));
    assert!(!outcome.html.contains("/images/logo.png"));
    assert!(outcome.html.contains("From: IT Service Desk"));
    assert!(outcome.html.contains(r#"data-basename="PHISHING_URL""#));
    assert_eq!(outcome.processed.stripped, vec!["COMPANY_LOGO"]);
    assert_eq!(outcome.processed.replaced, vec!["from_friendly_name"]);
    assert_eq!(outcome.processed.ignored, vec!["PHISHING_URL"]);
}

#[test]
fn test_unknown_basename_is_rejected() {
    let policies = PolicySet::builtin().unwrap();
    let html = r#"<p><span class="placeholder" data-basename="BADGE_NUMBER">0000</span></p>"#;

    for name in ["email", "education", "landing"] {
        let outcome = process(html, policies.get(name).unwrap(), &PlaceholderContext::new());
        assert!(!outcome.success, "{} should reject unknown basenames", name);
        assert_eq!(outcome.rejected, vec!["BADGE_NUMBER"]);
        assert_eq!(outcome.html, html);
    }
}

#[test]
fn test_every_rejection_is_reported() {
    let policies = PolicySet::builtin().unwrap();
    let html = r#"<p>Dear <span class="placeholder" data-basename="FIRST_NAME">x</span> <span class="placeholder" data-basename="LAST_NAME">y</span>, <span class="placeholder" data-basename="FIRST_NAME">x</span></p>"#;

    let outcome = process(html, policies.get("education").unwrap(), &PlaceholderContext::new());

    assert!(!outcome.success);
    assert_eq!(outcome.rejected, vec!["FIRST_NAME", "LAST_NAME"]);

    let err = outcome.into_result().unwrap_err();
    assert!(err.to_string().contains("FIRST_NAME, LAST_NAME"));
}

#[test]
fn test_landing_policy_compares_exactly() {
    let policies = PolicySet::builtin().unwrap();
    let landing = policies.get("landing").unwrap();

    assert_eq!(landing.classify("TRAINING_URL"), RuleCategory::Ignore);
    assert_eq!(landing.classify("training_url"), RuleCategory::Reject);

    let html = r#"<div><span class="placeholder" data-basename="Company_Name">Acme</span></div>"#;
    let outcome = process(html, landing, &PlaceholderContext::new());
    assert!(!outcome.success);
}

#[test]
fn test_education_policy_folds_case() {
    let policies = PolicySet::builtin().unwrap();
    let html = r#"<h1><span class="placeholder" data-basename="course_title">Phishing 101</span></h1><footer><span class="placeholder" data-basename="company_name">Acme</span></footer>"#;

    let outcome = process(html, policies.get("education").unwrap(), &PlaceholderContext::new());

    assert!(outcome.success);
    assert_eq!(
        outcome.html,
        r#"<h1><span class="placeholder" data-basename="course_title">Phishing 101</span></h1>"#
    );
}

#[test]
fn test_override_directory_replaces_builtin_table() {
    let temp = TempDir::new().unwrap();
    std::fs::write(
        temp.path().join("landing.yaml"),
        "name: landing\ncase: upper\nignore: [BADGE_NUMBER]\n",
    )
    .unwrap();

    let policies = PolicySet::load(Some(temp.path())).unwrap();
    let landing = policies.get("landing").unwrap();

    assert_eq!(landing.classify("badge_number"), RuleCategory::Ignore);
    assert_eq!(landing.classify("COMPANY_NAME"), RuleCategory::Reject);
    assert_eq!(policies.get("email").unwrap().classify("COMPANY_NAME"), RuleCategory::Strip);
}

#[test]
fn test_spans_found_with_single_quotes_and_extra_classes() {
    let html = "<span data-basename='CURRENT_YEAR' class='tpl placeholder bold'>2024</span>";
    let spans = find_placeholders(html);

    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].basename, "CURRENT_YEAR");
    assert_eq!(spans[0].end, html.len());
}
