//! Aggregation property tests: outcome rules, override downgrade, merge
//! idempotence and dedup behaviour across varied verdict sets.

use council::aggregator::{aggregate, aggregate_set, merge_findings};
use council::override_auth::{
    select_override, ActorPermissions, OverrideComment, OverridePolicy, RepoPermission,
};
use council::verdict::{load_verdict_dir, Finding, Outcome, Severity, Verdict};

const HEAD: &str = "abc1234def567890";

/// Every combination of outcomes over three reviewers.
fn outcome_sets() -> Vec<Vec<Verdict>> {
    let outcomes = [Outcome::Pass, Outcome::Warn, Outcome::Fail, Outcome::Skip];
    let mut sets = Vec::new();
    for a in outcomes {
        for b in outcomes {
            for c in outcomes {
                sets.push(vec![
                    Verdict::new("style", a),
                    Verdict::new("security", b),
                    Verdict::new("perf", c),
                ]);
            }
        }
    }
    sets
}

/// Test: any FAIL without an override yields FAIL
#[test]
fn test_any_fail_without_override_fails() {
    for verdicts in outcome_sets() {
        let has_fail = verdicts.iter().any(|v| v.outcome == Outcome::Fail);
        let council = aggregate(&verdicts, HEAD, None);
        assert_eq!(council.outcome == Outcome::Fail, has_fail);
        assert!(council.applied_override.is_none());
    }
}

/// Test: an authorized override on the head commit downgrades every FAIL to WARN
#[test]
fn test_authorized_override_downgrades_to_warn() {
    let comments = vec![OverrideComment::from_body(
        "lead",
        "/council override sha=abc1234 reason: reviewed manually",
    )];
    let perms = ActorPermissions::new().with("lead", RepoPermission::Maintain);
    let selected = select_override(&comments, HEAD, OverridePolicy::WriteAccess, "dev", &perms)
        .expect("maintainer override should be selected");

    for verdicts in outcome_sets() {
        if !verdicts.iter().any(|v| v.outcome == Outcome::Fail) {
            continue;
        }
        let council = aggregate(&verdicts, HEAD, Some(&selected));
        assert_eq!(council.outcome, Outcome::Warn);
        assert_eq!(council.applied_override.as_ref(), Some(&selected));
    }
}

/// Test: skip counts are kept separately and never fail the council
#[test]
fn test_skips_counted_not_failing() {
    let verdicts = vec![
        Verdict::new("a", Outcome::Skip),
        Verdict::new("b", Outcome::Skip),
        Verdict::new("c", Outcome::Pass),
    ];
    let council = aggregate(&verdicts, HEAD, None);
    assert_eq!(council.outcome, Outcome::Pass);
    assert_eq!(council.stats.skip_count, 2);
    assert_eq!(council.stats.fail_count, 0);
}

/// Test: merging a verdict with itself gives the same result as merging it once
#[test]
fn test_merge_idempotent() {
    let verdict = Verdict::new("security", Outcome::Fail).with_findings(vec![
        Finding::new(Severity::Critical, "app.py", Some(12))
            .with_title("SQLi")
            .with_description("user input reaches query"),
        Finding::new(Severity::Minor, "app.py", Some(30)).with_title("naming"),
        Finding::new(Severity::Info, "README.md", None),
    ]);

    let once = merge_findings(std::slice::from_ref(&verdict));
    let twice = merge_findings(&[verdict.clone(), verdict]);
    assert_eq!(once.findings, twice.findings);
}

/// Test: x.py:10 major + critical merge into one critical with both reviewers
#[test]
fn test_dedup_same_location() {
    let verdicts = vec![
        Verdict::new("style", Outcome::Warn)
            .with_findings(vec![Finding::new(Severity::Major, "x.py", Some(10))]),
        Verdict::new("security", Outcome::Fail)
            .with_findings(vec![Finding::new(Severity::Critical, "x.py", Some(10))]),
    ];
    let council = aggregate(&verdicts, HEAD, None);
    assert_eq!(council.findings.len(), 1);
    assert_eq!(council.findings[0].severity, Severity::Critical);
    assert_eq!(council.findings[0].reviewers, vec!["style", "security"]);
}

/// Test: a finding with an empty file never appears in merged output
#[test]
fn test_empty_file_excluded() {
    let verdicts = vec![Verdict::new("arch", Outcome::Warn).with_findings(vec![
        Finding::new(Severity::Critical, "", Some(1)).with_title("global design"),
        Finding::new(Severity::Minor, "lib.rs", Some(2)),
    ])];
    let council = aggregate(&verdicts, HEAD, None);
    assert!(council.findings.iter().all(|f| !f.file.is_empty()));
    assert_eq!(council.stats.dropped_unanchored, 1);
    // the unanchored finding still counts toward severity stats
    assert_eq!(council.stats.critical, 1);
}

/// Documented choice: grouping is strictly by (file, line), so two distinct
/// issues reported on the same line collapse into one merged finding. The
/// higher-severity title wins and the other title is lost.
#[test]
fn test_dedup_by_location_conflates_distinct_issues_on_same_line() {
    let verdicts = vec![
        Verdict::new("perf", Outcome::Warn).with_findings(vec![Finding::new(
            Severity::Minor,
            "db.rs",
            Some(88),
        )
        .with_title("N+1 query in loop")]),
        Verdict::new("security", Outcome::Fail).with_findings(vec![Finding::new(
            Severity::Major,
            "db.rs",
            Some(88),
        )
        .with_title("query built with format!")]),
    ];

    let council = aggregate(&verdicts, HEAD, None);
    assert_eq!(council.findings.len(), 1);
    assert_eq!(council.findings[0].title, "query built with format!");
    assert_eq!(council.findings[0].reviewers, vec!["perf", "security"]);
}

/// Test: aggregate over a real verdict directory carries malformed counts
#[test]
fn test_aggregate_from_directory() {
    let temp = tempfile::TempDir::new().unwrap();
    std::fs::write(
        temp.path().join("security.json"),
        r#"{"verdict": "fail", "findings": [
            {"severity": "Major", "file": "x.py", "line": 10, "title": "t"}
        ], "stats": {"files_reviewed": 2, "major": 1}}"#,
    )
    .unwrap();
    std::fs::write(temp.path().join("broken.json"), "{").unwrap();

    let set = load_verdict_dir(temp.path()).unwrap();
    let council = aggregate_set(&set, HEAD, None);

    assert_eq!(council.outcome, Outcome::Fail);
    assert_eq!(council.stats.malformed_count, 1);
    assert_eq!(council.stats.files_reviewed, 2);
    assert_eq!(council.stats.major, 1);
    // reviewer label falls back to the file stem
    assert_eq!(council.findings[0].reviewers, vec!["security"]);
}
