//! Verdict Aggregator: N reviewer verdicts into one council verdict
//!
//! # Outcome rule
//!
//! ```text
//! any FAIL ──┬─ override covers head ─→ WARN (override attached)
//!            └─ otherwise ────────────→ FAIL
//! any WARN ──────────────────────────→ WARN
//! PASS / SKIP only (or empty) ───────→ PASS
//! ```
//!
//! SKIP reviewers never count as failing; they only show up in the stats.
//! Aggregation is a pure function; publishing is the caller's job.

pub mod merge;

pub use merge::{merge_findings, MergeResult, MergedFinding};

use crate::override_auth::Override;
use crate::verdict::{Outcome, SeverityCounts, Verdict, VerdictSet};
use schemars::JsonSchema;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Summary statistics across the whole council.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, JsonSchema)]
pub struct CouncilStats {
    pub files_reviewed: u32,
    pub files_with_issues: u32,
    pub critical: u32,
    pub major: u32,
    pub minor: u32,
    pub info: u32,
    pub pass_count: u32,
    pub warn_count: u32,
    pub fail_count: u32,
    pub skip_count: u32,
    pub reviewer_count: u32,
    /// Verdict documents that could not be read.
    pub malformed_count: u32,
    pub merged_findings: u32,
    pub dropped_unanchored: u32,
}

impl CouncilStats {
    pub fn severity_counts(&self) -> SeverityCounts {
        SeverityCounts {
            critical: self.critical,
            major: self.major,
            minor: self.minor,
            info: self.info,
        }
    }

    fn record_outcome(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Pass => self.pass_count += 1,
            Outcome::Warn => self.warn_count += 1,
            Outcome::Fail => self.fail_count += 1,
            Outcome::Skip => self.skip_count += 1,
        }
    }
}

/// The single aggregated decision for a change set.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct CouncilVerdict {
    pub outcome: Outcome,
    pub stats: CouncilStats,
    pub findings: Vec<MergedFinding>,
    /// Present only when an override downgraded a FAIL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_override: Option<Override>,
}

impl CouncilVerdict {
    /// Whether the council blocks the change.
    pub fn is_blocking(&self) -> bool {
        self.outcome == Outcome::Fail
    }
}

/// Council outcome before any override is considered.
pub fn council_outcome(verdicts: &[Verdict]) -> Outcome {
    if verdicts.iter().any(|v| v.outcome == Outcome::Fail) {
        Outcome::Fail
    } else if verdicts.iter().any(|v| v.outcome == Outcome::Warn) {
        Outcome::Warn
    } else {
        Outcome::Pass
    }
}

/// Aggregate verdicts, applying `authorized_override` if it covers `head_sha`.
///
/// The override is expected to have been authorized already (see
/// [`crate::override_auth::select_override`]); here it is only checked
/// against the head commit.
pub fn aggregate(
    verdicts: &[Verdict],
    head_sha: &str,
    authorized_override: Option<&Override>,
) -> CouncilVerdict {
    let mut stats = CouncilStats::default();
    let mut severities = SeverityCounts::default();

    for verdict in verdicts {
        stats.record_outcome(verdict.outcome);
        if let Some(reported) = verdict.stats {
            stats.files_reviewed = stats.files_reviewed.saturating_add(reported.files_reviewed);
            stats.files_with_issues = stats
                .files_with_issues
                .saturating_add(reported.files_with_issues);
        }
        if let Some((reported, counted)) = SeverityCounts::discrepancy(verdict) {
            warn!(
                reviewer = %verdict.label(),
                reported = %reported,
                counted = %counted,
                "Verdict stats disagree with its findings"
            );
        }
        severities.add(&SeverityCounts::extract(verdict));
    }

    stats.critical = severities.critical;
    stats.major = severities.major;
    stats.minor = severities.minor;
    stats.info = severities.info;
    stats.reviewer_count = verdicts.len() as u32;

    let merged = merge_findings(verdicts);
    stats.merged_findings = merged.findings.len() as u32;
    stats.dropped_unanchored = merged.dropped_unanchored;

    let mut outcome = council_outcome(verdicts);
    let mut applied_override = None;

    if outcome == Outcome::Fail {
        match authorized_override {
            Some(o) if o.covers(head_sha) => {
                info!(
                    actor = %o.actor,
                    sha = %o.sha,
                    reason = %o.reason,
                    "Override downgraded FAIL to WARN"
                );
                outcome = Outcome::Warn;
                applied_override = Some(o.clone());
            }
            Some(o) => {
                warn!(
                    actor = %o.actor,
                    sha = %o.sha,
                    head_sha = %head_sha,
                    "Override does not cover head commit, ignoring"
                );
            }
            None => {}
        }
    } else if let Some(o) = authorized_override {
        debug!(actor = %o.actor, %outcome, "Override present but nothing to downgrade");
    }

    info!(
        %outcome,
        reviewers = stats.reviewer_count,
        fail = stats.fail_count,
        warn = stats.warn_count,
        skip = stats.skip_count,
        findings = stats.merged_findings,
        "Council verdict aggregated"
    );

    CouncilVerdict {
        outcome,
        stats,
        findings: merged.findings,
        applied_override,
    }
}

/// [`aggregate`] over a loaded directory, carrying its malformed count.
pub fn aggregate_set(
    set: &VerdictSet,
    head_sha: &str,
    authorized_override: Option<&Override>,
) -> CouncilVerdict {
    let mut verdict = aggregate(&set.verdicts, head_sha, authorized_override);
    verdict.stats.malformed_count = set.malformed_count() as u32;
    verdict
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::{Finding, Severity, Stats};

    const HEAD: &str = "abc1234def";

    #[test]
    fn test_outcome_rule() {
        let pass = Verdict::new("a", Outcome::Pass);
        let warn = Verdict::new("b", Outcome::Warn);
        let fail = Verdict::new("c", Outcome::Fail);
        let skip = Verdict::new("d", Outcome::Skip);

        assert_eq!(council_outcome(&[]), Outcome::Pass);
        assert_eq!(council_outcome(&[pass.clone(), skip.clone()]), Outcome::Pass);
        assert_eq!(council_outcome(&[pass.clone(), warn.clone()]), Outcome::Warn);
        assert_eq!(council_outcome(&[warn, fail, skip]), Outcome::Fail);
    }

    #[test]
    fn test_override_downgrades_fail() {
        let verdicts = vec![Verdict::new("sec", Outcome::Fail)];
        let o = Override::new("alice", "abc1234", "accepted risk");
        let council = aggregate(&verdicts, HEAD, Some(&o));
        assert_eq!(council.outcome, Outcome::Warn);
        assert_eq!(council.applied_override, Some(o));
        assert!(!council.is_blocking());
    }

    #[test]
    fn test_override_for_other_commit_ignored() {
        let verdicts = vec![Verdict::new("sec", Outcome::Fail)];
        let o = Override::new("alice", "fff1234", "old");
        let council = aggregate(&verdicts, HEAD, Some(&o));
        assert_eq!(council.outcome, Outcome::Fail);
        assert!(council.applied_override.is_none());
    }

    #[test]
    fn test_override_not_attached_without_fail() {
        let verdicts = vec![Verdict::new("style", Outcome::Warn)];
        let o = Override::new("alice", "abc1234", "x");
        let council = aggregate(&verdicts, HEAD, Some(&o));
        assert_eq!(council.outcome, Outcome::Warn);
        assert!(council.applied_override.is_none());
    }

    #[test]
    fn test_stats_sum_and_outcome_counts() {
        let verdicts = vec![
            Verdict::new("a", Outcome::Fail)
                .with_findings(vec![Finding::new(Severity::Critical, "a.rs", Some(1))])
                .with_stats(Stats {
                    files_reviewed: 4,
                    files_with_issues: 1,
                    critical: 1,
                    ..Default::default()
                }),
            Verdict::new("b", Outcome::Skip).with_stats(Stats {
                files_reviewed: 2,
                minor: 3,
                ..Default::default()
            }),
            Verdict::new("c", Outcome::Pass),
        ];

        let stats = aggregate(&verdicts, HEAD, None).stats;
        assert_eq!(stats.files_reviewed, 6);
        assert_eq!(stats.files_with_issues, 1);
        assert_eq!(stats.critical, 1);
        assert_eq!(stats.minor, 3);
        assert_eq!(stats.fail_count, 1);
        assert_eq!(stats.skip_count, 1);
        assert_eq!(stats.pass_count, 1);
        assert_eq!(stats.reviewer_count, 3);
        assert_eq!(stats.merged_findings, 1);
    }

    #[test]
    fn test_aggregate_set_carries_malformed() {
        let mut set = VerdictSet::from_verdicts(vec![Verdict::new("a", Outcome::Pass)]);
        set.malformed.push(crate::verdict::MalformedArtifact {
            path: "broken.json".into(),
            cause: crate::verdict::MalformedCause::NotAnObject,
        });
        let council = aggregate_set(&set, HEAD, None);
        assert_eq!(council.stats.malformed_count, 1);
        assert_eq!(council.outcome, Outcome::Pass);
    }
}
