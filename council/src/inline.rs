//! Inline review comments from merged findings.
//!
//! Each finding whose line appears in its file's patch becomes a
//! position-addressed comment. The rest are collected as unanchored and
//! rendered into the review summary so nothing is lost.

use crate::aggregator::{CouncilVerdict, MergedFinding};
use crate::diff_position::{map_positions, PositionMap};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;

/// One comment attached to a diff position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineComment {
    pub path: String,
    pub position: u32,
    /// New-file line the position was derived from.
    pub line: u32,
    pub body: String,
}

/// Comments ready to post plus everything that could not be placed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewDraft {
    pub comments: Vec<InlineComment>,
    pub unanchored: Vec<MergedFinding>,
}

/// Place findings on the diff. `file_patches` maps path to that file's patch.
pub fn build_review_comments(
    findings: &[MergedFinding],
    file_patches: &BTreeMap<String, String>,
) -> ReviewDraft {
    let mut maps: HashMap<&str, PositionMap> = HashMap::new();
    let mut draft = ReviewDraft::default();

    for finding in findings {
        let placed = match (finding.line, file_patches.get(&finding.file)) {
            (Some(line), Some(patch)) => maps
                .entry(finding.file.as_str())
                .or_insert_with(|| map_positions(patch))
                .get(&line)
                .map(|&position| (line, position)),
            _ => None,
        };

        match placed {
            Some((line, position)) => draft.comments.push(InlineComment {
                path: finding.file.clone(),
                position,
                line,
                body: render_finding(finding),
            }),
            None => draft.unanchored.push(finding.clone()),
        }
    }

    tracing::debug!(
        inline = draft.comments.len(),
        unanchored = draft.unanchored.len(),
        "Built review draft"
    );
    draft
}

/// Markdown body for one finding.
pub fn render_finding(finding: &MergedFinding) -> String {
    let mut out = String::new();
    let badge = finding.severity.as_str().to_ascii_uppercase();
    let title = if finding.title.trim().is_empty() {
        "(untitled)"
    } else {
        finding.title.trim()
    };
    let _ = write!(out, "**[{}] {}**", badge, title);
    if !finding.category.trim().is_empty() {
        let _ = write!(out, " `{}`", finding.category.trim());
    }
    out.push('\n');

    if !finding.description.trim().is_empty() {
        let _ = write!(out, "\n{}\n", finding.description.trim());
    }
    if !finding.suggestion.trim().is_empty() {
        let _ = write!(out, "\n**Suggestion:** {}\n", finding.suggestion.trim());
        if let Some(reason) = &finding.unverified {
            let _ = write!(out, "\n_Unverified: {}_\n", reason);
        }
    }
    if let Some(evidence) = &finding.evidence {
        let _ = write!(out, "\n```\n{}\n```\n", evidence.trim_end());
    }
    let _ = write!(out, "\n_Reviewers: {}_", finding.reviewers.join(", "));
    out
}

/// Markdown review body: outcome, counts, override audit, unplaced findings.
pub fn render_summary(verdict: &CouncilVerdict, unanchored: &[MergedFinding]) -> String {
    let stats = &verdict.stats;
    let mut out = String::new();

    let _ = writeln!(out, "## Council verdict: {}", verdict.outcome);
    out.push('\n');
    let _ = writeln!(
        out,
        "{} reviewers: {} pass, {} warn, {} fail, {} skip",
        stats.reviewer_count, stats.pass_count, stats.warn_count, stats.fail_count, stats.skip_count
    );
    if stats.malformed_count > 0 {
        let _ = writeln!(
            out,
            "\n**{} verdict artifact(s) were unreadable.**",
            stats.malformed_count
        );
    }

    out.push_str("\n| Severity | Count |\n|---|---|\n");
    let _ = writeln!(out, "| critical | {} |", stats.critical);
    let _ = writeln!(out, "| major | {} |", stats.major);
    let _ = writeln!(out, "| minor | {} |", stats.minor);
    let _ = writeln!(out, "| info | {} |", stats.info);

    if let Some(o) = &verdict.applied_override {
        let _ = writeln!(
            out,
            "\nOverride by @{} for `{}`: {}",
            o.actor, o.sha, o.reason
        );
    }

    if !unanchored.is_empty() {
        out.push_str("\n### Findings outside the diff\n\n");
        for finding in unanchored {
            let _ = writeln!(
                out,
                "- **[{}]** `{}` {} ({})",
                finding.severity.as_str().to_ascii_uppercase(),
                finding.location(),
                finding.title.trim(),
                finding.reviewers.join(", ")
            );
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::aggregate;
    use crate::override_auth::Override;
    use crate::verdict::{Finding, Outcome, Severity, Verdict};

    const PATCH: &str = "@@ -1,3 +1,4 @@\n line1\n-line2\n+line2b\n line3\n+line4";

    fn merged(verdicts: &[Verdict]) -> Vec<MergedFinding> {
        aggregate(verdicts, "abc1234", None).findings
    }

    #[test]
    fn test_placed_and_unanchored() {
        let findings = merged(&[Verdict::new("sec", Outcome::Fail).with_findings(vec![
            Finding::new(Severity::Critical, "app.py", Some(2)).with_title("in diff"),
            Finding::new(Severity::Major, "app.py", Some(40)).with_title("outside hunk"),
            Finding::new(Severity::Minor, "other.py", Some(1)).with_title("file not in diff"),
            Finding::new(Severity::Info, "app.py", None).with_title("no line"),
        ])]);
        let mut patches = BTreeMap::new();
        patches.insert("app.py".to_string(), PATCH.to_string());

        let draft = build_review_comments(&findings, &patches);
        assert_eq!(draft.comments.len(), 1);
        assert_eq!(draft.comments[0].path, "app.py");
        assert_eq!(draft.comments[0].position, 4);
        assert_eq!(draft.comments[0].line, 2);
        assert!(draft.comments[0].body.contains("[CRITICAL] in diff"));
        assert_eq!(draft.unanchored.len(), 3);
    }

    #[test]
    fn test_render_finding_sections() {
        let mut finding = Finding::new(Severity::Major, "a.rs", Some(1))
            .with_title("Unchecked index")
            .with_description("May panic.")
            .with_suggestion("Use get().")
            .with_evidence("v[i]");
        finding.category = "correctness".to_string();
        finding.unverified = Some("not compiled".to_string());
        let findings = merged(&[Verdict::new("rust", Outcome::Warn).with_findings(vec![finding])]);

        let body = render_finding(&findings[0]);
        assert!(body.starts_with("**[MAJOR] Unchecked index** `correctness`"));
        assert!(body.contains("May panic."));
        assert!(body.contains("**Suggestion:** Use get()."));
        assert!(body.contains("_Unverified: not compiled_"));
        assert!(body.contains("```\nv[i]\n```"));
        assert!(body.ends_with("_Reviewers: rust_"));
    }

    #[test]
    fn test_summary_mentions_override_and_unanchored() {
        let verdicts = vec![Verdict::new("sec", Outcome::Fail).with_findings(vec![
            Finding::new(Severity::Major, "z.rs", None).with_title("global issue"),
        ])];
        let o = Override::new("alice", "abc1234", "accepted");
        let council = aggregate(&verdicts, "abc1234ff", Some(&o));
        let summary = render_summary(&council, &council.findings);

        assert!(summary.starts_with("## Council verdict: WARN"));
        assert!(summary.contains("1 reviewers: 0 pass, 0 warn, 1 fail, 0 skip"));
        assert!(summary.contains("| major | 1 |"));
        assert!(summary.contains("Override by @alice for `abc1234`: accepted"));
        assert!(summary.contains("`z.rs` global issue (sec)"));
    }
}
