//! Finding deduplication across reviewers.
//!
//! Findings are grouped strictly by `(file, line)`. Two reviewers reporting
//! different issues on the same line end up in one merged finding.

use crate::verdict::{Finding, Severity, Verdict};
use schemars::JsonSchema;
use serde::Serialize;
use std::collections::HashMap;

/// A finding after merging every reviewer's report for one location.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct MergedFinding {
    pub severity: Severity,
    pub category: String,
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    pub title: String,
    pub description: String,
    pub suggestion: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unverified: Option<String>,
    /// Contributing reviewer labels, first-seen order, no repeats.
    pub reviewers: Vec<String>,
}

impl MergedFinding {
    fn seed(finding: &Finding, reviewer: &str) -> Self {
        Self {
            severity: finding.severity,
            category: finding.category.clone(),
            file: finding.file.clone(),
            line: finding.line,
            title: finding.title.clone(),
            description: finding.description.clone(),
            suggestion: finding.suggestion.clone(),
            evidence: finding.evidence.clone().filter(|e| !e.trim().is_empty()),
            unverified: finding.unverified.clone(),
            reviewers: vec![reviewer.to_string()],
        }
    }

    fn absorb(&mut self, finding: &Finding, reviewer: &str) {
        if finding.severity > self.severity {
            self.severity = finding.severity;
            self.category = finding.category.clone();
            self.title = finding.title.clone();
        }

        if longer(&finding.description, &self.description) {
            self.description = finding.description.clone();
        }
        if longer(&finding.suggestion, &self.suggestion) {
            self.suggestion = finding.suggestion.clone();
            self.unverified = finding.unverified.clone();
        }
        if let Some(evidence) = finding.evidence.as_deref() {
            let current = self.evidence.as_deref().unwrap_or("");
            if longer(evidence, current) {
                self.evidence = Some(evidence.to_string());
            }
        }

        if !self.reviewers.iter().any(|r| r == reviewer) {
            self.reviewers.push(reviewer.to_string());
        }
    }

    /// `path:line`, or just the path when the finding has no line.
    pub fn location(&self) -> String {
        match self.line {
            Some(line) => format!("{}:{}", self.file, line),
            None => self.file.clone(),
        }
    }
}

/// Strictly longer and non-blank; ties keep the incumbent.
fn longer(candidate: &str, current: &str) -> bool {
    !candidate.trim().is_empty() && candidate.chars().count() > current.chars().count()
}

/// Output of [`merge_findings`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeResult {
    /// Highest severity first; first-seen order within a severity.
    pub findings: Vec<MergedFinding>,
    /// Raw findings discarded because they have no file.
    pub dropped_unanchored: u32,
}

/// Merge every verdict's findings into one deduplicated list.
pub fn merge_findings(verdicts: &[Verdict]) -> MergeResult {
    let mut merged: Vec<MergedFinding> = Vec::new();
    let mut index: HashMap<(String, Option<u32>), usize> = HashMap::new();
    let mut dropped_unanchored = 0u32;

    for verdict in verdicts {
        let reviewer = verdict.label();
        for finding in &verdict.findings {
            if !finding.is_anchored() {
                dropped_unanchored += 1;
                continue;
            }

            let key = (finding.file.clone(), finding.line);
            match index.get(&key) {
                Some(&slot) => merged[slot].absorb(finding, reviewer),
                None => {
                    index.insert(key, merged.len());
                    merged.push(MergedFinding::seed(finding, reviewer));
                }
            }
        }
    }

    // stable: first-seen order survives within a severity
    merged.sort_by(|a, b| b.severity.cmp(&a.severity));

    MergeResult {
        findings: merged,
        dropped_unanchored,
    }
}
