//! Verdict, Finding and Stats types plus shared severity extraction.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Outcome reported by a single reviewer (and by the council as a whole).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    /// No blocking issues.
    Pass,
    /// Issues worth a look, not blocking.
    Warn,
    /// Blocking issues found.
    Fail,
    /// Reviewer did not run (disabled, out of budget, not applicable).
    Skip,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Warn => "WARN",
            Self::Fail => "FAIL",
            Self::Skip => "SKIP",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PASS" => Ok(Self::Pass),
            "WARN" => Ok(Self::Warn),
            "FAIL" => Ok(Self::Fail),
            "SKIP" => Ok(Self::Skip),
            other => Err(format!("unknown verdict outcome '{}'", other)),
        }
    }
}

impl<'de> Deserialize<'de> for Outcome {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Finding severity. Totally ordered: `Info < Minor < Major < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Minor,
    Major,
    Critical,
}

impl Severity {
    /// All severities, highest first.
    pub fn descending() -> &'static [Self] {
        &[Self::Critical, Self::Major, Self::Minor, Self::Info]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Info => "info",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" => Ok(Self::Critical),
            "major" => Ok(Self::Major),
            "minor" => Ok(Self::Minor),
            "info" => Ok(Self::Info),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A single issue raised by one reviewer.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct Finding {
    pub severity: Severity,
    pub category: String,
    /// Repository-relative path. Empty when the finding is not tied to a file.
    pub file: String,
    /// 1-based line in the new file, when meaningful.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    pub title: String,
    pub description: String,
    pub suggestion: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
    /// Reason the suggestion is unverified, if the reviewer flagged it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unverified: Option<String>,
}

impl Finding {
    /// Minimal finding at a location; the remaining text fields start empty.
    pub fn new(severity: Severity, file: impl Into<String>, line: Option<u32>) -> Self {
        Self {
            severity,
            category: String::new(),
            file: file.into(),
            line,
            title: String::new(),
            description: String::new(),
            suggestion: String::new(),
            evidence: None,
            unverified: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = suggestion.into();
        self
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = Some(evidence.into());
        self
    }

    /// Whether this finding can be attached to a file at all.
    ///
    /// Empty paths and the conventional "not applicable" markers are
    /// treated as unanchored.
    pub fn is_anchored(&self) -> bool {
        let file = self.file.trim();
        !(file.is_empty() || file == "-" || file.eq_ignore_ascii_case("n/a"))
    }
}

/// Reviewer-reported statistics block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Stats {
    pub files_reviewed: u32,
    pub files_with_issues: u32,
    pub critical: u32,
    pub major: u32,
    pub minor: u32,
    pub info: u32,
}

impl Stats {
    pub fn severity_counts(&self) -> SeverityCounts {
        SeverityCounts {
            critical: self.critical,
            major: self.major,
            minor: self.minor,
            info: self.info,
        }
    }
}

/// One reviewer's complete verdict for one wave.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct Verdict {
    pub reviewer: String,
    pub perspective: String,
    #[serde(rename = "verdict")]
    pub outcome: Outcome,
    pub confidence: f64,
    pub summary: String,
    pub findings: Vec<Finding>,
    /// Absent when the document carried no `stats` block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<Stats>,
    /// File the verdict was read from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Verdict {
    /// Bare verdict with no findings, mostly for programmatic construction.
    pub fn new(reviewer: impl Into<String>, outcome: Outcome) -> Self {
        let reviewer = reviewer.into();
        Self {
            perspective: reviewer.clone(),
            reviewer,
            outcome,
            confidence: 1.0,
            summary: String::new(),
            findings: Vec::new(),
            stats: None,
            source: None,
        }
    }

    pub fn with_findings(mut self, findings: Vec<Finding>) -> Self {
        self.findings = findings;
        self
    }

    pub fn with_stats(mut self, stats: Stats) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Label used to attribute merged findings to this reviewer.
    pub fn label(&self) -> &str {
        if !self.reviewer.trim().is_empty() {
            &self.reviewer
        } else {
            &self.perspective
        }
    }
}

/// Per-severity finding counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SeverityCounts {
    pub critical: u32,
    pub major: u32,
    pub minor: u32,
    pub info: u32,
}

impl SeverityCounts {
    /// Count findings directly.
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut counts = Self::default();
        for finding in findings {
            counts.bump(finding.severity);
        }
        counts
    }

    /// Severity counts for a verdict.
    ///
    /// Takes the per-severity maximum of the stats block and the findings
    /// list, so a stats block that undercounts its own findings cannot hide
    /// them. Without a stats block the findings are the only source.
    pub fn extract(verdict: &Verdict) -> Self {
        let counted = Self::from_findings(&verdict.findings);
        match verdict.stats {
            Some(stats) => counted.max_with(&stats.severity_counts()),
            None => counted,
        }
    }

    /// `(reported, counted)` when a present stats block disagrees with the findings.
    pub fn discrepancy(verdict: &Verdict) -> Option<(Self, Self)> {
        let reported = verdict.stats?.severity_counts();
        let counted = Self::from_findings(&verdict.findings);
        (reported != counted).then_some((reported, counted))
    }

    pub fn get(&self, severity: Severity) -> u32 {
        match severity {
            Severity::Critical => self.critical,
            Severity::Major => self.major,
            Severity::Minor => self.minor,
            Severity::Info => self.info,
        }
    }

    pub fn bump(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical = self.critical.saturating_add(1),
            Severity::Major => self.major = self.major.saturating_add(1),
            Severity::Minor => self.minor = self.minor.saturating_add(1),
            Severity::Info => self.info = self.info.saturating_add(1),
        }
    }

    /// Saturating per-severity sum; counts come from untrusted documents.
    pub fn add(&mut self, other: &Self) {
        self.critical = self.critical.saturating_add(other.critical);
        self.major = self.major.saturating_add(other.major);
        self.minor = self.minor.saturating_add(other.minor);
        self.info = self.info.saturating_add(other.info);
    }

    pub fn max_with(&self, other: &Self) -> Self {
        Self {
            critical: self.critical.max(other.critical),
            major: self.major.max(other.major),
            minor: self.minor.max(other.minor),
            info: self.info.max(other.info),
        }
    }

    pub fn total(&self) -> u32 {
        self.critical
            .saturating_add(self.major)
            .saturating_add(self.minor)
            .saturating_add(self.info)
    }
}

impl std::fmt::Display for SeverityCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "critical={} major={} minor={} info={}",
            self.critical, self.major, self.minor, self.info
        )
    }
}
