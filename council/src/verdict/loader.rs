//! Verdict Loader: tolerant directory scan
//!
//! Reviewer processes write into the directory concurrently, so a document
//! may be half-written when we look at it. Anything that does not parse is
//! recorded as a [`MalformedArtifact`] and the scan carries on.

use super::types::{Finding, Outcome, Severity, Stats, Verdict};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Reason given when a reviewer flags a suggestion as unverified without saying why.
const DEFAULT_UNVERIFIED_REASON: &str = "suggestion not verified by reviewer";

/// Fatal problems with the verdict directory itself.
#[derive(Debug, Error)]
pub enum VerdictDirError {
    #[error("verdict directory does not exist: {0}")]
    Missing(PathBuf),

    #[error("verdict path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("failed to read verdict directory {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why a single verdict document was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedCause {
    /// File could not be read.
    Io(String),
    /// Contents are not JSON (often a document still being written).
    InvalidJson(String),
    /// Valid JSON, but not an object.
    NotAnObject,
    /// An object with a missing required field or a wrongly typed one.
    InvalidField(String),
}

impl MalformedCause {
    /// Machine-readable cause code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::InvalidJson(_) => "invalid_json",
            Self::NotAnObject => "not_an_object",
            Self::InvalidField(_) => "invalid_field",
        }
    }
}

impl std::fmt::Display for MalformedCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {}", e),
            Self::InvalidJson(e) => write!(f, "invalid_json: {}", e),
            Self::NotAnObject => write!(f, "not_an_object"),
            Self::InvalidField(e) => write!(f, "invalid_field: {}", e),
        }
    }
}

/// A verdict document that could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedArtifact {
    pub path: PathBuf,
    pub cause: MalformedCause,
}

/// Result of scanning one verdict directory.
#[derive(Debug, Clone, Default)]
pub struct VerdictSet {
    /// Successfully parsed verdicts, in filename order.
    pub verdicts: Vec<Verdict>,
    /// Documents that could not be parsed.
    pub malformed: Vec<MalformedArtifact>,
}

impl VerdictSet {
    /// Wrap already-parsed verdicts.
    pub fn from_verdicts(verdicts: Vec<Verdict>) -> Self {
        Self {
            verdicts,
            malformed: Vec::new(),
        }
    }

    /// Number of verdict documents seen, valid or not.
    pub fn artifact_count(&self) -> usize {
        self.verdicts.len() + self.malformed.len()
    }

    pub fn malformed_count(&self) -> usize {
        self.malformed.len()
    }
}

// Wire format. Everything but `verdict` is optional so partial documents
// still load; wrongly typed values are rejected by serde.

#[derive(Deserialize)]
struct VerdictDoc {
    reviewer: Option<String>,
    perspective: Option<String>,
    verdict: Outcome,
    confidence: Option<f64>,
    summary: Option<String>,
    #[serde(default)]
    findings: Vec<FindingDoc>,
    stats: Option<Stats>,
}

#[derive(Deserialize)]
struct FindingDoc {
    severity: Severity,
    category: Option<String>,
    file: Option<String>,
    line: Option<i64>,
    title: Option<String>,
    description: Option<String>,
    suggestion: Option<String>,
    evidence: Option<String>,
    suggestion_verified: Option<bool>,
    unverified_reason: Option<String>,
}

impl From<FindingDoc> for Finding {
    fn from(doc: FindingDoc) -> Self {
        let unverified = match doc.suggestion_verified {
            Some(false) => Some(
                doc.unverified_reason
                    .filter(|r| !r.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_UNVERIFIED_REASON.to_string()),
            ),
            _ => None,
        };

        Finding {
            severity: doc.severity,
            category: doc.category.unwrap_or_default(),
            file: doc.file.unwrap_or_default(),
            line: doc
                .line
                .filter(|l| *l > 0)
                .and_then(|l| u32::try_from(l).ok()),
            title: doc.title.unwrap_or_default(),
            description: doc.description.unwrap_or_default(),
            suggestion: doc.suggestion.unwrap_or_default(),
            evidence: doc.evidence.filter(|e| !e.is_empty()),
            unverified,
        }
    }
}

/// Parse one verdict document.
///
/// `fallback_label` names the reviewer when the document names neither a
/// reviewer nor a perspective (normally the file stem).
pub fn parse_verdict(contents: &str, fallback_label: &str) -> Result<Verdict, MalformedCause> {
    let value: serde_json::Value =
        serde_json::from_str(contents).map_err(|e| MalformedCause::InvalidJson(e.to_string()))?;

    if !value.is_object() {
        return Err(MalformedCause::NotAnObject);
    }

    let doc: VerdictDoc =
        serde_json::from_value(value).map_err(|e| MalformedCause::InvalidField(e.to_string()))?;

    let perspective = doc
        .perspective
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_default();
    let reviewer = doc
        .reviewer
        .filter(|r| !r.trim().is_empty())
        .or_else(|| (!perspective.is_empty()).then(|| perspective.clone()))
        .unwrap_or_else(|| fallback_label.to_string());

    Ok(Verdict {
        reviewer,
        perspective,
        outcome: doc.verdict,
        confidence: doc
            .confidence
            .filter(|c| c.is_finite())
            .map(|c| c.clamp(0.0, 1.0))
            .unwrap_or(0.0),
        summary: doc.summary.unwrap_or_default(),
        findings: doc.findings.into_iter().map(Finding::from).collect(),
        stats: doc.stats,
        source: None,
    })
}

fn is_verdict_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

/// Load every `*.json` verdict document in `dir`, in filename order.
///
/// Only a missing or unreadable directory is an error; individual bad
/// documents end up in [`VerdictSet::malformed`].
pub fn load_verdict_dir(dir: &Path) -> Result<VerdictSet, VerdictDirError> {
    if !dir.exists() {
        return Err(VerdictDirError::Missing(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(VerdictDirError::NotADirectory(dir.to_path_buf()));
    }

    let entries = std::fs::read_dir(dir).map_err(|e| VerdictDirError::Unreadable {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        match entry {
            Ok(entry) => {
                let path = entry.path();
                if is_verdict_file(&path) {
                    paths.push(path);
                }
            }
            Err(e) => warn!(dir = %dir.display(), error = %e, "Skipping unreadable dir entry"),
        }
    }
    paths.sort();

    let mut set = VerdictSet::default();
    for path in paths {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();

        let parsed = std::fs::read_to_string(&path)
            .map_err(|e| MalformedCause::Io(e.to_string()))
            .and_then(|contents| parse_verdict(&contents, &stem));

        match parsed {
            Ok(mut verdict) => {
                debug!(
                    path = %path.display(),
                    reviewer = %verdict.reviewer,
                    outcome = %verdict.outcome,
                    findings = verdict.findings.len(),
                    "Loaded verdict"
                );
                verdict.source = Some(path);
                set.verdicts.push(verdict);
            }
            Err(cause) => {
                warn!(
                    path = %path.display(),
                    cause = cause.code(),
                    detail = %cause,
                    "Malformed verdict artifact"
                );
                set.malformed.push(MalformedArtifact { path, cause });
            }
        }
    }

    Ok(set)
}
