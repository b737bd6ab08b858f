//! Verdict Model: per-perspective reviewer output
//!
//! Each reviewer perspective writes exactly one verdict document per wave
//! into a wave-scoped directory. Documents are immutable once written; the
//! wave gate and the aggregator both read them through [`load_verdict_dir`].
//!
//! # Document Shape
//!
//! ```text
//! {
//!   "reviewer": "security", "perspective": "security",
//!   "verdict": "PASS" | "WARN" | "FAIL" | "SKIP",
//!   "confidence": 0.9, "summary": "...",
//!   "findings": [ { "severity": "major", "file": "src/lib.rs", "line": 10, ... } ],
//!   "stats": { "files_reviewed": 4, "files_with_issues": 1, "critical": 0, ... }
//! }
//! ```
//!
//! Only `verdict` is required. Anything unreadable is reported as a
//! [`MalformedArtifact`] and never aborts a directory scan.

pub mod loader;
pub mod types;

pub use loader::{
    load_verdict_dir, parse_verdict, MalformedArtifact, MalformedCause, VerdictDirError,
    VerdictSet,
};
pub use types::{Finding, Outcome, Severity, SeverityCounts, Stats, Verdict};
