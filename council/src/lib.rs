//! Council: Verdict Aggregation & Escalation Pipeline
//!
//! Combines independent reviewer verdicts on a change set into one
//! actionable decision. Everything in this crate is synchronous and
//! performs no network I/O; the `council-runner` crate wraps it with a CLI
//! and a hosting-platform client.
//!
//! # Components
//!
//! - [`diff_position`]: unified diff → `line → position` mapping
//! - [`override_auth`]: `/council override` parsing, SHA binding, actor policy
//! - [`aggregator`]: finding dedup, stats, council outcome
//! - [`wave_gate`]: escalate / stop decision for one review wave
//! - [`inline`]: merged findings → inline comments and review summary
//!
//! # Data Flow
//!
//! ```text
//! reviewers ──▶ <wave dir>/*.json ──▶ WaveGate ──▶ escalate? ──▶ next wave
//!                      │
//!                      └──▶ aggregate ◀── select_override ◀── comment feed
//!                                │
//!                                └──▶ build_review_comments ──▶ platform
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod aggregator;
pub mod config;
pub mod diff_position;
pub mod inline;
pub mod override_auth;
pub mod record;
pub mod verdict;
pub mod wave_gate;

// Re-export verdict model types
pub use verdict::{
    load_verdict_dir, parse_verdict, Finding, MalformedArtifact, MalformedCause, Outcome,
    Severity, SeverityCounts, Stats, Verdict, VerdictDirError, VerdictSet,
};

// Re-export aggregation types
pub use aggregator::{
    aggregate, aggregate_set, council_outcome, merge_findings, CouncilStats, CouncilVerdict,
    MergeResult, MergedFinding,
};

// Re-export override types
pub use override_auth::{
    determine_effective_policy, select_override, validate_actor, ActorPermissions, Override,
    OverrideAttempt, OverrideAuthorizer, OverrideComment, OverrideParse, OverrideParser,
    OverridePolicy, OverrideRejection, ParseRejection, RepoPermission,
};

// Re-export wave gate types
pub use wave_gate::{BlockReason, GateError, GateStats, WaveCursor, WaveGate, WaveGateDecision};

// Re-export position mapping and inline comment types
pub use diff_position::{map_positions, position_for_line, PositionMap};
pub use inline::{build_review_comments, render_finding, render_summary, InlineComment, ReviewDraft};

pub use config::{ConfigError, CouncilConfig, PlatformConfig};
pub use record::{CouncilRecord, GateDecisionRecord, SCHEMA_VERSION};
