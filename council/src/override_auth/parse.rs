//! Override request parsing
//!
//! An override arrives either as structured fields on a comment record or
//! as a slash command in the comment body:
//!
//! ```text
//! /council override sha=abc1234 reason: flaky upstream check, verified by hand
//! /council override sha=abc1234
//! reason: false positive, see thread above
//! ```
//!
//! Parsing never fails hard: every comment yields an [`OverrideParse`].

use chrono::{DateTime, Utc};
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Shortest commit SHA prefix accepted for an override.
pub const MIN_SHA_LEN: usize = 7;

/// Default slash-command tool name.
pub const DEFAULT_COMMAND: &str = "council";

/// One entry of the chronological comment feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideComment {
    /// Login of the comment author.
    pub actor: String,
    #[serde(default)]
    pub body: String,
    /// Pre-parsed SHA, when the feed already carries structured fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
    /// Pre-parsed reason, when the feed already carries structured fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl OverrideComment {
    /// Comment carrying only a free-text body.
    pub fn from_body(actor: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            body: body.into(),
            ..Default::default()
        }
    }

    /// Comment carrying structured override fields.
    pub fn structured(
        actor: impl Into<String>,
        sha: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            actor: actor.into(),
            sha: Some(sha.into()),
            reason: Some(reason.into()),
            ..Default::default()
        }
    }
}

/// A human-authorized exception bound to a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Override {
    pub actor: String,
    /// Commit SHA prefix the override is bound to (lowercase hex).
    pub sha: String,
    pub reason: String,
}

impl Override {
    pub fn new(actor: impl Into<String>, sha: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            sha: sha.into().to_ascii_lowercase(),
            reason: reason.into(),
        }
    }

    /// Whether this override is bound to `head_sha`.
    pub fn covers(&self, head_sha: &str) -> bool {
        validate_sha(&self.sha, head_sha).is_ok()
    }
}

/// Why a comment does not yield an override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseRejection {
    /// Neither structured fields nor an override command.
    NoCommand,
    MissingActor,
    MissingSha,
    MissingReason,
    ShaNotHex { sha: String },
    ShaTooShort { sha: String },
    /// SHA is not a prefix of the current head commit.
    ShaMismatch { sha: String },
}

impl ParseRejection {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoCommand => "no_command",
            Self::MissingActor => "missing_actor",
            Self::MissingSha => "missing_sha",
            Self::MissingReason => "missing_reason",
            Self::ShaNotHex { .. } => "sha_not_hex",
            Self::ShaTooShort { .. } => "sha_too_short",
            Self::ShaMismatch { .. } => "sha_mismatch",
        }
    }
}

impl std::fmt::Display for ParseRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ShaNotHex { sha } => write!(f, "sha '{}' is not hexadecimal", sha),
            Self::ShaTooShort { sha } => {
                write!(f, "sha '{}' shorter than {} characters", sha, MIN_SHA_LEN)
            }
            Self::ShaMismatch { sha } => write!(f, "sha '{}' does not match head commit", sha),
            other => write!(f, "{}", other.code()),
        }
    }
}

/// Outcome of parsing one comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverrideParse {
    Parsed(Override),
    Unparseable(ParseRejection),
}

fn validate_sha(sha: &str, head_sha: &str) -> Result<(), ParseRejection> {
    if !sha.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ParseRejection::ShaNotHex { sha: sha.to_string() });
    }
    if sha.len() < MIN_SHA_LEN {
        return Err(ParseRejection::ShaTooShort { sha: sha.to_string() });
    }
    if !head_sha
        .trim()
        .to_ascii_lowercase()
        .starts_with(&sha.to_ascii_lowercase())
    {
        return Err(ParseRejection::ShaMismatch { sha: sha.to_string() });
    }
    Ok(())
}

/// Extracts override requests for one slash-command name.
#[derive(Debug, Clone)]
pub struct OverrideParser {
    command: Regex,
}

impl OverrideParser {
    /// Build a parser for `/<tool> override ...`.
    pub fn new(tool: &str) -> Result<Self, regex::Error> {
        let pattern = format!(
            r"(?im)^[ \t]*/{}[ \t]+override\b(?:[ \t]+sha=(\S*))?[ \t]*(.*)$",
            regex::escape(tool)
        );
        Ok(Self {
            command: Regex::new(&pattern)?,
        })
    }

    /// Parse one comment against the current head commit.
    pub fn parse(&self, comment: &OverrideComment, head_sha: &str) -> OverrideParse {
        match self.extract(comment, head_sha) {
            Ok(parsed) => OverrideParse::Parsed(parsed),
            Err(rejection) => OverrideParse::Unparseable(rejection),
        }
    }

    fn extract(&self, comment: &OverrideComment, head_sha: &str) -> Result<Override, ParseRejection> {
        let structured = comment.sha.is_some() || comment.reason.is_some();
        let from_body = self.parse_body(&comment.body);

        if !structured && from_body.is_none() {
            return Err(ParseRejection::NoCommand);
        }

        let actor = comment.actor.trim();
        if actor.is_empty() {
            return Err(ParseRejection::MissingActor);
        }

        let (body_sha, body_reason) = from_body.unwrap_or((None, None));
        let sha = non_empty(comment.sha.as_deref())
            .or(body_sha)
            .ok_or(ParseRejection::MissingSha)?;
        let reason = non_empty(comment.reason.as_deref())
            .or(body_reason)
            .ok_or(ParseRejection::MissingReason)?;

        validate_sha(&sha, head_sha)?;

        Ok(Override::new(actor, sha, reason))
    }

    /// `(sha, reason)` from the first override command in `body`, if any.
    fn parse_body(&self, body: &str) -> Option<(Option<String>, Option<String>)> {
        let caps = self.command.captures(body)?;
        let whole = caps.get(0)?;

        let sha = non_empty(caps.get(1).map(|m| m.as_str()));

        let inline = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        let reason = strip_reason_label(inline)
            .or_else(|| strip_reason_label(&body[whole.end()..]));

        Some((sha, reason))
    }
}

static DEFAULT_PARSER: LazyLock<OverrideParser> =
    LazyLock::new(|| OverrideParser::new(DEFAULT_COMMAND).unwrap());

impl Default for OverrideParser {
    fn default() -> Self {
        DEFAULT_PARSER.clone()
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Trim free text and drop a leading `reason:` label.
fn strip_reason_label(text: &str) -> Option<String> {
    let trimmed = text.trim();
    let unlabeled = match trimmed.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("reason:") => trimmed[7..].trim(),
        _ => trimmed,
    };
    non_empty(Some(unlabeled))
}
