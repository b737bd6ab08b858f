//! Override Authorizer: human countermand of a blocking council verdict
//!
//! The comment feed is the only source of truth: overrides are derived fresh
//! on every evaluation and never persisted. Each comment is parsed, bound to
//! the current head commit, and checked against the effective policy.
//!
//! # Selection
//!
//! ```text
//! comments (chronological)
//!   ├─ unparseable / wrong SHA → skip (logged with ordinal)
//!   ├─ actor not authorized    → skip (logged with ordinal)
//!   └─ first accepted          → selected, scan stops
//! ```
//!
//! The first accepted comment wins, not the most recent and not the most
//! privileged actor.

pub mod parse;
pub mod policy;

pub use parse::{
    Override, OverrideComment, OverrideParse, OverrideParser, ParseRejection, DEFAULT_COMMAND,
    MIN_SHA_LEN,
};
pub use policy::{
    determine_effective_policy, validate_actor, ActorPermissions, OverridePolicy, RepoPermission,
};

use tracing::{debug, info, warn};

/// Why a comment was not selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverrideRejection {
    Unparseable(ParseRejection),
    Unauthorized {
        policy: OverridePolicy,
        permission: Option<RepoPermission>,
    },
}

impl std::fmt::Display for OverrideRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unparseable(r) => write!(f, "unparseable: {}", r),
            Self::Unauthorized { policy, permission } => match permission {
                Some(p) => write!(f, "unauthorized under {} (permission {})", policy, p),
                None => write!(f, "unauthorized under {} (permission unknown)", policy),
            },
        }
    }
}

/// Audit entry for one comment that looked at least like an override attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideAttempt {
    /// 1-based position in the comment feed.
    pub ordinal: usize,
    pub actor: String,
    pub result: Result<Override, OverrideRejection>,
}

/// Authorizes override comments for one slash-command name.
#[derive(Debug, Clone, Default)]
pub struct OverrideAuthorizer {
    parser: OverrideParser,
}

impl OverrideAuthorizer {
    pub fn new(parser: OverrideParser) -> Self {
        Self { parser }
    }

    /// Authorizer for `/<tool> override ...` commands.
    pub fn for_command(tool: &str) -> Result<Self, regex::Error> {
        Ok(Self::new(OverrideParser::new(tool)?))
    }

    /// Evaluate one comment: parse, bind to head, authorize.
    pub fn check(
        &self,
        comment: &OverrideComment,
        head_sha: &str,
        policy: OverridePolicy,
        pr_author: &str,
        permissions: &ActorPermissions,
    ) -> Result<Override, OverrideRejection> {
        let parsed = match self.parser.parse(comment, head_sha) {
            OverrideParse::Parsed(o) => o,
            OverrideParse::Unparseable(r) => return Err(OverrideRejection::Unparseable(r)),
        };

        let permission = permissions.get(&parsed.actor);
        if validate_actor(&parsed.actor, policy, pr_author, permission) {
            Ok(parsed)
        } else {
            Err(OverrideRejection::Unauthorized { policy, permission })
        }
    }

    /// Every comment's outcome up to and including the first accepted one.
    ///
    /// Comments without any override command are left out of the returned
    /// trail and logged at debug; every comment is logged with its ordinal.
    pub fn audit(
        &self,
        comments: &[OverrideComment],
        head_sha: &str,
        policy: OverridePolicy,
        pr_author: &str,
        permissions: &ActorPermissions,
    ) -> Vec<OverrideAttempt> {
        let mut attempts = Vec::new();

        for (idx, comment) in comments.iter().enumerate() {
            let ordinal = idx + 1;
            let result = self.check(comment, head_sha, policy, pr_author, permissions);

            match &result {
                Err(OverrideRejection::Unparseable(ParseRejection::NoCommand)) => {
                    debug!(ordinal, actor = %comment.actor, "No override command");
                    continue;
                }
                Err(rejection) => {
                    warn!(
                        ordinal,
                        actor = %comment.actor,
                        %policy,
                        reason = %rejection,
                        "Override comment skipped"
                    );
                }
                Ok(accepted) => {
                    info!(
                        ordinal,
                        actor = %accepted.actor,
                        sha = %accepted.sha,
                        %policy,
                        "Override accepted"
                    );
                }
            }

            let accepted = result.is_ok();
            attempts.push(OverrideAttempt {
                ordinal,
                actor: comment.actor.clone(),
                result,
            });
            if accepted {
                break;
            }
        }

        attempts
    }

    /// First comment, in feed order, that parses and is authorized.
    pub fn select(
        &self,
        comments: &[OverrideComment],
        head_sha: &str,
        policy: OverridePolicy,
        pr_author: &str,
        permissions: &ActorPermissions,
    ) -> Option<Override> {
        let selected = self
            .audit(comments, head_sha, policy, pr_author, permissions)
            .into_iter()
            .find_map(|a| a.result.ok());

        if selected.is_none() {
            info!(comments = comments.len(), %policy, "No authorized override found");
        }
        selected
    }
}

/// [`OverrideAuthorizer::select`] with the default `/council` command.
pub fn select_override(
    comments: &[OverrideComment],
    head_sha: &str,
    policy: OverridePolicy,
    pr_author: &str,
    permissions: &ActorPermissions,
) -> Option<Override> {
    OverrideAuthorizer::default().select(comments, head_sha, policy, pr_author, permissions)
}
