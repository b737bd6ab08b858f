//! Override policies and actor authorization.

use crate::verdict::{Outcome, Verdict};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Who may override a failing council verdict.
///
/// Ordered by strictness: `PrAuthor < WriteAccess < MaintainersOnly`.
/// `Unknown` never authorizes anyone, so it sorts above every real policy.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum OverridePolicy {
    /// The pull request author may override.
    PrAuthor,
    /// Anyone with write, maintain or admin permission.
    WriteAccess,
    /// Only maintain or admin permission.
    MaintainersOnly,
    /// Unrecognised policy name.
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for OverridePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PrAuthor => write!(f, "pr_author"),
            Self::WriteAccess => write!(f, "write_access"),
            Self::MaintainersOnly => write!(f, "maintainers_only"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Repository permission of an actor as reported by the hosting platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoPermission {
    None,
    Read,
    Triage,
    Write,
    Maintain,
    Admin,
}

impl RepoPermission {
    /// Parse a platform permission / role name. Unrecognised names map to `None`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Self::Admin,
            "maintain" => Self::Maintain,
            "write" | "push" => Self::Write,
            "triage" => Self::Triage,
            "read" | "pull" => Self::Read,
            _ => Self::None,
        }
    }
}

impl std::fmt::Display for RepoPermission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Read => write!(f, "read"),
            Self::Triage => write!(f, "triage"),
            Self::Write => write!(f, "write"),
            Self::Maintain => write!(f, "maintain"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

/// Actor login → platform permission, keyed case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct ActorPermissions {
    by_actor: HashMap<String, RepoPermission>,
}

impl ActorPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, actor: &str, permission: RepoPermission) {
        self.by_actor.insert(actor.to_ascii_lowercase(), permission);
    }

    pub fn with(mut self, actor: &str, permission: RepoPermission) -> Self {
        self.insert(actor, permission);
        self
    }

    pub fn get(&self, actor: &str) -> Option<RepoPermission> {
        self.by_actor.get(&actor.to_ascii_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.by_actor.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_actor.is_empty()
    }
}

impl FromIterator<(String, RepoPermission)> for ActorPermissions {
    fn from_iter<I: IntoIterator<Item = (String, RepoPermission)>>(iter: I) -> Self {
        let mut permissions = Self::new();
        for (actor, permission) in iter {
            permissions.insert(&actor, permission);
        }
        permissions
    }
}

/// Whether `actor` may override under `policy`.
pub fn validate_actor(
    actor: &str,
    policy: OverridePolicy,
    pr_author: &str,
    permission: Option<RepoPermission>,
) -> bool {
    match policy {
        OverridePolicy::PrAuthor => {
            !pr_author.trim().is_empty() && actor.trim().eq_ignore_ascii_case(pr_author.trim())
        }
        OverridePolicy::WriteAccess => matches!(
            permission,
            Some(RepoPermission::Write | RepoPermission::Maintain | RepoPermission::Admin)
        ),
        OverridePolicy::MaintainersOnly => matches!(
            permission,
            Some(RepoPermission::Maintain | RepoPermission::Admin)
        ),
        OverridePolicy::Unknown => false,
    }
}

/// Strictest override policy among the currently failing reviewers.
///
/// Each failing reviewer contributes its configured policy (looked up by
/// reviewer label, then perspective), or `global_policy` when it has none.
/// With no failing reviewer the global policy applies.
pub fn determine_effective_policy(
    verdicts: &[Verdict],
    reviewer_policies: &HashMap<String, OverridePolicy>,
    global_policy: OverridePolicy,
) -> OverridePolicy {
    verdicts
        .iter()
        .filter(|v| v.outcome == Outcome::Fail)
        .map(|v| {
            reviewer_policies
                .get(v.label())
                .or_else(|| reviewer_policies.get(&v.perspective))
                .copied()
                .unwrap_or(global_policy)
        })
        .max()
        .unwrap_or(global_policy)
}
