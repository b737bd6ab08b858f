//! Subcommand bodies, kept out of `main` so tests can drive them.
//!
//! Each command returns the text destined for stdout. Machine-readable
//! records go to `--output` files when asked for; logs go to stderr.

use crate::github::{GitHubClient, TOKEN_ENV};
use crate::platform::PullRequestRef;
use crate::publish::{PublishReport, ReviewPublisher};
use anyhow::{bail, Context, Result};
use council::aggregator::aggregate_set;
use council::config::CouncilConfig;
use council::diff_position::map_positions;
use council::override_auth::{
    determine_effective_policy, ActorPermissions, OverrideAuthorizer, OverrideComment,
    RepoPermission,
};
use council::record::{
    council_record_schema, gate_record_schema, CouncilRecord, GateDecisionRecord,
};
use council::verdict::load_verdict_dir;
use council::wave_gate::WaveGate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Which decision record to describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SchemaKind {
    Gate,
    Council,
}

/// Inputs for offline aggregation.
#[derive(Debug, Clone, Default)]
pub struct AggregateRequest {
    pub config: PathBuf,
    pub verdicts: PathBuf,
    pub head_sha: String,
    /// JSON array of comments, oldest first.
    pub comments: Option<PathBuf>,
    /// JSON object of actor login to permission name.
    pub permissions: Option<PathBuf>,
    pub pr_author: Option<String>,
    pub output: Option<PathBuf>,
}

fn load_config(path: &Path) -> Result<CouncilConfig> {
    CouncilConfig::load(path).with_context(|| format!("loading config {}", path.display()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json + "\n")
        .with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), "Wrote decision record");
    Ok(())
}

/// Evaluate the wave gate and return its `key=value` lines.
pub fn wave_gate(
    config: &Path,
    verdicts: &Path,
    wave: &str,
    tier: &str,
    output: Option<&Path>,
) -> Result<String> {
    let config = load_config(config)?;
    let gate = WaveGate::from_config(&config);
    let decision = gate
        .evaluate(wave, tier, verdicts)
        .with_context(|| format!("evaluating wave {} for tier {}", wave, tier))?;

    info!(
        wave,
        tier,
        escalate = decision.escalate,
        blocking = decision.blocking,
        reason = %decision.reason,
        "Wave gate evaluated"
    );

    let mut out = decision.to_kv_lines().join("\n");
    out.push('\n');
    if let Some(path) = output {
        write_json(path, &GateDecisionRecord::new(decision))?;
    }
    Ok(out)
}

/// Aggregate a verdict directory offline and return the record as JSON.
pub fn aggregate(request: &AggregateRequest) -> Result<String> {
    let config = load_config(&request.config)?;
    let set = load_verdict_dir(&request.verdicts)
        .with_context(|| format!("loading verdicts from {}", request.verdicts.display()))?;

    let comments: Vec<OverrideComment> = match &request.comments {
        Some(path) => read_json(path)?,
        None => Vec::new(),
    };
    let permissions: ActorPermissions = match &request.permissions {
        Some(path) => read_json::<BTreeMap<String, String>>(path)?
            .into_iter()
            .map(|(actor, raw)| {
                let permission = RepoPermission::parse(&raw);
                (actor, permission)
            })
            .collect(),
        None => ActorPermissions::new(),
    };

    let policy = determine_effective_policy(
        &set.verdicts,
        &config.reviewer_policies(),
        config.override_config.policy,
    );
    let authorizer = OverrideAuthorizer::new(config.override_parser()?);
    let selected = authorizer.select(
        &comments,
        &request.head_sha,
        policy,
        request.pr_author.as_deref().unwrap_or_default(),
        &permissions,
    );

    let verdict = aggregate_set(&set, &request.head_sha, selected.as_ref());
    let record = CouncilRecord::new(request.head_sha.clone(), verdict);

    if let Some(path) = &request.output {
        write_json(path, &record)?;
    }
    Ok(serde_json::to_string_pretty(&record)? + "\n")
}

/// New-file line to diff position mapping for one file's diff, as JSON.
pub fn positions(diff: &Path) -> Result<String> {
    let text = std::fs::read_to_string(diff)
        .with_context(|| format!("reading diff {}", diff.display()))?;
    let map = map_positions(&text);
    Ok(serde_json::to_string_pretty(&map)? + "\n")
}

/// JSON Schema of a decision record.
pub fn schema(kind: SchemaKind) -> Result<String> {
    let schema = match kind {
        SchemaKind::Gate => gate_record_schema(),
        SchemaKind::Council => council_record_schema(),
    };
    Ok(serde_json::to_string_pretty(&schema)? + "\n")
}

/// Aggregate and post the council review to a GitHub pull request.
pub async fn publish(config: &Path, verdicts: &Path, repo: &str, pr: u64) -> Result<String> {
    let config = load_config(config)?;
    let pr = PullRequestRef::parse(repo, pr)
        .with_context(|| format!("invalid repository {:?}, expected owner/name", repo))?;
    let set = load_verdict_dir(verdicts)
        .with_context(|| format!("loading verdicts from {}", verdicts.display()))?;

    let client = GitHubClient::from_env(&config.platform).context("building GitHub client")?;
    if !client.has_token() {
        bail!("{} is not set", TOKEN_ENV);
    }

    let publisher = ReviewPublisher::new(client, config)?;
    let PublishReport {
        record, outcome, ..
    } = publisher
        .publish(&pr, &set)
        .await
        .with_context(|| format!("publishing review to {}", pr))?;

    info!(%pr, ?outcome, "Publish finished");
    Ok(serde_json::to_string_pretty(&record)? + "\n")
}
