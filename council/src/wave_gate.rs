//! Wave Gate: decide whether review escalates to the next, deeper wave
//!
//! # States
//!
//! ```text
//! wave1 ──passed_gate──▶ wave2 ──passed_gate──▶ wave3
//!   │                      │                      │
//!   ├─ blocking ─▶ stop    ├─ blocking ─▶ stop    └─ max_wave_reached
//!   └─ tier depth reached ─▶ max_wave_reached
//!
//! waves disabled: no states, always "waves_disabled"
//! ```
//!
//! Transitions only ever move one step forward. Each evaluation reads the
//! wave's verdict directory fresh; nothing else is persisted.

use crate::config::{CouncilConfig, GateConfig, TierConfig, WavesConfig};
use crate::verdict::{load_verdict_dir, Outcome, SeverityCounts, VerdictDirError, VerdictSet};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::info;

pub const REASON_WAVES_DISABLED: &str = "waves_disabled";
pub const REASON_MAX_WAVE_REACHED: &str = "max_wave_reached";
pub const REASON_PASSED_GATE: &str = "passed_gate";

#[derive(Debug, Error)]
pub enum GateError {
    #[error("unknown wave '{wave}' (configured: {known})")]
    UnknownWave { wave: String, known: String },

    #[error("unknown tier '{tier}' (configured: {known})")]
    UnknownTier { tier: String, known: String },

    #[error(transparent)]
    VerdictDir(#[from] VerdictDirError),
}

/// Why a wave's results stop escalation. Reasons are independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    MalformedArtifacts,
    NoValidVerdicts,
    CriticalFindings,
    MajorFindings,
    SkippedReviewers,
}

impl BlockReason {
    pub fn code(self) -> &'static str {
        match self {
            Self::MalformedArtifacts => "malformed_artifacts",
            Self::NoValidVerdicts => "no_valid_verdicts",
            Self::CriticalFindings => "critical_findings",
            Self::MajorFindings => "major_findings",
            Self::SkippedReviewers => "skipped_reviewers",
        }
    }
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Counts the gate decides on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GateStats {
    /// Valid verdicts read.
    pub review_count: u32,
    pub major_count: u32,
    pub critical_count: u32,
    pub skip_count: u32,
    pub malformed_count: u32,
}

impl GateStats {
    pub fn from_set(set: &VerdictSet) -> Self {
        let mut severities = SeverityCounts::default();
        for verdict in &set.verdicts {
            severities.add(&SeverityCounts::extract(verdict));
        }
        Self {
            review_count: set.verdicts.len() as u32,
            major_count: severities.major,
            critical_count: severities.critical,
            skip_count: set
                .verdicts
                .iter()
                .filter(|v| v.outcome == Outcome::Skip)
                .count() as u32,
            malformed_count: set.malformed_count() as u32,
        }
    }
}

/// Result of one gate evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct WaveGateDecision {
    pub wave: String,
    pub tier: String,
    pub escalate: bool,
    pub blocking: bool,
    /// Empty unless escalating.
    pub next_wave: String,
    /// `passed_gate`, `max_wave_reached`, `waves_disabled`, or the
    /// comma-joined blocking reasons.
    pub reason: String,
    pub blocking_reasons: Vec<BlockReason>,
    pub stats: GateStats,
}

impl WaveGateDecision {
    fn stop(wave: &str, tier: &str, reason: &str, stats: GateStats) -> Self {
        Self {
            wave: wave.to_string(),
            tier: tier.to_string(),
            escalate: false,
            blocking: false,
            next_wave: String::new(),
            reason: reason.to_string(),
            blocking_reasons: Vec::new(),
            stats,
        }
    }

    /// `key=value` lines for a calling orchestrator, in fixed order.
    pub fn to_kv_lines(&self) -> Vec<String> {
        vec![
            format!("escalate={}", self.escalate),
            format!("blocking={}", self.blocking),
            format!("next_wave={}", self.next_wave),
            format!("reason={}", self.reason),
            format!("review_count={}", self.stats.review_count),
            format!("major_count={}", self.stats.major_count),
            format!("critical_count={}", self.stats.critical_count),
            format!("skip_count={}", self.stats.skip_count),
            format!("malformed_count={}", self.stats.malformed_count),
        ]
    }
}

/// Where a wave sits relative to its tier's depth bound.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Depth {
    next_wave: Option<String>,
}

/// Gate evaluator for one configuration.
#[derive(Debug, Clone)]
pub struct WaveGate {
    waves: WavesConfig,
    tiers: BTreeMap<String, TierConfig>,
}

impl WaveGate {
    pub fn new(waves: WavesConfig, tiers: BTreeMap<String, TierConfig>) -> Self {
        Self { waves, tiers }
    }

    pub fn from_config(config: &CouncilConfig) -> Self {
        Self::new(config.waves.clone(), config.tiers.clone())
    }

    pub fn gate_config(&self) -> &GateConfig {
        &self.waves.gate
    }

    fn resolve(&self, wave: &str, tier: &str) -> Result<Depth, GateError> {
        let order = &self.waves.order;
        let index = order
            .iter()
            .position(|w| w == wave)
            .ok_or_else(|| GateError::UnknownWave {
                wave: wave.to_string(),
                known: order.join(","),
            })?;
        let tier_config = self
            .tiers
            .get(tier)
            .ok_or_else(|| GateError::UnknownTier {
                tier: tier.to_string(),
                known: self.tiers.keys().cloned().collect::<Vec<_>>().join(","),
            })?;

        // index of the deepest wave this tier may run
        let bound = (tier_config.max_waves as usize)
            .min(order.len())
            .saturating_sub(1);

        let next_wave = if index < bound {
            order.get(index + 1).cloned()
        } else {
            None
        };
        Ok(Depth { next_wave })
    }

    /// Wave the tier would advance to after `wave`, if depth allows.
    pub fn next_wave(&self, wave: &str, tier: &str) -> Result<Option<String>, GateError> {
        Ok(self.resolve(wave, tier)?.next_wave)
    }

    /// Evaluate the verdict documents in `dir` for `wave` under `tier`.
    pub fn evaluate(
        &self,
        wave: &str,
        tier: &str,
        dir: &Path,
    ) -> Result<WaveGateDecision, GateError> {
        if !self.waves.enabled {
            return Ok(self.disabled(wave, tier));
        }
        self.resolve(wave, tier)?;
        let set = load_verdict_dir(dir)?;
        self.evaluate_set(wave, tier, &set)
    }

    /// Evaluate an already-loaded verdict set.
    pub fn evaluate_set(
        &self,
        wave: &str,
        tier: &str,
        set: &VerdictSet,
    ) -> Result<WaveGateDecision, GateError> {
        if !self.waves.enabled {
            return Ok(self.disabled(wave, tier));
        }

        let depth = self.resolve(wave, tier)?;
        let stats = GateStats::from_set(set);
        let gate = &self.waves.gate;

        let mut reasons = Vec::new();
        if stats.malformed_count > 0 {
            reasons.push(BlockReason::MalformedArtifacts);
        }
        if set.artifact_count() > 0 && stats.review_count == 0 {
            reasons.push(BlockReason::NoValidVerdicts);
        }
        if gate.block_on_critical && stats.critical_count > 0 {
            reasons.push(BlockReason::CriticalFindings);
        }
        if gate.block_on_major && stats.major_count > 0 {
            reasons.push(BlockReason::MajorFindings);
        }
        if gate.block_on_skip && stats.skip_count > 0 {
            reasons.push(BlockReason::SkippedReviewers);
        }

        let decision = if !reasons.is_empty() {
            let reason = reasons
                .iter()
                .map(|r| r.code())
                .collect::<Vec<_>>()
                .join(",");
            WaveGateDecision {
                blocking: true,
                blocking_reasons: reasons,
                ..WaveGateDecision::stop(wave, tier, &reason, stats)
            }
        } else {
            match depth.next_wave {
                None => WaveGateDecision::stop(wave, tier, REASON_MAX_WAVE_REACHED, stats),
                Some(next) => WaveGateDecision {
                    escalate: true,
                    next_wave: next,
                    ..WaveGateDecision::stop(wave, tier, REASON_PASSED_GATE, stats)
                },
            }
        };

        info!(
            wave = %decision.wave,
            tier = %decision.tier,
            escalate = decision.escalate,
            blocking = decision.blocking,
            next_wave = %decision.next_wave,
            reason = %decision.reason,
            reviews = decision.stats.review_count,
            malformed = decision.stats.malformed_count,
            "Wave gate evaluated"
        );

        Ok(decision)
    }

    fn disabled(&self, wave: &str, tier: &str) -> WaveGateDecision {
        info!(wave = %wave, tier = %tier, "Waves disabled, not escalating");
        WaveGateDecision::stop(wave, tier, REASON_WAVES_DISABLED, GateStats::default())
    }
}

/// Forward-only position in the configured wave order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveCursor {
    order: Vec<String>,
    position: usize,
}

impl WaveCursor {
    /// Cursor at the first wave; `None` when waves are disabled or unset.
    pub fn start(waves: &WavesConfig) -> Option<Self> {
        if !waves.enabled || waves.order.is_empty() {
            return None;
        }
        Some(Self {
            order: waves.order.clone(),
            position: 0,
        })
    }

    pub fn current(&self) -> &str {
        &self.order[self.position]
    }

    /// Apply a decision for the current wave.
    ///
    /// Moves exactly one step, and only on `passed_gate` naming the
    /// immediate successor. Returns whether the cursor moved.
    pub fn advance(&mut self, decision: &WaveGateDecision) -> bool {
        let successor = self.order.get(self.position + 1);
        let moves = decision.escalate
            && decision.wave == self.current()
            && successor.is_some_and(|next| *next == decision.next_wave);
        if moves {
            self.position += 1;
        }
        moves
    }
}
