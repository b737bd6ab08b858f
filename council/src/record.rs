//! Versioned decision records handed to whatever runs after the council.
//!
//! Records are the only on-disk handoff. Each carries a schema version, a
//! fresh evaluation id and a UTC timestamp; the JSON Schema of both record
//! kinds can be printed for consumers.

use crate::aggregator::CouncilVerdict;
use crate::wave_gate::WaveGateDecision;
use chrono::{DateTime, Utc};
use schemars::schema::RootSchema;
use schemars::JsonSchema;
use serde::Serialize;
use uuid::Uuid;

/// Bumped on any breaking change to a record layout.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct GateDecisionRecord {
    pub schema_version: u32,
    pub evaluation_id: Uuid,
    pub evaluated_at: DateTime<Utc>,
    pub decision: WaveGateDecision,
}

impl GateDecisionRecord {
    pub fn new(decision: WaveGateDecision) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            evaluation_id: Uuid::new_v4(),
            evaluated_at: Utc::now(),
            decision,
        }
    }
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CouncilRecord {
    pub schema_version: u32,
    pub evaluation_id: Uuid,
    pub evaluated_at: DateTime<Utc>,
    /// Commit the verdict applies to.
    pub head_sha: String,
    pub verdict: CouncilVerdict,
}

impl CouncilRecord {
    pub fn new(head_sha: impl Into<String>, verdict: CouncilVerdict) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            evaluation_id: Uuid::new_v4(),
            evaluated_at: Utc::now(),
            head_sha: head_sha.into(),
            verdict,
        }
    }
}

pub fn gate_record_schema() -> RootSchema {
    schemars::schema_for!(GateDecisionRecord)
}

pub fn council_record_schema() -> RootSchema {
    schemars::schema_for!(CouncilRecord)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::aggregate;
    use crate::config::CouncilConfig;
    use crate::verdict::{Outcome, Verdict, VerdictSet};
    use crate::wave_gate::WaveGate;

    #[test]
    fn test_gate_record_json_shape() {
        let decision = WaveGate::from_config(&CouncilConfig::default())
            .evaluate_set("wave1", "standard", &VerdictSet::default())
            .unwrap();
        let record = GateDecisionRecord::new(decision);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["schema_version"], 1);
        assert_eq!(json["decision"]["reason"], "passed_gate");
        assert!(json["evaluation_id"].as_str().unwrap().len() == 36);
    }

    #[test]
    fn test_council_record_json_shape() {
        let verdict = aggregate(&[Verdict::new("sec", Outcome::Fail)], "abc1234", None);
        let json = serde_json::to_value(CouncilRecord::new("abc1234", verdict)).unwrap();
        assert_eq!(json["head_sha"], "abc1234");
        assert_eq!(json["verdict"]["outcome"], "FAIL");
        assert_eq!(json["verdict"]["stats"]["fail_count"], 1);
        assert!(json["verdict"].get("applied_override").is_none());
    }

    #[test]
    fn test_evaluation_ids_are_fresh() {
        let verdict = aggregate(&[], "abc1234", None);
        let a = CouncilRecord::new("abc1234", verdict.clone());
        let b = CouncilRecord::new("abc1234", verdict);
        assert_ne!(a.evaluation_id, b.evaluation_id);
    }

    #[test]
    fn test_schemas_name_required_fields() {
        let schema = serde_json::to_value(gate_record_schema()).unwrap();
        let required = schema["required"].as_array().unwrap();
        assert!(required.iter().any(|v| v == "decision"));

        let schema = serde_json::to_value(council_record_schema()).unwrap();
        assert!(schema["properties"].get("verdict").is_some());
    }
}
