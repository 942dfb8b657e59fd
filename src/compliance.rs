//! WHO-style compliance verdicts for estimated noise levels.

use serde::{Deserialize, Serialize};

pub const CRITICAL_DB: f32 = 70.0;
pub const DAYTIME_DB: f32 = 55.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceTier {
    Critical,
    Daytime,
    Safe,
}

/// Verdict for one level estimate. The status and color strings feed
/// dashboards downstream unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceVerdict {
    pub tier: ComplianceTier,
    pub status: String,
    pub color: String,
    pub exceeds_limit: bool,
    pub limit_type: String,
    pub level_db: f32,
}

/// Classify a dB(A) estimate against WHO daytime guidance.
pub fn assess_compliance(level_db: f32) -> ComplianceVerdict {
    if level_db >= CRITICAL_DB {
        ComplianceVerdict {
            tier: ComplianceTier::Critical,
            status: "Critical - Health Risk".to_string(),
            color: "#e74c3c".to_string(),
            exceeds_limit: true,
            limit_type: "Critical Threshold".to_string(),
            level_db,
        }
    } else if level_db >= DAYTIME_DB {
        ComplianceVerdict {
            tier: ComplianceTier::Daytime,
            status: "Exceeds WHO Daytime Limit".to_string(),
            color: "#f39c12".to_string(),
            exceeds_limit: true,
            limit_type: "Daytime Limit".to_string(),
            level_db,
        }
    } else {
        ComplianceVerdict {
            tier: ComplianceTier::Safe,
            status: "Within Safe Limits".to_string(),
            color: "#27ae60".to_string(),
            exceeds_limit: false,
            limit_type: "Safe".to_string(),
            level_db,
        }
    }
}
