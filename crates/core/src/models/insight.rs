use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An insight record as stored by the data service.
///
/// Every field except `createdAt` may be missing; the reconciler decides
/// which of them can be turned into a `StructuredInsight`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightRecord {
    #[serde(
        default,
        deserialize_with = "deserialize_opt_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_generated_text: Option<String>,

    /// Opaque timestamp; ordered by string comparison only.
    #[serde(default)]
    pub created_at: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portfolio_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diversification_score: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_alignment: Option<f64>,

    /// Serialized `StructuredInsight` JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_data: Option<String>,

    /// Serialized generation diagnostics JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_info: Option<String>,
}

fn deserialize_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "super::holding::string_or_number")] String);

    let value: Option<Wrapper> = Option::deserialize(deserializer)?;
    Ok(value.map(|w| w.0))
}

/// Risk classification of a single insight section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    /// Also absorbs any label the generator invents.
    #[default]
    #[serde(other)]
    Neutral,
}

/// One titled section of a structured insight.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InsightSection {
    pub title: String,
    pub content: String,
    pub key_metrics: Vec<String>,
    pub risk_level: RiskLevel,
}

/// A concrete asset suggestion attached to an insight.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssetRecommendation {
    pub ticker: String,
    pub asset_name: String,
    pub allocation: String,
    pub category: String,
    pub reasoning: String,
    pub priority: String,
    pub expected_impact: String,
}

/// The normalized form every insight record is reconciled into.
///
/// The three scores are required on the wire; everything else defaults
/// to empty when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredInsight {
    /// 0–10
    pub risk_score: f64,

    /// 0–100
    pub diversification_score: f64,

    /// 0–100
    pub goal_alignment: f64,

    #[serde(default)]
    pub main_recommendations: Vec<String>,

    #[serde(default)]
    pub sections: BTreeMap<String, InsightSection>,

    #[serde(default)]
    pub raw_response: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub qualitative_insights: BTreeMap<String, String>,

    /// Kept as raw JSON: generators disagree on whether adjustments are
    /// strings or numbers. `InsightReconciler::extract_adjustments` reads them.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub score_adjustments: BTreeMap<String, serde_json::Value>,

    #[serde(default)]
    pub section_specific_analysis: BTreeMap<String, String>,

    #[serde(default)]
    pub asset_recommendations: Vec<AssetRecommendation>,
}

impl StructuredInsight {
    /// An insight with the given scores and no sections or recommendations.
    pub fn with_scores(
        risk_score: f64,
        diversification_score: f64,
        goal_alignment: f64,
        raw_response: impl Into<String>,
    ) -> Self {
        Self {
            risk_score,
            diversification_score,
            goal_alignment,
            main_recommendations: Vec::new(),
            sections: BTreeMap::new(),
            raw_response: raw_response.into(),
            qualitative_insights: BTreeMap::new(),
            score_adjustments: BTreeMap::new(),
            section_specific_analysis: BTreeMap::new(),
            asset_recommendations: Vec::new(),
        }
    }
}

/// The score category an adjustment applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdjustmentKind {
    Risk,
    Diversification,
    #[serde(rename = "Goal Alignment")]
    GoalAlignment,
}

impl AdjustmentKind {
    /// Key under `scoreAdjustments` / `aiAdjustments` in the generator's JSON.
    pub fn wire_key(&self) -> &'static str {
        match self {
            AdjustmentKind::Risk => "risk",
            AdjustmentKind::Diversification => "diversification",
            AdjustmentKind::GoalAlignment => "goalAlignment",
        }
    }

    pub const ALL: [AdjustmentKind; 3] = [
        AdjustmentKind::Risk,
        AdjustmentKind::Diversification,
        AdjustmentKind::GoalAlignment,
    ];
}

impl std::fmt::Display for AdjustmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdjustmentKind::Risk => write!(f, "Risk"),
            AdjustmentKind::Diversification => write!(f, "Diversification"),
            AdjustmentKind::GoalAlignment => write!(f, "Goal Alignment"),
        }
    }
}

/// An AI-suggested change to one of the base scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreAdjustment {
    #[serde(rename = "type")]
    pub kind: AdjustmentKind,
    pub adjustment: String,
    pub reasoning: String,
}

/// A record together with its reconciled form, computed once on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightEntry {
    pub record: InsightRecord,
    pub structured: Option<StructuredInsight>,
}
