use chrono::{DateTime, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use tracing::{debug, warn};

use crate::models::insight::{
    AdjustmentKind, AssetRecommendation, InsightEntry, InsightRecord, InsightSection,
    ScoreAdjustment, StructuredInsight,
};

pub const DEFAULT_RISK_SCORE: f64 = 5.0;
pub const DEFAULT_DIVERSIFICATION_SCORE: f64 = 50.0;
pub const DEFAULT_GOAL_ALIGNMENT: f64 = 50.0;

/// Section key reserved for asset recommendations; never shown as a tab.
pub const ASSET_RECOMMENDATIONS_SECTION: &str = "asset_recommendations";

const MAX_ACTION_ITEMS: usize = 5;
const MIN_ACTION_ITEM_LEN: usize = 10;
const MAX_ACTION_ITEM_LEN: usize = 200;
const TOP_HOLDINGS_IN_REPORT: usize = 5;

const ACTION_KEYWORDS: [&str; 10] = [
    "consider",
    "recommend",
    "suggest",
    "should",
    "need to",
    "action",
    "review",
    "monitor",
    "evaluate",
    "assess",
];

/// Category keyword → advisory shown when such a recommendation is marked low priority.
/// Checked in order; the first keyword contained in the category wins.
const PRIORITY_ADVISORIES: [(&str, &str); 12] = [
    ("international", "Consider: International exposure is often important for diversification"),
    ("bond", "Consider: Bonds provide stability for conservative goals"),
    ("dividend", "Consider: Dividend focus can help with income goals"),
    ("real estate", "Consider: Real estate can provide diversification and income"),
    ("small cap", "Consider: Small cap exposure can enhance growth potential"),
    ("technology", "Consider: Technology sector is often a key growth driver"),
    ("healthcare", "Consider: Healthcare sector provides defensive characteristics"),
    ("financial", "Consider: Financial sector can provide value and income"),
    ("commodity", "Consider: Commodities can provide inflation protection"),
    ("mutual fund", "Consider: Mutual funds provide professional management and diversification"),
    ("individual stock", "Consider: Individual stocks can provide targeted exposure and growth potential"),
    ("reit", "Consider: REITs provide real estate exposure and income generation"),
];

static BULLET_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-•*]\s*").expect("static regex"));
static NUMBER_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.\s*").expect("static regex"));

/// The step of the fallback chain that produced a `StructuredInsight`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReconciliationTier {
    /// `structuredData` parsed as a complete structured insight.
    StructuredData,
    /// Synthesized from the loose score fields.
    ScoreFields,
    /// Placeholder carrying only the generated text.
    RawText,
}

/// One rung of the fallback chain: a guard and a constructor.
/// The constructor may still decline (e.g. unparsable JSON), which moves
/// resolution on to the next rung.
struct Tier {
    tier: ReconciliationTier,
    applies: fn(&InsightRecord) -> bool,
    build: fn(&InsightRecord) -> Option<StructuredInsight>,
}

const TIERS: [Tier; 3] = [
    Tier {
        tier: ReconciliationTier::StructuredData,
        applies: |r| non_empty(r.structured_data.as_deref()).is_some(),
        build: from_structured_data,
    },
    Tier {
        tier: ReconciliationTier::ScoreFields,
        applies: |r| {
            r.risk_score.is_some() || r.diversification_score.is_some() || r.goal_alignment.is_some()
        },
        build: from_score_fields,
    },
    Tier {
        tier: ReconciliationTier::RawText,
        applies: |r| non_empty(r.ai_generated_text.as_deref()).is_some(),
        build: from_raw_text,
    },
];

fn from_structured_data(record: &InsightRecord) -> Option<StructuredInsight> {
    let raw = non_empty(record.structured_data.as_deref())?;
    match serde_json::from_str::<StructuredInsight>(raw) {
        Ok(insight) => Some(insight),
        Err(e) => {
            warn!(insight_id = ?record.id, error = %e, "structuredData is malformed, falling back");
            None
        }
    }
}

fn from_score_fields(record: &InsightRecord) -> Option<StructuredInsight> {
    Some(StructuredInsight::with_scores(
        record.risk_score.unwrap_or(DEFAULT_RISK_SCORE),
        record.diversification_score.unwrap_or(DEFAULT_DIVERSIFICATION_SCORE),
        record.goal_alignment.unwrap_or(DEFAULT_GOAL_ALIGNMENT),
        record.ai_generated_text.clone().unwrap_or_default(),
    ))
}

fn from_raw_text(record: &InsightRecord) -> Option<StructuredInsight> {
    let text = non_empty(record.ai_generated_text.as_deref())?;
    Some(StructuredInsight::with_scores(
        DEFAULT_RISK_SCORE,
        DEFAULT_DIVERSIFICATION_SCORE,
        DEFAULT_GOAL_ALIGNMENT,
        text,
    ))
}

/// Normalizes insight records and derives the text artifacts shown with them.
///
/// Every operation here is pure and total: malformed input degrades to an
/// empty result, never to an error.
pub struct InsightReconciler;

impl InsightReconciler {
    pub fn new() -> Self {
        Self
    }

    /// Reconcile a record into a `StructuredInsight`, or `None` if it holds
    /// nothing usable.
    pub fn reconcile(&self, record: &InsightRecord) -> Option<StructuredInsight> {
        self.reconcile_with_tier(record).map(|(_, insight)| insight)
    }

    /// Like `reconcile`, also reporting which tier produced the result.
    pub fn reconcile_with_tier(
        &self,
        record: &InsightRecord,
    ) -> Option<(ReconciliationTier, StructuredInsight)> {
        let resolved = TIERS
            .iter()
            .filter(|t| (t.applies)(record))
            .find_map(|t| (t.build)(record).map(|insight| (t.tier, insight)));
        match &resolved {
            Some((tier, _)) => debug!(insight_id = ?record.id, ?tier, "insight reconciled"),
            None => debug!(insight_id = ?record.id, "insight has no structured form"),
        }
        resolved
    }

    /// Sort newest first by comparing `createdAt` as plain strings.
    pub fn sort_newest_first(&self, records: &mut [InsightRecord]) {
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }

    /// Sort records and reconcile each exactly once.
    pub fn prepare(&self, mut records: Vec<InsightRecord>) -> Vec<InsightEntry> {
        self.sort_newest_first(&mut records);
        records
            .into_iter()
            .map(|record| self.entry(record))
            .collect()
    }

    /// Pair a single record with its reconciled form.
    pub fn entry(&self, record: InsightRecord) -> InsightEntry {
        let structured = self.reconcile(&record);
        InsightEntry { record, structured }
    }

    // ── Score adjustments ───────────────────────────────────────────

    /// Read the `scoreAdjustments` block out of a serialized structured insight.
    pub fn extract_adjustments(&self, structured_data: Option<&str>) -> Vec<ScoreAdjustment> {
        let Some(raw) = non_empty(structured_data) else {
            return Vec::new();
        };
        let parsed: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                debug!(error = %e, "cannot read score adjustments");
                return Vec::new();
            }
        };
        parsed
            .get("scoreAdjustments")
            .and_then(Value::as_object)
            .map(adjustments_from)
            .unwrap_or_default()
    }

    /// Score adjustments of an already reconciled insight.
    pub fn adjustments_of(&self, insight: &StructuredInsight) -> Vec<ScoreAdjustment> {
        let map: Map<String, Value> = insight
            .score_adjustments
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        adjustments_from(&map)
    }

    // ── Debug report ────────────────────────────────────────────────

    /// Render the generator's diagnostics as a plain-text report.
    ///
    /// Subsections whose data is missing are left out.
    pub fn format_debug_report(&self, debug_info: Option<&str>, raw_text: Option<&str>) -> String {
        let info = non_empty(debug_info)
            .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
            .filter(Value::is_object);
        let Some(info) = info else {
            return "No debug information available".to_string();
        };

        let mut out = String::from("=== DEBUG INFORMATION ===\n\n");

        if let Some(stats) = info.get("portfolioStats").and_then(Value::as_object) {
            write_portfolio_stats(&mut out, stats);
        }

        write_scores(
            &mut out,
            "BASE MATHEMATICAL SCORES:",
            [
                info.get("baseRiskScore"),
                info.get("baseDiversificationScore"),
                info.get("baseGoalAlignmentScore"),
            ],
        );
        write_scores(
            &mut out,
            "FINAL AI-ENHANCED SCORES:",
            [
                info.get("finalRiskScore"),
                info.get("finalDiversificationScore"),
                info.get("finalGoalAlignmentScore"),
            ],
        );

        if let Some(adj) = info.get("aiAdjustments").and_then(Value::as_object) {
            let adjustments = adjustments_from(adj);
            if !adjustments.is_empty() {
                out.push_str("AI ADJUSTMENTS:\n");
                for a in adjustments {
                    let _ = writeln!(out, "{}: {} ({})", a.kind, a.adjustment, a.reasoning);
                }
                out.push('\n');
            }
        }

        if let Some(text) = non_empty(raw_text) {
            out.push_str("RAW AI GENERATED TEXT:\n");
            out.push_str("=====================================\n");
            out.push_str(text);
            out.push_str("\n=====================================\n");
        }

        out
    }

    // ── Recommendations ─────────────────────────────────────────────

    /// Advisory for a low-priority recommendation in a commonly important category.
    pub fn priority_advisory(&self, recommendation: &AssetRecommendation) -> Option<&'static str> {
        if !recommendation.priority.trim().eq_ignore_ascii_case("low") {
            return None;
        }
        let category = recommendation.category.to_lowercase();
        PRIORITY_ADVISORIES
            .iter()
            .find(|(keyword, _)| category.contains(keyword))
            .map(|(_, advisory)| *advisory)
    }

    /// Pull up to five action-oriented lines out of free text, in order.
    pub fn extract_action_items(&self, text: &str) -> Vec<String> {
        text.lines()
            .filter_map(|line| {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    return None;
                }
                let lower = trimmed.to_lowercase();
                if !ACTION_KEYWORDS.iter().any(|k| lower.contains(k)) {
                    return None;
                }
                let item = BULLET_PREFIX.replace(trimmed, "");
                let item = NUMBER_PREFIX.replace(&item, "");
                let item = item.trim();
                let len = item.chars().count();
                (len > MIN_ACTION_ITEM_LEN && len < MAX_ACTION_ITEM_LEN).then(|| item.to_string())
            })
            .take(MAX_ACTION_ITEMS)
            .collect()
    }

    // ── Sections ────────────────────────────────────────────────────

    /// Sections to show as tabs, in key order, without the asset recommendations block.
    pub fn tab_sections<'a>(&self, insight: &'a StructuredInsight) -> Vec<(&'a str, &'a InsightSection)> {
        insight
            .sections
            .iter()
            .filter(|(key, _)| key.as_str() != ASSET_RECOMMENDATIONS_SECTION)
            .map(|(key, section)| (key.as_str(), section))
            .collect()
    }

    /// Section-specific analysis text for `key`, or "" when there is none.
    pub fn section_analysis<'a>(&self, insight: &'a StructuredInsight, key: &str) -> &'a str {
        insight
            .section_specific_analysis
            .get(key)
            .map(String::as_str)
            .unwrap_or("")
    }

    // ── Timestamps ──────────────────────────────────────────────────

    /// Human-readable `createdAt`, e.g. `Jan 15, 2024, 9:33 AM`.
    ///
    /// Only strings with explicit offset markers (`Z` or `+`) are read as
    /// instants, and they are shown in their own offset. Anything else is
    /// read as a wall-clock time. Unparsable input is returned unchanged.
    pub fn display_timestamp(&self, created_at: &str) -> String {
        const FORMAT: &str = "%b %-d, %Y, %-I:%M %p";
        let raw = created_at.trim();
        if raw.is_empty() {
            return String::new();
        }
        if raw.contains('Z') || raw.contains('+') {
            return match DateTime::parse_from_rfc3339(raw) {
                Ok(dt) => dt.format(FORMAT).to_string(),
                Err(_) => created_at.to_string(),
            };
        }
        match NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
            Ok(dt) => dt.format(FORMAT).to_string(),
            Err(_) => created_at.to_string(),
        }
    }
}

impl Default for InsightReconciler {
    fn default() -> Self {
        Self::new()
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

fn adjustments_from(block: &Map<String, Value>) -> Vec<ScoreAdjustment> {
    AdjustmentKind::ALL
        .iter()
        .filter_map(|kind| {
            let entry = block.get(kind.wire_key())?.as_object()?;
            Some(ScoreAdjustment {
                kind: *kind,
                adjustment: value_text(entry.get("adjustment")),
                reasoning: value_text(entry.get("reasoning")),
            })
        })
        .collect()
}

/// Plain rendering of a JSON scalar; integers print without a fraction.
fn value_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.as_f64().map(|f| f.to_string()).unwrap_or_else(|| n.to_string()),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// en-US style grouping with at most three fraction digits: `1234567.891` → `1,234,567.891`.
fn format_grouped(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let rounded = format!("{:.3}", value.abs());
    let (int_part, frac_part) = rounded.split_once('.').unwrap_or((rounded.as_str(), ""));
    let frac = frac_part.trim_end_matches('0');

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let negative = value < 0.0 && (int_part != "0" || !frac.is_empty());
    let sign = if negative { "-" } else { "" };
    if frac.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{frac}")
    }
}

fn percent_of(part: f64, total: Option<f64>) -> f64 {
    match total {
        Some(t) if t > 0.0 => part / t * 100.0,
        _ => 0.0,
    }
}

fn write_portfolio_stats(out: &mut String, stats: &Map<String, Value>) {
    let total = number(stats.get("totalValue"));

    out.push_str("PORTFOLIO STATISTICS:\n");
    if let Some(t) = total {
        let _ = writeln!(out, "Total Value: ${}", format_grouped(t));
    }
    if let Some(v) = stats.get("holdingsCount") {
        let _ = writeln!(out, "Holdings Count: {}", value_text(Some(v)));
    }
    if let Some(v) = stats.get("clientRiskTolerance") {
        let _ = writeln!(out, "Client Risk Tolerance: {}", value_text(Some(v)));
    }
    if let Some(v) = stats.get("clientGoal") {
        let _ = writeln!(out, "Client Goal: {}", value_text(Some(v)));
    }
    if let Some(v) = stats.get("clientTimeHorizon") {
        let _ = writeln!(out, "Time Horizon: {} years", value_text(Some(v)));
    }
    out.push('\n');

    if let Some(sectors) = stats.get("sectorDistribution").and_then(Value::as_object) {
        out.push_str("SECTOR DISTRIBUTION:\n");
        let ordered: BTreeMap<&String, f64> = sectors
            .iter()
            .map(|(sector, v)| (sector, number(Some(v)).unwrap_or(0.0)))
            .collect();
        for (sector, value) in ordered {
            let _ = writeln!(
                out,
                "{sector}: ${} ({:.1}%)",
                format_grouped(value),
                percent_of(value, total)
            );
        }
        out.push('\n');
    }

    if let Some(holdings) = stats.get("topHoldings").and_then(Value::as_array) {
        let mut ranked: Vec<&Map<String, Value>> =
            holdings.iter().filter_map(Value::as_object).collect();
        ranked.sort_by(|a, b| {
            let va = number(a.get("value")).unwrap_or(0.0);
            let vb = number(b.get("value")).unwrap_or(0.0);
            vb.total_cmp(&va)
        });

        out.push_str("TOP 5 HOLDINGS:\n");
        for (index, holding) in ranked.iter().take(TOP_HOLDINGS_IN_REPORT).enumerate() {
            let value = number(holding.get("value")).unwrap_or(0.0);
            let pct = number(holding.get("percentage")).unwrap_or_else(|| percent_of(value, total));
            let _ = writeln!(
                out,
                "{}. {} ({})",
                index + 1,
                value_text(holding.get("symbol")),
                value_text(holding.get("sector"))
            );
            let _ = writeln!(
                out,
                "   Shares: {}",
                format_grouped(number(holding.get("shares")).unwrap_or(0.0))
            );
            let _ = writeln!(out, "   Price: ${}", value_text(holding.get("pricePerShare")));
            let _ = writeln!(out, "   Value: ${} ({:.1}%)", format_grouped(value), pct);
        }
        out.push('\n');
    }
}

fn write_scores(out: &mut String, title: &str, [risk, diversification, goal]: [Option<&Value>; 3]) {
    if risk.is_none() && diversification.is_none() && goal.is_none() {
        return;
    }
    let show = |v: Option<&Value>| match v {
        Some(v) => value_text(Some(v)),
        None => "N/A".to_string(),
    };
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "Risk: {}/10", show(risk));
    let _ = writeln!(out, "Diversification: {}%", show(diversification));
    let _ = writeln!(out, "Goal Alignment: {}%", show(goal));
    out.push('\n');
}
