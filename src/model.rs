//! Data model: analysis inputs, the validated LLM analysis, and the result
//! returned to callers.
//!
//! The LLM response is adversarial input. Numeric fields inside
//! `financial_metrics` are deserialised leniently (numbers, numeric strings
//! and `null` are all accepted) because models routinely quote numbers or
//! leave gaps; everything else is strict so a malformed response fails
//! validation instead of flowing downstream.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

// ── Inputs ───────────────────────────────────────────────────────────────

/// Numeric market data embedded in the prompt and read by the rule layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisInputs {
    /// Issue price per share.
    pub issue_price: f64,
    /// Grey market premium; 0 when not applicable.
    pub gmp: f64,
    /// Retail subscription multiple (×).
    pub sub_retail: f64,
    /// Non-institutional subscription multiple (×).
    pub sub_nii: f64,
    /// Qualified-institutional subscription multiple (×).
    pub sub_qib: f64,
}

impl Default for AnalysisInputs {
    fn default() -> Self {
        Self {
            issue_price: 100.0,
            gmp: 0.0,
            sub_retail: 0.0,
            sub_nii: 0.0,
            sub_qib: 0.0,
        }
    }
}

impl AnalysisInputs {
    pub fn with_issue_price(mut self, v: f64) -> Self {
        self.issue_price = v;
        self
    }

    pub fn with_gmp(mut self, v: f64) -> Self {
        self.gmp = v;
        self
    }

    pub fn with_subscription(mut self, retail: f64, nii: f64, qib: f64) -> Self {
        self.sub_retail = retail;
        self.sub_nii = nii;
        self.sub_qib = qib;
        self
    }
}

// ── Extraction output ────────────────────────────────────────────────────

/// Plain text pulled out of a PDF, one `\n`-terminated block per page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractedText {
    pub text: String,
    pub total_pages: usize,
    pub pages_read: usize,
}

impl ExtractedText {
    /// True when the document yielded nothing but whitespace.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

// ── Verdict ──────────────────────────────────────────────────────────────

/// Closed-set recommendation label.
///
/// Ordered from most to least favourable; the rule layer only ever moves a
/// verdict towards [`Verdict::Avoid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    Apply,
    HighRiskApply,
    Avoid,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Apply => "apply",
            Verdict::HighRiskApply => "high-risk-apply",
            Verdict::Avoid => "avoid",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "apply" => Ok(Verdict::Apply),
            "high-risk-apply" => Ok(Verdict::HighRiskApply),
            "avoid" => Ok(Verdict::Avoid),
            other => Err(format!(
                "unknown verdict '{other}' (expected apply, high-risk-apply or avoid)"
            )),
        }
    }
}

impl<'de> Deserialize<'de> for Verdict {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(de::Error::custom)
    }
}

// ── Scores ───────────────────────────────────────────────────────────────

/// The four 0–10 scores. The range is nominal; only the rule layer clamps.
///
/// Deserialisation accepts whole numbers, possibly quoted or written as
/// `7.0`; fractional or absurdly large values are rejected, never rounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scores {
    #[serde(deserialize_with = "integer_like")]
    pub financial_strength: i64,
    #[serde(deserialize_with = "integer_like")]
    pub valuation_comfort: i64,
    #[serde(deserialize_with = "integer_like")]
    pub promoter_quality: i64,
    #[serde(deserialize_with = "integer_like")]
    pub demand_strength: i64,
}

impl Scores {
    pub fn new(financial: i64, valuation: i64, promoter: i64, demand: i64) -> Self {
        Self {
            financial_strength: financial,
            valuation_comfort: valuation,
            promoter_quality: promoter,
            demand_strength: demand,
        }
    }

    pub fn values(&self) -> [i64; 4] {
        [
            self.financial_strength,
            self.valuation_comfort,
            self.promoter_quality,
            self.demand_strength,
        ]
    }

    /// Arithmetic mean of the four scores.
    pub fn mean(&self) -> f64 {
        self.values().iter().map(|&v| v as f64).sum::<f64>() / 4.0
    }
}

// ── Financial metrics ────────────────────────────────────────────────────

/// One year of LLM-asserted financials.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinancialYear {
    #[serde(deserialize_with = "lenient_string")]
    pub year: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub revenue: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub profit: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub loss: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub margin: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub growth_rate: f64,
}

/// Per-year records plus aggregate totals and two trend labels.
///
/// Entirely model-asserted: totals are not cross-checked against the yearly
/// records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinancialMetrics {
    pub yearly_data: Vec<FinancialYear>,
    #[serde(deserialize_with = "lenient_f64")]
    pub total_revenue: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub total_profit: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub total_loss: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub avg_margin: f64,
    /// "increasing", "decreasing" or "stable".
    #[serde(deserialize_with = "lenient_string")]
    pub revenue_growth_trend: String,
    /// "improving", "declining" or "stable".
    #[serde(deserialize_with = "lenient_string")]
    pub profitability_trend: String,
}

// ── Validated analysis & result ──────────────────────────────────────────

/// LLM output after the required-key check and typed deserialisation.
///
/// This is what the rule layer mutates.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ValidatedAnalysis {
    pub company_overview: String,
    pub business_summary: String,
    pub financial_analysis: String,
    /// Present but possibly `null`; the assembler substitutes an empty value.
    pub financial_metrics: Option<FinancialMetrics>,
    pub key_strengths: Vec<String>,
    pub key_risks: Vec<String>,
    pub valuation_analysis: String,
    pub profit_potential: String,
    pub investment_recommendation: String,
    pub scores: Scores,
    pub final_verdict: Verdict,
    pub final_comment: String,
}

/// The externally visible analysis, field-for-field the JSON schema the
/// model was asked to produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub company_overview: String,
    pub business_summary: String,
    pub financial_analysis: String,
    pub financial_metrics: FinancialMetrics,
    pub key_strengths: Vec<String>,
    pub key_risks: Vec<String>,
    pub valuation_analysis: String,
    pub profit_potential: String,
    pub investment_recommendation: String,
    pub scores: Scores,
    pub final_verdict: Verdict,
    pub final_comment: String,
}

// ── Lenient field deserialisers ──────────────────────────────────────────

fn number_from_str(s: &str) -> Option<f64> {
    s.trim()
        .trim_end_matches('%')
        .replace(',', "")
        .trim()
        .parse::<f64>()
        .ok()
}

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(0.0),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| de::Error::custom("number out of range")),
        Value::String(s) if s.trim().is_empty() => Ok(0.0),
        Value::String(s) => number_from_str(&s)
            .ok_or_else(|| de::Error::custom(format!("expected a number, got {s:?}"))),
        other => Err(de::Error::custom(format!("expected a number, got {other}"))),
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(de::Error::custom(format!("expected a string, got {other}"))),
    }
}

/// Largest score magnitude accepted from the model; anything beyond is noise.
const MAX_SCORE_MAGNITUDE: f64 = 1_000_000.0;

fn integer_like<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    let v = match Value::deserialize(d)? {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| de::Error::custom("score out of range"))?,
        Value::String(s) => number_from_str(&s)
            .ok_or_else(|| de::Error::custom(format!("expected a score, got {s:?}")))?,
        other => return Err(de::Error::custom(format!("expected a score, got {other}"))),
    };
    if !v.is_finite() || v.abs() > MAX_SCORE_MAGNITUDE {
        return Err(de::Error::custom(format!("score out of range: {v}")));
    }
    if v.fract() != 0.0 {
        return Err(de::Error::custom(format!("score must be a whole number, got {v}")));
    }
    Ok(v as i64)
}
