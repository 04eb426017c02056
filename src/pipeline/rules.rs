//! Deterministic post-adjustment of the model's scores and verdict.
//!
//! The model sometimes contradicts its own narrative: it writes three
//! paragraphs about falling revenue and then scores financial strength 8, or
//! recommends "apply" with a handful of 1s and 2s. These rules pull such
//! outputs back in line. They run in a fixed order, never fail, and only ever
//! move a verdict towards [`Verdict::Avoid`].
//!
//! Each rule lives in its own function so it can be tested in isolation.
//! Running the rules twice is a no-op on the second pass.

use crate::model::{AnalysisInputs, ValidatedAnalysis, Verdict};
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// Occurrences of decline language at or above which financial strength is capped.
pub const DECLINE_MENTION_THRESHOLD: usize = 3;
/// Financial strength range enforced by the decline cap.
pub const DECLINE_CAP_FLOOR: i64 = 2;
pub const DECLINE_CAP_CEILING: i64 = 5;
/// QIB subscription (×) below which institutional demand is considered absent.
pub const LOW_QIB_THRESHOLD: f64 = 0.5;
/// Mean score below which a low-QIB "apply" is downgraded.
pub const LOW_QIB_MEAN_SCORE: f64 = 4.0;
/// A score at or below this value counts as weak.
pub const WEAK_SCORE: i64 = 2;
/// Weak scores needed to downgrade an "apply".
pub const WEAK_SCORE_COUNT: usize = 3;

/// One change the rule layer made.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Adjustment {
    /// Rule 1: financial strength clamped into `[2, 5]`.
    FinancialStrengthCapped {
        mentions: usize,
        from: i64,
        to: i64,
    },
    /// Rule 2: "apply" downgraded on weak institutional demand.
    LowQibDowngrade { sub_qib: f64, mean_score: f64 },
    /// Rule 3: "apply" downgraded on several very low scores.
    WeakScoresDowngrade { weak_scores: usize },
}

impl fmt::Display for Adjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Adjustment::FinancialStrengthCapped { mentions, from, to } => write!(
                f,
                "financial_strength {from} → {to} ({mentions} decline mentions)"
            ),
            Adjustment::LowQibDowngrade {
                sub_qib,
                mean_score,
            } => write!(
                f,
                "apply → high-risk-apply (QIB {sub_qib}x, mean score {mean_score:.2})"
            ),
            Adjustment::WeakScoresDowngrade { weak_scores } => write!(
                f,
                "apply → high-risk-apply ({weak_scores} scores ≤ {WEAK_SCORE})"
            ),
        }
    }
}

/// Apply every rule in order, mutating `scores` and `final_verdict` in place.
///
/// Returns the adjustments actually made; an empty list means the model's
/// output was left as-is.
pub fn apply_rules(analysis: &mut ValidatedAnalysis, inputs: &AnalysisInputs) -> Vec<Adjustment> {
    let mut applied = Vec::new();

    // ── Rule 1: decline-heavy narrative caps financial strength ──────────
    if let Some(adj) = cap_financial_strength(analysis) {
        applied.push(adj);
    }

    // ── Rule 2: low institutional demand ─────────────────────────────────
    if let Some(adj) = downgrade_on_low_qib(analysis, inputs) {
        applied.push(adj);
    }

    // ── Rule 3: several very weak scores ─────────────────────────────────
    if let Some(adj) = downgrade_on_weak_scores(analysis) {
        applied.push(adj);
    }

    // ── Rule 4: high-risk retention ──────────────────────────────────────
    retain_high_risk(analysis);

    for adj in &applied {
        debug!(adjustment = %adj, "rule applied");
    }
    applied
}

/// Count decline language in the lower-cased narrative.
///
/// "declining" also contains "decline", so it is counted twice.
pub fn decline_mentions(financial_analysis: &str) -> usize {
    let lower = financial_analysis.to_lowercase();
    lower.matches("decline").count() + lower.matches("declining").count()
}

fn cap_financial_strength(analysis: &mut ValidatedAnalysis) -> Option<Adjustment> {
    let mentions = decline_mentions(&analysis.financial_analysis);
    if mentions < DECLINE_MENTION_THRESHOLD {
        return None;
    }
    let from = analysis.scores.financial_strength;
    let to = from.clamp(DECLINE_CAP_FLOOR, DECLINE_CAP_CEILING);
    if to == from {
        return None;
    }
    analysis.scores.financial_strength = to;
    Some(Adjustment::FinancialStrengthCapped { mentions, from, to })
}

fn downgrade_on_low_qib(
    analysis: &mut ValidatedAnalysis,
    inputs: &AnalysisInputs,
) -> Option<Adjustment> {
    if inputs.sub_qib >= LOW_QIB_THRESHOLD || analysis.final_verdict != Verdict::Apply {
        return None;
    }
    let mean_score = analysis.scores.mean();
    if mean_score >= LOW_QIB_MEAN_SCORE {
        return None;
    }
    analysis.final_verdict = Verdict::HighRiskApply;
    Some(Adjustment::LowQibDowngrade {
        sub_qib: inputs.sub_qib,
        mean_score,
    })
}

fn downgrade_on_weak_scores(analysis: &mut ValidatedAnalysis) -> Option<Adjustment> {
    if analysis.final_verdict != Verdict::Apply {
        return None;
    }
    let weak_scores = analysis
        .scores
        .values()
        .iter()
        .filter(|&&s| s <= WEAK_SCORE)
        .count();
    if weak_scores < WEAK_SCORE_COUNT {
        return None;
    }
    analysis.final_verdict = Verdict::HighRiskApply;
    Some(Adjustment::WeakScoresDowngrade { weak_scores })
}

/// A high-risk-apply without critical language and with at least one
/// strength stays as it is. Never changes anything.
fn retain_high_risk(analysis: &ValidatedAnalysis) {
    if analysis.final_verdict != Verdict::HighRiskApply {
        return;
    }
    let lower = analysis.financial_analysis.to_lowercase();
    let critical = lower.matches("critical").count() + lower.matches("severe").count();
    if critical == 0 && !analysis.key_strengths.is_empty() {
        debug!(
            strengths = analysis.key_strengths.len(),
            "high-risk-apply retained: no critical issues mentioned"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Scores;

    fn analysis(narrative: &str, scores: Scores, verdict: Verdict) -> ValidatedAnalysis {
        ValidatedAnalysis {
            company_overview: String::new(),
            business_summary: String::new(),
            financial_analysis: narrative.to_string(),
            financial_metrics: None,
            key_strengths: vec!["market leader".into()],
            key_risks: vec![],
            valuation_analysis: String::new(),
            profit_potential: String::new(),
            investment_recommendation: String::new(),
            scores,
            final_verdict: verdict,
            final_comment: String::new(),
        }
    }

    fn healthy_qib() -> AnalysisInputs {
        AnalysisInputs::default().with_subscription(2.0, 5.0, 20.0)
    }

    const DECLINE_HEAVY: &str = "Revenue decline in FY22, further decline in FY23, margins decline.";

    #[test]
    fn decline_cap_table() {
        for (fs, expected) in [(0, 2), (1, 2), (5, 5), (8, 5), (10, 5)] {
            let mut a = analysis(DECLINE_HEAVY, Scores::new(fs, 6, 6, 6), Verdict::Avoid);
            apply_rules(&mut a, &healthy_qib());
            assert_eq!(a.scores.financial_strength, expected, "fs={fs}");
        }
    }

    #[test]
    fn two_mentions_leave_score_alone() {
        let mut a = analysis(
            "A decline in FY22 and a decline in FY23.",
            Scores::new(9, 6, 6, 6),
            Verdict::Apply,
        );
        let adj = apply_rules(&mut a, &healthy_qib());
        assert_eq!(a.scores.financial_strength, 9);
        assert!(adj.is_empty());
    }

    #[test]
    fn declining_counts_twice() {
        assert_eq!(decline_mentions("Declining margins"), 2);
        assert_eq!(decline_mentions("DECLINE, declining"), 3);
        assert_eq!(decline_mentions("stable growth"), 0);
    }

    #[test]
    fn decline_cap_reports_adjustment() {
        let mut a = analysis(DECLINE_HEAVY, Scores::new(8, 6, 6, 6), Verdict::Avoid);
        let adj = apply_rules(&mut a, &healthy_qib());
        assert_eq!(
            adj,
            vec![Adjustment::FinancialStrengthCapped {
                mentions: 3,
                from: 8,
                to: 5
            }]
        );
    }

    #[test]
    fn low_qib_with_weak_mean_downgrades_apply() {
        let mut a = analysis("", Scores::new(3, 3, 4, 3), Verdict::Apply);
        let inputs = AnalysisInputs::default().with_subscription(1.0, 1.0, 0.3);
        let adj = apply_rules(&mut a, &inputs);
        assert_eq!(a.final_verdict, Verdict::HighRiskApply);
        assert!(matches!(adj[0], Adjustment::LowQibDowngrade { mean_score, .. } if mean_score == 3.25));
    }

    #[test]
    fn low_qib_with_decent_mean_keeps_apply() {
        let mut a = analysis("", Scores::new(5, 4, 4, 4), Verdict::Apply);
        let inputs = AnalysisInputs::default().with_subscription(1.0, 1.0, 0.3);
        apply_rules(&mut a, &inputs);
        assert_eq!(a.final_verdict, Verdict::Apply);
    }

    #[test]
    fn qib_at_threshold_is_not_low() {
        let mut a = analysis("", Scores::new(1, 1, 1, 1), Verdict::Apply);
        let inputs = AnalysisInputs::default().with_subscription(0.0, 0.0, 0.5);
        let adj = apply_rules(&mut a, &inputs);
        // Rule 3 still fires on the weak scores.
        assert_eq!(a.final_verdict, Verdict::HighRiskApply);
        assert_eq!(adj, vec![Adjustment::WeakScoresDowngrade { weak_scores: 4 }]);
    }

    #[test]
    fn three_weak_scores_downgrade_apply() {
        let mut a = analysis("", Scores::new(2, 1, 2, 9), Verdict::Apply);
        apply_rules(&mut a, &healthy_qib());
        assert_eq!(a.final_verdict, Verdict::HighRiskApply);
    }

    #[test]
    fn two_weak_scores_keep_apply() {
        let mut a = analysis("", Scores::new(2, 1, 7, 9), Verdict::Apply);
        apply_rules(&mut a, &healthy_qib());
        assert_eq!(a.final_verdict, Verdict::Apply);
    }

    #[test]
    fn all_twos_with_no_qib_downgrade_apply() {
        let mut a = analysis("", Scores::new(2, 2, 2, 2), Verdict::Apply);
        let inputs = AnalysisInputs::default().with_subscription(0.0, 0.0, 0.2);
        let adj = apply_rules(&mut a, &inputs);
        assert_eq!(a.final_verdict, Verdict::HighRiskApply);
        assert_eq!(
            adj,
            vec![Adjustment::LowQibDowngrade {
                sub_qib: 0.2,
                mean_score: 2.0
            }]
        );
    }

    #[test]
    fn all_eights_with_no_qib_keep_apply() {
        let mut a = analysis("", Scores::new(8, 8, 8, 8), Verdict::Apply);
        let inputs = AnalysisInputs::default().with_subscription(0.0, 0.0, 0.2);
        let adj = apply_rules(&mut a, &inputs);
        assert_eq!(a.final_verdict, Verdict::Apply);
        assert!(adj.is_empty());
    }

    #[test]
    fn three_ones_downgrade_apply() {
        let mut a = analysis("", Scores::new(1, 1, 1, 9), Verdict::Apply);
        let adj = apply_rules(&mut a, &healthy_qib());
        assert_eq!(a.final_verdict, Verdict::HighRiskApply);
        assert_eq!(adj, vec![Adjustment::WeakScoresDowngrade { weak_scores: 3 }]);
    }

    #[test]
    fn two_ones_keep_apply() {
        let mut a = analysis("", Scores::new(1, 1, 5, 9), Verdict::Apply);
        apply_rules(&mut a, &healthy_qib());
        assert_eq!(a.final_verdict, Verdict::Apply);
    }

    #[test]
    fn extreme_scores_with_no_qib_do_not_panic() {
        let big = i64::MAX;
        let mut a = analysis(DECLINE_HEAVY, Scores::new(big, big, big, big), Verdict::Apply);
        let adj = apply_rules(&mut a, &AnalysisInputs::default());
        assert_eq!(a.scores.financial_strength, DECLINE_CAP_CEILING);
        assert_eq!(a.final_verdict, Verdict::Apply);
        assert_eq!(adj.len(), 1);
    }

    #[test]
    fn verdicts_are_never_promoted() {
        for verdict in [Verdict::Apply, Verdict::HighRiskApply, Verdict::Avoid] {
            for scores in [Scores::new(0, 0, 0, 0), Scores::new(10, 10, 10, 10)] {
                let mut a = analysis(DECLINE_HEAVY, scores, verdict);
                apply_rules(&mut a, &AnalysisInputs::default());
                assert!(a.final_verdict >= verdict);
            }
        }
    }

    #[test]
    fn high_risk_apply_is_retained() {
        let mut a = analysis("steady", Scores::new(1, 1, 1, 1), Verdict::HighRiskApply);
        let adj = apply_rules(&mut a, &AnalysisInputs::default());
        assert_eq!(a.final_verdict, Verdict::HighRiskApply);
        assert!(adj.is_empty());

        let mut b = analysis("severe issues", Scores::new(1, 1, 1, 1), Verdict::HighRiskApply);
        apply_rules(&mut b, &AnalysisInputs::default());
        assert_eq!(b.final_verdict, Verdict::HighRiskApply);
    }

    #[test]
    fn rules_are_idempotent() {
        let inputs = AnalysisInputs::default().with_subscription(0.1, 0.1, 0.1);
        for scores in [
            Scores::new(0, 0, 0, 0),
            Scores::new(9, 3, 2, 1),
            Scores::new(10, 10, 10, 10),
        ] {
            let mut once = analysis(DECLINE_HEAVY, scores, Verdict::Apply);
            apply_rules(&mut once, &inputs);
            let mut twice = once.clone();
            let second = apply_rules(&mut twice, &inputs);
            assert_eq!(once, twice);
            assert!(second.is_empty(), "second pass changed {second:?}");
        }
    }
}
