//! Shape the validated, rule-adjusted analysis into the public result.

use crate::model::{AnalysisResult, ValidatedAnalysis};

/// Field-for-field move. A `null` `financial_metrics` becomes the empty
/// default so consumers never see a missing object.
pub fn assemble(analysis: ValidatedAnalysis) -> AnalysisResult {
    AnalysisResult {
        company_overview: analysis.company_overview,
        business_summary: analysis.business_summary,
        financial_analysis: analysis.financial_analysis,
        financial_metrics: analysis.financial_metrics.unwrap_or_default(),
        key_strengths: analysis.key_strengths,
        key_risks: analysis.key_risks,
        valuation_analysis: analysis.valuation_analysis,
        profit_potential: analysis.profit_potential,
        investment_recommendation: analysis.investment_recommendation,
        scores: analysis.scores,
        final_verdict: analysis.final_verdict,
        final_comment: analysis.final_comment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FinancialMetrics, Scores, Verdict};
    use crate::pipeline::validate::REQUIRED_KEYS;

    fn validated(metrics: Option<FinancialMetrics>) -> ValidatedAnalysis {
        ValidatedAnalysis {
            company_overview: "overview".into(),
            business_summary: "summary".into(),
            financial_analysis: "analysis".into(),
            financial_metrics: metrics,
            key_strengths: vec!["s".into()],
            key_risks: vec!["r".into()],
            valuation_analysis: "valuation".into(),
            profit_potential: "potential".into(),
            investment_recommendation: "recommendation".into(),
            scores: Scores::new(1, 2, 3, 4),
            final_verdict: Verdict::HighRiskApply,
            final_comment: "comment".into(),
        }
    }

    #[test]
    fn null_metrics_become_default() {
        let r = assemble(validated(None));
        assert_eq!(r.financial_metrics, FinancialMetrics::default());
    }

    #[test]
    fn fields_carry_over() {
        let metrics = FinancialMetrics {
            total_revenue: 42.0,
            revenue_growth_trend: "increasing".into(),
            ..Default::default()
        };
        let r = assemble(validated(Some(metrics.clone())));
        assert_eq!(r.financial_metrics, metrics);
        assert_eq!(r.scores, Scores::new(1, 2, 3, 4));
        assert_eq!(r.final_verdict, Verdict::HighRiskApply);
        assert_eq!(r.final_comment, "comment");
    }

    #[test]
    fn serialises_exactly_the_schema_keys() {
        let v = serde_json::to_value(assemble(validated(None))).unwrap();
        let obj = v.as_object().unwrap();
        assert_eq!(obj.len(), REQUIRED_KEYS.len());
        for key in REQUIRED_KEYS {
            assert!(obj.contains_key(key), "missing {key}");
        }
        assert_eq!(v["final_verdict"], "high-risk-apply");
    }
}
