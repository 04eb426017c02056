//! Schema validation of the raw LLM response.
//!
//! Two passes. The presence check walks [`REQUIRED_KEYS`] in order and fails
//! on the first absent key, so the error always names the same key for the
//! same response. Typed deserialisation into [`ValidatedAnalysis`] then
//! rejects present-but-malformed values (a verdict outside the closed set, a
//! score that is not a number, a list that is a string).

use crate::error::LlmError;
use crate::model::ValidatedAnalysis;
use serde_json::Value;

/// Top-level keys every analysis must carry, in check order.
pub const REQUIRED_KEYS: [&str; 12] = [
    "company_overview",
    "business_summary",
    "financial_analysis",
    "financial_metrics",
    "key_strengths",
    "key_risks",
    "valuation_analysis",
    "profit_potential",
    "investment_recommendation",
    "scores",
    "final_verdict",
    "final_comment",
];

/// Fail with [`LlmError::MissingKey`] naming the first absent required key.
///
/// A key explicitly set to `null` counts as present.
pub fn check_required_keys(raw: &Value) -> Result<(), LlmError> {
    let obj = raw.as_object().ok_or_else(|| {
        LlmError::InvalidShape(format!("expected a JSON object, got {}", kind_of(raw)))
    })?;
    match REQUIRED_KEYS.iter().find(|k| !obj.contains_key(**k)) {
        Some(key) => Err(LlmError::MissingKey(*key)),
        None => Ok(()),
    }
}

/// Presence check, then typed deserialisation.
pub fn validate(raw: Value) -> Result<ValidatedAnalysis, LlmError> {
    check_required_keys(&raw)?;
    serde_json::from_value(raw).map_err(|e| LlmError::InvalidShape(e.to_string()))
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Scores, Verdict};
    use serde_json::json;

    fn complete() -> Value {
        json!({
            "company_overview": "Widget maker.",
            "business_summary": "Makes widgets.",
            "financial_analysis": "Revenue grew.",
            "financial_metrics": {"yearly_data": [], "total_revenue": 10.0},
            "key_strengths": ["brand"],
            "key_risks": ["competition"],
            "valuation_analysis": "Fair.",
            "profit_potential": "Moderate.",
            "investment_recommendation": "Apply for listing gains.",
            "scores": {
                "financial_strength": 7,
                "valuation_comfort": 6,
                "promoter_quality": 8,
                "demand_strength": 5
            },
            "final_verdict": "apply",
            "final_comment": "Reasonable risk-reward."
        })
    }

    #[test]
    fn each_missing_key_is_named() {
        for key in REQUIRED_KEYS {
            let mut v = complete();
            v.as_object_mut().unwrap().remove(key);
            match check_required_keys(&v) {
                Err(LlmError::MissingKey(k)) => assert_eq!(k, key),
                other => panic!("removing {key}: expected MissingKey, got {other:?}"),
            }
        }
    }

    #[test]
    fn first_missing_key_in_order_wins() {
        let mut v = complete();
        let obj = v.as_object_mut().unwrap();
        obj.remove("final_comment");
        obj.remove("key_risks");
        assert!(matches!(
            check_required_keys(&v),
            Err(LlmError::MissingKey("key_risks"))
        ));
    }

    #[test]
    fn non_object_rejected() {
        assert!(matches!(
            check_required_keys(&json!([1, 2])),
            Err(LlmError::InvalidShape(_))
        ));
    }

    #[test]
    fn complete_response_validates() {
        let a = validate(complete()).unwrap();
        assert_eq!(a.final_verdict, Verdict::Apply);
        assert_eq!(a.scores, Scores::new(7, 6, 8, 5));
        assert_eq!(a.key_strengths, vec!["brand".to_string()]);
    }

    #[test]
    fn null_metrics_are_present() {
        let mut v = complete();
        v["financial_metrics"] = Value::Null;
        let a = validate(v).unwrap();
        assert!(a.financial_metrics.is_none());
    }

    #[test]
    fn unknown_verdict_is_invalid_shape() {
        let mut v = complete();
        v["final_verdict"] = json!("strong buy");
        match validate(v) {
            Err(LlmError::InvalidShape(msg)) => assert!(msg.contains("strong buy"), "{msg}"),
            other => panic!("expected InvalidShape, got {other:?}"),
        }
    }

    #[test]
    fn wrong_list_type_is_invalid_shape() {
        let mut v = complete();
        v["key_risks"] = json!("competition");
        assert!(matches!(validate(v), Err(LlmError::InvalidShape(_))));
    }

    #[test]
    fn fractional_score_is_invalid_shape() {
        let mut v = complete();
        v["scores"] = json!({
            "financial_strength": 3.6,
            "valuation_comfort": 3.6,
            "promoter_quality": 3.6,
            "demand_strength": 3.6
        });
        match validate(v) {
            Err(LlmError::InvalidShape(msg)) => assert!(msg.contains("whole number"), "{msg}"),
            other => panic!("expected InvalidShape, got {other:?}"),
        }
    }

    #[test]
    fn huge_score_is_invalid_shape() {
        let mut v = complete();
        v["scores"]["financial_strength"] = json!(9e18);
        assert!(matches!(validate(v), Err(LlmError::InvalidShape(_))));
    }

    #[test]
    fn extra_keys_are_ignored() {
        let mut v = complete();
        v["disclaimer"] = json!("not advice");
        assert!(validate(v).is_ok());
    }
}
