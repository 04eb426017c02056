//! Prompts for LLM-based prospectus analysis.
//!
//! Every prompt the crate sends lives here, so a change to the analyst's
//! instructions or to the expected JSON schema is made in exactly one place
//! and unit tests can inspect prompts without contacting a provider.
//!
//! The schema embedded in [`ANALYSIS_SCHEMA_EXAMPLE`] must stay in sync with
//! [`crate::model::AnalysisResult`] and
//! [`crate::pipeline::validate::REQUIRED_KEYS`].

use crate::model::AnalysisInputs;

/// System-role text sent by chat-style providers (Groq, OpenAI).
pub const ANALYST_SYSTEM_PROMPT: &str = "You are a precise IPO analyst.";

/// Prefix for providers without a system role (Gemini).
pub const JSON_ONLY_PREAMBLE: &str =
    "You are a precise IPO analyst. Respond with valid JSON only, no markdown formatting.";

const ANALYST_INSTRUCTIONS: &str = r#"You are an experienced IPO equity analyst. Provide balanced, comprehensive analysis for investment decision-making.

IMPORTANT INSTRUCTIONS:
- Perform thorough analysis considering BOTH strengths AND weaknesses
- Evaluate opportunities and growth potential alongside risks
- Provide balanced verdicts: not every IPO should be "avoid"
- Consider market conditions, sector trends, and company fundamentals
- Give scores that reflect realistic assessment (not overly pessimistic)
- Only recommend "avoid" if there are CRITICAL red flags or severe concerns
- Consider "apply" or "high-risk-apply" for companies with reasonable prospects

You are given:
1) RHP text (may be imperfect OCR, do your best).
2) Basic IPO data: issue price, grey market premium (GMP), subscription data.

Analysis Guidelines:
- Be realistic and balanced, not overly conservative
- Highlight both strengths AND risks clearly
- Provide actionable insights for investors
- Consider long-term growth potential
- Assess management quality and market opportunity
- Evaluate if valuation offers reasonable entry point"#;

const ANALYSIS_TASKS: &str = r#"Tasks:
1. company_overview: Brief overview of the company, its sector, market position, and growth potential (3-4 lines).
2. business_summary: Concise business model, operations, and market opportunity (4-5 lines).
3. financial_analysis: Detailed analysis of:
   - Revenue trend (growth/decline) and trajectory
   - Profit trend (net income, margins, profitability)
   - Debt/leverage levels and financial health
   - Cash flow health and capital efficiency
   - Growth prospects and market expansion
4. financial_metrics: Extract and structure YEARLY financial data (CRITICAL):
   - For each year available, provide: year, revenue (in millions), profit (in millions), loss (in millions), profit margin (%), revenue growth rate (%)
   - Calculate: total_revenue, total_profit, total_loss, avg_margin
   - Identify: revenue_growth_trend ("increasing", "decreasing", "stable"), profitability_trend ("improving", "declining", "stable")
   - Return as array of yearly objects with these exact fields
5. key_strengths: List 4-5 main strengths and competitive advantages (as array of strings).
6. key_risks: List 5-6 main risks/concerns and mitigation factors (as array of strings).
7. valuation_analysis: Is the IPO fairly valued? Consider market comparables, growth potential, and entry point (3-4 lines).
8. profit_potential: Will investors likely make profit? Analyze short-term listing gains and long-term value creation (3-4 lines).
9. investment_recommendation: Clear recommendation with reasoning. Consider risk-reward ratio and investor profile (3-4 lines).
10. Give scores (0-10) for:
   - financial_strength (based on revenue, profitability, debt levels)
   - valuation_comfort (is price reasonable for growth prospects?)
   - promoter_quality (track record, experience, alignment with investors)
   - demand_strength (market demand, subscription interest, sector appeal)
11. Give a final_verdict:
    - "apply" (good investment with reasonable risk-reward)
    - "high-risk-apply" (risky but significant upside potential)
    - "avoid" (only if critical red flags or severe concerns exist)
12. Give a final_comment (2-4 lines) explaining your verdict and key considerations.

SCORING GUIDANCE:
- Scores should reflect balanced assessment (not all 1-3)
- Strong fundamentals: 7-9
- Moderate fundamentals: 4-6
- Only use 1-2 for severe issues"#;

/// The response schema, given to the model by example.
pub const ANALYSIS_SCHEMA_EXAMPLE: &str = r#"{
  "company_overview": "...",
  "business_summary": "...",
  "financial_analysis": "...",
  "financial_metrics": {
    "yearly_data": [
      {"year": "2021", "revenue": 100.5, "profit": 15.2, "loss": 0, "margin": 15.1, "growth_rate": 0},
      {"year": "2022", "revenue": 125.3, "profit": 22.5, "loss": 0, "margin": 17.9, "growth_rate": 24.8},
      {"year": "2023", "revenue": 156.8, "profit": 31.2, "loss": 0, "margin": 19.9, "growth_rate": 25.1}
    ],
    "total_revenue": 382.6,
    "total_profit": 68.9,
    "total_loss": 0,
    "avg_margin": 17.6,
    "revenue_growth_trend": "increasing",
    "profitability_trend": "improving"
  },
  "key_strengths": ["strength1", "strength2", "strength3", "strength4", "strength5"],
  "key_risks": ["risk1", "risk2", "risk3", "risk4", "risk5", "risk6"],
  "valuation_analysis": "...",
  "profit_potential": "...",
  "investment_recommendation": "...",
  "scores": {
    "financial_strength": 0,
    "valuation_comfort": 0,
    "promoter_quality": 0,
    "demand_strength": 0
  },
  "final_verdict": "apply",
  "final_comment": "..."
}"#;

/// Build the full analysis prompt.
///
/// The extracted text is embedded verbatim; nothing is truncated. Numbers are
/// rendered with `{:?}` so whole values keep their decimal point (`100.0`),
/// which reads unambiguously as a price to the model.
pub fn build_analysis_prompt(text: &str, inputs: &AnalysisInputs) -> String {
    format!(
        "{ANALYST_INSTRUCTIONS}\n\n\
         RHP TEXT (may be long, focus on business, financials, risks, opportunities):\n\
         {text}\n\n\
         IPO DATA:\n\
         - Issue Price: {:?}\n\
         - GMP (may be 0 if not applicable): {:?}\n\
         - Subscription (Retail): {:?}x\n\
         - Subscription (NII): {:?}x\n\
         - Subscription (QIB): {:?}x\n\n\
         {ANALYSIS_TASKS}\n\n\
         Return ONLY valid JSON in this EXACT schema:\n\n\
         {ANALYSIS_SCHEMA_EXAMPLE}",
        inputs.issue_price, inputs.gmp, inputs.sub_retail, inputs.sub_nii, inputs.sub_qib,
    )
}
