//! Contract analysis against the configured completion provider.

use super::aggregator::{self, CategoryResult};
use crate::config::Config;
use crate::models::{
    new_analysis_id, AnalysisStatus, CheckCategory, ContractAnalysis, ContractFlag,
    ContractScores, ContractType, FailedCheck, FlagSummary, ScoreOnlyResponse,
};
use crate::provider::prompts;
use crate::provider::{CompletionProvider, ProviderError};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

const DEFAULT_SCORE: u8 = 50;
const DEFAULT_SUMMARY: &str = "Analysis completed.";
const DEFAULT_QUICK_SUMMARY: &str = "Quick analysis completed.";

/// Errors that fail a whole analysis.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// No check category was requested.
    #[error("At least one check category is required")]
    NoChecks,

    /// Every provider call failed; carries the first failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl AnalysisError {
    /// Whether the failure comes from local misconfiguration.
    pub fn is_configuration(&self) -> bool {
        match self {
            AnalysisError::Provider(e) => e.is_configuration(),
            AnalysisError::NoChecks => false,
        }
    }
}

/// Limits applied by the analyzer.
#[derive(Debug, Clone, Copy)]
pub struct AnalyzerSettings {
    /// Characters of contract text sent for a full analysis.
    pub analysis_max_chars: usize,
    /// Characters of contract text sent for a quick score.
    pub quick_max_chars: usize,
    /// Provider calls in flight for one analysis.
    pub concurrency: usize,
}

impl AnalyzerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            analysis_max_chars: config.limits.analysis_max_chars,
            quick_max_chars: config.limits.quick_max_chars,
            concurrency: config.model.concurrency.max(1),
        }
    }
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Runs compliance checks through a completion provider.
pub struct ContractAnalyzer {
    provider: Arc<dyn CompletionProvider>,
    settings: AnalyzerSettings,
}

impl ContractAnalyzer {
    pub fn new(provider: Arc<dyn CompletionProvider>, settings: AnalyzerSettings) -> Self {
        Self { provider, settings }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Analyze a contract against each requested check.
    ///
    /// Checks run concurrently and are merged in request order. The analysis
    /// fails only if every check fails; otherwise failed checks are listed in
    /// `failed_checks`.
    pub async fn analyze(
        &self,
        contract_text: &str,
        contract_type: ContractType,
        language: &str,
        checks: &[CheckCategory],
    ) -> Result<ContractAnalysis, AnalysisError> {
        let start = Instant::now();
        let checks = normalize_checks(checks);
        if checks.is_empty() {
            return Err(AnalysisError::NoChecks);
        }

        let text = truncate_chars(contract_text, self.settings.analysis_max_chars);
        info!(
            "Analyzing {} contract ({} chars) for: {}",
            contract_type,
            text.chars().count(),
            checks
                .iter()
                .map(|c| c.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let answers: Vec<(CheckCategory, Result<String, ProviderError>)> =
            stream::iter(checks.iter().copied())
                .map(|check| {
                    let prompt = prompts::analysis_prompt(check, contract_type, language, text);
                    let provider = Arc::clone(&self.provider);
                    async move {
                        let answer = provider
                            .complete(prompts::system_prompt(check), &prompt)
                            .await;
                        (check, answer)
                    }
                })
                .buffered(self.settings.concurrency)
                .collect()
                .await;

        let mut results = Vec::new();
        let mut failed_checks = Vec::new();
        let mut first_error = None;
        for (check, answer) in answers {
            match answer {
                Ok(raw) => {
                    debug!("{} check returned {} chars", check, raw.len());
                    results.push(parse_category(check, &extract_json(&raw)));
                }
                Err(e) => {
                    warn!("{} check failed: {}", check, e);
                    failed_checks.push(FailedCheck {
                        check,
                        error: e.to_string(),
                    });
                    first_error.get_or_insert(e);
                }
            }
        }

        if results.is_empty() {
            if let Some(e) = first_error {
                return Err(AnalysisError::Provider(e));
            }
        }

        let merged = aggregator::merge_results(results);
        let flag_summary = FlagSummary::from_flags(&merged.flags);
        let duration = start.elapsed().as_secs_f64();

        info!(
            "Analysis complete: overall {} with {} flags in {:.2}s",
            merged.scores.overall, flag_summary.total, duration
        );

        Ok(ContractAnalysis {
            id: new_analysis_id(),
            status: AnalysisStatus::Completed,
            created_at: Utc::now(),
            contract_type,
            language: language.to_string(),
            checks,
            summary: merged.summary,
            scores: merged.scores,
            flags: merged.flags,
            flag_summary,
            positive_aspects: merged.positive_aspects,
            recommendations: merged.recommendations,
            scholarly_notes: merged.scholarly_notes,
            failed_checks,
            model_used: self.provider.model_name().to_string(),
            duration_seconds: (duration * 100.0).round() / 100.0,
        })
    }

    /// Score a contract with one cheap call, without flags.
    pub async fn quick_score(&self, contract_text: &str) -> Result<ScoreOnlyResponse, AnalysisError> {
        let text = truncate_chars(contract_text, self.settings.quick_max_chars);
        debug!("Quick scoring contract ({} chars)", text.chars().count());

        let raw = self
            .provider
            .complete(
                prompts::quick_score_system_prompt(),
                &prompts::quick_score_prompt(text),
            )
            .await?;

        let data = extract_json(&raw);
        let scores = ContractScores {
            overall: score_value(data.get("overall")),
            riba_free: Some(score_value(data.get("riba_free"))),
            gharar_free: Some(score_value(data.get("gharar_free"))),
            halal_industry: Some(score_value(data.get("halal_industry"))),
            fair_terms: Some(score_value(data.get("fair_terms"))),
            transparency: Some(score_value(data.get("transparency"))),
            categories: Vec::new(),
        };

        Ok(ScoreOnlyResponse {
            id: new_analysis_id(),
            scores,
            quick_summary: string_value(data.get("quick_summary"))
                .unwrap_or_else(|| DEFAULT_QUICK_SUMMARY.to_string()),
        })
    }
}

/// Remove duplicate checks, keeping first-seen order.
pub fn normalize_checks(checks: &[CheckCategory]) -> Vec<CheckCategory> {
    let mut unique = Vec::with_capacity(checks.len());
    for check in checks {
        if !unique.contains(check) {
            unique.push(*check);
        }
    }
    unique
}

/// Keep at most `max_chars` characters, cutting on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Parse a model answer as a JSON object.
///
/// Tries the whole answer first, then the span from the first `{` to the
/// last `}`. Anything else yields an empty object.
pub fn extract_json(text: &str) -> Value {
    let as_object = |candidate: &str| match serde_json::from_str::<Value>(candidate) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    };

    if let Some(value) = as_object(text.trim()) {
        return value;
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            if let Some(value) = as_object(&text[start..=end]) {
                return value;
            }
        }
    }

    debug!("No JSON object found in model answer");
    Value::Object(Map::new())
}

/// Read a 0..=100 score, defaulting to 50 when missing or not numeric.
pub fn score_value(value: Option<&Value>) -> u8 {
    let number = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match number {
        Some(n) if n.is_finite() => n.round().clamp(0.0, 100.0) as u8,
        _ => DEFAULT_SCORE,
    }
}

fn string_value(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| string_value(Some(item)))
                .collect()
        })
        .unwrap_or_default()
}

/// Parse one flag; flags with an unknown severity or category are dropped.
fn parse_flag(check: CheckCategory, value: &Value) -> Option<ContractFlag> {
    let severity = value.get("severity").and_then(Value::as_str)?;
    let category = value.get("category").and_then(Value::as_str)?;

    let severity = match severity.parse() {
        Ok(s) => s,
        Err(e) => {
            debug!("Dropping {} flag: {}", check, e);
            return None;
        }
    };
    let category = match category.parse() {
        Ok(c) => c,
        Err(e) => {
            debug!("Dropping {} flag: {}", check, e);
            return None;
        }
    };

    Some(ContractFlag {
        severity,
        category,
        clause: string_value(value.get("clause")).unwrap_or_default(),
        explanation: string_value(value.get("explanation")).unwrap_or_default(),
        suggestion: string_value(value.get("suggestion")).unwrap_or_default(),
        reference: string_value(value.get("reference")),
        check: Some(check),
    })
}

/// Turn the parsed answer for one check into a [`CategoryResult`].
pub fn parse_category(check: CheckCategory, data: &Value) -> CategoryResult {
    let breakdown_data = data.get("breakdown");
    let breakdown: BTreeMap<String, u8> = prompts::breakdown_keys(check)
        .iter()
        .map(|key| {
            (
                key.to_string(),
                score_value(breakdown_data.and_then(|b| b.get(*key))),
            )
        })
        .collect();

    let overall = score_value(data.get("score").or_else(|| data.get("overall")));

    let flags = data
        .get("flags")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(|f| parse_flag(check, f)).collect())
        .unwrap_or_default();

    CategoryResult {
        check,
        summary: string_value(data.get("summary")).unwrap_or_else(|| DEFAULT_SUMMARY.to_string()),
        overall,
        breakdown,
        flags,
        positive_aspects: string_list(data.get("positive_aspects")),
        recommendations: string_list(data.get("recommendations")),
        scholarly_notes: string_value(data.get("scholarly_notes")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FlagCategory, FlagSeverity};
    use crate::provider::fake::ScriptedProvider;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const CONTRACT: &str = "The borrower shall repay the principal with 5% annual interest, \
        compounded monthly, and a late fee of 2% per month on any missed payment.";

    const ISLAMIC_ANSWER: &str = r#"Here is my analysis:
{
  "category": "islamic",
  "summary": "Contains interest.",
  "score": 35,
  "breakdown": {"riba_free": 10, "gharar_free": 80, "halal_industry": 100, "fair_terms": 40, "transparency": 70},
  "flags": [
    {"severity": "warning", "category": "gharar", "clause": "compounded monthly", "explanation": "x", "suggestion": "y"},
    {"severity": "CRITICAL", "category": "Riba", "clause": "5% annual interest", "explanation": "Interest", "suggestion": "Use murabaha", "reference": "Quran 2:275"},
    {"severity": "severe", "category": "riba", "clause": "dropped"}
  ],
  "positive_aspects": ["Clear repayment schedule"],
  "recommendations": ["Remove interest", "Consult a scholar"],
  "scholarly_notes": "Consensus on riba."
}
Hope this helps."#;

    const FAIR_ANSWER: &str = r#"{"summary": "Late fee is steep.", "score": 61,
        "flags": [{"severity": "info", "category": "penalty_clauses", "clause": "late fee"}],
        "recommendations": ["Consult a scholar", "Cap the late fee"]}"#;

    fn analyzer(provider: ScriptedProvider) -> (Arc<ScriptedProvider>, ContractAnalyzer) {
        let provider = Arc::new(provider);
        let analyzer = ContractAnalyzer::new(provider.clone(), AnalyzerSettings::default());
        (provider, analyzer)
    }

    #[test]
    fn test_extract_json_strict_and_embedded() {
        assert_eq!(extract_json(r#"{"score": 10}"#)["score"], 10);
        assert_eq!(
            extract_json("Sure! ```json\n{\"score\": 20}\n``` done")["score"],
            20
        );
        assert_eq!(extract_json("no json here"), json!({}));
        assert_eq!(extract_json("[1, 2, 3]"), json!({}));
        assert_eq!(extract_json("} backwards {"), json!({}));
    }

    #[test]
    fn test_score_value_clamps_and_defaults() {
        assert_eq!(score_value(Some(&json!(85))), 85);
        assert_eq!(score_value(Some(&json!(72.6))), 73);
        assert_eq!(score_value(Some(&json!(150))), 100);
        assert_eq!(score_value(Some(&json!(-5))), 0);
        assert_eq!(score_value(Some(&json!("64"))), 64);
        assert_eq!(score_value(Some(&json!("high"))), 50);
        assert_eq!(score_value(Some(&json!(null))), 50);
        assert_eq!(score_value(None), 50);
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("عقد", 1), "ع");
    }

    #[test]
    fn test_normalize_checks() {
        let checks = normalize_checks(&[
            CheckCategory::Legal,
            CheckCategory::Islamic,
            CheckCategory::Legal,
        ]);
        assert_eq!(checks, vec![CheckCategory::Legal, CheckCategory::Islamic]);
    }

    #[test]
    fn test_parse_category_defaults() {
        let result = parse_category(CheckCategory::Privacy, &json!({}));
        assert_eq!(result.summary, DEFAULT_SUMMARY);
        assert_eq!(result.overall, 50);
        assert_eq!(result.breakdown.len(), 5);
        assert!(result.breakdown.values().all(|v| *v == 50));
        assert!(result.flags.is_empty());
    }

    #[tokio::test]
    async fn test_single_islamic_analysis() {
        let (_, analyzer) = analyzer(ScriptedProvider::new().on("Shariah", ISLAMIC_ANSWER));

        let analysis = analyzer
            .analyze(CONTRACT, ContractType::Loan, "en", &[CheckCategory::Islamic])
            .await
            .unwrap();

        assert!(analysis.id.starts_with("contract_"));
        assert_eq!(analysis.status, AnalysisStatus::Completed);
        assert_eq!(analysis.summary, "Contains interest.");
        assert_eq!(analysis.scores.overall, 35);
        assert_eq!(analysis.scores.riba_free, Some(10));
        assert_eq!(analysis.scores.fair_terms, Some(40));
        assert_eq!(analysis.flags.len(), 2);
        assert_eq!(analysis.flags[0].severity, FlagSeverity::Critical);
        assert_eq!(analysis.flags[0].category, FlagCategory::Riba);
        assert_eq!(analysis.flags[0].reference.as_deref(), Some("Quran 2:275"));
        assert_eq!(analysis.flags[0].check, Some(CheckCategory::Islamic));
        assert_eq!(analysis.flag_summary.total, 2);
        assert_eq!(analysis.scholarly_notes.as_deref(), Some("Consensus on riba."));
        assert_eq!(analysis.model_used, "scripted-model");
        assert!(analysis.failed_checks.is_empty());
    }

    #[tokio::test]
    async fn test_multi_category_analysis() {
        let (provider, analyzer) = analyzer(
            ScriptedProvider::new()
                .on("Shariah", ISLAMIC_ANSWER)
                .on("fairness and balanced terms", FAIR_ANSWER),
        );

        let analysis = analyzer
            .analyze(
                CONTRACT,
                ContractType::Loan,
                "en",
                &[
                    CheckCategory::FairTerms,
                    CheckCategory::Islamic,
                    CheckCategory::FairTerms,
                ],
            )
            .await
            .unwrap();

        assert_eq!(provider.calls(), 2);
        assert_eq!(
            analysis.checks,
            vec![CheckCategory::FairTerms, CheckCategory::Islamic]
        );
        assert_eq!(analysis.scores.overall, 48);
        assert_eq!(analysis.scores.categories[0].category, CheckCategory::FairTerms);
        // Islamic breakdown wins over the fair terms category score
        assert_eq!(analysis.scores.fair_terms, Some(40));
        assert_eq!(
            analysis.summary,
            "Fair Terms: Late fee is steep.\n\nIslamic Compliance: Contains interest."
        );
        assert_eq!(
            analysis.recommendations,
            vec!["Consult a scholar", "Cap the late fee", "Remove interest"]
        );
        let severities: Vec<_> = analysis.flags.iter().map(|f| f.severity).collect();
        assert_eq!(
            severities,
            vec![FlagSeverity::Critical, FlagSeverity::Warning, FlagSeverity::Info]
        );
    }

    #[tokio::test]
    async fn test_partial_failure_is_reported() {
        let (_, analyzer) = analyzer(
            ScriptedProvider::new()
                .on("Shariah", ISLAMIC_ANSWER)
                .fail_on("privacy and data protection", 503),
        );

        let analysis = analyzer
            .analyze(
                CONTRACT,
                ContractType::Loan,
                "en",
                &[CheckCategory::Islamic, CheckCategory::Privacy],
            )
            .await
            .unwrap();

        assert_eq!(analysis.scores.overall, 35);
        assert_eq!(analysis.scores.categories.len(), 1);
        assert_eq!(analysis.failed_checks.len(), 1);
        assert_eq!(analysis.failed_checks[0].check, CheckCategory::Privacy);
        assert!(analysis.failed_checks[0].error.contains("503"));
    }

    #[tokio::test]
    async fn test_all_checks_failing_fails_analysis() {
        let (_, analyzer) = analyzer(ScriptedProvider::new().fail_on("Analyze", 500));

        let err = analyzer
            .analyze(CONTRACT, ContractType::General, "en", &[CheckCategory::Legal])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AnalysisError::Provider(ProviderError::Status { status: 500, .. })
        ));
        assert!(!err.is_configuration());
    }

    #[tokio::test]
    async fn test_empty_checks_rejected() {
        let (provider, analyzer) = analyzer(ScriptedProvider::new().otherwise("{}"));
        let err = analyzer
            .analyze(CONTRACT, ContractType::General, "en", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::NoChecks));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_prose_answer_uses_defaults() {
        let (_, analyzer) =
            analyzer(ScriptedProvider::new().otherwise("I cannot analyze this contract."));

        let analysis = analyzer
            .analyze(CONTRACT, ContractType::General, "en", &[CheckCategory::Legal])
            .await
            .unwrap();

        assert_eq!(analysis.summary, "Analysis completed.");
        assert_eq!(analysis.scores.overall, 50);
        assert!(analysis.flags.is_empty());
    }

    #[tokio::test]
    async fn test_long_text_is_truncated() {
        let (provider, analyzer) = analyzer(ScriptedProvider::new().otherwise("{}"));
        let text = "x".repeat(60_000);

        analyzer
            .analyze(&text, ContractType::General, "en", &[CheckCategory::Legal])
            .await
            .unwrap();

        let prompt = &provider.prompts()[0];
        assert!(prompt.contains(&"x".repeat(50_000)));
        assert!(!prompt.contains(&"x".repeat(50_001)));
    }

    #[tokio::test]
    async fn test_quick_score() {
        let (provider, analyzer) = analyzer(ScriptedProvider::new().on(
            "Quickly assess",
            r#"{"overall": 72, "riba_free": 90, "gharar_free": "x", "quick_summary": "Mostly fine."}"#,
        ));

        let response = analyzer.quick_score(CONTRACT).await.unwrap();

        assert_eq!(provider.calls(), 1);
        assert!(response.id.starts_with("contract_"));
        assert_eq!(response.scores.overall, 72);
        assert_eq!(response.scores.riba_free, Some(90));
        assert_eq!(response.scores.gharar_free, Some(50));
        assert_eq!(response.scores.transparency, Some(50));
        assert_eq!(response.quick_summary, "Mostly fine.");
    }

    #[tokio::test]
    async fn test_quick_score_default_summary() {
        let (_, analyzer) = analyzer(ScriptedProvider::new().otherwise("{}"));
        let response = analyzer.quick_score(CONTRACT).await.unwrap();
        assert_eq!(response.quick_summary, "Quick analysis completed.");
    }

    /// Tracks how many completions run at the same time.
    #[derive(Default)]
    struct SlowProvider {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl CompletionProvider for SlowProvider {
        async fn complete(&self, _system: &str, _prompt: &str) -> Result<String, ProviderError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(r#"{"summary": "ok", "score": 70}"#.to_string())
        }

        fn provider_name(&self) -> &str {
            "slow"
        }

        fn model_name(&self) -> &str {
            "slow-model"
        }
    }

    async fn peak_in_flight(concurrency: usize) -> usize {
        let provider = Arc::new(SlowProvider::default());
        let settings = AnalyzerSettings {
            concurrency,
            ..AnalyzerSettings::default()
        };
        let analyzer = ContractAnalyzer::new(provider.clone(), settings);
        let checks = [
            CheckCategory::Islamic,
            CheckCategory::Privacy,
            CheckCategory::FairTerms,
        ];

        let analysis = analyzer
            .analyze(CONTRACT, ContractType::Loan, "en", &checks)
            .await
            .unwrap();
        assert_eq!(analysis.scores.categories.len(), 3);
        provider.peak.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn test_concurrency_limits_calls_in_flight() {
        assert_eq!(peak_in_flight(1).await, 1);
        assert_eq!(peak_in_flight(3).await, 3);
    }
}
