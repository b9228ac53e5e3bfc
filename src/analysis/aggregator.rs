//! Merging of per-category results and flag statistics.
//!
//! Each selected check produces one [`CategoryResult`]; this module folds
//! them into the scores, summary and lists of a single analysis.

use crate::models::{
    CategoryScores, CheckCategory, ContractFlag, ContractScores, FlagSeverity, FlagSummary,
};
use std::collections::{BTreeMap, HashSet};

/// Parsed answer of the model for one check.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryResult {
    pub check: CheckCategory,
    pub summary: String,
    pub overall: u8,
    pub breakdown: BTreeMap<String, u8>,
    pub flags: Vec<ContractFlag>,
    pub positive_aspects: Vec<String>,
    pub recommendations: Vec<String>,
    pub scholarly_notes: Option<String>,
}

/// Result of merging every successful check.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedResult {
    pub summary: String,
    pub scores: ContractScores,
    pub flags: Vec<ContractFlag>,
    pub positive_aspects: Vec<String>,
    pub recommendations: Vec<String>,
    pub scholarly_notes: Option<String>,
}

/// Merge category results, in check order, into one analysis body.
pub fn merge_results(results: Vec<CategoryResult>) -> MergedResult {
    let summary = match results.as_slice() {
        [] => "Analysis completed.".to_string(),
        [single] => single.summary.clone(),
        many => many
            .iter()
            .map(|r| format!("{}: {}", r.check.display_name(), r.summary))
            .collect::<Vec<_>>()
            .join("\n\n"),
    };

    let scores = merge_scores(&results);

    let scholarly_notes = results
        .iter()
        .find(|r| r.check == CheckCategory::Islamic)
        .and_then(|r| r.scholarly_notes.clone());

    let mut flags = Vec::new();
    let mut positive_aspects = Vec::new();
    let mut recommendations = Vec::new();
    for result in results {
        flags.extend(result.flags);
        positive_aspects.extend(result.positive_aspects);
        recommendations.extend(result.recommendations);
    }
    sort_flags_by_severity(&mut flags);

    MergedResult {
        summary,
        scores,
        flags,
        positive_aspects: dedupe_preserving_order(positive_aspects),
        recommendations: dedupe_preserving_order(recommendations),
        scholarly_notes,
    }
}

/// Combine per-category scores and fill the legacy Islamic fields.
pub fn merge_scores(results: &[CategoryResult]) -> ContractScores {
    let overall = mean_score(results.iter().map(|r| r.overall));

    let islamic = results.iter().find(|r| r.check == CheckCategory::Islamic);
    let legacy = |key: &str| islamic.and_then(|r| r.breakdown.get(key).copied());

    let fair_terms = legacy("fair_terms").or_else(|| {
        results
            .iter()
            .find(|r| r.check == CheckCategory::FairTerms)
            .map(|r| r.overall)
    });

    ContractScores {
        overall,
        riba_free: legacy("riba_free"),
        gharar_free: legacy("gharar_free"),
        halal_industry: legacy("halal_industry"),
        fair_terms,
        transparency: legacy("transparency"),
        categories: results
            .iter()
            .map(|r| CategoryScores {
                category: r.check,
                overall: r.overall,
                breakdown: r.breakdown.clone(),
            })
            .collect(),
    }
}

/// Rounded mean of scores; 50 when there are none.
pub fn mean_score(scores: impl Iterator<Item = u8>) -> u8 {
    let (sum, count) = scores.fold((0u32, 0u32), |(sum, count), s| (sum + s as u32, count + 1));
    if count == 0 {
        return 50;
    }
    ((sum as f64 / count as f64).round() as u32).min(100) as u8
}

/// Sort flags by severity (critical first), keeping the order within a
/// severity.
pub fn sort_flags_by_severity(flags: &mut [ContractFlag]) {
    flags.sort_by(|a, b| b.severity.cmp(&a.severity));
}

/// Group flags by severity, most severe first.
pub fn group_by_severity(flags: &[ContractFlag]) -> Vec<(FlagSeverity, Vec<&ContractFlag>)> {
    [FlagSeverity::Critical, FlagSeverity::Warning, FlagSeverity::Info]
        .into_iter()
        .map(|severity| {
            let group: Vec<&ContractFlag> =
                flags.iter().filter(|f| f.severity == severity).collect();
            (severity, group)
        })
        .filter(|(_, group)| !group.is_empty())
        .collect()
}

/// Drop repeated entries, keeping the first occurrence.
pub fn dedupe_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.trim().to_string()))
        .collect()
}

/// Generate a text summary of flag statistics.
pub fn generate_summary_text(summary: &FlagSummary) -> String {
    let mut lines = Vec::new();

    lines.push(format!("Total Flags: {}", summary.total));
    lines.push(format!(
        "- {} Critical: {}",
        FlagSeverity::Critical.emoji(),
        summary.critical
    ));
    lines.push(format!(
        "- {} Warning: {}",
        FlagSeverity::Warning.emoji(),
        summary.warning
    ));
    lines.push(format!("- {} Info: {}", FlagSeverity::Info.emoji(), summary.info));

    if !summary.by_category.is_empty() {
        lines.push(String::new());
        lines.push("By Category:".to_string());

        let mut categories: Vec<_> = summary.by_category.iter().collect();
        categories.sort_by_key(|(_, count)| std::cmp::Reverse(*count));

        for (category, count) in categories {
            lines.push(format!("- {}: {}", category, count));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FlagCategory;

    fn create_test_flag(severity: FlagSeverity, clause: &str) -> ContractFlag {
        ContractFlag {
            severity,
            category: FlagCategory::Other,
            clause: clause.to_string(),
            explanation: "Test explanation".to_string(),
            suggestion: "Fix it".to_string(),
            reference: None,
            check: None,
        }
    }

    fn result(check: CheckCategory, overall: u8, breakdown: &[(&str, u8)]) -> CategoryResult {
        CategoryResult {
            check,
            summary: format!("{} looks fine", check.as_str()),
            overall,
            breakdown: breakdown
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
            flags: vec![],
            positive_aspects: vec![],
            recommendations: vec![],
            scholarly_notes: None,
        }
    }

    #[test]
    fn test_sort_flags_is_stable() {
        let mut flags = vec![
            create_test_flag(FlagSeverity::Info, "a"),
            create_test_flag(FlagSeverity::Critical, "b"),
            create_test_flag(FlagSeverity::Warning, "c"),
            create_test_flag(FlagSeverity::Critical, "d"),
        ];

        sort_flags_by_severity(&mut flags);

        let clauses: Vec<_> = flags.iter().map(|f| f.clause.as_str()).collect();
        assert_eq!(clauses, vec!["b", "d", "c", "a"]);
    }

    #[test]
    fn test_mean_score_rounds() {
        assert_eq!(mean_score([80u8, 61].into_iter()), 71);
        assert_eq!(mean_score([100u8, 100, 99].into_iter()), 100);
        assert_eq!(mean_score(std::iter::empty()), 50);
    }

    #[test]
    fn test_single_category_keeps_summary() {
        let merged = merge_results(vec![result(CheckCategory::Legal, 70, &[])]);
        assert_eq!(merged.summary, "legal looks fine");
        assert_eq!(merged.scores.overall, 70);
        assert_eq!(merged.scores.riba_free, None);
        assert_eq!(merged.scores.categories.len(), 1);
    }

    #[test]
    fn test_multi_category_merge() {
        let islamic = result(
            CheckCategory::Islamic,
            80,
            &[
                ("riba_free", 90),
                ("gharar_free", 70),
                ("halal_industry", 100),
                ("fair_terms", 60),
                ("transparency", 75),
            ],
        );
        let privacy = result(CheckCategory::Privacy, 61, &[]);

        let merged = merge_results(vec![islamic, privacy]);

        assert_eq!(merged.scores.overall, 71);
        assert_eq!(merged.scores.riba_free, Some(90));
        assert_eq!(merged.scores.fair_terms, Some(60));
        assert_eq!(merged.scores.transparency, Some(75));
        assert_eq!(
            merged.summary,
            "Islamic Compliance: islamic looks fine\n\nPrivacy: privacy looks fine"
        );
    }

    #[test]
    fn test_fair_terms_falls_back_to_category() {
        let merged = merge_results(vec![
            result(CheckCategory::Legal, 40, &[]),
            result(CheckCategory::FairTerms, 55, &[]),
        ]);
        assert_eq!(merged.scores.fair_terms, Some(55));
        assert_eq!(merged.scores.riba_free, None);
    }

    #[test]
    fn test_lists_are_concatenated_and_deduped() {
        let mut a = result(CheckCategory::Legal, 50, &[]);
        a.recommendations = vec!["Get a lawyer".to_string(), "Cap liability".to_string()];
        a.flags = vec![create_test_flag(FlagSeverity::Info, "a")];
        let mut b = result(CheckCategory::FairTerms, 50, &[]);
        b.recommendations = vec!["Cap liability".to_string(), "Remove auto-renewal".to_string()];
        b.flags = vec![create_test_flag(FlagSeverity::Critical, "b")];

        let merged = merge_results(vec![a, b]);

        assert_eq!(
            merged.recommendations,
            vec!["Get a lawyer", "Cap liability", "Remove auto-renewal"]
        );
        assert_eq!(merged.flags[0].clause, "b");
        assert_eq!(merged.flags[1].clause, "a");
    }

    #[test]
    fn test_scholarly_notes_only_from_islamic() {
        let mut legal = result(CheckCategory::Legal, 50, &[]);
        legal.scholarly_notes = Some("ignored".to_string());
        let mut islamic = result(CheckCategory::Islamic, 50, &[]);
        islamic.scholarly_notes = Some("Majority view".to_string());

        let merged = merge_results(vec![legal, islamic]);
        assert_eq!(merged.scholarly_notes.as_deref(), Some("Majority view"));
    }

    #[test]
    fn test_group_by_severity() {
        let flags = vec![
            create_test_flag(FlagSeverity::Info, "a"),
            create_test_flag(FlagSeverity::Critical, "b"),
            create_test_flag(FlagSeverity::Info, "c"),
        ];

        let grouped = group_by_severity(&flags);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].0, FlagSeverity::Critical);
        assert_eq!(grouped[1].1.len(), 2);
    }

    #[test]
    fn test_generate_summary_text() {
        let flags = vec![
            create_test_flag(FlagSeverity::Critical, "a"),
            create_test_flag(FlagSeverity::Warning, "b"),
        ];
        let text = generate_summary_text(&FlagSummary::from_flags(&flags));
        assert!(text.starts_with("Total Flags: 2"));
        assert!(text.contains("Critical: 1"));
        assert!(text.contains("- other: 2"));
    }
}
