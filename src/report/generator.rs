//! Markdown and JSON report generation.
//!
//! This module renders a stored [`ContractAnalysis`] as a Markdown
//! compliance report or as pretty-printed JSON.

use crate::analysis::aggregator::group_by_severity;
use crate::config::ReportConfig;
use crate::models::{CategoryScores, ContractAnalysis, ContractFlag, ContractScores, FlagSeverity, FlagSummary};

/// Generate a complete Markdown report.
pub fn generate_markdown_report(analysis: &ContractAnalysis, branding: &ReportConfig) -> String {
    let mut output = String::new();

    output.push_str("# Contract Compliance Report\n\n");

    output.push_str(&generate_metadata_section(analysis));

    output.push_str("## Summary\n\n");
    output.push_str(&analysis.summary);
    output.push_str("\n\n");

    output.push_str(&generate_scores_section(&analysis.scores));
    output.push_str(&generate_flag_summary_section(&analysis.flag_summary));
    output.push_str(&generate_flags_section(&analysis.flags));
    output.push_str(&generate_list_section("Positive Aspects", &analysis.positive_aspects, false));
    output.push_str(&generate_list_section("Recommendations", &analysis.recommendations, true));

    if let Some(ref notes) = analysis.scholarly_notes {
        output.push_str("## Scholarly Notes\n\n");
        output.push_str(notes);
        output.push_str("\n\n");
    }

    if !analysis.failed_checks.is_empty() {
        output.push_str("## Incomplete Checks\n\n");
        for failed in &analysis.failed_checks {
            output.push_str(&format!(
                "- **{}:** {}\n",
                failed.check.display_name(),
                failed.error
            ));
        }
        output.push('\n');
    }

    output.push_str(&generate_footer(branding));

    output
}

/// Generate the metadata section.
fn generate_metadata_section(analysis: &ContractAnalysis) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Analysis ID:** `{}`\n", analysis.id));
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        analysis.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Contract Type:** {}\n",
        analysis.contract_type.label()
    ));
    section.push_str(&format!("- **Language:** {}\n", analysis.language));
    section.push_str(&format!(
        "- **Checks:** {}\n",
        analysis
            .checks
            .iter()
            .map(|c| c.display_name())
            .collect::<Vec<_>>()
            .join(", ")
    ));
    section.push_str(&format!("- **Model Used:** `{}`\n", analysis.model_used));
    section.push_str(&format!(
        "- **Analysis Duration:** {:.1}s\n",
        analysis.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the score tables.
fn generate_scores_section(scores: &ContractScores) -> String {
    let mut section = String::new();

    section.push_str("## Scores\n\n");
    section.push_str(&format!("**Overall Score:** {}/100\n\n", scores.overall));

    let legacy = [
        ("Riba Free", scores.riba_free),
        ("Gharar Free", scores.gharar_free),
        ("Halal Industry", scores.halal_industry),
        ("Fair Terms", scores.fair_terms),
        ("Transparency", scores.transparency),
    ];
    if legacy.iter().any(|(_, score)| score.is_some()) {
        section.push_str("| Measure | Score |\n");
        section.push_str("|:---|:---:|\n");
        for (name, score) in legacy {
            if let Some(score) = score {
                section.push_str(&format!("| {} | {} |\n", name, score));
            }
        }
        section.push('\n');
    }

    for category in &scores.categories {
        section.push_str(&generate_category_scores(category));
    }

    section
}

fn generate_category_scores(category: &CategoryScores) -> String {
    let mut block = String::new();

    block.push_str(&format!(
        "### {} ({}/100)\n\n",
        category.category.display_name(),
        category.overall
    ));

    if !category.breakdown.is_empty() {
        block.push_str("| Measure | Score |\n");
        block.push_str("|:---|:---:|\n");
        for (key, score) in &category.breakdown {
            block.push_str(&format!("| {} | {} |\n", humanize_key(key), score));
        }
        block.push('\n');
    }

    block
}

/// Generate the flag count table.
fn generate_flag_summary_section(summary: &FlagSummary) -> String {
    let mut section = String::new();

    section.push_str("## Flag Summary\n\n");
    section.push_str(&format!(
        "| {} Critical | {} Warning | {} Info | **Total** |\n",
        FlagSeverity::Critical.emoji(),
        FlagSeverity::Warning.emoji(),
        FlagSeverity::Info.emoji(),
    ));
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | **{}** |\n\n",
        summary.critical, summary.warning, summary.info, summary.total
    ));

    if !summary.by_category.is_empty() {
        section.push_str("| Category | Count |\n");
        section.push_str("|:---|:---:|\n");

        let mut categories: Vec<_> = summary.by_category.iter().collect();
        categories.sort_by_key(|(_, count)| std::cmp::Reverse(*count));

        for (category, count) in categories {
            section.push_str(&format!("| {} | {} |\n", humanize_key(category), count));
        }
        section.push('\n');
    }

    section
}

/// Generate the flags section, grouped by severity.
fn generate_flags_section(flags: &[ContractFlag]) -> String {
    let mut section = String::new();

    section.push_str("## Flagged Clauses\n\n");

    if flags.is_empty() {
        section.push_str("No problematic clauses were flagged.\n\n");
        return section;
    }

    for (severity, group) in group_by_severity(flags) {
        section.push_str(&format!(
            "### {} {} ({})\n\n",
            severity.emoji(),
            severity,
            group.len()
        ));
        for flag in group {
            section.push_str(&generate_flag_block(flag));
        }
    }

    section
}

/// Generate a single flag block.
fn generate_flag_block(flag: &ContractFlag) -> String {
    let mut block = String::new();

    block.push_str(&format!("#### {}\n\n", humanize_key(flag.category.as_str())));

    if !flag.clause.is_empty() {
        block.push_str(&format!("> {}\n\n", flag.clause));
    }
    if !flag.explanation.is_empty() {
        block.push_str(&format!("**Issue:** {}\n\n", flag.explanation));
    }
    if !flag.suggestion.is_empty() {
        block.push_str(&format!("**Suggestion:** {}\n\n", flag.suggestion));
    }
    if let Some(ref reference) = flag.reference {
        block.push_str(&format!("*Reference: {}*\n\n", reference));
    }

    block.push_str("---\n\n");

    block
}

fn generate_list_section(title: &str, items: &[String], numbered: bool) -> String {
    if items.is_empty() {
        return String::new();
    }

    let mut section = format!("## {}\n\n", title);
    for (i, item) in items.iter().enumerate() {
        if numbered {
            section.push_str(&format!("{}. {}\n", i + 1, item));
        } else {
            section.push_str(&format!("- {}\n", item));
        }
    }
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer(branding: &ReportConfig) -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by [{}]({}). This report is guidance, not a legal opinion or fatwa.*\n",
        branding.company_name, branding.company_website
    ));

    footer
}

/// `riba_free` -> `Riba Free`.
pub fn humanize_key(key: &str) -> String {
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Generate a JSON report.
pub fn generate_json_report(analysis: &ContractAnalysis) -> serde_json::Result<String> {
    serde_json::to_string_pretty(analysis)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{
        AnalysisStatus, CheckCategory, ContractType, FailedCheck, FlagCategory,
    };
    use chrono::Utc;
    use std::collections::BTreeMap;

    pub(crate) fn create_test_analysis() -> ContractAnalysis {
        let flags = vec![
            ContractFlag {
                severity: FlagSeverity::Critical,
                category: FlagCategory::Riba,
                clause: "5% annual interest".to_string(),
                explanation: "Interest on a loan is riba".to_string(),
                suggestion: "Use a murabaha structure".to_string(),
                reference: Some("Quran 2:275".to_string()),
                check: Some(CheckCategory::Islamic),
            },
            ContractFlag {
                severity: FlagSeverity::Info,
                category: FlagCategory::PenaltyClauses,
                clause: "late fee".to_string(),
                explanation: String::new(),
                suggestion: "Donate late fees to charity".to_string(),
                reference: None,
                check: Some(CheckCategory::FairTerms),
            },
        ];

        let breakdown: BTreeMap<String, u8> =
            [("riba_free".to_string(), 10), ("transparency".to_string(), 80)]
                .into_iter()
                .collect();

        ContractAnalysis {
            id: "contract_0123456789ab".to_string(),
            status: AnalysisStatus::Completed,
            created_at: Utc::now(),
            contract_type: ContractType::Loan,
            language: "en".to_string(),
            checks: vec![CheckCategory::Islamic, CheckCategory::FairTerms],
            summary: "Islamic Compliance: Contains interest.".to_string(),
            scores: ContractScores {
                overall: 48,
                riba_free: Some(10),
                transparency: Some(80),
                categories: vec![CategoryScores {
                    category: CheckCategory::Islamic,
                    overall: 35,
                    breakdown,
                }],
                ..ContractScores::default()
            },
            flag_summary: FlagSummary::from_flags(&flags),
            flags,
            positive_aspects: vec!["Clear repayment schedule".to_string()],
            recommendations: vec!["Remove interest".to_string()],
            scholarly_notes: Some("Consensus on riba.".to_string()),
            failed_checks: vec![FailedCheck {
                check: CheckCategory::Privacy,
                error: "Request timed out after 120s".to_string(),
            }],
            model_used: "test-model".to_string(),
            duration_seconds: 3.2,
        }
    }

    #[test]
    fn test_generate_markdown_report() {
        let analysis = create_test_analysis();
        let markdown = generate_markdown_report(&analysis, &ReportConfig::default());

        assert!(markdown.starts_with("# Contract Compliance Report"));
        assert!(markdown.contains("contract_0123456789ab"));
        assert!(markdown.contains("Loan/Financing Agreement"));
        assert!(markdown.contains("**Overall Score:** 48/100"));
        assert!(markdown.contains("| Riba Free | 10 |"));
        assert!(markdown.contains("### Islamic Compliance (35/100)"));
        assert!(markdown.contains("## Flagged Clauses"));
        assert!(markdown.contains("> 5% annual interest"));
        assert!(markdown.contains("*Reference: Quran 2:275*"));
        assert!(markdown.contains("1. Remove interest"));
        assert!(markdown.contains("## Scholarly Notes"));
        assert!(markdown.contains("**Privacy:** Request timed out"));
        assert!(markdown.contains("Halal Contract API"));
    }

    #[test]
    fn test_flags_are_grouped_critical_first() {
        let analysis = create_test_analysis();
        let section = generate_flags_section(&analysis.flags);

        let critical = section.find("Critical (1)").unwrap();
        let info = section.find("Info (1)").unwrap();
        assert!(critical < info);
    }

    #[test]
    fn test_no_flags_message() {
        let section = generate_flags_section(&[]);
        assert!(section.contains("No problematic clauses were flagged."));
    }

    #[test]
    fn test_humanize_key() {
        assert_eq!(humanize_key("riba_free"), "Riba Free");
        assert_eq!(humanize_key("penalty_clauses"), "Penalty Clauses");
        assert_eq!(humanize_key("balance"), "Balance");
    }

    #[test]
    fn test_generate_json_report() {
        let analysis = create_test_analysis();
        let json = generate_json_report(&analysis).unwrap();

        assert!(json.contains("\"id\": \"contract_0123456789ab\""));
        assert!(json.contains("\"flags\""));
        assert!(json.contains("\"failed_checks\""));
    }
}
