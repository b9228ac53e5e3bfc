//! Data models for contract analysis.
//!
//! This module contains the request and response shapes exchanged over the
//! HTTP API, plus the enums describing contract types, check categories and
//! flagged issues.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Supported contract types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractType {
    Employment,
    Service,
    Sale,
    Lease,
    Partnership,
    Investment,
    Loan,
    Licensing,
    Nda,
    #[default]
    General,
}

impl ContractType {
    pub const ALL: [ContractType; 10] = [
        ContractType::Employment,
        ContractType::Service,
        ContractType::Sale,
        ContractType::Lease,
        ContractType::Partnership,
        ContractType::Investment,
        ContractType::Loan,
        ContractType::Licensing,
        ContractType::Nda,
        ContractType::General,
    ];

    /// Wire value, as used in JSON and form fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractType::Employment => "employment",
            ContractType::Service => "service",
            ContractType::Sale => "sale",
            ContractType::Lease => "lease",
            ContractType::Partnership => "partnership",
            ContractType::Investment => "investment",
            ContractType::Loan => "loan",
            ContractType::Licensing => "licensing",
            ContractType::Nda => "nda",
            ContractType::General => "general",
        }
    }

    /// Human readable label used in prompts and reports.
    pub fn label(&self) -> &'static str {
        match self {
            ContractType::Employment => "Employment/Work Contract",
            ContractType::Service => "Service Agreement",
            ContractType::Sale => "Sale/Purchase Agreement",
            ContractType::Lease => "Lease/Rental Agreement",
            ContractType::Partnership => "Partnership/Joint Venture",
            ContractType::Investment => "Investment Agreement",
            ContractType::Loan => "Loan/Financing Agreement",
            ContractType::Licensing => "Licensing/Royalty Agreement",
            ContractType::Nda => "Non-Disclosure Agreement",
            ContractType::General => "General Contract",
        }
    }
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        ContractType::ALL
            .into_iter()
            .find(|t| t.as_str() == needle)
            .ok_or_else(|| format!("unknown contract type: {}", s))
    }
}

/// Severity level of a flagged issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagSeverity {
    /// Informational note, no action strictly required
    Info,
    /// Problematic term that should be negotiated
    Warning,
    /// Term that breaks the checked principle outright
    Critical,
}

impl fmt::Display for FlagSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagSeverity::Info => write!(f, "Info"),
            FlagSeverity::Warning => write!(f, "Warning"),
            FlagSeverity::Critical => write!(f, "Critical"),
        }
    }
}

impl FlagSeverity {
    /// Returns an emoji representation of the severity.
    pub fn emoji(&self) -> &'static str {
        match self {
            FlagSeverity::Info => "🔵",
            FlagSeverity::Warning => "🟡",
            FlagSeverity::Critical => "🔴",
        }
    }
}

impl FromStr for FlagSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "info" => Ok(FlagSeverity::Info),
            "warning" => Ok(FlagSeverity::Warning),
            "critical" => Ok(FlagSeverity::Critical),
            other => Err(format!("unknown severity: {}", other)),
        }
    }
}

/// Categories of checks a client can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckCategory {
    /// Islamic (Shariah) compliance
    Islamic,
    /// Creator and artist protections
    ArtistRights,
    /// Privacy and data protection
    Privacy,
    /// Legal red flags
    Legal,
    /// Fair and balanced terms
    FairTerms,
}

impl CheckCategory {
    pub const ALL: [CheckCategory; 5] = [
        CheckCategory::Islamic,
        CheckCategory::ArtistRights,
        CheckCategory::Privacy,
        CheckCategory::Legal,
        CheckCategory::FairTerms,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckCategory::Islamic => "islamic",
            CheckCategory::ArtistRights => "artist_rights",
            CheckCategory::Privacy => "privacy",
            CheckCategory::Legal => "legal",
            CheckCategory::FairTerms => "fair_terms",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            CheckCategory::Islamic => "Islamic Compliance",
            CheckCategory::ArtistRights => "Artist Rights",
            CheckCategory::Privacy => "Privacy",
            CheckCategory::Legal => "Legal Red Flags",
            CheckCategory::FairTerms => "Fair Terms",
        }
    }

    /// Flag categories the model is asked to use for this check.
    pub fn flag_categories(&self) -> &'static [FlagCategory] {
        use FlagCategory::*;
        match self {
            CheckCategory::Islamic => &[Riba, Gharar, Maysir, HaramIndustry, Dhulm, Tadlis, Other],
            CheckCategory::ArtistRights => &[
                Ownership,
                Royalties,
                Termination,
                Exclusivity,
                CreativeControl,
                Other,
            ],
            CheckCategory::Privacy => &[DataCollection, DataSharing, Consent, Retention, Other],
            CheckCategory::Legal => &[NonCompete, Liability, Indemnification, Jurisdiction, Other],
            CheckCategory::FairTerms => &[HiddenFees, AutoRenewal, OneSided, PenaltyClauses, Other],
        }
    }
}

impl fmt::Display for CheckCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase().replace('-', "_");
        CheckCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == needle)
            .ok_or_else(|| format!("unknown check category: {}", s))
    }
}

/// Category of a flagged issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagCategory {
    // Islamic
    Riba,
    Gharar,
    Maysir,
    HaramIndustry,
    Dhulm,
    Tadlis,
    // Artist rights
    Ownership,
    Royalties,
    Termination,
    Exclusivity,
    CreativeControl,
    // Privacy
    DataCollection,
    DataSharing,
    Consent,
    Retention,
    // Legal
    NonCompete,
    Liability,
    Indemnification,
    Jurisdiction,
    // Fair terms
    HiddenFees,
    AutoRenewal,
    OneSided,
    PenaltyClauses,
    Other,
}

impl FlagCategory {
    pub const ALL: [FlagCategory; 24] = [
        FlagCategory::Riba,
        FlagCategory::Gharar,
        FlagCategory::Maysir,
        FlagCategory::HaramIndustry,
        FlagCategory::Dhulm,
        FlagCategory::Tadlis,
        FlagCategory::Ownership,
        FlagCategory::Royalties,
        FlagCategory::Termination,
        FlagCategory::Exclusivity,
        FlagCategory::CreativeControl,
        FlagCategory::DataCollection,
        FlagCategory::DataSharing,
        FlagCategory::Consent,
        FlagCategory::Retention,
        FlagCategory::NonCompete,
        FlagCategory::Liability,
        FlagCategory::Indemnification,
        FlagCategory::Jurisdiction,
        FlagCategory::HiddenFees,
        FlagCategory::AutoRenewal,
        FlagCategory::OneSided,
        FlagCategory::PenaltyClauses,
        FlagCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FlagCategory::Riba => "riba",
            FlagCategory::Gharar => "gharar",
            FlagCategory::Maysir => "maysir",
            FlagCategory::HaramIndustry => "haram_industry",
            FlagCategory::Dhulm => "dhulm",
            FlagCategory::Tadlis => "tadlis",
            FlagCategory::Ownership => "ownership",
            FlagCategory::Royalties => "royalties",
            FlagCategory::Termination => "termination",
            FlagCategory::Exclusivity => "exclusivity",
            FlagCategory::CreativeControl => "creative_control",
            FlagCategory::DataCollection => "data_collection",
            FlagCategory::DataSharing => "data_sharing",
            FlagCategory::Consent => "consent",
            FlagCategory::Retention => "retention",
            FlagCategory::NonCompete => "non_compete",
            FlagCategory::Liability => "liability",
            FlagCategory::Indemnification => "indemnification",
            FlagCategory::Jurisdiction => "jurisdiction",
            FlagCategory::HiddenFees => "hidden_fees",
            FlagCategory::AutoRenewal => "auto_renewal",
            FlagCategory::OneSided => "one_sided",
            FlagCategory::PenaltyClauses => "penalty_clauses",
            FlagCategory::Other => "other",
        }
    }
}

impl fmt::Display for FlagCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlagCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase().replace([' ', '-'], "_");
        FlagCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == needle)
            .ok_or_else(|| format!("unknown flag category: {}", s))
    }
}

// === Requests ===

/// Request to analyze a contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractAnalyzeRequest {
    /// Contract text to analyze.
    pub text: String,
    /// Type of contract.
    #[serde(rename = "type", default)]
    pub contract_type: ContractType,
    /// Language of the contract (ISO 639-1).
    #[serde(default = "default_language")]
    pub language: String,
    /// Categories of checks to perform.
    #[serde(default = "default_checks")]
    pub checks: Vec<CheckCategory>,
}

pub fn default_language() -> String {
    "en".to_string()
}

pub fn default_checks() -> Vec<CheckCategory> {
    vec![CheckCategory::Islamic]
}

// === Responses ===

/// A flagged issue in the contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractFlag {
    pub severity: FlagSeverity,
    pub category: FlagCategory,
    /// The problematic clause or text.
    pub clause: String,
    /// Why this is problematic.
    pub explanation: String,
    /// How to fix it.
    pub suggestion: String,
    /// Scholarly, legal or industry reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Check that produced this flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<CheckCategory>,
}

/// Scores for one check category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScores {
    pub category: CheckCategory,
    pub overall: u8,
    #[serde(default)]
    pub breakdown: BTreeMap<String, u8>,
}

/// Compliance scores for a contract.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractScores {
    pub overall: u8,
    // Legacy Islamic scores
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub riba_free: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gharar_free: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halal_industry: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fair_terms: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transparency: Option<u8>,
    #[serde(default)]
    pub categories: Vec<CategoryScores>,
}

/// Lifecycle state of an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Pending,
    Processing,
    #[default]
    Completed,
    Failed,
}

/// A check whose provider call failed while others succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedCheck {
    pub check: CheckCategory,
    pub error: String,
}

/// Summary of flags found during analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlagSummary {
    pub total: usize,
    pub critical: usize,
    pub warning: usize,
    pub info: usize,
    /// Flags grouped by category.
    pub by_category: BTreeMap<String, usize>,
}

impl FlagSummary {
    /// Creates a summary from a list of flags.
    pub fn from_flags(flags: &[ContractFlag]) -> Self {
        let mut summary = Self {
            total: flags.len(),
            ..Self::default()
        };

        for flag in flags {
            match flag.severity {
                FlagSeverity::Critical => summary.critical += 1,
                FlagSeverity::Warning => summary.warning += 1,
                FlagSeverity::Info => summary.info += 1,
            }

            *summary
                .by_category
                .entry(flag.category.as_str().to_string())
                .or_insert(0) += 1;
        }

        summary
    }
}

/// Full contract analysis result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractAnalysis {
    /// Unique analysis ID.
    pub id: String,
    pub status: AnalysisStatus,
    pub created_at: DateTime<Utc>,
    pub contract_type: ContractType,
    pub language: String,
    pub checks: Vec<CheckCategory>,
    /// Brief overall assessment.
    pub summary: String,
    pub scores: ContractScores,
    pub flags: Vec<ContractFlag>,
    pub flag_summary: FlagSummary,
    pub positive_aspects: Vec<String>,
    pub recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scholarly_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_checks: Vec<FailedCheck>,
    pub model_used: String,
    pub duration_seconds: f64,
}

/// Quick score response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreOnlyResponse {
    pub id: String,
    pub scores: ContractScores,
    pub quick_summary: String,
}

impl From<&ContractAnalysis> for ScoreOnlyResponse {
    fn from(analysis: &ContractAnalysis) -> Self {
        Self {
            id: analysis.id.clone(),
            scores: analysis.scores.clone(),
            quick_summary: analysis.summary.clone(),
        }
    }
}

/// Error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub code: String,
}

/// Generate a new analysis id: `contract_` followed by 12 hex characters.
pub fn new_analysis_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("contract_{}", &hex[..12])
}
