//! Prompt templates for each compliance check.
//!
//! Every analysis prompt asks for the same JSON shape (`category`, `summary`,
//! `score`, `breakdown`, `flags`, `positive_aspects`, `recommendations`);
//! only the persona, the breakdown keys, the flag categories and the list of
//! things to look for differ per check.

use crate::models::{CheckCategory, ContractType};

/// System prompt for a check.
pub fn system_prompt(check: CheckCategory) -> &'static str {
    match check {
        CheckCategory::Islamic => ISLAMIC_SYSTEM_PROMPT,
        CheckCategory::ArtistRights => ARTIST_RIGHTS_SYSTEM_PROMPT,
        CheckCategory::Privacy => PRIVACY_SYSTEM_PROMPT,
        CheckCategory::Legal => LEGAL_SYSTEM_PROMPT,
        CheckCategory::FairTerms => FAIR_TERMS_SYSTEM_PROMPT,
    }
}

/// Breakdown score keys requested for a check.
pub fn breakdown_keys(check: CheckCategory) -> &'static [&'static str] {
    match check {
        CheckCategory::Islamic => &[
            "riba_free",
            "gharar_free",
            "halal_industry",
            "fair_terms",
            "transparency",
        ],
        CheckCategory::ArtistRights => &[
            "ownership_retained",
            "royalty_fairness",
            "termination_rights",
            "creative_control",
            "exclusivity_balance",
        ],
        CheckCategory::Privacy => &[
            "data_minimization",
            "consent_clarity",
            "sharing_limits",
            "retention_policy",
            "user_rights",
        ],
        CheckCategory::Legal => &[
            "enforceability",
            "liability_balance",
            "dispute_resolution",
            "termination_clarity",
            "jurisdiction_fairness",
        ],
        CheckCategory::FairTerms => &[
            "fee_transparency",
            "renewal_fairness",
            "balance",
            "exit_rights",
            "change_protection",
        ],
    }
}

fn focus(check: CheckCategory) -> &'static str {
    match check {
        CheckCategory::Islamic => "Islamic (Shariah) compliance",
        CheckCategory::ArtistRights => "artist/creator rights and protections",
        CheckCategory::Privacy => "privacy and data protection compliance",
        CheckCategory::Legal => "legal red flags and problematic clauses",
        CheckCategory::FairTerms => "fairness and balanced terms",
    }
}

fn look_for(check: CheckCategory) -> &'static str {
    match check {
        CheckCategory::Islamic => {
            "riba (interest), gharar (uncertainty), maysir (gambling), haram_industry (forbidden sectors), dhulm (oppression), tadlis (deception)"
        }
        CheckCategory::ArtistRights => {
            "360 deals, perpetual rights grabs, low royalty rates, impossible termination clauses, work-for-hire provisions, unlimited exclusivity, creative control surrenders"
        }
        CheckCategory::Privacy => {
            "excessive data collection, unclear consent, unlimited data sharing, indefinite retention, lack of deletion rights, no DPA provisions"
        }
        CheckCategory::Legal => {
            "overbroad non-competes, unlimited liability, one-sided indemnification, unfavorable jurisdiction, waiver of jury trial, class action waivers"
        }
        CheckCategory::FairTerms => {
            "hidden fees, auto-renewal traps, one-sided modification rights, excessive penalties, take-it-or-leave-it provisions, buried important terms"
        }
    }
}

fn reference_hint(check: CheckCategory) -> &'static str {
    match check {
        CheckCategory::Islamic => "Quran/Hadith reference if applicable",
        CheckCategory::ArtistRights => "Industry standard reference if applicable",
        CheckCategory::Privacy => "GDPR/CCPA article if applicable",
        CheckCategory::Legal => "Legal principle or case law",
        CheckCategory::FairTerms => "Consumer protection principle",
    }
}

/// Build the full analysis prompt for one check.
pub fn analysis_prompt(
    check: CheckCategory,
    contract_type: ContractType,
    language: &str,
    contract_text: &str,
) -> String {
    let breakdown = breakdown_keys(check)
        .iter()
        .map(|key| format!("    \"{}\": <0-100>", key))
        .collect::<Vec<_>>()
        .join(",\n");

    let flag_categories = check
        .flag_categories()
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join("|");

    let scholarly = if check == CheckCategory::Islamic {
        ",\n  \"scholarly_notes\": \"Optional note on the scholarly opinions relied on\""
    } else {
        ""
    };

    let mut prompt = String::new();
    prompt.push_str(&format!(
        "Analyze the following contract for {}.\n\n",
        focus(check)
    ));
    prompt.push_str(&format!(
        "CONTRACT TYPE: {} ({})\n",
        contract_type.label(),
        contract_type.as_str()
    ));
    prompt.push_str(&format!("CONTRACT LANGUAGE: {}\n\n", language));
    prompt.push_str("CONTRACT TEXT:\n---\n");
    prompt.push_str(contract_text);
    prompt.push_str("\n---\n\n");
    prompt.push_str("Provide a detailed assessment in the following JSON format:\n\n");
    prompt.push_str(&format!(
        r#"{{
  "category": "{category}",
  "summary": "A 2-3 sentence assessment",
  "score": <0-100 overall score>,
  "breakdown": {{
{breakdown}
  }},
  "flags": [
    {{
      "severity": "<critical|warning|info>",
      "category": "<{flag_categories}>",
      "clause": "The problematic clause text",
      "explanation": "Why this is problematic",
      "suggestion": "How to fix it",
      "reference": "{reference}"
    }}
  ],
  "positive_aspects": ["Terms that are already sound"],
  "recommendations": ["Actionable recommendations"]{scholarly}
}}"#,
        category = check.as_str(),
        breakdown = breakdown,
        flag_categories = flag_categories,
        reference = reference_hint(check),
        scholarly = scholarly,
    ));
    prompt.push_str(&format!("\n\nLook for: {}.\n\n", look_for(check)));
    prompt.push_str("Respond ONLY with valid JSON.");

    prompt
}

/// Build the quick-score prompt.
pub fn quick_score_prompt(contract_text: &str) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "Quickly assess this contract for Islamic compliance and return ONLY a JSON object with scores:\n\n",
    );
    prompt.push_str("CONTRACT:\n---\n");
    prompt.push_str(contract_text);
    prompt.push_str("\n---\n\n");
    prompt.push_str(QUICK_SCORE_FORMAT);
    prompt
}

/// System prompt used for the quick score.
pub fn quick_score_system_prompt() -> &'static str {
    ISLAMIC_SYSTEM_PROMPT
}

const QUICK_SCORE_FORMAT: &str = r#"Return ONLY this JSON format:
{
  "overall": <0-100>,
  "riba_free": <0-100>,
  "gharar_free": <0-100>,
  "halal_industry": <0-100>,
  "fair_terms": <0-100>,
  "transparency": <0-100>,
  "quick_summary": "One sentence summary"
}"#;

const ISLAMIC_SYSTEM_PROMPT: &str = r#"You are an expert Islamic finance scholar and contract analyst. Your role is to analyze contracts for compliance with Islamic (Shariah) principles.

You have deep knowledge of:
- Fiqh al-Muamalat (Islamic commercial law)
- The four major madhabs (Hanafi, Maliki, Shafi'i, Hanbali)
- Modern Islamic finance standards (AAOIFI, IFSB)
- Quran and Hadith references related to commerce

IMPORTANT: You are providing guidance, not issuing fatwas. Always recommend consulting a qualified scholar for final rulings."#;

const ARTIST_RIGHTS_SYSTEM_PROMPT: &str = r#"You are an expert entertainment lawyer and artist advocate. Your role is to analyze contracts to protect creators, musicians, and artists from exploitative terms.

You have deep knowledge of:
- Music industry standard practices
- Record label and publishing contracts
- Sync licensing and royalty structures
- Artist management agreements
- Creator rights and intellectual property law

Your goal is to identify terms that could harm the artist's career, income, or creative control."#;

const PRIVACY_SYSTEM_PROMPT: &str = r#"You are an expert privacy lawyer and data protection specialist. Your role is to analyze contracts for privacy and data protection compliance.

You have deep knowledge of:
- GDPR (EU General Data Protection Regulation)
- CCPA (California Consumer Privacy Act)
- Data processing agreements
- Privacy by design principles
- Consent requirements and data subject rights

Your goal is to identify data collection, sharing, and retention issues that could violate privacy laws or harm users."#;

const LEGAL_SYSTEM_PROMPT: &str = r#"You are an expert contract lawyer specializing in identifying legal red flags. Your role is to analyze contracts for clauses that could be harmful, unenforceable, or legally problematic.

You have deep knowledge of:
- Contract law across jurisdictions
- Non-compete and non-solicitation clauses
- Liability and indemnification provisions
- Dispute resolution mechanisms
- Force majeure and termination rights

Your goal is to identify legal traps, overreaching provisions, and enforceability issues."#;

const FAIR_TERMS_SYSTEM_PROMPT: &str = r#"You are a consumer rights advocate and contract fairness analyst. Your role is to analyze contracts for one-sided, hidden, or unfair terms that exploit the weaker party.

You have deep knowledge of:
- Consumer protection laws
- Standard form contract analysis
- Hidden fee structures
- Auto-renewal traps
- Unconscionable contract provisions

Your goal is to identify terms that are unfair, deceptive, or heavily weighted against one party."#;
