//! Report rendering for stored analyses.

pub mod generator;
pub mod pdf;

use crate::config::ReportConfig;
use crate::models::ContractAnalysis;
use std::str::FromStr;
use thiserror::Error;

pub use generator::{generate_json_report, generate_markdown_report};
pub use pdf::generate_pdf_report;

/// Output format of a downloadable report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Pdf,
    Markdown,
    Json,
}

impl ReportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ReportFormat::Pdf => "application/pdf",
            ReportFormat::Markdown => "text/markdown; charset=utf-8",
            ReportFormat::Json => "application/json",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Pdf => "pdf",
            ReportFormat::Markdown => "md",
            ReportFormat::Json => "json",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pdf" => Ok(ReportFormat::Pdf),
            "markdown" | "md" => Ok(ReportFormat::Markdown),
            "json" => Ok(ReportFormat::Json),
            other => Err(format!(
                "unknown report format: {} (expected pdf, markdown or json)",
                other
            )),
        }
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Pdf(#[from] pdf::PdfError),

    #[error("Failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

/// A rendered report ready for download.
#[derive(Debug, Clone)]
pub struct RenderedReport {
    pub format: ReportFormat,
    pub filename: String,
    pub body: Vec<u8>,
}

/// Render an analysis in the requested format.
pub fn render(
    analysis: &ContractAnalysis,
    branding: &ReportConfig,
    format: ReportFormat,
) -> Result<RenderedReport, ReportError> {
    let body = match format {
        ReportFormat::Pdf => generate_pdf_report(analysis, branding)?,
        ReportFormat::Markdown => generate_markdown_report(analysis, branding).into_bytes(),
        ReportFormat::Json => generate_json_report(analysis)?.into_bytes(),
    };

    Ok(RenderedReport {
        format,
        filename: format!("{}_report.{}", analysis.id, format.extension()),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::generator::tests::create_test_analysis;

    #[test]
    fn test_report_format_parsing() {
        assert_eq!("PDF".parse::<ReportFormat>(), Ok(ReportFormat::Pdf));
        assert_eq!("md".parse::<ReportFormat>(), Ok(ReportFormat::Markdown));
        assert_eq!("json".parse::<ReportFormat>(), Ok(ReportFormat::Json));
        assert!("docx".parse::<ReportFormat>().is_err());
        assert_eq!(ReportFormat::default(), ReportFormat::Pdf);
    }

    #[test]
    fn test_render_each_format() {
        let analysis = create_test_analysis();
        let branding = ReportConfig::default();

        let pdf = render(&analysis, &branding, ReportFormat::Pdf).unwrap();
        assert!(pdf.body.starts_with(b"%PDF-"));
        assert_eq!(pdf.filename, "contract_0123456789ab_report.pdf");

        let md = render(&analysis, &branding, ReportFormat::Markdown).unwrap();
        assert!(String::from_utf8(md.body).unwrap().starts_with("# Contract Compliance Report"));

        let json = render(&analysis, &branding, ReportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json.body).unwrap();
        assert_eq!(value["id"], "contract_0123456789ab");
    }
}
