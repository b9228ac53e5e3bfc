//! PDF report rendering.
//!
//! The report is laid out as wrapped text lines on A4 pages using the
//! builtin Helvetica fonts, which only cover Latin-1.

use crate::analysis::aggregator::group_by_severity;
use crate::config::ReportConfig;
use crate::models::ContractAnalysis;
use crate::report::generator::humanize_key;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
/// Millimetres per point.
const PT_TO_MM: f32 = 0.3528;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Title,
    Heading,
    Body,
    Small,
}

impl Style {
    fn font_size(self) -> f32 {
        match self {
            Style::Title => 18.0,
            Style::Heading => 13.0,
            Style::Body => 10.0,
            Style::Small => 8.0,
        }
    }

    fn bold(self) -> bool {
        matches!(self, Style::Title | Style::Heading)
    }

    /// Characters that fit on one line, assuming an average glyph width of
    /// half the font size.
    fn max_chars(self) -> usize {
        let usable = PAGE_WIDTH - 2.0 * MARGIN;
        (usable / (self.font_size() * 0.5 * PT_TO_MM)) as usize
    }

    fn line_height(self) -> f32 {
        self.font_size() * PT_TO_MM * 1.5
    }
}

/// Errors raised while building the PDF.
#[derive(Debug, thiserror::Error)]
#[error("Failed to render PDF: {0}")]
pub struct PdfError(String);

/// Render an analysis as a PDF document.
pub fn generate_pdf_report(
    analysis: &ContractAnalysis,
    branding: &ReportConfig,
) -> Result<Vec<u8>, PdfError> {
    let lines = report_lines(analysis, branding);

    let (doc, page, layer) = PdfDocument::new(
        format!("Contract Compliance Report {}", analysis.id),
        Mm(PAGE_WIDTH),
        Mm(PAGE_HEIGHT),
        "Layer 1".to_string(),
    );
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| PdfError(e.to_string()))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| PdfError(e.to_string()))?;

    let mut writer = PageWriter {
        doc: &doc,
        layer: doc.get_page(page).get_layer(layer),
        y: PAGE_HEIGHT - MARGIN,
    };

    for (style, text) in lines {
        let font = if style.bold() { &bold } else { &regular };
        if text.is_empty() {
            writer.advance(style.line_height() * 0.5);
            continue;
        }
        for line in wrap_text(&to_latin1(&text), style.max_chars()) {
            writer.write(&line, style, font);
        }
    }

    doc.save_to_bytes().map_err(|e| PdfError(e.to_string()))
}

struct PageWriter<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    y: f32,
}

impl PageWriter<'_> {
    fn advance(&mut self, height: f32) {
        self.y -= height;
        if self.y < MARGIN {
            let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_HEIGHT - MARGIN;
        }
    }

    fn write(&mut self, text: &str, style: Style, font: &IndirectFontRef) {
        self.advance(style.line_height());
        self.layer
            .use_text(text, style.font_size(), Mm(MARGIN), Mm(self.y), font);
    }
}

/// Plain text content of the report, line by line.
fn report_lines(analysis: &ContractAnalysis, branding: &ReportConfig) -> Vec<(Style, String)> {
    let mut lines = Vec::new();
    let mut push = |style: Style, text: String| lines.push((style, text));

    push(Style::Title, "Contract Compliance Report".to_string());
    push(Style::Small, String::new());
    push(Style::Body, format!("Analysis ID: {}", analysis.id));
    push(
        Style::Body,
        format!("Date: {}", analysis.created_at.format("%Y-%m-%d %H:%M:%S UTC")),
    );
    push(Style::Body, format!("Contract Type: {}", analysis.contract_type.label()));
    push(
        Style::Body,
        format!(
            "Checks: {}",
            analysis
                .checks
                .iter()
                .map(|c| c.display_name())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    );
    push(Style::Body, format!("Model: {}", analysis.model_used));
    push(Style::Body, String::new());

    push(Style::Heading, "Summary".to_string());
    for paragraph in analysis.summary.split('\n') {
        push(Style::Body, paragraph.to_string());
    }
    push(Style::Body, String::new());

    let scores = &analysis.scores;
    push(Style::Heading, format!("Overall Score: {}/100", scores.overall));
    for (name, score) in [
        ("Riba Free", scores.riba_free),
        ("Gharar Free", scores.gharar_free),
        ("Halal Industry", scores.halal_industry),
        ("Fair Terms", scores.fair_terms),
        ("Transparency", scores.transparency),
    ] {
        if let Some(score) = score {
            push(Style::Body, format!("{}: {}/100", name, score));
        }
    }
    for category in &scores.categories {
        push(
            Style::Body,
            format!("{}: {}/100", category.category.display_name(), category.overall),
        );
        for (key, score) in &category.breakdown {
            push(Style::Small, format!("    {}: {}", humanize_key(key), score));
        }
    }
    push(Style::Body, String::new());

    let summary = &analysis.flag_summary;
    push(
        Style::Heading,
        format!(
            "Flags: {} total ({} critical, {} warning, {} info)",
            summary.total, summary.critical, summary.warning, summary.info
        ),
    );
    for (severity, group) in group_by_severity(&analysis.flags) {
        for flag in group {
            push(
                Style::Body,
                format!(
                    "[{}] {}: {}",
                    severity.to_string().to_uppercase(),
                    humanize_key(flag.category.as_str()),
                    flag.clause
                ),
            );
            if !flag.explanation.is_empty() {
                push(Style::Small, format!("Issue: {}", flag.explanation));
            }
            if !flag.suggestion.is_empty() {
                push(Style::Small, format!("Suggestion: {}", flag.suggestion));
            }
            if let Some(ref reference) = flag.reference {
                push(Style::Small, format!("Reference: {}", reference));
            }
            push(Style::Small, String::new());
        }
    }

    for (title, items) in [
        ("Positive Aspects", &analysis.positive_aspects),
        ("Recommendations", &analysis.recommendations),
    ] {
        if items.is_empty() {
            continue;
        }
        push(Style::Heading, title.to_string());
        for (i, item) in items.iter().enumerate() {
            push(Style::Body, format!("{}. {}", i + 1, item));
        }
        push(Style::Body, String::new());
    }

    if let Some(ref notes) = analysis.scholarly_notes {
        push(Style::Heading, "Scholarly Notes".to_string());
        push(Style::Body, notes.clone());
        push(Style::Body, String::new());
    }

    for failed in &analysis.failed_checks {
        push(
            Style::Small,
            format!("Not completed: {} ({})", failed.check.display_name(), failed.error),
        );
    }

    push(
        Style::Small,
        format!(
            "Generated by {} ({}). Guidance only, not a legal opinion or fatwa.",
            branding.company_name, branding.company_website
        ),
    );

    lines
}

/// Replace characters the builtin fonts cannot encode.
fn to_latin1(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2013}' | '\u{2014}' => '-',
            '\t' => ' ',
            c if (c as u32) < 0x20 => ' ',
            c if (c as u32) <= 0xFF => c,
            _ => '?',
        })
        .collect()
}

/// Greedy word wrap; words longer than a line are split.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > max_chars {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word.split_off(max_chars);
            lines.push(word.into_iter().collect());
            word = rest;
        }

        let needed = if current_len == 0 { word.len() } else { current_len + 1 + word.len() };
        if needed > max_chars && current_len > 0 {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current_len += word.len();
        current.extend(word);
    }

    if current_len > 0 {
        lines.push(current);
    }
    lines
}
