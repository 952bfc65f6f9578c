//! PDF diagnosis report renderer
//!
//! Produces an A4 document with a title, an optional patient table, the
//! clinical information and the diagnosis text, breaking pages as needed.
//!
//! Rendering is synchronous and CPU-bound; async callers run it on a
//! blocking thread.
//!
//! A configured TrueType/OpenType font is used when it loads. Otherwise the
//! built-in Helvetica family is used and characters outside Latin-1 are
//! replaced with `?`.

pub mod text;

use chrono::NaiveDate;
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Rgb,
};
use std::io::{BufWriter, Cursor};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::services::diagnosis::types::PatientInfo;
use text::{display_width, latin1_only, wrap};

pub const REPORT_TITLE: &str = "Pulmonary Tuberculosis Imaging Diagnosis Report";
pub const NOT_PROVIDED: &str = "Not provided";
pub const EMPTY_REPORT_PLACEHOLDER: &str = "No valid diagnosis report could be generated.";

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 20.0;
const PT_TO_MM: f32 = 0.3528;

const TITLE_SIZE: f32 = 18.0;
const HEADING_SIZE: f32 = 14.0;
const BODY_SIZE: f32 = 11.0;
const BODY_LINE_MM: f32 = 6.0;
const TABLE_ROW_MM: f32 = 8.0;
const TABLE_VALUE_X_MM: f32 = MARGIN_MM + 50.0;

/// Half-width cells per body line across the printable width
const BODY_WRAP_CELLS: usize = 85;
/// Half-width cells available in the table's value column
const TABLE_WRAP_CELLS: usize = 60;

/// Default page limit before the layout is considered runaway
pub const DEFAULT_MAX_PAGES: usize = 50;

/// Renderer errors
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("Report exceeds {0} pages")]
    TooManyPages(usize),

    /// Both the full layout and the fallback document failed
    #[error("Report rendering failed: {primary}; fallback also failed: {fallback}")]
    Fatal { primary: String, fallback: String },
}

fn pdf_err(e: impl std::fmt::Display) -> RenderError {
    RenderError::Pdf(e.to_string())
}

/// Everything printed on a report
#[derive(Debug, Clone)]
pub struct ReportInput {
    pub clinical_info: String,
    pub diagnosis_report: String,
    pub patient_info: PatientInfo,
    pub report_date: NaiveDate,
}

/// Stateless PDF renderer; cheap to clone into blocking tasks
#[derive(Clone)]
pub struct ReportRenderer {
    font: Option<Arc<Vec<u8>>>,
    max_pages: usize,
}

impl Default for ReportRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportRenderer {
    /// Renderer using the built-in fonts only
    pub fn new() -> Self {
        Self {
            font: None,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Renderer using the font at `path`; an unreadable file falls back to built-ins
    pub fn with_font_file(path: &Path) -> Self {
        match std::fs::read(path) {
            Ok(bytes) => {
                info!(path = %path.display(), "Loaded report font");
                Self {
                    font: Some(Arc::new(bytes)),
                    ..Self::new()
                }
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Report font unavailable, using built-in font"
                );
                Self::new()
            }
        }
    }

    /// Override the page limit
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Render the full report, falling back to a minimal document on layout failure
    pub fn render(&self, input: &ReportInput) -> Result<Vec<u8>, RenderError> {
        match self.render_full(input) {
            Ok(bytes) => Ok(bytes),
            Err(primary) => {
                warn!(error = %primary, "Report layout failed, producing fallback document");
                render_fallback(&primary.to_string()).map_err(|fallback| RenderError::Fatal {
                    primary: primary.to_string(),
                    fallback: fallback.to_string(),
                })
            }
        }
    }

    fn render_full(&self, input: &ReportInput) -> Result<Vec<u8>, RenderError> {
        let (doc, page, layer) =
            PdfDocument::new(REPORT_TITLE, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Page 1");
        let fonts = self.load_fonts(&doc)?;

        {
            let layer = doc.get_page(page).get_layer(layer);
            let mut writer = PageWriter::new(&doc, layer, self.max_pages);

            writer.title(&fonts.encode(REPORT_TITLE), &fonts.bold)?;

            if !input.patient_info.is_empty() {
                let date = input.report_date.format("%Y-%m-%d").to_string();
                let info = &input.patient_info;
                let rows = [
                    ("Patient Name", info.name.as_deref()),
                    ("Gender", info.gender.as_deref()),
                    ("Age", info.age.as_deref()),
                    ("Medical Record No.", info.medical_record_id.as_deref()),
                    ("Report Date", Some(date.as_str())),
                ];
                for (label, value) in rows {
                    let value = value.filter(|v| !v.trim().is_empty()).unwrap_or(NOT_PROVIDED);
                    writer.table_row(&fonts.encode(label), &fonts.encode(value), &fonts)?;
                }
                writer.gap(6.0);
            }

            writer.heading("Clinical Information", &fonts.bold)?;
            writer.paragraph(&fonts.encode(&input.clinical_info), &fonts.regular)?;
            writer.gap(6.0);

            writer.heading("Diagnosis Report", &fonts.bold)?;
            let report = if input.diagnosis_report.trim().is_empty() {
                EMPTY_REPORT_PLACEHOLDER
            } else {
                input.diagnosis_report.as_str()
            };
            writer.paragraph(&fonts.encode(report), &fonts.regular)?;
        }

        save(doc)
    }

    fn load_fonts(&self, doc: &PdfDocumentReference) -> Result<Fonts, RenderError> {
        if let Some(bytes) = &self.font {
            match doc.add_external_font(Cursor::new(bytes.as_slice())) {
                Ok(font) => {
                    return Ok(Fonts {
                        regular: font.clone(),
                        bold: font,
                        wide: true,
                    })
                }
                Err(e) => warn!(error = %e, "Report font rejected, using built-in font"),
            }
        }
        builtin_fonts(doc)
    }
}

/// Minimal document: title plus the error message
fn render_fallback(message: &str) -> Result<Vec<u8>, RenderError> {
    let (doc, page, layer) =
        PdfDocument::new(REPORT_TITLE, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Page 1");
    let fonts = builtin_fonts(&doc)?;

    {
        let mut writer = PageWriter::new(&doc, doc.get_page(page).get_layer(layer), 1);
        writer.title(REPORT_TITLE, &fonts.bold)?;
        let text = format!(
            "An error occurred while generating the diagnosis report: {}",
            message
        );
        writer.paragraph(&fonts.encode(&text), &fonts.regular)?;
    }

    save(doc)
}

fn builtin_fonts(doc: &PdfDocumentReference) -> Result<Fonts, RenderError> {
    Ok(Fonts {
        regular: doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?,
        bold: doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_err)?,
        wide: false,
    })
}

fn save(doc: PdfDocumentReference) -> Result<Vec<u8>, RenderError> {
    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf).map_err(pdf_err)?;
    buf.into_inner().map_err(pdf_err)
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    /// External font with wide glyph coverage
    wide: bool,
}

impl Fonts {
    fn encode(&self, text: &str) -> String {
        if self.wide {
            text.to_string()
        } else {
            latin1_only(text)
        }
    }
}

/// Top-down text cursor that adds pages on overflow
struct PageWriter<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    y: f32,
    pages: usize,
    max_pages: usize,
}

impl<'a> PageWriter<'a> {
    fn new(doc: &'a PdfDocumentReference, layer: PdfLayerReference, max_pages: usize) -> Self {
        Self {
            doc,
            layer,
            y: PAGE_HEIGHT_MM - MARGIN_MM,
            pages: 1,
            max_pages,
        }
    }

    fn ensure_space(&mut self, height: f32) -> Result<(), RenderError> {
        if self.y - height >= MARGIN_MM {
            return Ok(());
        }
        if self.pages >= self.max_pages {
            return Err(RenderError::TooManyPages(self.max_pages));
        }
        self.pages += 1;
        let (page, layer) = self.doc.add_page(
            Mm(PAGE_WIDTH_MM),
            Mm(PAGE_HEIGHT_MM),
            format!("Page {}", self.pages),
        );
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = PAGE_HEIGHT_MM - MARGIN_MM;
        Ok(())
    }

    fn line(
        &mut self,
        text: &str,
        size: f32,
        x: f32,
        height: f32,
        font: &IndirectFontRef,
    ) -> Result<(), RenderError> {
        self.ensure_space(height)?;
        self.y -= height;
        self.layer.use_text(text, size, Mm(x), Mm(self.y), font);
        Ok(())
    }

    fn gap(&mut self, height: f32) {
        self.y -= height;
    }

    fn title(&mut self, title: &str, font: &IndirectFontRef) -> Result<(), RenderError> {
        let approx_width = display_width(title) as f32 * TITLE_SIZE * 0.5 * PT_TO_MM;
        let x = ((PAGE_WIDTH_MM - approx_width) / 2.0).max(MARGIN_MM);

        self.layer
            .set_fill_color(Color::Rgb(Rgb::new(0.10, 0.20, 0.45, None)));
        self.line(title, TITLE_SIZE, x, 10.0, font)?;
        self.layer.set_fill_color(Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None)));
        self.gap(8.0);
        Ok(())
    }

    fn heading(&mut self, heading: &str, font: &IndirectFontRef) -> Result<(), RenderError> {
        // keep the heading with at least one body line
        self.ensure_space(8.0 + BODY_LINE_MM)?;
        self.line(heading, HEADING_SIZE, MARGIN_MM, 8.0, font)?;
        self.gap(2.0);
        Ok(())
    }

    fn paragraph(&mut self, body: &str, font: &IndirectFontRef) -> Result<(), RenderError> {
        for line in wrap(body, BODY_WRAP_CELLS) {
            self.line(&line, BODY_SIZE, MARGIN_MM, BODY_LINE_MM, font)?;
        }
        Ok(())
    }

    fn table_row(&mut self, label: &str, value: &str, fonts: &Fonts) -> Result<(), RenderError> {
        let lines = wrap(value, TABLE_WRAP_CELLS);
        let extra = lines.len().saturating_sub(1) as f32 * BODY_LINE_MM;
        self.ensure_space(TABLE_ROW_MM + extra)?;

        self.y -= TABLE_ROW_MM;
        self.layer
            .use_text(label, BODY_SIZE, Mm(MARGIN_MM + 2.0), Mm(self.y), &fonts.bold);
        for (i, line) in lines.iter().enumerate() {
            let y = self.y - i as f32 * BODY_LINE_MM;
            self.layer
                .use_text(line.as_str(), BODY_SIZE, Mm(TABLE_VALUE_X_MM), Mm(y), &fonts.regular);
        }
        self.y -= extra;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(report: &str, patient: PatientInfo) -> ReportInput {
        ReportInput {
            clinical_info: "Cough for three weeks, night sweats, low-grade fever.".to_string(),
            diagnosis_report: report.to_string(),
            patient_info: patient,
            report_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        }
    }

    fn is_pdf(bytes: &[u8]) -> bool {
        bytes.starts_with(b"%PDF")
    }

    #[test]
    fn test_renders_full_report() {
        let patient = PatientInfo {
            name: Some("Jane Doe".to_string()),
            gender: Some("F".to_string()),
            age: Some("42".to_string()),
            medical_record_id: None,
        };
        let bytes = ReportRenderer::new()
            .render(&input("Findings:\nNo active disease.\n\nImpression: normal.", patient))
            .unwrap();
        assert!(is_pdf(&bytes));
    }

    #[test]
    fn test_empty_report_and_no_patient_info_still_render() {
        let bytes = ReportRenderer::new()
            .render(&input("", PatientInfo::default()))
            .unwrap();
        assert!(is_pdf(&bytes));
    }

    #[test]
    fn test_wide_characters_with_builtin_font() {
        let patient = PatientInfo {
            name: Some("张三".to_string()),
            ..PatientInfo::default()
        };
        let bytes = ReportRenderer::new()
            .render(&input("右上肺斑片状阴影，考虑继发性肺结核。", patient))
            .unwrap();
        assert!(is_pdf(&bytes));
    }

    #[test]
    fn test_long_report_spans_pages() {
        let report = "Line of findings text.\n".repeat(150);
        let bytes = ReportRenderer::new()
            .render_full(&input(&report, PatientInfo::default()))
            .unwrap();
        assert!(is_pdf(&bytes));
    }

    #[test]
    fn test_page_overflow_falls_back() {
        let report = "Line of findings text.\n".repeat(200);
        let renderer = ReportRenderer::new().with_max_pages(2);
        let input = input(&report, PatientInfo::default());

        assert!(matches!(renderer.render_full(&input), Err(RenderError::TooManyPages(2))));

        let bytes = renderer.render(&input).unwrap();
        assert!(is_pdf(&bytes));
    }

    #[test]
    fn test_missing_font_file_uses_builtin() {
        let renderer = ReportRenderer::with_font_file(Path::new("/nonexistent/font.ttf"));
        let bytes = renderer.render(&input("ok", PatientInfo::default())).unwrap();
        assert!(is_pdf(&bytes));
    }

    #[test]
    fn test_fallback_document() {
        let bytes = render_fallback("layout exploded").unwrap();
        assert!(is_pdf(&bytes));
    }
}
