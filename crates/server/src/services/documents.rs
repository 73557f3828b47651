//! Affidavit PDF rendering.
//!
//! Produces a plain text rendition of the attested form. The layout is a
//! single column of labelled lines in three sections; pages are added as
//! needed.

use affidavit_core::{AffidavitForm, FormError, SubmissionId};
use chrono::{DateTime, Utc};
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};
use thiserror::Error;

const PAGE_WIDTH: Mm = Mm(210.0);
const PAGE_HEIGHT: Mm = Mm(297.0);
const MARGIN: f32 = 20.0;
const LINE_HEIGHT: f32 = 6.0;
const WRAP_COLUMNS: usize = 90;

/// Errors that can occur while rendering a document.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The PDF library failed.
    #[error("PDF error: {0}")]
    Pdf(String),

    /// The form cannot be rendered.
    #[error("Form error: {0}")]
    Form(#[from] FormError),
}

/// Writes lines top to bottom, starting new pages when full.
struct PageWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    y: f32,
}

impl PageWriter {
    fn new(title: &str) -> Result<Self, DocumentError> {
        let (doc, page, layer) = PdfDocument::new(title, PAGE_WIDTH, PAGE_HEIGHT, "Layer 1");
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| DocumentError::Pdf(e.to_string()))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| DocumentError::Pdf(e.to_string()))?;
        let layer = doc.get_page(page).get_layer(layer);

        Ok(Self {
            doc,
            layer,
            regular,
            bold,
            y: PAGE_HEIGHT.0 - MARGIN,
        })
    }

    fn advance(&mut self, by: f32) {
        self.y -= by;
        if self.y < MARGIN {
            let (page, layer) = self.doc.add_page(PAGE_WIDTH, PAGE_HEIGHT, "Layer 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_HEIGHT.0 - MARGIN;
        }
    }

    fn heading(&mut self, text: &str, size: f32) {
        self.layer
            .use_text(text, size, Mm(MARGIN), Mm(self.y), &self.bold);
        self.advance(LINE_HEIGHT * 1.5);
    }

    fn line(&mut self, text: &str) {
        for chunk in wrap(text, WRAP_COLUMNS) {
            self.layer
                .use_text(chunk, 10.0, Mm(MARGIN), Mm(self.y), &self.regular);
            self.advance(LINE_HEIGHT);
        }
    }

    fn field(&mut self, label: &str, value: &str) {
        self.line(&format!("{label}: {value}"));
    }

    fn gap(&mut self) {
        self.advance(LINE_HEIGHT);
    }

    fn finish(self) -> Result<Vec<u8>, DocumentError> {
        self.doc
            .save_to_bytes()
            .map_err(|e| DocumentError::Pdf(e.to_string()))
    }
}

/// Greedy word wrap. Words longer than `width` are split.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word = word.to_string();
        while word.chars().count() > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let head: String = word.chars().take(width).collect();
            word = word.chars().skip(width).collect();
            lines.push(head);
        }
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Render the affidavit for a submission.
///
/// # Errors
///
/// Returns an error if the signature cannot be decoded or the PDF cannot be
/// written.
pub fn render_affidavit_pdf(
    id: &SubmissionId,
    form: &AffidavitForm,
    submitted_at: DateTime<Utc>,
) -> Result<Vec<u8>, DocumentError> {
    let signature = form.signature_bytes()?;
    let mut page = PageWriter::new(&format!("Affidavit {id}"))?;

    page.heading("Product Use Affidavit", 16.0);
    page.field("Submission", id.as_str());
    page.field("Submitted", &submitted_at.format("%Y-%m-%d %H:%M UTC").to_string());
    page.gap();

    page.heading("Contact Information", 12.0);
    page.field("Name", &form.name);
    page.field("Company", &form.company);
    page.field("Address", &form.address1);
    if let Some(line2) = &form.address2 {
        page.field("Address (cont.)", line2);
    }
    page.field(
        "City / State / Postal",
        &format!("{}, {} {}", form.city, form.state, form.postal),
    );
    page.field("Country", &form.country);
    page.field("Telephone", &form.telephone);
    page.field("Email", &form.email);
    page.gap();

    page.heading("Product Use", 12.0);
    page.field("Product codes", &form.product_codes);
    page.field("Contact with human tissue", &form.contact_tissue);
    page.field("Form of contact", &form.how_form);
    page.field("Implanted", &form.implanted);
    if let Some(days) = form.implant_days {
        page.field("Implant duration (days)", &days.to_string());
    }
    page.field("Protocol", &form.protocol);
    page.gap();

    page.heading("Attestation", 12.0);
    page.line(
        "The undersigned attests that the information above is true and that the \
         products listed will be used only as described.",
    );
    page.gap();
    page.field("Printed name", &form.print_name);
    page.field("Title", &form.title);
    page.field("Date", &form.date);
    page.field(
        "Signature",
        &format!("captured image ({} bytes), signed by {}", signature.len(), form.print_name),
    );

    page.finish()
}
