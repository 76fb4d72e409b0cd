use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;
use std::process::Command;
use std::time::Instant;

use rust_decimal::Decimal;

use super::composer::DocumentComposer;
use crate::core::{DocumentError, DocumentResult, Settings};
use crate::metrics;
use crate::models::InvoiceDocument;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// A compiled invoice ready to be sent to the client.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: &'static str,
    pub pages: usize,
}

/// Compiles composed invoices to PDF with the `typst` CLI.
///
/// Each render works in its own scratch directory, removed when the render
/// ends whether it succeeded or not.
#[derive(Debug, Clone)]
pub struct PdfGenerator {
    composer: DocumentComposer,
    typst_binary: String,
    scratch_dir: PathBuf,
}

impl PdfGenerator {
    pub fn new(composer: DocumentComposer) -> Self {
        PdfGenerator {
            composer,
            typst_binary: "typst".to_string(),
            scratch_dir: std::env::temp_dir(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let composer = DocumentComposer::new(super::PageLayout::for_config(settings.pdf_config()));
        let mut generator = PdfGenerator::new(composer).with_typst_binary(settings.typst_binary.clone());
        if let Some(dir) = &settings.scratch_dir {
            generator = generator.with_scratch_dir(dir);
        }
        generator
    }

    pub fn with_typst_binary(mut self, binary: impl Into<String>) -> Self {
        self.typst_binary = binary.into();
        self
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    pub fn composer(&self) -> &DocumentComposer {
        &self.composer
    }

    /// Composes and compiles `doc` on the blocking pool.
    pub async fn render(
        &self,
        doc: InvoiceDocument,
        paid: Option<Decimal>,
    ) -> DocumentResult<RenderedDocument> {
        let generator = self.clone();
        let number = doc.number.clone();
        let timer = Instant::now();

        let result = tokio::task::spawn_blocking(move || generator.render_blocking(&doc, paid))
            .await
            .map_err(|e| DocumentError::Generation(format!("render task failed: {}", e)))
            .and_then(|r| r);

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        metrics::DOCUMENTS_RENDERED
            .with_label_values(&[outcome])
            .inc();
        metrics::RENDER_DURATION.observe(timer.elapsed().as_secs_f64());

        match &result {
            Ok(rendered) => tracing::info!(
                number = %number,
                pages = rendered.pages,
                bytes = rendered.bytes.len(),
                "rendered invoice"
            ),
            Err(e) => tracing::error!(number = %number, error = %e, "failed to render invoice"),
        }
        result
    }

    fn render_blocking(
        &self,
        doc: &InvoiceDocument,
        paid: Option<Decimal>,
    ) -> DocumentResult<RenderedDocument> {
        let scratch = tempfile::Builder::new()
            .prefix("invoice-")
            .tempdir_in(&self.scratch_dir)?;
        let source_path = scratch.path().join("invoice.typ");
        let pdf_path = scratch.path().join("invoice.pdf");

        let sink = BufWriter::new(File::create(&source_path)?);
        let composed = self.composer.compose(doc, paid, sink)?;
        let pages = composed.pages;
        drop(composed.sink);

        let output = Command::new(&self.typst_binary)
            .arg("compile")
            .arg(&source_path)
            .arg(&pdf_path)
            .output()
            .map_err(|e| {
                DocumentError::Generation(format!("could not run {}: {}", self.typst_binary, e))
            })?;

        if !output.status.success() {
            return Err(DocumentError::Generation(format!(
                "typst compilation failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let bytes = fs::read(&pdf_path)?;
        Ok(RenderedDocument {
            bytes,
            file_name: doc.file_name(),
            content_type: PDF_CONTENT_TYPE,
            pages,
        })
    }
}
