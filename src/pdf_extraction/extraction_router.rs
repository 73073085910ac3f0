// Extraction router - dispatches a document to the right path by its declared format
use crate::config::EngineConfig;
use crate::pdf_extraction::conductor::ExtractionConductor;
use crate::pdf_extraction::document_analyzer::DocumentAnalyzer;
use crate::pdf_extraction::report;
use crate::types::{Diagnostics, ExtractionResult, OcrClassification, RawDocument};
use serde::Serialize;
use tracing::info;

/// How a document is handled, decided from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Paginated,
    PlainText,
    Unsupported,
}

/// Classification and the extraction it led to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestOutcome {
    pub classification: OcrClassification,
    pub extraction: ExtractionResult,
}

/// Entry point: one engine per configuration, reusable across documents.
pub struct Engine {
    conductor: ExtractionConductor,
    analyzer: DocumentAnalyzer,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            analyzer: DocumentAnalyzer::new(config.clone()),
            conductor: ExtractionConductor::new(config),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        self.conductor.config()
    }

    pub fn route(&self, extension: &str) -> Route {
        if extension == "pdf" {
            Route::Paginated
        } else if self.config().is_plain_text(extension) {
            Route::PlainText
        } else {
            Route::Unsupported
        }
    }

    /// Full extraction. Never fails; problems come back as failure outcomes.
    pub async fn extract(&self, document: &RawDocument, forced: bool) -> ExtractionResult {
        let extension = document.normalized_extension();
        match self.route(&extension) {
            Route::Paginated => self.conductor.extract(&document.bytes, forced).await,
            Route::PlainText => self.conductor.extract_plain_text(&document.bytes, forced).await,
            Route::Unsupported => {
                info!(extension = %extension, forced, "format not extractable");
                let diagnostics = Diagnostics {
                    required_chars: self.config().min_chars(forced),
                    ..Default::default()
                };
                report::unsupported_format(forced, &extension, diagnostics)
            }
        }
    }

    pub async fn classify(&self, document: &RawDocument) -> OcrClassification {
        self.analyzer.classify(document).await
    }

    /// Classifies, then extracts in the mode the classification implies.
    pub async fn ingest(&self, document: &RawDocument) -> IngestOutcome {
        let classification = self.classify(document).await;
        let extraction = self.extract(document, classification.has_text).await;
        IngestOutcome {
            classification,
            extraction,
        }
    }
}
