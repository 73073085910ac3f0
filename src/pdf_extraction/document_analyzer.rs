// Document analyzer - cheap "does this contain text" check, separate from full extraction
use crate::config::EngineConfig;
use crate::pdf_extraction::content_stream::{LopdfPage, PageHandle};
use crate::pdf_extraction::lopdf_helper::open_document;
use crate::pdf_extraction::page_ladder::{filtered_join, operator_text};
use crate::types::{ClassificationBasis, OcrClassification, RawDocument, Result};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, info, warn};

pub struct DocumentAnalyzer {
    config: EngineConfig,
}

impl DocumentAnalyzer {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Paginated documents are sampled; everything else is judged by extension alone.
    pub async fn classify(&self, document: &RawDocument) -> OcrClassification {
        let extension = document.normalized_extension();

        if extension == "pdf" {
            return self.sample_pdf(&document.bytes).await;
        }

        let (has_text, basis) = if self.config.is_always_text(&extension) {
            (true, ClassificationBasis::AlwaysTextFormat)
        } else {
            (false, ClassificationBasis::UnrecognizedFormat)
        };
        debug!(extension = %extension, has_text, "classified by extension");

        OcrClassification {
            has_text,
            sampled_chars: 0,
            basis,
        }
    }

    /// Samples the first pages with the cheapest technique, then once with the
    /// operator scan if that found nothing.
    pub async fn sample_pdf(&self, bytes: &[u8]) -> OcrClassification {
        let opened = match open_document(bytes, false) {
            Ok(opened) => opened,
            Err(e) => {
                warn!(error = %e, "classifier could not open document");
                return OcrClassification {
                    has_text: false,
                    sampled_chars: 0,
                    basis: ClassificationBasis::Unreadable,
                };
            }
        };

        let pages = opened.page_ids();
        let use_cmaps = opened.config.use_font_cmaps;
        let mut basis = ClassificationBasis::SampledContent;

        let mut sampled = 0;
        for &(number, page_id) in pages.iter().take(self.config.classifier_sample_pages) {
            let page = LopdfPage::new(&opened.document, page_id, number, use_cmaps);
            sampled += sample_page(page, |p| p.text_content().map(|f| filtered_join(&f)));
            tokio::task::yield_now().await;
        }

        if sampled == 0 {
            basis = ClassificationBasis::OperatorFallback;
            for &(number, page_id) in pages.iter().take(self.config.classifier_operator_pages) {
                let page = LopdfPage::new(&opened.document, page_id, number, use_cmaps);
                sampled += sample_page(page, |p| p.operator_list().map(|ops| operator_text(&ops)));
                tokio::task::yield_now().await;
            }
        }

        let has_text = sampled > self.config.classifier_min_chars;
        info!(pages = pages.len(), sampled_chars = sampled, has_text, "classification finished");

        OcrClassification {
            has_text,
            sampled_chars: sampled,
            basis,
        }
    }
}

// Characters one technique recovers from one page; failures count as nothing.
// Takes the page by value so it is gone before the next await.
fn sample_page<F>(page: LopdfPage<'_>, technique: F) -> usize
where
    F: Fn(&LopdfPage<'_>) -> Result<String>,
{
    match catch_unwind(AssertUnwindSafe(|| technique(&page))) {
        Ok(Ok(text)) => text.chars().count(),
        Ok(Err(e)) => {
            debug!(page = page.number(), error = %e, "sample failed");
            0
        }
        Err(_) => {
            warn!(page = page.number(), "decoder panicked while sampling");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_allow_list_needs_no_decoding() {
        let analyzer = DocumentAnalyzer::new(EngineConfig::default());
        let doc = RawDocument::new(b"\x00\x01 not really a docx".to_vec(), "DOCX");

        let result = analyzer.classify(&doc).await;
        assert!(result.has_text);
        assert_eq!(result.basis, ClassificationBasis::AlwaysTextFormat);
    }

    #[tokio::test]
    async fn test_unknown_extension_is_negative() {
        let analyzer = DocumentAnalyzer::new(EngineConfig::default());
        let doc = RawDocument::new(b"plain words everywhere".to_vec(), "xyz");

        let result = analyzer.classify(&doc).await;
        assert!(!result.has_text);
        assert_eq!(result.basis, ClassificationBasis::UnrecognizedFormat);
    }

    #[tokio::test]
    async fn test_unreadable_pdf_is_negative() {
        let analyzer = DocumentAnalyzer::new(EngineConfig::default());
        let result = analyzer.classify(&RawDocument::new(b"junk".to_vec(), "pdf")).await;

        assert!(!result.has_text);
        assert_eq!(result.basis, ClassificationBasis::Unreadable);
    }
}
