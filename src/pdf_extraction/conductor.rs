// Conductor pattern - runs whole-document strategies in priority order and decides acceptance
use crate::config::EngineConfig;
use crate::pdf_extraction::content_stream::LopdfPage;
use crate::pdf_extraction::lopdf_helper::{open_document, OpenedDocument};
use crate::pdf_extraction::page_ladder::extract_page;
use crate::pdf_extraction::raw_scan;
use crate::pdf_extraction::report;
use crate::pdf_extraction::truncator::RepresentativeTruncator;
use crate::types::{Diagnostics, ExtractionAttempt, ExtractionError, ExtractionResult, PageResult, Strategy, Technique};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, error, info, warn};

/// Strategy cascade executor
pub struct ExtractionConductor {
    config: EngineConfig,
    truncator: RepresentativeTruncator,
}

impl ExtractionConductor {
    pub fn new(config: EngineConfig) -> Self {
        let truncator = RepresentativeTruncator::from_config(&config);
        Self { config, truncator }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Strategies for a paginated document. The raw scan only runs when text is expected.
    pub fn pdf_strategies(forced: bool) -> &'static [Strategy] {
        if forced {
            &[Strategy::PageLadder, Strategy::RawStreamScan]
        } else {
            &[Strategy::PageLadder]
        }
    }

    /// Full extraction of a paginated document.
    pub async fn extract(&self, bytes: &[u8], forced: bool) -> ExtractionResult {
        self.cascade(bytes, forced, Self::pdf_strategies(forced)).await
    }

    /// Extraction of a document that is already text.
    pub async fn extract_plain_text(&self, bytes: &[u8], forced: bool) -> ExtractionResult {
        self.cascade(bytes, forced, &[Strategy::PlainText]).await
    }

    /// Runs `strategies` in order until one yields enough text. The document is
    /// opened once and shared by every strategy that reads its structure.
    pub async fn cascade(&self, bytes: &[u8], forced: bool, strategies: &[Strategy]) -> ExtractionResult {
        let required = self.config.min_chars(forced);
        let mut attempted = Vec::new();
        let mut best: Option<ExtractionAttempt> = None;
        let mut open_error: Option<ExtractionError> = None;
        let mut open_attempts = 0;

        info!(forced, required, strategies = strategies.len(), bytes = bytes.len(), "starting extraction");

        let opened = if strategies.iter().any(|s| s.reads_structure()) {
            match open_document(bytes, forced) {
                Ok(opened) => {
                    open_attempts = opened.attempts;
                    Some(opened)
                }
                Err(e) => {
                    warn!(error = %e, "document could not be opened");
                    if let ExtractionError::DocumentOpen { attempts, .. } = &e {
                        open_attempts = *attempts;
                    }
                    open_error = Some(e);
                    None
                }
            }
        } else {
            None
        };

        for &strategy in strategies {
            attempted.push(strategy);

            let Some(attempt) = self.run_strategy(strategy, bytes, opened.as_ref()).await else {
                debug!(strategy = strategy.name(), "strategy skipped, document not open");
                continue;
            };

            let truncated = self.truncator.truncate(&attempt);

            if truncated.sampled_chars >= required {
                info!(
                    strategy = strategy.name(),
                    pages_processed = attempt.pages_processed,
                    pages_with_text = attempt.pages_with_text,
                    total_chars = attempt.total_chars,
                    annotated = truncated.annotated,
                    "extraction succeeded"
                );
                let diagnostics = self.diagnostics(&attempt, required, &attempted, open_attempts, None);
                return report::success(&truncated.text, truncated.annotated, diagnostics);
            }

            debug!(
                strategy = strategy.name(),
                sampled_chars = truncated.sampled_chars,
                required,
                "strategy yielded too little text"
            );

            // Keep the first attempt unless a later one recovered more
            let better = best
                .as_ref()
                .map_or(true, |b| attempt.total_chars > b.total_chars);
            if better {
                best = Some(attempt);
            }
        }

        let error_text = open_error.as_ref().map(|e| e.to_string());
        match best {
            Some(attempt) => {
                let diagnostics = self.diagnostics(&attempt, required, &attempted, open_attempts, error_text);
                let insufficient = ExtractionError::InsufficientText {
                    found: attempt.total_chars,
                    required,
                };
                if forced {
                    error!(
                        pages_processed = attempt.pages_processed,
                        pages_with_text = attempt.pages_with_text,
                        error = %insufficient,
                        "text-bearing document yielded no usable text"
                    );
                } else {
                    info!(pages_with_text = attempt.pages_with_text, error = %insufficient, "no usable text");
                }
                let metadata = opened.as_ref().map(OpenedDocument::metadata);
                report::insufficient_text(forced, diagnostics, metadata.as_ref())
            }
            None => {
                let diagnostics = Diagnostics {
                    required_chars: required,
                    strategies_attempted: attempted,
                    open_attempts,
                    ..Default::default()
                };
                let e = open_error.unwrap_or(ExtractionError::DocumentOpen {
                    attempts: open_attempts,
                    reason: "no strategy could run".to_string(),
                });
                if forced {
                    error!(error = %e, "document could not be opened");
                } else {
                    warn!(error = %e, "document could not be opened");
                }
                report::open_failure(forced, &e, diagnostics)
            }
        }
    }

    /// `None` when the strategy needs a parsed document and there is none.
    async fn run_strategy(
        &self,
        strategy: Strategy,
        bytes: &[u8],
        opened: Option<&OpenedDocument>,
    ) -> Option<ExtractionAttempt> {
        match (strategy, opened) {
            (Strategy::PageLadder, Some(opened)) => Some(self.run_page_ladder(opened).await),
            (Strategy::PageLadder, None) => None,
            (Strategy::RawStreamScan, Some(opened)) => {
                let pages = opened.page_ids();
                let limit = pages.len().min(self.config.max_pages);
                Some(raw_scan::scan_pages(&opened.document, &pages[..limit], pages.len()))
            }
            // Nothing parsed, so there are no pages to scope the scan to
            (Strategy::RawStreamScan, None) => Some(raw_scan::scan(bytes)),
            (Strategy::PlainText, _) => {
                let text = String::from_utf8_lossy(bytes).trim().to_string();
                Some(ExtractionAttempt::from_blob(Strategy::PlainText, text))
            }
        }
    }

    /// Runs the technique ladder over each page of an opened document in ascending order.
    pub async fn run_page_ladder(&self, opened: &OpenedDocument) -> ExtractionAttempt {
        let pages = opened.page_ids();
        let num_pages = pages.len();
        let limit = num_pages.min(self.config.max_pages);

        info!(num_pages, limit, config = opened.config.name, "processing pages");

        let mut attempt = ExtractionAttempt::empty(Strategy::PageLadder, num_pages);
        for &(number, page_id) in pages.iter().take(limit) {
            let result = {
                let page = LopdfPage::new(&opened.document, page_id, number, opened.config.use_font_cmaps);
                match catch_unwind(AssertUnwindSafe(|| extract_page(&page))) {
                    Ok(Ok(result)) => result,
                    Ok(Err(e)) => {
                        warn!(page = number, error = %e, "page skipped");
                        PageResult::empty(number)
                    }
                    Err(_) => {
                        warn!(page = number, "page decoder panicked; page skipped");
                        PageResult::empty(number)
                    }
                }
            };
            attempt = attempt.with_page(&result);

            // Pages are strictly sequential; only let other tasks run in between
            tokio::task::yield_now().await;
        }

        info!(
            pages_processed = attempt.pages_processed,
            pages_with_text = attempt.pages_with_text,
            total_chars = attempt.total_chars,
            "page extraction finished"
        );
        attempt
    }

    fn diagnostics(
        &self,
        attempt: &ExtractionAttempt,
        required: usize,
        attempted: &[Strategy],
        open_attempts: usize,
        error: Option<String>,
    ) -> Diagnostics {
        Diagnostics {
            techniques_attempted: techniques_attempted(attempt),
            strategies_attempted: attempted.to_vec(),
            open_attempts,
            error,
            ..Diagnostics::from_attempt(attempt, required)
        }
    }
}

/// Techniques that ran on at least one page. A page without text exhausted the ladder.
pub fn techniques_attempted(attempt: &ExtractionAttempt) -> Vec<Technique> {
    let deepest = if attempt.pages_with_text < attempt.pages_processed {
        Technique::ALL.len()
    } else {
        attempt
            .technique_counts
            .keys()
            .map(|t| t.ordinal())
            .max()
            .unwrap_or(0)
    };
    Technique::ALL[..deepest].to_vec()
}
