// PDF extraction module
pub mod attempts;
pub mod cmap;
pub mod conductor;
pub mod content_stream;
pub mod document_analyzer;
pub mod extraction_router;
pub mod lopdf_helper;
pub mod page_ladder;
pub mod raw_scan;
pub mod report;
pub mod truncator;

pub use conductor::ExtractionConductor;
pub use content_stream::{LopdfPage, PageHandle};
pub use document_analyzer::DocumentAnalyzer;
pub use extraction_router::{Engine, IngestOutcome, Route};
pub use lopdf_helper::{open_document, DocumentMetadata, OpenConfig};
pub use page_ladder::extract_page;
pub use truncator::{RepresentativeTruncator, Truncated};
