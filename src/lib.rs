// pagesift - text recovery and text-layer classification for uploaded documents
pub mod config;
pub mod pdf_extraction;
pub mod types;

pub use config::{ConfigError, EngineConfig};
pub use pdf_extraction::{Engine, IngestOutcome};
pub use types::{
    ClassificationBasis, Diagnostics, ExtractionError, ExtractionResult, OcrClassification, RawDocument, Strategy,
    Technique,
};
