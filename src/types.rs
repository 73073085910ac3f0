// Core types and error taxonomy for pagesift
use serde::Serialize;
use std::collections::BTreeMap;

/// Uploaded file as handed over by the caller. Never mutated or persisted.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub bytes: Vec<u8>,
    pub extension: String,
}

impl RawDocument {
    pub fn new(bytes: impl Into<Vec<u8>>, extension: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            extension: extension.into(),
        }
    }

    /// Takes the extension from the part of `file_name` after the last dot.
    pub fn from_file_name(bytes: impl Into<Vec<u8>>, file_name: &str) -> Self {
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .unwrap_or_default();
        Self::new(bytes, extension)
    }

    pub fn normalized_extension(&self) -> String {
        self.extension.trim().trim_start_matches('.').to_lowercase()
    }
}

/// One way of recovering text from a decoded page, in ladder order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Technique {
    FilteredJoin,
    RawConcat,
    NonEmptyJoin,
    EndOfLine,
    Positional,
    AllProperties,
    OperatorLevel,
}

impl Technique {
    pub const ALL: [Technique; 7] = [
        Technique::FilteredJoin,
        Technique::RawConcat,
        Technique::NonEmptyJoin,
        Technique::EndOfLine,
        Technique::Positional,
        Technique::AllProperties,
        Technique::OperatorLevel,
    ];

    /// 1-based position in the ladder.
    pub fn ordinal(self) -> usize {
        Self::ALL
            .iter()
            .position(|t| *t == self)
            .map(|i| i + 1)
            .unwrap_or(0)
    }

    pub fn description(self) -> &'static str {
        match self {
            Technique::FilteredJoin => "Standard text content, blank fragments filtered, joined with spaces",
            Technique::RawConcat => "Raw text content without filtering, concatenated",
            Technique::NonEmptyJoin => "Non-empty fragments joined with spaces",
            Technique::EndOfLine => "Raw text content including end-of-line markers",
            Technique::Positional => "Position-ordered reconstruction (top-to-bottom, left-to-right)",
            Technique::AllProperties => "All text-bearing fragment properties (str, unicode, chars, text)",
            Technique::OperatorLevel => "Operator-level scan of text-show operators",
        }
    }
}

/// A text-bearing property of a fragment. Resolution order is declaration order.
#[derive(Debug, Clone, PartialEq)]
pub enum TextBearing {
    Primary(String),
    Unicode(String),
    CharArray(String),
    Generic(String),
}

impl TextBearing {
    pub fn as_str(&self) -> &str {
        match self {
            TextBearing::Primary(s)
            | TextBearing::Unicode(s)
            | TextBearing::CharArray(s)
            | TextBearing::Generic(s) => s,
        }
    }
}

/// Unit of recovered text from one page. Consumed by the page ladder, never kept across pages.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextFragment {
    pub properties: Vec<TextBearing>,
    /// Translation part of the fragment's transform: (x, y).
    pub transform: Option<(f32, f32)>,
    pub has_eol: bool,
}

impl TextFragment {
    pub fn primary(text: impl Into<String>) -> Self {
        Self {
            properties: vec![TextBearing::Primary(text.into())],
            ..Default::default()
        }
    }

    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.transform = Some((x, y));
        self
    }

    pub fn with_eol(mut self) -> Self {
        self.has_eol = true;
        self
    }

    pub fn with_property(mut self, property: TextBearing) -> Self {
        self.properties.push(property);
        self
    }

    /// The fragment's primary string, if it carries one.
    pub fn str(&self) -> Option<&str> {
        self.properties.iter().find_map(|p| match p {
            TextBearing::Primary(s) => Some(s.as_str()),
            _ => None,
        })
    }

    /// First property with non-blank text.
    pub fn best_text(&self) -> Option<&str> {
        self.properties
            .iter()
            .map(TextBearing::as_str)
            .find(|s| !s.trim().is_empty())
    }
}

/// Aggregated text for one page. Empty text is a legitimate outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageResult {
    pub number: u32,
    pub text: String,
    pub chars: usize,
    pub technique: Option<Technique>,
}

impl PageResult {
    pub fn new(number: u32, text: String, technique: Option<Technique>) -> Self {
        let chars = text.chars().count();
        Self {
            number,
            text,
            chars,
            technique,
        }
    }

    pub fn empty(number: u32) -> Self {
        Self::new(number, String::new(), None)
    }

    pub fn has_text(&self) -> bool {
        self.chars > 0
    }
}

/// Formats one page section of the aggregate.
pub fn page_section(number: u32, text: &str) -> String {
    format!("\n\n=== PAGE {} ===\n{}", number, text)
}

/// Whole-document extraction approach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    PageLadder,
    RawStreamScan,
    PlainText,
}

impl Strategy {
    pub fn name(self) -> &'static str {
        match self {
            Strategy::PageLadder => "page technique ladder",
            Strategy::RawStreamScan => "raw stream scan",
            Strategy::PlainText => "plain text decode",
        }
    }

    /// Whether the strategy works on a parsed document rather than raw bytes.
    pub fn reads_structure(self) -> bool {
        matches!(self, Strategy::PageLadder | Strategy::RawStreamScan)
    }
}

/// One strategy's outcome before acceptance is decided.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionAttempt {
    pub strategy: Strategy,
    pub aggregate: String,
    pub num_pages: usize,
    pub pages_processed: usize,
    pub pages_with_text: usize,
    pub total_chars: usize,
    pub technique_counts: BTreeMap<Technique, usize>,
    /// (page number, page text) for every page with text, ascending. Empty for unpaginated text.
    #[serde(skip)]
    pub sections: Vec<(u32, String)>,
}

impl ExtractionAttempt {
    pub fn empty(strategy: Strategy, num_pages: usize) -> Self {
        Self {
            strategy,
            aggregate: String::new(),
            num_pages,
            pages_processed: 0,
            pages_with_text: 0,
            total_chars: 0,
            technique_counts: BTreeMap::new(),
            sections: Vec::new(),
        }
    }

    /// Fold step: pages must be fed in ascending order.
    pub fn with_page(mut self, page: &PageResult) -> Self {
        self.pages_processed += 1;
        if page.has_text() {
            self.aggregate.push_str(&page_section(page.number, &page.text));
            self.total_chars += page.chars;
            self.pages_with_text += 1;
            self.sections.push((page.number, page.text.clone()));
        }
        if let Some(technique) = page.technique {
            *self.technique_counts.entry(technique).or_insert(0) += 1;
        }
        self
    }

    pub fn from_pages(strategy: Strategy, num_pages: usize, pages: &[PageResult]) -> Self {
        pages
            .iter()
            .fold(Self::empty(strategy, num_pages), |attempt, page| attempt.with_page(page))
    }

    /// An attempt over unstructured text with no page boundaries.
    pub fn from_blob(strategy: Strategy, text: String) -> Self {
        let total_chars = text.chars().count();
        Self {
            aggregate: text,
            total_chars,
            ..Self::empty(strategy, 0)
        }
    }
}

/// Counts attached to every outcome for troubleshooting.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Diagnostics {
    pub strategy: Option<Strategy>,
    pub num_pages: usize,
    pub pages_processed: usize,
    pub pages_with_text: usize,
    pub total_chars: usize,
    pub required_chars: usize,
    pub techniques_attempted: Vec<Technique>,
    pub strategies_attempted: Vec<Strategy>,
    pub open_attempts: usize,
    pub technique_counts: BTreeMap<Technique, usize>,
    pub error: Option<String>,
}

impl Diagnostics {
    pub fn from_attempt(attempt: &ExtractionAttempt, required_chars: usize) -> Self {
        Self {
            strategy: Some(attempt.strategy),
            num_pages: attempt.num_pages,
            pages_processed: attempt.pages_processed,
            pages_with_text: attempt.pages_with_text,
            total_chars: attempt.total_chars,
            required_chars,
            technique_counts: attempt.technique_counts.clone(),
            ..Default::default()
        }
    }
}

/// Terminal outcome of one extraction call. Exactly one per call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExtractionResult {
    Success {
        text: String,
        annotated: bool,
        diagnostics: Diagnostics,
    },
    SoftFailure {
        diagnostic_text: String,
        diagnostics: Diagnostics,
    },
    HardFailure {
        diagnostic_text: String,
        diagnostics: Diagnostics,
    },
}

impl ExtractionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ExtractionResult::Success { .. })
    }

    pub fn fatal(&self) -> bool {
        matches!(self, ExtractionResult::HardFailure { .. })
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            ExtractionResult::Success { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn diagnostic_text(&self) -> Option<&str> {
        match self {
            ExtractionResult::SoftFailure { diagnostic_text, .. }
            | ExtractionResult::HardFailure { diagnostic_text, .. } => Some(diagnostic_text),
            ExtractionResult::Success { .. } => None,
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        match self {
            ExtractionResult::Success { diagnostics, .. }
            | ExtractionResult::SoftFailure { diagnostics, .. }
            | ExtractionResult::HardFailure { diagnostics, .. } => diagnostics,
        }
    }

    /// Text handed to downstream consumers: the extraction or the diagnostic.
    pub fn output_text(&self) -> &str {
        match self {
            ExtractionResult::Success { text, .. } => text,
            ExtractionResult::SoftFailure { diagnostic_text, .. }
            | ExtractionResult::HardFailure { diagnostic_text, .. } => diagnostic_text,
        }
    }
}

/// What a classification was based on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationBasis {
    AlwaysTextFormat,
    SampledContent,
    OperatorFallback,
    UnrecognizedFormat,
    Unreadable,
}

/// Answer to "does this document contain recoverable text".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OcrClassification {
    pub has_text: bool,
    pub sampled_chars: usize,
    pub basis: ClassificationBasis,
}

// Error types
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("document could not be opened after {attempts} attempt(s): {reason}")]
    DocumentOpen { attempts: usize, reason: String },

    #[error("page {page} could not be decoded: {reason}")]
    PageDecode { page: u32, reason: String },

    #[error("only {found} characters recovered, at least {required} required")]
    InsufficientText { found: usize, required: usize },

    #[error("unrecognized format '{extension}'")]
    UnrecognizedFormat { extension: String },
}

pub type Result<T> = std::result::Result<T, ExtractionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_normalization() {
        let doc = RawDocument::from_file_name(Vec::new(), "Annual Report.PDF");
        assert_eq!(doc.normalized_extension(), "pdf");
        assert_eq!(RawDocument::new(Vec::new(), ".Txt").normalized_extension(), "txt");
        assert_eq!(RawDocument::from_file_name(Vec::new(), "README").normalized_extension(), "");
    }

    #[test]
    fn test_technique_ordinals_follow_ladder() {
        let ordinals: Vec<usize> = Technique::ALL.iter().map(|t| t.ordinal()).collect();
        assert_eq!(ordinals, vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_attempt_fold_counts_pages() {
        let pages = vec![
            PageResult::new(1, "alpha".to_string(), Some(Technique::FilteredJoin)),
            PageResult::empty(2),
            PageResult::new(3, "gamma".to_string(), Some(Technique::OperatorLevel)),
        ];
        let attempt = ExtractionAttempt::from_pages(Strategy::PageLadder, 3, &pages);

        assert_eq!(attempt.pages_processed, 3);
        assert_eq!(attempt.pages_with_text, 2);
        assert_eq!(attempt.total_chars, 10);
        assert_eq!(attempt.aggregate, "\n\n=== PAGE 1 ===\nalpha\n\n=== PAGE 3 ===\ngamma");
        assert_eq!(attempt.technique_counts.get(&Technique::OperatorLevel), Some(&1));
        assert_eq!(attempt.sections, vec![(1, "alpha".to_string()), (3, "gamma".to_string())]);
    }

    #[test]
    fn test_best_text_skips_blank_properties() {
        let fragment = TextFragment::primary("  ")
            .with_property(TextBearing::Unicode(String::new()))
            .with_property(TextBearing::CharArray("abc".to_string()));
        assert_eq!(fragment.best_text(), Some("abc"));
        assert_eq!(fragment.str(), Some("  "));
    }
}
