// Result reporting - every path ends in exactly one of the three outcomes
use crate::pdf_extraction::lopdf_helper::DocumentMetadata;
use crate::types::{Diagnostics, ExtractionError, ExtractionResult, Technique};

const POSSIBLE_CAUSES: [&str; 5] = [
    "The document stores its text as images (scanned pages)",
    "Text is encoded in a non-standard format",
    "The document uses a proprietary font encoding",
    "The document is protected against text extraction",
    "The OCR classification is wrong and the document has no text layer",
];

const REMEDIES: [&str; 4] = [
    "The document may be a scanned image without a text layer",
    "Run an OCR tool to convert the page images to text",
    "Upload a version of the document that has a text layer",
    "Check the quality of the scan",
];

pub fn success(text: &str, annotated: bool, diagnostics: Diagnostics) -> ExtractionResult {
    ExtractionResult::Success {
        text: text.trim_start().to_string(),
        annotated,
        diagnostics,
    }
}

/// Too little text recovered: a contradiction when forced, a normal outcome otherwise.
pub fn insufficient_text(forced: bool, diagnostics: Diagnostics, metadata: Option<&DocumentMetadata>) -> ExtractionResult {
    if forced {
        ExtractionResult::HardFailure {
            diagnostic_text: hard_diagnostic(&diagnostics),
            diagnostics,
        }
    } else {
        ExtractionResult::SoftFailure {
            diagnostic_text: soft_placeholder(&diagnostics, metadata),
            diagnostics,
        }
    }
}

/// The document could not be opened with any configuration allowed for the mode.
pub fn open_failure(forced: bool, error: &ExtractionError, mut diagnostics: Diagnostics) -> ExtractionResult {
    diagnostics.error = Some(error.to_string());
    if forced {
        let mut text = format!("CRITICAL: extraction of an OCR-classified document failed: {}\n\n", error);
        text.push_str("The document should carry a text layer but it could not be read.\n");
        text.push_str("Check the OCR status of this document.");
        ExtractionResult::HardFailure {
            diagnostic_text: text,
            diagnostics,
        }
    } else {
        ExtractionResult::SoftFailure {
            diagnostic_text: format!("Document could not be processed: {}", error),
            diagnostics,
        }
    }
}

pub fn unsupported_format(forced: bool, extension: &str, mut diagnostics: Diagnostics) -> ExtractionResult {
    let error = ExtractionError::UnrecognizedFormat {
        extension: extension.to_string(),
    };
    diagnostics.error = Some(error.to_string());

    let mut text = format!("Text extraction is not available for this format: {}.", error);
    if forced {
        text.push_str("\nThe document was classified as text-bearing; check its OCR status.");
        ExtractionResult::HardFailure {
            diagnostic_text: text,
            diagnostics,
        }
    } else {
        ExtractionResult::SoftFailure {
            diagnostic_text: text,
            diagnostics,
        }
    }
}

/// Placeholder for documents that simply have no usable text.
pub fn soft_placeholder(d: &Diagnostics, metadata: Option<&DocumentMetadata>) -> String {
    let mut lines = vec![format!("- Pages: {}", d.num_pages)];
    if let Some(meta) = metadata {
        let field = |value: &Option<String>| value.as_deref().unwrap_or("unknown").to_string();
        lines.push(format!("- Title: {}", field(&meta.title)));
        lines.push(format!("- Author: {}", field(&meta.author)));
        lines.push(format!("- Created: {}", field(&meta.creation_date)));
        lines.push(format!("- Creator: {}", field(&meta.creator)));
    }
    lines.push(format!("- Pages with text: {}", d.pages_with_text));
    lines.push(format!("- Characters found: {}", d.total_chars));
    lines.push(format!("- Required at least: {} characters", d.required_chars));

    format!(
        "Document does not contain enough text for analysis.\n\n\
         Document information:\n{}\n\n\
         Possible remedies:\n{}\n\n\
         Without readable text the content cannot be analysed.",
        lines.join("\n"),
        numbered(REMEDIES.iter().copied()),
    )
}

/// Diagnostic for a text-bearing document that yielded nothing.
pub fn hard_diagnostic(d: &Diagnostics) -> String {
    let mut details = vec![
        format!("- Pages processed: {}/{}", d.pages_processed, d.num_pages),
        format!("- Pages with text: {}", d.pages_with_text),
        format!("- Characters found: {}", d.total_chars),
        format!("- Required at least: {} characters", d.required_chars),
    ];
    if let Some(error) = &d.error {
        details.push(format!("- Last error: {}", error));
    }

    let mut text = format!(
        "CRITICAL: document was classified as text-bearing but no usable text was recovered.\n\n\
         Extraction details:\n{}\n\n\
         Techniques attempted:\n{}\n",
        details.join("\n"),
        numbered(Technique::ALL.iter().map(|t| t.description())),
    );

    if !d.strategies_attempted.is_empty() {
        let names: Vec<&str> = d.strategies_attempted.iter().map(|s| s.name()).collect();
        text.push_str(&format!("\nStrategies attempted: {}\n", names.join(", ")));
    }

    text.push_str(&format!(
        "\nPossible causes:\n{}\n\nAll extraction techniques failed. Check the OCR status of this document.",
        numbered(POSSIBLE_CAUSES.iter().copied())
    ));
    text
}

// "1. first\n2. second"
fn numbered<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + 1, item))
        .collect::<Vec<_>>()
        .join("\n")
}
