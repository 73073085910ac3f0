// Page technique ladder - seven ways to pull text from one page, cheapest first
use crate::pdf_extraction::attempts::first_accepted;
use crate::pdf_extraction::content_stream::PageHandle;
use crate::types::{PageResult, Result, Technique, TextFragment};
use lopdf::content::Operation;
use lopdf::Object;
use std::cmp::Ordering;
use tracing::{debug, warn};

/// Text-show operators scanned by the operator-level fallback.
pub const TEXT_SHOW_OPERATORS: [&str; 4] = ["Tj", "TJ", "'", "\""];

/// Runs the ladder over one page. Stops at the first technique that yields text.
///
/// Fails only when the page's text content cannot be decoded at all; the caller
/// records such a page as empty and moves on.
pub fn extract_page<P: PageHandle + ?Sized>(page: &P) -> Result<PageResult> {
    let number = page.number();
    let fragments = page.text_content()?;

    let outcome = first_accepted(
        Technique::ALL,
        |technique| match technique {
            Technique::OperatorLevel => page.operator_list().map(|ops| operator_text(&ops)),
            other => Ok(apply_technique(*other, &fragments)),
        },
        |text: &String| !text.is_empty(),
    );

    for (technique, err) in &outcome.failed {
        warn!(page = number, technique = technique.ordinal(), error = %err, "technique failed");
    }

    match outcome.accepted {
        Some((technique, text)) => {
            debug!(
                page = number,
                technique = technique.ordinal(),
                chars = text.chars().count(),
                "page text recovered"
            );
            Ok(PageResult::new(number, text, Some(technique)))
        }
        None => {
            debug!(page = number, fragments = fragments.len(), "no technique recovered text");
            Ok(PageResult::empty(number))
        }
    }
}

/// Applies one fragment-based technique. The operator-level technique needs the
/// operator list instead and yields nothing here.
pub fn apply_technique(technique: Technique, fragments: &[TextFragment]) -> String {
    match technique {
        Technique::FilteredJoin => filtered_join(fragments),
        Technique::RawConcat => raw_concat(fragments),
        Technique::NonEmptyJoin => non_empty_join(fragments),
        Technique::EndOfLine => end_of_line(fragments),
        Technique::Positional => positional(fragments),
        Technique::AllProperties => all_properties(fragments),
        Technique::OperatorLevel => String::new(),
    }
}

fn strs(fragments: &[TextFragment]) -> impl Iterator<Item = &str> {
    fragments.iter().filter_map(TextFragment::str)
}

// 1. non-blank strings joined with spaces
pub fn filtered_join(fragments: &[TextFragment]) -> String {
    strs(fragments)
        .filter(|s| !s.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

// 2. everything, no separator
pub fn raw_concat(fragments: &[TextFragment]) -> String {
    strs(fragments).collect::<String>().trim().to_string()
}

// 3. non-empty strings joined with spaces
pub fn non_empty_join(fragments: &[TextFragment]) -> String {
    strs(fragments)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

// 4. newline after fragments flagged end-of-line
pub fn end_of_line(fragments: &[TextFragment]) -> String {
    let mut text = String::new();
    for fragment in fragments {
        if let Some(s) = fragment.str() {
            text.push_str(s);
        }
        if fragment.has_eol {
            text.push('\n');
        }
    }
    text.trim().to_string()
}

// 5. reading order: top to bottom, then left to right
pub fn positional(fragments: &[TextFragment]) -> String {
    let mut placed: Vec<(f32, f32, &str)> = fragments
        .iter()
        .filter_map(|f| {
            let s = f.str().filter(|s| !s.trim().is_empty())?;
            let (x, y) = f.transform.unwrap_or((0.0, 0.0));
            Some((x, y, s))
        })
        .collect();

    // PDF y grows upwards, so the top of the page is the largest y
    placed.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal))
    });

    placed
        .iter()
        .map(|(_, _, s)| *s)
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

// 6. first non-blank property per fragment
pub fn all_properties(fragments: &[TextFragment]) -> String {
    fragments
        .iter()
        .filter_map(TextFragment::best_text)
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

/// 7. The string argument of every text-show operator, taken verbatim.
pub fn operator_text(operations: &[Operation]) -> String {
    let mut text = String::new();
    for op in operations {
        if !TEXT_SHOW_OPERATORS.contains(&op.operator.as_str()) {
            continue;
        }
        if let Some(arg) = first_string_argument(&op.operands) {
            if !arg.trim().is_empty() {
                text.push_str(&arg);
                text.push(' ');
            }
        }
    }
    text.trim().to_string()
}

// A TJ operand is an array; its string elements together form the argument
fn first_string_argument(operands: &[Object]) -> Option<String> {
    operands.iter().find_map(|operand| match operand {
        Object::String(bytes, _) => Some(latin1(bytes)),
        Object::Array(items) => {
            let joined: String = items
                .iter()
                .filter_map(|item| match item {
                    Object::String(bytes, _) => Some(latin1(bytes)),
                    _ => None,
                })
                .collect();
            (!joined.is_empty()).then_some(joined)
        }
        _ => None,
    })
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}
