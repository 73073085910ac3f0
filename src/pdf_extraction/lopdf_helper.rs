// lopdf helper - document open ladder and object lookups
use crate::pdf_extraction::attempts::first_accepted;
use crate::types::{ExtractionError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, warn};

/// One way of opening a document. Tried in order, each more forgiving than the last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenConfig {
    pub name: &'static str,
    pub use_font_cmaps: bool,
    pub require_pages: bool,
    pub recover_header: bool,
}

impl OpenConfig {
    pub const DEFAULT: OpenConfig = OpenConfig {
        name: "default",
        use_font_cmaps: true,
        require_pages: true,
        recover_header: false,
    };

    pub const FONTS_DISABLED: OpenConfig = OpenConfig {
        name: "fonts_disabled",
        use_font_cmaps: false,
        require_pages: false,
        recover_header: false,
    };

    pub const MINIMAL: OpenConfig = OpenConfig {
        name: "minimal",
        use_font_cmaps: false,
        require_pages: false,
        recover_header: true,
    };

    /// Forced extraction gets the degraded retries; normal extraction gets one try.
    pub fn ladder(forced: bool) -> &'static [OpenConfig] {
        const FULL: [OpenConfig; 3] = [OpenConfig::DEFAULT, OpenConfig::FONTS_DISABLED, OpenConfig::MINIMAL];
        if forced {
            &FULL
        } else {
            &FULL[..1]
        }
    }
}

/// Descriptive fields from the trailer Info dictionary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub creator: Option<String>,
    pub creation_date: Option<String>,
}

pub struct OpenedDocument {
    pub document: Document,
    pub config: OpenConfig,
    pub attempts: usize,
}

impl OpenedDocument {
    /// Page numbers (1-based) with their object ids, ascending.
    pub fn page_ids(&self) -> Vec<(u32, ObjectId)> {
        self.document.get_pages().into_iter().collect()
    }

    pub fn num_pages(&self) -> usize {
        self.document.get_pages().len()
    }

    pub fn metadata(&self) -> DocumentMetadata {
        read_metadata(&self.document)
    }
}

/// Opens `bytes` with the configurations allowed for this mode.
pub fn open_document(bytes: &[u8], forced: bool) -> Result<OpenedDocument> {
    let outcome = first_accepted(
        OpenConfig::ladder(forced).iter().copied(),
        |config| {
            load_with(bytes, config).map_err(|e| {
                warn!(config = config.name, error = %e, "document open failed");
                e
            })
        },
        |_| true,
    );

    let attempts = outcome.attempts();
    match outcome.accepted {
        Some((config, document)) => {
            debug!(config = config.name, attempts, "document opened");
            Ok(OpenedDocument {
                document,
                config,
                attempts,
            })
        }
        None => Err(ExtractionError::DocumentOpen {
            attempts,
            reason: outcome
                .last_error()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no open configuration available".to_string()),
        }),
    }
}

/// Loads a document with a single configuration.
pub fn load_with(bytes: &[u8], config: &OpenConfig) -> Result<Document> {
    let data = if config.recover_header {
        find(bytes, b"%PDF-", 0).map(|offset| &bytes[offset..]).unwrap_or(bytes)
    } else {
        bytes
    };

    let loaded = catch_unwind(AssertUnwindSafe(|| Document::load_mem(data)));
    let document = match loaded {
        Ok(Ok(document)) => document,
        Ok(Err(e)) => return Err(open_error(e.to_string())),
        Err(_) => return Err(open_error("decoder panicked while parsing the document")),
    };

    if document.is_encrypted() {
        debug!(config = config.name, "document is encrypted; text may be unreadable");
    }

    if config.require_pages && document.get_pages().is_empty() {
        return Err(open_error("document has no pages"));
    }

    Ok(document)
}

fn open_error(reason: impl Into<String>) -> ExtractionError {
    ExtractionError::DocumentOpen {
        attempts: 1,
        reason: reason.into(),
    }
}

/// Position of `needle` in `haystack` at or after `from`.
pub fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Follows a reference to the object it points at.
pub fn resolve<'a>(document: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => document.get_object(*id).unwrap_or(object),
        _ => object,
    }
}

pub fn resolve_dict<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    match resolve(document, object) {
        Object::Dictionary(dict) => Some(dict),
        Object::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}

// Helper to get numeric value from an operand or dictionary entry
pub fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(f) => Some(*f as f32),
        _ => None,
    }
}

/// Bound on Parent chains and nested Form XObjects.
pub const MAX_NESTING: usize = 32;

/// Resources of a page, inherited through the page tree when absent on the page itself.
pub fn page_resources(document: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut current = document.get_object(page_id).ok().and_then(|o| o.as_dict().ok());
    let mut depth = 0;

    while let Some(dict) = current {
        if let Ok(resources) = dict.get(b"Resources") {
            return resolve_dict(document, resources);
        }
        // Guard against cyclic Parent chains.
        depth += 1;
        if depth > MAX_NESTING {
            return None;
        }
        current = dict
            .get(b"Parent")
            .ok()
            .and_then(|parent| resolve_dict(document, parent));
    }
    None
}

/// Font dictionaries of a resource dictionary keyed by resource name.
pub fn resource_fonts<'a>(document: &'a Document, resources: &'a Dictionary) -> Vec<(Vec<u8>, &'a Dictionary)> {
    let Some(fonts) = resources.get(b"Font").ok().and_then(|f| resolve_dict(document, f)) else {
        return Vec::new();
    };

    fonts
        .iter()
        .filter_map(|(name, font)| resolve_dict(document, font).map(|dict| (name.clone(), dict)))
        .collect()
}

/// A Form XObject reachable from some resource dictionary.
pub struct FormXObject<'a> {
    pub id: Option<ObjectId>,
    pub stream: &'a Stream,
    /// The form's own resources, or the ones it was drawn with.
    pub resources: Option<&'a Dictionary>,
    pub matrix: Option<[f32; 6]>,
}

/// Looks up `/XObject/<name>` in `resources`. Image and PostScript XObjects yield `None`.
pub fn form_xobject<'a>(
    document: &'a Document,
    resources: Option<&'a Dictionary>,
    name: &[u8],
) -> Option<FormXObject<'a>> {
    let xobjects = resources?.get(b"XObject").ok().and_then(|x| resolve_dict(document, x))?;
    let entry = xobjects.get(name).ok()?;
    let id = match entry {
        Object::Reference(id) => Some(*id),
        _ => None,
    };

    let Object::Stream(stream) = resolve(document, entry) else {
        return None;
    };
    if !matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(subtype)) if subtype == b"Form") {
        return None;
    }

    let matrix = stream
        .dict
        .get(b"Matrix")
        .ok()
        .and_then(|m| resolve(document, m).as_array().ok())
        .and_then(|values| {
            let values: Vec<f32> = values.iter().filter_map(number).collect();
            <[f32; 6]>::try_from(values.as_slice()).ok()
        });
    let own = stream
        .dict
        .get(b"Resources")
        .ok()
        .and_then(|r| resolve_dict(document, r));

    Some(FormXObject {
        id,
        stream,
        resources: own.or(resources),
        matrix,
    })
}

/// Decoded bytes of a stream, or its raw bytes when no filter applies or decoding fails.
pub fn stream_data(stream: &Stream) -> Vec<u8> {
    stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone())
}

/// Decodes a PDF text string (UTF-16BE with BOM, otherwise PDFDocEncoding).
pub fn decode_text_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}

fn read_metadata(document: &Document) -> DocumentMetadata {
    let Some(info) = document
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|info| resolve_dict(document, info))
    else {
        return DocumentMetadata::default();
    };

    DocumentMetadata {
        title: info_field(document, info, b"Title"),
        author: info_field(document, info, b"Author"),
        creator: info_field(document, info, b"Creator"),
        creation_date: info_field(document, info, b"CreationDate"),
    }
}

fn info_field(document: &Document, info: &Dictionary, key: &[u8]) -> Option<String> {
    match info.get(key).ok().map(|o| resolve(document, o)) {
        Some(Object::String(bytes, _)) => {
            let text = decode_text_string(bytes).trim().to_string();
            (!text.is_empty()).then_some(text)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ladder_length_depends_on_mode() {
        assert_eq!(OpenConfig::ladder(false), &[OpenConfig::DEFAULT]);
        assert_eq!(OpenConfig::ladder(true).len(), 3);
        assert_eq!(OpenConfig::ladder(true)[2].name, "minimal");
    }

    #[test]
    fn test_garbage_fails_once_in_normal_mode() {
        let err = open_document(b"definitely not a pdf", false).err().unwrap();
        match err {
            ExtractionError::DocumentOpen { attempts, .. } => assert_eq!(attempts, 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_garbage_exhausts_all_configs_in_forced_mode() {
        let err = open_document(b"definitely not a pdf", true).err().unwrap();
        assert!(matches!(err, ExtractionError::DocumentOpen { attempts: 3, .. }));
    }

    #[test]
    fn test_find_subslice() {
        assert_eq!(find(b"junk%PDF-1.4", b"%PDF-", 0), Some(4));
        assert_eq!(find(b"abc", b"zz", 0), None);
        assert_eq!(find(b"streamstream", b"stream", 1), Some(6));
    }

    #[test]
    fn test_decode_text_string_handles_bom() {
        assert_eq!(decode_text_string(&[0xFE, 0xFF, 0x00, 0x41, 0x00, 0x42]), "AB");
        assert_eq!(decode_text_string(b"Plain"), "Plain");
    }
}
