// Raw stream scan - reads text-show operators straight out of stream bodies, without fonts
use crate::pdf_extraction::lopdf_helper::{find, form_xobject, page_resources, resolve_dict, MAX_NESTING};
use crate::pdf_extraction::page_ladder::operator_text;
use crate::types::{ExtractionAttempt, PageResult, Strategy};
use flate2::read::ZlibDecoder;
use lopdf::content::Content;
use lopdf::{Dictionary, Document, ObjectId, Stream};
use std::io::Read;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::debug;

// Content streams are small; anything inflating past this is not page content
const MAX_INFLATED_BYTES: u64 = 8 * 1024 * 1024;
// How far back from `stream` to look for the object's dictionary
const MAX_HEADER_LOOKBACK: usize = 4096;

/// Scans the content streams (and Form XObjects) of `pages`, which the caller has
/// already cut to the page cap. Page numbering and counts match the page ladder's.
pub fn scan_pages(document: &Document, pages: &[(u32, ObjectId)], num_pages: usize) -> ExtractionAttempt {
    let results: Vec<PageResult> = pages
        .iter()
        .map(|&(number, page_id)| {
            let pieces: Vec<String> = page_streams(document, page_id)
                .into_iter()
                .map(|stream| stream_text(&stream_bytes(stream)))
                .filter(|text| !text.is_empty())
                .collect();
            PageResult::new(number, pieces.join("\n"), None)
        })
        .collect();

    let attempt = ExtractionAttempt::from_pages(Strategy::RawStreamScan, num_pages, &results);
    debug!(
        pages = attempt.pages_processed,
        with_text = attempt.pages_with_text,
        "raw page stream scan finished"
    );
    attempt
}

/// Whole-file scan for documents no open configuration could parse. Finds
/// `stream ... endstream` bodies and collects the text-show strings of every
/// non-image body that parses as a content stream.
pub fn scan(bytes: &[u8]) -> ExtractionAttempt {
    let streams = raw_streams(bytes);
    let mut pieces = Vec::new();
    let mut images = 0;

    for stream in &streams {
        if stream.is_image() {
            images += 1;
            continue;
        }
        let data = inflate(stream.body).unwrap_or_else(|| stream.body.to_vec());
        let text = stream_text(&data);
        if !text.is_empty() {
            pieces.push(text);
        }
    }

    debug!(streams = streams.len(), images, with_text = pieces.len(), "raw file scan finished");
    ExtractionAttempt::from_blob(Strategy::RawStreamScan, pieces.join("\n"))
}

/// A stream found by keyword search, with the dictionary text that precedes it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawStream<'a> {
    pub header: &'a [u8],
    pub body: &'a [u8],
}

impl RawStream<'_> {
    pub fn is_image(&self) -> bool {
        find(self.header, b"/Image", 0).is_some()
    }
}

/// Streams in file order, bodies without their surrounding keywords.
pub fn raw_streams(bytes: &[u8]) -> Vec<RawStream<'_>> {
    let mut streams = Vec::new();
    let mut cursor = 0;

    while let Some(keyword) = find(bytes, b"stream", cursor) {
        // "endstream" also contains the keyword
        if keyword >= 3 && &bytes[keyword - 3..keyword] == b"end" {
            cursor = keyword + 6;
            continue;
        }

        let mut start = keyword + 6;
        if bytes.get(start) == Some(&b'\r') {
            start += 1;
        }
        if bytes.get(start) == Some(&b'\n') {
            start += 1;
        }

        let Some(end) = find(bytes, b"endstream", start) else {
            break;
        };
        streams.push(RawStream {
            header: stream_header(bytes, keyword),
            body: trim_eol(&bytes[start..end]),
        });
        cursor = end + 9;
    }

    streams
}

// Dictionary text between the object's `obj` keyword and `stream`
fn stream_header(bytes: &[u8], keyword: usize) -> &[u8] {
    let window = &bytes[keyword.saturating_sub(MAX_HEADER_LOOKBACK)..keyword];
    let start = window
        .windows(3)
        .rposition(|w| w == b"obj")
        .map_or(0, |p| p + 3);
    &window[start..]
}

fn trim_eol(mut body: &[u8]) -> &[u8] {
    while let [rest @ .., b'\r' | b'\n'] = body {
        body = rest;
    }
    body
}

// Content streams of a page followed by every Form XObject its resources reach
fn page_streams(document: &Document, page_id: ObjectId) -> Vec<&Stream> {
    let mut streams: Vec<&Stream> = document
        .get_page_contents(page_id)
        .into_iter()
        .filter_map(|id| document.get_object(id).ok())
        .filter_map(|object| object.as_stream().ok())
        .collect();

    let resources = page_resources(document, page_id);
    collect_forms(document, resources, &mut Vec::new(), 0, &mut streams);
    streams
}

fn collect_forms<'a>(
    document: &'a Document,
    resources: Option<&'a Dictionary>,
    visited: &mut Vec<ObjectId>,
    depth: usize,
    out: &mut Vec<&'a Stream>,
) {
    if depth >= MAX_NESTING {
        return;
    }
    let Some(xobjects) = resources
        .and_then(|r| r.get(b"XObject").ok())
        .and_then(|x| resolve_dict(document, x))
    else {
        return;
    };

    for (name, _) in xobjects.iter() {
        let Some(form) = form_xobject(document, resources, name) else {
            continue;
        };
        if let Some(id) = form.id {
            if visited.contains(&id) {
                continue;
            }
            visited.push(id);
        }
        out.push(form.stream);
        collect_forms(document, form.resources, visited, depth + 1, out);
    }
}

fn stream_bytes(stream: &Stream) -> Vec<u8> {
    inflate(&stream.content)
        .or_else(|| stream.decompressed_content().ok())
        .unwrap_or_else(|| stream.content.clone())
}

fn stream_text(data: &[u8]) -> String {
    match catch_unwind(AssertUnwindSafe(|| Content::decode(data))) {
        Ok(Ok(content)) => operator_text(&content.operations),
        _ => String::new(),
    }
}

fn inflate(body: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    let read = ZlibDecoder::new(body)
        .take(MAX_INFLATED_BYTES)
        .read_to_end(&mut out);
    match read {
        Ok(_) if !out.is_empty() => Some(out),
        // Truncated streams still give usable prefixes
        Err(_) if !out.is_empty() => Some(out),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_finds_plain_and_compressed_streams() {
        let mut file = b"%PDF-1.4\n1 0 obj\n<< /Length 30 >>\nstream\nBT (plain text) Tj ET\nendstream\nendobj\n".to_vec();
        file.extend_from_slice(b"2 0 obj\n<< /Filter /FlateDecode >>\nstream\n");
        file.extend_from_slice(&deflate(b"BT [(packed) -250 (words)] TJ ET"));
        file.extend_from_slice(b"\nendstream\nendobj\n%%EOF");

        let attempt = scan(&file);
        assert_eq!(attempt.strategy, Strategy::RawStreamScan);
        assert_eq!(attempt.aggregate, "plain text\npackedwords");
        assert_eq!(attempt.pages_processed, 0);
        assert_eq!(attempt.total_chars, 22);
    }

    #[test]
    fn test_image_streams_are_skipped() {
        let mut file = b"1 0 obj\n<< /Type /XObject /Subtype /Image /Filter /FlateDecode >>\nstream\n".to_vec();
        file.extend_from_slice(&deflate(b"BT (pixels that parse) Tj ET"));
        file.extend_from_slice(b"\nendstream\nendobj\n2 0 obj\n<< /Length 20 >>\nstream\nBT (caption) Tj ET\nendstream\nendobj\n");

        let streams = raw_streams(&file);
        assert_eq!(streams.len(), 2);
        assert!(streams[0].is_image());
        assert!(!streams[1].is_image());
        assert_eq!(scan(&file).aggregate, "caption");
    }

    #[test]
    fn test_inflate_output_is_bounded() {
        let huge = deflate(&vec![b'A'; (MAX_INFLATED_BYTES + 1024) as usize]);
        let out = inflate(&huge).unwrap();
        assert_eq!(out.len() as u64, MAX_INFLATED_BYTES);
    }

    #[test]
    fn test_no_streams_means_no_text() {
        let attempt = scan(b"not a pdf at all");
        assert!(attempt.aggregate.is_empty());
        assert_eq!(attempt.total_chars, 0);
    }

    #[test]
    fn test_raw_streams_skip_endstream_keyword() {
        let streams = raw_streams(b"stream\r\nabc\r\nendstream stream\ndef\nendstream");
        let bodies: Vec<&[u8]> = streams.iter().map(|s| s.body).collect();
        assert_eq!(bodies, vec![&b"abc"[..], &b"def"[..]]);
    }
}
