// Content stream interpretation - turns page operators into positioned text fragments
use crate::pdf_extraction::cmap::ToUnicodeMap;
use crate::pdf_extraction::lopdf_helper::{
    form_xobject, number, page_resources, resolve, resource_fonts, stream_data, MAX_NESTING,
};
use crate::types::{ExtractionError, Result, TextBearing, TextFragment};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;
use tracing::debug;

/// A decoded page as seen by the technique ladder.
pub trait PageHandle {
    fn number(&self) -> u32;

    /// Text-show fragments in content-stream order.
    fn text_content(&self) -> Result<Vec<TextFragment>>;

    /// The page's raw drawing operators.
    fn operator_list(&self) -> Result<Vec<Operation>>;
}

pub struct LopdfPage<'a> {
    document: &'a Document,
    page_id: ObjectId,
    number: u32,
    use_font_cmaps: bool,
}

impl<'a> LopdfPage<'a> {
    pub fn new(document: &'a Document, page_id: ObjectId, number: u32, use_font_cmaps: bool) -> Self {
        Self {
            document,
            page_id,
            number,
            use_font_cmaps,
        }
    }

    fn decode_error(&self, reason: impl ToString) -> ExtractionError {
        ExtractionError::PageDecode {
            page: self.number,
            reason: reason.to_string(),
        }
    }

    /// Page operators with every Form XObject drawn by `Do` inlined in place.
    fn expand(&self) -> Result<Expanded> {
        let data = self
            .document
            .get_page_content(self.page_id)
            .map_err(|e| self.decode_error(e))?;
        let content = Content::decode(&data).map_err(|e| self.decode_error(e))?;

        let mut expanded = Expanded::default();
        let resources = page_resources(self.document, self.page_id);
        self.inline(content.operations, resources, &[], &mut Vec::new(), &mut expanded);
        Ok(expanded)
    }

    fn register_fonts(&self, resources: Option<&'a Dictionary>, scope: &[u8], out: &mut Expanded) {
        let Some(resources) = resources else {
            return;
        };
        for (name, font) in resource_fonts(self.document, resources) {
            let decoder = if self.use_font_cmaps {
                FontDecoder::from_font(self.document, font)
            } else {
                FontDecoder::single_byte()
            };
            out.fonts.insert(scoped(scope, &name), decoder);
        }
    }

    // `active` holds the forms currently being inlined, outermost first
    fn inline(
        &self,
        operations: Vec<Operation>,
        resources: Option<&'a Dictionary>,
        scope: &[u8],
        active: &mut Vec<Option<ObjectId>>,
        out: &mut Expanded,
    ) {
        self.register_fonts(resources, scope, out);

        for mut op in operations {
            match op.operator.as_str() {
                "Tf" if !scope.is_empty() => {
                    if let Some(Object::Name(name)) = op.operands.first_mut() {
                        *name = scoped(scope, name);
                    }
                    out.operations.push(op);
                }
                "Do" => {
                    let inlined = match op.operands.first() {
                        Some(Object::Name(name)) => self.inline_form(name, resources, scope, active, out),
                        _ => false,
                    };
                    if !inlined {
                        out.operations.push(op);
                    }
                }
                _ => out.operations.push(op),
            }
        }
    }

    /// Returns false when `name` is not a Form XObject.
    fn inline_form(
        &self,
        name: &[u8],
        resources: Option<&'a Dictionary>,
        scope: &[u8],
        active: &mut Vec<Option<ObjectId>>,
        out: &mut Expanded,
    ) -> bool {
        let Some(form) = form_xobject(self.document, resources, name) else {
            return false;
        };

        let cyclic = form.id.is_some() && active.contains(&form.id);
        if cyclic || active.len() >= MAX_NESTING {
            debug!(page = self.number, cyclic, depth = active.len(), "form xobject not inlined");
            return true;
        }

        let content = match Content::decode(&stream_data(form.stream)) {
            Ok(content) => content,
            Err(e) => {
                debug!(page = self.number, error = %e, "form xobject content unreadable");
                return true;
            }
        };

        out.operations.push(Operation::new("q", vec![]));
        if let Some(matrix) = form.matrix {
            let operands = matrix.iter().map(|v| Object::Real((*v).into())).collect();
            out.operations.push(Operation::new("cm", operands));
        }

        active.push(form.id);
        self.inline(content.operations, form.resources, &scoped(scope, name), active, out);
        active.pop();

        out.operations.push(Operation::new("Q", vec![]));
        true
    }
}

#[derive(Default)]
struct Expanded {
    operations: Vec<Operation>,
    /// Decoders keyed by the (scoped) names `Tf` selects.
    fonts: HashMap<Vec<u8>, FontDecoder>,
}

// Font names inside a form are prefixed with the form's path so they never shadow the page's
fn scoped(scope: &[u8], name: &[u8]) -> Vec<u8> {
    if scope.is_empty() {
        return name.to_vec();
    }
    let mut scoped = scope.to_vec();
    scoped.push(b'/');
    scoped.extend_from_slice(name);
    scoped
}

impl PageHandle for LopdfPage<'_> {
    fn number(&self) -> u32 {
        self.number
    }

    fn text_content(&self) -> Result<Vec<TextFragment>> {
        let expanded = self.expand()?;
        Ok(collect_fragments(&expanded.operations, &expanded.fonts))
    }

    fn operator_list(&self) -> Result<Vec<Operation>> {
        Ok(self.expand()?.operations)
    }
}

// WinAnsiEncoding differs from Latin-1 in 0x80..=0x9F; '\0' marks undefined codes
const WIN_ANSI_HIGH: [char; 32] = [
    '€', '\0', '‚', 'ƒ', '„', '…', '†', '‡', 'ˆ', '‰', 'Š', '‹', 'Œ', '\0', 'Ž', '\0',
    '\0', '‘', '’', '“', '”', '•', '–', '—', '˜', '™', 'š', '›', 'œ', '\0', 'ž', 'Ÿ',
];

/// How a font's string bytes become text.
#[derive(Debug, Clone, Default)]
pub struct FontDecoder {
    cmap: Option<ToUnicodeMap>,
    two_byte: bool,
}

impl FontDecoder {
    pub fn single_byte() -> Self {
        Self::default()
    }

    pub fn with_cmap(cmap: ToUnicodeMap, two_byte: bool) -> Self {
        Self {
            cmap: Some(cmap),
            two_byte,
        }
    }

    pub fn from_font(document: &Document, font: &Dictionary) -> Self {
        let two_byte = matches!(font.get(b"Subtype"), Ok(Object::Name(name)) if name == b"Type0");

        let cmap = font
            .get(b"ToUnicode")
            .ok()
            .map(|obj| resolve(document, obj))
            .and_then(|obj| match obj {
                Object::Stream(stream) => Some(stream_data(stream)),
                _ => None,
            })
            .map(|data| ToUnicodeMap::parse(&data))
            .filter(|map| !map.is_empty());

        Self { cmap, two_byte }
    }

    pub fn is_two_byte(&self) -> bool {
        self.two_byte
    }

    pub fn decode(&self, bytes: &[u8]) -> String {
        match &self.cmap {
            Some(cmap) => cmap.decode(bytes),
            // CIDs mean nothing without a map
            None if self.two_byte => String::new(),
            None => bytes.iter().filter_map(|&b| single_byte_char(b)).collect(),
        }
    }

    fn glyph_count(&self, bytes: &[u8]) -> usize {
        if self.two_byte {
            bytes.len() / 2
        } else {
            bytes.len()
        }
    }
}

fn single_byte_char(b: u8) -> Option<char> {
    match b {
        0x20..=0x7E => Some(b as char),
        0x80..=0x9F => Some(WIN_ANSI_HIGH[(b - 0x80) as usize]).filter(|c| *c != '\0'),
        0xA0..=0xFF => Some(b as char),
        _ => None,
    }
}

/// Builds the ordered text-bearing properties of one shown string.
pub fn fragment_properties(raw: &[u8], decoded: String, two_byte: bool) -> Vec<TextBearing> {
    let mut properties = vec![TextBearing::Primary(decoded)];

    let has_bom = raw.len() >= 2 && raw[0] == 0xFE && raw[1] == 0xFF;
    if two_byte || has_bom {
        let body = if has_bom { &raw[2..] } else { raw };
        let units: Vec<u16> = body
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        let unicode: String = String::from_utf16_lossy(&units)
            .chars()
            .filter(|c| *c != '\u{FFFD}' && !c.is_control())
            .collect();
        if !unicode.is_empty() {
            properties.push(TextBearing::Unicode(unicode));
        }
    }

    let ascii: String = raw
        .iter()
        .filter(|b| (0x20..=0x7E).contains(*b))
        .map(|&b| b as char)
        .collect();
    if !ascii.is_empty() {
        properties.push(TextBearing::CharArray(ascii));
    }

    let generic: String = String::from_utf8_lossy(raw)
        .chars()
        .filter(|c| *c != '\u{FFFD}' && !c.is_control())
        .collect();
    if !generic.is_empty() {
        properties.push(TextBearing::Generic(generic));
    }

    properties
}

type Matrix = [f32; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

fn multiply(m1: &Matrix, m2: &Matrix) -> Matrix {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

fn translate(tx: f32, ty: f32, m: &Matrix) -> Matrix {
    multiply(&[1.0, 0.0, 0.0, 1.0, tx, ty], m)
}

// TJ kerning beyond this (thousandths of an em) reads as a word gap
const KERNING_SPACE: f32 = -200.0;
// Rough glyph advance as a fraction of the font size
const GLYPH_ADVANCE: f32 = 0.5;

struct TextState<'f> {
    fonts: &'f HashMap<Vec<u8>, FontDecoder>,
    fallback: FontDecoder,
    font: Option<Vec<u8>>,
    font_size: f32,
    leading: f32,
    ctm: Matrix,
    saved: Vec<Matrix>,
    tm: Matrix,
    tlm: Matrix,
    fragments: Vec<TextFragment>,
}

impl<'f> TextState<'f> {
    fn new(fonts: &'f HashMap<Vec<u8>, FontDecoder>) -> Self {
        Self {
            fonts,
            fallback: FontDecoder::single_byte(),
            font: None,
            font_size: 1.0,
            leading: 0.0,
            ctm: IDENTITY,
            saved: Vec::new(),
            tm: IDENTITY,
            tlm: IDENTITY,
            fragments: Vec::new(),
        }
    }

    fn decoder(&self) -> &FontDecoder {
        self.font
            .as_ref()
            .and_then(|name| self.fonts.get(name))
            .unwrap_or(&self.fallback)
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.tlm = translate(tx, ty, &self.tlm);
        self.tm = self.tlm;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.leading);
    }

    fn position(&self) -> (f32, f32) {
        let m = multiply(&self.tm, &self.ctm);
        (m[4], m[5])
    }

    fn advance(&mut self, glyphs: usize) {
        let tx = glyphs as f32 * self.font_size * GLYPH_ADVANCE;
        self.tm = translate(tx, 0.0, &self.tm);
    }

    fn emit(&mut self, raw: Vec<u8>, decoded: String) {
        let (x, y) = self.position();
        let two_byte = self.decoder().is_two_byte();

        // A vertical move ends the previous line
        if let Some(previous) = self.fragments.last_mut() {
            if let Some((_, prev_y)) = previous.transform {
                if (prev_y - y).abs() > 0.5 {
                    previous.has_eol = true;
                }
            }
        }

        self.fragments.push(TextFragment {
            properties: fragment_properties(&raw, decoded, two_byte),
            transform: Some((x, y)),
            has_eol: false,
        });
    }

    fn show(&mut self, raw: &[u8]) {
        let decoded = self.decoder().decode(raw);
        let glyphs = self.decoder().glyph_count(raw);
        self.emit(raw.to_vec(), decoded);
        self.advance(glyphs);
    }

    fn show_array(&mut self, items: &[Object]) {
        let mut raw = Vec::new();
        let mut decoded = String::new();
        let mut glyphs = 0;

        for item in items {
            match item {
                Object::String(bytes, _) => {
                    decoded.push_str(&self.decoder().decode(bytes));
                    glyphs += self.decoder().glyph_count(bytes);
                    raw.extend_from_slice(bytes);
                }
                other => {
                    if let Some(kern) = number(other) {
                        if kern < KERNING_SPACE && !decoded.is_empty() && !decoded.ends_with(' ') {
                            decoded.push(' ');
                        }
                    }
                }
            }
        }

        if !raw.is_empty() {
            self.emit(raw, decoded);
            self.advance(glyphs);
        }
    }

    fn apply(&mut self, op: &Operation) {
        let operands = &op.operands;
        let num = |i: usize| operands.get(i).and_then(number).unwrap_or(0.0);
        let matrix = || -> Option<Matrix> {
            let values: Vec<f32> = operands.iter().filter_map(number).collect();
            <Matrix>::try_from(values.as_slice()).ok()
        };

        match op.operator.as_ref() {
            "q" => self.saved.push(self.ctm),
            "Q" => {
                if let Some(ctm) = self.saved.pop() {
                    self.ctm = ctm;
                }
            }
            "cm" => {
                if let Some(m) = matrix() {
                    self.ctm = multiply(&m, &self.ctm);
                }
            }
            "BT" => {
                self.tm = IDENTITY;
                self.tlm = IDENTITY;
            }
            "ET" => {
                if let Some(last) = self.fragments.last_mut() {
                    last.has_eol = true;
                }
            }
            "Tf" => {
                if let Some(Object::Name(name)) = operands.first() {
                    self.font = Some(name.clone());
                }
                self.font_size = num(1);
            }
            "TL" => self.leading = num(0),
            "Td" => self.move_line(num(0), num(1)),
            "TD" => {
                self.leading = -num(1);
                self.move_line(num(0), num(1));
            }
            "Tm" => {
                if let Some(m) = matrix() {
                    self.tm = m;
                    self.tlm = m;
                }
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(bytes);
                }
            }
            "'" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(bytes);
                }
            }
            "\"" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    self.show(bytes);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    self.show_array(items);
                }
            }
            _ => {}
        }
    }
}

/// Runs the text-state machine over `operations`, one fragment per text-show operator.
pub fn collect_fragments(operations: &[Operation], fonts: &HashMap<Vec<u8>, FontDecoder>) -> Vec<TextFragment> {
    let mut state = TextState::new(fonts);
    for op in operations {
        state.apply(op);
    }
    state.fragments
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::StringFormat;

    fn text(s: &str) -> Object {
        Object::String(s.as_bytes().to_vec(), StringFormat::Literal)
    }

    fn op(operator: &str, operands: Vec<Object>) -> Operation {
        Operation::new(operator, operands)
    }

    #[test]
    fn test_fragments_carry_positions_and_line_ends() {
        let ops = vec![
            op("BT", vec![]),
            op("Tf", vec![Object::Name(b"F1".to_vec()), 12.into()]),
            op("Td", vec![72.into(), 700.into()]),
            op("Tj", vec![text("Hello")]),
            op("Td", vec![0.into(), (-14).into()]),
            op("Tj", vec![text("World")]),
            op("ET", vec![]),
        ];
        let fragments = collect_fragments(&ops, &HashMap::new());

        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].str(), Some("Hello"));
        assert_eq!(fragments[0].transform, Some((72.0, 700.0)));
        assert!(fragments[0].has_eol);
        assert_eq!(fragments[1].transform, Some((72.0, 686.0)));
        assert!(fragments[1].has_eol);
    }

    #[test]
    fn test_tj_array_kerning_inserts_space() {
        let ops = vec![
            op("BT", vec![]),
            op(
                "TJ",
                vec![Object::Array(vec![text("Over"), (-300).into(), text("view"), (-20).into(), text("s")])],
            ),
            op("ET", vec![]),
        ];
        let fragments = collect_fragments(&ops, &HashMap::new());
        assert_eq!(fragments[0].str(), Some("Over views"));
    }

    #[test]
    fn test_cm_offsets_positions() {
        let ops = vec![
            op("q", vec![]),
            op("cm", vec![1.into(), 0.into(), 0.into(), 1.into(), 10.into(), 20.into()]),
            op("BT", vec![]),
            op("Tm", vec![1.into(), 0.into(), 0.into(), 1.into(), 5.into(), 5.into()]),
            op("Tj", vec![text("x")]),
            op("ET", vec![]),
            op("Q", vec![]),
        ];
        let fragments = collect_fragments(&ops, &HashMap::new());
        assert_eq!(fragments[0].transform, Some((15.0, 25.0)));
    }

    #[test]
    fn test_form_font_names_are_scoped() {
        assert_eq!(scoped(b"", b"F1"), b"F1".to_vec());
        assert_eq!(scoped(b"X1", b"F1"), b"X1/F1".to_vec());
        assert_eq!(scoped(b"X1/X2", b"F1"), b"X1/X2/F1".to_vec());
    }

    #[test]
    fn test_win_ansi_high_range() {
        let decoder = FontDecoder::single_byte();
        assert_eq!(decoder.decode(&[0x93, b'q', 0x94, 0xE9]), "“q”é");
        assert_eq!(decoder.decode(&[0x81, 0x01]), "");
    }

    #[test]
    fn test_two_byte_font_without_map_keeps_unicode_property() {
        let mut fonts = HashMap::new();
        fonts.insert(
            b"F2".to_vec(),
            FontDecoder::with_cmap(ToUnicodeMap::default(), true),
        );
        let ops = vec![
            op("BT", vec![]),
            op("Tf", vec![Object::Name(b"F2".to_vec()), 10.into()]),
            op("Tj", vec![Object::String(vec![0x00, 0x41, 0x00, 0x42], StringFormat::Hexadecimal)]),
            op("ET", vec![]),
        ];
        let fragments = collect_fragments(&ops, &fonts);

        assert_eq!(fragments[0].str(), Some(""));
        assert_eq!(fragments[0].best_text(), Some("AB"));
    }
}
