// ToUnicode CMap parsing - maps character codes from a font to unicode text
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use std::collections::HashMap;

static BFCHAR_SECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)beginbfchar(.*?)endbfchar").expect("valid bfchar regex"));
static BFRANGE_SECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)beginbfrange(.*?)endbfrange").expect("valid bfrange regex"));
static TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([0-9A-Fa-f\s]*)>|\[|\]").expect("valid token regex"));

// Larger ranges are almost certainly corrupt
const MAX_RANGE_SPAN: u32 = 65_535;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Hex(Vec<u8>),
    Open,
    Close,
}

#[derive(Debug, Clone, Default)]
pub struct ToUnicodeMap {
    mappings: HashMap<Vec<u8>, String>,
    min_len: usize,
    max_len: usize,
}

impl ToUnicodeMap {
    pub fn parse(data: &[u8]) -> Self {
        let mut map = ToUnicodeMap::default();

        for section in BFCHAR_SECTION.captures_iter(data) {
            let tokens = tokenize(&section[1]);
            for pair in tokens.chunks_exact(2) {
                if let [Token::Hex(src), Token::Hex(dst)] = pair {
                    map.insert(src.clone(), utf16_text(dst));
                }
            }
        }

        for section in BFRANGE_SECTION.captures_iter(data) {
            let tokens = tokenize(&section[1]);
            let mut iter = tokens.into_iter();
            while let (Some(Token::Hex(lo)), Some(Token::Hex(hi))) = (iter.next(), iter.next()) {
                match iter.next() {
                    Some(Token::Hex(dst)) => map.insert_range(&lo, &hi, |offset| {
                        Some(increment_last_unit(&dst, offset))
                    }),
                    Some(Token::Open) => {
                        let mut targets = Vec::new();
                        for token in iter.by_ref() {
                            match token {
                                Token::Hex(dst) => targets.push(utf16_text(&dst)),
                                _ => break,
                            }
                        }
                        map.insert_range(&lo, &hi, |offset| targets.get(offset as usize).cloned());
                    }
                    _ => break,
                }
            }
        }

        map
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    /// Widest code length in bytes; fonts with 2-byte codes read strings in pairs.
    pub fn code_width(&self) -> usize {
        self.max_len
    }

    /// Decodes `bytes` with longest-match lookup. Unmapped codes are dropped.
    pub fn decode(&self, bytes: &[u8]) -> String {
        if self.mappings.is_empty() {
            return String::new();
        }

        let step = self.min_len.max(1);
        let mut out = String::new();
        let mut i = 0;
        while i < bytes.len() {
            let longest = self.max_len.min(bytes.len() - i);
            let hit = (self.min_len..=longest)
                .rev()
                .find_map(|len| self.mappings.get(&bytes[i..i + len]).map(|s| (len, s)));

            match hit {
                Some((len, text)) => {
                    out.push_str(text);
                    i += len;
                }
                None => i += step,
            }
        }
        out
    }

    fn insert(&mut self, code: Vec<u8>, text: String) {
        if code.is_empty() {
            return;
        }
        let len = code.len();
        self.min_len = if self.mappings.is_empty() { len } else { self.min_len.min(len) };
        self.max_len = self.max_len.max(len);
        self.mappings.insert(code, text);
    }

    fn insert_range<F>(&mut self, lo: &[u8], hi: &[u8], target: F)
    where
        F: Fn(u32) -> Option<String>,
    {
        if lo.is_empty() || lo.len() != hi.len() || lo.len() > 4 {
            return;
        }
        let (start, end) = (code_value(lo), code_value(hi));
        if end < start || end - start > MAX_RANGE_SPAN {
            return;
        }

        for offset in 0..=(end - start) {
            if let Some(text) = target(offset) {
                let code = (start + offset).to_be_bytes()[4 - lo.len()..].to_vec();
                self.insert(code, text);
            }
        }
    }
}

fn tokenize(section: &[u8]) -> Vec<Token> {
    TOKEN
        .captures_iter(section)
        .map(|cap| match cap.get(1) {
            Some(hex) => Token::Hex(hex_bytes(hex.as_bytes())),
            None if &cap[0] == b"[" => Token::Open,
            None => Token::Close,
        })
        .collect()
}

fn hex_bytes(hex: &[u8]) -> Vec<u8> {
    let digits: Vec<u8> = hex
        .iter()
        .filter_map(|&b| (b as char).to_digit(16).map(|d| d as u8))
        .collect();

    // An odd trailing digit is padded with zero
    digits
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
        .collect()
}

fn code_value(code: &[u8]) -> u32 {
    code.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32)
}

fn utf16_units(bytes: &[u8]) -> Vec<u16> {
    if bytes.len() == 1 {
        return vec![bytes[0] as u16];
    }
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}

fn utf16_text(bytes: &[u8]) -> String {
    String::from_utf16_lossy(&utf16_units(bytes))
}

fn increment_last_unit(dst: &[u8], offset: u32) -> String {
    let mut units = utf16_units(dst);
    if let Some(last) = units.last_mut() {
        *last = last.wrapping_add(offset as u16);
    }
    String::from_utf16_lossy(&units)
}
