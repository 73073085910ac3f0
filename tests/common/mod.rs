// Shared fixtures: small PDFs built in memory with lopdf
#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};

/// What one generated page shows.
#[derive(Debug, Clone)]
pub enum PageSpec {
    /// Lines of text in the base font, top to bottom.
    Text(Vec<String>),
    /// A full-page image and no text, like a scanned sheet.
    Scanned,
    /// Two-byte codes shown through the font with a ToUnicode map.
    Cid(Vec<u16>),
    /// ASCII bytes shown through a two-byte font that has no ToUnicode map.
    UnmappedCid(String),
    /// Text drawn by a Form XObject that carries its own font resources.
    Form(String),
    /// A content stream that is not valid page content.
    Corrupt,
}

impl PageSpec {
    pub fn text(line: impl Into<String>) -> Self {
        PageSpec::Text(vec![line.into()])
    }
}

#[derive(Debug, Default)]
pub struct PdfBuilder {
    pages: Vec<PageSpec>,
    title: Option<String>,
    cmap: Option<String>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: PageSpec) -> Self {
        self.pages.push(page);
        self
    }

    pub fn pages(mut self, pages: impl IntoIterator<Item = PageSpec>) -> Self {
        self.pages.extend(pages);
        self
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    /// ToUnicode CMap used by `PageSpec::Cid` pages.
    pub fn cmap(mut self, cmap: &str) -> Self {
        self.cmap = Some(cmap.to_string());
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let base_font = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let unmapped_font = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => "Unmapped",
            "Encoding" => "Identity-H",
        });
        let mut fonts = dictionary! { "F1" => base_font, "F3" => unmapped_font };

        if let Some(cmap) = &self.cmap {
            let cmap_id = doc.add_object(Stream::new(dictionary! {}, cmap.as_bytes().to_vec()));
            let cid_font = doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type0",
                "BaseFont" => "Embedded",
                "Encoding" => "Identity-H",
                "ToUnicode" => cmap_id,
            });
            fonts.set("F2", cid_font);
        }

        let resources_id = doc.add_object(dictionary! { "Font" => fonts });

        let mut kids: Vec<Object> = Vec::new();
        for spec in &self.pages {
            let content_id = doc.add_object(Stream::new(dictionary! {}, page_content(spec)));
            let mut page = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            };
            if let PageSpec::Form(text) = spec {
                // The page itself has no fonts; only the form does
                let form_id = doc.add_object(Stream::new(
                    dictionary! {
                        "Type" => "XObject",
                        "Subtype" => "Form",
                        "BBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                        "Matrix" => vec![1.into(), 0.into(), 0.into(), 1.into(), 0.into(), 0.into()],
                        "Resources" => dictionary! { "Font" => dictionary! { "F1" => base_font } },
                    },
                    show_text("F1", text),
                ));
                page.set("Resources", dictionary! { "XObject" => dictionary! { "X1" => form_id } });
            }
            let page_id: ObjectId = doc.add_object(page);
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        if let Some(title) = &self.title {
            let info_id = doc.add_object(dictionary! {
                "Title" => Object::string_literal(title.as_str()),
                "Creator" => Object::string_literal("pagesift tests"),
            });
            doc.trailer.set("Info", info_id);
        }

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).expect("save generated pdf");
        buffer
    }
}

fn page_content(spec: &PageSpec) -> Vec<u8> {
    let operations = match spec {
        PageSpec::Text(lines) => {
            let mut ops = vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 10.into()]),
                Operation::new("TL", vec![12.into()]),
                Operation::new("Td", vec![40.into(), 800.into()]),
            ];
            for line in lines {
                ops.push(Operation::new("Tj", vec![Object::string_literal(line.as_str())]));
                ops.push(Operation::new("T*", vec![]));
            }
            ops.push(Operation::new("ET", vec![]));
            ops
        }
        PageSpec::Scanned => vec![
            Operation::new("q", vec![]),
            Operation::new("cm", vec![595.into(), 0.into(), 0.into(), 842.into(), 0.into(), 0.into()]),
            Operation::new("Do", vec!["Im1".into()]),
            Operation::new("Q", vec![]),
        ],
        PageSpec::Cid(codes) => {
            let bytes: Vec<u8> = codes.iter().flat_map(|c| c.to_be_bytes()).collect();
            vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F2".into(), 12.into()]),
                Operation::new("Td", vec![40.into(), 800.into()]),
                Operation::new("Tj", vec![Object::String(bytes, StringFormat::Hexadecimal)]),
                Operation::new("ET", vec![]),
            ]
        }
        PageSpec::UnmappedCid(text) => return show_text("F3", text),
        PageSpec::Form(_) => vec![
            Operation::new("q", vec![]),
            Operation::new("Do", vec!["X1".into()]),
            Operation::new("Q", vec![]),
        ],
        PageSpec::Corrupt => return b"\x00\x01\x02 ((( BT unbalanced [ <zz".to_vec(),
    };

    Content { operations }.encode().expect("encode content stream")
}

fn show_text(font: &str, text: &str) -> Vec<u8> {
    let operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![font.into(), 10.into()]),
        Operation::new("Td", vec![40.into(), 800.into()]),
        Operation::new("Tj", vec![Object::string_literal(text)]),
        Operation::new("ET", vec![]),
    ];
    Content { operations }.encode().expect("encode content stream")
}

/// `len` characters of readable filler that starts with `prefix`.
pub fn filler(prefix: &str, len: usize) -> String {
    let words = "lorem ipsum dolor sit amet consectetur adipiscing elit ";
    let mut text = String::from(prefix);
    while text.len() < len {
        text.push_str(words);
    }
    text.truncate(len);
    // Page text is trimmed on extraction, so never end on a space
    if text.ends_with(' ') {
        text.pop();
        text.push('x');
    }
    text
}

pub fn text_pages(count: usize, chars_per_page: usize) -> Vec<PageSpec> {
    (1..=count)
        .map(|n| PageSpec::text(filler(&format!("page{:03} ", n), chars_per_page)))
        .collect()
}

pub fn scanned_pages(count: usize) -> Vec<PageSpec> {
    vec![PageSpec::Scanned; count]
}

/// bfchar CMap for a handful of two-byte codes.
pub fn cmap_for(pairs: &[(u16, char)]) -> String {
    let mut cmap = String::from("/CIDInit /ProcSet findresource begin\nbegincmap\n");
    cmap.push_str(&format!("{} beginbfchar\n", pairs.len()));
    for (code, ch) in pairs {
        cmap.push_str(&format!("<{:04X}> <{:04X}>\n", code, *ch as u32));
    }
    cmap.push_str("endbfchar\nendcmap\nend\n");
    cmap
}
