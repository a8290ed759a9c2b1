// src/document/mod.rs
//! Document loader: archive vs. raw markup, entry selection, decoding and
//! strict-then-lenient parsing.

pub mod tree;

use std::io::{Cursor, Read};

use encoding_rs::{Encoding, UTF_8};
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use zip::ZipArchive;

use crate::utils::error::LoadError;
pub use tree::{Attributes, Element, Node, QName};

// --- Namespaces ---
pub const XBRLI_NAMESPACES: &[&str] = &["http://www.xbrl.org/2003/instance"];
pub const INLINE_NAMESPACES: &[&str] = &[
    "http://www.xbrl.org/2013/inlineXBRL",
    "http://www.xbrl.org/2008/inlineXBRL",
];

// Primary statement documents win over rendered pages
pub const STATEMENT_EXTENSIONS: &[&str] = &[".xbrl"];
pub const PAGE_EXTENSIONS: &[&str] = &[".htm", ".html"];

// Only the head of the document is searched for an encoding declaration
const CHARSET_SNIFF_BYTES: usize = 1024;

static DECLARED_CHARSET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(?:encoding|charset)\s*=\s*["']?([A-Za-z0-9._:\-]+)"#)
        .expect("Failed to compile DECLARED_CHARSET_RE")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Archive { entry: String },
    Markup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    Strict,
    Lenient,
}

#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub root: Element,
    pub source: Source,
    pub mode: ParseMode,
}

/// Loads a filing from an archive or from raw markup bytes.
///
/// The archive handle lives only for the duration of this call. The only
/// terminal failure for a readable archive is the absence of any statement
/// or page entry; malformed markup always parses (leniently).
pub fn load(bytes: &[u8]) -> Result<LoadedDocument, LoadError> {
    let mut archive = match ZipArchive::new(Cursor::new(bytes)) {
        Ok(archive) => archive,
        Err(e) => {
            tracing::debug!(
                "Input is not an archive ({}), treating {} bytes as raw markup",
                e,
                bytes.len()
            );
            let (root, mode) = parse_markup(bytes);
            return Ok(LoadedDocument {
                root,
                source: Source::Markup,
                mode,
            });
        }
    };

    let entry = select_entry(archive.file_names())
        .ok_or_else(|| LoadError::NoStatementDocument(archive.len()))?;
    tracing::info!("Selected archive entry '{}' out of {} entries", entry, archive.len());

    let mut data = Vec::new();
    archive.by_name(&entry)?.read_to_end(&mut data)?;

    let (root, mode) = parse_markup(&data);
    Ok(LoadedDocument {
        root,
        source: Source::Archive { entry },
        mode,
    })
}

/// Picks the lexicographically first statement entry, else the first page entry.
/// Extension matching ignores case.
pub fn select_entry<'a, I>(names: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let names: Vec<&str> = names.into_iter().collect();
    [STATEMENT_EXTENSIONS, PAGE_EXTENSIONS]
        .iter()
        .find_map(|extensions| {
            names
                .iter()
                .filter(|name| has_extension(name, extensions))
                .min()
                .map(|name| name.to_string())
        })
}

fn has_extension(name: &str, extensions: &[&str]) -> bool {
    let lower = name.to_ascii_lowercase();
    extensions.iter().any(|ext| lower.ends_with(ext))
}

/// Decodes markup bytes: BOM first, then a declared encoding/charset, else UTF-8.
/// Undecodable sequences become U+FFFD.
pub fn decode(bytes: &[u8]) -> String {
    let head = &bytes[..bytes.len().min(CHARSET_SNIFF_BYTES)];
    let declared = DECLARED_CHARSET_RE
        .captures(head)
        .and_then(|caps| caps.get(1))
        .and_then(|label| Encoding::for_label(label.as_bytes()));

    let (text, used, had_errors) = declared.unwrap_or(UTF_8).decode(bytes);
    if had_errors {
        tracing::debug!("Decoding as {} replaced malformed byte sequences", used.name());
    }
    text.into_owned()
}

/// Strict XML first; on any syntax error, the lenient HTML5 parser.
pub fn parse_markup(bytes: &[u8]) -> (Element, ParseMode) {
    let text = decode(bytes);
    match tree::parse_strict(&text) {
        Ok(root) => (root, ParseMode::Strict),
        Err(e) => {
            tracing::debug!("Strict XML parse failed ({}), re-parsing leniently", e);
            (reroot_instance(tree::parse_lenient(&text)), ParseMode::Lenient)
        }
    }
}

// html5ever always wraps content in <html>; a broken instance document would
// otherwise be mistaken for an inline page.
fn reroot_instance(root: Element) -> Element {
    let has_inline_facts = root.descendants().any(|el| {
        el.in_namespace(INLINE_NAMESPACES, "ix")
            && (el.local_is("nonFraction") || el.local_is("nonNumeric"))
    });
    if has_inline_facts {
        return root;
    }
    let instance = root.descendants().find(|el| el.local_is("xbrl")).cloned();
    instance.unwrap_or(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    fn archive(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, body) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_select_entry_prefers_statement_documents() {
        let names = ["b/page.htm", "XBRL/PublicDoc/z.xbrl", "XBRL/PublicDoc/a.XBRL"];
        assert_eq!(select_entry(names), Some("XBRL/PublicDoc/a.XBRL".to_string()));
    }

    #[test]
    fn test_select_entry_falls_back_to_pages() {
        let names = ["manifest.xml", "b.HTML", "a.htm"];
        assert_eq!(select_entry(names), Some("a.htm".to_string()));
        assert_eq!(select_entry(["readme.txt"]), None);
    }

    #[test]
    fn test_load_raw_markup() {
        let doc = load(b"<root><a>1</a></root>").expect("raw markup loads");
        assert_eq!(doc.source, Source::Markup);
        assert_eq!(doc.mode, ParseMode::Strict);
        assert!(doc.root.local_is("root"));
    }

    #[test]
    fn test_load_archive_picks_first_entry() {
        let bytes = archive(&[
            ("z.xbrl", "<zroot/>"),
            ("a.xbrl", "<aroot/>"),
            ("index.htm", "<html/>"),
        ]);
        let doc = load(&bytes).expect("archive loads");
        assert_eq!(doc.source, Source::Archive { entry: "a.xbrl".to_string() });
        assert!(doc.root.local_is("aroot"));
    }

    #[test]
    fn test_load_archive_without_markup_fails() {
        let bytes = archive(&[("readme.txt", "nothing here"), ("data.csv", "1,2")]);
        match load(&bytes) {
            Err(LoadError::NoStatementDocument(2)) => {}
            other => panic!("expected NoStatementDocument, got {:?}", other.map(|d| d.source)),
        }
    }

    #[test]
    fn test_malformed_markup_is_parsed_leniently() {
        let doc = load(b"<html><body><p>unclosed <b>bold</body>").expect("never fails on markup");
        assert_eq!(doc.mode, ParseMode::Lenient);
        assert!(doc.root.text_content().contains("bold"));
    }

    #[test]
    fn test_broken_instance_is_rerooted() {
        let xml = "<xbrli:xbrl xmlns:xbrli=\"http://www.xbrl.org/2003/instance\"><a>1 & 2</a></xbrli:xbrl>";
        let doc = load(xml.as_bytes()).expect("lenient parse");
        assert_eq!(doc.mode, ParseMode::Lenient);
        assert!(doc.root.local_is("xbrl"));
    }

    #[test]
    fn test_decode_honours_declared_encoding() {
        let markup = "<?xml version=\"1.0\" encoding=\"Shift_JIS\"?><a>売上高</a>";
        let (encoded, _, _) = encoding_rs::SHIFT_JIS.encode(markup);
        assert_eq!(decode(&encoded), markup);
    }
}
