//! Plain-text extraction from a single .docx file.

use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::OnceLock;

use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use sha2::{Digest, Sha256};
use zip::result::ZipError;
use zip::ZipArchive;

use super::errors::{LoadError, Result};
use crate::rag::Document;

const DOCUMENT_PART: &str = "word/document.xml";
const CORE_PROPERTIES_PART: &str = "docProps/core.xml";

/// Prefix of the first line when the document has a title.
pub const TITLE_PREFIX: &str = "제목: ";

/// Separator between non-blank cells of one table row.
pub const CELL_SEPARATOR: &str = " | ";

/// Body text of a .docx, split the way it is laid out in the file.
#[derive(Debug, Default, PartialEq)]
pub struct DocxContent {
    pub title: Option<String>,
    /// Top-level paragraphs with text, trimmed
    pub paragraphs: Vec<String>,
    /// One entry per table row, non-blank cells joined by [`CELL_SEPARATOR`]
    pub table_rows: Vec<String>,
}

impl DocxContent {
    /// Title line, then paragraphs, then table rows, cleaned.
    pub fn to_text(&self) -> String {
        let mut lines = Vec::with_capacity(self.paragraphs.len() + self.table_rows.len() + 1);
        if let Some(title) = &self.title {
            lines.push(format!("{}{}", TITLE_PREFIX, title));
        }
        lines.extend(self.paragraphs.iter().cloned());
        lines.extend(self.table_rows.iter().cloned());
        clean_text(&lines.join("\n"))
    }
}

/// Load one .docx file into a [`Document`] with the given id.
pub fn load_document(path: &Path, id: &str) -> Result<Document> {
    let bytes = fs::read(path)?;
    let fingerprint = fingerprint(&bytes);

    let content = read_docx(&bytes)?;
    let text = content.to_text();
    if text.is_empty() {
        return Err(LoadError::Empty);
    }

    Ok(Document {
        id: id.to_string(),
        path: path.to_path_buf(),
        title: content.title,
        text,
        fingerprint,
    })
}

/// Parse the body and core properties of an in-memory .docx archive.
pub fn read_docx(bytes: &[u8]) -> Result<DocxContent> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let body = match read_part(&mut archive, DOCUMENT_PART)? {
        Some(xml) => xml,
        None => return Err(LoadError::MissingPart(DOCUMENT_PART.to_string())),
    };

    let mut content = parse_body(&body)?;
    content.title = match read_part(&mut archive, CORE_PROPERTIES_PART)? {
        Some(xml) => parse_title(&xml)?,
        None => None,
    };

    Ok(content)
}

/// SHA-256 of the file bytes, hex encoded.
pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Collapse newline runs and space runs, then trim.
pub fn clean_text(text: &str) -> String {
    static NEWLINES: OnceLock<Regex> = OnceLock::new();
    static SPACES: OnceLock<Regex> = OnceLock::new();

    let newlines = NEWLINES.get_or_init(|| Regex::new(r"\n+").expect("Invalid regex"));
    let spaces = SPACES.get_or_init(|| Regex::new(r" +").expect("Invalid regex"));

    let text = newlines.replace_all(text, "\n");
    let text = spaces.replace_all(&text, " ");
    text.trim().to_string()
}

fn read_part(archive: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> Result<Option<String>> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut xml = String::new();
    file.read_to_string(&mut xml)?;
    Ok(Some(xml))
}

/// Walk `word/document.xml`.
///
/// Paragraphs inside tables belong to their cell; nested tables are folded
/// into the enclosing cell.
fn parse_body(xml: &str) -> Result<DocxContent> {
    let mut reader = Reader::from_str(xml);

    let mut content = DocxContent::default();
    let mut table_depth = 0usize;
    let mut in_text = false;
    let mut paragraph = String::new();
    let mut cell: Vec<String> = Vec::new();
    let mut row: Vec<String> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"p" => paragraph.clear(),
                b"t" => in_text = true,
                b"tbl" => table_depth += 1,
                b"tr" if table_depth == 1 => row.clear(),
                b"tc" if table_depth == 1 => cell.clear(),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"tab" => paragraph.push('\t'),
                b"br" | b"cr" => paragraph.push('\n'),
                _ => {}
            },
            Event::Text(e) if in_text => paragraph.push_str(&e.unescape()?),
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let text = paragraph.trim();
                    if !text.is_empty() {
                        if table_depth == 0 {
                            content.paragraphs.push(text.to_string());
                        } else {
                            cell.push(text.to_string());
                        }
                    }
                    paragraph.clear();
                }
                b"tc" if table_depth == 1 => {
                    let text = cell.join("\n");
                    let text = text.trim();
                    if !text.is_empty() {
                        row.push(text.to_string());
                    }
                }
                b"tr" if table_depth == 1 => {
                    if !row.is_empty() {
                        content.table_rows.push(row.join(CELL_SEPARATOR));
                    }
                }
                b"tbl" => table_depth = table_depth.saturating_sub(1),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(content)
}

fn parse_title(xml: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_str(xml);
    let mut in_title = false;
    let mut title = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"title" => in_title = true,
            Event::End(e) if e.local_name().as_ref() == b"title" => in_title = false,
            Event::Text(e) if in_title => title.push_str(&e.unescape()?),
            Event::Eof => break,
            _ => {}
        }
    }

    let title = title.trim();
    Ok((!title.is_empty()).then(|| title.to_string()))
}
