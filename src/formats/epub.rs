//! EPUB text extraction.

use crate::error::{AppError, Result};
use crate::formats::{ContentExtractor, clean_extracted_text};
use regex::Regex;
use roxmltree::{Document, Node, ParsingOptions};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;
use zip::ZipArchive;

static SCRIPT_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|head)\b.*?</(script|style|head)\s*>")
        .expect("valid script pattern")
});
static BLOCK_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(p|div|h[1-6]|li|tr|br|section|blockquote)\b[^>]*>")
        .expect("valid block pattern")
});
static ANY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag pattern"));
static HORIZONTAL_WS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\u{00A0}]+").expect("valid whitespace pattern"));

const BLOCK_ELEMENTS: &[&str] = &[
    "p",
    "div",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "li",
    "tr",
    "br",
    "section",
    "blockquote",
];

const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "head", "nav"];

/// Text extraction for EPUB files: spine documents in reading order.
pub struct EpubExtractor;

impl EpubExtractor {
    /// Find the OPF file path from container.xml.
    fn find_opf_path(archive: &mut ZipArchive<File>) -> Result<String> {
        let mut container = archive.by_name("META-INF/container.xml")?;
        let mut content = String::new();
        container.read_to_string(&mut content)?;

        let doc = Document::parse(&content)?;

        doc.descendants()
            .find(|n| n.has_tag_name("rootfile"))
            .and_then(|n| n.attribute("full-path"))
            .map(String::from)
            .ok_or_else(|| AppError::InvalidFormat("No rootfile in container.xml".into()))
    }

    /// Archive paths of the spine documents, in reading order.
    fn spine_paths(opf: &str, opf_dir: &str) -> Result<Vec<String>> {
        let doc = Document::parse(opf)?;

        let manifest: HashMap<&str, &str> = doc
            .descendants()
            .filter(|n| n.has_tag_name("item"))
            .filter_map(|n| Some((n.attribute("id")?, n.attribute("href")?)))
            .collect();

        let paths = doc
            .descendants()
            .filter(|n| n.has_tag_name("itemref"))
            .filter_map(|n| n.attribute("idref"))
            .filter_map(|idref| manifest.get(idref))
            .map(|href| resolve_href(opf_dir, href))
            .collect();

        Ok(paths)
    }

    /// HTML entries in archive order, used when the package has no spine.
    fn html_entries(archive: &ZipArchive<File>) -> Vec<String> {
        archive
            .file_names()
            .filter(|name| {
                let lower = name.to_lowercase();
                !lower.starts_with("meta-inf")
                    && (lower.ends_with(".html")
                        || lower.ends_with(".xhtml")
                        || lower.ends_with(".htm"))
            })
            .map(String::from)
            .collect()
    }

    fn read_entry(archive: &mut ZipArchive<File>, name: &str) -> Result<String> {
        let mut bytes = Vec::new();
        archive.by_name(name)?.read_to_end(&mut bytes)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl ContentExtractor for EpubExtractor {
    fn extract_text(&self, path: &Path) -> Result<String> {
        let file = File::open(path)?;
        let mut archive = ZipArchive::new(file)?;

        let opf_path = Self::find_opf_path(&mut archive)?;
        let opf_dir = opf_path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
        let opf = Self::read_entry(&mut archive, &opf_path)?;

        let mut documents = Self::spine_paths(&opf, opf_dir)?;
        if documents.is_empty() {
            documents = Self::html_entries(&archive);
        }

        let mut chapters = Vec::new();
        for name in &documents {
            let markup = match Self::read_entry(&mut archive, name) {
                Ok(markup) => markup,
                Err(e) => {
                    tracing::debug!(entry = %name, error = %e, "Skipping missing EPUB entry");
                    continue;
                }
            };

            let text = document_text(&markup);
            if !text.trim().is_empty() {
                chapters.push(text);
            }
        }

        Ok(clean_extracted_text(&chapters.join("\n\n")))
    }
}

/// Resolve a manifest href against the OPF directory.
fn resolve_href(opf_dir: &str, href: &str) -> String {
    let href = href.split('#').next().unwrap_or(href);
    let href = urlencoding::decode(href)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| href.to_string());

    let mut parts: Vec<&str> = opf_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in href.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}

/// Readable text of one XHTML document, paragraphs separated by blank lines.
fn document_text(markup: &str) -> String {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };

    match Document::parse_with_options(markup, options) {
        Ok(doc) => {
            let root = doc
                .descendants()
                .find(|n| n.has_tag_name("body"))
                .unwrap_or_else(|| doc.root_element());
            let mut out = String::new();
            collect_text(root, &mut out);
            normalize_blocks(&out)
        }
        // HTML entities such as &nbsp; are not valid XML; fall back to tag stripping.
        Err(_) => strip_tags(markup),
    }
}

fn collect_text(node: Node<'_, '_>, out: &mut String) {
    for child in node.children() {
        if child.is_text() {
            if let Some(text) = child.text() {
                out.push_str(text);
            }
            continue;
        }

        if !child.is_element() {
            continue;
        }

        let name = child.tag_name().name().to_lowercase();
        if SKIPPED_ELEMENTS.contains(&name.as_str()) {
            continue;
        }

        let block = BLOCK_ELEMENTS.contains(&name.as_str());
        if block {
            out.push('\n');
        }
        collect_text(child, out);
        if block {
            out.push('\n');
        }
    }
}

fn strip_tags(markup: &str) -> String {
    let text = SCRIPT_STYLE.replace_all(markup, "");
    let text = BLOCK_TAG.replace_all(&text, "\n");
    let text = ANY_TAG.replace_all(&text, "");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    normalize_blocks(&text)
}

/// Collapse whitespace inside each line and separate non-empty lines with a blank line.
fn normalize_blocks(text: &str) -> String {
    text.lines()
        .map(|line| HORIZONTAL_WS.replace_all(line, " ").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}
