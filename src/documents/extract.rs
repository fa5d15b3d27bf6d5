//! Plain-text extraction from supported file formats.
//!
//! | extension      | reader                                   |
//! |----------------|------------------------------------------|
//! | `.txt`, `.md`  | UTF-8 (invalid sequences replaced)       |
//! | `.pdf`         | `pdf-extract`                            |
//! | `.docx`        | `word/document.xml` inside the zip       |

use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read PDF: {0}")]
    Pdf(String),

    #[error("Failed to read DOCX: {0}")]
    Docx(String),
}

pub type ExtractResult<T> = Result<T, ExtractError>;

static XML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

/// Extract the text content of `path`, dispatching on its extension.
pub fn extract_text(path: impl AsRef<Path>) -> ExtractResult<String> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    // Surface a missing file as IO error before format dispatch
    std::fs::metadata(path)?;

    let text = match ext.as_str() {
        "txt" | "md" => read_plain(path)?,
        "pdf" => read_pdf(path)?,
        "docx" => read_docx(path)?,
        other => {
            let shown = if other.is_empty() {
                path.display().to_string()
            } else {
                format!(".{other}")
            };
            return Err(ExtractError::UnsupportedFormat(shown));
        }
    };

    tracing::debug!(
        target: "storage",
        "extracted {} chars from {}",
        text.chars().count(),
        path.display()
    );
    Ok(text)
}

fn read_plain(path: &Path) -> ExtractResult<String> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).trim().to_string())
}

fn read_pdf(path: &Path) -> ExtractResult<String> {
    let text = pdf_extract::extract_text(path).map_err(|e| ExtractError::Pdf(e.to_string()))?;
    Ok(text.trim().to_string())
}

fn read_docx(path: &Path) -> ExtractResult<String> {
    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| ExtractError::Docx(e.to_string()))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| ExtractError::Docx(e.to_string()))?
        .read_to_string(&mut xml)?;

    Ok(document_xml_to_text(&xml))
}

/// Flatten WordprocessingML into text: one line per paragraph.
fn document_xml_to_text(xml: &str) -> String {
    let marked = xml
        .replace("</w:p>", "\n")
        .replace("<w:tab/>", "\t")
        .replace("<w:br/>", "\n");
    let stripped = XML_TAG.replace_all(&marked, "");

    decode_entities(&stripped)
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn decode_entities(text: &str) -> String {
    // &amp; last so "&amp;lt;" decodes to "&lt;", not "<"
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
