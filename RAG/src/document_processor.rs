use crate::error::{RagError, Result};
use crate::models::*;
use regex::Regex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;

#[derive(Debug, Default)]
pub struct DocumentProcessor;

impl DocumentProcessor {
    pub fn new() -> Self {
        Self
    }

    pub fn process_upload(&self, raw: &RawDocument) -> Result<ParsedDocument> {
        log::info!("Processing {} upload: {}", raw.format, raw.filename);

        let pages = self.parse(&raw.bytes, raw.format)?;

        log::info!("Parsed {} page(s) from {}", pages.len(), raw.filename);
        Ok(ParsedDocument {
            filename: raw.filename.clone(),
            format: raw.format,
            pages,
        })
    }

    pub fn parse(&self, bytes: &[u8], format: DocumentFormat) -> Result<Vec<Page>> {
        match format {
            DocumentFormat::Pdf => self.parse_pdf(bytes),
            DocumentFormat::Docx => self.parse_docx(bytes),
            DocumentFormat::Txt => Ok(self.parse_txt(bytes)),
        }
    }

    fn parse_pdf(&self, bytes: &[u8]) -> Result<Vec<Page>> {
        // pdf-extract panics on some malformed fonts instead of returning an error.
        let extracted = panic::catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem_by_pages(bytes)
        }))
        .map_err(|_| pdf_error("the PDF extractor crashed on this file"))?
        .map_err(|e| pdf_error(e.to_string()))?;

        let pages: Vec<Page> = extracted
            .iter()
            .enumerate()
            .map(|(idx, text)| Page {
                text: self.clean_pdf_text(text),
                page_number: idx as u32 + 1,
            })
            .collect();

        let blank = pages.iter().filter(|p| p.text.is_empty()).count();
        if blank > 0 {
            log::debug!("{} of {} PDF pages have no extractable text", blank, pages.len());
        }
        Ok(pages)
    }

    fn parse_docx(&self, bytes: &[u8]) -> Result<Vec<Page>> {
        let docx = docx_rs::read_docx(bytes).map_err(|e| RagError::DocumentParse {
            format: DocumentFormat::Docx.to_string(),
            message: e.to_string(),
        })?;

        let mut paragraphs = Vec::new();
        for child in &docx.document.children {
            match child {
                docx_rs::DocumentChild::Paragraph(paragraph) => {
                    push_paragraph(&mut paragraphs, paragraph_text(paragraph))
                }
                docx_rs::DocumentChild::Table(table) => table_rows(table, &mut paragraphs),
                _ => {}
            }
        }

        Ok(vec![Page {
            text: paragraphs.join("\n"),
            page_number: 1,
        }])
    }

    fn parse_txt(&self, bytes: &[u8]) -> Vec<Page> {
        vec![Page {
            text: String::from_utf8_lossy(bytes).into_owned(),
            page_number: 1,
        }]
    }

    /// Repairs the layout noise PDF extraction leaves behind: words hyphenated
    /// across lines, hard line wraps inside paragraphs, and stacked blank lines.
    pub fn clean_pdf_text(&self, text: &str) -> String {
        let merged = hyphenated_break().replace_all(text, "${1}${2}");
        let paragraphs = paragraph_break().replace_all(merged.trim(), "\n\n");

        paragraphs
            .split("\n\n")
            .map(|para| {
                para.lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .filter(|para| !para.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

fn push_paragraph(paragraphs: &mut Vec<String>, text: String) {
    if !text.trim().is_empty() {
        paragraphs.push(text);
    }
}

fn paragraph_text(paragraph: &docx_rs::Paragraph) -> String {
    let mut text = String::new();
    for child in &paragraph.children {
        paragraph_child_text(child, &mut text);
    }
    text
}

// Hyperlinks and tracked insertions wrap their runs one level deeper.
fn paragraph_child_text(child: &docx_rs::ParagraphChild, text: &mut String) {
    match child {
        docx_rs::ParagraphChild::Run(run) => run_text(run, text),
        docx_rs::ParagraphChild::Hyperlink(link) => {
            for child in &link.children {
                paragraph_child_text(child, text);
            }
        }
        docx_rs::ParagraphChild::Insert(insert) => {
            for child in &insert.children {
                if let docx_rs::InsertChild::Run(run) = child {
                    run_text(run, text);
                }
            }
        }
        _ => {}
    }
}

fn run_text(run: &docx_rs::Run, text: &mut String) {
    for child in &run.children {
        match child {
            docx_rs::RunChild::Text(t) => text.push_str(&t.text),
            docx_rs::RunChild::Tab(_) => text.push('\t'),
            _ => {}
        }
    }
}

/// One line per table row, cells separated by tabs. Nested tables are
/// flattened into their own rows.
fn table_rows(table: &docx_rs::Table, paragraphs: &mut Vec<String>) {
    for row in &table.rows {
        let docx_rs::TableChild::TableRow(row) = row;
        let mut cells = Vec::new();
        for cell in &row.cells {
            let docx_rs::TableRowChild::TableCell(cell) = cell;
            let mut cell_text = Vec::new();
            for content in &cell.children {
                match content {
                    docx_rs::TableCellContent::Paragraph(paragraph) => {
                        push_paragraph(&mut cell_text, paragraph_text(paragraph))
                    }
                    docx_rs::TableCellContent::Table(nested) => table_rows(nested, paragraphs),
                    _ => {}
                }
            }
            cells.push(cell_text.join(" "));
        }
        push_paragraph(paragraphs, cells.join("\t"));
    }
}

fn pdf_error(message: impl Into<String>) -> RagError {
    RagError::DocumentParse {
        format: DocumentFormat::Pdf.to_string(),
        message: message.into(),
    }
}

fn hyphenated_break() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\w+)-\n(\w+)").expect("hyphenation pattern is valid"))
}

fn paragraph_break() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n[ \t]*\n\s*").expect("paragraph pattern is valid"))
}
