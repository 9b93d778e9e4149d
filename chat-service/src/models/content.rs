//! Content descriptors produced from uploaded files.

use serde::Serialize;
use std::fmt;

/// Normalized representation of an uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    /// Base64 encoded image with its declared media type.
    Image { media_type: String, data: String },

    /// Raw document bytes. Only the metadata is serialized.
    Document {
        format: DocumentFormat,
        name: String,
        size: usize,
        #[serde(skip)]
        bytes: Vec<u8>,
    },

    /// Decoded text of an otherwise unsupported file.
    Text { text: String },
}

impl ContentBlock {
    pub fn kind(&self) -> &'static str {
        match self {
            ContentBlock::Image { .. } => "image",
            ContentBlock::Document { .. } => "document",
            ContentBlock::Text { .. } => "text",
        }
    }
}

/// Document formats accepted by the ingestor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Csv,
    Txt,
    Html,
    Md,
}

impl DocumentFormat {
    /// Extension table, checked in order.
    pub const EXTENSIONS: [(&'static str, DocumentFormat); 6] = [
        (".pdf", DocumentFormat::Pdf),
        (".docx", DocumentFormat::Docx),
        (".csv", DocumentFormat::Csv),
        (".txt", DocumentFormat::Txt),
        (".html", DocumentFormat::Html),
        (".md", DocumentFormat::Md),
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Csv => "csv",
            DocumentFormat::Txt => "txt",
            DocumentFormat::Html => "html",
            DocumentFormat::Md => "md",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "application/pdf",
            DocumentFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            DocumentFormat::Csv => "text/csv",
            DocumentFormat::Txt => "text/plain",
            DocumentFormat::Html => "text/html",
            DocumentFormat::Md => "text/markdown",
        }
    }

    /// Whether the format is plain text the model can read directly.
    pub fn is_textual(&self) -> bool {
        !matches!(self, DocumentFormat::Pdf | DocumentFormat::Docx)
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
