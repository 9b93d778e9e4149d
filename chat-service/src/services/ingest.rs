//! Converts uploaded files into content descriptors for the model.

use super::metrics;
use crate::models::{ContentBlock, DocumentFormat};
use base64::{Engine, engine::general_purpose::STANDARD};
use service_core::error::AppError;
use thiserror::Error;

/// 3.75 MiB.
pub const MAX_IMAGE_BYTES: usize = 3_932_160;
/// 4.5 MiB.
pub const MAX_DOCUMENT_BYTES: usize = 4_718_592;
pub const MAX_IMAGES: usize = 20;
pub const MAX_DOCUMENTS: usize = 5;
/// Characters kept from a file read as plain text.
pub const TEXT_PREVIEW_CHARS: usize = 1000;

const IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/gif", "image/webp"];

/// One file as received from a multipart form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IngestError {
    #[error("File too large: {size} bytes. Max: {max} bytes")]
    TooLarge { size: usize, max: usize },

    #[error("Too many images. Max: {}", MAX_IMAGES)]
    TooManyImages,

    #[error("Too many documents. Max: {}", MAX_DOCUMENTS)]
    TooManyDocuments,

    #[error("Unsupported file type: {0}")]
    Unsupported(String),
}

impl IngestError {
    fn reason(&self) -> &'static str {
        match self {
            IngestError::TooLarge { .. } => "too_large",
            IngestError::TooManyImages => "too_many_images",
            IngestError::TooManyDocuments => "too_many_documents",
            IngestError::Unsupported(_) => "unsupported",
        }
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        AppError::BadRequest(anyhow::anyhow!(err))
    }
}

enum Kind {
    Image,
    Document,
    Other,
}

/// Convert `files` in order. The first violation rejects the whole upload.
pub fn ingest(files: Vec<UploadedFile>) -> Result<Vec<ContentBlock>, IngestError> {
    let mut blocks = Vec::with_capacity(files.len());
    let mut images = 0;
    let mut documents = 0;

    for file in files {
        let block = convert(file).inspect_err(reject)?;

        match block {
            ContentBlock::Image { .. } => {
                images += 1;
                if images > MAX_IMAGES {
                    return Err(IngestError::TooManyImages).inspect_err(reject);
                }
            }
            ContentBlock::Document { .. } => {
                documents += 1;
                if documents > MAX_DOCUMENTS {
                    return Err(IngestError::TooManyDocuments).inspect_err(reject);
                }
            }
            ContentBlock::Text { .. } => {}
        }

        blocks.push(block);
    }

    Ok(blocks)
}

fn reject(err: &IngestError) {
    metrics::record_upload_rejection(err.reason());
    tracing::warn!(error = %err, "Upload rejected");
}

fn convert(file: UploadedFile) -> Result<ContentBlock, IngestError> {
    let content_type = file.content_type.unwrap_or_default();
    let filename = file.filename.unwrap_or_else(|| "unknown".to_string());

    match classify(&filename, &content_type) {
        Kind::Image => {
            check_size(file.bytes.len(), MAX_IMAGE_BYTES)?;
            Ok(ContentBlock::Image {
                media_type: content_type,
                data: STANDARD.encode(&file.bytes),
            })
        }
        Kind::Document => {
            check_size(file.bytes.len(), MAX_DOCUMENT_BYTES)?;
            Ok(ContentBlock::Document {
                format: document_format(&filename, &content_type),
                name: sanitize_filename(&filename),
                size: file.bytes.len(),
                bytes: file.bytes,
            })
        }
        Kind::Other => match String::from_utf8(file.bytes) {
            Ok(text) => {
                let preview: String = text.chars().take(TEXT_PREVIEW_CHARS).collect();
                Ok(ContentBlock::Text {
                    text: format!("[File: {}]\n{}", filename, preview),
                })
            }
            Err(_) => Err(IngestError::Unsupported(content_type)),
        },
    }
}

fn classify(filename: &str, content_type: &str) -> Kind {
    if IMAGE_TYPES.iter().any(|t| content_type.contains(t)) {
        return Kind::Image;
    }

    let lowered = filename.to_lowercase();
    let known_extension = DocumentFormat::EXTENSIONS
        .iter()
        .any(|(ext, _)| lowered.ends_with(ext));
    let document_type = ["pdf", "word", "csv"]
        .iter()
        .any(|t| content_type.contains(t));

    if known_extension || document_type {
        Kind::Document
    } else {
        Kind::Other
    }
}

fn check_size(size: usize, max: usize) -> Result<(), IngestError> {
    if size > max {
        Err(IngestError::TooLarge { size, max })
    } else {
        Ok(())
    }
}

/// Format from the extension, then the media type, else plain text.
pub fn document_format(filename: &str, content_type: &str) -> DocumentFormat {
    let lowered = filename.to_lowercase();
    if let Some((_, format)) = DocumentFormat::EXTENSIONS
        .iter()
        .find(|(ext, _)| lowered.ends_with(ext))
    {
        return *format;
    }

    if content_type.contains("pdf") {
        DocumentFormat::Pdf
    } else if content_type.contains("word") {
        DocumentFormat::Docx
    } else if content_type.contains("csv") {
        DocumentFormat::Csv
    } else if content_type.contains("html") {
        DocumentFormat::Html
    } else {
        DocumentFormat::Txt
    }
}

/// Strip the extension and any character outside letters, digits,
/// whitespace, hyphens, parentheses and square brackets.
pub fn sanitize_filename(filename: &str) -> String {
    let stem = match filename.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => filename,
    };

    let kept: String = stem
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace() || "-()[]".contains(*c))
        .collect();
    let collapsed = kept.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.is_empty() {
        "document".to_string()
    } else {
        collapsed
    }
}
