//! Tool catalogue: the closed set of tool kinds and their parameter types

pub mod handlers;

use crate::error::Error;
use crate::media::images::{CompressFormat, EditOps, ScaleStrategy};
use crate::media::rename::PatternSettings;
use rmcp::schemars::JsonSchema;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Every tool the server exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    WordToPdf,
    PdfToWord,
    MergePdfs,
    MergeImages,
    CreateGif,
    CompressImages,
    BatchRename,
    BatchEditImages,
    ExtractPdfPage,
    CheckSystem,
}

impl ToolKind {
    pub const ALL: [ToolKind; 10] = [
        ToolKind::WordToPdf,
        ToolKind::PdfToWord,
        ToolKind::MergePdfs,
        ToolKind::MergeImages,
        ToolKind::CreateGif,
        ToolKind::CompressImages,
        ToolKind::BatchRename,
        ToolKind::BatchEditImages,
        ToolKind::ExtractPdfPage,
        ToolKind::CheckSystem,
    ];

    /// Wire name of the tool.
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::WordToPdf => "word_to_pdf",
            ToolKind::PdfToWord => "pdf_to_word",
            ToolKind::MergePdfs => "merge_pdfs",
            ToolKind::MergeImages => "merge_images",
            ToolKind::CreateGif => "create_gif",
            ToolKind::CompressImages => "compress_images",
            ToolKind::BatchRename => "batch_rename",
            ToolKind::BatchEditImages => "batch_edit_images",
            ToolKind::ExtractPdfPage => "extract_pdf_page",
            ToolKind::CheckSystem => "check_system",
        }
    }

    /// Operation name used in status and failure text.
    pub fn label(&self) -> &'static str {
        match self {
            ToolKind::WordToPdf => "Word to PDF conversion",
            ToolKind::PdfToWord => "PDF to Word conversion",
            ToolKind::MergePdfs => "PDF merge",
            ToolKind::MergeImages => "Image merge",
            ToolKind::CreateGif => "GIF creation",
            ToolKind::CompressImages => "Image compression",
            ToolKind::BatchRename => "Batch rename",
            ToolKind::BatchEditImages => "Batch image edit",
            ToolKind::ExtractPdfPage => "PDF page extraction",
            ToolKind::CheckSystem => "System check",
        }
    }

    /// Tools whose failures carry the dependency diagnostic block.
    pub fn wants_diagnostics(&self) -> bool {
        matches!(self, ToolKind::WordToPdf | ToolKind::PdfToWord)
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| Error::input(format!("Unknown tool: {}", s)))
    }
}

// ============================================================================
// Parameter types
// ============================================================================

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct WordToPdfParams {
    /// Base64-encoded .docx content
    #[serde(default)]
    pub word_data: Option<String>,
    /// Local path to a .doc/.docx file (takes precedence over word_data)
    #[serde(default)]
    pub word_path: Option<String>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct PdfToWordParams {
    /// Base64-encoded PDF content
    #[serde(default)]
    pub pdf_data: Option<String>,
    /// Local path to a PDF file (takes precedence over pdf_data)
    #[serde(default)]
    pub pdf_path: Option<String>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct MergePdfsParams {
    /// Base64-encoded PDFs, merged in order
    #[serde(default)]
    pub pdf_files: Option<Vec<String>>,
    /// Local PDF paths, merged in order (take precedence over pdf_files)
    #[serde(default)]
    pub pdf_paths: Option<Vec<String>>,
    /// Prepend a contents page listing each input
    #[serde(default)]
    pub add_toc: bool,
    /// Stamp page numbers at the bottom of each page
    #[serde(default)]
    pub add_page_numbers: bool,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct MergeImagesParams {
    /// Base64-encoded images
    #[serde(default)]
    pub image_files: Option<Vec<String>>,
    /// Local image paths (take precedence over image_files)
    #[serde(default)]
    pub image_paths: Option<Vec<String>>,
    /// Grid rows (derived from the image count when omitted)
    #[serde(default)]
    pub rows: Option<u32>,
    /// Grid columns (derived from the image count when omitted)
    #[serde(default)]
    pub cols: Option<u32>,
    /// Cell fitting: stretch (default), pad or crop
    #[serde(default)]
    pub strategy: ScaleStrategy,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct CreateGifParams {
    /// Base64-encoded frames, in order
    #[serde(default)]
    pub image_files: Option<Vec<String>>,
    /// Local frame paths, in order (take precedence over image_files)
    #[serde(default)]
    pub image_paths: Option<Vec<String>>,
    /// Milliseconds per frame (default: 500)
    #[serde(default = "default_duration")]
    pub duration: u32,
}

fn default_duration() -> u32 {
    500
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct CompressImagesParams {
    /// Base64-encoded images
    #[serde(default)]
    pub image_files: Option<Vec<String>>,
    /// Local image paths (take precedence over image_files)
    #[serde(default)]
    pub image_paths: Option<Vec<String>>,
    /// JPEG quality 1-100 (default: 75)
    #[serde(default = "default_quality")]
    pub quality: u8,
    /// Output format: jpg (default), png or webp
    #[serde(default)]
    pub output_format: CompressFormat,
}

fn default_quality() -> u8 {
    75
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct BatchRenameParams {
    /// Local files to rename, in numbering order
    pub file_paths: Vec<String>,
    /// Naming rule
    #[serde(default)]
    pub pattern_settings: PatternSettings,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct BatchEditImagesParams {
    /// Local images to edit
    pub image_paths: Vec<String>,
    /// Rotation and flips to apply
    #[serde(default)]
    pub operations: EditOps,
    /// Write `<name>_edited.<ext>` beside each image instead of overwriting (default: true)
    #[serde(default = "default_true")]
    pub save_as_copy: bool,
}

fn default_true() -> bool {
    true
}

/// Output type for extracted pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PageFormat {
    #[default]
    Pdf,
    Png,
    #[serde(alias = "jpeg")]
    Jpg,
}

impl PageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            PageFormat::Pdf => "pdf",
            PageFormat::Png => "png",
            PageFormat::Jpg => "jpg",
        }
    }
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct ExtractPdfPageParams {
    /// Local path to the PDF (takes precedence over pdf_data)
    #[serde(default)]
    pub pdf_path: Option<String>,
    /// Base64-encoded PDF content
    #[serde(default)]
    pub pdf_data: Option<String>,
    /// 1-based page to extract (default: 1)
    #[serde(default)]
    pub page_number: Option<u32>,
    /// Page selection such as "1,3,5-7"; one file per page (overrides page_number)
    #[serde(default)]
    pub pages: Option<String>,
    /// pdf (default), png or jpg
    #[serde(default)]
    pub output_format: PageFormat,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct CheckSystemParams {}
