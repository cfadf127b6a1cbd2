//! PDF domain operations
//!
//! Page assembly (merge, extract) goes through the qpdf crate (vendored FFI).
//! Anything that draws or rasterizes (contents page, page numbers, page
//! renders, previews) goes through PDFium, which is bound at runtime and may
//! be absent.

use crate::error::{Error, Result};
use image::DynamicImage;
use pdfium_render::prelude::*;
use qpdf::QPdf;
use std::path::Path;

/// Distance of stamped page numbers from the bottom edge, in points.
const PAGE_NUMBER_MARGIN: f32 = 30.0;
const PAGE_NUMBER_SIZE: f32 = 10.0;
/// Average Helvetica glyph advance as a fraction of the font size.
const HELVETICA_ADVANCE: f32 = 0.556;

fn map_qpdf_error(e: qpdf::QPdfError) -> Error {
    Error::Qpdf {
        reason: e.to_string(),
    }
}

fn map_pdfium_error(context: &str) -> impl Fn(PdfiumError) -> Error + '_ {
    move |e| Error::Pdfium {
        reason: format!("{}: {}", context, e),
    }
}

/// Number of pages in a PDF.
pub fn page_count(data: &[u8]) -> Result<u32> {
    let pdf = QPdf::read_from_memory(data).map_err(map_qpdf_error)?;
    pdf.get_num_pages().map_err(map_qpdf_error)
}

/// Result of concatenating several PDFs.
#[derive(Debug, Clone)]
pub struct MergedPdf {
    pub bytes: Vec<u8>,
    /// Page count of each input, in input order.
    pub page_counts: Vec<u32>,
}

/// Concatenate PDFs in order.
pub fn merge(paths: &[&Path]) -> Result<MergedPdf> {
    if paths.is_empty() {
        return Err(Error::input("No input PDFs provided"));
    }

    let dest = QPdf::empty();
    let mut page_counts = Vec::with_capacity(paths.len());

    for (i, path) in paths.iter().enumerate() {
        let data = std::fs::read(path)?;
        let source = QPdf::read_from_memory(&data).map_err(|e| Error::Qpdf {
            reason: format!("Failed to read PDF #{}: {}", i + 1, e),
        })?;
        let pages = source.get_pages().map_err(|e| Error::Qpdf {
            reason: format!("Failed to get pages from PDF #{}: {}", i + 1, e),
        })?;

        for page in &pages {
            let copied = dest.copy_from_foreign(page);
            dest.add_page(&copied, false).map_err(map_qpdf_error)?;
        }
        page_counts.push(pages.len() as u32);
    }

    let mut writer = dest.writer();
    writer.preserve_encryption(false);
    let bytes = writer.write_to_memory().map_err(map_qpdf_error)?;
    Ok(MergedPdf { bytes, page_counts })
}

/// Copy one 1-based page into a new single-page PDF.
pub fn extract_page(data: &[u8], page_number: u32) -> Result<Vec<u8>> {
    let source = QPdf::read_from_memory(data).map_err(map_qpdf_error)?;
    let total = source.get_num_pages().map_err(map_qpdf_error)?;
    check_page(page_number, total)?;

    let page = source
        .get_page(page_number - 1)
        .ok_or_else(|| page_out_of_range(page_number, total))?;

    let dest = QPdf::empty();
    let copied = dest.copy_from_foreign(&page);
    dest.add_page(&copied, false).map_err(map_qpdf_error)?;

    let mut writer = dest.writer();
    writer.preserve_encryption(false);
    writer.write_to_memory().map_err(map_qpdf_error)
}

fn page_out_of_range(page: u32, total: u32) -> Error {
    Error::validation(format!(
        "Page {} is out of range (document has {} pages)",
        page, total
    ))
}

fn check_page(page: u32, total: u32) -> Result<()> {
    if page == 0 || page > total {
        return Err(page_out_of_range(page, total));
    }
    Ok(())
}

/// Parse a page selection like `"1,3,5-7"` into sorted, deduplicated
/// 1-based page numbers, all within `1..=max_pages`.
pub fn parse_page_range(range: &str, max_pages: u32) -> Result<Vec<u32>> {
    let invalid = || Error::validation(format!("Invalid page range: {}", range));
    let mut pages = Vec::new();

    for part in range.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if let Some((start, end)) = part.split_once('-') {
            let start: u32 = start.trim().parse().map_err(|_| invalid())?;
            let end: u32 = end.trim().parse().map_err(|_| invalid())?;
            if start > end {
                return Err(invalid());
            }
            check_page(start, max_pages)?;
            check_page(end, max_pages)?;
            pages.extend(start..=end);
        } else {
            let page: u32 = part.parse().map_err(|_| invalid())?;
            check_page(page, max_pages)?;
            pages.push(page);
        }
    }

    if pages.is_empty() {
        return Err(invalid());
    }
    pages.sort();
    pages.dedup();
    Ok(pages)
}

/// Bind PDFium from the working directory, `/opt/pdfium/lib`, or the system.
pub fn create_pdfium() -> Result<Pdfium> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "/opt/pdfium/lib",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| Error::Pdfium {
            reason: format!("Failed to initialize PDFium library: {}", e),
        })?;

    Ok(Pdfium::new(bindings))
}

pub fn pdfium_available() -> bool {
    create_pdfium().is_ok()
}

/// One line of the generated contents page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub name: String,
    pub pages: u32,
    /// 1-based page in the final document where this input starts.
    pub start_page: u32,
}

/// Contents entries for inputs of the given page counts. With a contents
/// page present, the first input starts on page 2.
pub fn toc_entries(names: &[String], page_counts: &[u32]) -> Vec<TocEntry> {
    let mut next = 2;
    names
        .iter()
        .zip(page_counts)
        .map(|(name, &pages)| {
            let entry = TocEntry {
                name: name.clone(),
                pages,
                start_page: next,
            };
            next += pages;
            entry
        })
        .collect()
}

fn approx_text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * HELVETICA_ADVANCE
}

/// Prepend a contents page and/or stamp page numbers onto a merged PDF.
///
/// Numbering skips the contents page, so content starts at 2 when `toc`
/// is given and at 1 otherwise.
pub fn decorate(bytes: Vec<u8>, toc: Option<&[TocEntry]>, page_numbers: bool) -> Result<Vec<u8>> {
    let pdfium = create_pdfium()?;
    let mut document = pdfium
        .load_pdf_from_byte_vec(bytes, None)
        .map_err(map_pdfium_error("Failed to load merged PDF"))?;
    let font = document.fonts_mut().helvetica();

    if page_numbers {
        let mut number = if toc.is_some() { 2 } else { 1 };
        for mut page in document.pages().iter() {
            let label = number.to_string();
            let x = (page.width().value - approx_text_width(&label, PAGE_NUMBER_SIZE)) / 2.0;
            page.objects_mut()
                .create_text_object(
                    PdfPoints::new(x),
                    PdfPoints::new(PAGE_NUMBER_MARGIN),
                    &label,
                    font,
                    PdfPoints::new(PAGE_NUMBER_SIZE),
                )
                .map_err(map_pdfium_error("Failed to stamp page number"))?;
            number += 1;
        }
    }

    if let Some(entries) = toc {
        let mut page = document
            .pages_mut()
            .create_page_at_start(PdfPagePaperSize::a4())
            .map_err(map_pdfium_error("Failed to create contents page"))?;
        let width = page.width().value;
        let height = page.height().value;

        let title = "Table of Contents";
        page.objects_mut()
            .create_text_object(
                PdfPoints::new((width - approx_text_width(title, 24.0)) / 2.0),
                PdfPoints::new(height - 80.0),
                title,
                font,
                PdfPoints::new(24.0),
            )
            .map_err(map_pdfium_error("Failed to write contents title"))?;

        let mut y = height - 140.0;
        for (i, entry) in entries.iter().enumerate() {
            let label = format!("{}. {}", i + 1, entry.name);
            let info = format!("{} pages, starts at p.{}", entry.pages, entry.start_page);
            let objects = page.objects_mut();
            objects
                .create_text_object(
                    PdfPoints::new(80.0),
                    PdfPoints::new(y),
                    &label,
                    font,
                    PdfPoints::new(12.0),
                )
                .map_err(map_pdfium_error("Failed to write contents entry"))?;
            objects
                .create_text_object(
                    PdfPoints::new(width - 80.0 - approx_text_width(&info, 12.0)),
                    PdfPoints::new(y),
                    &info,
                    font,
                    PdfPoints::new(12.0),
                )
                .map_err(map_pdfium_error("Failed to write contents entry"))?;
            y -= 25.0;
        }
    }

    document
        .save_to_bytes()
        .map_err(map_pdfium_error("Failed to save decorated PDF"))
}

/// Rasterize a 1-based page at the given DPI.
pub fn render_page(data: &[u8], page_number: u32, dpi: f32) -> Result<DynamicImage> {
    let pdfium = create_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(data, None)
        .map_err(map_pdfium_error("Failed to load PDF"))?;
    let pages = document.pages();
    let total = pages.len() as u32;
    check_page(page_number, total)?;

    let page = pages
        .get((page_number - 1) as u16)
        .map_err(|e| Error::Pdfium {
            reason: format!("Failed to get page {}: {}", page_number, e),
        })?;
    let target_width = (page.width().value / 72.0 * dpi).round().max(1.0) as i32;
    let config = PdfRenderConfig::new()
        .set_target_width(target_width)
        .render_form_data(true)
        .render_annotations(true);

    let bitmap = page
        .render_with_config(&config)
        .map_err(|e| Error::Pdfium {
            reason: format!("Failed to render page {}: {}", page_number, e),
        })?;
    Ok(bitmap.as_image())
}
