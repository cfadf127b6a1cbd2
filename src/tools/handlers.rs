//! Tool handlers
//!
//! Every handler runs the same phases: gate the batch size, resolve and
//! validate inputs, run the domain operation, place and encode the output.
//! Cleanup is owned by the request's [`StagingPool`], which releases every
//! temp file when it goes out of scope on both the success and error paths.

use super::{
    BatchEditImagesParams, BatchRenameParams, CheckSystemParams, CompressImagesParams,
    CreateGifParams, ExtractPdfPageParams, MergeImagesParams, MergePdfsParams, PageFormat,
    PdfToWordParams, ToolKind, WordToPdfParams,
};
use crate::config::ServerConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::media::convert::{self, DependencyReport};
use crate::media::images::{self, EditOps};
use crate::media::{pdf, rename};
use crate::response::{encode_artifact, error_lines, Reply};
use crate::staging::{
    batch_len, check_batch, clean_path_argument, format_size, resolve_input, resolve_many,
    validate_image, validate_size, write_output, ImageCheck, OutputDecision, Placement, StagedFile,
    StagingPool,
};
use image::{DynamicImage, ImageFormat};
use serde::de::DeserializeOwned;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// DPI for pages extracted as raster images.
const PAGE_RENDER_DPI: f32 = 150.0;

// ============================================================================
// Entry points
// ============================================================================

/// Run one handler inside a `tool_call` span and turn its error, if any,
/// into a failure reply.
pub fn run<F>(kind: ToolKind, config: &ServerConfig, handler: F) -> Reply
where
    F: FnOnce(&ServerConfig) -> Result<Reply>,
{
    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("tool_call", tool = %kind, request_id = %request_id);
    let _enter = span.enter();
    let started = Instant::now();

    match handler(config) {
        Ok(reply) => {
            tracing::info!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                outcome = "ok",
                payloads = reply.payloads.len(),
                "tool call finished"
            );
            reply
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                kind = %e.kind(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "tool call failed"
            );
            let diagnostics = (kind.wants_diagnostics() && e.kind() == ErrorKind::Operation)
                .then(|| DependencyReport::collect(config).render());
            Reply::failure(kind.label(), &e, diagnostics)
        }
    }
}

/// Deserialize raw JSON arguments for `kind` and run its handler.
pub fn dispatch(kind: ToolKind, config: &ServerConfig, arguments: serde_json::Value) -> Reply {
    let arguments = if arguments.is_null() {
        serde_json::json!({})
    } else {
        arguments
    };

    match kind {
        ToolKind::WordToPdf => run_with(kind, config, arguments, word_to_pdf),
        ToolKind::PdfToWord => run_with(kind, config, arguments, pdf_to_word),
        ToolKind::MergePdfs => run_with(kind, config, arguments, merge_pdfs),
        ToolKind::MergeImages => run_with(kind, config, arguments, merge_images),
        ToolKind::CreateGif => run_with(kind, config, arguments, create_gif),
        ToolKind::CompressImages => run_with(kind, config, arguments, compress_images),
        ToolKind::BatchRename => run_with(kind, config, arguments, batch_rename),
        ToolKind::BatchEditImages => run_with(kind, config, arguments, batch_edit_images),
        ToolKind::ExtractPdfPage => run_with(kind, config, arguments, extract_pdf_page),
        ToolKind::CheckSystem => run_with(kind, config, arguments, check_system),
    }
}

fn run_with<P, F>(kind: ToolKind, config: &ServerConfig, arguments: serde_json::Value, handler: F) -> Reply
where
    P: DeserializeOwned,
    F: FnOnce(&ServerConfig, P) -> Result<Reply>,
{
    run(kind, config, |config| {
        let params: P = serde_json::from_value(arguments)
            .map_err(|e| Error::input(format!("Invalid arguments for {}: {}", kind, e)))?;
        handler(config, params)
    })
}

// ============================================================================
// Document conversion
// ============================================================================

pub fn word_to_pdf(config: &ServerConfig, params: WordToPdfParams) -> Result<Reply> {
    let mut pool = StagingPool::new(config.staging_root());
    let input = resolve_input(
        &mut pool,
        params.word_data.as_deref(),
        params.word_path.as_deref(),
        ".docx",
    )?;
    let size = validate_size(input.path(), config.limits.max_document_bytes, "Word")?;

    let placement = Placement::decide(&mut pool, std::slice::from_ref(&input))?;
    let scratch = pool.temp_dir()?;
    let output = placement.output(&format!("{}.pdf", input.display_stem("converted")));
    convert::word_to_pdf(config, input.path(), &scratch, &output.path)?;

    let mut reply = Reply::success(format!(
        "✅ Word document ({}) converted to PDF",
        format_size(size)
    ));
    reply.attach(encode_artifact(config, &output)?);
    Ok(reply)
}

pub fn pdf_to_word(config: &ServerConfig, params: PdfToWordParams) -> Result<Reply> {
    let mut pool = StagingPool::new(config.staging_root());
    let input = resolve_input(
        &mut pool,
        params.pdf_data.as_deref(),
        params.pdf_path.as_deref(),
        ".pdf",
    )?;
    let size = validate_size(input.path(), config.limits.max_document_bytes, "PDF")?;

    let placement = Placement::decide(&mut pool, std::slice::from_ref(&input))?;
    let scratch = pool.temp_dir()?;
    let output = placement.output(&format!("{}.docx", input.display_stem("converted")));
    convert::pdf_to_word(config, input.path(), &scratch, &output.path)?;

    let mut reply = Reply::success(format!(
        "✅ PDF ({}) converted to Word",
        format_size(size)
    ));
    reply.attach(encode_artifact(config, &output)?);
    Ok(reply)
}

// ============================================================================
// PDF
// ============================================================================

pub fn merge_pdfs(config: &ServerConfig, params: MergePdfsParams) -> Result<Reply> {
    let count = batch_len(params.pdf_files.as_deref(), params.pdf_paths.as_deref());
    check_batch(count, config.limits.max_merge_pdfs, "PDFs")?;
    if count < 2 {
        return Err(Error::input(format!(
            "At least 2 PDFs are required to merge, got {}",
            count
        )));
    }

    let mut pool = StagingPool::new(config.staging_root());
    let inputs = resolve_many(
        &mut pool,
        params.pdf_files.as_deref(),
        params.pdf_paths.as_deref(),
        ".pdf",
    )?;
    for (i, input) in inputs.iter().enumerate() {
        validate_size(
            input.path(),
            config.limits.max_document_bytes,
            &format!("PDF #{}", i + 1),
        )?;
    }

    let paths: Vec<&Path> = inputs.iter().map(|f| f.path()).collect();
    let merged = pdf::merge(&paths)?;
    let total_pages: u32 = merged.page_counts.iter().sum();

    let toc = params.add_toc.then(|| {
        let names: Vec<String> = inputs
            .iter()
            .enumerate()
            .map(|(i, f)| input_name(f, &format!("Document #{}", i + 1)))
            .collect();
        pdf::toc_entries(&names, &merged.page_counts)
    });
    let bytes = if toc.is_some() || params.add_page_numbers {
        pdf::decorate(merged.bytes, toc.as_deref(), params.add_page_numbers)?
    } else {
        merged.bytes
    };

    let placement = Placement::decide(&mut pool, &inputs)?;
    let output = placement.output("merged_output.pdf");
    write_output(&output, &bytes)?;

    let mut reply = Reply::success(format!(
        "✅ Merged {} PDFs ({} pages)",
        inputs.len(),
        total_pages
    ));
    if toc.is_some() {
        reply.push_line("📑 Table of contents added as page 1");
    }
    if params.add_page_numbers {
        reply.push_line("🔢 Page numbers added");
    }
    reply.attach(encode_artifact(config, &output)?);
    Ok(reply)
}

pub fn extract_pdf_page(config: &ServerConfig, params: ExtractPdfPageParams) -> Result<Reply> {
    let mut pool = StagingPool::new(config.staging_root());
    let input = resolve_input(
        &mut pool,
        params.pdf_data.as_deref(),
        params.pdf_path.as_deref(),
        ".pdf",
    )?;
    validate_size(input.path(), config.limits.max_document_bytes, "PDF")?;

    let data = std::fs::read(input.path())?;
    let total = pdf::page_count(&data)?;
    let pages = match params.pages.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        Some(range) => pdf::parse_page_range(range, total)?,
        None => {
            let page = params.page_number.unwrap_or(1);
            if page == 0 || page > total {
                return Err(Error::validation(format!(
                    "Page {} is out of range (document has {} pages)",
                    page, total
                )));
            }
            vec![page]
        }
    };

    let placement = Placement::decide(&mut pool, std::slice::from_ref(&input))?;
    let stem = input.display_stem("document");
    let ext = params.output_format.extension();

    let outputs = write_pages(&placement, &pages, |page| {
        let name = format!("{}_page_{}.{}", stem, page, ext);
        let bytes = match params.output_format {
            PageFormat::Pdf => pdf::extract_page(&data, page)?,
            PageFormat::Png => {
                images::encode_image(&pdf::render_page(&data, page, PAGE_RENDER_DPI)?, ImageFormat::Png)?
            }
            PageFormat::Jpg => {
                images::encode_image(&pdf::render_page(&data, page, PAGE_RENDER_DPI)?, ImageFormat::Jpeg)?
            }
        };
        Ok((name, bytes))
    })?;

    let mut reply = Reply::success(format!(
        "✅ Extracted {} page(s) from a {}-page PDF as {}",
        pages.len(),
        total,
        ext.to_uppercase()
    ));
    for output in &outputs {
        reply.attach(encode_artifact(config, output)?);
    }
    Ok(reply)
}

/// Write one output per page. A failure removes the pages already written,
/// persisted ones included, so a request never leaves a partial set behind.
fn write_pages<F>(placement: &Placement, pages: &[u32], mut produce: F) -> Result<Vec<OutputDecision>>
where
    F: FnMut(u32) -> Result<(String, Vec<u8>)>,
{
    let mut outputs: Vec<OutputDecision> = Vec::with_capacity(pages.len());
    for &page in pages {
        let written = produce(page).and_then(|(name, bytes)| {
            let output = placement.output(&name);
            write_output(&output, &bytes)?;
            Ok(output)
        });
        match written {
            Ok(output) => outputs.push(output),
            Err(e) => {
                for output in &outputs {
                    if let Err(remove_err) = std::fs::remove_file(&output.path) {
                        tracing::warn!(
                            path = %output.path.display(),
                            error = %remove_err,
                            "failed to remove partial page output"
                        );
                    }
                }
                tracing::warn!(page, written = outputs.len(), "page extraction aborted");
                return Err(e);
            }
        }
    }
    Ok(outputs)
}

// ============================================================================
// Images
// ============================================================================

/// Resolve, size-check and decode every image of a batch, aborting on the
/// first invalid one.
fn load_images(
    config: &ServerConfig,
    pool: &mut StagingPool,
    data: Option<&[String]>,
    paths: Option<&[String]>,
    noun: &str,
) -> Result<(Vec<StagedFile>, Vec<DynamicImage>)> {
    let inputs = resolve_many(pool, data, paths, ".png")?;
    let mut decoded = Vec::with_capacity(inputs.len());
    for (i, input) in inputs.iter().enumerate() {
        let label = format!("{} #{}", noun, i + 1);
        validate_size(input.path(), config.limits.max_image_bytes, &label)?;
        validate_image(input.path()).into_result(&label)?;
        decoded.push(images::open_image(input.path())?);
    }
    Ok((inputs, decoded))
}

pub fn merge_images(config: &ServerConfig, params: MergeImagesParams) -> Result<Reply> {
    let count = batch_len(params.image_files.as_deref(), params.image_paths.as_deref());
    check_batch(count, config.limits.max_merge_images, "images")?;
    let layout = images::grid_layout(count, params.rows, params.cols)?;

    let mut pool = StagingPool::new(config.staging_root());
    let (inputs, decoded) = load_images(
        config,
        &mut pool,
        params.image_files.as_deref(),
        params.image_paths.as_deref(),
        "Image",
    )?;

    let grid = images::compose_grid(&decoded, layout, params.strategy, config.max_image_pixels)?;
    let (width, height) = grid.dimensions();
    let bytes = images::encode_image(&DynamicImage::ImageRgba8(grid), ImageFormat::Png)?;

    let placement = Placement::decide(&mut pool, &inputs)?;
    let output = placement.output("merged_grid.png");
    write_output(&output, &bytes)?;

    let mut reply = Reply::success(format!(
        "✅ Merged {} images into a {}x{} grid ({}x{} px)",
        inputs.len(),
        layout.rows,
        layout.cols,
        width,
        height
    ));
    reply.attach(encode_artifact(config, &output)?);
    Ok(reply)
}

pub fn create_gif(config: &ServerConfig, params: CreateGifParams) -> Result<Reply> {
    let count = batch_len(params.image_files.as_deref(), params.image_paths.as_deref());
    check_batch(count, config.limits.max_gif_frames, "frames")?;
    if params.duration == 0 {
        return Err(Error::validation("Frame duration must be at least 1 ms"));
    }

    let mut pool = StagingPool::new(config.staging_root());
    let (inputs, frames) = load_images(
        config,
        &mut pool,
        params.image_files.as_deref(),
        params.image_paths.as_deref(),
        "Frame",
    )?;
    let bytes = images::encode_gif(&frames, params.duration)?;

    let placement = Placement::decide(&mut pool, &inputs)?;
    let output = placement.output("created.gif");
    write_output(&output, &bytes)?;

    let mut reply = Reply::success(format!(
        "✅ Created GIF from {} frames ({} ms per frame)",
        frames.len(),
        params.duration
    ));
    reply.attach(encode_artifact(config, &output)?);
    Ok(reply)
}

pub fn compress_images(config: &ServerConfig, params: CompressImagesParams) -> Result<Reply> {
    let count = batch_len(params.image_files.as_deref(), params.image_paths.as_deref());
    check_batch(count, config.limits.max_compress_images, "images")?;
    let quality = params.quality.clamp(1, 100);

    let mut pool = StagingPool::new(config.staging_root());
    let inputs = resolve_many(
        &mut pool,
        params.image_files.as_deref(),
        params.image_paths.as_deref(),
        ".img",
    )?;
    let placement = Placement::decide(&mut pool, &inputs)?;
    let ext = params.output_format.extension();

    let mut original_total = 0u64;
    let mut compressed_total = 0u64;
    let mut saved_paths = Vec::new();
    let mut errors = Vec::new();

    for (i, input) in inputs.iter().enumerate() {
        let label = format!("Image #{}", i + 1);
        let original = match validate_size(input.path(), config.limits.max_image_bytes, &label) {
            Ok(size) => size,
            Err(e) => {
                errors.push(e.client_message());
                continue;
            }
        };
        if let ImageCheck::Invalid { reason } = validate_image(input.path()) {
            errors.push(format!("{}: not a valid image: {}", label, reason));
            continue;
        }

        let compressed = images::open_image(input.path())
            .and_then(|img| images::compress_to(&img, params.output_format, quality));
        let bytes = match compressed {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(item = %label, error = %e, "compression failed");
                errors.push(format!("{}: {}", label, e.client_message()));
                continue;
            }
        };

        if placement.is_persisted() {
            let name = format!("{}_compressed.{}", input.display_stem("image"), ext);
            let output = placement.output_beside(input, &name);
            if let Err(e) = write_output(&output, &bytes) {
                errors.push(format!("{}: {}", label, e.client_message()));
                continue;
            }
            saved_paths.push(output.path);
        }
        original_total += original;
        compressed_total += bytes.len() as u64;
    }

    let processed = inputs.len() - errors.len();
    if processed == 0 {
        let mut lines = vec!["No image could be compressed".to_string()];
        lines.extend(error_lines(&errors));
        return Err(Error::operation(lines.join("\n")));
    }

    let saved = original_total as i64 - compressed_total as i64;
    let percent = if original_total > 0 {
        saved as f64 / original_total as f64 * 100.0
    } else {
        0.0
    };
    let sign = if saved < 0 { "-" } else { "" };

    let mut reply = Reply::success(format!(
        "✅ Compressed {} of {} image(s) to {} (quality {})",
        processed,
        inputs.len(),
        ext.to_uppercase(),
        quality
    ));
    reply.push_line(format!("Original total: {}", format_size(original_total)));
    reply.push_line(format!("Compressed total: {}", format_size(compressed_total)));
    reply.push_line(format!(
        "Saved: {}{} ({:.1}%)",
        sign,
        format_size(saved.unsigned_abs()),
        percent
    ));
    if placement.is_persisted() {
        for path in &saved_paths {
            reply.push_line(format!("📁 Saved to: {}", path.display()));
        }
    } else {
        reply.push_line("ℹ️ Inline inputs are reported only; pass local paths to save compressed copies");
    }
    for line in error_lines(&errors) {
        reply.push_line(line);
    }
    Ok(reply)
}

pub fn batch_edit_images(config: &ServerConfig, params: BatchEditImagesParams) -> Result<Reply> {
    let count = params.image_paths.len();
    check_batch(count, config.limits.max_edit_images, "images")?;
    if count == 0 {
        return Err(Error::input("No image paths provided"));
    }
    params.operations.validate()?;

    let mut pool = StagingPool::new(config.staging_root());
    let mut edited = Vec::new();
    let mut errors = Vec::new();

    for (i, raw) in params.image_paths.iter().enumerate() {
        match edit_one(config, &mut pool, raw, &params.operations, params.save_as_copy) {
            Ok(path) => edited.push(path),
            Err(e) => {
                tracing::warn!(item = i + 1, error = %e, "image edit failed");
                let name = Path::new(&clean_path_argument(raw))
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| raw.clone());
                errors.push(format!("#{} {}: {}", i + 1, name, e.client_message()));
            }
        }
    }

    let mut lines = vec![format!(
        "Edited {} of {} image(s) ({}), {} failed",
        edited.len(),
        count,
        params.operations.describe(),
        errors.len()
    )];
    lines.extend(edited.iter().map(|p| format!("  📁 {}", p.display())));
    lines.extend(error_lines(&errors));
    let summary = lines.join("\n");

    if edited.is_empty() {
        return Err(Error::operation(summary));
    }
    let status = if errors.is_empty() { "✅" } else { "⚠️" };
    Ok(Reply::success(format!("{} {}", status, summary)))
}

fn edit_one(
    config: &ServerConfig,
    pool: &mut StagingPool,
    raw: &str,
    ops: &EditOps,
    save_as_copy: bool,
) -> Result<PathBuf> {
    let input = resolve_input(pool, None, Some(raw), ".img")?;
    validate_size(input.path(), config.limits.max_image_bytes, "Image")?;
    validate_image(input.path()).into_result("Image")?;

    let format = images::detect_format(input.path()).unwrap_or(ImageFormat::Png);
    let img = ops.apply(images::open_image(input.path())?);
    let bytes = images::encode_image(&img, format)?;

    if !save_as_copy {
        overwrite_in_place(input.path(), &bytes)?;
        return Ok(input.path().to_path_buf());
    }

    let ext = input
        .path()
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .or_else(|| format.extensions_str().first().map(|e| e.to_string()))
        .unwrap_or_else(|| "png".to_string());
    let placement = Placement::decide(pool, std::slice::from_ref(&input))?;
    let output = placement.output_beside(&input, &format!("{}_edited.{}", input.display_stem("image"), ext));
    write_output(&output, &bytes)?;
    Ok(output.path)
}

/// Replace a file's content through a sibling temp file and rename.
fn overwrite_in_place(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = tempfile::NamedTempFile::new_in(dir)?;
    staged.write_all(bytes)?;
    staged.persist(path).map_err(|e| Error::from(e.error))?;
    Ok(())
}

// ============================================================================
// Files and system
// ============================================================================

pub fn batch_rename(config: &ServerConfig, params: BatchRenameParams) -> Result<Reply> {
    let count = params.file_paths.len();
    check_batch(count, config.limits.max_rename_files, "files")?;
    if count == 0 {
        return Err(Error::input("No file paths provided"));
    }

    let paths: Vec<PathBuf> = params
        .file_paths
        .iter()
        .map(|p| PathBuf::from(clean_path_argument(p)))
        .collect();
    let outcome = rename::rename_all(&paths, &params.pattern_settings);

    if outcome.renamed.is_empty() {
        return Err(Error::operation(outcome.summary()));
    }
    let status = if outcome.errors.is_empty() { "✅" } else { "⚠️" };
    Ok(Reply::success(format!("{} {}", status, outcome.summary())))
}

pub fn check_system(config: &ServerConfig, _params: CheckSystemParams) -> Result<Reply> {
    let root = config.staging_root();
    let writable = {
        let mut pool = StagingPool::new(&root);
        match pool.temp_file(".probe") {
            Ok(_) => "✅ writable".to_string(),
            Err(e) => format!("❌ not writable: {}", e.client_message()),
        }
    };

    let report = DependencyReport::collect(config);
    let limits = &config.limits;
    let lines = [
        format!("🔧 Media Toolkit MCP Server v{}", env!("CARGO_PKG_VERSION")),
        format!("Temp dir: {} ({})", root.display(), writable),
        String::new(),
        report.render(),
        String::new(),
        "--- Limits ---".to_string(),
        format!("Document size: {}", format_size(limits.max_document_bytes)),
        format!("Image size: {}", format_size(limits.max_image_bytes)),
        format!("merge_pdfs: {} files", limits.max_merge_pdfs),
        format!("merge_images: {} images", limits.max_merge_images),
        format!("create_gif: {} frames", limits.max_gif_frames),
        format!("compress_images: {} images", limits.max_compress_images),
        format!("batch_rename: {} files", limits.max_rename_files),
        format!("batch_edit_images: {} images", limits.max_edit_images),
        format!("Inline payload: {}", format_size(config.max_inline_bytes)),
    ];
    Ok(Reply::success(lines.join("\n")))
}

/// File name of a caller input, or `fallback` for inline payloads.
fn input_name(input: &StagedFile, fallback: &str) -> String {
    if input.is_owned() {
        return fallback.to_string();
    }
    input
        .path()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| fallback.to_string())
}
