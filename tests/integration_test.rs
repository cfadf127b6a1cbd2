//! Integration tests for Media Toolkit MCP Server

use base64::Engine;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use media_toolkit_mcp::{MediaServer, ServerConfig};
use pretty_assertions::assert_eq;
use rmcp::model::CallToolResult;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

fn server_in(dir: &Path) -> (MediaServer, PathBuf) {
    let staging = dir.join("staging");
    let config = ServerConfig {
        temp_dir: Some(staging.clone()),
        ..ServerConfig::default()
    };
    (MediaServer::with_config(config), staging)
}

fn args(value: Value) -> Option<serde_json::Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Content segments as JSON, e.g. `{"type": "text", "text": ...}`.
fn segments(result: &CallToolResult) -> Vec<Value> {
    result
        .content
        .iter()
        .map(|c| serde_json::to_value(c).unwrap())
        .collect()
}

fn text_of(result: &CallToolResult) -> String {
    segments(result)[0]["text"].as_str().unwrap().to_string()
}

fn is_error(result: &CallToolResult) -> bool {
    result.is_error == Some(true)
}

fn staging_is_empty(staging: &Path) -> bool {
    match std::fs::read_dir(staging) {
        Ok(entries) => entries.count() == 0,
        Err(_) => true,
    }
}

fn encode(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

fn decode(data: &str) -> Vec<u8> {
    base64::engine::general_purpose::STANDARD
        .decode(data)
        .unwrap()
}

fn write_jpeg(path: &Path, side: u32) {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(side, side, Rgb([200, 80, 20])))
        .save_with_format(path, ImageFormat::Jpeg)
        .unwrap();
}

fn png_bytes(w: u32, h: u32) -> Vec<u8> {
    let mut out = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([1, 2, 3])))
        .write_to(&mut std::io::Cursor::new(&mut out), ImageFormat::Png)
        .unwrap();
    out
}

/// Minimal valid PDF with `pages` blank pages.
fn blank_pdf(pages: usize) -> Vec<u8> {
    let mut objects = vec!["<< /Type /Catalog /Pages 2 0 R >>".to_string()];
    let kids: Vec<String> = (0..pages).map(|i| format!("{} 0 R", i + 3)).collect();
    objects.push(format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids.join(" "),
        pages
    ));
    for _ in 0..pages {
        objects.push(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 595 842] /Resources << >> >>".to_string(),
        );
    }

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }
    let xref_at = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_at
        )
        .as_bytes(),
    );
    out
}

#[tokio::test]
async fn test_compress_gate_rejects_51_images() {
    let dir = tempfile::tempdir().unwrap();
    let (server, staging) = server_in(dir.path());
    let files: Vec<String> = (0..51).map(|_| encode(&png_bytes(2, 2))).collect();

    let result = server
        .dispatch("compress_images", args(json!({ "image_files": files })))
        .await;

    assert!(is_error(&result));
    let text = text_of(&result);
    assert!(text.starts_with("❌ Image compression failed"));
    assert!(text.contains("ValidationError"));
    assert!(text.contains("51"));
    assert!(text.contains("limit: 50"));
    assert!(!staging.exists());
}

#[tokio::test]
async fn test_merge_images_local_grid_with_preview() {
    let dir = tempfile::tempdir().unwrap();
    let (server, staging) = server_in(dir.path());
    let photos = dir.path().join("photos");
    std::fs::create_dir_all(&photos).unwrap();

    let paths: Vec<String> = [200, 300, 150, 400]
        .iter()
        .enumerate()
        .map(|(i, &side)| {
            let p = photos.join(format!("img{}.jpg", i));
            write_jpeg(&p, side);
            p.display().to_string()
        })
        .collect();

    let result = server
        .dispatch("merge_images", args(json!({ "image_paths": paths })))
        .await;
    assert!(!is_error(&result), "{}", text_of(&result));
    assert!(text_of(&result).contains("2x2 grid"));

    let output = photos.join("merged_grid.png");
    assert!(output.exists());
    let grid = image::open(&output).unwrap();
    assert_eq!((grid.width(), grid.height()), (2 * 150 + 30, 2 * 150 + 30));

    let segs = segments(&result);
    assert_eq!(segs.len(), 2);
    assert_eq!(segs[1]["type"], "image");
    let preview = image::load_from_memory(&decode(segs[1]["data"].as_str().unwrap())).unwrap();
    assert!(preview.width() <= 1024 && preview.height() <= 1024);

    let again = server
        .dispatch("merge_images", args(json!({ "image_paths": paths })))
        .await;
    assert!(!is_error(&again));
    assert!(photos.join("merged_grid_1.png").exists());
    assert!(staging_is_empty(&staging));
}

fn write_frame(path: &Path, w: u32, h: u32, color: [u8; 3]) {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb(color)))
        .save_with_format(path, ImageFormat::Png)
        .unwrap();
}

#[tokio::test]
async fn test_create_gif_local_frames_with_animation_preview() {
    let dir = tempfile::tempdir().unwrap();
    let (server, staging) = server_in(dir.path());
    let frames_dir = dir.path().join("frames");
    std::fs::create_dir_all(&frames_dir).unwrap();

    let paths: Vec<String> = [[255, 0, 0], [0, 255, 0], [0, 0, 255]]
        .iter()
        .enumerate()
        .map(|(i, &color)| {
            let p = frames_dir.join(format!("frame{}.png", i));
            write_frame(&p, 800, 600, color);
            p.display().to_string()
        })
        .collect();

    let result = server
        .dispatch(
            "create_gif",
            args(json!({ "image_paths": paths, "duration": 200 })),
        )
        .await;
    assert!(!is_error(&result), "{}", text_of(&result));
    assert!(text_of(&result).contains("Created GIF from 3 frames (200 ms per frame)"));

    let output = frames_dir.join("created.gif");
    assert!(output.exists());
    let gif = image::open(&output).unwrap();
    assert_eq!((gif.width(), gif.height()), (800, 600));

    let segs = segments(&result);
    assert_eq!(segs.len(), 2);
    assert_eq!(segs[1]["type"], "image");
    let preview = image::load_from_memory(&decode(segs[1]["data"].as_str().unwrap())).unwrap();
    assert!(preview.width() <= 512 && preview.height() <= 512);
    assert_eq!(preview.width(), 512);

    let again = server
        .dispatch("create_gif", args(json!({ "image_paths": paths })))
        .await;
    assert!(!is_error(&again), "{}", text_of(&again));
    assert!(frames_dir.join("created_1.gif").exists());
    assert!(output.exists());
    assert!(staging_is_empty(&staging));
}

#[tokio::test]
async fn test_merge_images_rejects_oversized_grid() {
    let dir = tempfile::tempdir().unwrap();
    let (server, staging) = server_in(dir.path());
    let files = vec![encode(&png_bytes(4, 4)), encode(&png_bytes(4, 4))];

    let result = server
        .dispatch(
            "merge_images",
            args(json!({ "image_files": files, "rows": 70000, "cols": 70000 })),
        )
        .await;
    assert!(is_error(&result));
    let text = text_of(&result);
    assert!(text.contains("ValidationError"));
    assert!(text.contains("exceeds the image count 2"));
    assert!(staging_is_empty(&staging));
}

#[tokio::test]
async fn test_batch_rename_collision_is_reported_per_file() {
    let dir = tempfile::tempdir().unwrap();
    let (server, _) = server_in(dir.path());
    let paths: Vec<String> = ["a", "b", "c", "d", "e"]
        .iter()
        .map(|n| {
            let p = dir.path().join(format!("{}.jpg", n));
            std::fs::write(&p, n.as_bytes()).unwrap();
            p.display().to_string()
        })
        .collect();
    std::fs::write(dir.path().join("IMG003.jpg"), b"taken").unwrap();

    let result = server
        .dispatch(
            "batch_rename",
            args(json!({ "file_paths": paths, "pattern_settings": { "mode": "prefix_number" } })),
        )
        .await;

    assert!(!is_error(&result));
    let text = text_of(&result);
    assert!(text.starts_with("⚠️"));
    assert!(text.contains("Renamed 4 file(s), 1 failed"));
    assert!(text.contains("#3 c.jpg"));
    for n in [1, 2, 4, 5] {
        assert!(dir.path().join(format!("IMG{:03}.jpg", n)).exists());
    }
    assert!(dir.path().join("c.jpg").exists());
}

#[tokio::test]
async fn test_merge_pdfs_inline_resource() {
    let dir = tempfile::tempdir().unwrap();
    let (server, staging) = server_in(dir.path());

    let result = server
        .dispatch(
            "merge_pdfs",
            args(json!({ "pdf_files": [encode(&blank_pdf(1)), encode(&blank_pdf(2))] })),
        )
        .await;
    assert!(!is_error(&result), "{}", text_of(&result));
    assert!(text_of(&result).contains("Merged 2 PDFs (3 pages)"));

    let segs = segments(&result);
    assert_eq!(segs[1]["type"], "resource");
    assert_eq!(segs[1]["resource"]["mimeType"], "application/pdf");
    let merged = decode(segs[1]["resource"]["blob"].as_str().unwrap());
    assert!(merged.starts_with(b"%PDF"));
    assert!(staging_is_empty(&staging));
}

#[tokio::test]
async fn test_failed_request_leaves_no_temp_files() {
    let dir = tempfile::tempdir().unwrap();
    let (server, staging) = server_in(dir.path());

    let result = server
        .dispatch(
            "merge_pdfs",
            args(json!({ "pdf_files": [encode(&blank_pdf(1)), encode(b"definitely not a pdf")] })),
        )
        .await;
    assert!(is_error(&result));
    assert!(text_of(&result).contains("OperationError"));
    assert!(staging_is_empty(&staging));

    let result = server
        .dispatch(
            "create_gif",
            args(json!({ "image_files": [encode(&png_bytes(4, 4)), "%%%not base64%%%"] })),
        )
        .await;
    assert!(is_error(&result));
    assert!(text_of(&result).contains("InputError"));
    assert!(staging_is_empty(&staging));
}

#[tokio::test]
async fn test_extract_pdf_page_inline() {
    let dir = tempfile::tempdir().unwrap();
    let (server, staging) = server_in(dir.path());

    let result = server
        .dispatch(
            "extract_pdf_page",
            args(json!({ "pdf_data": encode(&blank_pdf(3)), "page_number": 2 })),
        )
        .await;
    assert!(!is_error(&result), "{}", text_of(&result));

    let segs = segments(&result);
    assert_eq!(segs.len(), 2);
    assert_eq!(segs[1]["resource"]["uri"], "media-toolkit://artifact/document_page_2.pdf");
    assert!(staging_is_empty(&staging));
}

#[tokio::test]
async fn test_unknown_tool_and_missing_input() {
    let dir = tempfile::tempdir().unwrap();
    let (server, _) = server_in(dir.path());

    let result = server.dispatch("resize_video", None).await;
    assert!(is_error(&result));
    assert!(text_of(&result).contains("Unknown tool: resize_video"));

    let result = server.dispatch("word_to_pdf", None).await;
    assert!(is_error(&result));
    assert!(text_of(&result).contains("InputError"));

    let result = server
        .dispatch("pdf_to_word", args(json!({ "pdf_path": "/nonexistent/in.pdf" })))
        .await;
    assert!(text_of(&result).contains("NotFoundError"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_word_to_pdf_inline_with_stub_converter() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("soffice");
    std::fs::write(
        &script,
        "#!/bin/sh\n\
         outdir=\"\"\n\
         while [ $# -gt 1 ]; do\n\
           if [ \"$1\" = \"--outdir\" ]; then outdir=\"$2\"; fi\n\
           shift\n\
         done\n\
         name=$(basename \"$1\")\n\
         printf '%%PDF-1.4 stub' > \"$outdir/${name%.*}.pdf\"\n",
    )
    .unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    let staging = dir.path().join("staging");
    let server = MediaServer::with_config(ServerConfig {
        temp_dir: Some(staging.clone()),
        soffice_path: Some(script),
        ..ServerConfig::default()
    });

    let result = server
        .dispatch("word_to_pdf", args(json!({ "word_data": encode(b"PK\x03\x04 docx") })))
        .await;
    assert!(!is_error(&result), "{}", text_of(&result));

    let segs = segments(&result);
    assert_eq!(segs[1]["resource"]["mimeType"], "application/pdf");
    assert_eq!(
        decode(segs[1]["resource"]["blob"].as_str().unwrap()),
        b"%PDF-1.4 stub"
    );
    assert!(staging_is_empty(&staging));
}
