//! Response encoding: status text plus inline payloads or bounded previews

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::media::{images, pdf};
use crate::staging::{format_size, OutputDecision};
use base64::Engine;
use rmcp::model::{CallToolResult, Content};
use std::path::Path;

/// DPI used when rendering the first page of a persisted PDF for preview.
const PDF_PREVIEW_DPI: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// Sent as an MCP image content block
    Image,
    /// Sent as an embedded blob resource
    Resource,
}

/// One base64 payload segment following the status text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub kind: PayloadKind,
    pub mime_type: String,
    pub data: String,
    pub name: String,
}

impl Payload {
    pub fn image(name: impl Into<String>, mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            kind: PayloadKind::Image,
            mime_type: mime_type.into(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            name: name.into(),
        }
    }

    pub fn resource(name: impl Into<String>, mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            kind: PayloadKind::Resource,
            mime_type: mime_type.into(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            name: name.into(),
        }
    }

    fn into_content(self) -> Result<Content> {
        match self.kind {
            PayloadKind::Image => Ok(Content::image(self.data, self.mime_type)),
            PayloadKind::Resource => {
                let value = serde_json::json!({
                    "type": "resource",
                    "resource": {
                        "uri": format!("media-toolkit://artifact/{}", self.name),
                        "mimeType": self.mime_type,
                        "blob": self.data,
                    }
                });
                serde_json::from_value(value).map_err(|e| {
                    Error::operation(format!("Failed to build resource payload: {}", e))
                })
            }
        }
    }
}

/// A tool reply: one status text segment and zero or more payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub payloads: Vec<Payload>,
    pub is_error: bool,
}

impl Reply {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            payloads: Vec::new(),
            is_error: false,
        }
    }

    /// `❌ <operation> failed`, the error kind, the message and optional
    /// diagnostics.
    pub fn failure(operation: &str, error: &Error, diagnostics: Option<String>) -> Self {
        let mut text = format!(
            "❌ {} failed\nError type: {}\n{}",
            operation,
            error.kind(),
            error.client_message()
        );
        if let Some(block) = diagnostics {
            text.push_str("\n\n");
            text.push_str(&block);
        }
        Self {
            text,
            payloads: Vec::new(),
            is_error: true,
        }
    }

    pub fn push_line(&mut self, line: impl AsRef<str>) {
        if !self.text.is_empty() {
            self.text.push('\n');
        }
        self.text.push_str(line.as_ref());
    }

    /// Append an encoded artifact: its note joins the text, its payload (if
    /// any) is added after earlier payloads.
    pub fn attach(&mut self, encoded: Encoded) {
        self.push_line(encoded.note);
        if let Some(payload) = encoded.payload {
            self.payloads.push(payload);
        }
    }

    pub fn into_call_tool_result(self) -> CallToolResult {
        if self.is_error {
            return CallToolResult::error(vec![Content::text(self.text)]);
        }

        let mut content = vec![Content::text(self.text)];
        for payload in self.payloads {
            match payload.into_content() {
                Ok(c) => content.push(c),
                Err(e) => {
                    tracing::warn!(error = %e, "dropping payload");
                    return CallToolResult::error(vec![Content::text(format!(
                        "❌ Response encoding failed\nError type: {}\n{}",
                        e.kind(),
                        e.client_message()
                    ))]);
                }
            }
        }
        CallToolResult::success(content)
    }
}

/// At most this many per-item errors are listed in a batch report.
pub const MAX_LISTED_ERRORS: usize = 10;

/// `Errors:` section with the first [`MAX_LISTED_ERRORS`] entries and a
/// count of the rest. Empty when there are no errors.
pub fn error_lines(errors: &[String]) -> Vec<String> {
    if errors.is_empty() {
        return Vec::new();
    }
    let mut lines = vec!["Errors:".to_string()];
    lines.extend(
        errors
            .iter()
            .take(MAX_LISTED_ERRORS)
            .map(|e| format!("  {}", e)),
    );
    if errors.len() > MAX_LISTED_ERRORS {
        lines.push(format!("  ... and {} more", errors.len() - MAX_LISTED_ERRORS));
    }
    lines
}

/// MIME type from a file extension.
pub fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "pdf" => "application/pdf",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}

fn is_image(path: &Path) -> bool {
    mime_for(path).starts_with("image/")
}

fn preview_cap(config: &ServerConfig, path: &Path) -> u32 {
    if mime_for(path) == "image/gif" {
        config.animation_preview_max
    } else {
        config.image_preview_max
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string())
}

/// Status note plus optional payload for one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub note: String,
    pub payload: Option<Payload>,
}

/// Preview for a persisted artifact, or `None` when the type has none.
fn preview_for(config: &ServerConfig, path: &Path) -> Option<images::Preview> {
    let result = if is_image(path) {
        images::preview_file(path, preview_cap(config, path))
    } else if mime_for(path) == "application/pdf" {
        std::fs::read(path)
            .map_err(Error::from)
            .and_then(|data| pdf::render_page(&data, 1, PDF_PREVIEW_DPI))
            .and_then(|img| images::preview_png(&img, config.image_preview_max))
    } else {
        return None;
    };

    match result {
        Ok(preview) => Some(preview),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "no preview");
            None
        }
    }
}

/// Encode one produced artifact for the response.
///
/// Persisted: only a bounded preview is attached and the file stays on disk.
/// Temporary: the full bytes are attached and the file is deleted right away;
/// an image over `max_inline_bytes` is downsampled to a preview instead, and
/// any other oversized artifact is rejected.
pub fn encode_artifact(config: &ServerConfig, decision: &OutputDecision) -> Result<Encoded> {
    let path = decision.path.as_path();
    let name = file_name(path);

    if decision.persisted {
        let mut note = format!("📁 Saved to: {}", path.display());
        let payload = preview_for(config, path).map(|p| {
            note.push_str(&format!(
                "\n🖼️ Preview {}x{} attached; the full file remains on disk",
                p.width, p.height
            ));
            Payload::image(format!("preview_{}.png", name), "image/png", &p.png)
        });
        return Ok(Encoded { note, payload });
    }

    let size = std::fs::metadata(path)
        .map_err(|_| Error::operation(format!("Output was not produced: {}", path.display())))?
        .len();

    if size > config.max_inline_bytes {
        if !is_image(path) {
            let _ = std::fs::remove_file(path);
            return Err(Error::validation(format!(
                "Result is too large to return inline: {} (limit: {}). Pass local file paths so the result can be saved to disk.",
                format_size(size),
                format_size(config.max_inline_bytes)
            )));
        }
        let preview = images::preview_file(path, preview_cap(config, path));
        let _ = std::fs::remove_file(path);
        let preview = preview?;
        return Ok(Encoded {
            note: format!(
                "⚠️ Result is {} (over the {} inline limit); returning a {}x{} preview",
                format_size(size),
                format_size(config.max_inline_bytes),
                preview.width,
                preview.height
            ),
            payload: Some(Payload::image(name, "image/png", &preview.png)),
        });
    }

    let bytes = std::fs::read(path)?;
    let mime = mime_for(path);
    let payload = if is_image(path) {
        Payload::image(name.clone(), mime, &bytes)
    } else {
        Payload::resource(name.clone(), mime, &bytes)
    };
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove encoded output");
    }

    Ok(Encoded {
        note: format!("📦 {} ({}) returned inline", name, format_size(size)),
        payload: Some(payload),
    })
}
