//! Server configuration and per-request limits

use std::path::PathBuf;

const MB: u64 = 1024 * 1024;

/// Static ceilings checked before any work begins.
///
/// Every tool has exactly one authoritative batch ceiling here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLimits {
    /// Maximum bytes for a single PDF or Word document
    pub max_document_bytes: u64,
    /// Maximum bytes for a single image
    pub max_image_bytes: u64,
    /// Maximum PDFs per merge_pdfs call
    pub max_merge_pdfs: usize,
    /// Maximum images per merge_images call
    pub max_merge_images: usize,
    /// Maximum frames per create_gif call
    pub max_gif_frames: usize,
    /// Maximum images per compress_images call
    pub max_compress_images: usize,
    /// Maximum files per batch_rename call
    pub max_rename_files: usize,
    /// Maximum images per batch_edit_images call
    pub max_edit_images: usize,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_document_bytes: 50 * MB,
            max_image_bytes: 50 * MB,
            max_merge_pdfs: 10,
            max_merge_images: 20,
            max_gif_frames: 20,
            max_compress_images: 50,
            max_rename_files: 50,
            max_edit_images: 50,
        }
    }
}

/// Configuration for the Media Toolkit MCP Server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Size and count ceilings
    pub limits: RequestLimits,
    /// Root for staged temp files (default: OS temp dir)
    pub temp_dir: Option<PathBuf>,
    /// Bounding box for static image previews (default: 1024)
    pub image_preview_max: u32,
    /// Bounding box for first-frame animation previews (default: 512)
    pub animation_preview_max: u32,
    /// Largest artifact returned inline without downsampling (default: 20MB)
    pub max_inline_bytes: u64,
    /// Largest composed canvas in pixels (default: 100 million)
    pub max_image_pixels: u64,
    /// LibreOffice binary (default: `soffice` on PATH)
    pub soffice_path: Option<PathBuf>,
    /// pdf2docx binary (default: `pdf2docx` on PATH)
    pub pdf2docx_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            limits: RequestLimits::default(),
            temp_dir: None,
            image_preview_max: 1024,
            animation_preview_max: 512,
            max_inline_bytes: 20 * MB,
            max_image_pixels: 100_000_000,
            soffice_path: None,
            pdf2docx_path: None,
        }
    }
}

impl ServerConfig {
    /// Defaults overlaid with `MEDIA_TOOLKIT_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup("MEDIA_TOOLKIT_TEMP_DIR").filter(|v| !v.is_empty()) {
            config.temp_dir = Some(PathBuf::from(dir));
        }
        if let Some(path) = lookup("MEDIA_TOOLKIT_SOFFICE").filter(|v| !v.is_empty()) {
            config.soffice_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("MEDIA_TOOLKIT_PDF2DOCX").filter(|v| !v.is_empty()) {
            config.pdf2docx_path = Some(PathBuf::from(path));
        }
        if let Some(raw) = lookup("MEDIA_TOOLKIT_MAX_INLINE_BYTES") {
            match raw.trim().parse::<u64>() {
                Ok(bytes) if bytes > 0 => config.max_inline_bytes = bytes,
                _ => tracing::warn!(
                    value = %raw,
                    "ignoring invalid MEDIA_TOOLKIT_MAX_INLINE_BYTES"
                ),
            }
        }

        config
    }

    /// Directory staged files are created in.
    pub fn staging_root(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn soffice_command(&self) -> PathBuf {
        self.soffice_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("soffice"))
    }

    pub fn pdf2docx_command(&self) -> PathBuf {
        self.pdf2docx_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("pdf2docx"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.limits.max_document_bytes, 50 * 1024 * 1024);
        assert_eq!(config.limits.max_image_bytes, 50 * 1024 * 1024);
        assert_eq!(config.limits.max_merge_pdfs, 10);
        assert_eq!(config.limits.max_merge_images, 20);
        assert_eq!(config.limits.max_gif_frames, 20);
        assert_eq!(config.limits.max_compress_images, 50);
        assert_eq!(config.image_preview_max, 1024);
        assert_eq!(config.max_image_pixels, 100_000_000);
        assert!(config.temp_dir.is_none());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("MEDIA_TOOLKIT_TEMP_DIR", "/var/tmp/mtk"),
            ("MEDIA_TOOLKIT_SOFFICE", "/opt/libreoffice/program/soffice"),
            ("MEDIA_TOOLKIT_MAX_INLINE_BYTES", "1024"),
        ]);
        let config = ServerConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.staging_root(), PathBuf::from("/var/tmp/mtk"));
        assert_eq!(
            config.soffice_command(),
            PathBuf::from("/opt/libreoffice/program/soffice")
        );
        assert_eq!(config.pdf2docx_command(), PathBuf::from("pdf2docx"));
        assert_eq!(config.max_inline_bytes, 1024);
    }

    #[test]
    fn test_from_lookup_ignores_bad_numbers() {
        let config = ServerConfig::from_lookup(|k| {
            (k == "MEDIA_TOOLKIT_MAX_INLINE_BYTES").then(|| "lots".to_string())
        });
        assert_eq!(config.max_inline_bytes, 20 * 1024 * 1024);
    }
}
