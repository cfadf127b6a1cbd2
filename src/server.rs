//! MCP Server implementation using rmcp

use crate::config::ServerConfig;
use crate::error::{Error, Result as ToolResult};
use crate::response::Reply;
use crate::tools::handlers;
use crate::tools::{
    BatchEditImagesParams, BatchRenameParams, CheckSystemParams, CompressImagesParams,
    CreateGifParams, ExtractPdfPageParams, MergeImagesParams, MergePdfsParams, PdfToWordParams,
    ToolKind, WordToPdfParams,
};
use anyhow::Result;
use rmcp::{
    handler::server::tool::ToolRouter, handler::server::wrapper::Parameters, model::*, tool,
    tool_handler, tool_router, ServerHandler, ServiceExt,
};
use std::sync::Arc;

/// Media Toolkit MCP Server
#[derive(Clone)]
pub struct MediaServer {
    tool_router: ToolRouter<Self>,
    /// Server configuration, shared read-only with every request
    config: Arc<ServerConfig>,
}

// ============================================================================
// Tool implementations
// ============================================================================

#[tool_router]
impl MediaServer {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// Create a new MediaServer with full configuration
    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            tool_router: Self::tool_router(),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Convert a Word document to PDF
    #[tool(
        description = "Convert a Word document (.docx/.doc) to PDF with LibreOffice. Pass word_path for a local file (the PDF is saved beside it) or word_data as base64 (the PDF is returned inline)."
    )]
    async fn word_to_pdf(
        &self,
        Parameters(params): Parameters<WordToPdfParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self
            .call(ToolKind::WordToPdf, params, handlers::word_to_pdf)
            .await)
    }

    /// Convert a PDF to a Word document
    #[tool(
        description = "Convert a PDF to a Word document (.docx) using pdf2docx, falling back to LibreOffice. Pass pdf_path for a local file or pdf_data as base64."
    )]
    async fn pdf_to_word(
        &self,
        Parameters(params): Parameters<PdfToWordParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self
            .call(ToolKind::PdfToWord, params, handlers::pdf_to_word)
            .await)
    }

    /// Merge PDFs in order
    #[tool(
        description = "Merge 2-10 PDFs in the given order. Optionally prepend a table of contents page (add_toc) and stamp page numbers (add_page_numbers). Local inputs: saved as merged_output.pdf beside the first file."
    )]
    async fn merge_pdfs(
        &self,
        Parameters(params): Parameters<MergePdfsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self
            .call(ToolKind::MergePdfs, params, handlers::merge_pdfs)
            .await)
    }

    /// Merge images into a grid
    #[tool(
        description = "Combine up to 20 images into one grid PNG. rows/cols are derived from the image count when omitted. strategy: stretch (default), pad or crop. Local inputs: saved as merged_grid.png beside the first image with a preview returned."
    )]
    async fn merge_images(
        &self,
        Parameters(params): Parameters<MergeImagesParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self
            .call(ToolKind::MergeImages, params, handlers::merge_images)
            .await)
    }

    /// Create an animated GIF
    #[tool(
        description = "Create a looping animated GIF from up to 20 frames. duration is milliseconds per frame (default 500)."
    )]
    async fn create_gif(
        &self,
        Parameters(params): Parameters<CreateGifParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self
            .call(ToolKind::CreateGif, params, handlers::create_gif)
            .await)
    }

    /// Compress images
    #[tool(
        description = "Re-encode up to 50 images as jpg (quality 1-100), png or webp and report the size reduction. Local inputs get <name>_compressed.<ext> written beside each original; base64 inputs are reported only."
    )]
    async fn compress_images(
        &self,
        Parameters(params): Parameters<CompressImagesParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self
            .call(ToolKind::CompressImages, params, handlers::compress_images)
            .await)
    }

    /// Rename files by pattern
    #[tool(
        description = "Rename up to 50 local files by pattern: prefix_number, number_suffix, prefix_original, original_suffix, datetime_number or custom, with zero-padded numbering and an optional case transform. Existing targets are skipped and reported per file."
    )]
    async fn batch_rename(
        &self,
        Parameters(params): Parameters<BatchRenameParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self
            .call(ToolKind::BatchRename, params, handlers::batch_rename)
            .await)
    }

    /// Rotate and flip images
    #[tool(
        description = "Rotate (0, 90, -90, 180, 270) and/or flip up to 50 local images. save_as_copy (default true) writes <name>_edited.<ext> beside each image; false overwrites the originals."
    )]
    async fn batch_edit_images(
        &self,
        Parameters(params): Parameters<BatchEditImagesParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self
            .call(ToolKind::BatchEditImages, params, handlers::batch_edit_images)
            .await)
    }

    /// Extract pages from a PDF
    #[tool(
        description = "Extract one page (page_number, default 1) or a page selection (pages, e.g. \"1,3,5-7\") from a PDF as separate pdf, png or jpg files."
    )]
    async fn extract_pdf_page(
        &self,
        Parameters(params): Parameters<ExtractPdfPageParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self
            .call(ToolKind::ExtractPdfPage, params, handlers::extract_pdf_page)
            .await)
    }

    /// Report dependencies and environment
    #[tool(
        description = "Report the OS, temp directory, presence of LibreOffice, pdf2docx and PDFium, and the request limits."
    )]
    async fn check_system(&self) -> Result<CallToolResult, ErrorData> {
        Ok(self
            .call(
                ToolKind::CheckSystem,
                CheckSystemParams::default(),
                handlers::check_system,
            )
            .await)
    }
}

impl MediaServer {
    /// Run a typed handler on the blocking pool.
    async fn call<P, F>(&self, kind: ToolKind, params: P, handler: F) -> CallToolResult
    where
        P: Send + 'static,
        F: FnOnce(&ServerConfig, P) -> ToolResult<Reply> + Send + 'static,
    {
        let config = Arc::clone(&self.config);
        let task = tokio::task::spawn_blocking(move || {
            handlers::run(kind, &config, |config| handler(config, params))
        });
        Self::finish(kind, task.await)
    }

    /// Run a tool by name with raw JSON arguments.
    ///
    /// Unknown names and malformed arguments come back as `InputError`
    /// replies rather than protocol errors.
    pub async fn dispatch(
        &self,
        name: &str,
        arguments: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> CallToolResult {
        let kind = match name.parse::<ToolKind>() {
            Ok(kind) => kind,
            Err(e) => {
                tracing::warn!(tool = name, "unknown tool requested");
                return Reply::failure("Tool dispatch", &e, None).into_call_tool_result();
            }
        };

        let arguments = arguments
            .map(serde_json::Value::Object)
            .unwrap_or(serde_json::Value::Null);
        let config = Arc::clone(&self.config);
        let task =
            tokio::task::spawn_blocking(move || handlers::dispatch(kind, &config, arguments));
        Self::finish(kind, task.await)
    }

    fn finish(
        kind: ToolKind,
        joined: std::result::Result<Reply, tokio::task::JoinError>,
    ) -> CallToolResult {
        joined
            .unwrap_or_else(|e| {
                tracing::warn!(tool = %kind, error = %e, "tool task did not complete");
                Reply::failure(
                    kind.label(),
                    &Error::operation(format!("Task join error: {}", e)),
                    None,
                )
            })
            .into_call_tool_result()
    }
}

impl Default for MediaServer {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_handler]
impl ServerHandler for MediaServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Media Toolkit MCP Server converts Word/PDF documents, merges PDFs and images, \
                 creates GIFs, compresses, renames and edits images. Inputs are local paths \
                 (results are saved beside them) or base64 data (results are returned inline)."
                    .into(),
            ),
        }
    }
}

/// Run the MCP server with default configuration
pub async fn run_server() -> Result<()> {
    run_server_with_config(ServerConfig::default()).await
}

/// Run the MCP server with full configuration
pub async fn run_server_with_config(config: ServerConfig) -> Result<()> {
    tracing::info!(
        staging_root = %config.staging_root().display(),
        "Media Toolkit MCP Server ready, waiting for connections..."
    );
    let server = MediaServer::with_config(config);

    let service = server.serve(rmcp::transport::io::stdio()).await?;
    service.waiting().await?;

    Ok(())
}
