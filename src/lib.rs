//! Media Toolkit MCP Server Library
//!
//! This crate provides MCP tools for document and image processing:
//! - `word_to_pdf` / `pdf_to_word`: Document conversion
//! - `merge_pdfs`: Concatenate PDFs, optionally with contents page and page numbers
//! - `extract_pdf_page`: Pull pages out of a PDF as PDF or images
//! - `merge_images`: Compose images into a grid
//! - `create_gif`: Build an animated GIF
//! - `compress_images`: Re-encode images and report savings
//! - `batch_rename` / `batch_edit_images`: Bulk file operations
//! - `check_system`: Dependency and environment report

pub mod config;
pub mod error;
pub mod media;
pub mod response;
pub mod server;
pub mod staging;
pub mod tools;

pub use config::{RequestLimits, ServerConfig};
pub use error::{Error, ErrorKind, Result};
pub use response::{Payload, PayloadKind, Reply};
pub use server::{run_server, run_server_with_config, MediaServer};
pub use staging::{StagedFile, StagingPool};
pub use tools::ToolKind;
