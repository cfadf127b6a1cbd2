//! Domain operations invoked by the tool handlers
//!
//! - `images`: grid compositing, GIF encoding, compression, edits, previews
//! - `pdf`: qpdf page assembly and PDFium drawing/rendering
//! - `convert`: LibreOffice / pdf2docx document conversion
//! - `rename`: batch rename rules

pub mod convert;
pub mod images;
pub mod pdf;
pub mod rename;
