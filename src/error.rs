//! Error types for the Media Toolkit MCP Server

use std::fmt;
use thiserror::Error;

/// Result type alias for the Media Toolkit MCP Server
pub type Result<T> = std::result::Result<T, Error>;

/// The four kinds a tool failure is reported as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad or missing input specification
    Input,
    /// A referenced local path does not exist
    NotFound,
    /// Size, count or structural check failed
    Validation,
    /// The underlying conversion, merge or codec failed
    Operation,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Input => "InputError",
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::Validation => "ValidationError",
            ErrorKind::Operation => "OperationError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error types for the Media Toolkit MCP Server
#[derive(Error, Debug)]
pub enum Error {
    /// Caller gave neither data nor path, or the input could not be materialized
    #[error("Invalid input: {reason}")]
    Input { reason: String },

    /// Explicit path argument does not exist
    #[error("File not found: {path}")]
    NotFound { path: String },

    /// Size/count ceiling exceeded or structural check failed
    #[error("Validation failed: {reason}")]
    Validation { reason: String },

    /// Domain operation ran but failed or produced nothing
    #[error("Operation failed: {reason}")]
    Operation { reason: String },

    /// Base64 decode error
    #[error("Invalid base64 data: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image codec error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// qpdf error
    #[error("qpdf error: {reason}")]
    Qpdf { reason: String },

    /// PDFium error
    #[error("PDFium error: {reason}")]
    Pdfium { reason: String },
}

impl Error {
    pub fn input(reason: impl Into<String>) -> Self {
        Error::Input {
            reason: reason.into(),
        }
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Error::Validation {
            reason: reason.into(),
        }
    }

    pub fn operation(reason: impl Into<String>) -> Self {
        Error::Operation {
            reason: reason.into(),
        }
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        Error::NotFound { path: path.into() }
    }

    /// Fold every variant into one of the four reported kinds.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Input { .. } | Error::Base64Decode(_) => ErrorKind::Input,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Validation { .. } => ErrorKind::Validation,
            Error::Operation { .. }
            | Error::Io(_)
            | Error::Image(_)
            | Error::Qpdf { .. }
            | Error::Pdfium { .. } => ErrorKind::Operation,
        }
    }

    /// Human-readable message sent back to the client.
    pub fn client_message(&self) -> String {
        match self {
            Error::Input { reason } => reason.clone(),
            Error::NotFound { path } => format!("File does not exist: {}", path),
            Error::Validation { reason } => reason.clone(),
            Error::Operation { reason } => reason.clone(),
            Error::Base64Decode(e) => format!("Invalid base64 data: {}", e),
            Error::Io(e) => format!("I/O error: {}", e),
            Error::Image(e) => format!("Image processing error: {}", e),
            Error::Qpdf { reason } => format!("PDF processing error: {}", reason),
            Error::Pdfium { reason } => format!("PDF rendering error: {}", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_folding() {
        assert_eq!(Error::input("x").kind(), ErrorKind::Input);
        assert_eq!(Error::not_found("/a").kind(), ErrorKind::NotFound);
        assert_eq!(Error::validation("x").kind(), ErrorKind::Validation);
        assert_eq!(Error::operation("x").kind(), ErrorKind::Operation);

        let io = Error::from(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        assert_eq!(io.kind(), ErrorKind::Operation);

        let qpdf = Error::Qpdf {
            reason: "bad xref".to_string(),
        };
        assert_eq!(qpdf.kind(), ErrorKind::Operation);
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(ErrorKind::Input.to_string(), "InputError");
        assert_eq!(ErrorKind::NotFound.to_string(), "NotFoundError");
        assert_eq!(ErrorKind::Validation.to_string(), "ValidationError");
        assert_eq!(ErrorKind::Operation.to_string(), "OperationError");
    }

    #[test]
    fn test_client_message_not_found() {
        let e = Error::not_found("/missing/file.pdf");
        assert_eq!(e.client_message(), "File does not exist: /missing/file.pdf");
    }
}
