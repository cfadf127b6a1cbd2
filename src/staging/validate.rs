//! Size, count and structural checks run before any expensive work

use crate::error::{Error, Result};
use image::ImageReader;
use std::path::Path;

/// Render a byte count in MB with two decimals, e.g. `12.50MB`.
pub fn format_size(bytes: u64) -> String {
    format!("{:.2}MB", bytes as f64 / (1024.0 * 1024.0))
}

/// Reject a batch whose item count is above `max`.
pub fn check_batch(count: usize, max: usize, label: &str) -> Result<()> {
    if count > max {
        return Err(Error::validation(format!(
            "Too many {}: {} (limit: {})",
            label, count, max
        )));
    }
    Ok(())
}

/// Fail if `path` is missing or larger than `max_bytes`. Returns the size.
pub fn validate_size(path: &Path, max_bytes: u64, label: &str) -> Result<u64> {
    let metadata = std::fs::metadata(path).map_err(|_| {
        Error::validation(format!("{} file does not exist: {}", label, path.display()))
    })?;
    let size = metadata.len();
    if size > max_bytes {
        return Err(Error::validation(format!(
            "{} file too large: {} ({} bytes, limit: {} / {} bytes)",
            label,
            format_size(size),
            size,
            format_size(max_bytes),
            max_bytes
        )));
    }
    Ok(size)
}

/// Outcome of a structural image check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageCheck {
    Valid { width: u32, height: u32 },
    Invalid { reason: String },
}

impl ImageCheck {
    pub fn is_valid(&self) -> bool {
        matches!(self, ImageCheck::Valid { .. })
    }

    /// Convert into a `ValidationError` labelled with `label`.
    pub fn into_result(self, label: &str) -> Result<(u32, u32)> {
        match self {
            ImageCheck::Valid { width, height } => Ok((width, height)),
            ImageCheck::Invalid { reason } => Err(Error::validation(format!(
                "{} is not a valid image: {}",
                label, reason
            ))),
        }
    }
}

/// Verify an image with a header pass and a separate full decode pass.
///
/// Some truncated payloads carry a valid header and only fail on decode,
/// so both opens are required. Never returns an error; batch callers skip
/// and report invalid items.
pub fn validate_image(path: &Path) -> ImageCheck {
    let header = ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| e.to_string())
        .and_then(|r| {
            if r.format().is_none() {
                return Err("unrecognized image format".to_string());
            }
            r.into_dimensions().map_err(|e| e.to_string())
        });
    if let Err(reason) = header {
        return ImageCheck::Invalid { reason };
    }

    let decoded = ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| e.to_string())
        .and_then(|r| r.decode().map_err(|e| e.to_string()));
    match decoded {
        Ok(img) => ImageCheck::Valid {
            width: img.width(),
            height: img.height(),
        },
        Err(reason) => ImageCheck::Invalid { reason },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0.00MB");
        assert_eq!(format_size(50 * 1024 * 1024), "50.00MB");
        assert_eq!(format_size(1024 * 1024 + 512 * 1024), "1.50MB");
    }

    #[test]
    fn test_check_batch() {
        assert!(check_batch(50, 50, "images").is_ok());
        let err = check_batch(51, 50, "images").unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        let msg = err.client_message();
        assert!(msg.contains("51"));
        assert!(msg.contains("50"));
    }

    #[test]
    fn test_validate_size_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        std::fs::write(&path, vec![0u8; 1000]).unwrap();

        assert_eq!(validate_size(&path, 1000, "PDF").unwrap(), 1000);

        let err = validate_size(&path, 999, "PDF").unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        let msg = err.client_message();
        assert!(msg.contains("1000 bytes"));
        assert!(msg.contains("999 bytes"));
    }

    #[test]
    fn test_validate_size_missing() {
        let err = validate_size(Path::new("/nonexistent/a.pdf"), 10, "PDF").unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_validate_image_valid() {
        let dir = tempfile::tempdir().unwrap();
        // Wrong extension on purpose: the format is sniffed from content.
        let path = dir.path().join("photo.png");
        RgbImage::new(40, 30)
            .save_with_format(&path, ImageFormat::Jpeg)
            .unwrap();

        assert_eq!(
            validate_image(&path),
            ImageCheck::Valid {
                width: 40,
                height: 30
            }
        );
    }

    #[test]
    fn test_validate_image_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.png");
        std::fs::write(&path, b"definitely not an image").unwrap();
        assert!(!validate_image(&path).is_valid());
    }

    #[test]
    fn test_validate_image_truncated_fails_decode() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.png");
        RgbImage::from_pixel(64, 64, image::Rgb([200, 10, 10]))
            .save(&good)
            .unwrap();
        let bytes = std::fs::read(&good).unwrap();
        let truncated = dir.path().join("truncated.png");
        std::fs::write(&truncated, &bytes[..bytes.len() / 2]).unwrap();

        let check = validate_image(&truncated);
        assert!(!check.is_valid());
        assert!(check.into_result("Image #1").is_err());
    }
}
