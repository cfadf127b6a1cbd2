//! Image domain operations: grid compositing, GIF encoding, compression,
//! rotate/flip edits and bounded previews

use crate::error::{Error, Result};
use image::codecs::gif::{GifEncoder, Repeat};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{
    Delay, DynamicImage, Frame, GenericImageView, ImageFormat, ImageReader, Rgb, RgbImage, Rgba,
    RgbaImage,
};
use rmcp::schemars::JsonSchema;
use serde::Deserialize;
use std::io::Cursor;
use std::path::Path;

/// Pixel gap between grid cells and around the border.
pub const GRID_GAP: u32 = 10;
/// Lower bound for a grid cell on each axis.
pub const MIN_CELL: u32 = 100;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Open an image, sniffing the format from content rather than extension.
pub fn open_image(path: &Path) -> Result<DynamicImage> {
    let img = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    Ok(img)
}

/// Detected on-disk format, falling back to the extension.
pub fn detect_format(path: &Path) -> Option<ImageFormat> {
    ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .ok()
        .and_then(|r| r.format())
        .or_else(|| ImageFormat::from_path(path).ok())
}

/// How an image is fitted into a grid cell or GIF frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScaleStrategy {
    /// Resize directly to the cell (may distort)
    #[default]
    #[serde(alias = "直接縮放")]
    Stretch,
    /// Keep aspect ratio and pad with white
    #[serde(alias = "保持比例補白", alias = "等比例（含邊）")]
    Pad,
    /// Keep aspect ratio, fill the cell and crop the overflow
    #[serde(alias = "填滿裁切")]
    Crop,
}

impl ScaleStrategy {
    pub fn fit(&self, img: &DynamicImage, width: u32, height: u32) -> RgbaImage {
        match self {
            ScaleStrategy::Stretch => img
                .resize_exact(width, height, FilterType::Lanczos3)
                .to_rgba8(),
            ScaleStrategy::Crop => img
                .resize_to_fill(width, height, FilterType::Lanczos3)
                .to_rgba8(),
            ScaleStrategy::Pad => {
                let scaled = img.resize(width, height, FilterType::Lanczos3).to_rgba8();
                let mut cell = RgbaImage::from_pixel(width, height, WHITE);
                let x = (width - scaled.width()) / 2;
                let y = (height - scaled.height()) / 2;
                image::imageops::overlay(&mut cell, &scaled, x as i64, y as i64);
                cell
            }
        }
    }
}

/// Grid dimensions for a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    pub rows: u32,
    pub cols: u32,
}

impl GridLayout {
    /// `(row, col)` of the image at `index`, filled row-major.
    pub fn cell_of(&self, index: usize) -> (u32, u32) {
        let index = index as u32;
        (index / self.cols, index % self.cols)
    }

    pub fn capacity(&self) -> usize {
        (self.rows as u64 * self.cols as u64) as usize
    }
}

/// Compute the grid for `n` images.
///
/// No hint: `cols = ceil(sqrt(n))`, `rows = ceil(n / cols)`. One hint: the
/// other axis is `ceil(n / given)`. Both: used as given, but must hold `n`.
/// Zero is treated as "not specified"; neither axis may exceed `n`.
pub fn grid_layout(n: usize, rows: Option<u32>, cols: Option<u32>) -> Result<GridLayout> {
    if n == 0 {
        return Err(Error::input("At least one image is required"));
    }
    let n = u32::try_from(n)
        .map_err(|_| Error::validation(format!("Too many images for a grid: {}", n)))?;
    let rows = rows.filter(|r| *r > 0);
    let cols = cols.filter(|c| *c > 0);
    for (axis, given) in [("rows", rows), ("cols", cols)] {
        if let Some(given) = given.filter(|g| *g > n) {
            return Err(Error::validation(format!(
                "Grid {} {} exceeds the image count {}",
                axis, given, n
            )));
        }
    }

    let layout = match (rows, cols) {
        (None, None) => {
            let cols = (n as f64).sqrt().ceil() as u32;
            GridLayout {
                rows: n.div_ceil(cols),
                cols,
            }
        }
        (Some(rows), None) => GridLayout {
            rows,
            cols: n.div_ceil(rows),
        },
        (None, Some(cols)) => GridLayout {
            rows: n.div_ceil(cols),
            cols,
        },
        (Some(rows), Some(cols)) => {
            let cells = rows as u64 * cols as u64;
            if cells < n as u64 {
                return Err(Error::validation(format!(
                    "Grid {}x{} has {} cells but {} images were given",
                    rows, cols, cells, n
                )));
            }
            GridLayout { rows, cols }
        }
    };
    Ok(layout)
}

/// Composite images into a grid on a white background.
///
/// Cells take the smallest width and height across inputs, floored at
/// [`MIN_CELL`]. Cells beyond the image count stay blank. A canvas over
/// `max_pixels` is rejected before anything is allocated.
pub fn compose_grid(
    images: &[DynamicImage],
    layout: GridLayout,
    strategy: ScaleStrategy,
    max_pixels: u64,
) -> Result<RgbaImage> {
    let cell_w = images
        .iter()
        .map(|i| i.width())
        .min()
        .ok_or_else(|| Error::input("At least one image is required"))?
        .max(MIN_CELL);
    let cell_h = images
        .iter()
        .map(|i| i.height())
        .min()
        .unwrap_or(MIN_CELL)
        .max(MIN_CELL);

    let (width, height) = canvas_size(layout, cell_w, cell_h);
    let area = width.saturating_mul(height);
    if area > max_pixels || width > u32::MAX as u64 || height > u32::MAX as u64 {
        return Err(Error::validation(format!(
            "Grid canvas {}x{} = {} pixels exceeds maximum {} pixels",
            width, height, area, max_pixels
        )));
    }
    let mut canvas = RgbaImage::from_pixel(width as u32, height as u32, WHITE);

    for (index, img) in images.iter().enumerate().take(layout.capacity()) {
        let (row, col) = layout.cell_of(index);
        let cell = strategy.fit(img, cell_w, cell_h);
        let x = GRID_GAP + col * (cell_w + GRID_GAP);
        let y = GRID_GAP + row * (cell_h + GRID_GAP);
        image::imageops::overlay(&mut canvas, &cell, x as i64, y as i64);
    }

    Ok(canvas)
}

fn canvas_size(layout: GridLayout, cell_w: u32, cell_h: u32) -> (u64, u64) {
    let axis = |cells: u32, cell: u32| {
        (cells as u64)
            .saturating_mul(cell as u64)
            .saturating_add((cells as u64 + 1) * GRID_GAP as u64)
    };
    (axis(layout.cols, cell_w), axis(layout.rows, cell_h))
}

/// Encode frames as an infinitely looping GIF.
///
/// Frames are stretched to the smallest width and height across inputs.
pub fn encode_gif(images: &[DynamicImage], frame_ms: u32) -> Result<Vec<u8>> {
    let width = images.iter().map(|i| i.width()).min();
    let height = images.iter().map(|i| i.height()).min();
    let (width, height) = match (width, height) {
        (Some(w), Some(h)) => (w, h),
        _ => return Err(Error::input("At least one frame is required")),
    };
    let delay = Delay::from_numer_denom_ms(frame_ms.max(1), 1);

    let frames: Vec<Frame> = images
        .iter()
        .map(|img| Frame::from_parts(ScaleStrategy::Stretch.fit(img, width, height), 0, 0, delay))
        .collect();

    let mut buf = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut buf);
        encoder.set_repeat(Repeat::Infinite)?;
        encoder.encode_frames(frames)?;
    }
    Ok(buf)
}

/// Target format for `compress_images`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CompressFormat {
    #[default]
    #[serde(alias = "jpeg", alias = "JPG", alias = "JPEG")]
    Jpg,
    #[serde(alias = "PNG")]
    Png,
    #[serde(alias = "WEBP")]
    Webp,
}

impl CompressFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            CompressFormat::Jpg => "jpg",
            CompressFormat::Png => "png",
            CompressFormat::Webp => "webp",
        }
    }
}

/// Re-encode an image. JPEG honours `quality` (1-100) and flattens alpha
/// onto white; PNG uses best compression; WebP is lossless.
pub fn compress_to(img: &DynamicImage, format: CompressFormat, quality: u8) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    match format {
        CompressFormat::Jpg => {
            let rgb = DynamicImage::ImageRgb8(flatten_onto_white(img));
            let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
            rgb.write_with_encoder(encoder)?;
        }
        CompressFormat::Png => {
            let encoder =
                PngEncoder::new_with_quality(&mut buf, CompressionType::Best, PngFilter::Adaptive);
            DynamicImage::ImageRgba8(img.to_rgba8()).write_with_encoder(encoder)?;
        }
        CompressFormat::Webp => {
            let encoder = WebPEncoder::new_lossless(&mut buf);
            DynamicImage::ImageRgba8(img.to_rgba8()).write_with_encoder(encoder)?;
        }
    }
    Ok(buf)
}

fn flatten_onto_white(img: &DynamicImage) -> RgbImage {
    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, px) in rgba.enumerate_pixels() {
        let [r, g, b, a] = px.0;
        let alpha = a as u32;
        let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha)) / 255) as u8;
        out.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    out
}

/// Rotate/flip operations for `batch_edit_images`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, JsonSchema)]
pub struct EditOps {
    /// Clockwise degrees: 0, 90, -90, 180 or 270
    #[serde(default)]
    pub rotate: i32,
    /// Mirror left-right after rotating
    #[serde(default)]
    pub flip_horizontal: bool,
    /// Mirror top-bottom after rotating
    #[serde(default)]
    pub flip_vertical: bool,
}

impl EditOps {
    /// Reject rotations other than right angles.
    pub fn validate(&self) -> Result<()> {
        match self.rotate {
            0 | 90 | -90 | 180 | 270 => Ok(()),
            other => Err(Error::validation(format!(
                "Unsupported rotation: {} (use 0, 90, -90, 180 or 270)",
                other
            ))),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.rotate == 0 && !self.flip_horizontal && !self.flip_vertical
    }

    /// Short human description, e.g. `rotate 90°, flip horizontal`.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if self.rotate != 0 {
            parts.push(format!("rotate {}°", self.rotate));
        }
        if self.flip_horizontal {
            parts.push("flip horizontal".to_string());
        }
        if self.flip_vertical {
            parts.push("flip vertical".to_string());
        }
        if parts.is_empty() {
            return "no changes".to_string();
        }
        parts.join(", ")
    }

    pub fn apply(&self, img: DynamicImage) -> DynamicImage {
        let mut img = match self.rotate {
            90 => img.rotate90(),
            180 => img.rotate180(),
            270 | -90 => img.rotate270(),
            _ => img,
        };
        if self.flip_horizontal {
            img = img.fliph();
        }
        if self.flip_vertical {
            img = img.flipv();
        }
        img
    }
}

/// Encode an image in memory, dropping alpha for JPEG.
pub fn encode_image(img: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    if format == ImageFormat::Jpeg {
        DynamicImage::ImageRgb8(flatten_onto_white(img))
            .write_to(&mut Cursor::new(&mut buf), format)?;
    } else {
        img.write_to(&mut Cursor::new(&mut buf), format)?;
    }
    Ok(buf)
}

/// A PNG preview bounded to `max_side` on both axes.
#[derive(Debug, Clone)]
pub struct Preview {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Downscale (never upscale) to fit `max_side` and encode as PNG.
pub fn preview_png(img: &DynamicImage, max_side: u32) -> Result<Preview> {
    let (w, h) = img.dimensions();
    let bounded = if w > max_side || h > max_side {
        img.resize(max_side, max_side, FilterType::Triangle)
    } else {
        img.clone()
    };
    let bounded = DynamicImage::ImageRgba8(bounded.to_rgba8());

    let mut png = Vec::new();
    bounded.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(Preview {
        png,
        width: bounded.width(),
        height: bounded.height(),
    })
}

/// Preview of an image file; for animations this is the first frame.
pub fn preview_file(path: &Path, max_side: u32) -> Result<Preview> {
    preview_png(&open_image(path)?, max_side)
}
