//! Region cropping for screenshot capture.
//!
//! Pure geometry over PNG bytes: scale a page-coordinate selection by the
//! device pixel ratio and cut it out of the captured viewport image. Anything
//! that would produce an empty or partially clipped result is an explicit
//! error rather than a silently adjusted crop.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Selection rectangle in page (CSS pixel) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionRect {
  pub x: f64,
  pub y: f64,
  pub w: f64,
  pub h: f64,
}

/// Scroll offsets at selection time. Carried through the capture request for
/// interface completeness, but never added to the selection rect: the captured
/// image is the visible viewport at capture time and already reflects the
/// current scroll position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrollOffset {
  pub x: f64,
  pub y: f64,
}

#[derive(Debug, Error)]
pub enum CropError {
  #[error("selection has no area after scaling ({width}x{height})")]
  EmptySelection { width: i64, height: i64 },

  #[error(
    "selection at ({x},{y}) sized {width}x{height} falls outside the {image_width}x{image_height} capture"
  )]
  OutOfBounds { x: i64, y: i64, width: i64, height: i64, image_width: u32, image_height: u32 },

  #[error("capture image could not be processed: {0}")]
  Image(#[from] image::ImageError),

  #[error("image payload is not a PNG data URI")]
  NotADataUri,

  #[error("data URI payload is not valid base64: {0}")]
  Base64(#[from] base64::DecodeError),
}

/// Cut the selected region out of a captured viewport image.
///
/// The rect is scaled by `device_pixel_ratio` (the capture is at device
/// resolution) and rounded to whole pixels. The scaled rect must lie fully
/// inside the source image; a selection that is empty, inverted, or reaching
/// past any edge fails with a typed error.
pub fn crop_region(
  png: &[u8],
  rect: RegionRect,
  device_pixel_ratio: f64,
) -> Result<Vec<u8>, CropError> {
  let dpr = if device_pixel_ratio > 0.0 { device_pixel_ratio } else { 1.0 };

  let sx = (rect.x * dpr).round() as i64;
  let sy = (rect.y * dpr).round() as i64;
  let sw = (rect.w * dpr).round() as i64;
  let sh = (rect.h * dpr).round() as i64;

  if sw <= 0 || sh <= 0 {
    return Err(CropError::EmptySelection { width: sw, height: sh });
  }

  let source = image::load_from_memory(png)?;
  let (image_width, image_height) = (source.width(), source.height());

  let inside = sx >= 0
    && sy >= 0
    && sx + sw <= i64::from(image_width)
    && sy + sh <= i64::from(image_height);
  if !inside {
    return Err(CropError::OutOfBounds {
      x: sx,
      y: sy,
      width: sw,
      height: sh,
      image_width,
      image_height,
    });
  }

  let cropped = source.crop_imm(sx as u32, sy as u32, sw as u32, sh as u32);

  let mut out = Vec::new();
  cropped.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;
  Ok(out)
}

/// Wrap PNG bytes in a self-contained data URI.
pub fn encode_data_uri(png: &[u8]) -> String {
  format!("{PNG_DATA_URI_PREFIX}{}", BASE64.encode(png))
}

/// Recover PNG bytes from a data URI produced by `encode_data_uri`.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>, CropError> {
  let payload = uri.strip_prefix(PNG_DATA_URI_PREFIX).ok_or(CropError::NotADataUri)?;
  Ok(BASE64.decode(payload)?)
}
