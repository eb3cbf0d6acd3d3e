use std::io::Cursor;

use clipnote::crop::{crop_region, decode_data_uri, encode_data_uri, CropError, RegionRect};

/// A test capture where pixel (x, y) carries its own coordinates in the red
/// and green channels, so crops can be verified by content, not just size.
fn gradient_png(width: u32, height: u32) -> Vec<u8> {
  let img = image::RgbaImage::from_fn(width, height, |x, y| {
    image::Rgba([(x % 256) as u8, (y % 256) as u8, 0, 255])
  });
  let mut out = Vec::new();
  image::DynamicImage::ImageRgba8(img)
    .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
    .unwrap();
  out
}

fn rect(x: f64, y: f64, w: f64, h: f64) -> RegionRect {
  RegionRect { x, y, w, h }
}

#[cfg(test)]
mod crop_tests {
  use super::*;

  #[test]
  fn interior_crop_has_device_pixel_dimensions() {
    // 100x80 CSS viewport captured at dpr 2 -> 200x160 device pixels.
    let capture = gradient_png(200, 160);

    let cropped = crop_region(&capture, rect(10.0, 10.0, 30.0, 20.0), 2.0).unwrap();
    let img = image::load_from_memory(&cropped).unwrap();

    assert_eq!(img.width(), 60);
    assert_eq!(img.height(), 40);

    // Top-left of the crop is source pixel (20, 20).
    let rgba = img.to_rgba8();
    assert_eq!(rgba.get_pixel(0, 0), &image::Rgba([20, 20, 0, 255]));
  }

  #[test]
  fn fractional_coordinates_round_to_whole_pixels() {
    let capture = gradient_png(100, 100);

    let cropped = crop_region(&capture, rect(0.4, 0.4, 10.3, 10.6), 1.0).unwrap();
    let img = image::load_from_memory(&cropped).unwrap();

    assert_eq!(img.width(), 10);
    assert_eq!(img.height(), 11);
  }

  #[test]
  fn zero_dpr_is_treated_as_one() {
    let capture = gradient_png(50, 50);

    let cropped = crop_region(&capture, rect(0.0, 0.0, 10.0, 10.0), 0.0).unwrap();
    let img = image::load_from_memory(&cropped).unwrap();
    assert_eq!((img.width(), img.height()), (10, 10));
  }

  #[test]
  fn empty_selection_is_an_explicit_error() {
    let capture = gradient_png(50, 50);

    let result = crop_region(&capture, rect(10.0, 10.0, 0.0, 5.0), 1.0);
    assert!(matches!(result, Err(CropError::EmptySelection { .. })));

    let result = crop_region(&capture, rect(10.0, 10.0, 5.0, -3.0), 1.0);
    assert!(matches!(result, Err(CropError::EmptySelection { .. })));
  }

  #[test]
  fn selection_past_an_edge_fails_instead_of_clamping() {
    let capture = gradient_png(50, 50);

    // Partly outside: right edge at 40 + 20 = 60 > 50.
    let result = crop_region(&capture, rect(40.0, 10.0, 20.0, 10.0), 1.0);
    assert!(matches!(result, Err(CropError::OutOfBounds { .. })));

    // DPR scaling pushing an otherwise-fitting rect out counts too.
    let result = crop_region(&capture, rect(20.0, 20.0, 10.0, 10.0), 2.0);
    assert!(matches!(result, Err(CropError::OutOfBounds { .. })));
  }

  #[test]
  fn selection_fully_outside_fails() {
    let capture = gradient_png(50, 50);

    let result = crop_region(&capture, rect(100.0, 100.0, 10.0, 10.0), 1.0);
    assert!(matches!(result, Err(CropError::OutOfBounds { .. })));

    let result = crop_region(&capture, rect(-30.0, 5.0, 10.0, 10.0), 1.0);
    assert!(matches!(result, Err(CropError::OutOfBounds { .. })));
  }

  #[test]
  fn garbage_bytes_are_a_decode_error() {
    let result = crop_region(b"not a png", rect(0.0, 0.0, 5.0, 5.0), 1.0);
    assert!(matches!(result, Err(CropError::Image(_))));
  }

  #[test]
  fn data_uri_round_trip() {
    let png = gradient_png(4, 4);
    let uri = encode_data_uri(&png);

    assert!(uri.starts_with("data:image/png;base64,"));
    assert_eq!(decode_data_uri(&uri).unwrap(), png);
  }

  #[test]
  fn decode_rejects_foreign_payloads() {
    assert!(matches!(decode_data_uri("https://example.com/a.png"), Err(CropError::NotADataUri)));
    assert!(matches!(
      decode_data_uri("data:image/png;base64,!!!not-base64!!!"),
      Err(CropError::Base64(_))
    ));
  }
}
