//! Image decoding and grayscale conversion.

use image::GrayImage;

use crate::types::VisionError;

/// Decode raw image bytes (PNG, JPEG, BMP, WebP) to grayscale.
///
/// # Errors
///
/// Returns [`VisionError::EmptyInput`] if `bytes` is empty, or
/// [`VisionError::ImageDecode`] if the data cannot be decoded.
#[must_use = "returns the decoded grayscale image"]
pub fn decode_grayscale(bytes: &[u8]) -> Result<GrayImage, VisionError> {
    if bytes.is_empty() {
        return Err(VisionError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_luma8())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn png_bytes(img: &image::RgbImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgb8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn empty_input_returns_error() {
        assert!(matches!(decode_grayscale(&[]), Err(VisionError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_returns_image_decode_error() {
        let result = decode_grayscale(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(VisionError::ImageDecode(_))));
    }

    #[test]
    fn color_png_decodes_to_grayscale_of_same_size() {
        let img = image::RgbImage::from_fn(13, 7, |x, _| {
            if x < 6 {
                image::Rgb([0, 0, 0])
            } else {
                image::Rgb([255, 255, 255])
            }
        });
        let gray = decode_grayscale(&png_bytes(&img)).unwrap();
        assert_eq!(gray.dimensions(), (13, 7));
        assert_eq!(gray.get_pixel(0, 0).0[0], 0);
        assert_eq!(gray.get_pixel(12, 6).0[0], 255);
    }
}
