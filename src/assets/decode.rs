use image::{ImageFormat, RgbImage};

use crate::foundation::error::{StoryError, StoryResult};

/// Formats the composer accepts as input.
pub const ACCEPTED_FORMATS: [ImageFormat; 3] =
    [ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::WebP];

/// Turns encoded image bytes into an RGB8 raster.
pub trait ImageDecoder: Send + Sync {
    /// Decode `bytes`; `mime` is the caller's declared type, if any.
    fn decode(&self, bytes: &[u8], mime: Option<&str>) -> StoryResult<RgbImage>;
}

/// [`ImageDecoder`] backed by the `image` crate codecs.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImageCrateDecoder;

impl ImageDecoder for ImageCrateDecoder {
    fn decode(&self, bytes: &[u8], mime: Option<&str>) -> StoryResult<RgbImage> {
        let format = resolve_format(bytes, mime)?;
        let dyn_img = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| StoryError::decode(format!("decode {format:?} image: {e}")))?;
        let rgb = dyn_img.to_rgb8();
        if rgb.width() == 0 || rgb.height() == 0 {
            return Err(StoryError::decode("decoded image has zero area"));
        }
        Ok(rgb)
    }
}

/// Pick the codec for `bytes`: the sniffed format wins, the declared MIME type is the fallback.
pub fn resolve_format(bytes: &[u8], mime: Option<&str>) -> StoryResult<ImageFormat> {
    if bytes.is_empty() {
        return Err(StoryError::decode("image bytes are empty"));
    }

    let declared = mime.and_then(|m| ImageFormat::from_mime_type(m.trim()));
    let format = match image::guess_format(bytes) {
        Ok(sniffed) => {
            if let Some(declared) = declared.filter(|d| *d != sniffed) {
                tracing::debug!(?declared, ?sniffed, "declared mime disagrees with content");
            }
            sniffed
        }
        Err(_) => declared.ok_or_else(|| {
            StoryError::decode(format!(
                "unrecognized image format (declared mime: {})",
                mime.unwrap_or("none")
            ))
        })?,
    };

    if !ACCEPTED_FORMATS.contains(&format) {
        return Err(StoryError::decode(format!(
            "unsupported image format {format:?}; expected JPEG, PNG or WebP"
        )));
    }
    Ok(format)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn encode(img: &RgbImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(img.clone())
            .write_to(&mut Cursor::new(&mut buf), format)
            .unwrap();
        buf
    }

    #[test]
    fn decodes_png_to_rgb8() {
        let src = RgbImage::from_pixel(3, 2, image::Rgb([100, 50, 200]));
        let decoded = ImageCrateDecoder.decode(&encode(&src, ImageFormat::Png), None).unwrap();
        assert_eq!(decoded, src);
    }

    #[test]
    fn rgba_input_is_flattened_to_rgb() {
        let rgba = image::RgbaImage::from_pixel(1, 1, image::Rgba([10, 20, 30, 128]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(rgba)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        let decoded = ImageCrateDecoder.decode(&buf, Some("image/png")).unwrap();
        assert_eq!(decoded.get_pixel(0, 0).0, [10, 20, 30]);
    }

    #[test]
    fn sniffed_format_wins_over_declared() {
        let src = RgbImage::new(2, 2);
        let png = encode(&src, ImageFormat::Png);
        assert_eq!(
            resolve_format(&png, Some("image/jpeg")).unwrap(),
            ImageFormat::Png
        );
    }

    #[test]
    fn corrupt_and_unsupported_inputs_are_decode_errors() {
        let err = ImageCrateDecoder
            .decode(b"definitely not an image", Some("image/png"))
            .unwrap_err();
        assert!(err.is_decode());

        let err = ImageCrateDecoder.decode(&[], None).unwrap_err();
        assert!(err.is_decode());

        let bmp = encode(&RgbImage::new(2, 2), ImageFormat::Bmp);
        let err = ImageCrateDecoder.decode(&bmp, None).unwrap_err();
        assert!(err.to_string().contains("unsupported image format"));
    }
}
