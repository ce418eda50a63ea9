use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;

use crate::error::{MediaError, MediaResult};

/// Decode, resize, and quality-parameterized encode for one image format.
///
/// The compressor's search is format-agnostic; it only needs these four
/// operations. Quality is the closed range `[0.1, 1.0]` regardless of how
/// the underlying encoder scales it.
pub trait ImageCodec: Send + Sync {
    type Image;

    /// Decode raw bytes into a pixel image.
    fn decode(&self, bytes: &[u8]) -> MediaResult<Self::Image>;

    /// Pixel width and height.
    fn dimensions(&self, image: &Self::Image) -> (u32, u32);

    /// Resample to exactly `width` × `height`.
    fn resize(&self, image: &Self::Image, width: u32, height: u32) -> Self::Image;

    /// Encode at the given quality, returning the full payload.
    fn encode(&self, image: &Self::Image, quality: f32) -> MediaResult<Vec<u8>>;
}

/// Production codec: JPEG via the `image` crate.
///
/// Input bytes may be any format the decoder recognizes (JPEG, PNG);
/// output is always JPEG, so alpha is flattened on encode.
#[derive(Clone, Copy, Debug, Default)]
pub struct JpegCodec;

impl ImageCodec for JpegCodec {
    type Image = DynamicImage;

    fn decode(&self, bytes: &[u8]) -> MediaResult<DynamicImage> {
        image::load_from_memory(bytes).map_err(|e| MediaError::Decode(e.to_string()))
    }

    fn dimensions(&self, image: &DynamicImage) -> (u32, u32) {
        (image.width(), image.height())
    }

    fn resize(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
        image.resize_exact(width, height, FilterType::Triangle)
    }

    fn encode(&self, image: &DynamicImage, quality: f32) -> MediaResult<Vec<u8>> {
        let scaled = (quality * 100.0).round().clamp(1.0, 100.0) as u8;
        let rgb = image.to_rgb8();
        let mut buf = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, scaled);
        encoder
            .encode_image(&rgb)
            .map_err(|e| MediaError::Encode(e.to_string()))?;
        Ok(buf)
    }
}

/// Edge length of the generated placeholder image.
pub const PLACEHOLDER_EDGE: u32 = 100;

/// A blank JPEG staged for catalog entries that have no photo yet.
pub fn placeholder_jpeg() -> MediaResult<Vec<u8>> {
    let blank = image::RgbImage::from_pixel(
        PLACEHOLDER_EDGE,
        PLACEHOLDER_EDGE,
        image::Rgb([255, 255, 255]),
    );
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, 80);
    encoder
        .encode_image(&blank)
        .map_err(|e| MediaError::Encode(e.to_string()))?;
    Ok(buf)
}
