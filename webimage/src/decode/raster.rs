//! Raster decoder backed by the `image` crate.

use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, DynamicImage, ImageFormat};

use super::{DecodeError, ImageDecoder};

/// A decoded raster image.
///
/// Pixels are shared behind an `Arc`, so clones handed out by the memory tier
/// do not copy pixel data.
#[derive(Debug, Clone)]
pub struct RasterImage {
    pixels: Arc<DynamicImage>,
    frame_count: usize,
    format: Option<ImageFormat>,
}

impl RasterImage {
    pub fn new(pixels: DynamicImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
            frame_count: 1,
            format: None,
        }
    }

    pub fn pixels(&self) -> &DynamicImage {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Number of frames in the source payload (1 for still images).
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Container format sniffed from the source bytes, if any.
    pub fn format(&self) -> Option<ImageFormat> {
        self.format
    }
}

/// Decodes PNG, JPEG, GIF and the other formats enabled in `image`.
///
/// Re-encoding for disk always produces PNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterDecoder;

impl RasterDecoder {
    fn count_frames(data: &[u8]) -> usize {
        GifDecoder::new(Cursor::new(data))
            .map(|decoder| decoder.into_frames().count())
            .unwrap_or(1)
            .max(1)
    }
}

impl ImageDecoder for RasterDecoder {
    type Image = RasterImage;

    fn decode(&self, data: &[u8]) -> Result<RasterImage, DecodeError> {
        if data.is_empty() {
            return Err(DecodeError::Empty);
        }

        let format = image::guess_format(data).ok();
        let pixels =
            image::load_from_memory(data).map_err(|e| DecodeError::Unsupported(e.to_string()))?;
        let frame_count = match format {
            Some(ImageFormat::Gif) => Self::count_frames(data),
            _ => 1,
        };

        Ok(RasterImage {
            pixels: Arc::new(pixels),
            frame_count,
            format,
        })
    }

    fn encode(&self, image: &RasterImage) -> Result<Bytes, DecodeError> {
        let mut cursor = Cursor::new(Vec::new());
        image
            .pixels
            .write_to(&mut cursor, ImageFormat::Png)
            .map_err(|e| DecodeError::Encode(e.to_string()))?;
        Ok(Bytes::from(cursor.into_inner()))
    }

    fn cost(&self, image: &RasterImage) -> u64 {
        image.width() as u64 * image.height() as u64 * 4
    }

    fn is_animated(&self, image: &RasterImage) -> bool {
        image.frame_count > 1
    }

    fn decompress(&self, image: RasterImage) -> RasterImage {
        if matches!(*image.pixels, DynamicImage::ImageRgba8(_)) {
            return image;
        }
        RasterImage {
            pixels: Arc::new(DynamicImage::ImageRgba8(image.pixels.to_rgba8())),
            ..image
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::gif::GifEncoder;
    use image::{Frame, Rgb, RgbImage, Rgba, RgbaImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 128]));
        let mut buffer = Vec::new();
        let mut cursor = Cursor::new(&mut buffer);
        img.write_to(&mut cursor, ImageFormat::Png).unwrap();
        buffer
    }

    fn animated_gif_bytes() -> Vec<u8> {
        let mut buffer = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut buffer);
            let frames = vec![
                Frame::new(RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]))),
                Frame::new(RgbaImage::from_pixel(4, 4, Rgba([0, 255, 0, 255]))),
            ];
            encoder.encode_frames(frames).unwrap();
        }
        buffer
    }

    #[test]
    fn test_decode_png() {
        let image = RasterDecoder.decode(&png_bytes(8, 4)).unwrap();

        assert_eq!(image.width(), 8);
        assert_eq!(image.height(), 4);
        assert_eq!(image.format(), Some(ImageFormat::Png));
        assert_eq!(RasterDecoder.cost(&image), 8 * 4 * 4);
        assert!(!RasterDecoder.is_animated(&image));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert_eq!(RasterDecoder.decode(&[]).unwrap_err(), DecodeError::Empty);
        assert!(matches!(
            RasterDecoder.decode(b"definitely not an image"),
            Err(DecodeError::Unsupported(_))
        ));
    }

    #[test]
    fn test_encode_round_trips_pixels() {
        let original = RasterDecoder.decode(&png_bytes(5, 5)).unwrap();
        let encoded = RasterDecoder.encode(&original).unwrap();
        let decoded = RasterDecoder.decode(&encoded).unwrap();

        assert_eq!(original.pixels().to_rgba8(), decoded.pixels().to_rgba8());
    }

    #[test]
    fn test_decompress_converts_to_rgba8() {
        let image = RasterDecoder.decode(&png_bytes(2, 2)).unwrap();
        assert!(!matches!(image.pixels(), DynamicImage::ImageRgba8(_)));

        let image = RasterDecoder.decompress(image);
        assert!(matches!(image.pixels(), DynamicImage::ImageRgba8(_)));
    }

    #[test]
    fn test_animated_gif_detected() {
        let image = RasterDecoder.decode(&animated_gif_bytes()).unwrap();

        assert_eq!(image.format(), Some(ImageFormat::Gif));
        assert_eq!(image.frame_count(), 2);
        assert!(RasterDecoder.is_animated(&image));
    }
}
