//! Decoding between raw bytes and the in-memory image representation.
//!
//! The cache and coordinator are generic over [`ImageDecoder`]; they never
//! look inside a decoded image except through this trait. Two decoders ship
//! with the crate:
//!
//! - [`BytesDecoder`]: the payload is opaque and the "decoded" form is the
//!   bytes themselves.
//! - [`RasterDecoder`]: real raster images via the `image` crate.

mod raster;

pub use raster::{RasterDecoder, RasterImage};

use bytes::Bytes;
use thiserror::Error;

/// Errors raised while decoding or re-encoding.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// There were no bytes to decode.
    #[error("Image data is empty")]
    Empty,

    /// The bytes are not a format this decoder understands.
    #[error("Failed to decode image: {0}")]
    Unsupported(String),

    /// The decoded image could not be serialized back to bytes.
    #[error("Failed to encode image: {0}")]
    Encode(String),
}

/// Converts between raw bytes and a decoded image.
///
/// Implementations must be cheap to share across threads; decode work runs
/// on the disk lane and on blocking worker threads.
pub trait ImageDecoder: Send + Sync + 'static {
    /// In-memory representation. Cloned on every memory-tier hit.
    type Image: Clone + Send + Sync + 'static;

    /// Decode a complete payload.
    fn decode(&self, data: &[u8]) -> Result<Self::Image, DecodeError>;

    /// Serialize an image for disk when the original bytes are unavailable.
    fn encode(&self, image: &Self::Image) -> Result<Bytes, DecodeError>;

    /// Memory-tier cost of an image, typically its decoded byte size.
    fn cost(&self, image: &Self::Image) -> u64;

    /// Whether the image carries more than one frame.
    fn is_animated(&self, _image: &Self::Image) -> bool {
        false
    }

    /// Force the image into its display-ready form.
    fn decompress(&self, image: Self::Image) -> Self::Image {
        image
    }

    /// Best-effort decode of a truncated payload for progressive delivery.
    fn decode_partial(&self, data: &[u8]) -> Option<Self::Image> {
        self.decode(data).ok()
    }
}

/// Treats payloads as opaque bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesDecoder;

impl ImageDecoder for BytesDecoder {
    type Image = Bytes;

    fn decode(&self, data: &[u8]) -> Result<Bytes, DecodeError> {
        if data.is_empty() {
            return Err(DecodeError::Empty);
        }
        Ok(Bytes::copy_from_slice(data))
    }

    fn encode(&self, image: &Bytes) -> Result<Bytes, DecodeError> {
        Ok(image.clone())
    }

    fn cost(&self, image: &Bytes) -> u64 {
        image.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_decoder_passthrough() {
        let decoder = BytesDecoder;
        let image = decoder.decode(b"payload").unwrap();

        assert_eq!(image, Bytes::from_static(b"payload"));
        assert_eq!(decoder.cost(&image), 7);
        assert_eq!(decoder.encode(&image).unwrap(), image);
        assert!(!decoder.is_animated(&image));
    }

    #[test]
    fn test_bytes_decoder_rejects_empty() {
        assert_eq!(BytesDecoder.decode(b""), Err(DecodeError::Empty));
        assert_eq!(BytesDecoder.decode_partial(b""), None);
    }
}
