//! Grayscale frame type — raw luma construction, image decoding, cropping.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid luma length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

/// A single grayscale frame handed to the perception pipeline.
///
/// Capture and encoding are external concerns; the pipeline only ever sees
/// owned luma bytes in row-major order.
#[derive(Clone)]
pub struct Frame {
    /// Grayscale pixel data (width * height bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// Build a frame from raw luma bytes, validating the buffer length.
    pub fn from_luma(data: Vec<u8>, width: u32, height: u32) -> Result<Self, FrameError> {
        let expected = (width as usize) * (height as usize);
        if data.len() != expected {
            return Err(FrameError::InvalidLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Decode an encoded image (PNG, JPEG, ...) into a grayscale frame.
    ///
    /// Registration photos arrive this way; live frames come in as raw luma.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let luma = image::load_from_memory(bytes)?.into_luma8();
        let (width, height) = luma.dimensions();
        Ok(Self {
            data: luma.into_raw(),
            width,
            height,
        })
    }

    /// Copy out a rectangular region, or `None` if the rectangle leaves the
    /// frame. A zero-area rectangle yields an empty frame.
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> Option<Frame> {
        if x.checked_add(width)? > self.width || y.checked_add(height)? > self.height {
            return None;
        }
        let w = width as usize;
        let mut data = Vec::with_capacity(w * height as usize);
        for row in y..y + height {
            let start = (row * self.width + x) as usize;
            data.extend_from_slice(&self.data[start..start + w]);
        }
        Some(Frame {
            data,
            width,
            height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_luma_validates_length() {
        assert!(Frame::from_luma(vec![0u8; 12], 4, 3).is_ok());
        let err = Frame::from_luma(vec![0u8; 11], 4, 3);
        assert!(matches!(
            err,
            Err(FrameError::InvalidLength {
                expected: 12,
                actual: 11
            })
        ));
    }

    #[test]
    fn test_crop_contents() {
        // 4x3 frame with pixel value = index
        let data: Vec<u8> = (0..12).collect();
        let frame = Frame::from_luma(data, 4, 3).unwrap();

        let crop = frame.crop(1, 1, 2, 2).unwrap();
        assert_eq!(crop.width, 2);
        assert_eq!(crop.height, 2);
        assert_eq!(crop.data, vec![5, 6, 9, 10]);
    }

    #[test]
    fn test_crop_out_of_bounds() {
        let frame = Frame::from_luma(vec![0u8; 12], 4, 3).unwrap();
        assert!(frame.crop(3, 0, 2, 1).is_none());
        assert!(frame.crop(0, 2, 1, 2).is_none());
    }

    #[test]
    fn test_crop_zero_area() {
        let frame = Frame::from_luma(vec![0u8; 12], 4, 3).unwrap();
        let crop = frame.crop(2, 2, 0, 0).unwrap();
        assert!(crop.data.is_empty());
    }

    #[test]
    fn test_decode_png_roundtrip() {
        // Encode a small gradient as PNG, then decode back to luma.
        let img = image::GrayImage::from_fn(8, 4, |x, y| image::Luma([(x * 8 + y) as u8]));
        let mut bytes = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageLuma8(img)
            .write_to(&mut bytes, image::ImageFormat::Png)
            .unwrap();

        let frame = Frame::decode(bytes.get_ref()).unwrap();
        assert_eq!((frame.width, frame.height), (8, 4));
        assert_eq!(frame.data[0], 0);
        assert_eq!(frame.data[9], 8 + 1);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(matches!(
            Frame::decode(&[0xde, 0xad, 0xbe, 0xef]),
            Err(FrameError::Decode(_))
        ));
    }
}
