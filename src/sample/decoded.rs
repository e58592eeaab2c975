/// Upstream decoder contract
///
/// The decoder (outside this crate) fills in a `DecodedImage` and hands it
/// over. Converting it into a `SampleBuffer` rejects formats the display
/// pipeline can't handle.

use super::buffer::{BitDepth, PhotometricInterpretation, SampleBuffer};
use crate::error::RenderError;
use crate::state::window::WindowLevel;

/// Fallback window when neither the header nor the pixels give one
const FALLBACK_WINDOW: WindowLevel = WindowLevel {
    center: 128.0,
    width: 256.0,
};

/// Everything the decoder reports about one frame
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub bits_allocated: u16,
    pub bits_stored: u16,
    pub samples_per_pixel: u16,
    /// Pixel representation 1 in the header
    pub signed: bool,
    pub photometric: PhotometricInterpretation,
    pub pixel_data: Vec<u8>,
    pub window_center: Option<f64>,
    pub window_width: Option<f64>,
}

impl DecodedImage {
    /// Split into the sample buffer and its default window
    ///
    /// The window comes from the header when both values are present, else
    /// from the pixel min/max, else `FALLBACK_WINDOW`.
    pub fn into_parts(self) -> Result<(SampleBuffer, WindowLevel), RenderError> {
        let header_window = match (self.window_center, self.window_width) {
            (Some(center), Some(width)) => Some(WindowLevel::new(center, width)),
            _ => None,
        };

        let buffer = SampleBuffer::try_from(self)?;
        let window = match header_window {
            Some(window) => window,
            None => match buffer.value_range() {
                Some((lo, hi)) => WindowLevel::from_value_range(lo, hi),
                None => FALLBACK_WINDOW,
            },
        };

        Ok((buffer, window))
    }
}

impl TryFrom<DecodedImage> for SampleBuffer {
    type Error = RenderError;

    fn try_from(decoded: DecodedImage) -> Result<Self, Self::Error> {
        let bit_depth = BitDepth::from_bits_allocated(decoded.bits_allocated)?;
        let bits_stored = if decoded.bits_stored == 0 {
            bit_depth.bits()
        } else {
            decoded.bits_stored
        };

        let buffer = SampleBuffer::new(
            decoded.width,
            decoded.height,
            bit_depth,
            decoded.signed,
            decoded.samples_per_pixel,
            decoded.photometric,
            decoded.pixel_data,
        )?;

        Ok(buffer.with_bits_stored(bits_stored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoded(bits_allocated: u16, pixel_data: Vec<u8>) -> DecodedImage {
        DecodedImage {
            width: 2,
            height: 1,
            bits_allocated,
            bits_stored: 0,
            samples_per_pixel: 1,
            signed: false,
            photometric: PhotometricInterpretation::Monochrome2,
            pixel_data,
            window_center: None,
            window_width: None,
        }
    }

    #[test]
    fn test_rejects_unsupported_bit_depth() {
        let result = SampleBuffer::try_from(decoded(32, vec![0; 8]));
        assert_eq!(result, Err(RenderError::UnsupportedBitDepth(32)));
    }

    #[test]
    fn test_bits_stored_defaults_to_allocated() {
        let buffer = SampleBuffer::try_from(decoded(16, vec![0; 4])).unwrap();
        assert_eq!(buffer.bits_stored(), 16);

        let mut image = decoded(16, vec![0; 4]);
        image.bits_stored = 12;
        let buffer = SampleBuffer::try_from(image).unwrap();
        assert_eq!(buffer.bits_stored(), 12);
    }

    #[test]
    fn test_header_window_wins() {
        let mut image = decoded(8, vec![10, 20]);
        image.window_center = Some(40.0);
        image.window_width = Some(400.0);

        let (_, window) = image.into_parts().unwrap();
        assert_eq!(window, WindowLevel::new(40.0, 400.0));
    }

    #[test]
    fn test_min_max_window_without_header() {
        let (buffer, window) = decoded(8, vec![10, 20]).into_parts().unwrap();
        assert_eq!(buffer.value_range(), Some((10, 20)));
        assert_eq!(window, WindowLevel::new(15.0, 10.0));
    }

    #[test]
    fn test_fallback_window_for_color() {
        let image = DecodedImage {
            width: 1,
            height: 1,
            bits_allocated: 8,
            bits_stored: 8,
            samples_per_pixel: 3,
            signed: false,
            photometric: PhotometricInterpretation::Rgb,
            pixel_data: vec![1, 2, 3],
            window_center: None,
            window_width: None,
        };
        let (buffer, window) = image.into_parts().unwrap();
        assert!(buffer.is_color());
        assert_eq!(window, FALLBACK_WINDOW);
    }

    #[test]
    fn test_lone_header_value_is_ignored() {
        let mut image = decoded(8, vec![10, 20]);
        image.window_center = Some(40.0);

        let (_, window) = image.into_parts().unwrap();
        assert_eq!(window, WindowLevel::new(15.0, 10.0));
    }
}
