/// Immutable sample buffer with its declared format
///
/// A `SampleBuffer` is built once from decoder output and then only read.
/// Geometry and format are checked lazily by `validate()`, right before a
/// compositor touches the bytes, so a short or unsupported buffer turns into
/// "nothing to display" instead of a panic.

use crate::error::RenderError;
use crate::transform::ValueDomain;

/// How sample values map to brightness or color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhotometricInterpretation {
    /// Lowest value renders white
    Monochrome1,
    /// Lowest value renders black
    Monochrome2,
    Rgb,
    PaletteColor,
    Unknown,
}

impl PhotometricInterpretation {
    /// Parse the header string ("MONOCHROME2", " rgb ", ...)
    ///
    /// Surrounding whitespace and case are ignored. Anything unrecognized
    /// becomes `Unknown`.
    pub fn from_header(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "MONOCHROME1" => Self::Monochrome1,
            "MONOCHROME2" => Self::Monochrome2,
            "RGB" => Self::Rgb,
            "PALETTE COLOR" => Self::PaletteColor,
            _ => Self::Unknown,
        }
    }

    pub fn is_monochrome(self) -> bool {
        matches!(self, Self::Monochrome1 | Self::Monochrome2)
    }

    /// Whether the window/level output must be inverted
    pub fn inverts(self) -> bool {
        self == Self::Monochrome1
    }

    pub fn is_supported(self) -> bool {
        matches!(self, Self::Monochrome1 | Self::Monochrome2 | Self::Rgb)
    }
}

/// Bits allocated per sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitDepth {
    Eight,
    Sixteen,
}

impl BitDepth {
    pub fn from_bits_allocated(bits: u16) -> Result<Self, RenderError> {
        match bits {
            8 => Ok(Self::Eight),
            16 => Ok(Self::Sixteen),
            other => Err(RenderError::UnsupportedBitDepth(other)),
        }
    }

    pub fn bits(self) -> u16 {
        match self {
            Self::Eight => 8,
            Self::Sixteen => 16,
        }
    }

    pub fn bytes(self) -> usize {
        match self {
            Self::Eight => 1,
            Self::Sixteen => 2,
        }
    }
}

/// Decoded pixel data plus geometry and numeric format
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    width: u32,
    height: u32,
    bit_depth: BitDepth,
    bits_stored: u16,
    signed: bool,
    samples_per_pixel: u16,
    photometric: PhotometricInterpretation,
    data: Vec<u8>,
}

impl SampleBuffer {
    /// Create a buffer from raw bytes
    ///
    /// Only `samples_per_pixel` is rejected here. Everything that depends on
    /// the byte length is checked by `validate()`.
    pub fn new(
        width: u32,
        height: u32,
        bit_depth: BitDepth,
        signed: bool,
        samples_per_pixel: u16,
        photometric: PhotometricInterpretation,
        data: Vec<u8>,
    ) -> Result<Self, RenderError> {
        if samples_per_pixel != 1 && samples_per_pixel != 3 {
            return Err(RenderError::UnsupportedSamplesPerPixel(samples_per_pixel));
        }

        Ok(Self {
            width,
            height,
            bit_depth,
            bits_stored: bit_depth.bits(),
            signed,
            samples_per_pixel,
            photometric,
            data,
        })
    }

    /// Override the number of significant bits (defaults to bits allocated)
    pub fn with_bits_stored(mut self, bits_stored: u16) -> Self {
        self.bits_stored = bits_stored.clamp(1, self.bit_depth.bits());
        self
    }

    /// 8-bit single channel buffer
    pub fn monochrome8(
        width: u32,
        height: u32,
        photometric: PhotometricInterpretation,
        data: Vec<u8>,
    ) -> Self {
        Self {
            width,
            height,
            bit_depth: BitDepth::Eight,
            bits_stored: 8,
            signed: false,
            samples_per_pixel: 1,
            photometric,
            data,
        }
    }

    /// 16-bit single channel buffer from native values (stored little-endian)
    pub fn monochrome16(
        width: u32,
        height: u32,
        photometric: PhotometricInterpretation,
        values: &[u16],
    ) -> Self {
        Self {
            width,
            height,
            bit_depth: BitDepth::Sixteen,
            bits_stored: 16,
            signed: false,
            samples_per_pixel: 1,
            photometric,
            data: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }

    /// Signed 16-bit single channel buffer (stored little-endian)
    pub fn monochrome16_signed(
        width: u32,
        height: u32,
        photometric: PhotometricInterpretation,
        values: &[i16],
    ) -> Self {
        Self {
            width,
            height,
            bit_depth: BitDepth::Sixteen,
            bits_stored: 16,
            signed: true,
            samples_per_pixel: 1,
            photometric,
            data: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }

    /// Interleaved 8-bit RGB buffer
    pub fn rgb8(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            bit_depth: BitDepth::Eight,
            bits_stored: 8,
            signed: false,
            samples_per_pixel: 3,
            photometric: PhotometricInterpretation::Rgb,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn bit_depth(&self) -> BitDepth {
        self.bit_depth
    }

    pub fn bits_stored(&self) -> u16 {
        self.bits_stored
    }

    pub fn is_signed(&self) -> bool {
        self.signed
    }

    pub fn samples_per_pixel(&self) -> u16 {
        self.samples_per_pixel
    }

    pub fn photometric(&self) -> PhotometricInterpretation {
        self.photometric
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_color(&self) -> bool {
        self.photometric == PhotometricInterpretation::Rgb
    }

    /// Monochrome1 images are displayed inverted
    pub fn inverts(&self) -> bool {
        self.photometric.inverts()
    }

    /// Saturates at `usize::MAX` for geometry no buffer could hold
    pub fn pixel_count(&self) -> usize {
        (self.width as usize).saturating_mul(self.height as usize)
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.samples_per_pixel as usize * self.bit_depth.bytes()
    }

    /// Minimum byte length for the declared geometry
    ///
    /// Saturates like `pixel_count`, so an absurd header reads as a short
    /// buffer.
    pub fn expected_len(&self) -> usize {
        self.pixel_count().saturating_mul(self.bytes_per_pixel())
    }

    /// Raw value domain implied by bit depth and signedness
    pub fn domain(&self) -> ValueDomain {
        ValueDomain::for_format(self.bit_depth, self.signed)
    }

    /// Check that the buffer can be rendered
    ///
    /// Order matters: empty input first, then the photometric
    /// interpretation, then channel/bit-depth consistency, then length.
    pub fn validate(&self) -> Result<(), RenderError> {
        if self.data.is_empty() || self.width == 0 || self.height == 0 {
            return Err(RenderError::EmptyInput);
        }

        if !self.photometric.is_supported() {
            return Err(RenderError::UnsupportedPhotometricInterpretation(self.photometric));
        }

        let expected_spp = if self.is_color() { 3 } else { 1 };
        if self.samples_per_pixel != expected_spp {
            return Err(RenderError::UnsupportedSamplesPerPixel(self.samples_per_pixel));
        }

        if self.is_color() && self.bit_depth != BitDepth::Eight {
            return Err(RenderError::UnsupportedBitDepth(self.bit_depth.bits()));
        }

        let expected = self.expected_len();
        if self.data.len() < expected {
            return Err(RenderError::SizeMismatch {
                expected,
                actual: self.data.len(),
            });
        }

        Ok(())
    }

    /// Raw monochrome value at pixel `index`
    ///
    /// Panics if `index` is outside a validated buffer.
    pub fn sample(&self, index: usize) -> i32 {
        match (self.bit_depth, self.signed) {
            (BitDepth::Eight, _) => self.data[index] as i32,
            (BitDepth::Sixteen, false) => {
                let at = index * 2;
                u16::from_le_bytes([self.data[at], self.data[at + 1]]) as i32
            }
            (BitDepth::Sixteen, true) => {
                let at = index * 2;
                i16::from_le_bytes([self.data[at], self.data[at + 1]]) as i32
            }
        }
    }

    /// Smallest and largest raw monochrome value, or None for empty/color data
    pub fn value_range(&self) -> Option<(i32, i32)> {
        if self.is_color() || self.validate().is_err() {
            return None;
        }

        (0..self.pixel_count())
            .map(|i| self.sample(i))
            .fold(None, |range, v| match range {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_photometric_parsing() {
        assert_eq!(
            PhotometricInterpretation::from_header(" monochrome1 \r\n"),
            PhotometricInterpretation::Monochrome1
        );
        assert_eq!(
            PhotometricInterpretation::from_header("MONOCHROME2"),
            PhotometricInterpretation::Monochrome2
        );
        assert_eq!(PhotometricInterpretation::from_header("RGB"), PhotometricInterpretation::Rgb);
        assert_eq!(
            PhotometricInterpretation::from_header("PALETTE COLOR"),
            PhotometricInterpretation::PaletteColor
        );
        assert_eq!(
            PhotometricInterpretation::from_header("YBR_FULL"),
            PhotometricInterpretation::Unknown
        );
        assert_eq!(PhotometricInterpretation::from_header("   "), PhotometricInterpretation::Unknown);
    }

    #[test]
    fn test_rejects_odd_samples_per_pixel() {
        let result = SampleBuffer::new(
            2,
            2,
            BitDepth::Eight,
            false,
            4,
            PhotometricInterpretation::Rgb,
            vec![0; 16],
        );
        assert_eq!(result, Err(RenderError::UnsupportedSamplesPerPixel(4)));
    }

    #[test]
    fn test_validate_order() {
        let empty = SampleBuffer::monochrome8(2, 2, PhotometricInterpretation::Unknown, vec![]);
        assert_eq!(empty.validate(), Err(RenderError::EmptyInput));

        let zero_width =
            SampleBuffer::monochrome8(0, 2, PhotometricInterpretation::Monochrome2, vec![1, 2]);
        assert_eq!(zero_width.validate(), Err(RenderError::EmptyInput));

        let unknown = SampleBuffer::monochrome8(2, 2, PhotometricInterpretation::Unknown, vec![1]);
        assert_eq!(
            unknown.validate(),
            Err(RenderError::UnsupportedPhotometricInterpretation(
                PhotometricInterpretation::Unknown
            ))
        );

        let short = SampleBuffer::monochrome8(2, 2, PhotometricInterpretation::Monochrome2, vec![1, 2, 3]);
        assert_eq!(short.validate(), Err(RenderError::SizeMismatch { expected: 4, actual: 3 }));
    }

    #[test]
    fn test_huge_header_geometry_is_size_mismatch() {
        let huge = SampleBuffer::monochrome16(u32::MAX, u32::MAX, PhotometricInterpretation::Monochrome2, &[0]);
        assert!(matches!(huge.validate(), Err(RenderError::SizeMismatch { actual: 2, .. })));
        assert!(huge.value_range().is_none());

        let rgb = SampleBuffer::rgb8(u32::MAX, u32::MAX, vec![0; 3]);
        assert!(matches!(rgb.validate(), Err(RenderError::SizeMismatch { actual: 3, .. })));
    }

    #[test]
    fn test_validate_color_consistency() {
        let mono_as_rgb = SampleBuffer::new(
            1,
            1,
            BitDepth::Eight,
            false,
            1,
            PhotometricInterpretation::Rgb,
            vec![1, 2, 3],
        )
        .unwrap();
        assert_eq!(mono_as_rgb.validate(), Err(RenderError::UnsupportedSamplesPerPixel(1)));

        let deep_rgb = SampleBuffer::new(
            1,
            1,
            BitDepth::Sixteen,
            false,
            3,
            PhotometricInterpretation::Rgb,
            vec![0; 6],
        )
        .unwrap();
        assert_eq!(deep_rgb.validate(), Err(RenderError::UnsupportedBitDepth(16)));
    }

    #[test]
    fn test_sample_reads_signed_little_endian() {
        let buffer = SampleBuffer::monochrome16_signed(
            2,
            2,
            PhotometricInterpretation::Monochrome2,
            &[-32768, 0, 32767, -1],
        );
        assert!(buffer.validate().is_ok());
        assert_eq!(buffer.sample(0), -32768);
        assert_eq!(buffer.sample(1), 0);
        assert_eq!(buffer.sample(2), 32767);
        assert_eq!(buffer.sample(3), -1);
        assert_eq!(buffer.value_range(), Some((-32768, 32767)));
    }

    #[test]
    fn test_sample_reads_unsigned_16() {
        let buffer = SampleBuffer::monochrome16(2, 1, PhotometricInterpretation::Monochrome2, &[0x1234, 65535]);
        assert_eq!(buffer.data(), &[0x34, 0x12, 0xFF, 0xFF]);
        assert_eq!(buffer.sample(0), 0x1234);
        assert_eq!(buffer.sample(1), 65535);
        assert_eq!(buffer.expected_len(), 4);
    }

    #[test]
    fn test_bits_stored_is_clamped() {
        let buffer = SampleBuffer::monochrome16(1, 1, PhotometricInterpretation::Monochrome2, &[0])
            .with_bits_stored(12);
        assert_eq!(buffer.bits_stored(), 12);

        let buffer = SampleBuffer::monochrome8(1, 1, PhotometricInterpretation::Monochrome2, vec![0])
            .with_bits_stored(12);
        assert_eq!(buffer.bits_stored(), 8);
    }
}
