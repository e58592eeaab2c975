/// Window/level (contrast/brightness) parameters
///
/// One `WindowLevel` exists per loaded image. It is a plain value: changing
/// it never invalidates GPU resources, it only changes the uniforms of the
/// next draw (or the cached raster on the CPU path).

use crate::sample::SampleBuffer;

/// Smallest width reachable by drag adjustment
pub const MIN_WINDOW_WIDTH: f64 = 1.0;

/// Drag sensitivity, in raw units per pixel of mouse movement
const SENSITIVITY_WIDTH: f64 = 1.0;
const SENSITIVITY_CENTER: f64 = 1.0;

/// Linear mapping from raw sample range to display intensity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowLevel {
    /// Raw value mapped to mid-gray
    pub center: f64,
    /// Raw range spread over 0..=255
    /// - `width <= 0` is degenerate: every output is 0
    pub width: f64,
}

impl Default for WindowLevel {
    fn default() -> Self {
        Self {
            center: 0.0,
            width: 1.0,
        }
    }
}

impl WindowLevel {
    pub fn new(center: f64, width: f64) -> Self {
        Self { center, width }
    }

    /// Window covering exactly `[lo, hi]`
    pub fn from_value_range(lo: i32, hi: i32) -> Self {
        let (lo, hi) = (lo.min(hi) as f64, lo.max(hi) as f64);
        Self {
            center: (lo + hi) / 2.0,
            width: (hi - lo).max(MIN_WINDOW_WIDTH),
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.width <= 0.0
    }

    pub fn lower(&self) -> f64 {
        self.center - self.width / 2.0
    }

    pub fn upper(&self) -> f64 {
        self.center + self.width / 2.0
    }

    /// Apply a mouse drag
    ///
    /// Horizontal movement widens the window (contrast), vertical movement
    /// moves the center (brightness, upward drag brightens).
    pub fn adjust_by_drag(&mut self, dx: f64, dy: f64) {
        self.width = (self.width + dx * SENSITIVITY_WIDTH).max(MIN_WINDOW_WIDTH);
        self.center -= dy * SENSITIVITY_CENTER;
    }
}

/// Bounds for center/width controls, derived from the stored bit depth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowLevelRange {
    pub center_min: i32,
    pub center_max: i32,
    pub width_min: i32,
    pub width_max: i32,
}

impl WindowLevelRange {
    /// None for color images, which have no window
    pub fn for_buffer(buffer: &SampleBuffer) -> Option<Self> {
        if !buffer.photometric().is_monochrome() {
            return None;
        }

        let bits_stored = i64::from(buffer.bits_stored().clamp(1, 16));
        let max_pixel_value = (1i64 << bits_stored) - 1;

        let (center_min, center_max) = if buffer.is_signed() {
            (-(1i64 << (bits_stored - 1)), (1i64 << (bits_stored - 1)) - 1)
        } else {
            (0, max_pixel_value)
        };

        Some(Self {
            center_min: center_min as i32,
            center_max: center_max as i32,
            width_min: MIN_WINDOW_WIDTH as i32,
            width_max: (max_pixel_value + 1) as i32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::PhotometricInterpretation;

    #[test]
    fn test_default_matches_header_default() {
        let window = WindowLevel::default();
        assert_eq!(window.center, 0.0);
        assert_eq!(window.width, 1.0);
        assert!(!window.is_degenerate());
        assert!(WindowLevel::new(10.0, 0.0).is_degenerate());
        assert!(WindowLevel::new(10.0, -5.0).is_degenerate());
    }

    #[test]
    fn test_bounds() {
        let window = WindowLevel::new(40.0, 400.0);
        assert_eq!(window.lower(), -160.0);
        assert_eq!(window.upper(), 240.0);
    }

    #[test]
    fn test_drag_adjustment() {
        let mut window = WindowLevel::new(100.0, 50.0);
        window.adjust_by_drag(10.0, 5.0);
        assert_eq!(window, WindowLevel::new(95.0, 60.0));

        // Width never drops below the minimum
        window.adjust_by_drag(-1000.0, -20.0);
        assert_eq!(window, WindowLevel::new(115.0, MIN_WINDOW_WIDTH));
    }

    #[test]
    fn test_value_range_window() {
        assert_eq!(WindowLevel::from_value_range(0, 255), WindowLevel::new(127.5, 255.0));
        assert_eq!(WindowLevel::from_value_range(7, 7), WindowLevel::new(7.0, 1.0));
        assert_eq!(WindowLevel::from_value_range(20, 10), WindowLevel::new(15.0, 10.0));
    }

    #[test]
    fn test_range_for_unsigned_12_bit() {
        let buffer = SampleBuffer::monochrome16(1, 1, PhotometricInterpretation::Monochrome2, &[0])
            .with_bits_stored(12);
        let range = WindowLevelRange::for_buffer(&buffer).unwrap();
        assert_eq!(
            range,
            WindowLevelRange {
                center_min: 0,
                center_max: 4095,
                width_min: 1,
                width_max: 4096,
            }
        );
    }

    #[test]
    fn test_range_for_signed_16_bit() {
        let buffer =
            SampleBuffer::monochrome16_signed(1, 1, PhotometricInterpretation::Monochrome1, &[0]);
        let range = WindowLevelRange::for_buffer(&buffer).unwrap();
        assert_eq!(range.center_min, -32768);
        assert_eq!(range.center_max, 32767);
        assert_eq!(range.width_max, 65536);
    }

    #[test]
    fn test_no_range_for_color() {
        let buffer = SampleBuffer::rgb8(1, 1, vec![1, 2, 3]);
        assert!(WindowLevelRange::for_buffer(&buffer).is_none());
    }
}
