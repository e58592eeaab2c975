/// Display raster produced by either compositor
///
/// Row-major, no row padding, `width * height * channels` bytes.

use image::{DynamicImage, GrayImage, RgbImage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelLayout {
    /// One intensity byte per pixel
    Gray8,
    /// Interleaved R, G, B bytes
    Rgb8,
}

impl PixelLayout {
    pub fn channels(self) -> usize {
        match self {
            PixelLayout::Gray8 => 1,
            PixelLayout::Rgb8 => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    pub data: Vec<u8>,
}

impl RasterImage {
    pub fn new(width: u32, height: u32, layout: PixelLayout, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize * layout.channels());
        Self {
            width,
            height,
            layout,
            data,
        }
    }

    /// All-black raster
    pub fn black(width: u32, height: u32, layout: PixelLayout) -> Self {
        let len = width as usize * height as usize * layout.channels();
        Self::new(width, height, layout, vec![0; len])
    }

    pub fn channels(&self) -> usize {
        self.layout.channels()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Bytes of pixel `(x, y)`
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let channels = self.channels();
        let at = (y as usize * self.width as usize + x as usize) * channels;
        &self.data[at..at + channels]
    }

    /// Largest per-channel difference, or None if geometry or layout differ
    pub fn max_channel_diff(&self, other: &RasterImage) -> Option<u8> {
        if self.dimensions() != other.dimensions() || self.layout != other.layout {
            return None;
        }

        Some(
            self.data
                .iter()
                .zip(&other.data)
                .map(|(a, b)| a.abs_diff(*b))
                .max()
                .unwrap_or(0),
        )
    }

    /// Hand the raster to `image` for resampling or encoding
    pub fn to_dynamic_image(&self) -> Option<DynamicImage> {
        match self.layout {
            PixelLayout::Gray8 => GrayImage::from_raw(self.width, self.height, self.data.clone())
                .map(DynamicImage::ImageLuma8),
            PixelLayout::Rgb8 => RgbImage::from_raw(self.width, self.height, self.data.clone())
                .map(DynamicImage::ImageRgb8),
        }
    }

    /// Convert back from `image`, forcing the given layout
    pub fn from_dynamic_image(image: &DynamicImage, layout: PixelLayout) -> Self {
        let (width, height) = (image.width(), image.height());
        let data = match layout {
            PixelLayout::Gray8 => image.to_luma8().into_raw(),
            PixelLayout::Rgb8 => image.to_rgb8().into_raw(),
        };
        Self::new(width, height, layout, data)
    }
}
