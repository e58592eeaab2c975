/// Software rendering path
///
/// Builds the window/level table once per call, maps every pixel through it
/// and, for non-grayscale palettes, through the palette table. Either the
/// whole raster is produced or an error is returned; there is no partial
/// output.

use image::{imageops, imageops::FilterType, DynamicImage};
use tracing::debug;

use super::raster::{PixelLayout, RasterImage};
use crate::error::RenderError;
use crate::palette::{PaletteTable, PaletteType};
use crate::sample::SampleBuffer;
use crate::state::window::WindowLevel;
use crate::transform::WindowLevelTransform;

#[derive(Debug, Clone, Copy, Default)]
pub struct RasterCompositor;

impl RasterCompositor {
    pub fn new() -> Self {
        Self
    }

    /// Render the display raster at native resolution
    ///
    /// Color buffers are copied through; `window` and `palette` only apply
    /// to monochrome buffers.
    pub fn render(
        &self,
        buffer: &SampleBuffer,
        window: &WindowLevel,
        palette: PaletteType,
    ) -> Result<RasterImage, RenderError> {
        buffer.validate()?;

        let (width, height) = buffer.dimensions();
        let raster = if buffer.is_color() {
            let data = buffer.data()[..buffer.expected_len()].to_vec();
            RasterImage::new(width, height, PixelLayout::Rgb8, data)
        } else {
            let transform = WindowLevelTransform::new(window, buffer.domain(), buffer.inverts());
            let table = transform.build_table();
            let levels = (0..buffer.pixel_count()).map(|i| table.get(buffer.sample(i)));

            if palette == PaletteType::Grayscale {
                RasterImage::new(width, height, PixelLayout::Gray8, levels.collect())
            } else {
                let lut = PaletteTable::for_type(palette);
                let data = levels.flat_map(|level| lut.map(level)).collect();
                RasterImage::new(width, height, PixelLayout::Rgb8, data)
            }
        };

        debug!(
            "CPU render {}x{} ({:?}, palette {})",
            width, height, raster.layout, palette
        );

        Ok(raster)
    }

    /// Render a `size` thumbnail
    ///
    /// The image is rotated clockwise by `rotation` degrees, scaled to fit
    /// with its aspect ratio kept, and centered on a black canvas.
    pub fn render_thumbnail(
        &self,
        buffer: &SampleBuffer,
        window: &WindowLevel,
        palette: PaletteType,
        size: (u32, u32),
        rotation: u16,
        filter: FilterType,
    ) -> Result<RasterImage, RenderError> {
        if size.0 == 0 || size.1 == 0 {
            return Err(RenderError::EmptyInput);
        }

        let raster = self.render(buffer, window, palette)?;
        let layout = raster.layout;
        let image = raster
            .to_dynamic_image()
            .ok_or(RenderError::SizeMismatch {
                expected: raster.width as usize * raster.height as usize * raster.channels(),
                actual: raster.data.len(),
            })?;

        let rotated = match rotation % 360 {
            90 => image.rotate90(),
            180 => image.rotate180(),
            270 => image.rotate270(),
            _ => image,
        };

        // `resize` keeps the aspect ratio and fits inside the bounds
        let scaled = rotated.resize(size.0, size.1, filter);

        let mut canvas = match layout {
            PixelLayout::Gray8 => DynamicImage::new_luma8(size.0, size.1),
            PixelLayout::Rgb8 => DynamicImage::new_rgb8(size.0, size.1),
        };
        let x = (size.0 - scaled.width().min(size.0)) / 2;
        let y = (size.1 - scaled.height().min(size.1)) / 2;
        imageops::replace(&mut canvas, &scaled, x as i64, y as i64);

        Ok(RasterImage::from_dynamic_image(&canvas, layout))
    }
}
