/// Software rendering path
///
/// - `compositor.rs` - window/level + palette mapping into a raster
/// - `raster.rs` - the output raster shared with the GPU readback path

pub mod compositor;
pub mod raster;

pub use compositor::RasterCompositor;
pub use raster::{PixelLayout, RasterImage};
