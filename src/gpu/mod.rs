/// GPU display path
///
/// Uploads the sample buffer and palette as textures and evaluates the
/// window/level mapping per pixel at draw time.
///
/// Architecture:
/// - `shaders.rs` - WGSL shader source code
/// - `uniforms.rs` - uniform and vertex layouts shared with the shader
/// - `scope.rs` - error-scope guard around every GPU operation
/// - `pipeline.rs` - wgpu resources, draws and readback

pub mod pipeline;
pub mod scope;
pub mod shaders;
mod uniforms;

pub use iced_wgpu::wgpu;
pub use pipeline::{GpuCompositor, OFFSCREEN_FORMAT};
pub use scope::GpuScope;
