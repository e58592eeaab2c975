//! Window/level and palette display pipeline for medical images
//!
//! A decoded sample buffer is turned into a viewable raster under a
//! user-controlled window (contrast/brightness) and one of eight palettes.
//! The mapping runs either on the CPU through lookup tables or on the GPU in
//! a fragment shader; both paths agree within one intensity unit.
//!
//! Layout:
//! - `sample` - sample buffers and the decoder hand-off
//! - `transform` / `palette` - the pure mapping building blocks
//! - `cpu` / `gpu` - the two compositors
//! - `state` - window/level, view transform, resource dirty flags
//! - `viewer` - backend selection and the downstream API
//! - `config` / `error` - configuration and error types

pub mod config;
pub mod cpu;
pub mod error;
pub mod gpu;
pub mod palette;
pub mod sample;
pub mod state;
pub mod transform;
pub mod viewer;

pub use config::RendererConfig;
pub use cpu::{PixelLayout, RasterCompositor, RasterImage};
pub use error::{ConfigError, RenderError};
pub use gpu::GpuCompositor;
pub use palette::{PaletteTable, PaletteType};
pub use sample::{BitDepth, DecodedImage, PhotometricInterpretation, SampleBuffer};
pub use state::{ResourceState, ViewTransform, WindowLevel, WindowLevelRange};
pub use transform::{ValueDomain, WindowLevelTable, WindowLevelTransform};
pub use viewer::{Backend, Frame, FrameTarget, Viewer};
