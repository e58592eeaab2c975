/// GPU-side data layouts
///
/// Both structs must match the WGSL declarations in `shaders.rs` byte for
/// byte.

use iced_wgpu::wgpu;

use crate::transform::WindowLevelTransform;

/// Per-draw parameters (`DisplayParams` in WGSL, 96 bytes)
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct GpuDisplayParams {
    pub mvp: [[f32; 4]; 4],
    pub lower: f32,
    pub upper: f32,
    pub scale: f32,
    pub value_min: f32,
    pub degenerate: u32,
    pub is_color: u32,
    pub use_palette: u32,
    pub invert: u32,
}

impl GpuDisplayParams {
    pub fn monochrome(
        mvp: [[f32; 4]; 4],
        transform: &WindowLevelTransform,
        value_min: f32,
        use_palette: bool,
    ) -> Self {
        Self {
            mvp,
            lower: transform.lower(),
            upper: transform.upper(),
            scale: transform.scale(),
            value_min,
            degenerate: transform.is_degenerate() as u32,
            is_color: 0,
            use_palette: use_palette as u32,
            invert: transform.inverts() as u32,
        }
    }

    pub fn color(mvp: [[f32; 4]; 4]) -> Self {
        Self {
            mvp,
            lower: 0.0,
            upper: 0.0,
            scale: 0.0,
            value_min: 0.0,
            degenerate: 0,
            is_color: 1,
            use_palette: 0,
            invert: 0,
        }
    }
}

/// One corner of the image quad
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct QuadVertex {
    /// Image pixel coordinates
    pub position: [f32; 2],
    pub uv: [f32; 2],
}

impl QuadVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] = [
        wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x2,
            offset: 0,
            shader_location: 0,
        },
        wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x2,
            offset: 8,
            shader_location: 1,
        },
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }

    /// Triangle strip covering `width` x `height` image pixels
    pub fn quad(width: u32, height: u32) -> [QuadVertex; 4] {
        let (w, h) = (width as f32, height as f32);
        [
            QuadVertex { position: [0.0, 0.0], uv: [0.0, 0.0] },
            QuadVertex { position: [w, 0.0], uv: [1.0, 0.0] },
            QuadVertex { position: [0.0, h], uv: [0.0, 1.0] },
            QuadVertex { position: [w, h], uv: [1.0, 1.0] },
        ]
    }
}
