/// wgpu display pipeline
///
/// This module manages all the wgpu boilerplate:
/// - Device and queue initialization (or adoption of a host device)
/// - Sample and palette texture uploads, driven by `ResourceState`
/// - Quad geometry and the per-draw uniform buffers
/// - One render pipeline per target format
/// - Draws into a host view or an offscreen texture with readback
///
/// Window/level and view changes only touch the uniform buffers. Everything
/// else is rebuilt lazily right before a draw, inside a `GpuScope`.
///
/// Host frames and offscreen captures write separate uniform buffers. A
/// capture is submitted right away while a host frame may still sit in the
/// host's encoder.

use std::collections::HashMap;
use std::sync::Arc;

// Use wgpu from iced so hosts built on iced share one wgpu version
use iced_wgpu::wgpu;
use tracing::{debug, error, info};
use wgpu::util::DeviceExt;

use super::scope::GpuScope;
use super::uniforms::{GpuDisplayParams, QuadVertex};
use crate::cpu::raster::{PixelLayout, RasterImage};
use crate::error::RenderError;
use crate::palette::{PaletteTable, PaletteType};
use crate::sample::{BitDepth, SampleBuffer};
use crate::state::resources::ResourceState;
use crate::state::view::ViewTransform;
use crate::state::window::WindowLevel;
use crate::transform::WindowLevelTransform;

/// Format of offscreen renders and of the pipeline built at startup
pub const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Texel encoding of a sample buffer
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TexelUpload {
    pub format: wgpu::TextureFormat,
    pub bytes_per_texel: u32,
    /// Raw value of code 0
    pub value_min: f32,
    pub bytes: Vec<u8>,
}

impl TexelUpload {
    /// Encode a validated buffer for an unsigned integer texture
    ///
    /// Signed 16-bit samples are shifted by 32768 since there is no
    /// normalized signed 16-bit format to lean on; the shader adds the
    /// domain minimum back.
    pub fn encode(buffer: &SampleBuffer) -> Self {
        let len = buffer.expected_len();
        let data = &buffer.data()[..len];

        if buffer.is_color() {
            let bytes = data
                .chunks_exact(3)
                .flat_map(|rgb| [rgb[0], rgb[1], rgb[2], 255])
                .collect();
            return Self {
                format: wgpu::TextureFormat::Rgba8Uint,
                bytes_per_texel: 4,
                value_min: 0.0,
                bytes,
            };
        }

        match (buffer.bit_depth(), buffer.is_signed()) {
            (BitDepth::Eight, _) => Self {
                format: wgpu::TextureFormat::R8Uint,
                bytes_per_texel: 1,
                value_min: 0.0,
                bytes: data.to_vec(),
            },
            (BitDepth::Sixteen, signed) => {
                let codes: Vec<u16> = data
                    .chunks_exact(2)
                    .map(|pair| {
                        if signed {
                            (i16::from_le_bytes([pair[0], pair[1]]) as i32 + 32768) as u16
                        } else {
                            u16::from_le_bytes([pair[0], pair[1]])
                        }
                    })
                    .collect();
                Self {
                    format: wgpu::TextureFormat::R16Uint,
                    bytes_per_texel: 2,
                    value_min: buffer.domain().min as f32,
                    bytes: bytemuck::cast_slice(&codes).to_vec(),
                }
            }
        }
    }
}

/// Which uniform buffer a draw writes its parameters into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrawSlot {
    /// Recorded into a host encoder, submitted by the host
    Target,
    /// Offscreen capture, submitted right away
    Capture,
}

/// Sample texture plus one bind group per draw slot
struct ImageTexture {
    _texture: wgpu::Texture,
    target_bind_group: wgpu::BindGroup,
    capture_bind_group: wgpu::BindGroup,
    value_min: f32,
    is_color: bool,
}

impl ImageTexture {
    fn bind_group(&self, slot: DrawSlot) -> &wgpu::BindGroup {
        match slot {
            DrawSlot::Target => &self.target_bind_group,
            DrawSlot::Capture => &self.capture_bind_group,
        }
    }
}

/// GPU compositor for one displayed image
pub struct GpuCompositor {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    shader: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: HashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,
    uniform_buffer: wgpu::Buffer,
    capture_uniform_buffer: wgpu::Buffer,
    palette_texture: wgpu::Texture,
    palette_view: wgpu::TextureView,
    image: Option<Arc<SampleBuffer>>,
    image_texture: Option<ImageTexture>,
    vertex_buffer: Option<wgpu::Buffer>,
    palette: PaletteType,
    resources: ResourceState,
}

// Manual Debug implementation (wgpu types don't implement Debug)
impl std::fmt::Debug for GpuCompositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuCompositor")
            .field("image", &self.image.as_ref().map(|image| image.dimensions()))
            .field("palette", &self.palette)
            .field("resources", &self.resources)
            .field("pipelines", &self.pipelines.len())
            .finish_non_exhaustive()
    }
}

impl GpuCompositor {
    /// Request an adapter and device of our own
    pub async fn new(power_preference: wgpu::PowerPreference) -> Result<Self, RenderError> {
        Self::request(power_preference, false).await
    }

    /// Like `new`, but on the software fallback adapter (headless machines)
    pub async fn new_software() -> Result<Self, RenderError> {
        Self::request(wgpu::PowerPreference::LowPower, true).await
    }

    async fn request(
        power_preference: wgpu::PowerPreference,
        force_fallback_adapter: bool,
    ) -> Result<Self, RenderError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: None,
                force_fallback_adapter,
            })
            .await
            .ok_or_else(|| RenderError::AdapterUnavailable("no suitable GPU adapter".into()))?;

        let adapter_info = adapter.get_info();
        info!("Using GPU adapter {} ({:?})", adapter_info.name, adapter_info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Display Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults()
                        .using_resolution(adapter.limits()),
                },
                None,
            )
            .await
            .map_err(|e| RenderError::AdapterUnavailable(format!("failed to create device: {e}")))?;

        // Anything that escapes a scope is logged instead of aborting
        device.on_uncaptured_error(Box::new(|err: wgpu::Error| {
            error!("Uncaptured GPU error: {}", err);
        }));

        Self::with_device(Arc::new(device), Arc::new(queue))
    }

    /// Build on a device owned by the host (e.g. the iced renderer)
    ///
    /// Shader compilation and pipeline creation happen here; any failure is
    /// reported as `ShaderCompileFailure`.
    pub fn with_device(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Result<Self, RenderError> {
        let scope = GpuScope::push(&device, "display pipeline");

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Display Shader"),
            source: wgpu::ShaderSource::Wgsl(super::shaders::get_shader().into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Display Bind Group Layout"),
            entries: &[
                // Sample codes (integer texture, loaded not sampled)
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Uint,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // Palette lookup
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // Display params
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Display Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let offscreen_pipeline =
            create_render_pipeline(&device, &pipeline_layout, &shader, OFFSCREEN_FORMAT);

        scope.check(RenderError::ShaderCompileFailure)?;

        let scope = GpuScope::push(&device, "persistent buffers");

        let uniform_buffer = create_uniform_buffer(&device, "Display Params Uniform Buffer");
        let capture_uniform_buffer = create_uniform_buffer(&device, "Capture Params Uniform Buffer");

        let palette_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Palette Texture"),
            size: wgpu::Extent3d {
                width: 256,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let palette_view = palette_texture.create_view(&wgpu::TextureViewDescriptor::default());

        scope.check(RenderError::ResourceAllocationFailure)?;

        let mut pipelines = HashMap::new();
        pipelines.insert(OFFSCREEN_FORMAT, offscreen_pipeline);

        debug!("GPU display pipeline ready");

        Ok(Self {
            device,
            queue,
            shader,
            bind_group_layout,
            pipeline_layout,
            pipelines,
            uniform_buffer,
            capture_uniform_buffer,
            palette_texture,
            palette_view,
            image: None,
            image_texture: None,
            vertex_buffer: None,
            palette: PaletteType::Grayscale,
            resources: ResourceState::new(),
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn resources(&self) -> ResourceState {
        self.resources
    }

    pub fn palette(&self) -> PaletteType {
        self.palette
    }

    // ========== State changes ==========

    /// Assign a new image; everything is rebuilt before the next draw
    pub fn set_image(&mut self, image: Arc<SampleBuffer>) {
        self.image = Some(image);
        self.resources.image_assigned();
    }

    /// Drop the image and its texture
    pub fn clear_image(&mut self) {
        self.image = None;
        self.image_texture = None;
        self.vertex_buffer = None;
        self.resources.image_cleared();
    }

    pub fn set_palette(&mut self, palette: PaletteType) {
        if self.palette != palette {
            self.palette = palette;
            self.resources.palette_changed();
        }
    }

    // ========== Lazy rebuilds ==========

    /// Rebuild whatever is stale
    ///
    /// A failed step leaves its flag set and keeps the previous resource, so
    /// the next draw tries again.
    pub fn ensure_resources(&mut self) -> Result<(), RenderError> {
        let Some(image) = self.image.clone() else {
            return Ok(());
        };
        image.validate()?;

        if self.resources.texture_dirty() {
            let texture = self.upload_texture(&image)?;
            self.image_texture = Some(texture);
            self.resources.texture_uploaded();
        }

        if self.resources.palette_dirty() {
            self.upload_palette()?;
            self.resources.palette_uploaded();
        }

        if self.resources.geometry_dirty() {
            let vertex_buffer = self.build_quad(image.width(), image.height())?;
            self.vertex_buffer = Some(vertex_buffer);
            self.resources.geometry_rebuilt();
        }

        Ok(())
    }

    fn upload_texture(&self, image: &SampleBuffer) -> Result<ImageTexture, RenderError> {
        let upload = TexelUpload::encode(image);
        let size = wgpu::Extent3d {
            width: image.width(),
            height: image.height(),
            depth_or_array_layers: 1,
        };

        let scope = GpuScope::push(&self.device, "sample texture upload");

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Sample Texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: upload.format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &upload.bytes,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(upload.bytes_per_texel * image.width()),
                rows_per_image: Some(image.height()),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let target_bind_group = self.create_bind_group(&view, DrawSlot::Target);
        let capture_bind_group = self.create_bind_group(&view, DrawSlot::Capture);

        scope.check(RenderError::ResourceAllocationFailure)?;

        debug!(
            "Uploaded {} bytes as {:?} ({}x{})",
            upload.bytes.len(),
            upload.format,
            image.width(),
            image.height()
        );

        Ok(ImageTexture {
            _texture: texture,
            target_bind_group,
            capture_bind_group,
            value_min: upload.value_min,
            is_color: image.is_color(),
        })
    }

    fn uniform_buffer(&self, slot: DrawSlot) -> &wgpu::Buffer {
        match slot {
            DrawSlot::Target => &self.uniform_buffer,
            DrawSlot::Capture => &self.capture_uniform_buffer,
        }
    }

    fn create_bind_group(&self, sample_view: &wgpu::TextureView, slot: DrawSlot) -> wgpu::BindGroup {
        let label = match slot {
            DrawSlot::Target => "Display Bind Group",
            DrawSlot::Capture => "Capture Bind Group",
        };
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(sample_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&self.palette_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.uniform_buffer(slot).as_entire_binding(),
                },
            ],
        })
    }

    /// Grayscale never reads the lookup texture, so it is left as is
    fn upload_palette(&self) -> Result<(), RenderError> {
        if self.palette == PaletteType::Grayscale {
            return Ok(());
        }

        let scope = GpuScope::push(&self.device, "palette upload");
        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.palette_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &PaletteTable::for_type(self.palette).to_rgba_bytes(),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(256 * 4),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d {
                width: 256,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        scope.check(RenderError::ResourceAllocationFailure)?;

        debug!("Uploaded {} palette", self.palette);
        Ok(())
    }

    fn build_quad(&self, width: u32, height: u32) -> Result<wgpu::Buffer, RenderError> {
        let scope = GpuScope::push(&self.device, "quad geometry");
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Image Quad Vertex Buffer"),
            contents: bytemuck::cast_slice(&QuadVertex::quad(width, height)),
            usage: wgpu::BufferUsages::VERTEX,
        });
        scope.check(RenderError::ResourceAllocationFailure)?;
        Ok(buffer)
    }

    /// Render pipeline for `format`, created on first use
    fn ensure_pipeline(&mut self, format: wgpu::TextureFormat) -> Result<(), RenderError> {
        if self.pipelines.contains_key(&format) {
            return Ok(());
        }

        let scope = GpuScope::push(&self.device, "render pipeline");
        let pipeline = create_render_pipeline(&self.device, &self.pipeline_layout, &self.shader, format);
        scope.check(RenderError::ShaderCompileFailure)?;

        debug!("Created render pipeline for {:?}", format);
        self.pipelines.insert(format, pipeline);
        Ok(())
    }

    // ========== Drawing ==========

    /// Draw the current image into a host-provided view
    ///
    /// The target is cleared to black first. Returns `Ok(false)` when there
    /// is no image to draw.
    pub fn render_to_target(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        format: wgpu::TextureFormat,
        viewport: (u32, u32),
        view: &ViewTransform,
        window: &WindowLevel,
    ) -> Result<bool, RenderError> {
        self.ensure_resources()?;
        self.ensure_pipeline(format)?;
        self.encode_draw(encoder, target, format, viewport, view, window, DrawSlot::Target)
    }

    /// Draw offscreen and read the pixels back
    ///
    /// The image is fitted into `size`, rotated by `rotation`, and centered
    /// on black. The raster is 3-channel for color images and palettes,
    /// 1-channel otherwise.
    pub fn render_to_buffer(
        &mut self,
        size: (u32, u32),
        rotation: u16,
        window: &WindowLevel,
    ) -> Result<RasterImage, RenderError> {
        let (width, height) = size;
        if width == 0 || height == 0 {
            return Err(RenderError::EmptyInput);
        }

        self.ensure_resources()?;
        let Some(image) = self.image.clone() else {
            return Err(RenderError::EmptyInput);
        };

        let layout = if image.is_color() || self.palette != PaletteType::Grayscale {
            PixelLayout::Rgb8
        } else {
            PixelLayout::Gray8
        };

        let scope = GpuScope::push(&self.device, "offscreen target");
        let output_texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Offscreen Output Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: OFFSCREEN_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        scope.check(RenderError::ResourceAllocationFailure)?;

        let output_view = output_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Offscreen Render Encoder"),
        });

        let view = ViewTransform {
            rotation,
            ..Default::default()
        };

        let scope = GpuScope::push(&self.device, "offscreen draw");
        self.encode_draw(
            &mut encoder,
            &output_view,
            OFFSCREEN_FORMAT,
            size,
            &view,
            window,
            DrawSlot::Capture,
        )?;
        self.queue.submit(Some(encoder.finish()));
        scope.check(RenderError::ResourceAllocationFailure)?;

        self.read_texture(&output_texture, size, layout)
    }

    /// Copy an `OFFSCREEN_FORMAT` texture back into a raster
    ///
    /// Work already submitted to the queue lands before the copy. Sizes are
    /// computed in u64, so an oversized texture is reported instead of
    /// overflowing.
    fn read_texture(
        &self,
        texture: &wgpu::Texture,
        size: (u32, u32),
        layout: PixelLayout,
    ) -> Result<RasterImage, RenderError> {
        let (width, height) = size;
        let bytes_per_row = u64::from(width) * 4;
        let padded_bytes_per_row = (bytes_per_row + 255) & !255;
        let padded_row = u32::try_from(padded_bytes_per_row).map_err(|_| {
            RenderError::ResourceAllocationFailure(format!("readback row of {width} pixels is too wide"))
        })?;

        let scope = GpuScope::push(&self.device, "readback buffer");
        let output_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Offscreen Readback Buffer"),
            size: padded_bytes_per_row * u64::from(height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Readback Encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &output_buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));
        scope.check(RenderError::ResourceAllocationFailure)?;

        let buffer_slice = output_buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);

        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                return Err(RenderError::ResourceAllocationFailure(format!(
                    "readback mapping failed: {err}"
                )))
            }
            Err(_) => {
                return Err(RenderError::ResourceAllocationFailure(
                    "readback callback dropped".into(),
                ))
            }
        }

        let data = buffer_slice.get_mapped_range();
        let channels = layout.channels();
        let row_len = bytes_per_row as usize;
        let mut output = Vec::with_capacity(row_len / 4 * height as usize * channels);
        for row in data.chunks_exact(padded_row as usize).take(height as usize) {
            for rgba in row[..row_len].chunks_exact(4) {
                output.extend_from_slice(&rgba[..channels]);
            }
        }

        drop(data);
        output_buffer.unmap();

        Ok(RasterImage::new(width, height, layout, output))
    }

    /// Record the draw; resources and pipeline must already be in place
    fn encode_draw(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        format: wgpu::TextureFormat,
        viewport: (u32, u32),
        view: &ViewTransform,
        window: &WindowLevel,
        slot: DrawSlot,
    ) -> Result<bool, RenderError> {
        let drawable = match (&self.image, &self.image_texture, &self.vertex_buffer) {
            (Some(image), Some(texture), Some(vertices)) => Some((image, texture, vertices)),
            _ => None,
        };

        if let Some((image, texture, _)) = drawable {
            let mvp = view.mvp(viewport, image.dimensions());
            let params = if texture.is_color {
                GpuDisplayParams::color(mvp)
            } else {
                let transform = WindowLevelTransform::new(window, image.domain(), image.inverts());
                GpuDisplayParams::monochrome(
                    mvp,
                    &transform,
                    texture.value_min,
                    self.palette != PaletteType::Grayscale,
                )
            };
            self.queue
                .write_buffer(self.uniform_buffer(slot), 0, bytemuck::cast_slice(&[params]));
        }

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Display Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let Some((_, texture, vertices)) = drawable else {
            return Ok(false);
        };

        let pipeline = self.pipelines.get(&format).ok_or_else(|| {
            RenderError::ShaderCompileFailure(format!("no render pipeline for {format:?}"))
        })?;

        render_pass.set_viewport(0.0, 0.0, viewport.0 as f32, viewport.1 as f32, 0.0, 1.0);
        render_pass.set_pipeline(pipeline);
        render_pass.set_bind_group(0, texture.bind_group(slot), &[]);
        render_pass.set_vertex_buffer(0, vertices.slice(..));
        render_pass.draw(0..4, 0..1);

        Ok(true)
    }
}

fn create_uniform_buffer(device: &wgpu::Device, label: &str) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(&[GpuDisplayParams::color([[0.0; 4]; 4])]),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

fn create_render_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Display Render Pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: "vs_main",
            buffers: &[QuadVertex::layout()],
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleStrip,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None, // Rotation and flips change the winding
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::RasterCompositor;
    use crate::sample::PhotometricInterpretation;

    /// Hardware adapter, else the software one; skip if neither exists
    fn compositor() -> Option<GpuCompositor> {
        let hardware = pollster::block_on(GpuCompositor::new(wgpu::PowerPreference::LowPower));
        match hardware.or_else(|_| pollster::block_on(GpuCompositor::new_software())) {
            Ok(compositor) => Some(compositor),
            Err(err) => {
                eprintln!("skipping GPU test: {err}");
                None
            }
        }
    }

    fn host_target(gpu: &GpuCompositor, size: (u32, u32), format: wgpu::TextureFormat) -> wgpu::Texture {
        gpu.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("Test Host Target"),
            size: wgpu::Extent3d {
                width: size.0,
                height: size.1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        })
    }

    fn assert_cross_path(buffer: SampleBuffer, window: WindowLevel, palette: PaletteType) {
        let Some(mut gpu) = compositor() else {
            return;
        };

        let cpu = RasterCompositor::new().render(&buffer, &window, palette).unwrap();
        let size = buffer.dimensions();
        gpu.set_image(Arc::new(buffer));
        gpu.set_palette(palette);
        let rendered = gpu.render_to_buffer(size, 0, &window).unwrap();

        let diff = cpu.max_channel_diff(&rendered);
        assert!(matches!(diff, Some(d) if d <= 1), "max diff {diff:?}");
    }

    #[test]
    fn test_texel_encoding() {
        let signed = SampleBuffer::monochrome16_signed(
            2,
            1,
            PhotometricInterpretation::Monochrome2,
            &[-32768, 32767],
        );
        let upload = TexelUpload::encode(&signed);
        assert_eq!(upload.format, wgpu::TextureFormat::R16Uint);
        assert_eq!(upload.value_min, -32768.0);
        let codes: &[u16] = bytemuck::cast_slice(&upload.bytes);
        assert_eq!(codes, &[0, 65535]);

        let unsigned = SampleBuffer::monochrome16(1, 1, PhotometricInterpretation::Monochrome2, &[513]);
        let upload = TexelUpload::encode(&unsigned);
        assert_eq!(upload.value_min, 0.0);
        assert_eq!(bytemuck::cast_slice::<u8, u16>(&upload.bytes), &[513]);

        let rgb = SampleBuffer::rgb8(2, 1, vec![1, 2, 3, 4, 5, 6, 99]);
        let upload = TexelUpload::encode(&rgb);
        assert_eq!(upload.format, wgpu::TextureFormat::Rgba8Uint);
        assert_eq!(upload.bytes, vec![1, 2, 3, 255, 4, 5, 6, 255]);

        let gray = SampleBuffer::monochrome8(3, 1, PhotometricInterpretation::Monochrome1, vec![7, 8, 9]);
        let upload = TexelUpload::encode(&gray);
        assert_eq!(upload.format, wgpu::TextureFormat::R8Uint);
        assert_eq!(upload.bytes_per_texel, 1);
        assert_eq!(upload.bytes, vec![7, 8, 9]);
    }

    #[test]
    fn test_gpu_uniform_mid_gray() {
        let buffer = SampleBuffer::monochrome8(
            256,
            256,
            PhotometricInterpretation::Monochrome2,
            vec![128; 256 * 256],
        );
        assert_cross_path(buffer, WindowLevel::new(128.0, 256.0), PaletteType::Grayscale);
    }

    #[test]
    fn test_gpu_zero_width() {
        for photometric in [PhotometricInterpretation::Monochrome2, PhotometricInterpretation::Monochrome1] {
            let buffer = SampleBuffer::monochrome8(16, 16, photometric, vec![128; 256]);
            assert_cross_path(buffer, WindowLevel::new(128.0, 0.0), PaletteType::Grayscale);
        }
    }

    #[test]
    fn test_gpu_signed_16_bit() {
        let buffer = SampleBuffer::monochrome16_signed(
            2,
            2,
            PhotometricInterpretation::Monochrome2,
            &[-32768, 0, 32767, -1],
        );
        assert_cross_path(buffer, WindowLevel::new(0.0, 65536.0), PaletteType::Grayscale);
    }

    #[test]
    fn test_gpu_rgb_passthrough() {
        let buffer = SampleBuffer::rgb8(4, 4, (0..48).map(|v| v * 5).collect());
        assert_cross_path(buffer, WindowLevel::default(), PaletteType::Hot);
    }

    #[test]
    fn test_gpu_palettes_and_ramp() {
        let ramp: Vec<u16> = (0..64 * 64).map(|i| (i * 16) as u16).collect();
        for palette in PaletteType::ALL {
            let buffer = SampleBuffer::monochrome16(64, 64, PhotometricInterpretation::Monochrome1, &ramp);
            assert_cross_path(buffer, WindowLevel::new(30000.0, 41000.0), palette);
        }
    }

    #[test]
    fn test_gpu_dirty_flags() {
        let Some(mut gpu) = compositor() else {
            return;
        };
        assert!(gpu.resources().is_clean());

        let buffer = SampleBuffer::monochrome8(4, 4, PhotometricInterpretation::Monochrome2, vec![1; 16]);
        gpu.set_image(Arc::new(buffer));
        assert!(gpu.resources().texture_dirty());

        gpu.ensure_resources().unwrap();
        assert!(gpu.resources().is_clean());

        gpu.set_palette(PaletteType::Bone);
        assert!(gpu.resources().palette_dirty());
        assert!(!gpu.resources().texture_dirty());
        assert!(!gpu.resources().geometry_dirty());

        // Window changes are uniforms only
        gpu.render_to_buffer((4, 4), 0, &WindowLevel::new(3.0, 9.0)).unwrap();
        assert!(gpu.resources().is_clean());

        gpu.clear_image();
        assert!(gpu.resources().is_clean());
        assert_eq!(gpu.render_to_buffer((4, 4), 0, &WindowLevel::default()), Err(RenderError::EmptyInput));
    }

    #[test]
    fn test_gpu_rejects_short_buffer_and_keeps_flags() {
        let Some(mut gpu) = compositor() else {
            return;
        };
        let short = SampleBuffer::monochrome16(4, 4, PhotometricInterpretation::Monochrome2, &[0; 3]);
        gpu.set_image(Arc::new(short));
        assert!(matches!(
            gpu.ensure_resources(),
            Err(RenderError::SizeMismatch { expected: 32, actual: 6 })
        ));
        assert!(gpu.resources().texture_dirty());
    }

    #[test]
    fn test_gpu_rotated_offscreen_render() {
        let Some(mut gpu) = compositor() else {
            return;
        };
        // Left column white, right column black
        let buffer = SampleBuffer::monochrome8(2, 2, PhotometricInterpretation::Monochrome2, vec![255, 0, 255, 0]);
        gpu.set_image(Arc::new(buffer));

        let window = WindowLevel::new(127.5, 255.0);
        let upright = gpu.render_to_buffer((2, 2), 0, &window).unwrap();
        assert_eq!(upright.data, vec![255, 0, 255, 0]);

        // Quarter turn clockwise moves the white column to the top row
        let rotated = gpu.render_to_buffer((2, 2), 90, &window).unwrap();
        assert_eq!(rotated.data, vec![255, 255, 0, 0]);
    }

    #[test]
    fn test_capture_between_frame_and_submit_keeps_frame_params() {
        let Some(mut gpu) = compositor() else {
            return;
        };
        let buffer = SampleBuffer::monochrome8(64, 64, PhotometricInterpretation::Monochrome2, vec![128; 64 * 64]);
        gpu.set_image(Arc::new(buffer));

        let target = host_target(&gpu, (64, 64), OFFSCREEN_FORMAT);
        let target_view = target.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = gpu.device().create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Test Host Encoder"),
        });

        // Frame window puts 128 above the top (white), capture window below the bottom (black)
        let drawn = gpu
            .render_to_target(
                &mut encoder,
                &target_view,
                OFFSCREEN_FORMAT,
                (64, 64),
                &ViewTransform::default(),
                &WindowLevel::new(0.0, 10.0),
            )
            .unwrap();
        assert!(drawn);

        let capture = gpu.render_to_buffer((64, 64), 0, &WindowLevel::new(1000.0, 10.0)).unwrap();
        assert!(capture.data.iter().all(|&v| v == 0));

        gpu.queue().submit(Some(encoder.finish()));
        let frame = gpu.read_texture(&target, (64, 64), PixelLayout::Gray8).unwrap();
        assert!(frame.data.iter().all(|&v| v == 255), "host frame drawn with capture params");
    }

    #[test]
    fn test_oversized_capture_is_allocation_failure() {
        let Some(mut gpu) = compositor() else {
            return;
        };
        let buffer = SampleBuffer::monochrome8(2, 2, PhotometricInterpretation::Monochrome2, vec![0; 4]);
        gpu.set_image(Arc::new(buffer));

        let result = gpu.render_to_buffer((70_000, 70_000), 0, &WindowLevel::default());
        assert!(matches!(result, Err(RenderError::ResourceAllocationFailure(_))));
    }
}
