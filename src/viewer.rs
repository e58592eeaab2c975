/// Downstream-facing viewer
///
/// Owns the displayed image, its window/level, the palette and the view
/// transform, and routes draws to one of two backends:
/// - `Gpu` - `GpuCompositor`, drawing into host views
/// - `CpuFallback` - `RasterCompositor`, returning a cached raster
///
/// The backend is picked on first use. Once the viewer falls back to the
/// CPU it never tries the GPU again.

use std::sync::Arc;

use image::imageops::FilterType;
use tracing::{debug, info, warn};

use crate::config::RendererConfig;
use crate::cpu::{RasterCompositor, RasterImage};
use crate::error::RenderError;
use crate::gpu::{wgpu, GpuCompositor};
use crate::palette::PaletteType;
use crate::sample::{DecodedImage, SampleBuffer};
use crate::state::view::{ViewTransform, MAX_ZOOM, MIN_ZOOM};
use crate::state::window::{WindowLevel, WindowLevelRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Uninitialized,
    Gpu,
    CpuFallback,
}

enum BackendState {
    Uninitialized,
    Gpu(Box<GpuCompositor>),
    CpuFallback,
}

/// Host surface for one GPU frame
pub struct FrameTarget<'a> {
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub view: &'a wgpu::TextureView,
    pub format: wgpu::TextureFormat,
    /// Target size in pixels
    pub viewport: (u32, u32),
}

/// Outcome of `Viewer::render_frame`
#[derive(Debug)]
pub enum Frame<'a> {
    /// Drawn into the host target
    Drawn,
    /// Native-resolution raster for the host to present
    Raster(&'a RasterImage),
    /// Nothing to display this frame
    Nothing,
}

pub struct Viewer {
    config: RendererConfig,
    backend: BackendState,
    cpu: RasterCompositor,
    image: Option<Arc<SampleBuffer>>,
    default_window: WindowLevel,
    window: WindowLevel,
    palette: PaletteType,
    view: ViewTransform,
    /// Last CPU render; None when stale
    raster: Option<RasterImage>,
    /// Set after a skipped frame has been reported
    skip_reported: bool,
}

impl std::fmt::Debug for Viewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Viewer")
            .field("backend", &self.backend())
            .field("image", &self.image.as_ref().map(|image| image.dimensions()))
            .field("window", &self.window)
            .field("palette", &self.palette)
            .field("view", &self.view)
            .finish_non_exhaustive()
    }
}

impl Viewer {
    pub fn new(config: RendererConfig) -> Self {
        let palette = config.default_palette;
        Self {
            config,
            backend: BackendState::Uninitialized,
            cpu: RasterCompositor::new(),
            image: None,
            default_window: WindowLevel::default(),
            window: WindowLevel::default(),
            palette,
            view: ViewTransform::default(),
            raster: None,
            skip_reported: false,
        }
    }

    /// Viewer on a compositor built from the host's own device
    pub fn with_gpu(config: RendererConfig, compositor: GpuCompositor) -> Self {
        let mut viewer = Self::new(config);
        viewer.adopt_gpu(compositor);
        viewer
    }

    pub fn backend(&self) -> Backend {
        match self.backend {
            BackendState::Uninitialized => Backend::Uninitialized,
            BackendState::Gpu(_) => Backend::Gpu,
            BackendState::CpuFallback => Backend::CpuFallback,
        }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Pick the backend now instead of on the first draw
    pub fn initialize(&mut self) -> Backend {
        if !matches!(self.backend, BackendState::Uninitialized) {
            return self.backend();
        }

        if !self.config.prefer_gpu {
            info!("GPU disabled by configuration, using CPU renderer");
            self.backend = BackendState::CpuFallback;
            return self.backend();
        }

        let power_preference = self.config.power_preference.into();
        match pollster::block_on(GpuCompositor::new(power_preference)) {
            Ok(compositor) => self.adopt_gpu(compositor),
            Err(err) => self.fall_back(&err),
        }

        self.backend()
    }

    fn adopt_gpu(&mut self, mut compositor: GpuCompositor) {
        if let Some(image) = &self.image {
            compositor.set_image(Arc::clone(image));
        }
        compositor.set_palette(self.palette);
        self.backend = BackendState::Gpu(Box::new(compositor));
        info!("Using GPU renderer");
    }

    /// Switch to the CPU path for good
    fn fall_back(&mut self, err: &RenderError) {
        warn!("GPU renderer unavailable, falling back to CPU: {}", err);
        self.backend = BackendState::CpuFallback;
    }

    /// Returns true when the error moved the viewer onto the CPU path
    fn handle_gpu_error(&mut self, err: &RenderError) -> bool {
        if err.is_fatal_for_gpu() {
            self.fall_back(err);
            true
        } else {
            self.report_skip(err);
            false
        }
    }

    // ========== Image ==========

    /// Show a new image; the view is reset and `default_window` applied
    pub fn set_image(&mut self, image: Arc<SampleBuffer>, default_window: WindowLevel) {
        if let BackendState::Gpu(gpu) = &mut self.backend {
            gpu.set_image(Arc::clone(&image));
        }
        self.image = Some(image);
        self.default_window = default_window;
        self.window = default_window;
        self.view.reset();
        self.raster = None;
    }

    /// Take over a decoder frame, with its header window (or a min/max one)
    pub fn load(&mut self, decoded: DecodedImage) -> Result<(), RenderError> {
        let (buffer, window) = decoded.into_parts()?;
        self.set_image(Arc::new(buffer), window);
        Ok(())
    }

    pub fn clear_image(&mut self) {
        if let BackendState::Gpu(gpu) = &mut self.backend {
            gpu.clear_image();
        }
        self.image = None;
        self.raster = None;
    }

    pub fn image(&self) -> Option<&Arc<SampleBuffer>> {
        self.image.as_ref()
    }

    // ========== Window/level ==========

    pub fn window_level(&self) -> WindowLevel {
        self.window
    }

    pub fn set_window_level(&mut self, window: WindowLevel) {
        if self.window != window {
            self.window = window;
            self.raster = None;
        }
    }

    /// Back to the window the image was loaded with
    pub fn reset_window_level(&mut self) {
        self.set_window_level(self.default_window);
    }

    /// Mouse drag: horizontal changes width, vertical changes center
    pub fn adjust_window_level(&mut self, dx: f64, dy: f64) {
        let mut window = self.window;
        window.adjust_by_drag(dx, dy);
        self.set_window_level(window);
    }

    /// Slider bounds for the current image (None for color or no image)
    pub fn window_level_range(&self) -> Option<WindowLevelRange> {
        self.image.as_deref().and_then(WindowLevelRange::for_buffer)
    }

    // ========== Palette ==========

    pub fn palette(&self) -> PaletteType {
        self.palette
    }

    pub fn set_palette(&mut self, palette: PaletteType) {
        if self.palette == palette {
            return;
        }
        self.palette = palette;
        self.raster = None;
        if let BackendState::Gpu(gpu) = &mut self.backend {
            gpu.set_palette(palette);
        }
    }

    // ========== View ==========

    pub fn view(&self) -> &ViewTransform {
        &self.view
    }

    /// Restore a saved view, e.g. when switching back to an image
    ///
    /// Zoom is clamped and rotation snapped to a quarter turn.
    pub fn set_view(&mut self, view: ViewTransform) {
        self.view = ViewTransform {
            zoom: view.zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            pan: view.pan,
            rotation: view.rotation % 360 / 90 * 90,
        };
    }

    pub fn zoom_in(&mut self) {
        self.view.zoom_in();
    }

    pub fn zoom_out(&mut self) {
        self.view.zoom_out();
    }

    pub fn zoom_to_fit(&mut self) {
        self.view.zoom_to_fit();
    }

    pub fn zoom_actual_size(&mut self, viewport: (u32, u32)) {
        if let Some(image) = &self.image {
            self.view.zoom_actual_size(viewport, image.dimensions());
        }
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64, viewport: (u32, u32)) {
        if let Some(image) = &self.image {
            self.view.pan_by(dx, dy, viewport, image.dimensions());
        }
    }

    pub fn rotate_left(&mut self) {
        self.view.rotate_left();
    }

    pub fn rotate_right(&mut self) {
        self.view.rotate_right();
    }

    pub fn reset_view(&mut self) {
        self.view.reset();
    }

    // ========== Rendering ==========

    /// Render the current frame
    ///
    /// On the GPU backend the image is drawn into `target`. Without a
    /// target, or on the CPU backend, the native-resolution raster is
    /// returned instead and the host applies the view transform.
    pub fn render_frame(&mut self, target: Option<FrameTarget<'_>>) -> Frame<'_> {
        self.initialize();

        if let Some(target) = target {
            if let BackendState::Gpu(gpu) = &mut self.backend {
                let result = gpu.render_to_target(
                    target.encoder,
                    target.view,
                    target.format,
                    target.viewport,
                    &self.view,
                    &self.window,
                );
                match result {
                    Ok(true) => {
                        self.skip_reported = false;
                        return Frame::Drawn;
                    }
                    Ok(false) => return Frame::Nothing,
                    Err(err) => {
                        if !self.handle_gpu_error(&err) {
                            return Frame::Nothing;
                        }
                    }
                }
            }
        }

        match self.cpu_raster() {
            Some(raster) => Frame::Raster(raster),
            None => Frame::Nothing,
        }
    }

    /// Offscreen capture at `size` with the current rotation
    ///
    /// The image is fitted and centered on black. None when there is
    /// nothing to display.
    pub fn render_to_buffer(&mut self, size: (u32, u32)) -> Option<RasterImage> {
        self.initialize();
        let rotation = self.view.rotation;

        if let BackendState::Gpu(gpu) = &mut self.backend {
            match gpu.render_to_buffer(size, rotation, &self.window) {
                Ok(raster) => return Some(raster),
                Err(err) => {
                    if !self.handle_gpu_error(&err) {
                        return None;
                    }
                }
            }
        }

        let image = self.image.as_deref()?;
        let filter = FilterType::from(self.config.thumbnail_filter);
        match self
            .cpu
            .render_thumbnail(image, &self.window, self.palette, size, rotation, filter)
        {
            Ok(raster) => Some(raster),
            Err(err) => {
                debug!("Nothing to display: {}", err);
                None
            }
        }
    }

    /// Cached CPU raster, re-rendered when stale
    fn cpu_raster(&mut self) -> Option<&RasterImage> {
        if self.raster.is_none() {
            let image = self.image.as_deref()?;
            match self.cpu.render(image, &self.window, self.palette) {
                Ok(raster) => self.raster = Some(raster),
                Err(err) => {
                    debug!("Nothing to display: {}", err);
                    return None;
                }
            }
        }
        self.raster.as_ref()
    }

    /// Input errors are routine; GPU failures are warned about once per streak
    fn report_skip(&mut self, err: &RenderError) {
        if err.is_input_error() {
            debug!("Nothing to display: {}", err);
        } else if !self.skip_reported {
            warn!("Skipping frame: {}", err);
            self.skip_reported = true;
        } else {
            debug!("Skipping frame: {}", err);
        }
    }
}
