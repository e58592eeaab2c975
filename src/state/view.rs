/// Draw-time view transform (zoom, pan, rotation)
///
/// These values only feed the model-view-projection matrix of each draw.
/// They never mark GPU resources dirty.

use cgmath::{ortho, Deg, Matrix4, Vector3};

pub const ZOOM_STEP: f64 = 1.2;
pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    /// Multiplier on top of the fit-to-viewport scale (1.0 = fit)
    pub zoom: f64,
    /// Offset of the image center from the viewport center, in target pixels
    pub pan: (f64, f64),
    /// Clockwise rotation: 0, 90, 180 or 270
    pub rotation: u16,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan: (0.0, 0.0),
            rotation: 0,
        }
    }
}

impl ViewTransform {
    pub fn zoom_in(&mut self) {
        self.zoom = (self.zoom * ZOOM_STEP).min(MAX_ZOOM);
    }

    pub fn zoom_out(&mut self) {
        self.zoom = (self.zoom / ZOOM_STEP).max(MIN_ZOOM);
    }

    pub fn zoom_to_fit(&mut self) {
        self.zoom = 1.0;
        self.pan = (0.0, 0.0);
    }

    /// Zoom so one image pixel covers one target pixel
    pub fn zoom_actual_size(&mut self, viewport: (u32, u32), image: (u32, u32)) {
        let base = self.fit_scale(viewport, image);
        if base <= 0.0 {
            return;
        }
        self.zoom = (1.0 / base).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    pub fn rotate_left(&mut self) {
        self.rotation = (self.rotation + 270) % 360;
    }

    pub fn rotate_right(&mut self) {
        self.rotation = (self.rotation + 90) % 360;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Pan by a drag delta, keeping the image edges inside the viewport
    ///
    /// Panning is only possible along an axis where the scaled image is
    /// larger than the viewport.
    pub fn pan_by(&mut self, dx: f64, dy: f64, viewport: (u32, u32), image: (u32, u32)) {
        let scale = self.scale(viewport, image);
        let (rotated_w, rotated_h) = self.rotated_size(image);
        let max_x = ((rotated_w as f64 * scale - viewport.0 as f64) / 2.0).max(0.0);
        let max_y = ((rotated_h as f64 * scale - viewport.1 as f64) / 2.0).max(0.0);

        self.pan = (
            (self.pan.0 + dx).clamp(-max_x, max_x),
            (self.pan.1 + dy).clamp(-max_y, max_y),
        );
    }

    /// Image size after rotation
    pub fn rotated_size(&self, image: (u32, u32)) -> (u32, u32) {
        if (self.rotation / 90) % 2 == 1 {
            (image.1, image.0)
        } else {
            image
        }
    }

    /// Scale that fits the rotated image inside the viewport
    pub fn fit_scale(&self, viewport: (u32, u32), image: (u32, u32)) -> f64 {
        let (w, h) = self.rotated_size(image);
        if w == 0 || h == 0 {
            return 1.0;
        }
        (viewport.0 as f64 / w as f64).min(viewport.1 as f64 / h as f64)
    }

    /// Effective image-pixel to target-pixel scale
    pub fn scale(&self, viewport: (u32, u32), image: (u32, u32)) -> f64 {
        let base = self.fit_scale(viewport, image);
        if base > 0.0 {
            base * self.zoom
        } else {
            1.0
        }
    }

    /// Model-view-projection matrix for a quad spanning `image` pixels
    ///
    /// Target pixel space has its origin top-left with y pointing down.
    pub fn mvp(&self, viewport: (u32, u32), image: (u32, u32)) -> [[f32; 4]; 4] {
        let (vw, vh) = (viewport.0 as f32, viewport.1 as f32);
        let scale = self.scale(viewport, image) as f32;

        let projection = ortho(0.0, vw, vh, 0.0, -1.0, 1.0);
        let model = Matrix4::from_translation(Vector3::new(
            vw / 2.0 + self.pan.0 as f32,
            vh / 2.0 + self.pan.1 as f32,
            0.0,
        )) * Matrix4::from_angle_z(Deg(self.rotation as f32))
            * Matrix4::from_nonuniform_scale(scale, scale, 1.0)
            * Matrix4::from_translation(Vector3::new(
                -(image.0 as f32) / 2.0,
                -(image.1 as f32) / 2.0,
                0.0,
            ));

        (projection * model).into()
    }
}
