/// Scoped wgpu error capture
///
/// `GpuScope::push` opens an out-of-memory scope and a validation scope on
/// the device. They are popped by `finish` or, on early return, by `Drop`,
/// so the device's scope stack stays balanced on every exit path.

use iced_wgpu::wgpu;
use tracing::warn;

use crate::error::RenderError;

pub struct GpuScope<'a> {
    device: &'a wgpu::Device,
    label: &'static str,
    open: bool,
}

impl<'a> GpuScope<'a> {
    pub fn push(device: &'a wgpu::Device, label: &'static str) -> Self {
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        Self {
            device,
            label,
            open: true,
        }
    }

    /// Close the scope and return the first captured error
    pub fn finish(mut self) -> Option<wgpu::Error> {
        self.open = false;
        self.pop()
    }

    /// Close the scope, turning a captured error into `to_error(message)`
    pub fn check(self, to_error: impl FnOnce(String) -> RenderError) -> Result<(), RenderError> {
        let label = self.label;
        match self.finish() {
            Some(err) => Err(to_error(format!("{label}: {err}"))),
            None => Ok(()),
        }
    }

    fn pop(&self) -> Option<wgpu::Error> {
        // Popped in reverse push order
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());
        validation.or(out_of_memory)
    }
}

impl Drop for GpuScope<'_> {
    fn drop(&mut self) {
        if self.open {
            self.open = false;
            if let Some(err) = self.pop() {
                warn!("Discarded GPU error in {}: {}", self.label, err);
            }
        }
    }
}

impl std::fmt::Debug for GpuScope<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuScope")
            .field("label", &self.label)
            .field("open", &self.open)
            .finish_non_exhaustive()
    }
}
