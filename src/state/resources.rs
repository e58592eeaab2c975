/// Staleness tracking for GPU-side resources
///
/// Three independent flags. Each is raised by the mutation that makes the
/// resource stale and lowered only by the step that rebuilds it. Flags are
/// read lazily right before a draw; a failed rebuild leaves its flag up so
/// the next frame tries again.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceState {
    texture_dirty: bool,
    palette_dirty: bool,
    geometry_dirty: bool,
}

impl ResourceState {
    pub fn new() -> Self {
        Self::default()
    }

    // ========== Triggers ==========

    /// A new image was assigned: every resource is stale
    pub fn image_assigned(&mut self) {
        self.texture_dirty = true;
        self.palette_dirty = true;
        self.geometry_dirty = true;
    }

    /// The palette type changed
    pub fn palette_changed(&mut self) {
        self.palette_dirty = true;
    }

    /// The image was removed: nothing left to upload
    pub fn image_cleared(&mut self) {
        self.texture_dirty = false;
        self.geometry_dirty = false;
    }

    // ========== Rebuild completions ==========

    pub fn texture_uploaded(&mut self) {
        self.texture_dirty = false;
    }

    pub fn palette_uploaded(&mut self) {
        self.palette_dirty = false;
    }

    pub fn geometry_rebuilt(&mut self) {
        self.geometry_dirty = false;
    }

    // ========== Queries ==========

    pub fn texture_dirty(&self) -> bool {
        self.texture_dirty
    }

    pub fn palette_dirty(&self) -> bool {
        self.palette_dirty
    }

    pub fn geometry_dirty(&self) -> bool {
        self.geometry_dirty
    }

    /// Ready to draw without any rebuild
    pub fn is_clean(&self) -> bool {
        !(self.texture_dirty || self.palette_dirty || self.geometry_dirty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_clean() {
        assert!(ResourceState::new().is_clean());
    }

    #[test]
    fn test_image_assignment_sets_all_flags() {
        let mut state = ResourceState::new();
        state.image_assigned();
        assert!(state.texture_dirty());
        assert!(state.palette_dirty());
        assert!(state.geometry_dirty());
    }

    #[test]
    fn test_palette_change_sets_only_palette() {
        let mut state = ResourceState::new();
        state.palette_changed();
        assert!(state.palette_dirty());
        assert!(!state.texture_dirty());
        assert!(!state.geometry_dirty());
    }

    #[test]
    fn test_flags_clear_independently() {
        let mut state = ResourceState::new();
        state.image_assigned();

        state.texture_uploaded();
        assert!(!state.texture_dirty());
        assert!(state.palette_dirty());
        assert!(state.geometry_dirty());

        state.geometry_rebuilt();
        assert!(state.palette_dirty());
        assert!(!state.is_clean());

        state.palette_uploaded();
        assert!(state.is_clean());
    }

    #[test]
    fn test_clearing_image_keeps_palette_flag() {
        let mut state = ResourceState::new();
        state.image_assigned();
        state.image_cleared();
        assert!(!state.texture_dirty());
        assert!(!state.geometry_dirty());
        assert!(state.palette_dirty());
    }
}
