/// Viewer state
///
/// This module holds the plain values the compositors read at draw time:
/// - Window/level parameters and slider bounds (window.rs)
/// - Zoom, pan and rotation (view.rs)
/// - Dirty flags for GPU-side resources (resources.rs)

pub mod resources;
pub mod view;
pub mod window;

pub use resources::ResourceState;
pub use view::ViewTransform;
pub use window::{WindowLevel, WindowLevelRange};
