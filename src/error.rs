/// Error types for the display pipeline
///
/// Input errors (empty, short or unsupported buffers) mean "nothing to
/// display". GPU errors either switch the viewer to the CPU path for good
/// (shader/adapter) or skip one frame (allocation).

use thiserror::Error;

use crate::sample::PhotometricInterpretation;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RenderError {
    #[error("sample buffer is empty")]
    EmptyInput,

    #[error("sample buffer too small: expected at least {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("unsupported photometric interpretation: {0:?}")]
    UnsupportedPhotometricInterpretation(PhotometricInterpretation),

    #[error("unsupported bits allocated: {0} (expected 8 or 16)")]
    UnsupportedBitDepth(u16),

    #[error("unsupported samples per pixel: {0} (expected 1 or 3)")]
    UnsupportedSamplesPerPixel(u16),

    #[error("shader compilation failed: {0}")]
    ShaderCompileFailure(String),

    #[error("GPU resource allocation failed: {0}")]
    ResourceAllocationFailure(String),

    #[error("no usable GPU adapter: {0}")]
    AdapterUnavailable(String),
}

impl RenderError {
    /// True for errors that mean the input can't be shown at all
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            RenderError::EmptyInput
                | RenderError::SizeMismatch { .. }
                | RenderError::UnsupportedPhotometricInterpretation(_)
                | RenderError::UnsupportedBitDepth(_)
                | RenderError::UnsupportedSamplesPerPixel(_)
        )
    }

    /// True for errors after which the GPU path is abandoned
    pub fn is_fatal_for_gpu(&self) -> bool {
        matches!(
            self,
            RenderError::ShaderCompileFailure(_) | RenderError::AdapterUnavailable(_)
        )
    }
}

/// Errors while loading `RendererConfig`
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(RenderError::EmptyInput.is_input_error());
        assert!(RenderError::SizeMismatch { expected: 4, actual: 2 }.is_input_error());
        assert!(!RenderError::ShaderCompileFailure("x".into()).is_input_error());

        assert!(RenderError::ShaderCompileFailure("x".into()).is_fatal_for_gpu());
        assert!(RenderError::AdapterUnavailable("none".into()).is_fatal_for_gpu());
        assert!(!RenderError::ResourceAllocationFailure("oom".into()).is_fatal_for_gpu());
    }

    #[test]
    fn test_size_mismatch_message() {
        let err = RenderError::SizeMismatch { expected: 8, actual: 3 };
        assert_eq!(
            err.to_string(),
            "sample buffer too small: expected at least 8 bytes, got 3"
        );
    }
}
