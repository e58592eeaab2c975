/// Decoded sample buffers
///
/// This module holds the input side of the pipeline:
/// - `buffer.rs` - the immutable `SampleBuffer` both compositors read from
/// - `decoded.rs` - the contract an upstream decoder fills in
///
/// No file parsing happens here. The decoder hands over raw bytes plus the
/// geometry and numeric format it found in the header.

pub mod buffer;
pub mod decoded;

pub use buffer::{BitDepth, PhotometricInterpretation, SampleBuffer};
pub use decoded::DecodedImage;
