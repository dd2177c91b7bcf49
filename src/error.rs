//! Crate-wide error type.
//!
//! Expected edge cases (unready surface, empty history, out-of-bounds seed)
//! are not errors; those operations degrade to no-ops.  Only conditions the
//! host has to report to the user end up here.

/// Failures surfaced to the host.
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    /// The source bytes/file could not be decoded as a raster image.
    #[error("decode failed: {0}")]
    Decode(#[from] image::ImageError),

    /// File system read/write failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding the mask artifact failed.
    #[error("encode failed: {0}")]
    Encode(String),

    /// Source or container dimensions that cannot back a surface.
    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),

    /// A headless gesture script could not be parsed.
    #[error("gesture script error: {0}")]
    Script(#[from] serde_json::Error),

    /// A settings value was rejected.
    #[error("settings error: {0}")]
    Settings(String),
}
