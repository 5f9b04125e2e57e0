use thiserror::Error;

/// Capture subsystem errors.
///
/// The first five variants are raised synchronously from backend construction
/// and signal a non-recoverable failure; nothing is retried internally.
/// Mid-lifetime failures during `grab`/`retrieve` are wrapped as [`Runtime`].
/// `release` never fails.
///
/// [`Runtime`]: CaptureError::Runtime
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("context acquisition failed: {0}")]
    ContextAcquisition(String),

    #[error("shader compilation failed: {0}")]
    ShaderCompile(String),

    #[error("program link failed: {0}")]
    Link(String),

    #[error("resource allocation failed: {0}")]
    ResourceAllocation(String),

    #[error("uniform lookup failed: {0}")]
    UniformLookup(String),

    #[error("buffer length {actual} does not match frame size {expected}")]
    BufferLength { expected: usize, actual: usize },

    #[error("capture runtime failure: {0}")]
    Runtime(String),
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, CaptureError>;
