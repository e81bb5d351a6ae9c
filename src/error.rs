// ============================================================================
// ERROR TYPES: canvas sizing, brush configuration, arithmetic, config files
// ============================================================================

use std::path::PathBuf;

pub type CanvasResult<T> = Result<T, CanvasError>;
pub type EngineResult<T> = Result<T, EngineError>;

/// Sizing and buffer errors raised by [`crate::canvas::Canvas`].
///
/// These are always surfaced to the caller and never leave the canvas in a
/// partially updated state.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CanvasError {
    #[error("canvas must have even width and even height for the DCT, got {width}x{height}")]
    OddSize { width: usize, height: usize },

    #[error("image must have width and height > 0")]
    EmptyImage,

    #[error("buffer holds {actual} samples, expected {expected}")]
    BufferLength { expected: usize, actual: usize },
}

/// Brush configuration errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BrushError {
    #[error("brush size must be at least 1, got {0}")]
    InvalidSize(usize),

    #[error("unknown brush shape {0:?}")]
    UnknownShape(String),

    #[error("unknown brush mode {0:?}")]
    UnknownMode(String),
}

/// Arithmetic failures inside a single apply or propagation step.
///
/// Callers abort the current step and log; these never poison later steps.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("division by zero at cell ({x}, {y})")]
    DivisionByZero { x: usize, y: usize },

    #[error("matrix shape mismatch: expected {expected} samples, got {actual}")]
    Shape { expected: usize, actual: usize },

    #[error(transparent)]
    Canvas(#[from] CanvasError),
}

/// Errors loading or validating an [`crate::config::EngineConfig`].
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Brush(#[from] BrushError),

    #[error(transparent)]
    Canvas(#[from] CanvasError),
}

/// Failure building a [`crate::project::Project`] from a config.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProjectError {
    #[error(transparent)]
    Canvas(#[from] CanvasError),

    #[error(transparent)]
    Brush(#[from] BrushError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_name_the_offending_values() {
        let e = CanvasError::OddSize { width: 3, height: 4 };
        assert!(e.to_string().contains("3x4"));

        let e = BrushError::InvalidSize(0);
        assert!(e.to_string().contains("at least 1"));

        let e = EngineError::DivisionByZero { x: 2, y: 5 };
        assert!(e.to_string().contains("(2, 5)"));
    }

    #[test]
    fn canvas_error_converts_into_engine_error() {
        let e: EngineError = CanvasError::EmptyImage.into();
        assert_eq!(e, EngineError::Canvas(CanvasError::EmptyImage));
        assert_eq!(e.to_string(), CanvasError::EmptyImage.to_string());
    }
}
