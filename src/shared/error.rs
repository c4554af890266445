use std::path::PathBuf;

use thiserror::Error;

/// Fatal pipeline errors.
///
/// These correspond to invalid user-supplied parameters or unusable inputs;
/// the CLI prints them and exits non-zero. Recoverable empty-input cases are
/// handled with a warning at the call site instead.
#[derive(Debug, Error)]
pub enum PrepError {
    #[error("invalid crop factor {0}; all crop fractions must be in [0, 1]")]
    InvalidCropFactor(f64),

    #[error("the radius of the circle mask must be positive (got {0})")]
    InvalidMaskRadius(f64),

    #[error("video path is a directory, not a file: {0}")]
    VideoIsDirectory(PathBuf),

    #[error("video does not exist: {0}")]
    VideoNotFound(PathBuf),

    #[error("video has no frames: {0}")]
    EmptyVideo(PathBuf),

    #[error("no usable images found in {0}")]
    NoImagesFound(PathBuf),

    #[error("could not find {program}; please install it ({hint})")]
    MissingProgram { program: String, hint: String },

    #[error("malformed filter graph: {0}")]
    InvalidGraph(String),

    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("unsupported raw image layout in {path}: {reason}")]
    UnsupportedRaw { path: PathBuf, reason: String },
}
