//! Error type shared by the host glue (loading, export, settings).
//!
//! The numerical core never fails: degenerate signals yield a zero angle and
//! overshooting ratios are clamped. Only I/O around it produces errors.

use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum SkewError {
    /// The requested export directory does not exist.
    InvalidDestination(PathBuf),
    /// The host could not provide a projection for the given filament index.
    Straighten { index: usize, reason: String },
    /// An input array has a shape the pipeline cannot work with.
    InvalidShape(Vec<usize>),
    Io(std::io::Error),
    Csv(csv::Error),
    Image(image::ImageError),
    Npy(ndarray_npy::ReadNpyError),
    Preferences(preferences::PreferencesError),
}

pub type Result<T> = std::result::Result<T, SkewError>;

impl fmt::Display for SkewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDestination(path) => {
                write!(f, "output directory {} does not exist", path.display())
            }
            Self::Straighten { index, reason } => {
                write!(f, "failed to straighten filament {index}: {reason}")
            }
            Self::InvalidShape(shape) => write!(f, "unsupported array shape {shape:?}"),
            Self::Io(err) => write!(f, "i/o error: {err}"),
            Self::Csv(err) => write!(f, "csv error: {err}"),
            Self::Image(err) => write!(f, "image error: {err}"),
            Self::Npy(err) => write!(f, "npy error: {err}"),
            Self::Preferences(err) => write!(f, "preferences error: {err}"),
        }
    }
}

impl std::error::Error for SkewError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Csv(err) => Some(err),
            Self::Image(err) => Some(err),
            Self::Npy(err) => Some(err),
            Self::Preferences(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SkewError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for SkewError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl From<image::ImageError> for SkewError {
    fn from(err: image::ImageError) -> Self {
        Self::Image(err)
    }
}

impl From<ndarray_npy::ReadNpyError> for SkewError {
    fn from(err: ndarray_npy::ReadNpyError) -> Self {
        Self::Npy(err)
    }
}

impl From<preferences::PreferencesError> for SkewError {
    fn from(err: preferences::PreferencesError) -> Self {
        Self::Preferences(err)
    }
}
