//! Data structures passed between the stages of the skew analysis.
//!
//! Images are stored as `(ny, nx)` arrays: axis 0 runs along the filament,
//! axis 1 across it. Scales are physical units per pixel (nm by convention).

use ndarray::{Array1, Array2, ArrayView1, Axis};
use num_complex::Complex32;

/// A projected filament image with its physical pixel size per axis.
#[derive(Clone, Debug, PartialEq)]
pub struct Image2D {
    pub data: Array2<f32>,
    /// Pixel size along the filament (axis 0).
    pub scale_y: f32,
    /// Pixel size across the filament (axis 1).
    pub scale_x: f32,
}

impl Image2D {
    pub fn new(data: Array2<f32>, scale_y: f32, scale_x: f32) -> Image2D {
        Image2D {
            data,
            scale_y,
            scale_x,
        }
    }

    /// Image with the same pixel size on both axes.
    pub fn isotropic(data: Array2<f32>, scale: f32) -> Image2D {
        Image2D::new(data, scale, scale)
    }

    /// Returns `(ny, nx)`.
    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn row(&self, index: usize) -> ArrayView1<'_, f32> {
        self.data.index_axis(Axis(0), index)
    }

    pub fn column(&self, index: usize) -> ArrayView1<'_, f32> {
        self.data.index_axis(Axis(1), index)
    }

    /// Physical length covered along the filament.
    pub fn length(&self) -> f32 {
        self.data.nrows() as f32 * self.scale_y
    }
}

/// Unshifted 2D spectrum of a zero-padded [`Image2D`].
#[derive(Clone, Debug)]
pub struct Spectrum2D {
    pub data: Array2<Complex32>,
}

impl Spectrum2D {
    /// Edge length of the (square) transform.
    pub fn size(&self) -> usize {
        self.data.nrows()
    }
}

/// A 1D trace taken from an image at a fixed row or column.
#[derive(Clone, Debug, PartialEq)]
pub struct Profile1D {
    pub data: Array1<f32>,
    /// Pixel size along the trace, inherited from the image.
    pub scale: f32,
    /// Row or column the trace was taken at.
    pub index: usize,
}

impl Profile1D {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Physical length of the trace.
    pub fn length(&self) -> f32 {
        self.data.len() as f32 * self.scale
    }
}
