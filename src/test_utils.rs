//! Synthetic projections shared by the unit tests.

use crate::data_container::Image2D;
use ndarray::Array2;
use std::f32::consts::PI;

/// Projection of a straight filament with `moire_cycles` beats along its length.
///
/// Across the filament the fringes repeat three times over the width. A fine lattice
/// (period 4 px) along the filament and a constant background are added on top; both are
/// outside the band kept by the moiré filter.
pub fn synthetic_filament(ny: usize, nx: usize, scale: f32, moire_cycles: f32) -> Image2D {
    let data = Array2::from_shape_fn((ny, nx), |(y, x)| {
        let beat = (2.0 * PI * moire_cycles * y as f32 / ny as f32).cos();
        let across = (2.0 * PI * 3.0 * (x as f32 - nx as f32 / 2.0) / nx as f32).cos();
        let lattice = (2.0 * PI * y as f32 / 4.0).cos();
        1.0 + 0.5 * beat * across + 0.2 * lattice
    });
    Image2D::isotropic(data, scale)
}

/// Inter-protofilament spacing that makes `moire_cycles` beats over a filament of physical
/// length `length` correspond to a skew of `theta_degrees`.
pub fn spacing_for(length: f32, moire_cycles: f32, theta_degrees: f32) -> f32 {
    length / moire_cycles * theta_degrees.to_radians().sin()
}
