//! Directional band pass in the 2D frequency domain.
//!
//! The projection of a helical lattice shows moiré fringes whose frequency along the
//! filament is low (long periods) while across the filament it is set by the protofilament
//! lattice. The filter keeps two rectangular wedges of the unshifted spectrum: the low
//! positive rows `[0, ymax)` and the wrapped negative rows `[-ymax + 1, 0)`, both restricted
//! to columns `[1, xmax)`. Everything else, including the DC column, is zeroed before the
//! inverse transform.

use crate::data_container::{Image2D, Spectrum2D};
use crate::filters::filter::{Filter, FilterConfig, FilterDomain, FilterOutput};
use crate::math_tools::next_fast_len;
use ndarray::parallel::prelude::*;
use ndarray::{s, Array1, Array2, ArrayView2, ArrayViewMut1, Axis};
use num_complex::Complex32;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Fraction of the transform size used as the upper column bound.
const XMAX_FRACTION: f32 = 0.4;

/// Band pass isolating the moiré fringes of a projected filament.
#[derive(Clone, Debug)]
pub struct MoireBandPass {
    /// Shortest periodicity along the filament that passes the filter, in the
    /// physical unit of the image scale.
    pub cutoff_length: f32,
}

impl Default for MoireBandPass {
    fn default() -> Self {
        MoireBandPass {
            cutoff_length: 100.0,
        }
    }
}

impl MoireBandPass {
    pub fn new(cutoff_length: f32) -> Self {
        MoireBandPass { cutoff_length }
    }

    /// Row cutoff of the retained band for a transform of edge length `size`.
    ///
    /// Clamped to `size / 2` so that the positive and the wrapped band never overlap.
    pub fn ymax(&self, scale_y: f32, size: usize) -> usize {
        let ymax = (scale_y * size as f32 / self.cutoff_length).round();
        // `as` saturates: NaN becomes 0, infinity becomes usize::MAX
        (ymax as usize).min(size / 2)
    }

    /// Upper (exclusive) column bound of the retained band.
    pub fn xmax(size: usize) -> usize {
        (size as f32 * XMAX_FRACTION) as usize
    }

    /// Zeroes every coefficient outside of the two retained wedges.
    pub fn mask(&self, spectrum: &Spectrum2D, scale_y: f32) -> Array2<Complex32> {
        let size = spectrum.size();
        let ymax = self.ymax(scale_y, size);
        let (xmin, xmax) = (1, Self::xmax(size));

        let mut masked = Array2::<Complex32>::zeros(spectrum.data.raw_dim());
        if xmax <= xmin || ymax == 0 {
            return masked;
        }
        let rows = [(0, ymax), (size + 1 - ymax, size)];
        for (start, end) in rows {
            masked
                .slice_mut(s![start..end, xmin..xmax])
                .assign(&spectrum.data.slice(s![start..end, xmin..xmax]));
        }
        masked
    }
}

impl Filter for MoireBandPass {
    fn config(&self) -> FilterConfig {
        FilterConfig {
            name: "Moire Band Pass".to_string(),
            description: format!(
                "Keeps periodicities longer than {} along the filament.",
                self.cutoff_length
            ),
            domain: FilterDomain::Frequency,
        }
    }

    /// Applies the band pass.
    ///
    /// The image is zero padded to a square of fast transform length, transformed, masked and
    /// transformed back. Only one half-plane of frequencies is retained, so the inverse is
    /// complex; it is completed with its Hermitian mirror, i.e. the real part is doubled, which
    /// makes the filter a projection (applying it twice changes nothing).
    fn filter(&self, input: &Image2D) -> FilterOutput {
        let (ny, nx) = input.dim();
        let size = next_fast_len(ny.max(nx));
        let spectrum = fft2(&input.data.view(), size);

        let masked = self.mask(&spectrum, input.scale_y);
        log::debug!(
            "band pass: size {size}, ymax {}, xmax {}",
            self.ymax(input.scale_y, size),
            Self::xmax(size)
        );

        let back = ifft2(masked);
        let filtered = back
            .slice(s![..ny, ..nx])
            .mapv(|c| 2.0 * c.re);

        FilterOutput {
            filtered: Image2D::new(filtered, input.scale_y, input.scale_x),
            spectrum,
        }
    }
}

/// Unshifted 2D DFT of `data`, zero padded (top-left aligned) to `size x size`.
pub fn fft2(data: &ArrayView2<f32>, size: usize) -> Spectrum2D {
    let (ny, nx) = data.dim();
    let mut buffer = Array2::<Complex32>::zeros((size, size));
    let rows = ny.min(size);
    let cols = nx.min(size);
    buffer
        .slice_mut(s![..rows, ..cols])
        .assign(&data.slice(s![..rows, ..cols]).mapv(|v| Complex32::new(v, 0.0)));

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(size);
    transform_lanes(&mut buffer, &fft);
    Spectrum2D { data: buffer }
}

/// Normalized inverse of [`fft2`] without cropping.
pub fn ifft2(mut data: Array2<Complex32>) -> Array2<Complex32> {
    let size = data.nrows();
    if size == 0 {
        return data;
    }
    let mut planner = FftPlanner::<f32>::new();
    let ifft = planner.plan_fft_inverse(size);
    transform_lanes(&mut data, &ifft);
    let norm = 1.0 / (size * size) as f32;
    data.mapv_inplace(|c| c * norm);
    data
}

/// Runs `fft` over every row and then every column of a square array.
fn transform_lanes(data: &mut Array2<Complex32>, fft: &Arc<dyn Fft<f32>>) {
    for axis in [Axis(0), Axis(1)] {
        data.axis_iter_mut(axis)
            .into_par_iter()
            .for_each(|lane| transform_lane(lane, fft));
    }
}

fn transform_lane(mut lane: ArrayViewMut1<Complex32>, fft: &Arc<dyn Fft<f32>>) {
    let mut buffer: Vec<Complex32> = lane.to_vec();
    fft.process(&mut buffer);
    lane.assign(&Array1::from(buffer));
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array2;
    use std::f32::consts::PI;

    fn fringe_image(ny: usize, nx: usize, fy: f32, fx: f32) -> Array2<f32> {
        Array2::from_shape_fn((ny, nx), |(y, x)| {
            (2.0 * PI * fy * y as f32 / ny as f32).cos() * (2.0 * PI * fx * x as f32 / nx as f32).cos()
                + 0.3 * (2.0 * PI * 20.0 * y as f32 / ny as f32).sin()
                + 1.5
        })
    }

    #[test]
    fn test_fft2_roundtrip() {
        let data = fringe_image(16, 12, 2.0, 3.0);
        let spectrum = fft2(&data.view(), 16);
        let back = ifft2(spectrum.data);
        for y in 0..16 {
            for x in 0..12 {
                assert_relative_eq!(back[[y, x]].re, data[[y, x]], epsilon = 1e-4);
            }
        }
        assert_relative_eq!(back[[3, 14]].re, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn test_ymax_and_xmax() {
        let filter = MoireBandPass::new(100.0);
        assert_eq!(filter.ymax(1.0, 1024), 10);
        assert_eq!(filter.ymax(1.05, 1024), 11);
        assert_eq!(filter.ymax(1000.0, 64), 32);
        assert_eq!(MoireBandPass::xmax(1024), 409);
        assert_eq!(MoireBandPass::new(0.0).ymax(1.0, 64), 32);
    }

    #[test]
    fn test_filter_keeps_shape_and_does_not_touch_input() {
        let image = Image2D::isotropic(fringe_image(50, 30, 2.0, 5.0), 4.0);
        let copy = image.clone();
        let output = MoireBandPass::new(100.0).filter(&image);
        assert_eq!(output.filtered.dim(), (50, 30));
        assert_eq!(output.spectrum.size(), 50);
        assert_eq!(image, copy);
    }

    #[test]
    fn test_filter_removes_dc_and_fast_components() {
        // 64 px at scale 4 => ymax = round(4 * 64 / 100) = 3, so fy = 2 passes and fy = 20 does not
        let image = Image2D::isotropic(fringe_image(64, 64, 2.0, 5.0), 4.0);
        let output = MoireBandPass::new(100.0).filter(&image);
        let expected = Array2::from_shape_fn((64, 64), |(y, x)| {
            (2.0 * PI * 2.0 * y as f32 / 64.0).cos() * (2.0 * PI * 5.0 * x as f32 / 64.0).cos()
        });
        for ((y, x), v) in output.filtered.data.indexed_iter() {
            assert_relative_eq!(*v, expected[[y, x]], epsilon = 1e-3);
        }
    }

    #[test]
    fn test_filter_is_idempotent_on_band_content() {
        let image = Image2D::isotropic(fringe_image(64, 64, 2.0, 5.0), 4.0);
        let filter = MoireBandPass::new(100.0);
        let once = filter.filter(&image).filtered;
        let twice = filter.filter(&once).filtered;
        for (a, b) in once.data.iter().zip(twice.data.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_mask_keeps_conjugate_wedges_only() {
        let spectrum = Spectrum2D {
            data: Array2::from_elem((20, 20), Complex32::new(1.0, 0.0)),
        };
        // ymax = round(1 * 20 / 5) = 4, xmax = 8
        let masked = MoireBandPass::new(5.0).mask(&spectrum, 1.0);
        for ((y, x), c) in masked.indexed_iter() {
            let row_kept = y < 4 || y >= 17;
            let col_kept = (1..8).contains(&x);
            let expected = if row_kept && col_kept { 1.0 } else { 0.0 };
            assert_eq!(c.re, expected, "at ({y}, {x})");
        }
    }
}
