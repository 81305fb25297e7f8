//! Selection of the 1D intensity trace used for the periodicity estimate.
//!
//! The filtered projection is scanned for the row (across the filament) with the highest
//! contrast. On that row the fringe trough closest to the filament center is located, and the
//! column through that trough, running along the filament, is returned as the profile.

use crate::data_container::{Image2D, Profile1D};
use crate::math_tools::{argmax, argmin, mean, row_std, second_derivative};
use ndarray::{s, Array1, ArrayView1};

/// Samples ignored at each end by the fallback trough search.
const EDGE_MARGIN: usize = 2;

/// Relative threshold of the trough search.
const TROUGH_THRESHOLD: f32 = 0.01;

/// Relative threshold used by [`find_peaks`] when no other value is given.
pub const DEFAULT_PEAK_THRESHOLD: f32 = 0.33;

/// Extremum of a 1D signal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Peak {
    pub index: usize,
    pub value: f32,
    pub is_maximum: bool,
}

/// Finds the extrema of `data`.
///
/// Extrema are the local maxima of the squared deviation from the mean, so highs and lows of
/// the raw signal are found alike. Each one is classified by the sign of the discrete second
/// derivative (`is_maximum` when it is negative). Extrema whose squared deviation does not
/// exceed `thresh_rel` times the largest squared deviation are dropped.
pub fn find_peaks(data: &ArrayView1<f32>, thresh_rel: f32) -> Vec<Peak> {
    let mu = mean(data);
    let prof_sq = data.mapv(|v| (v - mu).powi(2));
    let ddy = second_derivative(data);
    let max_sq = prof_sq.fold(0.0_f32, |acc, &v| acc.max(v));

    local_maxima(&prof_sq.view())
        .into_iter()
        .filter(|&i| prof_sq[i] > thresh_rel * max_sq)
        .map(|i| Peak {
            index: i,
            value: data[i],
            is_maximum: ddy[i] < 0.0,
        })
        .collect()
}

/// Indices of the local maxima of `x`.
///
/// A sample is a maximum if it is larger than its left neighbour and larger than the next
/// differing sample to its right. For flat tops the middle sample (rounded down) is reported.
/// The first and the last sample are never maxima.
pub fn local_maxima(x: &ArrayView1<f32>) -> Vec<usize> {
    let n = x.len();
    let mut peaks = vec![];
    if n < 3 {
        return peaks;
    }
    let i_max = n - 1;
    let mut i = 1;
    while i < i_max {
        if x[i - 1] < x[i] {
            let mut i_ahead = i + 1;
            while i_ahead < i_max && x[i_ahead] == x[i] {
                i_ahead += 1;
            }
            if x[i_ahead] < x[i] {
                peaks.push((i + i_ahead - 1) / 2);
                i = i_ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Index of the trough nearest to the center of `data`.
///
/// Falls back to the global minimum (ignoring two samples at each edge) if no trough stands
/// out of the noise floor.
pub fn find_center_minimum(data: &ArrayView1<f32>) -> usize {
    let troughs: Vec<Peak> = find_peaks(data, TROUGH_THRESHOLD)
        .into_iter()
        .filter(|p| !p.is_maximum)
        .collect();

    if troughs.is_empty() {
        return trimmed_argmin(data);
    }

    let i_center = (data.len() as f32 - 1.0) / 2.0;
    let distances = Array1::from_iter(troughs.iter().map(|p| (p.index as f32 - i_center).abs()));
    let nearest = argmin(&distances.view()).unwrap_or(0);
    troughs[nearest].index
}

fn trimmed_argmin(data: &ArrayView1<f32>) -> usize {
    if data.len() > 2 * EDGE_MARGIN {
        let inner = data.slice(s![EDGE_MARGIN..data.len() - EDGE_MARGIN]);
        argmin(&inner).map_or(EDGE_MARGIN, |i| i + EDGE_MARGIN)
    } else {
        argmin(data).unwrap_or(0)
    }
}

/// Row (across the filament) with the largest standard deviation.
pub fn max_contrast_row(image: &Image2D) -> usize {
    argmax(&row_std(&image.data.view()).view()).unwrap_or(0)
}

/// Profile chosen by [`select_profile_at`] together with where it was found.
#[derive(Clone, Debug, PartialEq)]
pub struct ProfileSelection {
    pub profile: Profile1D,
    /// Row (across the filament) with the highest contrast.
    pub row: usize,
    /// Column of the central trough on that row, the profile runs along it.
    pub column: usize,
}

/// Selects the profile along the filament passing through the central fringe trough.
///
/// Returns the profile and the column it was taken at.
pub fn select_profile(filtered: &Image2D) -> (Profile1D, usize) {
    let selection = select_profile_at(filtered);
    (selection.profile, selection.column)
}

/// [`select_profile`] that also reports the row the trough was searched on.
pub fn select_profile_at(filtered: &Image2D) -> ProfileSelection {
    let (ny, nx) = filtered.dim();
    if ny == 0 || nx == 0 {
        log::warn!("cannot select a profile from an empty image");
        let profile = Profile1D {
            data: Array1::zeros(0),
            scale: filtered.scale_y,
            index: 0,
        };
        return ProfileSelection {
            profile,
            row: 0,
            column: 0,
        };
    }

    let iy_opt = max_contrast_row(filtered);
    let ix = find_center_minimum(&filtered.row(iy_opt));
    log::debug!("selected row {iy_opt} and column {ix}");

    let profile = Profile1D {
        data: filtered.column(ix).to_owned(),
        scale: filtered.scale_y,
        index: ix,
    };
    ProfileSelection {
        profile,
        row: iy_opt,
        column: ix,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1, Array2};
    use std::f32::consts::PI;

    /// Troughs at `3 + k * period`.
    fn fringes(n: usize, period: f32) -> Array1<f32> {
        Array1::from_shape_fn(n, |i| -(2.0 * PI * (i as f32 - 3.0) / period).cos())
    }

    #[test]
    fn test_local_maxima_with_plateau_and_edges() {
        let x = array![5.0_f32, 1.0, 3.0, 3.0, 3.0, 2.0, 4.0, 1.0, 7.0];
        assert_eq!(local_maxima(&x.view()), vec![3, 6]);
        assert!(local_maxima(&array![1.0_f32, 2.0].view()).is_empty());
    }

    #[test]
    fn test_find_peaks_classifies_highs_and_lows() {
        let x = fringes(20, 10.0);
        let peaks = find_peaks(&x.view(), DEFAULT_PEAK_THRESHOLD);
        let indices: Vec<usize> = peaks.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![3, 8, 13, 18]);
        let maxima: Vec<bool> = peaks.iter().map(|p| p.is_maximum).collect();
        assert_eq!(maxima, vec![false, true, false, true]);
        assert_eq!(peaks[0].value, x[3]);
    }

    #[test]
    fn test_center_minimum_prefers_trough_closest_to_center() {
        let x = fringes(20, 10.0);
        assert_eq!(find_center_minimum(&x.view()), 13);
    }

    #[test]
    fn test_center_minimum_symmetric_troughs() {
        let n = 17;
        let x = fringes(n, 10.0);
        let i = find_center_minimum(&x.view());
        assert!(i == 3 || i == n - 4, "got {i}");
    }

    #[test]
    fn test_center_minimum_falls_back_to_trimmed_argmin() {
        let ramp = Array1::from_shape_fn(16, |i| i as f32);
        assert_eq!(find_center_minimum(&ramp.view()), 2);

        let descending = Array1::from_shape_fn(16, |i| -(i as f32));
        assert_eq!(find_center_minimum(&descending.view()), 13);
    }

    #[test]
    fn test_center_minimum_short_and_empty_profiles() {
        assert_eq!(find_center_minimum(&array![3.0_f32, 1.0, 2.0].view()), 1);
        assert_eq!(find_center_minimum(&Array1::<f32>::zeros(0).view()), 0);
    }

    #[test]
    fn test_select_profile_returns_column_through_central_trough() {
        let (ny, nx) = (40, 20);
        let across = fringes(nx, 10.0);
        let data = Array2::from_shape_fn((ny, nx), |(y, x)| {
            (1.0 + 0.5 * (2.0 * PI * y as f32 / ny as f32).cos()) * across[x]
        });
        let image = Image2D::new(data, 2.0, 1.0);

        assert_eq!(max_contrast_row(&image), 0);
        let (profile, ix) = select_profile(&image);
        assert_eq!(ix, 13);
        assert_eq!(profile.index, 13);
        assert_eq!(profile.len(), ny);
        assert_eq!(profile.scale, 2.0);
        assert!((profile.data[0] + 1.5).abs() < 1e-5);

        let selection = select_profile_at(&image);
        assert_eq!(selection.row, 0);
        assert_eq!(selection.column, 13);
        assert_eq!(selection.profile, profile);
    }

    #[test]
    fn test_select_profile_on_empty_image() {
        let image = Image2D::isotropic(Array2::zeros((0, 5)), 1.0);
        let selection = select_profile_at(&image);
        assert!(selection.profile.is_empty());
        assert_eq!((selection.row, selection.column), (0, 0));
    }
}
