//! Periodicity estimate of a 1D profile from its upsampled local power spectrum.
//!
//! Only the low-frequency band `[0, ymax_loc)` is searched, where `ymax_loc` is the number of
//! periods of the shortest periodicity of interest that fit into the profile. The spectrum in
//! that band is sampled `upsample_factor` times per integer frequency bin by zero padding the
//! (mean centered) profile to `upsample_factor` times its length.

use crate::data_container::Profile1D;
use crate::math_tools::{argmax, mean};
use ndarray::{Array1, ArrayView1};
use realfft::RealFftPlanner;

pub const DEFAULT_UPSAMPLE_FACTOR: usize = 50;

/// Profiles whose peak-to-peak spread is within a few ulps of their largest magnitude are
/// treated as flat, so rounding noise of the 2D filter never produces a period.
const FLAT_PROFILE_TOLERANCE: f32 = 16.0 * f32::EPSILON;

/// Number of integer frequency bins searched for a profile of physical length `total_length`.
pub fn local_band(total_length: f32, min_period_length: f32) -> usize {
    let ymax = (total_length / min_period_length).round();
    if ymax.is_finite() && ymax > 0.0 {
        ymax as usize
    } else {
        0
    }
}

/// Power spectrum of the mean centered profile at the fractional frequencies
/// `k / upsample_factor` for `k` in `0..ymax_loc * upsample_factor`.
///
/// Frequencies are in cycles per profile length. The band is truncated at the Nyquist
/// frequency.
pub fn local_power_spectrum(
    profile: &ArrayView1<f32>,
    ymax_loc: usize,
    upsample_factor: usize,
) -> Array1<f32> {
    let n = profile.len();
    if n == 0 || ymax_loc == 0 || upsample_factor == 0 {
        return Array1::zeros(0);
    }

    let mu = mean(profile);
    let bins = ymax_loc * upsample_factor;
    let (lo, hi) = profile.fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
        (lo.min(v), hi.max(v))
    });
    let magnitude = lo.abs().max(hi.abs());
    if hi - lo <= FLAT_PROFILE_TOLERANCE * magnitude {
        return Array1::zeros(bins.min(n * upsample_factor / 2 + 1));
    }

    let m = n * upsample_factor;
    let mut real_planner = RealFftPlanner::<f32>::new();
    let r2c = real_planner.plan_fft_forward(m);
    let mut input = r2c.make_input_vec();
    for (dst, v) in input.iter_mut().zip(profile.iter()) {
        *dst = v - mu;
    }
    let mut spectrum = r2c.make_output_vec();
    if let Err(err) = r2c.process(&mut input, &mut spectrum) {
        log::error!("local power spectrum failed: {err}");
        return Array1::zeros(0);
    }

    let bins = bins.min(spectrum.len());
    spectrum[..bins].iter().map(|c| c.norm_sqr()).collect()
}

/// Frequency (cycles per profile length) of the strongest periodicity in the band, with a
/// resolution of `1 / upsample_factor`. Returns 0.0 if nothing periodic is found.
///
/// # Arguments
/// - `profile`: the trace along the filament.
/// - `scale_per_sample`: physical length of one sample.
/// - `total_length`: physical length the frequencies refer to.
/// - `min_period_length`: shortest periodicity searched.
/// - `upsample_factor`: spectrum samples per integer frequency bin.
pub fn estimate_period(
    profile: &ArrayView1<f32>,
    scale_per_sample: f32,
    total_length: f32,
    min_period_length: f32,
    upsample_factor: usize,
) -> f32 {
    let ymax_loc = local_band(total_length, min_period_length);
    let power = local_power_spectrum(profile, ymax_loc, upsample_factor);
    frequency_of_peak(&power.view(), upsample_factor, profile.len() as f32 * scale_per_sample)
}

/// Converts the argmax of a local power spectrum into a fractional frequency bin.
pub fn frequency_of_peak(power: &ArrayView1<f32>, upsample_factor: usize, length: f32) -> f32 {
    let peak_power = power.fold(0.0_f32, |acc, &v| acc.max(v));
    if upsample_factor == 0 || peak_power <= 0.0 {
        log::debug!("no periodicity detected");
        return 0.0;
    }
    let frequency = argmax(power).unwrap_or(0) as f32 / upsample_factor as f32;
    if frequency > 0.0 {
        log::debug!(
            "periodicity: {frequency:.3} cycles, period {:.3}",
            length / frequency
        );
    }
    frequency
}

/// [`estimate_period`] for a [`Profile1D`] over its own length.
pub fn estimate_profile_period(
    profile: &Profile1D,
    min_period_length: f32,
    upsample_factor: usize,
) -> f32 {
    estimate_period(
        &profile.data.view(),
        profile.scale,
        profile.length(),
        min_period_length,
        upsample_factor,
    )
}
