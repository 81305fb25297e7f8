//! Conversion of a moiré period into a skew angle.
//!
//! Two protofilament lattices of opposite handedness, separated laterally by `pf_spacing`,
//! produce a beat with period `pf_spacing / sin(skew)`. The angle is therefore
//! `asin(pf_spacing / period)`, signed by the handedness known from a previous estimate.

use std::fmt::{Display, Formatter};

/// Handedness of the skew.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SkewSign {
    Negative,
    /// No orientation known yet.
    #[default]
    Unknown,
    Positive,
}

impl SkewSign {
    /// Sign of a previously stored skew angle. Missing, zero and NaN values give `Unknown`.
    pub fn from_prior(prior: Option<f32>) -> SkewSign {
        match prior {
            Some(v) if v > 0.0 => SkewSign::Positive,
            Some(v) if v < 0.0 => SkewSign::Negative,
            _ => SkewSign::Unknown,
        }
    }

    pub fn from_i8(sign: i8) -> SkewSign {
        match sign.signum() {
            1 => SkewSign::Positive,
            -1 => SkewSign::Negative,
            _ => SkewSign::Unknown,
        }
    }

    pub fn as_f32(&self) -> f32 {
        match self {
            SkewSign::Negative => -1.0,
            SkewSign::Unknown => 0.0,
            SkewSign::Positive => 1.0,
        }
    }
}

impl Display for SkewSign {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SkewSign::Negative => write!(f, "-1"),
            SkewSign::Unknown => write!(f, "0"),
            SkewSign::Positive => write!(f, "+1"),
        }
    }
}

/// Result of the angle conversion.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SkewEstimate {
    /// Moiré frequency in cycles per profile length.
    pub frequency_bin: f32,
    /// Moiré period in physical units, `None` if no periodicity was detected.
    pub period_length: Option<f32>,
    /// Signed skew angle in degrees.
    pub angle_degrees: f32,
    pub sign: SkewSign,
}

impl SkewEstimate {
    /// Estimate for a profile without detectable periodicity.
    pub fn zero(sign: SkewSign) -> SkewEstimate {
        SkewEstimate {
            frequency_bin: 0.0,
            period_length: None,
            angle_degrees: 0.0,
            sign,
        }
    }
}

/// Converts a moiré frequency into a signed skew angle.
///
/// # Arguments
/// - `frequency_bin`: moiré frequency in cycles over `num_samples` samples.
/// - `scale_per_sample`: physical length of one sample.
/// - `num_samples`: number of samples the frequency refers to.
/// - `pf_spacing`: lateral distance between protofilaments, same unit as the scale.
/// - `sign`: handedness of the skew.
///
/// A zero frequency yields exactly 0 degrees. Ratios above one, caused by noisy period
/// estimates, are clamped so the angle saturates at 90 degrees.
pub fn compute_angle(
    frequency_bin: f32,
    scale_per_sample: f32,
    num_samples: usize,
    pf_spacing: f32,
    sign: SkewSign,
) -> SkewEstimate {
    if frequency_bin == 0.0 {
        return SkewEstimate::zero(sign);
    }
    let period_length = scale_per_sample * num_samples as f32 / frequency_bin;
    let ratio = (pf_spacing / period_length).min(1.0);
    let angle_degrees = match sign {
        SkewSign::Unknown => 0.0,
        _ => ratio.asin().to_degrees() * sign.as_f32(),
    };
    SkewEstimate {
        frequency_bin,
        period_length: Some(period_length),
        angle_degrees,
        sign,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_zero_frequency_short_circuits() {
        for sign in [SkewSign::Negative, SkewSign::Unknown, SkewSign::Positive] {
            for spacing in [0.0, 5.2, 1e6] {
                let estimate = compute_angle(0.0, 1.0, 1024, spacing, sign);
                assert_eq!(estimate.angle_degrees, 0.0);
                assert_eq!(estimate.period_length, None);
            }
        }
    }

    #[test]
    fn test_ratio_is_clamped() {
        // period = 1024 / 512 = 2 < spacing
        let estimate = compute_angle(512.0, 1.0, 1024, 5.0, SkewSign::Positive);
        assert_relative_eq!(estimate.angle_degrees, 90.0, epsilon = 1e-4);
        let estimate = compute_angle(512.0, 1.0, 1024, 5.0, SkewSign::Negative);
        assert_relative_eq!(estimate.angle_degrees, -90.0, epsilon = 1e-4);
        assert!(!estimate.angle_degrees.is_nan());
    }

    #[test]
    fn test_angle_from_period() {
        let theta = 0.8_f32;
        let frequency = 7.0;
        let period = 1024.0 * 0.5 / frequency;
        let spacing = period * theta.to_radians().sin();
        let estimate = compute_angle(frequency, 0.5, 1024, spacing, SkewSign::Negative);
        assert_relative_eq!(estimate.period_length.unwrap(), period, epsilon = 1e-3);
        assert_relative_eq!(estimate.angle_degrees, -theta, epsilon = 1e-3);
    }

    #[test]
    fn test_unknown_sign_yields_zero_angle() {
        let estimate = compute_angle(7.0, 1.0, 1024, 5.0, SkewSign::Unknown);
        assert_eq!(estimate.angle_degrees, 0.0);
        assert!(estimate.period_length.is_some());
    }

    #[test]
    fn test_sign_from_prior() {
        assert_eq!(SkewSign::from_prior(Some(0.3)), SkewSign::Positive);
        assert_eq!(SkewSign::from_prior(Some(-0.01)), SkewSign::Negative);
        assert_eq!(SkewSign::from_prior(Some(0.0)), SkewSign::Unknown);
        assert_eq!(SkewSign::from_prior(Some(f32::NAN)), SkewSign::Unknown);
        assert_eq!(SkewSign::from_prior(None), SkewSign::Unknown);
        assert_eq!(SkewSign::from_i8(-3), SkewSign::Negative);
        assert_eq!(SkewSign::from_i8(0).to_string(), "0");
    }
}
