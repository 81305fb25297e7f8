//! Chains the analysis stages for a single projected filament.
//!
//! `SkewAnalysis::run` applies the band pass filter, selects the profile, estimates its
//! periodicity and converts it into an angle. A [`StageObserver`] is notified after each stage
//! and can be used for progress reporting or for displaying intermediate results without
//! touching the numerical code.

use crate::config::AnalysisSettings;
use crate::data_container::{Image2D, Profile1D, Spectrum2D};
use crate::filters::band_pass::MoireBandPass;
use crate::filters::filter::Filter;
use crate::periodicity::{frequency_of_peak, local_band, local_power_spectrum};
use crate::profile::select_profile_at;
use crate::skew::{compute_angle, SkewEstimate, SkewSign};
use ndarray::Array1;

/// Callbacks invoked after the stages of [`SkewAnalysis::run`]. All of them are optional.
pub trait StageObserver {
    /// The 2D spectrum and the filtered image are available.
    fn spectrum_ready(&mut self, _spectrum: &Spectrum2D, _filtered: &Image2D) {}

    /// The profile along the filament has been selected.
    fn profile_selected(&mut self, _profile: &Profile1D) {}

    /// The local power spectrum of the profile and its peak frequency are available.
    fn profile_spectrum_ready(&mut self, _power: &Array1<f32>, _frequency_bin: f32) {}
}

/// Observer that ignores every stage.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl StageObserver for NoopObserver {}

/// Observer reporting every stage to the log at debug level.
///
/// A buffered observer keeps its messages until [`LogObserver::flush`] is called, so that
/// stages of analyses running on several threads can be reported in a fixed order.
#[derive(Debug, Clone)]
pub struct LogObserver {
    pub label: String,
    pending: Option<Vec<String>>,
}

impl LogObserver {
    /// Observer logging each stage as soon as it is reached.
    pub fn new(label: impl Into<String>) -> Self {
        LogObserver {
            label: label.into(),
            pending: None,
        }
    }

    /// Observer collecting its messages until [`LogObserver::flush`].
    pub fn buffered(label: impl Into<String>) -> Self {
        LogObserver {
            label: label.into(),
            pending: Some(vec![]),
        }
    }

    /// Messages recorded and not yet logged.
    pub fn pending(&self) -> &[String] {
        self.pending.as_deref().unwrap_or(&[])
    }

    /// Logs and clears the recorded messages.
    pub fn flush(&mut self) {
        if let Some(pending) = self.pending.as_mut() {
            for message in pending.drain(..) {
                log::debug!("[{}] {message}", self.label);
            }
        }
    }

    fn record(&mut self, message: String) {
        match self.pending.as_mut() {
            Some(pending) => pending.push(message),
            None => log::debug!("[{}] {message}", self.label),
        }
    }
}

impl StageObserver for LogObserver {
    fn spectrum_ready(&mut self, spectrum: &Spectrum2D, filtered: &Image2D) {
        let (ny, nx) = filtered.dim();
        let size = spectrum.size();
        self.record(format!(
            "spectrum {size}x{size} ready, filtered image {ny}x{nx}"
        ));
    }

    fn profile_selected(&mut self, profile: &Profile1D) {
        self.record(format!(
            "profile at column {} ({} samples)",
            profile.index,
            profile.len()
        ));
    }

    fn profile_spectrum_ready(&mut self, power: &Array1<f32>, frequency_bin: f32) {
        self.record(format!(
            "local power spectrum with {} samples, peak at {frequency_bin:.3}",
            power.len()
        ));
    }
}

/// Everything computed for one filament.
#[derive(Debug, Clone)]
pub struct SkewReport {
    pub estimate: SkewEstimate,
    /// Row with the highest fringe contrast.
    pub row: usize,
    /// Column of the selected profile.
    pub column: usize,
    pub filtered: Image2D,
}

/// The skew analysis with its parameters.
#[derive(Debug)]
pub struct SkewAnalysis {
    pub settings: AnalysisSettings,
    filter: Box<dyn Filter>,
}

impl SkewAnalysis {
    /// Analysis using the moiré band pass configured by `settings`.
    pub fn new(settings: AnalysisSettings) -> Self {
        let filter = Box::new(MoireBandPass::new(settings.cutoff_length));
        SkewAnalysis { settings, filter }
    }

    /// Replaces the band pass by another filter.
    pub fn with_filter(mut self, filter: Box<dyn Filter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn filter_name(&self) -> String {
        self.filter.config().name
    }

    pub fn run(
        &self,
        image: &Image2D,
        sign: SkewSign,
        observer: &mut dyn StageObserver,
    ) -> SkewReport {
        let output = self.filter.filter(image);
        observer.spectrum_ready(&output.spectrum, &output.filtered);

        let selection = select_profile_at(&output.filtered);
        let profile = selection.profile;
        observer.profile_selected(&profile);

        let upsample_factor = self.settings.upsample_factor;
        let ymax_loc = local_band(profile.length(), self.settings.min_period_length);
        let power = local_power_spectrum(&profile.data.view(), ymax_loc, upsample_factor);
        let frequency_bin = frequency_of_peak(&power.view(), upsample_factor, profile.length());
        observer.profile_spectrum_ready(&power, frequency_bin);

        let estimate = compute_angle(
            frequency_bin,
            profile.scale,
            profile.len(),
            self.settings.pf_spacing,
            sign,
        );

        SkewReport {
            estimate,
            row: selection.row,
            column: selection.column,
            filtered: output.filtered,
        }
    }
}
