//! Analysis parameters and their persistence.
//!
//! Settings are stored with the `preferences` crate in the platform's
//! application data directory, the same way GUI settings are kept between
//! sessions. A missing or unreadable entry falls back to the defaults.

use crate::error::Result;
use preferences::{AppInfo, Preferences};
use serde::{Deserialize, Serialize};

pub const APP_INFO: AppInfo = AppInfo {
    name: "moire-skew",
    author: "Linus Leo Stöckli",
};

/// Key under which [`AnalysisSettings`] are stored.
pub const SETTINGS_KEY: &str = "config/analysis";

/// Name of the per-curve property written back to the host.
pub const SKEW_PROPERTY: &str = "moire_skew_angle";

/// Name of the previously estimated skew angle the sign is taken from.
pub const PRIOR_SKEW_PROPERTY: &str = "skew_angle";

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct AnalysisSettings {
    /// Shortest periodicity (physical units) kept by the band filter.
    pub cutoff_length: f32,
    /// Shortest periodicity searched by the periodicity estimator.
    pub min_period_length: f32,
    /// Samples per integer frequency bin of the local power spectrum.
    pub upsample_factor: usize,
    /// Lateral distance between neighbouring protofilaments.
    pub pf_spacing: f32,
    /// Lateral width passed to the host when straightening.
    pub width: f32,
    /// Opaque tag distinguishing the resolution the properties belong to.
    pub bin_size: usize,
    /// Process filaments of a batch on the rayon pool.
    pub parallel: bool,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        AnalysisSettings {
            cutoff_length: 100.0,
            min_period_length: 100.0,
            upsample_factor: 50,
            pf_spacing: 5.2,
            width: 40.0,
            bin_size: 1,
            parallel: false,
        }
    }
}

impl AnalysisSettings {
    /// Loads the stored settings, writing the defaults on first use.
    pub fn load_or_default() -> AnalysisSettings {
        match AnalysisSettings::load(&APP_INFO, SETTINGS_KEY) {
            Ok(settings) => settings,
            Err(err) => {
                log::debug!("no stored analysis settings ({err}), using defaults");
                let settings = AnalysisSettings::default();
                if let Err(err) = settings.store() {
                    log::error!("error in saving analysis settings: {err}");
                }
                settings
            }
        }
    }

    pub fn store(&self) -> Result<()> {
        self.save(&APP_INFO, SETTINGS_KEY)?;
        Ok(())
    }
}
