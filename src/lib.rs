//! Skew angle estimation of helical filaments from the moiré pattern in their projections.
//!
//! A straightened projection of a filament (e.g. a microtubule) shows a slow beat along its
//! axis when the protofilaments are supertwisted. The analysis isolates that beat with a
//! directional band pass ([`filters::band_pass`]), picks a representative trace along the
//! filament ([`profile`]), measures its period with sub-bin resolution ([`periodicity`]) and
//! converts the period into a signed angle ([`skew`]). [`pipeline`] chains the stages for one
//! image and [`batch`] runs them for many filaments of a host application.

pub mod batch;
pub mod config;
pub mod data_container;
pub mod error;
pub mod filters;
pub mod io;
pub mod math_tools;
pub mod periodicity;
pub mod pipeline;
pub mod profile;
pub mod skew;

#[cfg(test)]
pub(crate) mod test_utils;

pub use batch::{measure_skew, ProjectionSource, PropertyStore, PropertyTable};
pub use config::AnalysisSettings;
pub use data_container::{Image2D, Profile1D, Spectrum2D};
pub use error::{Result, SkewError};
pub use pipeline::{SkewAnalysis, SkewReport, StageObserver};
pub use skew::{SkewEstimate, SkewSign};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
