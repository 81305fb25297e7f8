//! Filters applied to projected filament images before the periodicity analysis.
//!
//! # Filter Implementations
//!
//! Each filter implements the `Filter` trait defined in the `filter` module, so the analysis
//! pipeline can swap the moiré band pass for another filter without changing the later
//! stages.

/// Frequency domain band pass keeping the long-wavelength moiré band along the filament.
/// Also provides the 2D forward and inverse transforms it is built on.
pub mod band_pass;

/// Core filter interfaces and shared components.
/// Defines the `Filter` trait and supporting structures used by all filter implementations.
pub mod filter;
