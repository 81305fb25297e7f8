//! This module provides the `Filter` trait used to prepare projected filament images before
//! the profile search. A filter turns an [`Image2D`] into a filtered image of the same shape and
//! reports the spectrum it worked on, so that observers can display it.

use crate::data_container::{Image2D, Spectrum2D};
use std::fmt::Debug;

/// The `Filter` trait defines the structure and behavior of an image filter.
///
/// Filters must implement:
/// - A `config` function to provide metadata for the filter.
/// - A `filter` function to apply the filter to an `Image2D`.
///
/// Filters are pure: the input image is only read, the output is newly allocated.
///
/// **Example**:
/// ```rust
/// use moire_skew::data_container::Image2D;
/// use moire_skew::filters::filter::{Filter, FilterConfig, FilterDomain, FilterOutput};
/// use moire_skew::filters::band_pass::fft2;
///
/// #[derive(Debug, Clone)]
/// struct Identity;
///
/// impl Filter for Identity {
///     fn config(&self) -> FilterConfig {
///         FilterConfig {
///             name: "Identity".to_string(),
///             description: "Returns the input unchanged.".to_string(),
///             domain: FilterDomain::Spatial,
///         }
///     }
///
///     fn filter(&self, input: &Image2D) -> FilterOutput {
///         FilterOutput {
///             filtered: input.clone(),
///             spectrum: fft2(&input.data.view(), input.data.nrows().max(input.data.ncols())),
///         }
///     }
/// }
/// ```
pub trait Filter: Send + Sync + Debug {
    /// Returns the filter configuration, including name, description and domain.
    fn config(&self) -> FilterConfig;

    /// Applies the filter to the given image.
    ///
    /// # Arguments
    ///
    /// - `input`: The projected image to be processed. It is never modified.
    ///
    /// # Returns
    /// A new `FilterOutput` with the filtered image (same shape as `input`) and the
    /// unfiltered spectrum the filter operated on.
    fn filter(&self, input: &Image2D) -> FilterOutput;
}

/// The `FilterDomain` enum specifies in which domain a filter operates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDomain {
    /// Filters that operate directly on the pixels.
    Spatial,
    /// Filters that mask the 2D Fourier transform of the image.
    Frequency,
}

/// A structure representing the configuration and metadata of a filter.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// The name of the filter, used for identification and logging.
    pub name: String,
    /// A description of the filter, explaining its purpose and functionality.
    pub description: String,
    /// The domain in which the filter operates, represented by `FilterDomain`.
    pub domain: FilterDomain,
}

/// Result of [`Filter::filter`].
#[derive(Debug, Clone)]
pub struct FilterOutput {
    /// Filtered image, cropped to the input shape.
    pub filtered: Image2D,
    /// Full (unmasked) spectrum of the padded input.
    pub spectrum: Spectrum2D,
}
