//! Skew measurement for a batch of filaments provided by a host application.
//!
//! The host supplies straightened projections through [`ProjectionSource`] and keeps
//! per-curve properties in a [`PropertyStore`]. Filaments are independent: they are analyzed
//! sequentially or on the rayon pool, collected, and only then reported and written back in
//! input order.

use crate::config::{AnalysisSettings, PRIOR_SKEW_PROPERTY, SKEW_PROPERTY};
use crate::data_container::Image2D;
use crate::error::{Result, SkewError};
use crate::pipeline::{LogObserver, SkewAnalysis, SkewReport};
use crate::skew::{SkewEstimate, SkewSign};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering::Relaxed};

/// Provider of projected filament images.
pub trait ProjectionSource: Send + Sync {
    /// Straightens filament `index` over a lateral `width` and projects it to 2D.
    fn straighten(&self, index: usize, width: f32) -> Result<Image2D>;

    /// Number of filaments available.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-curve scalar properties owned by the host.
pub trait PropertyStore {
    /// Previously estimated skew angle of filament `index`, if any.
    fn skew_angle(&self, index: usize) -> Option<f32>;

    /// Writes a property of filament `index` computed at `bin_size`.
    fn set_property(&mut self, index: usize, name: &str, bin_size: usize, value: f32);
}

/// Projections kept in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProjections {
    pub images: Vec<Image2D>,
}

impl ProjectionSource for InMemoryProjections {
    fn straighten(&self, index: usize, _width: f32) -> Result<Image2D> {
        self.images
            .get(index)
            .cloned()
            .ok_or_else(|| SkewError::Straighten {
                index,
                reason: format!("only {} projections available", self.images.len()),
            })
    }

    fn len(&self) -> usize {
        self.images.len()
    }
}

/// Name of a stored property, optionally scoped by a bin size.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropertyKey {
    pub name: String,
    pub bin_size: Option<usize>,
}

impl Display for PropertyKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.bin_size {
            Some(bin_size) => write!(f, "{}_bin{}", self.name, bin_size),
            None => write!(f, "{}", self.name),
        }
    }
}

/// In-memory [`PropertyStore`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyTable {
    pub values: BTreeMap<usize, BTreeMap<PropertyKey, f32>>,
}

impl PropertyTable {
    pub fn new() -> Self {
        PropertyTable::default()
    }

    /// Stores a global property, e.g. a previously measured skew angle.
    pub fn set_global(&mut self, index: usize, name: &str, value: f32) {
        self.values.entry(index).or_default().insert(
            PropertyKey {
                name: name.to_string(),
                bin_size: None,
            },
            value,
        );
    }

    pub fn get(&self, index: usize, name: &str, bin_size: Option<usize>) -> Option<f32> {
        let key = PropertyKey {
            name: name.to_string(),
            bin_size,
        };
        self.values.get(&index).and_then(|props| props.get(&key).copied())
    }

    /// All property keys in sorted order.
    pub fn columns(&self) -> Vec<PropertyKey> {
        let mut columns: Vec<PropertyKey> = self
            .values
            .values()
            .flat_map(|props| props.keys().cloned())
            .collect();
        columns.sort();
        columns.dedup();
        columns
    }
}

impl PropertyStore for PropertyTable {
    fn skew_angle(&self, index: usize) -> Option<f32> {
        self.get(index, PRIOR_SKEW_PROPERTY, None)
    }

    fn set_property(&mut self, index: usize, name: &str, bin_size: usize, value: f32) {
        self.values.entry(index).or_default().insert(
            PropertyKey {
                name: name.to_string(),
                bin_size: Some(bin_size),
            },
            value,
        );
    }
}

/// Store reporting the same prior handedness for every filament. Writes go to `inner`.
#[derive(Debug)]
pub struct UniformSign<'a, P: PropertyStore> {
    pub sign: SkewSign,
    pub inner: &'a mut P,
}

impl<P: PropertyStore> PropertyStore for UniformSign<'_, P> {
    fn skew_angle(&self, _index: usize) -> Option<f32> {
        Some(self.sign.as_f32())
    }

    fn set_property(&mut self, index: usize, name: &str, bin_size: usize, value: f32) {
        self.inner.set_property(index, name, bin_size, value);
    }
}

/// Result of one filament of a batch.
#[derive(Debug, Clone)]
pub struct BatchEntry {
    pub index: usize,
    pub report: SkewReport,
    /// Stage messages of the analysis, not yet logged.
    pub stages: LogObserver,
}

/// Runs the analysis for every filament in `indices`.
///
/// The sign of each estimate is taken from the filament's stored skew angle. Entries are
/// returned in input order, each carrying its buffered stage messages for the caller to
/// flush. When `abort_flag` is set, filaments that have not been started are skipped. The
/// first host error aborts the batch and is returned unchanged.
pub fn analyze_batch<S: ProjectionSource + ?Sized>(
    source: &S,
    store: &dyn PropertyStore,
    indices: &[usize],
    analysis: &SkewAnalysis,
    abort_flag: &AtomicBool,
) -> Result<Vec<BatchEntry>> {
    let jobs: Vec<(usize, SkewSign)> = indices
        .iter()
        .map(|&i| (i, SkewSign::from_prior(store.skew_angle(i))))
        .collect();
    let width = analysis.settings.width;

    let run_one = |&(index, sign): &(usize, SkewSign)| -> Result<BatchEntry> {
        let image = source.straighten(index, width)?;
        let mut stages = LogObserver::buffered(format!("filament {index}"));
        let report = analysis.run(&image, sign, &mut stages);
        Ok(BatchEntry {
            index,
            report,
            stages,
        })
    };

    let results: Vec<Result<BatchEntry>> = if analysis.settings.parallel {
        jobs.par_iter()
            .filter_map(|job| {
                if abort_flag.load(Relaxed) {
                    None
                } else {
                    Some(run_one(job))
                }
            })
            .collect()
    } else {
        let mut results = vec![];
        for job in jobs.iter() {
            if abort_flag.load(Relaxed) {
                break;
            }
            let result = run_one(job);
            let failed = result.is_err();
            results.push(result);
            if failed {
                break;
            }
        }
        results
    };

    if results.len() < jobs.len() && abort_flag.load(Relaxed) {
        log::warn!(
            "skew measurement aborted after {} of {} filaments",
            results.len(),
            jobs.len()
        );
    }
    results.into_iter().collect()
}

/// Measures the moiré skew angle of every filament in `indices` and writes it to `store` as
/// `moire_skew_angle` scoped by the configured bin size.
pub fn measure_skew<S: ProjectionSource + ?Sized, P: PropertyStore>(
    source: &S,
    store: &mut P,
    indices: &[usize],
    settings: &AnalysisSettings,
    abort_flag: &AtomicBool,
) -> Result<BTreeMap<usize, SkewEstimate>> {
    let analysis = SkewAnalysis::new(settings.clone());
    let entries = analyze_batch(source, &*store, indices, &analysis, abort_flag)?;

    let mut estimates = BTreeMap::new();
    for mut entry in entries {
        entry.stages.flush();
        let (index, estimate) = (entry.index, entry.report.estimate);
        log::info!(
            "filament {index}: skew {:.3} deg (frequency {:.3}, sign {})",
            estimate.angle_degrees,
            estimate.frequency_bin,
            estimate.sign
        );
        store.set_property(index, SKEW_PROPERTY, settings.bin_size, estimate.angle_degrees);
        estimates.insert(index, estimate);
    }
    Ok(estimates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{spacing_for, synthetic_filament};
    use approx::assert_relative_eq;

    struct FailingSource;

    impl ProjectionSource for FailingSource {
        fn straighten(&self, index: usize, _width: f32) -> Result<Image2D> {
            Err(SkewError::Straighten {
                index,
                reason: "spline not fitted".to_string(),
            })
        }

        fn len(&self) -> usize {
            3
        }
    }

    fn source() -> InMemoryProjections {
        InMemoryProjections {
            images: vec![
                synthetic_filament(512, 32, 2.0, 8.0),
                synthetic_filament(512, 32, 2.0, 8.0),
                synthetic_filament(512, 32, 2.0, 6.0),
            ],
        }
    }

    fn settings(parallel: bool) -> AnalysisSettings {
        AnalysisSettings {
            pf_spacing: spacing_for(1024.0, 8.0, 0.5),
            bin_size: 2,
            parallel,
            ..AnalysisSettings::default()
        }
    }

    fn store() -> PropertyTable {
        let mut store = PropertyTable::new();
        store.set_global(0, PRIOR_SKEW_PROPERTY, 0.4);
        store.set_global(1, PRIOR_SKEW_PROPERTY, -0.2);
        store
    }

    #[test]
    fn test_measure_skew_writes_binned_property() {
        let mut store = store();
        let abort = AtomicBool::new(false);
        let estimates =
            measure_skew(&source(), &mut store, &[0, 1, 2], &settings(false), &abort).unwrap();

        assert_eq!(estimates.keys().copied().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_relative_eq!(estimates[&0].angle_degrees, 0.5, epsilon = 0.1);
        assert_relative_eq!(estimates[&1].angle_degrees, -0.5, epsilon = 0.1);
        // no prior estimate for filament 2
        assert_eq!(estimates[&2].angle_degrees, 0.0);
        assert_eq!(estimates[&2].sign, SkewSign::Unknown);

        let written = store.get(1, SKEW_PROPERTY, Some(2)).unwrap();
        assert_eq!(written, estimates[&1].angle_degrees);
        assert_eq!(store.get(1, SKEW_PROPERTY, None), None);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let abort = AtomicBool::new(false);
        let mut sequential_store = store();
        let mut parallel_store = store();
        let sequential =
            measure_skew(&source(), &mut sequential_store, &[2, 0, 1], &settings(false), &abort)
                .unwrap();
        let parallel =
            measure_skew(&source(), &mut parallel_store, &[2, 0, 1], &settings(true), &abort)
                .unwrap();
        assert_eq!(sequential, parallel);
        assert_eq!(sequential_store, parallel_store);
    }

    #[test]
    fn test_parallel_stage_messages_keep_input_order() {
        let abort = AtomicBool::new(false);
        let analysis = SkewAnalysis::new(settings(true));
        let entries = analyze_batch(&source(), &store(), &[2, 0, 1], &analysis, &abort).unwrap();

        let order: Vec<usize> = entries.iter().map(|e| e.index).collect();
        assert_eq!(order, vec![2, 0, 1]);
        let labels: Vec<&str> = entries.iter().map(|e| e.stages.label.as_str()).collect();
        assert_eq!(labels, vec!["filament 2", "filament 0", "filament 1"]);
        for entry in entries.iter() {
            let pending = entry.stages.pending();
            assert_eq!(pending.len(), 3);
            assert!(pending[0].starts_with("spectrum"));
            assert_eq!(
                pending[1],
                format!("profile at column {} (512 samples)", entry.report.column)
            );
            assert!(pending[2].starts_with("local power spectrum"));
        }
    }

    #[test]
    fn test_uniform_sign_keeps_prior_out_of_table() {
        let abort = AtomicBool::new(false);
        let mut table = PropertyTable::new();
        let mut store = UniformSign {
            sign: SkewSign::Negative,
            inner: &mut table,
        };
        let estimates =
            measure_skew(&source(), &mut store, &[0, 2], &settings(false), &abort).unwrap();
        assert_relative_eq!(estimates[&0].angle_degrees, -0.5, epsilon = 0.1);
        assert_eq!(estimates[&2].sign, SkewSign::Negative);

        let columns: Vec<String> = table.columns().iter().map(|c| c.to_string()).collect();
        assert_eq!(columns, vec!["moire_skew_angle_bin2"]);
        assert_eq!(table.get(0, PRIOR_SKEW_PROPERTY, None), None);
    }

    #[test]
    fn test_abort_skips_remaining_filaments() {
        let abort = AtomicBool::new(true);
        let mut store = store();
        let estimates =
            measure_skew(&source(), &mut store, &[0, 1, 2], &settings(false), &abort).unwrap();
        assert!(estimates.is_empty());
        assert_eq!(store.get(0, SKEW_PROPERTY, Some(2)), None);
    }

    #[test]
    fn test_host_errors_propagate() {
        let abort = AtomicBool::new(false);
        let mut store = store();
        let result = measure_skew(&FailingSource, &mut store, &[1], &settings(false), &abort);
        match result {
            Err(SkewError::Straighten { index, .. }) => assert_eq!(index, 1),
            other => panic!("unexpected result: {other:?}"),
        }

        let result = measure_skew(&source(), &mut store, &[7], &settings(true), &abort);
        assert!(matches!(result, Err(SkewError::Straighten { index: 7, .. })));
    }

    #[test]
    fn test_property_table_columns() {
        let mut table = store();
        table.set_property(0, SKEW_PROPERTY, 1, 0.25);
        let columns: Vec<String> = table.columns().iter().map(|c| c.to_string()).collect();
        assert_eq!(columns, vec!["moire_skew_angle_bin1", "skew_angle"]);
    }
}
