//! Reading projections from disk and writing results.

use crate::batch::{ProjectionSource, PropertyTable};
use crate::data_container::Image2D;
use crate::error::{Result, SkewError};
use crate::math_tools::rotate_90_ccw;
use crate::pipeline::{LogObserver, SkewAnalysis};
use crate::skew::SkewSign;
use csv::WriterBuilder;
use image::{ImageBuffer, Luma};
use ndarray::{Array2, ArrayD, ArrayView2, Axis, Ix2};
use ndarray_npy::{read_npy, ReadNpyError};
use std::fs;
use std::path::{Path, PathBuf};

/// Writes one row per filament with every property stored in `table`.
///
/// The header is `index` followed by the property names. Values are written with three
/// decimals, missing values are left empty.
pub fn save_results_as_csv(path: &Path, table: &PropertyTable) -> Result<()> {
    let columns = table.columns();
    let mut wtr = WriterBuilder::new().has_headers(false).from_path(path)?;

    let mut header = vec!["index".to_string()];
    header.extend(columns.iter().map(|c| c.to_string()));
    wtr.write_record(&header)?;

    for (index, props) in table.values.iter() {
        let mut record = vec![index.to_string()];
        record.extend(columns.iter().map(|c| match props.get(c) {
            Some(value) => format!("{value:.3}"),
            None => String::new(),
        }));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    log::info!("saved {} rows to {}", table.values.len(), path.display());
    Ok(())
}

/// Exports the artifacts of filament `index` for downstream lattice analysis.
///
/// Writes `<index>-projection.tif`, `<index>-filtered.tif` if `filtered` is given, and
/// `<index>-calibration.txt` into `dir`. Images are rotated by 90 degrees counterclockwise
/// so the filament runs horizontally. The calibration gives the pixel size in Ångström.
///
/// Returns the written paths. Fails with [`SkewError::InvalidDestination`] without writing
/// anything if `dir` is not an existing directory.
pub fn export_for_downstream(
    dir: &Path,
    index: usize,
    projection: &Image2D,
    filtered: Option<&Image2D>,
) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(SkewError::InvalidDestination(dir.to_path_buf()));
    }
    let mut written = vec![];

    let path = dir.join(format!("{index}-projection.tif"));
    save_tiff(&rotate_90_ccw(&projection.data.view()).view(), &path)?;
    written.push(path);

    if let Some(filtered) = filtered {
        let path = dir.join(format!("{index}-filtered.tif"));
        save_tiff(&rotate_90_ccw(&filtered.data.view()).view(), &path)?;
        written.push(path);
    }

    let path = dir.join(format!("{index}-calibration.txt"));
    fs::write(&path, calibration_text(projection.scale_y))?;
    written.push(path);

    log::info!("exported filament {index} to {}", dir.display());
    Ok(written)
}

/// Exports every filament of `source` into `dir`, with the band pass filtered image when an
/// `analysis` is given.
///
/// The destination is checked before any filament is straightened.
pub fn export_projections<S: ProjectionSource + ?Sized>(
    source: &S,
    dir: &Path,
    width: f32,
    analysis: Option<&SkewAnalysis>,
) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(SkewError::InvalidDestination(dir.to_path_buf()));
    }
    let mut written = vec![];
    for index in 0..source.len() {
        let projection = source.straighten(index, width)?;
        let filtered = analysis.map(|analysis| {
            let mut observer = LogObserver::new(format!("filament {index}"));
            analysis
                .run(&projection, SkewSign::Unknown, &mut observer)
                .filtered
        });
        written.extend(export_for_downstream(
            dir,
            index,
            &projection,
            filtered.as_ref(),
        )?);
    }
    Ok(written)
}

/// Calibration table for a pixel size given in nm.
pub fn calibration_text(scale_nm: f32) -> String {
    format!("pixelSize\tunit\n{:.2}\t?", scale_nm * 10.0)
}

/// Saves `data` as a 16 bit grayscale image, linearly scaled from its minimum to its maximum.
fn save_tiff(data: &ArrayView2<f32>, path: &Path) -> Result<()> {
    let (rows, cols) = data.dim();
    let (min, max) = data.fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
        (lo.min(v), hi.max(v))
    });
    let range = max - min;
    let img = ImageBuffer::from_fn(cols as u32, rows as u32, |x, y| {
        let v = data[[y as usize, x as usize]];
        let scaled = if range > 0.0 {
            (v - min) / range * u16::MAX as f32
        } else {
            0.0
        };
        Luma([scaled.round() as u16])
    });
    img.save(path)?;
    Ok(())
}

/// Loads a projection from a `.npy` file.
///
/// 2D arrays are used as they are. 3D arrays are treated as a stack of straightened slices
/// `(z, y, x)` and mean-projected over the first axis. Both `f32` and `f64` files are
/// accepted.
pub fn load_projection(path: &Path) -> Result<Array2<f32>> {
    let array: ArrayD<f32> = match read_npy::<_, ArrayD<f32>>(path) {
        Ok(array) => array,
        Err(ReadNpyError::WrongDescriptor(_)) => {
            read_npy::<_, ArrayD<f64>>(path)?.mapv(|v| v as f32)
        }
        Err(err) => return Err(err.into()),
    };
    project_stack(array)
}

fn project_stack(array: ArrayD<f32>) -> Result<Array2<f32>> {
    let shape = array.shape().to_vec();
    let projected = match array.ndim() {
        2 => array,
        3 => match array.mean_axis(Axis(0)) {
            Some(mean) => mean,
            None => return Err(SkewError::InvalidShape(shape)),
        },
        _ => return Err(SkewError::InvalidShape(shape)),
    };
    projected
        .into_dimensionality::<Ix2>()
        .map_err(|_| SkewError::InvalidShape(shape))
}

/// Projections stored as one `.npy` file per filament.
#[derive(Debug, Clone)]
pub struct NpyProjections {
    pub paths: Vec<PathBuf>,
    pub scale_y: f32,
    pub scale_x: f32,
}

impl NpyProjections {
    pub fn new(paths: Vec<PathBuf>, scale: f32) -> Self {
        NpyProjections {
            paths,
            scale_y: scale,
            scale_x: scale,
        }
    }
}

impl ProjectionSource for NpyProjections {
    fn straighten(&self, index: usize, _width: f32) -> Result<Image2D> {
        let path = self.paths.get(index).ok_or_else(|| SkewError::Straighten {
            index,
            reason: format!("only {} files given", self.paths.len()),
        })?;
        let data = load_projection(path)?;
        log::debug!(
            "loaded {} with shape {:?}",
            path.display(),
            data.shape()
        );
        Ok(Image2D::new(data, self.scale_y, self.scale_x))
    }

    fn len(&self) -> usize {
        self.paths.len()
    }
}
