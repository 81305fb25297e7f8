use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use log::{info, warn};
use moire_skew::batch::{measure_skew, ProjectionSource, PropertyTable, UniformSign};
use moire_skew::config::AnalysisSettings;
use moire_skew::io::{export_projections, save_results_as_csv, NpyProjections};
use moire_skew::pipeline::SkewAnalysis;
use moire_skew::skew::SkewSign;
use moire_skew::Result;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

#[derive(Parser)]
#[command(name = "moire-skew")]
#[command(about = "Estimate the skew angle of filaments from the moire pattern of their projections")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Number of threads to use (default: all available cores)
    #[arg(short, long, global = true)]
    threads: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Measure the skew angle of straightened projections stored as .npy files
    Measure {
        /// Projection files, one per filament
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Write a summary table to this CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Handedness of the skew (-1, 0 or 1); 0 reports 0 degrees for every filament
        #[arg(long, default_value = "1", allow_hyphen_values = true)]
        skew_sign: i8,

        #[command(flatten)]
        settings: SettingsArgs,
    },
    /// Export projections and calibration for downstream lattice analysis
    Export {
        /// Projection files, one per filament
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Existing output directory
        #[arg(short, long)]
        out: PathBuf,

        /// Also export the band pass filtered image
        #[arg(long)]
        filtered: bool,

        #[command(flatten)]
        settings: SettingsArgs,
    },
}

/// Overrides of the stored analysis settings.
#[derive(Debug, Clone, Args)]
struct SettingsArgs {
    /// Pixel size of the projections in nm
    #[arg(long, default_value = "1.0")]
    scale: f32,

    /// Shortest periodicity kept by the band pass filter in nm
    #[arg(long)]
    cutoff_length: Option<f32>,

    /// Shortest moire period searched in nm
    #[arg(long)]
    min_period_length: Option<f32>,

    /// Spectrum samples per integer frequency bin
    #[arg(long)]
    upsample_factor: Option<usize>,

    /// Lateral spacing between protofilaments in nm
    #[arg(long)]
    pf_spacing: Option<f32>,

    /// Bin size the written property refers to
    #[arg(long)]
    bin_size: Option<usize>,

    /// Process filaments in parallel
    #[arg(long)]
    parallel: bool,

    /// Store the resulting settings as new defaults
    #[arg(long)]
    save_settings: bool,
}

impl SettingsArgs {
    fn resolve(&self) -> Result<AnalysisSettings> {
        let mut settings = AnalysisSettings::load_or_default();
        if let Some(cutoff_length) = self.cutoff_length {
            settings.cutoff_length = cutoff_length;
        }
        if let Some(min_period_length) = self.min_period_length {
            settings.min_period_length = min_period_length;
        }
        if let Some(upsample_factor) = self.upsample_factor {
            settings.upsample_factor = upsample_factor;
        }
        if let Some(pf_spacing) = self.pf_spacing {
            settings.pf_spacing = pf_spacing;
        }
        if let Some(bin_size) = self.bin_size {
            settings.bin_size = bin_size;
        }
        settings.parallel |= self.parallel;
        if self.save_settings {
            settings.store()?;
            info!("saved analysis settings");
        }
        Ok(settings)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    if let Some(threads) = cli.threads {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
        {
            Ok(_) => info!("Using {} threads", threads),
            Err(err) => warn!("failed to set thread pool size: {err}"),
        }
    }

    info!("Starting moire-skew v{}", moire_skew::VERSION);

    match cli.command {
        Commands::Measure {
            inputs,
            output,
            skew_sign,
            settings,
        } => measure(inputs, output, SkewSign::from_i8(skew_sign), &settings),
        Commands::Export {
            inputs,
            out,
            filtered,
            settings,
        } => export(inputs, out, filtered, &settings),
    }
}

fn measure(
    inputs: Vec<PathBuf>,
    output: Option<PathBuf>,
    sign: SkewSign,
    args: &SettingsArgs,
) -> Result<()> {
    let settings = args.resolve()?;
    let source = NpyProjections::new(inputs, args.scale);
    let indices: Vec<usize> = (0..source.len()).collect();

    let mut table = PropertyTable::new();
    let mut store = UniformSign {
        sign,
        inner: &mut table,
    };

    let abort = AtomicBool::new(false);
    let estimates = measure_skew(&source, &mut store, &indices, &settings, &abort)?;
    for (index, estimate) in estimates.iter() {
        let period = match estimate.period_length {
            Some(period) => format!("{period:.2}"),
            None => "-".to_string(),
        };
        println!(
            "{}\t{:.3}\t{}",
            source.paths[*index].display(),
            estimate.angle_degrees,
            period
        );
    }

    if let Some(output) = output {
        save_results_as_csv(&output, &table)?;
    }
    Ok(())
}

fn export(inputs: Vec<PathBuf>, out: PathBuf, filtered: bool, args: &SettingsArgs) -> Result<()> {
    let settings = args.resolve()?;
    let width = settings.width;
    let analysis = SkewAnalysis::new(settings);
    let source = NpyProjections::new(inputs, args.scale);
    let written = export_projections(&source, &out, width, filtered.then_some(&analysis))?;
    info!("wrote {} files to {}", written.len(), out.display());
    Ok(())
}
