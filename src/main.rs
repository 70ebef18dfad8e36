use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use volume_annotate::pathing::{
    assemble_volume, generate_path_mapping, read_grayscale, trailing_index_matcher,
};
use volume_annotate::pipeline::{
    AngleMapping, bulk_rotate, downsample_store, extract_roi_store, rotate_store,
};
use volume_annotate::store::ArrayStore;
use volume_annotate::{DatasetKey, Interpolation, PipelineConfig, Result, RoiSpec, logging};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Crop, rotate and downsample volumetric scans",
    long_about = None
)]
struct Args {
    /// JSON file with pipeline settings; defaults apply for missing fields.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log detail (-v debug, -vv trace). RUST_LOG overrides this.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crop a stored volume to a ROI exported as JSON.
    ExtractRoi {
        #[arg(short, long)]
        source: PathBuf,
        /// Array key inside the source store.
        #[arg(short, long, default_value = "metric/raw")]
        key: String,
        #[arg(short, long)]
        roi: PathBuf,
        #[arg(short, long)]
        target: PathBuf,
    },
    /// Rotate every slice of a stored volume.
    Rotate {
        #[arg(short, long)]
        source: PathBuf,
        #[arg(short, long)]
        target: PathBuf,
        /// Angle in degrees, counterclockwise.
        #[arg(short, long, allow_hyphen_values = true)]
        angle: f64,
        /// nearest or bilinear; falls back to the config value.
        #[arg(short, long)]
        mode: Option<Interpolation>,
    },
    /// Rotate all stores of a directory using a stem-to-angle JSON mapping.
    BulkRotate {
        #[arg(short, long)]
        source_dir: PathBuf,
        #[arg(short, long)]
        target_dir: PathBuf,
        #[arg(short, long)]
        angles: PathBuf,
        #[arg(short, long)]
        mode: Option<Interpolation>,
    },
    /// Downsample the half-resolution array of a store.
    Downsample {
        #[arg(short, long)]
        source: PathBuf,
        #[arg(short, long)]
        target: PathBuf,
        /// In-plane size of the result; falls back to the config value.
        #[arg(short, long)]
        in_plane_target: Option<usize>,
    },
    /// Stack numbered grayscale images into a new store.
    Assemble {
        /// File stem prefix the numbered slices share.
        #[arg(short, long)]
        prefix: String,
        #[arg(short, long)]
        target: PathBuf,
        paths: Vec<PathBuf>,
    },
}

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };

    match args.command {
        Command::ExtractRoi {
            source,
            key,
            roi,
            target,
        } => {
            let roi: RoiSpec = serde_json::from_slice(&fs::read(roi)?)?;
            let written = extract_roi_store(source, &key, &roi, target)?;
            info!(target = %written.display(), "wrote roi");
        }
        Command::Rotate {
            source,
            target,
            angle,
            mode,
        } => {
            if !config.angle_in_range(angle) {
                warn!(angle, range = ?config.angle_range, "angle outside the configured range");
            }
            let mode = mode.unwrap_or(config.interpolation);
            let written = rotate_store(source, target, angle, mode)?;
            info!(target = %written.display(), angle, %mode, "wrote rotated volume");
        }
        Command::BulkRotate {
            source_dir,
            target_dir,
            angles,
            mode,
        } => {
            let angles = AngleMapping::from_json_file(angles)?;
            let report = bulk_rotate(
                source_dir,
                target_dir,
                &angles,
                mode.unwrap_or(config.interpolation),
            )?;
            for item in &report.skipped {
                warn!(name = %item.name, reason = %item.reason, "skipped");
            }
            info!(%report, "bulk rotation done");
        }
        Command::Downsample {
            source,
            target,
            in_plane_target,
        } => {
            let in_plane_target = in_plane_target.unwrap_or(config.in_plane_target);
            let written = downsample_store(source, target, in_plane_target)?;
            info!(target = %written.display(), in_plane_target, "wrote downsampled volume");
        }
        Command::Assemble {
            prefix,
            target,
            paths,
        } => {
            let mapping = generate_path_mapping(&paths, trailing_index_matcher(prefix));
            let volume = assemble_volume(&mapping, read_grayscale)?;
            ArrayStore::create(&target)?.write_volume(DatasetKey::Raw, &volume)?;
            info!(target = %target.display(), shape = ?volume.dim(), "assembled volume");
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init_logging(args.verbose);
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
