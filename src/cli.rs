use clap::Parser;
use std::path::PathBuf;

/// Build simulator input files from a hydraulic-network geopackage
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Source geopackage with the feature tables
    pub dataset: PathBuf,

    /// Directory to write the model artifacts into
    #[arg(short, long, default_value = "model_output")]
    pub output_dir: PathBuf,

    /// Reference time for the forcing time axis, "YYYY-mm-dd HH:MM:SS"
    #[arg(long, default_value = "2000-01-01 00:00:00")]
    pub reference_time: String,

    /// Target format version: 2020.02 or 2021.03
    #[arg(long, default_value = "2021.03")]
    pub format_version: String,

    /// 2D mesh cell size in meters; omit to skip mesh generation
    #[arg(long)]
    pub cell_size: Option<f64>,

    /// Node merge tolerance in meters
    #[arg(long, default_value_t = 0.1)]
    pub merge_tolerance: f64,

    /// Model-wide initial water level
    #[arg(long)]
    pub initial_water_level: Option<f64>,

    /// Worker threads for the mesh/RR sub-builds (default: all cores)
    #[arg(short, long)]
    pub threads: Option<usize>,
}

pub fn get_args() -> Args {
    Args::parse()
}
