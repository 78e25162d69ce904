use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};

use hydronet_build::config::{BuildConfig, FormatVersion};
use hydronet_build::io::{Serializer, gpkg, timefmt};
use hydronet_build::{ModelBuilder, cli};

fn main() -> Result<()> {
    let args = cli::get_args();

    let reference_time = timefmt::parse_datetime(&args.reference_time)
        .with_context(|| format!("bad reference time: {}", args.reference_time))?;

    let version = match args.format_version.as_str() {
        "2020.02" => FormatVersion::V2020_02,
        "2021.03" => FormatVersion::V2021_03,
        other => bail!("unknown format version: {}", other),
    };

    let mut config = BuildConfig::new(reference_time);
    config.version = version;
    config.node_merge_tolerance = args.merge_tolerance;
    config.mesh_cell_size = args.cell_size;
    config.initial_water_level = args.initial_water_level;

    let threads = args.threads.unwrap_or_else(num_cpus::get);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .context("Failed to build thread pool")?;

    // Load feature tables
    println!("Loading features from {:?}...", args.dataset);
    let conn = rusqlite::Connection::open(&args.dataset)
        .with_context(|| format!("Failed to open dataset: {:?}", args.dataset))?;
    let base_dir = args
        .dataset
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_default();
    let features = gpkg::load_feature_set(&conn, &config.fields, &base_dir)?;
    println!("  {} features", features.feature_count());

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message("Building model...");

    let (model, summary) = ModelBuilder::new(config).build(&features);
    pb.finish_with_message("Model built");

    println!("{}", summary.report(&model));

    println!("\nWriting artifacts to {:?}...", args.output_dir);
    let serializer = Serializer::new(version, reference_time);
    let written = serializer.write_all(&args.output_dir, &model)?;
    for path in &written {
        println!("  {:?}", path);
    }

    println!("\nModel build complete. {} files written.", written.len());
    Ok(())
}
