#![forbid(unsafe_code)]

mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use hexvox_field::{DenseField, FieldStats, VoxelField};
use hexvox_io::{VoxDecoder, import_file};
use hexvox_pool::WorkerPool;
use log::LevelFilter;

#[derive(Parser, Debug)]
#[command(about = "Import a MagicaVoxel scene into a hexagonal density field", long_about = None)]
struct Args {
    /// Scene file to import (.vox)
    input: PathBuf,

    /// TOML import config
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Worker threads (overrides config)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Hexagon half width in voxels (overrides config)
    #[arg(long)]
    half_width: Option<i32>,

    /// Trace every cell of this Z layer (needs -vv)
    #[arg(long)]
    debug_layer: Option<i32>,

    /// More logging; repeat for trace output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_env("RUST_LOG")
        .init();
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut cfg = match &args.config {
        Some(path) => config::load_config_from_path(path)
            .map_err(|e| format!("failed to load config {}: {}", path.display(), e))?,
        None => config::ImportConfig::default(),
    };
    if let Some(threads) = args.threads {
        cfg.threads = Some(threads);
    }
    if let Some(hw) = args.half_width {
        cfg.hexagon.half_width = hw;
    }
    if args.debug_layer.is_some() {
        cfg.hexagon.debug_layer = args.debug_layer;
    }

    let settings = Arc::new(cfg.hex_settings()?);
    let pool = WorkerPool::new(cfg.pool_config())?;
    log::info!(
        "importing {} with {} thread(s), half width {}",
        args.input.display(),
        pool.num_threads(),
        settings.half_width()
    );

    let field = Arc::new(DenseField::default());
    let summary = import_file(&args.input, &VoxDecoder, &pool, &field, &settings)?;

    let stats = FieldStats::collect(&*field);
    log::info!(
        "field {} ({} cells): {} full, {} partial, {} empty, {} unset, {} with material ({} slab(s))",
        field.size(),
        stats.total(),
        stats.full,
        stats.partial,
        stats.empty,
        stats.unset,
        stats.with_material,
        summary.slabs
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
