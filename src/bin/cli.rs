//! CLI application for averaging faces in a data folder.
//!
//! Usage:
//!   mean-face --root <folder>                          # Average aligned faces
//!   mean-face --root <folder> --timestamp <ts> \
//!       --detector <program>                           # Ingest a capture first
//!   mean-face --root <folder> --alpha --blur           # Transparent result.png

use clap::Parser;
use mean_face::{
    list_image_paths, Averager, AveragerConfig, CommandDetector, DataLayout, FolderSink,
    IngestMode, IngestOutcome, LandmarkStore,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mean-face")]
#[command(author, version, about = "Average faces into a composite image", long_about = None)]
struct Args {
    /// Data folder holding captures/, aligned/, result/ and archive/
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Ingest captures/<timestamp>.jpg before averaging
    #[arg(long)]
    timestamp: Option<String>,

    /// Canonical frame width [default: 500]
    #[arg(long)]
    width: Option<u32>,

    /// Canonical frame height [default: 600]
    #[arg(long)]
    height: Option<u32>,

    /// Feather the edges of the transparency mask
    #[arg(long)]
    blur: bool,

    /// Save result.png with a transparent background
    #[arg(long)]
    alpha: bool,

    /// Show debug output
    #[arg(long)]
    debug: bool,

    /// JSON settings file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Landmark detector program, called as `<program> [args...] <image>`
    #[arg(long)]
    detector: Option<PathBuf>,

    /// Extra argument for the detector program (repeatable)
    #[arg(long = "detector-arg", allow_hyphen_values = true)]
    detector_arg: Vec<String>,

    /// Number of aligned faces to keep before archiving older ones
    #[arg(long, default_value = "100")]
    keep: usize,

    /// Only write the final result, not the running averages
    #[arg(long)]
    no_intermediates: bool,

    /// Overwrite stored landmarks when ingesting
    #[arg(long)]
    refresh: bool,

    /// Warp images one at a time
    #[arg(long)]
    sequential: bool,
}

fn main() {
    let args = Args::parse();
    init_logging(args.debug);

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(debug: bool) {
    let filter = if debug { "mean_face=debug" } else { "mean_face=info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format_timestamp(Some(env_logger::fmt::TimestampPrecision::Seconds))
        .init();
}

fn load_config(args: &Args) -> mean_face::Result<AveragerConfig> {
    let mut config = match &args.config {
        Some(path) => AveragerConfig::load(path)?,
        None => AveragerConfig::default(),
    };
    if let Some(width) = args.width {
        config.width = width;
    }
    if let Some(height) = args.height {
        config.height = height;
    }
    config.alpha |= args.alpha;
    config.blur_edges |= args.blur;
    if args.no_intermediates {
        config.write_intermediates = false;
    }
    if args.sequential {
        config.parallel = false;
    }
    if config.blur_edges && !config.alpha {
        log::warn!("Edge blur only applies to the alpha mask; use --alpha to enable it");
    }
    Ok(config)
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(args)?;
    config.frame()?;

    let layout = DataLayout::new(&args.root);
    layout.create_dirs()?;
    layout.clear_results()?;
    layout.archive_overflow(args.keep)?;

    let store = LandmarkStore::open(layout.store())?;
    let detector = args
        .detector
        .as_ref()
        .map(|program| CommandDetector::new(program).args(args.detector_arg.iter().cloned()));

    let mut averager = Averager::new(config.clone()).with_store(&store);
    if let Some(detector) = &detector {
        averager = averager.with_detector(detector);
    }

    if let Some(ts) = &args.timestamp {
        let mode = if args.refresh {
            IngestMode::Refresh
        } else {
            IngestMode::Insert
        };
        match averager.ingest(&layout.capture(ts), &layout.aligned(), mode)? {
            IngestOutcome::Stored(path) => log::info!("New face saved to {}", path.display()),
            IngestOutcome::NoFace => log::warn!("No face in capture {}", ts),
        }
    }

    let paths = list_image_paths(&layout.aligned())?;
    let mut sink = FolderSink::new(layout.result(), &config);
    let composite = averager.run(&paths, &mut sink)?;
    if !composite.skipped.is_empty() {
        log::warn!("{} images were skipped", composite.skipped.len());
    }

    store.close()?;
    Ok(())
}
