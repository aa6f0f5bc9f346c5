use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use annomeasure::cancel::{CancelToken, install_ctrl_c_handler};
use annomeasure::config::{DEFAULT_CONFIG_FILE, Settings};
use annomeasure::core::{ComputedDistances, read_ground_truth, verify};
use annomeasure::steps::{DetectionStep, MeasurementStep, RefinementStep};
use annomeasure::visualize::ClassPalette;
use annomeasure::{AnnotationStore, Pipeline, logging};

#[derive(Parser)]
#[command(name = "annomeasure")]
#[command(about = "Build per-image annotation records and measure landmark distances")]
struct Cli {
    /// Settings file (TOML); defaults apply when it does not exist
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Annotation document, overrides the config file
    #[arg(long, value_name = "FILE")]
    document: Option<PathBuf>,

    /// Image folder, overrides the config file
    #[arg(long, value_name = "DIR")]
    images: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Detect objects in images that have no record yet
    Detect,
    /// Add sub-features to objects that lack them
    Refine {
        /// Save isolated views to directory (must be empty)
        #[arg(long, value_name = "DIR")]
        debug_out: Option<PathBuf>,
    },
    /// Compute landmarks and distances
    Measure {
        /// Skip writing overlay images
        #[arg(long)]
        no_visuals: bool,
    },
    /// Detect, refine and measure in one go
    Run {
        /// Save isolated views to directory (must be empty)
        #[arg(long, value_name = "DIR")]
        debug_out: Option<PathBuf>,
        /// Skip writing overlay images
        #[arg(long)]
        no_visuals: bool,
    },
    /// Compare computed distances with a ground-truth table
    Verify {
        /// Ground-truth CSV, overrides the config file
        #[arg(long, value_name = "FILE")]
        ground_truth: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    logging::init_tracing(args.verbose);

    let mut settings = Settings::load(&args.config)?;
    if let Some(document) = args.document {
        settings.paths.document = document;
    }
    if let Some(images) = args.images {
        settings.paths.image_folder = images;
    }

    let store = AnnotationStore::new(&settings.paths.document);

    if let Command::Verify { ground_truth } = &args.command {
        let gt_path = ground_truth
            .clone()
            .unwrap_or_else(|| settings.verify.ground_truth.clone());
        return run_verify(&store, &gt_path, &settings);
    }

    let cancel = CancelToken::new();
    install_ctrl_c_handler(cancel.clone())?;

    let mut pipeline = Pipeline::new(store, &settings.paths.image_folder).with_cancel(cancel);

    let (detect, refine, measure, debug_out, no_visuals) = match args.command {
        Command::Detect => (true, false, false, None, true),
        Command::Refine { debug_out } => (false, true, false, debug_out, true),
        Command::Measure { no_visuals } => (false, false, true, None, no_visuals),
        Command::Run { debug_out, no_visuals } => (true, true, true, debug_out, no_visuals),
        Command::Verify { .. } => unreachable!("handled above"),
    };

    if let Some(dir) = debug_out.or_else(|| settings.paths.debug_folder.clone()) {
        if refine {
            pipeline = pipeline.with_debug(dir)?;
        }
    }

    if detect {
        pipeline = pipeline.add_step(DetectionStep::new(settings.detection.build_detector()));
    }
    if refine {
        pipeline = pipeline.add_step(RefinementStep::new(
            settings.refine.build_refiner(),
            settings.refine.options(None),
        ));
    }
    if measure {
        let mut step = MeasurementStep::new();
        if settings.flags.write_visuals && !no_visuals {
            step = step.with_visuals(
                settings.paths.output_visual_folder.clone(),
                ClassPalette::new(settings.flags.palette_seed),
            );
        }
        pipeline = pipeline.add_step(step);
    }

    let data = pipeline.run()?;

    let objects: usize = data.values().map(|r| r.objects.len()).sum();
    let measured: usize = data
        .values()
        .flat_map(|r| &r.objects)
        .filter(|o| o.intra_distance.is_some())
        .count();
    println!("\n=== Annotation Summary ===");
    println!("Images:          {}", data.len());
    println!("Objects:         {}", objects);
    println!("Measured:        {}", measured);
    println!("Document:        {}", settings.paths.document.display());
    if measure && settings.flags.write_visuals && !no_visuals {
        println!("Overlays:        {}", settings.paths.output_visual_folder.display());
    }

    Ok(())
}

fn run_verify(
    store: &AnnotationStore,
    gt_path: &std::path::Path,
    settings: &Settings,
) -> anyhow::Result<()> {
    let rows = read_ground_truth(gt_path)?;
    let data = store
        .load()
        .with_context(|| format!("Failed to load {:?}", store.path()))?;
    info!(rows = rows.len(), images = data.len(), "Verifying");

    let computed = ComputedDistances::from_annotations(&data);
    let report = verify(&rows, &computed, settings.verify.thresholds);

    println!("\n=== Distance Verification ===");
    println!("Ground truth: {}", gt_path.display());
    println!("Document:     {}\n", store.path().display());
    println!("{}", report);

    Ok(())
}
