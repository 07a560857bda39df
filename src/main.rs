use clap::{Parser, Subcommand};
use imgpress::pipeline::{CancelToken, CompressBackend, RasterBackend};
use imgpress::{batch, config, output};
use std::path::PathBuf;

/// Shared flags for commands that compress images.
#[derive(clap::Args, Clone)]
struct BatchArgs {
    /// Input image files or directories
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Recurse into subdirectories when expanding directory inputs
    #[arg(long)]
    recursive: bool,

    /// Disable the skip cache — force re-encoding of all images
    #[arg(long)]
    no_cache: bool,

    /// Carry each source's EXIF metadata into the output
    #[arg(long)]
    keep_exif: bool,

    /// Skip EXIF orientation correction
    #[arg(long)]
    no_auto_rotate: bool,
}

#[derive(Parser)]
#[command(name = "imgpress")]
#[command(about = "Batch image compression: resize, re-encode, hit a size target")]
#[command(long_about = "\
Batch image compression: resize, re-encode, hit a size target

Inputs can be JPEG, PNG, TIFF, or WebP; every output is JPEG. The longer
edge is bounded (never upscaled), EXIF orientation is applied, and repeat
runs skip images whose content and settings are unchanged.

  imgpress compress photos/                 # quality 80, longer edge ≤ 1920
  imgpress compress -q 60 --max-edge 1280 photos/
  imgpress to-size --target-kb 200 photos/  # aim for ~200 KB per image
  imgpress inspect photo.jpg

Settings can also live in imgpress.toml; run 'imgpress gen-config' for a
documented starting point. Command-line flags override the file.")]
#[command(version)]
struct Cli {
    /// Output directory for compressed images
    #[arg(long, default_value = "compressed", global = true)]
    out_dir: PathBuf,

    /// Config file (defaults to ./imgpress.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compress at a fixed quality with a bounded longer edge
    Compress {
        #[command(flatten)]
        batch: BatchArgs,

        /// JPEG quality, 1-100
        #[arg(short, long)]
        quality: Option<u32>,

        /// Bound on the longer edge in pixels (sources below it keep their size)
        #[arg(long)]
        max_edge: Option<u32>,
    },
    /// Compress to approximately a target file size
    ToSize {
        #[command(flatten)]
        batch: BatchArgs,

        /// Target size in KB, 5-1000
        #[arg(short, long)]
        target_kb: u32,

        /// Encode attempts per dimension step before scaling down further
        #[arg(long)]
        max_iterations: Option<u32>,
    },
    /// Show format, dimensions, and file size of images
    Inspect {
        /// Image files to inspect
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Print a stock imgpress.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let tool_config = match &cli.config {
        Some(path) => config::ToolConfig::load(path)?,
        None => config::ToolConfig::load_from_dir(std::path::Path::new("."))?,
    };

    match cli.command {
        Command::Compress {
            batch: batch_args,
            quality,
            max_edge,
        } => {
            let mut params = imgpress::pipeline::RecompressParams::new(
                quality.unwrap_or(tool_config.compression.quality),
                max_edge.unwrap_or(tool_config.compression.max_edge),
            )?;
            params.auto_rotate = !batch_args.no_auto_rotate;
            params.keep_exif = batch_args.keep_exif;
            run_batch(
                &cli.out_dir,
                &tool_config,
                &batch_args,
                batch::BatchMode::Quality(params),
            )?;
        }
        Command::ToSize {
            batch: batch_args,
            target_kb,
            max_iterations,
        } => {
            let mut params = imgpress::pipeline::TargetSizeParams::new(target_kb)?;
            if let Some(iterations) = max_iterations {
                params = params.with_max_iterations(iterations)?;
            }
            params.auto_rotate = !batch_args.no_auto_rotate;
            params.keep_exif = batch_args.keep_exif;
            run_batch(
                &cli.out_dir,
                &tool_config,
                &batch_args,
                batch::BatchMode::TargetSize(params),
            )?;
        }
        Command::Inspect { inputs } => {
            inspect(&inputs, tool_config.compression.max_edge);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Run a compression batch with a printer thread consuming progress events.
fn run_batch(
    out_dir: &std::path::Path,
    tool_config: &config::ToolConfig,
    args: &BatchArgs,
    mode: batch::BatchMode,
) -> Result<(), Box<dyn std::error::Error>> {
    init_thread_pool(&tool_config.processing);

    let inputs = batch::collect_inputs(&args.inputs, args.recursive)?;

    let options = batch::BatchOptions {
        output_dir: out_dir.to_path_buf(),
        mode,
        use_cache: !args.no_cache,
        max_input_bytes: tool_config.limits.max_input_bytes,
    };

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            match event {
                batch::BatchEvent::Started { total } => {
                    println!("==> Compressing {} images", total);
                }
                batch::BatchEvent::ItemCompleted { source, report } => {
                    for line in output::format_item_report(&source, &report) {
                        println!("{}", line);
                    }
                }
                batch::BatchEvent::ItemFailed { source, message } => {
                    eprintln!("{}", output::format_item_failure(&source, &message));
                }
                batch::BatchEvent::ItemStarted { .. } | batch::BatchEvent::Finished => {}
            }
        }
    });

    let backend = RasterBackend::new();
    let outcome = batch::run(&backend, &inputs, &options, &CancelToken::new(), Some(tx))?;
    printer.join().unwrap();

    output::print_summary(&outcome.totals, &outcome.cache_stats);

    if outcome.totals.errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Show format, dimensions, and size for each file, plus the dimensions a
/// compress run would produce. Unreadable files are reported and skipped.
fn inspect(inputs: &[PathBuf], max_edge: u32) {
    let backend = RasterBackend::new();
    let mut failed = false;

    for path in inputs {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                eprintln!("{}", output::format_item_failure(path, &e.to_string()));
                failed = true;
                continue;
            }
        };
        let format_name = match image::guess_format(&bytes) {
            Ok(f) => f.extensions_str().first().copied().unwrap_or("unknown"),
            Err(_) => {
                eprintln!(
                    "{}",
                    output::format_item_failure(path, "unrecognized image format")
                );
                failed = true;
                continue;
            }
        };
        match backend.identify(&bytes) {
            Ok(dims) => {
                let (planned_w, planned_h) =
                    imgpress::pipeline::bounded_dimensions((dims.width, dims.height), max_edge);
                let planned = imgpress::pipeline::Dimensions {
                    width: planned_w,
                    height: planned_h,
                };
                output::print_inspect(path, format_name, &dims, bytes.len() as u64, &planned);
            }
            Err(e) => {
                eprintln!("{}", output::format_item_failure(path, &e.to_string()));
                failed = true;
            }
        }
    }

    if failed {
        std::process::exit(1);
    }
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores — user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let workers = config::effective_workers(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build_global()
        .ok();
}
