use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use forensic_watermark::{
    default_output_path, payload_bit_length, required_pixel_count, OutputFormat, ScanResult,
    WatermarkConfig, WatermarkPayload, Watermarker,
};

/// Exit code when an image carries no watermark.
const EXIT_NOT_FOUND: i32 = 2;

#[derive(Parser)]
#[command(
    name = "forensic-watermark",
    about = "Embed and recover invisible forensic watermarks in screenshots",
    version,
    after_help = "The secret key can also be supplied via WATERMARK_SECRET_KEY.\n\
                  Embed and extract must use the same key and repetition count."
)]
struct Cli {
    #[command(flatten)]
    opts: CommonOpts,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
#[allow(clippy::struct_excessive_bools)]
struct CommonOpts {
    /// Secret key seeding carrier positions
    #[arg(long, env = "WATERMARK_SECRET_KEY", hide_env_values = true, global = true)]
    secret_key: Option<String>,

    /// Per-pixel perturbation (1-127)
    #[arg(long, default_value_t = forensic_watermark::config::DEFAULT_STRENGTH, global = true)]
    strength: u8,

    /// Number of payload copies
    #[arg(long, default_value_t = forensic_watermark::config::DEFAULT_REPETITIONS, global = true)]
    repetitions: usize,

    /// JPEG output quality (1-100)
    #[arg(long, default_value_t = forensic_watermark::config::DEFAULT_OUTPUT_QUALITY, global = true)]
    quality: u8,

    /// Write lossless PNG instead of JPEG
    #[arg(long, global = true)]
    png: bool,

    /// Share of a copy's carriers that must read back exactly (0.0-1.0)
    #[arg(short, long, default_value_t = forensic_watermark::config::DEFAULT_DETECTION_THRESHOLD, global = true)]
    threshold: f32,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Embed a payload into an image
    Embed {
        /// Input image file
        input: PathBuf,

        /// Output file (default: {name}_watermarked.{jpg|png})
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Viewer identity (up to 28 printable ASCII characters)
        #[arg(long)]
        viewer_id: String,

        /// Screenshot identity (up to 20 printable ASCII characters)
        #[arg(long)]
        screenshot_id: String,

        /// View time in milliseconds since the epoch (default: now)
        #[arg(long)]
        timestamp: Option<u64>,
    },
    /// Recover the payload from an image and print it as JSON
    Extract {
        /// Input image file
        input: PathBuf,
    },
    /// Scan every image in a directory for a watermark
    Scan {
        /// Directory to scan
        dir: PathBuf,
    },
    /// Report whether an image size can carry a watermark
    Capacity {
        /// Image width in pixels
        width: u32,
        /// Image height in pixels
        height: u32,
    },
}

impl CommonOpts {
    fn config(&self) -> WatermarkConfig {
        let defaults = WatermarkConfig::default();
        WatermarkConfig {
            secret_key: self.secret_key.clone().unwrap_or(defaults.secret_key),
            strength: self.strength,
            repetitions: self.repetitions,
            output_quality: self.quality,
            output_format: if self.png {
                OutputFormat::Png
            } else {
                OutputFormat::Jpeg
            },
            detection_threshold: self.threshold,
        }
    }
}

fn init_tracing(opts: &CommonOpts) {
    let default_filter = if opts.verbose {
        "forensic_watermark=debug"
    } else {
        "forensic_watermark=warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.opts);

    if cli.opts.secret_key.is_none() && !cli.opts.quiet {
        eprintln!("WARNING: Using the built-in default secret key");
    }

    let watermarker = match Watermarker::new(cli.opts.config()) {
        Ok(w) => w,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let code = match cli.command {
        Command::Embed {
            input,
            output,
            viewer_id,
            screenshot_id,
            timestamp,
        } => {
            let view_timestamp = timestamp.unwrap_or_else(now_millis);
            let payload = WatermarkPayload::new(viewer_id, view_timestamp, screenshot_id);
            run_embed(&watermarker, &input, output, &payload, &cli.opts)
        }
        Command::Extract { input } => run_extract(&watermarker, &input, &cli.opts),
        Command::Scan { dir } => run_scan(&watermarker, &dir, &cli.opts),
        Command::Capacity { width, height } => run_capacity(&watermarker, width, height),
    };

    process::exit(code);
}

fn now_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

fn run_embed(
    watermarker: &Watermarker,
    input: &Path,
    output: Option<PathBuf>,
    payload: &WatermarkPayload,
    opts: &CommonOpts,
) -> i32 {
    if !input.is_file() {
        eprintln!("Error: Input file does not exist: {}", input.display());
        return 1;
    }

    if payload.normalized() != *payload && !opts.quiet {
        eprintln!("WARNING: Payload will be truncated or contains non-ASCII characters");
    }

    let output =
        output.unwrap_or_else(|| default_output_path(input, watermarker.config().output_format));

    match watermarker.embed_file(input, &output, payload) {
        Ok(()) => {
            if !opts.quiet {
                eprintln!("[OK] {}", output.display());
            }
            0
        }
        Err(e) => {
            eprintln!("[FAIL] {}: {e}", input.display());
            1
        }
    }
}

fn run_extract(watermarker: &Watermarker, input: &Path, opts: &CommonOpts) -> i32 {
    let bytes = match std::fs::read(input) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Error: Failed to read {}: {e}", input.display());
            return 1;
        }
    };

    match watermarker.detect(&bytes) {
        Ok(Some(detection)) if detection.detected => {
            match serde_json::to_string_pretty(&detection.payload) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("Error: {e}");
                    return 1;
                }
            }
            if opts.verbose {
                eprintln!(
                    "  -> {}/{} copies intact",
                    detection.intact_repetitions, detection.repetitions
                );
            }
            0
        }
        Ok(Some(detection)) => {
            if !opts.quiet {
                eprintln!(
                    "No watermark found ({}/{} copies intact)",
                    detection.intact_repetitions, detection.repetitions
                );
            }
            EXIT_NOT_FOUND
        }
        Ok(None) => {
            if !opts.quiet {
                eprintln!("No watermark found (image too small for every copy)");
            }
            EXIT_NOT_FOUND
        }
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    }
}

fn run_scan(watermarker: &Watermarker, dir: &Path, opts: &CommonOpts) -> i32 {
    if !dir.is_dir() {
        eprintln!("Error: Not a directory: {}", dir.display());
        return 1;
    }

    let results = watermarker.scan_directory(dir);

    let mut found = 0u32;
    let mut clean = 0u32;
    let mut failed = 0u32;
    for r in &results {
        print_scan_result(r, opts);
        if !r.success {
            failed += 1;
        } else if r.detected {
            found += 1;
        } else {
            clean += 1;
        }
    }

    if !opts.quiet {
        eprintln!();
        eprint!("[Summary] Watermarked: {found}, Clean: {clean}");
        if failed > 0 {
            eprint!(", Failed: {failed}");
        }
        eprintln!(" (Total: {})", results.len());
    }

    i32::from(failed > 0)
}

fn print_scan_result(result: &ScanResult, opts: &CommonOpts) {
    let filename = result.path.file_name().map_or_else(
        || result.path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    );

    if !result.success {
        eprintln!("[FAIL] {filename}: {}", result.message);
    } else if let Some(payload) = &result.payload {
        println!(
            "[FOUND] {filename}: viewer={} screenshot={} at={}",
            payload.viewer_id, payload.screenshot_id, payload.view_timestamp
        );
    } else if !opts.quiet {
        eprintln!("[CLEAN] {filename}");
    }

    if opts.verbose && result.success {
        eprintln!("  -> {}", result.message);
    }
}

fn run_capacity(watermarker: &Watermarker, width: u32, height: u32) -> i32 {
    let config = watermarker.config();
    let available = u64::from(width) * u64::from(height);
    println!("payload bits:     {}", payload_bit_length());
    println!("repetitions:      {}", config.repetitions);
    println!("required pixels:  {}", required_pixel_count(config));
    println!("available pixels: {available}");
    if watermarker.has_capacity(width, height) {
        println!("capacity:         ok");
        0
    } else {
        println!("capacity:         too small");
        1
    }
}
