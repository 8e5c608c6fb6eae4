//! Watermark a single screenshot and read the payload back.
//!
//! Usage:
//! ```sh
//! cargo run --example embed_and_extract -- input.png output.png viewer-id screenshot-id
//! ```

use std::env;
use std::process;

use forensic_watermark::{OutputFormat, WatermarkConfig, WatermarkPayload, Watermarker};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 5 {
        eprintln!(
            "Usage: {} <input> <output> <viewer-id> <screenshot-id>",
            args[0]
        );
        process::exit(1);
    }

    let input = &args[1];
    let output = &args[2];
    let payload = WatermarkPayload::new(args[3].as_str(), 1_703_001_600_000, args[4].as_str());

    let config = WatermarkConfig {
        output_format: OutputFormat::Png,
        ..WatermarkConfig::default()
    };
    let watermarker = Watermarker::new(config).expect("default config is valid");

    if let Err(e) = watermarker.embed_file(input.as_ref(), output.as_ref(), &payload) {
        eprintln!("Error: {e}");
        process::exit(1);
    }

    match watermarker.extract_file(output.as_ref()) {
        Ok(Some(found)) => println!(
            "Done: viewer={} screenshot={} at={}",
            found.viewer_id, found.screenshot_id, found.view_timestamp
        ),
        Ok(None) => {
            eprintln!("Error: watermark not recovered from {output}");
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
