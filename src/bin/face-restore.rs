use std::path::PathBuf;
use std::process;

use clap::Parser;

use face_restore::RestoreEngine;

#[derive(Parser)]
#[command(
    name = "face-restore",
    about = "Best-effort face photo restoration: contrast, denoise, sharpen, upscale, inpaint",
    version,
    after_help = "Prints one JSON object to stdout:\n\
                  {\"reconstructed_base64\": <base64 JPEG>, \"analysis\": {...}}\n\n\
                  Exit codes: 0 success, 1 usage error, 2 processing error."
)]
struct Cli {
    /// Path to the photograph to restore
    image: Option<PathBuf>,
}

fn main() {
    // Diagnostics go to stderr and are env-controlled; stdout carries
    // exactly one JSON object.
    let _logger = flexi_logger::Logger::try_with_env_or_str("warn")
        .ok()
        .and_then(|l| l.start().ok());

    let cli = Cli::parse();

    let Some(path) = cli.image else {
        println!("{}", serde_json::json!({ "error": "usage: face-restore <image_path>" }));
        process::exit(1);
    };

    let engine = RestoreEngine::without_locator();
    match engine.process_file(&path).map(|out| serde_json::to_string(&out)) {
        Ok(Ok(json)) => {
            println!("{json}");
        }
        Ok(Err(e)) => {
            println!("{}", serde_json::json!({ "error": e.to_string() }));
            process::exit(2);
        }
        Err(e) => {
            println!("{}", serde_json::json!({ "error": e.to_string() }));
            process::exit(2);
        }
    }
}
