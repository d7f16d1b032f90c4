mod recognize_cmd;
mod serve_cmd;
mod status_cmd;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use ocrgate_config::{config_dir, config_file_path, load_config, Settings};
use ocrgate_engine::TesseractFactory;
use ocrgate_gateway::{OcrService, ServiceConfig};
use ocrgate_media::ImageCrateScaler;

#[derive(Parser)]
#[command(name = "ocrgate")]
#[command(about = "ocrgate: single-flight OCR gateway")]
#[command(version)]
struct Cli {
    /// Config file (default: $OCRGATE_CONFIG_DIR/config.yaml, else ~/.ocrgate/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
        /// Address to bind the HTTP server to
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Recognize one image locally and print the JSON result
    Recognize {
        image: PathBuf,
        /// Comma separated language codes, e.g. `ch_sim,en`
        #[arg(short, long)]
        languages: Option<String>,
        /// Also write the JSON result to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Query a running gateway's health endpoint
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| config_file_path(&config_dir()));
    let raw = load_config(&path).await?;

    // Logging comes from the raw file so validation findings are visible.
    let early = Settings::from(&raw);
    ocrgate_logging::init_logger(&early.log_level, early.log_dir.as_deref());

    let config = ocrgate_config::prepare(raw, &path)?;
    let mut settings = Settings::from(&config);

    match cli.command {
        Commands::Serve { port, bind } => {
            if let Some(port) = port {
                settings.port = port;
            }
            if let Some(bind) = bind {
                settings.bind = bind;
            }
            serve_cmd::run(settings).await?;
        }
        Commands::Recognize {
            image,
            languages,
            output,
        } => {
            recognize_cmd::run(settings, &image, languages, output.as_deref()).await?;
        }
        Commands::Status => status_cmd::run(&settings).await?,
    }

    Ok(())
}

/// Wires the tesseract backend and the image scaler into a service.
fn build_service(settings: &Settings) -> OcrService {
    OcrService::new(
        ServiceConfig::from(settings),
        Arc::new(TesseractFactory::new(&settings.engine_binary)),
        Arc::new(ImageCrateScaler::new()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_overrides() {
        let cli = Cli::parse_from(["ocrgate", "serve", "--port", "9000", "--bind", "127.0.0.1"]);
        match cli.command {
            Commands::Serve { port, bind } => {
                assert_eq!(port, Some(9000));
                assert_eq!(bind.as_deref(), Some("127.0.0.1"));
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn parses_recognize_with_global_config() {
        let cli = Cli::parse_from([
            "ocrgate",
            "recognize",
            "scan.png",
            "--languages",
            "en,ja",
            "--config",
            "/etc/ocrgate.yaml",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/ocrgate.yaml")));
        match cli.command {
            Commands::Recognize {
                image,
                languages,
                output,
            } => {
                assert_eq!(image, PathBuf::from("scan.png"));
                assert_eq!(languages.as_deref(), Some("en,ja"));
                assert!(output.is_none());
            }
            _ => panic!("expected recognize"),
        }
    }
}
