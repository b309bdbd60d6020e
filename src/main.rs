// file: src/main.rs
// description: commandline application entry point
// reference: application bootstrap and orchestration

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use csv_signer::utils::logging::{format_error, format_success};
use csv_signer::{Config, RsaPssSigner, SigningPipeline, Validator};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "csv_signer")]
#[command(version = "0.1.0")]
#[command(about = "Concurrent CSV signing pipeline using RSA-PSS", long_about = None)]
struct Cli {
    /// CSV file to sign [default: test.csv]
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Destination for the signed copy [default: output.csv]
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// PKCS#8 RSA private key in PEM format [default: private.pem]
    #[arg(short, long, value_name = "FILE")]
    key: Option<PathBuf>,

    /// Number of signing workers [default: 4]
    #[arg(short, long, value_name = "NUM")]
    concurrency: Option<usize>,

    /// Payload template with a single {} placeholder
    #[arg(long, value_name = "TEMPLATE")]
    template: Option<String>,

    /// Emit rows in input order instead of completion order
    #[arg(long, action = ArgAction::SetTrue)]
    preserve_order: bool,

    #[arg(long, value_name = "FILE", default_value = "config/default.toml")]
    config: PathBuf,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    color: bool,

    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    csv_signer::utils::logging::init_logger(cli.color, cli.verbose);

    info!("CSV Signing Pipeline");
    info!("Loading configuration from: {}", cli.config.display());

    let mut config = if cli.config.exists() {
        Config::load(Some(cli.config.as_path())).context("Failed to load configuration")?
    } else {
        warn!(
            "Config file {} not found, using default configuration",
            cli.config.display()
        );
        Config::load(None).unwrap_or_else(|e| {
            warn!("Falling back to built-in defaults: {}", e);
            Config::default_config()
        })
    };

    apply_cli_overrides(&mut config, &cli);
    config.validate().context("Invalid configuration")?;

    config.io.input = Validator::resolve_input_path(&config.io.input)?;
    Validator::validate_key_file(&config.signing.key_path)?;

    // Reject bad key material before the output file is created.
    let signer = RsaPssSigner::from_pkcs8_pem_file(&config.signing.key_path)?;

    let pipeline = SigningPipeline::new(config, Arc::new(signer))?.with_color(cli.color);

    match pipeline.run().await {
        Ok(stats) => {
            println!(
                "{}",
                format_success(&format!(
                    "Signed {} rows in {:.2}s",
                    stats.rows_written, stats.duration_secs
                ))
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", format_error(&format!("Signing run failed: {}", e)));
            std::process::exit(1);
        }
    }
}

fn apply_cli_overrides(config: &mut Config, cli: &Cli) {
    if let Some(input) = &cli.input {
        config.io.input = input.clone();
    }
    if let Some(output) = &cli.output {
        config.io.output = output.clone();
    }
    if let Some(key) = &cli.key {
        config.signing.key_path = key.clone();
    }
    if let Some(workers) = cli.concurrency {
        config.pipeline.workers = workers;
    }
    if let Some(template) = &cli.template {
        config.signing.template = template.clone();
    }
    if cli.preserve_order {
        config.pipeline.preserve_order = true;
    }
}
