//! Lifebeat: Heart-attack risk scoring
//!
//! Main entry point for scoring requests against the persisted model.
//!
//! # Usage
//!
//! ```bash
//! lifebeat score < patient.json
//! lifebeat score --json '{"age": 63, "sex": 1, ...}'
//! lifebeat metrics
//! ```

use std::io::Read;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use lifebeat::adapters::fs::FsArtifactStore;
use lifebeat::application::{Availability, InferenceService};
use lifebeat::config::AppConfig;
use lifebeat::{LifebeatError, PatientFeatures};

#[derive(Debug)]
enum Command {
    Score { body: Option<String> },
    Metrics,
}

fn usage() -> String {
    "Usage: lifebeat score [--json <body>] | lifebeat metrics".to_string()
}

fn parse_args() -> Result<Command> {
    let mut args = std::env::args().skip(1);
    let command = match args.next().as_deref() {
        Some("score") => {
            let mut body = None;
            while let Some(arg) = args.next() {
                match arg.as_str() {
                    "--json" => body = Some(args.next().context(usage())?),
                    _ => bail!(usage()),
                }
            }
            Command::Score { body }
        }
        Some("metrics") => Command::Metrics,
        _ => bail!(usage()),
    };
    Ok(command)
}

fn main() -> Result<()> {
    let command = parse_args()?;
    let config = AppConfig::from_env().context("Invalid configuration")?;
    let _guard = lifebeat::logging::init(&config.log).context("Failed to initialize logging")?;

    let store = Arc::new(FsArtifactStore::new(&config.model_dir));
    let service = InferenceService::new(store).with_threshold(config.threshold)?;

    match command {
        Command::Score { body } => {
            if let Availability::Unavailable(reason) = service.initialize() {
                bail!("Model or scaler not loaded: {reason}");
            }

            let body = match body {
                Some(body) => body,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("Failed to read request body from stdin")?;
                    buf
                }
            };
            let patient = PatientFeatures::from_json(&body)?;
            let assessment = service.score(&patient)?;
            println!("{}", serde_json::to_string_pretty(&assessment)?);
        }
        Command::Metrics => match service.get_metrics() {
            Ok(metrics) => println!("{}", serde_json::to_string_pretty(&metrics)?),
            Err(LifebeatError::NotFound(_)) => {
                bail!("Metrics not found in {}", config.model_dir.display())
            }
            Err(e) => return Err(e.into()),
        },
    }

    Ok(())
}
