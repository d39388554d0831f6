// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pixelveil: seal the PII in a photo, share the blurred copy, and let only
// the intended recipient restore it.
//
// Entry point.  Initialises logging, resolves config and the data directory,
// and dispatches to a subcommand.

mod data_dir;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use pixelveil_classifier::TextClassifier;
use pixelveil_core::error::{PixelveilError, Result};
use pixelveil_core::human_errors::{humanize_error, partial_restore};
use pixelveil_core::PipelineConfig;
use pixelveil_image::{load_rgba, save_png};
use pixelveil_pipeline::{PrivacyPipeline, StaticDetections, TransmissionPackage};
use pixelveil_security::{
    AuditLog, KeyPair, KeyStore, SecretString, load_key_pair, save_key_pair,
};
use tracing::{info, warn};

const DEFAULT_PASSPHRASE_ENV: &str = "PIXELVEIL_PASSPHRASE";

#[derive(Parser)]
#[command(name = "pixelveil")]
#[command(version)]
#[command(about = "Seal PII regions in photos for authorised restoration")]
struct Cli {
    /// Pipeline configuration file (.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a recipient identity and print its public key
    Keygen {
        /// Where to write the passphrase-protected identity
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Environment variable holding the passphrase
        #[arg(long, default_value = DEFAULT_PASSPHRASE_ENV)]
        passphrase_env: String,
    },

    /// Seal the sensitive regions of a photo for one recipient
    Seal {
        /// Photo to protect
        #[arg(short, long)]
        image: PathBuf,

        /// Detector output (JSON with "text" and "objects")
        #[arg(short, long)]
        detections: PathBuf,

        /// Recipient public key (age1...)
        #[arg(short, long)]
        recipient: String,

        /// Where to write the transmission envelope
        #[arg(short, long)]
        out: PathBuf,

        /// Also write the blurred photo as PNG
        #[arg(long)]
        blurred: Option<PathBuf>,

        /// Asset identifier (defaults to the image file stem)
        #[arg(long)]
        asset_id: Option<String>,
    },

    /// Restore a photo from an envelope
    Open {
        /// Transmission envelope produced by `seal`
        #[arg(short, long)]
        envelope: PathBuf,

        /// Passphrase-protected identity (defaults to the data directory)
        #[arg(short, long)]
        identity: Option<PathBuf>,

        /// Where to write the restored PNG
        #[arg(short, long)]
        out: PathBuf,

        /// Environment variable holding the passphrase
        #[arg(long, default_value = DEFAULT_PASSPHRASE_ENV)]
        passphrase_env: String,
    },

    /// Classify a text span and print the verdict as JSON
    Classify {
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            let human = humanize_error(&e);
            tracing::debug!(error = %e, "command failed");
            eprintln!("error: {}", human.message);
            eprintln!("{}", human.suggestion);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let dir = data_dir::data_dir();
    let config = data_dir::load_config(cli.config.as_deref(), &dir)?;

    match cli.command {
        Commands::Keygen {
            out,
            passphrase_env,
        } => {
            let out = out.unwrap_or_else(|| dir.join(data_dir::IDENTITY_FILE));
            keygen(&out, &passphrase_env)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Seal {
            image,
            detections,
            recipient,
            out,
            blurred,
            asset_id,
        } => {
            let asset_id = asset_id.unwrap_or_else(|| asset_id_for(&image));
            let detections = Arc::new(StaticDetections::load(&detections)?);
            let pipeline = build_pipeline(config, detections, &dir)?;

            let original = load_rgba(&image)?;
            let mut protected = pipeline.protect(&asset_id, &original, &recipient).await?;
            std::fs::write(&out, protected.envelope.to_json()?)?;
            protected.mark_transmitted()?;
            if let Some(path) = blurred {
                save_png(&protected.blurred, path)?;
            }

            println!(
                "{}: {} regions sealed, {} skipped",
                asset_id,
                protected.sealed,
                protected.skipped.len()
            );
            for skipped in &protected.skipped {
                eprintln!("  skipped {} ({})", skipped.label, skipped.reason);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Open {
            envelope,
            identity,
            out,
            passphrase_env,
        } => {
            let identity = identity.unwrap_or_else(|| dir.join(data_dir::IDENTITY_FILE));
            let key_pair = load_key_pair(&identity, read_passphrase(&passphrase_env)?)?;
            let envelope = TransmissionPackage::from_json(&std::fs::read_to_string(&envelope)?)?;

            let pipeline = build_pipeline(config, Arc::new(StaticDetections::default()), &dir)?;
            let outcome = pipeline.reveal(&envelope, &key_pair).await?;
            save_png(&outcome.image, &out)?;

            println!("{}", outcome.summary());
            if outcome.is_complete() {
                return Ok(ExitCode::SUCCESS);
            }
            for failure in &outcome.failures {
                eprintln!("  {} {}", failure.region_id, failure.reason);
            }
            let human = partial_restore(outcome.restored, outcome.total);
            eprintln!("{}", human.suggestion);
            Ok(ExitCode::from(2))
        }
        Commands::Classify { text } => {
            let classifier = TextClassifier::from_config(&config)?;
            let verdict = classifier.classify(&text);
            println!("{}", serde_json::to_string_pretty(&verdict)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn keygen(out: &Path, passphrase_env: &str) -> Result<()> {
    if out.exists() {
        return Err(PixelveilError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{} already exists", out.display()),
        )));
    }
    let pair = KeyPair::generate();
    save_key_pair(out, &pair, read_passphrase(passphrase_env)?)?;
    info!(path = %out.display(), "identity written");
    println!("{}", pair.public_key());
    Ok(())
}

fn read_passphrase(var: &str) -> Result<SecretString> {
    match std::env::var(var) {
        Ok(value) if !value.is_empty() => Ok(SecretString::from(value)),
        _ => Err(PixelveilError::KeyDerivation(format!(
            "set {var} to the identity passphrase"
        ))),
    }
}

fn asset_id_for(image: &Path) -> String {
    image
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "asset".to_owned())
}

fn build_pipeline(
    config: PipelineConfig,
    detections: Arc<StaticDetections>,
    dir: &Path,
) -> Result<PrivacyPipeline> {
    let audit_enabled = config.audit_enabled;
    let pipeline = PrivacyPipeline::new(
        config,
        detections.clone(),
        detections,
        Arc::new(KeyStore::new()),
    )?;
    if !audit_enabled {
        return Ok(pipeline);
    }
    match AuditLog::open(dir.join(data_dir::AUDIT_DB)) {
        Ok(log) => Ok(pipeline.with_audit_log(log)),
        Err(e) => {
            warn!(error = %e, "audit trail unavailable");
            Ok(pipeline)
        }
    }
}
