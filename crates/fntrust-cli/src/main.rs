//! fntrust CLI - register and verify function artifacts against an anchored root

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fntrust_core::{IntegrityService, ServiceConfig, VerifyRequest};
use fntrust_protocol::{decode_invoker_key, ClientKeyPair, WireHeaders};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fntrust")]
#[command(about = "fntrust - hardware-anchored integrity for serverless functions")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = "config/fntrust.toml")]
    config: PathBuf,

    /// Log filter, overrides the configuration and FNTRUST_LOG
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register an artifact and seal the new root
    Register {
        /// Artifact file
        file: PathBuf,
    },
    /// Verify an artifact against the sealed root
    Verify {
        /// Artifact file
        file: PathBuf,

        /// Client public key (hex, 64-byte X||Y) to authenticate the verdict for
        #[arg(long)]
        client_key: Option<String>,

        /// Freshness value (hex) bound into the MAC
        #[arg(long)]
        freshness: Option<String>,
    },
    /// Show the current root
    Root,
    /// Seal the stored root after the register was reset (e.g. by a reboot)
    Reseal,
    /// Delete all registrations and reset the register
    Reset,
    /// Generate a client key pair
    Keygen,
    /// Check an authenticated verdict on the client side
    Check {
        /// Client secret key (hex)
        #[arg(long)]
        secret: String,

        /// Verdict as received: true or false
        #[arg(long)]
        verdict: String,

        /// MAC tag as received (hex)
        #[arg(long)]
        tag: String,

        /// Server public key as received (hex)
        #[arg(long)]
        server_key: String,

        /// Freshness value sent with the request (hex)
        #[arg(long)]
        freshness: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ServiceConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    config.apply_env()?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }

    let filter = EnvFilter::try_new(&config.logging.level)
        .with_context(|| format!("invalid log filter {:?}", config.logging.level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Register { file } => {
            let content = read_artifact(&file)?;
            let service = IntegrityService::from_config(&config)?;
            let outcome = service.register(&content)?;
            print_json(&serde_json::to_value(&outcome)?)?;
        }
        Commands::Verify {
            file,
            client_key,
            freshness,
        } => {
            let mut request = VerifyRequest::new(read_artifact(&file)?);
            if let Some(key) = client_key {
                request = request.with_client_key(decode_invoker_key(&key)?);
            }
            if let Some(freshness) = freshness {
                request = request.with_freshness(decode_hex(&freshness, "freshness")?);
            }

            let service = IntegrityService::from_config(&config)?;
            let outcome = service.verify(&request)?;

            let mut output = serde_json::to_value(&outcome)?;
            if let Some(headers) = outcome.to_headers() {
                let pairs: serde_json::Map<_, _> = headers
                    .pairs()
                    .iter()
                    .map(|(name, value)| (name.to_string(), json!(value)))
                    .collect();
                output["headers"] = serde_json::Value::Object(pairs);
            }
            print_json(&output)?;
        }
        Commands::Root => {
            let service = IntegrityService::from_config(&config)?;
            print_json(&json!({
                "root_hash": service.root_hash().map(hex::encode),
                "leaf_count": service.len(),
                "register_index": service.anchor().index(),
            }))?;
        }
        Commands::Reseal => {
            let service = IntegrityService::from_config(&config)?;
            let root = service.reseal()?;
            print_json(&json!({ "root_hash": root.map(hex::encode) }))?;
        }
        Commands::Reset => {
            let service = IntegrityService::from_config(&config)?;
            service.reset()?;
            print_json(&json!({ "reset": true }))?;
        }
        Commands::Keygen => {
            let client = ClientKeyPair::generate();
            print_json(&json!({
                "secret_key": hex::encode(client.secret_bytes()),
                "public_key": hex::encode(client.public_key_bytes()),
            }))?;
        }
        Commands::Check {
            secret,
            verdict,
            tag,
            server_key,
            freshness,
        } => {
            let client = ClientKeyPair::from_secret_bytes(&decode_hex(&secret, "secret")?)?;
            let received = WireHeaders {
                verification: verdict,
                mac_tag: tag,
                server_public_key: server_key,
            }
            .parse()?;
            let freshness = freshness
                .map(|value| decode_hex(&value, "freshness"))
                .transpose()?;

            let valid = client.check(&received, freshness.as_deref())?;
            print_json(&json!({ "valid": valid, "verdict": received.verdict }))?;
            if !valid {
                bail!("verdict tag does not match");
            }
        }
    }

    Ok(())
}

fn read_artifact(path: &Path) -> Result<Vec<u8>> {
    let content =
        std::fs::read(path).with_context(|| format!("reading artifact {}", path.display()))?;
    debug!(path = %path.display(), bytes = content.len(), "artifact read");
    Ok(content)
}

fn decode_hex(value: &str, what: &str) -> Result<Vec<u8>> {
    hex::decode(value.trim()).with_context(|| format!("{} is not valid hex", what))
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
