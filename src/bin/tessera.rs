//! Tessera CLI: operational tooling for the envelope protocol
//!
//! Usage:
//!   tessera keygen [--name <NAME>]
//!   tessera inspect <FILE>
//!   tessera encode --topic <T> --host <H> --target <DEST> [--version <V>] <FILE>
//!   tessera decode --topic <T> --host <H> [--version <V>] <FILE>
//!
//! Configuration for encode/decode comes from `TESSERA_*` variables.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tessera::{
    generate_key, inspect, CryptoManager, KeyStore, SealedMessage, SecureMessage,
    SecureMessageConfig,
};

#[derive(Parser)]
#[command(name = "tessera")]
#[command(version)]
#[command(about = "Ticket-based secure messaging envelopes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a fresh static key as a `name:base64` line
    Keygen {
        /// Endpoint or group name the key belongs to
        #[arg(long, default_value = "default")]
        name: String,
    },

    /// Show envelope metadata (no verification)
    Inspect {
        /// JSON envelope file
        file: PathBuf,
    },

    /// Seal a file for a destination, writing the JSON envelope to stdout
    Encode {
        #[arg(long)]
        topic: String,
        #[arg(long)]
        host: String,
        /// Destination endpoint name
        #[arg(long)]
        target: String,
        #[arg(long, default_value = "1.0")]
        version: String,
        /// Payload file
        file: PathBuf,
    },

    /// Verify a JSON envelope, writing the payload to stdout
    Decode {
        #[arg(long)]
        topic: String,
        #[arg(long)]
        host: String,
        #[arg(long, default_value = "1.0")]
        version: String,
        /// JSON envelope file
        file: PathBuf,
    },
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let json = std::env::var("TESSERA_LOG_FORMAT").map_or(false, |v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Keygen { name } => cmd_keygen(&name),
        Commands::Inspect { file } => cmd_inspect(&file),
        Commands::Encode { topic, host, target, version, file } => {
            cmd_encode(&topic, &host, &target, &version, &file).await
        }
        Commands::Decode { topic, host, version, file } => {
            cmd_decode(&topic, &host, &version, &file).await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

type CmdResult = Result<(), Box<dyn std::error::Error>>;

fn cmd_keygen(name: &str) -> CmdResult {
    let config = SecureMessageConfig::from_env()?;
    let crypto = CryptoManager::from_names(&config.cipher, &config.hash)?;
    let key = generate_key(crypto.key_size())?;
    println!("{}:{}", name, BASE64.encode(&*key));
    Ok(())
}

fn cmd_inspect(file: &Path) -> CmdResult {
    let text = fs::read_to_string(file)?;
    let sealed = SealedMessage::from_json(&text)?;
    let md = inspect(&sealed.metadata)?;

    println!("Tessera Envelope");
    println!("================");
    println!("Source:       {}", md.source);
    println!("Destination:  {}", md.destination);
    println!("Timestamp:    {}", md.timestamp);
    println!("Nonce:        0x{:016x}", md.nonce);
    println!("Encrypted:    {}", md.encryption);
    println!("ESEK:         {} bytes (base64)", md.esek.len());
    println!();
    println!("Body Size:    {} bytes", sealed.body.len());
    println!("Signature:    {} bytes", sealed.signature.len());
    Ok(())
}

fn endpoint(topic: &str, host: &str) -> Result<SecureMessage, tessera::Error> {
    let config = SecureMessageConfig::from_env()?;
    SecureMessage::new(topic, host, &config, Arc::new(KeyStore::new()))
}

async fn cmd_encode(topic: &str, host: &str, target: &str, version: &str, file: &Path) -> CmdResult {
    let sm = endpoint(topic, host)?;
    let payload = fs::read(file)?;
    let sealed = sm.encode(version, target, &payload).await?;
    println!("{}", sealed.to_json()?);
    eprintln!("Sealed {} bytes for {}", payload.len(), target);
    Ok(())
}

async fn cmd_decode(topic: &str, host: &str, version: &str, file: &Path) -> CmdResult {
    let sm = endpoint(topic, host)?;
    let text = fs::read_to_string(file)?;
    let sealed = SealedMessage::from_json(&text)?;
    let (md, payload) = sm.decode_sealed(version, &sealed).await?;
    eprintln!("Verified envelope {} -> {}", md.source, md.destination);
    io::stdout().write_all(&payload)?;
    Ok(())
}
