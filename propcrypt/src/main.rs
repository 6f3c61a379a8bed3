//! Operator CLI: encrypt new secrets, decrypt existing ones and inspect how a
//! configuration resolves once decryption is installed.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use propcrypt::detector::{self, EncryptedLiteral};
use propcrypt::{
    CipherError, ConfigError, EncryptablePropertiesBootstrap, EncryptorSettings, EnvVarPropertySource,
    Environment, JsonFilePropertySource, MapPropertySource, PooledPbeStringEncryptor, PropertyError,
    SourceError, StringEncryptor,
};
use serde::Serialize;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Encrypt, decrypt and inspect ENC(...) configuration values")]
struct Cli {
    /// JSON property file. Repeatable; later files override earlier ones.
    #[arg(long = "config", value_name = "FILE")]
    configs: Vec<PathBuf>,

    /// Inline property overriding files and environment variables.
    #[arg(short = 'D', long = "property", value_name = "KEY=VALUE", value_parser = parse_property)]
    properties: Vec<(String, String)>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Encrypt a plaintext value and print it as ENC(...).
    Encrypt { plaintext: String },
    /// Decrypt an ENC(...) literal or a bare payload.
    Decrypt { value: String },
    /// Resolve one key through the decrypting environment.
    Get { key: String },
    /// List configured keys and whether each value is encrypted. Never prints values.
    List,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Property(#[from] PropertyError),
    #[error(transparent)]
    Cipher(#[from] CipherError),
    #[error("property not found: {0}")]
    NotFound(String),
    #[error("output failed: {0}")]
    Output(String),
}

#[derive(Serialize)]
struct ListedProperty {
    key: String,
    source: String,
    encrypted: bool,
}

fn parse_property(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {raw:?}")),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Command-line properties win over environment variables, which win over files.
fn build_environment(cli: &Cli) -> Result<Environment, CliError> {
    let mut env = Environment::new();
    for path in &cli.configs {
        env.add_first(Arc::new(JsonFilePropertySource::load(path)?));
    }
    env.add_first(Arc::new(EnvVarPropertySource::new()));
    if !cli.properties.is_empty() {
        env.add_first(Arc::new(MapPropertySource::from_pairs(
            "command line",
            cli.properties.iter().cloned(),
        )));
    }
    Ok(env)
}

fn default_encryptor(env: &Environment) -> Result<PooledPbeStringEncryptor, CliError> {
    let settings = EncryptorSettings::resolve(env)?;
    Ok(PooledPbeStringEncryptor::new(&settings)?)
}

fn run(cli: Cli) -> Result<(), CliError> {
    let mut env = build_environment(&cli)?;

    match &cli.command {
        Command::Encrypt { plaintext } => {
            let payload = default_encryptor(&env)?.encrypt(plaintext)?;
            println!("{}", detector::wrap(&payload));
        }
        Command::Decrypt { value } => {
            let payload = match detector::detect(value) {
                EncryptedLiteral::Encrypted(payload) => payload,
                EncryptedLiteral::Plain(bare) => bare,
            };
            println!("{}", default_encryptor(&env)?.decrypt(payload)?);
        }
        Command::Get { key } => {
            EncryptablePropertiesBootstrap::new().initialize(&mut env)?;
            let value = env.property(key)?.ok_or_else(|| CliError::NotFound(key.clone()))?;
            println!("{value}");
        }
        Command::List => {
            let mut listed = Vec::new();
            for key in env.property_names() {
                let Some(source) = env.sources().iter().find(|s| s.raw_property(&key).is_some()) else {
                    continue;
                };
                if source.name() == EnvVarPropertySource::NAME {
                    continue;
                }
                let encrypted = source
                    .raw_property(&key)
                    .map(|raw| detector::is_encrypted(&raw))
                    .unwrap_or(false);
                listed.push(ListedProperty {
                    key,
                    source: source.name().to_string(),
                    encrypted,
                });
            }
            let printable =
                serde_json::to_string_pretty(&listed).map_err(|e| CliError::Output(format!("{e}")))?;
            println!("{printable}");
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_tracing();
    if let Err(err) = run(cli) {
        eprintln!("error: {err}");
        process::exit(1);
    }
}
