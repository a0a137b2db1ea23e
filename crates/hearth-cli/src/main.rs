//! Hearth CLI - operator command-line interface
//!
//! Usage:
//!   hearth hash-password [--password <P>]
//!   hearth verify-password --hash <H> [--password <P>]
//!   hearth check-config [--file <F>]
//!
//! When `--password` is omitted the secret is read from one line of stdin.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use hearth_api::auth::PasswordHasher;
use hearth_core::AppConfig;
use std::io::{BufRead, Write};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "hearth")]
#[command(about = "Hearth authentication service tooling")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hash a password with the configured Argon2id cost
    HashPassword {
        /// Password to hash (read from stdin if omitted)
        #[arg(long)]
        password: Option<String>,
    },
    /// Check a password against a stored hash
    VerifyPassword {
        /// Encoded hash as stored in the accounts table
        #[arg(long)]
        hash: String,
        /// Password to check (read from stdin if omitted)
        #[arg(long)]
        password: Option<String>,
    },
    /// Load and validate configuration, then print it with secrets redacted
    CheckConfig {
        /// TOML file (defaults to $HEARTH_CONFIG, then environment only)
        #[arg(long)]
        file: Option<String>,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    run(cli.command, &mut stdin.lock(), &mut stdout)
}

fn run(
    command: Commands,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> anyhow::Result<ExitCode> {
    match command {
        Commands::HashPassword { password } => {
            let config = load_config(None)?;
            let hasher = PasswordHasher::new(&config.password)?;
            let secret = read_secret(password, input)?;

            writeln!(output, "{}", hasher.hash(&secret)?)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::VerifyPassword { hash, password } => {
            let config = load_config(None)?;
            let hasher = PasswordHasher::new(&config.password)?;
            let secret = read_secret(password, input)?;

            if hasher.verify(&secret, &hash) {
                writeln!(output, "match")?;
                Ok(ExitCode::SUCCESS)
            } else {
                writeln!(output, "mismatch")?;
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::CheckConfig { file } => {
            let config = load_config(file)?;
            config.validate().context("configuration is invalid")?;

            if config.auth.uses_development_secret() {
                tracing::warn!("JWT_SECRET is not set; the development signing key is in use");
            }

            // AuthConfig's Debug output redacts the signing secret
            writeln!(output, "{config:#?}")?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Same resolution order as the server: file, then environment on top
fn load_config(file: Option<String>) -> anyhow::Result<AppConfig> {
    let file = file.or_else(|| std::env::var("HEARTH_CONFIG").ok());

    let config = match file {
        Some(path) => AppConfig::from_file(&path)
            .with_context(|| format!("failed to load {path}"))?
            .with_env_override()?,
        None => AppConfig::from_env()?,
    };
    Ok(config)
}

fn read_secret(provided: Option<String>, input: &mut impl BufRead) -> anyhow::Result<String> {
    if let Some(secret) = provided {
        return Ok(secret);
    }

    let mut line = String::new();
    input.read_line(&mut line).context("failed to read password from stdin")?;

    let secret = line.trim_end_matches(['\r', '\n']);
    if secret.is_empty() {
        bail!("no password given");
    }
    Ok(secret.to_string())
}
