//! authgrid CLI - register and log in with a locally stored keypair.

use anyhow::{Context, Result};
use authgrid::client::{AlgorithmPolicy, AuthClient, FileKeyStore, KeyStore};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Passwordless public-key authentication client
#[derive(Parser)]
#[command(name = "authgrid")]
#[command(about = "Passwordless public-key authentication client", long_about = None)]
struct Cli {
    /// Base URL of the authgrid server
    #[arg(long, global = true, env = "AUTHGRID_API", default_value = "http://127.0.0.1:8080")]
    api: String,

    /// Key store directory (default: ~/.authgrid)
    #[arg(long, global = true)]
    keystore: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a keypair and register it
    Register {
        #[arg(long, value_enum, default_value_t = AlgorithmChoice::Auto)]
        algorithm: AlgorithmChoice,
    },
    /// Log in with a stored identity and print the session token
    Login {
        #[arg(long)]
        handle: String,
    },
    /// List stored identities
    List,
    /// Delete a stored identity
    Remove {
        #[arg(long)]
        handle: String,
    },
    /// Revoke a session token
    Logout {
        #[arg(long)]
        token: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum AlgorithmChoice {
    /// Ed25519, falling back to ECDSA P-256 if unavailable
    Auto,
    Ed25519,
    Ecdsa,
}

impl From<AlgorithmChoice> for AlgorithmPolicy {
    fn from(choice: AlgorithmChoice) -> Self {
        match choice {
            AlgorithmChoice::Auto => AlgorithmPolicy::PreferEd25519,
            AlgorithmChoice::Ed25519 => AlgorithmPolicy::Ed25519Only,
            AlgorithmChoice::Ecdsa => AlgorithmPolicy::EcdsaOnly,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let dir = match cli.keystore {
        Some(dir) => dir,
        None => FileKeyStore::default_dir().context("Could not determine key store directory")?,
    };
    let store = Arc::new(FileKeyStore::new(dir));

    match cli.command {
        Commands::Register { algorithm } => {
            let client = AuthClient::new(&cli.api, store.clone()).with_policy(algorithm.into());
            let identity = client.register().await.context("Registration failed")?;
            println!("Registered new identity:");
            println!("  Handle:    {}", identity.handle);
            println!("  Algorithm: {}", identity.algorithm);
            println!("  Saved to:  {}", store.dir().display());
        }
        Commands::Login { handle } => {
            let client = AuthClient::new(&cli.api, store);
            let session = client.login(&handle).await.context("Login failed")?;
            println!("Authenticated as {}", session.handle);
            if let Some(expires_at) = session.expires_at {
                println!("Expires: {}", expires_at.to_rfc3339());
            }
            println!("Token: {}", session.token);
        }
        Commands::List => {
            let identities = store.list()?;
            if identities.is_empty() {
                println!("No stored identities in {}", store.dir().display());
            }
            for identity in identities {
                println!(
                    "{}  {:<7}  {}",
                    identity.handle,
                    identity.algorithm.as_str(),
                    identity.created_at.to_rfc3339()
                );
            }
        }
        Commands::Remove { handle } => {
            if store.remove(&handle)? {
                println!("Removed {}", handle);
            } else {
                anyhow::bail!("No stored identity for {}", handle);
            }
        }
        Commands::Logout { token } => {
            let client = AuthClient::new(&cli.api, store);
            client.logout(&token).await.context("Logout failed")?;
            println!("Logged out");
        }
    }

    Ok(())
}
