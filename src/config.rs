//! # Configuration Management
//!
//! Configuration comes from the environment (12-factor style), with a `.env`
//! file picked up for local development.
//!
//! ## Environment Variables
//! - `HOST` / `PORT`: bind address (default `127.0.0.1:8080`)
//! - `STORAGE`: `sqlite` (default) or `memory`
//! - `DATABASE_URL`: SQLite connection string (default `sqlite:authgrid.db?mode=rwc`)
//! - `AUTHGRID_DOMAIN`: domain part of generated handles (default `authgrid.net`)
//! - `CHALLENGE_TTL_SECS`: challenge lifetime (default 120)
//! - `SESSION_TTL_SECS`: session token lifetime (default 86400)
//! - `ALLOWED_ALGORITHMS`: comma list accepted at registration (default `ed25519,ecdsa`)
//! - `RATE_LIMIT_PER_SECOND` / `RATE_LIMIT_BURST`: global request limit (default 100 / 200)
//! - `CLEANUP_INTERVAL_SECS`: how often expired records are swept (default 600)

use crate::challenge::DEFAULT_CHALLENGE_TTL_SECS;
use crate::crypto::Algorithm;
use crate::protocol::ProtocolSettings;
use crate::session::DEFAULT_SESSION_TTL_SECS;
use anyhow::{bail, Context, Result};
use std::env;
use std::str::FromStr;

/// Where identities, challenges and sessions live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Memory,
    Sqlite,
}

impl FromStr for StorageKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageKind::Memory),
            "sqlite" => Ok(StorageKind::Sqlite),
            other => bail!("unknown storage backend '{}', expected 'memory' or 'sqlite'", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub storage: StorageKind,
    pub database_url: String,
    pub domain: String,
    pub challenge_ttl_secs: i64,
    pub session_ttl_secs: i64,
    pub allowed_algorithms: Vec<Algorithm>,
    pub rate_limit_per_second: u32,
    pub rate_limit_burst: u32,
    pub cleanup_interval_secs: u64,
}

impl Config {
    /// Load configuration from the process environment (and `.env`, if present).
    pub fn from_env() -> Result<Self> {
        // dotenvy doesn't error if the file is missing
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key lookup. Unset keys fall back to defaults;
    /// set-but-invalid values are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let config = Config {
            host: get("HOST", "127.0.0.1"),
            port: parse_var(&lookup, "PORT", 8080)?,
            storage: get("STORAGE", "sqlite").parse()?,
            database_url: get("DATABASE_URL", "sqlite:authgrid.db?mode=rwc"),
            domain: get("AUTHGRID_DOMAIN", "authgrid.net"),
            challenge_ttl_secs: parse_var(&lookup, "CHALLENGE_TTL_SECS", DEFAULT_CHALLENGE_TTL_SECS)?,
            session_ttl_secs: parse_var(&lookup, "SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?,
            allowed_algorithms: parse_algorithms(&get("ALLOWED_ALGORITHMS", "ed25519,ecdsa"))?,
            rate_limit_per_second: parse_var(&lookup, "RATE_LIMIT_PER_SECOND", 100)?,
            rate_limit_burst: parse_var(&lookup, "RATE_LIMIT_BURST", 200)?,
            cleanup_interval_secs: parse_var(&lookup, "CLEANUP_INTERVAL_SECS", 600)?,
        };

        if config.challenge_ttl_secs <= 0 || config.session_ttl_secs <= 0 {
            bail!("CHALLENGE_TTL_SECS and SESSION_TTL_SECS must be positive");
        }
        if config.rate_limit_per_second == 0 || config.rate_limit_burst == 0 {
            bail!("RATE_LIMIT_PER_SECOND and RATE_LIMIT_BURST must be positive");
        }
        if config.cleanup_interval_secs == 0 {
            bail!("CLEANUP_INTERVAL_SECS must be positive");
        }

        Ok(config)
    }

    /// Socket address for `tokio::net::TcpListener::bind()`, e.g. `127.0.0.1:8080`
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn protocol_settings(&self) -> ProtocolSettings {
        ProtocolSettings {
            domain: self.domain.clone(),
            challenge_ttl: chrono::Duration::seconds(self.challenge_ttl_secs),
            session_ttl: chrono::Duration::seconds(self.session_ttl_secs),
            allowed_algorithms: self.allowed_algorithms.clone(),
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: '{}'", key, raw)),
        None => Ok(default),
    }
}

fn parse_algorithms(list: &str) -> Result<Vec<Algorithm>> {
    let mut algorithms = Vec::new();
    for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let algorithm: Algorithm = name
            .parse()
            .map_err(|_| anyhow::anyhow!("unknown algorithm in ALLOWED_ALGORITHMS: '{}'", name))?;
        if !algorithms.contains(&algorithm) {
            algorithms.push(algorithm);
        }
    }
    if algorithms.is_empty() {
        bail!("ALLOWED_ALGORITHMS must name at least one algorithm");
    }
    Ok(algorithms)
}
