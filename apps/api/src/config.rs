use std::path::PathBuf;

use anyhow::{bail, Context, Result};

/// Where archived summary markdown is written.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageBackend {
    Local { root: PathBuf },
    S3(S3Config),
}

#[derive(Debug, Clone, PartialEq)]
pub struct S3Config {
    pub bucket: String,
    pub endpoint: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub anthropic_api_key: String,
    /// Channel whose viewer samples are used for the max-viewers lookup.
    pub broadcaster_username: String,
    pub instructions_path: PathBuf,
    pub storage: StorageBackend,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            broadcaster_username: require_env("BROADCASTER_USERNAME")?,
            instructions_path: std::env::var("INSTRUCTIONS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("../STREAM_SUMMARY_INSTRUCTIONS.md")),
            storage: storage_from_env()?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn storage_from_env() -> Result<StorageBackend> {
    let backend = std::env::var("STORAGE_BACKEND").unwrap_or_else(|_| "local".to_string());
    parse_storage_backend(&backend, |key| std::env::var(key).ok())
}

fn parse_storage_backend(
    backend: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<StorageBackend> {
    let require = |key: &str| {
        lookup(key).with_context(|| format!("Required environment variable '{key}' is not set"))
    };

    match backend.trim().to_ascii_lowercase().as_str() {
        "local" => Ok(StorageBackend::Local {
            root: PathBuf::from(lookup("LOCAL_STORAGE_DIR").unwrap_or_else(|| "./data".to_string())),
        }),
        "s3" => Ok(StorageBackend::S3(S3Config {
            bucket: require("S3_BUCKET")?,
            endpoint: require("S3_ENDPOINT")?,
            region: lookup("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            access_key_id: require("AWS_ACCESS_KEY_ID")?,
            secret_access_key: require("AWS_SECRET_ACCESS_KEY")?,
        })),
        other => bail!("STORAGE_BACKEND must be 'local' or 's3', got '{other}'"),
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
