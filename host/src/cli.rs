//! Command-line and config-file bootstrap (§9), grounded on `host/src/lib.rs`'s
//! `Cli`: a `clap`-derived struct that doubles as a `serde`-deserializable
//! config file, merged file-over-defaults then CLI/env-over-file.

use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_concurrency_limit() -> usize {
    16
}

fn default_worker_concurrency() -> usize {
    imagegen_worker::DEFAULT_WORKER_CONCURRENCY
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_database_url() -> String {
    "postgres://localhost/imagegen".to_string()
}

fn default_blob_root() -> PathBuf {
    PathBuf::from("data/blobs")
}

fn default_scratch_root() -> PathBuf {
    PathBuf::from("data/scratch")
}

fn default_cors_origin() -> String {
    "*".to_string()
}

fn default_token_secret_key() -> String {
    "development-only-secret".to_string()
}

/// Environment-visible configuration keys named by §6: `TOKEN_SECRET_KEY`,
/// `R2_*`, `TEMP_FILE_CLEANUP_CRON`, `CORS_ORIGIN`, plus `DATABASE_URL` for
/// the ledger/orchestrator's Postgres pool (added — the spec's persisted
/// state layout requires one, it just doesn't name the env var).
#[derive(Default, Clone, Serialize, Deserialize, Debug, Parser)]
#[command(name = "imagegen-host", about = "The image generation core", long_about = None)]
#[serde(default)]
pub struct Cli {
    #[arg(long, require_equals = true, default_value = "0.0.0.0:8080")]
    #[serde(default = "default_address")]
    pub address: String,

    #[arg(long, require_equals = true, default_value = "16")]
    #[serde(default = "default_concurrency_limit")]
    /// Limit the max number of in-flight requests.
    pub concurrency_limit: usize,

    #[arg(long, require_equals = true)]
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,

    #[arg(long, require_equals = true)]
    pub log_path: Option<PathBuf>,

    #[arg(long, require_equals = true, env = "RUST_LOG", default_value = "info")]
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[arg(long, require_equals = true)]
    /// Path to a config file merged underneath these CLI/env options.
    pub config_path: Option<PathBuf>,

    #[arg(long, require_equals = true, env = "DATABASE_URL")]
    #[serde(default = "default_database_url")]
    pub database_url: String,

    #[arg(long, require_equals = true, env = "TOKEN_SECRET_KEY")]
    #[serde(default = "default_token_secret_key")]
    pub token_secret_key: String,

    #[arg(long, require_equals = true, env = "CORS_ORIGIN")]
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,

    #[arg(long, require_equals = true, env = "TEMP_FILE_CLEANUP_CRON")]
    pub temp_file_cleanup_cron: Option<String>,

    #[arg(long, require_equals = true)]
    #[serde(default = "default_blob_root")]
    /// Local filesystem root for `LocalBlobStore`; ignored when R2 creds
    /// are set.
    pub blob_root: PathBuf,

    #[arg(long, require_equals = true)]
    #[serde(default = "default_scratch_root")]
    pub scratch_root: PathBuf,

    #[arg(long, require_equals = true, env = "R2_ENDPOINT")]
    pub r2_endpoint: Option<String>,

    #[arg(long, require_equals = true, env = "R2_BUCKET")]
    pub r2_bucket: Option<String>,

    #[arg(long, require_equals = true, env = "R2_ACCESS_KEY_ID")]
    pub r2_access_key_id: Option<String>,

    #[arg(long, require_equals = true, env = "R2_SECRET_ACCESS_KEY")]
    pub r2_secret_access_key: Option<String>,

    #[arg(long, require_equals = true, env = "R2_PUBLIC_BASE_URL")]
    pub r2_public_base_url: Option<String>,

    #[arg(long, require_equals = true, env = "MODEL_ENDPOINT")]
    /// Base URL of the generative model's HTTP endpoint. Falls back to an
    /// in-process `MockModelClient` when unset, for local development.
    pub model_endpoint: Option<String>,

    #[arg(long, require_equals = true, env = "MODEL_API_KEY")]
    pub model_api_key: Option<String>,
}

impl Cli {
    pub fn merge_from_file(&mut self) -> anyhow::Result<()> {
        let Some(path) = self.config_path.clone() else {
            return Ok(());
        };
        let file = std::fs::File::open(&path)?;
        let reader = std::io::BufReader::new(file);
        let mut config: Value = serde_json::from_reader(reader)?;
        let this = serde_json::to_value(&self)?;
        merge(&mut config, &this);
        *self = serde_json::from_value(config)?;
        Ok(())
    }

    /// Whether `R2_*` credentials were supplied; drives the `BlobStore`
    /// backend choice at boot.
    pub fn has_remote_blobstore(&self) -> bool {
        self.r2_endpoint.is_some() && self.r2_bucket.is_some() && self.r2_access_key_id.is_some()
    }
}

/// Merges `b` over `a`, keeping `a`'s value wherever `b`'s is null.
fn merge(a: &mut Value, b: &Value) {
    match (a, b) {
        (Value::Object(a), Value::Object(b)) => {
            for (k, v) in b {
                merge(a.entry(k.clone()).or_insert(Value::Null), v);
            }
        }
        (a, b) if !b.is_null() => *a = b.clone(),
        _ => {}
    }
}
