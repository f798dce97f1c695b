//! Environment-driven configuration for the pipeline binaries.
//!
//! Every binary reads its configuration once at startup. `.env` files are
//! honoured via `dotenvy`. Values the service cannot run without
//! (`CONCOURSE_INDEX_DB`, `CONCOURSE_INDEX_NAME`) have no defaults and fail
//! startup with [`PipelineError::Configuration`]; everything else falls back
//! to the defaults below.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::types::PipelineError;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_EMBED_MODEL: &str = "all-minilm";
pub const DEFAULT_LLM_MODEL: &str = "mistral";
pub const DEFAULT_DIMENSION: usize = 384;
pub const DEFAULT_TOP_K: usize = 3;
pub const DEFAULT_BIND: &str = "127.0.0.1:8000";
pub const DEFAULT_CHUNKS_FILE: &str = "cleaned_website_content.json";
pub const DEFAULT_EMBEDDED_FILE: &str = "embedded_content.json";
pub const DEFAULT_MIN_CHUNK_CHARS: usize = 50;
pub const DEFAULT_CHAT_TIMEOUT_SECS: u64 = 120;

/// Pages harvested when `CONCOURSE_URLS` is not set.
pub const DEFAULT_HARVEST_URLS: [&str; 2] = [
    "https://www.changiairport.com/",
    "https://www.jewelchangiairport.com/",
];

/// Configuration shared by the index and serve stages.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub index_db: PathBuf,
    pub index_name: String,
    pub ollama_url: Url,
    pub embed_model: String,
    pub llm_model: String,
    pub dimension: usize,
    pub top_k: usize,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, PipelineError> {
        dotenvy::dotenv().ok();
        Ok(Self {
            index_db: PathBuf::from(required_var("CONCOURSE_INDEX_DB")?),
            index_name: required_var("CONCOURSE_INDEX_NAME")?,
            ollama_url: url_var("CONCOURSE_OLLAMA_URL", DEFAULT_OLLAMA_URL)?,
            embed_model: string_var("CONCOURSE_EMBED_MODEL", DEFAULT_EMBED_MODEL),
            llm_model: string_var("CONCOURSE_LLM_MODEL", DEFAULT_LLM_MODEL),
            dimension: parsed_var("CONCOURSE_DIMENSION", DEFAULT_DIMENSION)?,
            top_k: parsed_var("CONCOURSE_TOP_K", DEFAULT_TOP_K)?,
        })
    }
}

/// Configuration for the harvest stage.
#[derive(Clone, Debug)]
pub struct HarvestConfig {
    pub urls: Vec<Url>,
    pub chunks_file: PathBuf,
    pub cache_dir: Option<PathBuf>,
    pub min_chunk_chars: usize,
}

impl HarvestConfig {
    pub fn from_env() -> Result<Self, PipelineError> {
        dotenvy::dotenv().ok();
        let urls = match optional_var("CONCOURSE_URLS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(parse_url)
                .collect::<Result<Vec<_>, _>>()?,
            None => DEFAULT_HARVEST_URLS
                .iter()
                .map(|value| parse_url(value))
                .collect::<Result<Vec<_>, _>>()?,
        };
        if urls.is_empty() {
            return Err(PipelineError::Configuration(
                "CONCOURSE_URLS is set but contains no URLs".to_string(),
            ));
        }
        Ok(Self {
            urls,
            chunks_file: chunks_file_from_env(),
            cache_dir: optional_var("CONCOURSE_CACHE_DIR").map(PathBuf::from),
            min_chunk_chars: parsed_var("CONCOURSE_MIN_CHUNK_CHARS", DEFAULT_MIN_CHUNK_CHARS)?,
        })
    }
}

/// Configuration for the embed stage.
#[derive(Clone, Debug)]
pub struct EmbedConfig {
    pub chunks_file: PathBuf,
    pub embedded_file: PathBuf,
    pub ollama_url: Url,
    pub embed_model: String,
    pub dimension: usize,
}

impl EmbedConfig {
    pub fn from_env() -> Result<Self, PipelineError> {
        dotenvy::dotenv().ok();
        Ok(Self {
            chunks_file: chunks_file_from_env(),
            embedded_file: embedded_file_from_env(),
            ollama_url: url_var("CONCOURSE_OLLAMA_URL", DEFAULT_OLLAMA_URL)?,
            embed_model: string_var("CONCOURSE_EMBED_MODEL", DEFAULT_EMBED_MODEL),
            dimension: parsed_var("CONCOURSE_DIMENSION", DEFAULT_DIMENSION)?,
        })
    }
}

/// Configuration for the interactive chat client.
#[derive(Clone, Debug)]
pub struct ChatConfig {
    pub server_url: Url,
    pub timeout: Duration,
}

impl ChatConfig {
    pub fn from_env() -> Result<Self, PipelineError> {
        dotenvy::dotenv().ok();
        Ok(Self {
            server_url: url_var("CONCOURSE_SERVER_URL", "http://127.0.0.1:8000")?,
            timeout: Duration::from_secs(parsed_var(
                "CONCOURSE_CHAT_TIMEOUT_SECS",
                DEFAULT_CHAT_TIMEOUT_SECS,
            )?),
        })
    }
}

/// Path of the harvest stage's output file.
pub fn chunks_file_from_env() -> PathBuf {
    PathBuf::from(string_var("CONCOURSE_CHUNKS_FILE", DEFAULT_CHUNKS_FILE))
}

/// Path of the embed stage's output file.
pub fn embedded_file_from_env() -> PathBuf {
    PathBuf::from(string_var("CONCOURSE_EMBEDDED_FILE", DEFAULT_EMBEDDED_FILE))
}

/// Socket address the HTTP front door binds to.
pub fn bind_addr_from_env() -> Result<SocketAddr, PipelineError> {
    let raw = string_var("CONCOURSE_BIND", DEFAULT_BIND);
    raw.parse().map_err(|err| {
        PipelineError::Configuration(format!("CONCOURSE_BIND '{raw}' is not a socket address: {err}"))
    })
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn required_var(key: &str) -> Result<String, PipelineError> {
    optional_var(key).ok_or_else(|| PipelineError::Configuration(format!("{key} is not set")))
}

fn string_var(key: &str, default: &str) -> String {
    optional_var(key).unwrap_or_else(|| default.to_string())
}

fn parsed_var<T>(key: &str, default: T) -> Result<T, PipelineError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_var(key) {
        Some(raw) => raw.parse().map_err(|err| {
            PipelineError::Configuration(format!("failed to parse {key}='{raw}': {err}"))
        }),
        None => Ok(default),
    }
}

fn url_var(key: &str, default: &str) -> Result<Url, PipelineError> {
    let raw = string_var(key, default);
    parse_url(&raw)
}

fn parse_url(raw: &str) -> Result<Url, PipelineError> {
    Url::parse(raw)
        .map_err(|err| PipelineError::Configuration(format!("'{raw}' is not a valid URL: {err}")))
}
