use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_INDEXER_NAME: &str = "doc-questioning-indexer";
const DEFAULT_SEMANTIC_CONFIGURATION: &str = "default";
const DEFAULT_LOCAL_STORAGE_PATH: &str = "data/blobs";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
    /// Configuration was installed twice in the same process.
    #[error("Configuration already initialized")]
    AlreadyInitialized,
}

/// Runtime configuration for the document question-answering service.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Backend used for blob storage.
    pub storage_backend: StorageBackend,
    /// Blob account endpoint, required by the Azure backend.
    pub blob_storage_url: Option<String>,
    /// Optional SAS token appended to every blob request.
    pub blob_sas_token: Option<String>,
    /// Root directory for the local filesystem backend.
    pub local_storage_path: String,
    /// Container receiving freshly uploaded documents.
    pub staging_container: String,
    /// Container crawled by the search indexer.
    pub query_container: String,
    /// Search service endpoint.
    pub search_endpoint: String,
    /// Optional search admin/query key.
    pub search_api_key: Option<String>,
    /// Index queried when answering questions.
    pub search_index_name: String,
    /// Indexer reset and re-run after the query container changes.
    pub search_indexer_name: String,
    /// Query syntax used for passage retrieval.
    pub search_query_type: SearchQueryType,
    /// Semantic configuration name used when `search_query_type` is semantic.
    pub search_semantic_configuration: String,
    /// Number of passages requested per question.
    pub search_top: usize,
    /// Azure OpenAI endpoint.
    pub openai_endpoint: String,
    /// Optional Azure OpenAI key.
    pub openai_api_key: Option<String>,
    /// Chat deployment used for answer generation.
    pub openai_deployment: String,
    /// Delay between copy status checks, in milliseconds.
    pub copy_poll_interval_ms: u64,
    /// Maximum time to wait for a single copy to settle, in milliseconds.
    pub copy_timeout_ms: u64,
    /// Head start given to the indexer after a refresh request, in milliseconds.
    pub refresh_settle_delay_ms: u64,
    /// Number of copies allowed in flight within one promotion batch.
    pub promotion_concurrency: usize,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported blob storage backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Azure Blob Storage over its REST API.
    Azure,
    /// Process-local in-memory store.
    Memory,
    /// Local filesystem rooted at `LOCAL_STORAGE_PATH`.
    Local,
}

/// Query syntax used against the search index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchQueryType {
    /// Full Lucene query syntax.
    #[default]
    Full,
    /// Semantic ranking with extractive captions and answers.
    Semantic,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let storage_backend = match load_env_optional("STORAGE_BACKEND") {
            Some(value) => value
                .parse()
                .map_err(|()| ConfigError::InvalidValue("STORAGE_BACKEND".to_string()))?,
            None => StorageBackend::Azure,
        };
        let blob_storage_url = load_env_optional("BLOB_STORAGE_URL");
        if storage_backend == StorageBackend::Azure && blob_storage_url.is_none() {
            return Err(ConfigError::MissingVariable("BLOB_STORAGE_URL".to_string()));
        }

        Ok(Self {
            storage_backend,
            blob_storage_url,
            blob_sas_token: load_env_optional("BLOB_SAS_TOKEN"),
            local_storage_path: load_env_optional("LOCAL_STORAGE_PATH")
                .unwrap_or_else(|| DEFAULT_LOCAL_STORAGE_PATH.to_string()),
            staging_container: load_env("BLOB_CONTAINER_NAME")?,
            query_container: load_env("SEARCH_CONTAINER_NAME")?,
            search_endpoint: load_env("SEARCH_ENDPOINT")?,
            search_api_key: load_env_optional("SEARCH_API_KEY"),
            search_index_name: load_env("SEARCH_INDEX_NAME")?,
            search_indexer_name: load_env_optional("SEARCH_INDEXER_NAME")
                .unwrap_or_else(|| DEFAULT_INDEXER_NAME.to_string()),
            search_query_type: match load_env_optional("SEARCH_QUERY_TYPE") {
                Some(value) => value
                    .parse()
                    .map_err(|()| ConfigError::InvalidValue("SEARCH_QUERY_TYPE".to_string()))?,
                None => SearchQueryType::Full,
            },
            search_semantic_configuration: load_env_optional("SEARCH_SEMANTIC_CONFIGURATION")
                .unwrap_or_else(|| DEFAULT_SEMANTIC_CONFIGURATION.to_string()),
            search_top: parse_optional("SEARCH_TOP")?.unwrap_or(50),
            openai_endpoint: load_env("OPENAI_ENDPOINT")?,
            openai_api_key: load_env_optional("OPENAI_API_KEY"),
            openai_deployment: load_env("OPENAI_DEPLOYMENT_NAME")?,
            copy_poll_interval_ms: nonzero_or(
                "COPY_POLL_INTERVAL_MS",
                parse_optional("COPY_POLL_INTERVAL_MS")?,
                500,
            )?,
            copy_timeout_ms: nonzero_or(
                "COPY_TIMEOUT_MS",
                parse_optional("COPY_TIMEOUT_MS")?,
                120_000,
            )?,
            refresh_settle_delay_ms: parse_optional("REFRESH_SETTLE_DELAY_MS")?.unwrap_or(1_500),
            promotion_concurrency: parse_optional("PROMOTION_CONCURRENCY")?.unwrap_or(1),
            server_port: parse_optional("SERVER_PORT")?,
        })
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    load_env_optional(key).ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    parse_value(key, load_env_optional(key))
}

fn parse_value<T: std::str::FromStr>(
    key: &str,
    value: Option<String>,
) -> Result<Option<T>, ConfigError> {
    value
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

/// Rejects an explicit zero; an unset value falls back to `default`.
fn nonzero_or(key: &str, value: Option<u64>, default: u64) -> Result<u64, ConfigError> {
    match value {
        Some(0) => Err(ConfigError::InvalidValue(key.to_string())),
        Some(value) => Ok(value),
        None => Ok(default),
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "azure" => Ok(Self::Azure),
            "memory" => Ok(Self::Memory),
            "local" => Ok(Self::Local),
            _ => Err(()),
        }
    }
}

impl std::str::FromStr for SearchQueryType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "semantic" => Ok(Self::Semantic),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        backend = ?config.storage_backend,
        staging = %config.staging_container,
        query = %config.query_container,
        index = %config.search_index_name,
        indexer = %config.search_indexer_name,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG
        .set(config)
        .map_err(|_| ConfigError::AlreadyInitialized)?;
    CONFIG.get().ok_or(ConfigError::AlreadyInitialized)
}
