use anyhow::{Context, Result};
use clap::Parser;
use std::{env, path::PathBuf, str::FromStr, time::Duration};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: PathBuf,
    pub extract_dir: PathBuf,
    pub database_url: String,
    pub request_timeout: Duration,
    pub max_tree_depth: usize,
    pub max_tree_nodes: usize,
    pub max_extracted_bytes: u64,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Browse and download uploaded code archives")]
pub struct Args {
    /// Host to bind to (overrides CODE_ARCHIVE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides CODE_ARCHIVE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory holding uploaded archives (overrides CODE_ARCHIVE_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<PathBuf>,

    /// Directory for extraction roots, defaults to the storage directory
    /// (overrides CODE_ARCHIVE_EXTRACT_DIR)
    #[arg(long)]
    pub extract_dir: Option<PathBuf>,

    /// Catalog database URL (overrides CODE_ARCHIVE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Overall per-request timeout in seconds (overrides CODE_ARCHIVE_REQUEST_TIMEOUT_SECS)
    #[arg(long)]
    pub request_timeout_secs: Option<u64>,

    /// Deepest path allowed in a file tree (overrides CODE_ARCHIVE_MAX_TREE_DEPTH)
    #[arg(long)]
    pub max_tree_depth: Option<usize>,

    /// Most entries allowed in a file tree (overrides CODE_ARCHIVE_MAX_TREE_NODES)
    #[arg(long)]
    pub max_tree_nodes: Option<usize>,

    /// Ceiling on bytes written while extracting one archive
    /// (overrides CODE_ARCHIVE_MAX_EXTRACTED_BYTES)
    #[arg(long)]
    pub max_extracted_bytes: Option<u64>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_TREE_DEPTH: usize = 32;
const DEFAULT_MAX_TREE_NODES: usize = 10_000;
const DEFAULT_MAX_EXTRACTED_BYTES: u64 = 512 * 1024 * 1024;

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("CODE_ARCHIVE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = env_number("CODE_ARCHIVE_PORT", DEFAULT_PORT)?;
        let env_storage = env::var("CODE_ARCHIVE_STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./uploads"));
        let env_extract = env::var("CODE_ARCHIVE_EXTRACT_DIR").ok().map(PathBuf::from);
        let env_db = env::var("CODE_ARCHIVE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/catalog.db".into());
        let env_timeout = env_number(
            "CODE_ARCHIVE_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?;
        let env_depth = env_number("CODE_ARCHIVE_MAX_TREE_DEPTH", DEFAULT_MAX_TREE_DEPTH)?;
        let env_nodes = env_number("CODE_ARCHIVE_MAX_TREE_NODES", DEFAULT_MAX_TREE_NODES)?;
        let env_bytes = env_number(
            "CODE_ARCHIVE_MAX_EXTRACTED_BYTES",
            DEFAULT_MAX_EXTRACTED_BYTES,
        )?;

        // --- Merge ---
        let storage_dir = args.storage_dir.unwrap_or(env_storage);
        let extract_dir = args
            .extract_dir
            .or(env_extract)
            .unwrap_or_else(|| storage_dir.clone());
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir,
            extract_dir,
            database_url: args.database_url.unwrap_or(env_db),
            request_timeout: Duration::from_secs(args.request_timeout_secs.unwrap_or(env_timeout)),
            max_tree_depth: args.max_tree_depth.unwrap_or(env_depth),
            max_tree_nodes: args.max_tree_nodes.unwrap_or(env_nodes),
            max_extracted_bytes: args.max_extracted_bytes.unwrap_or(env_bytes),
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Read a numeric environment variable, using `default` when it is unset.
fn env_number<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

#[cfg(test)]
impl AppConfig {
    /// Defaults pointed at a scratch storage directory.
    pub fn for_storage(storage: &std::path::Path) -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            storage_dir: storage.to_path_buf(),
            extract_dir: storage.to_path_buf(),
            database_url: "sqlite::memory:".into(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_tree_depth: DEFAULT_MAX_TREE_DEPTH,
            max_tree_nodes: DEFAULT_MAX_TREE_NODES,
            max_extracted_bytes: DEFAULT_MAX_EXTRACTED_BYTES,
        }
    }
}
