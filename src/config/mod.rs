use crate::errors::{ShelfError, ShelfResult};

/// Column limits mirrored from the `feeds` table.
pub const FEED_ADDRESS_MAX_LEN: usize = 255;
pub const FEED_LINK_MAX_LEN: usize = 1000;
pub const FEED_TITLE_MAX_LEN: usize = 255;

pub const DEFAULT_FETCH_BATCH_SIZE: usize = 4;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub fetch_batch_size: usize,
    pub http_timeout_secs: u64,
}

impl Config {
    /// Get the directory where the executable is located
    fn exe_dir() -> Option<std::path::PathBuf> {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    pub fn from_env() -> ShelfResult<Self> {
        let exe_dir = Self::exe_dir();

        // Try to load .env from executable's directory first
        if let Some(ref dir) = exe_dir {
            let env_path = dir.join(".env");
            if env_path.exists() {
                dotenvy::from_path(&env_path).ok();
            }
        }
        // Fall back to current directory
        dotenvy::dotenv().ok();

        // Default db_path is relative to executable directory
        let db_path = std::env::var("FEEDSHELF_DB_PATH").unwrap_or_else(|_| {
            exe_dir
                .map(|d| d.join("feedshelf.db").to_string_lossy().into_owned())
                .unwrap_or_else(|| "./feedshelf.db".to_string())
        });

        let fetch_batch_size = Self::parse_var(
            "FEEDSHELF_FETCH_BATCH_SIZE",
            DEFAULT_FETCH_BATCH_SIZE,
        )?;
        if fetch_batch_size == 0 {
            return Err(ShelfError::Config(
                "FEEDSHELF_FETCH_BATCH_SIZE must be at least 1".to_string(),
            ));
        }

        let http_timeout_secs =
            Self::parse_var("FEEDSHELF_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?;

        Ok(Self {
            db_path,
            fetch_batch_size,
            http_timeout_secs,
        })
    }

    fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> ShelfResult<T> {
        match std::env::var(name) {
            Ok(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ShelfError::Config(format!("{} is not a valid number: {}", name, raw))),
            Err(_) => Ok(default),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: "./feedshelf.db".to_string(),
            fetch_batch_size: DEFAULT_FETCH_BATCH_SIZE,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}
