use std::{env, path::Path, path::PathBuf};

use log::{info, warn};

use crate::db::hamamatsu::transform::SyncMode;

/// Everything the job reads from the environment, resolved once at start-up.
/// Unset variables become empty strings so a misconfigured deployment fails
/// at the first call that needs the value, not at load time.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,
    pub cursor_store_path: String,
    pub cursor_key: String,
    pub bucket: String,
    pub bucket_prefix: String,
    pub webhook_url: String,
    pub scratch_dir: PathBuf,
    pub mode: SyncMode,
}

pub const DEFAULT_BUCKET_PREFIX: &str = "crawler";

impl Config {
    pub fn from_env() -> Config {
        Config::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Config
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).unwrap_or_default();

        let mode = match lookup("SYNC_MODE") {
            Some(s) if !s.trim().is_empty() => s.parse().unwrap_or_else(|_| {
                warn!("unknown SYNC_MODE {:?}, using incremental", s);
                SyncMode::Incremental
            }),
            _ => SyncMode::Incremental,
        };
        let scratch_dir = match lookup("SCRATCH_DIR") {
            Some(s) if !s.is_empty() => PathBuf::from(s),
            _ => env::temp_dir(),
        };

        Config {
            api_url: var("CERTIFIED_SHOPS_API_URL"),
            cursor_store_path: var("CURSOR_STORE_PATH"),
            cursor_key: var("CURSOR_KEY"),
            bucket: var("S3_BUCKET"),
            bucket_prefix: lookup("S3_PREFIX")
                .unwrap_or_else(|| DEFAULT_BUCKET_PREFIX.to_string()),
            webhook_url: var("WEBHOOK_URL"),
            scratch_dir,
            mode,
        }
    }
}

/// Load `.env/<name>.env` if it exists.  Variables already set in the process
/// environment take precedence.
pub fn load_dotenv(env_name: &str) {
    let path = format!(".env/{}.env", env_name);
    if Path::new(&path).exists() {
        match dotenvy::from_path(Path::new(&path)) {
            Ok(_) => info!("loaded {}", path),
            Err(e) => warn!("can't load {}: {}", path, e),
        }
    } else {
        info!("no {} file, using process environment only", path);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn unset_values_default_to_empty() {
        let config = Config::from_lookup(lookup(&[]));
        assert_eq!(config.api_url, "");
        assert_eq!(config.cursor_store_path, "");
        assert_eq!(config.cursor_key, "");
        assert_eq!(config.bucket, "");
        assert_eq!(config.webhook_url, "");
        assert_eq!(config.bucket_prefix, DEFAULT_BUCKET_PREFIX);
        assert_eq!(config.scratch_dir, env::temp_dir());
        assert_eq!(config.mode, SyncMode::Incremental);
    }

    #[test]
    fn reads_all_variables() {
        let config = Config::from_lookup(lookup(&[
            ("CERTIFIED_SHOPS_API_URL", "https://example.org/api"),
            ("CURSOR_STORE_PATH", "/tmp/cursor.duckdb"),
            ("CURSOR_KEY", "hamamatsu_certified"),
            ("S3_BUCKET", "shops"),
            ("S3_PREFIX", "import"),
            ("WEBHOOK_URL", "https://hooks.example.org/x"),
            ("SCRATCH_DIR", "/scratch"),
            ("SYNC_MODE", "full-snapshot"),
        ]));
        assert_eq!(config.api_url, "https://example.org/api");
        assert_eq!(config.cursor_store_path, "/tmp/cursor.duckdb");
        assert_eq!(config.cursor_key, "hamamatsu_certified");
        assert_eq!(config.bucket, "shops");
        assert_eq!(config.bucket_prefix, "import");
        assert_eq!(config.webhook_url, "https://hooks.example.org/x");
        assert_eq!(config.scratch_dir, PathBuf::from("/scratch"));
        assert_eq!(config.mode, SyncMode::FullSnapshot);
    }

    #[test]
    fn mode_accepts_cli_spellings() {
        let config = Config::from_lookup(lookup(&[("SYNC_MODE", "Full")]));
        assert_eq!(config.mode, SyncMode::FullSnapshot);
        let config = Config::from_lookup(lookup(&[("SYNC_MODE", "INCREMENTAL")]));
        assert_eq!(config.mode, SyncMode::Incremental);
    }

    #[test]
    fn bad_mode_falls_back_to_incremental() {
        let config = Config::from_lookup(lookup(&[("SYNC_MODE", "weekly")]));
        assert_eq!(config.mode, SyncMode::Incremental);
    }

    #[test]
    fn explicit_empty_prefix_is_kept() {
        let config = Config::from_lookup(lookup(&[("S3_PREFIX", "")]));
        assert_eq!(config.bucket_prefix, "");
    }
}
