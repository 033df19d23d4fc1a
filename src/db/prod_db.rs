use crate::config::Config;
use crate::db::cursor_store::DuckDbCursorStore;
use crate::db::hamamatsu::certified_shops::CertifiedShopsArchive;
use crate::errors::Result;
use crate::job::SyncJob;
use crate::utils::notify::WebhookNotifier;
use crate::utils::object_store::S3ObjectStore;

pub type CertifiedShopsJob =
    SyncJob<CertifiedShopsArchive, DuckDbCursorStore, S3ObjectStore, WebhookNotifier>;

/// Production wiring of the archives and stores, all driven by [`Config`].
pub struct ProdDb {}

impl ProdDb {
    pub fn certified_shops(config: &Config) -> Result<CertifiedShopsArchive> {
        CertifiedShopsArchive::new(config.api_url.clone())
    }

    pub fn cursor_store(config: &Config) -> Result<DuckDbCursorStore> {
        DuckDbCursorStore::open(&config.cursor_store_path)
    }

    pub async fn certified_shops_job(config: &Config) -> Result<CertifiedShopsJob> {
        Ok(SyncJob::new(
            config,
            ProdDb::certified_shops(config)?,
            ProdDb::cursor_store(config)?,
            S3ObjectStore::new(config.bucket.clone()).await,
            WebhookNotifier::new(config.webhook_url.clone()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;
    use crate::db::cursor_store::CursorStore;

    #[test]
    fn cursor_store_from_config() -> std::result::Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("cursor.duckdb");
        let config = Config::from_lookup(|name| match name {
            "CURSOR_STORE_PATH" => Some(path.to_string_lossy().to_string()),
            _ => None,
        });
        let store = ProdDb::cursor_store(&config)?;
        assert_eq!(store.get("hamamatsu_certified")?, None);
        assert!(path.exists());
        Ok(())
    }
}
