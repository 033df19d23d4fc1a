use std::path::PathBuf;

use log::{error, info, warn};
use serde::Serialize;

use crate::config::Config;
use crate::db::cursor_store::{Cursor, CursorStore};
use crate::db::hamamatsu::certified_shops::{output_path, update_token, ShopSource};
use crate::db::hamamatsu::transform::{transform, write_rows, SyncMode};
use crate::errors::Result;
use crate::utils::notify::Notifier;
use crate::utils::object_store::{object_key, ObjectStore};
use crate::utils::retry::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The published version matches the stored cursor.
    NotModified,
    Updated(SyncReport),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub previous: Option<Cursor>,
    pub cursor: Cursor,
    pub file: PathBuf,
    /// Object key, `None` when there was nothing new to upload.
    pub uploaded_key: Option<String>,
    pub rows_written: usize,
    pub message: String,
}

/// What the job hands back to its caller, `{"statusCode": .., "body": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub status_code: u16,
    pub body: String,
}

impl Status {
    pub fn from_result(result: &Result<Outcome>) -> Status {
        match result {
            Ok(Outcome::NotModified) => Status {
                status_code: 304,
                body: "not modified".to_string(),
            },
            Ok(Outcome::Updated(report)) => Status {
                status_code: 200,
                body: report.message.clone(),
            },
            Err(_) => Status {
                status_code: 500,
                body: "error".to_string(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code < 400
    }
}

/// One line summary posted after every new version.
pub fn notification_message(previous: Option<&Cursor>, token: &str, total: u64) -> String {
    let prev_token = previous.map(|c| c.last_update.as_str()).unwrap_or("none");
    let prev_count = previous.and_then(|c| c.row_count).unwrap_or(0);
    let delta = total as i64 - prev_count as i64;
    format!(
        "certified shops updated: {} -> {}, rows {} -> {} ({:+})",
        prev_token, token, prev_count, total, delta
    )
}

pub struct SyncJob<S, C, O, N> {
    pub source: S,
    pub cursors: C,
    pub store: O,
    pub notifier: N,
    pub cursor_key: String,
    pub bucket_prefix: String,
    pub scratch_dir: PathBuf,
    pub mode: SyncMode,
    pub retry: RetryPolicy,
}

impl<S, C, O, N> SyncJob<S, C, O, N>
where
    S: ShopSource,
    C: CursorStore,
    O: ObjectStore,
    N: Notifier,
{
    pub fn new(config: &Config, source: S, cursors: C, store: O, notifier: N) -> Self {
        SyncJob {
            source,
            cursors,
            store,
            notifier,
            cursor_key: config.cursor_key.clone(),
            bucket_prefix: config.bucket_prefix.clone(),
            scratch_dir: config.scratch_dir.clone(),
            mode: config.mode,
            retry: RetryPolicy::default(),
        }
    }

    /// Fetch, detect, transform, upload, notify, persist.  Stops at the first
    /// error.  Nothing is rolled back, so a failure after the upload leaves
    /// the bucket ahead of the cursor.
    pub async fn run(&self) -> Result<Outcome> {
        let retry = &self.retry;
        let source = &self.source;
        let cursors = &self.cursors;
        let key = self.cursor_key.as_str();

        let resource = retry
            .run("fetch dataset metadata", || source.latest_resource())
            .await?;
        let token = update_token(&resource.updated)?;

        let previous = retry
            .run("read cursor", || async move { cursors.get(key) })
            .await?;
        if let Some(prev) = &previous {
            if prev.last_update == token {
                info!("dataset not modified since {}", token);
                return Ok(Outcome::NotModified);
            }
        }
        info!(
            "new version {} (previous {})",
            token,
            previous
                .as_ref()
                .map(|c| c.last_update.as_str())
                .unwrap_or("none")
        );

        let url = resource.download_url.as_str();
        let table = retry
            .run("download csv", || source.download_table(url))
            .await?;
        let total = table.len() as u64;
        let already_written = previous.as_ref().and_then(|c| c.row_count).unwrap_or(0);
        if self.mode == SyncMode::Incremental && total < already_written {
            warn!(
                "table has {} rows, fewer than the {} already exported, rows were removed upstream",
                total, already_written
            );
        }

        let rows = transform(&table, self.mode, already_written);
        let file = output_path(&self.scratch_dir, &token);
        write_rows(&file, &rows, self.mode)?;
        info!("wrote {} rows to {}", rows.len(), file.display());

        let uploaded_key = if rows.is_empty() {
            info!("no new rows, skipping upload");
            None
        } else {
            let object = object_key(&self.bucket_prefix, &file);
            let (store, path, object_ref) = (&self.store, file.as_path(), object.as_str());
            retry
                .run("upload", || store.upload_file(path, object_ref))
                .await?;
            Some(object)
        };

        let message = notification_message(previous.as_ref(), &token, total);
        let notifier = &self.notifier;
        let msg = message.as_str();
        retry.run("notify", || notifier.notify(msg)).await?;

        let cursor = Cursor {
            last_update: token,
            row_count: match self.mode {
                SyncMode::Incremental => Some(total),
                SyncMode::FullSnapshot => previous.as_ref().and_then(|c| c.row_count),
            },
        };
        let new_cursor = &cursor;
        match previous {
            None => {
                retry
                    .run("insert cursor", || async move { cursors.insert(key, new_cursor) })
                    .await?
            }
            Some(_) => {
                retry
                    .run("update cursor", || async move { cursors.update(key, new_cursor) })
                    .await?
            }
        }
        info!("{}", message);

        Ok(Outcome::Updated(SyncReport {
            previous,
            cursor,
            file,
            uploaded_key,
            rows_written: rows.len(),
            message,
        }))
    }

    /// Run the job and turn the outcome into a status.  Errors are logged
    /// here and reported as an opaque 500.
    pub async fn handle(&self) -> Status {
        let result = self.run().await;
        if let Err(e) = &result {
            error!("certified shops sync failed: {:?}", e);
        }
        Status::from_result(&result)
    }
}
