use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid csv: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("duckdb: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("can't parse update timestamp {value:?}: {source}")]
    Timestamp {
        value: String,
        #[source]
        source: jiff::Error,
    },

    #[error("no csv resource found in dataset metadata")]
    NoCsvResource,

    #[error("object storage: {0}")]
    Storage(String),

    #[error("cursor {0:?} already exists")]
    CursorExists(String),

    #[error("cursor {0:?} not found")]
    CursorMissing(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;
