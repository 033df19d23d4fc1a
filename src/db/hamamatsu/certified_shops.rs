// Certified shops of Hamamatsu city, published on the city's open data
// portal as a Shift-JIS csv file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use csv::StringRecord;
use jiff::fmt::strtime;
use log::{info, warn};
use reqwest::Client;
use serde::Deserialize;

use crate::errors::{Result, SyncError};

pub const COL_TEL: &str = "電話番号";
pub const COL_TITLE: &str = "店舗名";
pub const COL_ADDRESS: &str = "住所";
pub const COL_HOMEPAGE: &str = "ホームページ";
pub const COL_CATEGORY: &str = "業種";

/// Values pandas would read as NaN.
const NA_VALUES: [&str; 7] = ["nan", "NaN", "NULL", "null", "N/A", "NA", "#N/A"];

#[derive(Debug, Deserialize)]
pub struct Metadata {
    pub result: MetadataResult,
}

#[derive(Debug, Deserialize)]
pub struct MetadataResult {
    pub resources: Vec<Resource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Resource {
    pub download_url: String,
    pub updated: String,
}

impl Resource {
    pub fn is_csv(&self) -> bool {
        let path = self.download_url.split(['?', '#']).next().unwrap_or_default();
        path.to_lowercase().ends_with(".csv")
    }
}

pub fn parse_metadata(json: &str) -> Result<Metadata> {
    Ok(serde_json::from_str(json)?)
}

/// First resource with a `.csv` download url.
pub fn select_csv_resource(resources: &[Resource]) -> Result<&Resource> {
    resources
        .iter()
        .find(|r| r.is_csv())
        .ok_or(SyncError::NoCsvResource)
}

/// Turn the `updated` field, e.g. `2023-02-01T09:30:00.123+09:00`, into
/// `2023-02-01-09-30-00`.  The wall clock time is kept as published.
pub fn update_token(updated: &str) -> Result<String> {
    let value = strip_offset_colon(updated.trim());
    let tm = strtime::parse("%Y-%m-%dT%H:%M:%S%.f%z", &value).map_err(|e| {
        SyncError::Timestamp {
            value: updated.to_string(),
            source: e,
        }
    })?;
    let dt = tm.to_datetime().map_err(|e| SyncError::Timestamp {
        value: updated.to_string(),
        source: e,
    })?;
    Ok(dt.strftime("%Y-%m-%d-%H-%M-%S").to_string())
}

/// `+09:00` -> `+0900`, trailing `Z` -> `+0000`.  Anything else is returned
/// unchanged.
fn strip_offset_colon(s: &str) -> String {
    if let Some(rest) = s.strip_suffix(['Z', 'z']) {
        return format!("{}+0000", rest);
    }
    let n = s.len();
    if n >= 6 && s.is_char_boundary(n - 6) {
        let tail = &s.as_bytes()[n - 6..];
        if matches!(tail[0], b'+' | b'-')
            && tail[1].is_ascii_digit()
            && tail[2].is_ascii_digit()
            && tail[3] == b':'
            && tail[4].is_ascii_digit()
            && tail[5].is_ascii_digit()
        {
            return format!("{}{}", &s[..n - 3], &s[n - 2..]);
        }
    }
    s.to_string()
}

pub fn decode_shift_jis(bytes: &[u8]) -> String {
    let (text, _, had_errors) = encoding_rs::SHIFT_JIS.decode(bytes);
    if had_errors {
        warn!("csv contains bytes that are not valid Shift-JIS, replaced them");
    }
    text.into_owned()
}

fn is_missing(value: &str) -> bool {
    let v = value.trim();
    v.is_empty() || NA_VALUES.contains(&v)
}

/// One row of the upstream table.  Missing cells are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceRecord {
    pub tel: Option<String>,
    pub title: Option<String>,
    pub address: Option<String>,
    pub homepage: Option<String>,
    pub category: Option<String>,
}

/// Position of each known column in the header, `None` when absent.
#[derive(Debug, Clone, Copy, Default)]
struct ColumnIndex {
    tel: Option<usize>,
    title: Option<usize>,
    address: Option<usize>,
    homepage: Option<usize>,
    category: Option<usize>,
}

impl ColumnIndex {
    fn from_headers(headers: &StringRecord) -> ColumnIndex {
        let find = |column: &str| headers.iter().position(|h| h.trim() == column);
        ColumnIndex {
            tel: find(COL_TEL),
            title: find(COL_TITLE),
            address: find(COL_ADDRESS),
            homepage: find(COL_HOMEPAGE),
            category: find(COL_CATEGORY),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourceTable {
    columns: ColumnIndex,
    records: Vec<StringRecord>,
}

impl SourceTable {
    pub fn from_csv(text: &str) -> Result<SourceTable> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());
        let columns = ColumnIndex::from_headers(rdr.headers()?);
        let records = rdr.records().collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(SourceTable { columns, records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn to_source(&self, record: &StringRecord) -> SourceRecord {
        let cell = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .filter(|v| !is_missing(v))
                .map(|v| v.to_string())
        };
        SourceRecord {
            tel: cell(self.columns.tel),
            title: cell(self.columns.title),
            address: cell(self.columns.address),
            homepage: cell(self.columns.homepage),
            category: cell(self.columns.category),
        }
    }

    /// Row `i`, or `None` past the end of the table.
    pub fn record(&self, i: usize) -> Option<SourceRecord> {
        self.records.get(i).map(|r| self.to_source(r))
    }

    /// All rows in original order.
    pub fn records(&self) -> impl Iterator<Item = SourceRecord> + '_ {
        self.records.iter().map(|r| self.to_source(r))
    }
}

/// Path of the transformed file for a given update token.
pub fn output_path(scratch_dir: &Path, token: &str) -> PathBuf {
    scratch_dir.join(format!("hamamatsu_certified_{}.csv", token))
}

/// Where the job gets the dataset from.
#[async_trait]
pub trait ShopSource {
    /// The csv resource listed in the dataset metadata.
    async fn latest_resource(&self) -> Result<Resource>;

    async fn download_table(&self, url: &str) -> Result<SourceTable>;
}

pub struct CertifiedShopsArchive {
    pub api_url: String,
    client: Client,
}

impl CertifiedShopsArchive {
    pub fn new(api_url: String) -> Result<CertifiedShopsArchive> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(CertifiedShopsArchive { api_url, client })
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(SyncError::HttpStatus {
                url: url.to_string(),
                status: resp.status(),
            });
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

#[async_trait]
impl ShopSource for CertifiedShopsArchive {
    async fn latest_resource(&self) -> Result<Resource> {
        let body = self.get_bytes(&self.api_url).await?;
        let metadata = parse_metadata(&String::from_utf8_lossy(&body))?;
        let resource = select_csv_resource(&metadata.result.resources)?;
        info!("latest csv resource {} updated {}", resource.download_url, resource.updated);
        Ok(resource.clone())
    }

    async fn download_table(&self, url: &str) -> Result<SourceTable> {
        let bytes = self.get_bytes(url).await?;
        info!("downloaded {} bytes from {}", bytes.len(), url);
        SourceTable::from_csv(&decode_shift_jis(&bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const METADATA: &str = r#"{
        "success": true,
        "result": {
            "name": "certified-shops",
            "resources": [
                {"download_url": "https://opendata.example.jp/shops.xlsx", "updated": "2023-01-01T00:00:00+09:00"},
                {"download_url": "https://opendata.example.jp/shops.CSV?v=2", "updated": "2023-02-01T09:30:15.123456+09:00", "format": "CSV"},
                {"download_url": "https://opendata.example.jp/other.csv", "updated": "2023-03-01T00:00:00+09:00"}
            ]
        }
    }"#;

    #[test]
    fn selects_first_csv_resource() -> Result<()> {
        let metadata = parse_metadata(METADATA)?;
        let resource = select_csv_resource(&metadata.result.resources)?;
        assert_eq!(resource.download_url, "https://opendata.example.jp/shops.CSV?v=2");
        Ok(())
    }

    #[test]
    fn no_csv_resource_is_an_error() {
        let resources = vec![Resource {
            download_url: "https://opendata.example.jp/shops.pdf".to_string(),
            updated: "2023-01-01T00:00:00+09:00".to_string(),
        }];
        assert!(matches!(
            select_csv_resource(&resources),
            Err(SyncError::NoCsvResource)
        ));
        assert!(matches!(select_csv_resource(&[]), Err(SyncError::NoCsvResource)));
    }

    #[test]
    fn token_from_updated() -> Result<()> {
        assert_eq!(update_token("2023-02-01T09:30:15+09:00")?, "2023-02-01-09-30-15");
        assert_eq!(update_token("2023-02-01T09:30:15.123456+09:00")?, "2023-02-01-09-30-15");
        assert_eq!(update_token("2023-02-01T09:30:15+0900")?, "2023-02-01-09-30-15");
        assert_eq!(update_token("2023-12-31T23:59:59-05:00")?, "2023-12-31-23-59-59");
        Ok(())
    }

    #[test]
    fn token_from_utc_designator() -> Result<()> {
        assert_eq!(update_token("2023-02-01T09:30:15Z")?, "2023-02-01-09-30-15");
        assert_eq!(update_token("2023-02-01T09:30:15.5Z")?, "2023-02-01-09-30-15");
        Ok(())
    }

    #[test]
    fn bad_timestamps_are_rejected() {
        assert!(matches!(update_token("yesterday"), Err(SyncError::Timestamp { .. })));
        assert!(update_token("2023-02-01T09:30:15").is_err());
        assert!(update_token("").is_err());
    }

    #[test]
    fn offset_colon() {
        assert_eq!(strip_offset_colon("2023-02-01T09:30:15+09:00"), "2023-02-01T09:30:15+0900");
        assert_eq!(strip_offset_colon("2023-02-01T09:30:15-05:30"), "2023-02-01T09:30:15-0530");
        assert_eq!(strip_offset_colon("2023-02-01T09:30:15"), "2023-02-01T09:30:15");
        assert_eq!(strip_offset_colon("+09:00"), "+0900");
        assert_eq!(strip_offset_colon("2023-02-01T09:30:15Z"), "2023-02-01T09:30:15+0000");
        assert_eq!(strip_offset_colon("喫茶"), "喫茶");
    }

    #[test]
    fn decodes_shift_jis_csv() -> Result<()> {
        let text = "店舗名,電話番号,住所,ホームページ,業種\n\
                    喫茶\u{3000}まつ,(053)111-2222,浜松市中区,https://matsu.example.jp,喫茶店\n\
                    うなぎ亭,,浜松市西区,,和食\n\
                    そば処,nan,浜松市北区\n";
        let (bytes, _, had_errors) = encoding_rs::SHIFT_JIS.encode(text);
        assert!(!had_errors);

        let table = SourceTable::from_csv(&decode_shift_jis(&bytes))?;
        assert_eq!(table.len(), 3);

        let first = table.record(0).unwrap();
        assert_eq!(first.title.as_deref(), Some("喫茶\u{3000}まつ"));
        assert_eq!(first.tel.as_deref(), Some("(053)111-2222"));
        assert_eq!(first.homepage.as_deref(), Some("https://matsu.example.jp"));
        assert_eq!(first.category.as_deref(), Some("喫茶店"));

        let second = table.record(1).unwrap();
        assert_eq!(second.tel, None);
        assert_eq!(second.homepage, None);

        // short row, NaN-like phone
        let third = table.record(2).unwrap();
        assert_eq!(third.tel, None);
        assert_eq!(third.address.as_deref(), Some("浜松市北区"));
        assert_eq!(third.category, None);

        assert_eq!(table.record(3), None);
        assert_eq!(table.records().count(), 3);
        Ok(())
    }

    #[test]
    fn missing_column_gives_missing_values() -> Result<()> {
        let table = SourceTable::from_csv("店舗名,住所\nまつ,浜松市\n")?;
        let record = table.record(0).unwrap();
        assert_eq!(record.title.as_deref(), Some("まつ"));
        assert_eq!(record.tel, None);
        assert_eq!(record.category, None);
        Ok(())
    }

    #[test]
    fn headers_are_matched_after_trimming() -> Result<()> {
        let table = SourceTable::from_csv(" 店舗名 ,業種\nまつ,喫茶\n")?;
        let record = table.record(0).unwrap();
        assert_eq!(record.title.as_deref(), Some("まつ"));
        assert_eq!(record.category.as_deref(), Some("喫茶"));
        Ok(())
    }

    #[test]
    fn output_filename() {
        assert_eq!(
            output_path(Path::new("/tmp/scratch"), "2023-02-01-00-00-00"),
            PathBuf::from("/tmp/scratch/hamamatsu_certified_2023-02-01-00-00-00.csv")
        );
    }

    #[ignore]
    #[tokio::test]
    async fn download_latest() -> Result<()> {
        let _ = env_logger::builder()
            .filter_level(log::LevelFilter::Info)
            .is_test(true)
            .try_init();
        let config = crate::config::Config::from_env();
        let archive = CertifiedShopsArchive::new(config.api_url)?;
        let resource = archive.latest_resource().await?;
        let table = archive.download_table(&resource.download_url).await?;
        assert!(!table.is_empty());
        Ok(())
    }
}
