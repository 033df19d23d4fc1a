use std::{fmt::Display, path::Path, str::FromStr};

use clap::ValueEnum;

use crate::errors::Result;

use super::certified_shops::{SourceRecord, SourceTable};

/// Output columns, in the order consumers expect them.  The incremental
/// layout is the same list without the trailing `star`.
pub const COLUMNS: [&str; 15] = [
    "type",
    "tel",
    "title",
    "address",
    "homepage",
    "facebook",
    "instagram",
    "twitter",
    "media1",
    "media2",
    "media3",
    "media4",
    "media5",
    "locoguide_id",
    "star",
];

/// Category substring marking a café.
pub const CAFE_MARKER: &str = "喫茶";

const FULL_WIDTH_SPACE: char = '\u{3000}';

/// The two published layouts of the output file.
///
/// `FullSnapshot` re-emits the whole table on every new version, rates every
/// shop with `star = 1` and replaces full-width spaces in the title.
/// `Incremental` only emits rows past the stored row count, has no `star`
/// column and leaves titles untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SyncMode {
    #[value(alias = "full")]
    FullSnapshot,
    Incremental,
}

impl SyncMode {
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            SyncMode::FullSnapshot => &COLUMNS[..],
            SyncMode::Incremental => &COLUMNS[..14],
        }
    }
}

impl Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_possible_value() {
            Some(v) => write!(f, "{}", v.get_name()),
            None => write!(f, "{:?}", self),
        }
    }
}

/// Same spellings as the `--mode` flag, case-insensitive.
impl FromStr for SyncMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        <SyncMode as ValueEnum>::from_str(s.trim(), true)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRow {
    pub kind: &'static str,
    pub tel: Option<String>,
    pub title: String,
    pub address: String,
    pub homepage: String,
    pub star: Option<u8>,
}

impl OutputRow {
    pub fn from_source(record: &SourceRecord, mode: SyncMode) -> OutputRow {
        let title = record.title.clone().unwrap_or_default();
        let (title, star) = match mode {
            SyncMode::FullSnapshot => (title.replace(FULL_WIDTH_SPACE, " "), Some(1)),
            SyncMode::Incremental => (title, None),
        };
        OutputRow {
            kind: classify(record.category.as_deref()),
            tel: normalize_tel(record.tel.as_deref()),
            title,
            address: record.address.clone().unwrap_or_default(),
            homepage: record.homepage.clone().unwrap_or_default(),
            star,
        }
    }

    /// Render the row with exactly `mode.columns().len()` fields.
    pub fn to_record(&self, mode: SyncMode) -> Vec<String> {
        let mut fields = vec![String::new(); mode.columns().len()];
        fields[0] = self.kind.to_string();
        fields[1] = self.tel.clone().unwrap_or_default();
        fields[2] = self.title.clone();
        fields[3] = self.address.clone();
        fields[4] = self.homepage.clone();
        if mode == SyncMode::FullSnapshot {
            fields[14] = self.star.map(|s| s.to_string()).unwrap_or_default();
        }
        fields
    }
}

/// `drink` for cafés, `food` for everything else.
pub fn classify(category: Option<&str>) -> &'static str {
    match category {
        Some(c) if c.contains(CAFE_MARKER) => "drink",
        _ => "food",
    }
}

/// Strip parentheses and hyphens.  Missing phone numbers stay missing.
pub fn normalize_tel(tel: Option<&str>) -> Option<String> {
    tel.map(|t| t.chars().filter(|c| !matches!(c, '(' | ')' | '-')).collect())
}

/// Rows to emit for this run.  In incremental mode the first
/// `already_written` rows were exported by earlier runs and are skipped.
pub fn transform(table: &SourceTable, mode: SyncMode, already_written: u64) -> Vec<OutputRow> {
    let skip = match mode {
        SyncMode::FullSnapshot => 0,
        SyncMode::Incremental => already_written as usize,
    };
    table
        .records()
        .skip(skip)
        .map(|record| OutputRow::from_source(&record, mode))
        .collect()
}

/// Write the header and the rows as a UTF-8 csv file.
pub fn write_rows(path: &Path, rows: &[OutputRow], mode: SyncMode) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(mode.columns())?;
    for row in rows {
        wtr.write_record(row.to_record(mode))?;
    }
    wtr.flush()?;
    Ok(())
}
