use std::io;
use std::path::Path;

use applytrack::workflows::tracking::FileRecordStore;
use chrono::{Local, NaiveDate};

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Open the record store, refusing roots that do not exist.
pub(crate) fn open_store(root: &Path) -> io::Result<FileRecordStore> {
    if !root.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("tracker root {} is not a directory", root.display()),
        ));
    }
    Ok(FileRecordStore::open(root))
}
