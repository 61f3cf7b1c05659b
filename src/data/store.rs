//! Flat tabular stores.
//!
//! One header-labeled CSV per instrument for the OHLC series and one for the
//! derived delta series. Each store keeps an in-memory view that is reloaded
//! when the file's modification time changes, so serving a request never
//! re-parses an unchanged table.

use super::types::{DeltaBar, OhlcBar};
use crate::error::{DeltacastError, Result};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

/// Records keyed by calendar day.
pub trait Dated {
    fn date(&self) -> NaiveDate;
}

impl Dated for OhlcBar {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

impl Dated for DeltaBar {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

/// CSV-backed, date-ordered table with a cached in-memory view.
#[derive(Debug)]
pub struct TableStore<T> {
    path: PathBuf,
    cache: Option<Vec<T>>,
    cached_mtime: Option<SystemTime>,
}

pub type OhlcStore = TableStore<OhlcBar>;
pub type DeltaStore = TableStore<DeltaBar>;

impl<T> TableStore<T>
where
    T: Serialize + DeserializeOwned + Dated + Clone,
{
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            cache: None,
            cached_mtime: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current rows, reloading from disk only when the file changed.
    pub fn rows(&mut self) -> Result<&[T]> {
        let mtime = self.mtime()?;
        let stale = match (&self.cache, self.cached_mtime) {
            (Some(_), Some(cached)) => mtime != Some(cached),
            _ => true,
        };
        if stale {
            debug!(path = %self.path.display(), "reloading table");
            let rows = with_one_retry(|| self.read_all())?;
            self.cache = Some(rows);
            self.cached_mtime = mtime;
        }
        Ok(self.cache.as_deref().unwrap_or(&[]))
    }

    /// Replace the table contents, sorted ascending by date.
    pub fn write_all(&mut self, mut rows: Vec<T>) -> Result<()> {
        rows.sort_by_key(|r| r.date());
        with_one_retry(|| self.persist(&rows))?;
        self.cached_mtime = self.mtime()?;
        self.cache = Some(rows);
        Ok(())
    }

    /// Append one row. Returns `false` without touching the file when a row
    /// for that date already exists, which keeps repeated online-update
    /// cycles idempotent.
    pub fn append(&mut self, row: T) -> Result<bool> {
        let mut rows = self.rows()?.to_vec();
        if let Some(last) = rows.last() {
            if last.date() >= row.date() {
                warn!(
                    path = %self.path.display(),
                    date = %row.date(),
                    "row for this date already recorded, skipping append"
                );
                return Ok(false);
            }
        }
        rows.push(row);
        self.write_all(rows)?;
        Ok(true)
    }

    /// Drop the cached view; the next read goes back to disk.
    pub fn invalidate(&mut self) {
        self.cache = None;
        self.cached_mtime = None;
    }

    fn mtime(&self) -> Result<Option<SystemTime>> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.modified().ok()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(self.io_error(err)),
        }
    }

    fn read_all(&self) -> Result<Vec<T>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(self.io_error(err)),
        };
        let mut reader = csv::Reader::from_reader(file);
        let mut rows: Vec<T> = Vec::new();
        for record in reader.deserialize() {
            let row: T = record.map_err(|err| DeltacastError::CorruptArtifact {
                path: self.path.display().to_string(),
                reason: err.to_string(),
            })?;
            rows.push(row);
        }
        rows.sort_by_key(|r| r.date());
        Ok(rows)
    }

    fn persist(&self, rows: &[T]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
            }
        }
        let file = File::create(&self.path).map_err(|err| self.io_error(err))?;
        let mut writer = csv::Writer::from_writer(file);
        for row in rows {
            writer
                .serialize(row)
                .map_err(|err| DeltacastError::CorruptArtifact {
                    path: self.path.display().to_string(),
                    reason: err.to_string(),
                })?;
        }
        writer.flush().map_err(|err| self.io_error(err))?;
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> DeltacastError {
        DeltacastError::PersistenceFailure {
            path: self.path.display().to_string(),
            source,
        }
    }
}

/// Run `op`, retrying exactly once on a persistence failure.
fn with_one_retry<T>(mut op: impl FnMut() -> Result<T>) -> Result<T> {
    match op() {
        Err(DeltacastError::PersistenceFailure { path, source }) => {
            warn!(%path, %source, "store I/O failed, retrying once");
            op()
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn bar(day: u32, open: f64) -> OhlcBar {
        OhlcBar {
            date: NaiveDate::from_ymd_opt(2020, 1, day).unwrap(),
            open,
            high: open + 2.0,
            low: open - 2.0,
            close: open + 1.0,
        }
    }

    #[test]
    fn test_round_trip_and_order() {
        let dir = tempdir().unwrap();
        let mut store = OhlcStore::new(dir.path().join("AAPL.csv"));
        store.write_all(vec![bar(3, 103.0), bar(1, 101.0), bar(2, 102.0)]).unwrap();

        let rows = store.rows().unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.windows(2).all(|w| w[0].date < w[1].date));
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempdir().unwrap();
        let mut store = OhlcStore::new(dir.path().join("missing.csv"));
        assert!(store.rows().unwrap().is_empty());
    }

    #[test]
    fn test_append_is_idempotent_per_date() {
        let dir = tempdir().unwrap();
        let mut store = OhlcStore::new(dir.path().join("AAPL.csv"));
        assert!(store.append(bar(1, 101.0)).unwrap());
        assert!(store.append(bar(2, 102.0)).unwrap());
        assert!(!store.append(bar(2, 999.0)).unwrap());
        assert_eq!(store.rows().unwrap().len(), 2);
        assert_eq!(store.rows().unwrap()[1].open, 102.0);
    }

    #[test]
    fn test_header_contract() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("AAPL.csv");
        let mut store = OhlcStore::new(&path);
        store.write_all(vec![bar(1, 101.0)]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("date,open,high,low,close"));

        let mut delta_store = DeltaStore::new(dir.path().join("AAPL_deviated.csv"));
        delta_store
            .write_all(vec![DeltaBar {
                date: NaiveDate::from_ymd_opt(2020, 1, 2).unwrap(),
                opend: 1.0,
                highd: 5.0,
                lowd: -5.0,
                closed: 1.0,
            }])
            .unwrap();
        let text = std::fs::read_to_string(delta_store.path()).unwrap();
        assert!(text.starts_with("date,opend,highd,lowd,closed"));
    }
}
