//! Flat-directory CSV + PNG output store.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use bloom_watch_series_models::{MergedRecord, RegionYearDataset};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{OutputStore, StoreError, paths, plot};

/// Column order of the merged table.
pub const COLUMNS: [&str; 6] = [
    "date",
    "temperature",
    "vegetation_index",
    "daily_degree_days",
    "cumulative_degree_days",
    "is_peak",
];

/// One row of the merged table. `is_peak` is stored as `0`/`1`.
#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    date: NaiveDate,
    temperature: f64,
    vegetation_index: f64,
    daily_degree_days: f64,
    cumulative_degree_days: f64,
    is_peak: u8,
}

impl From<&MergedRecord> for CsvRow {
    fn from(r: &MergedRecord) -> Self {
        Self {
            date: r.date,
            temperature: r.temperature,
            vegetation_index: r.vegetation_index,
            daily_degree_days: r.daily_degree_days,
            cumulative_degree_days: r.cumulative_degree_days,
            is_peak: u8::from(r.is_peak),
        }
    }
}

/// Output store rooted at a directory.
#[derive(Debug, Clone)]
pub struct CsvOutputStore {
    dir: PathBuf,
}

impl CsvOutputStore {
    /// Creates a store writing into `dir`. The directory is created on
    /// first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory of the store.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write_csv(&self, dataset: &RegionYearDataset, path: &Path) -> Result<(), StoreError> {
        let csv_err = |source| StoreError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
        for record in &dataset.records {
            writer.serialize(CsvRow::from(record)).map_err(csv_err)?;
        }
        if dataset.records.is_empty() {
            writer.write_record(COLUMNS).map_err(csv_err)?;
        }
        writer.flush().map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl OutputStore for CsvOutputStore {
    fn exists(&self, region: &str, year: i32) -> bool {
        paths::csv_path(&self.dir, region, year).is_file()
    }

    fn write(&self, dataset: &RegionYearDataset) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let plot_path = paths::plot_path(&self.dir, &dataset.region, dataset.year);
        write_atomically(&plot_path, |tmp| plot::render(dataset, tmp))?;

        let csv_path = paths::csv_path(&self.dir, &dataset.region, dataset.year);
        write_atomically(&csv_path, |tmp| self.write_csv(dataset, tmp))?;

        log::info!(
            "Saved {} ({} rows) and {}",
            csv_path.display(),
            dataset.records.len(),
            plot_path.display()
        );
        Ok(())
    }

    fn read(&self, region: &str, year: i32) -> Result<Option<RegionYearDataset>, StoreError> {
        let path = paths::csv_path(&self.dir, region, year);
        if !path.is_file() {
            return Ok(None);
        }
        let records = read_table(&path)?;
        Ok(Some(RegionYearDataset {
            region: region.to_string(),
            year,
            records,
        }))
    }

    fn list_regions(&self) -> Result<Vec<String>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.dir.clone(),
                    source,
                });
            }
        };

        let mut regions = BTreeSet::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: self.dir.clone(),
                source,
            })?;
            if let Some((region, _year)) = entry
                .file_name()
                .to_str()
                .and_then(paths::parse_csv_file_name)
            {
                regions.insert(region);
            }
        }
        Ok(regions.into_iter().collect())
    }
}

/// Reads and validates a merged table.
fn read_table(path: &Path) -> Result<Vec<MergedRecord>, StoreError> {
    let csv_err = |source| StoreError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;

    let headers = reader.headers().map_err(csv_err)?.clone();
    let missing: Vec<String> = COLUMNS
        .iter()
        .filter(|c| !headers.iter().any(|h| h == **c))
        .map(|c| (*c).to_string())
        .collect();
    if !missing.is_empty() {
        return Err(StoreError::Schema {
            path: path.to_path_buf(),
            missing,
        });
    }

    let mut records = Vec::new();
    for (i, row) in reader.deserialize::<CsvRow>().enumerate() {
        let row = row.map_err(csv_err)?;
        let is_peak = match row.is_peak {
            0 => false,
            1 => true,
            other => {
                return Err(StoreError::InvalidValue {
                    path: path.to_path_buf(),
                    row: i + 1,
                    message: format!("is_peak must be 0 or 1, got {other}"),
                });
            }
        };
        if let Some(previous) = records.last().map(|r: &MergedRecord| r.date)
            && row.date <= previous
        {
            return Err(StoreError::InvalidValue {
                path: path.to_path_buf(),
                row: i + 1,
                message: format!("date {} does not follow {previous}", row.date),
            });
        }
        records.push(MergedRecord {
            date: row.date,
            temperature: row.temperature,
            vegetation_index: row.vegetation_index,
            daily_degree_days: row.daily_degree_days,
            cumulative_degree_days: row.cumulative_degree_days,
            is_peak,
        });
    }
    Ok(records)
}

/// Runs `write` against the temp sibling of `dest`, then renames it into
/// place. A failed write removes whatever it left at the temp path.
fn write_atomically(
    dest: &Path,
    write: impl FnOnce(&Path) -> Result<(), StoreError>,
) -> Result<(), StoreError> {
    let tmp = paths::temp_path(dest);
    if let Err(e) = write(&tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    rename(&tmp, dest)
}

fn rename(from: &Path, to: &Path) -> Result<(), StoreError> {
    fs::rename(from, to).map_err(|source| StoreError::Io {
        path: to.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn dataset() -> RegionYearDataset {
        let start = NaiveDate::from_ymd_opt(2023, 3, 1).unwrap();
        let values = [0.21, 0.4533333333333333, 0.71, 0.5, 0.3];
        let mut cumulative = 0.0;
        let records = start
            .iter_days()
            .zip(values)
            .enumerate()
            .map(|(i, (date, v))| {
                let temperature = 4.0 + 1.7 * f64::from(u32::try_from(i).unwrap());
                let daily = (temperature - 5.0f64).max(0.0);
                cumulative += daily;
                MergedRecord {
                    date,
                    temperature,
                    vegetation_index: v,
                    daily_degree_days: daily,
                    cumulative_degree_days: cumulative,
                    is_peak: i == 2,
                }
            })
            .collect();
        RegionYearDataset {
            region: "Japan_Tokyo".to_string(),
            year: 2023,
            records,
        }
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = scratch("bloom_watch_store_round_trip");
        let store = CsvOutputStore::new(&dir);
        let original = dataset();

        assert!(!store.exists("Japan_Tokyo", 2023));
        store.write(&original).unwrap();
        assert!(store.exists("Japan_Tokyo", 2023));
        assert!(paths::plot_path(&dir, "Japan_Tokyo", 2023).is_file());

        let loaded = store.read("Japan_Tokyo", 2023).unwrap().unwrap();
        assert_eq!(loaded.records.len(), original.records.len());
        for (a, b) in loaded.records.iter().zip(&original.records) {
            assert_eq!(a.date, b.date);
            assert_eq!(a.is_peak, b.is_peak);
            assert!((a.temperature - b.temperature).abs() < 1e-9);
            assert!((a.vegetation_index - b.vegetation_index).abs() < 1e-9);
            assert!((a.daily_degree_days - b.daily_degree_days).abs() < 1e-9);
            assert!((a.cumulative_degree_days - b.cumulative_degree_days).abs() < 1e-9);
        }

        let leftovers: Vec<_> = fs::read_dir(&dir)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn failed_render_leaves_no_temp_image() {
        let dir = scratch("bloom_watch_store_failed_render");
        fs::create_dir_all(&dir).unwrap();
        let plot_path = paths::plot_path(&dir, "Japan_Tokyo", 2023);

        let result = write_atomically(&plot_path, |tmp| {
            fs::write(tmp, b"partial image").unwrap();
            Err(StoreError::Plot {
                path: tmp.to_path_buf(),
                message: "encoder failed".to_string(),
            })
        });

        assert!(matches!(result, Err(StoreError::Plot { .. })));
        assert!(!paths::temp_path(&plot_path).exists());
        assert!(!plot_path.exists());
    }

    #[test]
    fn header_is_in_column_order() {
        let dir = scratch("bloom_watch_store_header");
        let store = CsvOutputStore::new(&dir);
        store.write(&dataset()).unwrap();

        let text = fs::read_to_string(paths::csv_path(&dir, "Japan_Tokyo", 2023)).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(header, COLUMNS.join(","));
        assert!(text.lines().nth(3).unwrap().ends_with(",1"));
    }

    #[test]
    fn missing_dataset_reads_as_none() {
        let store = CsvOutputStore::new(scratch("bloom_watch_store_missing"));
        assert!(store.read("Japan_Tokyo", 2023).unwrap().is_none());
        assert!(store.list_regions().unwrap().is_empty());
    }

    #[test]
    fn rejects_missing_columns() {
        let dir = scratch("bloom_watch_store_schema");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            paths::csv_path(&dir, "Japan_Tokyo", 2023),
            "date,temperature,vegetation_index\n2023-03-01,4.0,0.2\n",
        )
        .unwrap();

        let store = CsvOutputStore::new(&dir);
        match store.read("Japan_Tokyo", 2023) {
            Err(StoreError::Schema { missing, .. }) => {
                assert_eq!(
                    missing,
                    vec!["daily_degree_days", "cumulative_degree_days", "is_peak"]
                );
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_peak_flag() {
        let dir = scratch("bloom_watch_store_flag");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            paths::csv_path(&dir, "Japan_Tokyo", 2023),
            "date,temperature,vegetation_index,daily_degree_days,cumulative_degree_days,is_peak\n\
             2023-03-01,6.0,0.2,1.0,1.0,2\n",
        )
        .unwrap();

        let store = CsvOutputStore::new(&dir);
        assert!(matches!(
            store.read("Japan_Tokyo", 2023),
            Err(StoreError::InvalidValue { row: 1, .. })
        ));
    }

    #[test]
    fn lists_regions_once_each() {
        let dir = scratch("bloom_watch_store_list");
        let store = CsvOutputStore::new(&dir);
        let mut a = dataset();
        store.write(&a).unwrap();
        a.year = 2024;
        store.write(&a).unwrap();
        a.region = "Spain_Madrid".to_string();
        store.write(&a).unwrap();

        assert_eq!(
            store.list_regions().unwrap(),
            vec!["Japan_Tokyo".to_string(), "Spain_Madrid".to_string()]
        );
    }
}
