// =============================================================================
// Parquet snapshot store — the durable tier
// =============================================================================
//
// Two files under the cache directory:
//
//   ohlc_cache.parquet       time (Int64) + open/high/low/close/volume (Float64)
//   full_data_cache.parquet  the candle columns + one nullable Float64 column
//                            per indicator; `built_at` (RFC 3339) is stored in
//                            the Arrow schema metadata
//
// Every save writes a uniquely named temp file next to the target and renames
// it over the target, so readers only ever see a complete file.  A store built without a directory
// (serverless mode) loads nothing and saves nothing.
// =============================================================================

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::arrow_writer::ArrowWriter;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::dataset::{DerivedDataset, IndicatorColumns};
use crate::error::PersistenceError;
use crate::indicators::Series;
use crate::market_data::{Candle, CandleSeries};

const OHLC_FILE: &str = "ohlc_cache.parquet";
const DATASET_FILE: &str = "full_data_cache.parquet";
const BUILT_AT_KEY: &str = "built_at";

const CANDLE_COLUMNS: [&str; 5] = ["open", "high", "low", "close", "volume"];

/// A dataset read back from disk together with its build time.
#[derive(Debug, Clone)]
pub struct StoredDataset {
    pub dataset: DerivedDataset,
    pub built_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ParquetStore {
    dir: Option<PathBuf>,
}

impl ParquetStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    /// A store with no durable tier.
    pub fn disabled() -> Self {
        Self { dir: None }
    }

    fn path(&self, file: &str) -> Option<PathBuf> {
        self.dir.as_ref().map(|d| d.join(file))
    }

    // =========================================================================
    // Candle snapshot
    // =========================================================================

    /// `Ok(None)` when disabled or when no snapshot has been written yet.
    pub fn load_series(&self) -> Result<Option<CandleSeries>, PersistenceError> {
        let Some(path) = self.path(OHLC_FILE) else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        let (_, batches) = read_batches(&path)?;
        let mut candles = Vec::new();
        for batch in &batches {
            candles.extend(candles_from_batch(batch)?);
        }
        debug!(path = %path.display(), candles = candles.len(), "candle snapshot loaded");
        Ok(Some(CandleSeries::from_candles(candles)))
    }

    pub fn save_series(&self, series: &CandleSeries) -> Result<(), PersistenceError> {
        let Some(path) = self.path(OHLC_FILE) else {
            return Ok(());
        };
        let (fields, columns) = candle_columns(series);
        let schema = Arc::new(Schema::new(fields));
        write_atomic(&path, schema, columns)?;
        info!(path = %path.display(), candles = series.len(), "candle snapshot saved");
        Ok(())
    }

    // =========================================================================
    // Full dataset
    // =========================================================================

    pub fn load_dataset(&self) -> Result<Option<StoredDataset>, PersistenceError> {
        let Some(path) = self.path(DATASET_FILE) else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        let (schema, batches) = read_batches(&path)?;

        let built_at = schema
            .metadata()
            .get(BUILT_AT_KEY)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| PersistenceError::Schema(format!("missing {BUILT_AT_KEY} metadata")))?;

        let mut candles = Vec::new();
        let mut named: HashMap<String, Series> = IndicatorColumns::NAMES
            .iter()
            .map(|name| (name.to_string(), Series::new()))
            .collect();

        for batch in &batches {
            candles.extend(candles_from_batch(batch)?);
            for name in IndicatorColumns::NAMES {
                let values = nullable_f64_column(batch, name)?;
                if let Some(series) = named.get_mut(*name) {
                    series.extend(values);
                }
            }
        }

        // Timestamps were written sorted and unique; keep the rows aligned
        // with the indicator columns rather than re-merging.
        let n = candles.len();
        let series = CandleSeries::from_candles(candles);
        if series.len() != n {
            return Err(PersistenceError::Schema(
                "duplicate timestamps in dataset file".to_string(),
            ));
        }

        let indicators = IndicatorColumns::from_columns(named, n).map_err(PersistenceError::Schema)?;
        let dataset = DerivedDataset::from_parts(series, indicators)
            .map_err(|e| PersistenceError::Schema(e.to_string()))?;

        debug!(path = %path.display(), rows = n, %built_at, "dataset snapshot loaded");
        Ok(Some(StoredDataset { dataset, built_at }))
    }

    pub fn save_dataset(
        &self,
        dataset: &DerivedDataset,
        built_at: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        let Some(path) = self.path(DATASET_FILE) else {
            return Ok(());
        };

        let (mut fields, mut columns) = candle_columns(dataset.candles());
        for (name, series) in dataset.indicators().columns() {
            fields.push(Field::new(name, DataType::Float64, true));
            columns.push(Arc::new(series.iter().copied().collect::<Float64Array>()) as ArrayRef);
        }

        let metadata = HashMap::from([(BUILT_AT_KEY.to_string(), built_at.to_rfc3339())]);
        let schema = Arc::new(Schema::new_with_metadata(fields, metadata));
        write_atomic(&path, schema, columns)?;
        info!(path = %path.display(), rows = dataset.len(), "dataset snapshot saved");
        Ok(())
    }
}

// =============================================================================
// Arrow helpers
// =============================================================================

fn candle_columns(series: &CandleSeries) -> (Vec<Field>, Vec<ArrayRef>) {
    let mut fields = vec![Field::new("time", DataType::Int64, false)];
    fields.extend(
        CANDLE_COLUMNS
            .iter()
            .map(|name| Field::new(*name, DataType::Float64, false)),
    );

    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(series.times())),
        Arc::new(Float64Array::from(series.opens())),
        Arc::new(Float64Array::from(series.highs())),
        Arc::new(Float64Array::from(series.lows())),
        Arc::new(Float64Array::from(series.closes())),
        Arc::new(Float64Array::from(series.volumes())),
    ];
    (fields, columns)
}

fn write_atomic(
    path: &Path,
    schema: Arc<Schema>,
    columns: Vec<ArrayRef>,
) -> Result<(), PersistenceError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let batch = RecordBatch::try_new(schema.clone(), columns)?;

    // One temp file per writer, in the target's directory.
    let mut tmp = NamedTempFile::new_in(dir)?;
    let mut writer = ArrowWriter::try_new(tmp.as_file_mut(), schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn read_batches(path: &Path) -> Result<(Arc<Schema>, Vec<RecordBatch>), PersistenceError> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;
    let batches = reader.collect::<Result<Vec<_>, _>>()?;
    Ok((schema, batches))
}

fn f64_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Float64Array, PersistenceError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| PersistenceError::Schema(format!("missing column {name}")))?
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| PersistenceError::Schema(format!("column {name} is not Float64")))
}

fn nullable_f64_column(batch: &RecordBatch, name: &str) -> Result<Series, PersistenceError> {
    Ok(f64_column(batch, name)?.iter().collect())
}

fn candles_from_batch(batch: &RecordBatch) -> Result<Vec<Candle>, PersistenceError> {
    let time = batch
        .column_by_name("time")
        .ok_or_else(|| PersistenceError::Schema("missing column time".to_string()))?
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| PersistenceError::Schema("column time is not Int64".to_string()))?;
    let open = f64_column(batch, "open")?;
    let high = f64_column(batch, "high")?;
    let low = f64_column(batch, "low")?;
    let close = f64_column(batch, "close")?;
    let volume = f64_column(batch, "volume")?;

    if time.null_count() > 0 {
        return Err(PersistenceError::Schema("null timestamp".to_string()));
    }

    Ok((0..batch.num_rows())
        .map(|i| Candle {
            time: time.value(i),
            open: open.value(i),
            high: high.value(i),
            low: low.value(i),
            close: close.value(i),
            volume: volume.value(i),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset;

    fn sample(n: usize) -> CandleSeries {
        CandleSeries::from_candles(
            (0..n)
                .map(|i| {
                    let c = 100.0 + (i as f64 * 0.3).sin() * 5.0;
                    Candle {
                        time: 1_700_000_000 + i as i64 * 86_400,
                        open: c - 0.5,
                        high: c + 1.0,
                        low: c - 1.0,
                        close: c,
                        volume: 10.0 + i as f64,
                    }
                })
                .collect(),
        )
    }

    #[test]
    fn series_survives_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(dir.path());
        assert!(store.load_series().unwrap().is_none());

        let series = sample(30);
        store.save_series(&series).unwrap();
        assert_eq!(store.load_series().unwrap(), Some(series));
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn concurrent_saves_all_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(dir.path());

        for round in 0..10 {
            let handles: Vec<_> = (0..4)
                .map(|writer| {
                    let store = store.clone();
                    std::thread::spawn(move || store.save_series(&sample(20 + writer)))
                })
                .collect();
            for handle in handles {
                handle.join().unwrap().unwrap_or_else(|e| panic!("round {round}: {e}"));
            }

            let loaded = store.load_series().unwrap().unwrap();
            assert!((20..24).contains(&loaded.len()));
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn dataset_keeps_undefined_positions_and_built_at() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(dir.path().join("nested"));
        let ds = dataset::build(&sample(100)).unwrap();
        let built_at = DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        store.save_dataset(&ds, built_at).unwrap();
        let loaded = store.load_dataset().unwrap().unwrap();
        assert_eq!(loaded.built_at, built_at);
        assert_eq!(loaded.dataset, ds);
        assert!(loaded.dataset.indicators().sma_200.iter().all(Option::is_none));
    }

    #[test]
    fn disabled_store_is_inert() {
        let store = ParquetStore::disabled();
        store.save_series(&sample(5)).unwrap();
        assert!(store.load_series().unwrap().is_none());
        assert!(store.load_dataset().unwrap().is_none());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ohlc_cache.parquet"), b"not parquet").unwrap();
        let store = ParquetStore::new(dir.path());
        assert!(store.load_series().is_err());
    }

    #[test]
    fn dataset_without_metadata_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(dir.path());
        let (fields, columns) = candle_columns(&sample(3));
        write_atomic(
            &dir.path().join("full_data_cache.parquet"),
            Arc::new(Schema::new(fields)),
            columns,
        )
        .unwrap();
        assert!(matches!(
            store.load_dataset(),
            Err(PersistenceError::Schema(_))
        ));
    }
}
