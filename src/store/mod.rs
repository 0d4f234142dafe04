pub mod ohlc_store;
pub mod parquet_store;

pub use ohlc_store::{OhlcStore, OhlcStoreConfig};
pub use parquet_store::{ParquetStore, StoredDataset};
