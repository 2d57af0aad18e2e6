//! Parquet payload storage

use std::fs::{self, File};

use polars::prelude::{DataFrame, ParquetReader, ParquetWriter, SerReader};

use super::{CacheDir, CacheError, CacheKey};

/// Reads and writes `<root>/<key>.parquet`
#[derive(Debug, Clone)]
pub struct TableStore {
    dir: CacheDir,
}

impl TableStore {
    pub fn new(dir: CacheDir) -> Self {
        Self { dir }
    }

    /// Writes a table for a key, replacing any previous payload
    pub fn write(&self, key: &CacheKey, table: &DataFrame) -> Result<(), CacheError> {
        fs::create_dir_all(self.dir.root())?;

        let mut file = File::create(self.dir.payload_path(key))?;
        // The writer needs `&mut` to rechunk; cloning only bumps column refcounts
        let mut table = table.clone();
        ParquetWriter::new(&mut file).finish(&mut table)?;
        Ok(())
    }

    /// Reads the table for a key
    ///
    /// A missing or unreadable file is an error; callers decide whether that
    /// means "fetch again".
    pub fn read(&self, key: &CacheKey) -> Result<DataFrame, CacheError> {
        let file = File::open(self.dir.payload_path(key))?;
        Ok(ParquetReader::new(file).finish()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{derive_key, QueryParams};
    use polars::df;
    use tempfile::TempDir;

    fn create_test_store() -> (TableStore, CacheDir, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dir = CacheDir::with_root(temp_dir.path().join("cache"));
        (TableStore::new(dir.clone()), dir, temp_dir)
    }

    fn test_key() -> CacheKey {
        derive_key("income", &QueryParams::new().with("ts_code", "600000.SH"))
    }

    #[test]
    fn test_write_then_read_preserves_columns_and_types() {
        let (store, dir, _temp_dir) = create_test_store();
        let table = df!(
            "ts_code" => ["600000.SH", "600000.SH", "600000.SH"],
            "end_date" => ["20231231", "20230930", "20230630"],
            "revenue" => [Some(1.5e10), None, Some(7.2e9)],
            "report_type" => [1i64, 1, 1],
        )
        .expect("valid frame");

        store.write(&test_key(), &table).expect("Write should succeed");
        assert!(dir.payload_path(&test_key()).exists());

        let read = store.read(&test_key()).expect("Read should succeed");
        assert!(read.equals_missing(&table));
        assert_eq!(read.schema(), table.schema());
    }

    #[test]
    fn test_read_missing_is_error() {
        let (store, _dir, _temp_dir) = create_test_store();
        assert!(matches!(store.read(&test_key()), Err(CacheError::Io(_))));
    }

    #[test]
    fn test_read_garbage_is_error() {
        let (store, dir, _temp_dir) = create_test_store();
        fs::create_dir_all(dir.root()).expect("mkdir");
        fs::write(dir.payload_path(&test_key()), b"definitely not parquet").expect("write");

        assert!(store.read(&test_key()).is_err());
    }
}
