//! Data loading utilities

use crate::error::{ModellingError, Result};
use polars::prelude::*;
use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Instant;
use tracing::debug;

/// CSV loader for preprocessed training tables
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Rows scanned to infer column types
    infer_schema_length: Option<usize>,
    /// Field separator
    separator: u8,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self {
            infer_schema_length: Some(1000),
            separator: b',',
        }
    }

    /// Set how many rows are scanned for schema inference (`None` scans all)
    pub fn with_infer_schema_length(mut self, n: Option<usize>) -> Self {
        self.infer_schema_length = n;
        self
    }

    /// Set the field separator
    pub fn with_separator(mut self, separator: u8) -> Self {
        self.separator = separator;
        self
    }

    /// Load a CSV file with a header row.
    ///
    /// A missing file is reported as [`ModellingError::FileNotFound`] so callers
    /// can tell it apart from malformed content.
    pub fn load_csv(&self, path: &Path) -> Result<DataFrame> {
        let start = Instant::now();
        let file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ModellingError::FileNotFound(path.to_path_buf()),
            _ => ModellingError::IoError(e),
        })?;

        let parse_opts = CsvParseOptions::default().with_separator(self.separator);

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()?;

        debug!(
            path = %path.display(),
            rows = df.height(),
            cols = df.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "loaded csv"
        );

        Ok(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv(separator: char) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".csv")
            .tempfile()
            .unwrap();
        writeln!(file, "a{0}b{0}target", separator).unwrap();
        writeln!(file, "1{0}2{0}3.5", separator).unwrap();
        writeln!(file, "4{0}5{0}6.5", separator).unwrap();
        writeln!(file, "7{0}8{0}9.5", separator).unwrap();
        file
    }

    #[test]
    fn test_load_csv() {
        let file = create_test_csv(',');
        let df = DataLoader::new().load_csv(file.path()).unwrap();

        assert_eq!(df.height(), 3);
        assert_eq!(df.width(), 3);
        assert!(df.column("target").is_ok());
    }

    #[test]
    fn test_load_csv_custom_separator() {
        let file = create_test_csv(';');
        let df = DataLoader::new()
            .with_separator(b';')
            .with_infer_schema_length(None)
            .load_csv(file.path())
            .unwrap();

        assert_eq!(df.width(), 3);
    }

    #[test]
    fn test_missing_file_is_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.csv");

        let err = DataLoader::new().load_csv(&path).unwrap_err();
        match err {
            ModellingError::FileNotFound(p) => assert_eq!(p, path),
            other => panic!("expected FileNotFound, got {other:?}"),
        }
    }
}
