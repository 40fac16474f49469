//! Append-only JSON Lines storage
//!
//! One record per line, no header and no compaction; the file only grows.

use crate::listing::ListingRecord;
use crate::storage::traits::{RecordSink, StorageError, StorageResult};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// JSONL file sink
#[derive(Debug, Clone)]
pub struct JsonlStorage {
    path: PathBuf,
}

impl JsonlStorage {
    /// Creates the folder if needed and targets `folder/filename`
    ///
    /// # Returns
    ///
    /// * `Ok(JsonlStorage)` - The folder exists and is ready
    /// * `Err(StorageError::CreateDir)` - The folder could not be created
    pub fn new(folder: &Path, filename: &str) -> StorageResult<Self> {
        std::fs::create_dir_all(folder).map_err(|source| StorageError::CreateDir {
            path: folder.to_path_buf(),
            source,
        })?;

        Ok(Self {
            path: folder.join(filename),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

impl RecordSink for JsonlStorage {
    fn save(&mut self, records: &[ListingRecord]) -> StorageResult<PathBuf> {
        // Serialize first so a bad record never leaves a half-written batch
        let mut buffer = String::new();
        for record in records {
            buffer.push_str(&serde_json::to_string(record)?);
            buffer.push('\n');
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.write_error(e))?;

        let mut writer = BufWriter::new(file);
        writer
            .write_all(buffer.as_bytes())
            .and_then(|_| writer.flush())
            .map_err(|e| self.write_error(e))?;

        tracing::debug!("Appended {} records to {}", records.len(), self.path.display());

        Ok(self.path.clone())
    }
}
