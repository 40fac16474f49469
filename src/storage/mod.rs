//! Storage module for persisting collected listings
//!
//! Records are appended to a line-delimited JSON file. Where that file lives
//! depends on the environment: serverless runtimes only allow writes under
//! the temp directory, local runs write next to the working directory.

mod jsonl;
mod traits;

pub use jsonl::JsonlStorage;
pub use traits::{RecordSink, StorageError, StorageResult};

use std::path::PathBuf;

/// Folder name used under whichever base directory is picked
pub const DATA_DIR: &str = "data";

/// Environment variables whose presence marks a restricted filesystem
const RESTRICTED_ENV_MARKERS: &[&str] = &["AWS_LAMBDA_FUNCTION_NAME", "LAMBDA_TASK_ROOT"];

/// Picks the directory for the output file
///
/// A configured directory always wins. Otherwise `<temp_dir>/data` is used
/// on restricted filesystems and `./data` everywhere else.
pub fn resolve_output_dir(configured: Option<&str>) -> PathBuf {
    resolve_with_probe(configured, is_restricted_environment())
}

/// True when running where only the temp directory is writable
pub fn is_restricted_environment() -> bool {
    RESTRICTED_ENV_MARKERS
        .iter()
        .any(|var| std::env::var_os(var).is_some_and(|v| !v.is_empty()))
}

fn resolve_with_probe(configured: Option<&str>, restricted: bool) -> PathBuf {
    match configured {
        Some(dir) => PathBuf::from(dir),
        None if restricted => std::env::temp_dir().join(DATA_DIR),
        None => PathBuf::from(DATA_DIR),
    }
}
