//! Data engines: streaming scan, validation, and profiling of dataset files.

pub mod accumulate;
pub mod profile;
pub mod scan;
pub mod validate;

pub use accumulate::ColumnAccumulator;
pub use profile::{ColumnScan, profile_file, scan_columns};
pub use scan::TabularReader;
pub use validate::{ValidationReport, validate_file};

use crate::error::MlError;
use datadesk_core::{DatasetFile, TabularFormat};
use sha2::{Digest, Sha256};
use std::path::Path;

/// The first file (lowest position, then lowest id) in a format the engines
/// can read. `files` must already be in that order.
pub fn select_tabular_file(files: &[DatasetFile]) -> Option<(&DatasetFile, TabularFormat)> {
    files
        .iter()
        .find_map(|file| file.tabular_format().map(|format| (file, format)))
}

/// Compute SHA-256 hash of file contents.
pub fn hash_file(path: &Path) -> Result<String, MlError> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::PathBuf;

    fn file(id: i64, format: &str) -> DatasetFile {
        DatasetFile {
            id,
            dataset_id: 1,
            path: PathBuf::from(format!("f{id}.{format}")),
            format: format.into(),
            size: None,
            checksum: None,
            position: 0,
            uploaded_at: Utc::now(),
        }
    }

    #[test]
    fn test_select_skips_unrecognized_formats() {
        let files = vec![file(1, "parquet"), file(2, "tsv"), file(3, "csv")];
        let (chosen, format) = select_tabular_file(&files).unwrap();
        assert_eq!(chosen.id, 2);
        assert_eq!(format, TabularFormat::Tsv);
        assert!(select_tabular_file(&[file(4, "json")]).is_none());
    }

    #[test]
    fn test_hash_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.csv");
        std::fs::write(&path, "hello").unwrap();
        assert_eq!(
            hash_file(&path).unwrap(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }
}
