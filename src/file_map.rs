use crate::{error::ManifestError, Algorithm, ErrorMap, FileRecord, FileType};
use std::collections::BTreeMap;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Most errors collected while validating checksums before giving up
///
/// Validation keeps going after the first failure so depositors see more than one problem
/// per run, but a bag with thousands of bad files does not need thousands of messages.
pub const MAX_ERRORS: usize = 30;

/// Paths of one kind of file in a bag, each with its [`FileRecord`]
///
/// Paths are kept sorted, which makes manifests and error reports deterministic.
#[derive(Clone, Debug, PartialEq)]
pub struct FileMap {
    file_type: FileType,
    /// Records keyed by path in bag
    pub files: BTreeMap<String, FileRecord>,
}

impl FileMap {
    /// Empty map for files of this type
    pub fn new(file_type: FileType) -> Self {
        Self {
            file_type,
            files: BTreeMap::new(),
        }
    }

    /// Kind of file held in this map
    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    /// Record for `path`, created if missing. A known size replaces an unknown one.
    pub fn add_or_update(&mut self, path: impl Into<String>, size: Option<u64>) -> &mut FileRecord {
        let record = self.files.entry(path.into()).or_default();
        if size.is_some() {
            record.size = size;
        }
        record
    }

    /// Number of files
    pub fn file_count(&self) -> u64 {
        self.files.len() as u64
    }

    /// Sum of every known size
    pub fn total_bytes(&self) -> u64 {
        self.files.values().filter_map(|record| record.size).sum()
    }

    /// Payload-Oxum: `<total bytes>.<file count>`
    pub fn oxum(&self) -> String {
        format!("{}.{}", self.total_bytes(), self.file_count())
    }

    /// Validate every record, stopping once [`MAX_ERRORS`] errors are collected
    pub fn validate_checksums(&self, algorithms: &[Algorithm]) -> ErrorMap {
        self.validate_checksums_with(algorithms, MAX_ERRORS, |_| {})
    }

    /// Validate every record, stopping after `max_errors` errors
    ///
    /// `on_file` is called with each path before it is checked, which is how progress gets reported.
    pub fn validate_checksums_with(
        &self,
        algorithms: &[Algorithm],
        max_errors: usize,
        mut on_file: impl FnMut(&str),
    ) -> ErrorMap {
        let mut errors = ErrorMap::new();
        if max_errors == 0 {
            return errors;
        }

        for (path, record) in &self.files {
            on_file(path);
            if let Err(e) = record.validate(self.file_type, algorithms) {
                errors.insert(path.clone(), e.to_string());
                if errors.len() >= max_errors {
                    break;
                }
            }
        }

        errors
    }

    /// Write a manifest for `algorithm`, one `<digest>  <path>` line per file, sorted by path
    ///
    /// `file_type` selects which digest to write: [`FileType::Payload`] when writing a payload
    /// manifest, [`FileType::Tag`] when writing a tag manifest. `trim_from_path` is removed from
    /// the front of every path, so a tarred bag's `bag_name/data/file.txt` becomes `data/file.txt`.
    pub async fn write_manifest<W: AsyncWrite + Unpin>(
        &self,
        writer: &mut W,
        file_type: FileType,
        algorithm: &Algorithm,
        trim_from_path: &str,
    ) -> Result<(), ManifestError> {
        for (path, record) in &self.files {
            let checksum = record.get_checksum(algorithm, file_type).ok_or_else(|| {
                ManifestError::MissingDigest {
                    algorithm: algorithm.to_string(),
                    path: path.clone(),
                    file_type,
                }
            })?;
            let path = path.strip_prefix(trim_from_path).unwrap_or(path);
            let entry = format!("{}  {}\n", checksum.digest(), path);
            writer
                .write_all(entry.as_bytes())
                .await
                .map_err(|e| ManifestError::Write(e.kind()))?;
        }
        writer
            .flush()
            .await
            .map_err(|e| ManifestError::Write(e.kind()))
    }
}
