use crate::{Algorithm, Checksum, FileType};

#[derive(thiserror::Error, Debug, PartialEq)]
/// Ways a single file can fail checksum validation
pub enum FileRecordError {
    /// Listed in a manifest, but the file itself was never seen
    #[error("file is missing from bag")]
    FileMissingFromBag,
    /// File exists but the manifest for this algorithm does not list it
    #[error("file is missing from {manifest}")]
    MissingFromManifest {
        /// Name of the manifest, e.g. `manifest-sha256.txt`
        manifest: String,
    },
    /// Manifest and computed digests disagree
    #[error("Digest {manifest_digest} in {manifest_source} does not match digest {file_digest} in {file_source}")]
    DigestMismatch {
        /// Digest found in the manifest
        manifest_digest: String,
        /// Where the manifest digest came from
        manifest_source: String,
        /// Digest computed from the file
        file_digest: String,
        /// Where the computed digest came from
        file_source: String,
    },
}

/// Everything known about one path in a bag: its size and every digest collected for it
///
/// The size stays `None` when the path was only seen in a manifest, until the file itself
/// shows up during a scan.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FileRecord {
    /// Size in bytes, `None` until the actual file is seen
    pub size: Option<u64>,
    checksums: Vec<Checksum>,
}

impl FileRecord {
    /// Empty record with an unknown size
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a digest
    pub fn add_checksum(&mut self, source: FileType, algorithm: Algorithm, digest: impl AsRef<str>) {
        self.checksums.push(Checksum::new(source, algorithm, digest));
    }

    /// Append every digest of `other`
    pub(crate) fn extend_checksums(&mut self, other: &FileRecord) {
        self.checksums.extend(other.checksums.iter().cloned());
    }

    /// All digests, in insertion order
    pub fn checksums(&self) -> &[Checksum] {
        &self.checksums
    }

    /// First digest matching both algorithm and source
    pub fn get_checksum(&self, algorithm: &Algorithm, source: FileType) -> Option<&Checksum> {
        self.checksums
            .iter()
            .find(|checksum| checksum.algorithm() == algorithm && checksum.source() == source)
    }

    /// Distinct algorithms across all digests, in the order they were first added
    pub fn digest_algorithms(&self) -> Vec<Algorithm> {
        let mut algorithms: Vec<Algorithm> = Vec::new();
        for checksum in &self.checksums {
            if !algorithms.contains(checksum.algorithm()) {
                algorithms.push(checksum.algorithm().clone());
            }
        }
        algorithms
    }

    /// Check this file against the manifests of every algorithm in `algorithms`
    ///
    /// `file_type` is the kind of map holding the record: [`FileType::Payload`] records are
    /// compared with payload manifests, anything else with tag manifests. A tag file does not
    /// have to be listed in a tag manifest, but when it is the digests must agree.
    pub fn validate(&self, file_type: FileType, algorithms: &[Algorithm]) -> Result<(), FileRecordError> {
        let (file_source, manifest_source) = match file_type {
            FileType::Payload => (FileType::Payload, FileType::Manifest),
            _ => (FileType::Tag, FileType::TagManifest),
        };

        for algorithm in algorithms {
            let file_checksum = self
                .get_checksum(algorithm, file_source)
                .ok_or(FileRecordError::FileMissingFromBag)?;

            let Some(manifest_checksum) = self.get_checksum(algorithm, manifest_source) else {
                if manifest_source == FileType::TagManifest {
                    continue;
                }
                return Err(FileRecordError::MissingFromManifest {
                    manifest: crate::manifest::manifest_name(algorithm),
                });
            };

            if file_checksum.digest() != manifest_checksum.digest() {
                return Err(FileRecordError::DigestMismatch {
                    manifest_digest: manifest_checksum.digest().to_string(),
                    manifest_source: manifest_checksum.source_name(),
                    file_digest: file_checksum.digest().to_string(),
                    file_source: file_checksum.source_name(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{FileRecord, FileRecordError};
    use crate::{Algorithm, FileType};

    #[test]
    fn digest_algorithms_are_distinct() {
        let mut record = FileRecord::new();
        record.add_checksum(FileType::Payload, Algorithm::Md5, "aaa");
        record.add_checksum(FileType::Manifest, Algorithm::Md5, "aaa");
        record.add_checksum(FileType::Payload, Algorithm::Sha256, "bbb");

        assert_eq!(
            record.digest_algorithms(),
            vec![Algorithm::Md5, Algorithm::Sha256]
        );
        assert_eq!(
            record
                .get_checksum(&Algorithm::Sha256, FileType::Payload)
                .map(|checksum| checksum.digest()),
            Some("bbb")
        );
        assert!(record
            .get_checksum(&Algorithm::Sha256, FileType::Manifest)
            .is_none());
    }

    #[test]
    fn payload_validation() {
        let algorithms = [Algorithm::Sha256];

        let mut only_in_manifest = FileRecord::new();
        only_in_manifest.add_checksum(FileType::Manifest, Algorithm::Sha256, "abc");

        let mut not_in_manifest = FileRecord::new();
        not_in_manifest.add_checksum(FileType::Payload, Algorithm::Sha256, "abc");

        let mut mismatch = FileRecord::new();
        mismatch.add_checksum(FileType::Payload, Algorithm::Sha256, "abc");
        mismatch.add_checksum(FileType::Manifest, Algorithm::Sha256, "xyz");

        let mut good = FileRecord::new();
        good.add_checksum(FileType::Payload, Algorithm::Sha256, "abc");
        good.add_checksum(FileType::Manifest, Algorithm::Sha256, "ABC");

        for (record, output) in [
            (only_in_manifest, Err(FileRecordError::FileMissingFromBag)),
            (
                not_in_manifest,
                Err(FileRecordError::MissingFromManifest {
                    manifest: "manifest-sha256.txt".into(),
                }),
            ),
            (
                mismatch,
                Err(FileRecordError::DigestMismatch {
                    manifest_digest: "xyz".into(),
                    manifest_source: "manifest-sha256.txt".into(),
                    file_digest: "abc".into(),
                    file_source: "payload file".into(),
                }),
            ),
            (good, Ok(())),
        ] {
            assert_eq!(record.validate(FileType::Payload, &algorithms), output);
        }
    }

    #[test]
    fn mismatch_message_names_both_sides() {
        let mut record = FileRecord::new();
        record.add_checksum(FileType::Payload, Algorithm::Md5, "abc");
        record.add_checksum(FileType::Manifest, Algorithm::Md5, "xyz");

        let message = record
            .validate(FileType::Payload, &[Algorithm::Md5])
            .unwrap_err()
            .to_string();
        assert_eq!(
            message,
            "Digest xyz in manifest-md5.txt does not match digest abc in payload file"
        );
    }

    #[test]
    fn tag_files_may_skip_tag_manifest() {
        let mut unlisted = FileRecord::new();
        unlisted.add_checksum(FileType::Tag, Algorithm::Sha512, "abc");
        assert_eq!(unlisted.validate(FileType::Tag, &[Algorithm::Sha512]), Ok(()));

        let mut listed = FileRecord::new();
        listed.add_checksum(FileType::Tag, Algorithm::Sha512, "abc");
        listed.add_checksum(FileType::TagManifest, Algorithm::Sha512, "def");
        assert_eq!(
            listed.validate(FileType::Tag, &[Algorithm::Sha512]),
            Err(FileRecordError::DigestMismatch {
                manifest_digest: "def".into(),
                manifest_source: "tagmanifest-sha512.txt".into(),
                file_digest: "abc".into(),
                file_source: "tag file".into(),
            })
        );
    }
}
