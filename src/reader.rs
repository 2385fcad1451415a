//! Reading bags written as a tar file or as a directory

mod file_system;
mod tarred;

pub use file_system::FileSystemBagReader;
pub use tarred::TarredBagReader;

use crate::{
    checksum::digest_reader,
    error::{ChecksumComputeError, ManifestError},
    manifest::{algorithm_from_manifest_name, bag_file_type, parse_manifest},
    tag::parse_tag_file,
    Algorithm, FileMap, FileType, Tag,
};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, BufReader};

#[derive(thiserror::Error, Debug, PartialEq)]
/// Possible errors when scanning a bag
pub enum ReadError {
    /// Failed to open the bag
    #[error("Failed to open bag `{path}`: {kind}")]
    Open {
        /// Bag
        path: PathBuf,
        /// Cause
        kind: std::io::ErrorKind,
    },
    /// Failed while reading the bag, including a corrupt archive
    #[error("Error reading bag `{path}`: {kind}")]
    Read {
        /// Bag
        path: PathBuf,
        /// Cause
        kind: std::io::ErrorKind,
    },
    /// Tar entry outside of the top level directory
    #[error("Tar entry `{0}` is not inside the bag's top level directory")]
    NotInBag(String),
    /// Manifest file name without an algorithm
    #[error("Cannot tell the digest algorithm of manifest {0}")]
    ManifestName(String),
    /// Unreadable manifest
    #[error("Error parsing {path}: {source}")]
    Manifest {
        /// Path in bag of the manifest
        path: String,
        /// Cause
        source: ManifestError,
    },
    /// Failed to compute checksums while scanning
    #[error("Error adding checksums for file {path}: {source}")]
    Checksum {
        /// Path in bag
        path: String,
        /// Cause
        source: ChecksumComputeError,
    },
    /// `Payload-Oxum` of `bag-info.txt` disagrees with the payload, checksums were not computed
    #[error("Payload-Oxum does not match payload")]
    OxumMismatch,
}

/// Everything learned about a bag while scanning it
#[derive(Clone, Debug, PartialEq)]
pub struct BagContents {
    /// Files under `data/`, including entries known only from payload manifests
    pub payload_files: FileMap,
    /// `manifest-<alg>.txt` files
    pub payload_manifests: FileMap,
    /// Every other file at the top of the bag, including entries known only from tag manifests
    pub tag_files: FileMap,
    /// `tagmanifest-<alg>.txt` files
    pub tag_manifests: FileMap,
    /// Tags of every parsable `.txt` tag file
    pub tags: Vec<Tag>,
    /// `.txt` tag files that are not `Label: value` lines
    pub unparsable_tag_files: Vec<String>,
    /// Name of the top level directory of a tarred bag
    pub top_level_dir: Option<String>,
}

impl Default for BagContents {
    fn default() -> Self {
        Self {
            payload_files: FileMap::new(FileType::Payload),
            payload_manifests: FileMap::new(FileType::Manifest),
            tag_files: FileMap::new(FileType::Tag),
            tag_manifests: FileMap::new(FileType::TagManifest),
            tags: vec![],
            unparsable_tag_files: vec![],
            top_level_dir: None,
        }
    }
}

impl BagContents {
    /// Nothing scanned yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Map holding files of the same type as `path_in_bag`
    pub fn map_for_path(&mut self, path_in_bag: &str) -> &mut FileMap {
        match bag_file_type(path_in_bag) {
            FileType::Payload => &mut self.payload_files,
            FileType::Manifest => &mut self.payload_manifests,
            FileType::Tag => &mut self.tag_files,
            FileType::TagManifest => &mut self.tag_manifests,
        }
    }

    /// Algorithms of the payload manifests found in the bag
    pub fn payload_manifest_algorithms(&self) -> Vec<Algorithm> {
        manifest_algorithms(&self.payload_manifests)
    }

    /// Algorithms of the tag manifests found in the bag
    pub fn tag_manifest_algorithms(&self) -> Vec<Algorithm> {
        manifest_algorithms(&self.tag_manifests)
    }

    /// Values of a tag, matching the label exactly or ignoring case
    pub fn get_tags(&self, tag_file: &str, tag_name: &str) -> Vec<&Tag> {
        self.tags
            .iter()
            .filter(|tag| tag.tag_file == tag_file && tag.tag_name.eq_ignore_ascii_case(tag_name))
            .collect()
    }

    /// First pass over one file: parse manifests and tag files, record sizes
    pub(crate) async fn scan_metadata_entry<R: AsyncRead + Unpin>(
        &mut self,
        path_in_bag: &str,
        size: u64,
        reader: R,
    ) -> Result<(), ReadError> {
        match bag_file_type(path_in_bag) {
            FileType::Manifest => {
                self.parse_manifest(path_in_bag, reader, FileType::Manifest)
                    .await?
            }
            FileType::TagManifest => {
                self.parse_manifest(path_in_bag, reader, FileType::TagManifest)
                    .await?
            }
            FileType::Tag if path_in_bag.ends_with(".txt") => {
                match parse_tag_file(BufReader::new(reader), path_in_bag).await {
                    Ok(tags) => self.tags.extend(tags),
                    Err(e) => {
                        tracing::warn!(path = path_in_bag, "unparsable tag file: {e}");
                        self.unparsable_tag_files.push(path_in_bag.to_string());
                    }
                }
            }
            _ => {}
        }
        self.map_for_path(path_in_bag)
            .add_or_update(path_in_bag, Some(size));
        Ok(())
    }

    /// Payload manifest entries go to the payload files, tag manifest entries to the tag files
    async fn parse_manifest<R: AsyncRead + Unpin>(
        &mut self,
        path_in_bag: &str,
        reader: R,
        source: FileType,
    ) -> Result<(), ReadError> {
        let algorithm = algorithm_from_manifest_name(path_in_bag)
            .ok_or_else(|| ReadError::ManifestName(path_in_bag.to_string()))?;
        let entries = parse_manifest(BufReader::new(reader))
            .await
            .map_err(|source| ReadError::Manifest {
                path: path_in_bag.to_string(),
                source,
            })?;

        let map = match source {
            FileType::Manifest => &mut self.payload_files,
            _ => &mut self.tag_files,
        };
        for entry in entries {
            map.add_or_update(entry.path, None)
                .add_checksum(source, algorithm.clone(), entry.digest);
        }
        Ok(())
    }

    /// Second pass over one file: compute the digests its manifests list
    ///
    /// Payload files get one digest per payload manifest, everything else one per tag manifest.
    /// Algorithms that cannot be computed are skipped.
    pub(crate) async fn scan_payload_entry<R: AsyncRead + Unpin>(
        &mut self,
        path_in_bag: &str,
        size: u64,
        reader: R,
    ) -> Result<(), ReadError> {
        let (algorithms, source) = match bag_file_type(path_in_bag) {
            FileType::Payload => (self.payload_manifest_algorithms(), FileType::Payload),
            // Manifests count as tag files, tag manifests can list them
            _ => (self.tag_manifest_algorithms(), FileType::Tag),
        };
        let algorithms: Vec<_> = algorithms
            .into_iter()
            .filter(|algorithm| algorithm.hasher().is_some())
            .collect();

        let digests = if algorithms.is_empty() {
            Default::default()
        } else {
            digest_reader(reader, &algorithms)
                .await
                .map_err(|source| ReadError::Checksum {
                    path: path_in_bag.to_string(),
                    source,
                })?
        };

        let record = self
            .map_for_path(path_in_bag)
            .add_or_update(path_in_bag, Some(size));
        for (algorithm, digest) in digests {
            record.add_checksum(source, algorithm, digest);
        }
        Ok(())
    }

    /// Copy what is known about each payload manifest to its entry in the tag files
    ///
    /// Tag manifests list payload manifests. Their entries land in the tag files, while the
    /// digests computed from the manifests themselves land in the payload manifests. Both must
    /// meet in the same record for the tag file checksums to be validated.
    pub(crate) fn merge_payload_manifest_checksums(&mut self) {
        for (name, manifest) in &self.payload_manifests.files {
            if let Some(tag_record) = self.tag_files.files.get_mut(name) {
                tag_record.size = manifest.size;
                tag_record.extend_checksums(manifest);
            }
        }
    }
}

fn manifest_algorithms(map: &FileMap) -> Vec<Algorithm> {
    map.files
        .keys()
        .filter_map(|name| algorithm_from_manifest_name(name))
        .collect()
}

/// Scans an existing bag, in two passes
///
/// [`BagReader::scan_metadata`] parses manifests and tag files and records every file with its
/// size. [`BagReader::scan_payload`] then computes the digests the manifests call for.
#[allow(async_fn_in_trait)]
pub trait BagReader {
    /// First pass
    async fn scan_metadata(&mut self, contents: &mut BagContents) -> Result<(), ReadError>;

    /// Second pass, ending with the merge of payload manifest checksums into the tag files
    async fn scan_payload(&mut self, contents: &mut BagContents) -> Result<(), ReadError>;
}

/// Available [`BagReader`]s
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BagReaderType {
    /// Plain directory
    FileSystem,
    /// Single tar file
    Tar,
}

/// A [`BagReader`] of any [`BagReaderType`]
pub enum BagReaderKind {
    /// See [`FileSystemBagReader`]
    FileSystem(FileSystemBagReader),
    /// See [`TarredBagReader`]
    Tar(TarredBagReader),
}

impl BagReaderKind {
    /// Type of this reader
    pub fn reader_type(&self) -> BagReaderType {
        match self {
            BagReaderKind::FileSystem(_) => BagReaderType::FileSystem,
            BagReaderKind::Tar(_) => BagReaderType::Tar,
        }
    }
}

/// Reader matching the physical form of the bag: directory or tar file
pub async fn open_reader(path_to_bag: impl AsRef<Path>) -> Result<BagReaderKind, ReadError> {
    let path = path_to_bag.as_ref();
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| ReadError::Open {
            path: path.to_path_buf(),
            kind: e.kind(),
        })?;

    Ok(if metadata.is_dir() {
        BagReaderKind::FileSystem(FileSystemBagReader::new(path))
    } else {
        BagReaderKind::Tar(TarredBagReader::new(path))
    })
}

impl BagReader for BagReaderKind {
    async fn scan_metadata(&mut self, contents: &mut BagContents) -> Result<(), ReadError> {
        match self {
            BagReaderKind::FileSystem(reader) => reader.scan_metadata(contents).await,
            BagReaderKind::Tar(reader) => reader.scan_metadata(contents).await,
        }
    }

    async fn scan_payload(&mut self, contents: &mut BagContents) -> Result<(), ReadError> {
        match self {
            BagReaderKind::FileSystem(reader) => reader.scan_payload(contents).await,
            BagReaderKind::Tar(reader) => reader.scan_payload(contents).await,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use digest::Digest;

    fn sha256(data: &[u8]) -> String {
        hex::encode(sha2::Sha256::digest(data))
    }

    /// `(path in bag, contents)` of a small valid bag
    pub(crate) fn sample_bag() -> Vec<(String, Vec<u8>)> {
        let photo = b"photo bytes".to_vec();
        let manifest = format!("{}  data/photo.jpg\n", sha256(&photo));
        let bagit = "BagIt-Version: 1.0\nTag-File-Character-Encoding: UTF-8\n";
        let bag_info = "Payload-Oxum: 11.1\nSource-Organization: Test\n";
        let tag_manifest = format!(
            "{}  bag-info.txt\n{}  bagit.txt\n{}  manifest-sha256.txt\n",
            sha256(bag_info.as_bytes()),
            sha256(bagit.as_bytes()),
            sha256(manifest.as_bytes()),
        );
        vec![
            ("bag-info.txt".into(), bag_info.into()),
            ("bagit.txt".into(), bagit.into()),
            ("data/photo.jpg".into(), photo),
            ("manifest-sha256.txt".into(), manifest.into_bytes()),
            ("tagmanifest-sha256.txt".into(), tag_manifest.into_bytes()),
        ]
    }

    async fn scan(files: &[(String, Vec<u8>)]) -> BagContents {
        let mut contents = BagContents::new();
        for (path, data) in files {
            contents
                .scan_metadata_entry(path, data.len() as u64, data.as_slice())
                .await
                .unwrap();
        }
        for (path, data) in files {
            contents
                .scan_payload_entry(path, data.len() as u64, data.as_slice())
                .await
                .unwrap();
        }
        contents.merge_payload_manifest_checksums();
        contents
    }

    #[tokio::test]
    async fn scan_valid_bag() {
        let contents = scan(&sample_bag()).await;

        assert_eq!(contents.payload_files.oxum(), "11.1");
        assert_eq!(contents.payload_manifest_algorithms(), vec![Algorithm::Sha256]);
        assert_eq!(contents.tag_manifest_algorithms(), vec![Algorithm::Sha256]);
        assert_eq!(
            contents.get_tags("bag-info.txt", "payload-oxum")[0].value,
            "11.1"
        );
        assert!(contents.unparsable_tag_files.is_empty());

        assert!(contents
            .payload_files
            .validate_checksums(&[Algorithm::Sha256])
            .is_empty());
        assert!(contents
            .tag_files
            .validate_checksums(&[Algorithm::Sha256])
            .is_empty());

        // Payload manifest checksums were merged into its tag file record
        let record = &contents.tag_files.files["manifest-sha256.txt"];
        assert!(record.size.is_some());
        assert!(record
            .get_checksum(&Algorithm::Sha256, FileType::Tag)
            .is_some());
        assert!(record
            .get_checksum(&Algorithm::Sha256, FileType::TagManifest)
            .is_some());
    }

    #[tokio::test]
    async fn scan_damaged_bag() {
        let mut files = sample_bag();
        files[2].1 = b"photo bytez".to_vec();
        files.push(("custom-tags.txt".into(), b"not a tag line\n".to_vec()));
        let contents = scan(&files).await;

        let errors = contents
            .payload_files
            .validate_checksums(&[Algorithm::Sha256]);
        assert_eq!(errors.keys().collect::<Vec<_>>(), vec!["data/photo.jpg"]);
        assert_eq!(contents.unparsable_tag_files, vec!["custom-tags.txt"]);
    }

    #[tokio::test]
    async fn unknown_algorithms_are_not_computed() {
        let files = vec![
            ("data/a.txt".to_string(), b"a".to_vec()),
            ("manifest-blake2b.txt".to_string(), b"abcd  data/a.txt\n".to_vec()),
        ];
        let contents = scan(&files).await;
        assert_eq!(
            contents.payload_manifest_algorithms(),
            vec![Algorithm::Custom("blake2b".into())]
        );
        let record = &contents.payload_files.files["data/a.txt"];
        assert_eq!(record.size, Some(1));
        assert_eq!(record.checksums().len(), 1);
    }

    #[tokio::test]
    async fn malformed_manifest() {
        let mut contents = BagContents::new();
        let result = contents
            .scan_metadata_entry("manifest-md5.txt", 6, &b"nopath"[..])
            .await;
        assert_eq!(
            result,
            Err(ReadError::Manifest {
                path: "manifest-md5.txt".into(),
                source: ManifestError::MalformedLine(1),
            })
        );
    }
}
