//! Payload and tag manifests: parsing, naming and the kind of each file in a bag

use crate::{Algorithm, FileType};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

#[derive(thiserror::Error, Debug, PartialEq)]
/// Possible errors when reading or writing manifests
pub enum ManifestError {
    /// A file has no digest for the algorithm of the manifest being written
    #[error("Missing {algorithm} digest for {path} [{file_type}]")]
    MissingDigest {
        /// Algorithm of the manifest
        algorithm: String,
        /// Path in bag of the file without a digest
        path: String,
        /// Which digest was looked up
        file_type: FileType,
    },
    /// Line is not `<digest> <path>`
    #[error("Unable to parse line {0}")]
    MalformedLine(usize),
    /// Failed to read manifest
    #[error("Failed to read manifest: {0}")]
    Read(std::io::ErrorKind),
    /// Failed to write manifest
    #[error("Failed to write manifest: {0}")]
    Write(std::io::ErrorKind),
}

/// One line of a manifest
#[derive(Debug, PartialEq)]
pub struct ManifestEntry {
    /// Hex digest, as written in the manifest
    pub digest: String,
    /// Path relative to the bag root
    pub path: String,
}

/// Parse every `<digest>  <path>` line, skipping blank lines
pub async fn parse_manifest<R: AsyncBufRead + Unpin>(reader: R) -> Result<Vec<ManifestEntry>, ManifestError> {
    let mut lines = reader.lines();
    let mut entries = Vec::new();
    let mut line_number = 0;

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| ManifestError::Read(e.kind()))?
    {
        line_number += 1;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        let (digest, path) = line
            .split_once(char::is_whitespace)
            .map(|(digest, path)| (digest, path.trim_start()))
            .ok_or(ManifestError::MalformedLine(line_number))?;
        if digest.is_empty() || path.is_empty() {
            return Err(ManifestError::MalformedLine(line_number));
        }

        entries.push(ManifestEntry {
            digest: digest.to_string(),
            path: path.to_string(),
        });
    }

    Ok(entries)
}

/// `manifest-<alg>.txt`
pub fn manifest_name(algorithm: &Algorithm) -> String {
    format!("manifest-{algorithm}.txt")
}

/// `tagmanifest-<alg>.txt`
pub fn tag_manifest_name(algorithm: &Algorithm) -> String {
    format!("tagmanifest-{algorithm}.txt")
}

/// Whether this path in bag is a payload manifest
pub fn looks_like_manifest(path: &str) -> bool {
    path.starts_with("manifest-") && path.ends_with(".txt")
}

/// Whether this path in bag is a tag manifest
pub fn looks_like_tag_manifest(path: &str) -> bool {
    path.starts_with("tagmanifest-") && path.ends_with(".txt")
}

/// Algorithm encoded in a manifest or tag manifest file name
///
/// ```
/// use async_bagger::{manifest::algorithm_from_manifest_name, Algorithm};
///
/// assert_eq!(algorithm_from_manifest_name("tagmanifest-sha256.txt"), Some(Algorithm::Sha256));
/// assert_eq!(algorithm_from_manifest_name("bag-info.txt"), None);
/// ```
pub fn algorithm_from_manifest_name(name: &str) -> Option<Algorithm> {
    let file_name = name.rsplit('/').next().unwrap_or(name);
    let algorithm = file_name
        .strip_prefix("tagmanifest-")
        .or_else(|| file_name.strip_prefix("manifest-"))?
        .strip_suffix(".txt")?;

    if algorithm.is_empty() || algorithm.contains('.') {
        return None;
    }
    Some(Algorithm::from(algorithm))
}

/// Role of a file, from its path relative to the bag root
pub fn bag_file_type(path: &str) -> FileType {
    if path.starts_with("data/") {
        FileType::Payload
    } else if looks_like_manifest(path) {
        FileType::Manifest
    } else if looks_like_tag_manifest(path) {
        FileType::TagManifest
    } else {
        FileType::Tag
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn parse() {
        let manifest = "abc123  data/file one.txt\n\n\
                        DEF456 data/nested/file.bin\r\n";
        let entries = parse_manifest(manifest.as_bytes()).await.unwrap();

        assert_eq!(
            entries,
            vec![
                ManifestEntry {
                    digest: "abc123".into(),
                    path: "data/file one.txt".into(),
                },
                ManifestEntry {
                    digest: "DEF456".into(),
                    path: "data/nested/file.bin".into(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn parse_malformed() {
        let manifest = "abc123  data/file.txt\nlonelydigest\n";
        assert_eq!(
            parse_manifest(manifest.as_bytes()).await,
            Err(ManifestError::MalformedLine(2))
        );
    }

    #[test]
    fn file_types() {
        for (input, output) in [
            ("data/manifest-md5.txt", FileType::Payload),
            ("manifest-md5.txt", FileType::Manifest),
            ("tagmanifest-sha512.txt", FileType::TagManifest),
            ("bag-info.txt", FileType::Tag),
            ("custom-tags/aptrust-info.txt", FileType::Tag),
        ] {
            assert_eq!(bag_file_type(input), output, "failing on input `{input}`");
        }
    }

    #[test]
    fn algorithms_from_names() {
        for (input, output) in [
            ("manifest-md5.txt", Some(Algorithm::Md5)),
            ("bag/tagmanifest-sha1.txt", Some(Algorithm::Sha1)),
            ("manifest-blake2b.txt", Some(Algorithm::Custom("blake2b".into()))),
            ("manifest-.txt", None),
            ("manifest-sha256.txt.bak", None),
            ("bagit.txt", None),
        ] {
            assert_eq!(
                algorithm_from_manifest_name(input),
                output,
                "failing on input `{input}`"
            );
        }
    }
}
