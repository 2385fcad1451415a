pub use compute::ChecksumComputeError;
pub(crate) use compute::{digest_reader, HashingReader};
use crate::Algorithm;
use std::fmt::Display;

/// Role a file plays inside a bag
///
/// Also used as the source of a [`Checksum`]: a digest computed while reading a payload
/// file has source [`FileType::Payload`], a digest read from `manifest-sha256.txt` has
/// source [`FileType::Manifest`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FileType {
    /// Anything under `data/`
    Payload,
    /// `manifest-<alg>.txt`
    Manifest,
    /// Every other file at the top of the bag, such as `bag-info.txt`
    Tag,
    /// `tagmanifest-<alg>.txt`
    TagManifest,
}

impl FileType {
    /// Display name, matching what users see in error messages
    pub fn name(&self) -> &'static str {
        match self {
            FileType::Payload => "payload file",
            FileType::Manifest => "manifest",
            FileType::Tag => "tag file",
            FileType::TagManifest => "tag manifest",
        }
    }
}

impl Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One digest of one file, and where that digest came from
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Checksum {
    source: FileType,
    algorithm: Algorithm,
    digest: String,
}

impl Checksum {
    /// Record a digest. Hex digests are compared case-insensitively, so they are stored lowercase.
    pub fn new(source: FileType, algorithm: Algorithm, digest: impl AsRef<str>) -> Self {
        Self {
            source,
            algorithm,
            digest: digest.as_ref().trim().to_ascii_lowercase(),
        }
    }

    /// Where this digest came from
    pub fn source(&self) -> FileType {
        self.source
    }

    /// Algorithm used
    pub fn algorithm(&self) -> &Algorithm {
        &self.algorithm
    }

    /// Hex digest
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Human readable origin of the digest: `manifest-sha256.txt`, `payload file`...
    pub fn source_name(&self) -> String {
        match self.source {
            FileType::Manifest => crate::manifest::manifest_name(&self.algorithm),
            FileType::TagManifest => crate::manifest::tag_manifest_name(&self.algorithm),
            other => other.name().to_string(),
        }
    }
}

mod compute {
    use crate::{algorithm::DigestMap, Algorithm};
    use digest::DynDigest;
    use std::{
        io,
        pin::Pin,
        task::{ready, Context, Poll},
    };
    use tokio::io::{AsyncRead, ReadBuf};

    #[derive(thiserror::Error, Debug, PartialEq)]
    /// Possible errors when computing digests
    pub enum ChecksumComputeError {
        /// No hasher available for this algorithm
        #[error("Digest algorithm `{0}` is not supported")]
        UnsupportedAlgorithm(String),
        /// Failed to read the stream, every digest of that stream was discarded
        #[error("Failed to read data: {0}")]
        Read(io::ErrorKind),
    }

    /// One hasher per algorithm, all fed with the same bytes
    pub(crate) struct MultiHasher {
        hashers: Vec<(Algorithm, Box<dyn DynDigest + Send>)>,
    }

    impl MultiHasher {
        pub fn new(algorithms: &[Algorithm]) -> Result<Self, ChecksumComputeError> {
            let mut hashers = Vec::with_capacity(algorithms.len());
            for algorithm in algorithms {
                // Same algorithm listed twice would be hashed twice for nothing
                if hashers.iter().any(|(known, _)| known == algorithm) {
                    continue;
                }
                let hasher = algorithm.hasher().ok_or_else(|| {
                    ChecksumComputeError::UnsupportedAlgorithm(algorithm.to_string())
                })?;
                hashers.push((algorithm.clone(), hasher));
            }
            Ok(Self { hashers })
        }

        fn update(&mut self, bytes: &[u8]) {
            for (_, hasher) in self.hashers.iter_mut() {
                hasher.update(bytes);
            }
        }

        fn finalize(self) -> DigestMap {
            self.hashers
                .into_iter()
                .map(|(algorithm, hasher)| (algorithm, hex::encode(hasher.finalize())))
                .collect()
        }
    }

    /// Reader adapter computing every digest while the wrapped reader is consumed
    ///
    /// Consumers get the bytes untouched, and the source is read only once no matter how many
    /// algorithms are requested.
    pub(crate) struct HashingReader<R> {
        inner: R,
        hasher: MultiHasher,
        bytes_read: u64,
    }

    impl<R: AsyncRead + Unpin> HashingReader<R> {
        pub fn new(inner: R, algorithms: &[Algorithm]) -> Result<Self, ChecksumComputeError> {
            Ok(Self {
                inner,
                hasher: MultiHasher::new(algorithms)?,
                bytes_read: 0,
            })
        }

        pub fn bytes_read(&self) -> u64 {
            self.bytes_read
        }

        pub fn finalize(self) -> DigestMap {
            self.hasher.finalize()
        }
    }

    impl<R: AsyncRead + Unpin> AsyncRead for HashingReader<R> {
        fn poll_read(
            self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            let this = self.get_mut();
            let already_filled = buf.filled().len();
            ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
            let new_bytes = &buf.filled()[already_filled..];
            this.hasher.update(new_bytes);
            this.bytes_read += new_bytes.len() as u64;
            Poll::Ready(Ok(()))
        }
    }

    /// Read `reader` to the end and return one digest per algorithm
    pub(crate) async fn digest_reader<R: AsyncRead + Unpin>(
        reader: R,
        algorithms: &[Algorithm],
    ) -> Result<DigestMap, ChecksumComputeError> {
        let mut hashing = HashingReader::new(reader, algorithms)?;
        tokio::io::copy(&mut hashing, &mut tokio::io::sink())
            .await
            .map_err(|e| ChecksumComputeError::Read(e.kind()))?;
        Ok(hashing.finalize())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use digest::Digest;

    #[test]
    fn source_names() {
        for (source, algorithm, expected) in [
            (FileType::Payload, Algorithm::Md5, "payload file"),
            (FileType::Tag, Algorithm::Md5, "tag file"),
            (FileType::Manifest, Algorithm::Md5, "manifest-md5.txt"),
            (FileType::Manifest, Algorithm::Sha1, "manifest-sha1.txt"),
            (FileType::Manifest, Algorithm::Sha512, "manifest-sha512.txt"),
            (FileType::TagManifest, Algorithm::Sha256, "tagmanifest-sha256.txt"),
        ] {
            let checksum = Checksum::new(source, algorithm, "1234abcd");
            assert_eq!(checksum.source_name(), expected);
        }
    }

    #[test]
    fn digests_are_normalized() {
        let checksum = Checksum::new(FileType::Manifest, Algorithm::Md5, " ABCDEF\r");
        assert_eq!(checksum.digest(), "abcdef");
    }

    #[tokio::test]
    async fn fan_out_matches_reference_digests() {
        let data = b"i love my bag, it is awesome".to_vec();
        let digests = digest_reader(data.as_slice(), &[Algorithm::Md5, Algorithm::Sha256])
            .await
            .unwrap();

        assert_eq!(digests.len(), 2);
        assert_eq!(
            digests[&Algorithm::Sha256],
            hex::encode(sha2::Sha256::digest(&data))
        );
        assert_eq!(
            digests[&Algorithm::Md5],
            hex::encode(md5::Md5::digest(&data))
        );
    }

    #[tokio::test]
    async fn unsupported_algorithm() {
        let result = digest_reader(&b"data"[..], &[Algorithm::Custom("blake3".into())]).await;
        assert_eq!(
            result,
            Err(ChecksumComputeError::UnsupportedAlgorithm("blake3".into()))
        );
    }
}
