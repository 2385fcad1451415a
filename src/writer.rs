//! Writing bags as a tar file or as a directory

mod file_system;
mod tarred;

pub use file_system::FileSystemBagWriter;
pub use tarred::TarredBagWriter;

use crate::{algorithm::DigestMap, error::ChecksumComputeError, Algorithm, SourceFile};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug, PartialEq)]
/// Possible errors when writing a bag
pub enum WriteError {
    /// [`BagWriter::open`] was not called
    #[error("Underlying {0} writer is nil. Has it been opened?")]
    NotOpen(&'static str),
    /// [`BagWriter::close`] was already called
    #[error("archive/tar: write after close")]
    Closed,
    /// Failed to create the bag, or a file or directory inside it
    #[error("Failed to create `{path}`: {kind}")]
    Create {
        /// What could not be created
        path: PathBuf,
        /// Cause
        kind: std::io::ErrorKind,
    },
    /// Failed to open a file to add to the bag
    #[error("Can't open source file `{path}`: {kind}")]
    OpenSource {
        /// Source file
        path: PathBuf,
        /// Cause
        kind: std::io::ErrorKind,
    },
    /// Failed while copying a file into the bag
    #[error("Error copying `{path}` into bag: {kind}")]
    Copy {
        /// Source file, or path in bag for generated contents
        path: PathBuf,
        /// Cause
        kind: std::io::ErrorKind,
    },
    /// Source file shrank between listing and copying
    #[error("Copied only {copied} of {expected} bytes for file `{path}`")]
    ShortCopy {
        /// Source file
        path: PathBuf,
        /// Bytes copied
        copied: u64,
        /// Size when the file was listed
        expected: u64,
    },
    /// See [`ChecksumComputeError`]
    #[error("Failed to compute checksum: {0}")]
    Checksum(#[from] ChecksumComputeError),
    /// Failed to finish the bag
    #[error("Error closing bag writer: {0}")]
    Close(std::io::ErrorKind),
}

/// Serialization target of a new bag
///
/// Every implementation computes the digests of each file while writing it, reading the source once.
#[allow(async_fn_in_trait)]
pub trait BagWriter {
    /// Create the bag
    async fn open(&mut self) -> Result<(), WriteError>;

    /// Copy `file` to `path_in_bag`, which starts with the bag name: `bag/data/photo.jpg`
    ///
    /// Directories get an entry but no digests. On error the digests are discarded.
    async fn add_file(&mut self, file: &SourceFile, path_in_bag: &str) -> Result<DigestMap, WriteError>;

    /// Write generated contents, such as a tag file or a manifest, to `path_in_bag`
    async fn add_contents(&mut self, contents: &[u8], path_in_bag: &str) -> Result<DigestMap, WriteError>;

    /// Algorithms computed for every file
    fn digest_algorithms(&self) -> &[Algorithm];

    /// Where the bag is written
    fn output_path(&self) -> &Path;

    /// Finish the bag. Nothing can be added afterwards.
    async fn close(&mut self) -> Result<(), WriteError>;
}

/// Available [`BagWriter`]s
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BagWriterType {
    /// Plain directory
    FileSystem,
    /// Single tar file
    #[default]
    Tar,
}

/// A [`BagWriter`] of any [`BagWriterType`]
pub enum BagWriterKind {
    /// See [`FileSystemBagWriter`]
    FileSystem(FileSystemBagWriter),
    /// See [`TarredBagWriter`]
    Tar(TarredBagWriter),
}

/// Writer of `writer_type` computing `algorithms`, not opened yet
pub fn new_writer(
    writer_type: BagWriterType,
    output_path: impl AsRef<Path>,
    algorithms: Vec<Algorithm>,
) -> BagWriterKind {
    match writer_type {
        BagWriterType::FileSystem => {
            BagWriterKind::FileSystem(FileSystemBagWriter::new(output_path, algorithms))
        }
        BagWriterType::Tar => BagWriterKind::Tar(TarredBagWriter::new(output_path, algorithms)),
    }
}

impl BagWriter for BagWriterKind {
    async fn open(&mut self) -> Result<(), WriteError> {
        match self {
            BagWriterKind::FileSystem(writer) => writer.open().await,
            BagWriterKind::Tar(writer) => writer.open().await,
        }
    }

    async fn add_file(&mut self, file: &SourceFile, path_in_bag: &str) -> Result<DigestMap, WriteError> {
        match self {
            BagWriterKind::FileSystem(writer) => writer.add_file(file, path_in_bag).await,
            BagWriterKind::Tar(writer) => writer.add_file(file, path_in_bag).await,
        }
    }

    async fn add_contents(&mut self, contents: &[u8], path_in_bag: &str) -> Result<DigestMap, WriteError> {
        match self {
            BagWriterKind::FileSystem(writer) => writer.add_contents(contents, path_in_bag).await,
            BagWriterKind::Tar(writer) => writer.add_contents(contents, path_in_bag).await,
        }
    }

    fn digest_algorithms(&self) -> &[Algorithm] {
        match self {
            BagWriterKind::FileSystem(writer) => writer.digest_algorithms(),
            BagWriterKind::Tar(writer) => writer.digest_algorithms(),
        }
    }

    fn output_path(&self) -> &Path {
        match self {
            BagWriterKind::FileSystem(writer) => writer.output_path(),
            BagWriterKind::Tar(writer) => writer.output_path(),
        }
    }

    async fn close(&mut self) -> Result<(), WriteError> {
        match self {
            BagWriterKind::FileSystem(writer) => writer.close().await,
            BagWriterKind::Tar(writer) => writer.close().await,
        }
    }
}

/// Top level directory of a bag written to `output_path`
fn root_dir_name(output_path: &Path) -> String {
    let file_name = output_path
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();
    crate::util::clean_bag_name(&file_name).to_string()
}
