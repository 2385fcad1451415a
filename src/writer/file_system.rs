use super::{root_dir_name, BagWriter, WriteError};
use crate::{algorithm::DigestMap, checksum::HashingReader, Algorithm, SourceFile};
use std::path::{Path, PathBuf};
use tokio::{
    fs::{self, File},
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
};

/// Writes a bag as a plain directory at the output path
///
/// The output directory is the bag: `bag/data/photo.jpg` lands in `<output>/data/photo.jpg`.
#[derive(Debug)]
pub struct FileSystemBagWriter {
    output_path: PathBuf,
    root_dir_name: String,
    algorithms: Vec<Algorithm>,
    opened: bool,
    closed: bool,
}

impl FileSystemBagWriter {
    /// Writer for the directory at `output_path`
    pub fn new(output_path: impl AsRef<Path>, algorithms: Vec<Algorithm>) -> Self {
        Self {
            output_path: output_path.as_ref().to_path_buf(),
            root_dir_name: root_dir_name(output_path.as_ref()),
            algorithms,
            opened: false,
            closed: false,
        }
    }

    fn check_state(&self) -> Result<(), WriteError> {
        if self.closed {
            Err(WriteError::Closed)
        } else if !self.opened {
            Err(WriteError::NotOpen("filesystem"))
        } else {
            Ok(())
        }
    }

    /// Location on disk of `path_in_bag`, whose first component is the bag name
    fn destination(&self, path_in_bag: &str) -> PathBuf {
        let relative = path_in_bag
            .strip_prefix(&self.root_dir_name)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(path_in_bag);
        self.output_path.join(relative)
    }

    async fn create_dir(path: &Path) -> Result<(), WriteError> {
        fs::create_dir_all(path)
            .await
            .map_err(|e| WriteError::Create {
                path: path.to_path_buf(),
                kind: e.kind(),
            })
    }

    async fn copy_hashed<R: AsyncRead + Unpin>(
        &self,
        data: R,
        destination: &Path,
        source: &Path,
        size: u64,
    ) -> Result<DigestMap, WriteError> {
        if let Some(parent) = destination.parent() {
            Self::create_dir(parent).await?;
        }
        let mut hashing = HashingReader::new(data.take(size), &self.algorithms)?;
        let mut output = File::create(destination)
            .await
            .map_err(|e| WriteError::Create {
                path: destination.to_path_buf(),
                kind: e.kind(),
            })?;

        let copy_error = |e: std::io::Error| {
            tracing::error!(path = %source.display(), "error copying into bag: {e}");
            WriteError::Copy {
                path: source.to_path_buf(),
                kind: e.kind(),
            }
        };
        tokio::io::copy(&mut hashing, &mut output)
            .await
            .map_err(copy_error)?;
        output.flush().await.map_err(copy_error)?;

        if hashing.bytes_read() != size {
            tracing::error!(path = %source.display(), copied = hashing.bytes_read(), size, "short copy into bag");
            return Err(WriteError::ShortCopy {
                path: source.to_path_buf(),
                copied: hashing.bytes_read(),
                expected: size,
            });
        }
        Ok(hashing.finalize())
    }
}

impl BagWriter for FileSystemBagWriter {
    async fn open(&mut self) -> Result<(), WriteError> {
        Self::create_dir(&self.output_path).await?;
        self.opened = true;
        self.closed = false;
        Ok(())
    }

    async fn add_file(&mut self, file: &SourceFile, path_in_bag: &str) -> Result<DigestMap, WriteError> {
        self.check_state()?;
        let destination = self.destination(path_in_bag);
        if file.is_dir {
            Self::create_dir(&destination).await?;
            return Ok(DigestMap::new());
        }

        let source = File::open(&file.full_path).await.map_err(|e| {
            tracing::error!(path = %file.full_path.display(), "can't open source file: {e}");
            WriteError::OpenSource {
                path: file.full_path.clone(),
                kind: e.kind(),
            }
        })?;
        let digests = self
            .copy_hashed(source, &destination, &file.full_path, file.size)
            .await?;

        // Keep the modification time of the source, as a tar entry would
        let modified = std::time::SystemTime::from(file.modified);
        if let Ok(output) = fs::OpenOptions::new().write(true).open(&destination).await {
            if let Err(e) = output.into_std().await.set_modified(modified) {
                tracing::debug!(path = %destination.display(), "can't set modification time: {e}");
            }
        }
        Ok(digests)
    }

    async fn add_contents(&mut self, contents: &[u8], path_in_bag: &str) -> Result<DigestMap, WriteError> {
        self.check_state()?;
        let destination = self.destination(path_in_bag);
        self.copy_hashed(contents, &destination, Path::new(path_in_bag), contents.len() as u64)
            .await
    }

    fn digest_algorithms(&self) -> &[Algorithm] {
        &self.algorithms
    }

    fn output_path(&self) -> &Path {
        &self.output_path
    }

    async fn close(&mut self) -> Result<(), WriteError> {
        // Every file is complete once added
        self.closed = true;
        Ok(())
    }
}
