use super::{BagContents, BagReader, ReadError};
use crate::SourceFile;
use std::path::{Path, PathBuf};
use tokio::fs::File;

/// Reads a bag stored as a plain directory
#[derive(Debug)]
pub struct FileSystemBagReader {
    path: PathBuf,
}

impl FileSystemBagReader {
    /// Reader for the bag directory at `path`
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Every regular file of the bag: path in bag, location on disk, size
    async fn list_files(&self) -> Result<Vec<(String, PathBuf, u64)>, ReadError> {
        let files = SourceFile::list_recursive(&self.path)
            .await
            .map_err(|e| ReadError::Read {
                path: self.path.clone(),
                kind: e.kind(),
            })?;

        Ok(files
            .into_iter()
            .filter(|file| !file.is_dir)
            .filter_map(|file| {
                let path_in_bag = file
                    .full_path
                    .strip_prefix(&self.path)
                    .ok()?
                    .components()
                    .map(|component| component.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                Some((path_in_bag, file.full_path, file.size))
            })
            .collect())
    }

    async fn open(&self, full_path: &Path) -> Result<File, ReadError> {
        File::open(full_path).await.map_err(|e| {
            tracing::error!(path = %full_path.display(), "can't open file in bag: {e}");
            ReadError::Read {
                path: full_path.to_path_buf(),
                kind: e.kind(),
            }
        })
    }
}

impl BagReader for FileSystemBagReader {
    async fn scan_metadata(&mut self, contents: &mut BagContents) -> Result<(), ReadError> {
        for (path_in_bag, full_path, size) in self.list_files().await? {
            let file = self.open(&full_path).await?;
            contents.scan_metadata_entry(&path_in_bag, size, file).await?;
        }
        Ok(())
    }

    async fn scan_payload(&mut self, contents: &mut BagContents) -> Result<(), ReadError> {
        for (path_in_bag, full_path, size) in self.list_files().await? {
            let file = self.open(&full_path).await?;
            contents.scan_payload_entry(&path_in_bag, size, file).await?;
        }
        contents.merge_payload_manifest_checksums();
        Ok(())
    }
}
