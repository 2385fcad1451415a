use super::{BagContents, BagReader, ReadError};
use crate::util::tar_path_to_bag_path;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio_tar::{Archive, Entry};

/// Reads a bag serialized as a single tar file
///
/// Every entry must sit under one top level directory, which is stripped to get paths relative
/// to the bag root. The archive is streamed, so each pass reopens the file.
#[derive(Debug)]
pub struct TarredBagReader {
    path: PathBuf,
}

impl TarredBagReader {
    /// Reader for the tar file at `path`
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn read_error(&self, e: std::io::Error) -> ReadError {
        tracing::error!(path = %self.path.display(), "error reading tar file: {e}");
        ReadError::Read {
            path: self.path.clone(),
            kind: e.kind(),
        }
    }

    async fn open(&self) -> Result<Archive<File>, ReadError> {
        let file = File::open(&self.path).await.map_err(|e| ReadError::Open {
            path: self.path.clone(),
            kind: e.kind(),
        })?;
        Ok(Archive::new(file))
    }

    /// Path in bag and size of a regular file entry, `None` for anything else
    fn describe(&self, entry: &Entry<Archive<File>>) -> Result<Option<(String, String, u64)>, ReadError> {
        if !entry.header().entry_type().is_file() {
            return Ok(None);
        }
        let tar_path = entry
            .path()
            .map_err(|e| self.read_error(e))?
            .to_string_lossy()
            .into_owned();
        let path_in_bag = tar_path_to_bag_path(&tar_path)
            .ok_or_else(|| ReadError::NotInBag(tar_path.clone()))?
            .to_string();
        let top_level_dir = tar_path
            .split('/')
            .find(|component| !component.is_empty() && *component != ".")
            .unwrap_or_default()
            .to_string();
        let size = entry.header().size().map_err(|e| self.read_error(e))?;
        Ok(Some((top_level_dir, path_in_bag, size)))
    }
}

impl BagReader for TarredBagReader {
    async fn scan_metadata(&mut self, contents: &mut BagContents) -> Result<(), ReadError> {
        let mut archive = self.open().await?;
        let mut entries = archive.entries().map_err(|e| self.read_error(e))?;

        while let Some(entry) = entries.next().await {
            let mut entry = entry.map_err(|e| self.read_error(e))?;
            let Some((top_level_dir, path_in_bag, size)) = self.describe(&entry)? else {
                continue;
            };
            if contents.top_level_dir.is_none() {
                contents.top_level_dir = Some(top_level_dir);
            }
            contents
                .scan_metadata_entry(&path_in_bag, size, &mut entry)
                .await?;
        }
        Ok(())
    }

    async fn scan_payload(&mut self, contents: &mut BagContents) -> Result<(), ReadError> {
        let mut archive = self.open().await?;
        let mut entries = archive.entries().map_err(|e| self.read_error(e))?;

        while let Some(entry) = entries.next().await {
            let mut entry = entry.map_err(|e| self.read_error(e))?;
            let Some((_, path_in_bag, size)) = self.describe(&entry)? else {
                continue;
            };
            contents
                .scan_payload_entry(&path_in_bag, size, &mut entry)
                .await?;
        }

        contents.merge_payload_manifest_checksums();
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::TarredBagReader;
    use crate::{
        error::ReadError,
        reader::{test::sample_bag, BagContents, BagReader},
        Algorithm,
    };
    use std::path::Path;
    use tokio_tar::{Builder, EntryType, Header};

    async fn write_tar(path: &Path, files: &[(String, Vec<u8>)]) {
        let file = tokio::fs::File::create(path).await.unwrap();
        let mut builder = Builder::new(file);
        for (name, data) in files {
            let mut header = Header::new_gnu();
            header.set_entry_type(EntryType::Regular);
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            builder
                .append_data(&mut header, name, data.as_slice())
                .await
                .unwrap();
        }
        builder.into_inner().await.unwrap();
    }

    #[tokio::test]
    async fn read_tar() {
        let temp_directory = async_tempfile::TempDir::new().await.unwrap();
        let path = temp_directory.join("photos.tar");
        let files: Vec<_> = sample_bag()
            .into_iter()
            .map(|(name, data)| (format!("photos/{name}"), data))
            .collect();
        write_tar(&path, &files).await;

        let mut reader = TarredBagReader::new(&path);
        let mut contents = BagContents::new();
        reader.scan_metadata(&mut contents).await.unwrap();
        assert_eq!(contents.top_level_dir.as_deref(), Some("photos"));
        assert_eq!(contents.payload_files.oxum(), "11.1");

        reader.scan_payload(&mut contents).await.unwrap();
        assert!(contents
            .payload_files
            .validate_checksums(&[Algorithm::Sha256])
            .is_empty());
        assert!(contents
            .tag_files
            .validate_checksums(&[Algorithm::Sha256])
            .is_empty());
    }

    #[tokio::test]
    async fn file_outside_top_level_dir() {
        let temp_directory = async_tempfile::TempDir::new().await.unwrap();
        let path = temp_directory.join("loose.tar");
        write_tar(&path, &[("bagit.txt".to_string(), b"BagIt-Version: 1.0\n".to_vec())]).await;

        let mut contents = BagContents::new();
        assert_eq!(
            TarredBagReader::new(&path).scan_metadata(&mut contents).await,
            Err(ReadError::NotInBag("bagit.txt".into()))
        );
    }

    #[tokio::test]
    async fn missing_tar() {
        let temp_directory = async_tempfile::TempDir::new().await.unwrap();
        let mut contents = BagContents::new();
        assert!(matches!(
            TarredBagReader::new(temp_directory.join("nope.tar"))
                .scan_metadata(&mut contents)
                .await,
            Err(ReadError::Open { .. })
        ));
    }
}
