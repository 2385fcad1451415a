use std::path::{Path, PathBuf};

/// A file or directory to put in a bag, with the metadata the writers need
#[derive(Clone, Debug, PartialEq)]
pub struct SourceFile {
    /// Absolute (or working directory relative) path on disk
    pub full_path: PathBuf,
    /// Bytes, zero for directories
    pub size: u64,
    /// Permission bits
    pub mode: u32,
    /// Last modification
    pub modified: jiff::Timestamp,
    /// Directories are recorded in the bag but have no digests
    pub is_dir: bool,
    /// Owner, zero where unavailable
    pub uid: u64,
    /// Group, zero where unavailable
    pub gid: u64,
}

impl SourceFile {
    /// Read metadata of `path`, following symlinks
    pub async fn stat(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        Ok(Self::from_metadata(path.to_path_buf(), &metadata))
    }

    fn from_metadata(full_path: PathBuf, metadata: &std::fs::Metadata) -> Self {
        #[cfg(unix)]
        let (mode, uid, gid) = {
            use std::os::unix::fs::MetadataExt;
            (metadata.mode() & 0o7777, metadata.uid() as u64, metadata.gid() as u64)
        };
        #[cfg(not(unix))]
        let (mode, uid, gid) = (if metadata.is_dir() { 0o755 } else { 0o644 }, 0, 0);

        let modified = metadata
            .modified()
            .ok()
            .and_then(|time| jiff::Timestamp::try_from(time).ok())
            .unwrap_or(jiff::Timestamp::UNIX_EPOCH);

        Self {
            full_path,
            size: if metadata.is_dir() { 0 } else { metadata.len() },
            mode,
            modified,
            is_dir: metadata.is_dir(),
            uid,
            gid,
        }
    }

    /// `path` itself, then everything below it in sorted order
    ///
    /// Only directories and regular files are listed: symlinks, devices and sockets have no
    /// place in a bag. A regular file is returned on its own.
    pub async fn list_recursive(path: impl AsRef<Path>) -> std::io::Result<Vec<Self>> {
        let root = Self::stat(path).await?;
        let mut files = vec![];
        let mut directories = vec![];
        if root.is_dir {
            directories.push(root.full_path.clone());
        }
        files.push(root);

        while let Some(directory) = directories.pop() {
            let mut entries = tokio::fs::read_dir(&directory).await?;
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                if !file_type.is_dir() && !file_type.is_file() {
                    tracing::debug!(path = %entry.path().display(), "skipping irregular file");
                    continue;
                }
                let metadata = entry.metadata().await?;
                let file = Self::from_metadata(entry.path(), &metadata);
                if file.is_dir {
                    directories.push(file.full_path.clone());
                }
                files.push(file);
            }
        }

        files.sort_by(|a, b| a.full_path.cmp(&b.full_path));
        Ok(files)
    }
}
