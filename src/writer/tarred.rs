use super::{root_dir_name, BagWriter, WriteError};
use crate::{algorithm::DigestMap, checksum::HashingReader, Algorithm, SourceFile};
use std::path::{Path, PathBuf};
use tokio::{
    fs::File,
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
};
use tokio_tar::{Builder, EntryType, Header};

enum State {
    NotOpen,
    Open(Builder<File>),
    Closed,
}

/// Writes a bag as a single tar file
///
/// The first entry of the archive is the top level directory, named like the tar file without
/// its extension. Paths in bag must start with that name.
pub struct TarredBagWriter {
    output_path: PathBuf,
    root_dir_name: String,
    algorithms: Vec<Algorithm>,
    state: State,
    root_dir_created: bool,
    owner: (u64, u64),
}

impl TarredBagWriter {
    /// Writer for the tar file at `output_path`
    pub fn new(output_path: impl AsRef<Path>, algorithms: Vec<Algorithm>) -> Self {
        Self {
            output_path: output_path.as_ref().to_path_buf(),
            root_dir_name: root_dir_name(output_path.as_ref()),
            algorithms,
            state: State::NotOpen,
            root_dir_created: false,
            owner: (0, 0),
        }
    }

    /// Name of the top level directory inside the archive
    pub fn root_dir_name(&self) -> &str {
        &self.root_dir_name
    }

    fn builder(&mut self) -> Result<&mut Builder<File>, WriteError> {
        match &mut self.state {
            State::Open(builder) => Ok(builder),
            State::NotOpen => Err(WriteError::NotOpen("tar")),
            State::Closed => Err(WriteError::Closed),
        }
    }

    async fn ensure_root_dir(&mut self, uid: u64, gid: u64) -> Result<(), WriteError> {
        if self.root_dir_created {
            return Ok(());
        }

        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Directory);
        header.set_size(0);
        header.set_mode(0o755);
        header.set_mtime(now());
        header.set_uid(uid);
        header.set_gid(gid);

        let name = self.root_dir_name.clone();
        self.builder()?
            .append_data(&mut header, &name, tokio::io::empty())
            .await
            .map_err(|e| WriteError::Create {
                path: name.into(),
                kind: e.kind(),
            })?;

        self.root_dir_created = true;
        self.owner = (uid, gid);
        Ok(())
    }

    /// Append a regular file entry while hashing `data`, which must hold exactly `size` bytes
    async fn append_hashed<R: AsyncRead + Unpin + Send>(
        &mut self,
        mut header: Header,
        path_in_bag: &str,
        data: R,
        source: &Path,
        size: u64,
    ) -> Result<DigestMap, WriteError> {
        let mut hashing = HashingReader::new(data.take(size), &self.algorithms)?;
        header.set_entry_type(EntryType::Regular);
        header.set_size(size);

        self.builder()?
            .append_data(&mut header, path_in_bag, &mut hashing)
            .await
            .map_err(|e| WriteError::Copy {
                path: source.to_path_buf(),
                kind: e.kind(),
            })?;

        if hashing.bytes_read() != size {
            tracing::error!(path = %source.display(), copied = hashing.bytes_read(), size, "short copy into tar");
            return Err(WriteError::ShortCopy {
                path: source.to_path_buf(),
                copied: hashing.bytes_read(),
                expected: size,
            });
        }
        Ok(hashing.finalize())
    }
}

fn now() -> u64 {
    jiff::Timestamp::now().as_second().max(0) as u64
}

impl BagWriter for TarredBagWriter {
    async fn open(&mut self) -> Result<(), WriteError> {
        let file = File::create(&self.output_path)
            .await
            .map_err(|e| {
                tracing::error!(path = %self.output_path.display(), "error creating tar file: {e}");
                WriteError::Create {
                    path: self.output_path.clone(),
                    kind: e.kind(),
                }
            })?;
        self.state = State::Open(Builder::new(file));
        self.root_dir_created = false;
        Ok(())
    }

    async fn add_file(&mut self, file: &SourceFile, path_in_bag: &str) -> Result<DigestMap, WriteError> {
        self.builder()?;
        self.ensure_root_dir(file.uid, file.gid).await?;

        let mut header = Header::new_gnu();
        header.set_mode(file.mode);
        header.set_mtime(file.modified.as_second().max(0) as u64);
        header.set_uid(file.uid);
        header.set_gid(file.gid);

        // Only files and directories, links and devices have no place in a bag
        if file.is_dir {
            header.set_entry_type(EntryType::Directory);
            header.set_size(0);
            self.builder()?
                .append_data(&mut header, path_in_bag, tokio::io::empty())
                .await
                .map_err(|e| WriteError::Create {
                    path: path_in_bag.into(),
                    kind: e.kind(),
                })?;
            return Ok(DigestMap::new());
        }

        let source = File::open(&file.full_path).await.map_err(|e| {
            tracing::error!(path = %file.full_path.display(), "can't open source file: {e}");
            WriteError::OpenSource {
                path: file.full_path.clone(),
                kind: e.kind(),
            }
        })?;
        self.append_hashed(header, path_in_bag, source, &file.full_path, file.size)
            .await
    }

    async fn add_contents(&mut self, contents: &[u8], path_in_bag: &str) -> Result<DigestMap, WriteError> {
        self.builder()?;
        let (uid, gid) = self.owner;
        self.ensure_root_dir(uid, gid).await?;

        let mut header = Header::new_gnu();
        header.set_mode(0o644);
        header.set_mtime(now());
        header.set_uid(uid);
        header.set_gid(gid);
        self.append_hashed(
            header,
            path_in_bag,
            contents,
            Path::new(path_in_bag),
            contents.len() as u64,
        )
        .await
    }

    fn digest_algorithms(&self) -> &[Algorithm] {
        &self.algorithms
    }

    fn output_path(&self) -> &Path {
        &self.output_path
    }

    async fn close(&mut self) -> Result<(), WriteError> {
        let State::Open(builder) = std::mem::replace(&mut self.state, State::Closed) else {
            return Ok(());
        };
        // Writes the end of archive blocks
        let mut file = builder
            .into_inner()
            .await
            .map_err(|e| WriteError::Close(e.kind()))?;
        file.flush().await.map_err(|e| WriteError::Close(e.kind()))
    }
}

#[cfg(test)]
mod test {
    use super::TarredBagWriter;
    use crate::{error::WriteError, writer::BagWriter, Algorithm, SourceFile};
    use digest::Digest;
    use futures::StreamExt;
    use tokio::io::AsyncReadExt;

    async fn list_archive(path: &std::path::Path) -> Vec<(String, Vec<u8>)> {
        let file = tokio::fs::File::open(path).await.unwrap();
        let mut archive = tokio_tar::Archive::new(file);
        let mut entries = archive.entries().unwrap();
        let mut listed = vec![];
        while let Some(entry) = entries.next().await {
            let mut entry = entry.unwrap();
            let name = entry.path().unwrap().to_string_lossy().trim_end_matches('/').to_string();
            let mut contents = vec![];
            entry.read_to_end(&mut contents).await.unwrap();
            listed.push((name, contents));
        }
        listed
    }

    #[tokio::test]
    async fn write_tar() {
        let temp_directory = async_tempfile::TempDir::new().await.unwrap();
        let source_path = temp_directory.join("photo.jpg");
        let data = b"not really a photo".to_vec();
        tokio::fs::write(&source_path, &data).await.unwrap();
        let source = SourceFile::stat(&source_path).await.unwrap();

        let output = temp_directory.join("my_bag.tar");
        let mut writer = TarredBagWriter::new(&output, vec![Algorithm::Md5, Algorithm::Sha256]);
        assert_eq!(writer.root_dir_name(), "my_bag");
        writer.open().await.unwrap();

        let digests = writer.add_file(&source, "my_bag/data/photo.jpg").await.unwrap();
        assert_eq!(digests[&Algorithm::Md5], hex::encode(md5::Md5::digest(&data)));
        assert_eq!(
            digests[&Algorithm::Sha256],
            hex::encode(sha2::Sha256::digest(&data))
        );

        let digests = writer
            .add_contents(b"BagIt-Version: 1.0\n", "my_bag/bagit.txt")
            .await
            .unwrap();
        assert_eq!(digests.len(), 2);
        writer.close().await.unwrap();

        assert_eq!(
            list_archive(&output).await,
            vec![
                ("my_bag".to_string(), vec![]),
                ("my_bag/data/photo.jpg".to_string(), data),
                ("my_bag/bagit.txt".to_string(), b"BagIt-Version: 1.0\n".to_vec()),
            ]
        );
    }

    #[tokio::test]
    async fn write_before_open_and_after_close() {
        let temp_directory = async_tempfile::TempDir::new().await.unwrap();
        let mut writer = TarredBagWriter::new(temp_directory.join("bag.tar"), vec![Algorithm::Md5]);

        assert_eq!(
            writer.add_contents(b"data", "bag/bagit.txt").await,
            Err(WriteError::NotOpen("tar"))
        );

        writer.open().await.unwrap();
        writer.close().await.unwrap();
        assert_eq!(
            writer.add_contents(b"data", "bag/bagit.txt").await,
            Err(WriteError::Closed)
        );
        // Closing twice is harmless
        assert_eq!(writer.close().await, Ok(()));
    }

    #[tokio::test]
    async fn missing_source() {
        let temp_directory = async_tempfile::TempDir::new().await.unwrap();
        let mut writer = TarredBagWriter::new(temp_directory.join("bag.tar"), vec![Algorithm::Md5]);
        writer.open().await.unwrap();

        let mut source = SourceFile::stat(temp_directory.join("bag.tar")).await.unwrap();
        source.full_path = temp_directory.join("gone.txt");
        assert!(matches!(
            writer.add_file(&source, "bag/data/gone.txt").await,
            Err(WriteError::OpenSource { .. })
        ));
        writer.close().await.unwrap();
    }
}
