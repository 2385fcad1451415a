use crate::{
    manifest::{manifest_name, tag_manifest_name},
    progress::Progress,
    tag::{BAG_INFO_TXT, KEY_BAG_SIZE, KEY_DATE, KEY_OXUM, KEY_PROFILE_IDENTIFIER, KEY_SOFTWARE},
    util::{clean_bag_name, find_common_prefix, to_human_size},
    writer::{new_writer, BagWriter, BagWriterKind},
    Algorithm, BagItProfile, EngineConfig, ErrorMap, EventType, FileMap, FileType, ProgressSink,
    SourceFile, Stage, PREFERRED_ALGORITHMS,
};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

/// Error key and message of the step that stopped a run
type StepError = (String, String);

/// Builds a bag from a list of files, according to a [`BagItProfile`]
///
/// Payload files go first, then the tag files (whose `bag-info.txt` needs the Payload-Oxum),
/// then the payload manifests, and the tag manifests last since they cover everything else.
/// Digests are computed while files are written, each source is read once.
pub struct Bagger {
    output_path: PathBuf,
    profile: BagItProfile,
    files: Vec<SourceFile>,
    config: EngineConfig,
    progress: Progress,
    path_prefix: PathBuf,
    bag_name: String,
    /// Payload files written, keyed by path in bag starting with the bag name
    pub payload_files: FileMap,
    /// Tag files and payload manifests written, keyed by path in bag starting with the bag name
    pub tag_files: FileMap,
    /// Contents of every manifest and tag manifest, keyed by file name
    pub manifest_artifacts: BTreeMap<String, String>,
    /// Contents of every tag file, keyed by file name
    pub tag_file_artifacts: BTreeMap<String, String>,
    /// What went wrong during the last [`Bagger::run`]
    pub errors: ErrorMap,
}

impl Bagger {
    /// Bagger writing `files` to `output_path`
    ///
    /// Paths in the payload are relative to the deepest directory shared by all `files`, see
    /// [`find_common_prefix`].
    pub fn new(output_path: impl AsRef<Path>, profile: BagItProfile, files: Vec<SourceFile>) -> Self {
        Self {
            output_path: output_path.as_ref().to_path_buf(),
            profile,
            files,
            config: EngineConfig::default(),
            progress: Progress::default(),
            path_prefix: PathBuf::new(),
            bag_name: String::new(),
            payload_files: FileMap::new(FileType::Payload),
            tag_files: FileMap::new(FileType::Tag),
            manifest_artifacts: BTreeMap::new(),
            tag_file_artifacts: BTreeMap::new(),
            errors: ErrorMap::new(),
        }
    }

    /// Use these settings instead of the defaults
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Send progress events to `sink`
    pub fn with_progress(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.progress.set_sink(Box::new(sink));
        self
    }

    /// Build the bag, returns whether it worked
    ///
    /// On failure, see [`Bagger::errors`]. The writer is closed in every case, but a failed run
    /// can leave a partial bag behind.
    pub async fn run(&mut self) -> bool {
        self.reset();
        self.path_prefix = find_common_prefix(
            &self
                .files
                .iter()
                .map(|file| file.full_path.as_path())
                .collect::<Vec<_>>(),
        );
        self.bag_name = self
            .output_path
            .file_name()
            .map(|name| clean_bag_name(&name.to_string_lossy()).to_string())
            .unwrap_or_default();
        tracing::info!(bag = %self.bag_name, "starting to build bag");
        self.progress.event(
            EventType::Start,
            Stage::Package,
            format!("Starting to build bag {}", self.bag_name),
        );

        if let Err(errors) = self.profile.validate() {
            self.errors = errors;
            return self.finish(None).await;
        }

        let (payload_algorithms, tag_algorithms) = self.manifest_algorithms();
        let mut writer_algorithms = payload_algorithms.clone();
        for algorithm in &tag_algorithms {
            if !writer_algorithms.contains(algorithm) {
                writer_algorithms.push(algorithm.clone());
            }
        }
        let mut writer = new_writer(self.config.writer, &self.output_path, writer_algorithms);
        if let Err(e) = writer.open().await {
            self.errors.insert("BagWriter".into(), e.to_string());
            return self.finish(Some(writer)).await;
        }

        if let Err((key, message)) = self.write_bag(&mut writer, &payload_algorithms, &tag_algorithms).await {
            self.errors.insert(key, message);
        }
        self.finish(Some(writer)).await
    }

    async fn write_bag(
        &mut self,
        writer: &mut BagWriterKind,
        payload_algorithms: &[Algorithm],
        tag_algorithms: &[Algorithm],
    ) -> Result<(), StepError> {
        self.add_payload_files(writer).await;
        if !self.errors.is_empty() {
            return Ok(());
        }
        self.add_tag_files(writer).await?;
        for algorithm in payload_algorithms {
            self.add_manifest(writer, algorithm, FileType::Manifest).await?;
        }
        // Last, they hold digests of the tag files and payload manifests
        for algorithm in tag_algorithms {
            self.add_manifest(writer, algorithm, FileType::TagManifest).await?;
        }
        Ok(())
    }

    fn reset(&mut self) {
        let total = self.files.len() + self.profile.tag_file_names().len() + self.profile.manifests_required.len();
        self.progress.reset(total as u64);
        self.payload_files = FileMap::new(FileType::Payload);
        self.tag_files = FileMap::new(FileType::Tag);
        self.manifest_artifacts.clear();
        self.tag_file_artifacts.clear();
        self.errors.clear();
    }

    /// Algorithms of the payload manifests and of the tag manifests to write
    ///
    /// Digests are computed for whatever the profile requires. When it requires nothing, the
    /// preferred algorithm it allows is used. Manifests are only written for algorithms the
    /// profile accepts for that kind of manifest.
    fn manifest_algorithms(&self) -> (Vec<Algorithm>, Vec<Algorithm>) {
        let profile = &self.profile;
        let mut computed = Algorithm::from_names(&profile.manifests_required);
        for algorithm in Algorithm::from_names(&profile.tag_manifests_required) {
            if !computed.contains(&algorithm) {
                computed.push(algorithm);
            }
        }
        if computed.is_empty() {
            computed.push(self.preferred_algorithm());
        }

        fn accepts(allowed: &[String], required: &[String], algorithm: &Algorithm) -> bool {
            allowed.iter().chain(required).any(|name| name == algorithm.name())
        }
        let mut payload: Vec<_> = computed
            .iter()
            .filter(|algorithm| accepts(&profile.manifests_allowed, &profile.manifests_required, algorithm))
            .cloned()
            .collect();
        if payload.is_empty() {
            payload = computed.clone();
        }
        let tag = computed
            .iter()
            .filter(|algorithm| {
                accepts(&profile.tag_manifests_allowed, &profile.tag_manifests_required, algorithm)
            })
            .cloned()
            .collect();
        (payload, tag)
    }

    /// First of [`PREFERRED_ALGORITHMS`] allowed for manifests, then for tag manifests, else sha512
    fn preferred_algorithm(&self) -> Algorithm {
        [&self.profile.manifests_allowed, &self.profile.tag_manifests_allowed]
            .into_iter()
            .find_map(|allowed| {
                PREFERRED_ALGORITHMS
                    .iter()
                    .find(|algorithm| allowed.iter().any(|name| name == algorithm.name()))
            })
            .cloned()
            .unwrap_or(Algorithm::Sha512)
    }

    /// `bag/data/...` path of a source file
    fn payload_path(&self, file: &SourceFile) -> String {
        let relative = file
            .full_path
            .strip_prefix(&self.path_prefix)
            .unwrap_or(&file.full_path);
        let mut path_in_bag = format!("{}/data", self.bag_name);
        // Forward slashes, whatever the platform
        for component in relative.components() {
            if let std::path::Component::Normal(name) = component {
                path_in_bag.push('/');
                path_in_bag.push_str(&name.to_string_lossy());
            }
        }
        path_in_bag
    }

    /// Copy every source file; a failure is recorded and the next file is attempted
    async fn add_payload_files(&mut self, writer: &mut BagWriterKind) {
        for file in &self.files {
            let path_in_bag = self.payload_path(file);
            tracing::debug!(path = %file.full_path.display(), %path_in_bag, "adding payload file");
            self.progress.step(Stage::Package, format!("Adding {}", file.full_path.display()));

            match writer.add_file(file, &path_in_bag).await {
                Err(e) => {
                    tracing::error!(path = %file.full_path.display(), "{e}");
                    self.errors.insert(file.full_path.display().to_string(), e.to_string());
                }
                // Directories are in the bag, but have nothing to checksum
                Ok(_) if file.is_dir => {}
                Ok(digests) => {
                    let record = self.payload_files.add_or_update(path_in_bag, Some(file.size));
                    for (algorithm, digest) in digests {
                        record.add_checksum(FileType::Payload, algorithm, digest);
                    }
                }
            }
        }
    }

    fn set_bag_info_auto_values(&self) -> BagItProfile {
        let mut profile = self.profile.clone();
        let now = jiff::Timestamp::now().strftime("%Y-%m-%dT%H:%M:%SZ").to_string();
        let identifier = match profile.bag_it_profile_info.bag_it_profile_identifier.trim() {
            "" => self.config.default_profile_identifier.clone(),
            identifier => identifier.to_string(),
        };

        profile.set_tag_value(BAG_INFO_TXT, KEY_DATE, now);
        profile.set_tag_value(BAG_INFO_TXT, KEY_SOFTWARE, self.config.bagging_software.clone());
        profile.set_tag_value(BAG_INFO_TXT, KEY_OXUM, self.payload_oxum());
        profile.set_tag_value(BAG_INFO_TXT, KEY_BAG_SIZE, to_human_size(self.payload_bytes()));
        profile.set_tag_value(BAG_INFO_TXT, KEY_PROFILE_IDENTIFIER, identifier);
        profile
    }

    async fn add_tag_files(&mut self, writer: &mut BagWriterKind) -> Result<(), StepError> {
        let profile = self.set_bag_info_auto_values();
        for name in profile.tag_file_names() {
            self.progress.step(Stage::Package, format!("Adding {name}"));
            let contents = profile.get_tag_file_contents(&name);
            let path_in_bag = format!("{}/{name}", self.bag_name);

            let digests = writer
                .add_contents(contents.as_bytes(), &path_in_bag)
                .await
                .map_err(|e| (name.clone(), format!("Error writing tag file to bag: {e}")))?;

            let record = self
                .tag_files
                .add_or_update(path_in_bag, Some(contents.len() as u64));
            for (algorithm, digest) in digests {
                record.add_checksum(FileType::Tag, algorithm, digest);
            }
            self.tag_file_artifacts.insert(name, contents);
        }
        Ok(())
    }

    /// Write a payload manifest ([`FileType::Manifest`]) or a tag manifest
    async fn add_manifest(
        &mut self,
        writer: &mut BagWriterKind,
        algorithm: &Algorithm,
        kind: FileType,
    ) -> Result<(), StepError> {
        let (name, subjects, subject_type) = match kind {
            FileType::Manifest => (manifest_name(algorithm), &self.payload_files, FileType::Payload),
            _ => (tag_manifest_name(algorithm), &self.tag_files, FileType::Tag),
        };
        self.progress.step(Stage::Package, format!("Adding {name}"));

        let mut contents = Vec::new();
        let trim_from_path = format!("{}/", self.bag_name);
        subjects
            .write_manifest(&mut contents, subject_type, algorithm, &trim_from_path)
            .await
            .map_err(|e| {
                (
                    name.clone(),
                    format!("Error writing manifest {name} (type={kind}, subject type={subject_type}): {e}"),
                )
            })?;

        let path_in_bag = format!("{}/{name}", self.bag_name);
        let digests = writer
            .add_contents(&contents, &path_in_bag)
            .await
            .map_err(|e| (name.clone(), e.to_string()))?;

        // A payload manifest is a tag file from the point of view of the tag manifests
        if kind == FileType::Manifest {
            let record = self
                .tag_files
                .add_or_update(path_in_bag, Some(contents.len() as u64));
            for (algorithm, digest) in digests {
                record.add_checksum(FileType::Tag, algorithm, digest);
            }
        }
        self.manifest_artifacts
            .insert(name, String::from_utf8_lossy(&contents).into_owned());
        Ok(())
    }

    async fn finish(&mut self, writer: Option<BagWriterKind>) -> bool {
        if let Some(mut writer) = writer {
            if let Err(e) = writer.close().await {
                self.errors.insert("BagWriter".into(), e.to_string());
            }
        }

        tracing::info!(bag = %self.bag_name, "finished bag");
        if self.errors.is_empty() {
            self.progress.event(
                EventType::Finish,
                Stage::Package,
                format!("Finished bag {}", self.bag_name),
            );
            return true;
        }

        tracing::error!(bag = %self.bag_name, "bagging failed with the following errors:");
        for (key, value) in &self.errors {
            tracing::error!(bag = %self.bag_name, %key, "{value}");
            self.progress.event(EventType::Error, Stage::Package, format!("{key}: {value}"));
        }
        false
    }

    /// Name of the top level directory of the bag
    pub fn bag_name(&self) -> &str {
        &self.bag_name
    }

    /// Bytes of payload written
    pub fn payload_bytes(&self) -> u64 {
        self.payload_files.total_bytes()
    }

    /// Payload files written
    pub fn payload_file_count(&self) -> u64 {
        self.payload_files.file_count()
    }

    /// `<bytes>.<file count>`
    pub fn payload_oxum(&self) -> String {
        self.payload_files.oxum()
    }

    /// Payload files, tag files and manifests written, zero before [`Bagger::run`]
    pub fn total_files_bagged(&self) -> u64 {
        self.progress.current
    }

    /// Where copies of the tag files and manifests should be kept, outside of the bag
    ///
    /// Nothing is written there by the bagger. A directory bag gets a sibling directory, a
    /// tar bag a directory named after the bag next to the tar file.
    pub fn artifacts_dir(&self) -> PathBuf {
        if self.output_path.is_dir() {
            let mut dir = self.output_path.clone().into_os_string();
            dir.push("_artifacts");
            return dir.into();
        }
        self.output_path
            .parent()
            .unwrap_or(Path::new(""))
            .join(format!("{}_artifacts", self.bag_name))
    }
}
