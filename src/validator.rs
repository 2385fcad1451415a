use crate::{
    config::ControlCharacterPolicy,
    manifest::{looks_like_manifest, looks_like_tag_manifest, manifest_name, tag_manifest_name},
    profile::Serialization,
    progress::Progress,
    reader::{open_reader, BagContents, BagReader, ReadError},
    tag::{BAGIT_TXT, BAG_INFO_TXT, KEY_OXUM},
    util::{clean_bag_name, has_valid_extension_for_mime_type},
    Algorithm, BagItProfile, EngineConfig, ErrorMap, EventType, ProgressSink, Stage, Tag,
};
use regex::Regex;
use std::path::{Path, PathBuf};

/// Checks an existing bag against a [`BagItProfile`]
///
/// Call [`Validator::scan_bag`] first, then [`Validator::validate`]:
///
/// ```no_run
/// # async fn example(profile: async_bagger::BagItProfile) {
/// use async_bagger::Validator;
///
/// let mut validator = Validator::new("/tmp/bags/photos.tar", profile);
/// if let Err(e) = validator.scan_bag().await {
///     eprintln!("cannot read bag: {e}");
/// }
/// if !validator.validate() {
///     eprintln!("{}", validator.error_string());
/// }
/// # }
/// ```
pub struct Validator {
    path_to_bag: PathBuf,
    profile: BagItProfile,
    config: EngineConfig,
    progress: Progress,
    /// Everything found by [`Validator::scan_bag`]
    pub contents: BagContents,
    /// Problems making the bag invalid, keyed by file name, tag name, or a fixed key such as
    /// `Payload-Oxum`
    pub errors: ErrorMap,
    /// Problems worth reporting that do not make the bag invalid
    pub warnings: ErrorMap,
}

impl Validator {
    /// Validator for the bag at `path_to_bag`, a directory or a tar file
    pub fn new(path_to_bag: impl AsRef<Path>, profile: BagItProfile) -> Self {
        Self {
            path_to_bag: path_to_bag.as_ref().to_path_buf(),
            profile,
            config: EngineConfig::default(),
            progress: Progress::default(),
            contents: BagContents::new(),
            errors: ErrorMap::new(),
            warnings: ErrorMap::new(),
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

    /// Read the bag: file names, sizes, tags, and checksums
    ///
    /// Payload checksums are the expensive part. When `Payload-Oxum` already says the payload is
    /// wrong, they are skipped and [`ReadError::OxumMismatch`] is returned, unless
    /// [`EngineConfig::ignore_oxum_mismatch`] is set.
    pub async fn scan_bag(&mut self) -> Result<(), ReadError> {
        self.contents = BagContents::new();
        let bag = self.path_to_bag.display().to_string();
        let result = self.scan().await;
        if let Err(e) = &result {
            tracing::error!(bag = %bag, "error scanning bag: {e}");
        }
        result
    }

    async fn scan(&mut self) -> Result<(), ReadError> {
        let bag = self.path_to_bag.display().to_string();
        let mut reader = open_reader(&self.path_to_bag).await?;

        tracing::info!(bag = %bag, reader = ?reader.reader_type(), "scanning metadata");
        reader.scan_metadata(&mut self.contents).await?;

        if !self.config.ignore_oxum_mismatch {
            self.assert_oxums_match()?;
        }

        tracing::info!(bag = %bag, "scanning payload");
        reader.scan_payload(&mut self.contents).await
    }

    /// Check the scanned bag against the profile, returns whether the bag is valid
    ///
    /// Every problem is collected in [`Validator::errors`], except that an invalid profile or
    /// a bag of the wrong physical form stops validation right away. Checksum errors are capped
    /// at [`EngineConfig::max_errors`].
    pub fn validate(&mut self) -> bool {
        if let Err(errors) = self.profile.validate() {
            self.errors = errors;
            return self.finish();
        }
        if !self.validate_serialization() {
            return self.finish();
        }

        let total = self.contents.payload_files.file_count() + self.contents.tag_files.file_count();
        self.progress.reset(total);
        if !self.check_control_characters() {
            return self.finish();
        }

        self.check_tar_dir_name();
        self.check_unsupported_algorithms();
        self.check_required_manifests();
        self.check_required_tag_manifests();
        self.check_forbidden_manifests();
        self.check_forbidden_tag_manifests();
        self.check_required_tag_files();
        self.check_forbidden_tag_files();
        self.validate_tags();

        // Even when the scan went on despite a mismatch
        let _ = self.assert_oxums_match();

        self.validate_checksums();
        self.finish()
    }

    /// Tags found in the bag, matching the label exactly or ignoring case
    pub fn get_tags(&self, tag_file: &str, tag_name: &str) -> Vec<&Tag> {
        self.contents.get_tags(tag_file, tag_name)
    }

    /// Algorithms of the payload manifests found in the bag
    pub fn payload_manifest_algorithms(&self) -> Vec<Algorithm> {
        self.contents.payload_manifest_algorithms()
    }

    /// Algorithms of the tag manifests found in the bag
    pub fn tag_manifest_algorithms(&self) -> Vec<Algorithm> {
        self.contents.tag_manifest_algorithms()
    }

    /// Compare `Payload-Oxum` with the payload found, when the bag has one
    pub fn assert_oxums_match(&mut self) -> Result<(), ReadError> {
        let oxum = self.contents.payload_files.oxum();
        let mismatch = self
            .get_tags(BAG_INFO_TXT, KEY_OXUM)
            .first()
            .is_some_and(|tag| tag.value != oxum);
        if mismatch {
            tracing::warn!(bag = %self.path_to_bag.display(), actual = %oxum, "Payload-Oxum mismatch");
            self.errors
                .insert(KEY_OXUM.into(), ReadError::OxumMismatch.to_string());
            return Err(ReadError::OxumMismatch);
        }
        Ok(())
    }

    /// Errors, one `key -> message` line each
    pub fn error_string(&self) -> String {
        self.errors
            .iter()
            .map(|(key, value)| format!("{key} -> {value}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Errors as a JSON object
    pub fn error_json(&self) -> String {
        serde_json::to_string(&self.errors).unwrap_or_else(|_| "{}".into())
    }

    fn validate_serialization(&mut self) -> bool {
        let is_directory = self.path_to_bag.is_dir();
        let message = match (&self.profile.serialization, is_directory) {
            (Serialization::Required, true) => {
                Some("Profile says bag must be serialized, but it is a directory.".to_string())
            }
            (Serialization::Forbidden, false) => Some(
                "Profile says bag must not be serialized, but bag is not a directory.".to_string(),
            ),
            (_, false) => self.check_extension(),
            (_, true) => None,
        };

        match message {
            Some(message) => {
                self.errors.insert("Serialization".into(), message);
                false
            }
            None => true,
        }
    }

    /// Error message when the file extension matches none of the accepted serializations
    fn check_extension(&self) -> Option<String> {
        let file_name = self.path_to_bag.to_string_lossy();
        let mut last_result = Ok(false);
        for mime_type in &self.profile.accept_serialization {
            last_result = has_valid_extension_for_mime_type(&file_name, mime_type);
            if last_result == Ok(true) {
                return None;
            }
        }

        if let Err(e) = last_result {
            return Some(e.to_string());
        }
        let extension = self
            .path_to_bag
            .extension()
            .map(|extension| format!(".{}", extension.to_string_lossy()))
            .unwrap_or_default();
        Some(format!(
            "Bag has extension {extension}, but profile says it must be serialized as of one of the following types: {}.",
            self.profile.accept_serialization.join(",")
        ))
    }

    /// Payload and tag file names with control characters, handled per [`ControlCharacterPolicy`]
    fn check_control_characters(&mut self) -> bool {
        let bad_paths: Vec<&str> = self
            .contents
            .payload_files
            .files
            .keys()
            .chain(self.contents.tag_files.files.keys())
            .filter(|path| path.chars().any(char::is_control))
            .map(String::as_str)
            .collect();
        if bad_paths.is_empty() {
            return true;
        }

        let mut message = vec![
            "The following file names include control characters that may be invalid on some platforms:",
        ];
        message.extend(bad_paths);
        let message = message.join(" | ");

        match self.config.control_characters {
            ControlCharacterPolicy::Ignore => true,
            ControlCharacterPolicy::Warn => {
                self.progress
                    .event(EventType::Warning, Stage::Validation, message.clone());
                self.warnings.insert("File Names".into(), message);
                true
            }
            ControlCharacterPolicy::FailValidation => {
                self.errors.insert("File Names".into(), message);
                false
            }
        }
    }

    fn check_tar_dir_name(&mut self) {
        if !self.profile.tar_dir_must_match_name {
            return;
        }
        let Some(actual) = &self.contents.top_level_dir else {
            return;
        };
        let file_name = self
            .path_to_bag
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_default();
        let expected = clean_bag_name(&file_name);
        if actual != expected {
            self.errors.insert(
                "Tar Directory".into(),
                format!("Bag should untar to directory '{expected}', not '{actual}'."),
            );
        }
    }

    fn check_unsupported_algorithms(&mut self) {
        let manifests = self
            .contents
            .payload_manifests
            .files
            .keys()
            .chain(self.contents.tag_manifests.files.keys());
        for name in manifests {
            let supported = crate::manifest::algorithm_from_manifest_name(name)
                .is_some_and(|algorithm| algorithm.hasher().is_some());
            if !supported {
                self.errors
                    .insert(name.clone(), "Unsupported digest algorithm".into());
            }
        }
    }

    fn check_required_manifests(&mut self) {
        for algorithm in Algorithm::from_names(&self.profile.manifests_required) {
            let name = manifest_name(&algorithm);
            if !self.contents.payload_manifests.files.contains_key(&name) {
                self.errors
                    .insert(name.clone(), format!("Required manifest '{name}' is missing."));
            }
        }
    }

    fn check_required_tag_manifests(&mut self) {
        for algorithm in Algorithm::from_names(&self.profile.tag_manifests_required) {
            let name = tag_manifest_name(&algorithm);
            if !self.contents.tag_manifests.files.contains_key(&name) {
                self.errors
                    .insert(name.clone(), format!("Required tag manifest '{name}' is missing."));
            }
        }
    }

    fn check_forbidden_manifests(&mut self) {
        for algorithm in self.payload_manifest_algorithms() {
            if !self.profile.manifests_allowed.iter().any(|name| name == algorithm.name()) {
                let name = manifest_name(&algorithm);
                self.errors
                    .insert(name.clone(), format!("Payload manifest is forbidden by profile: {name}"));
            }
        }
    }

    fn check_forbidden_tag_manifests(&mut self) {
        for algorithm in self.tag_manifest_algorithms() {
            if !self.profile.tag_manifests_allowed.iter().any(|name| name == algorithm.name()) {
                let name = tag_manifest_name(&algorithm);
                self.errors
                    .insert(name.clone(), format!("Tag manifest is forbidden by profile: {name}"));
            }
        }
    }

    /// A tag file only listed in a tag manifest is not in the bag
    fn check_required_tag_files(&mut self) {
        for name in &self.profile.tag_files_required {
            if name.is_empty() {
                continue;
            }
            let present = self
                .contents
                .tag_files
                .files
                .get(name)
                .is_some_and(|record| record.size.is_some());
            if !present {
                self.errors
                    .insert(name.clone(), format!("Required tag file is missing: {name}"));
            }
        }
    }

    /// Tag files must match one of the allowed patterns, where `*` matches anything
    ///
    /// Manifests, `bagit.txt` and `bag-info.txt` are always allowed. A bare `*` pattern, or no
    /// pattern at all, allows every tag file.
    fn check_forbidden_tag_files(&mut self) {
        let patterns: Vec<&str> = self
            .profile
            .tag_files_allowed
            .iter()
            .map(|pattern| pattern.trim())
            .filter(|pattern| !pattern.is_empty())
            .collect();
        if patterns.is_empty() || patterns.contains(&"*") {
            return;
        }

        let mut regexes = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let expression = pattern
                .split('*')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(".*");
            match Regex::new(&format!("^{expression}$")) {
                Ok(regex) => regexes.push(regex),
                Err(e) => {
                    tracing::error!(pattern, "invalid tag file pattern: {e}");
                    self.errors.insert(
                        pattern.to_string(),
                        "Cannot match tag file names against this pattern.".into(),
                    );
                    return;
                }
            }
        }

        for name in self.contents.tag_files.files.keys() {
            let always_allowed = name == BAGIT_TXT
                || name == BAG_INFO_TXT
                || looks_like_manifest(name)
                || looks_like_tag_manifest(name);
            if always_allowed || regexes.iter().any(|regex| regex.is_match(name)) {
                continue;
            }
            self.errors.insert(
                name.clone(),
                format!("Tag file {name} is not in the list of allowed tag files."),
            );
        }
    }

    fn validate_tags(&mut self) {
        let unparsable = &self.contents.unparsable_tag_files;
        for file in unparsable {
            let has_required_tags = self
                .profile
                .tags
                .iter()
                .any(|tag| &tag.tag_file == file && tag.required);
            if has_required_tags {
                self.errors.insert(
                    file.clone(),
                    format!("Tag file {file} could not be parsed, so its required tags cannot be checked."),
                );
            } else {
                self.warnings.insert(
                    file.clone(),
                    format!("Tag file {file} could not be parsed."),
                );
            }
        }

        for tag_def in &self.profile.tags {
            if unparsable.contains(&tag_def.tag_file) {
                continue;
            }
            let key = tag_def.fully_qualified_name();
            let tags = self.contents.get_tags(&tag_def.tag_file, &tag_def.tag_name);
            if tags.is_empty() {
                if tag_def.required {
                    self.errors
                        .insert(key.clone(), format!("Required tag is missing: {key}"));
                }
                continue;
            }

            let mut has_value = false;
            for tag in tags {
                has_value |= !tag.value.is_empty();
                if !tag_def.is_legal_value(&tag.value) {
                    self.errors.insert(
                        key.clone(),
                        format!(
                            "Tag '{key}' has illegal value '{}'. Allowed values are: {}",
                            tag.value,
                            tag_def.values.join(",")
                        ),
                    );
                }
            }
            if tag_def.required && !tag_def.empty_ok && !has_value {
                self.errors.insert(
                    key.clone(),
                    format!("Required tag '{key}' is present but has no value."),
                );
            }
        }
    }

    /// Payload files against payload manifests, then tag files against tag manifests
    fn validate_checksums(&mut self) {
        let supported = |algorithms: Vec<Algorithm>| -> Vec<Algorithm> {
            algorithms
                .into_iter()
                .filter(|algorithm| algorithm.hasher().is_some())
                .collect()
        };
        let progress = &mut self.progress;
        let mut on_file = |path: &str| progress.step(Stage::Validation, format!("Validating {path}"));

        let payload_errors = self.contents.payload_files.validate_checksums_with(
            &supported(self.contents.payload_manifest_algorithms()),
            self.config.max_errors,
            &mut on_file,
        );
        let tag_errors = self.contents.tag_files.validate_checksums_with(
            &supported(self.contents.tag_manifest_algorithms()),
            self.config.max_errors.saturating_sub(payload_errors.len()),
            &mut on_file,
        );
        self.errors.extend(payload_errors);
        self.errors.extend(tag_errors);
    }

    fn finish(&self) -> bool {
        let bag = self.path_to_bag.display().to_string();
        for (key, value) in &self.warnings {
            tracing::warn!(bag = %bag, %key, "{value}");
        }
        if self.errors.is_empty() {
            tracing::info!(bag = %bag, "bag is valid");
            self.progress.event(EventType::Finish, Stage::Validation, format!("Bag {bag} is valid"));
            return true;
        }

        tracing::error!(bag = %bag, "validation failed");
        for (key, value) in &self.errors {
            tracing::error!(bag = %bag, %key, "{value}");
            self.progress.event(EventType::Error, Stage::Validation, format!("{key}: {value}"));
        }
        false
    }
}

#[cfg(test)]
mod test {
    use super::Validator;
    use crate::{
        config::ControlCharacterPolicy, error::ReadError, profile::Serialization, BagItProfile,
        Bagger, EngineConfig, SourceFile, TagDefinition,
    };
    use std::path::{Path, PathBuf};

    fn profile() -> BagItProfile {
        let mut profile = BagItProfile::new();
        profile.name = "Validation profile".into();
        profile.manifests_required = vec!["sha256".into()];
        profile.tag_manifests_required = vec!["sha256".into()];
        profile.tag_manifests_allowed = vec!["sha256".into()];
        profile
    }

    /// Bag two small files with `profile`, returns the path of the bag
    async fn make_bag(root: &Path, name: &str, profile: BagItProfile, config: EngineConfig) -> PathBuf {
        let source = root.join(format!("{name}_source"));
        tokio::fs::create_dir_all(&source).await.unwrap();
        tokio::fs::write(source.join("one.txt"), b"one").await.unwrap();
        tokio::fs::write(source.join("two.txt"), b"two, longer").await.unwrap();
        let files = SourceFile::list_recursive(&source).await.unwrap();

        let output = root.join(name);
        let mut bagger = Bagger::new(&output, profile, files).with_config(config);
        assert!(bagger.run().await, "{:?}", bagger.errors);
        output
    }

    async fn scan_and_validate(validator: &mut Validator) -> bool {
        validator.scan_bag().await.unwrap();
        validator.validate()
    }

    #[tokio::test]
    async fn valid_tar_bag() {
        let temp_directory = async_tempfile::TempDir::new().await.unwrap();
        let bag = make_bag(&temp_directory, "bag.tar", profile(), EngineConfig::default()).await;

        let mut validator = Validator::new(&bag, profile());
        assert!(scan_and_validate(&mut validator).await, "{}", validator.error_string());
        assert_eq!(validator.error_json(), "{}");
        assert_eq!(validator.contents.top_level_dir.as_deref(), Some("bag"));
        assert_eq!(validator.get_tags("bag-info.txt", "PAYLOAD-OXUM")[0].value, "14.2");
    }

    #[tokio::test]
    async fn serialization() {
        let temp_directory = async_tempfile::TempDir::new().await.unwrap();
        let config = EngineConfig::from_toml_str("writer = \"filesystem\"").unwrap();
        let directory = make_bag(&temp_directory, "dir_bag", profile(), config).await;
        let tarred = make_bag(&temp_directory, "bag.tar", profile(), EngineConfig::default()).await;

        let mut required = profile();
        required.serialization = Serialization::Required;
        let mut validator = Validator::new(&directory, required);
        assert!(!scan_and_validate(&mut validator).await);
        assert_eq!(
            validator.errors["Serialization"],
            "Profile says bag must be serialized, but it is a directory."
        );

        let mut forbidden = profile();
        forbidden.serialization = Serialization::Forbidden;
        let mut validator = Validator::new(&tarred, forbidden);
        assert!(!scan_and_validate(&mut validator).await);
        assert_eq!(
            validator.errors["Serialization"],
            "Profile says bag must not be serialized, but bag is not a directory."
        );

        let mut zip_only = profile();
        zip_only.accept_serialization = vec!["application/zip".into()];
        let mut validator = Validator::new(&tarred, zip_only);
        assert!(!scan_and_validate(&mut validator).await);
        assert_eq!(
            validator.errors["Serialization"],
            "Bag has extension .tar, but profile says it must be serialized as of one of the following types: application/zip."
        );

        // Directories are fine when serialization is optional
        let mut validator = Validator::new(&directory, profile());
        assert!(scan_and_validate(&mut validator).await, "{}", validator.error_string());
    }

    #[tokio::test]
    async fn profile_rules() {
        let temp_directory = async_tempfile::TempDir::new().await.unwrap();
        let bag = make_bag(&temp_directory, "bag.tar", profile(), EngineConfig::default()).await;

        let mut strict = profile();
        strict.manifests_required.push("md5".into());
        strict.tag_manifests_required.push("sha512".into());
        strict.manifests_allowed = vec!["md5".into()];
        strict.tag_manifests_allowed = vec!["md5".into()];
        strict.tag_files_required = vec!["aptrust-info.txt".into(), String::new()];
        let mut title = TagDefinition::new("bag-info.txt", "Title");
        title.required = true;
        strict.tags.push(title);
        let mut version = TagDefinition::new("bagit.txt", "BagIt-Version");
        version.values = vec!["0.97".into()];
        *strict.get_tag_def_mut("bagit.txt", "BagIt-Version").unwrap() = TagDefinition {
            required: true,
            ..version
        };

        let mut validator = Validator::new(&bag, strict);
        assert!(!scan_and_validate(&mut validator).await);
        for (key, message) in [
            ("manifest-md5.txt", "Required manifest 'manifest-md5.txt' is missing."),
            (
                "tagmanifest-sha512.txt",
                "Required tag manifest 'tagmanifest-sha512.txt' is missing.",
            ),
            ("manifest-sha256.txt", "Payload manifest is forbidden by profile: manifest-sha256.txt"),
            (
                "tagmanifest-sha256.txt",
                "Tag manifest is forbidden by profile: tagmanifest-sha256.txt",
            ),
            ("aptrust-info.txt", "Required tag file is missing: aptrust-info.txt"),
            ("bag-info.txt/Title", "Required tag is missing: bag-info.txt/Title"),
            (
                "bagit.txt/BagIt-Version",
                "Tag 'bagit.txt/BagIt-Version' has illegal value '1.0'. Allowed values are: 0.97",
            ),
        ] {
            assert_eq!(validator.errors[key], message, "failing on key `{key}`");
        }
        assert_eq!(validator.errors.len(), 7, "{}", validator.error_string());
        assert!(validator.error_string().contains("bag-info.txt/Title -> Required tag is missing"));
    }

    #[tokio::test]
    async fn tag_files() {
        let temp_directory = async_tempfile::TempDir::new().await.unwrap();
        let mut with_extra = profile();
        let mut tag = TagDefinition::new("custom/extra-info.txt", "Department");
        tag.user_value = "Special Collections".into();
        with_extra.tags.push(tag);
        let bag = make_bag(&temp_directory, "bag.tar", with_extra.clone(), EngineConfig::default()).await;

        for (allowed, output) in [
            (vec![], true),
            (vec!["*"], true),
            (vec!["custom/*"], true),
            (vec!["custom/*-info.txt", "other.txt"], true),
            (vec!["extra-info.txt"], false),
            (vec!["other.txt"], false),
        ] {
            let mut profile = with_extra.clone();
            profile.tag_files_allowed = allowed.iter().map(|s| s.to_string()).collect();
            let mut validator = Validator::new(&bag, profile);
            assert_eq!(scan_and_validate(&mut validator).await, output, "failing on input `{allowed:?}`");
            if !output {
                assert_eq!(
                    validator.errors["custom/extra-info.txt"],
                    "Tag file custom/extra-info.txt is not in the list of allowed tag files."
                );
            }
        }
    }

    #[tokio::test]
    async fn oxum_short_circuit() {
        let temp_directory = async_tempfile::TempDir::new().await.unwrap();
        let config = EngineConfig::from_toml_str("writer = \"filesystem\"").unwrap();
        let bag = make_bag(&temp_directory, "dir_bag", profile(), config).await;
        tokio::fs::write(bag.join("data/three.txt"), b"surprise").await.unwrap();

        let mut validator = Validator::new(&bag, profile());
        assert_eq!(validator.scan_bag().await, Err(ReadError::OxumMismatch));
        assert_eq!(validator.errors["Payload-Oxum"], "Payload-Oxum does not match payload");
        // Payload checksums were not computed
        assert!(validator
            .contents
            .payload_files
            .files
            .values()
            .all(|record| record.checksums().iter().all(|c| c.source() != crate::FileType::Payload)));

        let config = EngineConfig {
            ignore_oxum_mismatch: true,
            ..Default::default()
        };
        let mut validator = Validator::new(&bag, profile()).with_config(config);
        validator.scan_bag().await.unwrap();
        assert!(!validator.validate());
        assert_eq!(validator.errors["Payload-Oxum"], "Payload-Oxum does not match payload");
        assert_eq!(
            validator.errors["data/three.txt"],
            "file is missing from manifest-sha256.txt"
        );
    }

    #[tokio::test]
    async fn control_characters() {
        let temp_directory = async_tempfile::TempDir::new().await.unwrap();
        let config = EngineConfig::from_toml_str("writer = \"filesystem\"").unwrap();
        let bag = make_bag(&temp_directory, "dir_bag", profile(), config).await;

        let mut validator = Validator::new(&bag, profile());
        validator.scan_bag().await.unwrap();
        let record = validator.contents.payload_files.files["data/dir_bag_source/one.txt"].clone();
        validator
            .contents
            .payload_files
            .files
            .insert("data/bell\u{7}.txt".into(), record);

        for (policy, valid, warned) in [
            (ControlCharacterPolicy::Ignore, true, false),
            (ControlCharacterPolicy::Warn, true, true),
            (ControlCharacterPolicy::FailValidation, false, false),
        ] {
            validator.config.control_characters = policy;
            validator.errors.clear();
            validator.warnings.clear();
            // The fake entry has the digest of one.txt, only the oxum disagrees
            validator.validate();
            let failed = validator.errors.contains_key("File Names");
            assert_eq!(!failed, valid, "failing on input `{policy:?}`");
            assert_eq!(validator.warnings.contains_key("File Names"), warned, "failing on input `{policy:?}`");
        }
        assert!(validator.errors["File Names"].ends_with(" | data/bell\u{7}.txt"));
    }

    #[tokio::test]
    async fn unparsable_tag_file() {
        let temp_directory = async_tempfile::TempDir::new().await.unwrap();
        let config = EngineConfig::from_toml_str("writer = \"filesystem\"").unwrap();
        let bag = make_bag(&temp_directory, "dir_bag", profile(), config).await;
        tokio::fs::write(bag.join("notes.txt"), b"no colon on this line\n").await.unwrap();

        let mut validator = Validator::new(&bag, profile());
        assert!(scan_and_validate(&mut validator).await, "{}", validator.error_string());
        assert_eq!(validator.warnings["notes.txt"], "Tag file notes.txt could not be parsed.");

        let mut with_notes = profile();
        let mut tag = TagDefinition::new("notes.txt", "Note");
        tag.required = true;
        with_notes.tags.push(tag);
        let mut validator = Validator::new(&bag, with_notes);
        assert!(!scan_and_validate(&mut validator).await);
        assert_eq!(
            validator.errors.keys().collect::<Vec<_>>(),
            vec!["notes.txt"]
        );
    }

    #[tokio::test]
    async fn spaced_tag_label() {
        let temp_directory = async_tempfile::TempDir::new().await.unwrap();
        let mut with_note = profile();
        let mut tag = TagDefinition::new("bag-info.txt", "Internal Note");
        tag.required = true;
        tag.user_value = "hello".into();
        with_note.tags.push(tag);
        let config = EngineConfig::from_toml_str("writer = \"filesystem\"").unwrap();
        let bag = make_bag(&temp_directory, "dir_bag", with_note.clone(), config).await;

        let mut validator = Validator::new(&bag, with_note);
        assert!(scan_and_validate(&mut validator).await, "{}", validator.error_string());
        assert_eq!(validator.get_tags("bag-info.txt", "Internal Note")[0].value, "hello");
        assert_eq!(validator.get_tags("bag-info.txt", "Payload-Oxum")[0].value, "14.2");
        assert!(validator.warnings.is_empty(), "{:?}", validator.warnings);
    }

    #[tokio::test]
    async fn unsupported_algorithm() {
        let temp_directory = async_tempfile::TempDir::new().await.unwrap();
        let config = EngineConfig::from_toml_str("writer = \"filesystem\"").unwrap();
        let bag = make_bag(&temp_directory, "dir_bag", profile(), config).await;
        tokio::fs::write(bag.join("manifest-blake2b.txt"), b"abcd  data/dir_bag_source/one.txt\n")
            .await
            .unwrap();

        let mut allowing = profile();
        allowing.manifests_allowed.push("blake2b".into());
        let mut validator = Validator::new(&bag, allowing);
        assert!(!scan_and_validate(&mut validator).await);
        assert_eq!(
            validator.errors.keys().collect::<Vec<_>>(),
            vec!["manifest-blake2b.txt"]
        );
        assert_eq!(validator.errors["manifest-blake2b.txt"], "Unsupported digest algorithm");
    }

    #[tokio::test]
    async fn invalid_profile_and_missing_bag() {
        let temp_directory = async_tempfile::TempDir::new().await.unwrap();
        let mut validator = Validator::new(temp_directory.join("nope.tar"), profile());
        assert!(matches!(validator.scan_bag().await, Err(ReadError::Open { .. })));

        let mut invalid = profile();
        invalid.manifests_allowed.clear();
        let mut validator = Validator::new(temp_directory.join("nope.tar"), invalid);
        assert!(!validator.validate());
        assert_eq!(
            validator.errors["ManifestsAllowed"],
            "Profile must allow at least one manifest algorithm."
        );
    }
}
