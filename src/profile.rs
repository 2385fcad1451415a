//! BagIt profiles, and their import from the BagIt Profiles and Library of Congress formats

mod convert;
mod loc;
mod standard;

pub use convert::{convert_profile, guess_profile_type, ProfileType};
pub use loc::{profile_from_loc_ordered, profile_from_loc_unordered, LocOrderedProfile, LocTagDef};
pub use standard::{StandardProfile, StandardProfileInfo, StandardProfileTagDef};

use crate::{
    tag::{
        BAGIT_TXT, BAG_INFO_TXT, KEY_BAG_SIZE, KEY_DATE, KEY_ENCODING, KEY_OXUM,
        KEY_PROFILE_IDENTIFIER, KEY_SOFTWARE, KEY_SOURCE_ORGANIZATION, KEY_VERSION,
    },
    util::null_as_default,
    ErrorMap, TagDefinition,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt::Display, path::Path};

/// BagIt versions accepted by a fresh profile
pub const DEFAULT_BAGIT_VERSIONS: [&str; 2] = ["0.97", "1.0"];

/// Serialization formats accepted by a fresh profile
pub const DEFAULT_SERIALIZATIONS: [&str; 1] = ["application/tar"];

/// Manifest algorithms allowed by a fresh profile
pub const DEFAULT_MANIFEST_ALGORITHMS: [&str; 4] = ["md5", "sha1", "sha256", "sha512"];

#[derive(thiserror::Error, Debug, PartialEq)]
/// Possible errors when loading or converting profiles
pub enum ProfileError {
    /// Failed to read the profile file
    #[error("Failed to read profile `{path}`: {kind}")]
    Read {
        /// Profile file
        path: std::path::PathBuf,
        /// Cause
        kind: std::io::ErrorKind,
    },
    /// Not valid JSON, or JSON of the wrong shape
    #[error("Invalid profile JSON: {0}")]
    Json(String),
    /// JSON does not look like any known profile format
    #[error("Cannot convert unrecognized BagIt profile type")]
    UnrecognizedProfileType,
}

impl From<serde_json::Error> for ProfileError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value.to_string())
    }
}

/// Whether a bag may, must or must not be serialized (tarred)
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Serialization {
    /// Bag must be a directory
    Forbidden,
    /// Bag may be a directory or a serialized file
    #[default]
    Optional,
    /// Bag must be a serialized file
    Required,
    /// Anything else found in a profile, which makes the profile invalid
    #[serde(untagged)]
    Other(String),
}

impl Serialization {
    /// Value used in profile JSON
    pub fn name(&self) -> &str {
        match self {
            Serialization::Forbidden => "forbidden",
            Serialization::Optional => "optional",
            Serialization::Required => "required",
            Serialization::Other(other) => other,
        }
    }
}

impl Display for Serialization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Who publishes a profile and how to reach them
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(missing_docs)]
pub struct ProfileInfo {
    pub bag_it_profile_identifier: String,
    pub bag_it_profile_version: String,
    pub contact_email: String,
    pub contact_name: String,
    pub external_description: String,
    pub source_organization: String,
    pub version: String,
}

/// Field of a [`TagDefinition`] to search on
#[derive(Clone, Copy, Debug, PartialEq)]
#[allow(missing_docs)]
pub enum TagProperty {
    DefaultValue,
    Id,
    TagFile,
    TagName,
    UserValue,
}

impl TagProperty {
    fn matches(self, tag: &TagDefinition, value: &str) -> bool {
        let field = match self {
            TagProperty::DefaultValue => &tag.default_value,
            TagProperty::Id => &tag.id,
            TagProperty::TagFile => &tag.tag_file,
            TagProperty::TagName => &tag.tag_name,
            TagProperty::UserValue => &tag.user_value,
        };
        field == value
    }
}

/// What a bag must look like: accepted BagIt versions, manifest algorithms, tag files, tags and
/// serialization
///
/// Profiles are plain values. [`Clone`] copies every [`TagDefinition`], so setting tag values on
/// a clone (which the [`Bagger`](crate::Bagger) does) never changes the original.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BagItProfile {
    /// UUID
    pub id: String,
    /// e.g. `["0.97", "1.0"]`
    #[serde(deserialize_with = "null_as_default")]
    pub accept_bag_it_version: Vec<String>,
    /// Mime types, e.g. `["application/tar"]`
    #[serde(deserialize_with = "null_as_default")]
    pub accept_serialization: Vec<String>,
    /// Bags may contain `fetch.txt`
    pub allow_fetch_txt: bool,
    /// Publisher details
    pub bag_it_profile_info: ProfileInfo,
    /// Profile this one was derived from
    pub base_profile_id: String,
    /// Free text
    pub description: String,
    /// Shipped with the application
    pub is_built_in: bool,
    /// Payload manifest algorithms a bag may have
    #[serde(deserialize_with = "null_as_default")]
    pub manifests_allowed: Vec<String>,
    /// Payload manifest algorithms a bag must have
    #[serde(deserialize_with = "null_as_default")]
    pub manifests_required: Vec<String>,
    /// Display name
    pub name: String,
    /// Whether bags may be tarred
    pub serialization: Serialization,
    /// Tag file name patterns, `*` is a wildcard
    #[serde(deserialize_with = "null_as_default")]
    pub tag_files_allowed: Vec<String>,
    /// Tag files a bag must have
    #[serde(deserialize_with = "null_as_default")]
    pub tag_files_required: Vec<String>,
    /// Tag manifest algorithms a bag may have
    #[serde(deserialize_with = "null_as_default")]
    pub tag_manifests_allowed: Vec<String>,
    /// Tag manifest algorithms a bag must have
    #[serde(deserialize_with = "null_as_default")]
    pub tag_manifests_required: Vec<String>,
    /// Rules for individual tags
    #[serde(deserialize_with = "null_as_default")]
    pub tags: Vec<TagDefinition>,
    /// Top level directory of a tarred bag must be named like the tar file
    pub tar_dir_must_match_name: bool,
}

impl BagItProfile {
    /// Fresh profile with a new id, the two `bagit.txt` tags and the RFC 8493 `bag-info.txt` tags
    pub fn new() -> Self {
        let mut tags = bagit_txt_tags();
        tags.extend(bag_info_txt_tags());

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            accept_bag_it_version: to_strings(&DEFAULT_BAGIT_VERSIONS),
            accept_serialization: to_strings(&DEFAULT_SERIALIZATIONS),
            manifests_allowed: to_strings(&DEFAULT_MANIFEST_ALGORITHMS),
            tag_manifests_allowed: to_strings(&DEFAULT_MANIFEST_ALGORITHMS),
            tags,
            ..Default::default()
        }
    }

    /// Copy of this profile under a new id, no longer built in
    pub fn copy_as_new(&self) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            is_built_in: false,
            ..self.clone()
        }
    }

    /// Parse native profile JSON
    pub fn from_json(json: &str) -> Result<Self, ProfileError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Native profile JSON
    pub fn to_json(&self) -> Result<String, ProfileError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read native profile JSON from a file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ProfileError> {
        let json = tokio::fs::read_to_string(path.as_ref())
            .await
            .map_err(|e| ProfileError::Read {
                path: path.as_ref().to_path_buf(),
                kind: e.kind(),
            })?;
        Self::from_json(&json)
    }

    /// Definition of a tag, matching the name exactly first, then ignoring case
    ///
    /// RFC 8493 section 2.2.2 says tag names are case-insensitive.
    pub fn get_tag_def(&self, tag_file: &str, tag_name: &str) -> Option<&TagDefinition> {
        let index = self.tag_def_index(tag_file, tag_name)?;
        self.tags.get(index)
    }

    /// Mutable version of [`BagItProfile::get_tag_def`]
    pub fn get_tag_def_mut(&mut self, tag_file: &str, tag_name: &str) -> Option<&mut TagDefinition> {
        let index = self.tag_def_index(tag_file, tag_name)?;
        self.tags.get_mut(index)
    }

    fn tag_def_index(&self, tag_file: &str, tag_name: &str) -> Option<usize> {
        let in_file = |tag: &&TagDefinition| tag.tag_file == tag_file;
        self.tags
            .iter()
            .position(|tag| in_file(&tag) && tag.tag_name == tag_name)
            .or_else(|| {
                self.tags
                    .iter()
                    .position(|tag| in_file(&tag) && tag.tag_name.eq_ignore_ascii_case(tag_name))
            })
    }

    /// Every tag definition whose `property` equals `value`
    pub fn find_matching_tags(&self, property: TagProperty, value: &str) -> Vec<&TagDefinition> {
        self.tags
            .iter()
            .filter(|tag| property.matches(tag, value))
            .collect()
    }

    /// First tag definition whose `property` equals `value`
    pub fn first_matching_tag(&self, property: TagProperty, value: &str) -> Option<&TagDefinition> {
        self.tags.iter().find(|tag| property.matches(tag, value))
    }

    /// At least one tag is defined for this tag file
    pub fn has_tag_file(&self, name: &str) -> bool {
        self.first_matching_tag(TagProperty::TagFile, name).is_some()
    }

    /// Sorted names of the tag files that have tag definitions
    ///
    /// A profile can require other tag files, but there is nothing to write in them.
    pub fn tag_file_names(&self) -> Vec<String> {
        self.tags
            .iter()
            .map(|tag| tag.tag_file.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Contents of a tag file, one `Label: value` line per tag definition
    ///
    /// Optional tags without a value are left out.
    pub fn get_tag_file_contents(&self, tag_file: &str) -> String {
        self.find_matching_tags(TagProperty::TagFile, tag_file)
            .into_iter()
            .filter(|tag| tag.required || !tag.get_value().trim().is_empty())
            .map(|tag| tag.to_formatted_string() + "\n")
            .collect()
    }

    /// Set the user value of a tag, adding the definition if the profile has none
    pub fn set_tag_value(&mut self, tag_file: &str, tag_name: &str, value: impl Into<String>) {
        match self.get_tag_def_mut(tag_file, tag_name) {
            Some(tag) => tag.user_value = value.into(),
            None => {
                let mut tag = TagDefinition::new(tag_file, tag_name);
                tag.user_value = value.into();
                self.tags.push(tag);
            }
        }
    }

    /// Check the profile itself, not a bag
    ///
    /// Every problem is reported at once, keyed by the offending field.
    pub fn validate(&self) -> Result<(), ErrorMap> {
        let mut errors = ErrorMap::new();
        let mut error = |key: &str, message: String| {
            errors.insert(key.to_string(), message);
        };

        if uuid::Uuid::parse_str(&self.id).is_err() {
            error("ID", "Profile ID is missing.".into());
        }
        if self.name.trim().is_empty() {
            error("Name", "Profile requires a name.".into());
        }
        if is_empty_list(&self.accept_bag_it_version) {
            error(
                "AcceptBagItVersion",
                "Profile must accept at least one BagIt version.".into(),
            );
        }
        if is_empty_list(&self.manifests_allowed) {
            error(
                "ManifestsAllowed",
                "Profile must allow at least one manifest algorithm.".into(),
            );
        }
        if !self.has_tag_file(BAGIT_TXT) {
            error(
                "BagIt",
                "Profile lacks requirements for bagit.txt tag file.".into(),
            );
        }
        if !self.has_tag_file(BAG_INFO_TXT) {
            error(
                "BagInfo",
                "Profile lacks requirements for bag-info.txt tag file.".into(),
            );
        }
        match self.serialization {
            Serialization::Other(_) => error(
                "Serialization",
                "Serialization must be one of: forbidden,optional,required.".into(),
            ),
            Serialization::Optional | Serialization::Required
                if is_empty_list(&self.accept_serialization) =>
            {
                error(
                    "AcceptSerialization",
                    "When serialization is allowed, you must specify at least one serialization format.".into(),
                )
            }
            _ => {}
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Fill in whatever an imported profile lacks to be usable
    ///
    /// Adds an id, default BagIt versions, manifest algorithms and serialization formats when
    /// missing, the `bagit.txt` tags, and the `bag-info.txt` tags set during bagging.
    /// Nothing already present is changed. The name is left alone.
    pub fn ensure_minimum_requirements(&mut self) {
        if uuid::Uuid::parse_str(&self.id).is_err() {
            self.id = uuid::Uuid::new_v4().to_string();
        }
        if is_empty_list(&self.accept_bag_it_version) {
            self.accept_bag_it_version = to_strings(&DEFAULT_BAGIT_VERSIONS);
        }
        if is_empty_list(&self.manifests_allowed) {
            self.manifests_allowed = if is_empty_list(&self.manifests_required) {
                to_strings(&DEFAULT_MANIFEST_ALGORITHMS)
            } else {
                self.manifests_required.clone()
            };
        }
        if let Serialization::Other(_) = self.serialization {
            self.serialization = Serialization::Optional;
        }
        if self.serialization != Serialization::Forbidden && is_empty_list(&self.accept_serialization) {
            self.accept_serialization = to_strings(&DEFAULT_SERIALIZATIONS);
        }

        for tag in bagit_txt_tags()
            .into_iter()
            .chain(bag_info_txt_tags().into_iter().filter(|tag| tag.system_must_set))
        {
            if self.get_tag_def(&tag.tag_file, &tag.tag_name).is_none() {
                self.tags.push(tag);
            }
        }
        for tag in self.tags.iter_mut().filter(|tag| tag.id.is_empty()) {
            tag.id = uuid::Uuid::new_v4().to_string();
        }
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

/// No entries, or only blank ones
fn is_empty_list(values: &[String]) -> bool {
    values.iter().all(|value| value.trim().is_empty())
}

fn built_in_tag(tag_file: &str, tag_name: &str) -> TagDefinition {
    TagDefinition {
        is_built_in: true,
        ..TagDefinition::new(tag_file, tag_name)
    }
}

fn bagit_txt_tags() -> Vec<TagDefinition> {
    vec![
        TagDefinition {
            required: true,
            default_value: "1.0".into(),
            values: to_strings(&DEFAULT_BAGIT_VERSIONS),
            help: "Which version of the BagIt specification describes this bag's format?".into(),
            ..built_in_tag(BAGIT_TXT, KEY_VERSION)
        },
        TagDefinition {
            required: true,
            default_value: "UTF-8".into(),
            help: "How are this bag's plain-text tag files encoded?".into(),
            ..built_in_tag(BAGIT_TXT, KEY_ENCODING)
        },
    ]
}

/// Reserved `bag-info.txt` tags from RFC 8493 section 2.2.2
fn bag_info_txt_tags() -> Vec<TagDefinition> {
    let optional = [
        KEY_SOURCE_ORGANIZATION,
        "Organization-Address",
        "Contact-Name",
        "Contact-Phone",
        "Contact-Email",
        "External-Description",
        "External-Identifier",
        "Bag-Group-Identifier",
        "Bag-Count",
        "Internal-Sender-Identifier",
        "Internal-Sender-Description",
    ]
    .into_iter()
    .map(|name| TagDefinition {
        empty_ok: true,
        ..built_in_tag(BAG_INFO_TXT, name)
    });

    let set_while_bagging = [
        KEY_DATE,
        KEY_SOFTWARE,
        KEY_OXUM,
        KEY_BAG_SIZE,
        KEY_PROFILE_IDENTIFIER,
    ]
    .into_iter()
    .map(|name| TagDefinition {
        empty_ok: true,
        system_must_set: true,
        ..built_in_tag(BAG_INFO_TXT, name)
    });

    optional.chain(set_while_bagging).collect()
}
