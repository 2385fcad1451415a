use super::{BagItProfile, ProfileError, ProfileInfo, Serialization};
use crate::{
    tag::{BAGIT_TXT, BAG_INFO_TXT},
    util::null_as_default,
    TagDefinition,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Profile in the format of the BagIt Profiles specification,
/// <https://bagit-profiles.github.io/bagit-profiles-specification/>
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct StandardProfile {
    #[serde(rename = "Accept-BagIt-Version", deserialize_with = "null_as_default")]
    pub accept_bagit_version: Vec<String>,
    #[serde(rename = "Accept-Serialization", deserialize_with = "null_as_default")]
    pub accept_serialization: Vec<String>,
    #[serde(rename = "Allow-Fetch.txt")]
    pub allow_fetch_txt: bool,
    #[serde(rename = "Serialization")]
    pub serialization: Serialization,
    #[serde(rename = "Manifests-Allowed", deserialize_with = "null_as_default")]
    pub manifests_allowed: Vec<String>,
    #[serde(rename = "Manifests-Required", deserialize_with = "null_as_default")]
    pub manifests_required: Vec<String>,
    #[serde(rename = "Tag-Manifests-Allowed", deserialize_with = "null_as_default")]
    pub tag_manifests_allowed: Vec<String>,
    #[serde(rename = "Tag-Manifests-Required", deserialize_with = "null_as_default")]
    pub tag_manifests_required: Vec<String>,
    #[serde(rename = "Tag-Files-Allowed", deserialize_with = "null_as_default")]
    pub tag_files_allowed: Vec<String>,
    #[serde(rename = "Tag-Files-Required", deserialize_with = "null_as_default")]
    pub tag_files_required: Vec<String>,
    #[serde(rename = "BagIt-Profile-Info")]
    pub bagit_profile_info: StandardProfileInfo,
    /// Only `bag-info.txt` tags can be described in this format
    #[serde(rename = "Bag-Info", deserialize_with = "null_as_default")]
    pub bag_info: BTreeMap<String, StandardProfileTagDef>,
}

/// `BagIt-Profile-Info` section
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct StandardProfileInfo {
    #[serde(rename = "BagIt-Profile-Identifier")]
    pub bagit_profile_identifier: String,
    #[serde(rename = "BagIt-Profile-Version")]
    pub bagit_profile_version: String,
    #[serde(rename = "Contact-Email")]
    pub contact_email: String,
    #[serde(rename = "Contact-Name")]
    pub contact_name: String,
    #[serde(rename = "External-Description")]
    pub external_description: String,
    #[serde(rename = "Source-Organization")]
    pub source_organization: String,
    #[serde(rename = "Version")]
    pub version: String,
}

/// Entry of the `Bag-Info` section
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct StandardProfileTagDef {
    pub required: bool,
    pub recommended: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub values: Vec<String>,
    pub description: String,
}

impl From<&StandardProfileInfo> for ProfileInfo {
    fn from(info: &StandardProfileInfo) -> Self {
        Self {
            bag_it_profile_identifier: info.bagit_profile_identifier.clone(),
            bag_it_profile_version: info.bagit_profile_version.clone(),
            contact_email: info.contact_email.clone(),
            contact_name: info.contact_name.clone(),
            external_description: info.external_description.clone(),
            source_organization: info.source_organization.clone(),
            version: info.version.clone(),
        }
    }
}

impl From<&ProfileInfo> for StandardProfileInfo {
    fn from(info: &ProfileInfo) -> Self {
        Self {
            bagit_profile_identifier: info.bag_it_profile_identifier.clone(),
            bagit_profile_version: info.bag_it_profile_version.clone(),
            contact_email: info.contact_email.clone(),
            contact_name: info.contact_name.clone(),
            external_description: info.external_description.clone(),
            source_organization: info.source_organization.clone(),
            version: info.version.clone(),
        }
    }
}

const RECOMMENDED: &str = "(Recommended)";

impl StandardProfile {
    /// Parse standard profile JSON
    pub fn from_json(json: &str) -> Result<Self, ProfileError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Standard profile JSON
    pub fn to_json(&self) -> Result<String, ProfileError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Native profile with a fresh id, holding only the `bag-info.txt` tags described here
    ///
    /// Call [`BagItProfile::ensure_minimum_requirements`] to add the `bagit.txt` tags.
    pub fn to_dart_profile(&self) -> BagItProfile {
        let info = &self.bagit_profile_info;
        let name = if info.source_organization.is_empty() {
            format!("Imported Profile - {}", super::convert::import_time())
        } else {
            format!("{} (version {})", info.source_organization, info.version)
        };

        let tags = self
            .bag_info
            .iter()
            .map(|(tag_name, def)| TagDefinition {
                required: def.required,
                empty_ok: !def.required,
                values: def.values.clone(),
                help: if def.recommended {
                    format!("{RECOMMENDED} {}", def.description)
                } else {
                    def.description.clone()
                },
                ..TagDefinition::new(BAG_INFO_TXT, tag_name)
            })
            .collect();

        BagItProfile {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            description: info.external_description.clone(),
            accept_bag_it_version: self.accept_bagit_version.clone(),
            accept_serialization: self.accept_serialization.clone(),
            allow_fetch_txt: self.allow_fetch_txt,
            bag_it_profile_info: info.into(),
            manifests_allowed: self.manifests_allowed.clone(),
            manifests_required: self.manifests_required.clone(),
            serialization: self.serialization.clone(),
            tag_files_allowed: self.tag_files_allowed.clone(),
            tag_files_required: self.tag_files_required.clone(),
            tag_manifests_allowed: self.tag_manifests_allowed.clone(),
            tag_manifests_required: self.tag_manifests_required.clone(),
            tags,
            ..Default::default()
        }
    }
}

impl BagItProfile {
    /// Same profile in the BagIt Profiles specification format
    ///
    /// `bagit.txt` tags are implied by that format and left out. Tags of other tag files cannot be
    /// described, but a required tag there makes its tag file required.
    pub fn to_standard_format(&self) -> StandardProfile {
        let mut standard = StandardProfile {
            accept_bagit_version: self.accept_bag_it_version.clone(),
            accept_serialization: self.accept_serialization.clone(),
            allow_fetch_txt: self.allow_fetch_txt,
            serialization: self.serialization.clone(),
            manifests_allowed: self.manifests_allowed.clone(),
            manifests_required: self.manifests_required.clone(),
            tag_manifests_allowed: self.tag_manifests_allowed.clone(),
            tag_manifests_required: self.tag_manifests_required.clone(),
            tag_files_allowed: self.tag_files_allowed.clone(),
            tag_files_required: self.tag_files_required.clone(),
            bagit_profile_info: (&self.bag_it_profile_info).into(),
            bag_info: BTreeMap::new(),
        };

        for tag in self.tags.iter().filter(|tag| tag.tag_file != BAGIT_TXT) {
            if tag.tag_file == BAG_INFO_TXT {
                standard.bag_info.insert(
                    tag.tag_name.clone(),
                    StandardProfileTagDef {
                        required: tag.required,
                        recommended: tag.help.contains("Recommended"),
                        values: tag.values.clone(),
                        description: tag.help.clone(),
                    },
                );
                continue;
            }

            if !tag.required {
                continue;
            }
            if !standard.tag_files_required.contains(&tag.tag_file) {
                standard.tag_files_required.push(tag.tag_file.clone());
            }
            let allowed = &mut standard.tag_files_allowed;
            if !allowed.is_empty() && !allowed.iter().any(|f| f == "*" || *f == tag.tag_file) {
                allowed.push(tag.tag_file.clone());
            }
        }

        standard
    }
}
