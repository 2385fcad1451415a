use super::{convert::import_time, BagItProfile, ProfileError, TagProperty};
use crate::{tag::BAG_INFO_TXT, util::null_as_default, TagDefinition};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Tag of a Library of Congress profile
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocTagDef {
    /// `fieldRequired`
    #[serde(rename = "fieldRequired")]
    pub required: bool,
    /// `defaultValue`
    pub default_value: String,
    /// `valueList`
    #[serde(rename = "valueList", deserialize_with = "null_as_default")]
    pub values: Vec<String>,
    /// Only legal value, makes the tag required
    pub required_value: String,
}

/// Library of Congress profile keeping tag order: a list of single entry maps
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct LocOrderedProfile {
    /// `{"Tag-Name": {...}}` items
    #[serde(deserialize_with = "null_as_default")]
    pub ordered: Vec<BTreeMap<String, LocTagDef>>,
}

/// Convert an ordered Library of Congress profile, all tags go to `bag-info.txt`
pub fn profile_from_loc_ordered(json: &str, source_url: &str) -> Result<BagItProfile, ProfileError> {
    let loc: LocOrderedProfile = serde_json::from_str(json)?;
    let mut profile = loc_base_profile(source_url);
    for (tag_name, def) in loc.ordered.iter().flatten() {
        convert_loc_tag(&mut profile, tag_name, def);
    }
    Ok(profile)
}

/// Convert an unordered Library of Congress profile, a map of tag name to definition
pub fn profile_from_loc_unordered(json: &str, source_url: &str) -> Result<BagItProfile, ProfileError> {
    let loc: BTreeMap<String, LocTagDef> = serde_json::from_str(json)?;
    let mut profile = loc_base_profile(source_url);
    for (tag_name, def) in &loc {
        convert_loc_tag(&mut profile, tag_name, def);
    }
    Ok(profile)
}

fn loc_base_profile(source_url: &str) -> BagItProfile {
    let name = if source_url.is_empty() {
        format!("Imported Profile {}", import_time())
    } else {
        format!("Profile imported from {source_url} ({})", import_time())
    };
    BagItProfile {
        name,
        ..BagItProfile::new()
    }
}

/// Merge into the `bag-info.txt` definition of the same name, or add one
fn convert_loc_tag(profile: &mut BagItProfile, tag_name: &str, def: &LocTagDef) {
    let existing = profile
        .find_matching_tags(TagProperty::TagName, tag_name)
        .iter()
        .any(|tag| tag.tag_file == BAG_INFO_TXT);
    if !existing {
        profile.tags.push(TagDefinition::new(BAG_INFO_TXT, tag_name));
    }
    let Some(tag) = profile.get_tag_def_mut(BAG_INFO_TXT, tag_name) else {
        return;
    };

    tag.required = def.required;
    tag.default_value = def.default_value.clone();
    tag.values = def.values.clone();
    if !def.required_value.is_empty() {
        tag.required = true;
        tag.values = vec![def.required_value.clone()];
        tag.default_value = def.required_value.clone();
    }
    tag.empty_ok = !tag.required;
}
