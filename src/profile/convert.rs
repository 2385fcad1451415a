use super::{
    loc::{profile_from_loc_ordered, profile_from_loc_unordered},
    BagItProfile, ProfileError, StandardProfile,
};
use serde_json::{Map, Value};
use std::fmt::Display;

/// Dialect of a profile JSON document
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProfileType {
    /// Native format, has a `tags` list
    Dart,
    /// BagIt Profiles specification, has a `Bag-Info` map
    Standard,
    /// Library of Congress, has an `ordered` list
    LocOrdered,
    /// Library of Congress, a map of tag definitions
    LocUnordered,
    /// None of the above
    Unknown,
}

impl ProfileType {
    /// Short name, e.g. `loc-ordered`
    pub fn name(&self) -> &'static str {
        match self {
            ProfileType::Dart => "dart",
            ProfileType::Standard => "standard",
            ProfileType::LocOrdered => "loc-ordered",
            ProfileType::LocUnordered => "loc-unordered",
            ProfileType::Unknown => "unknown",
        }
    }
}

impl Display for ProfileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Guess the dialect of a profile from the shape of its JSON
///
/// Fails only when `json` is not JSON at all. JSON that is not an object is [`ProfileType::Unknown`].
pub fn guess_profile_type(json: &str) -> Result<ProfileType, ProfileError> {
    let value: Value = serde_json::from_str(json)?;
    Ok(match value {
        Value::Object(map) => guess_from_object(&map),
        _ => ProfileType::Unknown,
    })
}

fn guess_from_object(map: &Map<String, Value>) -> ProfileType {
    if map.get("tags").is_some_and(Value::is_array) {
        ProfileType::Dart
    } else if map.get("ordered").is_some_and(Value::is_array) {
        ProfileType::LocOrdered
    } else if map.get("Bag-Info").is_some_and(Value::is_object) {
        ProfileType::Standard
    } else if !map.is_empty() && map.values().all(is_loc_tag_def) {
        ProfileType::LocUnordered
    } else {
        ProfileType::Unknown
    }
}

fn is_loc_tag_def(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|def| def.contains_key("fieldRequired") || def.contains_key("requiredValue"))
}

/// Import a profile of any known dialect as a usable native profile
///
/// `source_url` names where the profile came from, it only shows up in the names of imported
/// Library of Congress profiles.
pub fn convert_profile(json: &str, source_url: &str) -> Result<BagItProfile, ProfileError> {
    let profile_type = guess_profile_type(json)?;
    tracing::debug!(%profile_type, source_url, "converting profile");

    let mut profile = match profile_type {
        ProfileType::Dart => BagItProfile::from_json(json)?,
        ProfileType::Standard => StandardProfile::from_json(json)?.to_dart_profile(),
        ProfileType::LocOrdered => profile_from_loc_ordered(json, source_url)?,
        ProfileType::LocUnordered => profile_from_loc_unordered(json, source_url)?,
        ProfileType::Unknown => return Err(ProfileError::UnrecognizedProfileType),
    };
    profile.ensure_minimum_requirements();
    Ok(profile)
}

/// Timestamp used in the names of imported profiles
pub(super) fn import_time() -> String {
    jiff::Timestamp::now().strftime("%b %d %H:%M:%S").to_string()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tag::{BAGIT_TXT, BAG_INFO_TXT, KEY_VERSION};

    #[test]
    fn guess() {
        for (input, output) in [
            (r#"{"name": "x", "tags": []}"#, ProfileType::Dart),
            (r#"{"ordered": [{"Tag": {"fieldRequired": true}}]}"#, ProfileType::LocOrdered),
            (r#"{"Bag-Info": {}, "Serialization": "optional"}"#, ProfileType::Standard),
            (
                r#"{"Tag-One": {"fieldRequired": true}, "Tag-Two": {"requiredValue": "x"}}"#,
                ProfileType::LocUnordered,
            ),
            (r#"{"Tag-One": {"fieldRequired": true}, "name": "x"}"#, ProfileType::Unknown),
            (r#"{"tags": "not a list"}"#, ProfileType::Unknown),
            ("{}", ProfileType::Unknown),
            ("[1, 2]", ProfileType::Unknown),
        ] {
            assert_eq!(guess_profile_type(input), Ok(output), "failing on input `{input}`");
        }
        assert!(matches!(guess_profile_type("{"), Err(ProfileError::Json(_))));
    }

    #[test]
    fn convert() {
        let profile = convert_profile(
            r#"{"Bag-Info": {"Source-Organization": {"required": true}},
                "BagIt-Profile-Info": {"Source-Organization": "Example", "Version": "2"}}"#,
            "",
        )
        .unwrap();
        assert_eq!(profile.name, "Example (version 2)");
        assert!(profile.get_tag_def(BAGIT_TXT, KEY_VERSION).is_some());
        assert!(profile.get_tag_def(BAG_INFO_TXT, "Source-Organization").unwrap().required);
        assert_eq!(profile.validate(), Ok(()));

        let profile = convert_profile(r#"{"Access": {"requiredValue": "Public"}}"#, "").unwrap();
        assert_eq!(profile.validate(), Ok(()));

        let native = BagItProfile {
            name: "Native".into(),
            ..BagItProfile::new()
        };
        let converted = convert_profile(&native.to_json().unwrap(), "").unwrap();
        assert_eq!(converted, native);

        assert_eq!(
            convert_profile(r#"{"name": "x"}"#, ""),
            Err(ProfileError::UnrecognizedProfileType)
        );
    }
}
