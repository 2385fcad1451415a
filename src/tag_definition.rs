use crate::util::null_as_default;
use serde::{Deserialize, Serialize};

/// Rules for one tag in a [`BagItProfile`](crate::BagItProfile): where it lives, whether it is
/// required, which values are legal, and the value to write when bagging
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TagDefinition {
    /// Written when the user did not supply a value
    pub default_value: String,
    /// A required tag may be present with an empty value
    #[serde(rename = "emptyOK")]
    pub empty_ok: bool,
    /// What the tag means, shown to users
    pub help: String,
    /// UUID
    pub id: String,
    /// Shipped with a built-in profile
    pub is_built_in: bool,
    /// Bag is invalid without this tag
    pub required: bool,
    /// Value is computed during bagging, e.g. `Payload-Oxum`
    pub system_must_set: bool,
    /// Tag file holding this tag, e.g. `bag-info.txt`
    pub tag_file: String,
    /// Label
    pub tag_name: String,
    /// Value supplied by the user, wins over `default_value`
    pub user_value: String,
    /// Legal values, empty means any value is legal
    #[serde(deserialize_with = "null_as_default")]
    pub values: Vec<String>,
}

impl TagDefinition {
    /// Optional tag with a fresh id and no constraints
    pub fn new(tag_file: impl Into<String>, tag_name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tag_file: tag_file.into(),
            tag_name: tag_name.into(),
            ..Default::default()
        }
    }

    /// `value` is one of the allowed values, or there are no allowed values to check against
    pub fn is_legal_value(&self, value: &str) -> bool {
        self.values.is_empty() || self.values.iter().any(|allowed| allowed == value)
    }

    /// User value when set, default value otherwise
    pub fn get_value(&self) -> &str {
        if self.user_value.is_empty() {
            &self.default_value
        } else {
            &self.user_value
        }
    }

    /// `Label: value` on a single line, as written in a tag file
    ///
    /// Runs of whitespace, newlines included, become a single space. Lines are not wrapped.
    pub fn to_formatted_string(&self) -> String {
        let value = self.get_value().split_whitespace().collect::<Vec<_>>().join(" ");
        format!("{}: {}", self.tag_name, value)
    }

    /// `bag-info.txt/Source-Organization`
    pub fn fully_qualified_name(&self) -> String {
        format!("{}/{}", self.tag_file, self.tag_name)
    }
}

#[cfg(test)]
mod test {
    use super::TagDefinition;

    #[test]
    fn legal_values() {
        let mut tag = TagDefinition::new("bag-info.txt", "Access");
        assert!(tag.is_legal_value("anything at all"));
        assert!(tag.is_legal_value(""));

        tag.values = vec!["A".into(), "B".into()];
        for (input, output) in [("A", true), ("B", true), ("C", false), ("a", false), ("", false)] {
            assert_eq!(tag.is_legal_value(input), output, "failing on input `{input}`");
        }
    }

    #[test]
    fn value_and_formatting() {
        let mut tag = TagDefinition::new("bag-info.txt", "External-Description");
        tag.default_value = "default".into();
        assert_eq!(tag.get_value(), "default");
        assert_eq!(tag.to_formatted_string(), "External-Description: default");

        tag.user_value = "  A description\nspanning\r\n\tlines  ".into();
        assert_eq!(tag.get_value(), "  A description\nspanning\r\n\tlines  ");
        assert_eq!(
            tag.to_formatted_string(),
            "External-Description: A description spanning lines"
        );
        assert_eq!(tag.fully_qualified_name(), "bag-info.txt/External-Description");
    }

    #[test]
    fn json() {
        let json = r#"{
            "id": "1e2ee9c6-1bcf-4a36-a0d5-1e7a9d0c9cc4",
            "tagFile": "bag-info.txt",
            "tagName": "Source-Organization",
            "required": true,
            "emptyOK": false,
            "values": null,
            "defaultValue": "",
            "userValue": "",
            "help": "",
            "isBuiltIn": true
        }"#;
        let tag: TagDefinition = serde_json::from_str(json).unwrap();
        assert!(tag.required);
        assert!(tag.is_built_in);
        assert!(!tag.system_must_set);
        assert!(tag.values.is_empty());

        let back: TagDefinition = serde_json::from_str(&serde_json::to_string(&tag).unwrap()).unwrap();
        assert_eq!(back, tag);
        assert!(serde_json::to_string(&tag).unwrap().contains("\"emptyOK\":false"));
    }
}
