//! Tags found in `bagit.txt`, `bag-info.txt` and other tag files

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// `bagit.txt`: version of the BagIt format
pub const KEY_VERSION: &str = "BagIt-Version";
/// `bagit.txt`: encoding of every tag file
pub const KEY_ENCODING: &str = "Tag-File-Character-Encoding";
/// `bag-info.txt`: when the bag was made
pub const KEY_DATE: &str = "Bagging-Date";
/// `bag-info.txt`: `<payload bytes>.<payload file count>`
pub const KEY_OXUM: &str = "Payload-Oxum";
/// `bag-info.txt`: name and version of the bagging tool
pub const KEY_SOFTWARE: &str = "Bagging-Software";
/// `bag-info.txt`: payload size for humans, e.g. `1.2 MB`
pub const KEY_BAG_SIZE: &str = "Bag-Size";
/// `bag-info.txt`: profile the bag claims to conform to
pub const KEY_PROFILE_IDENTIFIER: &str = "BagIt-Profile-Identifier";
/// `bag-info.txt`
pub const KEY_SOURCE_ORGANIZATION: &str = "Source-Organization";

/// Bag declaration
pub const BAGIT_TXT: &str = "bagit.txt";
/// Bag metadata
pub const BAG_INFO_TXT: &str = "bag-info.txt";

/// A `Label: value` pair read from a tag file
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    /// Path of the tag file relative to the bag root, e.g. `bag-info.txt`
    pub tag_file: String,
    /// Label
    pub tag_name: String,
    /// Value, continuation lines joined with a single space
    pub value: String,
}

impl Tag {
    /// New tag read from `tag_file`
    pub fn new(tag_file: impl Into<String>, tag_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            tag_file: tag_file.into(),
            tag_name: tag_name.into(),
            value: value.into(),
        }
    }

    /// `bag-info.txt/Source-Organization`
    pub fn fully_qualified_name(&self) -> String {
        format!("{}/{}", self.tag_file, self.tag_name)
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.tag_name, self.value)
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
/// A tag file that cannot be read as `Label: value` lines
pub enum TagParseError {
    /// Not a label line, and not a continuation of one
    #[error("Unable to parse tag data in {file} line '{line}'")]
    Format {
        /// Tag file
        file: String,
        /// Offending line
        line: String,
    },
    /// Failed to read the file, including invalid UTF-8
    #[error("Error reading tag file '{file}': {kind}")]
    Read {
        /// Tag file
        file: String,
        /// Cause
        kind: std::io::ErrorKind,
    },
}

/// Parse a tag file
///
/// `path_in_bag` is stored in every returned [`Tag`]. Blank lines are skipped, lines starting
/// with whitespace continue the value of the previous tag. The same label can appear more than once.
pub async fn parse_tag_file<R: AsyncBufRead + Unpin>(
    reader: R,
    path_in_bag: &str,
) -> Result<Vec<Tag>, TagParseError> {
    let mut lines = reader.lines();
    let mut tags: Vec<Tag> = Vec::new();

    while let Some(line) = lines.next_line().await.map_err(|e| TagParseError::Read {
        file: path_in_bag.to_string(),
        kind: e.kind(),
    })? {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        if line.starts_with(char::is_whitespace) {
            if let Some(tag) = tags.last_mut() {
                tag.value.push(' ');
                tag.value.push_str(line.trim());
                continue;
            }
        } else if let Some((label, value)) = line.split_once(':') {
            // Label ends at the first colon, inner whitespace is allowed
            let label = label.trim_end();
            if !label.is_empty() {
                tags.push(Tag::new(path_in_bag, label, value.trim()));
                continue;
            }
        }

        return Err(TagParseError::Format {
            file: path_in_bag.to_string(),
            line: line.to_string(),
        });
    }

    Ok(tags)
}
