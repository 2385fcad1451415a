//! Helpers for bag names, paths in tar files and sizes

use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};

/// JSON written by other tools sometimes has `null` where a list is expected
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[derive(thiserror::Error, Debug, PartialEq)]
#[error("Unknown serialization type {0}")]
/// Mime type not listed in [`has_valid_extension_for_mime_type`]
pub struct UnknownSerialization(pub String);

/// Whether `file_name` has the extension expected for a serialized bag of `mime_type`
pub fn has_valid_extension_for_mime_type(
    file_name: &str,
    mime_type: &str,
) -> Result<bool, UnknownSerialization> {
    let lowercase = file_name.to_ascii_lowercase();
    let extension = Path::new(&lowercase)
        .extension()
        .and_then(|extension| extension.to_str())
        .unwrap_or_default();

    Ok(match mime_type {
        "application/x-7z-compressed" => extension == "7z",
        "application/tar" | "application/x-tar" => extension == "tar",
        "application/zip" => extension == "zip",
        "application/gzip" => extension == "gz" || extension == "gzip",
        "application/x-rar-compressed" => extension == "rar",
        "application/tar+gzip" => extension == "tgz" || lowercase.ends_with(".tar.gz"),
        other => return Err(UnknownSerialization(other.to_string())),
    })
}

/// Strip the top level directory of a tarred bag: `bag_name/data/file.txt` becomes `data/file.txt`
///
/// Returns `None` when there is no top level directory to strip.
pub fn tar_path_to_bag_path(name: &str) -> Option<&str> {
    name.split_once('/')
        .map(|(_, path_in_bag)| path_in_bag)
        .filter(|path_in_bag| !path_in_bag.is_empty())
}

/// Bag name without serialization or multipart suffix
///
/// ```
/// use async_bagger::util::clean_bag_name;
///
/// assert_eq!(clean_bag_name("photos.b01.of12.tar"), "photos");
/// assert_eq!(clean_bag_name("photos.tar.gz"), "photos");
/// ```
pub fn clean_bag_name(bag_name: &str) -> &str {
    let name = bag_name
        .strip_suffix(".tar")
        .or_else(|| bag_name.strip_suffix(".tar.gz"))
        .unwrap_or(bag_name);
    strip_multipart_suffix(name).unwrap_or(name)
}

/// `name.b01.of12` -> `name`
fn strip_multipart_suffix(name: &str) -> Option<&str> {
    let is_number = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    let (rest, total) = name.rsplit_once(".of")?;
    let (base, part) = rest.rsplit_once(".b")?;
    (is_number(total) && is_number(part)).then_some(base)
}

/// Deepest directory holding every path, so `/home/me/photos/a.jpg` and
/// `/home/me/photos/2024/b.jpg` share `/home/me/photos`
///
/// Payload paths are made relative to this directory. A directory listed among `paths` keeps its
/// own name: bagging `/home/me/photos` and its contents gives `/home/me`.
pub fn find_common_prefix<P: AsRef<Path>>(paths: &[P]) -> PathBuf {
    let mut parents = paths
        .iter()
        .map(|path| path.as_ref().parent().unwrap_or(Path::new("")));

    let Some(first) = parents.next() else {
        return PathBuf::new();
    };
    let mut common: Vec<_> = first.components().collect();
    for parent in parents {
        let shared = common
            .iter()
            .zip(parent.components())
            .take_while(|(a, b)| *a == b)
            .count();
        common.truncate(shared);
    }

    common.into_iter().collect()
}

/// Size for humans, 1024 based: `512 B`, `1.5 kB`, `3.0 GB`
pub fn to_human_size(size: u64) -> String {
    const UNIT: u64 = 1024;
    if size < UNIT {
        return format!("{size} B");
    }

    let mut divisor = UNIT;
    let mut exponent = 0;
    let mut n = size / UNIT;
    while n >= UNIT {
        divisor *= UNIT;
        exponent += 1;
        n /= UNIT;
    }
    let prefix = ['k', 'M', 'G', 'T', 'P', 'E'][exponent];
    format!("{:.1} {prefix}B", size as f64 / divisor as f64)
}
