#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))] // https://stackoverflow.com/a/61417700/4809297

/*!

Rust library to package files into BagIt containers and to validate existing bags against a
BagIt profile, with the [Tokio async runtime](https://docs.rs/tokio).

# Learn about BagIt

Here are some resources to get started with BagIt containers:

- The [Wikipedia article](https://en.wikipedia.org/wiki/BagIt) to get started with the format or to get a brief explanation
- The spec of the container format: [RFC 8493](https://datatracker.ietf.org/doc/html/rfc8493)
- The [BagIt Profiles specification](https://bagit-profiles.github.io/bagit-profiles-specification/), describing what a bag must contain to be accepted by a repository

Bags can be written as a plain directory or as a single tar file. Checksums are computed with
md5, sha1, sha224, sha256, sha384 or sha512 while files are written or read, so every file is
read once.

## Create a bag

```no_run
use async_bagger::{BagItProfile, Bagger, SourceFile};

# #[tokio::main]
# async fn main() -> Result<(), Box<dyn std::error::Error>> {
// Which tags, manifests and serialization the bag must have
let profile = BagItProfile::load("/somewhere/profiles/my_repository.json").await?;

// Directories are added with everything below them
let files = SourceFile::list_recursive("/somewhere/photos").await?;

// Written as a tar file, unless `EngineConfig::writer` asks for a plain directory
let mut bagger = Bagger::new("/somewhere/bags/photos.tar", profile, files);
if !bagger.run().await {
    for (key, message) in &bagger.errors {
        eprintln!("{key}: {message}");
    }
}

# Ok(())
# }
```

## Validate a bag

```no_run
use async_bagger::{BagItProfile, Validator};

# #[tokio::main]
# async fn main() -> Result<(), Box<dyn std::error::Error>> {
let profile = BagItProfile::load("/somewhere/profiles/my_repository.json").await?;

let mut validator = Validator::new("/somewhere/bags/photos.tar", profile);
validator.scan_bag().await?;

// This bag is complete and valid! You can use its files knowing their data is safe to use.
assert!(validator.validate(), "{}", validator.error_string());

# Ok(())
# }
```

Both [`Bagger`] and [`Validator`] report their progress to an optional [`ProgressSink`], such as
the sending half of a channel of [`EventMessage`]s.

*/

mod algorithm;
mod bagger;
mod checksum;
mod config;
mod file_map;
mod file_record;
mod progress;
mod source_file;
mod tag_definition;
mod validator;

pub mod manifest;
pub mod profile;
pub mod reader;
pub mod tag;
pub mod util;
pub mod writer;

/// Possible errors when manipulating BagIt containers
pub mod error {
    pub use crate::checksum::ChecksumComputeError;
    pub use crate::config::ConfigError;
    pub use crate::file_record::FileRecordError;
    pub use crate::manifest::ManifestError;
    pub use crate::profile::ProfileError;
    pub use crate::reader::ReadError;
    pub use crate::tag::TagParseError;
    pub use crate::writer::WriteError;
}

pub use algorithm::{Algorithm, DigestMap, PREFERRED_ALGORITHMS};
pub use bagger::Bagger;
pub use checksum::{Checksum, FileType};
pub use config::{ControlCharacterPolicy, EngineConfig, UNSPECIFIED_PROFILE_IDENTIFIER};
pub use file_map::{FileMap, MAX_ERRORS};
pub use file_record::FileRecord;
pub use profile::BagItProfile;
pub use progress::{EventMessage, EventType, ProgressSink, Stage};
pub use source_file::SourceFile;
pub use tag::Tag;
pub use tag_definition::TagDefinition;
pub use validator::Validator;

/// Messages describing what is wrong, keyed by file name, tag name or step
///
/// Sorted, so reports are stable from one run to the next.
pub type ErrorMap = std::collections::BTreeMap<String, String>;
