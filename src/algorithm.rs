use digest::DynDigest;
use std::{collections::BTreeMap, fmt::Display};

/// Digests keyed by the algorithm that produced them, e.g. `md5 -> "0987654321"`
pub type DigestMap = BTreeMap<Algorithm, String>;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// Digest algorithms that can appear in manifest names
///
/// Taken from <https://www.iana.org/assignments/named-information/named-information.xhtml>,
/// restricted to the ones BagIt tools commonly produce.
pub enum Algorithm {
    /// `md5`
    Md5,
    /// `sha1`
    Sha1,
    /// `sha224`
    Sha224,
    /// `sha256`
    Sha256,
    /// `sha384`
    Sha384,
    /// `sha512`
    Sha512,
    /// Any other name found in a profile or a manifest file name. These cannot be computed.
    Custom(String),
}

/// When a profile does not say which algorithm to use, pick the first of these it allows.
///
/// Mirrors the Library of Congress recommendation, sha512 first.
pub const PREFERRED_ALGORITHMS: [Algorithm; 4] = [
    Algorithm::Sha512,
    Algorithm::Sha256,
    Algorithm::Md5,
    Algorithm::Sha1,
];

impl Algorithm {
    /// Name used in manifest file names, e.g. `sha256` in `manifest-sha256.txt`
    pub fn name(&self) -> &str {
        match self {
            Algorithm::Md5 => "md5",
            Algorithm::Sha1 => "sha1",
            Algorithm::Sha224 => "sha224",
            Algorithm::Sha256 => "sha256",
            Algorithm::Sha384 => "sha384",
            Algorithm::Sha512 => "sha512",
            Algorithm::Custom(x) => x,
        }
    }

    /// Fresh hasher for this algorithm, `None` for [`Algorithm::Custom`]
    pub fn hasher(&self) -> Option<Box<dyn DynDigest + Send>> {
        let hasher: Box<dyn DynDigest + Send> = match self {
            Algorithm::Md5 => Box::new(md5::Md5::default()),
            Algorithm::Sha1 => Box::new(sha1::Sha1::default()),
            Algorithm::Sha224 => Box::new(sha2::Sha224::default()),
            Algorithm::Sha256 => Box::new(sha2::Sha256::default()),
            Algorithm::Sha384 => Box::new(sha2::Sha384::default()),
            Algorithm::Sha512 => Box::new(sha2::Sha512::default()),
            Algorithm::Custom(_) => return None,
        };
        Some(hasher)
    }

    /// Parse a list of names as they appear in a BagIt profile
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Vec<Self> {
        names.iter().map(|name| Self::from(name.as_ref())).collect()
    }
}

impl From<&str> for Algorithm {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "md5" => Algorithm::Md5,
            "sha1" => Algorithm::Sha1,
            "sha224" => Algorithm::Sha224,
            "sha256" => Algorithm::Sha256,
            "sha384" => Algorithm::Sha384,
            "sha512" => Algorithm::Sha512,
            other => Algorithm::Custom(other.to_string()),
        }
    }
}

impl Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod test {
    use super::Algorithm;

    #[test]
    fn names() {
        for (input, output) in [
            ("md5", Algorithm::Md5),
            ("SHA256", Algorithm::Sha256),
            (" sha512 ", Algorithm::Sha512),
            ("blake3", Algorithm::Custom("blake3".into())),
        ] {
            assert_eq!(Algorithm::from(input), output, "failing on input `{input}`");
        }
        assert_eq!(Algorithm::Sha1.to_string(), "sha1");
        assert_eq!(Algorithm::Custom("blake3".into()).to_string(), "blake3");
    }

    #[test]
    fn custom_algorithms_have_no_hasher() {
        assert!(Algorithm::Sha384.hasher().is_some());
        assert!(Algorithm::Custom("blake2b".into()).hasher().is_none());
    }
}
