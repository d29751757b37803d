use serde::{Deserialize, Serialize};
use std::{fmt::Display, hash::Hash, ops::Deref};

/// A helper to stamp out trait implementations that promote coherence between
/// Rust strings and a given wrapper type
macro_rules! string_coherent {
    ($wrapper:ty) => {
        impl Deref for $wrapper {
            type Target = String;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl Hash for $wrapper {
            fn hash<H>(&self, hasher: &mut H)
            where
                H: std::hash::Hasher,
            {
                Hash::hash(&self.0, hasher)
            }
        }

        impl From<&str> for $wrapper {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $wrapper {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<$wrapper> for String {
            fn from(value: $wrapper) -> Self {
                value.0
            }
        }

        impl<'a> From<&'a $wrapper> for &'a str {
            fn from(value: &'a $wrapper) -> Self {
                &value.0
            }
        }

        impl PartialEq<str> for $wrapper {
            fn eq(&self, other: &str) -> bool {
                &self.0 == other
            }
        }

        impl PartialEq<&str> for $wrapper {
            fn eq(&self, other: &&str) -> bool {
                &self.0 == *other
            }
        }

        impl PartialEq for $wrapper {
            fn eq(&self, other: &Self) -> bool {
                self.0 == other.0
            }
        }

        impl Eq for $wrapper {}

        impl Display for $wrapper {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                Display::fmt(&self.0, f)
            }
        }
    };
}

/// The stable identifier of a kind of computation, e.g.
/// `/split-names-from-streaming`. Job types are unique across runner
/// implementations.
#[repr(transparent)]
#[derive(Default, Clone, Debug, Serialize, Deserialize, PartialOrd, Ord)]
pub struct JobType(pub String);

string_coherent!(JobType);

/// The version of a runner's output. It is bumped whenever the meaning or
/// the shape of the content produced by the runner changes, and cached
/// entries are only reused when their version matches exactly.
#[repr(transparent)]
#[derive(Default, Clone, Debug, Serialize, Deserialize, PartialOrd, Ord)]
pub struct JobVersion(pub String);

string_coherent!(JobVersion);

#[cfg(test)]
mod tests {
    use super::{JobType, JobVersion};
    use serde_json::json;

    #[test]
    fn it_serializes_a_job_type_transparently_as_a_string() {
        let job_type = JobType::from("/split-names-from-streaming");

        assert_eq!(
            serde_json::to_value(&job_type).ok(),
            Some(json!("/split-names-from-streaming"))
        );
        assert_eq!(job_type, "/split-names-from-streaming");
    }

    #[test]
    fn it_compares_versions_by_exact_value() {
        assert_eq!(JobVersion::from("1.0.0"), JobVersion::from("1.0.0"));
        assert_ne!(JobVersion::from("1.0.0"), JobVersion::from("1.0.1"));
    }
}
