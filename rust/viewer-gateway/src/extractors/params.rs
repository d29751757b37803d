use serde::{Deserialize, Deserializer};
use std::str::FromStr;

/// The query parameters accepted by every dataset endpoint. Empty values
/// are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct QueryParams {
    /// The dataset to read
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub dataset: Option<String>,
    /// The configuration, for config- and split-level endpoints
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub config: Option<String>,
    /// The split, for split-level endpoints
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub split: Option<String>,
}

// NOTE: Adapted from https://github.com/tokio-rs/axum/blob/7caa4a3a47a31c211d301f3afbc518ea2c07b4de/examples/query-params-with-empty-strings/src/main.rs#L42-L54
/// Serde deserialization decorator to map empty Strings to None,
fn empty_string_as_none<'de, D, T>(de: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let opt = Option::<String>::deserialize(de)?;
    match opt.as_deref() {
        None | Some("") => Ok(None),
        Some(s) => FromStr::from_str(s)
            .map_err(serde::de::Error::custom)
            .map(Some),
    }
}
