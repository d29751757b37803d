use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::{collections::BTreeSet, time::Duration};
use url::Url;

use super::{DatasetInspector, InspectError};

/// The configuration name of datasets that are not explicitly split into
/// configurations.
pub const DEFAULT_CONFIG: &str = "default";

const DATA_FILE_EXTENSIONS: &[&str] = &[
    "csv", "tsv", "json", "jsonl", "parquet", "txt", "arrow",
];
const COMPRESSION_EXTENSIONS: &[&str] = &["gz", "zip", "zst", "bz2", "xz"];

/// Known split names, in the order they are reported, each with the path
/// keywords that designate it.
const SPLIT_KEYWORDS: &[(&str, &[&str])] = &[
    ("train", &["train", "training"]),
    ("validation", &["validation", "valid", "val", "dev"]),
    ("test", &["test", "testing", "eval", "evaluation"]),
];

#[derive(Deserialize)]
struct DatasetInfo {
    #[serde(default)]
    siblings: Vec<Sibling>,
}

#[derive(Deserialize)]
struct Sibling {
    rfilename: String,
}

/// A [DatasetInspector] that reads the file listing of a dataset repository
/// from the Hub API and infers its splits from the data file names.
#[derive(Clone)]
pub struct HubInspector {
    client: reqwest::Client,
    hf_endpoint: Url,
}

impl HubInspector {
    /// Create an inspector for the Hub at `hf_endpoint`; every request is
    /// bounded by `timeout`.
    pub fn new(hf_endpoint: &Url, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(HubInspector {
            client,
            hf_endpoint: hf_endpoint.clone(),
        })
    }

    fn dataset_info_url(&self, dataset: &str) -> Url {
        let mut url = self.hf_endpoint.clone();
        url.set_path(&format!("/api/datasets/{dataset}"));
        url.set_query(None);
        url
    }
}

#[async_trait]
impl DatasetInspector for HubInspector {
    async fn get_split_names(
        &self,
        dataset: &str,
        config: &str,
        token: Option<&str>,
    ) -> Result<Vec<String>, InspectError> {
        let url = self.dataset_info_url(dataset);
        trace!("Listing files of {} at {}", dataset, url);

        let mut request = self.client.get(url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(anyhow::Error::from)?;

        match response.status() {
            StatusCode::OK => (),
            other_status => {
                return Err(anyhow!("Unexpected status code from the Hub: {}", other_status).into())
            }
        };

        let info: DatasetInfo = response.json().await.map_err(anyhow::Error::from)?;

        infer_split_names(
            config,
            info.siblings.iter().map(|sibling| sibling.rfilename.as_str()),
        )
    }
}

/// Infer the split names of `config` from the repository file paths in
/// `files`.
///
/// Only data files in the scope of the configuration are considered: every
/// data file for [DEFAULT_CONFIG], otherwise the files under `{config}/` or
/// `data/{config}/`. A file belongs to the split whose keyword appears in
/// its path closest to the file name. When no file carries a keyword, all
/// data belongs to a single `train` split.
pub fn infer_split_names<'a, I>(config: &str, files: I) -> Result<Vec<String>, InspectError>
where
    I: IntoIterator<Item = &'a str>,
{
    let data_files: Vec<&str> = files
        .into_iter()
        .filter(|path| is_data_file(path) && is_in_config_scope(config, path))
        .collect();

    if data_files.is_empty() {
        return Err(InspectError::EmptyDataset(format!(
            "no data files found for config '{config}'"
        )));
    }

    let found: BTreeSet<&str> = data_files
        .iter()
        .filter_map(|path| split_of(path))
        .collect();

    if found.is_empty() {
        return Ok(vec![SPLIT_KEYWORDS[0].0.to_owned()]);
    }

    Ok(SPLIT_KEYWORDS
        .iter()
        .map(|(split, _)| *split)
        .filter(|split| found.contains(split))
        .map(str::to_owned)
        .collect())
}

fn is_data_file(path: &str) -> bool {
    if path.split('/').any(|part| part.starts_with('.')) {
        return false;
    }

    let lowercase = path.to_lowercase();
    let mut parts: Vec<&str> = lowercase.rsplit('.').collect();
    // A path without any '.' has no extension at all
    if parts.len() < 2 {
        return false;
    }
    if COMPRESSION_EXTENSIONS.contains(&parts[0]) {
        parts.remove(0);
        if parts.len() < 2 {
            return false;
        }
    }
    DATA_FILE_EXTENSIONS.contains(&parts[0])
}

fn is_in_config_scope(config: &str, path: &str) -> bool {
    if config == DEFAULT_CONFIG {
        return true;
    }
    path.starts_with(&format!("{config}/")) || path.starts_with(&format!("data/{config}/"))
}

fn split_of(path: &str) -> Option<&'static str> {
    let lowercase = path.to_lowercase();
    lowercase
        .split(|c: char| !c.is_ascii_alphanumeric())
        .rev()
        .find_map(|token| {
            SPLIT_KEYWORDS
                .iter()
                .find(|(_, keywords)| keywords.contains(&token))
                .map(|(split, _)| *split)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Path, http::HeaderMap, routing::get, Json, Router};
    use serde_json::json;

    #[test]
    fn it_orders_inferred_splits_canonically() {
        let splits = infer_split_names(
            DEFAULT_CONFIG,
            [
                "README.md",
                "data/test-00000-of-00001.parquet",
                "data/train-00000-of-00002.parquet",
                "data/train-00001-of-00002.parquet",
                "data/dev.jsonl.gz",
            ],
        )
        .unwrap();

        assert_eq!(splits, vec!["train", "validation", "test"]);
    }

    #[test]
    fn it_defaults_to_a_single_train_split() {
        let splits = infer_split_names(DEFAULT_CONFIG, ["corpus.csv", "more/corpus.csv"]).unwrap();

        assert_eq!(splits, vec!["train"]);
    }

    #[test]
    fn it_scopes_files_to_the_requested_config() {
        let files = [
            "en/train.csv",
            "en/test.csv",
            "data/fr/train.csv",
            "de/validation.csv",
        ];

        assert_eq!(
            infer_split_names("en", files).unwrap(),
            vec!["train", "test"]
        );
        assert_eq!(infer_split_names("fr", files).unwrap(), vec!["train"]);
        assert!(matches!(
            infer_split_names("es", files),
            Err(InspectError::EmptyDataset(_))
        ));
    }

    #[test]
    fn it_reports_repositories_without_data_files_as_empty() {
        let result = infer_split_names(
            DEFAULT_CONFIG,
            [".gitattributes", "README.md", "script.py", ".cache/train.csv"],
        );

        assert!(matches!(result, Err(InspectError::EmptyDataset(_))));
    }

    #[tokio::test]
    async fn it_lists_files_from_the_hub_api() -> anyhow::Result<()> {
        let app = Router::new().route(
            "/api/datasets/:namespace/:name",
            get(
                |Path((namespace, name)): Path<(String, String)>, headers: HeaderMap| async move {
                    let authorized = headers
                        .get("authorization")
                        .and_then(|value| value.to_str().ok())
                        == Some("Bearer hf_token");
                    Json(json!({
                        "id": format!("{namespace}/{name}"),
                        "siblings": if authorized {
                            json!([
                                { "rfilename": "data/train.csv" },
                                { "rfilename": "data/test.csv" }
                            ])
                        } else {
                            json!([{ "rfilename": "README.md" }])
                        }
                    }))
                },
            ),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?;
        let server = tokio::spawn(async move { axum::serve(listener, app).await });

        let inspector = HubInspector::new(
            &Url::parse(&format!("http://{address}"))?,
            Duration::from_secs(5),
        )?;

        let splits = inspector
            .get_split_names("user/dataset", DEFAULT_CONFIG, Some("hf_token"))
            .await?;
        assert_eq!(splits, vec!["train", "test"]);

        let anonymous = inspector
            .get_split_names("user/dataset", DEFAULT_CONFIG, None)
            .await;
        assert!(matches!(anonymous, Err(InspectError::EmptyDataset(_))));

        let missing = inspector.get_split_names("unknown", DEFAULT_CONFIG, None).await;
        assert!(matches!(missing, Err(InspectError::Other(_))));

        server.abort();
        Ok(())
    }
}
