use serde::{Deserialize, Serialize};
use std::fmt::Display;
use strum_macros::{AsRefStr, Display as StrumDisplay, EnumString};

use crate::data::{JobType, SplitFullName};

/// The granularity a job type (or a public endpoint) works at, i.e. which
/// parameters it requires on top of the dataset.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    StrumDisplay,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum InputType {
    /// Only `dataset` is required
    Dataset,
    /// `dataset` and `config` are required
    Config,
    /// `dataset`, `config` and `split` are required
    Split,
}

impl InputType {
    /// Whether a `config` parameter is required at this granularity
    pub fn requires_config(&self) -> bool {
        matches!(self, InputType::Config | InputType::Split)
    }

    /// Whether a `split` parameter is required at this granularity
    pub fn requires_split(&self) -> bool {
        matches!(self, InputType::Split)
    }
}

/// The composite key of a job: its type and the dataset (plus config and
/// split when the job type requires them). It is both the fingerprint of a
/// cached response and the mutual-exclusion key that allows at most one
/// in-flight execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobIdentity {
    /// The kind of computation
    pub job_type: JobType,
    /// The dataset, always present
    pub dataset: String,
    /// The configuration, for config- and split-level jobs
    pub config: Option<String>,
    /// The split, for split-level jobs
    pub split: Option<String>,
}

impl JobIdentity {
    /// The identity of a dataset-level job
    pub fn dataset<T: Into<JobType>, D: Into<String>>(job_type: T, dataset: D) -> Self {
        JobIdentity {
            job_type: job_type.into(),
            dataset: dataset.into(),
            config: None,
            split: None,
        }
    }

    /// The identity of a config-level job
    pub fn config<T, D, C>(job_type: T, dataset: D, config: C) -> Self
    where
        T: Into<JobType>,
        D: Into<String>,
        C: Into<String>,
    {
        JobIdentity {
            job_type: job_type.into(),
            dataset: dataset.into(),
            config: Some(config.into()),
            split: None,
        }
    }

    /// The identity of a split-level job
    pub fn split<T, D, C, S>(job_type: T, dataset: D, config: C, split: S) -> Self
    where
        T: Into<JobType>,
        D: Into<String>,
        C: Into<String>,
        S: Into<String>,
    {
        JobIdentity {
            job_type: job_type.into(),
            dataset: dataset.into(),
            config: Some(config.into()),
            split: Some(split.into()),
        }
    }

    /// The identity of the job of type `job_type`, working at `input_type`
    /// granularity, that corresponds to a discovered split
    pub fn for_item(job_type: &JobType, input_type: InputType, item: &SplitFullName) -> Self {
        match input_type {
            InputType::Dataset => JobIdentity::dataset(job_type.clone(), item.dataset.as_str()),
            InputType::Config => JobIdentity::config(
                job_type.clone(),
                item.dataset.as_str(),
                item.config.as_str(),
            ),
            InputType::Split => JobIdentity::split(
                job_type.clone(),
                item.dataset.as_str(),
                item.config.as_str(),
                item.split.as_str(),
            ),
        }
    }

    /// The parts of this identity, most significant first
    pub(crate) fn parts(&self) -> (&str, &str, Option<&str>, Option<&str>) {
        (
            self.job_type.as_str(),
            self.dataset.as_str(),
            self.config.as_deref(),
            self.split.as_deref(),
        )
    }

    /// A stable, textual rendering of this identity. Each present part is
    /// prefixed with its byte length and absent parts are rendered as `-`,
    /// so that two distinct identities never share a fingerprint whatever
    /// characters their names contain.
    pub fn fingerprint(&self) -> String {
        let (job_type, dataset, config, split) = self.parts();
        [Some(job_type), Some(dataset), config, split]
            .iter()
            .map(|part| match part {
                Some(part) => format!("{}:{}", part.len(), part),
                None => "-".to_owned(),
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Display for JobIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} dataset={}", self.job_type, self.dataset)?;
        if let Some(config) = &self.config {
            write!(f, " config={config}")?;
        }
        if let Some(split) = &self.split {
            write!(f, " split={split}")?;
        }
        Ok(())
    }
}

/// Relative urgency of a queued job. Jobs requested by a client are
/// [Priority::Normal]; jobs created by discovery inherit the priority of
/// their parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Dispatched first
    #[default]
    Normal,
    /// Dispatched once no normal-priority job is waiting
    Low,
}

/// A job as it travels through a queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInfo {
    /// What to compute
    pub identity: JobIdentity,
    /// When set, the job is computed even if a fresh response is cached
    pub force: bool,
    /// Relative urgency of the job
    pub priority: Priority,
}

impl JobInfo {
    /// A non-forced job of normal priority
    pub fn new(identity: JobIdentity) -> Self {
        JobInfo {
            identity,
            force: false,
            priority: Priority::Normal,
        }
    }

    /// Set whether the job bypasses fresh cached responses
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Set the priority of the job
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

impl Display for JobInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.identity)?;
        if self.force {
            write!(f, " (forced)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn it_renders_absent_parts_distinctly_in_the_fingerprint() {
        let dataset_level = JobIdentity::dataset("/config-names", "user/ds");
        let empty_config = JobIdentity::config("/config-names", "user/ds", "");
        let split_level = JobIdentity::split("/first-rows", "user/ds", "default", "train");

        assert_eq!(dataset_level.fingerprint(), "13:/config-names,7:user/ds,-,-");
        assert_eq!(empty_config.fingerprint(), "13:/config-names,7:user/ds,0:,-");
        assert_eq!(
            split_level.fingerprint(),
            "11:/first-rows,7:user/ds,7:default,5:train"
        );
    }

    #[test]
    fn it_never_gives_distinct_identities_the_same_fingerprint() {
        let left = JobIdentity::split("/first-rows", "d", "x,y", "z");
        let right = JobIdentity::split("/first-rows", "d", "x", "y,z");
        let tricky = JobIdentity::split("/first-rows", "d", "x,1:y", "z");
        let other = JobIdentity::split("/first-rows", "d", "x", "1:y,z");

        assert_ne!(left, right);
        assert_ne!(left.fingerprint(), right.fingerprint());
        assert_ne!(tricky.fingerprint(), other.fingerprint());
    }

    #[test]
    fn it_keeps_only_the_parts_an_input_type_needs() {
        let item = SplitFullName::new("d", "c", "s");
        let job_type = JobType::from("/child");

        assert_eq!(
            JobIdentity::for_item(&job_type, InputType::Dataset, &item),
            JobIdentity::dataset("/child", "d")
        );
        assert_eq!(
            JobIdentity::for_item(&job_type, InputType::Config, &item),
            JobIdentity::config("/child", "d", "c")
        );
        assert_eq!(
            JobIdentity::for_item(&job_type, InputType::Split, &item),
            JobIdentity::split("/child", "d", "c", "s")
        );
    }

    #[test]
    fn it_parses_input_types_in_lowercase() {
        assert_eq!(InputType::from_str("config").ok(), Some(InputType::Config));
        assert_eq!(InputType::Split.to_string(), "split");
        assert!(InputType::Split.requires_config());
        assert!(!InputType::Dataset.requires_config());
    }
}
