use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::data::{InputType, JobIdentity, JobInfo, JobType, SplitFullName};

/// A node of the [ProcessingGraph]: a job type, the granularity it works at,
/// and the job type whose discovered items trigger it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingStep {
    /// The job type computed by this step
    pub job_type: JobType,
    /// The parameters this step requires
    pub input_type: InputType,
    /// The parent step, if any
    pub requires: Option<JobType>,
}

impl ProcessingStep {
    /// A root step (no parent)
    pub fn new<T: Into<JobType>>(job_type: T, input_type: InputType) -> Self {
        ProcessingStep {
            job_type: job_type.into(),
            input_type,
            requires: None,
        }
    }

    /// Make this step a child of `parent`
    pub fn requires<T: Into<JobType>>(mut self, parent: T) -> Self {
        self.requires = Some(parent.into());
        self
    }
}

/// The parent/child relation between job types. When a job succeeds, the
/// items it discovered are turned into jobs for each of its child steps.
#[derive(Debug, Clone, Default)]
pub struct ProcessingGraph {
    steps: BTreeMap<JobType, ProcessingStep>,
}

impl ProcessingGraph {
    /// Build a graph, verifying that job types are unique and that every
    /// parent is itself a step of the graph.
    pub fn new(steps: Vec<ProcessingStep>) -> Result<Self> {
        let mut by_type = BTreeMap::new();

        for step in steps {
            if by_type.contains_key(&step.job_type) {
                return Err(anyhow!("Duplicate processing step '{}'", step.job_type));
            }
            by_type.insert(step.job_type.clone(), step);
        }

        for step in by_type.values() {
            if let Some(parent) = &step.requires {
                if !by_type.contains_key(parent) {
                    return Err(anyhow!(
                        "Processing step '{}' requires unknown step '{}'",
                        step.job_type,
                        parent
                    ));
                }
                if parent == &step.job_type {
                    return Err(anyhow!(
                        "Processing step '{}' cannot require itself",
                        step.job_type
                    ));
                }
            }
        }

        Ok(ProcessingGraph { steps: by_type })
    }

    /// Look up a step by job type
    pub fn step(&self, job_type: &JobType) -> Option<&ProcessingStep> {
        self.steps.get(job_type)
    }

    /// Every step of the graph, ordered by job type
    pub fn steps(&self) -> impl Iterator<Item = &ProcessingStep> {
        self.steps.values()
    }

    /// The steps that require `job_type`
    pub fn children(&self, job_type: &JobType) -> Vec<&ProcessingStep> {
        self.steps
            .values()
            .filter(|step| step.requires.as_ref() == Some(job_type))
            .collect()
    }

    /// The jobs to create after `parent` succeeded and discovered `items`.
    ///
    /// A dataset-level child yields one job for the parent's dataset, a
    /// config-level child one job per distinct configuration among the
    /// items, and a split-level child one job per item. Children inherit the
    /// priority of their parent and are never forced.
    pub fn children_jobs(&self, parent: &JobInfo, items: &HashSet<SplitFullName>) -> Vec<JobInfo> {
        let mut identities = HashSet::new();

        for child in self.children(&parent.identity.job_type) {
            match child.input_type {
                InputType::Dataset => {
                    identities.insert(JobIdentity::dataset(
                        child.job_type.clone(),
                        parent.identity.dataset.as_str(),
                    ));
                }
                InputType::Config | InputType::Split => {
                    for item in items {
                        identities.insert(JobIdentity::for_item(
                            &child.job_type,
                            child.input_type,
                            item,
                        ));
                    }
                }
            }
        }

        let mut jobs: Vec<JobInfo> = identities
            .into_iter()
            .map(|identity| JobInfo::new(identity).with_priority(parent.priority))
            .collect();
        jobs.sort_by(|left, right| left.identity.parts().cmp(&right.identity.parts()));
        jobs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Priority;

    fn dummy_graph() -> ProcessingGraph {
        ProcessingGraph::new(vec![
            ProcessingStep::new("/dummy", InputType::Dataset),
            ProcessingStep::new("/child-dataset", InputType::Dataset).requires("/dummy"),
            ProcessingStep::new("/child-config", InputType::Config).requires("/dummy"),
            ProcessingStep::new("/child-split", InputType::Split).requires("/dummy"),
        ])
        .unwrap()
    }

    #[test]
    fn it_rejects_unknown_parents_and_duplicates() {
        assert!(ProcessingGraph::new(vec![
            ProcessingStep::new("/child", InputType::Config).requires("/missing")
        ])
        .is_err());

        assert!(ProcessingGraph::new(vec![
            ProcessingStep::new("/a", InputType::Dataset),
            ProcessingStep::new("/a", InputType::Config),
        ])
        .is_err());
    }

    #[test]
    fn it_creates_children_jobs_per_input_type() {
        let graph = dummy_graph();
        let parent = JobInfo::new(JobIdentity::dataset("/dummy", "dataset"))
            .with_priority(Priority::Low);
        let items = HashSet::from([
            SplitFullName::new("dataset", "config", "split1"),
            SplitFullName::new("dataset", "config", "split2"),
        ]);

        let children = graph.children_jobs(&parent, &items);

        let dataset_jobs: Vec<_> = children
            .iter()
            .filter(|job| job.identity.job_type == "/child-dataset")
            .collect();
        assert_eq!(dataset_jobs.len(), 1);
        assert_eq!(
            dataset_jobs[0].identity,
            JobIdentity::dataset("/child-dataset", "dataset")
        );

        let config_jobs: Vec<_> = children
            .iter()
            .filter(|job| job.identity.job_type == "/child-config")
            .collect();
        assert_eq!(config_jobs.len(), 1);
        assert_eq!(
            config_jobs[0].identity,
            JobIdentity::config("/child-config", "dataset", "config")
        );

        let split_names: HashSet<_> = children
            .iter()
            .filter(|job| job.identity.job_type == "/child-split")
            .filter_map(|job| job.identity.split.clone())
            .collect();
        assert_eq!(
            split_names,
            HashSet::from(["split1".to_owned(), "split2".to_owned()])
        );

        assert!(children
            .iter()
            .all(|job| job.priority == Priority::Low && !job.force));
    }

    #[test]
    fn it_creates_no_children_for_a_leaf_step() {
        let graph = dummy_graph();
        let leaf = JobInfo::new(JobIdentity::split("/child-split", "d", "c", "s"));

        assert!(graph
            .children_jobs(&leaf, &HashSet::from([SplitFullName::new("d", "c", "s")]))
            .is_empty());
    }
}
