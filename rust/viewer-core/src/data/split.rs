use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt::Display};

/// The full name of a split: the dataset, the configuration and the split
/// itself. Two values with the same fields are interchangeable; the type is
/// only ever used as a set element and has no ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SplitFullName {
    /// The dataset the split belongs to
    pub dataset: String,
    /// The configuration the split belongs to
    pub config: String,
    /// The name of the split
    pub split: String,
}

impl SplitFullName {
    /// Create a new [SplitFullName]
    pub fn new<D, C, S>(dataset: D, config: C, split: S) -> Self
    where
        D: Into<String>,
        C: Into<String>,
        S: Into<String>,
    {
        SplitFullName {
            dataset: dataset.into(),
            config: config.into(),
            split: split.into(),
        }
    }
}

impl Display for SplitFullName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.dataset, self.config, self.split)
    }
}

/// The outcome of comparing the items discovered by two executions of the
/// same job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemsDiff {
    /// Items discovered now that were not known before
    pub added: HashSet<SplitFullName>,
    /// Items known before that are no longer discovered
    pub removed: HashSet<SplitFullName>,
    /// Items discovered by both executions
    pub unchanged: HashSet<SplitFullName>,
}

impl ItemsDiff {
    /// Compare the `previous` set of discovered items with the `current` one
    pub fn between(
        previous: &HashSet<SplitFullName>,
        current: &HashSet<SplitFullName>,
    ) -> ItemsDiff {
        ItemsDiff {
            added: current.difference(previous).cloned().collect(),
            removed: previous.difference(current).cloned().collect(),
            unchanged: current.intersection(previous).cloned().collect(),
        }
    }

    /// True when both executions discovered the same items
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_deduplicates_structurally_equal_items() {
        let items: HashSet<SplitFullName> = [
            SplitFullName::new("d", "c", "a"),
            SplitFullName::new("d", "c", "a"),
            SplitFullName::new("d", "c", "b"),
        ]
        .into_iter()
        .collect();

        assert_eq!(items.len(), 2);
        assert!(items.contains(&SplitFullName::new("d", "c", "a")));
        assert!(items.contains(&SplitFullName::new("d", "c", "b")));
    }

    #[test]
    fn it_diffs_discovered_items() {
        let previous: HashSet<SplitFullName> = [
            SplitFullName::new("d", "c", "train"),
            SplitFullName::new("d", "c", "test"),
        ]
        .into_iter()
        .collect();
        let current: HashSet<SplitFullName> = [
            SplitFullName::new("d", "c", "train"),
            SplitFullName::new("d", "c", "validation"),
        ]
        .into_iter()
        .collect();

        let diff = ItemsDiff::between(&previous, &current);

        assert_eq!(
            diff.added,
            HashSet::from([SplitFullName::new("d", "c", "validation")])
        );
        assert_eq!(
            diff.removed,
            HashSet::from([SplitFullName::new("d", "c", "test")])
        );
        assert_eq!(
            diff.unchanged,
            HashSet::from([SplitFullName::new("d", "c", "train")])
        );
        assert!(!diff.is_empty());
        assert!(ItemsDiff::between(&current, &current).is_empty());
    }
}
