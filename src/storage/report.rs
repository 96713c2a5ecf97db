//! Per-group convention check results.

use crate::layout::{LayoutError, TensorLayout};
use std::collections::BTreeMap;
use std::fmt;

/// How well one group follows the `(T, B, ...)` convention.
#[derive(Debug, Clone, PartialEq)]
pub struct ConventionReport {
    pub group: String,
    /// Layout of every dataset, or why its shape is not a valid layout.
    pub datasets: BTreeMap<String, Result<TensorLayout, LayoutError>>,
}

impl ConventionReport {
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            datasets: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, name: impl Into<String>, shape: &[usize]) {
        self.datasets
            .insert(name.into(), TensorLayout::from_shape(shape));
    }

    /// Batch sizes of all datasets with a valid layout.
    pub fn batch_sizes(&self) -> BTreeMap<&str, usize> {
        self.datasets
            .iter()
            .filter_map(|(name, layout)| Some((name.as_str(), layout.as_ref().ok()?.batch())))
            .collect()
    }

    /// The `B` shared by every dataset, if the group is valid.
    pub fn shared_batch(&self) -> Option<usize> {
        if !self.datasets.values().all(Result::is_ok) {
            return None;
        }
        let sizes = self.batch_sizes();
        let first = *sizes.values().next()?;
        sizes.values().all(|&b| b == first).then_some(first)
    }

    pub fn is_valid(&self) -> bool {
        self.shared_batch().is_some()
    }

    /// Human readable list of everything wrong with the group.
    pub fn problems(&self) -> Vec<String> {
        let mut problems: Vec<String> = self
            .datasets
            .iter()
            .filter_map(|(name, layout)| {
                layout
                    .as_ref()
                    .err()
                    .map(|e| format!("dataset '{name}': {e}"))
            })
            .collect();

        if self.datasets.is_empty() {
            problems.push("group has no datasets".to_string());
        }

        let sizes = self.batch_sizes();
        let mut distinct: Vec<usize> = sizes.values().copied().collect();
        distinct.sort_unstable();
        distinct.dedup();
        if distinct.len() > 1 {
            problems.push(format!("batch size (axis 1) differs between datasets: {sizes:?}"));
        }
        problems
    }
}

impl fmt::Display for ConventionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let group = if self.group.is_empty() { "/" } else { &self.group };
        match self.shared_batch() {
            Some(b) => write!(f, "group '{group}': ok ({} datasets, B={b})", self.datasets.len()),
            None => write!(f, "group '{group}': {}", self.problems().join("; ")),
        }
    }
}
