//! A batch yielded by a data iterator.

use crate::layout::{BATCH_AXIS, TIME_AXIS};
use ndarray::ArrayD;
use std::collections::BTreeMap;

/// Named `(T, B, ...)` arrays for one step, plus the indices of the source
/// sequences they were gathered from.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    data: BTreeMap<String, ArrayD<f32>>,
    indices: Vec<usize>,
}

impl Batch {
    pub fn new(data: BTreeMap<String, ArrayD<f32>>, indices: Vec<usize>) -> Self {
        Self { data, indices }
    }

    /// Number of sequences in the batch.
    pub fn batch_size(&self) -> usize {
        self.data
            .values()
            .next()
            .map(|a| a.shape()[BATCH_AXIS])
            .unwrap_or(self.indices.len())
    }

    /// Same as [`batch_size`](Self::batch_size).
    pub fn len(&self) -> usize {
        self.batch_size()
    }

    pub fn is_empty(&self) -> bool {
        self.batch_size() == 0
    }

    /// Source sequence indices, in batch order.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.data.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ArrayD<f32>> {
        self.data.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ArrayD<f32>> {
        self.data.get_mut(name)
    }

    /// Replaces an array, returning the previous one.
    pub fn insert(&mut self, name: impl Into<String>, array: ArrayD<f32>) -> Option<ArrayD<f32>> {
        self.data.insert(name.into(), array)
    }

    /// Sequence length of the named array.
    pub fn time_steps(&self, name: &str) -> Option<usize> {
        self.data.get(name).map(|a| a.shape()[TIME_AXIS])
    }

    pub fn shapes(&self) -> BTreeMap<String, Vec<usize>> {
        self.data
            .iter()
            .map(|(name, array)| (name.clone(), array.shape().to_vec()))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArrayD<f32>)> {
        self.data.iter().map(|(n, a)| (n.as_str(), a))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut ArrayD<f32>)> {
        self.data.iter_mut().map(|(n, a)| (n.as_str(), a))
    }

    pub fn into_inner(self) -> BTreeMap<String, ArrayD<f32>> {
        self.data
    }
}
