//! Named `(T, B, ...)` arrays belonging to one data split.

use super::batch::Batch;
use crate::layout::{LayoutError, TensorLayout, BATCH_AXIS};
use ndarray::{ArrayD, Axis};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    #[error("No data given: at least one named array is required.")]
    NoData,

    #[error("Invalid data name '{0}': names must be non-empty and must not contain '/'.")]
    InvalidName(String),

    #[error("The number of sequences (axis 1) varies between arrays: {sizes:?}")]
    BatchMismatch { sizes: BTreeMap<String, usize> },

    #[error("Invalid shape for '{name}': {source}")]
    Layout {
        name: String,
        #[source]
        source: LayoutError,
    },
}

type Result<T> = std::result::Result<T, DataError>;

/// Checks that `name` can be used as a data (and container dataset) name.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('/')
}

/// A validated set of named arrays that share the same batch size.
///
/// Arrays are reference counted, so cloning a `NamedData` (or handing it to
/// several iterators) never copies the data.
#[derive(Debug, Clone)]
pub struct NamedData {
    arrays: BTreeMap<String, Arc<ArrayD<f32>>>,
    layouts: BTreeMap<String, TensorLayout>,
    num_sequences: usize,
}

impl NamedData {
    /// Validates and wraps named arrays.
    ///
    /// Every array must follow the `(T, B, ...)` convention and all arrays
    /// must agree on `B`. Sequence lengths may differ.
    pub fn new<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, ArrayD<f32>)>,
        S: Into<String>,
    {
        Self::from_shared(
            entries
                .into_iter()
                .map(|(name, array)| (name.into(), Arc::new(array))),
        )
    }

    /// Same as [`new`](Self::new) for arrays that are already shared.
    pub fn from_shared<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Arc<ArrayD<f32>>)>,
    {
        let arrays: BTreeMap<String, Arc<ArrayD<f32>>> = entries.into_iter().collect();
        if arrays.is_empty() {
            return Err(DataError::NoData);
        }

        let mut layouts = BTreeMap::new();
        for (name, array) in &arrays {
            if !is_valid_name(name) {
                return Err(DataError::InvalidName(name.clone()));
            }
            let layout = TensorLayout::from_shape(array.shape()).map_err(|source| {
                DataError::Layout {
                    name: name.clone(),
                    source,
                }
            })?;
            layouts.insert(name.clone(), layout);
        }

        let sizes: BTreeMap<String, usize> = layouts
            .iter()
            .map(|(name, layout)| (name.clone(), layout.batch()))
            .collect();
        let first = sizes.values().next().copied().unwrap_or(0);
        if sizes.values().any(|&b| b != first) {
            return Err(DataError::BatchMismatch { sizes });
        }

        Ok(Self {
            arrays,
            layouts,
            num_sequences: first,
        })
    }

    /// Number of named arrays.
    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.arrays.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.arrays.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ArrayD<f32>> {
        self.arrays.get(name).map(|a| a.as_ref())
    }

    /// Shared handle to an array.
    pub fn get_shared(&self, name: &str) -> Option<Arc<ArrayD<f32>>> {
        self.arrays.get(name).cloned()
    }

    pub fn layout(&self, name: &str) -> Option<&TensorLayout> {
        self.layouts.get(name)
    }

    pub fn layouts(&self) -> &BTreeMap<String, TensorLayout> {
        &self.layouts
    }

    /// Full shape of every array.
    pub fn shapes(&self) -> BTreeMap<String, Vec<usize>> {
        self.layouts
            .iter()
            .map(|(name, layout)| (name.clone(), layout.shape()))
            .collect()
    }

    /// The shared batch size `B`.
    pub fn num_sequences(&self) -> usize {
        self.num_sequences
    }

    /// The longest sequence length among all arrays.
    pub fn max_time(&self) -> usize {
        self.layouts.values().map(|l| l.time()).max().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArrayD<f32>)> {
        self.arrays.iter().map(|(n, a)| (n.as_str(), a.as_ref()))
    }

    /// Gathers the given sequences (axis 1) of every array into a batch.
    ///
    /// # Panics
    ///
    /// Panics if an index is not below [`num_sequences`](Self::num_sequences).
    pub fn select(&self, indices: &[usize]) -> Batch {
        let data = self
            .arrays
            .iter()
            .map(|(name, array)| (name.clone(), array.select(Axis(BATCH_AXIS), indices)))
            .collect();
        Batch::new(data, indices.to_vec())
    }

    /// All data as a single batch.
    pub fn to_batch(&self) -> Batch {
        let data = self
            .arrays
            .iter()
            .map(|(name, array)| (name.clone(), array.as_ref().clone()))
            .collect();
        Batch::new(data, (0..self.num_sequences).collect())
    }
}
