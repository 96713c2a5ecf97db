//! Minibatch iterator with optional mask-based time cutting.

use super::{BatchStream, DataIterator, IteratorValidationError, Result};
use crate::data::sampler::{num_batches, BatchSampler, IndexOrder};
use crate::data::{Batch, NamedData};
use crate::layout::{BATCH_AXIS, TIME_AXIS};
use crate::randomness::RandomState;
use ndarray::{ArrayD, Axis, Slice};
use std::collections::BTreeMap;
use tracing::debug;

/// Yields chunks of `batch_size` sequences.
///
/// With [`cut_according_to`](Minibatches::cut_according_to) the time axis of
/// each batch is trimmed to the longest sequence in it, as marked by the
/// non-zero entries of a mask array.
#[derive(Debug, Clone)]
pub struct Minibatches {
    data: NamedData,
    shapes: BTreeMap<String, Vec<usize>>,
    batch_size: usize,
    shuffle: bool,
    drop_last: bool,
    cut_according_to: Option<String>,
    rnd: RandomState,
}

impl Minibatches {
    /// Default batch size.
    pub const DEFAULT_BATCH_SIZE: usize = 10;

    pub fn new(data: NamedData, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(IteratorValidationError::InvalidBatchSize);
        }
        let max_batch = batch_size.min(data.num_sequences());
        let shapes = data
            .shapes()
            .into_iter()
            .map(|(name, mut shape)| {
                shape[BATCH_AXIS] = max_batch;
                (name, shape)
            })
            .collect();

        Ok(Self {
            data,
            shapes,
            batch_size,
            shuffle: true,
            drop_last: false,
            cut_according_to: None,
            rnd: RandomState::from_entropy(),
        })
    }

    pub fn from_arrays<I, S>(entries: I, batch_size: usize) -> Result<Self>
    where
        I: IntoIterator<Item = (S, ArrayD<f32>)>,
        S: Into<String>,
    {
        Self::new(NamedData::new(entries)?, batch_size)
    }

    /// Shuffle sequences each epoch (default `true`).
    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Drop the final batch if it is smaller than `batch_size`.
    pub fn drop_last(mut self, drop_last: bool) -> Self {
        self.drop_last = drop_last;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.rnd.set_seed(seed);
        self
    }

    /// Cut the time axis of every batch according to the mask named `name`.
    ///
    /// Arrays whose sequence length differs from the mask's are left as is.
    pub fn cut_according_to(mut self, name: &str) -> Result<Self> {
        if !self.data.contains(name) {
            return Err(IteratorValidationError::UnknownName {
                iterator: "Minibatches",
                name: name.to_string(),
                available: self.data.names().map(String::from).collect(),
            });
        }
        self.cut_according_to = Some(name.to_string());
        Ok(self)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn data(&self) -> &NamedData {
        &self.data
    }
}

impl DataIterator for Minibatches {
    fn data_shapes(&self) -> &BTreeMap<String, Vec<usize>> {
        &self.shapes
    }

    fn num_batches(&self) -> Option<usize> {
        Some(num_batches(
            self.data.num_sequences(),
            self.batch_size,
            self.drop_last,
        ))
    }

    fn epoch(&mut self) -> BatchStream<'_> {
        let order = IndexOrder::new(self.data.num_sequences(), self.shuffle, &mut self.rnd);
        let chunks = BatchSampler::new(order, self.batch_size, self.drop_last).sort_within(true);
        debug!(
            "Minibatches epoch: {} batches of up to {} sequences",
            chunks.num_batches(),
            self.batch_size
        );

        let data = &self.data;
        let mask = self.cut_according_to.as_deref();
        Box::new(chunks.map(move |indices| {
            let batch = data.select(&indices);
            match mask {
                Some(mask) => cut_batch(batch, mask),
                None => batch,
            }
        }))
    }

    fn set_seed(&mut self, seed: u64) {
        self.rnd.set_seed(seed);
    }
}

/// Length of every sequence in a `(T, B, ...)` mask: one past the last time
/// step with any non-zero entry, or 0 for an all-zero sequence.
pub fn sequence_lengths(mask: &ArrayD<f32>) -> Vec<usize> {
    let shape = mask.shape();
    if shape.len() < 2 {
        return Vec::new();
    }
    let (time, batch) = (shape[TIME_AXIS], shape[BATCH_AXIS]);

    (0..batch)
        .map(|b| {
            let sequence = mask.index_axis(Axis(BATCH_AXIS), b);
            (0..time)
                .rev()
                .find(|&t| sequence.index_axis(Axis(TIME_AXIS), t).iter().any(|&v| v != 0.0))
                .map_or(0, |t| t + 1)
        })
        .collect()
}

fn cut_batch(mut batch: Batch, mask_name: &str) -> Batch {
    let Some(mask) = batch.get(mask_name) else {
        return batch;
    };
    let full = mask.shape()[TIME_AXIS];
    let len = sequence_lengths(mask).into_iter().max().unwrap_or(0).max(1);
    if len >= full {
        return batch;
    }

    for (_, array) in batch.iter_mut() {
        if array.shape()[TIME_AXIS] == full {
            *array = array
                .slice_axis(Axis(TIME_AXIS), Slice::from(0..len))
                .to_owned();
        }
    }
    batch
}
