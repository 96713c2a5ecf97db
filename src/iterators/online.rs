//! Yields one sequence at a time.

use super::{BatchStream, DataIterator, Result};
use crate::data::sampler::{IndexOrder, Sampler};
use crate::data::NamedData;
use crate::layout::BATCH_AXIS;
use crate::randomness::RandomState;
use ndarray::ArrayD;
use std::collections::BTreeMap;
use tracing::debug;

/// Online (one sample at a time) iterator.
///
/// Every batch holds a single sequence, so all arrays are shaped
/// `(T, 1, ...)`. An epoch visits each of the `B` sequences exactly once, in
/// random order unless shuffling is disabled.
#[derive(Debug, Clone)]
pub struct Online {
    data: NamedData,
    shapes: BTreeMap<String, Vec<usize>>,
    shuffle: bool,
    rnd: RandomState,
}

impl Online {
    pub fn new(data: NamedData) -> Self {
        let shapes = data
            .shapes()
            .into_iter()
            .map(|(name, mut shape)| {
                shape[BATCH_AXIS] = 1;
                (name, shape)
            })
            .collect();
        Self {
            data,
            shapes,
            shuffle: true,
            rnd: RandomState::from_entropy(),
        }
    }

    pub fn from_arrays<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, ArrayD<f32>)>,
        S: Into<String>,
    {
        Ok(Self::new(NamedData::new(entries)?))
    }

    /// Visit sequences in random order (default `true`).
    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.rnd.set_seed(seed);
        self
    }

    pub fn data(&self) -> &NamedData {
        &self.data
    }
}

impl DataIterator for Online {
    fn data_shapes(&self) -> &BTreeMap<String, Vec<usize>> {
        &self.shapes
    }

    fn num_batches(&self) -> Option<usize> {
        Some(self.data.num_sequences())
    }

    fn epoch(&mut self) -> BatchStream<'_> {
        let order = IndexOrder::new(self.data.num_sequences(), self.shuffle, &mut self.rnd);
        debug!("Online epoch over {} sequences", order.len());

        let data = &self.data;
        Box::new(order.map(move |idx| data.select(&[idx])))
    }

    fn set_seed(&mut self, seed: u64) {
        self.rnd.set_seed(seed);
    }
}
