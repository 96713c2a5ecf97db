//! Sequence-index sampling strategies used by the iterators.

use crate::randomness::RandomState;

/// A generator of sequence indices for one epoch.
pub trait Sampler: Iterator<Item = usize> {
    /// Total number of indices per epoch.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rewinds to the start of a new epoch.
    fn reset(&mut self);
}

/// Order in which the sequences of one split are visited during an epoch.
///
/// An unshuffled order is `0..len` every epoch. A shuffled order owns its
/// random state and draws a fresh permutation on every [`Sampler::reset`].
#[derive(Debug, Clone)]
pub struct IndexOrder {
    indices: Vec<usize>,
    position: usize,
    rnd: Option<RandomState>,
}

impl IndexOrder {
    /// Shuffled order drawn from a child of `rnd` if `shuffle`, otherwise
    /// `0..len`.
    pub fn new(len: usize, shuffle: bool, rnd: &mut RandomState) -> Self {
        if shuffle {
            Self::shuffled(len, rnd.create_random_state(None))
        } else {
            Self::sequential(len)
        }
    }

    pub fn sequential(len: usize) -> Self {
        Self {
            indices: (0..len).collect(),
            position: 0,
            rnd: None,
        }
    }

    pub fn shuffled(len: usize, mut rnd: RandomState) -> Self {
        let mut indices: Vec<usize> = (0..len).collect();
        rnd.shuffle(&mut indices);
        Self {
            indices,
            position: 0,
            rnd: Some(rnd),
        }
    }

    pub fn is_shuffled(&self) -> bool {
        self.rnd.is_some()
    }

    /// Indices of the current epoch, including those already yielded.
    pub fn epoch_indices(&self) -> &[usize] {
        &self.indices
    }
}

impl Iterator for IndexOrder {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.indices.get(self.position).copied()?;
        self.position += 1;
        Some(idx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.indices.len() - self.position;
        (left, Some(left))
    }
}

impl Sampler for IndexOrder {
    fn len(&self) -> usize {
        self.indices.len()
    }

    fn reset(&mut self) {
        self.position = 0;
        if let Some(rnd) = &mut self.rnd {
            rnd.shuffle(&mut self.indices);
        }
    }
}

/// Groups indices of an inner sampler into chunks.
pub struct BatchSampler<S: Sampler> {
    sampler: S,
    batch_size: usize,
    drop_last: bool,
    sort_within: bool,
}

impl<S: Sampler> BatchSampler<S> {
    /// # Arguments
    ///
    /// * `sampler` - Source of indices
    /// * `batch_size` - Maximum chunk size, must be non-zero
    /// * `drop_last` - Drop the final chunk if it is smaller than `batch_size`
    pub fn new(sampler: S, batch_size: usize, drop_last: bool) -> Self {
        Self {
            sampler,
            batch_size: batch_size.max(1),
            drop_last,
            sort_within: false,
        }
    }

    /// Sort indices inside each chunk, so gathers read in ascending order.
    pub fn sort_within(mut self, sort: bool) -> Self {
        self.sort_within = sort;
        self
    }

    pub fn num_batches(&self) -> usize {
        num_batches(self.sampler.len(), self.batch_size, self.drop_last)
    }

    pub fn reset(&mut self) {
        self.sampler.reset();
    }
}

impl<S: Sampler> Iterator for BatchSampler<S> {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut batch: Vec<usize> = self.sampler.by_ref().take(self.batch_size).collect();

        if batch.is_empty() || (batch.len() < self.batch_size && self.drop_last) {
            return None;
        }
        if self.sort_within {
            batch.sort_unstable();
        }

        Some(batch)
    }
}

/// Number of chunks of `batch_size` (> 0) covering `len` items.
pub fn num_batches(len: usize, batch_size: usize, drop_last: bool) -> usize {
    if drop_last {
        len / batch_size
    } else {
        len.div_ceil(batch_size)
    }
}
