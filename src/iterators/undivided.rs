//! Yields all data as a single batch.

use super::{BatchStream, DataIterator, Result};
use crate::data::NamedData;
use ndarray::ArrayD;
use std::collections::BTreeMap;
use tracing::debug;

/// Processes the entire data in one step.
#[derive(Debug, Clone)]
pub struct Undivided {
    data: NamedData,
    shapes: BTreeMap<String, Vec<usize>>,
}

impl Undivided {
    pub fn new(data: NamedData) -> Self {
        let shapes = data.shapes();
        Self { data, shapes }
    }

    /// Validates named arrays and wraps them.
    pub fn from_arrays<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, ArrayD<f32>)>,
        S: Into<String>,
    {
        Ok(Self::new(NamedData::new(entries)?))
    }

    pub fn data(&self) -> &NamedData {
        &self.data
    }
}

impl DataIterator for Undivided {
    fn data_shapes(&self) -> &BTreeMap<String, Vec<usize>> {
        &self.shapes
    }

    fn num_batches(&self) -> Option<usize> {
        Some(1)
    }

    fn epoch(&mut self) -> BatchStream<'_> {
        debug!(
            "Undivided epoch: {} arrays, {} sequences",
            self.data.len(),
            self.data.num_sequences()
        );
        let data = &self.data;
        Box::new(std::iter::once_with(move || data.to_batch()))
    }
}
