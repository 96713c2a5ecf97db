//! Background prefetching.
//!
//! [`Threaded`] moves the wrapped iterator onto a worker thread for the
//! duration of an epoch. The worker pushes batches into a bounded channel and
//! hands the iterator back when the epoch ends or the consumer stops early.

use super::{BatchStream, DataIterator, IteratorValidationError, Result};
use crate::data::Batch;
use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

type Worker = JoinHandle<Box<dyn DataIterator>>;

/// Prefetches up to `buffer_size` batches of the wrapped iterator.
pub struct Threaded {
    inner: Option<Box<dyn DataIterator>>,
    shapes: BTreeMap<String, Vec<usize>>,
    num_batches: Option<usize>,
    buffer_size: usize,
}

impl Threaded {
    /// Default number of prefetched batches.
    pub const DEFAULT_BUFFER_SIZE: usize = 3;

    pub fn new(inner: Box<dyn DataIterator>, buffer_size: usize) -> Result<Self> {
        if buffer_size == 0 {
            return Err(IteratorValidationError::InvalidBufferSize);
        }
        Ok(Self {
            shapes: inner.data_shapes().clone(),
            num_batches: inner.num_batches(),
            inner: Some(inner),
            buffer_size,
        })
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }
}

impl DataIterator for Threaded {
    fn data_shapes(&self) -> &BTreeMap<String, Vec<usize>> {
        &self.shapes
    }

    fn num_batches(&self) -> Option<usize> {
        self.num_batches
    }

    fn epoch(&mut self) -> BatchStream<'_> {
        let Some(mut inner) = self.inner.take() else {
            warn!("Threaded: wrapped iterator was lost to a panicked worker, epoch is empty");
            return Box::new(std::iter::empty());
        };

        let (tx, rx) = mpsc::sync_channel::<Batch>(self.buffer_size);
        let worker = thread::spawn(move || {
            for batch in inner.epoch() {
                // Receiver dropped: the consumer stopped early.
                if tx.send(batch).is_err() {
                    break;
                }
            }
            inner
        });
        debug!("Threaded epoch started, buffer size {}", self.buffer_size);

        Box::new(PrefetchStream {
            slot: &mut self.inner,
            rx: Some(rx),
            worker: Some(worker),
        })
    }

    fn set_seed(&mut self, seed: u64) {
        if let Some(inner) = self.inner.as_mut() {
            inner.set_seed(seed);
        }
    }
}

struct PrefetchStream<'a> {
    slot: &'a mut Option<Box<dyn DataIterator>>,
    rx: Option<Receiver<Batch>>,
    worker: Option<Worker>,
}

impl PrefetchStream<'_> {
    fn finish(&mut self) {
        // Closing the channel unblocks a worker waiting on a full buffer.
        self.rx.take();
        if let Some(worker) = self.worker.take() {
            match worker.join() {
                Ok(inner) => *self.slot = Some(inner),
                Err(_) => error!("Threaded: prefetch worker panicked"),
            }
        }
    }
}

impl Iterator for PrefetchStream<'_> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        let batch = self.rx.as_ref()?.recv().ok();
        if batch.is_none() {
            self.finish();
        }
        batch
    }
}

impl Drop for PrefetchStream<'_> {
    fn drop(&mut self) {
        self.finish();
    }
}
