//! # Data Iterators
//!
//! Restartable, finite streams of [`Batch`]es over named `(T, B, ...)` data.
//!
//! ## Source iterators
//!
//! - [`Undivided`]: all data as one batch
//! - [`Online`]: one sequence per batch (`B = 1`)
//! - [`Minibatches`]: chunks of `batch_size` sequences, optionally cut in time
//!   according to a mask
//!
//! ## Nested iterators
//!
//! Wrap another iterator and modify selected arrays of every batch:
//!
//! - [`AddGaussianNoise`]: additive `N(mean, std)` noise
//! - [`Flip`]: random horizontal flips of `T,B,H,W,C` images
//! - [`Pad`]: constant padding of image height and width
//! - [`RandomCrop`]: random crops of images
//! - [`Threaded`]: prefetches batches on a background thread
//!
//! ## Example
//!
//! ```ignore
//! use seqfeed::iterators::{DataIterator, Flip, Minibatches};
//!
//! let source = Minibatches::new(data, 32)?.seed(42);
//! let mut iterator = Flip::new(Box::new(source), [("images", 0.5)])?;
//!
//! for epoch in 0..10 {
//!     for batch in iterator.epoch() {
//!         // feed batch.get("images"), batch.get("targets")
//!     }
//! }
//! ```

pub mod image;
pub mod minibatches;
pub mod noise;
pub mod online;
pub mod threaded;
pub mod undivided;

pub use image::{crop_images, Flip, Pad, RandomCrop};
pub use minibatches::{sequence_lengths, Minibatches};
pub use noise::AddGaussianNoise;
pub use online::Online;
pub use threaded::Threaded;
pub use undivided::Undivided;

use crate::data::{Batch, DataError};
use crate::layout::{ImageDims, LayoutError, TensorLayout};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while constructing an iterator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IteratorValidationError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error("{iterator}: {source}")]
    Layout {
        iterator: &'static str,
        #[source]
        source: LayoutError,
    },

    #[error("{iterator}: there is no data named '{name}'. Available: {available:?}")]
    UnknownName {
        iterator: &'static str,
        name: String,
        available: Vec<String>,
    },

    #[error("{iterator}: keys {extra:?} of {dict} are not keys of {reference}.")]
    DictMismatch {
        iterator: &'static str,
        dict: &'static str,
        reference: &'static str,
        extra: Vec<String>,
    },

    #[error("{iterator}: invalid {parameter} for '{name}': {reason}")]
    InvalidParameter {
        iterator: &'static str,
        parameter: &'static str,
        name: String,
        reason: String,
    },

    #[error("Batch size must be at least 1.")]
    InvalidBatchSize,

    #[error("Prefetch buffer size must be at least 1.")]
    InvalidBufferSize,
}

pub type Result<T> = std::result::Result<T, IteratorValidationError>;

/// One epoch worth of batches.
pub type BatchStream<'a> = Box<dyn Iterator<Item = Batch> + 'a>;

/// A restartable source of batches.
///
/// Every call to [`epoch`](DataIterator::epoch) starts a fresh, finite pass
/// over the data (with a new shuffle order and new random draws, where
/// applicable).
pub trait DataIterator: Send {
    /// Shapes of the arrays in yielded batches. `T` and `B` are maxima: a
    /// final partial batch or a mask-cut batch can be smaller.
    fn data_shapes(&self) -> &BTreeMap<String, Vec<usize>>;

    /// Batches per epoch, if known up front.
    fn num_batches(&self) -> Option<usize>;

    /// Starts a new epoch.
    fn epoch(&mut self) -> BatchStream<'_>;

    /// Reseeds all randomness of this iterator (and of wrapped iterators).
    fn set_seed(&mut self, _seed: u64) {}

    /// Names of the arrays in yielded batches.
    fn names(&self) -> Vec<String> {
        self.data_shapes().keys().cloned().collect()
    }
}

impl<I: DataIterator + ?Sized> DataIterator for Box<I> {
    fn data_shapes(&self) -> &BTreeMap<String, Vec<usize>> {
        (**self).data_shapes()
    }

    fn num_batches(&self) -> Option<usize> {
        (**self).num_batches()
    }

    fn epoch(&mut self) -> BatchStream<'_> {
        (**self).epoch()
    }

    fn set_seed(&mut self, seed: u64) {
        (**self).set_seed(seed)
    }
}

/// Fails unless every key of `dict` names an array of `shapes`.
pub(crate) fn check_known_names<V>(
    iterator: &'static str,
    shapes: &BTreeMap<String, Vec<usize>>,
    dict: &BTreeMap<String, V>,
) -> Result<()> {
    match dict.keys().find(|name| !shapes.contains_key(*name)) {
        Some(name) => Err(IteratorValidationError::UnknownName {
            iterator,
            name: name.clone(),
            available: shapes.keys().cloned().collect(),
        }),
        None => Ok(()),
    }
}

/// Fails unless the keys of `dict` are a subset of the keys of `reference`.
pub(crate) fn check_subset<V, W>(
    iterator: &'static str,
    (dict_name, dict): (&'static str, &BTreeMap<String, V>),
    (reference_name, reference): (&'static str, &BTreeMap<String, W>),
) -> Result<()> {
    let extra: Vec<String> = dict
        .keys()
        .filter(|k| !reference.contains_key(*k))
        .cloned()
        .collect();
    if extra.is_empty() {
        Ok(())
    } else {
        Err(IteratorValidationError::DictMismatch {
            iterator,
            dict: dict_name,
            reference: reference_name,
            extra,
        })
    }
}

/// Interprets the shape of a named array as a `T,B,H,W,C` image.
pub(crate) fn image_dims(iterator: &'static str, shape: &[usize]) -> Result<ImageDims> {
    TensorLayout::from_shape(shape)
        .and_then(|layout| layout.image())
        .map_err(|source| IteratorValidationError::Layout { iterator, source })
}

pub(crate) fn collect_dict<I, S, V>(entries: I) -> BTreeMap<String, V>
where
    I: IntoIterator<Item = (S, V)>,
    S: Into<String>,
{
    entries.into_iter().map(|(k, v)| (k.into(), v)).collect()
}
