//! # Data Module
//!
//! In-memory representation of one data split.
//!
//! ## Key Components
//!
//! - [`NamedData`]: validated named `(T, B, ...)` arrays sharing the same `B`
//! - [`Batch`]: named arrays yielded by an iterator for one step
//! - [`Sampler`]: sequence index orders (sequential, random, chunked)
//!
//! ## Example
//!
//! ```ignore
//! use ndarray::{ArrayD, IxDyn};
//! use seqfeed::data::NamedData;
//!
//! let data = NamedData::new([
//!     ("input_data", ArrayD::zeros(IxDyn(&[1, 60000, 784]))),
//!     ("targets", ArrayD::zeros(IxDyn(&[1, 60000, 1]))),
//! ])?;
//! assert_eq!(data.num_sequences(), 60000);
//! ```

pub mod batch;
pub mod named;
pub mod sampler;

pub use batch::Batch;
pub use named::{is_valid_name, DataError, NamedData};
pub use sampler::{BatchSampler, IndexOrder, Sampler};
