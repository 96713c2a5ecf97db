//! # seqfeed: `(T, B, ...)` data conventions, containers and iterators
//!
//! **seqfeed** stores training data as named arrays whose first two axes are
//! always `(T, B)`: `T` is the (maximum) sequence length, `1` for
//! non-sequential data, and `B` the number of sequences. Every array of one
//! data split shares the same `B`; `T` may differ.
//!
//! Images and videos use the channel-last `T,B,H,W,C` layout.
//!
//! ## Usage Example
//!
//! ```no_run
//! use ndarray::{ArrayD, IxDyn};
//! use seqfeed::data::NamedData;
//! use seqfeed::iterators::{DataIterator, Minibatches};
//!
//! let data = NamedData::new([
//!     ("input_data", ArrayD::<f32>::zeros(IxDyn(&[1, 60000, 784]))),
//!     ("targets", ArrayD::<f32>::zeros(IxDyn(&[1, 60000, 1]))),
//! ])?;
//!
//! let mut iterator = Minibatches::new(data, 32)?.seed(42);
//! for batch in iterator.epoch() {
//!     let x = batch.get("input_data");
//!     // train on x ...
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod data;
pub mod iterators;
pub mod layout;
pub mod randomness;
pub mod storage;
