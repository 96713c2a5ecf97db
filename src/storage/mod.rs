//! # Storage Module
//!
//! A hierarchical, group/dataset container for `(T, B, ...)` data, stored as
//! a single SafeTensors file.
//!
//! Each top-level group holds one data split (e.g. `training`,
//! `validation`). Dataset `d` of group `g` is stored under the key `g/d`;
//! datasets without a group live in the root group `""`.
//!
//! The shape convention is a recommendation: [`DataFileWriter`] writes any
//! array, while [`DataFile::check_conventions`] reports which groups follow it.
//!
//! ## Example
//!
//! ```rust,ignore
//! use seqfeed::storage::{DataFile, DataFileWriter};
//!
//! let mut writer = DataFileWriter::new();
//! writer.add_dataset("training", "input_data", inputs)?;
//! writer.add_dataset("training", "targets", targets)?;
//! writer.write("mnist.safetensors")?;
//!
//! let file = DataFile::open("mnist.safetensors")?;
//! let training = file.group("training")?.load()?;
//! ```

pub mod container;
pub mod report;

pub use container::{DataFile, DataFileWriter, DatasetInfo, Group, GroupWriter};
pub use report::ConventionReport;

use crate::data::DataError;
use thiserror::Error;

/// Value of the `format` metadata entry.
pub const FORMAT_NAME: &str = "seqfeed";
/// Value of the `version` metadata entry.
pub const FORMAT_VERSION: &str = "1";
/// Separates group and dataset names in tensor keys.
pub const GROUP_SEPARATOR: char = '/';
/// Name of the group holding datasets stored without a group prefix.
pub const ROOT_GROUP: &str = "";

#[derive(Error, Debug)]
pub enum DataFileError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SafeTensors error: {0}")]
    SafeTensors(#[from] safetensors::SafeTensorError),

    #[error("Dataset '{name}' has unsupported dtype {dtype}")]
    UnsupportedDtype { name: String, dtype: String },

    #[error("Group '{group}' not found. Available: {available:?}")]
    GroupNotFound {
        group: String,
        available: Vec<String>,
    },

    #[error("Dataset '{name}' not found in group '{group}'")]
    DatasetNotFound { group: String, name: String },

    #[error("Invalid group or dataset name '{0}': names must be non-empty and must not contain '/'")]
    InvalidName(String),

    #[error("Dataset '{name}' already exists in group '{group}'")]
    DuplicateDataset { group: String, name: String },

    #[error("Dataset '{name}': shape {expected:?} does not match {actual} stored elements")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        actual: usize,
    },

    #[error(transparent)]
    Data(#[from] DataError),
}

pub type Result<T> = std::result::Result<T, DataFileError>;

/// Key under which a dataset is stored.
pub(crate) fn dataset_key(group: &str, name: &str) -> String {
    if group == ROOT_GROUP {
        name.to_string()
    } else {
        format!("{group}{GROUP_SEPARATOR}{name}")
    }
}

/// Splits a stored key into `(group, dataset)` at the last separator.
pub(crate) fn split_key(key: &str) -> (&str, &str) {
    key.rsplit_once(GROUP_SEPARATOR)
        .unwrap_or((ROOT_GROUP, key))
}
