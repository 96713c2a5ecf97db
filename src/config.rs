//! JSON-describable data pipelines.
//!
//! A [`PipelineConfig`] names a container file and group, a source iterator
//! and a chain of modifiers, and builds the corresponding
//! [`DataIterator`].
//!
//! ```json
//! {
//!   "file": "mnist.safetensors",
//!   "group": "training",
//!   "iterator": { "kind": "minibatches", "batch_size": 32 },
//!   "modifiers": [
//!     { "kind": "gaussian_noise", "std": { "input_data": 0.1 } }
//!   ],
//!   "prefetch": 4,
//!   "seed": 42
//! }
//! ```

use crate::data::NamedData;
use crate::iterators::{
    AddGaussianNoise, DataIterator, Flip, IteratorValidationError, Minibatches, Online, Pad,
    RandomCrop, Threaded, Undivided,
};
use crate::storage::{DataFile, DataFileError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] DataFileError),

    #[error(transparent)]
    Iterator(#[from] IteratorValidationError),
}

type Result<T> = std::result::Result<T, ConfigError>;

fn default_group() -> String {
    "training".to_string()
}

fn default_true() -> bool {
    true
}

fn default_batch_size() -> usize {
    Minibatches::DEFAULT_BATCH_SIZE
}

/// Source iterator over the loaded group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IteratorConfig {
    Undivided,
    Online {
        #[serde(default = "default_true")]
        shuffle: bool,
    },
    Minibatches {
        #[serde(default = "default_batch_size")]
        batch_size: usize,
        #[serde(default = "default_true")]
        shuffle: bool,
        #[serde(default)]
        drop_last: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cut_according_to: Option<String>,
    },
}

impl Default for IteratorConfig {
    fn default() -> Self {
        IteratorConfig::Minibatches {
            batch_size: Minibatches::DEFAULT_BATCH_SIZE,
            shuffle: true,
            drop_last: false,
            cut_according_to: None,
        }
    }
}

/// One modifier wrapped around the iterator built so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModifierConfig {
    GaussianNoise {
        std: BTreeMap<String, f32>,
        #[serde(default)]
        mean: BTreeMap<String, f32>,
    },
    Flip {
        prob: BTreeMap<String, f64>,
    },
    Pad {
        size: BTreeMap<String, usize>,
        #[serde(default)]
        value: BTreeMap<String, f32>,
    },
    RandomCrop {
        /// `[height, width]` per array name.
        shape: BTreeMap<String, (usize, usize)>,
    },
}

/// Full description of a data pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Container file to read.
    pub file: PathBuf,
    /// Group (data split) inside the file.
    #[serde(default = "default_group")]
    pub group: String,
    /// Datasets to load. All datasets of the group if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datasets: Option<Vec<String>>,
    #[serde(default)]
    pub iterator: IteratorConfig,
    /// Applied in order, innermost first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<ModifierConfig>,
    /// Prefetch buffer size. No background thread if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefetch: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl PipelineConfig {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            group: default_group(),
            datasets: None,
            iterator: IteratorConfig::default(),
            modifiers: Vec::new(),
            prefetch: None,
            seed: None,
        }
    }

    pub fn with_group(mut self, group: &str) -> Self {
        self.group = group.to_string();
        self
    }

    pub fn with_datasets(mut self, names: &[&str]) -> Self {
        self.datasets = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub fn with_iterator(mut self, iterator: IteratorConfig) -> Self {
        self.iterator = iterator;
        self
    }

    pub fn with_modifier(mut self, modifier: ModifierConfig) -> Self {
        self.modifiers.push(modifier);
        self
    }

    pub fn with_prefetch(mut self, buffer_size: usize) -> Self {
        self.prefetch = Some(buffer_size);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut json = String::new();
        file.read_to_string(&mut json)?;
        Self::from_json_str(&json)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Loads the configured group and builds the pipeline on top of it.
    pub fn build(&self) -> Result<Box<dyn DataIterator>> {
        let file = DataFile::open(&self.file)?;
        let group = file.group(&self.group)?;
        let data = match &self.datasets {
            Some(names) => {
                let names: Vec<&str> = names.iter().map(String::as_str).collect();
                group.load_only(&names)?
            }
            None => group.load()?,
        };
        info!(
            "Loaded group '{}' of {}: {} datasets, {} sequences",
            self.group,
            self.file.display(),
            data.len(),
            data.num_sequences()
        );
        self.build_from(data)
    }

    /// Builds the pipeline over already loaded data.
    pub fn build_from(&self, data: NamedData) -> Result<Box<dyn DataIterator>> {
        let mut iterator: Box<dyn DataIterator> = match &self.iterator {
            IteratorConfig::Undivided => Box::new(Undivided::new(data)),
            IteratorConfig::Online { shuffle } => Box::new(Online::new(data).shuffle(*shuffle)),
            IteratorConfig::Minibatches {
                batch_size,
                shuffle,
                drop_last,
                cut_according_to,
            } => {
                let mut minibatches = Minibatches::new(data, *batch_size)?
                    .shuffle(*shuffle)
                    .drop_last(*drop_last);
                if let Some(mask) = cut_according_to {
                    minibatches = minibatches.cut_according_to(mask)?;
                }
                Box::new(minibatches)
            }
        };

        for modifier in &self.modifiers {
            iterator = match modifier {
                ModifierConfig::GaussianNoise { std, mean } => Box::new(AddGaussianNoise::new(
                    iterator,
                    std.clone(),
                    mean.clone(),
                )?),
                ModifierConfig::Flip { prob } => Box::new(Flip::new(iterator, prob.clone())?),
                ModifierConfig::Pad { size, value } => {
                    Box::new(Pad::new(iterator, size.clone(), value.clone())?)
                }
                ModifierConfig::RandomCrop { shape } => {
                    Box::new(RandomCrop::new(iterator, shape.clone())?)
                }
            };
        }

        if let Some(buffer_size) = self.prefetch {
            iterator = Box::new(Threaded::new(iterator, buffer_size)?);
        }
        if let Some(seed) = self.seed {
            iterator.set_seed(seed);
        }
        Ok(iterator)
    }
}
