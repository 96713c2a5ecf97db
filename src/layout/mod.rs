//! # Shape Convention
//!
//! Every tensor fed to the network uses a leading `(T, B, ...)` axis order:
//!
//! - `T` (axis 0): maximum sequence length; `1` for non-sequential data.
//! - `B` (axis 1): number of sequences (samples) in the batch.
//! - trailing axes: features, e.g. `F` for vectors or `H, W, C` for
//!   channel-last images (`TNHWC`).
//!
//! ```text
//! MNIST images, flattened:   (1, 60000, 784)
//! CIFAR-10 images:           (1, 50000, 32, 32, 3)
//! Padded sequences:          (T_max, B, F)
//! ```
//!
//! [`TensorLayout`] is the validated descriptor of one such shape, with every
//! axis tagged by its [`AxisRole`]. [`ShapeTemplate`] describes families of
//! shapes (`T,B,F`, `T,B,H,W,C`, `T,B,...`) that layouts can be checked
//! against.

pub mod template;

pub use template::{Dim, ShapeTemplate};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Position of the sequence-length axis.
pub const TIME_AXIS: usize = 0;
/// Position of the batch axis.
pub const BATCH_AXIS: usize = 1;
/// Position of the height axis in a `TNHWC` layout.
pub const HEIGHT_AXIS: usize = 2;
/// Position of the width axis in a `TNHWC` layout.
pub const WIDTH_AXIS: usize = 3;
/// Position of the channel axis in a `TNHWC` layout.
pub const CHANNEL_AXIS: usize = 4;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    #[error("Shape {shape:?} has {} axes, but (T, B, ...) data needs at least 3. \
             Use a trailing axis of size 1 for scalar features.", shape.len())]
    TooFewAxes { shape: Vec<usize> },

    #[error("Shape {shape:?} has an empty {role} axis.")]
    EmptyAxis { shape: Vec<usize>, role: AxisRole },

    #[error("Shape {shape:?} is not a (T, B, H, W, C) image layout.")]
    NotAnImage { shape: Vec<usize> },

    #[error("Invalid shape template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("'{name}' has shape {shape:?}, which does not match the template ({template}).")]
    TemplateMismatch {
        name: String,
        shape: Vec<usize>,
        template: String,
    },
}

type Result<T> = std::result::Result<T, LayoutError>;

/// Semantic role of an axis.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AxisRole {
    Time,
    Batch,
    Feature,
}

impl fmt::Display for AxisRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AxisRole::Time => "time",
            AxisRole::Batch => "batch",
            AxisRole::Feature => "feature",
        };
        f.write_str(name)
    }
}

/// Spatial dimensions of a `TNHWC` image layout.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageDims {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

/// A validated `(T, B, ...)` shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TensorLayout {
    time: usize,
    batch: usize,
    features: Vec<usize>,
}

impl TensorLayout {
    /// Builds a layout from explicit parts.
    pub fn new(time: usize, batch: usize, features: Vec<usize>) -> Result<Self> {
        let mut shape = vec![time, batch];
        shape.extend_from_slice(&features);
        Self::from_shape(&shape)
    }

    /// Interprets a raw shape under the `(T, B, ...)` convention.
    ///
    /// At least one feature axis is required; `T` and `B` must be non-zero.
    pub fn from_shape(shape: &[usize]) -> Result<Self> {
        if shape.len() < 3 {
            return Err(LayoutError::TooFewAxes {
                shape: shape.to_vec(),
            });
        }
        if shape[TIME_AXIS] == 0 {
            return Err(LayoutError::EmptyAxis {
                shape: shape.to_vec(),
                role: AxisRole::Time,
            });
        }
        if shape[BATCH_AXIS] == 0 {
            return Err(LayoutError::EmptyAxis {
                shape: shape.to_vec(),
                role: AxisRole::Batch,
            });
        }

        Ok(Self {
            time: shape[TIME_AXIS],
            batch: shape[BATCH_AXIS],
            features: shape[2..].to_vec(),
        })
    }

    /// Sequence length `T`.
    pub fn time(&self) -> usize {
        self.time
    }

    /// Batch size `B`.
    pub fn batch(&self) -> usize {
        self.batch
    }

    /// Trailing feature axes.
    pub fn features(&self) -> &[usize] {
        &self.features
    }

    /// Number of scalars per time step and sequence.
    pub fn feature_size(&self) -> usize {
        self.features.iter().product()
    }

    pub fn rank(&self) -> usize {
        self.features.len() + 2
    }

    /// The full shape, `[T, B, features...]`.
    pub fn shape(&self) -> Vec<usize> {
        let mut shape = Vec::with_capacity(self.rank());
        shape.push(self.time);
        shape.push(self.batch);
        shape.extend_from_slice(&self.features);
        shape
    }

    /// Role of `axis`, or `None` if the layout has no such axis.
    pub fn role(&self, axis: usize) -> Option<AxisRole> {
        match axis {
            TIME_AXIS => Some(AxisRole::Time),
            BATCH_AXIS => Some(AxisRole::Batch),
            a if a < self.rank() => Some(AxisRole::Feature),
            _ => None,
        }
    }

    /// Whether the data has more than one time step.
    pub fn is_sequential(&self) -> bool {
        self.time > 1
    }

    /// Same layout with a different batch size.
    pub fn with_batch(&self, batch: usize) -> Result<Self> {
        Self::new(self.time, batch, self.features.clone())
    }

    /// Same layout with a different sequence length.
    pub fn with_time(&self, time: usize) -> Result<Self> {
        Self::new(time, self.batch, self.features.clone())
    }

    /// Interprets the feature axes as `H, W, C`.
    pub fn image(&self) -> Result<ImageDims> {
        match self.features.as_slice() {
            &[height, width, channels] => Ok(ImageDims {
                height,
                width,
                channels,
            }),
            _ => Err(LayoutError::NotAnImage {
                shape: self.shape(),
            }),
        }
    }
}

impl fmt::Display for TensorLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(T={}, B={}", self.time, self.batch)?;
        if !self.features.is_empty() {
            let features: Vec<String> = self.features.iter().map(|d| d.to_string()).collect();
            write!(f, " | {}", features.join(", "))?;
        }
        write!(f, ")")
    }
}
