//! Augmentations for `T,B,H,W,C` image data: flips, padding and crops.
//!
//! All of them act per sequence: the same operation is applied to every
//! time step of a sequence, so videos stay consistent over time.

use super::{
    check_known_names, check_subset, collect_dict, image_dims, BatchStream, DataIterator,
    IteratorValidationError, Result,
};
use crate::layout::{BATCH_AXIS, HEIGHT_AXIS, WIDTH_AXIS};
use crate::randomness::RandomState;
use ndarray::{ArrayD, Axis, IxDyn, Slice};
use std::collections::BTreeMap;
use tracing::error;

/// Axis positions after the batch axis has been indexed away.
const SEQ_HEIGHT_AXIS: usize = HEIGHT_AXIS - 1;
const SEQ_WIDTH_AXIS: usize = WIDTH_AXIS - 1;

// Flip

/// Randomly flips images horizontally (along `W`).
///
/// Each sequence of a named array is flipped with its own probability draw.
pub struct Flip {
    inner: Box<dyn DataIterator>,
    prob: BTreeMap<String, f64>,
    rnd: RandomState,
}

impl Flip {
    /// `prob_dict` maps array names to flip probabilities in `[0, 1]`.
    pub fn new<I, S>(inner: Box<dyn DataIterator>, prob_dict: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let prob: BTreeMap<String, f64> = collect_dict(prob_dict);
        let shapes = inner.data_shapes();
        check_known_names("Flip", shapes, &prob)?;

        for (name, &p) in &prob {
            image_dims("Flip", &shapes[name])?;
            if !(0.0..=1.0).contains(&p) {
                return Err(IteratorValidationError::InvalidParameter {
                    iterator: "Flip",
                    parameter: "probability",
                    name: name.clone(),
                    reason: format!("{p} is not in [0, 1]"),
                });
            }
        }

        Ok(Self {
            inner,
            prob,
            rnd: RandomState::from_entropy(),
        })
    }

    pub fn seed(mut self, seed: u64) -> Self {
        DataIterator::set_seed(&mut self, seed);
        self
    }
}

impl DataIterator for Flip {
    fn data_shapes(&self) -> &BTreeMap<String, Vec<usize>> {
        self.inner.data_shapes()
    }

    fn num_batches(&self) -> Option<usize> {
        self.inner.num_batches()
    }

    fn epoch(&mut self) -> BatchStream<'_> {
        let prob = &self.prob;
        let rnd = &mut self.rnd;
        Box::new(self.inner.epoch().map(move |mut batch| {
            for (name, &p) in prob {
                if let Some(array) = batch.get_mut(name) {
                    flip_sequences(array, p, rnd);
                }
            }
            batch
        }))
    }

    fn set_seed(&mut self, seed: u64) {
        self.rnd.set_seed(seed);
        let child = self.rnd.generate_seed();
        self.inner.set_seed(child);
    }
}

fn flip_sequences(array: &mut ArrayD<f32>, p: f64, rnd: &mut RandomState) {
    for b in 0..array.shape()[BATCH_AXIS] {
        if !rnd.bernoulli(p) {
            continue;
        }
        let mut mirrored = array.index_axis(Axis(BATCH_AXIS), b);
        mirrored.invert_axis(Axis(SEQ_WIDTH_AXIS));
        let mirrored = mirrored.to_owned();
        array.index_axis_mut(Axis(BATCH_AXIS), b).assign(&mirrored);
    }
}

// Pad

/// Pads image height and width with a constant on both sides.
pub struct Pad {
    inner: Box<dyn DataIterator>,
    size: BTreeMap<String, usize>,
    value: BTreeMap<String, f32>,
    shapes: BTreeMap<String, Vec<usize>>,
}

impl Pad {
    /// # Arguments
    ///
    /// * `size_dict` - Padding (in pixels, per side) per array name
    /// * `value_dict` - Fill value per array name; keys must also be in
    ///   `size_dict`, missing entries pad with 0
    pub fn new<I, S, J, T>(inner: Box<dyn DataIterator>, size_dict: I, value_dict: J) -> Result<Self>
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
        J: IntoIterator<Item = (T, f32)>,
        T: Into<String>,
    {
        let size: BTreeMap<String, usize> = collect_dict(size_dict);
        let value: BTreeMap<String, f32> = collect_dict(value_dict);

        let mut shapes = inner.data_shapes().clone();
        check_known_names("Pad", &shapes, &size)?;
        check_subset("Pad", ("value_dict", &value), ("size_dict", &size))?;

        for (name, &pad) in &size {
            if let Some(shape) = shapes.get_mut(name) {
                let dims = image_dims("Pad", shape)?;
                let padded = padded_size(dims.height, pad)
                    .zip(padded_size(dims.width, pad))
                    .filter(|&(height, width)| {
                        let mut padded_shape = shape.clone();
                        padded_shape[HEIGHT_AXIS] = height;
                        padded_shape[WIDTH_AXIS] = width;
                        num_elements(&padded_shape).is_some()
                    });
                let Some((height, width)) = padded else {
                    return Err(IteratorValidationError::InvalidParameter {
                        iterator: "Pad",
                        parameter: "size",
                        name: name.clone(),
                        reason: format!(
                            "padding ({}, {}) images by {pad} exceeds the addressable size",
                            dims.height, dims.width
                        ),
                    });
                };
                shape[HEIGHT_AXIS] = height;
                shape[WIDTH_AXIS] = width;
            }
        }

        Ok(Self {
            inner,
            size,
            value,
            shapes,
        })
    }
}

impl DataIterator for Pad {
    fn data_shapes(&self) -> &BTreeMap<String, Vec<usize>> {
        &self.shapes
    }

    fn num_batches(&self) -> Option<usize> {
        self.inner.num_batches()
    }

    fn epoch(&mut self) -> BatchStream<'_> {
        let size = &self.size;
        let value = &self.value;
        Box::new(self.inner.epoch().map(move |mut batch| {
            for (name, &pad) in size {
                let fill = value.get(name).copied().unwrap_or(0.0);
                if let Some(array) = batch.get_mut(name) {
                    match pad_images(array, pad, fill) {
                        Some(padded) => *array = padded,
                        None => error!(
                            "Pad: cannot pad '{name}' of shape {:?} by {pad}, left unchanged",
                            array.shape()
                        ),
                    }
                }
            }
            batch
        }))
    }

    fn set_seed(&mut self, seed: u64) {
        self.inner.set_seed(seed);
    }
}

/// `dim + 2 * pad`, if it does not overflow.
fn padded_size(dim: usize, pad: usize) -> Option<usize> {
    pad.checked_mul(2)?.checked_add(dim)
}

/// Element count of `shape`, if an array of it can be allocated.
fn num_elements(shape: &[usize]) -> Option<usize> {
    shape
        .iter()
        .try_fold(1usize, |n, &d| n.checked_mul(d))
        .filter(|&n| n <= isize::MAX as usize)
}

/// Pads a `T,B,H,W,C` array, `None` if it is not an image array or the
/// padded shape is too large.
fn pad_images(array: &ArrayD<f32>, pad: usize, fill: f32) -> Option<ArrayD<f32>> {
    if array.ndim() <= WIDTH_AXIS {
        return None;
    }
    let mut shape = array.shape().to_vec();
    let (height, width) = (shape[HEIGHT_AXIS], shape[WIDTH_AXIS]);
    shape[HEIGHT_AXIS] = padded_size(height, pad)?;
    shape[WIDTH_AXIS] = padded_size(width, pad)?;
    num_elements(&shape)?;

    let mut padded = ArrayD::from_elem(IxDyn(&shape), fill);
    {
        let mut interior = padded.view_mut();
        interior.slice_axis_inplace(Axis(HEIGHT_AXIS), Slice::from(pad..pad + height));
        interior.slice_axis_inplace(Axis(WIDTH_AXIS), Slice::from(pad..pad + width));
        interior.assign(array);
    }
    Some(padded)
}

// RandomCrop

/// Crops images to a fixed `(height, width)` at a random position.
///
/// The crop window is drawn once per sequence and shared by its time steps.
pub struct RandomCrop {
    inner: Box<dyn DataIterator>,
    crop: BTreeMap<String, (usize, usize)>,
    shapes: BTreeMap<String, Vec<usize>>,
    rnd: RandomState,
}

impl RandomCrop {
    /// `shape_dict` maps array names to the `(height, width)` of the crop.
    pub fn new<I, S>(inner: Box<dyn DataIterator>, shape_dict: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, (usize, usize))>,
        S: Into<String>,
    {
        let crop: BTreeMap<String, (usize, usize)> = collect_dict(shape_dict);
        let mut shapes = inner.data_shapes().clone();
        check_known_names("RandomCrop", &shapes, &crop)?;

        for (name, &(height, width)) in &crop {
            if let Some(shape) = shapes.get_mut(name) {
                let dims = image_dims("RandomCrop", shape)?;
                if height == 0 || width == 0 || height > dims.height || width > dims.width {
                    return Err(IteratorValidationError::InvalidParameter {
                        iterator: "RandomCrop",
                        parameter: "crop shape",
                        name: name.clone(),
                        reason: format!(
                            "({height}, {width}) does not fit into images of size ({}, {})",
                            dims.height, dims.width
                        ),
                    });
                }
                shape[HEIGHT_AXIS] = height;
                shape[WIDTH_AXIS] = width;
            }
        }

        Ok(Self {
            inner,
            crop,
            shapes,
            rnd: RandomState::from_entropy(),
        })
    }

    pub fn seed(mut self, seed: u64) -> Self {
        DataIterator::set_seed(&mut self, seed);
        self
    }
}

impl DataIterator for RandomCrop {
    fn data_shapes(&self) -> &BTreeMap<String, Vec<usize>> {
        &self.shapes
    }

    fn num_batches(&self) -> Option<usize> {
        self.inner.num_batches()
    }

    fn epoch(&mut self) -> BatchStream<'_> {
        let crop = &self.crop;
        let rnd = &mut self.rnd;
        Box::new(self.inner.epoch().map(move |mut batch| {
            for (name, &(height, width)) in crop {
                let Some(array) = batch.get_mut(name) else {
                    continue;
                };
                let window = image_dims("RandomCrop", array.shape()).ok().and_then(|dims| {
                    Some((dims.height.checked_sub(height)?, dims.width.checked_sub(width)?))
                });
                let Some((max_row, max_col)) = window else {
                    error!(
                        "RandomCrop: '{name}' of shape {:?} is smaller than the ({height}, {width}) crop, left uncropped",
                        array.shape()
                    );
                    continue;
                };
                let sequences = array.shape()[BATCH_AXIS];
                let rows: Vec<usize> =
                    (0..sequences).map(|_| rnd.below_or_equal(max_row)).collect();
                let cols: Vec<usize> =
                    (0..sequences).map(|_| rnd.below_or_equal(max_col)).collect();
                match crop_images(array, height, width, &rows, &cols) {
                    Ok(cropped) => *array = cropped,
                    Err(e) => error!("RandomCrop: '{name}' left uncropped: {e}"),
                }
            }
            batch
        }))
    }

    fn set_seed(&mut self, seed: u64) {
        self.rnd.set_seed(seed);
        let child = self.rnd.generate_seed();
        self.inner.set_seed(child);
    }
}

/// Cuts a `height x width` window out of every sequence of a `T,B,H,W,C`
/// array. Sequence `b` is cropped at row `row_starts[b]`, column
/// `col_starts[b]`.
pub fn crop_images(
    data: &ArrayD<f32>,
    height: usize,
    width: usize,
    row_starts: &[usize],
    col_starts: &[usize],
) -> Result<ArrayD<f32>> {
    let dims = image_dims("crop_images", data.shape())?;
    let sequences = data.shape()[BATCH_AXIS];
    let invalid = |reason: String| IteratorValidationError::InvalidParameter {
        iterator: "crop_images",
        parameter: "crop window",
        name: "data".to_string(),
        reason,
    };

    if row_starts.len() != sequences || col_starts.len() != sequences {
        return Err(invalid(format!(
            "expected {} start positions, got {} rows and {} columns",
            sequences,
            row_starts.len(),
            col_starts.len()
        )));
    }

    let mut shape = data.shape().to_vec();
    shape[HEIGHT_AXIS] = height;
    shape[WIDTH_AXIS] = width;
    let mut out = ArrayD::zeros(IxDyn(&shape));

    for (b, (&row, &col)) in row_starts.iter().zip(col_starts).enumerate() {
        if row + height > dims.height || col + width > dims.width {
            return Err(invalid(format!(
                "window at ({row}, {col}) of size ({height}, {width}) exceeds ({}, {})",
                dims.height, dims.width
            )));
        }
        let mut window = data.index_axis(Axis(BATCH_AXIS), b);
        window.slice_axis_inplace(Axis(SEQ_HEIGHT_AXIS), Slice::from(row..row + height));
        window.slice_axis_inplace(Axis(SEQ_WIDTH_AXIS), Slice::from(col..col + width));
        out.index_axis_mut(Axis(BATCH_AXIS), b).assign(&window);
    }

    Ok(out)
}
