//! Additive Gaussian noise.

use super::{
    check_known_names, check_subset, collect_dict, BatchStream, DataIterator,
    IteratorValidationError, Result,
};
use crate::randomness::RandomState;
use rand_distr::{Distribution, Normal};
use std::collections::BTreeMap;

/// Adds `N(mean, std)` noise to selected arrays of every batch.
pub struct AddGaussianNoise {
    inner: Box<dyn DataIterator>,
    noise: BTreeMap<String, Normal<f32>>,
    rnd: RandomState,
}

impl AddGaussianNoise {
    /// # Arguments
    ///
    /// * `inner` - Iterator whose batches are modified
    /// * `std_dict` - Standard deviation per array name
    /// * `mean_dict` - Mean per array name (must be a subset of `std_dict`,
    ///   missing entries default to 0)
    pub fn new<I, S, J, T>(inner: Box<dyn DataIterator>, std_dict: I, mean_dict: J) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f32)>,
        S: Into<String>,
        J: IntoIterator<Item = (T, f32)>,
        T: Into<String>,
    {
        let std_dict: BTreeMap<String, f32> = collect_dict(std_dict);
        let mean_dict: BTreeMap<String, f32> = collect_dict(mean_dict);

        check_known_names("AddGaussianNoise", inner.data_shapes(), &std_dict)?;
        check_subset(
            "AddGaussianNoise",
            ("mean_dict", &mean_dict),
            ("std_dict", &std_dict),
        )?;

        let mut noise = BTreeMap::new();
        for (name, &std) in &std_dict {
            let mean = mean_dict.get(name).copied().unwrap_or(0.0);
            let invalid = |reason: String| IteratorValidationError::InvalidParameter {
                iterator: "AddGaussianNoise",
                parameter: "std",
                name: name.clone(),
                reason,
            };
            if !std.is_finite() || std < 0.0 {
                return Err(invalid(format!("{std} is not a finite non-negative number")));
            }
            let normal = Normal::new(mean, std).map_err(|e| invalid(e.to_string()))?;
            noise.insert(name.clone(), normal);
        }

        Ok(Self {
            inner,
            noise,
            rnd: RandomState::from_entropy(),
        })
    }

    pub fn seed(mut self, seed: u64) -> Self {
        DataIterator::set_seed(&mut self, seed);
        self
    }
}

impl DataIterator for AddGaussianNoise {
    fn data_shapes(&self) -> &BTreeMap<String, Vec<usize>> {
        self.inner.data_shapes()
    }

    fn num_batches(&self) -> Option<usize> {
        self.inner.num_batches()
    }

    fn epoch(&mut self) -> BatchStream<'_> {
        let noise = &self.noise;
        let rnd = &mut self.rnd;
        Box::new(self.inner.epoch().map(move |mut batch| {
            for (name, normal) in noise {
                if let Some(array) = batch.get_mut(name) {
                    for x in array.iter_mut() {
                        *x += normal.sample(rnd.rng());
                    }
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
