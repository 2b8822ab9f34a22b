//! Inverted Dropout
//!
//! During training each unit is kept with probability `p` and the survivors
//! are scaled by `1 / p`, so inference needs no rescaling and is the identity.

use ndarray::{Array, ArrayView, Dimension, Zip};
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Uniform;

use crate::error::{ensure_shape, Result};
use crate::params::{DropoutParam, Mode};

/// Values saved by [`dropout_forward`]. `mask` is present only in training mode.
#[derive(Clone, Debug)]
pub struct DropoutCache<D: Dimension> {
    param: DropoutParam,
    mask: Option<Array<bool, D>>,
}

impl<D: Dimension> DropoutCache<D> {
    pub fn mask(&self) -> Option<&Array<bool, D>> {
        self.mask.as_ref()
    }

    pub fn param(&self) -> &DropoutParam {
        &self.param
    }
}

fn seedable_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(value) => {
            log::debug!("dropout: seeding mask generator with {}", value);
            StdRng::seed_from_u64(value)
        }
        None => StdRng::from_entropy(),
    }
}

/// Forward pass for inverted dropout.
///
/// A `seed` in `dropout_param` makes the mask reproducible; without one the
/// mask is drawn from fresh entropy.
pub fn dropout_forward<D: Dimension>(
    x: ArrayView<f64, D>,
    dropout_param: &DropoutParam,
) -> Result<(Array<f64, D>, DropoutCache<D>)> {
    let mut rng = seedable_rng(dropout_param.seed);
    dropout_forward_with_rng(x, dropout_param, &mut rng)
}

/// Same as [`dropout_forward`] but draws the mask from a caller-owned generator,
/// advancing its state. The `seed` field is ignored.
pub fn dropout_forward_with_rng<D: Dimension, R: Rng + ?Sized>(
    x: ArrayView<f64, D>,
    dropout_param: &DropoutParam,
    rng: &mut R,
) -> Result<(Array<f64, D>, DropoutCache<D>)> {
    dropout_param.validate()?;
    let p = dropout_param.p;

    let (out, mask) = match dropout_param.mode {
        Mode::Train => {
            let draws: Array<f64, D> =
                Array::random_using(x.raw_dim(), Uniform::new(0.0, 1.0), rng);
            let mask = draws.mapv(|u| u <= p);
            let out = Zip::from(&x)
                .and(&mask)
                .map_collect(|&v, &keep| if keep { v / p } else { 0.0 });
            (out, Some(mask))
        }
        Mode::Test => (x.to_owned(), None),
    };

    let cache = DropoutCache {
        param: *dropout_param,
        mask,
    };
    Ok((out, cache))
}

/// Backward pass for inverted dropout: reapplies `mask / p` in training mode,
/// identity in test mode.
pub fn dropout_backward<D: Dimension>(
    dout: ArrayView<f64, D>,
    cache: &DropoutCache<D>,
) -> Result<Array<f64, D>> {
    match (&cache.param.mode, &cache.mask) {
        (Mode::Train, Some(mask)) => {
            ensure_shape(mask.shape(), dout.shape())?;
            let p = cache.param.p;
            Ok(Zip::from(&dout)
                .and(mask)
                .map_collect(|&g, &keep| if keep { g / p } else { 0.0 }))
        }
        _ => Ok(dout.to_owned()),
    }
}
