use ndarray::{ArrayView1, ArrayViewMut1, Zip};

/// Elementwise activation functions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActFn {
    /// `1 / (1 + e^-x)`
    Logistic,
    Tanh,
    /// LeCun's `1.7159 * tanh(2x / 3)`.
    ScaledTanh,
    /// `max(0, x)`
    Rectifier,
    /// The identity.
    Linear,
}
use ActFn::*;

const SCALED_TANH_AMP: f64 = 1.7159;
const SCALED_TANH_FREQ: f64 = 2.0 / 3.0;

impl ActFn {
    /// Evaluates the function at the pre-activation `z`.
    pub fn f(&self, z: f64) -> f64 {
        match self {
            Logistic => 1. / (1. + (-z).exp()),
            Tanh => z.tanh(),
            ScaledTanh => SCALED_TANH_AMP * (SCALED_TANH_FREQ * z).tanh(),
            Rectifier => z.max(0.),
            Linear => z,
        }
    }

    /// Evaluates the derivative at the pre-activation `z`.
    pub fn df(&self, z: f64) -> f64 {
        match self {
            Logistic => {
                let s = self.f(z);
                s * (1. - s)
            }
            Tanh => 1. - z.tanh().powi(2),
            ScaledTanh => {
                let t = (SCALED_TANH_FREQ * z).tanh();
                SCALED_TANH_AMP * SCALED_TANH_FREQ * (1. - t * t)
            }
            Rectifier => {
                if z > 0. {
                    1.
                } else {
                    0.
                }
            }
            Linear => 1.,
        }
    }

    /// Writes `f(a)` into `y`, both must have the same length.
    pub fn apply(&self, a: ArrayView1<f64>, mut y: ArrayViewMut1<f64>) {
        Zip::from(&mut y).and(&a).for_each(|y, &a| *y = self.f(a));
    }

    /// Writes `f'(a)` into `yd`, both must have the same length.
    pub fn apply_derivative(&self, a: ArrayView1<f64>, mut yd: ArrayViewMut1<f64>) {
        Zip::from(&mut yd).and(&a).for_each(|yd, &a| *yd = self.df(a));
    }
}
