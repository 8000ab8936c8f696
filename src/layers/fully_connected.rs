use log::debug;
use ndarray::{Array1, ArrayView1, ArrayView2, ArrayViewMut2, Zip, linalg, s};
use rand::RngCore;
use rand_distr::{Distribution, Normal};

use super::{Layer, OutputInfo};
use crate::{ActFn, NnErr, ParamHandle, Parameters, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Uninitialized,
    Initialized,
    Forwarded,
}

/// A fully connected layer: `y = f(W·x + b)`.
///
/// The weights live in a `Parameters` buffer as a row-major `outputs x (inputs + bias)`
/// matrix, the last column holds the bias when it is enabled.
#[derive(Debug, Clone)]
pub struct FullyConnected {
    inputs: usize,
    outputs: usize,
    bias: bool,
    act_fn: ActFn,
    std_dev: f64,
    handle: Option<ParamHandle>,
    state: State,

    // Forward metadata
    x: Array1<f64>,
    a: Array1<f64>,
    y: Array1<f64>,
    yd: Array1<f64>,

    // Backward metadata
    deltas: Array1<f64>,
    e: Array1<f64>,
}

impl FullyConnected {
    /// Creates a new `FullyConnected`, its buffers are allocated on `initialize`.
    ///
    /// # Arguments
    /// * `info` - The output shape of the previous layer, flattened into this layer's inputs.
    /// * `outputs` - The amount of neurons.
    /// * `bias` - Whether to add a trainable bias to every neuron.
    /// * `act_fn` - The activation function.
    /// * `std_dev` - The standard deviation of the normal distribution the weights are drawn
    ///   from.
    ///
    /// # Returns
    /// The new layer or `NnErr::InvalidStdDev` if `std_dev` is negative or not finite.
    pub fn new(
        info: &OutputInfo,
        outputs: usize,
        bias: bool,
        act_fn: ActFn,
        std_dev: f64,
    ) -> Result<Self> {
        if !(std_dev.is_finite() && std_dev >= 0.0) {
            return Err(NnErr::InvalidStdDev(std_dev));
        }

        let empty = Array1::zeros(0);

        Ok(Self {
            inputs: info.outputs(),
            outputs,
            bias,
            act_fn,
            std_dev,
            handle: None,
            state: State::Uninitialized,
            x: empty.clone(),
            a: empty.clone(),
            y: empty.clone(),
            yd: empty.clone(),
            deltas: empty.clone(),
            e: empty,
        })
    }

    pub fn inputs(&self) -> usize {
        self.inputs
    }

    pub fn outputs(&self) -> usize {
        self.outputs
    }

    pub fn has_bias(&self) -> bool {
        self.bias
    }

    pub fn act_fn(&self) -> ActFn {
        self.act_fn
    }

    /// Returns the amount of parameters this layer registers.
    pub fn param_count(&self) -> usize {
        self.outputs * self.cols()
    }

    /// Returns the handle to this layer's parameters, if it is initialized.
    pub fn handle(&self) -> Option<&ParamHandle> {
        self.handle.as_ref()
    }

    /// Gives a view of this layer's weights, bias column included.
    pub fn weights<'p>(&self, params: &'p Parameters) -> Result<ArrayView2<'p, f64>> {
        let handle = self.require_handle()?;
        self.view(params.slice(handle)?)
    }

    /// Gives a view of this layer's accumulated gradient, same shape as `weights`.
    pub fn gradient<'p>(&self, params: &'p Parameters) -> Result<ArrayView2<'p, f64>> {
        let handle = self.require_handle()?;
        self.view(params.grad_slice(handle)?)
    }

    fn cols(&self) -> usize {
        self.inputs + usize::from(self.bias)
    }

    fn require_handle(&self) -> Result<&ParamHandle> {
        self.handle.as_ref().ok_or(NnErr::UninitializedLayer)
    }

    fn view<'p>(&self, raw: &'p [f64]) -> Result<ArrayView2<'p, f64>> {
        Ok(ArrayView2::from_shape((self.outputs, self.cols()), raw)?)
    }

    fn view_mut<'p>(&self, raw: &'p mut [f64]) -> Result<ArrayViewMut2<'p, f64>> {
        Ok(ArrayViewMut2::from_shape((self.outputs, self.cols()), raw)?)
    }

    fn check_len(what: &'static str, got: usize, expected: usize) -> Result<()> {
        if got != expected {
            return Err(NnErr::DimensionMismatch {
                what,
                got,
                expected,
            });
        }

        Ok(())
    }
}

impl Layer for FullyConnected {
    fn initialize(
        &mut self,
        params: &mut Parameters,
        rng: &mut dyn RngCore,
    ) -> Result<OutputInfo> {
        if self.handle.is_some() {
            return Err(NnErr::AlreadyInitialized);
        }

        let normal =
            Normal::new(0.0, self.std_dev).map_err(|_| NnErr::InvalidStdDev(self.std_dev))?;

        let handle = params.register(self.param_count());
        for w in params.slice_mut(&handle)? {
            *w = normal.sample(&mut *rng);
        }

        debug!(
            inputs = self.inputs,
            outputs = self.outputs,
            bias = self.bias,
            params = handle.len();
            "initialized fully connected layer"
        );

        self.x = Array1::zeros(self.inputs);
        self.a = Array1::zeros(self.outputs);
        self.y = Array1::zeros(self.outputs);
        self.yd = Array1::zeros(self.outputs);
        self.deltas = Array1::zeros(self.outputs);
        self.e = Array1::zeros(self.inputs);
        self.handle = Some(handle);
        self.state = State::Initialized;

        Ok(OutputInfo::flat(self.outputs))
    }

    fn forward_propagate(
        &mut self,
        params: &Parameters,
        x: ArrayView1<f64>,
    ) -> Result<ArrayView1<'_, f64>> {
        let handle = self.require_handle()?;
        Self::check_len("input", x.len(), self.inputs)?;

        let w = self.view(params.slice(handle)?)?;
        let inputs = self.inputs;

        linalg::general_mat_vec_mul(1.0, &w.slice(s![.., ..inputs]), &x, 0.0, &mut self.a);
        if self.bias {
            self.a += &w.column(inputs);
        }

        self.act_fn.apply(self.a.view(), self.y.view_mut());
        self.act_fn.apply_derivative(self.a.view(), self.yd.view_mut());

        self.x.assign(&x);
        self.state = State::Forwarded;

        Ok(self.y.view())
    }

    fn backpropagate(
        &mut self,
        params: &mut Parameters,
        ein: ArrayView1<f64>,
    ) -> Result<ArrayView1<'_, f64>> {
        let handle = self.require_handle()?.clone();
        if self.state != State::Forwarded {
            return Err(NnErr::MissingForwardPass);
        }
        Self::check_len("output gradient", ein.len(), self.outputs)?;

        let (raw_w, raw_wd) = params.split_mut(&handle)?;
        let w = self.view(raw_w)?;
        let mut wd = self.view_mut(raw_wd)?;
        let inputs = self.inputs;

        Zip::from(&mut self.deltas)
            .and(&ein)
            .and(&self.yd)
            .for_each(|d, &e, &yd| *d = e * yd);

        // Wd += deltas ⊗ [x, 1]
        for (mut row, &d) in wd.rows_mut().into_iter().zip(&self.deltas) {
            row.slice_mut(s![..inputs]).scaled_add(d, &self.x);
            if self.bias {
                row[inputs] += d;
            }
        }

        let w_t = w.slice_move(s![.., ..inputs]).reversed_axes();
        linalg::general_mat_vec_mul(1.0, &w_t, &self.deltas, 0.0, &mut self.e);

        Ok(self.e.view())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{Array2, array};
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn layer(inputs: usize, outputs: usize, bias: bool, act_fn: ActFn) -> FullyConnected {
        FullyConnected::new(&OutputInfo::flat(inputs), outputs, bias, act_fn, 0.5).unwrap()
    }

    fn initialized(
        inputs: usize,
        outputs: usize,
        bias: bool,
        act_fn: ActFn,
    ) -> (FullyConnected, Parameters) {
        let mut params = Parameters::new();
        let mut rng = StdRng::seed_from_u64(42);
        let mut fc = layer(inputs, outputs, bias, act_fn);
        fc.initialize(&mut params, &mut rng).unwrap();
        (fc, params)
    }

    fn set_weights(fc: &FullyConnected, params: &mut Parameters, w: Array2<f64>) {
        let handle = fc.handle().unwrap();
        params
            .slice_mut(handle)
            .unwrap()
            .copy_from_slice(w.as_slice().unwrap());
    }

    #[test]
    fn initialize_registers_parameters() {
        let mut params = Parameters::new();
        let _ = params.register(4);
        let mut rng = StdRng::seed_from_u64(42);

        let mut fc = layer(3, 2, true, ActFn::Tanh);
        let info = fc.initialize(&mut params, &mut rng).unwrap();

        assert_eq!(info, OutputInfo::flat(2));
        assert_eq!(fc.param_count(), 8);
        assert_eq!(fc.handle().unwrap().range(), 4..12);
        assert_eq!(params.len(), 12);
        assert!(params.params()[4..].iter().any(|&w| w != 0.0));
        assert!(params.grad().iter().all(|&g| g == 0.0));
        assert_eq!(fc.weights(&params).unwrap().dim(), (2, 4));
    }

    #[test]
    fn unregistered_parameters_are_rejected() {
        let mut params = Parameters::new();
        let _ = params.register(10);
        let mut rng = StdRng::seed_from_u64(42);
        let mut fc = layer(2, 2, true, ActFn::Linear);
        fc.initialize(&mut params, &mut rng).unwrap();

        let mut empty = Parameters::new();
        assert!(matches!(
            fc.forward_propagate(&empty, array![1.0, 2.0].view()),
            Err(NnErr::DimensionMismatch {
                what: "parameters",
                got: 0,
                expected: 16,
            })
        ));
        assert!(fc.weights(&empty).is_err());
        assert!(fc.gradient(&empty).is_err());

        fc.forward_propagate(&params, array![1.0, 2.0].view()).unwrap();
        assert!(fc.backpropagate(&mut empty, array![1.0, 1.0].view()).is_err());
        assert!(params.grad().iter().all(|&g| g == 0.0));
    }

    #[test]
    fn initialize_twice_fails() {
        let (mut fc, mut params) = initialized(2, 2, false, ActFn::Linear);
        let mut rng = StdRng::seed_from_u64(0);

        assert!(matches!(
            fc.initialize(&mut params, &mut rng),
            Err(NnErr::AlreadyInitialized)
        ));
    }

    #[test]
    fn zero_std_dev_gives_zero_weights() {
        let mut params = Parameters::new();
        let mut rng = StdRng::seed_from_u64(42);
        let mut fc =
            FullyConnected::new(&OutputInfo::flat(3), 3, true, ActFn::Linear, 0.0).unwrap();
        fc.initialize(&mut params, &mut rng).unwrap();

        assert!(params.params().iter().all(|&w| w == 0.0));
    }

    #[test]
    fn rejects_invalid_std_dev() {
        for std_dev in [-1.0, f64::NAN, f64::INFINITY] {
            let res = FullyConnected::new(&OutputInfo::flat(2), 1, false, ActFn::Linear, std_dev);
            assert!(matches!(res, Err(NnErr::InvalidStdDev(_))));
        }
    }

    #[test]
    fn flattens_multidimensional_inputs() {
        let fc = layer(0, 4, false, ActFn::Linear);
        assert_eq!(fc.inputs(), 0);

        let fc = FullyConnected::new(&OutputInfo::new(vec![2, 3]), 4, false, ActFn::Linear, 1.0)
            .unwrap();
        assert_eq!(fc.inputs(), 6);
    }

    #[test]
    fn forward_selects_weight_column() {
        let (mut fc, params) = initialized(3, 2, false, ActFn::Linear);
        let x = array![1.0, 0.0, 0.0];

        let y = fc.forward_propagate(&params, x.view()).unwrap().to_owned();
        let w = fc.weights(&params).unwrap();

        assert_eq!(y, w.column(0));
    }

    #[test]
    fn forward_adds_bias_and_activation() {
        let (mut fc, mut params) = initialized(2, 2, true, ActFn::Rectifier);
        set_weights(
            &fc,
            &mut params,
            array![[1.0, 2.0, 0.5], [-1.0, -1.0, 0.25]],
        );

        let y = fc
            .forward_propagate(&params, array![1.0, 1.0].view())
            .unwrap();

        assert_eq!(y, array![3.5, 0.0]);
    }

    #[test]
    fn backpropagate_computes_gradients() {
        let (mut fc, mut params) = initialized(2, 2, true, ActFn::Linear);
        set_weights(&fc, &mut params, array![[1.0, 2.0, 0.0], [3.0, 4.0, 0.0]]);

        fc.forward_propagate(&params, array![1.0, -1.0].view())
            .unwrap();
        let e = fc
            .backpropagate(&mut params, array![1.0, 0.5].view())
            .unwrap()
            .to_owned();

        // e = W^T · deltas
        assert_eq!(e, array![2.5, 4.0]);
        assert_eq!(
            fc.gradient(&params).unwrap(),
            array![[1.0, -1.0, 1.0], [0.5, -0.5, 0.5]]
        );
    }

    #[test]
    fn gradients_accumulate() {
        let (mut fc, mut params) = initialized(3, 2, true, ActFn::Tanh);
        let x1 = array![0.3, -0.2, 0.9];
        let x2 = array![-1.0, 0.4, 0.1];
        let ein1 = array![1.0, -2.0];
        let ein2 = array![0.5, 0.25];

        let mut single = |x: &Array1<f64>, ein: &Array1<f64>| {
            params.zero_grad();
            fc.forward_propagate(&params, x.view()).unwrap();
            fc.backpropagate(&mut params, ein.view()).unwrap();
            fc.gradient(&params).unwrap().to_owned()
        };
        let g1 = single(&x1, &ein1);
        let g2 = single(&x2, &ein2);

        params.zero_grad();
        for (x, ein) in [(&x1, &ein1), (&x2, &ein2)] {
            fc.forward_propagate(&params, x.view()).unwrap();
            fc.backpropagate(&mut params, ein.view()).unwrap();
        }

        let both = fc.gradient(&params).unwrap();
        let diff = (&both - &(g1 + g2)).mapv(f64::abs);
        assert!(diff.iter().all(|&d| d < 1e-12));
    }

    #[test]
    fn out_of_order_calls_fail() {
        let mut params = Parameters::new();
        let mut fc = layer(2, 1, false, ActFn::Linear);

        assert!(matches!(
            fc.forward_propagate(&params, array![1.0, 2.0].view()),
            Err(NnErr::UninitializedLayer)
        ));
        assert!(matches!(
            fc.backpropagate(&mut params, array![1.0].view()),
            Err(NnErr::UninitializedLayer)
        ));

        let mut rng = StdRng::seed_from_u64(42);
        fc.initialize(&mut params, &mut rng).unwrap();

        assert!(matches!(
            fc.backpropagate(&mut params, array![1.0].view()),
            Err(NnErr::MissingForwardPass)
        ));
    }

    #[test]
    fn dimension_mismatch() {
        let (mut fc, mut params) = initialized(3, 2, true, ActFn::Logistic);

        assert!(matches!(
            fc.forward_propagate(&params, array![1.0, 2.0].view()),
            Err(NnErr::DimensionMismatch {
                got: 2,
                expected: 3,
                ..
            })
        ));

        fc.forward_propagate(&params, array![1.0, 2.0, 3.0].view())
            .unwrap();
        assert!(matches!(
            fc.backpropagate(&mut params, array![1.0, 2.0, 3.0].view()),
            Err(NnErr::DimensionMismatch {
                got: 3,
                expected: 2,
                ..
            })
        ));
    }
}
