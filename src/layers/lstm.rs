use ndarray::{s, Array1, Array2, Array3, Axis};
use ndarray_rand::RandomExt;
use rand_distr::StandardNormal;

use crate::utils::{sigmoid, tanh};

/// Holds gradients for the LSTM parameters, accumulated over timesteps
/// during backpropagation through time.
#[derive(Clone, Debug)]
pub struct LstmGradients {
    pub wx: Array2<f64>,
    pub wh: Array2<f64>,
    pub b: Array1<f64>,
}

/// Caches intermediate values from one timestep's forward pass so the
/// backward pass can compute exact gradients without recomputation.
///
/// A cache is produced by `step_forward` and consumed exactly once by
/// `step_backward`.
#[derive(Clone, Debug)]
pub struct LstmStepCache {
    pub x: Array2<f64>,
    pub h_prev: Array2<f64>,
    pub c_prev: Array2<f64>,
    pub input_gate: Array2<f64>,
    pub forget_gate: Array2<f64>,
    pub output_gate: Array2<f64>,
    pub cell_gate: Array2<f64>,
    pub c_next: Array2<f64>,
    pub tanh_c_next: Array2<f64>,
}

/// LSTM layer operating on batch-major tensors.
///
/// Implements the standard LSTM equations:
/// - a_t = x_t · Wx + h_t-1 · Wh + b
/// - i_t = σ(a_i), f_t = σ(a_f), o_t = σ(a_o), g_t = tanh(a_g)
/// - c_t = f_t ⊙ c_t-1 + i_t ⊙ g_t
/// - h_t = o_t ⊙ tanh(c_t)
///
/// The combined weight matrices pack all four gates into `4 * hidden_size`
/// columns so one matrix multiply produces every pre-activation at once.
/// The column layout is fixed: `[input | forget | output | cell]`, each block
/// `hidden_size` wide. Reference outputs depend on this ordering, so it must
/// not be rearranged.
///
/// `wx` has shape (input_size, 4*hidden_size), `wh` has shape
/// (hidden_size, 4*hidden_size), and `b` has length 4*hidden_size. Inputs are
/// (batch, input_size) per step or (batch, time, input_size) for sequences.
#[derive(Clone, Debug)]
pub struct LstmLayer {
    pub wx: Array2<f64>,
    pub wh: Array2<f64>,
    pub b: Array1<f64>,
    pub input_size: usize,
    pub hidden_size: usize,
}

impl LstmLayer {
    /// Creates a new LSTM layer with weights drawn from a normal
    /// distribution scaled by 1/√fan-in and zero bias.
    pub fn new(input_size: usize, hidden_size: usize) -> Self {
        let wx_scale = 1.0 / (input_size as f64).sqrt();
        let wh_scale = 1.0 / (hidden_size as f64).sqrt();

        let wx = Array2::random((input_size, 4 * hidden_size), StandardNormal)
            .mapv(|w: f64| w * wx_scale);
        let wh = Array2::random((hidden_size, 4 * hidden_size), StandardNormal)
            .mapv(|w: f64| w * wh_scale);
        let b = Array1::zeros(4 * hidden_size);

        LstmLayer { wx, wh, b, input_size, hidden_size }
    }

    /// Creates a layer from explicit weights, checking shape consistency.
    pub fn from_weights(wx: Array2<f64>, wh: Array2<f64>, b: Array1<f64>) -> Self {
        let (input_size, gate_width) = wx.dim();
        assert_eq!(gate_width % 4, 0,
                   "gate width {} doesn't split into four equal blocks", gate_width);
        let hidden_size = gate_width / 4;
        assert_eq!(wh.dim(), (hidden_size, gate_width),
                   "recurrent weight shape {:?} doesn't match ({}, {})",
                   wh.dim(), hidden_size, gate_width);
        assert_eq!(b.len(), gate_width,
                   "bias length {} doesn't match gate width {}", b.len(), gate_width);

        LstmLayer { wx, wh, b, input_size, hidden_size }
    }

    /// Forward pass for a single timestep.
    ///
    /// Takes the step input `x` (batch, input_size) together with the previous
    /// hidden and cell states (batch, hidden_size) and returns the next hidden
    /// state, next cell state, and the cache for the backward pass.
    pub fn step_forward(
        &self,
        x: &Array2<f64>,
        h_prev: &Array2<f64>,
        c_prev: &Array2<f64>,
    ) -> (Array2<f64>, Array2<f64>, LstmStepCache) {
        let n = x.nrows();
        let h = self.hidden_size;
        assert_eq!(x.ncols(), self.input_size,
                   "input feature size {} doesn't match layer input size {}",
                   x.ncols(), self.input_size);
        assert_eq!(h_prev.dim(), (n, h),
                   "hidden state shape {:?} doesn't match (batch {}, hidden {})",
                   h_prev.dim(), n, h);
        assert_eq!(c_prev.dim(), (n, h),
                   "cell state shape {:?} doesn't match (batch {}, hidden {})",
                   c_prev.dim(), n, h);

        // All four gate pre-activations in one multiply; columns follow the
        // fixed [input | forget | output | cell] layout.
        let a = x.dot(&self.wx) + h_prev.dot(&self.wh) + &self.b;

        let input_gate = a.slice(s![.., 0..h]).mapv(sigmoid);
        let forget_gate = a.slice(s![.., h..2 * h]).mapv(sigmoid);
        let output_gate = a.slice(s![.., 2 * h..3 * h]).mapv(sigmoid);
        let cell_gate = a.slice(s![.., 3 * h..4 * h]).mapv(tanh);

        // Cell state update: f_t ⊙ c_t-1 + i_t ⊙ g_t
        let c_next = &forget_gate * c_prev + &input_gate * &cell_gate;
        let tanh_c_next = c_next.mapv(tanh);

        // Hidden state: o_t ⊙ tanh(c_t)
        let h_next = &output_gate * &tanh_c_next;

        let cache = LstmStepCache {
            x: x.clone(),
            h_prev: h_prev.clone(),
            c_prev: c_prev.clone(),
            input_gate,
            forget_gate,
            output_gate,
            cell_gate,
            c_next: c_next.clone(),
            tanh_c_next,
        };

        (h_next, c_next, cache)
    }

    /// Backward pass for a single timestep.
    ///
    /// `dh_next` is the gradient w.r.t. the step's hidden state and `dc_next`
    /// the gradient arriving directly at its cell state (zero at the last
    /// timestep). Returns the parameter gradients together with the gradients
    /// w.r.t. the step input, previous hidden state, and previous cell state.
    pub fn step_backward(
        &self,
        dh_next: &Array2<f64>,
        dc_next: &Array2<f64>,
        cache: &LstmStepCache,
    ) -> (LstmGradients, Array2<f64>, Array2<f64>, Array2<f64>) {
        let n = dh_next.nrows();
        let h = self.hidden_size;
        assert_eq!(dh_next.dim(), (n, h),
                   "hidden gradient shape {:?} doesn't match (batch {}, hidden {})",
                   dh_next.dim(), n, h);
        assert_eq!(dc_next.dim(), (n, h),
                   "cell gradient shape {:?} doesn't match (batch {}, hidden {})",
                   dc_next.dim(), n, h);

        // Cell gradient accumulates the direct path with the path through
        // h_t = o_t ⊙ tanh(c_t).
        let dc_total =
            dc_next + &(dh_next * &cache.output_gate * &cache.tanh_c_next.mapv(|t| 1.0 - t * t));

        // Output gate: ∂L/∂o_t = ∂L/∂h_t ⊙ tanh(c_t)
        let do_t = dh_next * &cache.tanh_c_next;
        let da_o = &do_t * &cache.output_gate * &cache.output_gate.mapv(|o| 1.0 - o);

        // Input gate: ∂L/∂i_t = ∂L/∂c_t ⊙ g_t
        let di_t = &dc_total * &cache.cell_gate;
        let da_i = &di_t * &cache.input_gate * &cache.input_gate.mapv(|i| 1.0 - i);

        // Forget gate: ∂L/∂f_t = ∂L/∂c_t ⊙ c_t-1
        let df_t = &dc_total * &cache.c_prev;
        let da_f = &df_t * &cache.forget_gate * &cache.forget_gate.mapv(|f| 1.0 - f);

        // Cell gate: ∂L/∂g_t = ∂L/∂c_t ⊙ i_t
        let dg_t = &dc_total * &cache.input_gate;
        let da_g = &dg_t * &cache.cell_gate.mapv(|g| 1.0 - g * g);

        let dc_prev = &dc_total * &cache.forget_gate;

        // Pre-activation gradients concatenated in the forward column layout.
        let mut da = Array2::zeros((n, 4 * h));
        da.slice_mut(s![.., 0..h]).assign(&da_i);
        da.slice_mut(s![.., h..2 * h]).assign(&da_f);
        da.slice_mut(s![.., 2 * h..3 * h]).assign(&da_o);
        da.slice_mut(s![.., 3 * h..4 * h]).assign(&da_g);

        let dx = da.dot(&self.wx.t());
        let dh_prev = da.dot(&self.wh.t());

        let gradients = LstmGradients {
            wx: cache.x.t().dot(&da),
            wh: cache.h_prev.t().dot(&da),
            b: da.sum_axis(Axis(0)),
        };

        (gradients, dx, dh_prev, dc_prev)
    }

    /// Forward pass over a whole sequence.
    ///
    /// `x` is (batch, time, input_size) and `h0` the initial hidden state
    /// (batch, hidden_size). The initial cell state is always the zero matrix;
    /// callers supply only `h0`. Timesteps run strictly in order since each
    /// step depends on the previous hidden and cell states. Returns the full
    /// hidden-state sequence (batch, time, hidden_size) and one cache per
    /// timestep for the backward pass.
    pub fn forward(&self, x: &Array3<f64>, h0: &Array2<f64>) -> (Array3<f64>, Vec<LstmStepCache>) {
        let (n, t_len, d) = x.dim();
        assert_eq!(d, self.input_size,
                   "input feature size {} doesn't match layer input size {}",
                   d, self.input_size);
        assert_eq!(h0.dim(), (n, self.hidden_size),
                   "initial hidden state shape {:?} doesn't match (batch {}, hidden {})",
                   h0.dim(), n, self.hidden_size);

        let mut h = h0.clone();
        let mut c = Array2::zeros((n, self.hidden_size));
        let mut h_out = Array3::zeros((n, t_len, self.hidden_size));
        let mut caches = Vec::with_capacity(t_len);

        for t in 0..t_len {
            let x_t = x.slice(s![.., t, ..]).to_owned();
            let (h_next, c_next, cache) = self.step_forward(&x_t, &h, &c);
            h_out.slice_mut(s![.., t, ..]).assign(&h_next);
            caches.push(cache);
            h = h_next;
            c = c_next;
        }

        (h_out, caches)
    }

    /// Backward pass over a whole sequence (backpropagation through time).
    ///
    /// `dh_out` carries the gradient w.r.t. every timestep's hidden state.
    /// Timesteps are visited in reverse order: the running `dh`/`dc` relayed
    /// from the later step is combined with the external gradient at each
    /// step, parameter gradients are summed across steps, and the final
    /// running `dh` is the gradient w.r.t. `h0`. Returns
    /// `(parameter gradients, dx, dh0)`.
    pub fn backward(
        &self,
        dh_out: &Array3<f64>,
        caches: &[LstmStepCache],
    ) -> (LstmGradients, Array3<f64>, Array2<f64>) {
        let (n, t_len, h) = dh_out.dim();
        assert_eq!(h, self.hidden_size,
                   "hidden gradient size {} doesn't match hidden size {}", h, self.hidden_size);
        assert_eq!(t_len, caches.len(),
                   "timestep count {} doesn't match cached step count {}", t_len, caches.len());

        let mut dx = Array3::zeros((n, t_len, self.input_size));
        let mut dh_next = Array2::zeros((n, h));
        let mut dc_next = Array2::zeros((n, h));
        let mut total = self.zero_gradients();

        for t in (0..t_len).rev() {
            let dh_step = dh_out.slice(s![.., t, ..]).to_owned() + &dh_next;
            let (step_gradients, dx_t, dh_prev, dc_prev) =
                self.step_backward(&dh_step, &dc_next, &caches[t]);

            dx.slice_mut(s![.., t, ..]).assign(&dx_t);
            total.wx += &step_gradients.wx;
            total.wh += &step_gradients.wh;
            total.b += &step_gradients.b;

            dh_next = dh_prev;
            dc_next = dc_prev;
        }

        (total, dx, dh_next)
    }

    /// Initialize zero gradients for accumulation.
    pub fn zero_gradients(&self) -> LstmGradients {
        LstmGradients {
            wx: Array2::zeros(self.wx.raw_dim()),
            wh: Array2::zeros(self.wh.raw_dim()),
            b: Array1::zeros(self.b.raw_dim()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    fn linspace2(start: f64, end: f64, shape: (usize, usize)) -> Array2<f64> {
        Array::linspace(start, end, shape.0 * shape.1)
            .into_shape(shape)
            .unwrap()
    }

    fn linspace3(start: f64, end: f64, shape: (usize, usize, usize)) -> Array3<f64> {
        Array::linspace(start, end, shape.0 * shape.1 * shape.2)
            .into_shape(shape)
            .unwrap()
    }

    fn assert_all_close<'a, I, J>(actual: I, expected: J, tol: f64)
    where
        I: IntoIterator<Item = &'a f64>,
        J: IntoIterator<Item = &'a f64>,
    {
        for (i, (a, e)) in actual.into_iter().zip(expected.into_iter()).enumerate() {
            let denom = a.abs().max(e.abs()).max(1e-8);
            let rel_err = (a - e).abs() / denom;
            assert!(rel_err < tol, "element {}: actual={}, expected={}, rel_err={}", i, a, e, rel_err);
        }
    }

    #[test]
    fn test_step_forward_shapes_and_ranges() {
        let layer = LstmLayer::new(7, 5);
        let x = linspace2(-1.0, 1.0, (3, 7));
        let h_prev = linspace2(-0.5, 0.5, (3, 5));
        let c_prev = linspace2(-0.2, 0.8, (3, 5));

        let (h_next, c_next, cache) = layer.step_forward(&x, &h_prev, &c_prev);

        assert_eq!(h_next.dim(), (3, 5));
        assert_eq!(c_next.dim(), (3, 5));
        assert!(h_next.iter().all(|&v| v > -1.0 && v < 1.0));
        assert!(cache.input_gate.iter().all(|&v| v > 0.0 && v < 1.0));
        assert!(cache.forget_gate.iter().all(|&v| v > 0.0 && v < 1.0));
        assert!(cache.output_gate.iter().all(|&v| v > 0.0 && v < 1.0));
        assert!(cache.cell_gate.iter().all(|&v| v > -1.0 && v < 1.0));
    }

    #[test]
    fn test_step_forward_reference_values() {
        let (n, d, h) = (3, 4, 5);
        let x = linspace2(-0.4, 1.2, (n, d));
        let prev_h = linspace2(-0.3, 0.7, (n, h));
        let prev_c = linspace2(-0.4, 0.9, (n, h));
        let layer = LstmLayer::from_weights(
            linspace2(-2.1, 1.3, (d, 4 * h)),
            linspace2(-0.7, 2.2, (h, 4 * h)),
            Array::linspace(0.3, 0.7, 4 * h),
        );

        let (next_h, next_c, _) = layer.step_forward(&x, &prev_h, &prev_c);

        let expected_h = [
            0.2463515712130560, 0.2861088310204610, 0.3224046717698407, 0.3552580659462120, 0.3847490360597991,
            0.4922356330388874, 0.5561143066113930, 0.6150769568006216, 0.6684400284823044, 0.7159181044743833,
            0.5673566412055159, 0.6631012687159011, 0.7441926638979893, 0.8088966499118183, 0.8582989976238190,
        ];
        let expected_c = [
            0.3298617631411131, 0.3914513854479588, 0.4515559995998391, 0.5101411614491792, 0.5671740736872735,
            0.6638225524637820, 0.7667400672312344, 0.8719599431928136, 0.9790270949487470, 1.0875134523752901,
            0.7419200783768546, 0.9059215066785872, 1.0771700614501034, 1.2512023261758540, 1.4239567632592633,
        ];
        assert_all_close(&next_h, expected_h.iter(), 1e-8);
        assert_all_close(&next_c, expected_c.iter(), 1e-8);
    }

    #[test]
    fn test_sequence_forward_reference_values() {
        let (n, d, h, t) = (2, 5, 4, 3);
        let x = linspace3(-0.4, 0.6, (n, t, d));
        let h0 = linspace2(-0.4, 0.8, (n, h));
        let layer = LstmLayer::from_weights(
            linspace2(-0.2, 0.9, (d, 4 * h)),
            linspace2(-0.3, 0.6, (h, 4 * h)),
            Array::linspace(0.2, 0.7, 4 * h),
        );

        let (h_out, caches) = layer.forward(&x, &h0);

        assert_eq!(h_out.dim(), (n, t, h));
        assert_eq!(caches.len(), t);

        let expected = [
            0.0176400830378117, 0.0182323321675706, 0.0188267070450384, 0.0194232031624358,
            0.1128749091966074, 0.1214622846397786, 0.1301844644282288, 0.1390293879084018,
            0.3135876793272156, 0.3333862715638398, 0.3530445311295058, 0.3725097476682581,
            0.4576787865956006, 0.4761091991628703, 0.4936887023441315, 0.5104194522063022,
            0.6704845009080801, 0.6935008904076980, 0.7148601377683882, 0.7346449026659515,
            0.8173351139038457, 0.8367787124968340, 0.8540375323364592, 0.8693531429947408,
        ];
        assert_all_close(&h_out, expected.iter(), 1e-7);
    }

    #[test]
    fn test_zero_input_produces_zero_hidden_states() {
        let (n, d, h, t) = (2, 3, 4, 5);
        let layer = LstmLayer::from_weights(
            linspace2(-1.0, 1.0, (d, 4 * h)),
            linspace2(-0.5, 0.5, (h, 4 * h)),
            Array1::zeros(4 * h),
        );

        let x = Array3::zeros((n, t, d));
        let h0 = Array2::zeros((n, h));
        let (h_out, _) = layer.forward(&x, &h0);

        // With zero input, state, and bias, the block input g is tanh(0) = 0,
        // so the cell and hidden states stay exactly zero at every step.
        assert!(h_out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_forward_is_deterministic() {
        let (n, d, h, t) = (2, 4, 3, 4);
        let layer = LstmLayer::from_weights(
            linspace2(-0.8, 0.8, (d, 4 * h)),
            linspace2(-0.4, 0.4, (h, 4 * h)),
            Array::linspace(-0.1, 0.1, 4 * h),
        );
        let x = linspace3(-0.6, 0.6, (n, t, d));
        let h0 = linspace2(-0.2, 0.2, (n, h));

        let (first, _) = layer.forward(&x, &h0);
        let (second, _) = layer.forward(&x, &h0);

        assert_eq!(first, second);
    }

    #[test]
    fn test_backward_shapes() {
        let (n, d, h, t) = (3, 4, 5, 2);
        let layer = LstmLayer::new(d, h);
        let x = linspace3(-0.5, 0.5, (n, t, d));
        let h0 = linspace2(-0.3, 0.3, (n, h));

        let (h_out, caches) = layer.forward(&x, &h0);
        let dh_out = Array3::ones(h_out.raw_dim());
        let (gradients, dx, dh0) = layer.backward(&dh_out, &caches);

        assert_eq!(dx.dim(), (n, t, d));
        assert_eq!(dh0.dim(), (n, h));
        assert_eq!(gradients.wx.dim(), (d, 4 * h));
        assert_eq!(gradients.wh.dim(), (h, 4 * h));
        assert_eq!(gradients.b.len(), 4 * h);
    }

    #[test]
    #[should_panic(expected = "initial hidden state shape")]
    fn test_forward_rejects_mismatched_h0() {
        let layer = LstmLayer::new(3, 4);
        let x = Array3::zeros((2, 5, 3));
        let h0 = Array2::zeros((2, 6));
        layer.forward(&x, &h0);
    }
}
