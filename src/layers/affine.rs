use ndarray::{s, Array1, Array2, Array3, Axis};
use ndarray_rand::RandomExt;
use rand_distr::StandardNormal;

/// Holds gradients for affine layer parameters during backpropagation.
#[derive(Clone, Debug)]
pub struct AffineGradients {
    pub weight: Array2<f64>,
    pub bias: Array1<f64>,
}

/// A fully connected projection on batch-major data.
///
/// Performs the transformation `output = input · weight + bias` where
/// `weight` has shape (input_size, output_size) and `bias` has length
/// `output_size`. Inputs are (batch, input_size); the temporal variants apply
/// the same projection independently at every timestep of a
/// (batch, time, input_size) tensor.
#[derive(Clone, Debug)]
pub struct Affine {
    pub weight: Array2<f64>,
    pub bias: Array1<f64>,
}

impl Affine {
    /// Creates a new affine layer with weights drawn from a normal
    /// distribution scaled by 1/√fan-in and zero bias.
    pub fn new(input_size: usize, output_size: usize) -> Self {
        let scale = 1.0 / (input_size as f64).sqrt();
        let weight =
            Array2::random((input_size, output_size), StandardNormal).mapv(|w: f64| w * scale);
        let bias = Array1::zeros(output_size);

        Affine { weight, bias }
    }

    /// Creates an affine layer from explicit weights.
    pub fn from_weights(weight: Array2<f64>, bias: Array1<f64>) -> Self {
        assert_eq!(weight.ncols(), bias.len(),
                   "bias length {} doesn't match output size {}", bias.len(), weight.ncols());
        Affine { weight, bias }
    }

    pub fn input_size(&self) -> usize {
        self.weight.nrows()
    }

    pub fn output_size(&self) -> usize {
        self.weight.ncols()
    }

    /// Forward pass on a (batch, input_size) matrix.
    pub fn forward(&self, input: &Array2<f64>) -> Array2<f64> {
        assert_eq!(input.ncols(), self.input_size(),
                   "input feature size {} doesn't match layer input size {}",
                   input.ncols(), self.input_size());

        input.dot(&self.weight) + &self.bias
    }

    /// Backward pass on a (batch, input_size) matrix. Takes the input that
    /// was fed forward and the gradient w.r.t. the output; returns the
    /// parameter gradients and the gradient w.r.t. the input.
    pub fn backward(&self, input: &Array2<f64>, dout: &Array2<f64>) -> (AffineGradients, Array2<f64>) {
        assert_eq!(input.ncols(), self.input_size(),
                   "input feature size {} doesn't match layer input size {}",
                   input.ncols(), self.input_size());
        assert_eq!(dout.dim(), (input.nrows(), self.output_size()),
                   "output gradient shape {:?} doesn't match (batch {}, output {})",
                   dout.dim(), input.nrows(), self.output_size());

        let gradients = AffineGradients {
            weight: input.t().dot(dout),
            bias: dout.sum_axis(Axis(0)),
        };
        let dinput = dout.dot(&self.weight.t());

        (gradients, dinput)
    }

    /// Apply the projection at every timestep of a (batch, time, input_size)
    /// tensor, producing (batch, time, output_size).
    pub fn forward_temporal(&self, input: &Array3<f64>) -> Array3<f64> {
        let (n, t_len, d) = input.dim();
        assert_eq!(d, self.input_size(),
                   "input feature size {} doesn't match layer input size {}",
                   d, self.input_size());

        let mut out = Array3::zeros((n, t_len, self.output_size()));
        for t in 0..t_len {
            let x_t = input.slice(s![.., t, ..]);
            out.slice_mut(s![.., t, ..])
                .assign(&(x_t.dot(&self.weight) + &self.bias));
        }
        out
    }

    /// Backward pass for the temporal projection. Parameter gradients are
    /// summed over timesteps.
    pub fn backward_temporal(
        &self,
        input: &Array3<f64>,
        dout: &Array3<f64>,
    ) -> (AffineGradients, Array3<f64>) {
        let (n, t_len, d) = input.dim();
        assert_eq!(d, self.input_size(),
                   "input feature size {} doesn't match layer input size {}",
                   d, self.input_size());
        assert_eq!(dout.dim(), (n, t_len, self.output_size()),
                   "output gradient shape {:?} doesn't match ({}, {}, {})",
                   dout.dim(), n, t_len, self.output_size());

        let mut gradients = AffineGradients {
            weight: Array2::zeros(self.weight.raw_dim()),
            bias: Array1::zeros(self.bias.raw_dim()),
        };
        let mut dinput = Array3::zeros((n, t_len, d));

        for t in 0..t_len {
            let x_t = input.slice(s![.., t, ..]);
            let d_t = dout.slice(s![.., t, ..]);
            gradients.weight += &x_t.t().dot(&d_t);
            gradients.bias += &d_t.sum_axis(Axis(0));
            dinput.slice_mut(s![.., t, ..]).assign(&d_t.dot(&self.weight.t()));
        }

        (gradients, dinput)
    }
}
