use ndarray::{azip, Array, ArrayD, Dimension};
use std::collections::HashMap;

/// Optimizer trait for parameter updates during training.
///
/// Parameters are identified by name so optimizers with per-parameter state
/// (moment estimates, step counts) can keep it across calls. The same trait
/// covers matrices and bias vectors.
pub trait Optimizer {
    /// Update one named parameter tensor in place from its gradient.
    fn update<D: Dimension>(&mut self, param_id: &str, param: &mut Array<f64, D>, gradient: &Array<f64, D>);

    /// Clear any accumulated per-parameter state.
    fn reset(&mut self);
}

/// Stochastic Gradient Descent: θ = θ - η∇θ
pub struct SGD {
    learning_rate: f64,
}

impl SGD {
    pub fn new(learning_rate: f64) -> Self {
        SGD { learning_rate }
    }
}

impl Optimizer for SGD {
    fn update<D: Dimension>(&mut self, _param_id: &str, param: &mut Array<f64, D>, gradient: &Array<f64, D>) {
        assert_eq!(param.shape(), gradient.shape(),
                   "parameter shape {:?} doesn't match gradient shape {:?}",
                   param.shape(), gradient.shape());

        let lr = self.learning_rate;
        param.zip_mut_with(gradient, |p, &g| *p -= lr * g);
    }

    fn reset(&mut self) {
        // SGD has no state to reset
    }
}

/// Adam optimizer with adaptive learning rates.
///
/// Implements: m_t = β₁m_{t-1} + (1-β₁)g_t
///             v_t = β₂v_{t-1} + (1-β₂)g_t²
///             θ_t = θ_{t-1} - η * m̂_t / (√v̂_t + ε)
/// where m̂_t and v̂_t are bias-corrected estimates. Moment estimates and the
/// bias-correction step count are kept per parameter id.
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    steps: HashMap<String, i32>,
    m: HashMap<String, ArrayD<f64>>,
    v: HashMap<String, ArrayD<f64>>,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Adam::with_params(learning_rate, 0.9, 0.999, 1e-8)
    }

    pub fn with_params(learning_rate: f64, beta1: f64, beta2: f64, epsilon: f64) -> Self {
        Adam {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            steps: HashMap::new(),
            m: HashMap::new(),
            v: HashMap::new(),
        }
    }
}

impl Optimizer for Adam {
    fn update<D: Dimension>(&mut self, param_id: &str, param: &mut Array<f64, D>, gradient: &Array<f64, D>) {
        assert_eq!(param.shape(), gradient.shape(),
                   "parameter shape {:?} doesn't match gradient shape {:?}",
                   param.shape(), gradient.shape());

        let (lr, beta1, beta2, epsilon) = (self.learning_rate, self.beta1, self.beta2, self.epsilon);
        let grad = gradient.view().into_dyn();

        let t = *self
            .steps
            .entry(param_id.to_string())
            .and_modify(|t| *t += 1)
            .or_insert(1);

        let m = self
            .m
            .entry(param_id.to_string())
            .or_insert_with(|| ArrayD::zeros(grad.raw_dim()));
        m.zip_mut_with(&grad, |m, &g| *m = beta1 * *m + (1.0 - beta1) * g);

        let v = self
            .v
            .entry(param_id.to_string())
            .or_insert_with(|| ArrayD::zeros(grad.raw_dim()));
        v.zip_mut_with(&grad, |v, &g| *v = beta2 * *v + (1.0 - beta2) * g * g);

        let bias1 = 1.0 - beta1.powi(t);
        let bias2 = 1.0 - beta2.powi(t);

        let m = &self.m[param_id];
        let v = &self.v[param_id];
        let mut param = param.view_mut().into_dyn();
        azip!((p in &mut param, &m in m, &v in v) {
            *p -= lr * (m / bias1) / ((v / bias2).sqrt() + epsilon);
        });
    }

    fn reset(&mut self) {
        self.steps.clear();
        self.m.clear();
        self.v.clear();
    }
}
