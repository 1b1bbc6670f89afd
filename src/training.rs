use ndarray::{Array, Array2, Dimension};
use std::time::Instant;

use crate::models::captioning::{CaptioningGradients, CaptioningModel};
use crate::optimizers::{Adam, Optimizer, SGD};

/// A minibatch of image features paired with encoded caption rows.
pub type CaptionBatch = (Array2<f64>, Array2<usize>);

/// Configuration for training hyperparameters.
pub struct TrainingConfig {
    pub epochs: usize,
    pub print_every: usize,
    pub clip_gradient: Option<f64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            epochs: 100,
            print_every: 10,
            clip_gradient: Some(5.0),
        }
    }
}

/// Training metrics tracked per epoch.
#[derive(Debug, Clone)]
pub struct TrainingMetrics {
    pub epoch: usize,
    pub train_loss: f64,
    pub validation_loss: Option<f64>,
    pub time_elapsed: f64,
}

/// Trainer for the captioning model with a configurable optimizer.
pub struct CaptioningTrainer<O: Optimizer> {
    pub model: CaptioningModel,
    pub optimizer: O,
    pub config: TrainingConfig,
    pub metrics_history: Vec<TrainingMetrics>,
}

impl<O: Optimizer> CaptioningTrainer<O> {
    pub fn new(model: CaptioningModel, optimizer: O) -> Self {
        CaptioningTrainer {
            model,
            optimizer,
            config: TrainingConfig::default(),
            metrics_history: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: TrainingConfig) -> Self {
        self.config = config;
        self
    }

    /// One optimization step on a single minibatch. Returns the batch loss.
    pub fn train_batch(&mut self, features: &Array2<f64>, captions: &Array2<usize>) -> f64 {
        let (loss, mut gradients) = self.model.loss(features, captions);

        // Clip gradients to prevent them from exploding through the recurrence
        if let Some(clip_value) = self.config.clip_gradient {
            clip_gradients(&mut gradients, clip_value);
        }

        self.model.update_parameters(&gradients, &mut self.optimizer);
        loss
    }

    /// Train for multiple epochs with optional validation.
    pub fn train(&mut self, train_data: &[CaptionBatch], validation_data: Option<&[CaptionBatch]>) {
        println!("Starting training for {} epochs...", self.config.epochs);

        for epoch in 0..self.config.epochs {
            let start_time = Instant::now();
            let mut epoch_loss = 0.0;

            for (features, captions) in train_data {
                epoch_loss += self.train_batch(features, captions);
            }
            epoch_loss /= train_data.len() as f64;

            let validation_loss = validation_data.map(|val_data| self.evaluate(val_data));
            let time_elapsed = start_time.elapsed().as_secs_f64();

            self.metrics_history.push(TrainingMetrics {
                epoch,
                train_loss: epoch_loss,
                validation_loss,
                time_elapsed,
            });

            if epoch % self.config.print_every == 0 {
                if let Some(val_loss) = validation_loss {
                    println!("Epoch {}: Train Loss: {:.6}, Val Loss: {:.6}, Time: {:.2}s",
                             epoch, epoch_loss, val_loss, time_elapsed);
                } else {
                    println!("Epoch {}: Train Loss: {:.6}, Time: {:.2}s",
                             epoch, epoch_loss, time_elapsed);
                }
            }
        }

        println!("Training completed!");
    }

    /// Mean loss over a dataset without updating parameters.
    pub fn evaluate(&self, data: &[CaptionBatch]) -> f64 {
        if data.is_empty() {
            return 0.0;
        }

        let total: f64 = data
            .iter()
            .map(|(features, captions)| self.model.loss(features, captions).0)
            .sum();
        total / data.len() as f64
    }

    pub fn get_latest_metrics(&self) -> Option<&TrainingMetrics> {
        self.metrics_history.last()
    }

    pub fn get_metrics_history(&self) -> &[TrainingMetrics] {
        &self.metrics_history
    }
}

fn clip_gradients(gradients: &mut CaptioningGradients, max_norm: f64) {
    clip_gradient_tensor(&mut gradients.feature_proj.weight, max_norm);
    clip_gradient_tensor(&mut gradients.feature_proj.bias, max_norm);
    clip_gradient_tensor(&mut gradients.embedding, max_norm);
    clip_gradient_tensor(&mut gradients.lstm.wx, max_norm);
    clip_gradient_tensor(&mut gradients.lstm.wh, max_norm);
    clip_gradient_tensor(&mut gradients.lstm.b, max_norm);
    clip_gradient_tensor(&mut gradients.vocab_proj.weight, max_norm);
    clip_gradient_tensor(&mut gradients.vocab_proj.bias, max_norm);
}

fn clip_gradient_tensor<D: Dimension>(gradient: &mut Array<f64, D>, max_norm: f64) {
    let norm = gradient.iter().map(|g| g * g).sum::<f64>().sqrt();
    if norm > max_norm {
        let scale = max_norm / norm;
        gradient.mapv_inplace(|g| g * scale);
    }
}

/// Create a trainer with the Adam optimizer, the usual captioning setup.
pub fn create_adam_trainer(model: CaptioningModel, learning_rate: f64) -> CaptioningTrainer<Adam> {
    CaptioningTrainer::new(model, Adam::new(learning_rate))
}

/// Create a trainer with plain SGD.
pub fn create_basic_trainer(model: CaptioningModel, learning_rate: f64) -> CaptioningTrainer<SGD> {
    CaptioningTrainer::new(model, SGD::new(learning_rate))
}
