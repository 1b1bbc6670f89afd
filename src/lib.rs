//! # Caption LSTM
//!
//! The sequence-processing core of an image-captioning model: an LSTM layer
//! with exact backpropagation through time, plus the surrounding stages
//! needed to train and run a captioner.
//!
//! ## Core Components
//!
//! - **LSTM Layer**: single-timestep gating and full-sequence scans with
//!   cached intermediates for exact gradients
//! - **Captioning Model**: feature projection, word embedding, LSTM, and
//!   vocabulary scoring combined into one trainable loss
//! - **Training**: minibatch trainer with gradient clipping and validation
//! - **Optimizers**: SGD and Adam with per-parameter state
//! - **Persistence**: JSON and binary model checkpoints with metadata
//!
//! ## Quick Start
//!
//! ```rust
//! use caption_lstm::models::captioning::CaptioningModel;
//! use caption_lstm::training::create_adam_trainer;
//! use caption_lstm::vocab::Vocabulary;
//!
//! // Vocabulary plus a model mapping 64-dim image features to captions
//! let vocab = Vocabulary::from_words(&["a", "cat", "sits", "here"]);
//! let model = CaptioningModel::new(&vocab, 64, 32, 48);
//! let mut trainer = create_adam_trainer(model, 0.001);
//!
//! // Train on your (features, captions) batches
//! // trainer.train(&train_batches, Some(&validation_batches));
//! # let _ = &mut trainer;
//! ```

/// Main library module.
pub mod utils;
pub mod layers;
pub mod models;
pub mod loss;
pub mod vocab;
pub mod optimizers;
pub mod training;
pub mod persistence;

// Re-export commonly used items
pub use layers::lstm::{LstmGradients, LstmLayer, LstmStepCache};
pub use models::captioning::{CaptioningGradients, CaptioningModel};
pub use optimizers::{Adam, Optimizer, SGD};
pub use training::{CaptioningTrainer, TrainingConfig};
pub use vocab::Vocabulary;
pub use persistence::{ModelMetadata, ModelPersistence, PersistenceError, SavedModel};
