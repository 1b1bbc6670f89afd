use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::layers::affine::Affine;
use crate::layers::embedding::WordEmbedding;
use crate::layers::lstm::LstmLayer;
use crate::models::captioning::CaptioningModel;
use crate::vocab::{Vocabulary, END_TOKEN, NULL_TOKEN, START_TOKEN};

/// Serializable form of an Array2<f64>.
#[derive(Serialize, Deserialize)]
struct StoredMatrix {
    data: Vec<f64>,
    shape: (usize, usize),
}

impl From<&Array2<f64>> for StoredMatrix {
    fn from(array: &Array2<f64>) -> Self {
        StoredMatrix {
            data: array.iter().cloned().collect(),
            shape: array.dim(),
        }
    }
}

impl StoredMatrix {
    fn into_array(self) -> Result<Array2<f64>, PersistenceError> {
        Array2::from_shape_vec(self.shape, self.data).map_err(|_| {
            PersistenceError::SerializationError(
                "stored matrix element count doesn't match its shape".to_string(),
            )
        })
    }
}

/// Stored parameters of a captioning model together with its vocabulary.
#[derive(Serialize, Deserialize)]
pub struct StoredCaptioningModel {
    tokens: Vec<String>,
    feature_proj_weight: StoredMatrix,
    feature_proj_bias: Vec<f64>,
    embedding_weight: StoredMatrix,
    lstm_wx: StoredMatrix,
    lstm_wh: StoredMatrix,
    lstm_b: Vec<f64>,
    vocab_proj_weight: StoredMatrix,
    vocab_proj_bias: Vec<f64>,
}

/// Model metadata for tracking training information.
#[derive(Serialize, Deserialize, Clone)]
pub struct ModelMetadata {
    pub model_name: String,
    pub version: String,
    pub created_at: String,
    pub input_dim: usize,
    pub wordvec_dim: usize,
    pub hidden_dim: usize,
    pub vocab_size: usize,
    pub total_epochs: usize,
    pub final_loss: Option<f64>,
    pub description: Option<String>,
}

/// Complete saved model including parameters, vocabulary, and metadata.
#[derive(Serialize, Deserialize)]
pub struct SavedModel {
    pub model: StoredCaptioningModel,
    pub metadata: ModelMetadata,
}

impl SavedModel {
    /// Rebuild the captioning model and its vocabulary from stored form.
    pub fn restore(self) -> Result<(CaptioningModel, Vocabulary), PersistenceError> {
        let stored = self.model;
        let has_reserved_tokens = stored.tokens.len() >= 3
            && stored.tokens[0] == NULL_TOKEN
            && stored.tokens[1] == START_TOKEN
            && stored.tokens[2] == END_TOKEN;
        if !has_reserved_tokens {
            return Err(PersistenceError::SerializationError(
                "stored vocabulary is missing its reserved tokens".to_string(),
            ));
        }
        let vocab = Vocabulary::from_tokens(stored.tokens);

        let feature_proj = Affine::from_weights(
            stored.feature_proj_weight.into_array()?,
            Array1::from_vec(stored.feature_proj_bias),
        );
        let embedding = WordEmbedding::from_weights(stored.embedding_weight.into_array()?);
        let lstm = LstmLayer::from_weights(
            stored.lstm_wx.into_array()?,
            stored.lstm_wh.into_array()?,
            Array1::from_vec(stored.lstm_b),
        );
        let vocab_proj = Affine::from_weights(
            stored.vocab_proj_weight.into_array()?,
            Array1::from_vec(stored.vocab_proj_bias),
        );

        let model = CaptioningModel::from_parts(feature_proj, embedding, lstm, vocab_proj, &vocab);
        Ok((model, vocab))
    }
}

/// Errors that can occur during model persistence operations.
#[derive(Debug)]
pub enum PersistenceError {
    IoError(std::io::Error),
    SerializationError(String),
}

impl std::fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistenceError::IoError(err) => write!(f, "IO error: {}", err),
            PersistenceError::SerializationError(err) => write!(f, "Serialization error: {}", err),
        }
    }
}

impl std::error::Error for PersistenceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PersistenceError::IoError(err) => Some(err),
            PersistenceError::SerializationError(_) => None,
        }
    }
}

impl From<std::io::Error> for PersistenceError {
    fn from(error: std::io::Error) -> Self {
        PersistenceError::IoError(error)
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(error: serde_json::Error) -> Self {
        PersistenceError::SerializationError(error.to_string())
    }
}

impl From<bincode::Error> for PersistenceError {
    fn from(error: bincode::Error) -> Self {
        PersistenceError::SerializationError(error.to_string())
    }
}

/// Model persistence operations.
pub struct ModelPersistence;

impl ModelPersistence {
    /// Package a model, its vocabulary, and training information for saving.
    pub fn create_saved_model(
        model: &CaptioningModel,
        vocab: &Vocabulary,
        model_name: String,
        total_epochs: usize,
        final_loss: Option<f64>,
        description: Option<String>,
    ) -> SavedModel {
        let metadata = ModelMetadata {
            model_name,
            version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            input_dim: model.input_dim(),
            wordvec_dim: model.wordvec_dim(),
            hidden_dim: model.hidden_dim(),
            vocab_size: model.vocab_size(),
            total_epochs,
            final_loss,
            description,
        };

        let stored = StoredCaptioningModel {
            tokens: vocab.tokens().to_vec(),
            feature_proj_weight: (&model.feature_proj.weight).into(),
            feature_proj_bias: model.feature_proj.bias.to_vec(),
            embedding_weight: (&model.embedding.weight).into(),
            lstm_wx: (&model.lstm.wx).into(),
            lstm_wh: (&model.lstm.wh).into(),
            lstm_b: model.lstm.b.to_vec(),
            vocab_proj_weight: (&model.vocab_proj.weight).into(),
            vocab_proj_bias: model.vocab_proj.bias.to_vec(),
        };

        SavedModel { model: stored, metadata }
    }

    /// Save model to JSON format (human-readable).
    pub fn save_to_json<P: AsRef<Path>>(model: &SavedModel, path: P) -> Result<(), PersistenceError> {
        let json = serde_json::to_string_pretty(model)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    /// Load model from JSON format.
    pub fn load_from_json<P: AsRef<Path>>(path: P) -> Result<SavedModel, PersistenceError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        let model = serde_json::from_str(&contents)?;
        Ok(model)
    }

    /// Save model to binary format (compact and fast).
    pub fn save_to_binary<P: AsRef<Path>>(model: &SavedModel, path: P) -> Result<(), PersistenceError> {
        let encoded = bincode::serialize(model)?;
        let mut file = File::create(path)?;
        file.write_all(&encoded)?;
        Ok(())
    }

    /// Load model from binary format.
    pub fn load_from_binary<P: AsRef<Path>>(path: P) -> Result<SavedModel, PersistenceError> {
        let mut file = File::open(path)?;
        let mut contents = Vec::new();
        file.read_to_end(&mut contents)?;
        let model = bincode::deserialize(&contents)?;
        Ok(model)
    }

    /// Save to a path, picking the format from the file extension:
    /// `.json` is JSON, anything else binary.
    pub fn save<P: AsRef<Path>>(model: &SavedModel, path: P) -> Result<(), PersistenceError> {
        match path.as_ref().extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::save_to_json(model, path),
            _ => Self::save_to_binary(model, path),
        }
    }

    /// Load from a path, picking the format from the file extension.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<SavedModel, PersistenceError> {
        match path.as_ref().extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::load_from_json(path),
            _ => Self::load_from_binary(path),
        }
    }
}
