use ndarray::{s, Array1, Array2};

use crate::layers::affine::{Affine, AffineGradients};
use crate::layers::embedding::WordEmbedding;
use crate::layers::lstm::{LstmGradients, LstmLayer};
use crate::loss::temporal_softmax_loss;
use crate::optimizers::Optimizer;
use crate::vocab::Vocabulary;

/// Gradients for every trainable parameter of the captioning model.
#[derive(Clone, Debug)]
pub struct CaptioningGradients {
    pub feature_proj: AffineGradients,
    pub embedding: Array2<f64>,
    pub lstm: LstmGradients,
    pub vocab_proj: AffineGradients,
}

/// Image-captioning model: a feature projection seeding the hidden state, a
/// word embedding, an LSTM over the caption, and a projection to vocabulary
/// scores.
///
/// The image feature vector becomes the initial hidden state through the
/// feature projection; the initial cell state is always zero. Training uses
/// teacher forcing: the caption minus its last word is the input sequence,
/// the caption minus its first word is the target sequence, and `<NULL>`
/// padding is excluded from the loss.
#[derive(Clone, Debug)]
pub struct CaptioningModel {
    pub feature_proj: Affine,
    pub embedding: WordEmbedding,
    pub lstm: LstmLayer,
    pub vocab_proj: Affine,
    null_index: usize,
    start_index: usize,
}

impl CaptioningModel {
    /// Creates a new captioning model with random initialization.
    ///
    /// `input_dim` is the image feature size, `wordvec_dim` the embedding
    /// size, and `hidden_dim` the LSTM state size. The vocabulary fixes the
    /// score dimension and the reserved token indices.
    pub fn new(vocab: &Vocabulary, input_dim: usize, wordvec_dim: usize, hidden_dim: usize) -> Self {
        CaptioningModel {
            feature_proj: Affine::new(input_dim, hidden_dim),
            embedding: WordEmbedding::new(vocab.size(), wordvec_dim),
            lstm: LstmLayer::new(wordvec_dim, hidden_dim),
            vocab_proj: Affine::new(hidden_dim, vocab.size()),
            null_index: vocab.null_index(),
            start_index: vocab.start_index(),
        }
    }

    /// Assembles a model from existing layers, checking that their
    /// dimensions agree.
    pub fn from_parts(
        feature_proj: Affine,
        embedding: WordEmbedding,
        lstm: LstmLayer,
        vocab_proj: Affine,
        vocab: &Vocabulary,
    ) -> Self {
        assert_eq!(embedding.embed_dim(), lstm.input_size,
                   "embedding size {} doesn't match LSTM input size {}",
                   embedding.embed_dim(), lstm.input_size);
        assert_eq!(feature_proj.output_size(), lstm.hidden_size,
                   "feature projection output {} doesn't match hidden size {}",
                   feature_proj.output_size(), lstm.hidden_size);
        assert_eq!(vocab_proj.input_size(), lstm.hidden_size,
                   "vocabulary projection input {} doesn't match hidden size {}",
                   vocab_proj.input_size(), lstm.hidden_size);
        assert_eq!(embedding.vocab_size(), vocab.size(),
                   "embedding rows {} don't match vocabulary size {}",
                   embedding.vocab_size(), vocab.size());
        assert_eq!(vocab_proj.output_size(), vocab.size(),
                   "vocabulary projection output {} doesn't match vocabulary size {}",
                   vocab_proj.output_size(), vocab.size());

        CaptioningModel {
            feature_proj,
            embedding,
            lstm,
            vocab_proj,
            null_index: vocab.null_index(),
            start_index: vocab.start_index(),
        }
    }

    pub fn input_dim(&self) -> usize {
        self.feature_proj.input_size()
    }

    pub fn wordvec_dim(&self) -> usize {
        self.embedding.embed_dim()
    }

    pub fn hidden_dim(&self) -> usize {
        self.lstm.hidden_size
    }

    pub fn vocab_size(&self) -> usize {
        self.embedding.vocab_size()
    }

    pub fn null_index(&self) -> usize {
        self.null_index
    }

    pub fn start_index(&self) -> usize {
        self.start_index
    }

    /// Training loss and gradients for a minibatch.
    ///
    /// `features` is (batch, input_dim) and `captions` (batch, caption_len)
    /// with at least two words per caption. Runs the full forward pipeline,
    /// then backpropagates through every stage and returns the loss together
    /// with gradients for all parameters.
    pub fn loss(&self, features: &Array2<f64>, captions: &Array2<usize>) -> (f64, CaptioningGradients) {
        let (n, caption_len) = captions.dim();
        assert!(caption_len >= 2,
                "caption length {} leaves nothing to predict", caption_len);
        assert_eq!(features.dim(), (n, self.input_dim()),
                   "feature shape {:?} doesn't match (batch {}, input {})",
                   features.dim(), n, self.input_dim());

        // Teacher forcing: the model reads word t and must predict word t+1.
        let captions_in = captions.slice(s![.., ..caption_len - 1]).to_owned();
        let captions_out = captions.slice(s![.., 1..]).to_owned();
        let mask = captions_out.mapv(|w| w != self.null_index);

        let h0 = self.feature_proj.forward(features);
        let x = self.embedding.forward(&captions_in);
        let (h_out, caches) = self.lstm.forward(&x, &h0);
        let scores = self.vocab_proj.forward_temporal(&h_out);
        let (loss, dscores) = temporal_softmax_loss(&scores, &captions_out, &mask);

        let (vocab_proj_grads, dh_out) = self.vocab_proj.backward_temporal(&h_out, &dscores);
        let (lstm_grads, dx, dh0) = self.lstm.backward(&dh_out, &caches);
        let embedding_grads = self.embedding.backward(&captions_in, &dx);
        let (feature_proj_grads, _dfeatures) = self.feature_proj.backward(features, &dh0);

        let gradients = CaptioningGradients {
            feature_proj: feature_proj_grads,
            embedding: embedding_grads,
            lstm: lstm_grads,
            vocab_proj: vocab_proj_grads,
        };

        (loss, gradients)
    }

    /// Generate captions for a feature batch by greedy decoding.
    ///
    /// Starting from `<START>`, each step embeds the previous word, advances
    /// the LSTM one timestep, and picks the highest-scoring word. Returns a
    /// (batch, max_length) index matrix.
    pub fn sample(&self, features: &Array2<f64>, max_length: usize) -> Array2<usize> {
        let n = features.nrows();
        assert_eq!(features.ncols(), self.input_dim(),
                   "feature size {} doesn't match model input size {}",
                   features.ncols(), self.input_dim());

        let mut captions = Array2::from_elem((n, max_length), self.null_index);
        let mut h = self.feature_proj.forward(features);
        let mut c = Array2::zeros((n, self.hidden_dim()));
        let mut words = Array1::from_elem(n, self.start_index);

        for t in 0..max_length {
            let mut x = Array2::zeros((n, self.wordvec_dim()));
            for (i, &word) in words.iter().enumerate() {
                x.row_mut(i).assign(&self.embedding.weight.row(word));
            }

            let (h_next, c_next, _) = self.lstm.step_forward(&x, &h, &c);
            let scores = self.vocab_proj.forward(&h_next);

            for i in 0..n {
                let row = scores.row(i);
                let mut best = 0;
                for (j, &score) in row.iter().enumerate() {
                    if score > row[best] {
                        best = j;
                    }
                }
                captions[[i, t]] = best;
                words[i] = best;
            }

            h = h_next;
            c = c_next;
        }

        captions
    }

    /// Apply gradients to every parameter using the provided optimizer.
    pub fn update_parameters<O: Optimizer>(&mut self, gradients: &CaptioningGradients, optimizer: &mut O) {
        optimizer.update("feature_proj_weight", &mut self.feature_proj.weight, &gradients.feature_proj.weight);
        optimizer.update("feature_proj_bias", &mut self.feature_proj.bias, &gradients.feature_proj.bias);
        optimizer.update("embedding_weight", &mut self.embedding.weight, &gradients.embedding);
        optimizer.update("lstm_wx", &mut self.lstm.wx, &gradients.lstm.wx);
        optimizer.update("lstm_wh", &mut self.lstm.wh, &gradients.lstm.wh);
        optimizer.update("lstm_b", &mut self.lstm.b, &gradients.lstm.b);
        optimizer.update("vocab_proj_weight", &mut self.vocab_proj.weight, &gradients.vocab_proj.weight);
        optimizer.update("vocab_proj_bias", &mut self.vocab_proj.bias, &gradients.vocab_proj.bias);
    }
}
