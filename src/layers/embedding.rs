use ndarray::{s, Array2, Array3};
use ndarray_rand::RandomExt;
use rand_distr::StandardNormal;

/// Word embedding table mapping vocabulary indices to dense vectors.
///
/// The table has one row per word: `weight` is (vocab_size, embed_dim).
/// Forward is a row lookup over a (batch, time) index matrix; backward
/// scatter-adds the upstream gradient back into the rows that were read.
#[derive(Clone, Debug)]
pub struct WordEmbedding {
    pub weight: Array2<f64>,
}

impl WordEmbedding {
    /// Creates a new embedding table with small random entries.
    pub fn new(vocab_size: usize, embed_dim: usize) -> Self {
        let weight =
            Array2::random((vocab_size, embed_dim), StandardNormal).mapv(|w: f64| w * 0.01);
        WordEmbedding { weight }
    }

    /// Creates an embedding table from an explicit weight matrix.
    pub fn from_weights(weight: Array2<f64>) -> Self {
        WordEmbedding { weight }
    }

    pub fn vocab_size(&self) -> usize {
        self.weight.nrows()
    }

    pub fn embed_dim(&self) -> usize {
        self.weight.ncols()
    }

    /// Look up the embedding vector for every position of a (batch, time)
    /// index matrix, producing a (batch, time, embed_dim) tensor.
    pub fn forward(&self, indices: &Array2<usize>) -> Array3<f64> {
        let (n, t_len) = indices.dim();
        let mut out = Array3::zeros((n, t_len, self.embed_dim()));
        for ((i, t), &idx) in indices.indexed_iter() {
            assert!(idx < self.vocab_size(),
                    "word index {} out of range for vocabulary of {}", idx, self.vocab_size());
            out.slice_mut(s![i, t, ..]).assign(&self.weight.row(idx));
        }
        out
    }

    /// Accumulate the gradient w.r.t. the embedding table. Rows looked up
    /// more than once receive the sum of their positions' gradients.
    pub fn backward(&self, indices: &Array2<usize>, dout: &Array3<f64>) -> Array2<f64> {
        let (n, t_len) = indices.dim();
        assert_eq!(dout.dim(), (n, t_len, self.embed_dim()),
                   "embedding gradient shape {:?} doesn't match ({}, {}, {})",
                   dout.dim(), n, t_len, self.embed_dim());

        let mut dweight = Array2::zeros(self.weight.raw_dim());
        for ((i, t), &idx) in indices.indexed_iter() {
            let mut row = dweight.row_mut(idx);
            row += &dout.slice(s![i, t, ..]);
        }
        dweight
    }
}
