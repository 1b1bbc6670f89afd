use ndarray::{s, Array2, Array3};

/// Numerically stable softmax over the rows of a (batch, classes) matrix.
pub fn softmax(x: &Array2<f64>) -> Array2<f64> {
    let mut out = Array2::zeros(x.raw_dim());
    for (mut out_row, row) in out.rows_mut().into_iter().zip(x.rows()) {
        let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        let mut sum = 0.0;
        for (o, &v) in out_row.iter_mut().zip(row) {
            *o = (v - max).exp();
            sum += *o;
        }
        out_row.mapv_inplace(|e| e / sum);
    }
    out
}

/// Softmax cross-entropy over every timestep of a score tensor.
///
/// `scores` is (batch, time, vocab); `targets` holds the expected word index
/// at each position and `mask` marks the positions that contribute to the
/// loss, so padding can be excluded. The loss is summed over all unmasked
/// positions and divided by the batch size. Returns the scalar loss and the
/// gradient w.r.t. `scores`; masked positions receive zero gradient.
pub fn temporal_softmax_loss(
    scores: &Array3<f64>,
    targets: &Array2<usize>,
    mask: &Array2<bool>,
) -> (f64, Array3<f64>) {
    let (n, t_len, v) = scores.dim();
    assert_eq!(targets.dim(), (n, t_len),
               "target shape {:?} doesn't match (batch {}, time {})", targets.dim(), n, t_len);
    assert_eq!(mask.dim(), (n, t_len),
               "mask shape {:?} doesn't match (batch {}, time {})", mask.dim(), n, t_len);

    let mut loss = 0.0;
    let mut dscores = Array3::zeros((n, t_len, v));

    for i in 0..n {
        for t in 0..t_len {
            if !mask[[i, t]] {
                continue;
            }
            let target = targets[[i, t]];
            assert!(target < v, "target index {} out of range for {} classes", target, v);

            let row = scores.slice(s![i, t, ..]);
            let max = row.fold(f64::NEG_INFINITY, |m, &s| m.max(s));
            let mut sum = 0.0;
            for &score in row {
                sum += (score - max).exp();
            }

            // log p(target) = s_target - max - log Σ exp(s - max)
            loss -= row[target] - max - sum.ln();

            let mut drow = dscores.slice_mut(s![i, t, ..]);
            for (j, (d, &score)) in drow.iter_mut().zip(row).enumerate() {
                let p = (score - max).exp() / sum;
                *d = (p - if j == target { 1.0 } else { 0.0 }) / n as f64;
            }
        }
    }

    (loss / n as f64, dscores)
}
