use caption_lstm::models::captioning::CaptioningModel;
use caption_lstm::training::{create_adam_trainer, TrainingConfig};
use caption_lstm::vocab::Vocabulary;
use ndarray::Array2;

fn main() {
    let vocab = Vocabulary::from_words(&[
        "a", "cat", "dog", "bird", "sits", "runs", "flies", "here",
    ]);

    // Three synthetic "images", each tagged by a distinct feature pattern.
    let captions = [
        "a cat sits here",
        "a dog runs here",
        "a bird flies here",
    ];
    let caption_len = 7;
    let feature_dim = 6;

    let mut features = Array2::zeros((captions.len(), feature_dim));
    let mut encoded = Array2::zeros((captions.len(), caption_len));
    for (i, caption) in captions.iter().enumerate() {
        features[[i, i]] = 1.0;
        features[[i, feature_dim - 1 - i]] = -0.5;
        for (j, idx) in vocab.encode_padded(caption, caption_len).into_iter().enumerate() {
            encoded[[i, j]] = idx;
        }
    }

    let model = CaptioningModel::new(&vocab, feature_dim, 8, 16);
    let mut trainer = create_adam_trainer(model, 0.01).with_config(TrainingConfig {
        epochs: 300,
        print_every: 50,
        clip_gradient: Some(5.0),
    });

    let train_data = vec![(features.clone(), encoded)];
    trainer.train(&train_data, None);

    println!();
    let sampled = trainer.model.sample(&features, caption_len);
    for (i, caption) in captions.iter().enumerate() {
        let decoded = vocab.decode(&sampled.row(i).to_vec());
        println!("target: {:<20} sampled: {}", caption, decoded);
    }
}
