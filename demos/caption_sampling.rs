use caption_lstm::models::captioning::CaptioningModel;
use caption_lstm::persistence::ModelPersistence;
use caption_lstm::vocab::Vocabulary;
use ndarray::Array;

fn main() {
    let vocab = Vocabulary::from_words(&["a", "cat", "dog", "sits", "runs", "here"]);
    let model = CaptioningModel::new(&vocab, 10, 6, 8);

    // Greedy decoding for a small batch of feature vectors.
    let features = Array::linspace(-1.0, 1.0, 3 * 10).into_shape((3, 10)).unwrap();
    let sampled = model.sample(&features, 8);

    for (i, row) in sampled.rows().into_iter().enumerate() {
        println!("image {}: {:?} -> \"{}\"", i, row.to_vec(), vocab.decode(&row.to_vec()));
    }

    // Round-trip the untrained model through a checkpoint.
    let saved = ModelPersistence::create_saved_model(
        &model,
        &vocab,
        "sampling_demo".to_string(),
        0,
        None,
        Some("Untrained demo model".to_string()),
    );
    let dir = std::env::temp_dir();
    let path = dir.join("caption_sampling_demo.json");
    ModelPersistence::save(&saved, &path).expect("failed to save demo checkpoint");
    let loaded = ModelPersistence::load(&path).expect("failed to load demo checkpoint");
    let (restored, _) = loaded.restore().expect("failed to restore demo checkpoint");

    let resampled = restored.sample(&features, 8);
    println!("restored model matches: {}", sampled == resampled);
}
