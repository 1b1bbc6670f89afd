use caption_lstm::{
    models::captioning::CaptioningModel,
    persistence::{ModelMetadata, ModelPersistence},
    vocab::Vocabulary,
};
use ndarray::Array;
use tempfile::tempdir;

fn test_model() -> (CaptioningModel, Vocabulary) {
    let vocab = Vocabulary::from_words(&["a", "cat", "sits"]);
    let model = CaptioningModel::new(&vocab, 6, 4, 5);
    (model, vocab)
}

#[test]
fn test_model_metadata_creation() {
    let metadata = ModelMetadata {
        model_name: "test_model".to_string(),
        version: "0.1.0".to_string(),
        created_at: "2024-01-01T00:00:00Z".to_string(),
        input_dim: 6,
        wordvec_dim: 4,
        hidden_dim: 5,
        vocab_size: 6,
        total_epochs: 100,
        final_loss: Some(0.01),
        description: Some("Test model for validation".to_string()),
    };

    assert_eq!(metadata.model_name, "test_model");
    assert_eq!(metadata.input_dim, 6);
    assert_eq!(metadata.hidden_dim, 5);
    assert_eq!(metadata.total_epochs, 100);
    assert_eq!(metadata.final_loss, Some(0.01));
}

#[test]
fn test_save_load_json_round_trip() {
    let dir = tempdir().unwrap();
    let file_path = dir.path().join("model.json");

    let (model, vocab) = test_model();
    let features = Array::linspace(-0.5, 0.5, 2 * 6).into_shape((2, 6)).unwrap();
    let captions_before = model.sample(&features, 5);

    let saved = ModelPersistence::create_saved_model(
        &model,
        &vocab,
        "json_model".to_string(),
        0,
        None,
        Some("Test JSON persistence".to_string()),
    );
    ModelPersistence::save_to_json(&saved, &file_path).unwrap();
    assert!(file_path.exists());

    let loaded = ModelPersistence::load_from_json(&file_path).unwrap();
    assert_eq!(loaded.metadata.model_name, "json_model");
    assert_eq!(loaded.metadata.input_dim, 6);
    assert_eq!(loaded.metadata.vocab_size, vocab.size());

    let (restored_model, restored_vocab) = loaded.restore().unwrap();
    assert_eq!(restored_vocab.size(), vocab.size());
    assert_eq!(restored_vocab.index_of("cat"), vocab.index_of("cat"));

    // The restored model must produce identical captions for the same input.
    let captions_after = restored_model.sample(&features, 5);
    assert_eq!(captions_before, captions_after);
}

#[test]
fn test_save_load_binary_round_trip() {
    let dir = tempdir().unwrap();
    let file_path = dir.path().join("model.bin");

    let (model, vocab) = test_model();
    let features = Array::linspace(-0.3, 0.7, 2 * 6).into_shape((2, 6)).unwrap();
    let captions = ndarray::arr2(&[[1usize, 3, 4, 2, 0], [1, 4, 5, 3, 2]]);
    let (loss_before, _) = model.loss(&features, &captions);

    let saved = ModelPersistence::create_saved_model(
        &model,
        &vocab,
        "binary_model".to_string(),
        50,
        Some(loss_before),
        None,
    );
    ModelPersistence::save_to_binary(&saved, &file_path).unwrap();
    assert!(file_path.exists());

    let loaded = ModelPersistence::load_from_binary(&file_path).unwrap();
    assert_eq!(loaded.metadata.total_epochs, 50);
    assert_eq!(loaded.metadata.final_loss, Some(loss_before));

    let (restored_model, _) = loaded.restore().unwrap();
    let (loss_after, _) = restored_model.loss(&features, &captions);

    assert!((loss_before - loss_after).abs() < 1e-12,
            "restored model loss differs: {} vs {}", loss_before, loss_after);
}

#[test]
fn test_extension_based_save_and_load() {
    let dir = tempdir().unwrap();
    let (model, vocab) = test_model();

    let saved = ModelPersistence::create_saved_model(
        &model,
        &vocab,
        "extension_model".to_string(),
        0,
        None,
        None,
    );

    let json_path = dir.path().join("model.json");
    ModelPersistence::save(&saved, &json_path).unwrap();
    assert!(ModelPersistence::load(&json_path).is_ok());

    // Unknown extensions fall back to the binary format.
    let other_path = dir.path().join("model.ckpt");
    ModelPersistence::save(&saved, &other_path).unwrap();
    assert!(ModelPersistence::load(&other_path).is_ok());
}

#[test]
fn test_create_saved_model_records_dimensions() {
    let (model, vocab) = test_model();

    let saved = ModelPersistence::create_saved_model(
        &model,
        &vocab,
        "dims_model".to_string(),
        200,
        Some(0.001),
        Some("Created via ModelPersistence".to_string()),
    );

    assert_eq!(saved.metadata.model_name, "dims_model");
    assert_eq!(saved.metadata.input_dim, 6);
    assert_eq!(saved.metadata.wordvec_dim, 4);
    assert_eq!(saved.metadata.hidden_dim, 5);
    assert_eq!(saved.metadata.vocab_size, 6);
    assert_eq!(saved.metadata.total_epochs, 200);
    assert_eq!(saved.metadata.final_loss, Some(0.001));
}

#[test]
fn test_error_handling() {
    // Loading a non-existent file fails with an error, not a panic.
    let result = ModelPersistence::load_from_json("/non/existent/path.json");
    assert!(result.is_err());

    // Saving to an invalid path fails gracefully.
    let (model, vocab) = test_model();
    let saved = ModelPersistence::create_saved_model(
        &model,
        &vocab,
        "error_model".to_string(),
        0,
        None,
        None,
    );
    let result = ModelPersistence::save_to_json(&saved, "/invalid/path/that/does/not/exist.json");
    assert!(result.is_err());
}
