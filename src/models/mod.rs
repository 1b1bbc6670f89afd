/// Module for the image-captioning model.
pub mod captioning;
