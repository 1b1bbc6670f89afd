/// Module for the LSTM recurrence.
pub mod lstm;

/// Module for word embedding lookup.
pub mod embedding;

/// Module for affine projections.
pub mod affine;
