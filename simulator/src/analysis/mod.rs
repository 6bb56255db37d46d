//! Deterministic stand-ins for the service's signal processing.

pub mod audio;
pub mod classify;
pub mod doppler;
pub mod graph;
pub mod spectrogram;
pub mod table;
