//! Client-side playback and comparison controller for the signal dashboard.
//!
//! Analysis happens on a remote service; this crate owns what happens around
//! it: upload intake, streaming the returned waveform on a fixed cadence,
//! debouncing parameter changes into recomputes, and keeping comparison
//! viewers on a shared zoom window.

pub mod channels;
pub mod config;
pub mod controller;
pub mod intake;
pub mod interface;
pub mod pipeline;
pub mod prelude;
pub mod presentation;
pub mod runtime;
pub mod telemetry;

pub use controller::{Completion, Effect, Feedback, SignalController};
pub use prelude::{AnalysisBackend, DashResult, DashboardError, DopplerSynthesis};
pub use runtime::{spawn, DashboardHandle};
