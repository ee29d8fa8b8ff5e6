//! # murmel-observability
//!
//! Observability-Crate fuer Murmel:
//! - Structured Logging via tracing-subscriber (text oder JSON)
//! - WAV-Diagnose-Taps fuer die Wiedergabe-Pipeline

pub mod logging;
pub mod wav_tap;

pub use logging::logging_initialisieren;
pub use wav_tap::{WavTap, WavTapError};
