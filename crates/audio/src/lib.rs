//! murmel-audio – Codec-Schnittstelle und Sample-DSP
//!
//! Bausteine der Wiedergabe-Pipeline unterhalb der Session-Logik:
//! - Schmale Decoder-Schnittstelle mit fester Variantenmenge (Opus, Identity, Stille)
//! - Encoder fuer Tests und Simulation
//! - Volume-Rampe gegen Klicks bei Lautstaerke-Wechseln
//! - Resampler mit Wiedergabe-Raten-Korrektur
//! - Soft-Clipper am Ende der Kette

pub mod codec;
pub mod dsp;
pub mod error;

// Bequeme Re-Exporte der wichtigsten Typen
pub use codec::{Decoder, Encoder, FrameDecoder, IdentityDecoder, OpusDecoder, SilenceDecoder};
pub use dsp::{clipper::Clipper, resampler::Resampler, volume_ramp::VolumeRamp, AudioProcessor};
pub use error::{AudioError, AudioResult};
