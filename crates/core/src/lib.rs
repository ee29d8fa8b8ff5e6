//! murmel-core – Gemeinsame Typen, Fehlertypen und Diagnose-Schnittstellen
//!
//! Dieses Crate stellt die Wert-Typen bereit, die zwischen Transport,
//! Codec-Schicht und Wiedergabe-Pipeline ausgetauscht werden.

pub mod diagnostics;
pub mod error;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use diagnostics::{SampleTap, SharedTap};
pub use error::{MurmelError, Result};
pub use types::{
    ChannelKind, ChannelPriority, Codec, FrameFormat, PlaybackOptions, PlayerId, RemoteChannel,
    SessionContext, WaveFormat,
};
