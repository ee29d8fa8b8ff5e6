//! Fehlertypen der Wiedergabe-Pipeline

use murmel_audio::AudioError;
use murmel_core::{MurmelError, PlayerId};
use thiserror::Error;

/// Fehler der Voice-Schicht
#[derive(Debug, Error)]
pub enum VoiceError {
    /// Fehler aus Codec oder DSP (u.a. falsche Frame-Laenge, fatal)
    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error(transparent)]
    Core(#[from] MurmelError),

    /// Frame empfangen, aber keine Session aktiv
    #[error("Keine aktive Session")]
    SessionFehlt,

    /// Frame eines anderen Sprechers als dem der aktiven Session
    #[error("Frame von {erhalten}, aktive Session gehoert {erwartet}")]
    FalscherSprecher { erwartet: PlayerId, erhalten: PlayerId },

    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),
}

pub type VoiceResult<T> = Result<T, VoiceError>;

impl VoiceError {
    /// Gibt zurueck ob der Fehler die Wiedergabe beenden muss
    pub fn ist_fatal(&self) -> bool {
        matches!(
            self,
            VoiceError::Audio(AudioError::FrameLaengeFalsch { .. })
        )
    }
}
