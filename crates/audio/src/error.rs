//! Fehlertypen fuer Codec und DSP

use murmel_core::MurmelError;
use thiserror::Error;

/// Alle moeglichen Fehler der Audio-Schicht
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Codec-Fehler: {0}")]
    CodecFehler(String),

    #[error("Decoder nicht verfuegbar: {0}")]
    DecoderNichtVerfuegbar(String),

    /// Decoder lieferte nicht exakt eine Frame-Laenge. Interner
    /// Konsistenzfehler, wird nie wiederholt.
    #[error("Dekodierte Frame-Laenge falsch: erwartet {erwartet}, erhalten {erhalten}")]
    FrameLaengeFalsch { erwartet: usize, erhalten: usize },

    #[error(transparent)]
    Format(#[from] MurmelError),
}

pub type AudioResult<T> = Result<T, AudioError>;
