//! Fehlertypen fuer Murmel
//!
//! Zentraler Fehler-Enum fuer Validierungsfehler der gemeinsamen Typen.
//! Die Fach-Crates definieren eigene Fehler und konvertieren via `#[from]`.

use thiserror::Error;

/// Globaler Result-Alias fuer Murmel
pub type Result<T> = std::result::Result<T, MurmelError>;

/// Fehler der gemeinsamen Typen
#[derive(Debug, Error)]
pub enum MurmelError {
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    #[error("Ungueltiges Frame-Format: {0}")]
    UngueltigesFormat(String),

    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl MurmelError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        let e = MurmelError::UngueltigesFormat("frame_size=0".into());
        assert_eq!(e.to_string(), "Ungueltiges Frame-Format: frame_size=0");
    }

    #[test]
    fn intern_konstruktor() {
        let e = MurmelError::intern("kaputt");
        assert!(matches!(e, MurmelError::Intern(ref m) if m == "kaputt"));
    }
}
