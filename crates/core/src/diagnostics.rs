//! Diagnose-Abgriffe (Taps)
//!
//! Ein Tap bekommt eine Kopie der Samples an einem festen Punkt der
//! Pipeline (roh dekodiert bzw. fertig fuer die Ausgabe). Schreiben ist
//! best-effort: ein Tap darf den Echtzeit-Pfad nie blockieren und sein
//! Erfolg ist nie Bedingung fuer die Wiedergabe.

use std::sync::Arc;

/// Schreib-Schnittstelle fuer Diagnose-Samples
pub trait SampleTap: Send + Sync {
    /// Uebergibt Samples an den Tap. Muss ohne Blockieren zurueckkehren.
    fn write(&self, samples: &[f32]);
}

/// Geteilter Tap, der von mehreren Pipelines referenziert werden kann
pub type SharedTap = Arc<dyn SampleTap>;
