//! Sample-DSP der Wiedergabe-Kette
//!
//! Volume-Rampe und Clipper arbeiten in-place ueber das `AudioProcessor`
//! Trait. Der Resampler zieht seine Eingabe selbst (Pull-Modell) und hat
//! deshalb eine eigene `read`-Signatur.

pub mod clipper;
pub mod resampler;
pub mod volume_ramp;

/// Gemeinsames Trait fuer In-Place-Prozessoren
///
/// Verarbeitung darf nicht allozieren und nicht blockieren, sie laeuft im
/// Ausgabe-Kontext der Audio-Engine.
pub trait AudioProcessor: Send + Sync {
    /// Verarbeitet einen Puffer von Samples in-place
    fn process(&mut self, samples: &mut [f32]);

    /// Setzt den internen Zustand zurueck (neue Session)
    fn reset(&mut self);
}
