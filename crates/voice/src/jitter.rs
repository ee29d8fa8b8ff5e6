//! Jitter-Schaetzer
//!
//! Rollierendes Fenster fester Kapazitaet ueber Ankunfts-Verzoegerungen.
//! Eine Ankunfts-Verzoegerung ist die Abweichung der tatsaechlichen
//! Ankunftszeit von der aus der Sequenznummer erwarteten:
//! `(t - t0) - (seq - seq0) * frame_dauer`.
//!
//! Summe und Quadratsumme werden laufend gepflegt, Standardabweichung und
//! Konfidenz sind damit O(1).

use std::collections::VecDeque;
use std::time::Duration;

/// Rollierende Jitter-Messung
#[derive(Debug, Clone)]
pub struct JitterEstimator {
    capacity: usize,
    /// Verzoegerungen in Sekunden
    delays: VecDeque<f64>,
    sum: f64,
    sum_sq: f64,
}

impl JitterEstimator {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            delays: VecDeque::with_capacity(capacity),
            sum: 0.0,
            sum_sq: 0.0,
        }
    }

    /// Fuegt eine Ankunfts-Verzoegerung (Sekunden, kann negativ sein) hinzu
    pub fn add(&mut self, delay_secs: f64) {
        if !delay_secs.is_finite() {
            return;
        }
        if self.delays.len() == self.capacity {
            if let Some(alt) = self.delays.pop_front() {
                self.sum -= alt;
                self.sum_sq -= alt * alt;
            }
        }
        self.delays.push_back(delay_secs);
        self.sum += delay_secs;
        self.sum_sq += delay_secs * delay_secs;
    }

    /// Standardabweichung der Verzoegerungen in Sekunden
    pub fn stddev(&self) -> f64 {
        let n = self.delays.len();
        if n < 2 {
            return 0.0;
        }
        let mittel = self.sum / n as f64;
        // Rundungsfehler der laufenden Summen koennen leicht negativ werden
        let varianz = (self.sum_sq / n as f64 - mittel * mittel).max(0.0);
        varianz.sqrt()
    }

    /// Fuellgrad des Fensters (0.0..1.0)
    pub fn confidence(&self) -> f64 {
        self.delays.len() as f64 / self.capacity as f64
    }

    /// Anzahl Messungen im Fenster
    pub fn len(&self) -> usize {
        self.delays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delays.is_empty()
    }

    pub fn clear(&mut self) {
        self.delays.clear();
        self.sum = 0.0;
        self.sum_sq = 0.0;
    }
}

/// Start-Verzoegerung einer Session aus der Jitter-Schaetzung:
/// `clamp(lerp(default, multiplier * stddev, confidence), min, max)`.
pub fn target_delay(
    default_delay: f64,
    multiplier: f64,
    stddev: f64,
    confidence: f64,
    min_delay: f64,
    max_delay: f64,
) -> Duration {
    let t = confidence.clamp(0.0, 1.0);
    let interpoliert = default_delay + (multiplier * stddev - default_delay) * t;
    // Untergrenze gewinnt, falls min > max konfiguriert ist
    let sekunden = interpoliert.min(max_delay).max(min_delay).max(0.0);
    Duration::from_secs_f64(sekunden)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn konstante_verzoegerung_hat_keinen_jitter() {
        let mut est = JitterEstimator::new(16);
        for _ in 0..10 {
            est.add(0.05);
        }
        assert!(est.stddev() < 1e-6);
        assert!((est.confidence() - 10.0 / 16.0).abs() < 1e-9);
    }

    #[test]
    fn standardabweichung_alternierend() {
        let mut est = JitterEstimator::new(128);
        for i in 0..128 {
            est.add(if i % 2 == 0 { 0.01 } else { -0.01 });
        }
        assert!((est.stddev() - 0.01).abs() < 1e-9);
        assert_eq!(est.confidence(), 1.0);
    }

    #[test]
    fn fenster_verdraengt_alte_werte() {
        let mut est = JitterEstimator::new(4);
        for _ in 0..4 {
            est.add(1.0);
        }
        for _ in 0..4 {
            est.add(0.0);
        }
        assert_eq!(est.len(), 4);
        assert!(est.stddev() < 1e-9);
    }

    #[test]
    fn clear_setzt_konfidenz_zurueck() {
        let mut est = JitterEstimator::new(4);
        est.add(0.3);
        est.clear();
        assert!(est.is_empty());
        assert_eq!(est.confidence(), 0.0);
    }

    #[test]
    fn zielverzoegerung_ohne_messung_ist_standard() {
        let d = target_delay(0.1, 2.5, 0.0, 0.0, 0.03, 0.75);
        assert!((d.as_secs_f64() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn zielverzoegerung_wird_geklemmt() {
        // 2.5 * 10ms = 25ms < 1.5 Frames a 20ms
        let d = target_delay(0.1, 2.5, 0.010, 1.0, 0.030, 0.75);
        assert!((d.as_secs_f64() - 0.030).abs() < 1e-6);

        let d = target_delay(0.1, 2.5, 1.0, 1.0, 0.030, 0.75);
        assert!((d.as_secs_f64() - 0.75).abs() < 1e-6);
    }

    #[test]
    fn zielverzoegerung_interpoliert() {
        // halbe Konfidenz: 0.1 + (0.2 - 0.1) * 0.5
        let d = target_delay(0.1, 2.5, 0.08, 0.5, 0.03, 0.75);
        assert!((d.as_secs_f64() - 0.15).abs() < 1e-6);
    }
}
