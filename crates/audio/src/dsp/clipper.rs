//! Clipper am Ende der Wiedergabe-Kette
//!
//! Unterhalb der Schwelle bleiben Samples unveraendert, darueber wird
//! weich (tanh) gegen 1.0 begrenzt. Nicht-endliche Werte werden zu 0.

use super::AudioProcessor;

/// Standard-Schwelle des weichen Knies
pub const DEFAULT_THRESHOLD: f32 = 0.95;

/// Soft-Clipper
#[derive(Debug, Clone)]
pub struct Clipper {
    threshold: f32,
    /// Anzahl begrenzter Samples seit dem letzten Reset
    clipped: u64,
}

impl Clipper {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold: threshold.clamp(0.1, 0.999),
            clipped: 0,
        }
    }

    /// Anzahl begrenzter Samples
    pub fn clipped(&self) -> u64 {
        self.clipped
    }

    #[inline]
    fn clip(&self, x: f32) -> f32 {
        if !x.is_finite() {
            return 0.0;
        }
        let betrag = x.abs();
        if betrag <= self.threshold {
            return x;
        }
        let knie = 1.0 - self.threshold;
        let y = self.threshold + knie * ((betrag - self.threshold) / knie).tanh();
        y.min(1.0).copysign(x)
    }
}

impl Default for Clipper {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl AudioProcessor for Clipper {
    fn process(&mut self, samples: &mut [f32]) {
        for s in samples.iter_mut() {
            let y = self.clip(*s);
            if y != *s {
                self.clipped += 1;
            }
            *s = y;
        }
    }

    fn reset(&mut self) {
        self.clipped = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leise_samples_unveraendert() {
        let mut c = Clipper::default();
        let mut buf = [0.0, 0.5, -0.9, 0.95];
        c.process(&mut buf);
        assert_eq!(buf, [0.0, 0.5, -0.9, 0.95]);
        assert_eq!(c.clipped(), 0);
    }

    #[test]
    fn laute_samples_begrenzt() {
        let mut c = Clipper::default();
        let mut buf = [100.0, -100.0, 1.2, -1.0];
        c.process(&mut buf);
        assert!(buf.iter().all(|s| s.abs() <= 1.0));
        assert!(buf[2] > 0.95 && buf[2] < 1.0);
        assert!(buf[1] < 0.0);
        assert_eq!(c.clipped(), 4);
    }

    #[test]
    fn nicht_endlich_wird_null() {
        let mut c = Clipper::default();
        let mut buf = [f32::NAN, f32::INFINITY, f32::NEG_INFINITY];
        c.process(&mut buf);
        assert_eq!(buf, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn kurve_ist_monoton() {
        let c = Clipper::default();
        let mut vorher = 0.0f32;
        for i in 0..400 {
            let y = c.clip(i as f32 / 100.0);
            assert!(y >= vorher);
            vorher = y;
        }
    }
}
