//! Paketverlust-Schaetzer
//!
//! Exponentiell gewichteter Mittelwert ueber ein festes Fenster: solange
//! weniger als `window` Messungen vorliegen, ist es das arithmetische
//! Mittel, danach ein EWMA mit alpha = 1/window.

/// Laufende Schaetzung der Verlustrate (0.0..1.0)
#[derive(Debug, Clone)]
pub struct PacketLossEstimator {
    window: usize,
    samples: usize,
    ratio: f64,
}

impl PacketLossEstimator {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            samples: 0,
            ratio: 0.0,
        }
    }

    /// Verbucht einen gelesenen Frame (`lost = true` bei Verlust)
    pub fn update(&mut self, lost: bool) {
        if self.samples < self.window {
            self.samples += 1;
        }
        let x = if lost { 1.0 } else { 0.0 };
        self.ratio += (x - self.ratio) / self.samples as f64;
    }

    /// Aktuelle Verlustrate
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    pub fn reset(&mut self) {
        self.samples = 0;
        self.ratio = 0.0;
    }
}
