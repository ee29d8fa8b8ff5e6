//! Volume-Rampe
//!
//! Glaettet Lautstaerke- und Mute-Wechsel ueber genau eine Frame-Grenze:
//! innerhalb eines Frames wird linear vom bisherigen zum neuen Gain
//! interpoliert, dadurch entstehen keine Klicks.

use super::AudioProcessor;

/// Lineare Gain-Rampe ueber einen Frame
#[derive(Debug, Clone, Default)]
pub struct VolumeRamp {
    /// Gain am Ende des letzten Frames (`None` = noch kein Frame)
    current: Option<f32>,
    /// Ziel-Gain fuer den naechsten Frame
    target: f32,
}

impl VolumeRamp {
    pub fn new() -> Self {
        Self {
            current: None,
            target: 1.0,
        }
    }

    /// Setzt den Ziel-Gain (0.0 = stumm). Wird ab dem naechsten Frame angefahren.
    pub fn set_target(&mut self, gain: f32) {
        self.target = if gain.is_finite() { gain.max(0.0) } else { 0.0 };
    }

    /// Ziel-Gain
    pub fn target(&self) -> f32 {
        self.target
    }

    /// Gain am Ende des zuletzt verarbeiteten Frames
    pub fn current(&self) -> Option<f32> {
        self.current
    }
}

impl AudioProcessor for VolumeRamp {
    fn process(&mut self, samples: &mut [f32]) {
        if samples.is_empty() {
            return;
        }

        // Erster Frame springt direkt auf das Ziel
        let start = self.current.unwrap_or(self.target);
        let end = self.target;

        if (start - end).abs() < f32::EPSILON {
            if (end - 1.0).abs() >= f32::EPSILON {
                for s in samples.iter_mut() {
                    *s *= end;
                }
            }
        } else {
            let n = samples.len() as f32;
            let delta = end - start;
            for (i, s) in samples.iter_mut().enumerate() {
                *s *= start + delta * (i + 1) as f32 / n;
            }
        }

        self.current = Some(end);
    }

    fn reset(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn erster_frame_springt_auf_ziel() {
        let mut ramp = VolumeRamp::new();
        ramp.set_target(0.5);
        let mut buf = vec![1.0f32; 4];
        ramp.process(&mut buf);
        assert!(buf.iter().all(|&s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn wechsel_wird_linear_gerampt() {
        let mut ramp = VolumeRamp::new();
        let mut buf = vec![1.0f32; 4];
        ramp.process(&mut buf);

        ramp.set_target(0.0);
        let mut buf = vec![1.0f32; 4];
        ramp.process(&mut buf);
        assert!((buf[0] - 0.75).abs() < 1e-6);
        assert!((buf[1] - 0.5).abs() < 1e-6);
        assert!((buf[2] - 0.25).abs() < 1e-6);
        assert!(buf[3].abs() < 1e-6);

        // Danach konstant stumm
        let mut buf = vec![1.0f32; 4];
        ramp.process(&mut buf);
        assert!(buf.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn reset_vergisst_letzten_gain() {
        let mut ramp = VolumeRamp::new();
        ramp.set_target(0.2);
        ramp.process(&mut [1.0; 2]);
        ramp.reset();
        assert!(ramp.current().is_none());
    }

    #[test]
    fn ungueltiger_gain_wird_stumm() {
        let mut ramp = VolumeRamp::new();
        ramp.set_target(f32::NAN);
        assert_eq!(ramp.target(), 0.0);
        ramp.set_target(-3.0);
        assert_eq!(ramp.target(), 0.0);
    }
}
