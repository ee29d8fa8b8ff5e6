//! Resampler der Wiedergabe-Kette
//!
//! Wandelt die native Pipeline-Rate in die Ausgabe-Rate der Audio-Engine
//! um. Die Wiedergabe-Rate des Synchronizers geht als zusaetzlicher
//! Faktor ein: bei Rate 1.05 werden 5% mehr Eingangs-Samples verbraucht.
//!
//! Lineare Interpolation im Streaming-Betrieb. Der letzte Eingangs-Sample
//! des vorherigen Aufrufs bleibt als Stuetzstelle erhalten, die
//! Bruchteil-Position laeuft ueber Aufrufgrenzen weiter.

use crate::error::AudioResult;

/// Relative Rate-Aenderung, ab der die Schrittweite neu berechnet wird
const RATE_HYSTERESE: f64 = 0.01;

/// Streaming-Resampler (Pull-Modell)
#[derive(Debug, Clone)]
pub struct Resampler {
    input_rate: u32,
    output_rate: u32,
    /// Zuletzt uebernommene Wiedergabe-Rate
    playback_rate: f64,
    /// Eingangs-Samples pro Ausgangs-Sample
    step: f64,
    /// Bruchteil-Position relativ zu `last`
    frac: f64,
    /// Letzter Eingangs-Sample des vorherigen Aufrufs
    last: f32,
    /// `scratch[0]` = `last`, danach frisch gezogene Samples
    scratch: Vec<f32>,
    complete: bool,
}

impl Resampler {
    pub fn new(input_rate: u32, output_rate: u32) -> Self {
        let input_rate = input_rate.max(1);
        let output_rate = output_rate.max(1);
        Self {
            input_rate,
            output_rate,
            playback_rate: 1.0,
            step: input_rate as f64 / output_rate as f64,
            frac: 0.0,
            last: 0.0,
            // Reicht fuer 100ms bei 48kHz ohne Nachallokation
            scratch: vec![0.0; 4_800],
            complete: false,
        }
    }

    /// Aendert die Ausgabe-Rate (Geraetewechsel der Audio-Engine)
    pub fn set_output_rate(&mut self, output_rate: u32) {
        let output_rate = output_rate.max(1);
        if output_rate != self.output_rate {
            self.output_rate = output_rate;
            self.recompute();
        }
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// Aktuell wirksame Wiedergabe-Rate
    pub fn playback_rate(&self) -> f64 {
        self.playback_rate
    }

    /// Fuellt `out` vollstaendig mit Samples in Ausgabe-Rate.
    ///
    /// `playback_rate` ist die Korrektur des Synchronizers, `upstream`
    /// liefert Samples in nativer Rate und meldet `true`, sobald die
    /// Quelle erschoepft ist. Gibt denselben Abschluss-Status zurueck.
    pub fn read<F>(&mut self, out: &mut [f32], playback_rate: f64, mut upstream: F) -> AudioResult<bool>
    where
        F: FnMut(&mut [f32]) -> AudioResult<bool>,
    {
        if out.is_empty() {
            return Ok(self.complete);
        }

        if playback_rate.is_finite()
            && playback_rate > 0.0
            && ((playback_rate - self.playback_rate) / self.playback_rate).abs() > RATE_HYSTERESE
        {
            self.playback_rate = playback_rate;
            self.recompute();
        }

        let n = out.len();
        let p_last = self.frac + (n - 1) as f64 * self.step;
        let p_end = self.frac + n as f64 * self.step;
        let benoetigt = (p_last.floor() as usize + 1).max(p_end.floor() as usize);

        if self.scratch.len() < benoetigt + 1 {
            self.scratch.resize(benoetigt + 1, 0.0);
        }

        self.scratch[0] = self.last;
        if benoetigt > 0 {
            self.complete = upstream(&mut self.scratch[1..=benoetigt])?;
        }

        let quelle = &self.scratch[..=benoetigt];
        for (i, o) in out.iter_mut().enumerate() {
            let p = self.frac + i as f64 * self.step;
            let k = p.floor() as usize;
            let t = (p - k as f64) as f32;
            let a = quelle[k];
            let b = quelle[(k + 1).min(benoetigt)];
            *o = a + (b - a) * t;
        }

        let k_end = p_end.floor() as usize;
        self.last = quelle[k_end];
        self.frac = p_end - k_end as f64;

        Ok(self.complete)
    }

    /// Setzt Interpolations-Zustand und Rate zurueck
    pub fn reset(&mut self) {
        self.playback_rate = 1.0;
        self.recompute();
        self.frac = 0.0;
        self.last = 0.0;
        self.complete = false;
    }

    fn recompute(&mut self) {
        self.step = self.input_rate as f64 * self.playback_rate / self.output_rate as f64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Quelle, die fortlaufend 0, 1, 2, ... liefert und die Anzahl
    /// gezogener Samples mitzaehlt
    struct Rampe {
        next: f32,
        gezogen: usize,
        limit: usize,
    }

    impl Rampe {
        fn new(limit: usize) -> Self {
            Self {
                next: 0.0,
                gezogen: 0,
                limit,
            }
        }

        fn pull(&mut self, buf: &mut [f32]) -> AudioResult<bool> {
            for s in buf.iter_mut() {
                *s = self.next;
                self.next += 1.0;
            }
            self.gezogen += buf.len();
            Ok(self.gezogen >= self.limit)
        }
    }

    #[test]
    fn gleiche_rate_ist_durchreichen() {
        let mut r = Resampler::new(48_000, 48_000);
        let mut src = Rampe::new(usize::MAX);
        let mut out = vec![0.0f32; 480];
        r.read(&mut out, 1.0, |b| src.pull(b)).unwrap();
        assert_eq!(src.gezogen, 480);
        // Ein Sample Verzoegerung durch die Stuetzstelle
        assert_eq!(out[0], 0.0);
        assert_eq!(out[1], 0.0);
        assert_eq!(out[479], 478.0);

        r.read(&mut out, 1.0, |b| src.pull(b)).unwrap();
        assert_eq!(src.gezogen, 960);
        assert_eq!(out[0], 479.0);
    }

    #[test]
    fn downsampling_verbraucht_mehr_eingang() {
        let mut r = Resampler::new(48_000, 16_000);
        let mut src = Rampe::new(usize::MAX);
        let mut out = vec![0.0f32; 160];
        for _ in 0..10 {
            r.read(&mut out, 1.0, |b| src.pull(b)).unwrap();
        }
        assert_eq!(src.gezogen, 4_800);
    }

    #[test]
    fn upsampling_interpoliert() {
        let mut r = Resampler::new(16_000, 48_000);
        let mut src = Rampe::new(usize::MAX);
        let mut out = vec![0.0f32; 480];
        r.read(&mut out, 1.0, |b| src.pull(b)).unwrap();
        assert_eq!(src.gezogen, 160);
        // Stetig steigend, Schrittweite 1/3
        for w in out[3..].windows(2) {
            assert!((w[1] - w[0] - 1.0 / 3.0).abs() < 1e-4);
        }
    }

    #[test]
    fn wiedergabe_rate_beschleunigt_verbrauch() {
        let mut r = Resampler::new(48_000, 48_000);
        let mut src = Rampe::new(usize::MAX);
        let mut out = vec![0.0f32; 1_000];
        for _ in 0..10 {
            r.read(&mut out, 1.1, |b| src.pull(b)).unwrap();
        }
        // 10_000 Ausgangs-Samples bei Rate 1.1
        assert!((src.gezogen as i64 - 11_000).abs() <= 1);
        assert!((r.playback_rate() - 1.1).abs() < 1e-9);
    }

    #[test]
    fn kleine_rate_aenderung_wird_ignoriert() {
        let mut r = Resampler::new(48_000, 48_000);
        let mut src = Rampe::new(usize::MAX);
        let mut out = vec![0.0f32; 100];
        r.read(&mut out, 1.005, |b| src.pull(b)).unwrap();
        assert_eq!(r.playback_rate(), 1.0);
        r.read(&mut out, 1.02, |b| src.pull(b)).unwrap();
        assert!((r.playback_rate() - 1.02).abs() < 1e-9);
    }

    #[test]
    fn abschluss_wird_durchgereicht() {
        let mut r = Resampler::new(48_000, 48_000);
        let mut src = Rampe::new(150);
        let mut out = vec![0.0f32; 100];
        assert!(!r.read(&mut out, 1.0, |b| src.pull(b)).unwrap());
        assert!(r.read(&mut out, 1.0, |b| src.pull(b)).unwrap());
        r.reset();
        assert_eq!(r.playback_rate(), 1.0);
    }
}
