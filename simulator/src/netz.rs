//! Simuliertes Netz
//!
//! Erzeugt den kompletten Ankunftsplan einer Aeusserung vorab: Sinuston
//! kodieren, pro Paket Latenz und Jitter wuerfeln, Verluste und
//! Vertauschungen einstreuen, nach Ankunftszeit sortieren. Mit gleichem
//! Seed ist der Plan identisch.

use murmel_audio::Encoder;
use murmel_core::types::{FrameFormat, WaveFormat};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

use crate::config::NetzwerkEinstellungen;

/// Ein Paket, wie es beim Empfaenger ankommt
#[derive(Debug, Clone)]
pub struct GeplantesPaket {
    /// Ankunft relativ zum Start der Simulation
    pub ankunft: Duration,
    pub sequenz: u16,
    pub payload: Vec<u8>,
}

/// Ergebnis der Planung
#[derive(Debug, Clone)]
pub struct Ankunftsplan {
    pub format: FrameFormat,
    /// Nach Ankunftszeit sortiert
    pub pakete: Vec<GeplantesPaket>,
    pub verloren: u32,
    pub vertauscht: u32,
}

impl Ankunftsplan {
    /// Ankunft des letzten Pakets
    pub fn dauer(&self) -> Duration {
        self.pakete.last().map(|p| p.ankunft).unwrap_or_default()
    }
}

/// Frame-Format des simulierten Sprechers
pub fn format(n: &NetzwerkEinstellungen) -> FrameFormat {
    FrameFormat::from_millis(n.codec, WaveFormat::mono(n.sample_rate), n.frame_ms)
}

/// Sinuston mit 220 Hz, fortlaufend ueber Frame-Grenzen
fn signal(frame: u32, format: FrameFormat, out: &mut [f32]) {
    let rate = format.wave.sample_rate as f64;
    let start = frame as u64 * format.frame_size as u64;
    for (i, s) in out.iter_mut().enumerate() {
        let t = (start + i as u64) as f64 / rate;
        *s = (0.3 * (2.0 * std::f64::consts::PI * 220.0 * t).sin()) as f32;
    }
}

/// Erstellt den Ankunftsplan
pub fn planen(n: &NetzwerkEinstellungen) -> anyhow::Result<Ankunftsplan> {
    let format = format(n);
    format.validieren()?;

    let mut rng = StdRng::seed_from_u64(n.seed);
    let mut encoder = Encoder::create(format)?;
    let mut pcm = vec![0.0f32; format.decoded_samples()];
    let frame_dauer = format.frame_duration().as_secs_f64();

    let mut pakete = Vec::with_capacity(n.frames as usize);
    let mut verloren = 0;
    for k in 0..n.frames {
        signal(k, format, &mut pcm);
        let mut payload = Vec::new();
        encoder.encode(&pcm, &mut payload)?;

        if rng.random_bool(n.verlust.clamp(0.0, 1.0)) {
            verloren += 1;
            continue;
        }

        let versatz = n.latenz_ms + rng.random_range(0.0..=n.jitter_ms.max(0.0));
        let ankunft = k as f64 * frame_dauer + versatz / 1000.0;
        pakete.push(GeplantesPaket {
            ankunft: Duration::from_secs_f64(ankunft),
            sequenz: n.start_sequenz.wrapping_add(k as u16),
            payload,
        });
    }

    // Vertauschen: Ankunftszeiten benachbarter Pakete tauschen
    let mut vertauscht = 0;
    let mut i = 1;
    while i < pakete.len() {
        if rng.random_bool(n.vertauschen.clamp(0.0, 1.0)) {
            let a = pakete[i - 1].ankunft;
            pakete[i - 1].ankunft = pakete[i].ankunft;
            pakete[i].ankunft = a;
            vertauscht += 1;
            i += 2;
        } else {
            i += 1;
        }
    }

    // Das erste Paket bestimmt Sequenz 0 der Session, es kommt zuerst an
    pakete.sort_by_key(|p| p.ankunft);
    if let Some(erstes) = pakete.first().map(|p| p.ankunft) {
        if let Some(pos) = pakete.iter().position(|p| p.sequenz == n.start_sequenz) {
            let p = pakete.remove(pos);
            pakete.insert(0, GeplantesPaket { ankunft: erstes.min(p.ankunft), ..p });
        }
    }

    Ok(Ankunftsplan {
        format,
        pakete,
        verloren,
        vertauscht,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmel_core::types::Codec;

    fn einstellungen() -> NetzwerkEinstellungen {
        NetzwerkEinstellungen {
            frames: 100,
            codec: Codec::Identity,
            ..Default::default()
        }
    }

    #[test]
    fn plan_ist_deterministisch() {
        let a = planen(&einstellungen()).unwrap();
        let b = planen(&einstellungen()).unwrap();
        assert_eq!(a.pakete.len(), b.pakete.len());
        assert_eq!(a.verloren, b.verloren);
        for (x, y) in a.pakete.iter().zip(&b.pakete) {
            assert_eq!(x.ankunft, y.ankunft);
            assert_eq!(x.sequenz, y.sequenz);
        }
    }

    #[test]
    fn plan_ist_nach_ankunft_sortiert() {
        let plan = planen(&einstellungen()).unwrap();
        assert!(plan.pakete.windows(2).all(|w| w[0].ankunft <= w[1].ankunft));
        assert_eq!(plan.pakete.len() as u32 + plan.verloren, 100);
    }

    #[test]
    fn ohne_jitter_und_verlust_gleichmaessig() {
        let n = NetzwerkEinstellungen {
            jitter_ms: 0.0,
            verlust: 0.0,
            vertauschen: 0.0,
            ..einstellungen()
        };
        let plan = planen(&n).unwrap();
        assert_eq!(plan.pakete.len(), 100);
        assert_eq!(plan.vertauscht, 0);
        // Leitungs-Sequenz laeuft ueber 65535 hinweg
        assert_eq!(plan.pakete[0].sequenz, 65_500);
        assert_eq!(plan.pakete[99].sequenz, 63);
        let abstand = plan.pakete[1].ankunft - plan.pakete[0].ankunft;
        assert!((abstand.as_secs_f64() - 0.020).abs() < 1e-6);
    }

    #[test]
    fn erstes_paket_kommt_zuerst() {
        let n = NetzwerkEinstellungen {
            verlust: 0.0,
            vertauschen: 0.5,
            ..einstellungen()
        };
        let plan = planen(&n).unwrap();
        assert_eq!(plan.pakete[0].sequenz, n.start_sequenz);
        assert!(plan.pakete.windows(2).all(|w| w[0].ankunft <= w[1].ankunft));
    }
}
