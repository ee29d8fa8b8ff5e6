//! Synchronizer
//!
//! Vergleicht, wo die Wiedergabe laut Uhr sein muesste ("ideal"), mit dem,
//! was tatsaechlich ausgegeben wurde ("actual" = ausgegebene Samples in
//! nativer Rate). Aus der Differenz entsteht:
//!
//! - eine weiche Korrektur der Wiedergabe-Rate (hoechstens ±15%), die der
//!   Resampler im naechsten Tick anwendet. Die Rate darf sofort sinken,
//!   steigt aber pro Read nur um einen Anteil der Luecke.
//! - eine harte Resynchronisation, wenn die Wiedergabe mehr als die
//!   Schwelle hinterherhinkt: der Rueckstand wird bei Rate 1.0 gelesen und
//!   verworfen, hoechstens aber das, was tatsaechlich gepuffert ist. Reicht
//!   der Puffer nicht, bleibt der Tick still und die ideale Uhr wird neu
//!   verankert.
//!
//! Laeuft die Wiedergabe der Uhr weit voraus, gibt es keine Korrektur,
//! nur Warnung und Telemetrie.

use murmel_audio::AudioResult;
use std::time::Duration;
use tracing::{debug, warn};

use crate::clock::SharedClock;
use crate::config::PlaybackConfig;

/// Groesse des Verwerf-Puffers fuer harte Resyncs (Samples)
const DISCARD_CHUNK: usize = 4_800;

/// Parameter der Drift-Korrektur
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncParams {
    pub tolerance_ms: f64,
    pub hard_resync_ms: f64,
    pub max_correction: f64,
    pub ramp: f64,
}

impl From<&PlaybackConfig> for SyncParams {
    fn from(c: &PlaybackConfig) -> Self {
        Self {
            tolerance_ms: c.desync_tolerance_ms,
            hard_resync_ms: c.hard_resync_ms,
            max_correction: c.max_rate_correction,
            ramp: c.rate_ramp,
        }
    }
}

/// Drift-Korrektur gegen die Uhr
pub struct Synchronizer {
    clock: SharedClock,
    native_rate: u32,
    params: SyncParams,
    enabled: bool,
    /// Start der idealen Uhr (erster Read nach Aktivierung)
    start: Option<Duration>,
    /// Ausgegebene Samples seit `start`
    emitted: u64,
    rate: f64,
    desync_ms: f64,
    hard_resyncs: u64,
    ahead: bool,
    ahead_events: u64,
    discard: Vec<f32>,
}

impl Synchronizer {
    pub fn new(clock: SharedClock, native_rate: u32, params: SyncParams) -> Self {
        Self {
            clock,
            native_rate: native_rate.max(1),
            params,
            enabled: false,
            start: None,
            emitted: 0,
            rate: 1.0,
            desync_ms: 0.0,
            hard_resyncs: 0,
            ahead: false,
            ahead_events: 0,
            discard: vec![0.0; DISCARD_CHUNK],
        }
    }

    /// Aktiviert die Korrektur. Die ideale Uhr startet beim naechsten Read.
    pub fn enable(&mut self) {
        if !self.enabled {
            debug!("Synchronizer aktiviert");
            self.enabled = true;
            self.start = None;
            self.emitted = 0;
        }
    }

    /// Fuellt `out` aus `upstream` und aktualisiert die Rate.
    ///
    /// `verfuegbar` ist die Anzahl Samples, die `upstream` ohne Verlust-
    /// Positionen liefern kann; mehr wird beim Verwerfen nie gezogen.
    ///
    /// Gibt den Abschluss-Status von `upstream` zurueck; endet die Quelle
    /// waehrend einer harten Resynchronisation, ist `out` Stille.
    pub fn read<F>(&mut self, out: &mut [f32], verfuegbar: usize, mut upstream: F) -> AudioResult<bool>
    where
        F: FnMut(&mut [f32]) -> AudioResult<bool>,
    {
        if !self.enabled {
            return upstream(out);
        }

        let now = self.clock.now();
        let start = *self.start.get_or_insert(now);
        let vergangen = now.saturating_sub(start);
        let mut roh = self.raw_desync_ms(vergangen);

        if roh > self.params.hard_resync_ms {
            let rueckstand = (roh / 1000.0 * self.native_rate as f64).round() as u64;
            let verwerfen = rueckstand.min(verfuegbar as u64);
            warn!(
                desync_ms = roh,
                samples = verwerfen,
                gepuffert = verfuegbar,
                "Wiedergabe hinkt hinterher, harte Resynchronisation"
            );
            self.hard_resyncs += 1;
            self.rate = 1.0;

            let mut rest = verwerfen;
            while rest > 0 {
                let n = rest.min(self.discard.len() as u64) as usize;
                let fertig = upstream(&mut self.discard[..n])?;
                self.emitted += n as u64;
                rest -= n as u64;
                if fertig {
                    out.fill(0.0);
                    self.desync_ms = 0.0;
                    return Ok(true);
                }
            }

            if verwerfen < rueckstand {
                // Puffer leer: still bleiben statt Verluste zu erzeugen
                out.fill(0.0);
                self.emitted += out.len() as u64;
                let gespielt = Duration::from_secs_f64(self.emitted as f64 / self.native_rate as f64);
                self.start = Some(now.saturating_sub(gespielt));
                self.desync_ms = 0.0;
                self.ahead = false;
                return Ok(false);
            }
            roh = self.raw_desync_ms(vergangen);
        }

        let desync = if roh.abs() <= self.params.tolerance_ms {
            0.0
        } else {
            roh
        };
        self.desync_ms = desync;

        if desync < -self.params.hard_resync_ms {
            if !self.ahead {
                self.ahead_events += 1;
                warn!(desync_ms = desync, "Wiedergabe laeuft der Uhr voraus, keine Korrektur moeglich");
            }
            self.ahead = true;
        } else {
            self.ahead = false;
        }

        let ziel = 1.0 + (desync / 1000.0).clamp(-1.0, 1.0) * self.params.max_correction;
        if ziel < self.rate {
            self.rate = ziel;
        } else {
            self.rate += (ziel - self.rate) * self.params.ramp;
        }

        let fertig = upstream(out)?;
        self.emitted += out.len() as u64;
        Ok(fertig)
    }

    fn raw_desync_ms(&self, vergangen: Duration) -> f64 {
        let ideal = vergangen.as_secs_f64();
        let actual = self.emitted as f64 / self.native_rate as f64;
        (ideal - actual) * 1000.0
    }

    /// Wiedergabe-Rate fuer den Resampler
    pub fn playback_rate(&self) -> f64 {
        self.rate
    }

    /// Zuletzt gemessene Abweichung (0 innerhalb der Toleranz)
    pub fn desync_ms(&self) -> f64 {
        self.desync_ms
    }

    pub fn hard_resyncs(&self) -> u64 {
        self.hard_resyncs
    }

    /// Laeuft die Wiedergabe gerade uneinholbar voraus?
    pub fn is_ahead(&self) -> bool {
        self.ahead
    }

    pub fn ahead_events(&self) -> u64 {
        self.ahead_events
    }

    pub fn reset(&mut self) {
        self.enabled = false;
        self.start = None;
        self.emitted = 0;
        self.rate = 1.0;
        self.desync_ms = 0.0;
        self.hard_resyncs = 0;
        self.ahead = false;
        self.ahead_events = 0;
    }
}
