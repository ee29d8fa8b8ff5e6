//! Konfiguration der Wiedergabe-Pipeline
//!
//! Alle Felder haben Standardwerte, die einer Engine mit ~30ms Audio-Tick
//! und 20ms Sprach-Frames entsprechen. Zeiten sind in Millisekunden
//! angegeben, damit sie sich in TOML lesbar notieren lassen.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{VoiceError, VoiceResult};

/// Parameter fuer Puffer, Synchronisation und Sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Kapazitaet der Transfer-Queue zwischen Netzwerk und Ausgabe (Pakete)
    pub transfer_queue_capacity: usize,
    /// Fenstergroesse des Jitter-Schaetzers (Ankunfts-Messungen)
    pub jitter_window: usize,
    /// Fenstergroesse des Paketverlust-Schaetzers
    pub loss_window: usize,
    /// Abweichungen innerhalb dieser Toleranz gelten als synchron
    pub desync_tolerance_ms: f64,
    /// Ab dieser Verspaetung wird hart resynchronisiert
    pub hard_resync_ms: f64,
    /// Maximale relative Korrektur der Wiedergabe-Rate
    pub max_rate_correction: f64,
    /// Anteil der Luecke, um den die Rate pro Read steigen darf
    pub rate_ramp: f64,
    /// Start-Verzoegerung ohne Jitter-Messungen
    pub default_delay_ms: f64,
    /// Obergrenze der Start-Verzoegerung
    pub max_delay_ms: f64,
    /// Faktor auf die Jitter-Standardabweichung
    pub jitter_multiplier: f64,
    /// Untergrenze der Start-Verzoegerung in Frames
    pub min_delay_frames: f64,
    /// Feste Toleranz beim Aufholen vor dem Start
    pub prepare_tolerance_ms: f64,
    /// Maximale Anzahl gepoolter Objekte pro Pool
    pub pool_capacity: usize,
    /// Session endet, wenn so lange kein Paket kam
    pub session_timeout_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            transfer_queue_capacity: 256,
            jitter_window: 128,
            loss_window: 128,
            desync_tolerance_ms: 29.0,
            hard_resync_ms: 1000.0,
            max_rate_correction: 0.15,
            rate_ramp: 0.25,
            default_delay_ms: 100.0,
            max_delay_ms: 750.0,
            jitter_multiplier: 2.5,
            min_delay_frames: 1.5,
            prepare_tolerance_ms: 100.0,
            pool_capacity: 32,
            session_timeout_ms: 1000,
        }
    }
}

impl PlaybackConfig {
    /// Prueft die Konfiguration auf unsinnige Werte
    pub fn validieren(&self) -> VoiceResult<()> {
        let fehler = |msg: &str| Err(VoiceError::Konfiguration(msg.to_string()));

        if self.transfer_queue_capacity == 0 {
            return fehler("transfer_queue_capacity muss > 0 sein");
        }
        if self.jitter_window == 0 || self.loss_window == 0 {
            return fehler("jitter_window und loss_window muessen > 0 sein");
        }
        if self.pool_capacity == 0 {
            return fehler("pool_capacity muss > 0 sein");
        }
        if !(self.desync_tolerance_ms >= 0.0) {
            return fehler("desync_tolerance_ms darf nicht negativ sein");
        }
        if !(self.hard_resync_ms > self.desync_tolerance_ms) {
            return fehler("hard_resync_ms muss groesser als desync_tolerance_ms sein");
        }
        if !(self.max_rate_correction > 0.0 && self.max_rate_correction < 1.0) {
            return fehler("max_rate_correction muss in (0, 1) liegen");
        }
        if !(self.rate_ramp > 0.0 && self.rate_ramp <= 1.0) {
            return fehler("rate_ramp muss in (0, 1] liegen");
        }
        if !(self.default_delay_ms >= 0.0 && self.max_delay_ms > 0.0) {
            return fehler("Verzoegerungen duerfen nicht negativ sein");
        }
        if self.min_delay_frames < 0.0 || self.jitter_multiplier < 0.0 {
            return fehler("min_delay_frames und jitter_multiplier duerfen nicht negativ sein");
        }
        if self.prepare_tolerance_ms < 0.0 {
            return fehler("prepare_tolerance_ms darf nicht negativ sein");
        }
        if self.session_timeout_ms == 0 {
            return fehler("session_timeout_ms muss > 0 sein");
        }
        Ok(())
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_secs_f64(self.max_delay_ms / 1000.0)
    }

    pub fn prepare_tolerance(&self) -> Duration {
        Duration::from_secs_f64(self.prepare_tolerance_ms / 1000.0)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }
}
