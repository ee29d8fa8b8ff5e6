//! Simulator-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Simulator ohne Konfigurationsdatei
//! lauffaehig ist.

use murmel_core::types::Codec;
use murmel_voice::PlaybackConfig;
use serde::{Deserialize, Serialize};

/// Vollstaendige Simulator-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Parameter der Wiedergabe-Pipeline
    pub playback: PlaybackConfig,
    /// Simuliertes Netz und Sprecher
    pub netzwerk: NetzwerkEinstellungen,
    /// Audio-Ausgabe und Diagnose
    pub ausgabe: AusgabeEinstellungen,
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Simuliertes Netz
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Anzahl gesendeter Frames
    pub frames: u32,
    /// Frame-Dauer in Millisekunden
    pub frame_ms: u32,
    pub codec: Codec,
    /// Native Sample-Rate des Sprechers
    pub sample_rate: u32,
    /// Grundlatenz in Millisekunden
    pub latenz_ms: f64,
    /// Maximale zusaetzliche Verzoegerung pro Paket (gleichverteilt)
    pub jitter_ms: f64,
    /// Verlust-Wahrscheinlichkeit pro Paket
    pub verlust: f64,
    /// Wahrscheinlichkeit, dass ein Paket mit dem Nachfolger vertauscht wird
    pub vertauschen: f64,
    /// Erste Leitungs-Sequenz (nahe 65535, um den Wrap-Around zu pruefen)
    pub start_sequenz: u16,
    pub seed: u64,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            frames: 250,
            frame_ms: 20,
            codec: Codec::Opus,
            sample_rate: 48_000,
            latenz_ms: 40.0,
            jitter_ms: 15.0,
            verlust: 0.02,
            vertauschen: 0.05,
            start_sequenz: 65_500,
            seed: 7,
        }
    }
}

/// Audio-Ausgabe
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AusgabeEinstellungen {
    /// Sample-Rate der simulierten Audio-Engine
    pub output_rate: u32,
    /// Laenge eines Audio-Ticks in Millisekunden
    pub tick_ms: u32,
    /// Intervall der Telemetrie-Logs in Millisekunden
    pub telemetrie_ms: u64,
    /// WAV-Datei fuer dekodierte Frames (leer = aus)
    pub wav_roh: Option<String>,
    /// WAV-Datei fuer die fertige Ausgabe (leer = aus)
    pub wav_ausgabe: Option<String>,
}

impl Default for AusgabeEinstellungen {
    fn default() -> Self {
        Self {
            output_rate: 44_100,
            tick_ms: 10,
            telemetrie_ms: 1_000,
            wav_roh: None,
            wav_ausgabe: None,
        }
    }
}

impl SimConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Prueft alle Abschnitte auf unsinnige Werte
    pub fn validieren(&self) -> anyhow::Result<()> {
        self.playback.validieren()?;
        let n = &self.netzwerk;
        if n.frames == 0 || n.frame_ms == 0 {
            anyhow::bail!("netzwerk.frames und netzwerk.frame_ms muessen > 0 sein");
        }
        if !(0.0..=1.0).contains(&n.verlust) || !(0.0..=1.0).contains(&n.vertauschen) {
            anyhow::bail!("netzwerk.verlust und netzwerk.vertauschen muessen in [0, 1] liegen");
        }
        if !(n.latenz_ms >= 0.0 && n.jitter_ms >= 0.0) {
            anyhow::bail!("netzwerk.latenz_ms und netzwerk.jitter_ms duerfen nicht negativ sein");
        }
        if self.ausgabe.output_rate == 0 || self.ausgabe.tick_ms == 0 {
            anyhow::bail!("ausgabe.output_rate und ausgabe.tick_ms muessen > 0 sein");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = SimConfig::default();
        assert!(cfg.validieren().is_ok());
        assert_eq!(cfg.netzwerk.frame_ms, 20);
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.playback.jitter_window, 128);
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [netzwerk]
            codec = "identity"
            jitter_ms = 0.0

            [playback]
            hard_resync_ms = 500.0

            [ausgabe]
            wav_ausgabe = "aus.wav"
        "#;
        let cfg: SimConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.netzwerk.codec, Codec::Identity);
        assert_eq!(cfg.netzwerk.jitter_ms, 0.0);
        assert_eq!(cfg.playback.hard_resync_ms, 500.0);
        assert_eq!(cfg.ausgabe.wav_ausgabe.as_deref(), Some("aus.wav"));
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.netzwerk.frames, 250);
        assert_eq!(cfg.playback.desync_tolerance_ms, 29.0);
    }

    #[test]
    fn fehlende_datei_gibt_standardwerte() {
        let cfg = SimConfig::laden("/nicht/vorhanden/murmel.toml").unwrap();
        assert_eq!(cfg.ausgabe.tick_ms, 10);
    }

    #[test]
    fn ungueltige_werte_werden_abgelehnt() {
        let mut cfg = SimConfig::default();
        cfg.netzwerk.verlust = 1.5;
        assert!(cfg.validieren().is_err());

        let mut cfg = SimConfig::default();
        cfg.playback.pool_capacity = 0;
        assert!(cfg.validieren().is_err());
    }
}
