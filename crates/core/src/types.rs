//! Gemeinsame Wert-Typen der Wiedergabe-Pipeline
//!
//! IDs verwenden das Newtype-Pattern, Formate sind hashbare Werte und
//! dienen als Schluessel fuer die Pipeline-Pools.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{MurmelError, Result};

// ---------------------------------------------------------------------------
// Identitaeten
// ---------------------------------------------------------------------------

/// Eindeutige Spieler-ID (entfernter Sprecher)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    /// Erstellt eine neue zufaellige PlayerId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "player:{}", self.0)
    }
}

/// Kontext einer Sprech-Session: Spieler + fortlaufende Session-ID.
///
/// Zwei Kontexte sind genau dann gleich, wenn sie dieselbe
/// zusammenhaengende Aeusserung bezeichnen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionContext {
    pub player: PlayerId,
    pub id: u32,
}

impl SessionContext {
    pub fn new(player: PlayerId, id: u32) -> Self {
        Self { player, id }
    }
}

impl std::fmt::Display for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.player, self.id)
    }
}

// ---------------------------------------------------------------------------
// Wiedergabe-Optionen
// ---------------------------------------------------------------------------

/// Prioritaet eines Sprechkanals (aufsteigend geordnet)
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ChannelPriority {
    /// Kanal ohne Prioritaet
    None = -2,
    Low = -1,
    /// Standard-Prioritaet
    #[default]
    Normal = 0,
    Medium = 1,
    High = 2,
}

/// Wiedergabe-Optionen eines Pakets (unveraenderlicher Wert)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackOptions {
    /// Soll die Stimme positional (3D) wiedergegeben werden?
    pub is_positional: bool,
    /// Lautstaerke-Multiplikator des Senders (0.0..2.0)
    pub amplitude_multiplier: f32,
    /// Prioritaet des Kanals, ueber den gesprochen wird
    pub priority: ChannelPriority,
}

impl PlaybackOptions {
    pub fn new(is_positional: bool, amplitude_multiplier: f32, priority: ChannelPriority) -> Self {
        Self {
            is_positional,
            amplitude_multiplier: amplitude_multiplier.clamp(0.0, 2.0),
            priority,
        }
    }
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            is_positional: false,
            amplitude_multiplier: 1.0,
            priority: ChannelPriority::Normal,
        }
    }
}

/// Art eines Sprechkanals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Raum-Kanal (alle Zuhoerer im Raum)
    Room,
    /// Direkter Kanal zu einem Spieler
    Player,
}

/// Kanal, ueber den ein Paket beim Empfaenger ankam
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteChannel {
    pub kind: ChannelKind,
    /// Raum- bzw. Spielername. `Arc<str>` damit Kopieren nicht alloziert.
    pub target: Arc<str>,
    pub options: PlaybackOptions,
}

impl RemoteChannel {
    pub fn new(kind: ChannelKind, target: impl Into<Arc<str>>, options: PlaybackOptions) -> Self {
        Self {
            kind,
            target: target.into(),
            options,
        }
    }
}

// ---------------------------------------------------------------------------
// Formate
// ---------------------------------------------------------------------------

/// Codec eines Sprach-Streams
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Codec {
    /// Unkomprimierte f32-Samples (little-endian)
    Identity,
    /// Opus
    #[default]
    Opus,
}

/// Abtastrate + Kanalanzahl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WaveFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl WaveFormat {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Mono-Format mit der gegebenen Abtastrate
    pub fn mono(sample_rate: u32) -> Self {
        Self::new(sample_rate, 1)
    }
}

impl Default for WaveFormat {
    fn default() -> Self {
        Self::mono(48_000)
    }
}

/// Format eines Sprach-Streams: Codec + Ausgabeformat + feste Frame-Groesse.
///
/// Zwei Streams mit gleichem Format duerfen sich eine gepoolte Pipeline
/// teilen (nach Reset).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameFormat {
    pub codec: Codec,
    pub wave: WaveFormat,
    /// Samples pro Kanal und Frame
    pub frame_size: u32,
}

impl FrameFormat {
    pub fn new(codec: Codec, wave: WaveFormat, frame_size: u32) -> Self {
        Self {
            codec,
            wave,
            frame_size,
        }
    }

    /// Erstellt ein Format aus einer Frame-Dauer in Millisekunden
    pub fn from_millis(codec: Codec, wave: WaveFormat, frame_ms: u32) -> Self {
        Self::new(codec, wave, wave.sample_rate * frame_ms / 1000)
    }

    /// Dauer eines Frames
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(self.frame_size as f64 / self.wave.sample_rate as f64)
    }

    /// Anzahl interleavter Samples, die der Decoder pro Frame liefert
    pub fn decoded_samples(&self) -> usize {
        self.frame_size as usize * self.wave.channels as usize
    }

    /// Prueft ob das Format verarbeitbar ist
    pub fn validieren(&self) -> Result<()> {
        if self.wave.sample_rate == 0 {
            return Err(MurmelError::UngueltigesFormat("sample_rate=0".into()));
        }
        if self.wave.channels == 0 || self.wave.channels > 2 {
            return Err(MurmelError::UngueltigesFormat(format!(
                "channels={} (erlaubt: 1 oder 2)",
                self.wave.channels
            )));
        }
        if self.frame_size == 0 {
            return Err(MurmelError::UngueltigesFormat("frame_size=0".into()));
        }
        Ok(())
    }
}

impl std::fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?}/{}Hz/{}ch/{}",
            self.codec, self.wave.sample_rate, self.wave.channels, self.frame_size
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_id_eindeutig() {
        assert_ne!(PlayerId::new(), PlayerId::new());
    }

    #[test]
    fn session_context_gleichheit() {
        let p = PlayerId(Uuid::nil());
        assert_eq!(SessionContext::new(p, 3), SessionContext::new(p, 3));
        assert_ne!(SessionContext::new(p, 3), SessionContext::new(p, 4));
    }

    #[test]
    fn prioritaet_geordnet() {
        assert!(ChannelPriority::None < ChannelPriority::Low);
        assert!(ChannelPriority::Normal < ChannelPriority::High);
        assert_eq!(ChannelPriority::default(), ChannelPriority::Normal);
    }

    #[test]
    fn playback_options_amplitude_geclamped() {
        let o = PlaybackOptions::new(true, 7.0, ChannelPriority::High);
        assert!((o.amplitude_multiplier - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn frame_format_aus_millisekunden() {
        let f = FrameFormat::from_millis(Codec::Opus, WaveFormat::mono(48_000), 20);
        assert_eq!(f.frame_size, 960);
        assert_eq!(f.frame_duration(), Duration::from_millis(20));
        assert_eq!(f.decoded_samples(), 960);
    }

    #[test]
    fn frame_format_validierung() {
        let mut f = FrameFormat::from_millis(Codec::Identity, WaveFormat::mono(16_000), 10);
        assert!(f.validieren().is_ok());
        f.frame_size = 0;
        assert!(f.validieren().is_err());
        f.frame_size = 160;
        f.wave.channels = 6;
        assert!(f.validieren().is_err());
    }

    #[test]
    fn formate_sind_serde_kompatibel() {
        let f = FrameFormat::from_millis(Codec::Opus, WaveFormat::new(48_000, 2), 20);
        let json = serde_json::to_string(&f).unwrap();
        let f2: FrameFormat = serde_json::from_str(&json).unwrap();
        assert_eq!(f, f2);
    }
}
