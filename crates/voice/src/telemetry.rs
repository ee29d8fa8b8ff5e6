//! Wiedergabe-Telemetrie pro Sprecher
//!
//! Momentaufnahme aus Session Stream und der gerade spielenden Pipeline.
//! Wird im Netzwerk-Kontext erstellt und liest nur geteilten Zustand.

use murmel_core::types::{PlayerId, SessionContext};
use serde::Serialize;

/// Telemetrie-Snapshot eines Sprechers
#[derive(Debug, Clone, Serialize)]
pub struct SessionTelemetry {
    pub player: PlayerId,
    /// Gerade spielende Session
    pub session: Option<SessionContext>,
    /// Eingereihte, noch nicht aktivierte Sessions
    pub queued: usize,
    /// Gepufferte Zeit der spielenden Pipeline in Sekunden
    pub buffered_secs: f64,
    pub last_sequence: Option<u32>,
    /// Geschaetzte Verlustrate (0.0..1.0)
    pub loss_ratio: f64,
    pub late: u64,
    pub lost: u64,
    /// Ueberlaeufe der Transfer-Queue
    pub overflows: u64,
    pub hard_resyncs: u64,
    pub desync_ms: f64,
    pub playback_rate: f64,
    /// Wiedergabe laeuft der Echtzeit voraus
    pub ahead: bool,
    /// Jitter (Standardabweichung) in Millisekunden
    pub jitter_ms: f64,
    pub jitter_confidence: f64,
}

impl SessionTelemetry {
    /// Gibt eine lesbare Zusammenfassung zurueck
    pub fn zusammenfassung(&self) -> String {
        let session = match &self.session {
            Some(c) => format!("#{}", c.id),
            None => "-".to_string(),
        };
        format!(
            "{} Session={} Queue={} Buffer={:.0}ms Loss={:.1}% Spaet={} Verloren={} Ueberlauf={} Resync={} Desync={:.1}ms Rate={:.3}{} Jitter={:.1}ms ({:.0}%)",
            self.player,
            session,
            self.queued,
            self.buffered_secs * 1000.0,
            self.loss_ratio * 100.0,
            self.late,
            self.lost,
            self.overflows,
            self.hard_resyncs,
            self.desync_ms,
            self.playback_rate,
            if self.ahead { " VORAUS" } else { "" },
            self.jitter_ms,
            self.jitter_confidence * 100.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> SessionTelemetry {
        SessionTelemetry {
            player: PlayerId::new(),
            session: None,
            queued: 0,
            buffered_secs: 0.06,
            last_sequence: Some(41),
            loss_ratio: 0.025,
            late: 1,
            lost: 3,
            overflows: 0,
            hard_resyncs: 0,
            desync_ms: 0.0,
            playback_rate: 1.0,
            ahead: false,
            jitter_ms: 4.2,
            jitter_confidence: 0.5,
        }
    }

    #[test]
    fn zusammenfassung_enthaelt_kennzahlen() {
        let text = snapshot().zusammenfassung();
        assert!(text.contains("Session=-"));
        assert!(text.contains("Buffer=60ms"));
        assert!(text.contains("Loss=2.5%"));
        assert!(text.contains("Jitter=4.2ms (50%)"));
        assert!(!text.contains("VORAUS"));
    }

    #[test]
    fn snapshot_ist_serialisierbar() {
        let json = serde_json::to_value(snapshot()).unwrap();
        assert_eq!(json["last_sequence"], 41);
        assert_eq!(json["lost"], 3);
    }
}
