//! Sequenz-Tracking
//!
//! Auf der Leitung laufen 16-Bit-Sequenznummern mit Wrap-Around. Die
//! Wiedergabe erwartet pro Session eine monotone 32-Bit-Sequenz, die beim
//! ersten empfangenen Paket mit 0 beginnt. Jedes weitere Paket verschiebt
//! die lokale Sequenz um das vorzeichenbehaftete 16-Bit-Delta.

use tracing::trace;

/// Vorzeichenbehaftete Differenz `b - a` mit 16-Bit-Wrap-Around
pub fn wrapped_delta16(a: u16, b: u16) -> i32 {
    b.wrapping_sub(a) as i16 as i32
}

/// Uebersetzt Leitungs-Sequenzen in lokale Session-Sequenzen
#[derive(Debug, Clone, Default)]
pub struct SequenceTracker {
    /// Zuletzt gesehene Leitungs-Sequenz (None vor dem ersten Paket)
    remote: Option<u16>,
    /// Lokale Sequenz des zuletzt gesehenen Pakets
    local: u32,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Beginnt eine neue Session: `remote` wird lokale Sequenz 0
    pub fn start(&mut self, remote: u16) {
        self.remote = Some(remote);
        self.local = 0;
    }

    /// Setzt den Tracker in den Ausgangszustand zurueck
    pub fn reset(&mut self) {
        self.remote = None;
        self.local = 0;
    }

    /// Gibt zurueck ob bereits ein Paket gesehen wurde
    pub fn is_started(&self) -> bool {
        self.remote.is_some()
    }

    /// Uebersetzt eine Leitungs-Sequenz.
    ///
    /// Gibt `None` zurueck wenn das Paket eine negative lokale Sequenz
    /// ergeben wuerde (echtes erstes Paket kam zu spaet) – es wird verworfen.
    pub fn update(&mut self, remote: u16) -> Option<u32> {
        let Some(vorherige) = self.remote else {
            self.start(remote);
            return Some(0);
        };

        let delta = wrapped_delta16(vorherige, remote);
        let lokal = self.local as i64 + delta as i64;
        if lokal < 0 {
            trace!(remote, delta, "Altes Paket wuerde negative Sequenz erzeugen, verworfen");
            return None;
        }

        self.local = lokal as u32;
        self.remote = Some(remote);
        Some(self.local)
    }
}
