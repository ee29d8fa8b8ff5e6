//! Zwischen Netzwerk- und Ausgabe-Kontext geteilter Pipeline-Zustand
//!
//! Steuer-Flags sind Atomics, die der naechste Tick liest. Metadaten
//! (Optionen, Kanal-Liste, Statistik) liegen hinter kurz gehaltenen
//! parking_lot-Mutexen. Kein Lock wird ueber Dekodierung oder I/O gehalten.

use murmel_core::types::{PlaybackOptions, RemoteChannel};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::reorder_buffer::ReorderStatistik;

/// Laufende Kennzahlen einer Pipeline, einmal pro Tick veroeffentlicht
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PipelineStats {
    /// Gepufferte, noch nicht dekodierte Frames (Transfer-Queue + Reorder Buffer)
    pub buffered_frames: usize,
    /// Gepufferte Zeit inkl. angebrochenem Frame (Sekunden)
    pub buffered_secs: f64,
    /// Zuletzt dekodierte (empfangene) Sequenz
    pub last_sequence: Option<u32>,
    pub reorder: ReorderStatistik,
    pub hard_resyncs: u64,
    pub desync_ms: f64,
    pub playback_rate: f64,
    /// Wiedergabe laeuft der Uhr voraus (nicht korrigierbar)
    pub ahead: bool,
}

/// Geteilter Zustand einer Pipeline
#[derive(Debug, Default)]
pub struct PipelineShared {
    options: Mutex<PlaybackOptions>,
    channels: Mutex<Option<Vec<RemoteChannel>>>,
    stats: Mutex<PipelineStats>,
    stop: AtomicBool,
    reset: AtomicBool,
    overflow: AtomicU64,
}

impl PipelineShared {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Steuerung (Netzwerk-Kontext schreibt, Ausgabe-Kontext liest)
    // -----------------------------------------------------------------------

    /// Keine weiteren Pakete: die Session endet, sobald alles gelesen ist
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Pipeline beim naechsten Tick zuruecksetzen und Session beenden
    pub fn request_reset(&self) {
        self.reset.store(true, Ordering::Release);
    }

    /// Liest und loescht die Reset-Anforderung
    pub fn take_reset(&self) -> bool {
        self.reset.swap(false, Ordering::AcqRel)
    }

    pub fn record_overflow(&self) -> u64 {
        self.overflow.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn overflows(&self) -> u64 {
        self.overflow.load(Ordering::Relaxed)
    }

    // -----------------------------------------------------------------------
    // Metadaten
    // -----------------------------------------------------------------------

    /// Optionen des zuletzt dekodierten Pakets
    pub fn options(&self) -> PlaybackOptions {
        *self.options.lock()
    }

    pub fn set_options(&self, options: PlaybackOptions) {
        *self.options.lock() = options;
    }

    /// Kopiert die aktuelle Kanal-Liste nach `out`.
    ///
    /// Gibt `false` zurueck, wenn das letzte Paket keine Liste hatte.
    pub fn copy_channels(&self, out: &mut Vec<RemoteChannel>) -> bool {
        out.clear();
        match self.channels.lock().as_ref() {
            Some(liste) => {
                out.extend_from_slice(liste);
                true
            }
            None => false,
        }
    }

    /// Ersetzt die Kanal-Liste und gibt die alte zum Recyceln zurueck
    pub fn replace_channels(
        &self,
        channels: Option<Vec<RemoteChannel>>,
    ) -> Option<Vec<RemoteChannel>> {
        std::mem::replace(&mut *self.channels.lock(), channels)
    }

    pub fn stats(&self) -> PipelineStats {
        *self.stats.lock()
    }

    pub fn publish_stats(&self, stats: PipelineStats) {
        *self.stats.lock() = stats;
    }

    /// Ausgangszustand fuer die Wiederverwendung aus dem Pool
    pub(crate) fn clear(&self) -> Option<Vec<RemoteChannel>> {
        self.stop.store(false, Ordering::Release);
        self.reset.store(false, Ordering::Release);
        self.overflow.store(0, Ordering::Relaxed);
        *self.options.lock() = PlaybackOptions::default();
        *self.stats.lock() = PipelineStats::default();
        self.replace_channels(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmel_core::types::{ChannelKind, ChannelPriority};

    #[test]
    fn reset_anforderung_wird_einmal_gelesen() {
        let s = PipelineShared::new();
        s.request_reset();
        assert!(s.take_reset());
        assert!(!s.take_reset());
    }

    #[test]
    fn kanal_liste_ersetzen_und_kopieren() {
        let s = PipelineShared::new();
        let opts = PlaybackOptions::new(false, 1.0, ChannelPriority::Medium);
        let alt = s.replace_channels(Some(vec![RemoteChannel::new(
            ChannelKind::Player,
            "anna",
            opts,
        )]));
        assert!(alt.is_none());

        let mut out = Vec::new();
        assert!(s.copy_channels(&mut out));
        assert_eq!(out.len(), 1);

        let alt = s.replace_channels(None);
        assert_eq!(alt.map(|l| l.len()), Some(1));
        assert!(!s.copy_channels(&mut out));
        assert!(out.is_empty());
    }

    #[test]
    fn clear_setzt_flags_zurueck() {
        let s = PipelineShared::new();
        s.request_stop();
        s.record_overflow();
        s.set_options(PlaybackOptions::new(true, 0.5, ChannelPriority::High));
        s.clear();
        assert!(!s.stop_requested());
        assert_eq!(s.overflows(), 0);
        assert_eq!(s.options(), PlaybackOptions::default());
    }
}
