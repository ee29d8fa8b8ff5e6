//! Reorder Buffer fuer Voice-Pakete
//!
//! Ordnet eingehende Pakete nach Sequenznummer und liefert pro Frame-Tick
//! genau eine Position der Sequenz: das erwartete Paket oder einen
//! Verlust. Die erwartete Sequenznummer steigt bei jedem `read` um genau
//! eins, egal ob Pakete fehlen, zu spaet kommen oder doppelt ankommen.
//!
//! ## Performance-Eigenschaften
//! - O(log n) Einfuegen (Min-Heap nach Sequenz)
//! - O(log n) Entnahme des erwarteten Pakets
//! - Keine Locks: der Buffer gehoert exklusiv dem Ausgabe-Kontext

use murmel_protocol::EncodedPacket;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::trace;

use crate::loss::PacketLossEstimator;

/// Heap-Eintrag, invertiert geordnet: kleinste Sequenz zuerst
struct Eintrag(EncodedPacket);

impl PartialEq for Eintrag {
    fn eq(&self, other: &Self) -> bool {
        self.0.sequence == other.0.sequence
    }
}

impl Eq for Eintrag {}

impl PartialOrd for Eintrag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Eintrag {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.sequence.cmp(&self.0.sequence)
    }
}

/// Ergebnis fuer eine Sequenz-Position
#[derive(Debug)]
pub enum ReorderFrame<'a> {
    /// Das erwartete Paket ist da
    Received(EncodedPacket),
    /// Das erwartete Paket fehlt. Enthaelt das Folgepaket, falls schon
    /// vorhanden (fuer Vorwaertsfehlerkorrektur ueber die Luecke).
    Lost(Option<&'a EncodedPacket>),
}

/// Ergebnis eines `read`
#[derive(Debug)]
pub struct ReorderRead<'a> {
    /// Sequenznummer dieser Position
    pub sequence: u32,
    pub frame: ReorderFrame<'a>,
    /// Liegen danach noch Pakete im Buffer?
    pub more_available: bool,
}

impl ReorderRead<'_> {
    pub fn is_lost(&self) -> bool {
        matches!(self.frame, ReorderFrame::Lost(_))
    }
}

/// Zaehler des Reorder Buffers (Snapshot)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReorderStatistik {
    /// Eingefuegte Pakete
    pub empfangen: u64,
    /// Zu spaet (oder doppelt) angekommene, verworfene Pakete
    pub verspaetet: u64,
    /// Als verloren gemeldete Positionen
    pub verloren: u64,
    /// Aktuelle Paketverlust-Rate
    pub verlust_rate: f64,
}

/// Sortierender Buffer mit Verlust-Erkennung
pub struct ReorderBuffer {
    heap: BinaryHeap<Eintrag>,
    expected: u32,
    stopped: bool,
    loss: PacketLossEstimator,
    statistik: ReorderStatistik,
}

impl ReorderBuffer {
    pub fn new(loss_window: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(64),
            expected: 0,
            stopped: false,
            loss: PacketLossEstimator::new(loss_window),
            statistik: ReorderStatistik::default(),
        }
    }

    /// Fuegt ein Paket ein
    pub fn push(&mut self, paket: EncodedPacket) {
        trace!(sequence = paket.sequence, erwartet = self.expected, "Paket eingereiht");
        self.statistik.empfangen += 1;
        self.heap.push(Eintrag(paket));
    }

    /// Liest die naechste Sequenz-Position.
    ///
    /// Verspaetete Pakete gehen an `recycle`.
    pub fn read(&mut self, mut recycle: impl FnMut(EncodedPacket)) -> ReorderRead<'_> {
        while self
            .heap
            .peek()
            .is_some_and(|e| e.0.sequence < self.expected)
        {
            if let Some(Eintrag(alt)) = self.heap.pop() {
                trace!(sequence = alt.sequence, erwartet = self.expected, "Verspaetetes Paket verworfen");
                self.statistik.verspaetet += 1;
                recycle(alt);
            }
        }

        let sequence = self.expected;
        self.expected = self.expected.wrapping_add(1);

        let treffer = self.heap.peek().is_some_and(|e| e.0.sequence == sequence);
        self.loss.update(!treffer);
        self.statistik.verlust_rate = self.loss.ratio();

        if treffer {
            if let Some(Eintrag(paket)) = self.heap.pop() {
                return ReorderRead {
                    sequence,
                    frame: ReorderFrame::Received(paket),
                    more_available: !self.heap.is_empty(),
                };
            }
        }

        self.statistik.verloren += 1;
        // Alles Kleinere ist verworfen, das Minimum ist also > sequence
        let naechstes = self
            .heap
            .peek()
            .filter(|e| e.0.sequence == self.expected)
            .map(|e| &e.0);
        ReorderRead {
            sequence,
            more_available: naechstes.is_some() || !self.heap.is_empty(),
            frame: ReorderFrame::Lost(naechstes),
        }
    }

    /// Signalisiert, dass keine weiteren Pakete kommen
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Gestoppt und leer gelesen
    pub fn is_complete(&self) -> bool {
        self.stopped && self.heap.is_empty()
    }

    /// Leert den Buffer (Pakete an `recycle`) und beginnt wieder bei Sequenz 0
    pub fn reset(&mut self, mut recycle: impl FnMut(EncodedPacket)) {
        for Eintrag(paket) in self.heap.drain() {
            recycle(paket);
        }
        self.expected = 0;
        self.stopped = false;
        self.loss.reset();
        self.statistik = ReorderStatistik::default();
    }

    /// Naechste erwartete Sequenznummer
    pub fn expected(&self) -> u32 {
        self.expected
    }

    /// Anzahl gepufferter Pakete
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn loss_ratio(&self) -> f64 {
        self.loss.ratio()
    }

    pub fn statistik(&self) -> ReorderStatistik {
        self.statistik
    }
}
