//! Objekt-Pools
//!
//! Im eingeschwungenen Zustand alloziert die Wiedergabe nichts: Pipelines,
//! Nutzdaten-Puffer und Kanal-Listen werden ueber Pools wiederverwendet.
//!
//! Ein Pool ist ein begrenzter crossbeam-Kanal. `get` blockiert nie (bei
//! leerem Pool wird neu erzeugt), `put` schlaegt nie fehl (bei vollem Pool
//! wird das Objekt verworfen). Beide sind aus Netzwerk- und
//! Ausgabe-Kontext gleichzeitig aufrufbar.

use crossbeam_channel::{bounded, Receiver, Sender};
use dashmap::DashMap;
use murmel_core::types::{FrameFormat, RemoteChannel};
use murmel_protocol::EncodedPacket;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::pipeline::{DecoderPipeline, PipelineContext};

/// Begrenzter, thread-sicherer Objekt-Pool
pub struct Pool<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    misses: Arc<AtomicU64>,
}

impl<T> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
            misses: Arc::clone(&self.misses),
        }
    }
}

impl<T> Pool<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity.max(1));
        Self {
            tx,
            rx,
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Entnimmt ein Objekt oder erzeugt ein neues
    pub fn get_or(&self, create: impl FnOnce() -> T) -> T {
        match self.rx.try_recv() {
            Ok(item) => item,
            Err(_) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                create()
            }
        }
    }

    /// Gibt ein Objekt zurueck. Ist der Pool voll, wird es verworfen.
    pub fn put(&self, item: T) {
        let _ = self.tx.try_send(item);
    }

    /// Anzahl aktuell gepoolter Objekte
    pub fn available(&self) -> usize {
        self.rx.len()
    }

    /// Anzahl Entnahmen, fuer die neu erzeugt werden musste
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

impl<T: Default> Pool<T> {
    pub fn get(&self) -> T {
        self.get_or(T::default)
    }
}

// ---------------------------------------------------------------------------
// Puffer-Pools
// ---------------------------------------------------------------------------

/// Pools fuer Nutzdaten und Kanal-Listen der Pakete
pub struct BufferPools {
    bytes: Pool<Vec<u8>>,
    channels: Pool<Vec<RemoteChannel>>,
}

impl BufferPools {
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: Pool::new(capacity),
            channels: Pool::new(capacity),
        }
    }

    /// Kopiert Nutzdaten in einen gepoolten Puffer
    pub fn payload_from(&self, daten: &[u8]) -> Vec<u8> {
        let mut buf = self.bytes.get();
        buf.extend_from_slice(daten);
        buf
    }

    /// Kopiert eine Kanal-Liste in eine gepoolte Liste
    pub fn channels_from(&self, kanaele: &[RemoteChannel]) -> Vec<RemoteChannel> {
        let mut liste = self.channels.get();
        liste.extend_from_slice(kanaele);
        liste
    }

    pub fn recycle_payload(&self, mut buf: Vec<u8>) {
        buf.clear();
        self.bytes.put(buf);
    }

    pub fn recycle_channels(&self, mut liste: Vec<RemoteChannel>) {
        liste.clear();
        self.channels.put(liste);
    }

    /// Gibt alle Puffer eines Pakets zurueck
    pub fn recycle_packet(&self, paket: EncodedPacket) {
        self.recycle_payload(paket.payload);
        if let Some(liste) = paket.channels {
            self.recycle_channels(liste);
        }
    }

    pub fn bytes(&self) -> &Pool<Vec<u8>> {
        &self.bytes
    }
}

// ---------------------------------------------------------------------------
// Pipeline-Pool
// ---------------------------------------------------------------------------

/// Pipelines, gruppiert nach Frame-Format.
///
/// Zwei Streams mit gleichem Format teilen sich nach einem Reset dieselbe
/// Pipeline-Instanz.
pub struct PipelinePool {
    context: PipelineContext,
    pools: DashMap<FrameFormat, Pool<DecoderPipeline>>,
}

impl PipelinePool {
    pub fn new(context: PipelineContext) -> Self {
        Self {
            context,
            pools: DashMap::new(),
        }
    }

    /// Entnimmt eine zurueckgesetzte Pipeline fuer `format` oder baut eine neue
    pub fn get(&self, format: FrameFormat) -> DecoderPipeline {
        let pool = self.pool_for(format);
        pool.get_or(|| {
            debug!(format = %format, "Pipeline-Pool leer, erstelle neue Pipeline");
            DecoderPipeline::new(format, &self.context)
        })
    }

    /// Setzt die Pipeline zurueck und legt sie in den Pool ihres Formats
    pub fn put(&self, mut pipeline: DecoderPipeline) {
        pipeline.reset();
        self.pool_for(pipeline.format()).put(pipeline);
    }

    /// Anzahl gepoolter Pipelines fuer `format`
    pub fn available(&self, format: FrameFormat) -> usize {
        self.pools.get(&format).map(|p| p.available()).unwrap_or(0)
    }

    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    fn pool_for(&self, format: FrameFormat) -> Pool<DecoderPipeline> {
        self.pools
            .entry(format)
            .or_insert_with(|| Pool::new(self.context.config.pool_capacity))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_erzeugt_bei_leere() {
        let pool: Pool<Vec<u8>> = Pool::new(2);
        let v = pool.get();
        assert!(v.is_empty());
        assert_eq!(pool.misses(), 1);
    }

    #[test]
    fn pool_verwendet_wieder() {
        let pool: Pool<Vec<u8>> = Pool::new(2);
        pool.put(Vec::with_capacity(64));
        assert_eq!(pool.available(), 1);
        let v = pool.get();
        assert!(v.capacity() >= 64);
        assert_eq!(pool.misses(), 0);
    }

    #[test]
    fn voller_pool_verwirft() {
        let pool: Pool<u32> = Pool::new(1);
        pool.put(1);
        pool.put(2);
        assert_eq!(pool.available(), 1);
        assert_eq!(pool.get(), 1);
    }

    #[test]
    fn payload_wird_geleert_zurueckgegeben() {
        let bufs = BufferPools::new(4);
        let p = bufs.payload_from(&[1, 2, 3]);
        assert_eq!(p, vec![1, 2, 3]);
        bufs.recycle_payload(p);
        let p2 = bufs.payload_from(&[9]);
        assert_eq!(p2, vec![9]);
        assert_eq!(bufs.bytes().misses(), 1);
    }
}
