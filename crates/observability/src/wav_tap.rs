//! WAV-Diagnose-Tap
//!
//! Schreibt die Samples eines Pipeline-Abgriffs als 32-Bit-Float-WAV.
//! Der Echtzeit-Pfad uebergibt Bloecke nur per `try_send` an einen
//! Schreib-Thread; ist die Queue voll, wird der Block verworfen und gezaehlt.
//! Leere Puffer wandern ueber einen Rueckkanal wieder zum Tap. Alle Puffer
//! werden beim Anlegen reserviert, `write` alloziert nicht.

use crossbeam_channel::{bounded, Receiver, Sender};
use murmel_core::SampleTap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Vorreservierte Samples pro Block (100ms bei 48kHz)
const BLOCK_RESERVE: usize = 4_800;

/// Fehler beim Anlegen oder Abschliessen einer WAV-Datei
#[derive(Debug, Error)]
pub enum WavTapError {
    #[error("WAV-Fehler: {0}")]
    Wav(#[from] hound::Error),

    #[error("Schreib-Thread konnte nicht gestartet werden: {0}")]
    Thread(#[from] std::io::Error),

    #[error("Schreib-Thread ist abgestuerzt")]
    ThreadPanik,
}

/// Tap, der in eine WAV-Datei schreibt
pub struct WavTap {
    pfad: PathBuf,
    tx: Option<Sender<Vec<f32>>>,
    frei: Receiver<Vec<f32>>,
    frei_tx: Sender<Vec<f32>>,
    verworfen: AtomicU64,
    thread: Option<JoinHandle<Result<u64, hound::Error>>>,
}

impl WavTap {
    /// Legt die Datei an und startet den Schreib-Thread.
    ///
    /// `kapazitaet` ist die Anzahl Bloecke, die unterwegs sein duerfen.
    pub fn erstellen(
        pfad: impl AsRef<Path>,
        sample_rate: u32,
        kapazitaet: usize,
    ) -> Result<Self, WavTapError> {
        let pfad = pfad.as_ref().to_path_buf();
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(&pfad, spec)?;

        let kapazitaet = kapazitaet.max(1);
        let (tx, rx) = bounded::<Vec<f32>>(kapazitaet);
        // Ein Puffer mehr als die Queue fasst: der Schreib-Thread haelt einen
        let (frei_tx, frei) = bounded::<Vec<f32>>(kapazitaet + 1);
        for _ in 0..=kapazitaet {
            let _ = frei_tx.try_send(Vec::with_capacity(BLOCK_RESERVE));
        }

        let thread_pfad = pfad.clone();
        let rueckgabe = frei_tx.clone();
        let thread = std::thread::Builder::new()
            .name("murmel-wav-tap".to_string())
            .spawn(move || {
                let mut samples = 0u64;
                for mut block in rx {
                    for &s in &block {
                        writer.write_sample(s)?;
                    }
                    samples += block.len() as u64;
                    block.clear();
                    let _ = rueckgabe.try_send(block);
                }
                writer.finalize()?;
                debug!(pfad = %thread_pfad.display(), samples, "WAV-Tap abgeschlossen");
                Ok(samples)
            })?;

        info!(pfad = %pfad.display(), sample_rate, "WAV-Tap gestartet");
        Ok(Self {
            pfad,
            tx: Some(tx),
            frei,
            frei_tx,
            verworfen: AtomicU64::new(0),
            thread: Some(thread),
        })
    }

    pub fn pfad(&self) -> &Path {
        &self.pfad
    }

    /// Wegen voller Queue verworfene Bloecke
    pub fn verworfen(&self) -> u64 {
        self.verworfen.load(Ordering::Relaxed)
    }

    /// Schliesst die Datei ab und gibt die Anzahl geschriebener Samples zurueck
    pub fn beenden(mut self) -> Result<u64, WavTapError> {
        self.abschliessen()
    }

    fn abschliessen(&mut self) -> Result<u64, WavTapError> {
        self.tx.take();
        match self.thread.take() {
            Some(t) => match t.join() {
                Ok(ergebnis) => Ok(ergebnis?),
                Err(_) => Err(WavTapError::ThreadPanik),
            },
            None => Ok(0),
        }
    }
}

impl SampleTap for WavTap {
    fn write(&self, samples: &[f32]) {
        let Some(tx) = &self.tx else {
            return;
        };
        let Ok(mut block) = self.frei.try_recv() else {
            // Alle Puffer unterwegs, die Queue ist damit voll
            self.verworfen.fetch_add(1, Ordering::Relaxed);
            return;
        };
        block.extend_from_slice(samples);

        if let Err(e) = tx.try_send(block) {
            self.verworfen.fetch_add(1, Ordering::Relaxed);
            let mut block = e.into_inner();
            block.clear();
            let _ = self.frei_tx.try_send(block);
        }
    }
}

impl Drop for WavTap {
    fn drop(&mut self) {
        if let Err(e) = self.abschliessen() {
            warn!(pfad = %self.pfad.display(), fehler = %e, "WAV-Tap konnte nicht abgeschlossen werden");
        }
    }
}
