//! Frame Decoder Adapter
//!
//! Erste Stufe der Pipeline im Ausgabe-Kontext. Pro Aufruf:
//! 1. Transfer-Queue in den Reorder Buffer leeren
//! 2. naechste Sequenz-Position lesen (Paket oder Verlust)
//! 3. genau einen Frame dekodieren und auf Mono heruntermischen
//! 4. bei echtem Paket Optionen/Kanal-Liste uebernehmen und Puffer recyceln

use crossbeam_channel::Receiver;
use murmel_audio::{AudioError, AudioResult, Decoder, FrameDecoder, SilenceDecoder};
use murmel_core::types::{FrameFormat, PlaybackOptions};
use murmel_core::SharedTap;
use murmel_protocol::EncodedPacket;
use std::sync::Arc;
use tracing::{error, warn};

use crate::pool::BufferPools;
use crate::reorder_buffer::{ReorderBuffer, ReorderFrame, ReorderStatistik};
use crate::shared::PipelineShared;

/// Dekodiert Pakete aus dem Reorder Buffer zu Mono-Frames fester Laenge
pub struct FrameDecoderAdapter {
    format: FrameFormat,
    decoder: Decoder,
    reorder: ReorderBuffer,
    rx: Receiver<EncodedPacket>,
    shared: Arc<PipelineShared>,
    buffers: Arc<BufferPools>,
    /// Interleavte Decoder-Ausgabe (`frame_size * channels`)
    decoded: Vec<f32>,
    /// Lokale Kopie der Optionen des letzten Pakets (ohne Lock lesbar)
    options: PlaybackOptions,
    last_sequence: Option<u32>,
    raw_tap: Option<SharedTap>,
}

impl FrameDecoderAdapter {
    pub fn new(
        format: FrameFormat,
        rx: Receiver<EncodedPacket>,
        shared: Arc<PipelineShared>,
        buffers: Arc<BufferPools>,
        loss_window: usize,
        raw_tap: Option<SharedTap>,
    ) -> Self {
        Self {
            format,
            decoder: Decoder::create(format),
            reorder: ReorderBuffer::new(loss_window),
            rx,
            shared,
            buffers,
            decoded: vec![0.0; format.decoded_samples()],
            options: PlaybackOptions::default(),
            last_sequence: None,
            raw_tap,
        }
    }

    /// Uebernimmt alle wartenden Pakete aus der Transfer-Queue.
    ///
    /// Nur aus dem Ausgabe-Kontext aufrufen, nie parallel zu sich selbst.
    pub fn drain(&mut self) {
        // Stop-Flag vor dem Leeren lesen: alles, was vor dem Stop gesendet
        // wurde, ist dann schon in der Queue
        let stop = self.shared.stop_requested();
        while let Ok(paket) = self.rx.try_recv() {
            self.reorder.push(paket);
        }
        if stop {
            self.reorder.stop();
        }
    }

    /// Fuellt `frame` (genau `frame_size` Samples) mit dem naechsten Frame.
    ///
    /// Gibt `true` zurueck, wenn der Stream beendet ist; `frame` ist dann
    /// Stille.
    pub fn read(&mut self, frame: &mut [f32]) -> AudioResult<bool> {
        self.drain();

        if self.reorder.is_complete() {
            frame.fill(0.0);
            return Ok(true);
        }

        let frame_size = self.format.frame_size as usize;
        let Self {
            decoder,
            reorder,
            buffers,
            decoded,
            ..
        } = self;

        let gelesen = reorder.read(|p| buffers.recycle_packet(p));
        let sequence = gelesen.sequence;
        let (ergebnis, paket) = match gelesen.frame {
            ReorderFrame::Received(p) => (decoder.decode(Some(p.payload.as_slice()), decoded, false), Some(p)),
            ReorderFrame::Lost(Some(next)) => (decoder.decode(Some(next.payload.as_slice()), decoded, true), None),
            ReorderFrame::Lost(None) => (decoder.decode(None, decoded, false), None),
        };

        let dekodiert = match ergebnis {
            Ok(n) => n,
            Err(AudioError::CodecFehler(e)) => {
                warn!(sequence, fehler = %e, "Frame nicht dekodierbar, fuege Stille ein");
                decoded.fill(0.0);
                frame_size
            }
            Err(e) => {
                if let Some(p) = paket {
                    buffers.recycle_packet(p);
                }
                return Err(e);
            }
        };

        if dekodiert != frame_size {
            error!(
                sequence,
                erwartet = frame_size,
                erhalten = dekodiert,
                format = %self.format,
                "Decoder lieferte falsche Frame-Laenge"
            );
            if let Some(p) = paket {
                self.buffers.recycle_packet(p);
            }
            return Err(AudioError::FrameLaengeFalsch {
                erwartet: frame_size,
                erhalten: dekodiert,
            });
        }

        downmix(&self.decoded, self.format.wave.channels as usize, frame);

        if let Some(paket) = paket {
            self.options = paket.options;
            self.last_sequence = Some(sequence);
            self.shared.set_options(paket.options);
            if let Some(alt) = self.shared.replace_channels(paket.channels) {
                self.buffers.recycle_channels(alt);
            }
            self.buffers.recycle_payload(paket.payload);
        }

        if let Some(tap) = &self.raw_tap {
            tap.write(frame);
        }

        Ok(false)
    }

    /// Leert Queue und Reorder Buffer, setzt den Decoder zurueck
    pub fn reset(&mut self) {
        while let Ok(paket) = self.rx.try_recv() {
            self.buffers.recycle_packet(paket);
        }
        let buffers = &self.buffers;
        self.reorder.reset(|p| buffers.recycle_packet(p));

        if let Err(e) = self.decoder.reset() {
            warn!(format = %self.format, fehler = %e, "Decoder-Reset fehlgeschlagen, verwende Stille");
            self.decoder = Decoder::Silence(SilenceDecoder::new(self.format));
        }

        self.options = PlaybackOptions::default();
        self.last_sequence = None;
    }

    /// Optionen des zuletzt dekodierten Pakets
    pub fn options(&self) -> PlaybackOptions {
        self.options
    }

    /// Gepufferte, noch nicht dekodierte Frames
    pub fn buffered_frames(&self) -> usize {
        self.reorder.len() + self.rx.len()
    }

    pub fn last_sequence(&self) -> Option<u32> {
        self.last_sequence
    }

    pub fn loss_ratio(&self) -> f64 {
        self.reorder.loss_ratio()
    }

    pub fn reorder_stats(&self) -> ReorderStatistik {
        self.reorder.statistik()
    }
}

/// Mischt interleavte Samples auf Mono herunter
fn downmix(interleaved: &[f32], channels: usize, mono: &mut [f32]) {
    if channels <= 1 {
        let n = mono.len().min(interleaved.len());
        mono[..n].copy_from_slice(&interleaved[..n]);
        return;
    }
    let faktor = 1.0 / channels as f32;
    for (out, gruppe) in mono.iter_mut().zip(interleaved.chunks_exact(channels)) {
        *out = gruppe.iter().sum::<f32>() * faktor;
    }
}
