//! Decoder-Pipeline eines Sprechers
//!
//! Feste Komposition konkreter Stufen, kein dynamischer Dispatch pro Tick:
//!
//! ```text
//! Transfer-Queue → Reorder Buffer → Frame Decoder → Volume-Rampe
//!   → Frame-to-Stream → Synchronizer → Resampler → Clipper → Ausgabe
//! ```
//!
//! Die Netzwerk-Seite spricht die Pipeline nur ueber `PipelineInput` an
//! (Sender der Transfer-Queue + geteilter Zustand). Alles andere laeuft
//! im Ausgabe-Kontext.

use crossbeam_channel::{bounded, Sender, TrySendError};
use murmel_audio::{AudioProcessor, AudioResult, Clipper, Resampler, VolumeRamp};
use murmel_core::types::FrameFormat;
use murmel_core::SharedTap;
use murmel_protocol::EncodedPacket;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::clock::SharedClock;
use crate::config::PlaybackConfig;
use crate::frame_decoder::FrameDecoderAdapter;
use crate::frame_stream::FrameToStream;
use crate::pool::BufferPools;
use crate::shared::{PipelineShared, PipelineStats};
use crate::synchronizer::{SyncParams, Synchronizer};

/// Alles, was zum Bau einer Pipeline gebraucht wird
#[derive(Clone)]
pub struct PipelineContext {
    pub config: Arc<PlaybackConfig>,
    pub clock: SharedClock,
    pub buffers: Arc<BufferPools>,
    /// Ausgabe-Rate der Audio-Engine
    pub output_rate: u32,
    /// Tap fuer dekodierte Frames
    pub raw_tap: Option<SharedTap>,
    /// Tap fuer fertige Ausgabe-Samples
    pub output_tap: Option<SharedTap>,
}

impl PipelineContext {
    pub fn new(config: Arc<PlaybackConfig>, clock: SharedClock, output_rate: u32) -> Self {
        let buffers = Arc::new(BufferPools::new(config.pool_capacity * 8));
        Self {
            config,
            clock,
            buffers,
            output_rate,
            raw_tap: None,
            output_tap: None,
        }
    }

    pub fn with_taps(mut self, raw: Option<SharedTap>, output: Option<SharedTap>) -> Self {
        self.raw_tap = raw;
        self.output_tap = output;
        self
    }
}

/// Netzwerk-seitiger Zugang zu einer Pipeline
#[derive(Clone)]
pub struct PipelineInput {
    tx: Sender<EncodedPacket>,
    shared: Arc<PipelineShared>,
    buffers: Arc<BufferPools>,
}

impl PipelineInput {
    /// Reiht ein Paket ein. Bei voller Queue geht das Paket verloren.
    ///
    /// Gibt `false` zurueck, wenn das Paket verworfen wurde.
    pub fn send(&self, paket: EncodedPacket) -> bool {
        match self.tx.try_send(paket) {
            Ok(()) => true,
            Err(TrySendError::Disconnected(paket)) => {
                debug!(sequence = paket.sequence, "Pipeline nicht mehr vorhanden, Paket verworfen");
                self.buffers.recycle_packet(paket);
                false
            }
            Err(TrySendError::Full(paket)) => {
                let anzahl = self.shared.record_overflow();
                warn!(
                    sequence = paket.sequence,
                    ueberlaeufe = anzahl,
                    "Transfer-Queue voll, Paket verworfen"
                );
                self.buffers.recycle_packet(paket);
                false
            }
        }
    }

    /// Keine weiteren Pakete fuer diese Session
    pub fn stop(&self) {
        self.shared.request_stop();
    }

    /// Pipeline beim naechsten Tick zuruecksetzen
    pub fn request_reset(&self) {
        self.shared.request_reset();
    }

    pub fn shared(&self) -> &Arc<PipelineShared> {
        &self.shared
    }

    /// Pakete in der Transfer-Queue
    pub fn queued(&self) -> usize {
        self.tx.len()
    }
}

/// Komplette Wiedergabe-Kette eines Sprechers
pub struct DecoderPipeline {
    format: FrameFormat,
    tx: Sender<EncodedPacket>,
    shared: Arc<PipelineShared>,
    buffers: Arc<BufferPools>,
    decoder: FrameDecoderAdapter,
    ramp: VolumeRamp,
    stream: FrameToStream,
    sync: Synchronizer,
    resampler: Resampler,
    clipper: Clipper,
    output_tap: Option<SharedTap>,
    /// Scratch fuer das Verwerfen beim Aufholen
    skip_frame: Vec<f32>,
}

impl DecoderPipeline {
    pub fn new(format: FrameFormat, ctx: &PipelineContext) -> Self {
        let (tx, rx) = bounded(ctx.config.transfer_queue_capacity.max(1));
        let shared = Arc::new(PipelineShared::new());
        let frame_size = format.frame_size as usize;

        debug!(format = %format, output_rate = ctx.output_rate, "Pipeline erstellt");

        Self {
            format,
            tx,
            decoder: FrameDecoderAdapter::new(
                format,
                rx,
                Arc::clone(&shared),
                Arc::clone(&ctx.buffers),
                ctx.config.loss_window,
                ctx.raw_tap.clone(),
            ),
            shared,
            buffers: Arc::clone(&ctx.buffers),
            ramp: VolumeRamp::new(),
            stream: FrameToStream::new(frame_size),
            sync: Synchronizer::new(
                Arc::clone(&ctx.clock),
                format.wave.sample_rate,
                SyncParams::from(ctx.config.as_ref()),
            ),
            resampler: Resampler::new(format.wave.sample_rate, ctx.output_rate),
            clipper: Clipper::default(),
            output_tap: ctx.output_tap.clone(),
            skip_frame: vec![0.0; frame_size.max(1)],
        }
    }

    /// Zugang fuer die Netzwerk-Seite
    pub fn input(&self) -> PipelineInput {
        PipelineInput {
            tx: self.tx.clone(),
            shared: Arc::clone(&self.shared),
            buffers: Arc::clone(&self.buffers),
        }
    }

    /// Fuellt `out` mit Samples in Ausgabe-Rate.
    ///
    /// `volume` ist die Lautstaerke des Sprechers (0 = stumm), der
    /// Amplituden-Multiplikator des letzten Pakets kommt hinzu. Gibt `true`
    /// zurueck, sobald die Session vollstaendig ausgegeben ist.
    pub fn read(&mut self, out: &mut [f32], volume: f32) -> AudioResult<bool> {
        if self.shared.take_reset() {
            debug!(format = %self.format, "Pipeline-Reset angefordert");
            self.reset_stages();
            out.fill(0.0);
            self.publish();
            return Ok(true);
        }

        // Rate aus dem vorherigen Tick
        let rate = self.sync.playback_rate();
        let frame_size = self.format.frame_size as usize;
        let Self {
            decoder,
            ramp,
            stream,
            sync,
            resampler,
            ..
        } = self;

        let fertig = resampler.read(out, rate, |nativ| {
            // Obergrenze fuer das Verwerfen bei harter Resynchronisation
            let verfuegbar = decoder.buffered_frames() * frame_size + stream.pending();
            sync.read(nativ, verfuegbar, |b| {
                stream.read(b, |frame| {
                    let ende = decoder.read(frame)?;
                    if !ende {
                        ramp.set_target(volume * decoder.options().amplitude_multiplier);
                        ramp.process(frame);
                    }
                    Ok(ende)
                })
            })
        })?;

        self.clipper.process(out);
        if let Some(tap) = &self.output_tap {
            tap.write(out);
        }
        self.publish();

        Ok(fertig)
    }

    /// Verwirft gepuffertes Audio, bis hoechstens `target` gepuffert ist.
    ///
    /// Laeuft vor dem ersten echten Read, der Synchronizer ist dabei noch
    /// inaktiv. Gibt die Anzahl verworfener Frames zurueck.
    pub fn skip_to(&mut self, target: Duration) -> AudioResult<usize> {
        self.decoder.drain();
        let frame_dauer = self.format.frame_duration().as_secs_f64();
        let gepuffert = self.buffered().as_secs_f64();
        if frame_dauer <= 0.0 || gepuffert <= target.as_secs_f64() {
            return Ok(0);
        }

        let frames = ((gepuffert - target.as_secs_f64()) / frame_dauer + 1e-9).floor() as usize;
        let mut verworfen = 0;
        for _ in 0..frames {
            if self.decoder.read(&mut self.skip_frame)? {
                break;
            }
            verworfen += 1;
        }
        Ok(verworfen)
    }

    /// Aktiviert die Drift-Korrektur (Session wird abgespielt)
    pub fn enable_sync(&mut self) {
        self.sync.enable();
    }

    /// Gepufferte Zeit: ungelesene Frames plus Rest des angebrochenen Frames
    pub fn buffered(&self) -> Duration {
        let rate = self.format.wave.sample_rate.max(1) as f64;
        let samples = self.decoder.buffered_frames() as f64 * self.format.frame_size as f64
            + self.stream.pending() as f64;
        Duration::from_secs_f64(samples / rate)
    }

    pub fn set_output_rate(&mut self, output_rate: u32) {
        self.resampler.set_output_rate(output_rate);
    }

    pub fn format(&self) -> FrameFormat {
        self.format
    }

    pub fn shared(&self) -> &Arc<PipelineShared> {
        &self.shared
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            buffered_frames: self.decoder.buffered_frames(),
            buffered_secs: self.buffered().as_secs_f64(),
            last_sequence: self.decoder.last_sequence(),
            reorder: self.decoder.reorder_stats(),
            hard_resyncs: self.sync.hard_resyncs(),
            desync_ms: self.sync.desync_ms(),
            playback_rate: self.sync.playback_rate(),
            ahead: self.sync.is_ahead(),
        }
    }

    /// Vollstaendiger Reset fuer die Wiederverwendung aus dem Pool
    pub fn reset(&mut self) {
        self.reset_stages();
        if let Some(alt) = self.shared.clear() {
            self.buffers.recycle_channels(alt);
        }
    }

    fn reset_stages(&mut self) {
        self.decoder.reset();
        self.ramp.reset();
        self.stream.reset();
        self.sync.reset();
        self.resampler.reset();
        self.clipper.reset();
    }

    fn publish(&self) {
        self.shared.publish_stats(self.stats());
    }
}
