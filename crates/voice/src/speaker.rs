//! Wiedergabe eines entfernten Sprechers
//!
//! Fassade ueber Session Stream und Sessions, aufgeteilt nach Kontext:
//!
//! - [`SpeakerPlayback`]: Netzwerk-Kontext und Supervisor (Pakete, Session-
//!   Steuerung, Prioritaet, Lautstaerke, Telemetrie)
//! - [`SpeakerOutput`]: Ausgabe-Kontext der Audio-Engine (`read` pro Tick)
//!
//! Beide teilen sich nur `SpeakerInner`. Der Ausgabe-Kontext nimmt den
//! Stream-Lock ausschliesslich per `try_lock` und haelt ihn nie waehrend
//! des Dekodierens.

use murmel_core::types::{
    ChannelPriority, FrameFormat, PlaybackOptions, PlayerId, RemoteChannel, SessionContext,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

use crate::clock::SharedClock;
use crate::error::VoiceResult;
use crate::pool::PipelinePool;
use crate::session::Session;
use crate::session_stream::SessionStream;
use crate::shared::PipelineShared;
use crate::telemetry::SessionTelemetry;

/// Obergrenze der Sprecher-Lautstaerke
pub const MAX_VOLUME: f32 = 2.0;

struct SpeakerInner {
    player: PlayerId,
    clock: SharedClock,
    stream: Mutex<SessionStream>,
    /// Lautstaerke als f32-Bits
    volume: AtomicU32,
    muted: AtomicBool,
    /// Gerade spielende Session (vom Ausgabe-Kontext gesetzt)
    playing: Mutex<Option<(SessionContext, Arc<PipelineShared>)>>,
}

impl SpeakerInner {
    fn playing_shared(&self) -> Option<Arc<PipelineShared>> {
        self.playing.lock().as_ref().map(|(_, s)| Arc::clone(s))
    }

    fn gain(&self) -> f32 {
        if self.muted.load(Ordering::Relaxed) {
            0.0
        } else {
            f32::from_bits(self.volume.load(Ordering::Relaxed))
        }
    }
}

/// Netzwerk- und Supervisor-Seite eines Sprechers
#[derive(Clone)]
pub struct SpeakerPlayback {
    inner: Arc<SpeakerInner>,
}

impl SpeakerPlayback {
    /// Erstellt die Wiedergabe fuer `player`. Die Ausgabe-Seite geht an die
    /// Audio-Engine.
    pub fn new(player: PlayerId, pool: Arc<PipelinePool>) -> (Self, SpeakerOutput) {
        let clock = Arc::clone(&pool.context().clock);
        let output_rate = pool.context().output_rate;
        let inner = Arc::new(SpeakerInner {
            player,
            clock,
            stream: Mutex::new(SessionStream::new(player, pool)),
            volume: AtomicU32::new(1.0f32.to_bits()),
            muted: AtomicBool::new(false),
            playing: Mutex::new(None),
        });
        (
            Self {
                inner: Arc::clone(&inner),
            },
            SpeakerOutput {
                inner,
                current: None,
                output_rate,
            },
        )
    }

    pub fn player(&self) -> PlayerId {
        self.inner.player
    }

    // -----------------------------------------------------------------------
    // Netzwerk-Kontext
    // -----------------------------------------------------------------------

    /// Beginnt eine neue Aeusserung im Format `format`
    pub fn start_session(&self, format: FrameFormat) -> SessionContext {
        let now = self.inner.clock.now();
        self.inner.stream.lock().start_session(format, now)
    }

    /// Nimmt ein Paket mit 16-Bit-Leitungssequenz entgegen
    pub fn deliver(
        &self,
        sender: PlayerId,
        sequence: u16,
        payload: &[u8],
        options: PlaybackOptions,
        channels: Option<&[RemoteChannel]>,
    ) -> VoiceResult<()> {
        let now = self.inner.clock.now();
        self.inner
            .stream
            .lock()
            .deliver(sender, sequence, payload, options, channels, now)
    }

    pub fn stop_session(&self) {
        self.inner.stream.lock().stop_session();
    }

    pub fn force_reset(&self) {
        self.inner.stream.lock().force_reset();
        if let Some(shared) = self.inner.playing_shared() {
            shared.request_reset();
        }
    }

    /// Beendet die empfangende Session nach zu langer Funkstille
    pub fn check_timeout(&self) -> bool {
        let now = self.inner.clock.now();
        self.inner.stream.lock().check_timeout(now)
    }

    // -----------------------------------------------------------------------
    // Supervisor
    // -----------------------------------------------------------------------

    /// Prioritaet des zuletzt dekodierten Pakets, `None` ohne Wiedergabe
    pub fn priority(&self) -> ChannelPriority {
        self.inner
            .playing_shared()
            .map(|s| s.options().priority)
            .unwrap_or(ChannelPriority::None)
    }

    /// Amplituden-Multiplikator des Senders, 0 ohne Wiedergabe
    pub fn amplitude_multiplier(&self) -> f32 {
        self.inner
            .playing_shared()
            .map(|s| s.options().amplitude_multiplier)
            .unwrap_or(0.0)
    }

    /// Optionen des zuletzt dekodierten Pakets
    pub fn options(&self) -> Option<PlaybackOptions> {
        self.inner.playing_shared().map(|s| s.options())
    }

    /// Kopiert die Kanal-Liste des zuletzt dekodierten Pakets nach `out`
    pub fn channels(&self, out: &mut Vec<RemoteChannel>) -> bool {
        match self.inner.playing_shared() {
            Some(s) => s.copy_channels(out),
            None => {
                out.clear();
                false
            }
        }
    }

    /// Lautstaerke des Sprechers (0.0..2.0), wird ueber einen Frame gerampt
    pub fn set_volume(&self, volume: f32) {
        let volume = if volume.is_finite() {
            volume.clamp(0.0, MAX_VOLUME)
        } else {
            0.0
        };
        self.inner.volume.store(volume.to_bits(), Ordering::Relaxed);
    }

    pub fn volume(&self) -> f32 {
        f32::from_bits(self.inner.volume.load(Ordering::Relaxed))
    }

    pub fn set_muted(&self, muted: bool) {
        self.inner.muted.store(muted, Ordering::Relaxed);
    }

    pub fn is_muted(&self) -> bool {
        self.inner.muted.load(Ordering::Relaxed)
    }

    pub fn is_playing(&self) -> bool {
        self.inner.playing.lock().is_some()
    }

    /// Jitter (Standardabweichung) in Sekunden
    pub fn jitter(&self) -> f64 {
        self.inner.stream.lock().jitter_estimator().stddev()
    }

    /// Verlustrate der spielenden Session (0.0..1.0)
    pub fn packet_loss(&self) -> f64 {
        self.inner
            .playing_shared()
            .map(|s| s.stats().reorder.verlust_rate)
            .unwrap_or(0.0)
    }

    pub fn telemetry(&self) -> SessionTelemetry {
        let (queued, jitter_ms, jitter_confidence) = {
            let stream = self.inner.stream.lock();
            let est = stream.jitter_estimator();
            (stream.queued(), est.stddev() * 1000.0, est.confidence())
        };
        let playing = self.inner.playing.lock().clone();
        let (session, stats, overflows) = match playing {
            Some((c, s)) => (Some(c), s.stats(), s.overflows()),
            None => (None, Default::default(), 0),
        };

        SessionTelemetry {
            player: self.inner.player,
            session,
            queued,
            buffered_secs: stats.buffered_secs,
            last_sequence: stats.last_sequence,
            loss_ratio: stats.reorder.verlust_rate,
            late: stats.reorder.verspaetet,
            lost: stats.reorder.verloren,
            overflows,
            hard_resyncs: stats.hard_resyncs,
            desync_ms: stats.desync_ms,
            playback_rate: if session.is_some() { stats.playback_rate } else { 1.0 },
            ahead: stats.ahead,
            jitter_ms,
            jitter_confidence,
        }
    }
}

/// Ausgabe-Seite eines Sprechers, gehoert der Audio-Engine
pub struct SpeakerOutput {
    inner: Arc<SpeakerInner>,
    current: Option<Session>,
    output_rate: u32,
}

impl SpeakerOutput {
    /// Fuellt `buf` vollstaendig und gibt `true` zurueck, wenn die spielende
    /// Session damit beendet ist.
    ///
    /// Ohne spielende Session wird die naechste faellige aktiviert. Ist
    /// keine faellig (oder der Stream gerade gesperrt), ist die Ausgabe
    /// Stille.
    pub fn read(&mut self, buf: &mut [f32]) -> VoiceResult<bool> {
        if self.current.is_none() {
            self.activate_next();
        }
        let Some(session) = self.current.as_mut() else {
            buf.fill(0.0);
            return Ok(false);
        };

        match session.read(buf, self.inner.gain()) {
            Ok(false) => Ok(false),
            Ok(true) => {
                self.finish();
                Ok(true)
            }
            Err(e) => {
                error!(session = %session.context(), fehler = %e, "Session abgebrochen");
                session.discard();
                self.finish();
                Err(e)
            }
        }
    }

    /// Geraetewechsel: neue Ausgabe-Rate fuer laufende und kuenftige Sessions
    pub fn set_output_rate(&mut self, output_rate: u32) {
        self.output_rate = output_rate;
        if let Some(s) = self.current.as_mut() {
            s.set_output_rate(output_rate);
        }
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// Kontext der spielenden Session
    pub fn current(&self) -> Option<SessionContext> {
        self.current.as_ref().map(|s| s.context())
    }

    fn activate_next(&mut self) {
        let now = self.inner.clock.now();
        let next = match self.inner.stream.try_lock() {
            Some(mut stream) => stream.try_dequeue_session(now),
            None => None,
        };
        let Some(mut session) = next else {
            return;
        };

        session.set_output_rate(self.output_rate);
        if let Some(shared) = session.shared() {
            *self.inner.playing.lock() = Some((session.context(), shared));
        }
        self.current = Some(session);
    }

    fn finish(&mut self) {
        *self.inner.playing.lock() = None;
        if let Some(session) = self.current.take() {
            debug!(session = %session.context(), "Wiedergabe der Session beendet");
        }
    }
}
