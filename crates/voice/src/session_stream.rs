//! Session Stream eines Sprechers
//!
//! Verwaltet, *wann* eine Pipeline anfaengt, die Ausgabe zu speisen:
//! Sessions werden mit einer jitter-abhaengigen Start-Verzoegerung
//! eingereiht und der Reihe nach aktiviert. Eingehende Frames gehen an
//! die Session, die gerade empfaengt, und fuettern den Jitter-Schaetzer.
//!
//! Laeuft im Netzwerk-Kontext. Der Ausgabe-Kontext holt faellige Sessions
//! ueber `try_dequeue_session` ab und spielt sie ohne weiteren Zugriff auf
//! den Stream.

use murmel_core::types::{FrameFormat, PlaybackOptions, PlayerId, RemoteChannel, SessionContext};
use murmel_protocol::{EncodedPacket, SequenceTracker};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::config::PlaybackConfig;
use crate::error::{VoiceError, VoiceResult};
use crate::jitter::{target_delay, JitterEstimator};
use crate::pipeline::PipelineInput;
use crate::pool::PipelinePool;
use crate::session::Session;

/// Zustand der Session, die gerade Frames empfaengt
struct Receiving {
    context: SessionContext,
    input: PipelineInput,
    frame_duration: f64,
    tracker: SequenceTracker,
    /// Ankunftszeit und Sequenz des ersten Frames (Bezug fuer den Jitter)
    first: Option<(Duration, u32)>,
    last_packet: Duration,
}

/// Session-Verwaltung eines Sprechers
pub struct SessionStream {
    player: PlayerId,
    config: Arc<PlaybackConfig>,
    pool: Arc<PipelinePool>,
    queue: VecDeque<Session>,
    receiving: Option<Receiving>,
    next_id: u32,
    jitter: JitterEstimator,
    /// Erster Dequeue-Versuch fuer den aktuellen Kopf der Queue
    pending_since: Option<(SessionContext, Duration)>,
}

impl SessionStream {
    pub fn new(player: PlayerId, pool: Arc<PipelinePool>) -> Self {
        let config = Arc::clone(&pool.context().config);
        Self {
            player,
            jitter: JitterEstimator::new(config.jitter_window),
            config,
            pool,
            queue: VecDeque::new(),
            receiving: None,
            next_id: 0,
            pending_since: None,
        }
    }

    /// Startet eine neue Session im Format `format` und reiht sie ein.
    ///
    /// Eine noch empfangende Session wird dabei gestoppt.
    pub fn start_session(&mut self, format: FrameFormat, now: Duration) -> SessionContext {
        if let Some(alt) = self.receiving.take() {
            debug!(session = %alt.context, "Neue Session beginnt, vorherige wird gestoppt");
            alt.input.stop();
        }

        let pipeline = self.pool.get(format);
        let input = pipeline.input();
        let context = SessionContext::new(self.player, self.next_id);
        self.next_id = self.next_id.wrapping_add(1);

        let frame_duration = format.frame_duration().as_secs_f64();
        let ziel = target_delay(
            self.config.default_delay_ms / 1000.0,
            self.config.jitter_multiplier,
            self.jitter.stddev(),
            self.jitter.confidence(),
            self.config.min_delay_frames * frame_duration,
            self.config.max_delay_ms / 1000.0,
        );

        debug!(
            session = %context,
            format = %format,
            ziel_ms = ziel.as_secs_f64() * 1000.0,
            jitter_ms = self.jitter.stddev() * 1000.0,
            konfidenz = self.jitter.confidence(),
            "Session gestartet"
        );

        self.queue.push_back(Session::new(
            context,
            pipeline,
            Arc::clone(&self.pool),
            now,
            ziel,
            self.config.prepare_tolerance(),
        ));
        self.receiving = Some(Receiving {
            context,
            input,
            frame_duration,
            tracker: SequenceTracker::new(),
            first: None,
            last_packet: now,
        });

        context
    }

    /// Leitet ein Paket an die empfangende Session weiter.
    ///
    /// Ohne aktive Session oder fuer den falschen Sprecher ist das ein
    /// Aufruffehler: wird geloggt, das Paket verworfen, sonst passiert nichts.
    pub fn receive_frame(&mut self, paket: EncodedPacket, now: Duration) -> VoiceResult<()> {
        if let Err(e) = self.check_sender(paket.sender) {
            self.pool.context().buffers.recycle_packet(paket);
            return Err(e);
        }
        let Some(r) = self.receiving.as_mut() else {
            return Err(VoiceError::SessionFehlt);
        };

        let (t0, s0) = *r.first.get_or_insert((now, paket.sequence));
        let verzoegerung = now.saturating_sub(t0).as_secs_f64()
            - (paket.sequence as i64 - s0 as i64) as f64 * r.frame_duration;
        self.jitter.add(verzoegerung);
        r.last_packet = now;

        trace!(session = %r.context, sequence = paket.sequence, verzoegerung, "Frame empfangen");
        r.input.send(paket);
        Ok(())
    }

    /// Eingang mit 16-Bit-Leitungssequenz: uebersetzt die Sequenz, kopiert
    /// Nutzdaten und Kanal-Liste in gepoolte Puffer und leitet weiter.
    #[allow(clippy::too_many_arguments)]
    pub fn deliver(
        &mut self,
        sender: PlayerId,
        wire_sequence: u16,
        payload: &[u8],
        options: PlaybackOptions,
        channels: Option<&[RemoteChannel]>,
        now: Duration,
    ) -> VoiceResult<()> {
        self.check_sender(sender)?;
        let Some(r) = self.receiving.as_mut() else {
            return Err(VoiceError::SessionFehlt);
        };
        let Some(sequence) = r.tracker.update(wire_sequence) else {
            return Ok(());
        };

        let buffers = &self.pool.context().buffers;
        let mut paket = EncodedPacket::new(sender, sequence, buffers.payload_from(payload), options);
        if let Some(liste) = channels {
            paket.channels = Some(buffers.channels_from(liste));
        }
        self.receive_frame(paket, now)
    }

    fn check_sender(&self, sender: PlayerId) -> VoiceResult<()> {
        match &self.receiving {
            None => {
                warn!(sender = %sender, "Frame ohne aktive Session empfangen, ignoriert");
                Err(VoiceError::SessionFehlt)
            }
            Some(r) if r.context.player != sender => {
                warn!(
                    erwartet = %r.context.player,
                    erhalten = %sender,
                    "Frame vom falschen Sprecher, ignoriert"
                );
                Err(VoiceError::FalscherSprecher {
                    erwartet: r.context.player,
                    erhalten: sender,
                })
            }
            Some(_) => Ok(()),
        }
    }

    /// Beendet die empfangende Session: sie laeuft aus, sobald alles
    /// Gepufferte gespielt ist
    pub fn stop_session(&mut self) {
        match self.receiving.take() {
            Some(r) => {
                debug!(session = %r.context, "Session gestoppt");
                r.input.stop();
            }
            None => debug!("Stop ohne aktive Session"),
        }
    }

    /// Gibt die naechste faellige Session heraus.
    ///
    /// Der Kopf der Queue wird erst herausgegeben, wenn `now` seine
    /// Aktivierungszeit erreicht hat. Die Vorbereitung (Aufholen) passiert
    /// beim ersten Read der Session im Ausgabe-Kontext.
    pub fn try_dequeue_session(&mut self, now: Duration) -> Option<Session> {
        let kopf = self.queue.front()?;
        let context = kopf.context();

        let erster_versuch = match self.pending_since {
            Some((c, t)) if c == context => t,
            _ => {
                self.pending_since = Some((context, now));
                now
            }
        };

        if now < kopf.activation_time() {
            return None;
        }

        let mut session = self.queue.pop_front()?;
        self.pending_since = None;
        session.set_waited(now.saturating_sub(erster_versuch));
        debug!(
            session = %context,
            gewartet_ms = session.waited().as_secs_f64() * 1000.0,
            gepuffert_ms = session.buffered().as_secs_f64() * 1000.0,
            "Session aktiviert"
        );
        Some(session)
    }

    /// Abbruch: setzt die empfangende Pipeline zurueck, verwirft alle bis
    /// auf die juengste eingereihte Session (ohne Recycling) und leert den
    /// Jitter-Schaetzer.
    pub fn force_reset(&mut self) {
        if let Some(r) = self.receiving.take() {
            r.input.request_reset();
        }

        let mut verworfen = 0;
        while self.queue.len() > 1 {
            if let Some(mut s) = self.queue.pop_front() {
                s.discard();
                verworfen += 1;
            }
        }

        self.jitter.clear();
        self.pending_since = None;
        warn!(player = %self.player, verworfen, "Session-Stream zurueckgesetzt");
    }

    /// Stoppt die empfangende Session, wenn zu lange kein Frame kam.
    ///
    /// Gibt `true` zurueck, wenn gestoppt wurde.
    pub fn check_timeout(&mut self, now: Duration) -> bool {
        let abgelaufen = self
            .receiving
            .as_ref()
            .is_some_and(|r| now.saturating_sub(r.last_packet) > self.config.session_timeout());
        if abgelaufen {
            warn!(player = %self.player, "Keine Frames mehr, Session wird beendet");
            self.stop_session();
        }
        abgelaufen
    }

    pub fn player(&self) -> PlayerId {
        self.player
    }

    /// Kontext der empfangenden Session
    pub fn active_context(&self) -> Option<SessionContext> {
        self.receiving.as_ref().map(|r| r.context)
    }

    pub fn has_active(&self) -> bool {
        self.receiving.is_some()
    }

    /// Anzahl eingereihter, noch nicht aktivierter Sessions
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn jitter_estimator(&self) -> &JitterEstimator {
        &self.jitter
    }

    pub fn jitter_estimator_mut(&mut self) -> &mut JitterEstimator {
        &mut self.jitter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::pipeline::PipelineContext;
    use murmel_audio::Encoder;
    use murmel_core::types::{Codec, WaveFormat};

    fn format() -> FrameFormat {
        FrameFormat::from_millis(Codec::Identity, WaveFormat::mono(48_000), 20)
    }

    fn stream() -> (SessionStream, PlayerId) {
        let uhr = ManualClock::new();
        let pool = Arc::new(PipelinePool::new(PipelineContext::new(
            Arc::new(PlaybackConfig::default()),
            Arc::new(uhr),
            48_000,
        )));
        let player = PlayerId::new();
        (SessionStream::new(player, pool), player)
    }

    fn paket(player: PlayerId, seq: u32) -> EncodedPacket {
        let mut enc = Encoder::create(format()).unwrap();
        let mut payload = Vec::new();
        enc.encode(&[0.0; 960], &mut payload).unwrap();
        EncodedPacket::new(player, seq, payload, PlaybackOptions::default())
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn frame_ohne_session_wird_abgelehnt() {
        let (mut s, player) = stream();
        let err = s.receive_frame(paket(player, 0), ms(0)).unwrap_err();
        assert!(matches!(err, VoiceError::SessionFehlt));
        assert!(s.jitter_estimator().is_empty());
    }

    #[test]
    fn frame_vom_falschen_sprecher_wird_abgelehnt() {
        let (mut s, _) = stream();
        s.start_session(format(), ms(0));
        let err = s.receive_frame(paket(PlayerId::new(), 0), ms(0)).unwrap_err();
        assert!(matches!(err, VoiceError::FalscherSprecher { .. }));
        assert!(s.jitter_estimator().is_empty());
    }

    #[test]
    fn session_ids_steigen() {
        let (mut s, player) = stream();
        let a = s.start_session(format(), ms(0));
        let b = s.start_session(format(), ms(0));
        assert_eq!(a.player, player);
        assert_eq!(b.id, a.id + 1);
        assert_eq!(s.queued(), 2);
        assert_eq!(s.active_context(), Some(b));
    }

    #[test]
    fn standard_verzoegerung_ohne_jitter() {
        let (mut s, _) = stream();
        s.start_session(format(), ms(0));
        assert!(s.try_dequeue_session(ms(99)).is_none());
        let session = s.try_dequeue_session(ms(100)).unwrap();
        assert!((session.target_delay().as_secs_f64() - 0.1).abs() < 1e-6);
        assert_eq!(session.waited(), ms(1));
    }

    #[test]
    fn verzoegerung_folgt_jitter() {
        let (mut s, _) = stream();
        // Volles Fenster, Standardabweichung 10ms
        for i in 0..128 {
            s.jitter_estimator_mut().add(if i % 2 == 0 { 0.01 } else { -0.01 });
        }
        s.start_session(format(), ms(0));
        let session = s.try_dequeue_session(ms(30)).unwrap();
        // max(1.5 * 20ms, 2.5 * 10ms)
        assert!((session.target_delay().as_secs_f64() - 0.030).abs() < 1e-6);
    }

    #[test]
    fn sessions_werden_der_reihe_nach_aktiviert() {
        let (mut s, _) = stream();
        let a = s.start_session(format(), ms(0));
        let b = s.start_session(format(), ms(50));
        let erste = s.try_dequeue_session(ms(200)).unwrap();
        let zweite = s.try_dequeue_session(ms(200)).unwrap();
        assert_eq!(erste.context(), a);
        assert_eq!(zweite.context(), b);
        assert!(s.try_dequeue_session(ms(300)).is_none());
    }

    #[test]
    fn wartezeit_ab_erstem_versuch() {
        let (mut s, _) = stream();
        s.start_session(format(), ms(0));
        assert!(s.try_dequeue_session(ms(10)).is_none());
        assert!(s.try_dequeue_session(ms(50)).is_none());
        let session = s.try_dequeue_session(ms(700)).unwrap();
        assert_eq!(session.waited(), ms(690));
    }

    #[test]
    fn empfang_fuettert_jitter() {
        let (mut s, player) = stream();
        s.start_session(format(), ms(0));
        s.receive_frame(paket(player, 0), ms(0)).unwrap();
        s.receive_frame(paket(player, 1), ms(25)).unwrap();
        s.receive_frame(paket(player, 2), ms(40)).unwrap();
        assert_eq!(s.jitter_estimator().len(), 3);
        assert!(s.jitter_estimator().stddev() > 0.0);
    }

    #[test]
    fn deliver_uebersetzt_leitungssequenz() {
        let (mut s, player) = stream();
        s.start_session(format(), ms(0));
        let payload = vec![0u8; 960 * 4];
        s.deliver(player, 500, &payload, PlaybackOptions::default(), None, ms(0))
            .unwrap();
        s.deliver(player, 501, &payload, PlaybackOptions::default(), None, ms(20))
            .unwrap();
        // Perfekter Takt: kein Jitter
        assert_eq!(s.jitter_estimator().len(), 2);
        assert!(s.jitter_estimator().stddev() < 1e-6);
    }

    #[test]
    fn stop_beendet_empfang() {
        let (mut s, player) = stream();
        s.start_session(format(), ms(0));
        s.stop_session();
        assert!(!s.has_active());
        assert!(s.receive_frame(paket(player, 0), ms(0)).is_err());
        // Die Session bleibt eingereiht und laeuft aus
        assert_eq!(s.queued(), 1);
    }

    #[test]
    fn force_reset_behaelt_hoechstens_eine_session() {
        let (mut s, player) = stream();
        s.jitter_estimator_mut().add(0.1);
        s.start_session(format(), ms(0));
        s.start_session(format(), ms(0));
        let c = s.start_session(format(), ms(0));
        s.force_reset();
        assert_eq!(s.queued(), 1);
        assert!(!s.has_active());
        assert!(s.jitter_estimator().is_empty());
        assert!(s.receive_frame(paket(player, 0), ms(0)).is_err());

        let uebrig = s.try_dequeue_session(ms(1000)).unwrap();
        assert_eq!(uebrig.context(), c);
    }

    #[test]
    fn timeout_stoppt_session() {
        let (mut s, player) = stream();
        s.start_session(format(), ms(0));
        s.receive_frame(paket(player, 0), ms(100)).unwrap();
        assert!(!s.check_timeout(ms(1000)));
        assert!(s.check_timeout(ms(1101)));
        assert!(!s.has_active());
        assert!(!s.check_timeout(ms(5000)));
    }
}
