//! Integration-Tests der Wiedergabe (Session Stream bis Ausgabe-Block)
//!
//! Alle Zeiten laufen ueber `ManualClock`, ein Tick entspricht 20ms.

use murmel_audio::Encoder;
use murmel_core::types::{Codec, FrameFormat, PlaybackOptions, PlayerId, WaveFormat};
use murmel_voice::{
    Clock, ManualClock, PipelineContext, PipelinePool, PlaybackConfig, SessionStream, SpeakerPlayback,
};
use std::sync::Arc;
use std::time::Duration;

const TICK: Duration = Duration::from_millis(20);

fn format() -> FrameFormat {
    FrameFormat::from_millis(Codec::Identity, WaveFormat::mono(48_000), 20)
}

fn pool(uhr: &ManualClock) -> Arc<PipelinePool> {
    Arc::new(PipelinePool::new(PipelineContext::new(
        Arc::new(PlaybackConfig::default()),
        Arc::new(uhr.clone()),
        48_000,
    )))
}

fn payload(wert: f32) -> Vec<u8> {
    let mut enc = Encoder::create(format()).unwrap();
    let mut out = Vec::new();
    enc.encode(&[wert; 960], &mut out).unwrap();
    out
}

#[test]
fn gleichmaessige_frames_ohne_verlust() {
    let uhr = ManualClock::new();
    let player = PlayerId::new();
    let mut stream = SessionStream::new(player, pool(&uhr));

    // Jitter 10ms bei vollem Fenster
    for i in 0..128 {
        stream
            .jitter_estimator_mut()
            .add(if i % 2 == 0 { 0.01 } else { -0.01 });
    }
    stream.start_session(format(), Duration::ZERO);

    let daten = payload(0.2);
    let mut out = vec![0.0f32; 960];
    let mut session = None;
    let mut ziel = Duration::ZERO;
    let mut gepuffert_am_ende = Duration::ZERO;

    for tick in 0..50u16 {
        let now = TICK * tick as u32;
        uhr.set(now);
        stream
            .deliver(player, tick, &daten, PlaybackOptions::default(), None, now)
            .unwrap();

        if session.is_none() {
            session = stream.try_dequeue_session(now);
        }
        if let Some(s) = session.as_mut() {
            ziel = s.target_delay();
            assert!(!s.read(&mut out, 1.0).unwrap());
            gepuffert_am_ende = s.buffered();
        }
    }

    // max(1.5 * 20ms, 2.5 * 10ms)
    assert!((ziel.as_secs_f64() - 0.030).abs() < 1e-6);
    assert!(
        (gepuffert_am_ende.as_secs_f64() - ziel.as_secs_f64()).abs() <= 0.020 + 1e-6,
        "gepuffert {gepuffert_am_ende:?}, Ziel {ziel:?}"
    );

    stream.stop_session();
    let mut s = session.unwrap();
    let mut ticks = 0;
    loop {
        ticks += 1;
        uhr.advance(TICK);
        if s.read(&mut out, 1.0).unwrap() {
            break;
        }
        assert!(ticks < 10);
    }

    let stats = s.stats();
    assert_eq!(stats.reorder.verloren, 0);
    assert_eq!(stats.reorder.verspaetet, 0);
    assert_eq!(stats.reorder.empfangen, 50);
    assert_eq!(stats.hard_resyncs, 0);
    assert_eq!(stats.last_sequence, Some(49));
}

#[test]
fn vertauschte_pakete_werden_sortiert() {
    let uhr = ManualClock::new();
    let (sprecher, mut ausgabe) = SpeakerPlayback::new(PlayerId::new(), pool(&uhr));
    let player = sprecher.player();
    sprecher.start_session(format());

    let daten = payload(0.1);
    let opts = PlaybackOptions::default();
    let mut out = vec![0.0f32; 960];
    let mut letzte_telemetrie = None;

    // Sequenz 0 allein, danach Paare in vertauschter Reihenfolge
    sprecher.deliver(player, 0, &daten, opts, None).unwrap();
    for tick in 0..50u32 {
        let now = TICK * tick;
        uhr.set(now);
        if tick > 0 && tick % 2 == 0 && tick <= 48 {
            sprecher.deliver(player, tick as u16, &daten, opts, None).unwrap();
            sprecher.deliver(player, tick as u16 - 1, &daten, opts, None).unwrap();
        }
        assert!(!ausgabe.read(&mut out).unwrap());
        if sprecher.is_playing() {
            letzte_telemetrie = Some(sprecher.telemetry());
        }
    }
    sprecher.deliver(player, 49, &daten, opts, None).unwrap();
    sprecher.stop_session();

    let mut ticks = 0;
    loop {
        ticks += 1;
        uhr.advance(TICK);
        let fertig = ausgabe.read(&mut out).unwrap();
        if sprecher.is_playing() {
            letzte_telemetrie = Some(sprecher.telemetry());
        }
        if fertig {
            break;
        }
        assert!(ticks < 20);
    }

    let t = letzte_telemetrie.unwrap();
    assert_eq!(t.lost, 0);
    assert_eq!(t.late, 0);
    assert_eq!(t.hard_resyncs, 0);
    assert_eq!(sprecher.packet_loss(), 0.0);
}

#[test]
fn fehlende_sequenzen_werden_als_verlust_gezaehlt() {
    let uhr = ManualClock::new();
    let player = PlayerId::new();
    let mut stream = SessionStream::new(player, pool(&uhr));
    stream.start_session(format(), Duration::ZERO);

    let daten = payload(0.3);
    for seq in (0..20u16).filter(|s| *s != 5 && *s != 12) {
        stream
            .deliver(player, seq, &daten, PlaybackOptions::default(), None, Duration::ZERO)
            .unwrap();
    }
    stream.stop_session();

    uhr.set(Duration::from_millis(100));
    let mut s = stream.try_dequeue_session(uhr.now()).unwrap();
    let mut out = vec![0.0f32; 960];
    let mut ticks = 0;
    while !s.read(&mut out, 1.0).unwrap() {
        uhr.advance(TICK);
        ticks += 1;
        assert!(ticks < 30);
    }

    let stats = s.stats();
    assert_eq!(stats.reorder.verloren, 2);
    assert!(stats.reorder.verlust_rate > 0.0);
}

#[test]
fn abbruch_nach_timeout() {
    let uhr = ManualClock::new();
    let (sprecher, mut ausgabe) = SpeakerPlayback::new(PlayerId::new(), pool(&uhr));
    let player = sprecher.player();
    sprecher.start_session(format());
    for seq in 0..3u16 {
        sprecher
            .deliver(player, seq, &payload(0.1), PlaybackOptions::default(), None)
            .unwrap();
    }

    uhr.set(Duration::from_millis(500));
    assert!(!sprecher.check_timeout());
    uhr.set(Duration::from_millis(1_500));
    assert!(sprecher.check_timeout());

    // Die gestoppte Session laeuft aus
    let mut out = vec![0.0f32; 960];
    let mut fertig = false;
    for _ in 0..10 {
        uhr.advance(TICK);
        if ausgabe.read(&mut out).unwrap() {
            fertig = true;
            break;
        }
    }
    assert!(fertig);
}
