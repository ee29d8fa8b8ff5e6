//! murmel-sim – Bibliotheks-Root
//!
//! Spielt einen simulierten Sprecher in Echtzeit ab: eine Task liefert die
//! Pakete nach dem Ankunftsplan an, eine zweite spielt im Takt der
//! simulierten Audio-Engine ab, eine dritte loggt Telemetrie.

pub mod config;
pub mod netz;

use anyhow::Result;
use config::SimConfig;
use murmel_core::types::{ChannelKind, ChannelPriority, PlaybackOptions, PlayerId, RemoteChannel};
use murmel_core::SharedTap;
use murmel_observability::WavTap;
use murmel_voice::{
    PipelineContext, PipelinePool, SessionTelemetry, SpeakerPlayback, SystemClock,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};

/// Kapazitaet der WAV-Taps in Bloecken
const TAP_KAPAZITAET: usize = 512;

/// Ergebnis eines Simulationslaufs
#[derive(Debug, Clone)]
pub struct SimErgebnis {
    pub gesendet: u32,
    pub im_netz_verloren: u32,
    pub vertauscht: u32,
    pub ausgabe_ticks: u64,
    /// Letzte Telemetrie waehrend der Wiedergabe
    pub telemetrie: Option<SessionTelemetry>,
}

/// Haelt den Simulator-Zustand zusammen
pub struct Simulation {
    pub config: SimConfig,
}

impl Simulation {
    /// Erstellt eine neue Simulation aus der gegebenen Konfiguration
    pub fn neu(config: SimConfig) -> Self {
        Self { config }
    }

    /// Fuehrt die Simulation bis zum Ende der Session aus
    pub async fn starten(self) -> Result<SimErgebnis> {
        self.config.validieren()?;
        let plan = netz::planen(&self.config.netzwerk)?;
        let format = plan.format;

        info!(
            format = %format,
            pakete = plan.pakete.len(),
            verloren = plan.verloren,
            vertauscht = plan.vertauscht,
            output_rate = self.config.ausgabe.output_rate,
            "Simulation startet"
        );

        let raw_tap = tap_oeffnen(self.config.ausgabe.wav_roh.as_deref(), format.wave.sample_rate)?;
        let output_tap = tap_oeffnen(
            self.config.ausgabe.wav_ausgabe.as_deref(),
            self.config.ausgabe.output_rate,
        )?;

        let context = PipelineContext::new(
            Arc::new(self.config.playback.clone()),
            Arc::new(SystemClock::new()),
            self.config.ausgabe.output_rate,
        )
        .with_taps(raw_tap, output_tap);
        let pool = Arc::new(PipelinePool::new(context));
        let (sprecher, mut ausgabe) = SpeakerPlayback::new(PlayerId::new(), pool);

        let start = Instant::now();
        let dauer = plan.dauer();
        let frames = self.config.netzwerk.frames;
        let (im_netz_verloren, vertauscht) = (plan.verloren, plan.vertauscht);
        let (ende_tx, mut ende_rx) = tokio::sync::watch::channel(false);

        // Netzwerk-Kontext
        let netz_sprecher = sprecher.clone();
        let netz = tokio::spawn(async move {
            let player = netz_sprecher.player();
            let opts = PlaybackOptions::new(false, 1.0, ChannelPriority::Normal);
            let kanaele = [RemoteChannel::new(ChannelKind::Room, "lobby", opts)];

            netz_sprecher.start_session(format);
            for paket in &plan.pakete {
                tokio::time::sleep_until(start + paket.ankunft).await;
                if let Err(e) =
                    netz_sprecher.deliver(player, paket.sequenz, &paket.payload, opts, Some(&kanaele))
                {
                    warn!(fehler = %e, sequenz = paket.sequenz, "Paket nicht zugestellt");
                }
            }
            netz_sprecher.stop_session();
        });

        // Telemetrie
        let telemetrie_sprecher = sprecher.clone();
        let periode = Duration::from_millis(self.config.ausgabe.telemetrie_ms.max(1));
        let telemetrie = tokio::spawn(async move {
            let mut intervall = tokio::time::interval(periode);
            let mut letzte = None;
            loop {
                tokio::select! {
                    _ = intervall.tick() => {
                        let t = telemetrie_sprecher.telemetry();
                        if t.session.is_some() {
                            info!("{}", t.zusammenfassung());
                            letzte = Some(t);
                        }
                    }
                    _ = ende_rx.changed() => break,
                }
            }
            letzte
        });

        // Ausgabe-Kontext
        let tick = Duration::from_millis(self.config.ausgabe.tick_ms as u64);
        let tick_samples =
            (self.config.ausgabe.output_rate as u64 * self.config.ausgabe.tick_ms as u64 / 1000) as usize;
        let frist = dauer + self.config.playback.max_delay() + Duration::from_secs(5);
        let mut puffer = vec![0.0f32; tick_samples.max(1)];
        let mut intervall = tokio::time::interval(tick);
        intervall.set_missed_tick_behavior(MissedTickBehavior::Burst);
        let mut ticks = 0u64;
        let mut letzte_telemetrie = None;

        let ergebnis = loop {
            intervall.tick().await;
            ticks += 1;
            match ausgabe.read(&mut puffer) {
                Ok(true) => break Ok(()),
                Ok(false) => {}
                Err(e) => break Err(e),
            }
            if ticks % 10 == 0 && sprecher.is_playing() {
                letzte_telemetrie = Some(sprecher.telemetry());
            }
            if start.elapsed() > frist {
                warn!(frist_ms = frist.as_millis() as u64, "Session nicht rechtzeitig beendet");
                sprecher.force_reset();
                break Ok(());
            }
        };

        let _ = ende_tx.send(true);
        let periodisch = telemetrie.await?;
        netz.abort();

        ergebnis?;
        info!(
            ticks,
            dauer_ms = start.elapsed().as_millis() as u64,
            "Simulation beendet"
        );
        Ok(SimErgebnis {
            gesendet: frames,
            im_netz_verloren,
            vertauscht,
            ausgabe_ticks: ticks,
            telemetrie: letzte_telemetrie.or(periodisch),
        })
    }
}

/// Oeffnet einen WAV-Tap, wenn ein Pfad konfiguriert ist
fn tap_oeffnen(pfad: Option<&str>, sample_rate: u32) -> Result<Option<SharedTap>> {
    match pfad {
        Some(p) if !p.is_empty() => {
            let tap = WavTap::erstellen(p, sample_rate, TAP_KAPAZITAET)?;
            Ok(Some(Arc::new(tap)))
        }
        _ => Ok(None),
    }
}
