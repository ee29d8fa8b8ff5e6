//! Session: eine zusammenhaengende Aeusserung eines Sprechers
//!
//! Eine Session besitzt genau eine Pipeline, vom Start bis zum Ende.
//! Zustaende: Pending → Active → Complete, nie zurueck. Beim Drop geht die
//! Pipeline in den Pool, ausser die Session wurde verworfen.

use murmel_core::types::SessionContext;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::VoiceResult;
use crate::pipeline::DecoderPipeline;
use crate::pool::PipelinePool;
use crate::shared::{PipelineShared, PipelineStats};

/// Lebenszyklus einer Session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Eingereiht, noch nicht gelesen
    Pending,
    /// Wird abgespielt
    Active,
    /// Vollstaendig ausgegeben (oder abgebrochen)
    Complete,
}

pub struct Session {
    context: SessionContext,
    pipeline: Option<DecoderPipeline>,
    pool: Arc<PipelinePool>,
    created: Duration,
    target_delay: Duration,
    /// Wartezeit seit dem ersten Dequeue-Versuch
    waited: Duration,
    prepare_tolerance: Duration,
    state: SessionState,
    discarded: bool,
}

impl Session {
    pub(crate) fn new(
        context: SessionContext,
        pipeline: DecoderPipeline,
        pool: Arc<PipelinePool>,
        created: Duration,
        target_delay: Duration,
        prepare_tolerance: Duration,
    ) -> Self {
        Self {
            context,
            pipeline: Some(pipeline),
            pool,
            created,
            target_delay,
            waited: Duration::ZERO,
            prepare_tolerance,
            state: SessionState::Pending,
            discarded: false,
        }
    }

    pub(crate) fn set_waited(&mut self, waited: Duration) {
        self.waited = waited;
    }

    /// Fuellt `out` und gibt `true` zurueck, sobald die Session beendet ist.
    ///
    /// Der erste Aufruf bereitet die Session vor (Aufholen, Synchronizer
    /// aktivieren). Nach dem Ende liefert die Session nur noch Stille.
    pub fn read(&mut self, out: &mut [f32], volume: f32) -> VoiceResult<bool> {
        if self.state == SessionState::Complete {
            out.fill(0.0);
            return Ok(true);
        }
        if self.state == SessionState::Pending {
            self.prepare()?;
        }

        let Some(pipeline) = self.pipeline.as_mut() else {
            out.fill(0.0);
            self.state = SessionState::Complete;
            return Ok(true);
        };

        match pipeline.read(out, volume) {
            Ok(true) => {
                debug!(session = %self.context, "Session beendet");
                self.state = SessionState::Complete;
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(e) => {
                self.state = SessionState::Complete;
                Err(e.into())
            }
        }
    }

    /// Aufholen vor dem ersten Read: war die Session weit laenger
    /// eingereiht als geplant, wird Gepuffertes bis auf die Ziel-
    /// Verzoegerung verworfen.
    fn prepare(&mut self) -> VoiceResult<()> {
        self.state = SessionState::Active;
        let Some(pipeline) = self.pipeline.as_mut() else {
            return Ok(());
        };

        let grenze = self.target_delay + self.target_delay * 3 + self.prepare_tolerance;
        if self.waited > grenze {
            let verworfen = pipeline.skip_to(self.target_delay)?;
            debug!(
                session = %self.context,
                gewartet_ms = self.waited.as_millis() as u64,
                ziel_ms = self.target_delay.as_millis() as u64,
                verworfen,
                "Session holt Rueckstand vor dem Start auf"
            );
        }

        pipeline.enable_sync();
        Ok(())
    }

    /// Markiert die Session als abnormal beendet: die Pipeline wird beim
    /// Drop nicht recycelt.
    pub fn discard(&mut self) {
        self.discarded = true;
        self.state = SessionState::Complete;
    }

    pub fn set_output_rate(&mut self, output_rate: u32) {
        if let Some(p) = self.pipeline.as_mut() {
            p.set_output_rate(output_rate);
        }
    }

    pub fn context(&self) -> SessionContext {
        self.context
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == SessionState::Complete
    }

    pub fn target_delay(&self) -> Duration {
        self.target_delay
    }

    /// Zeitpunkt, ab dem die Session aktiviert werden darf
    pub fn activation_time(&self) -> Duration {
        self.created + self.target_delay
    }

    pub fn waited(&self) -> Duration {
        self.waited
    }

    /// Gepufferte Zeit der Pipeline
    pub fn buffered(&self) -> Duration {
        self.pipeline
            .as_ref()
            .map(|p| p.buffered())
            .unwrap_or(Duration::ZERO)
    }

    pub fn stats(&self) -> PipelineStats {
        self.pipeline
            .as_ref()
            .map(|p| p.stats())
            .unwrap_or_default()
    }

    pub fn shared(&self) -> Option<Arc<PipelineShared>> {
        self.pipeline.as_ref().map(|p| Arc::clone(p.shared()))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            if self.discarded {
                debug!(session = %self.context, "Verworfene Session, Pipeline wird nicht recycelt");
            } else {
                self.pool.put(pipeline);
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("context", &self.context)
            .field("state", &self.state)
            .field("created", &self.created)
            .field("target_delay", &self.target_delay)
            .field("waited", &self.waited)
            .finish()
    }
}
