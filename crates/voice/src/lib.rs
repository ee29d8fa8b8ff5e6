//! murmel-voice – Wiedergabe-Pipeline pro Sprecher
//!
//! Nimmt komprimierte Sprach-Pakete eines entfernten Sprechers entgegen und
//! liefert pro Audio-Tick einen vollstaendig gefuellten Sample-Block.
//!
//! ## Module
//! - [`reorder_buffer`] – Sortierung nach Sequenz, Verlust-Erkennung
//! - [`frame_decoder`] – Dekodierung in Frames fester Laenge
//! - [`frame_stream`] – Frames zu Pull-Stream beliebiger Blockgroesse
//! - [`synchronizer`] – Drift-Korrektur und Hard-Resync
//! - [`pipeline`] – Feste Komposition aller Stufen
//! - [`session`] / [`session_stream`] – Lebenszyklus der Aeusserungen
//! - [`speaker`] – Fassade pro Sprecher (Netzwerk- und Ausgabe-Seite)
//! - [`pool`] – Pipelines, Byte-Puffer und Kanal-Listen zur Wiederverwendung
//! - [`jitter`] / [`loss`] – Schaetzer fuer Jitter und Paketverlust
//! - [`telemetry`] – Snapshot fuer Supervisor und Logs

pub mod clock;
pub mod config;
pub mod error;
pub mod frame_decoder;
pub mod frame_stream;
pub mod jitter;
pub mod loss;
pub mod pipeline;
pub mod pool;
pub mod reorder_buffer;
pub mod session;
pub mod session_stream;
pub mod shared;
pub mod speaker;
pub mod synchronizer;
pub mod telemetry;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::PlaybackConfig;
pub use error::{VoiceError, VoiceResult};
pub use pipeline::{DecoderPipeline, PipelineContext, PipelineInput};
pub use pool::{BufferPools, PipelinePool};
pub use session::{Session, SessionState};
pub use session_stream::SessionStream;
pub use speaker::{SpeakerOutput, SpeakerPlayback};
pub use telemetry::SessionTelemetry;
