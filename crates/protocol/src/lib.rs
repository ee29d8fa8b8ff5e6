//! murmel-protocol – Empfangsseitige Paket-Typen
//!
//! Das Framing auf der Leitung gehoert dem Transport. Dieses Crate
//! beschreibt nur, was der Transport an die Wiedergabe uebergibt:
//!
//! - [`voice`] – bereits deserialisiertes Voice-Paket
//! - [`sequence`] – 16-Bit-Leitungssequenz → monotone Session-Sequenz

pub mod sequence;
pub mod voice;

pub use sequence::SequenceTracker;
pub use voice::EncodedPacket;
