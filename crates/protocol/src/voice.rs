//! Voice-Paket (bereits deserialisiert)
//!
//! Ein `EncodedPacket` ist nach dem Einreihen unveraenderlich. Der
//! Reorder-Buffer besitzt es exklusiv, bis es dekodiert, verworfen oder
//! beim Pipeline-Reset recycelt wird. `payload` und `channels` stammen
//! ueblicherweise aus Pools und wandern nach der Dekodierung dorthin zurueck.

use murmel_core::types::{PlaybackOptions, PlayerId, RemoteChannel};

/// Komprimiertes Audio-Paket eines entfernten Sprechers
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedPacket {
    /// Absender
    pub sender: PlayerId,
    /// Monotone Sequenznummer innerhalb der Session (beginnt bei 0)
    pub sequence: u32,
    /// Komprimierte Nutzdaten
    pub payload: Vec<u8>,
    /// Wiedergabe-Optionen des Senders
    pub options: PlaybackOptions,
    /// Kanaele, ueber die das Paket ankam (optional)
    pub channels: Option<Vec<RemoteChannel>>,
}

impl EncodedPacket {
    /// Erstellt ein Paket ohne Kanal-Liste
    pub fn new(sender: PlayerId, sequence: u32, payload: Vec<u8>, options: PlaybackOptions) -> Self {
        Self {
            sender,
            sequence,
            payload,
            options,
            channels: None,
        }
    }

    /// Haengt eine Kanal-Liste an
    pub fn with_channels(mut self, channels: Vec<RemoteChannel>) -> Self {
        self.channels = Some(channels);
        self
    }

    /// Laenge der Nutzdaten in Bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Gibt zurueck ob die Nutzdaten leer sind
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
