//! Codec-Schnittstelle der Wiedergabe
//!
//! Die Pipeline dekodiert ueber das schmale `FrameDecoder`-Trait. Die
//! Menge der Decoder ist geschlossen (`Decoder`-Enum): Opus ueber
//! audiopus, Identity (rohe f32-Samples) und Stille als Ersatz, wenn ein
//! Decoder nicht erstellt werden kann.
//!
//! Alle Decoder schreiben exakt `frame_size * channels` interleavte
//! Samples und geben die Anzahl Samples pro Kanal zurueck.

use audiopus::{
    coder::{Decoder as RawOpusDecoder, Encoder as RawOpusEncoder},
    Application, Bitrate, Channels, SampleRate,
};
use murmel_core::types::{Codec, FrameFormat};
use tracing::{debug, warn};

use crate::error::{AudioError, AudioResult};

/// Maximale Groesse eines Opus-Pakets in Bytes
const MAX_OPUS_PAKET: usize = 4000;

/// Schmale Decode-Schnittstelle
pub trait FrameDecoder: Send {
    /// Dekodiert einen Frame in `output` (`frame_size * channels` Samples).
    ///
    /// `input = None` bedeutet Paketverlust (PLC). Mit `fec = true` wird
    /// aus `input` (dem Folgepaket) die Vorwaertsfehlerkorrektur fuer den
    /// verlorenen Frame gewonnen.
    fn decode(&mut self, input: Option<&[u8]>, output: &mut [f32], fec: bool)
        -> AudioResult<usize>;

    /// Setzt den Decoder-Zustand zurueck (neue Session)
    fn reset(&mut self) -> AudioResult<()>;

    /// Format, fuer das der Decoder erstellt wurde
    fn format(&self) -> FrameFormat;
}

// ---------------------------------------------------------------------------
// Opus
// ---------------------------------------------------------------------------

/// Opus-Decoder: dekodiert Opus-Bytes zu f32-PCM
pub struct OpusDecoder {
    decoder: RawOpusDecoder,
    format: FrameFormat,
    /// Zwischenpuffer fuer audiopus (feste Groesse, keine Allokation pro Frame)
    scratch: Vec<f32>,
}

impl OpusDecoder {
    /// Erstellt einen Decoder fuer das gegebene Format
    pub fn new(format: FrameFormat) -> AudioResult<Self> {
        format.validieren()?;
        let decoder = raw_decoder(&format)?;

        debug!(format = %format, "OpusDecoder erstellt");

        Ok(Self {
            decoder,
            format,
            scratch: vec![0.0; format.decoded_samples()],
        })
    }
}

impl FrameDecoder for OpusDecoder {
    fn decode(
        &mut self,
        input: Option<&[u8]>,
        output: &mut [f32],
        fec: bool,
    ) -> AudioResult<usize> {
        // audiopus lehnt leere Pakete ab, leere Nutzdaten zaehlen als Verlust
        let input = input.filter(|daten| !daten.is_empty());
        let fec = fec && input.is_some();

        let decoded = self
            .decoder
            .decode_float(input, &mut self.scratch, fec)
            .map_err(|e| AudioError::CodecFehler(e.to_string()))?;

        let n = (decoded * self.format.wave.channels as usize).min(output.len());
        output[..n].copy_from_slice(&self.scratch[..n]);
        output[n..].fill(0.0);
        Ok(decoded)
    }

    fn reset(&mut self) -> AudioResult<()> {
        self.decoder = raw_decoder(&self.format)?;
        Ok(())
    }

    fn format(&self) -> FrameFormat {
        self.format
    }
}

fn raw_decoder(format: &FrameFormat) -> AudioResult<RawOpusDecoder> {
    let sr = rate_to_audiopus(format.wave.sample_rate)?;
    let ch = channels_to_audiopus(format.wave.channels)?;
    RawOpusDecoder::new(sr, ch).map_err(|e| AudioError::CodecFehler(e.to_string()))
}

/// Opus-Encoder fuer Tests und Simulation
pub struct OpusEncoder {
    encoder: RawOpusEncoder,
    format: FrameFormat,
    scratch: Vec<u8>,
}

impl OpusEncoder {
    /// Erstellt einen VoIP-Encoder mit Inband-FEC
    pub fn new(format: FrameFormat, bitrate_kbps: u32) -> AudioResult<Self> {
        format.validieren()?;
        let sr = rate_to_audiopus(format.wave.sample_rate)?;
        let ch = channels_to_audiopus(format.wave.channels)?;

        let mut encoder = RawOpusEncoder::new(sr, ch, Application::Voip)
            .map_err(|e| AudioError::CodecFehler(e.to_string()))?;
        encoder
            .set_bitrate(Bitrate::BitsPerSecond(bitrate_kbps as i32 * 1000))
            .map_err(|e| AudioError::CodecFehler(e.to_string()))?;
        encoder
            .set_inband_fec(true)
            .map_err(|e| AudioError::CodecFehler(e.to_string()))?;

        Ok(Self {
            encoder,
            format,
            scratch: vec![0; MAX_OPUS_PAKET],
        })
    }

    /// Kodiert genau einen Frame. Das Ergebnis wird an `out` angehaengt.
    pub fn encode(&mut self, pcm: &[f32], out: &mut Vec<u8>) -> AudioResult<()> {
        check_pcm_len(&self.format, pcm)?;
        let written = self
            .encoder
            .encode_float(pcm, &mut self.scratch)
            .map_err(|e| AudioError::CodecFehler(e.to_string()))?;
        out.extend_from_slice(&self.scratch[..written]);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Identity-Decoder: Nutzdaten sind rohe f32-Samples (little-endian)
pub struct IdentityDecoder {
    format: FrameFormat,
}

impl IdentityDecoder {
    pub fn new(format: FrameFormat) -> Self {
        Self { format }
    }
}

impl FrameDecoder for IdentityDecoder {
    fn decode(
        &mut self,
        input: Option<&[u8]>,
        output: &mut [f32],
        fec: bool,
    ) -> AudioResult<usize> {
        // Kein FEC, kein PLC: Verlust wird zu Stille
        let daten = match input {
            Some(daten) if !fec => daten,
            _ => {
                output.fill(0.0);
                return Ok(self.format.frame_size as usize);
            }
        };

        let erwartet = self.format.decoded_samples() * 4;
        if daten.len() != erwartet {
            return Err(AudioError::CodecFehler(format!(
                "Identity-Paket hat {} Bytes, erwartet {}",
                daten.len(),
                erwartet
            )));
        }

        for (sample, bytes) in output.iter_mut().zip(daten.chunks_exact(4)) {
            *sample = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        }
        Ok(self.format.frame_size as usize)
    }

    fn reset(&mut self) -> AudioResult<()> {
        Ok(())
    }

    fn format(&self) -> FrameFormat {
        self.format
    }
}

// ---------------------------------------------------------------------------
// Stille
// ---------------------------------------------------------------------------

/// Liefert immer Stille. Ersatz, wenn der eigentliche Decoder fehlt, damit
/// die Session trotzdem planmaessig endet.
pub struct SilenceDecoder {
    format: FrameFormat,
}

impl SilenceDecoder {
    pub fn new(format: FrameFormat) -> Self {
        Self { format }
    }
}

impl FrameDecoder for SilenceDecoder {
    fn decode(&mut self, _: Option<&[u8]>, output: &mut [f32], _: bool) -> AudioResult<usize> {
        output.fill(0.0);
        Ok(self.format.frame_size as usize)
    }

    fn reset(&mut self) -> AudioResult<()> {
        Ok(())
    }

    fn format(&self) -> FrameFormat {
        self.format
    }
}

// ---------------------------------------------------------------------------
// Geschlossene Decoder-Menge
// ---------------------------------------------------------------------------

/// Alle Decoder, die eine Pipeline verwenden kann
pub enum Decoder {
    Opus(OpusDecoder),
    Identity(IdentityDecoder),
    Silence(SilenceDecoder),
}

impl Decoder {
    /// Erstellt den Decoder fuer `format`.
    ///
    /// Schlaegt die Erstellung fehl, wird ein Stille-Decoder eingesetzt.
    pub fn create(format: FrameFormat) -> Self {
        let ergebnis = match format.codec {
            Codec::Opus => OpusDecoder::new(format).map(Decoder::Opus),
            Codec::Identity => format
                .validieren()
                .map(|_| Decoder::Identity(IdentityDecoder::new(format)))
                .map_err(AudioError::from),
        };

        match ergebnis {
            Ok(decoder) => decoder,
            Err(e) => {
                warn!(format = %format, fehler = %e, "Decoder nicht verfuegbar, verwende Stille");
                Decoder::Silence(SilenceDecoder::new(format))
            }
        }
    }

    /// Gibt zurueck ob dies der Ersatz-Decoder ist
    pub fn is_silence(&self) -> bool {
        matches!(self, Decoder::Silence(_))
    }

    fn inner(&mut self) -> &mut dyn FrameDecoder {
        match self {
            Decoder::Opus(d) => d,
            Decoder::Identity(d) => d,
            Decoder::Silence(d) => d,
        }
    }
}

impl FrameDecoder for Decoder {
    fn decode(
        &mut self,
        input: Option<&[u8]>,
        output: &mut [f32],
        fec: bool,
    ) -> AudioResult<usize> {
        self.inner().decode(input, output, fec)
    }

    fn reset(&mut self) -> AudioResult<()> {
        self.inner().reset()
    }

    fn format(&self) -> FrameFormat {
        match self {
            Decoder::Opus(d) => d.format(),
            Decoder::Identity(d) => d.format(),
            Decoder::Silence(d) => d.format(),
        }
    }
}

/// Encoder fuer Tests und den Simulator
pub enum Encoder {
    Opus(OpusEncoder),
    Identity(FrameFormat),
}

impl Encoder {
    /// Erstellt den passenden Encoder fuer `format`
    pub fn create(format: FrameFormat) -> AudioResult<Self> {
        match format.codec {
            Codec::Opus => Ok(Encoder::Opus(OpusEncoder::new(format, 32)?)),
            Codec::Identity => {
                format.validieren()?;
                Ok(Encoder::Identity(format))
            }
        }
    }

    /// Kodiert genau einen Frame (`frame_size * channels` Samples)
    pub fn encode(&mut self, pcm: &[f32], out: &mut Vec<u8>) -> AudioResult<()> {
        match self {
            Encoder::Opus(e) => e.encode(pcm, out),
            Encoder::Identity(format) => {
                check_pcm_len(format, pcm)?;
                out.reserve(pcm.len() * 4);
                for s in pcm {
                    out.extend_from_slice(&s.to_le_bytes());
                }
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Konvertierungs-Hilfsfunktionen
// ---------------------------------------------------------------------------

fn check_pcm_len(format: &FrameFormat, pcm: &[f32]) -> AudioResult<()> {
    if pcm.len() != format.decoded_samples() {
        return Err(AudioError::CodecFehler(format!(
            "PCM-Frame muss {} Samples lang sein, war {}",
            format.decoded_samples(),
            pcm.len()
        )));
    }
    Ok(())
}

fn rate_to_audiopus(rate: u32) -> AudioResult<SampleRate> {
    match rate {
        8_000 => Ok(SampleRate::Hz8000),
        12_000 => Ok(SampleRate::Hz12000),
        16_000 => Ok(SampleRate::Hz16000),
        24_000 => Ok(SampleRate::Hz24000),
        48_000 => Ok(SampleRate::Hz48000),
        andere => Err(AudioError::DecoderNichtVerfuegbar(format!(
            "Opus unterstuetzt {} Hz nicht",
            andere
        ))),
    }
}

fn channels_to_audiopus(channels: u16) -> AudioResult<Channels> {
    match channels {
        1 => Ok(Channels::Mono),
        2 => Ok(Channels::Stereo),
        andere => Err(AudioError::DecoderNichtVerfuegbar(format!(
            "Opus unterstuetzt {} Kanaele nicht",
            andere
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmel_core::types::WaveFormat;

    fn opus_format() -> FrameFormat {
        FrameFormat::from_millis(Codec::Opus, WaveFormat::mono(48_000), 20)
    }

    fn identity_format() -> FrameFormat {
        FrameFormat::from_millis(Codec::Identity, WaveFormat::mono(16_000), 20)
    }

    fn sinus(n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| (i as f32 * 440.0 * 2.0 * std::f32::consts::PI / 48_000.0).sin() * 0.3)
            .collect()
    }

    #[test]
    fn opus_encode_decode() {
        let format = opus_format();
        let mut enc = Encoder::create(format).unwrap();
        let mut dec = Decoder::create(format);
        assert!(!dec.is_silence());

        let mut paket = Vec::new();
        enc.encode(&sinus(960), &mut paket).unwrap();
        assert!(!paket.is_empty());

        let mut out = vec![0.0f32; 960];
        let n = dec.decode(Some(&paket), &mut out, false).unwrap();
        assert_eq!(n, 960);
    }

    #[test]
    fn opus_plc_liefert_frame() {
        let mut dec = Decoder::create(opus_format());
        let mut out = vec![1.0f32; 960];
        let n = dec.decode(None, &mut out, false).unwrap();
        assert_eq!(n, 960);
    }

    #[test]
    fn opus_falsche_rate_wird_stille() {
        let format = FrameFormat::from_millis(Codec::Opus, WaveFormat::mono(44_100), 20);
        let dec = Decoder::create(format);
        assert!(dec.is_silence());
    }

    #[test]
    fn identity_dekodiert_f32() {
        let format = identity_format();
        let pcm: Vec<f32> = (0..320).map(|i| i as f32 / 320.0).collect();
        let mut enc = Encoder::create(format).unwrap();
        let mut paket = Vec::new();
        enc.encode(&pcm, &mut paket).unwrap();

        let mut dec = Decoder::create(format);
        let mut out = vec![0.0f32; 320];
        assert_eq!(dec.decode(Some(&paket), &mut out, false).unwrap(), 320);
        assert_eq!(out, pcm);
    }

    #[test]
    fn identity_verlust_ist_stille() {
        let mut dec = Decoder::create(identity_format());
        let mut out = vec![0.5f32; 320];
        assert_eq!(dec.decode(None, &mut out, false).unwrap(), 320);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn identity_kaputtes_paket_ist_codec_fehler() {
        let mut dec = Decoder::create(identity_format());
        let mut out = vec![0.0f32; 320];
        let err = dec.decode(Some(&[1, 2, 3]), &mut out, false).unwrap_err();
        assert!(matches!(err, AudioError::CodecFehler(_)));
    }

    #[test]
    fn ungueltiges_format_wird_stille() {
        let format = FrameFormat::new(Codec::Identity, WaveFormat::mono(16_000), 0);
        assert!(Decoder::create(format).is_silence());
    }

    #[test]
    fn encoder_prueft_frame_laenge() {
        let mut enc = Encoder::create(identity_format()).unwrap();
        let mut out = Vec::new();
        assert!(enc.encode(&[0.0; 10], &mut out).is_err());
    }
}
