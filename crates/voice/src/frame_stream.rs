//! Frame-to-Stream Adapter
//!
//! Macht aus Frames fester Laenge einen Pull-Stream beliebiger
//! Blockgroesse. Der angebrochene Frame bleibt zwischen Aufrufen erhalten.

use murmel_audio::AudioResult;

/// Pull-Stream ueber Frames fester Laenge
#[derive(Debug, Clone)]
pub struct FrameToStream {
    frame: Vec<f32>,
    /// Lese-Position im Frame (`frame.len()` = Frame verbraucht)
    offset: usize,
    complete: bool,
}

impl FrameToStream {
    pub fn new(frame_size: usize) -> Self {
        let frame_size = frame_size.max(1);
        Self {
            frame: vec![0.0; frame_size],
            offset: frame_size,
            complete: false,
        }
    }

    /// Fuellt `out` vollstaendig. `upstream` fuellt einen ganzen Frame und
    /// meldet `true`, wenn keine Frames mehr kommen.
    ///
    /// Nach dem Ende wird mit Stille aufgefuellt. Gibt `true` zurueck,
    /// sobald alle echten Samples ausgegeben sind.
    pub fn read<F>(&mut self, out: &mut [f32], mut upstream: F) -> AudioResult<bool>
    where
        F: FnMut(&mut [f32]) -> AudioResult<bool>,
    {
        let mut geschrieben = 0;
        while geschrieben < out.len() {
            if self.offset == self.frame.len() {
                if self.complete {
                    out[geschrieben..].fill(0.0);
                    break;
                }
                if upstream(&mut self.frame[..])? {
                    self.complete = true;
                    continue;
                }
                self.offset = 0;
            }

            let n = (self.frame.len() - self.offset).min(out.len() - geschrieben);
            out[geschrieben..geschrieben + n]
                .copy_from_slice(&self.frame[self.offset..self.offset + n]);
            self.offset += n;
            geschrieben += n;
        }

        Ok(self.complete && self.offset == self.frame.len())
    }

    /// Noch nicht ausgegebene Samples des angebrochenen Frames
    pub fn pending(&self) -> usize {
        self.frame.len() - self.offset
    }

    pub fn reset(&mut self) {
        self.offset = self.frame.len();
        self.complete = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Liefert `frames` Frames mit fortlaufenden Werten, danach Ende
    fn quelle(frames: usize) -> impl FnMut(&mut [f32]) -> AudioResult<bool> {
        let mut nr = 0usize;
        let mut wert = 0.0f32;
        move |buf: &mut [f32]| {
            if nr == frames {
                return Ok(true);
            }
            nr += 1;
            for s in buf.iter_mut() {
                wert += 1.0;
                *s = wert;
            }
            Ok(false)
        }
    }

    #[test]
    fn bloecke_ueber_frame_grenzen() {
        let mut s = FrameToStream::new(4);
        let mut q = quelle(10);
        let mut out = [0.0f32; 3];
        s.read(&mut out, &mut q).unwrap();
        assert_eq!(out, [1.0, 2.0, 3.0]);
        assert_eq!(s.pending(), 1);
        s.read(&mut out, &mut q).unwrap();
        assert_eq!(out, [4.0, 5.0, 6.0]);
    }

    #[test]
    fn grosser_block_zieht_mehrere_frames() {
        let mut s = FrameToStream::new(2);
        let mut q = quelle(10);
        let mut out = [0.0f32; 7];
        s.read(&mut out, &mut q).unwrap();
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn ende_fuellt_stille_auf() {
        let mut s = FrameToStream::new(4);
        let mut q = quelle(1);
        let mut out = [9.0f32; 6];
        assert!(s.read(&mut out, &mut q).unwrap());
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0, 0.0, 0.0]);
    }

    #[test]
    fn ende_erst_nach_letztem_sample() {
        let mut s = FrameToStream::new(4);
        let mut q = quelle(1);
        let mut out = [0.0f32; 2];
        assert!(!s.read(&mut out, &mut q).unwrap());
        // Restliche zwei Samples, Ende wird erst beim naechsten Frame bemerkt
        assert!(!s.read(&mut out, &mut q).unwrap());
        assert!(s.read(&mut out, &mut q).unwrap());
        assert_eq!(out, [0.0, 0.0]);
    }

    #[test]
    fn reset_verwirft_angebrochenen_frame() {
        let mut s = FrameToStream::new(4);
        let mut q = quelle(10);
        let mut out = [0.0f32; 1];
        s.read(&mut out, &mut q).unwrap();
        s.reset();
        assert_eq!(s.pending(), 0);
        s.read(&mut out, &mut q).unwrap();
        assert_eq!(out, [5.0]);
    }
}
