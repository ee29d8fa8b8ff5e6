//! Uhr-Abstraktion
//!
//! Der Synchronizer und die Session-Verwaltung arbeiten mit einer
//! monotonen Zeit seit einem beliebigen Ursprung. In Tests wird die Zeit
//! ueber `ManualClock` explizit weitergeschaltet.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotone Zeitquelle
pub trait Clock: Send + Sync {
    /// Zeit seit dem Ursprung der Uhr
    fn now(&self) -> Duration;
}

/// Geteilte Uhr
pub type SharedClock = Arc<dyn Clock>;

/// Systemuhr auf Basis von `Instant`
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Von Hand weitergeschaltete Uhr (Tests, Simulation).
///
/// Klone teilen sich dieselbe Zeit.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    micros: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schaltet die Uhr um `d` weiter
    pub fn advance(&self, d: Duration) {
        self.micros.fetch_add(d.as_micros() as u64, Ordering::SeqCst);
    }

    /// Setzt die Uhr auf einen absoluten Wert
    pub fn set(&self, t: Duration) {
        self.micros.store(t.as_micros() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_micros(self.micros.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manuelle_uhr_klone_teilen_zeit() {
        let uhr = ManualClock::new();
        let klon = uhr.clone();
        uhr.advance(Duration::from_millis(20));
        assert_eq!(klon.now(), Duration::from_millis(20));
        klon.set(Duration::from_secs(3));
        assert_eq!(uhr.now(), Duration::from_secs(3));
    }

    #[test]
    fn systemuhr_ist_monoton() {
        let uhr = SystemClock::new();
        let a = uhr.now();
        let b = uhr.now();
        assert!(b >= a);
    }
}
