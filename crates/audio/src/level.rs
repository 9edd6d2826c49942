//! Pegel-Analyse
//!
//! Der Analyse-Tap behaelt die letzten `window` Samples einer Audio-Kette
//! in einem ueberschreibenden Ring-Buffer. Der Pegel ist der Mittelwert der
//! Absolutwerte dieses Fensters: kein echtes RMS, aber billig und als
//! Lautheits-Indikator ausreichend.

use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Observer, RingBuffer};
use ringbuf::HeapRb;
use std::sync::Arc;

/// Standard-Fenstergroesse in Samples
pub const DEFAULT_LEVEL_WINDOW: usize = 2048;

/// Mittelwert der Absolutwerte (0.0 fuer leere Eingabe)
pub fn mean_abs_level(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s.abs()).sum();
    sum / samples.len() as f32
}

struct TapInner {
    window: usize,
    samples: HeapRb<f32>,
    connected: bool,
}

/// Analyse-Tap hinter der Gain-Stufe (Clone teilt das Fenster)
#[derive(Clone)]
pub struct AnalysisTap {
    inner: Arc<Mutex<TapInner>>,
}

impl AnalysisTap {
    /// Erstellt einen Tap mit fester Fenstergroesse (mindestens 1 Sample)
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            inner: Arc::new(Mutex::new(TapInner {
                window,
                samples: HeapRb::new(window),
                connected: true,
            })),
        }
    }

    /// Schreibt Samples ins Fenster; aeltere Samples werden ueberschrieben
    pub fn push(&self, samples: &[f32]) {
        let mut inner = self.inner.lock();
        if !inner.connected {
            return;
        }
        let start = samples.len().saturating_sub(inner.window);
        inner.samples.push_slice_overwrite(&samples[start..]);
    }

    /// Aktueller Pegel ueber das Fenster
    pub fn level(&self) -> f32 {
        let inner = self.inner.lock();
        if !inner.connected {
            return 0.0;
        }
        let fenster: Vec<f32> = inner.samples.iter().copied().collect();
        mean_abs_level(&fenster)
    }

    /// Anzahl der aktuell im Fenster gehaltenen Samples
    pub fn len(&self) -> usize {
        self.inner.lock().samples.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fenstergroesse in Samples
    pub fn window(&self) -> usize {
        self.inner.lock().window
    }

    /// Verwirft das Fenster, der Tap bleibt verbunden
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.samples = HeapRb::new(inner.window);
    }

    /// Trennt den Tap von der Kette: verwirft das Fenster, ignoriert
    /// weitere Samples und meldet Pegel 0
    pub fn disconnect(&self) {
        let mut inner = self.inner.lock();
        inner.connected = false;
        inner.samples = HeapRb::new(inner.window);
    }

    pub fn is_connected(&self) -> bool {
        self.inner.lock().connected
    }
}

impl std::fmt::Debug for AnalysisTap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("AnalysisTap")
            .field("window", &inner.window)
            .field("len", &inner.samples.occupied_len())
            .field("connected", &inner.connected)
            .finish()
    }
}
