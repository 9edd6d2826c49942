//! Gain-Stufe der Audio-Kette
//!
//! Haelt einen Lautstaerke-Faktor im Bereich 0.0..=1.0. Der Wert liegt als
//! f32-Bitmuster in einem AtomicU32, damit Audio-Callbacks ihn ohne Lock
//! lesen koennen, waehrend die Steuerflaeche ihn aendert.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Klemmt eine Lautstaerke auf 0.0..=1.0 (NaN wird zu 0.0)
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        return 0.0;
    }
    volume.clamp(0.0, 1.0)
}

/// Geteilte Gain-Stufe (Clone teilt den Wert)
#[derive(Debug, Clone)]
pub struct GainControl {
    bits: Arc<AtomicU32>,
}

impl GainControl {
    /// Erstellt eine Gain-Stufe mit dem (geklemmten) Startwert
    pub fn new(volume: f32) -> Self {
        Self {
            bits: Arc::new(AtomicU32::new(clamp_volume(volume).to_bits())),
        }
    }

    /// Setzt den Gain sofort (geklemmt) und gibt den effektiven Wert zurueck
    pub fn set(&self, volume: f32) -> f32 {
        let v = clamp_volume(volume);
        self.bits.store(v.to_bits(), Ordering::Relaxed);
        v
    }

    /// Aktueller Gain
    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Wendet den Gain auf einen Sample-Buffer an
    pub fn apply(&self, samples: &mut [f32]) {
        let gain = self.get();
        if (gain - 1.0).abs() < f32::EPSILON {
            return;
        }
        for s in samples.iter_mut() {
            *s *= gain;
        }
    }
}

impl Default for GainControl {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gain_default_eins() {
        let gain = GainControl::default();
        assert!((gain.get() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn gain_clamp_max() {
        let gain = GainControl::new(1.0);
        assert!((gain.set(2.0) - 1.0).abs() < f32::EPSILON);
        assert!((gain.get() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn gain_clamp_min() {
        let gain = GainControl::new(1.0);
        assert_eq!(gain.set(-1.0), 0.0);
        assert_eq!(gain.get(), 0.0);
    }

    #[test]
    fn gain_nan_wird_null() {
        assert_eq!(clamp_volume(f32::NAN), 0.0);
    }

    #[test]
    fn gain_skaliert_samples() {
        let gain = GainControl::new(0.5);
        let mut samples = vec![1.0f32; 4];
        gain.apply(&mut samples);
        for s in &samples {
            assert!((*s - 0.5).abs() < 0.001, "Gain 0.5 erwartet, war {}", s);
        }
    }

    #[test]
    fn gain_null_ergibt_stille() {
        let gain = GainControl::new(0.0);
        let mut samples = vec![0.8f32; 480];
        gain.apply(&mut samples);
        assert!(samples.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn clone_teilt_wert() {
        let a = GainControl::new(1.0);
        let b = a.clone();
        a.set(0.25);
        assert!((b.get() - 0.25).abs() < f32::EPSILON);
    }
}
