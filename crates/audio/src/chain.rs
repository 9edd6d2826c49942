//! Audio-Kette: Quelle -> Gain -> Analyse -> Ziel
//!
//! Sowohl die lokale Sende-Kette (Mikrofon -> Track) als auch die
//! Empfangs-Kette (Remote-Track -> Lautsprecher) bestehen aus einer
//! Gain-Stufe gefolgt von einem Analyse-Tap. Die Kette ist Clone, damit
//! Audio-Callbacks und die Ressourcen-Tabelle dieselben Stufen teilen.

use crate::gain::GainControl;
use crate::level::AnalysisTap;

/// Gain-Stufe plus Analyse-Tap
#[derive(Debug, Clone)]
pub struct AudioChain {
    gain: GainControl,
    tap: AnalysisTap,
}

impl AudioChain {
    /// Erstellt eine Kette mit Start-Gain und Analyse-Fenster
    pub fn new(gain: f32, window: usize) -> Self {
        Self {
            gain: GainControl::new(gain),
            tap: AnalysisTap::new(window),
        }
    }

    /// Verarbeitet einen Frame: Gain anwenden, in den Tap schreiben,
    /// verstaerkten Frame an das Ziel zurueckgeben
    pub fn process(&self, input: &[f32]) -> Vec<f32> {
        let mut samples = input.to_vec();
        self.gain.apply(&mut samples);
        self.tap.push(&samples);
        samples
    }

    pub fn gain(&self) -> &GainControl {
        &self.gain
    }

    pub fn tap(&self) -> &AnalysisTap {
        &self.tap
    }

    /// Aktueller Pegel hinter der Gain-Stufe
    pub fn level(&self) -> f32 {
        self.tap.level()
    }

    /// Trennt den Analyse-Tap (beim Abbau der Ressource)
    pub fn disconnect(&self) {
        self.tap.disconnect();
    }
}
