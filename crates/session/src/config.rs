//! Session-Konfiguration
//!
//! Wird bei der Konstruktion einer [`crate::VoiceSession`] uebergeben und
//! ist danach unveraenderlich. Fehlende Felder in TOML/JSON erhalten die
//! Standardwerte.

use huddle_audio::DEFAULT_LEVEL_WINDOW;
use huddle_core::{HuddleError, HuddleResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Startet die Session gemutet
    pub initial_mute: bool,
    /// Eingangslautstaerke (0.0 - 1.0)
    pub initial_in_volume: f32,
    /// Ausgangslautstaerke (0.0 - 1.0)
    pub initial_out_volume: f32,
    /// Intervall der Pegelpruefung in Sekunden
    pub audio_level_check_interval_secs: f64,
    /// Samples pro Pegelberechnung
    pub level_window: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            initial_mute: true,
            initial_in_volume: 1.0,
            initial_out_volume: 1.0,
            audio_level_check_interval_secs: 1.0,
            level_window: DEFAULT_LEVEL_WINDOW,
        }
    }
}

impl SessionConfig {
    /// Prueft die Konfiguration. Fehler fuehren zum Abbruch der Konstruktion.
    pub fn validieren(&self) -> HuddleResult<()> {
        let intervall = self.audio_level_check_interval_secs;
        if pruefintervall(intervall).is_none() {
            return Err(HuddleError::Konfiguration(format!(
                "audio_level_check_interval_secs muss > 0 und als Dauer darstellbar sein, ist {intervall}"
            )));
        }
        for (name, wert) in [
            ("initial_in_volume", self.initial_in_volume),
            ("initial_out_volume", self.initial_out_volume),
        ] {
            if !wert.is_finite() || !(0.0..=1.0).contains(&wert) {
                return Err(HuddleError::Konfiguration(format!(
                    "{name} muss zwischen 0.0 und 1.0 liegen, ist {wert}"
                )));
            }
        }
        if self.level_window == 0 {
            return Err(HuddleError::Konfiguration(
                "level_window muss mindestens 1 sein".to_string(),
            ));
        }
        Ok(())
    }

    /// Intervall der Pegelpruefung. Ohne vorherige Validierung faellt ein
    /// nicht darstellbarer Wert auf das Standardintervall zurueck.
    pub fn intervall(&self) -> Duration {
        pruefintervall(self.audio_level_check_interval_secs).unwrap_or(STANDARD_INTERVALL)
    }
}

const STANDARD_INTERVALL: Duration = Duration::from_secs(1);

/// Sekunden als Dauer; None bei negativ, NaN, Ueberlauf oder Rundung auf 0
fn pruefintervall(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|dauer| !dauer.is_zero())
}
