//! Audio-Geraete-Abfrage via cpal
//!
//! Stellt fest ob ein Ein-/Ausgabegeraet vorhanden ist und liefert die
//! Standardgeraete des Hosts.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::Device;
use tracing::{debug, warn};

use crate::error::{AudioError, AudioResult};

/// Anzeigename eines Geraets (Fallback "unbekannt")
pub fn geraetename(device: &Device) -> String {
    device.name().unwrap_or_else(|_| "unbekannt".to_string())
}

/// Standard-Eingabegeraet des Hosts
pub fn default_input() -> AudioResult<Device> {
    cpal::default_host()
        .default_input_device()
        .ok_or(AudioError::KeinStandardEingabegeraet)
}

/// Standard-Ausgabegeraet des Hosts
pub fn default_output() -> AudioResult<Device> {
    cpal::default_host()
        .default_output_device()
        .ok_or(AudioError::KeinStandardAusgabegeraet)
}

/// Zaehlt die Eingabegeraete des Hosts (0 bei Fehlern)
pub fn input_device_count() -> usize {
    match cpal::default_host().input_devices() {
        Ok(devices) => {
            let anzahl = devices.count();
            debug!("Gefundene Eingabegeraete: {}", anzahl);
            anzahl
        }
        Err(e) => {
            warn!("Eingabegeraete konnten nicht gelesen werden: {}", e);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore = "Benoetigt Audio-Hardware"]
    fn standard_eingabe_vorhanden() {
        let device = default_input().expect("Kein Eingabegeraet");
        assert!(!geraetename(&device).is_empty());
        assert!(input_device_count() > 0);
    }
}
