//! Client-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Fehlt die Datei, laeuft
//! der Client mit Standardwerten.

use huddle_observability::LoggingConfig;
use huddle_session::SessionConfig;
use serde::{Deserialize, Serialize};

/// Vollstaendige Client-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Session-Einstellungen (Mute, Lautstaerken, Pegel-Intervall)
    pub session: SessionConfig,
    /// Logging-Einstellungen
    pub logging: LoggingConfig,
    /// Audio-Backend
    pub audio: AudioEinstellungen,
    /// Ablauf der Demo
    pub demo: DemoEinstellungen,
}

/// Audio-Backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioEinstellungen {
    /// "synthetic" oder "cpal"
    pub backend: String,
    /// Amplitude des synthetischen Mikrofon-Signals
    pub amplitude: f32,
}

impl Default for AudioEinstellungen {
    fn default() -> Self {
        Self {
            backend: "synthetic".into(),
            amplitude: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoEinstellungen {
    /// Name des Raums
    pub raum: String,
    /// Lokale ParticipantId
    pub teilnehmer: String,
    /// Simulierte entfernte Teilnehmer
    pub gaeste: Vec<String>,
    /// Laufzeit in Sekunden
    pub dauer_secs: u64,
}

impl Default for DemoEinstellungen {
    fn default() -> Self {
        Self {
            raum: "lobby".into(),
            teilnehmer: "ich".into(),
            gaeste: vec!["bob".into(), "carol".into()],
            dauer_secs: 5,
        }
    }
}

impl ClientConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        let config = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str::<Self>(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Self::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
                ))
            }
        };
        config.validieren()?;
        Ok(config)
    }

    pub fn validieren(&self) -> anyhow::Result<()> {
        self.session.validieren()?;
        self.logging
            .validieren()
            .map_err(|e| anyhow::anyhow!("[logging] {e}"))?;
        match self.audio.backend.as_str() {
            "synthetic" | "cpal" => Ok(()),
            anderes => Err(anyhow::anyhow!(
                "[audio] Unbekanntes Backend '{anderes}' (erlaubt: synthetic, cpal)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ClientConfig::default();
        assert!(cfg.validieren().is_ok());
        assert!(cfg.session.initial_mute);
        assert_eq!(cfg.audio.backend, "synthetic");
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [session]
            initial_mute = false
            audio_level_check_interval_secs = 0.5

            [audio]
            backend = "cpal"

            [demo]
            gaeste = ["dave"]
        "#;
        let cfg: ClientConfig = toml::from_str(toml).unwrap();
        assert!(!cfg.session.initial_mute);
        assert_eq!(cfg.session.initial_out_volume, 1.0);
        assert_eq!(cfg.audio.backend, "cpal");
        assert_eq!(cfg.audio.amplitude, 0.3);
        assert_eq!(cfg.demo.gaeste, vec!["dave".to_string()]);
        assert_eq!(cfg.demo.raum, "lobby");
    }

    #[test]
    fn unbekanntes_backend_abgelehnt() {
        let mut cfg = ClientConfig::default();
        cfg.audio.backend = "jack".into();
        let fehler = cfg.validieren().unwrap_err().to_string();
        assert!(fehler.contains("jack"));
    }

    #[test]
    fn fehlende_datei_liefert_standard() {
        let cfg = ClientConfig::laden("/nicht/vorhanden/huddle.toml").unwrap();
        assert_eq!(cfg.demo.dauer_secs, 5);
    }
}
