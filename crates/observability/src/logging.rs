//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Konfigurationsdatei (`[logging]`) und Umgebungsvariable:
//! - `HUDDLE_LOG_LEVEL`: Log-Level oder EnvFilter-Direktive, Standard: info
//! - `HUDDLE_LOG_FORMAT`: Format (text/json), Standard: text
//!
//! Die Umgebung hat Vorrang vor der Datei. Session-Ereignisse tragen
//! strukturierte Felder (`teilnehmer`, `raum`), die im JSON-Format als
//! eigene Schluessel erscheinen.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, EnvFilter};

/// Abschnitt `[logging]` der Client-Konfiguration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Prueft Level und Format, liefert eine lesbare Fehlermeldung
    pub fn validieren(&self) -> Result<(), String> {
        if !log_level_gueltig(&self.level) {
            return Err(format!("Ungueltiges Log-Level: {}", self.level));
        }
        if !log_format_gueltig(&self.format) {
            return Err(format!("Ungueltiges Log-Format: {}", self.format));
        }
        Ok(())
    }
}

/// Initialisiert das Logging-System.
///
/// Ein bereits installierter Subscriber bleibt bestehen (mehrfacher Aufruf
/// z.B. aus Tests ist harmlos).
pub fn logging_initialisieren(level: &str, format: &str) {
    let filter =
        EnvFilter::try_new(log_level_aus_env(level)).unwrap_or_else(|_| EnvFilter::new("info"));

    let ergebnis = match log_format_aus_env(format).as_str() {
        "json" => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_names(true)
            .with_current_span(true)
            .try_init(),
        _ => fmt().with_env_filter(filter).with_target(true).try_init(),
    };

    if ergebnis.is_err() {
        tracing::debug!("Logging bereits initialisiert");
    }
}

/// Initialisiert das Logging aus dem Konfigurationsabschnitt
pub fn logging_aus_config(config: &LoggingConfig) {
    logging_initialisieren(&config.level, &config.format);
}

/// Wirksamer Log-Level: `HUDDLE_LOG_LEVEL` oder der konfigurierte Wert
pub fn log_level_aus_env(konfiguriert: &str) -> String {
    std::env::var("HUDDLE_LOG_LEVEL").unwrap_or_else(|_| konfiguriert.to_string())
}

/// Wirksames Log-Format: `HUDDLE_LOG_FORMAT` oder der konfigurierte Wert
pub fn log_format_aus_env(konfiguriert: &str) -> String {
    std::env::var("HUDDLE_LOG_FORMAT").unwrap_or_else(|_| konfiguriert.to_string())
}

/// Validiert ob ein Log-Level-String gueltig ist.
pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

/// Validiert ob ein Log-Format-String gueltig ist.
pub fn log_format_gueltig(format: &str) -> bool {
    matches!(format, "text" | "json")
}
