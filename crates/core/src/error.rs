//! Fehlertypen fuer Huddle
//!
//! Zentraler Fehler-Enum fuer alle Session-Operationen.
//! Untermodule koennen eigene Fehler definieren und via `From` konvertieren.

use thiserror::Error;

/// Globaler Result-Alias fuer Huddle
pub type HuddleResult<T> = std::result::Result<T, HuddleError>;

/// Alle moeglichen Fehler einer Voice-Session
#[derive(Debug, Error)]
pub enum HuddleError {
    // --- Geraete & Ressourcen ---
    /// Kein Aufnahmegeraet vorhanden. Nicht fatal: die Session laeuft
    /// ohne Mikrofon (gemutet) weiter.
    #[error("Kein Aufnahmegeraet verfuegbar")]
    GeraetNichtVerfuegbar,

    /// Aufbau einer Capture- oder Playback-Ressource fehlgeschlagen.
    /// Betrifft nur den einen Teilnehmer.
    #[error("Ressource fuer '{teilnehmer}' konnte nicht aufgebaut werden: {grund}")]
    Ressource { teilnehmer: String, grund: String },

    // --- Zustand ---
    /// Kommando im aktuellen Session-Zustand nicht erlaubt
    #[error("Ungueltiger Zustand fuer '{aktion}': {zustand}")]
    UngueltigerZustand { aktion: String, zustand: String },

    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    // --- Transport ---
    #[error("Transportfehler: {0}")]
    Transport(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl HuddleError {
    /// Erstellt einen Ressourcen-Fehler fuer einen Teilnehmer
    pub fn ressource(teilnehmer: impl Into<String>, grund: impl Into<String>) -> Self {
        Self::Ressource {
            teilnehmer: teilnehmer.into(),
            grund: grund.into(),
        }
    }

    /// Erstellt einen Zustandsfehler
    pub fn ungueltiger_zustand(aktion: impl Into<String>, zustand: impl ToString) -> Self {
        Self::UngueltigerZustand {
            aktion: aktion.into(),
            zustand: zustand.to_string(),
        }
    }

    /// Gibt true zurueck wenn der Fehler nur einen Teilnehmer betrifft
    /// und die Session weiterlaufen kann
    pub fn ist_isoliert(&self) -> bool {
        matches!(self, Self::GeraetNichtVerfuegbar | Self::Ressource { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        let e = HuddleError::ressource("alice", "Stream-Fehler");
        assert_eq!(
            e.to_string(),
            "Ressource fuer 'alice' konnte nicht aufgebaut werden: Stream-Fehler"
        );
    }

    #[test]
    fn zustandsfehler_anzeige() {
        let e = HuddleError::ungueltiger_zustand("disconnect", "Disconnected");
        assert!(e.to_string().contains("disconnect"));
        assert!(e.to_string().contains("Disconnected"));
    }

    #[test]
    fn isolierte_fehler() {
        assert!(HuddleError::GeraetNichtVerfuegbar.ist_isoliert());
        assert!(HuddleError::ressource("a", "b").ist_isoliert());
        assert!(!HuddleError::Konfiguration("x".into()).ist_isoliert());
        assert!(!HuddleError::ungueltiger_zustand("connect", "Connecting").ist_isoliert());
    }
}
