//! Fehlertypen fuer die Audio-Bausteine

use thiserror::Error;

/// Alle moeglichen Fehler beim Aufbau von Capture- und Playback-Ressourcen
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Audio-Geraet nicht gefunden: {0}")]
    GeraetNichtGefunden(String),

    #[error("Kein Standard-Eingabegeraet verfuegbar")]
    KeinStandardEingabegeraet,

    #[error("Kein Standard-Ausgabegeraet verfuegbar")]
    KeinStandardAusgabegeraet,

    #[error("Stream-Fehler: {0}")]
    StreamFehler(String),

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unerwarteter Fehler: {0}")]
    Anyhow(#[from] anyhow::Error),
}

impl AudioError {
    /// Gibt true zurueck wenn schlicht kein Geraet vorhanden ist
    /// (im Gegensatz zu einem Fehler beim Oeffnen eines vorhandenen Geraets)
    pub fn ist_geraet_fehlt(&self) -> bool {
        matches!(
            self,
            Self::GeraetNichtGefunden(_)
                | Self::KeinStandardEingabegeraet
                | Self::KeinStandardAusgabegeraet
        )
    }
}

pub type AudioResult<T> = Result<T, AudioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geraet_fehlt_erkennung() {
        assert!(AudioError::KeinStandardEingabegeraet.ist_geraet_fehlt());
        assert!(AudioError::GeraetNichtGefunden("usb".into()).ist_geraet_fehlt());
        assert!(!AudioError::StreamFehler("busy".into()).ist_geraet_fehlt());
    }
}
