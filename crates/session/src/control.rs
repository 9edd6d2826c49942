//! Steuerflaeche fuer Mute und Lautstaerke
//!
//! Alle Aufrufe sind synchron und idempotent. Lautstaerken werden auf
//! 0.0..=1.0 geklemmt bevor sie gespeichert oder angewendet werden.

use huddle_audio::clamp_volume;
use huddle_observability::SessionMetrics;
use tracing::debug;

use crate::table::{ResourceTable, SessionState};

/// Mute-/Lautstaerke-Steuerung auf der Ressourcen-Tabelle
#[derive(Debug, Clone)]
pub struct ControlSurface {
    table: ResourceTable,
    initial: SessionState,
    metrics: SessionMetrics,
}

impl ControlSurface {
    pub fn new(table: ResourceTable, initial: SessionState, metrics: SessionMetrics) -> Self {
        Self {
            table,
            initial,
            metrics,
        }
    }

    /// Schaltet Mute um und gibt den neuen Zustand zurueck.
    ///
    /// Ohne Mikrofon oder Sende-Ressource bleibt alles unveraendert und der
    /// aktuelle Zustand wird zurueckgegeben.
    pub fn toggle_mute(&self) -> bool {
        self.mute_umschalten()
            .unwrap_or_else(|| self.table.state().mute)
    }

    /// Wie [`ControlSurface::toggle_mute`], liefert aber nur dann den neuen
    /// Zustand, wenn tatsaechlich umgeschaltet wurde. Lesen und Umschalten
    /// geschehen unter einem Lock der Tabelle.
    pub fn mute_umschalten(&self) -> Option<bool> {
        if !self.has_microphone() {
            return None;
        }
        match self.table.mute_umschalten() {
            Some(mute) => {
                self.metrics.mute_toggles_total.inc();
                debug!(mute, "Mute umgeschaltet");
                Some(mute)
            }
            None => {
                debug!("Keine Sende-Ressource, Mute unveraendert");
                None
            }
        }
    }

    /// Setzt die Eingangslautstaerke. Ohne Sende-Ressource ein No-op.
    /// Gibt die danach gueltige Eingangslautstaerke zurueck.
    pub fn set_in_volume(&self, volume: f32) -> f32 {
        let volume = clamp_volume(volume);
        match self.table.in_volume_setzen(volume) {
            Some(gesetzt) => {
                debug!(volume = gesetzt, "Eingangslautstaerke gesetzt");
                gesetzt
            }
            None => self.table.state().in_volume,
        }
    }

    /// Setzt die Ausgangslautstaerke fuer alle bestehenden und kuenftigen
    /// Empfangs-Ressourcen. Gibt den geklemmten Wert zurueck.
    pub fn set_out_volume(&self, volume: f32) -> f32 {
        let volume = clamp_volume(volume);
        let angepasst = self.table.out_volume_setzen(volume);
        debug!(volume, angepasst, "Ausgangslautstaerke gesetzt");
        volume
    }

    /// Setzt Mute und Lautstaerken auf die konfigurierten Startwerte.
    /// Lebende Ressourcen werden nicht angefasst.
    pub fn clear(&self) {
        self.table.state_setzen(self.initial);
        debug!("Session-Zustand zurueckgesetzt");
    }

    pub fn has_microphone(&self) -> bool {
        self.table.capability().has_microphone()
    }

    pub fn state(&self) -> SessionState {
        self.table.state()
    }
}
