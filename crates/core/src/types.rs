//! Gemeinsame Identifikations- und Werttypen fuer Huddle
//!
//! Teilnehmer werden vom Transport ueber ihren Stream-Namen identifiziert.
//! Die ID ist ein opaker String und wird im Newtype gekapselt, damit sie
//! nicht mit Raumnamen oder anderen Strings verwechselt werden kann.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Eindeutige Teilnehmer-ID (Besitzer eines Publish-/Subscribe-Streams)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Erstellt eine ParticipantId aus dem Stream-Namen des Transports
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Gibt die ID als String-Slice zurueck
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ParticipantId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ParticipantId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pegel aller aktuell Audio liefernden Teilnehmer zu einem Messzeitpunkt
///
/// Enthaelt genau einen Eintrag pro lebender Ressource (lokal + remote).
/// Sortiert nach ParticipantId, damit Ausgaben stabil sind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AudioLevelSnapshot(BTreeMap<ParticipantId, f32>);

impl AudioLevelSnapshot {
    /// Leerer Snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Setzt den Pegel eines Teilnehmers
    pub fn insert(&mut self, id: ParticipantId, level: f32) {
        self.0.insert(id, level);
    }

    /// Pegel eines Teilnehmers (None wenn nicht enthalten)
    pub fn get(&self, id: &ParticipantId) -> Option<f32> {
        self.0.get(id).copied()
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.0.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iteriert ueber alle (ID, Pegel)-Paare
    pub fn iter(&self) -> impl Iterator<Item = (&ParticipantId, f32)> {
        self.0.iter().map(|(id, level)| (id, *level))
    }

    /// Prueft ob sich dieser Snapshot von `vorher` unterscheidet.
    ///
    /// Unterschied = ein Schluessel kam hinzu, fiel weg, oder ein Wert ist
    /// nicht exakt gleich. Exakter Float-Vergleich ist gewollt: zufaellig
    /// identische Pegel gelten als unveraendert.
    pub fn differs_from(&self, vorher: &AudioLevelSnapshot) -> bool {
        if self.0.len() != vorher.0.len() {
            return true;
        }
        self.0
            .iter()
            .any(|(id, level)| vorher.0.get(id).map_or(true, |alt| alt != level))
    }
}

impl FromIterator<(ParticipantId, f32)> for AudioLevelSnapshot {
    fn from_iter<I: IntoIterator<Item = (ParticipantId, f32)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(paare: &[(&str, f32)]) -> AudioLevelSnapshot {
        paare
            .iter()
            .map(|(id, level)| (ParticipantId::from(*id), *level))
            .collect()
    }

    #[test]
    fn participant_id_display() {
        let id = ParticipantId::new("stream-42");
        assert_eq!(id.to_string(), "stream-42");
        assert_eq!(id.as_str(), "stream-42");
    }

    #[test]
    fn participant_id_ist_serde_transparent() {
        let id = ParticipantId::from("alice");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"alice\"");
    }

    #[test]
    fn snapshot_gleich_ist_unveraendert() {
        let a = snapshot(&[("a", 0.1), ("b", 0.2)]);
        let b = snapshot(&[("b", 0.2), ("a", 0.1)]);
        assert!(!a.differs_from(&b));
    }

    #[test]
    fn snapshot_wertaenderung_erkannt() {
        let a = snapshot(&[("a", 0.1)]);
        let b = snapshot(&[("a", 0.2)]);
        assert!(b.differs_from(&a));
    }

    #[test]
    fn snapshot_mitgliedschaft_erkannt() {
        let vorher = snapshot(&[("a", 0.0)]);
        let hinzu = snapshot(&[("a", 0.0), ("b", 0.0)]);
        let weg = snapshot(&[]);
        assert!(hinzu.differs_from(&vorher));
        assert!(weg.differs_from(&vorher));
    }

    #[test]
    fn snapshot_gleiche_laenge_anderer_schluessel() {
        let vorher = snapshot(&[("a", 0.5)]);
        let jetzt = snapshot(&[("b", 0.5)]);
        assert!(jetzt.differs_from(&vorher));
    }
}
