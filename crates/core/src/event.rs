//! Ereignisse einer Voice-Session
//!
//! Alle Benachrichtigungen an die Praesentationsschicht laufen ueber einen
//! einzigen geordneten Kanal. Die Reihenfolge im Kanal entspricht der
//! Reihenfolge in der die Session die Ereignisse erzeugt hat.

use crate::types::{AudioLevelSnapshot, ParticipantId};
use serde::{Deserialize, Serialize};

/// Alle Ereignisse die eine VoiceSession nach aussen meldet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VoiceEvent {
    // --- Weitergereichte Transport-Ereignisse ---
    /// Der lokale Teilnehmer ist dem Raum beigetreten
    Joined(ParticipantId),
    /// Der lokale Teilnehmer hat den Raum verlassen
    Left { grund: String },
    /// Ein entfernter Teilnehmer ist beigetreten
    UserJoined(ParticipantId),
    /// Ein entfernter Teilnehmer hat den Raum verlassen
    UserLeft(ParticipantId),

    // --- Audio-Ereignisse ---
    /// Mute-Status des lokalen Mikrofons hat sich geaendert
    Muted(bool),
    /// Mindestens ein Pegel oder die Teilnehmermenge hat sich geaendert
    AudioLevelChanged(AudioLevelSnapshot),
}
