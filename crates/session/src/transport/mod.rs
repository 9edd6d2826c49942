//! Transport-Schnittstelle
//!
//! Der Transport (Signalisierung + Peer-Connections) ist fuer die Session
//! eine opake Ereignisquelle. Er liefert:
//! - vier Lebenszyklus-Hooks fuer Publish-/Subscribe-Verbindungen
//! - Raum-Ereignisse (joined, left, user_joined, user_left) ueber einen Kanal
//! - Peer-Connection-Handles, die ausgehende Tracks annehmen und eingehende
//!   Tracks melden
//!
//! Jeder Hook wird genau einmal pro Lebenszyklus-Kante aufgerufen und nie
//! gleichzeitig fuer dieselbe ParticipantId.

pub mod memory;

use async_trait::async_trait;
use huddle_audio::{LocalAudioTrack, MediaStreamId, RemoteAudioTrack};
use huddle_core::{HuddleResult, ParticipantId};
use std::sync::Arc;
use tokio::sync::mpsc;

pub use memory::MemoryTransport;

/// Hook beim Erstellen einer Publish- oder Subscribe-Verbindung
pub type PcCreateHook = Arc<dyn Fn(ParticipantId, Arc<dyn PeerConnection>) + Send + Sync>;

/// Hook beim Schliessen einer Publish- oder Subscribe-Verbindung
pub type PcCloseHook = Arc<dyn Fn(ParticipantId) + Send + Sync>;

/// Callback fuer eingehende Tracks einer Subscribe-Verbindung
pub type TrackCallback = Box<dyn FnMut(RemoteAudioTrack) + Send + 'static>;

/// Handle auf eine einzelne Peer-Connection
pub trait PeerConnection: Send + Sync {
    /// Nimmt einen ausgehenden Track samt Stream an (Publish-Verbindung)
    fn add_track(&self, track: LocalAudioTrack, stream: MediaStreamId) -> HuddleResult<()>;

    /// Registriert den Callback fuer eingehende Tracks (Subscribe-Verbindung).
    /// Ein spaeter registrierter Callback ersetzt den vorherigen.
    fn on_track(&self, callback: TrackCallback);
}

/// Registrierung der Lebenszyklus-Hooks
pub trait PeerLifecycleHooks: Send + Sync {
    fn add_publish_pc_create_hook(&self, hook: PcCreateHook);
    fn add_subscribe_pc_create_hook(&self, hook: PcCreateHook);
    fn add_publish_pc_close_hook(&self, hook: PcCloseHook);
    fn add_subscribe_pc_close_hook(&self, hook: PcCloseHook);
}

/// Raum-Ereignisse des Transports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Beitritt bestaetigt, enthaelt die lokale ParticipantId
    Joined(ParticipantId),
    /// Raum verlassen (Grund ist ein opaker Diagnose-String)
    Left(String),
    UserJoined(ParticipantId),
    UserLeft(ParticipantId),
}

/// Transport einer Voice-Session
#[async_trait]
pub trait VoiceTransport: PeerLifecycleHooks + 'static {
    /// Tritt einem Raum bei. Kehrt zurueck sobald die Anfrage angenommen
    /// wurde; die Bestaetigung kommt als [`TransportEvent::Joined`].
    async fn connect(&self, room: &str) -> HuddleResult<()>;

    /// Verlaesst den Raum. Schliesst alle Verbindungen (Close-Hooks laufen)
    /// und meldet danach [`TransportEvent::Left`].
    async fn disconnect(&self) -> HuddleResult<()>;

    /// Uebergibt den Ereignis-Empfaenger (nur beim ersten Aufruf Some)
    fn take_event_receiver(&self) -> Option<mpsc::UnboundedReceiver<TransportEvent>>;
}
