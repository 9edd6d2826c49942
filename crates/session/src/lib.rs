//! huddle-session – Audio-Ressourcen einer Mehrparteien-Voice-Session
//!
//! Verwaltet pro Teilnehmer die Audio-Ressourcen im Gleichschritt mit den
//! Publish-/Subscribe-Verbindungen des Transports und meldet wahrnehmbare
//! Pegelaenderungen.
//!
//! Aufbau:
//! - [`ResourceTable`]: Sende- und Empfangs-Ressourcen, Mute/Lautstaerke
//! - [`ControlSurface`]: Mute umschalten, Lautstaerken setzen, Zuruecksetzen
//! - [`LevelMonitor`]: Pegel abtasten und Aenderungen erkennen
//! - [`VoiceSession`]: Zustandsmaschine und Ereignis-Kanal
//!
//! Transport und Audio-Plattform werden injiziert
//! ([`transport::VoiceTransport`], [`huddle_audio::AudioCapability`]).

pub mod config;
pub mod control;
pub mod monitor;
pub mod session;
pub mod table;
pub mod transport;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::SessionConfig;
pub use control::ControlSurface;
pub use monitor::{LevelMonitor, MonitorState};
pub use session::{ConnectionState, VoiceSession};
pub use table::{ResourceTable, SessionState};
pub use transport::{
    MemoryTransport, PcCloseHook, PcCreateHook, PeerConnection, PeerLifecycleHooks,
    TrackCallback, TransportEvent, VoiceTransport,
};
