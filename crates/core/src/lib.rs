//! huddle-core – Gemeinsame Typen, Ereignisse und Fehlertypen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen Huddle-Crates gemeinsam genutzt werden.

pub mod error;
pub mod event;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{HuddleError, HuddleResult};
pub use event::VoiceEvent;
pub use types::{AudioLevelSnapshot, ParticipantId};
