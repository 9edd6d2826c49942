//! huddle-audio – Audio-Bausteine fuer Huddle
//!
//! - Capability-Schnittstelle zur Plattform (Mikrofon, Lautsprecher)
//! - Gain-Stufe und Analyse-Tap, zusammengesetzt zur Audio-Kette
//! - Lokale und entfernte Audio-Tracks
//! - Synthetisches Backend (Tests, Demo) und cpal-Backend (Feature `cpal-backend`)

pub mod capability;
pub mod chain;
pub mod error;
pub mod gain;
pub mod level;
pub mod synthetic;
pub mod track;

#[cfg(feature = "cpal-backend")]
pub mod native;

// Bequeme Re-Exporte der wichtigsten Typen
pub use capability::{AudioCapability, CaptureStream, FrameCallback, PlaybackSink};
pub use chain::AudioChain;
pub use error::{AudioError, AudioResult};
pub use gain::{clamp_volume, GainControl};
pub use level::{mean_abs_level, AnalysisTap, DEFAULT_LEVEL_WINDOW};
pub use synthetic::{SyntheticCapability, SyntheticCapture, SyntheticSink};
pub use track::{LocalAudioTrack, MediaStreamId, RemoteAudioTrack, TrackKind};

#[cfg(feature = "cpal-backend")]
pub use native::{CpalCapability, NativeConfig};
