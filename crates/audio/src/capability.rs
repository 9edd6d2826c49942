//! Audio-Capability – injizierte Plattform-Schnittstelle
//!
//! Die Session kennt keine konkreten Audio-APIs. Sie bekommt bei der
//! Konstruktion eine [`AudioCapability`], die beantwortet ob ein
//! Mikrofon existiert, Capture-Streams oeffnet und Playback-Senken
//! bereitstellt. Implementierungen:
//! - [`crate::synthetic::SyntheticCapability`] – deterministisch, in-process
//! - `CpalCapability` – native Geraete via cpal (Feature `cpal-backend`)

use async_trait::async_trait;

use crate::error::AudioResult;

/// Callback fuer Audio-Frames (f32 PCM, Mono)
pub type FrameCallback = Box<dyn FnMut(&[f32]) + Send + 'static>;

/// Laufender Capture-Stream (Mikrofon)
///
/// Solange der Stream aktiv ist, ruft er den beim Oeffnen uebergebenen
/// FrameCallback auf. `stop()` muss idempotent sein.
pub trait CaptureStream: Send {
    /// Stoppt die Aufnahme und gibt das Geraet frei
    fn stop(&mut self);

    /// Gibt zurueck ob der Stream noch Frames liefert
    fn is_active(&self) -> bool;
}

/// Wiedergabe-Senke eines entfernten Teilnehmers
pub trait PlaybackSink: Send {
    /// Schreibt Samples in die Wiedergabe
    fn write(&mut self, samples: &[f32]);

    /// Stoppt die Wiedergabe und gibt das Geraet frei (idempotent)
    fn stop(&mut self);
}

/// Plattform-Faehigkeiten fuer Aufnahme und Wiedergabe
#[async_trait]
pub trait AudioCapability: Send + Sync + 'static {
    /// Existiert ein Aufnahmegeraet?
    fn has_microphone(&self) -> bool;

    /// Oeffnet einen Capture-Stream. Die Geraete-Anforderung ist
    /// asynchron und darf den Aufrufer nicht blockieren.
    async fn open_capture(&self, on_frame: FrameCallback) -> AudioResult<Box<dyn CaptureStream>>;

    /// Oeffnet eine Wiedergabe-Senke fuer einen entfernten Teilnehmer
    fn open_playback(&self, label: &str) -> AudioResult<Box<dyn PlaybackSink>>;
}
