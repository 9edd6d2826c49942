//! Audio-Tracks und Media-Streams
//!
//! - [`LocalAudioTrack`]: ausgehender Track der Publish-Verbindung. Ein
//!   deaktivierter Track sendet Stille, ein gestoppter Track gar nichts.
//! - [`RemoteAudioTrack`]: eingehender Track einer Subscribe-Verbindung.
//!   Der Transport liefert Frames per [`RemoteAudioTrack::deliver`], die
//!   Session haengt einen Frame-Handler an.
//!
//! Beide Typen sind Clone und teilen ihren Zustand ueber einen Arc, weil
//! Transport und Session denselben Track gleichzeitig halten.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::trace;
use uuid::Uuid;

use crate::capability::FrameCallback;

/// ID eines Media-Streams (Track + Stream werden gemeinsam publiziert)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MediaStreamId(pub Uuid);

impl MediaStreamId {
    /// Erstellt eine neue zufaellige MediaStreamId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MediaStreamId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MediaStreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stream:{}", self.0)
    }
}

/// Art eines eingehenden Tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

// ---------------------------------------------------------------------------
// LocalAudioTrack
// ---------------------------------------------------------------------------

struct LocalTrackInner {
    id: Uuid,
    enabled: AtomicBool,
    stopped: AtomicBool,
    sink: Mutex<Option<FrameCallback>>,
}

/// Ausgehender Audio-Track (Loopback ist immer aus)
#[derive(Clone)]
pub struct LocalAudioTrack {
    inner: Arc<LocalTrackInner>,
}

impl LocalAudioTrack {
    /// Erstellt einen Track; `enabled = false` entspricht einem gemuteten Track
    pub fn new(enabled: bool) -> Self {
        Self {
            inner: Arc::new(LocalTrackInner {
                id: Uuid::new_v4(),
                enabled: AtomicBool::new(enabled),
                stopped: AtomicBool::new(false),
                sink: Mutex::new(None),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Aktiviert/deaktiviert den Track (unabhaengig vom Gain)
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Relaxed)
    }

    /// Vom Transport gesetzt: Ziel fuer alle ausgehenden Frames
    pub fn set_sink(&self, sink: FrameCallback) {
        *self.inner.sink.lock() = Some(sink);
    }

    /// Stoppt den Track endgueltig und loest die Senke
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::Relaxed);
        self.inner.sink.lock().take();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Relaxed)
    }

    /// Reicht einen Frame an die Senke weiter (Stille wenn deaktiviert)
    pub fn push_frame(&self, frame: &[f32]) {
        if self.is_stopped() {
            return;
        }
        let mut sink = self.inner.sink.lock();
        let Some(sink) = sink.as_mut() else {
            trace!("Track ohne Senke, Frame verworfen");
            return;
        };
        if self.is_enabled() {
            sink(frame);
        } else {
            let stille = vec![0.0f32; frame.len()];
            sink(&stille);
        }
    }
}

impl std::fmt::Debug for LocalAudioTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalAudioTrack")
            .field("id", &self.inner.id)
            .field("enabled", &self.is_enabled())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// RemoteAudioTrack
// ---------------------------------------------------------------------------

struct RemoteTrackInner {
    id: Uuid,
    kind: TrackKind,
    stopped: AtomicBool,
    handler: Mutex<Option<FrameCallback>>,
}

/// Eingehender Track einer Subscribe-Verbindung
#[derive(Clone)]
pub struct RemoteAudioTrack {
    inner: Arc<RemoteTrackInner>,
}

impl RemoteAudioTrack {
    pub fn new(kind: TrackKind) -> Self {
        Self {
            inner: Arc::new(RemoteTrackInner {
                id: Uuid::new_v4(),
                kind,
                stopped: AtomicBool::new(false),
                handler: Mutex::new(None),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn kind(&self) -> TrackKind {
        self.inner.kind
    }

    /// Von der Session gesetzt: verarbeitet jeden eingehenden Frame
    pub fn set_frame_handler(&self, handler: FrameCallback) {
        if self.is_stopped() {
            return;
        }
        *self.inner.handler.lock() = Some(handler);
    }

    /// Vom Transport aufgerufen sobald ein Frame eintrifft
    pub fn deliver(&self, frame: &[f32]) {
        if self.is_stopped() {
            return;
        }
        if let Some(handler) = self.inner.handler.lock().as_mut() {
            handler(frame);
        }
    }

    /// Stoppt den Track und loest den Frame-Handler
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::Relaxed);
        self.inner.handler.lock().take();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for RemoteAudioTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteAudioTrack")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zaehlende_senke() -> (FrameCallback, Arc<Mutex<Vec<Vec<f32>>>>) {
        let frames = Arc::new(Mutex::new(Vec::new()));
        let ziel = Arc::clone(&frames);
        let senke: FrameCallback = Box::new(move |frame: &[f32]| ziel.lock().push(frame.to_vec()));
        (senke, frames)
    }

    #[test]
    fn aktiver_track_reicht_frames_durch() {
        let track = LocalAudioTrack::new(true);
        let (senke, frames) = zaehlende_senke();
        track.set_sink(senke);
        track.push_frame(&[0.5, 0.5]);
        assert_eq!(frames.lock().as_slice(), &[vec![0.5f32, 0.5]]);
    }

    #[test]
    fn deaktivierter_track_sendet_stille() {
        let track = LocalAudioTrack::new(false);
        let (senke, frames) = zaehlende_senke();
        track.set_sink(senke);
        track.push_frame(&[0.5, 0.5, 0.5]);
        assert_eq!(frames.lock().as_slice(), &[vec![0.0f32, 0.0, 0.0]]);
    }

    #[test]
    fn gestoppter_track_sendet_nichts() {
        let track = LocalAudioTrack::new(true);
        let (senke, frames) = zaehlende_senke();
        track.set_sink(senke);
        track.stop();
        track.push_frame(&[0.5]);
        assert!(frames.lock().is_empty());
        assert!(track.is_stopped());
    }

    #[test]
    fn remote_track_ohne_handler_verwirft() {
        let track = RemoteAudioTrack::new(TrackKind::Audio);
        track.deliver(&[0.1]);
        assert_eq!(track.kind(), TrackKind::Audio);
    }

    #[test]
    fn remote_track_stop_loest_handler() {
        let track = RemoteAudioTrack::new(TrackKind::Audio);
        let (handler, frames) = zaehlende_senke();
        track.set_frame_handler(handler);
        track.deliver(&[0.1]);
        track.stop();
        track.deliver(&[0.2]);
        assert_eq!(frames.lock().len(), 1);
    }

    #[test]
    fn media_stream_ids_eindeutig() {
        assert_ne!(MediaStreamId::new(), MediaStreamId::new());
        assert!(MediaStreamId::new().to_string().starts_with("stream:"));
    }
}
