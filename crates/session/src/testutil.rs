//! Hilfen fuer Unit-Tests der Session-Module

use huddle_audio::{LocalAudioTrack, MediaStreamId, RemoteAudioTrack, TrackKind};
use huddle_core::{HuddleError, HuddleResult};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::transport::{PeerConnection, TrackCallback};

/// Minimale Peer-Connection: merkt sich Tracks, liefert eingehende Tracks
#[derive(Default)]
pub(crate) struct TestPc {
    pub tracks: Mutex<Vec<LocalAudioTrack>>,
    pub on_track: Mutex<Option<TrackCallback>>,
    pub add_fehler: bool,
}

impl TestPc {
    pub fn neu() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Peer-Connection, die jeden ausgehenden Track ablehnt
    pub fn ablehnend() -> Arc<Self> {
        Arc::new(Self {
            add_fehler: true,
            ..Default::default()
        })
    }

    /// Meldet einen neuen eingehenden Track an den registrierten Callback
    pub fn track_liefern(&self, kind: TrackKind) -> RemoteAudioTrack {
        let track = RemoteAudioTrack::new(kind);
        if let Some(callback) = self.on_track.lock().as_mut() {
            callback(track.clone());
        }
        track
    }
}

impl PeerConnection for TestPc {
    fn add_track(&self, track: LocalAudioTrack, _stream: MediaStreamId) -> HuddleResult<()> {
        if self.add_fehler {
            return Err(HuddleError::Transport("abgelehnt".into()));
        }
        self.tracks.lock().push(track);
        Ok(())
    }

    fn on_track(&self, callback: TrackCallback) {
        *self.on_track.lock() = Some(callback);
    }
}

/// Wartet bis `bedingung` erfuellt ist (hoechstens 2 Sekunden)
pub(crate) async fn warten_bis(bedingung: impl Fn() -> bool) -> bool {
    for _ in 0..400 {
        if bedingung() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    bedingung()
}
