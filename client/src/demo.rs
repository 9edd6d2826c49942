//! Simulierte Gaeste fuer den Loopback-Transport
//!
//! Jeder Gast tritt dem Raum bei, liefert einen Audio-Track und speist
//! darueber alle 20ms einen Sinus-Frame ein, bis der Track gestoppt wird.

use huddle_audio::{RemoteAudioTrack, TrackKind};
use huddle_core::ParticipantId;
use huddle_session::MemoryTransport;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const FRAME_SIZE: usize = 960;
const SAMPLE_RATE: f32 = 48000.0;

/// Laesst `name` beitreten und startet dessen Tongenerator
pub fn gast_beitreten(
    transport: &MemoryTransport,
    name: &str,
    amplitude: f32,
    frequenz: f32,
) -> Option<JoinHandle<()>> {
    let id = ParticipantId::from(name);
    transport.user_beitreten(id.clone());
    let Some(track) = transport.track_senden(&id, TrackKind::Audio) else {
        warn!(teilnehmer = %id, "Gast ohne Subscribe-Verbindung");
        return None;
    };
    debug!(teilnehmer = %id, amplitude, frequenz, "Gast spricht");
    Some(tokio::spawn(ton_senden(track, amplitude, frequenz)))
}

async fn ton_senden(track: RemoteAudioTrack, amplitude: f32, frequenz: f32) {
    let mut takt = tokio::time::interval(Duration::from_millis(20));
    let mut position: usize = 0;
    let mut frame = vec![0.0f32; FRAME_SIZE];
    while !track.is_stopped() {
        takt.tick().await;
        for (i, s) in frame.iter_mut().enumerate() {
            let t = (position + i) as f32 / SAMPLE_RATE;
            *s = amplitude * (2.0 * std::f32::consts::PI * frequenz * t).sin();
        }
        position = (position + FRAME_SIZE) % SAMPLE_RATE as usize;
        track.deliver(&frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_core::VoiceEvent;
    use huddle_session::{SessionConfig, VoiceSession};
    use huddle_audio::SyntheticCapability;
    use std::sync::Arc;

    #[tokio::test]
    async fn gast_wird_angebunden_und_endet_mit_verlassen() {
        let transport = MemoryTransport::new("ich");
        let (session, mut rx) = VoiceSession::new(
            SessionConfig::default(),
            Arc::new(transport.clone()),
            Arc::new(SyntheticCapability::new(false)),
        )
        .unwrap();
        session.connect("lobby").await.unwrap();

        let generator = gast_beitreten(&transport, "bob", 0.2, 330.0).unwrap();
        assert!(session.table().hat_empfang(&ParticipantId::from("bob")));

        transport.user_verlassen("bob");
        tokio::time::timeout(Duration::from_secs(1), generator)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(rx.recv().await, Some(VoiceEvent::Joined("ich".into())));
    }
}
