//! End-to-End-Ablaeufe einer Session ueber den Loopback-Transport

use huddle_audio::{CaptureStream, SyntheticCapability, TrackKind};
use huddle_core::{HuddleError, ParticipantId, VoiceEvent};
use huddle_session::{ConnectionState, MemoryTransport, SessionConfig, VoiceSession};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

async fn warten_bis(bedingung: impl Fn() -> bool) -> bool {
    for _ in 0..400 {
        if bedingung() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    bedingung()
}

/// Naechstes Ereignis, das kein Pegel-Ereignis ist
async fn naechstes(rx: &mut mpsc::UnboundedReceiver<VoiceEvent>) -> VoiceEvent {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("Kein Ereignis innerhalb von 2s")
            .expect("Ereigniskanal geschlossen");
        if !matches!(event, VoiceEvent::AudioLevelChanged(_)) {
            return event;
        }
    }
}

fn id(s: &str) -> ParticipantId {
    ParticipantId::from(s)
}

struct Aufbau {
    session: VoiceSession,
    rx: mpsc::UnboundedReceiver<VoiceEvent>,
    transport: MemoryTransport,
    cap: Arc<SyntheticCapability>,
}

fn aufbau(config: SessionConfig) -> Aufbau {
    let transport = MemoryTransport::new("ich");
    let cap = Arc::new(SyntheticCapability::new(true));
    let (session, rx) =
        VoiceSession::new(config, Arc::new(transport.clone()), cap.clone()).unwrap();
    Aufbau {
        session,
        rx,
        transport,
        cap,
    }
}

#[tokio::test]
async fn beitreten_entmuten_verlassen() {
    let Aufbau {
        session,
        mut rx,
        transport,
        cap,
    } = aufbau(SessionConfig::default());

    assert_eq!(session.state(), ConnectionState::Disconnected);
    session.connect("R").await.unwrap();
    assert_eq!(naechstes(&mut rx).await, VoiceEvent::Joined(id("ich")));
    assert_eq!(session.state(), ConnectionState::Connected);

    // Sende-Ressource entsteht gemutet
    let pc = transport.publish_verbindung().unwrap();
    assert!(warten_bis(|| !pc.tracks().is_empty()).await);
    let track = session.table().in_track().unwrap();
    assert!(!track.is_enabled());

    assert!(!session.toggle_mute());
    assert!(track.is_enabled());
    assert_eq!(naechstes(&mut rx).await, VoiceEvent::Muted(false));

    // Aufgenommene Frames gehen ueber die Publish-Verbindung raus
    cap.letzte_aufnahme().unwrap().push(&[0.25f32; 480]);
    assert_eq!(pc.gesendete_samples(), 480);

    session.disconnect().await.unwrap();
    assert_eq!(
        naechstes(&mut rx).await,
        VoiceEvent::Left {
            grund: "disconnect".into()
        }
    );
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert!(session.mute());
    assert_eq!(session.in_volume(), 1.0);
    assert!(session.table().ist_leer());
    assert!(!cap.letzte_aufnahme().unwrap().is_active());
    assert!(session.local_participant().is_none());
}

#[tokio::test]
async fn ereignisse_in_erzeugungsreihenfolge() {
    let Aufbau {
        session,
        mut rx,
        transport,
        ..
    } = aufbau(SessionConfig::default());

    session.connect("R").await.unwrap();
    transport.user_beitreten("bob");
    transport.user_beitreten("carol");
    transport.user_verlassen("bob");

    assert_eq!(naechstes(&mut rx).await, VoiceEvent::Joined(id("ich")));
    assert_eq!(naechstes(&mut rx).await, VoiceEvent::UserJoined(id("bob")));
    assert_eq!(naechstes(&mut rx).await, VoiceEvent::UserJoined(id("carol")));
    assert_eq!(naechstes(&mut rx).await, VoiceEvent::UserLeft(id("bob")));
    assert_eq!(session.table().out_ids(), vec![id("carol")]);
}

#[tokio::test]
async fn empfang_mit_ausgangslautstaerke() {
    let Aufbau {
        session,
        transport,
        cap,
        ..
    } = aufbau(SessionConfig::default());

    session.connect("R").await.unwrap();
    session.set_out_volume(0.5);
    transport.user_beitreten("bob");
    let remote = transport.track_senden(&id("bob"), TrackKind::Audio).unwrap();

    assert!(session.table().hat_empfang(&id("bob")));
    assert_eq!(session.table().out_gain(&id("bob")), Some(0.5));
    remote.deliver(&[0.1f32; 960]);
    let senke = cap.senken().pop().unwrap();
    assert_eq!(senke.geschriebene_samples(), 960);

    assert_eq!(session.set_out_volume(3.0), 1.0);
    assert_eq!(session.table().out_gain(&id("bob")), Some(1.0));

    transport.user_verlassen("bob");
    assert!(senke.is_stopped());
    assert_eq!(session.table().anzahl_out(), 0);
}

#[tokio::test]
async fn verbindungsabbruch_baut_ab_und_erlaubt_neuen_connect() {
    let Aufbau {
        session,
        mut rx,
        transport,
        ..
    } = aufbau(SessionConfig::default());

    session.connect("R").await.unwrap();
    assert!(warten_bis(|| session.table().hat_in_resource()).await);
    transport.user_beitreten("bob");

    transport.verbindung_verlieren("timeout");
    assert!(warten_bis(|| session.state() == ConnectionState::Disconnected).await);
    assert!(session.table().ist_leer());

    let mut letzte = None;
    while let Ok(event) = rx.try_recv() {
        letzte = Some(event);
    }
    assert_eq!(
        letzte,
        Some(VoiceEvent::Left {
            grund: "timeout".into()
        })
    );

    session.connect("R2").await.unwrap();
    assert!(warten_bis(|| session.table().hat_in_resource()).await);
    assert!(warten_bis(|| session.state() == ConnectionState::Connected).await);
}

#[tokio::test]
async fn publish_schliessen_waehrend_anforderung_gibt_mikrofon_frei() {
    let transport = MemoryTransport::new("ich");
    let cap = Arc::new(SyntheticCapability::new(true).mit_verzoegerung(Duration::from_millis(50)));
    let (session, _rx) = VoiceSession::new(
        SessionConfig::default(),
        Arc::new(transport.clone()),
        cap.clone(),
    )
    .unwrap();

    session.connect("R").await.unwrap();
    assert!(session.table().publish_ausstehend());
    transport.publish_pc_schliessen();

    assert!(warten_bis(|| !cap.aufnahmen().is_empty()).await);
    assert!(warten_bis(|| !cap.letzte_aufnahme().unwrap().is_active()).await);
    assert!(!session.table().hat_in_resource());
}

#[tokio::test]
async fn ohne_mikrofon_nur_empfang() {
    let transport = MemoryTransport::new("ich");
    let (session, _rx) = VoiceSession::new(
        SessionConfig::default(),
        Arc::new(transport.clone()),
        Arc::new(SyntheticCapability::new(false)),
    )
    .unwrap();

    session.connect("R").await.unwrap();
    assert!(!session.has_microphone());
    assert!(session.toggle_mute());
    assert_eq!(session.set_in_volume(0.3), 1.0);

    transport.user_beitreten("bob");
    transport.track_senden(&id("bob"), TrackKind::Audio);
    assert!(session.table().hat_empfang(&id("bob")));
    assert!(!session.table().hat_in_resource());
}

#[tokio::test]
async fn ungueltige_zustaende_abgelehnt() {
    let Aufbau { session, .. } = aufbau(SessionConfig::default());

    assert!(matches!(
        session.disconnect().await,
        Err(HuddleError::UngueltigerZustand { .. })
    ));
    session.connect("R").await.unwrap();
    assert!(matches!(
        session.connect("R").await,
        Err(HuddleError::UngueltigerZustand { .. })
    ));
}

#[tokio::test]
async fn konfigurationsfehler_verhindert_session() {
    let config = SessionConfig {
        audio_level_check_interval_secs: 0.0,
        ..Default::default()
    };
    let ergebnis = VoiceSession::new(
        config,
        Arc::new(MemoryTransport::new("ich")),
        Arc::new(SyntheticCapability::new(true)),
    );
    assert!(matches!(ergebnis, Err(HuddleError::Konfiguration(_))));
}
