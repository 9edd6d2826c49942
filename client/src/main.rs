//! Huddle Demo-Client – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und fuehrt eine
//! Voice-Session ueber den Loopback-Transport vor: beitreten, Gaeste
//! simulieren, entmuten, Lautstaerke aendern, verlassen.

mod config;
mod demo;

use anyhow::Result;
use huddle_audio::{AudioCapability, SyntheticCapability};
use huddle_core::VoiceEvent;
use huddle_observability::logging_aus_config;
use huddle_session::{MemoryTransport, VoiceSession};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use config::ClientConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad = std::env::var("HUDDLE_CONFIG").unwrap_or_else(|_| "huddle.toml".into());

    let config = ClientConfig::laden(&config_pfad)?;
    logging_aus_config(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        backend = %config.audio.backend,
        "Huddle Client wird initialisiert"
    );

    let capability = capability_waehlen(&config)?;
    let transport = MemoryTransport::new(config.demo.teilnehmer.as_str());
    let (session, mut events) =
        VoiceSession::new(config.session.clone(), Arc::new(transport.clone()), capability)?;

    let ausgabe = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            ereignis_ausgeben(&event);
        }
    });

    session.connect(&config.demo.raum).await?;

    let mut generatoren = Vec::new();
    for (i, gast) in config.demo.gaeste.iter().enumerate() {
        let amplitude = 0.1 + 0.1 * i as f32;
        let frequenz = 220.0 * (i + 1) as f32;
        generatoren.extend(demo::gast_beitreten(&transport, gast, amplitude, frequenz));
    }

    let haelfte = Duration::from_secs(config.demo.dauer_secs) / 2;
    tokio::time::sleep(haelfte).await;

    if session.has_microphone() {
        let mute = session.toggle_mute();
        info!(mute, "Mikrofon umgeschaltet");
    } else {
        warn!("Kein Mikrofon, Session laeuft nur mit Empfang");
    }
    let out = session.set_out_volume(0.5);
    info!(out_volume = out, "Ausgangslautstaerke gesetzt");

    if let Some(erster) = config.demo.gaeste.first() {
        transport.user_verlassen(erster.as_str());
    }
    tokio::time::sleep(haelfte).await;

    session.disconnect().await?;
    for generator in generatoren {
        generator.abort();
    }

    match session.metrics().exportieren() {
        Ok(text) => tracing::debug!("Metriken:\n{}", text),
        Err(e) => warn!("Metriken nicht exportierbar: {}", e),
    }

    session.shutdown();
    drop(session);
    // Kanal schliesst mit der Session, die Ausgabe endet danach
    let _ = tokio::time::timeout(Duration::from_secs(1), ausgabe).await;

    info!("Huddle Client beendet");
    Ok(())
}

fn capability_waehlen(config: &ClientConfig) -> Result<Arc<dyn AudioCapability>> {
    match config.audio.backend.as_str() {
        "cpal" => cpal_capability(),
        _ => Ok(Arc::new(
            SyntheticCapability::new(true).mit_signal(config.audio.amplitude),
        )),
    }
}

#[cfg(feature = "cpal")]
fn cpal_capability() -> Result<Arc<dyn AudioCapability>> {
    Ok(Arc::new(huddle_audio::CpalCapability::default()))
}

#[cfg(not(feature = "cpal"))]
fn cpal_capability() -> Result<Arc<dyn AudioCapability>> {
    Err(anyhow::anyhow!(
        "Backend 'cpal' verlangt das Feature 'cpal' (cargo build --features cpal)"
    ))
}

fn ereignis_ausgeben(event: &VoiceEvent) {
    match event {
        VoiceEvent::Joined(id) => info!(teilnehmer = %id, "Raum beigetreten"),
        VoiceEvent::Left { grund } => info!(grund = %grund, "Raum verlassen"),
        VoiceEvent::UserJoined(id) => info!(teilnehmer = %id, "Teilnehmer beigetreten"),
        VoiceEvent::UserLeft(id) => info!(teilnehmer = %id, "Teilnehmer gegangen"),
        VoiceEvent::Muted(mute) => info!(mute, "Mute geaendert"),
        VoiceEvent::AudioLevelChanged(snapshot) => {
            let pegel: Vec<String> = snapshot
                .iter()
                .map(|(id, level)| format!("{id}={level:.3}"))
                .collect();
            info!(pegel = %pegel.join(" "), "Pegel");
        }
    }
}
