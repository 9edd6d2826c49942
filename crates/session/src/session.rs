//! VoiceSession – Wurzel einer Voice-Session
//!
//! Verbindet Transport, Ressourcen-Tabelle, Steuerflaeche und Pegel-Monitor
//! hinter einer Zustandsmaschine:
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Disconnecting -> Disconnected
//! ```
//!
//! Alle Benachrichtigungen (Transport-Ereignisse, Mute, Pegel) laufen ueber
//! einen einzigen geordneten Kanal, den `VoiceSession::new` zurueckgibt.
//!
//! Hintergrund-Tasks:
//! - Ereignis-Pumpe: verarbeitet joined/left/user_joined/user_left
//! - Pegel-Takt: ruft den Monitor im konfigurierten Intervall auf

use huddle_audio::AudioCapability;
use huddle_core::{HuddleError, HuddleResult, ParticipantId, VoiceEvent};
use huddle_observability::SessionMetrics;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::config::SessionConfig;
use crate::control::ControlSurface;
use crate::monitor::LevelMonitor;
use crate::table::{ResourceTable, SessionState};
use crate::transport::{PeerConnection, TransportEvent, VoiceTransport};

/// Verbindungszustand der Session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
        };
        f.write_str(s)
    }
}

struct Verbindung {
    zustand: ConnectionState,
    /// Anzahl Left-Ereignisse, die aus eigenem disconnect() stammen
    erwartete_left: u32,
}

struct SessionInner {
    transport: Arc<dyn VoiceTransport>,
    table: ResourceTable,
    control: ControlSurface,
    monitor: LevelMonitor,
    metrics: SessionMetrics,
    verbindung: Mutex<Verbindung>,
    events: mpsc::UnboundedSender<VoiceEvent>,
}

impl SessionInner {
    fn senden(&self, event: VoiceEvent) {
        if self.events.send(event).is_err() {
            trace!("Kein Empfaenger fuer Session-Ereignisse");
        }
    }

    fn zustand(&self) -> ConnectionState {
        self.verbindung.lock().zustand
    }

    /// Ressourcen abbauen, Zustand zuruecksetzen, Monitor anhalten
    fn abbauen(&self) {
        self.table.alle_freigeben();
        self.control.clear();
        self.monitor.stoppen();
        self.verbindung.lock().zustand = ConnectionState::Disconnected;
    }

    fn transport_ereignis(&self, event: TransportEvent) {
        match event {
            TransportEvent::Joined(id) => {
                {
                    let mut verbindung = self.verbindung.lock();
                    if verbindung.zustand != ConnectionState::Connecting {
                        warn!(
                            teilnehmer = %id,
                            zustand = %verbindung.zustand,
                            "Unerwartete Beitrittsbestaetigung ignoriert"
                        );
                        return;
                    }
                    verbindung.zustand = ConnectionState::Connected;
                }
                self.monitor.starten(id.clone());
                info!(teilnehmer = %id, "Raum beigetreten");
                self.senden(VoiceEvent::Joined(id));
            }
            TransportEvent::Left(grund) => {
                let unaufgefordert = {
                    let mut verbindung = self.verbindung.lock();
                    if verbindung.erwartete_left > 0 {
                        verbindung.erwartete_left -= 1;
                        false
                    } else {
                        matches!(
                            verbindung.zustand,
                            ConnectionState::Connected | ConnectionState::Connecting
                        )
                    }
                };
                if unaufgefordert {
                    warn!(grund = %grund, "Verbindung vom Transport beendet");
                    self.abbauen();
                }
                self.senden(VoiceEvent::Left { grund });
            }
            TransportEvent::UserJoined(id) => {
                debug!(teilnehmer = %id, "Teilnehmer beigetreten");
                self.senden(VoiceEvent::UserJoined(id));
            }
            TransportEvent::UserLeft(id) => {
                debug!(teilnehmer = %id, "Teilnehmer gegangen");
                self.senden(VoiceEvent::UserLeft(id));
            }
        }
    }
}

/// Voice-Session mit Ressourcenverwaltung und Pegel-Meldungen
pub struct VoiceSession {
    inner: Arc<SessionInner>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl VoiceSession {
    /// Erstellt eine Session, registriert die Lebenszyklus-Hooks beim
    /// Transport und startet Ereignis-Pumpe und Pegel-Takt.
    ///
    /// Muss innerhalb einer Tokio-Runtime aufgerufen werden. Eine ungueltige
    /// Konfiguration bricht mit [`HuddleError::Konfiguration`] ab.
    pub fn new(
        config: SessionConfig,
        transport: Arc<dyn VoiceTransport>,
        capability: Arc<dyn AudioCapability>,
    ) -> HuddleResult<(Self, mpsc::UnboundedReceiver<VoiceEvent>)> {
        config.validieren()?;
        let runtime = Handle::try_current()
            .map_err(|e| HuddleError::Konfiguration(format!("Keine Tokio-Runtime: {e}")))?;
        let transport_rx = transport.take_event_receiver().ok_or_else(|| {
            HuddleError::Transport("Ereignis-Empfaenger des Transports bereits vergeben".into())
        })?;

        let metrics = SessionMetrics::neu()?;
        let start = SessionState::aus_config(&config);
        let table = ResourceTable::new(
            capability,
            start,
            config.level_window,
            metrics.clone(),
            runtime.clone(),
        );
        let control = ControlSurface::new(table.clone(), start, metrics.clone());
        let monitor = LevelMonitor::new(table.clone(), metrics.clone());

        hooks_registrieren(transport.as_ref(), &table);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(SessionInner {
            transport,
            table,
            control,
            monitor,
            metrics,
            verbindung: Mutex::new(Verbindung {
                zustand: ConnectionState::Disconnected,
                erwartete_left: 0,
            }),
            events: events_tx,
        });

        let pumpe = runtime.spawn(ereignis_pumpe(Arc::clone(&inner), transport_rx));
        let takt = runtime.spawn(pegel_takt(Arc::clone(&inner), config.intervall()));

        info!(
            mute = start.mute,
            intervall_ms = config.intervall().as_millis() as u64,
            mikrofon = inner.control.has_microphone(),
            "Voice-Session erstellt"
        );

        Ok((
            Self {
                inner,
                tasks: Mutex::new(vec![pumpe, takt]),
            },
            events_rx,
        ))
    }

    // --- Verbindung ---

    /// Tritt einem Raum bei. Kehrt zurueck sobald der Transport die Anfrage
    /// angenommen hat; `Connected` folgt mit der Beitrittsbestaetigung.
    pub async fn connect(&self, room: &str) -> HuddleResult<()> {
        {
            let mut verbindung = self.inner.verbindung.lock();
            if verbindung.zustand != ConnectionState::Disconnected {
                return Err(HuddleError::ungueltiger_zustand("connect", verbindung.zustand));
            }
            verbindung.zustand = ConnectionState::Connecting;
        }

        info!(raum = %room, "Verbinde");
        if let Err(e) = self.inner.transport.connect(room).await {
            let mut verbindung = self.inner.verbindung.lock();
            if verbindung.zustand == ConnectionState::Connecting {
                verbindung.zustand = ConnectionState::Disconnected;
            }
            warn!(raum = %room, "Verbindung fehlgeschlagen: {}", e);
            return Err(e);
        }
        Ok(())
    }

    /// Verlaesst den Raum. Danach sind alle Ressourcen freigegeben, Mute
    /// und Lautstaerken auf den Startwerten und der Monitor inaktiv.
    pub async fn disconnect(&self) -> HuddleResult<()> {
        {
            let mut verbindung = self.inner.verbindung.lock();
            if verbindung.zustand != ConnectionState::Connected {
                return Err(HuddleError::ungueltiger_zustand(
                    "disconnect",
                    verbindung.zustand,
                ));
            }
            verbindung.zustand = ConnectionState::Disconnecting;
            verbindung.erwartete_left += 1;
        }

        info!("Trenne Verbindung");
        let ergebnis = self.inner.transport.disconnect().await;
        if let Err(e) = &ergebnis {
            warn!("Transport-Trennung fehlgeschlagen, lokaler Abbau trotzdem: {}", e);
            let mut verbindung = self.inner.verbindung.lock();
            verbindung.erwartete_left = verbindung.erwartete_left.saturating_sub(1);
        }

        // Close-Hooks haben die Ressourcen bereits abgebaut; Reste einsammeln
        self.inner.abbauen();
        info!("Verbindung getrennt");
        ergebnis
    }

    // --- Steuerung ---

    /// Schaltet Mute um und meldet `Muted`, wenn sich der Zustand geaendert hat
    pub fn toggle_mute(&self) -> bool {
        match self.inner.control.mute_umschalten() {
            Some(mute) => {
                self.inner.senden(VoiceEvent::Muted(mute));
                mute
            }
            None => self.inner.control.state().mute,
        }
    }

    pub fn set_in_volume(&self, volume: f32) -> f32 {
        self.inner.control.set_in_volume(volume)
    }

    pub fn set_out_volume(&self, volume: f32) -> f32 {
        self.inner.control.set_out_volume(volume)
    }

    pub fn has_microphone(&self) -> bool {
        self.inner.control.has_microphone()
    }

    /// Setzt Mute und Lautstaerken auf die konfigurierten Startwerte
    pub fn clear(&self) {
        self.inner.control.clear();
    }

    // --- Abfragen ---

    pub fn state(&self) -> ConnectionState {
        self.inner.zustand()
    }

    /// Lokale ParticipantId (nur zwischen Beitritt und Verlassen)
    pub fn local_participant(&self) -> Option<ParticipantId> {
        self.inner.monitor.lokaler_teilnehmer()
    }

    pub fn mute(&self) -> bool {
        self.inner.control.state().mute
    }

    pub fn in_volume(&self) -> f32 {
        self.inner.control.state().in_volume
    }

    pub fn out_volume(&self) -> f32 {
        self.inner.control.state().out_volume
    }

    pub fn table(&self) -> &ResourceTable {
        &self.inner.table
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.inner.metrics
    }

    // --- Lebensende ---

    /// Stoppt die Hintergrund-Tasks und gibt alle Ressourcen frei.
    /// Der Transport wird nicht angefasst.
    pub fn shutdown(&self) {
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        if tasks.is_empty() {
            return;
        }
        for task in tasks {
            task.abort();
        }
        self.inner.table.schliessen();
        self.inner.monitor.stoppen();
        self.inner.verbindung.lock().zustand = ConnectionState::Disconnected;
        info!("Voice-Session beendet");
    }
}

impl Drop for VoiceSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for VoiceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceSession")
            .field("state", &self.state())
            .field("local_participant", &self.local_participant())
            .field("table", &self.inner.table)
            .finish()
    }
}

/// Registriert die vier Lebenszyklus-Hooks auf der Ressourcen-Tabelle
fn hooks_registrieren(transport: &dyn VoiceTransport, table: &ResourceTable) {
    let t = table.clone();
    transport.add_publish_pc_create_hook(Arc::new(
        move |id: ParticipantId, pc: Arc<dyn PeerConnection>| {
            // Der Aufbau laeuft als eigener Task weiter
            let _ = t.on_publish_created(id, pc);
        },
    ));

    let t = table.clone();
    transport.add_subscribe_pc_create_hook(Arc::new(
        move |id: ParticipantId, pc: Arc<dyn PeerConnection>| {
            t.on_subscribe_created(id, pc);
        },
    ));

    let t = table.clone();
    transport.add_publish_pc_close_hook(Arc::new(move |id: ParticipantId| {
        t.on_publish_closed(&id);
    }));

    let t = table.clone();
    transport.add_subscribe_pc_close_hook(Arc::new(move |id: ParticipantId| {
        t.on_subscribe_closed(&id);
    }));
}

async fn ereignis_pumpe(
    inner: Arc<SessionInner>,
    mut rx: mpsc::UnboundedReceiver<TransportEvent>,
) {
    while let Some(event) = rx.recv().await {
        inner.transport_ereignis(event);
    }
    debug!("Transport-Ereignisstrom beendet");
}

async fn pegel_takt(inner: Arc<SessionInner>, intervall: std::time::Duration) {
    let mut takt = tokio::time::interval(intervall);
    takt.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        takt.tick().await;
        if let Some(snapshot) = inner.monitor.tick() {
            inner.senden(VoiceEvent::AudioLevelChanged(snapshot));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::warten_bis;
    use crate::transport::MemoryTransport;
    use huddle_audio::{CaptureStream, SyntheticCapability};

    fn schnelle_config() -> SessionConfig {
        SessionConfig {
            audio_level_check_interval_secs: 0.01,
            level_window: 64,
            ..Default::default()
        }
    }

    fn session_mit(
        transport: MemoryTransport,
        microphone: bool,
    ) -> (VoiceSession, mpsc::UnboundedReceiver<VoiceEvent>) {
        VoiceSession::new(
            schnelle_config(),
            Arc::new(transport),
            Arc::new(SyntheticCapability::new(microphone)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn ungueltige_config_bricht_ab() {
        let config = SessionConfig {
            audio_level_check_interval_secs: -1.0,
            ..Default::default()
        };
        let ergebnis = VoiceSession::new(
            config,
            Arc::new(MemoryTransport::new("ich")),
            Arc::new(SyntheticCapability::new(true)),
        );
        assert!(matches!(ergebnis, Err(HuddleError::Konfiguration(_))));
    }

    #[tokio::test]
    async fn nicht_darstellbares_intervall_bricht_ab() {
        for intervall in [1e-10, 1e20] {
            let config = SessionConfig {
                audio_level_check_interval_secs: intervall,
                ..Default::default()
            };
            let ergebnis = VoiceSession::new(
                config,
                Arc::new(MemoryTransport::new("ich")),
                Arc::new(SyntheticCapability::new(true)),
            );
            assert!(
                matches!(ergebnis, Err(HuddleError::Konfiguration(_))),
                "{intervall} akzeptiert"
            );
        }
    }

    #[tokio::test]
    async fn transport_nur_fuer_eine_session() {
        let transport = MemoryTransport::new("ich");
        let (_erste, _rx) = session_mit(transport.clone(), true);
        let zweite = VoiceSession::new(
            schnelle_config(),
            Arc::new(transport),
            Arc::new(SyntheticCapability::new(true)),
        );
        assert!(matches!(zweite, Err(HuddleError::Transport(_))));
    }

    #[tokio::test]
    async fn disconnect_ohne_verbindung_abgelehnt() {
        let (session, _rx) = session_mit(MemoryTransport::new("ich"), true);
        let fehler = session.disconnect().await.unwrap_err();
        assert!(matches!(fehler, HuddleError::UngueltigerZustand { .. }));
        assert_eq!(session.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn doppeltes_connect_abgelehnt() {
        let transport = MemoryTransport::ohne_auto_join("ich");
        let (session, _rx) = session_mit(transport.clone(), true);

        session.connect("R").await.unwrap();
        assert_eq!(session.state(), ConnectionState::Connecting);
        assert!(matches!(
            session.connect("R").await,
            Err(HuddleError::UngueltigerZustand { .. })
        ));
        // Disconnect waehrend Connecting ist ebenfalls ein laufender Zustand
        assert!(session.disconnect().await.is_err());

        transport.beitritt_bestaetigen();
        assert!(warten_bis(|| session.state() == ConnectionState::Connected).await);
        assert_eq!(session.local_participant(), Some(ParticipantId::from("ich")));
    }

    #[tokio::test]
    async fn fehlgeschlagenes_connect_kehrt_zurueck() {
        let (session, _rx) = session_mit(MemoryTransport::mit_connect_fehler("ich", "offline"), true);
        assert!(matches!(
            session.connect("R").await,
            Err(HuddleError::Transport(_))
        ));
        assert_eq!(session.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn toggle_meldet_muted_nur_bei_aenderung() {
        let transport = MemoryTransport::new("ich");
        let (session, mut rx) = session_mit(transport, false);
        session.connect("R").await.unwrap();
        assert!(warten_bis(|| session.state() == ConnectionState::Connected).await);

        // Ohne Mikrofon: kein Wechsel, kein Ereignis
        assert!(session.toggle_mute());
        assert_eq!(rx.recv().await, Some(VoiceEvent::Joined("ich".into())));
        while let Ok(event) = rx.try_recv() {
            assert!(!matches!(event, VoiceEvent::Muted(_)));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn gleichzeitiges_umschalten_meldet_jeden_wechsel() {
        let transport = MemoryTransport::new("ich");
        let (session, mut rx) = session_mit(transport, true);
        let session = Arc::new(session);
        session.connect("R").await.unwrap();
        assert!(warten_bis(|| session.table().hat_in_resource()).await);

        let mut aufgaben = Vec::new();
        for _ in 0..8 {
            let s = Arc::clone(&session);
            aufgaben.push(tokio::spawn(async move {
                (0..25).map(|_| s.toggle_mute()).collect::<Vec<bool>>()
            }));
        }
        let mut rueckgaben = 0;
        for aufgabe in aufgaben {
            rueckgaben += aufgabe.await.unwrap().len();
        }

        let mut gemeldet = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let VoiceEvent::Muted(mute) = event {
                gemeldet.push(mute);
            }
        }
        // Jeder Umschaltvorgang erzeugt genau ein Ereignis
        assert_eq!(gemeldet.len(), rueckgaben);
        // 200 Wechsel ab gemutet enden wieder gemutet
        assert!(session.mute());
        assert_eq!(gemeldet.iter().filter(|&&m| !m).count(), 100);
    }

    #[tokio::test]
    async fn unaufgefordertes_left_baut_ab() {
        let transport = MemoryTransport::new("ich");
        let (session, mut rx) = session_mit(transport.clone(), true);
        session.connect("R").await.unwrap();
        assert!(warten_bis(|| session.table().hat_in_resource()).await);
        transport.user_beitreten("bob");
        session.set_out_volume(0.5);

        transport.verbindung_verlieren("netz weg");

        assert!(warten_bis(|| session.state() == ConnectionState::Disconnected).await);
        assert!(session.table().ist_leer());
        assert_eq!(session.out_volume(), 1.0);
        assert!(session.local_participant().is_none());

        let mut left = None;
        while let Some(event) = rx.recv().await {
            if let VoiceEvent::Left { grund } = event {
                left = Some(grund);
                break;
            }
        }
        assert_eq!(left.as_deref(), Some("netz weg"));
    }

    #[tokio::test]
    async fn shutdown_gibt_alles_frei() {
        let transport = MemoryTransport::new("ich");
        let cap = Arc::new(SyntheticCapability::new(true));
        let (session, _rx) = VoiceSession::new(
            schnelle_config(),
            Arc::new(transport.clone()),
            cap.clone(),
        )
        .unwrap();
        session.connect("R").await.unwrap();
        assert!(warten_bis(|| session.table().hat_in_resource()).await);

        session.shutdown();

        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert!(session.table().ist_leer());
        assert!(!cap.letzte_aufnahme().unwrap().is_active());
        // Spaetere Hooks landen nicht mehr in der Tabelle
        transport.user_beitreten("bob");
        assert!(session.table().ist_leer());
    }
}
