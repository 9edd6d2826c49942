//! In-Process Loopback-Transport
//!
//! Ersetzt Signalisierung und Peer-Connections durch direkte Aufrufe.
//! Tests und der Demo-Client steuern damit Raumbeitritt, entfernte
//! Teilnehmer und eingehende Tracks. Hooks werden immer ohne gehaltene
//! interne Locks aufgerufen.

use async_trait::async_trait;
use huddle_audio::{LocalAudioTrack, MediaStreamId, RemoteAudioTrack, TrackKind};
use huddle_core::{HuddleError, HuddleResult, ParticipantId};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::{
    PcCloseHook, PcCreateHook, PeerConnection, PeerLifecycleHooks, TrackCallback,
    TransportEvent, VoiceTransport,
};

// ---------------------------------------------------------------------------
// MemoryPeerConnection
// ---------------------------------------------------------------------------

/// Peer-Connection des Loopback-Transports
pub struct MemoryPeerConnection {
    id: ParticipantId,
    tracks: Mutex<Vec<(LocalAudioTrack, MediaStreamId)>>,
    on_track: Mutex<Option<TrackCallback>>,
    gesendet: Arc<AtomicUsize>,
    letzter_frame: Arc<Mutex<Vec<f32>>>,
}

impl MemoryPeerConnection {
    fn new(id: ParticipantId) -> Self {
        Self {
            id,
            tracks: Mutex::new(Vec::new()),
            on_track: Mutex::new(None),
            gesendet: Arc::new(AtomicUsize::new(0)),
            letzter_frame: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn id(&self) -> &ParticipantId {
        &self.id
    }

    /// Alle bisher hinzugefuegten ausgehenden Tracks
    pub fn tracks(&self) -> Vec<(LocalAudioTrack, MediaStreamId)> {
        self.tracks.lock().clone()
    }

    /// Anzahl der ueber ausgehende Tracks gesendeten Samples
    pub fn gesendete_samples(&self) -> usize {
        self.gesendet.load(Ordering::Relaxed)
    }

    /// Zuletzt gesendeter Frame
    pub fn letzter_frame(&self) -> Vec<f32> {
        self.letzter_frame.lock().clone()
    }

    pub fn hat_track_callback(&self) -> bool {
        self.on_track.lock().is_some()
    }

    /// Meldet einen eingehenden Track an den registrierten Callback
    pub fn track_melden(&self, track: RemoteAudioTrack) {
        if let Some(callback) = self.on_track.lock().as_mut() {
            callback(track);
        } else {
            debug!(teilnehmer = %self.id, "Kein Track-Callback registriert");
        }
    }
}

impl PeerConnection for MemoryPeerConnection {
    fn add_track(&self, track: LocalAudioTrack, stream: MediaStreamId) -> HuddleResult<()> {
        let gesendet = Arc::clone(&self.gesendet);
        let letzter_frame = Arc::clone(&self.letzter_frame);
        track.set_sink(Box::new(move |frame: &[f32]| {
            gesendet.fetch_add(frame.len(), Ordering::Relaxed);
            *letzter_frame.lock() = frame.to_vec();
        }));
        debug!(teilnehmer = %self.id, stream = %stream, "Track hinzugefuegt");
        self.tracks.lock().push((track, stream));
        Ok(())
    }

    fn on_track(&self, callback: TrackCallback) {
        *self.on_track.lock() = Some(callback);
    }
}

// ---------------------------------------------------------------------------
// MemoryTransport
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Hooks {
    publish_create: Vec<PcCreateHook>,
    subscribe_create: Vec<PcCreateHook>,
    publish_close: Vec<PcCloseHook>,
    subscribe_close: Vec<PcCloseHook>,
}

#[derive(Default)]
struct Raum {
    name: Option<String>,
    publish: Option<Arc<MemoryPeerConnection>>,
    subscribe: BTreeMap<ParticipantId, Arc<MemoryPeerConnection>>,
}

struct Inner {
    lokale_id: ParticipantId,
    auto_join: bool,
    connect_fehler: Option<String>,
    hooks: Mutex<Hooks>,
    raum: Mutex<Raum>,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<TransportEvent>>>,
}

/// Loopback-Transport (Clone teilt den Zustand)
#[derive(Clone)]
pub struct MemoryTransport {
    inner: Arc<Inner>,
}

impl MemoryTransport {
    /// Erstellt einen Transport, der beim Connect sofort beitritt und die
    /// Publish-Verbindung fuer `lokale_id` aufbaut
    pub fn new(lokale_id: impl Into<ParticipantId>) -> Self {
        Self::bauen(lokale_id.into(), true, None)
    }

    /// Connect wird angenommen, der Beitritt aber erst mit
    /// [`MemoryTransport::beitritt_bestaetigen`] gemeldet
    pub fn ohne_auto_join(lokale_id: impl Into<ParticipantId>) -> Self {
        Self::bauen(lokale_id.into(), false, None)
    }

    /// Jeder Connect schlaegt mit diesem Grund fehl
    pub fn mit_connect_fehler(lokale_id: impl Into<ParticipantId>, grund: impl Into<String>) -> Self {
        Self::bauen(lokale_id.into(), true, Some(grund.into()))
    }

    fn bauen(lokale_id: ParticipantId, auto_join: bool, connect_fehler: Option<String>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                lokale_id,
                auto_join,
                connect_fehler,
                hooks: Mutex::new(Hooks::default()),
                raum: Mutex::new(Raum::default()),
                events_tx,
                events_rx: Mutex::new(Some(events_rx)),
            }),
        }
    }

    pub fn lokale_id(&self) -> &ParticipantId {
        &self.inner.lokale_id
    }

    /// Name des aktuellen Raums
    pub fn raum(&self) -> Option<String> {
        self.inner.raum.lock().name.clone()
    }

    pub fn publish_verbindung(&self) -> Option<Arc<MemoryPeerConnection>> {
        self.inner.raum.lock().publish.clone()
    }

    pub fn subscribe_verbindung(&self, id: &ParticipantId) -> Option<Arc<MemoryPeerConnection>> {
        self.inner.raum.lock().subscribe.get(id).cloned()
    }

    /// IDs aller offenen Subscribe-Verbindungen
    pub fn subscribe_ids(&self) -> Vec<ParticipantId> {
        self.inner.raum.lock().subscribe.keys().cloned().collect()
    }

    fn senden(&self, event: TransportEvent) {
        // Empfaenger kann bereits weg sein (Session beendet)
        let _ = self.inner.events_tx.send(event);
    }

    // --- Raum-Simulation ---

    /// Meldet den Beitritt und baut die Publish-Verbindung auf
    pub fn beitritt_bestaetigen(&self) {
        self.senden(TransportEvent::Joined(self.inner.lokale_id.clone()));
        self.publish_pc_erstellen();
    }

    /// Entfernter Teilnehmer tritt bei: Ereignis + Subscribe-Verbindung
    pub fn user_beitreten(&self, id: impl Into<ParticipantId>) -> Arc<MemoryPeerConnection> {
        let id = id.into();
        self.senden(TransportEvent::UserJoined(id.clone()));
        self.subscribe_pc_erstellen(id)
    }

    /// Entfernter Teilnehmer verlaesst den Raum
    pub fn user_verlassen(&self, id: impl Into<ParticipantId>) {
        let id = id.into();
        self.subscribe_pc_schliessen(id.clone());
        self.senden(TransportEvent::UserLeft(id));
    }

    /// Liefert einen eingehenden Track auf der Subscribe-Verbindung von `id`
    pub fn track_senden(&self, id: &ParticipantId, kind: TrackKind) -> Option<RemoteAudioTrack> {
        let pc = self.subscribe_verbindung(id)?;
        let track = RemoteAudioTrack::new(kind);
        pc.track_melden(track.clone());
        Some(track)
    }

    /// Verbindung bricht ab, ohne dass die Session disconnect() aufgerufen hat
    pub fn verbindung_verlieren(&self, grund: impl Into<String>) {
        self.alle_schliessen();
        self.senden(TransportEvent::Left(grund.into()));
    }

    // --- Rohe Lebenszyklus-Kanten (ohne Raum-Ereignisse) ---

    /// Erstellt die Publish-Verbindung und ruft die Create-Hooks auf
    pub fn publish_pc_erstellen(&self) -> Arc<MemoryPeerConnection> {
        let pc = Arc::new(MemoryPeerConnection::new(self.inner.lokale_id.clone()));
        self.inner.raum.lock().publish = Some(Arc::clone(&pc));
        let handle: Arc<dyn PeerConnection> = pc.clone();
        let hooks = self.inner.hooks.lock().publish_create.clone();
        for hook in hooks {
            hook(self.inner.lokale_id.clone(), Arc::clone(&handle));
        }
        pc
    }

    /// Ruft die Publish-Close-Hooks auf (auch ohne offene Verbindung,
    /// um doppelte Ereignisse zu simulieren)
    pub fn publish_pc_schliessen(&self) {
        self.inner.raum.lock().publish = None;
        let hooks = self.inner.hooks.lock().publish_close.clone();
        for hook in hooks {
            hook(self.inner.lokale_id.clone());
        }
    }

    /// Erstellt eine Subscribe-Verbindung und ruft die Create-Hooks auf
    pub fn subscribe_pc_erstellen(&self, id: impl Into<ParticipantId>) -> Arc<MemoryPeerConnection> {
        let id = id.into();
        let pc = Arc::new(MemoryPeerConnection::new(id.clone()));
        self.inner
            .raum
            .lock()
            .subscribe
            .insert(id.clone(), Arc::clone(&pc));
        let handle: Arc<dyn PeerConnection> = pc.clone();
        let hooks = self.inner.hooks.lock().subscribe_create.clone();
        for hook in hooks {
            hook(id.clone(), Arc::clone(&handle));
        }
        pc
    }

    /// Ruft die Subscribe-Close-Hooks fuer `id` auf
    pub fn subscribe_pc_schliessen(&self, id: impl Into<ParticipantId>) {
        let id = id.into();
        self.inner.raum.lock().subscribe.remove(&id);
        let hooks = self.inner.hooks.lock().subscribe_close.clone();
        for hook in hooks {
            hook(id.clone());
        }
    }

    fn alle_schliessen(&self) {
        let (ids, publish_offen) = {
            let mut raum = self.inner.raum.lock();
            raum.name = None;
            let ids: Vec<ParticipantId> = raum.subscribe.keys().cloned().collect();
            (ids, raum.publish.is_some())
        };
        for id in ids {
            self.subscribe_pc_schliessen(id);
        }
        if publish_offen {
            self.publish_pc_schliessen();
        }
    }
}

impl PeerLifecycleHooks for MemoryTransport {
    fn add_publish_pc_create_hook(&self, hook: PcCreateHook) {
        self.inner.hooks.lock().publish_create.push(hook);
    }

    fn add_subscribe_pc_create_hook(&self, hook: PcCreateHook) {
        self.inner.hooks.lock().subscribe_create.push(hook);
    }

    fn add_publish_pc_close_hook(&self, hook: PcCloseHook) {
        self.inner.hooks.lock().publish_close.push(hook);
    }

    fn add_subscribe_pc_close_hook(&self, hook: PcCloseHook) {
        self.inner.hooks.lock().subscribe_close.push(hook);
    }
}

#[async_trait]
impl VoiceTransport for MemoryTransport {
    async fn connect(&self, room: &str) -> HuddleResult<()> {
        if let Some(grund) = &self.inner.connect_fehler {
            return Err(HuddleError::Transport(grund.clone()));
        }
        {
            let mut raum = self.inner.raum.lock();
            if let Some(aktuell) = &raum.name {
                return Err(HuddleError::Transport(format!(
                    "Bereits im Raum '{aktuell}'"
                )));
            }
            raum.name = Some(room.to_string());
        }
        info!(raum = %room, "Loopback-Transport verbunden");

        if self.inner.auto_join {
            self.beitritt_bestaetigen();
        }
        Ok(())
    }

    async fn disconnect(&self) -> HuddleResult<()> {
        self.alle_schliessen();
        self.senden(TransportEvent::Left("disconnect".to_string()));
        info!("Loopback-Transport getrennt");
        Ok(())
    }

    fn take_event_receiver(&self) -> Option<mpsc::UnboundedReceiver<TransportEvent>> {
        self.inner.events_rx.lock().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zaehlender_create_hook(zaehler: &Arc<AtomicUsize>) -> PcCreateHook {
        let z = Arc::clone(zaehler);
        Arc::new(move |_id: ParticipantId, _pc: Arc<dyn PeerConnection>| {
            z.fetch_add(1, Ordering::Relaxed);
        })
    }

    #[tokio::test]
    async fn connect_meldet_beitritt_und_erstellt_publish() {
        let transport = MemoryTransport::new("ich");
        let mut rx = transport.take_event_receiver().unwrap();
        let erstellt = Arc::new(AtomicUsize::new(0));
        transport.add_publish_pc_create_hook(zaehlender_create_hook(&erstellt));

        transport.connect("R").await.unwrap();

        assert_eq!(transport.raum().as_deref(), Some("R"));
        assert_eq!(rx.recv().await, Some(TransportEvent::Joined("ich".into())));
        assert_eq!(erstellt.load(Ordering::Relaxed), 1);
        assert!(transport.publish_verbindung().is_some());
    }

    #[tokio::test]
    async fn zweiter_connect_schlaegt_fehl() {
        let transport = MemoryTransport::new("ich");
        transport.connect("R").await.unwrap();
        assert!(matches!(
            transport.connect("R").await,
            Err(HuddleError::Transport(_))
        ));
    }

    #[test]
    fn receiver_nur_einmal() {
        let transport = MemoryTransport::new("ich");
        assert!(transport.take_event_receiver().is_some());
        assert!(transport.take_event_receiver().is_none());
    }

    #[tokio::test]
    async fn disconnect_schliesst_alles() {
        let transport = MemoryTransport::new("ich");
        let mut rx = transport.take_event_receiver().unwrap();
        let geschlossen = Arc::new(Mutex::new(Vec::<ParticipantId>::new()));
        let g = Arc::clone(&geschlossen);
        transport.add_subscribe_pc_close_hook(Arc::new(move |id: ParticipantId| g.lock().push(id)));

        transport.connect("R").await.unwrap();
        transport.user_beitreten("bob");
        transport.user_beitreten("carol");
        transport.disconnect().await.unwrap();

        assert_eq!(
            *geschlossen.lock(),
            vec![ParticipantId::from("bob"), ParticipantId::from("carol")]
        );
        assert!(transport.subscribe_ids().is_empty());
        assert!(transport.publish_verbindung().is_none());
        assert!(transport.raum().is_none());

        let mut letztes = None;
        while let Ok(event) = rx.try_recv() {
            letztes = Some(event);
        }
        assert_eq!(letztes, Some(TransportEvent::Left("disconnect".into())));
    }

    #[test]
    fn add_track_installiert_senke() {
        let pc = MemoryPeerConnection::new("ich".into());
        let track = LocalAudioTrack::new(true);
        pc.add_track(track.clone(), MediaStreamId::new()).unwrap();

        track.push_frame(&[0.5, 0.5]);
        assert_eq!(pc.gesendete_samples(), 2);
        assert_eq!(pc.letzter_frame(), vec![0.5f32, 0.5]);
        assert_eq!(pc.tracks().len(), 1);
    }

    #[test]
    fn track_senden_erreicht_callback() {
        let transport = MemoryTransport::new("ich");
        let pc = transport.subscribe_pc_erstellen("bob");
        let kinds = Arc::new(Mutex::new(Vec::new()));
        let k = Arc::clone(&kinds);
        pc.on_track(Box::new(move |track: RemoteAudioTrack| k.lock().push(track.kind())));

        transport.track_senden(&"bob".into(), TrackKind::Video);
        transport.track_senden(&"bob".into(), TrackKind::Audio);
        assert_eq!(*kinds.lock(), vec![TrackKind::Video, TrackKind::Audio]);
        assert!(transport.track_senden(&"niemand".into(), TrackKind::Audio).is_none());
    }
}
