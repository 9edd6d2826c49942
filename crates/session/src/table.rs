//! Ressourcen-Tabelle
//!
//! Haelt pro Session:
//! - hoechstens eine Sende-Ressource (Mikrofon -> Gain -> Analyse -> Track)
//! - pro entferntem Teilnehmer eine Empfangs-Ressource
//!   (Track -> Gain -> Analyse -> Lautsprecher)
//! - den Mute-/Lautstaerke-Zustand, den neue Ressourcen beim Aufbau lesen
//!
//! Alles liegt hinter einem einzigen Mutex. Entfernen und Freigeben einer
//! Ressource passieren unter demselben Lock, der Pegel-Monitor sieht also
//! nie eine halb abgebaute Ressource. Audio-Callbacks nehmen diesen Lock nie.
//!
//! Die Mikrofon-Anforderung ist asynchron. Jede Publish-Verbindung bekommt
//! ein Ticket; wird sie geschlossen bevor das Geraet da ist, erkennt der
//! Aufbau das am veralteten Ticket und gibt das Geraet sofort wieder frei.

use huddle_audio::{
    AudioCapability, AudioChain, AudioError, CaptureStream, FrameCallback, LocalAudioTrack,
    MediaStreamId, PlaybackSink, RemoteAudioTrack, TrackKind,
};
use huddle_core::{AudioLevelSnapshot, HuddleError, ParticipantId};
use huddle_observability::SessionMetrics;
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::SessionConfig;
use crate::transport::PeerConnection;

/// Mute- und Lautstaerke-Zustand der Session (Lautstaerken in 0.0..=1.0)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionState {
    pub mute: bool,
    pub in_volume: f32,
    pub out_volume: f32,
}

impl SessionState {
    /// Startzustand aus der Konfiguration
    pub fn aus_config(config: &SessionConfig) -> Self {
        Self {
            mute: config.initial_mute,
            in_volume: config.initial_in_volume,
            out_volume: config.initial_out_volume,
        }
    }
}

/// Wandelt einen Audio-Fehler in den Session-Fehler des Teilnehmers
pub(crate) fn audio_fehler(teilnehmer: &ParticipantId, fehler: AudioError) -> HuddleError {
    if fehler.ist_geraet_fehlt() {
        HuddleError::GeraetNichtVerfuegbar
    } else {
        HuddleError::ressource(teilnehmer.as_str(), fehler.to_string())
    }
}

// ---------------------------------------------------------------------------
// Ressourcen
// ---------------------------------------------------------------------------

struct InResource {
    teilnehmer: ParticipantId,
    capture: Box<dyn CaptureStream>,
    track: LocalAudioTrack,
    stream: MediaStreamId,
    chain: AudioChain,
}

impl InResource {
    fn freigeben(mut self) {
        self.capture.stop();
        self.track.stop();
        self.chain.disconnect();
        debug!(teilnehmer = %self.teilnehmer, stream = %self.stream, "Sende-Ressource freigegeben");
    }
}

struct OutResource {
    generation: u64,
    sink: Arc<Mutex<Box<dyn PlaybackSink>>>,
    /// Erst gesetzt wenn der erste Audio-Track angekommen ist
    empfang: Option<(RemoteAudioTrack, AudioChain)>,
}

impl OutResource {
    fn freigeben(self) {
        if let Some((track, chain)) = self.empfang {
            track.stop();
            chain.disconnect();
        }
        self.sink.lock().stop();
    }
}

struct TableInner {
    state: SessionState,
    in_resource: Option<InResource>,
    /// Ticket der Publish-Verbindung, deren Geraete-Anforderung noch laeuft
    publish_ticket: Option<u64>,
    out_resources: HashMap<ParticipantId, OutResource>,
    naechste_generation: u64,
}

impl TableInner {
    fn naechste_generation(&mut self) -> u64 {
        self.naechste_generation += 1;
        self.naechste_generation
    }
}

struct TableShared {
    capability: Arc<dyn AudioCapability>,
    metrics: SessionMetrics,
    window: usize,
    runtime: Handle,
    /// Nach `schliessen()` werden keine Ressourcen mehr angelegt
    geschlossen: AtomicBool,
    zustand: Mutex<TableInner>,
}

// ---------------------------------------------------------------------------
// ResourceTable
// ---------------------------------------------------------------------------

/// Besitzt alle Audio-Ressourcen einer Session (Clone teilt die Tabelle)
#[derive(Clone)]
pub struct ResourceTable {
    inner: Arc<TableShared>,
}

impl ResourceTable {
    /// Erstellt eine leere Tabelle. Aufbau-Tasks laufen auf `runtime`.
    pub fn new(
        capability: Arc<dyn AudioCapability>,
        state: SessionState,
        window: usize,
        metrics: SessionMetrics,
        runtime: Handle,
    ) -> Self {
        Self {
            inner: Arc::new(TableShared {
                capability,
                metrics,
                window: window.max(1),
                runtime,
                geschlossen: AtomicBool::new(false),
                zustand: Mutex::new(TableInner {
                    state,
                    in_resource: None,
                    publish_ticket: None,
                    out_resources: HashMap::new(),
                    naechste_generation: 0,
                }),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TableInner> {
        self.inner.zustand.lock()
    }

    pub fn capability(&self) -> &Arc<dyn AudioCapability> {
        &self.inner.capability
    }

    // --- Publish ---

    /// Publish-Verbindung erstellt: Mikrofon anfordern und Sende-Ressource
    /// aufbauen. Kehrt sofort zurueck; der Aufbau laeuft als Task, dessen
    /// Handle zurueckgegeben wird. Ohne Mikrofon passiert nichts.
    pub fn on_publish_created(
        &self,
        id: ParticipantId,
        pc: Arc<dyn PeerConnection>,
    ) -> Option<JoinHandle<()>> {
        if self.ist_geschlossen() {
            debug!(teilnehmer = %id, "Tabelle geschlossen, Publish-Verbindung ignoriert");
            return None;
        }
        if !self.inner.capability.has_microphone() {
            warn!(teilnehmer = %id, "Kein Mikrofon, Publish-Verbindung bleibt ohne Audio");
            return None;
        }

        let (ticket, start) = {
            let mut zustand = self.lock();
            if let Some(alt) = zustand.in_resource.take() {
                warn!(teilnehmer = %id, "Doppelte Publish-Verbindung, alte Sende-Ressource wird ersetzt");
                alt.freigeben();
                self.inner.metrics.in_resources.set(0);
            }
            let ticket = zustand.naechste_generation();
            zustand.publish_ticket = Some(ticket);
            (ticket, zustand.state)
        };

        debug!(teilnehmer = %id, ticket, "Mikrofon wird angefordert");
        let table = self.clone();
        Some(
            self.inner
                .runtime
                .spawn(async move { table.in_resource_aufbauen(id, pc, ticket, start).await }),
        )
    }

    async fn in_resource_aufbauen(
        &self,
        id: ParticipantId,
        pc: Arc<dyn PeerConnection>,
        ticket: u64,
        start: SessionState,
    ) {
        let chain = AudioChain::new(start.in_volume, self.inner.window);
        let track = LocalAudioTrack::new(!start.mute);

        let on_frame: FrameCallback = {
            let chain = chain.clone();
            let track = track.clone();
            Box::new(move |frame: &[f32]| {
                let verstaerkt = chain.process(frame);
                track.push_frame(&verstaerkt);
            })
        };

        let capture = match self.inner.capability.open_capture(on_frame).await {
            Ok(capture) => capture,
            Err(e) => {
                match audio_fehler(&id, e) {
                    HuddleError::GeraetNichtVerfuegbar => {
                        warn!(teilnehmer = %id, "Mikrofon nicht verfuegbar, Session laeuft ohne Aufnahme")
                    }
                    fehler => error!(teilnehmer = %id, "Sende-Ressource fehlgeschlagen: {}", fehler),
                }
                self.inner.metrics.resource_failures_total.inc();
                let mut zustand = self.lock();
                if zustand.publish_ticket == Some(ticket) {
                    zustand.publish_ticket = None;
                }
                return;
            }
        };

        let stream = MediaStreamId::new();
        let resource = InResource {
            teilnehmer: id.clone(),
            capture,
            track: track.clone(),
            stream,
            chain: chain.clone(),
        };

        {
            let mut zustand = self.lock();
            if zustand.publish_ticket != Some(ticket) {
                drop(zustand);
                info!(teilnehmer = %id, "Publish-Verbindung waehrend der Anforderung geschlossen, Mikrofon wird freigegeben");
                resource.freigeben();
                return;
            }
            zustand.publish_ticket = None;
            // Zustand kann sich waehrend der Anforderung geaendert haben
            chain.gain().set(zustand.state.in_volume);
            track.set_enabled(!zustand.state.mute);
            zustand.in_resource = Some(resource);
            self.inner.metrics.in_resources.set(1);
        }

        if let Err(e) = pc.add_track(track, stream) {
            error!(teilnehmer = %id, "Track konnte nicht publiziert werden: {}", e);
            self.inner.metrics.resource_failures_total.inc();
            let mut zustand = self.lock();
            if zustand.in_resource.as_ref().map_or(false, |r| r.stream == stream) {
                if let Some(resource) = zustand.in_resource.take() {
                    resource.freigeben();
                }
                self.inner.metrics.in_resources.set(0);
            }
            return;
        }

        info!(teilnehmer = %id, stream = %stream, "Sende-Ressource aufgebaut");
    }

    /// Publish-Verbindung geschlossen: Sende-Ressource abbauen bzw. eine
    /// laufende Anforderung verwerfen. Ohne Ressource ein No-op.
    pub fn on_publish_closed(&self, id: &ParticipantId) {
        let mut zustand = self.lock();
        let abgebrochen = zustand.publish_ticket.take().is_some();
        match zustand.in_resource.take() {
            Some(resource) => {
                resource.freigeben();
                self.inner.metrics.in_resources.set(0);
                info!(teilnehmer = %id, "Sende-Ressource abgebaut");
            }
            None if abgebrochen => {
                debug!(teilnehmer = %id, "Laufende Mikrofon-Anforderung verworfen");
            }
            None => {
                debug!(teilnehmer = %id, "Keine Sende-Ressource vorhanden");
            }
        }
    }

    // --- Subscribe ---

    /// Subscribe-Verbindung erstellt: Wiedergabe-Senke sofort anlegen, die
    /// Audio-Kette folgt mit dem ersten eingehenden Audio-Track
    pub fn on_subscribe_created(&self, id: ParticipantId, pc: Arc<dyn PeerConnection>) {
        if self.ist_geschlossen() {
            debug!(teilnehmer = %id, "Tabelle geschlossen, Subscribe-Verbindung ignoriert");
            return;
        }
        let sink = match self.inner.capability.open_playback(id.as_str()) {
            Ok(sink) => sink,
            Err(e) => {
                error!(teilnehmer = %id, "Empfangs-Ressource fehlgeschlagen: {}", audio_fehler(&id, e));
                self.inner.metrics.resource_failures_total.inc();
                // Eine alte Ressource gehoert zu einer nicht mehr offenen Verbindung
                self.out_entfernen(&id);
                return;
            }
        };

        let generation = {
            let mut zustand = self.lock();
            let generation = zustand.naechste_generation();
            let neu = OutResource {
                generation,
                sink: Arc::new(Mutex::new(sink)),
                empfang: None,
            };
            if let Some(alt) = zustand.out_resources.insert(id.clone(), neu) {
                warn!(teilnehmer = %id, "Doppelte Subscribe-Verbindung, alte Empfangs-Ressource wird ersetzt");
                alt.freigeben();
            }
            self.inner
                .metrics
                .out_resources
                .set(zustand.out_resources.len() as i64);
            generation
        };

        let table = self.clone();
        let track_id = id.clone();
        pc.on_track(Box::new(move |track: RemoteAudioTrack| {
            table.track_angekommen(&track_id, generation, track);
        }));

        info!(teilnehmer = %id, "Empfangs-Ressource angelegt");
    }

    fn track_angekommen(&self, id: &ParticipantId, generation: u64, track: RemoteAudioTrack) {
        debug!(teilnehmer = %id, kind = ?track.kind(), "Track empfangen");
        if track.kind() != TrackKind::Audio {
            return;
        }

        let mut zustand = self.lock();
        let out_volume = zustand.state.out_volume;
        let Some(resource) = zustand.out_resources.get_mut(id) else {
            debug!(teilnehmer = %id, "Track nach Schliessen der Verbindung ignoriert");
            return;
        };
        if resource.generation != generation {
            debug!(teilnehmer = %id, "Track einer ersetzten Verbindung ignoriert");
            return;
        }
        if resource.empfang.is_some() {
            debug!(teilnehmer = %id, "Weiterer Audio-Track ignoriert");
            return;
        }

        let chain = AudioChain::new(out_volume, self.inner.window);
        let handler_chain = chain.clone();
        let sink = Arc::clone(&resource.sink);
        track.set_frame_handler(Box::new(move |frame: &[f32]| {
            let verstaerkt = handler_chain.process(frame);
            sink.lock().write(&verstaerkt);
        }));
        resource.empfang = Some((track, chain));
        info!(teilnehmer = %id, "Audio-Track an Wiedergabe angebunden");
    }

    /// Subscribe-Verbindung geschlossen: Wiedergabe stoppen, Ressource
    /// entfernen. Idempotent.
    pub fn on_subscribe_closed(&self, id: &ParticipantId) {
        if self.out_entfernen(id) {
            info!(teilnehmer = %id, "Empfangs-Ressource abgebaut");
        } else {
            debug!(teilnehmer = %id, "Keine Empfangs-Ressource vorhanden");
        }
    }

    fn out_entfernen(&self, id: &ParticipantId) -> bool {
        let mut zustand = self.lock();
        let Some(resource) = zustand.out_resources.remove(id) else {
            return false;
        };
        resource.freigeben();
        self.inner
            .metrics
            .out_resources
            .set(zustand.out_resources.len() as i64);
        true
    }

    // --- Gesamt ---

    /// Gibt alle Ressourcen frei und verwirft laufende Anforderungen
    pub fn alle_freigeben(&self) {
        let mut zustand = self.lock();
        zustand.publish_ticket = None;
        let hatte_in = zustand.in_resource.is_some();
        if let Some(resource) = zustand.in_resource.take() {
            resource.freigeben();
        }
        let anzahl_out = zustand.out_resources.len();
        for (_, resource) in zustand.out_resources.drain() {
            resource.freigeben();
        }
        self.inner.metrics.in_resources.set(0);
        self.inner.metrics.out_resources.set(0);
        if hatte_in || anzahl_out > 0 {
            info!(sende = hatte_in, empfang = anzahl_out, "Alle Ressourcen freigegeben");
        }
    }

    /// Gibt alles frei und nimmt danach keine neuen Verbindungen mehr an
    pub fn schliessen(&self) {
        self.inner.geschlossen.store(true, Ordering::Relaxed);
        self.alle_freigeben();
    }

    pub fn ist_geschlossen(&self) -> bool {
        self.inner.geschlossen.load(Ordering::Relaxed)
    }

    /// Pegel aller Ressourcen, die gerade Audio liefern. Der lokale Pegel
    /// wird unter `lokal` gefuehrt und ist 0 solange gemutet.
    pub fn sample_levels(&self, lokal: &ParticipantId) -> AudioLevelSnapshot {
        let zustand = self.lock();
        let mut snapshot = AudioLevelSnapshot::new();
        if let Some(resource) = &zustand.in_resource {
            let level = if zustand.state.mute {
                0.0
            } else {
                resource.chain.level()
            };
            snapshot.insert(lokal.clone(), level);
        }
        for (id, resource) in &zustand.out_resources {
            if let Some((_, chain)) = &resource.empfang {
                snapshot.insert(id.clone(), chain.level());
            }
        }
        snapshot
    }

    // --- Zustand (fuer die Steuerflaeche) ---

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// Schaltet Mute um. None wenn keine Sende-Ressource existiert.
    pub(crate) fn mute_umschalten(&self) -> Option<bool> {
        let mut guard = self.lock();
        let zustand = &mut *guard;
        let resource = zustand.in_resource.as_ref()?;
        zustand.state.mute = !zustand.state.mute;
        resource.track.set_enabled(!zustand.state.mute);
        Some(zustand.state.mute)
    }

    /// Setzt die (bereits geklemmte) Eingangslautstaerke. None wenn keine
    /// Sende-Ressource existiert.
    pub(crate) fn in_volume_setzen(&self, volume: f32) -> Option<f32> {
        let mut guard = self.lock();
        let zustand = &mut *guard;
        let resource = zustand.in_resource.as_ref()?;
        zustand.state.in_volume = volume;
        resource.chain.gain().set(volume);
        Some(volume)
    }

    /// Setzt die (bereits geklemmte) Ausgangslautstaerke fuer alle
    /// bestehenden und kuenftigen Empfangs-Ressourcen. Gibt die Anzahl der
    /// sofort angepassten Ketten zurueck.
    pub(crate) fn out_volume_setzen(&self, volume: f32) -> usize {
        let mut zustand = self.lock();
        zustand.state.out_volume = volume;
        let mut angepasst = 0;
        for resource in zustand.out_resources.values() {
            if let Some((_, chain)) = &resource.empfang {
                chain.gain().set(volume);
                angepasst += 1;
            }
        }
        angepasst
    }

    pub(crate) fn state_setzen(&self, state: SessionState) {
        self.lock().state = state;
    }

    // --- Abfragen ---

    pub fn hat_in_resource(&self) -> bool {
        self.lock().in_resource.is_some()
    }

    /// Laeuft gerade eine Mikrofon-Anforderung?
    pub fn publish_ausstehend(&self) -> bool {
        self.lock().publish_ticket.is_some()
    }

    /// Track der Sende-Ressource
    pub fn in_track(&self) -> Option<LocalAudioTrack> {
        self.lock().in_resource.as_ref().map(|r| r.track.clone())
    }

    /// Aktueller Gain der Sende-Kette
    pub fn in_gain(&self) -> Option<f32> {
        self.lock().in_resource.as_ref().map(|r| r.chain.gain().get())
    }

    /// Sortierte IDs aller Empfangs-Ressourcen
    pub fn out_ids(&self) -> Vec<ParticipantId> {
        let mut ids: Vec<ParticipantId> = self.lock().out_resources.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn anzahl_out(&self) -> usize {
        self.lock().out_resources.len()
    }

    /// Hat die Empfangs-Ressource von `id` bereits einen Audio-Track?
    pub fn hat_empfang(&self, id: &ParticipantId) -> bool {
        self.lock()
            .out_resources
            .get(id)
            .map_or(false, |r| r.empfang.is_some())
    }

    /// Gain der Empfangs-Kette von `id`
    pub fn out_gain(&self, id: &ParticipantId) -> Option<f32> {
        self.lock()
            .out_resources
            .get(id)
            .and_then(|r| r.empfang.as_ref())
            .map(|(_, chain)| chain.gain().get())
    }

    /// Keine Ressource und keine laufende Anforderung
    pub fn ist_leer(&self) -> bool {
        let zustand = self.lock();
        zustand.in_resource.is_none()
            && zustand.publish_ticket.is_none()
            && zustand.out_resources.is_empty()
    }
}

impl std::fmt::Debug for ResourceTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let zustand = self.lock();
        f.debug_struct("ResourceTable")
            .field("state", &zustand.state)
            .field("in_resource", &zustand.in_resource.is_some())
            .field("publish_ticket", &zustand.publish_ticket)
            .field("out_resources", &zustand.out_resources.len())
            .finish()
    }
}
