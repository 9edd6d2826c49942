//! Pegel-Monitor
//!
//! Tastet in festem Intervall die Pegel aller lebenden Ressourcen ab und
//! vergleicht den Snapshot mit dem zuletzt gesehenen. Gemeldet wird der
//! komplette neue Snapshot, hoechstens einmal pro Tick, und nur wenn sich
//! ein Wert oder die Teilnehmermenge geaendert hat.
//!
//! Ohne bekannte lokale ParticipantId (vor dem Beitritt, nach dem Verlassen)
//! ist der Monitor im Zustand Idle und tastet nichts ab.

use huddle_core::{AudioLevelSnapshot, ParticipantId};
use huddle_observability::SessionMetrics;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::table::ResourceTable;

/// Zustand des Pegel-Monitors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Monitoring,
}

#[derive(Default)]
struct MonitorInner {
    lokal: Option<ParticipantId>,
    vorher: AudioLevelSnapshot,
}

/// Vergleicht aufeinanderfolgende Pegel-Snapshots
pub struct LevelMonitor {
    table: ResourceTable,
    metrics: SessionMetrics,
    inner: Mutex<MonitorInner>,
}

impl LevelMonitor {
    pub fn new(table: ResourceTable, metrics: SessionMetrics) -> Self {
        Self {
            table,
            metrics,
            inner: Mutex::new(MonitorInner::default()),
        }
    }

    /// Wechselt nach Monitoring mit der lokalen ParticipantId
    pub fn starten(&self, lokal: ParticipantId) {
        let mut inner = self.inner.lock();
        debug!(teilnehmer = %lokal, "Pegel-Monitor aktiv");
        inner.lokal = Some(lokal);
        inner.vorher = AudioLevelSnapshot::new();
    }

    /// Wechselt nach Idle und vergisst den letzten Snapshot
    pub fn stoppen(&self) {
        let mut inner = self.inner.lock();
        if inner.lokal.take().is_some() {
            debug!("Pegel-Monitor inaktiv");
        }
        inner.vorher = AudioLevelSnapshot::new();
    }

    pub fn zustand(&self) -> MonitorState {
        if self.inner.lock().lokal.is_some() {
            MonitorState::Monitoring
        } else {
            MonitorState::Idle
        }
    }

    pub fn lokaler_teilnehmer(&self) -> Option<ParticipantId> {
        self.inner.lock().lokal.clone()
    }

    /// Ein Messzeitpunkt. Gibt den neuen Snapshot zurueck, wenn er gemeldet
    /// werden muss.
    pub fn tick(&self) -> Option<AudioLevelSnapshot> {
        let mut inner = self.inner.lock();
        let lokal = inner.lokal.clone()?;

        let aktuell = self.table.sample_levels(&lokal);
        if !aktuell.differs_from(&inner.vorher) {
            trace!(teilnehmer = aktuell.len(), "Pegel unveraendert");
            return None;
        }

        inner.vorher = aktuell.clone();
        self.metrics.level_emissions_total.inc();
        debug!(teilnehmer = aktuell.len(), "Pegel geaendert");
        Some(aktuell)
    }
}

impl std::fmt::Debug for LevelMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("LevelMonitor")
            .field("lokal", &inner.lokal)
            .field("vorher", &inner.vorher)
            .finish()
    }
}
