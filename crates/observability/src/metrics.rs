//! Prometheus-kompatible Metriken einer Voice-Session
//!
//! Registrierte Metriken:
//! - `huddle_in_resources` – Gauge: Lokale Sende-Ressourcen (0 oder 1)
//! - `huddle_out_resources` – Gauge: Empfangs-Ressourcen entfernter Teilnehmer
//! - `huddle_resource_failures_total` – Counter: Fehlgeschlagene Ressourcen-Aufbauten
//! - `huddle_level_emissions_total` – Counter: Gemeldete Pegel-Snapshots
//! - `huddle_mute_toggles_total` – Counter: Tatsaechliche Mute-Wechsel
//!
//! Jede Session besitzt eine eigene Registry. Ein HTTP-Endpunkt ist nicht
//! Teil dieses Crates; `exportieren()` liefert das Textformat fuer Aufrufer,
//! die einen anbieten wollen.

use anyhow::Result;
use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Alle Metriken einer Session
#[derive(Clone)]
pub struct SessionMetrics {
    pub registry: Arc<Registry>,

    // Ressourcen
    pub in_resources: IntGauge,
    pub out_resources: IntGauge,
    pub resource_failures_total: IntCounter,

    // Ereignisse
    pub level_emissions_total: IntCounter,
    pub mute_toggles_total: IntCounter,
}

impl SessionMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        // --- Ressourcen ---
        let in_resources = IntGauge::with_opts(Opts::new(
            "huddle_in_resources",
            "Anzahl lokaler Sende-Ressourcen",
        ))?;
        registry.register(Box::new(in_resources.clone()))?;

        let out_resources = IntGauge::with_opts(Opts::new(
            "huddle_out_resources",
            "Anzahl Empfangs-Ressourcen entfernter Teilnehmer",
        ))?;
        registry.register(Box::new(out_resources.clone()))?;

        let resource_failures_total = IntCounter::with_opts(Opts::new(
            "huddle_resource_failures_total",
            "Gesamtanzahl fehlgeschlagener Ressourcen-Aufbauten",
        ))?;
        registry.register(Box::new(resource_failures_total.clone()))?;

        // --- Ereignisse ---
        let level_emissions_total = IntCounter::with_opts(Opts::new(
            "huddle_level_emissions_total",
            "Gesamtanzahl gemeldeter Pegel-Snapshots",
        ))?;
        registry.register(Box::new(level_emissions_total.clone()))?;

        let mute_toggles_total = IntCounter::with_opts(Opts::new(
            "huddle_mute_toggles_total",
            "Gesamtanzahl tatsaechlicher Mute-Wechsel",
        ))?;
        registry.register(Box::new(mute_toggles_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            in_resources,
            out_resources,
            resource_failures_total,
            level_emissions_total,
            mute_toggles_total,
        })
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

impl std::fmt::Debug for SessionMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionMetrics")
            .field("in_resources", &self.in_resources.get())
            .field("out_resources", &self.out_resources.get())
            .field("resource_failures_total", &self.resource_failures_total.get())
            .finish()
    }
}
