//! Synthetische Audio-Capability
//!
//! Deterministisches In-Process-Backend ohne Audio-Hardware. Aufrufer
//! koennen Frames direkt in geoeffnete Capture-Streams schieben und an den
//! Playback-Senken ablesen, was geschrieben wurde. Optional erzeugt ein
//! Capture-Stream selbst ein Sinus-Signal (Demo-Betrieb).

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::capability::{AudioCapability, CaptureStream, FrameCallback, PlaybackSink};
use crate::error::{AudioError, AudioResult};

/// Frame-Groesse des Signalgenerators: 20ms bei 48kHz Mono
const FRAME_SIZE: usize = 960;
/// Abtastrate des Signalgenerators
const SAMPLE_RATE: f32 = 48000.0;
/// Frequenz des Testtons
const TON_HZ: f32 = 440.0;

// ---------------------------------------------------------------------------
// SyntheticCapture
// ---------------------------------------------------------------------------

struct CaptureInner {
    callback: Mutex<Option<FrameCallback>>,
    active: AtomicBool,
}

/// Handle auf einen synthetischen Capture-Stream (Clone teilt den Stream)
#[derive(Clone)]
pub struct SyntheticCapture {
    inner: Arc<CaptureInner>,
}

impl SyntheticCapture {
    fn new(callback: FrameCallback) -> Self {
        Self {
            inner: Arc::new(CaptureInner {
                callback: Mutex::new(Some(callback)),
                active: AtomicBool::new(true),
            }),
        }
    }

    /// Schiebt einen Frame durch den Capture-Callback (nur solange aktiv)
    pub fn push(&self, frame: &[f32]) {
        if !self.is_active() {
            return;
        }
        if let Some(callback) = self.inner.callback.lock().as_mut() {
            callback(frame);
        }
    }
}

impl CaptureStream for SyntheticCapture {
    fn stop(&mut self) {
        self.inner.active.store(false, Ordering::Relaxed);
        self.inner.callback.lock().take();
    }

    fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// SyntheticSink
// ---------------------------------------------------------------------------

struct SinkInner {
    label: String,
    geschrieben: AtomicUsize,
    stopped: AtomicBool,
}

/// Handle auf eine synthetische Playback-Senke (Clone teilt die Senke)
#[derive(Clone)]
pub struct SyntheticSink {
    inner: Arc<SinkInner>,
}

impl SyntheticSink {
    fn new(label: &str) -> Self {
        Self {
            inner: Arc::new(SinkInner {
                label: label.to_string(),
                geschrieben: AtomicUsize::new(0),
                stopped: AtomicBool::new(false),
            }),
        }
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Anzahl der bisher geschriebenen Samples
    pub fn geschriebene_samples(&self) -> usize {
        self.inner.geschrieben.load(Ordering::Relaxed)
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Relaxed)
    }
}

impl PlaybackSink for SyntheticSink {
    fn write(&mut self, samples: &[f32]) {
        if self.is_stopped() {
            return;
        }
        self.inner.geschrieben.fetch_add(samples.len(), Ordering::Relaxed);
    }

    fn stop(&mut self) {
        self.inner.stopped.store(true, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// SyntheticCapability
// ---------------------------------------------------------------------------

/// In-Process-Capability fuer Tests und Demo-Betrieb
pub struct SyntheticCapability {
    microphone: bool,
    verzoegerung: Option<Duration>,
    capture_fehler: Option<String>,
    playback_fehler: Option<String>,
    signal: Option<f32>,
    aufnahmen: Mutex<Vec<SyntheticCapture>>,
    senken: Mutex<Vec<SyntheticSink>>,
}

impl SyntheticCapability {
    /// Erstellt eine Capability mit oder ohne Mikrofon
    pub fn new(microphone: bool) -> Self {
        Self {
            microphone,
            verzoegerung: None,
            capture_fehler: None,
            playback_fehler: None,
            signal: None,
            aufnahmen: Mutex::new(Vec::new()),
            senken: Mutex::new(Vec::new()),
        }
    }

    /// Verzoegert jede Geraete-Anforderung (simuliert Berechtigungsdialog)
    pub fn mit_verzoegerung(mut self, verzoegerung: Duration) -> Self {
        self.verzoegerung = Some(verzoegerung);
        self
    }

    /// Laesst jedes Oeffnen eines Capture-Streams fehlschlagen
    pub fn mit_capture_fehler(mut self, grund: impl Into<String>) -> Self {
        self.capture_fehler = Some(grund.into());
        self
    }

    /// Laesst jedes Oeffnen einer Playback-Senke fehlschlagen
    pub fn mit_playback_fehler(mut self, grund: impl Into<String>) -> Self {
        self.playback_fehler = Some(grund.into());
        self
    }

    /// Capture-Streams erzeugen selbst einen Sinuston mit dieser Amplitude
    pub fn mit_signal(mut self, amplitude: f32) -> Self {
        self.signal = Some(amplitude);
        self
    }

    /// Aktive Capture-Streams, dazu der zuletzt geoeffnete. Gestoppte
    /// Streams werden beim naechsten Oeffnen verworfen.
    pub fn aufnahmen(&self) -> Vec<SyntheticCapture> {
        self.aufnahmen.lock().clone()
    }

    /// Zuletzt geoeffneter Capture-Stream
    pub fn letzte_aufnahme(&self) -> Option<SyntheticCapture> {
        self.aufnahmen.lock().last().cloned()
    }

    /// Offene Playback-Senken, dazu die zuletzt geoeffnete. Gestoppte
    /// Senken werden beim naechsten Oeffnen verworfen.
    pub fn senken(&self) -> Vec<SyntheticSink> {
        self.senken.lock().clone()
    }

    /// Zuletzt geoeffnete Senke mit diesem Label
    pub fn senke(&self, label: &str) -> Option<SyntheticSink> {
        self.senken
            .lock()
            .iter()
            .rev()
            .find(|s| s.label() == label)
            .cloned()
    }
}

#[async_trait]
impl AudioCapability for SyntheticCapability {
    fn has_microphone(&self) -> bool {
        self.microphone
    }

    async fn open_capture(&self, on_frame: FrameCallback) -> AudioResult<Box<dyn CaptureStream>> {
        if !self.microphone {
            return Err(AudioError::KeinStandardEingabegeraet);
        }
        if let Some(verzoegerung) = self.verzoegerung {
            tokio::time::sleep(verzoegerung).await;
        }
        if let Some(grund) = &self.capture_fehler {
            warn!(grund = %grund, "Synthetischer Capture-Fehler");
            return Err(AudioError::StreamFehler(grund.clone()));
        }

        let capture = SyntheticCapture::new(on_frame);
        {
            let mut aufnahmen = self.aufnahmen.lock();
            aufnahmen.retain(|a| a.is_active());
            aufnahmen.push(capture.clone());
        }

        if let Some(amplitude) = self.signal {
            signal_generator_starten(capture.clone(), amplitude)?;
        }

        debug!("Synthetischer Capture-Stream geoeffnet");
        Ok(Box::new(capture))
    }

    fn open_playback(&self, label: &str) -> AudioResult<Box<dyn PlaybackSink>> {
        if let Some(grund) = &self.playback_fehler {
            return Err(AudioError::StreamFehler(grund.clone()));
        }
        let sink = SyntheticSink::new(label);
        {
            let mut senken = self.senken.lock();
            senken.retain(|s| !s.is_stopped());
            senken.push(sink.clone());
        }
        debug!(label, "Synthetische Playback-Senke geoeffnet");
        Ok(Box::new(sink))
    }
}

/// Erzeugt alle 20ms einen Sinus-Frame bis der Capture-Stream gestoppt wird
fn signal_generator_starten(capture: SyntheticCapture, amplitude: f32) -> AudioResult<()> {
    std::thread::Builder::new()
        .name("huddle-signal".to_string())
        .spawn(move || {
            let mut position: usize = 0;
            let mut frame = vec![0.0f32; FRAME_SIZE];
            while capture.is_active() {
                for (i, s) in frame.iter_mut().enumerate() {
                    let t = (position + i) as f32 / SAMPLE_RATE;
                    *s = amplitude * (2.0 * std::f32::consts::PI * TON_HZ * t).sin();
                }
                position = (position + FRAME_SIZE) % SAMPLE_RATE as usize;
                capture.push(&frame);
                std::thread::sleep(Duration::from_millis(20));
            }
            debug!("Signalgenerator beendet");
        })?;
    Ok(())
}
