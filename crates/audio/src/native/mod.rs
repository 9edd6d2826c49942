//! Native Audio-Geraete via cpal (Feature `cpal-backend`)

pub mod capture;
pub mod device;
pub mod playback;

use async_trait::async_trait;
use tracing::info;

use crate::capability::{AudioCapability, CaptureStream, FrameCallback, PlaybackSink};
use crate::error::AudioResult;

/// Parameter der nativen Streams
#[derive(Debug, Clone)]
pub struct NativeConfig {
    /// Abtastrate in Hz
    pub sample_rate: u32,
    /// Kapazitaet der Ring-Buffer in Samples
    pub buffer_size: usize,
    /// Groesse der an die Audio-Kette gereichten Frames
    pub frame_size: usize,
}

impl Default for NativeConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            // 2 Sekunden Puffer
            buffer_size: 96_000,
            // 20ms bei 48kHz
            frame_size: 960,
        }
    }
}

/// Capability auf den Standardgeraeten des Hosts
pub struct CpalCapability {
    config: NativeConfig,
    microphone: bool,
}

impl CpalCapability {
    /// Prueft einmalig ob ein Eingabegeraet vorhanden ist
    pub fn new(config: NativeConfig) -> Self {
        let microphone = device::input_device_count() > 0 || device::default_input().is_ok();
        info!(microphone, sample_rate = config.sample_rate, "cpal-Backend initialisiert");
        Self { config, microphone }
    }
}

impl Default for CpalCapability {
    fn default() -> Self {
        Self::new(NativeConfig::default())
    }
}

#[async_trait]
impl AudioCapability for CpalCapability {
    fn has_microphone(&self) -> bool {
        self.microphone
    }

    async fn open_capture(&self, on_frame: FrameCallback) -> AudioResult<Box<dyn CaptureStream>> {
        let stream = capture::open(self.config.clone(), on_frame).await?;
        Ok(Box::new(stream))
    }

    fn open_playback(&self, label: &str) -> AudioResult<Box<dyn PlaybackSink>> {
        let sink = playback::open(self.config.clone(), label)?;
        Ok(Box::new(sink))
    }
}
