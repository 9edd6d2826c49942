//! Mikrofon-Capture via cpal
//!
//! cpal::Stream ist !Send. Der Stream lebt deshalb in einem eigenen
//! std::thread, der die Samples aus einem lock-free Ring-Buffer liest und
//! an den FrameCallback der Audio-Kette weiterreicht.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, trace};

use super::device;
use super::NativeConfig;
use crate::capability::{CaptureStream, FrameCallback};
use crate::error::{AudioError, AudioResult};

/// Capture-Stream eines nativen Eingabegeraets
pub struct NativeCaptureStream {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CaptureStream for NativeCaptureStream {
    fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
            debug!("Capture-Thread beendet");
        }
    }

    fn is_active(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

impl Drop for NativeCaptureStream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Startet den Capture-Thread und wartet bis das Geraet geoeffnet ist
pub(crate) async fn open(
    config: NativeConfig,
    mut on_frame: FrameCallback,
) -> AudioResult<NativeCaptureStream> {
    let running = Arc::new(AtomicBool::new(true));
    let thread_running = Arc::clone(&running);
    let (bereit_tx, bereit_rx) = oneshot::channel::<AudioResult<()>>();

    let thread = std::thread::Builder::new()
        .name("huddle-capture".to_string())
        .spawn(move || {
            let geoeffnet = device::default_input()
                .and_then(|device| open_input_stream(&device, &config));
            let (_stream, mut consumer) = match geoeffnet {
                Ok(offen) => {
                    let _ = bereit_tx.send(Ok(()));
                    offen
                }
                Err(e) => {
                    thread_running.store(false, Ordering::Relaxed);
                    let _ = bereit_tx.send(Err(e));
                    return;
                }
            };

            let mut buf = vec![0.0f32; config.frame_size];
            while thread_running.load(Ordering::Relaxed) {
                let gelesen = consumer.pop_slice(&mut buf);
                if gelesen == 0 {
                    std::thread::sleep(Duration::from_millis(5));
                    continue;
                }
                on_frame(&buf[..gelesen]);
            }
            // _stream wird hier gedroppt und gibt das Geraet frei
        })?;

    let mut stream = NativeCaptureStream {
        running,
        thread: Some(thread),
    };

    match bereit_rx.await {
        Ok(Ok(())) => Ok(stream),
        Ok(Err(e)) => {
            stream.stop();
            Err(e)
        }
        Err(_) => {
            stream.stop();
            Err(AudioError::StreamFehler(
                "Capture-Thread vorzeitig beendet".to_string(),
            ))
        }
    }
}

/// Oeffnet einen cpal InputStream, der in einen Ring-Buffer schreibt
fn open_input_stream(device: &Device, config: &NativeConfig) -> AudioResult<(Stream, HeapCons<f32>)> {
    let stream_config = StreamConfig {
        channels: 1,
        sample_rate: cpal::SampleRate(config.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let (mut producer, consumer) = HeapRb::<f32>::new(config.buffer_size).split();
    let err_fn = |err| error!("Capture-Fehler: {}", err);

    let sample_format = device
        .supported_input_configs()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?
        .find(|c| {
            c.min_sample_rate().0 <= config.sample_rate && c.max_sample_rate().0 >= config.sample_rate
        })
        .map(|c| c.sample_format())
        .unwrap_or(SampleFormat::F32);

    let stream = match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _| {
                let written = producer.push_slice(data);
                if written < data.len() {
                    trace!("Capture Ring-Buffer voll, {} Samples verworfen", data.len() - written);
                }
            },
            err_fn,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            &stream_config,
            move |data: &[i16], _| {
                let floats: Vec<f32> = data.iter().map(|&s| s as f32 / i16::MAX as f32).collect();
                producer.push_slice(&floats);
            },
            err_fn,
            None,
        ),
        andere => {
            return Err(AudioError::StreamFehler(format!(
                "Nicht unterstuetztes Sample-Format: {:?}",
                andere
            )))
        }
    }
    .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

    stream
        .play()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

    debug!(
        geraet = %device::geraetename(device),
        "Capture-Stream geoeffnet: {}Hz",
        config.sample_rate
    );

    Ok((stream, consumer))
}
