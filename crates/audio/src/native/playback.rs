//! Audio-Playback via cpal
//!
//! Pro entferntem Teilnehmer ein OutputStream. Der Stream lebt in einem
//! eigenen Thread (cpal::Stream ist !Send), die Senke selbst haelt nur den
//! Producer-Teil des Ring-Buffers und ist damit Send.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, trace};

use super::device;
use super::NativeConfig;
use crate::capability::PlaybackSink;
use crate::error::{AudioError, AudioResult};

/// Wiedergabe-Senke auf dem Standard-Ausgabegeraet
pub struct NativePlaybackSink {
    producer: HeapProd<f32>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl PlaybackSink for NativePlaybackSink {
    fn write(&mut self, samples: &[f32]) {
        if !self.running.load(Ordering::Relaxed) {
            return;
        }
        let written = self.producer.push_slice(samples);
        if written < samples.len() {
            trace!("Playback Ring-Buffer voll: {} von {} Samples", written, samples.len());
        }
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
            debug!("Playback-Thread beendet");
        }
    }
}

impl Drop for NativePlaybackSink {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Startet einen Playback-Thread und gibt die Senke zurueck
pub(crate) fn open(config: NativeConfig, label: &str) -> AudioResult<NativePlaybackSink> {
    let running = Arc::new(AtomicBool::new(true));
    let thread_running = Arc::clone(&running);

    // Der Producer wird im Thread erzeugt und per Kanal zurueckgegeben
    let (producer_tx, producer_rx) = std::sync::mpsc::sync_channel::<AudioResult<HeapProd<f32>>>(1);

    let thread = std::thread::Builder::new()
        .name(format!("huddle-playback-{label}"))
        .spawn(move || {
            let geoeffnet = device::default_output()
                .and_then(|device| open_output_stream(&device, &config));
            let _stream = match geoeffnet {
                Ok((stream, producer)) => {
                    if producer_tx.send(Ok(producer)).is_err() {
                        return;
                    }
                    stream
                }
                Err(e) => {
                    let _ = producer_tx.send(Err(e));
                    return;
                }
            };

            while thread_running.load(Ordering::Relaxed) {
                std::thread::sleep(Duration::from_millis(20));
            }
        })?;

    let producer = producer_rx
        .recv()
        .map_err(|_| AudioError::StreamFehler("Playback-Thread vorzeitig beendet".to_string()))
        .and_then(|ergebnis| ergebnis);

    match producer {
        Ok(producer) => Ok(NativePlaybackSink {
            producer,
            running,
            thread: Some(thread),
        }),
        Err(e) => {
            running.store(false, Ordering::Relaxed);
            let _ = thread.join();
            Err(e)
        }
    }
}

/// Oeffnet einen cpal OutputStream, der aus einem Ring-Buffer liest
fn open_output_stream(device: &Device, config: &NativeConfig) -> AudioResult<(Stream, HeapProd<f32>)> {
    let stream_config = StreamConfig {
        channels: 1,
        sample_rate: cpal::SampleRate(config.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let (producer, mut consumer) = HeapRb::<f32>::new(config.buffer_size).split();
    let err_fn = |err| error!("Playback-Fehler: {}", err);

    let sample_format = device
        .supported_output_configs()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?
        .find(|c| {
            c.min_sample_rate().0 <= config.sample_rate && c.max_sample_rate().0 >= config.sample_rate
        })
        .map(|c| c.sample_format())
        .unwrap_or(SampleFormat::F32);

    let stream = match sample_format {
        SampleFormat::F32 => device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _| {
                let read = consumer.pop_slice(data);
                // Stille fuer fehlende Samples
                data[read..].fill(0.0);
            },
            err_fn,
            None,
        ),
        SampleFormat::I16 => device.build_output_stream(
            &stream_config,
            move |data: &mut [i16], _| {
                let mut float_buf = vec![0.0f32; data.len()];
                consumer.pop_slice(&mut float_buf);
                for (out, s) in data.iter_mut().zip(float_buf.iter()) {
                    *out = (*s * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
                }
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
        "Playback-Stream geoeffnet: {}Hz",
        config.sample_rate
    );

    Ok((stream, producer))
}
