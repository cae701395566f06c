//! Microphone audio capture using cpal.
//!
//! Captures audio at the device's native sample rate and downsamples
//! to 16kHz mono for the speech processing pipeline.
//!
//! The cpal stream lives on a dedicated thread so the returned handle is
//! `Send`; dropping the handle stops that thread and joins it.

use std::thread::JoinHandle;
use std::time::Duration;

use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, info};

use super::{AudioSource, AudioStream};
use crate::config::AudioConfig;
use crate::error::{AssistantError, Result};
use crate::pipeline::messages::AudioChunk;

/// Chunks buffered between the audio callback and the consumer.
const CHUNK_QUEUE_DEPTH: usize = 256;

/// Audio capture from the system microphone via cpal.
#[derive(Debug, Clone)]
pub struct CpalMicrophone {
    config: AudioConfig,
}

impl CpalMicrophone {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// List available input devices.
    ///
    /// # Errors
    ///
    /// Returns an error if devices cannot be enumerated.
    pub fn list_input_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|e| AssistantError::Audio(format!("cannot enumerate devices: {e}")))?;

        let mut names = Vec::new();
        for device in devices {
            if let Ok(desc) = device.description() {
                names.push(desc.name().to_owned());
            }
        }
        Ok(names)
    }
}

impl AudioSource for CpalMicrophone {
    fn open(&self) -> Result<Box<dyn AudioStream>> {
        let (chunk_tx, chunk_rx) = crossbeam_channel::bounded(CHUNK_QUEUE_DEPTH);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<()>>(1);
        let config = self.config.clone();

        let thread = std::thread::Builder::new()
            .name("atlas-mic".into())
            .spawn(move || {
                let stream = match build_stream(&config, chunk_tx) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                // Blocks until the handle drops its sender.
                let _ = stop_rx.recv();
                drop(stream);
                debug!("microphone stream closed");
            })
            .map_err(|e| AssistantError::Audio(format!("cannot spawn capture thread: {e}")))?;

        let started = ready_rx
            .recv()
            .map_err(|_| AssistantError::Audio("capture thread exited during startup".into()))
            .and_then(|r| r);
        if let Err(e) = started {
            let _ = thread.join();
            return Err(e);
        }

        Ok(Box::new(CpalStream {
            chunks: chunk_rx,
            stop: Some(stop_tx),
            thread: Some(thread),
        }))
    }
}

/// Handle to a running cpal input stream.
struct CpalStream {
    chunks: Receiver<AudioChunk>,
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl AudioStream for CpalStream {
    fn next_chunk(&mut self, timeout: Duration) -> Result<Option<AudioChunk>> {
        match self.chunks.recv_timeout(timeout) {
            Ok(chunk) => Ok(Some(chunk)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(AssistantError::Audio("microphone stream ended".into()))
            }
        }
    }

    fn drain(&mut self) {
        while self.chunks.try_recv().is_ok() {}
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        self.stop.take();
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            error!("capture thread panicked");
        }
    }
}

fn build_stream(config: &AudioConfig, tx: Sender<AudioChunk>) -> Result<cpal::Stream> {
    let host = cpal::default_host();

    let device = if let Some(ref name) = config.input_device {
        host.input_devices()
            .map_err(|e| AssistantError::Audio(format!("cannot enumerate devices: {e}")))?
            .find(|d| {
                d.description()
                    .ok()
                    .map(|desc| desc.name() == name)
                    .unwrap_or(false)
            })
            .ok_or_else(|| AssistantError::Audio(format!("input device '{name}' not found")))?
    } else {
        host.default_input_device()
            .ok_or_else(|| AssistantError::Audio("no default input device".into()))?
    };

    let device_name = device
        .description()
        .map(|d| d.name().to_owned())
        .unwrap_or_else(|_| "<unknown>".into());

    let default_config = device
        .default_input_config()
        .map_err(|e| AssistantError::Audio(format!("no default input config: {e}")))?;

    let native_rate = default_config.sample_rate();
    let native_channels = default_config.channels();
    let target_rate = config.input_sample_rate;

    let stream_config = StreamConfig {
        channels: native_channels,
        sample_rate: native_rate,
        buffer_size: cpal::BufferSize::Default,
    };

    let stream = device
        .build_input_stream(
            &stream_config,
            move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                let mono = if native_channels > 1 {
                    to_mono(data, native_channels)
                } else {
                    data.to_vec()
                };
                let samples = if native_rate != target_rate {
                    downsample(&mono, native_rate, target_rate)
                } else {
                    mono
                };
                // Never block the audio thread.
                if tx.try_send(AudioChunk::new(samples, target_rate)).is_err() {
                    debug!("audio channel full, dropping chunk");
                }
            },
            move |err| {
                error!("audio input stream error: {err}");
            },
            None,
        )
        .map_err(|e| AssistantError::Audio(format!("failed to build input stream: {e}")))?;

    stream
        .play()
        .map_err(|e| AssistantError::Audio(format!("failed to start input stream: {e}")))?;

    info!(
        "microphone '{device_name}' open: native {}Hz x{} -> {}Hz mono",
        native_rate, native_channels, target_rate
    );
    Ok(stream)
}

/// Convert interleaved multi-channel audio to mono by averaging channels.
fn to_mono(data: &[f32], channels: u16) -> Vec<f32> {
    let ch = usize::from(channels);
    data.chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

/// Linear-interpolation resampler from `src_rate` to `dst_rate`.
fn downsample(samples: &[f32], src_rate: u32, dst_rate: u32) -> Vec<f32> {
    if src_rate == dst_rate || samples.is_empty() || dst_rate == 0 {
        return samples.to_vec();
    }

    let ratio = f64::from(src_rate) / f64::from(dst_rate);
    let out_len = (samples.len() as f64 / ratio) as usize;
    let mut output = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let src_pos = i as f64 * ratio;
        let idx = src_pos as usize;
        let frac = src_pos - idx as f64;

        let sample = if idx + 1 < samples.len() {
            f64::from(samples[idx]) * (1.0 - frac) + f64::from(samples[idx + 1]) * frac
        } else {
            f64::from(samples[idx.min(samples.len() - 1)])
        };
        output.push(sample as f32);
    }

    output
}
