//! System microphone capture via CPAL.
//!
//! Handles device enumeration and sample format conversion. The device is
//! opened at the configured sample rate; incoming audio is downmixed to mono
//! `i16` and cut into exact frames on cpal's callback thread.

use super::dispatch::{f32_to_i16, frames_spanned, u16_to_i16, FrameDispatcher};
use super::source::{AudioSource, CaptureError};
use crate::config::StreamConfig;
use crate::log_debug;
use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig as DeviceStreamConfig};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Audio input device wrapper.
pub struct Recorder {
    device: cpal::Device,
}

impl Recorder {
    /// List microphone names so the CLI can expose a human-friendly selector.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host.input_devices().context("no input devices available")?;
        let mut names = Vec::new();
        for device in devices {
            if let Ok(name) = device.name() {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Create a recorder, optionally forcing a specific device by name.
    pub fn new(preferred_device: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();
        let device = match preferred_device {
            Some(name) => {
                let mut devices = host.input_devices().context("no input devices available")?;
                devices
                    .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                    .ok_or_else(|| anyhow!("input device '{name}' not found"))?
            }
            None => host
                .default_input_device()
                .context("no default input device available")?,
        };
        Ok(Self { device })
    }

    pub fn device_name(&self) -> String {
        self.device
            .name()
            .unwrap_or_else(|_| "Unknown Device".to_string())
    }

    /// Start streaming from the device and return a frame-at-a-time source.
    pub fn open(&self, cfg: &StreamConfig) -> Result<MicSource> {
        let default_config = self.device.default_input_config()?;
        let format = default_config.sample_format();
        let channels = default_config.channels().max(1);
        let device_config = DeviceStreamConfig {
            channels,
            sample_rate: SampleRate(cfg.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        let channels = usize::from(channels);
        let frame_samples = cfg.frame_samples;
        let device_name = self.device_name();

        log_debug(&format!(
            "Recorder config: device='{device_name}' format={format:?} sample_rate={}Hz channels={channels} frame_samples={}",
            cfg.sample_rate, cfg.frame_samples
        ));

        let (sender, receiver) = bounded::<Vec<i16>>(cfg.channel_capacity.max(1));
        let dropped = Arc::new(AtomicUsize::new(0));
        let dispatcher = Arc::new(Mutex::new(FrameDispatcher::new(
            cfg.frame_samples,
            sender,
            dropped.clone(),
        )));

        let err_fn = |err| log_debug(&format!("audio_stream_error: {err}"));
        let stream = match format {
            SampleFormat::F32 => {
                let dispatcher = dispatcher.clone();
                let dropped = dropped.clone();
                self.device.build_input_stream(
                    &device_config,
                    move |data: &[f32], _| {
                        if let Ok(mut pump) = dispatcher.try_lock() {
                            pump.push(data, channels, f32_to_i16);
                        } else {
                            let lost = frames_spanned(data.len(), channels, frame_samples);
                            dropped.fetch_add(lost, Ordering::Relaxed);
                        }
                    },
                    err_fn,
                    None,
                )
            }
            SampleFormat::I16 => {
                let dispatcher = dispatcher.clone();
                let dropped = dropped.clone();
                self.device.build_input_stream(
                    &device_config,
                    move |data: &[i16], _| {
                        if let Ok(mut pump) = dispatcher.try_lock() {
                            pump.push(data, channels, |sample| sample);
                        } else {
                            let lost = frames_spanned(data.len(), channels, frame_samples);
                            dropped.fetch_add(lost, Ordering::Relaxed);
                        }
                    },
                    err_fn,
                    None,
                )
            }
            SampleFormat::U16 => {
                let dispatcher = dispatcher.clone();
                let dropped = dropped.clone();
                self.device.build_input_stream(
                    &device_config,
                    move |data: &[u16], _| {
                        if let Ok(mut pump) = dispatcher.try_lock() {
                            pump.push(data, channels, u16_to_i16);
                        } else {
                            let lost = frames_spanned(data.len(), channels, frame_samples);
                            dropped.fetch_add(lost, Ordering::Relaxed);
                        }
                    },
                    err_fn,
                    None,
                )
            }
            other => return Err(anyhow!("unsupported sample format: {other:?}")),
        }
        .with_context(|| {
            format!(
                "failed to open '{device_name}' at {} Hz; the device must support this rate. {}",
                cfg.sample_rate,
                mic_permission_hint()
            )
        })?;

        stream.play()?;

        Ok(MicSource {
            _stream: stream,
            receiver,
            dropped,
            timeout: Duration::from_millis(cfg.capture_timeout_ms),
            label: format!("mic:{device_name}"),
        })
    }
}

fn mic_permission_hint() -> &'static str {
    #[cfg(target_os = "macos")]
    {
        "macOS: System Settings > Privacy & Security > Microphone (enable your terminal)."
    }
    #[cfg(target_os = "linux")]
    {
        "Linux: check PipeWire/PulseAudio permissions and ensure the device is not muted."
    }
    #[cfg(target_os = "windows")]
    {
        "Windows: Settings > Privacy & Security > Microphone (allow access for your terminal)."
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        "Check OS microphone permissions."
    }
}

/// Live microphone source. Keeps the cpal stream alive for as long as it exists.
pub struct MicSource {
    _stream: cpal::Stream,
    receiver: Receiver<Vec<i16>>,
    dropped: Arc<AtomicUsize>,
    timeout: Duration,
    label: String,
}

impl AudioSource for MicSource {
    fn read(&mut self, buf: &mut [i16]) -> Result<usize, CaptureError> {
        match self.receiver.recv_timeout(self.timeout) {
            Ok(frame) => {
                if frame.len() != buf.len() {
                    return Err(CaptureError::ShortRead {
                        expected: buf.len(),
                        got: frame.len(),
                    });
                }
                buf.copy_from_slice(&frame);
                Ok(buf.len())
            }
            Err(RecvTimeoutError::Timeout) => Err(CaptureError::Timeout {
                waited_ms: self.timeout.as_millis() as u64,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(CaptureError::Disconnected),
        }
    }

    fn name(&self) -> &str {
        &self.label
    }

    /// Frames discarded because the capture loop fell behind the device.
    fn frames_dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed) as u64
    }
}
