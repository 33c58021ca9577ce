//! Audio output boundary.
//!
//! Voices see the device only through [`AudioDevice`] and [`OutputStream`]:
//! open a mono stream, write blocks to it (blocking), drop it to close.
//! [`CpalDevice`] is the real backend.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    OutputCallbackInfo, SampleFormat, SampleRate, StreamConfig,
};
use rtrb::{Consumer, Producer, RingBuffer};

use crate::error::DeviceError;

/// Something that can open output streams.
///
/// Shared by every voice thread, hence `Send + Sync`.
pub trait AudioDevice: Send + Sync {
    fn open_stream(
        &self,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Box<dyn OutputStream>, DeviceError>;
}

/// An open output stream. Dropping it closes the stream.
pub trait OutputStream {
    /// Queue `samples` for playback, blocking until the device has room for
    /// all of them.
    fn write(&mut self, samples: &[f32]) -> Result<(), DeviceError>;
}

/*
Blocking Writes on a Callback API
=================================

cpal pulls audio: the driver thread calls our closure whenever it wants more
frames. Voices push audio: they generate a block and write it. A wait-free
ring buffer joins the two.

    voice thread                       cpal callback
    ------------                       -------------
    generate block
    write ──► [ Producer | ring | Consumer ] ──► pop per frame
         ▲                                        (silence if empty)
         └── sleeps while the ring is full

The ring holds `buffer` worth of audio. Once it is full the voice thread can
only continue as fast as the callback drains it, which paces generation to
playback speed without any clock of our own.

If the callback stops running (device unplugged, driver stall) the ring never
drains; the write gives up after `write_timeout` instead of hanging the voice
forever.
*/

/// cpal-backed [`AudioDevice`].
///
/// The device is looked up on every open, so a voice started after the
/// default output changes plays on the new one.
#[derive(Debug, Clone)]
pub struct CpalDevice {
    device_name: Option<String>,
    /// Audio queued between a voice and the driver.
    buffer: Duration,
}

impl CpalDevice {
    pub fn default_output() -> Self {
        Self {
            device_name: None,
            buffer: Duration::from_millis(200),
        }
    }

    /// Use the output device whose name is `name`.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            device_name: Some(name.into()),
            ..Self::default_output()
        }
    }

    /// Set how much audio may be queued ahead of playback.
    pub fn buffer(mut self, buffer: Duration) -> Self {
        self.buffer = buffer;
        self
    }

    fn resolve(&self) -> Result<cpal::Device, DeviceError> {
        let host = cpal::default_host();
        match &self.device_name {
            None => host
                .default_output_device()
                .ok_or(DeviceError::NoOutputDevice),
            Some(wanted) => {
                for device in host.output_devices()? {
                    if device.name().is_ok_and(|name| &name == wanted) {
                        return Ok(device);
                    }
                }
                Err(DeviceError::DeviceNotFound(wanted.clone()))
            }
        }
    }

    /// Name and default sample rate of the resolved device.
    pub fn describe(&self) -> Result<(String, u32), DeviceError> {
        let device = self.resolve()?;
        let name = device.name()?;
        let config = device.default_output_config()?;
        Ok((name, config.sample_rate().0))
    }

    /// Pick an f32 config at `sample_rate`, preferring `channels` and
    /// otherwise the fewest channels available.
    fn choose_config(
        device: &cpal::Device,
        sample_rate: u32,
        channels: u16,
    ) -> Result<StreamConfig, DeviceError> {
        let best = device
            .supported_output_configs()?
            .filter(|range| range.sample_format() == SampleFormat::F32)
            .filter(|range| {
                range.min_sample_rate().0 <= sample_rate && sample_rate <= range.max_sample_rate().0
            })
            .min_by_key(|range| (range.channels() != channels, range.channels()))
            .ok_or(DeviceError::UnsupportedConfig { sample_rate })?;

        Ok(best.with_sample_rate(SampleRate(sample_rate)).config())
    }
}

impl Default for CpalDevice {
    fn default() -> Self {
        Self::default_output()
    }
}

impl AudioDevice for CpalDevice {
    fn open_stream(
        &self,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Box<dyn OutputStream>, DeviceError> {
        let device = self.resolve()?;
        let config = Self::choose_config(&device, sample_rate, channels)?;
        let device_channels = config.channels as usize;

        let capacity = ((sample_rate as f64 * self.buffer.as_secs_f64()) as usize).max(1);
        let (producer, mut consumer): (Producer<f32>, Consumer<f32>) = RingBuffer::new(capacity);

        let failure: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let underruns = Arc::new(AtomicUsize::new(0));

        let stream = {
            let failure = Arc::clone(&failure);
            let underruns = Arc::clone(&underruns);
            device.build_output_stream(
                &config,
                move |data: &mut [f32], _: &OutputCallbackInfo| {
                    let mut starved = false;
                    // Mono source copied to every device channel
                    for frame in data.chunks_mut(device_channels) {
                        let sample = match consumer.pop() {
                            Ok(sample) => sample,
                            Err(_) => {
                                starved = true;
                                0.0
                            }
                        };
                        frame.fill(sample);
                    }
                    if starved {
                        underruns.fetch_add(1, Ordering::Relaxed);
                    }
                },
                move |err| {
                    log::error!("audio stream error: {err}");
                    if let Ok(mut slot) = failure.lock() {
                        slot.get_or_insert_with(|| err.to_string());
                    }
                },
                None,
            )?
        };
        stream.play()?;

        log::debug!(
            "opened stream: {} Hz, {} channel(s), {} sample buffer",
            config.sample_rate.0,
            config.channels,
            capacity
        );

        Ok(Box::new(CpalStream {
            _stream: stream,
            writer: RingWriter {
                producer,
                failure,
                write_timeout: self.buffer * 2,
                wait: (self.buffer / 16).max(Duration::from_millis(1)),
            },
            underruns,
        }))
    }
}

struct CpalStream {
    _stream: cpal::Stream,
    writer: RingWriter,
    underruns: Arc<AtomicUsize>,
}

impl OutputStream for CpalStream {
    fn write(&mut self, samples: &[f32]) -> Result<(), DeviceError> {
        self.writer.write(samples)
    }
}

/// Producer side of the ring: pushes whole blocks, waiting for the consumer.
struct RingWriter {
    producer: Producer<f32>,
    /// Set by the stream's error callback.
    failure: Arc<Mutex<Option<String>>>,
    write_timeout: Duration,
    wait: Duration,
}

impl RingWriter {
    fn check_failed(&self) -> Result<(), DeviceError> {
        let failed = self.failure.lock().ok().and_then(|slot| slot.clone());
        match failed {
            Some(reason) => Err(DeviceError::StreamFailed(reason)),
            None => Ok(()),
        }
    }

    /// Push all of `samples`, in as many chunks as the free space allows.
    fn write(&mut self, samples: &[f32]) -> Result<(), DeviceError> {
        let mut remaining = samples;
        let mut last_progress = Instant::now();

        while !remaining.is_empty() {
            self.check_failed()?;

            let n = self.producer.slots().min(remaining.len());
            if n == 0 {
                if last_progress.elapsed() > self.write_timeout {
                    return Err(DeviceError::WriteTimeout(self.write_timeout));
                }
                thread::sleep(self.wait);
                continue;
            }

            if let Ok(chunk) = self.producer.write_chunk_uninit(n) {
                let written = chunk.fill_from_iter(remaining[..n].iter().copied());
                remaining = &remaining[written..];
                last_progress = Instant::now();
            }
        }

        Ok(())
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        let underruns = self.underruns.load(Ordering::Relaxed);
        if underruns > 0 {
            log::debug!("stream closed after {underruns} underrun callback(s)");
        }
    }
}

/// Names of every output device on the default host.
pub fn list_output_devices() -> Result<Vec<String>, DeviceError> {
    let host = cpal::default_host();
    let mut names = Vec::new();
    for device in host.output_devices()? {
        names.push(device.name()?);
    }
    Ok(names)
}
