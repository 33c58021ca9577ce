use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::{
    config::EngineConfig,
    dsp::tone::{block_len, ToneParams},
    error::{DeviceError, VoiceError},
    io::audio::AudioDevice,
};

/*
Voice Lifecycle
===============

Each held key gets its own thread. The thread owns the output stream and the
phase accumulator; the dispatcher only holds a `VoiceHandle`, which can flip
the shared running flag and wait for the exit report.

    dispatcher                          voice thread
    ----------                          ------------
    VoiceHandle::start ──spawn──►       open stream
          (returns at once)             loop while running:
                                            fill block (phase carried over)
                                            write block   (blocks: backpressure)
    request_stop ──running = false──►   loop observes flag at top, exits
                                        stream dropped (closed)
    wait_exit ◄────── exit ────────────  report sent, thread ends

Opening the stream happens on the voice thread, so the dispatcher never waits
on the device. A stream that fails to open ends the thread with an error,
which the dispatcher picks up on a later cycle like any other exit.

Stopping is cooperative: a write already in flight finishes, so on a healthy
device a voice outlives its stop request by at most one block. Every exit path drops the
stream, including a failed write.
*/

/// Per-voice parameters taken from [`EngineConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceSettings {
    pub sample_rate: u32,
    pub block_duration: Duration,
    pub amplitude: f32,
}

impl From<&EngineConfig> for VoiceSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            block_duration: config.block_duration,
            amplitude: config.amplitude,
        }
    }
}

/// What a voice did before it stopped cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceReport {
    pub key: char,
    pub blocks_written: u64,
}

/// How a voice thread ended.
pub type VoiceExit = Result<VoiceReport, DeviceError>;

/// The streaming half, owned by the voice thread.
struct Voice {
    key: char,
    params: ToneParams,
    running: Arc<AtomicBool>,
    /// Phase for the next block, in radians.
    phase: f64,
    block: Vec<f32>,
}

impl Voice {
    fn run(mut self, device: Arc<dyn AudioDevice>, exit_tx: Sender<VoiceExit>) {
        let exit = self.stream_until_stopped(device.as_ref());
        self.running.store(false, Ordering::Release);
        // The handle may already be gone; nothing left to tell.
        let _ = exit_tx.send(exit);
    }

    fn stream_until_stopped(&mut self, device: &dyn AudioDevice) -> VoiceExit {
        let mut stream = device.open_stream(self.params.sample_rate(), 1)?;
        log::trace!("voice {:?}: stream open", self.key);

        let mut blocks_written = 0;
        while self.running.load(Ordering::Acquire) {
            self.phase = self.params.fill(self.phase, &mut self.block);
            stream.write(&self.block)?;
            blocks_written += 1;
        }

        Ok(VoiceReport {
            key: self.key,
            blocks_written,
        })
    }
}

/// The dispatcher's side of a running voice.
pub struct VoiceHandle {
    key: char,
    pitch: f64,
    running: Arc<AtomicBool>,
    exit_rx: Receiver<VoiceExit>,
    thread: Option<JoinHandle<()>>,
}

impl VoiceHandle {
    /// Spawn a voice thread for `key`. Returns as soon as the thread exists.
    ///
    /// Only parameter and thread-spawn errors surface here. A stream that
    /// fails to open ends the voice, and the error comes back from
    /// [`VoiceHandle::wait_exit`].
    pub fn start(
        key: char,
        pitch: f64,
        settings: &VoiceSettings,
        device: Arc<dyn AudioDevice>,
    ) -> Result<Self, VoiceError> {
        let params = ToneParams::new(pitch, settings.sample_rate, settings.amplitude)?;
        let block = vec![
            0.0f32;
            block_len(settings.sample_rate, settings.block_duration.as_secs_f64())
        ];

        let running = Arc::new(AtomicBool::new(true));
        let (exit_tx, exit_rx) = crossbeam_channel::bounded(1);

        let voice = Voice {
            key,
            params,
            running: Arc::clone(&running),
            phase: 0.0,
            block,
        };
        let thread = thread::Builder::new()
            .name(format!("voice-{key}"))
            .spawn(move || voice.run(device, exit_tx))?;

        Ok(Self {
            key,
            pitch,
            running,
            exit_rx,
            thread: Some(thread),
        })
    }

    pub fn key(&self) -> char {
        self.key
    }

    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    /// False once a stop was requested or the voice thread has finished.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Ask the voice to finish its current block and exit. Idempotent.
    pub fn request_stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Wait up to `timeout` for the voice thread to exit.
    ///
    /// Returns `None` if it is still running. Once this returns `Some` the
    /// thread has been joined.
    pub fn wait_exit(&mut self, timeout: Duration) -> Option<VoiceExit> {
        let exit = match self.exit_rx.recv_timeout(timeout) {
            Ok(exit) => exit,
            Err(RecvTimeoutError::Timeout) => return None,
            Err(RecvTimeoutError::Disconnected) => Err(DeviceError::StreamFailed(
                "voice thread ended without reporting".into(),
            )),
        };
        self.join();
        Some(exit)
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("voice {:?}: thread panicked", self.key);
            }
        }
    }
}

impl Drop for VoiceHandle {
    fn drop(&mut self) {
        // A handle dropped without being reaped leaves the thread detached;
        // make sure it still winds down.
        if self.thread.is_some() {
            self.request_stop();
        }
    }
}
