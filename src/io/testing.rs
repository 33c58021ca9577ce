//! In-memory audio device for tests.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

use super::audio::{AudioDevice, OutputStream};
use crate::error::DeviceError;

#[derive(Default)]
struct MockState {
    opens: AtomicUsize,
    closes: AtomicUsize,
    writes: AtomicUsize,
    fail_opens: AtomicBool,
    fail_writes: AtomicBool,
    open_delay: Mutex<Duration>,
    /// Everything written, one entry per opened stream.
    streams: Mutex<Vec<Arc<Mutex<Vec<f32>>>>>,
}

/// Counts opens, writes and closes, and records every sample written.
///
/// Writes sleep for the duration of the audio they carry, like a device
/// consuming at its sample rate.
#[derive(Clone, Default)]
pub struct MockDevice {
    state: Arc<MockState>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_opens(&self, fail: bool) {
        self.state.fail_opens.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every open take `delay` before it succeeds or fails.
    pub fn open_delay(&self, delay: Duration) {
        *self.state.open_delay.lock().unwrap() = delay;
    }

    pub fn opens(&self) -> usize {
        self.state.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.state.writes.load(Ordering::SeqCst)
    }

    /// Samples written to the `index`th stream opened.
    pub fn recorded(&self, index: usize) -> Vec<f32> {
        let streams = self.state.streams.lock().unwrap();
        let recorded = streams[index].lock().unwrap().clone();
        recorded
    }
}

impl AudioDevice for MockDevice {
    fn open_stream(
        &self,
        sample_rate: u32,
        _channels: u16,
    ) -> Result<Box<dyn OutputStream>, DeviceError> {
        let delay = *self.state.open_delay.lock().unwrap();
        thread::sleep(delay);
        if self.state.fail_opens.load(Ordering::SeqCst) {
            return Err(DeviceError::StreamFailed("mock device unavailable".into()));
        }
        self.state.opens.fetch_add(1, Ordering::SeqCst);

        let recorded = Arc::new(Mutex::new(Vec::new()));
        self.state
            .streams
            .lock()
            .unwrap()
            .push(Arc::clone(&recorded));

        Ok(Box::new(MockStream {
            state: Arc::clone(&self.state),
            sample_rate,
            recorded,
        }))
    }
}

struct MockStream {
    state: Arc<MockState>,
    sample_rate: u32,
    recorded: Arc<Mutex<Vec<f32>>>,
}

impl OutputStream for MockStream {
    fn write(&mut self, samples: &[f32]) -> Result<(), DeviceError> {
        if self.state.fail_writes.load(Ordering::SeqCst) {
            return Err(DeviceError::StreamFailed("mock write failure".into()));
        }
        self.state.writes.fetch_add(1, Ordering::SeqCst);
        self.recorded.lock().unwrap().extend_from_slice(samples);

        thread::sleep(Duration::from_secs_f64(
            samples.len() as f64 / self.sample_rate as f64,
        ));
        Ok(())
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
    }
}
