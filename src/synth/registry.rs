use std::{collections::BTreeMap, sync::Arc, time::Duration};

use super::voice::{VoiceExit, VoiceHandle, VoiceSettings};
use crate::{error::VoiceError, io::audio::AudioDevice};

/// Result of trying to reap a voice.
#[derive(Debug)]
pub enum Reap {
    /// No voice for that key.
    Absent,
    /// Still running (or still finishing its last block).
    Pending,
    /// Thread joined and entry removed.
    Reaped(VoiceExit),
}

/// At most one voice per key.
///
/// Owned by the dispatcher, which is its only mutator. Voices never touch the
/// registry; they only flip their own running flag and report their exit over
/// a channel, so no lock is needed here.
pub struct VoiceRegistry {
    device: Arc<dyn AudioDevice>,
    settings: VoiceSettings,
    voices: BTreeMap<char, VoiceHandle>,
}

impl VoiceRegistry {
    pub fn new(device: Arc<dyn AudioDevice>, settings: VoiceSettings) -> Self {
        Self {
            device,
            settings,
            voices: BTreeMap::new(),
        }
    }

    /// A voice exists for `key` and has not been reaped yet.
    pub fn is_live_or_pending(&self, key: char) -> bool {
        self.voices.contains_key(&key)
    }

    /// Start a voice for `key`. Fails with [`VoiceError::DuplicateVoice`] if
    /// one is already live or pending.
    pub fn spawn(&mut self, key: char, pitch: f64) -> Result<(), VoiceError> {
        if self.is_live_or_pending(key) {
            return Err(VoiceError::DuplicateVoice(key));
        }
        let handle = VoiceHandle::start(key, pitch, &self.settings, Arc::clone(&self.device))?;
        self.voices.insert(key, handle);
        Ok(())
    }

    /// Signal the voice for `key` to stop. The entry stays until reaped.
    pub fn request_stop(&mut self, key: char) {
        if let Some(handle) = self.voices.get(&key) {
            handle.request_stop();
        }
    }

    pub fn stop_all(&mut self) {
        for handle in self.voices.values() {
            handle.request_stop();
        }
    }

    /// Remove the voice for `key` if its thread exits within `timeout`.
    pub fn reap(&mut self, key: char, timeout: Duration) -> Reap {
        let Some(handle) = self.voices.get_mut(&key) else {
            return Reap::Absent;
        };
        match handle.wait_exit(timeout) {
            Some(exit) => {
                self.voices.remove(&key);
                Reap::Reaped(exit)
            }
            None => Reap::Pending,
        }
    }

    /// Reap every voice whose thread has already exited, without waiting.
    pub fn collect_finished(&mut self) -> Vec<(char, VoiceExit)> {
        let keys: Vec<char> = self.voices.keys().copied().collect();
        keys.into_iter()
            .filter_map(|key| match self.reap(key, Duration::ZERO) {
                Reap::Reaped(exit) => Some((key, exit)),
                Reap::Absent | Reap::Pending => None,
            })
            .collect()
    }

    /// Drop every remaining entry without waiting, returning their keys.
    ///
    /// Dropped handles still signal stop, so the threads wind down on their own.
    pub fn abandon(&mut self) -> Vec<char> {
        let keys = self.keys().collect();
        self.voices.clear();
        keys
    }

    pub fn keys(&self) -> impl Iterator<Item = char> + '_ {
        self.voices.keys().copied()
    }

    pub fn get(&self, key: char) -> Option<&VoiceHandle> {
        self.voices.get(&key)
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::DeviceError, io::testing::MockDevice};
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::collections::BTreeSet;

    const WAIT: Duration = Duration::from_millis(300);

    fn registry(device: &MockDevice) -> VoiceRegistry {
        let settings = VoiceSettings {
            sample_rate: 8_000,
            block_duration: Duration::from_millis(20),
            amplitude: 0.25,
        };
        VoiceRegistry::new(Arc::new(device.clone()), settings)
    }

    #[test]
    fn duplicate_spawn_fails_while_live_or_pending() {
        let device = MockDevice::new();
        let mut registry = registry(&device);

        registry.spawn('a', 440.0).unwrap();
        assert!(matches!(
            registry.spawn('a', 440.0),
            Err(VoiceError::DuplicateVoice('a'))
        ));

        // Still pending after the stop request, so still a duplicate
        registry.request_stop('a');
        assert!(registry.is_live_or_pending('a'));
        assert!(matches!(
            registry.spawn('a', 440.0),
            Err(VoiceError::DuplicateVoice('a'))
        ));

        assert!(matches!(registry.reap('a', WAIT), Reap::Reaped(Ok(_))));
        assert!(!registry.is_live_or_pending('a'));

        // Restart after reaping
        registry.spawn('a', 440.0).unwrap();
        assert_eq!(registry.len(), 1);

        registry.stop_all();
        assert!(matches!(registry.reap('a', WAIT), Reap::Reaped(Ok(_))));
        assert_eq!(device.opens(), 2);
        assert_eq!(device.closes(), 2);
    }

    #[test]
    fn request_stop_twice_releases_once() {
        let device = MockDevice::new();
        let mut registry = registry(&device);

        registry.spawn('s', 493.88).unwrap();
        registry.request_stop('s');
        registry.request_stop('s');
        assert!(matches!(registry.reap('s', WAIT), Reap::Reaped(Ok(_))));
        registry.request_stop('s');

        assert!(matches!(registry.reap('s', WAIT), Reap::Absent));
        assert_eq!(device.closes(), 1);
    }

    #[test]
    fn request_stop_on_absent_key_is_noop() {
        let device = MockDevice::new();
        let mut registry = registry(&device);
        registry.request_stop('q');
        assert!(registry.is_empty());
    }

    #[test]
    fn running_voice_stays_pending() {
        let device = MockDevice::new();
        let mut registry = registry(&device);

        registry.spawn('d', 220.0).unwrap();
        assert!(matches!(registry.reap('d', Duration::ZERO), Reap::Pending));
        assert!(registry.get('d').is_some_and(|voice| voice.is_running()));

        registry.stop_all();
        assert!(matches!(registry.reap('d', WAIT), Reap::Reaped(Ok(_))));
    }

    #[test]
    fn failed_open_is_reaped_as_an_error() {
        let device = MockDevice::new();
        device.fail_opens(true);
        let mut registry = registry(&device);

        // Pending until the voice thread reports the failed open
        registry.spawn('a', 440.0).unwrap();
        assert!(matches!(
            registry.reap('a', WAIT),
            Reap::Reaped(Err(DeviceError::StreamFailed(_)))
        ));
        assert!(!registry.is_live_or_pending('a'));
        assert_eq!(device.closes(), 0);
    }

    #[test]
    fn collects_voices_that_died_on_their_own() {
        let device = MockDevice::new();
        let mut registry = registry(&device);

        registry.spawn('a', 440.0).unwrap();
        device.fail_writes(true);
        std::thread::sleep(Duration::from_millis(100));

        let finished = registry.collect_finished();
        assert_eq!(finished.len(), 1);
        assert!(matches!(finished[0], ('a', Err(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn one_voice_per_key_under_random_operations() {
        const KEYS: [char; 3] = ['a', 's', 'd'];

        for seed in 0..4 {
            let mut rng = StdRng::seed_from_u64(seed);
            let device = MockDevice::new();
            let mut registry = registry(&device);
            let mut expected: BTreeSet<char> = BTreeSet::new();
            let mut spawned = 0;

            for step in 0..60 {
                let key = KEYS[rng.gen_range(0..KEYS.len())];
                match rng.gen_range(0..3) {
                    0 => match registry.spawn(key, 440.0) {
                        Ok(()) => {
                            assert!(expected.insert(key), "seed {seed} step {step}: {key:?} doubled");
                            spawned += 1;
                        }
                        Err(VoiceError::DuplicateVoice(k)) => {
                            assert_eq!(k, key);
                            assert!(expected.contains(&key), "seed {seed} step {step}");
                        }
                        Err(err) => panic!("seed {seed} step {step}: {err}"),
                    },
                    1 => registry.request_stop(key),
                    _ => {
                        let wait = Duration::from_millis(rng.gen_range(0..5));
                        match registry.reap(key, wait) {
                            Reap::Reaped(exit) => {
                                assert!(exit.is_ok(), "seed {seed} step {step}: {exit:?}");
                                assert!(expected.remove(&key), "seed {seed} step {step}");
                            }
                            Reap::Pending => assert!(expected.contains(&key)),
                            Reap::Absent => assert!(!expected.contains(&key)),
                        }
                    }
                }

                let keys: Vec<char> = registry.keys().collect();
                assert_eq!(keys, expected.iter().copied().collect::<Vec<_>>());
                for &key in &expected {
                    assert!(registry.is_live_or_pending(key));
                    assert!(matches!(
                        registry.spawn(key, 440.0),
                        Err(VoiceError::DuplicateVoice(_))
                    ));
                }
                // Streams only live inside registered voices
                let (opens, closes) = (device.opens(), device.closes());
                assert!(opens - closes.min(opens) <= registry.len());
            }

            registry.stop_all();
            for key in KEYS {
                assert!(!matches!(registry.reap(key, WAIT), Reap::Pending));
            }
            assert!(registry.is_empty());
            assert_eq!(device.opens(), spawned);
            assert_eq!(device.closes(), spawned);
        }
    }
}
