//! The emergence detector.
//!
//! Observes several cells at once, samples them into a sliding window on
//! every tick and runs the pattern detectors over that window. Ticks come
//! either from a background tokio task ([`EmergenceDetector::start`]) or
//! from the caller ([`EmergenceDetector::tick_at`]) when replaying recorded
//! history.
//!
//! # Example
//!
//! ```rust
//! use causa_analysis::{EmergenceConfig, EmergenceDetector, PatternType};
//! use causa_core::MemoryCell;
//!
//! let config = EmergenceConfig::default().only([PatternType::Synchronization]);
//! let detector = EmergenceDetector::new(config).unwrap();
//!
//! let wolves = MemoryCell::new(10i64);
//! let sheep = MemoryCell::new(50i64);
//! detector.observe("wolves", wolves.clone()).unwrap();
//! detector.observe("sheep", sheep.clone()).unwrap();
//!
//! for t in 0..6 {
//!     wolves.set(10 + t);
//!     sheep.set(50 - t);
//!     detector.tick_at(t as u64 * 1000);
//! }
//! assert_eq!(detector.patterns_of(PatternType::Synchronization).len(), 2);
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};
use uuid::Uuid;

use causa_core::{CausalStore, Clock, MemoryCell, StateValue, SystemClock};

use crate::config::EmergenceConfig;
use crate::detectors::run_detectors;
use crate::error::{AnalysisError, Result};
use crate::numeric::numeric_projection;
use crate::pattern::{EmergentPattern, PatternType};
use crate::probe::{CellProbe, ChangeCounter, StoreProbe};
use crate::window::Snapshot;

const PATTERN_CHANNEL_CAPACITY: usize = 100;

struct Observed {
    probe: Box<dyn StoreProbe>,
    counter: Arc<ChangeCounter>,
}

#[derive(Default)]
struct DetectorState {
    stores: BTreeMap<String, Observed>,
    window: VecDeque<Snapshot>,
    patterns: VecDeque<EmergentPattern>,
}

struct Runner {
    shutdown: watch::Sender<bool>,
    _task: JoinHandle<()>,
}

struct Shared {
    config: EmergenceConfig,
    clock: Arc<dyn Clock>,
    /// Global change sequence used to order first movers.
    sequence: Arc<AtomicU64>,
    state: Mutex<DetectorState>,
    patterns_tx: broadcast::Sender<EmergentPattern>,
    runner: Mutex<Option<Runner>>,
}

impl Shared {
    /// One tick. Holding the state lock for the whole tick keeps ticks from
    /// overlapping.
    fn tick_at(&self, timestamp: u64) -> Vec<EmergentPattern> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let mut snapshot = Snapshot::new(timestamp);
        let mut movers: Vec<(u64, &String)> = Vec::new();
        for (key, observed) in &state.stores {
            let (changes, first) = observed.counter.take();
            let value = observed.probe.sample().as_ref().and_then(numeric_projection);
            snapshot.values.insert(key.clone(), value);
            snapshot.changes.insert(key.clone(), changes);
            if let Some(seq) = first.filter(|_| changes > 0) {
                movers.push((seq, key));
            }
        }
        movers.sort();
        snapshot.change_order = movers.into_iter().map(|(_, key)| key.clone()).collect();

        state.window.push_back(snapshot);
        while state.window.len() > self.config.window_size {
            state.window.pop_front();
        }

        let keys: Vec<String> = state.stores.keys().cloned().collect();
        let window = state.window.make_contiguous();
        let detections = run_detectors(window, &keys, &self.config);
        debug!(
            "Emergence tick at {}: {} stores, {} samples, {} patterns",
            timestamp,
            keys.len(),
            window.len(),
            detections.len()
        );

        let mut emitted = Vec::with_capacity(detections.len());
        for detection in detections {
            let pattern = EmergentPattern {
                id: Uuid::new_v4().to_string(),
                pattern_type: detection.pattern_type,
                confidence: detection.confidence,
                stores_involved: detection.stores,
                detected_at: timestamp,
                description: detection.description,
                metrics: detection.metrics,
                evidence: detection.evidence,
            };
            info!(
                "Emergent {} ({:.2}): {}",
                pattern.pattern_type, pattern.confidence, pattern.description
            );

            state.patterns.push_back(pattern.clone());
            while state.patterns.len() > self.config.max_patterns {
                state.patterns.pop_front();
            }
            // No receivers is fine
            let _ = self.patterns_tx.send(pattern.clone());
            emitted.push(pattern);
        }
        emitted
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        for observed in self.state.get_mut().stores.values() {
            observed.probe.detach();
        }
    }
}

/// Multi-store pattern detector.
///
/// Cloning yields another handle to the same detector.
#[derive(Clone)]
pub struct EmergenceDetector {
    shared: Arc<Shared>,
}

impl EmergenceDetector {
    /// Creates a detector using the wall clock.
    ///
    /// # Errors
    /// `InvalidConfig` if the configuration does not validate.
    pub fn new(config: EmergenceConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a detector whose background ticks are stamped by `clock`.
    pub fn with_clock(config: EmergenceConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let (patterns_tx, _) = broadcast::channel(PATTERN_CHANNEL_CAPACITY);
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                clock,
                sequence: Arc::new(AtomicU64::new(0)),
                state: Mutex::new(DetectorState::default()),
                patterns_tx,
                runner: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &EmergenceConfig {
        &self.shared.config
    }

    /// Starts observing `cell` under `key`.
    ///
    /// # Errors
    /// `AlreadyObserved` if `key` is taken, `Causal` if the cell has no free
    /// subscriber slot.
    pub fn observe<T>(&self, key: &str, cell: MemoryCell<T>) -> Result<()>
    where
        T: Clone + Serialize + Send + Sync + 'static,
    {
        let mut state = self.shared.state.lock();
        if state.stores.contains_key(key) {
            return Err(AnalysisError::AlreadyObserved(key.to_string()));
        }

        let counter = Arc::new(ChangeCounter::default());
        let probe = CellProbe::attach(cell, Arc::clone(&counter), Arc::clone(&self.shared.sequence))?;
        state.stores.insert(
            key.to_string(),
            Observed {
                probe: Box::new(probe),
                counter,
            },
        );
        debug!("Observing store '{}'", key);
        Ok(())
    }

    /// Observes a causal store's current value under its own key.
    pub fn observe_store<T: StateValue>(&self, store: &CausalStore<T>) -> Result<()> {
        self.observe(store.key(), store.cell())
    }

    /// Stops observing `key`. Returns false if it was not observed.
    pub fn unobserve(&self, key: &str) -> bool {
        match self.shared.state.lock().stores.remove(key) {
            Some(observed) => {
                observed.probe.detach();
                true
            }
            None => false,
        }
    }

    pub fn observed_stores(&self) -> Vec<String> {
        self.shared.state.lock().stores.keys().cloned().collect()
    }

    /// Samples every store now and runs the detectors.
    pub fn tick(&self) -> Vec<EmergentPattern> {
        self.shared.tick_at(self.shared.clock.now_ms())
    }

    /// Samples every store with an explicit timestamp.
    ///
    /// Returns the patterns this tick emitted.
    pub fn tick_at(&self, timestamp: u64) -> Vec<EmergentPattern> {
        self.shared.tick_at(timestamp)
    }

    /// Starts ticking every `sampling_interval_ms` on the current tokio
    /// runtime. Does nothing if already running.
    ///
    /// # Errors
    /// `NoRuntime` outside a tokio runtime.
    pub fn start(&self) -> Result<()> {
        let handle = Handle::try_current().map_err(|_| AnalysisError::NoRuntime)?;
        let mut runner = self.shared.runner.lock();
        if runner.is_some() {
            return Ok(());
        }

        let period = Duration::from_millis(self.shared.config.sampling_interval_ms);
        let (shutdown, mut stop_rx) = watch::channel(false);
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);

        let task = handle.spawn(async move {
            let mut timer = tokio::time::interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            timer.tick().await;

            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        let Some(shared) = weak.upgrade() else { break };
                        shared.tick_at(shared.clock.now_ms());
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        *runner = Some(Runner {
            shutdown,
            _task: task,
        });
        info!("Emergence detector started ({}ms interval)", period.as_millis());
        Ok(())
    }

    /// Stops the background task after its current tick.
    ///
    /// Returns false if it was not running; calling it twice is harmless.
    pub fn stop(&self) -> bool {
        match self.shared.runner.lock().take() {
            Some(runner) => {
                let _ = runner.shutdown.send(true);
                info!("Emergence detector stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.runner.lock().is_some()
    }

    /// Retained patterns, oldest first.
    pub fn patterns(&self) -> Vec<EmergentPattern> {
        self.shared.state.lock().patterns.iter().cloned().collect()
    }

    pub fn patterns_of(&self, pattern_type: PatternType) -> Vec<EmergentPattern> {
        self.shared
            .state
            .lock()
            .patterns
            .iter()
            .filter(|p| p.pattern_type == pattern_type)
            .cloned()
            .collect()
    }

    pub fn clear_patterns(&self) {
        self.shared.state.lock().patterns.clear();
    }

    /// Current sample window, oldest first.
    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.shared.state.lock().window.iter().cloned().collect()
    }

    /// Receives every pattern emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<EmergentPattern> {
        self.shared.patterns_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use causa_core::ManualClock;

    fn detector(config: EmergenceConfig) -> EmergenceDetector {
        EmergenceDetector::new(config).unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = EmergenceConfig {
            window_size: 0,
            ..EmergenceConfig::default()
        };
        assert!(matches!(
            EmergenceDetector::new(config),
            Err(AnalysisError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_observe_and_unobserve() {
        let detector = detector(EmergenceConfig::default());
        let cell = MemoryCell::new(1i64);
        detector.observe("a", cell.clone()).unwrap();
        assert!(matches!(
            detector.observe("a", cell.clone()),
            Err(AnalysisError::AlreadyObserved(_))
        ));
        assert_eq!(cell.subscriber_count(), 1);

        assert!(detector.unobserve("a"));
        assert!(!detector.unobserve("a"));
        assert_eq!(cell.subscriber_count(), 0);
    }

    #[test]
    fn test_dropping_detector_releases_subscriptions() {
        let cell = MemoryCell::new(1i64);
        {
            let detector = detector(EmergenceConfig::default());
            detector.observe("a", cell.clone()).unwrap();
            assert_eq!(cell.subscriber_count(), 1);
        }
        assert_eq!(cell.subscriber_count(), 0);
    }

    #[test]
    fn test_tick_samples_values_and_change_order() {
        let detector = detector(EmergenceConfig::default());
        let a = MemoryCell::new(1i64);
        let b = MemoryCell::new(serde_json::json!({ "x": 2, "y": 4 }));
        detector.observe("a", a.clone()).unwrap();
        detector.observe("b", b.clone()).unwrap();

        b.set(serde_json::json!({ "x": 4, "y": 4 }));
        a.set(7);
        a.set(8);
        detector.tick_at(10);

        let window = detector.snapshots();
        assert_eq!(window.len(), 1);
        let snapshot = &window[0];
        assert_eq!(snapshot.timestamp, 10);
        assert_eq!(snapshot.values["a"], Some(8.0));
        assert_eq!(snapshot.values["b"], Some(4.0));
        assert_eq!(snapshot.changes["a"], 2);
        assert_eq!(snapshot.change_order, vec!["b".to_string(), "a".to_string()]);

        detector.tick_at(20);
        assert_eq!(detector.snapshots()[1].changed_count(), 0);
    }

    #[test]
    fn test_window_and_pattern_buffer_are_bounded() {
        let config = EmergenceConfig {
            window_size: 6,
            max_patterns: 3,
            ..EmergenceConfig::default().only([PatternType::Equilibrium])
        };
        let detector = detector(config);
        detector.observe("a", MemoryCell::new(0i64)).unwrap();

        for t in 0..10 {
            detector.tick_at(t);
        }
        assert_eq!(detector.snapshots().len(), 6);
        assert_eq!(detector.snapshots()[0].timestamp, 4);

        let patterns = detector.patterns();
        assert_eq!(patterns.len(), 3);
        assert_eq!(patterns[0].detected_at, 7);
        assert!(patterns.iter().all(|p| p.pattern_type == PatternType::Equilibrium));

        detector.clear_patterns();
        assert!(detector.patterns().is_empty());
    }

    #[test]
    fn test_start_requires_runtime() {
        let detector = detector(EmergenceConfig::default());
        assert!(matches!(detector.start(), Err(AnalysisError::NoRuntime)));
        assert!(!detector.stop());
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_ticks_until_stopped() {
        let clock = ManualClock::new(5_000);
        let config = EmergenceConfig {
            sampling_interval_ms: 100,
            ..EmergenceConfig::default()
        };
        let detector = EmergenceDetector::with_clock(config, Arc::new(clock)).unwrap();
        detector.observe("a", MemoryCell::new(0i64)).unwrap();

        detector.start().unwrap();
        detector.start().unwrap();
        assert!(detector.is_running());

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(detector.snapshots().len(), 3);
        assert_eq!(detector.snapshots()[0].timestamp, 5_000);

        assert!(detector.stop());
        assert!(!detector.stop());
        assert!(!detector.is_running());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(detector.snapshots().len(), 3);
    }

    #[tokio::test]
    async fn test_subscribers_receive_patterns() {
        let detector = detector(EmergenceConfig::default().only([PatternType::Equilibrium]));
        detector.observe("a", MemoryCell::new(0i64)).unwrap();
        let mut rx = detector.subscribe();

        for t in 0..5 {
            detector.tick_at(t);
        }
        let pattern = rx.recv().await.unwrap();
        assert_eq!(pattern.pattern_type, PatternType::Equilibrium);
        assert_eq!(pattern.detected_at, 4);
    }
}
