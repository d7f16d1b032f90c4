//! Engine lifecycle manager.
//!
//! Owns at most one live engine and moves it through
//! `Absent -> Constructing -> Ready -> (Evicting | Swapping) -> Absent`.
//! Every mutating call takes a [`GatePermit`], so construction, recognition
//! and eviction are serialized by the single-flight gate rather than by
//! anything in here. The slot mutex is therefore never contended; it exists
//! to hand out `&mut` access to the engine.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use ocrgate_core::{
    DetectedRegion, EngineError, EngineFactory, EngineOptions, LanguageSet, VisionEngine,
};
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard, RwLock};
use serde::Serialize;
use tracing::{info, warn};

use crate::gate::GatePermit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Absent,
    Constructing,
    Ready,
    Evicting,
    Swapping,
}

struct LiveEngine {
    engine: Box<dyn VisionEngine>,
    languages: LanguageSet,
    generation: u64,
    construction_time: Duration,
}

/// Readable without touching the engine slot, so health checks never wait
/// behind a running recognition.
#[derive(Debug, Clone)]
struct StatusInner {
    state: LifecycleState,
    languages: Option<LanguageSet>,
    constructed_at: Option<DateTime<Utc>>,
    last_used: Option<Instant>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub state: LifecycleState,
    pub languages: Option<LanguageSet>,
    pub constructed_at: Option<DateTime<Utc>>,
    /// Time since the engine last served a request; `None` when absent.
    #[serde(skip)]
    pub idle: Option<Duration>,
    pub constructions: u64,
    pub teardowns: u64,
}

impl EngineStatus {
    pub fn is_loaded(&self) -> bool {
        self.state == LifecycleState::Ready
    }
}

pub struct EngineLifecycle {
    factory: Arc<dyn EngineFactory>,
    options: EngineOptions,
    slot: Mutex<Option<LiveEngine>>,
    status: RwLock<StatusInner>,
    constructions: AtomicU64,
    teardowns: AtomicU64,
}

impl EngineLifecycle {
    pub fn new(factory: Arc<dyn EngineFactory>, options: EngineOptions) -> Self {
        Self {
            factory,
            options,
            slot: Mutex::new(None),
            status: RwLock::new(StatusInner {
                state: LifecycleState::Absent,
                languages: None,
                constructed_at: None,
                last_used: None,
            }),
            constructions: AtomicU64::new(0),
            teardowns: AtomicU64::new(0),
        }
    }

    pub fn factory_name(&self) -> &str {
        self.factory.name()
    }

    /// Returns the engine for `languages`, building it first when the slot is
    /// empty or holds a different language set. A failed build leaves the
    /// slot empty so the next call retries from scratch.
    pub fn ensure(
        &self,
        _permit: &GatePermit,
        languages: &LanguageSet,
    ) -> Result<EngineLease<'_>, EngineError> {
        let mut slot = self.slot.lock();

        let reusable = matches!(slot.as_ref(), Some(live) if live.languages == *languages);
        if !reusable {
            if let Some(old) = slot.take() {
                self.set_state(LifecycleState::Swapping);
                info!(from = %old.languages, to = %languages, "Language set changed; replacing engine");
                self.teardown(old);
            }

            self.set_state(LifecycleState::Constructing);
            info!(languages = %languages, backend = self.factory.name(), "Constructing engine");
            let started = Instant::now();
            match self.factory.construct(languages, &self.options) {
                Ok(engine) => {
                    let construction_time = started.elapsed();
                    let generation = self.constructions.fetch_add(1, Ordering::Relaxed) + 1;
                    info!(
                        languages = %languages,
                        elapsed_ms = construction_time.as_millis() as u64,
                        generation,
                        "Engine constructed"
                    );
                    *slot = Some(LiveEngine {
                        engine,
                        languages: languages.clone(),
                        generation,
                        construction_time,
                    });
                    let mut status = self.status.write();
                    status.languages = Some(languages.clone());
                    status.constructed_at = Some(Utc::now());
                }
                Err(err) => {
                    warn!(languages = %languages, error = %err, "Engine construction failed");
                    self.mark_absent();
                    return Err(err);
                }
            }
        }

        {
            let mut status = self.status.write();
            status.state = LifecycleState::Ready;
            status.last_used = Some(Instant::now());
        }

        let live = MutexGuard::try_map(slot, |slot| slot.as_mut()).map_err(|_| {
            EngineError::Construction {
                languages: languages.to_string(),
                message: "engine slot emptied during construction".into(),
            }
        })?;
        Ok(EngineLease {
            live,
            lifecycle: self,
        })
    }

    /// Tears down the engine if it has been idle longer than `idle_threshold`.
    /// Returns whether an engine was evicted; an empty slot is a no-op.
    pub fn evict_if_idle(&self, _permit: &GatePermit, idle_threshold: Duration) -> bool {
        let idle = match self.status.read().last_used {
            Some(last_used) => last_used.elapsed(),
            None => return false,
        };
        if idle <= idle_threshold {
            return false;
        }
        let mut slot = self.slot.lock();
        let Some(live) = slot.take() else {
            return false;
        };
        self.set_state(LifecycleState::Evicting);
        info!(
            languages = %live.languages,
            idle_secs = idle.as_secs(),
            "Evicting idle engine"
        );
        self.teardown(live);
        self.mark_absent();
        true
    }

    /// Unconditionally tears down any live engine and resets the state to
    /// `Absent`, including a construction that never finished. Used on
    /// shutdown and after an engine fault.
    pub fn invalidate(&self, _permit: &GatePermit) -> bool {
        let taken = self.slot.lock().take();
        let torn_down = match taken {
            Some(live) => {
                self.set_state(LifecycleState::Evicting);
                self.teardown(live);
                true
            }
            None => false,
        };
        self.mark_absent();
        torn_down
    }

    pub fn status(&self) -> EngineStatus {
        let inner = self.status.read().clone();
        let loaded = inner.state == LifecycleState::Ready;
        EngineStatus {
            state: inner.state,
            languages: inner.languages,
            constructed_at: inner.constructed_at,
            idle: if loaded {
                inner.last_used.map(|t| t.elapsed())
            } else {
                None
            },
            constructions: self.constructions.load(Ordering::Relaxed),
            teardowns: self.teardowns.load(Ordering::Relaxed),
        }
    }

    /// Best effort: a failing release is logged and the engine is dropped anyway.
    fn teardown(&self, mut live: LiveEngine) {
        if let Err(err) = live.engine.release() {
            warn!(languages = %live.languages, error = %err, "Engine release failed; discarding");
        }
        drop(live);
        self.teardowns.fetch_add(1, Ordering::Relaxed);
    }

    fn set_state(&self, state: LifecycleState) {
        self.status.write().state = state;
    }

    fn mark_absent(&self) {
        let mut status = self.status.write();
        status.state = LifecycleState::Absent;
        status.languages = None;
        status.constructed_at = None;
        status.last_used = None;
    }
}

/// Exclusive access to the live engine for the duration of one request.
pub struct EngineLease<'a> {
    live: MappedMutexGuard<'a, LiveEngine>,
    lifecycle: &'a EngineLifecycle,
}

impl EngineLease<'_> {
    pub fn recognize(
        &mut self,
        image_path: &std::path::Path,
    ) -> Result<Vec<DetectedRegion>, EngineError> {
        let result = self.live.engine.recognize(image_path);
        self.lifecycle.status.write().last_used = Some(Instant::now());
        result
    }

    pub fn languages(&self) -> &LanguageSet {
        &self.live.languages
    }

    /// Identity of the engine instance; changes on every construction.
    pub fn generation(&self) -> u64 {
        self.live.generation
    }

    pub fn construction_time(&self) -> Duration {
        self.live.construction_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::SingleFlightGate;
    use crate::testing::FakeFactory;
    use std::path::PathBuf;

    fn options() -> EngineOptions {
        EngineOptions {
            use_accelerator: false,
            max_dimension: 4096,
            model_dir: PathBuf::from("model"),
        }
    }

    #[test]
    fn same_languages_reuse_engine() {
        let factory = Arc::new(FakeFactory::default());
        let lifecycle = EngineLifecycle::new(factory.clone(), options());
        let gate = SingleFlightGate::new();
        let permit = gate.try_enter().unwrap();
        let en = LanguageSet::parse("en");

        let first = lifecycle.ensure(&permit, &en).unwrap().generation();
        let second = lifecycle.ensure(&permit, &en).unwrap().generation();
        assert_eq!(first, second);
        assert_eq!(factory.constructed(), 1);
        assert!(lifecycle.status().is_loaded());
    }

    #[test]
    fn language_change_swaps_once() {
        let factory = Arc::new(FakeFactory::default());
        let lifecycle = EngineLifecycle::new(factory.clone(), options());
        let gate = SingleFlightGate::new();
        let permit = gate.try_enter().unwrap();

        let first = lifecycle
            .ensure(&permit, &LanguageSet::parse("en"))
            .unwrap()
            .generation();
        let second = lifecycle
            .ensure(&permit, &LanguageSet::parse("en,ch_sim"))
            .unwrap()
            .generation();
        assert_ne!(first, second);
        assert_eq!(factory.constructed(), 2);
        assert_eq!(factory.released(), 1);
        assert_eq!(lifecycle.status().teardowns, 1);
    }

    #[test]
    fn failed_construction_leaves_slot_absent() {
        let factory = Arc::new(FakeFactory::default());
        let lifecycle = EngineLifecycle::new(factory.clone(), options());
        let gate = SingleFlightGate::new();
        let permit = gate.try_enter().unwrap();

        lifecycle.ensure(&permit, &LanguageSet::parse("en")).unwrap();
        factory.fail_next_construction("no model for xx");
        let err = lifecycle
            .ensure(&permit, &LanguageSet::parse("xx"))
            .err()
            .unwrap();
        assert!(matches!(err, EngineError::Construction { .. }));
        let status = lifecycle.status();
        assert_eq!(status.state, LifecycleState::Absent);
        assert!(status.languages.is_none());

        // next attempt rebuilds
        lifecycle.ensure(&permit, &LanguageSet::parse("en")).unwrap();
        assert_eq!(factory.constructed(), 2);
    }

    #[test]
    fn evicting_absent_engine_is_noop() {
        let lifecycle = EngineLifecycle::new(Arc::new(FakeFactory::default()), options());
        let gate = SingleFlightGate::new();
        let permit = gate.try_enter().unwrap();
        assert!(!lifecycle.evict_if_idle(&permit, Duration::ZERO));
        assert!(!lifecycle.evict_if_idle(&permit, Duration::ZERO));
        assert_eq!(lifecycle.status().teardowns, 0);
    }

    #[test]
    fn evicts_only_after_threshold() {
        let factory = Arc::new(FakeFactory::default());
        let lifecycle = EngineLifecycle::new(factory.clone(), options());
        let gate = SingleFlightGate::new();
        let permit = gate.try_enter().unwrap();
        lifecycle.ensure(&permit, &LanguageSet::parse("en")).unwrap();

        assert!(!lifecycle.evict_if_idle(&permit, Duration::from_secs(3600)));
        std::thread::sleep(Duration::from_millis(5));
        assert!(lifecycle.evict_if_idle(&permit, Duration::from_millis(1)));
        assert!(!lifecycle.status().is_loaded());
        assert!(lifecycle.status().idle.is_none());
        assert_eq!(factory.released(), 1);
    }

    #[test]
    fn release_failure_still_discards_engine() {
        let factory = Arc::new(FakeFactory::default());
        factory.fail_release();
        let lifecycle = EngineLifecycle::new(factory.clone(), options());
        let gate = SingleFlightGate::new();
        let permit = gate.try_enter().unwrap();
        lifecycle.ensure(&permit, &LanguageSet::parse("en")).unwrap();
        assert!(lifecycle.invalidate(&permit));
        assert_eq!(lifecycle.status().state, LifecycleState::Absent);
        assert!(!lifecycle.invalidate(&permit));
    }
}
