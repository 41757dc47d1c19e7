//! Engine sharing between conversations, and hot reload.
//!
//! The handle keeps the current rule-base snapshot behind a read/write lock.
//! A session captures the snapshot when it opens, so a reload only affects
//! conversations that start afterwards.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::{Mutex, RwLock};

use fred_rules::{Engine, RuleBase, RuleBaseSummary, RuleResult, SelectorOptions};

use crate::config::{EngineConfig, SessionMode};

/// One loaded rule base.
#[derive(Debug)]
struct Snapshot {
    generation: u64,
    loaded_at: DateTime<Utc>,
    /// Never fired; per-session engines clone from here.
    pristine: RuleBase,
    /// The single engine used in shared mode.
    shared: Mutex<Engine>,
}

/// Cheaply cloneable handle to the current rule base.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    inner: Arc<HandleInner>,
}

#[derive(Debug)]
struct HandleInner {
    current: RwLock<Arc<Snapshot>>,
    mode: SessionMode,
    options: SelectorOptions,
    seed: Option<u64>,
}

impl EngineHandle {
    pub fn new(base: RuleBase, config: &EngineConfig) -> Self {
        let options = config.selector_options();
        let snapshot = Snapshot::new(1, base, options, config.seed);
        Self {
            inner: Arc::new(HandleInner {
                current: RwLock::new(Arc::new(snapshot)),
                mode: config.session_mode,
                options,
                seed: config.seed,
            }),
        }
    }

    pub fn mode(&self) -> SessionMode {
        self.inner.mode
    }

    /// Start a conversation against the current snapshot.
    pub async fn open_session(&self) -> Session {
        let snapshot = self.inner.current.read().await.clone();
        let engine = match self.inner.mode {
            SessionMode::Shared => SessionEngine::Shared(snapshot),
            SessionMode::PerSession => {
                let engine = Engine::with_rng(snapshot.pristine.clone(), rng_for(self.inner.seed))
                    .with_options(self.inner.options);
                SessionEngine::Owned {
                    generation: snapshot.generation,
                    engine: Box::new(engine),
                }
            }
        };
        Session { engine }
    }

    /// Swap in a freshly loaded rule base. Returns the new generation.
    pub async fn reload(&self, base: RuleBase) -> u64 {
        let mut current = self.inner.current.write().await;
        let generation = current.generation + 1;
        *current = Arc::new(Snapshot::new(
            generation,
            base,
            self.inner.options,
            self.inner.seed,
        ));
        tracing::info!(
            generation,
            loaded_at = %current.loaded_at,
            rules = current.pristine.len(),
            "rule base swapped"
        );
        generation
    }

    pub async fn generation(&self) -> u64 {
        self.inner.current.read().await.generation
    }

    pub async fn loaded_at(&self) -> DateTime<Utc> {
        self.inner.current.read().await.loaded_at
    }

    /// Summary of the current rule base as loaded.
    pub async fn summary(&self) -> RuleBaseSummary {
        self.inner.current.read().await.pristine.summary()
    }
}

impl Snapshot {
    fn new(generation: u64, base: RuleBase, options: SelectorOptions, seed: Option<u64>) -> Self {
        let shared = Engine::with_rng(base.clone(), rng_for(seed)).with_options(options);
        Self {
            generation,
            loaded_at: Utc::now(),
            pristine: base,
            shared: Mutex::new(shared),
        }
    }
}

fn rng_for(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

#[derive(Debug)]
enum SessionEngine {
    Shared(Arc<Snapshot>),
    Owned { generation: u64, engine: Box<Engine> },
}

/// One conversation's view of the engine.
#[derive(Debug)]
pub struct Session {
    engine: SessionEngine,
}

impl Session {
    /// Generation of the rule base this session talks to.
    pub fn generation(&self) -> u64 {
        match &self.engine {
            SessionEngine::Shared(snapshot) => snapshot.generation,
            SessionEngine::Owned { generation, .. } => *generation,
        }
    }

    pub async fn first_greeting(&mut self) -> RuleResult<String> {
        match &mut self.engine {
            SessionEngine::Shared(snapshot) => snapshot.shared.lock().await.first_greeting(),
            SessionEngine::Owned { engine, .. } => engine.first_greeting(),
        }
    }

    pub async fn respond(&mut self, utterance: &str) -> RuleResult<String> {
        match &mut self.engine {
            SessionEngine::Shared(snapshot) => snapshot.shared.lock().await.respond(utterance),
            SessionEngine::Owned { engine, .. } => engine.respond(utterance),
        }
    }
}
