//! Session orchestrator: the one public entry point of the core.
//!
//! A session serves one agent loop. `observe()` is the only operation that
//! touches the session's mutable state (snapshot, ref table, signal cache);
//! a reentrant call is rejected rather than queued, and nothing is
//! committed until the whole step has succeeded, so a cancelled or failed
//! observation leaves the previous snapshot in place.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use lens_types::{CauseHint, SessionId, Signals, StateTree};
use page_port::PageDriver;
use signal_probe::probe::origin_of;
use signal_probe::{route, ProbeOptions, RouterFn, SignalCache, SignalProbe};
use state_differ::{
    derive_cause, diff_trees, match_trees, FilterPredicate, FlatTree, RefManager, SemanticFilter,
    SnapshotStore,
};

use crate::config::LensConfig;
use crate::errors::{LensError, Phase, Result};
use crate::observation::Observation;

/// Session lifecycle. `Recovering` forces the next observation to emit a
/// full state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionState {
    Fresh,
    Diffing,
    Recovering,
}

/// Per-call options for [`Session::observe`].
#[derive(Default)]
pub struct ObserveOptions {
    /// Emit a full state regardless of diffing eligibility.
    pub force_full: bool,
    /// Serializer hint, recorded for the caller; the core does not count
    /// tokens itself.
    pub budget_tokens: Option<usize>,
    /// Replacement routing function for this call only.
    pub router: Option<RouterFn>,
    /// Replacement semantic-filter predicates for this call only.
    pub filters: Option<Vec<FilterPredicate>>,
    /// Override the session's dynamic-probe setting for this call.
    pub dynamic_probe: Option<bool>,
}

/// Create a session from validated configuration.
pub fn create_session(config: LensConfig) -> Result<Session> {
    Session::new(config)
}

pub struct Session {
    id: SessionId,
    config: LensConfig,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("id", &self.id).finish()
    }
}

struct Inner {
    state: SessionState,
    step: u64,
    refs: RefManager,
    store: SnapshotStore,
    cache: SignalCache,
    filter: SemanticFilter,
    router: Option<RouterFn>,
    last_signals: Option<Signals>,
}

impl Session {
    pub fn new(config: LensConfig) -> Result<Self> {
        config.validate()?;
        let inner = Inner {
            state: SessionState::Fresh,
            step: 0,
            refs: RefManager::new(config.ref_session_cap),
            store: SnapshotStore::new(),
            cache: SignalCache::new(
                Duration::from_millis(config.snapshot_ttl_ms),
                config.signal_cache_capacity,
            ),
            filter: SemanticFilter::defaults(),
            router: None,
            last_signals: None,
        };
        Ok(Self {
            id: SessionId::new(),
            config,
            inner: Mutex::new(inner),
        })
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Install a session-wide routing override.
    pub async fn set_router(&self, router: Option<RouterFn>) {
        self.inner.lock().await.router = router;
    }

    /// Replace the session's semantic-filter predicate list.
    pub async fn set_filters(&self, predicates: Vec<FilterPredicate>) {
        self.inner.lock().await.filter = SemanticFilter::with_predicates(predicates);
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    /// Router signals from the most recent observation.
    pub async fn last_signals(&self) -> Option<Signals> {
        self.inner.lock().await.last_signals.clone()
    }

    /// Total refs allocated so far in this session.
    pub async fn ref_count(&self) -> u32 {
        self.inner.lock().await.refs.allocated()
    }

    /// Clear the snapshot, the ref table, and the signal cache.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        inner.state = SessionState::Fresh;
        inner.step = 0;
        inner.refs.reset();
        inner.store.clear();
        inner.cache.clear();
        inner.last_signals = None;
        info!(session = %self.id, "session reset");
    }

    /// Observe the page: choose a representation, extract, assign refs,
    /// and emit either a full state or a delta against the previous
    /// snapshot.
    pub async fn observe(
        &self,
        page: &dyn PageDriver,
        options: ObserveOptions,
    ) -> Result<Observation> {
        let mut inner = self
            .inner
            .try_lock()
            .map_err(|_| LensError::ConcurrentObservation)?;
        let inner = &mut *inner;
        let step = inner.step + 1;

        if let Some(budget) = options.budget_tokens {
            debug!(session = %self.id, step, budget_tokens = budget, "observe with token budget hint");
        }

        // Phase 1: signals and routing.
        let url = page.url();
        let origin_changed = inner
            .store
            .get()
            .map_or(false, |prev| origin_of(&prev.url) != origin_of(&url));
        let probe_options = ProbeOptions {
            dynamic_probe: options.dynamic_probe.unwrap_or(self.config.dynamic_probe),
            force: origin_changed,
            ..ProbeOptions::default()
        };
        let probe_budget = Duration::from_millis(self.config.probe_timeout_ms);
        let signals = match timeout(
            probe_budget,
            SignalProbe::collect(page, &inner.cache, probe_options),
        )
        .await
        {
            Ok(Ok(signals)) => signals,
            Ok(Err(err)) => return Err(err.into()),
            Err(_) => {
                inner.state = SessionState::Recovering;
                return Err(LensError::ExtractionTimeout {
                    phase: Phase::SignalProbe,
                    budget_ms: self.config.probe_timeout_ms,
                });
            }
        };

        let representation = match options.router.as_ref().or(inner.router.as_ref()) {
            Some(custom) => custom(&signals),
            None => route(&signals, &self.config.router_thresholds()),
        };

        // Phase 2: extraction.
        let extract_budget = Duration::from_millis(self.config.extract_timeout_ms);
        let mut tree = match timeout(
            extract_budget,
            state_extract::extract(representation, page, &signals, &self.config.extract_options()),
        )
        .await
        {
            Ok(Ok(tree)) => tree,
            Ok(Err(err)) => return Err(err.into()),
            Err(_) => {
                inner.state = SessionState::Recovering;
                return Err(LensError::ExtractionTimeout {
                    phase: Phase::Extract,
                    budget_ms: self.config.extract_timeout_ms,
                });
            }
        };

        // Phase 3: refs and diff; synchronous and budgeted by wall clock.
        let diff_started = Instant::now();
        let reuse: HashMap<usize, lens_types::NodeRef> = match inner.store.get() {
            Some(prev) => {
                let old_flat = FlatTree::build(&prev.root);
                let new_flat = FlatTree::build(&tree.root);
                let matching = match_trees(&old_flat, &new_flat);
                matching
                    .new_to_old
                    .iter()
                    .enumerate()
                    .filter_map(|(n, o)| o.map(|o| (n, old_flat.nodes[o].node.ref_id)))
                    .collect()
            }
            None => HashMap::new(),
        };
        let assignment = inner.refs.assign(&mut tree, &reuse);

        let force_full = options.force_full
            || assignment.compacted
            || !matches!(inner.state, SessionState::Diffing)
            || inner.store.get().is_none();

        let observation = if force_full {
            if assignment.compacted {
                warn!(session = %self.id, step, "ref table compacted; emitting full state");
            }
            Observation::Full {
                refs: inner.refs.refs_map(&tree),
                tree: tree.clone(),
                representation,
                step,
                observed_at: Utc::now(),
            }
        } else {
            let outcome = match inner.store.get() {
                Some(prev) => diff_and_filter(
                    prev,
                    &tree,
                    options.filters,
                    &inner.filter,
                    origin_changed,
                ),
                None => Err(state_differ::DiffError::invariant("snapshot vanished")),
            };
            let delta = match outcome {
                Ok(delta) => delta,
                Err(err) => {
                    inner.state = SessionState::Recovering;
                    warn!(session = %self.id, step, error = %err, "diff failed; session recovering");
                    return Err(err.into());
                }
            };
            if diff_started.elapsed() > Duration::from_millis(self.config.diff_timeout_ms) {
                inner.state = SessionState::Recovering;
                return Err(LensError::ExtractionTimeout {
                    phase: Phase::Diff,
                    budget_ms: self.config.diff_timeout_ms,
                });
            }
            Observation::Delta {
                refs: inner.refs.refs_map(&tree),
                unchanged_summary: delta.unchanged_summary.clone(),
                cause_hint: delta.cause_hint,
                delta,
                representation,
                step,
                observed_at: Utc::now(),
            }
        };

        // Commit.
        inner.store.put(tree);
        inner.step = step;
        inner.state = SessionState::Diffing;
        inner.last_signals = Some(signals);

        info!(
            session = %self.id,
            step,
            kind = if observation.is_full() { "full" } else { "delta" },
            representation = representation.as_str(),
            "observation committed"
        );
        Ok(observation)
    }
}

/// Diff against the previous snapshot, derive the cause, and filter noise.
fn diff_and_filter(
    prev: &StateTree,
    tree: &StateTree,
    call_filters: Option<Vec<FilterPredicate>>,
    session_filter: &SemanticFilter,
    origin_changed: bool,
) -> std::result::Result<lens_types::Delta, state_differ::DiffError> {
    let delta = diff_trees(prev, tree)?;
    let cause = if origin_changed {
        CauseHint::Navigation
    } else {
        derive_cause(prev, tree, &delta)
    };
    let mut delta = match call_filters {
        Some(predicates) => SemanticFilter::with_predicates(predicates).apply(delta, prev, tree),
        None => session_filter.apply(delta, prev, tree),
    };
    delta.cause_hint = Some(cause);
    Ok(delta)
}
