//! Fetch orchestration: in-flight and debounce guards, retries with backoff,
//! cache fallback and the user-forced offline mode.
//!
//! All retry policy lives here; sources are plain reads. Every request first
//! resolves the owner it runs for, and cache reads happen only under that
//! owner, so a missing session fails without touching cached rows. The cache
//! entry seen when a request starts is kept as its fallback, so a TTL that
//! runs out during retries does not leave the screen empty.
//!
//! State is kept behind
//! a mutex that is never held across an `.await`, and every write is gated on
//! the liveness flag and on the request generation so that a result arriving
//! after `dispose()`, `force_offline_mode()` or a filter change is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::InventoryOptions;
use crate::inventory::cache::{CacheEntry, ListingCache};
use crate::inventory::executor::{FetchError, FetchErrorKind, ListingSource};
use crate::inventory::filters::ListingFilters;
use crate::inventory::model::Listing;
use crate::inventory::stats::InventoryStats;

pub const NO_CACHE_NOTICE: &str = "No cached data available";
pub const OFFLINE_NOTICE: &str = "Offline mode: showing cached data";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Fetching,
    Succeeded,
    /// Fresh read failed; showing the cached result set
    FailedWithCache,
    /// Nothing to show; `error` says why
    FailedEmpty,
    /// User-forced; only `retry()` leaves it
    Offline,
}

/// What the UI renders
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InventoryView {
    pub phase: Phase,
    pub filters: ListingFilters,
    pub listings: Arc<Vec<Listing>>,
    pub loading: bool,
    pub error: Option<String>,
    /// Listings come from the cache after a failure or in offline mode
    pub using_fallback: bool,
    pub notice: Option<String>,
    pub stats: InventoryStats,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl InventoryView {
    fn show(&mut self, entry: &CacheEntry) {
        self.listings = Arc::clone(&entry.listings);
        self.stats = InventoryStats::from_listings(&self.listings);
        self.fetched_at = Some(entry.fetched_at);
    }

    fn clear(&mut self) {
        self.listings = Arc::new(Vec::new());
        self.stats = InventoryStats::default();
        self.fetched_at = None;
    }

    fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
        self.loading = phase == Phase::Fetching;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    InFlight,
    Debounced,
    Offline,
    Disposed,
}

/// Result of one `load` / `refetch` / `retry` call
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// Fresh rows from the source
    Loaded,
    /// Served from a valid cache entry without touching the source
    CacheHit,
    /// Source failed; cached rows are shown
    Fallback(FetchError),
    /// Source failed and nothing could be shown
    Failed(FetchError),
    /// Filters handed to the request already in flight
    Queued,
    Skipped(SkipReason),
    /// Result dropped: disposed, forced offline, or cancelled
    Aborted,
}

#[derive(Debug, Clone, Copy)]
struct RequestPolicy {
    debounce: bool,
    cache_first: bool,
    leave_offline: bool,
}

#[derive(Debug)]
struct ControllerState {
    view: InventoryView,
    generation: u64,
    resume_phase: Phase,
    last_completed: Option<Completed>,
}

// Debounce scope: same owner, same filters
#[derive(Debug)]
struct Completed {
    owner: Option<String>,
    fingerprint: String,
    at: Instant,
}

enum Settlement {
    Cached(CacheEntry),
    Fresh(CacheEntry),
    Failed(FetchError, Option<CacheEntry>),
}

enum Step {
    Done(LoadOutcome),
    Superseded(ListingFilters, u64),
}

struct Shared<S> {
    source: S,
    cache: ListingCache,
    options: InventoryOptions,
    alive: AtomicBool,
    state: Mutex<ControllerState>,
    views: watch::Sender<InventoryView>,
}

impl<S> Shared<S> {
    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn publish(&self, state: &ControllerState) {
        self.views.send_replace(state.view.clone());
    }

    fn fingerprint(&self, filters: &ListingFilters) -> String {
        filters.fingerprint(self.options.max_limit)
    }
}

/// Delay before retry number `attempt`; grows linearly and saturates
/// instead of overflowing.
fn backoff(unit: Duration, attempt: u32) -> Duration {
    unit.saturating_mul(attempt)
}

// Puts the controller back where it was if a request future is dropped
// before it settles.
struct InFlight<'a, S> {
    shared: &'a Shared<S>,
    generation: u64,
    armed: bool,
}

impl<S> Drop for InFlight<'_, S> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.shared.lock();
        if state.generation == self.generation && state.view.phase == Phase::Fetching {
            let resume = state.resume_phase;
            state.view.set_phase(resume);
            debug!(?resume, "listing request dropped before settling");
            if self.shared.is_alive() {
                self.shared.publish(&state);
            }
        }
    }
}

/// Owns the listings shown for one inventory screen
pub struct InventoryController<S> {
    shared: Arc<Shared<S>>,
}

impl<S> Clone for InventoryController<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: ListingSource> InventoryController<S> {
    pub fn new(source: S, cache: ListingCache, options: InventoryOptions) -> Self {
        let view = InventoryView {
            filters: ListingFilters::new(options.default_limit),
            ..Default::default()
        };
        let (views, _) = watch::channel(view.clone());

        Self {
            shared: Arc::new(Shared {
                source,
                cache,
                options,
                alive: AtomicBool::new(true),
                state: Mutex::new(ControllerState {
                    view,
                    generation: 0,
                    resume_phase: Phase::Idle,
                    last_completed: None,
                }),
                views,
            }),
        }
    }

    /// Current snapshot
    pub fn view(&self) -> InventoryView {
        self.shared.lock().view.clone()
    }

    /// Snapshots pushed on every state change
    pub fn subscribe(&self) -> watch::Receiver<InventoryView> {
        self.shared.views.subscribe()
    }

    pub fn cache(&self) -> &ListingCache {
        &self.shared.cache
    }

    /// Show listings for `filters`, from the cache when it holds them
    pub async fn load(&self, filters: ListingFilters) -> LoadOutcome {
        self.request(
            filters,
            RequestPolicy {
                debounce: true,
                cache_first: true,
                leave_offline: false,
            },
        )
        .await
    }

    /// Re-request the current filters; duplicate calls are absorbed
    pub async fn refetch(&self) -> LoadOutcome {
        let filters = self.shared.lock().view.filters.clone();
        self.load(filters).await
    }

    /// Manual retry: goes to the source even when the cache holds the
    /// filters, and leaves offline mode
    pub async fn retry(&self) -> LoadOutcome {
        let filters = self.shared.lock().view.filters.clone();
        self.request(
            filters,
            RequestPolicy {
                debounce: false,
                cache_first: false,
                leave_offline: true,
            },
        )
        .await
    }

    /// Switch to cached data for the current filters.
    ///
    /// Returns `false` and only sets a notice when nothing is cached.
    pub async fn force_offline_mode(&self) -> bool {
        if !self.shared.is_alive() {
            return false;
        }
        let filters = self.shared.lock().view.filters.clone();
        // without a session there is nothing of anyone's to show
        let entry = match self.shared.source.tenant().await {
            Ok(owner) => self.shared.cache.get(&owner, &filters).await,
            Err(_) => None,
        };

        let mut state = self.shared.lock();
        if !self.shared.is_alive() {
            return false;
        }
        match entry {
            Some(entry) => {
                // an in-flight result must not overwrite offline data
                state.generation += 1;
                state.view.set_phase(Phase::Offline);
                state.view.show(&entry);
                state.view.using_fallback = true;
                state.view.error = None;
                state.view.notice = Some(OFFLINE_NOTICE.to_string());
                info!(listings = entry.listings.len(), "offline mode forced");
                self.shared.publish(&state);
                true
            }
            None => {
                state.view.notice = Some(NO_CACHE_NOTICE.to_string());
                info!("offline mode refused: no cached data");
                self.shared.publish(&state);
                false
            }
        }
    }

    pub fn dismiss_notice(&self) {
        let mut state = self.shared.lock();
        if state.view.notice.take().is_some() && self.shared.is_alive() {
            self.shared.publish(&state);
        }
    }

    /// Drop every cached result set
    pub fn clear_cache(&self) {
        self.shared.cache.invalidate_all();
    }

    /// Stop accepting results; anything still in flight becomes a no-op
    pub fn dispose(&self) {
        self.shared.alive.store(false, Ordering::SeqCst);
        debug!("inventory controller disposed");
    }

    pub fn is_disposed(&self) -> bool {
        !self.shared.is_alive()
    }

    fn retry_budget(&self, kind: FetchErrorKind) -> u32 {
        match kind {
            FetchErrorKind::Timeout => self.shared.options.max_retries,
            FetchErrorKind::Backend => self.shared.options.max_retries.min(1),
            FetchErrorKind::AuthenticationRequired | FetchErrorKind::Aborted => 0,
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.shared.is_alive() && self.shared.lock().generation == generation
    }

    async fn request(&self, filters: ListingFilters, policy: RequestPolicy) -> LoadOutcome {
        let shared = &*self.shared;
        let mut owner = shared.source.tenant().await;
        let fingerprint = shared.fingerprint(&filters);

        let generation = {
            let mut state = shared.lock();
            if !shared.is_alive() {
                return LoadOutcome::Skipped(SkipReason::Disposed);
            }
            if state.view.phase == Phase::Offline && !policy.leave_offline {
                return LoadOutcome::Skipped(SkipReason::Offline);
            }
            if state.view.phase == Phase::Fetching {
                if shared.fingerprint(&state.view.filters) != fingerprint {
                    state.view.filters = filters;
                    state.generation += 1;
                    shared.publish(&state);
                    return LoadOutcome::Queued;
                }
                return LoadOutcome::Skipped(SkipReason::InFlight);
            }
            if policy.debounce {
                if let Some(last) = &state.last_completed {
                    if last.fingerprint == fingerprint
                        && last.owner.as_deref() == owner.as_deref().ok()
                        && last.at.elapsed() < shared.options.debounce_window
                    {
                        return LoadOutcome::Skipped(SkipReason::Debounced);
                    }
                }
            }

            state.resume_phase = state.view.phase;
            state.generation += 1;
            state.view.filters = filters.clone();
            state.view.set_phase(Phase::Fetching);
            state.view.notice = None;
            shared.publish(&state);
            state.generation
        };

        let mut guard = InFlight {
            shared,
            generation,
            armed: true,
        };
        let mut filters = filters;
        let mut cache_first = policy.cache_first;

        loop {
            let settlement = match &owner {
                // auth failures never reach the cache
                Err(error) => Settlement::Failed(error.clone(), None),
                Ok(owner) => {
                    let snapshot = shared.cache.get(owner, &filters).await;
                    match snapshot {
                        Some(entry) if cache_first => Settlement::Cached(entry),
                        snapshot => {
                            self.fetch_with_retries(owner, &filters, guard.generation, snapshot)
                                .await
                        }
                    }
                }
            };

            let scope = owner.as_ref().ok().cloned();
            match self.settle(guard.generation, &filters, scope, settlement) {
                Step::Done(outcome) => {
                    guard.armed = false;
                    return outcome;
                }
                Step::Superseded(next, generation) => {
                    debug!(%next, "listing request superseded by new filters");
                    filters = next;
                    guard.generation = generation;
                    cache_first = true;
                    owner = shared.source.tenant().await;
                }
            }
        }
    }

    async fn fetch_with_retries(
        &self,
        owner: &str,
        filters: &ListingFilters,
        generation: u64,
        snapshot: Option<CacheEntry>,
    ) -> Settlement {
        let shared = &*self.shared;
        let mut attempt = 0;

        let error = loop {
            match shared.source.fetch(filters).await {
                Ok(listings) => {
                    if !shared.is_alive() {
                        return Settlement::Failed(FetchError::aborted(), None);
                    }
                    let entry = shared.cache.set(owner, filters, listings).await;
                    return Settlement::Fresh(entry);
                }
                Err(error) if attempt < self.retry_budget(error.kind) => {
                    attempt += 1;
                    if !self.is_current(generation) {
                        break FetchError::aborted();
                    }
                    let delay = backoff(shared.options.retry_backoff, attempt);
                    warn!(
                        kind = ?error.kind,
                        error = %error,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "listing fetch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    if !self.is_current(generation) {
                        break FetchError::aborted();
                    }
                }
                Err(error) => break error,
            }
        };

        // auth failures are never masked by cached rows. Prefer an entry
        // written while retrying, else what was cached when the request began.
        let fallback = if error.kind.is_retryable() {
            shared.cache.get(owner, filters).await.or(snapshot)
        } else {
            None
        };
        Settlement::Failed(error, fallback)
    }

    fn settle(
        &self,
        generation: u64,
        filters: &ListingFilters,
        owner: Option<String>,
        settlement: Settlement,
    ) -> Step {
        let shared = &*self.shared;
        let mut state = shared.lock();

        if !shared.is_alive() {
            return Step::Done(LoadOutcome::Aborted);
        }
        if state.generation != generation {
            if state.view.phase == Phase::Fetching {
                return Step::Superseded(state.view.filters.clone(), state.generation);
            }
            return Step::Done(LoadOutcome::Aborted);
        }

        let outcome = match settlement {
            Settlement::Cached(entry) => {
                state.view.set_phase(Phase::Succeeded);
                state.view.show(&entry);
                state.view.error = None;
                state.view.using_fallback = false;
                debug!(listings = entry.listings.len(), "listings served from cache");
                LoadOutcome::CacheHit
            }
            Settlement::Fresh(entry) => {
                state.view.set_phase(Phase::Succeeded);
                state.view.show(&entry);
                state.view.error = None;
                state.view.using_fallback = false;
                info!(listings = entry.listings.len(), "listings loaded");
                LoadOutcome::Loaded
            }
            Settlement::Failed(error, _) if error.kind == FetchErrorKind::Aborted => {
                let resume = state.resume_phase;
                state.view.set_phase(resume);
                shared.publish(&state);
                return Step::Done(LoadOutcome::Aborted);
            }
            Settlement::Failed(error, Some(entry)) => {
                state.view.set_phase(Phase::FailedWithCache);
                state.view.show(&entry);
                state.view.using_fallback = true;
                state.view.error = Some(format!("Showing cached data: {}", error));
                warn!(kind = ?error.kind, error = %error, "listing fetch failed, serving cached data");
                LoadOutcome::Fallback(error)
            }
            Settlement::Failed(error, None) => {
                state.view.set_phase(Phase::FailedEmpty);
                state.view.clear();
                state.view.using_fallback = false;
                state.view.error = Some(format!("Unable to load inventory: {}", error));
                warn!(kind = ?error.kind, error = %error, "listing fetch failed");
                LoadOutcome::Failed(error)
            }
        };

        state.last_completed = Some(Completed {
            owner,
            fingerprint: shared.fingerprint(filters),
            at: Instant::now(),
        });
        shared.publish(&state);
        Step::Done(outcome)
    }
}
