// * Open Alert Cache
// * Remembers which alerts are open so closing by alias needs no extra lookups.
// * Population is single-flight: the first caller fetches, everyone else awaits
// * the same completion handle. The content may be stale but is never a mix of
// * two fetches.

use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::debug;

use crate::engine::hashing::HashedAlias;
use crate::network::wire::AlertRecord;
use crate::ops::telemetry::set_cache_open_alerts;

/// Observable cache phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Empty,
    Populating,
    Ready,
}

enum Phase {
    Empty,
    // * Waiters watch this until the leader flips it to true or goes away
    Populating(watch::Receiver<bool>),
    Ready,
}

struct Inner {
    phase: Phase,
    // * None until the first successful population (or an explicit replace)
    alerts: Option<Vec<AlertRecord>>,
}

/// What a caller asking for a populated cache has to do next
pub enum PopulateTicket<'a> {
    /// Cache is ready and no refresh was forced
    Fresh,
    /// Another caller is fetching; await its completion
    Wait(PopulateWait),
    /// This caller must fetch and settle the guard
    Lead(PopulateGuard<'a>),
}

/// Completion handle shared by callers that arrive while a fetch is in flight
pub struct PopulateWait {
    done: watch::Receiver<bool>,
}

impl PopulateWait {
    pub async fn finished(mut self) {
        // * Err means the leader was dropped; the cache was reset and we stop waiting
        let _ = self.done.wait_for(|done| *done).await;
    }
}

/// Held by the single caller allowed to fetch.
///
/// Dropping it without calling [`complete`](Self::complete) or
/// [`fail`](Self::fail) puts the cache back to `Empty` and releases waiters.
pub struct PopulateGuard<'a> {
    cache: &'a AlertCache,
    done: Option<watch::Sender<bool>>,
}

impl PopulateGuard<'_> {
    /// Stores a fetch result and marks the cache ready
    pub fn complete(mut self, alerts: Vec<AlertRecord>) {
        self.settle(Some(alerts));
    }

    /// Marks the cache ready but keeps whatever content it had
    pub fn fail(mut self) {
        self.settle(None);
    }

    fn settle(&mut self, alerts: Option<Vec<AlertRecord>>) {
        {
            let mut inner = self.cache.lock();
            if let Some(alerts) = alerts {
                set_cache_open_alerts(alerts.len());
                inner.alerts = Some(alerts);
            }
            inner.phase = Phase::Ready;
        }
        if let Some(done) = self.done.take() {
            let _ = done.send(true);
        }
    }
}

impl Drop for PopulateGuard<'_> {
    fn drop(&mut self) {
        if self.done.take().is_some() {
            debug!("Cache population abandoned, resetting to empty");
            self.cache.lock().phase = Phase::Empty;
        }
    }
}

/// Cache of alerts believed to be open, keyed by hashed alias
pub struct AlertCache {
    inner: Mutex<Inner>,
}

impl AlertCache {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                phase: Phase::Empty,
                alerts: None,
            }),
        }
    }

    // * The lock is never held across an await, so a poisoned guard is still consistent
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> CacheState {
        match self.lock().phase {
            Phase::Empty => CacheState::Empty,
            Phase::Populating(_) => CacheState::Populating,
            Phase::Ready => CacheState::Ready,
        }
    }

    /// Decides who fetches. `force` bypasses a ready cache but still joins an
    /// in-flight fetch instead of starting a second one.
    pub fn begin_populate(&self, force: bool) -> PopulateTicket<'_> {
        let mut inner = self.lock();
        if let Phase::Populating(done) = &inner.phase {
            return PopulateTicket::Wait(PopulateWait { done: done.clone() });
        }
        if matches!(inner.phase, Phase::Ready) && !force {
            return PopulateTicket::Fresh;
        }

        let (tx, rx) = watch::channel(false);
        inner.phase = Phase::Populating(rx);
        PopulateTicket::Lead(PopulateGuard {
            cache: self,
            done: Some(tx),
        })
    }

    /// Copy of the cached alerts; `None` if never populated
    pub fn snapshot(&self) -> Option<Vec<AlertRecord>> {
        self.lock().alerts.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().alerts.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every cached alert created with this alias
    pub fn matching(&self, alias: &HashedAlias) -> Vec<AlertRecord> {
        self.lock()
            .alerts
            .iter()
            .flatten()
            .filter(|record| &record.alias == alias)
            .cloned()
            .collect()
    }

    /// Appends a newly created alert, but only to a populated cache
    pub fn record_created(&self, record: AlertRecord) {
        let mut inner = self.lock();
        if let Some(alerts) = inner.alerts.as_mut() {
            alerts.push(record);
            set_cache_open_alerts(alerts.len());
        }
    }

    /// Drops every entry with this id; returns how many were removed
    pub fn remove_id(&self, id: &str) -> usize {
        let mut inner = self.lock();
        let Some(alerts) = inner.alerts.as_mut() else {
            return 0;
        };
        let before = alerts.len();
        alerts.retain(|record| record.id != id);
        set_cache_open_alerts(alerts.len());
        before - alerts.len()
    }

    /// Forces the next populate request to fetch again; content is kept.
    /// An in-flight fetch is left alone.
    pub fn invalidate(&self) {
        let mut inner = self.lock();
        if matches!(inner.phase, Phase::Ready) {
            inner.phase = Phase::Empty;
        }
    }

    /// Forgets the cached content
    pub fn clear(&self) {
        self.lock().alerts = None;
        set_cache_open_alerts(0);
    }

    /// Overwrites the cached content without touching the phase
    pub fn replace(&self, alerts: Option<Vec<AlertRecord>>) {
        set_cache_open_alerts(alerts.as_ref().map_or(0, Vec::len));
        self.lock().alerts = alerts;
    }
}

impl Default for AlertCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::hashing::hash_alias;
    use futures::future::join_all;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn record(id: &str, alias: &str) -> AlertRecord {
        AlertRecord::new(id, hash_alias(alias))
    }

    // * Mirrors what the gateway does with a ticket
    async fn ensure(cache: &AlertCache, fetches: &AtomicU32, force: bool) {
        match cache.begin_populate(force) {
            PopulateTicket::Fresh => {}
            PopulateTicket::Wait(wait) => wait.finished().await,
            PopulateTicket::Lead(guard) => {
                fetches.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(250)).await;
                guard.complete(vec![record("a-1", "beacon-stale")]);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_fetch() {
        let cache = AlertCache::new();
        let fetches = AtomicU32::new(0);

        join_all((0..8).map(|_| ensure(&cache, &fetches, false))).await;

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(cache.state(), CacheState::Ready);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_cache_is_not_refetched_unless_forced() {
        let cache = AlertCache::new();
        let fetches = AtomicU32::new(0);

        ensure(&cache, &fetches, false).await;
        ensure(&cache, &fetches, false).await;
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        ensure(&cache, &fetches, true).await;
        assert_eq!(fetches.load(Ordering::SeqCst), 2);

        cache.invalidate();
        assert_eq!(cache.state(), CacheState::Empty);
        ensure(&cache, &fetches, false).await;
        assert_eq!(fetches.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_failed_population_keeps_content_and_is_ready() {
        let cache = AlertCache::new();
        cache.replace(Some(vec![record("old", "wallet-low")]));

        match cache.begin_populate(false) {
            PopulateTicket::Lead(guard) => guard.fail(),
            _ => panic!("empty cache must hand out the lead"),
        }

        assert_eq!(cache.state(), CacheState::Ready);
        assert_eq!(cache.snapshot().unwrap()[0].id, "old");
    }

    #[test]
    fn test_failed_first_population_stays_absent() {
        let cache = AlertCache::new();
        if let PopulateTicket::Lead(guard) = cache.begin_populate(false) {
            guard.fail();
        }
        assert_eq!(cache.state(), CacheState::Ready);
        assert!(cache.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_abandoned_leader_resets_and_releases_waiters() {
        let cache = AlertCache::new();
        let guard = match cache.begin_populate(false) {
            PopulateTicket::Lead(guard) => guard,
            _ => panic!("expected lead"),
        };
        let wait = match cache.begin_populate(false) {
            PopulateTicket::Wait(wait) => wait,
            _ => panic!("expected wait"),
        };
        assert_eq!(cache.state(), CacheState::Populating);

        drop(guard);
        wait.finished().await;
        assert_eq!(cache.state(), CacheState::Empty);
    }

    #[test]
    fn test_forced_refresh_joins_in_flight_fetch() {
        let cache = AlertCache::new();
        let _lead = cache.begin_populate(false);
        assert!(matches!(cache.begin_populate(true), PopulateTicket::Wait(_)));
    }

    #[test]
    fn test_record_created_only_when_populated() {
        let cache = AlertCache::new();
        cache.record_created(record("x", "alias"));
        assert!(cache.snapshot().is_none());

        cache.replace(Some(Vec::new()));
        cache.record_created(record("x", "alias"));
        assert_eq!(cache.matching(&hash_alias("alias")).len(), 1);
    }

    #[test]
    fn test_matching_and_remove() {
        let cache = AlertCache::new();
        cache.replace(Some(vec![
            record("a", "dup"),
            record("b", "dup"),
            record("c", "other"),
        ]));

        assert_eq!(cache.matching(&hash_alias("dup")).len(), 2);
        assert!(cache.matching(&hash_alias("dup-unknown")).is_empty());

        assert_eq!(cache.remove_id("a"), 1);
        assert_eq!(cache.remove_id("a"), 0);
        assert_eq!(cache.matching(&hash_alias("dup")), vec![record("b", "dup")]);

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.matching(&hash_alias("other")).is_empty());
    }
}
