//! Per-sender conversation state.
//!
//! One `Session` per sender, kept in a bounded LRU with a TTL on `last_updated`.
//! Every read-modify-write happens under a single lock that is never held across
//! an `.await`, so overlapping requests from one sender cannot interleave and a
//! slow backend call never blocks other senders.
//!
//! Classifications are ordered with tickets: `begin_analysis` hands out the next
//! number from a store-wide counter and only the holder of the sender's latest
//! one may commit. Tickets are never reused, even after a session is evicted or
//! expires and is recreated.

use crate::models::Session;
use chrono::{TimeDelta, Utc};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

/// Sequence number identifying one classification of one sender.
pub type AnalysisTicket = u64;

pub struct SessionStore {
    sessions: Mutex<LruCache<String, Session>>,
    /// Entries idle for longer than this are treated as absent. `None` keeps them forever.
    ttl: Option<TimeDelta>,
    last_ticket: AtomicU64,
}

impl SessionStore {
    pub fn new(capacity: NonZeroUsize, ttl: Option<Duration>) -> Self {
        Self {
            sessions: Mutex::new(LruCache::new(capacity)),
            ttl: ttl.and_then(|ttl| TimeDelta::from_std(ttl).ok()),
            last_ticket: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, Session>> {
        // A panic elsewhere cannot leave a Session half-written: mutators run on a
        // local copy that is only stored once they return.
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_expired(&self, session: &Session) -> bool {
        match self.ttl {
            Some(ttl) => Utc::now().signed_duration_since(session.last_updated) > ttl,
            None => false,
        }
    }

    /// Returns a snapshot of the sender's session, if one is live.
    pub fn get(&self, sender: &str) -> Option<Session> {
        let mut sessions = self.lock();
        let expired = match sessions.get(sender) {
            Some(session) if self.is_expired(session) => true,
            Some(session) => return Some(session.clone()),
            None => return None,
        };
        if expired {
            debug!(sender, "Session expired");
            sessions.pop(sender);
        }
        None
    }

    /// Atomically applies `mutator` to the sender's session, creating it if needed.
    ///
    /// The mutated copy replaces the stored one only after `mutator` returns, and
    /// `last_updated` is refreshed on every call.
    pub fn upsert<R>(&self, sender: &str, mutator: impl FnOnce(&mut Session) -> R) -> R {
        let mut sessions = self.lock();
        let mut session = match sessions.get(sender) {
            Some(existing) if !self.is_expired(existing) => existing.clone(),
            _ => Session::new(),
        };
        let result = mutator(&mut session);
        session.touch();
        sessions.put(sender.to_string(), session);
        result
    }

    /// Marks the sender as welcomed. Returns `true` for exactly one caller per sender.
    pub fn claim_welcome(&self, sender: &str) -> bool {
        self.upsert(sender, |session| {
            if session.welcomed {
                false
            } else {
                session.welcomed = true;
                true
            }
        })
    }

    /// Registers a new classification and returns its ticket.
    ///
    /// Any classification started earlier for this sender becomes stale.
    pub fn begin_analysis(&self, sender: &str) -> AnalysisTicket {
        self.upsert(sender, |session| {
            session.generation = self.last_ticket.fetch_add(1, Ordering::Relaxed) + 1;
            session.pending = true;
            session.generation
        })
    }

    /// Stores `detailed` as the sender's last analysis if `ticket` is still the latest.
    ///
    /// Returns `false`, leaving the session untouched, when a newer classification
    /// has started in the meantime.
    pub fn complete_analysis(&self, sender: &str, ticket: AnalysisTicket, detailed: String) -> bool {
        let stored = self.upsert(sender, |session| {
            if session.generation != ticket {
                return false;
            }
            session.last_detailed_analysis = Some(detailed);
            session.pending = false;
            true
        });
        if !stored {
            debug!(sender, ticket, "Discarded stale analysis");
        }
        stored
    }

    /// Ends the classification for `ticket` without storing a result.
    ///
    /// With `discard_previous`, the analysis cached before this classification is
    /// dropped as well. Stale tickets are ignored.
    pub fn abandon_analysis(&self, sender: &str, ticket: AnalysisTicket, discard_previous: bool) {
        self.upsert(sender, |session| {
            if session.generation == ticket {
                session.pending = false;
                if discard_previous {
                    session.last_detailed_analysis = None;
                }
            }
        });
    }

    /// Removes every expired session. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut sessions = self.lock();
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, session)| self.is_expired(session))
            .map(|(sender, _)| sender.clone())
            .collect();
        for sender in &expired {
            sessions.pop(sender);
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SessionStore {
        SessionStore::new(NonZeroUsize::new(16).unwrap(), None)
    }

    #[test]
    fn test_unknown_sender_has_no_session() {
        assert!(store().get("nobody").is_none());
    }

    #[test]
    fn test_welcome_is_claimed_once() {
        let store = store();
        assert!(store.claim_welcome("u1"));
        assert!(!store.claim_welcome("u1"));
        assert!(store.get("u1").unwrap().welcomed);
    }

    #[test]
    fn test_latest_ticket_commits() {
        let store = store();
        let ticket = store.begin_analysis("u1");
        assert!(store.get("u1").unwrap().pending);

        assert!(store.complete_analysis("u1", ticket, "detail".into()));
        let session = store.get("u1").unwrap();
        assert_eq!(session.last_detailed_analysis.as_deref(), Some("detail"));
        assert!(!session.pending);
    }

    #[test]
    fn test_stale_ticket_is_discarded() {
        let store = store();
        let first = store.begin_analysis("u1");
        let second = store.begin_analysis("u1");

        assert!(store.complete_analysis("u1", second, "newer".into()));
        assert!(!store.complete_analysis("u1", first, "older".into()));
        assert_eq!(
            store.get("u1").unwrap().last_detailed_analysis.as_deref(),
            Some("newer")
        );
    }

    #[test]
    fn test_stale_ticket_cannot_commit_while_newer_is_pending() {
        let store = store();
        let first = store.begin_analysis("u1");
        let _second = store.begin_analysis("u1");

        assert!(!store.complete_analysis("u1", first, "older".into()));
        let session = store.get("u1").unwrap();
        assert!(session.last_detailed_analysis.is_none());
        assert!(session.pending);
    }

    #[test]
    fn test_abandon_keeps_previous_analysis_by_default() {
        let store = store();
        let t1 = store.begin_analysis("u1");
        store.complete_analysis("u1", t1, "kept".into());

        let t2 = store.begin_analysis("u1");
        store.abandon_analysis("u1", t2, false);
        let session = store.get("u1").unwrap();
        assert_eq!(session.last_detailed_analysis.as_deref(), Some("kept"));
        assert!(!session.pending);

        let t3 = store.begin_analysis("u1");
        store.abandon_analysis("u1", t3, true);
        assert!(store.get("u1").unwrap().last_detailed_analysis.is_none());
    }

    #[test]
    fn test_abandon_with_stale_ticket_is_ignored() {
        let store = store();
        let t1 = store.begin_analysis("u1");
        let _t2 = store.begin_analysis("u1");
        store.abandon_analysis("u1", t1, true);
        assert!(store.get("u1").unwrap().pending);
    }

    #[test]
    fn test_ticket_not_reused_after_eviction() {
        let store = SessionStore::new(NonZeroUsize::new(1).unwrap(), None);
        let old = store.begin_analysis("u1");
        store.claim_welcome("u2");
        assert!(store.get("u1").is_none());

        let newer = store.begin_analysis("u1");
        assert_ne!(old, newer);
        assert!(!store.complete_analysis("u1", old, "stale".into()));
        let session = store.get("u1").unwrap();
        assert!(session.last_detailed_analysis.is_none());
        assert!(session.pending);
    }

    #[test]
    fn test_ticket_not_reused_after_expiry() {
        let store = SessionStore::new(NonZeroUsize::new(8).unwrap(), Some(Duration::from_millis(20)));
        let old = store.begin_analysis("u1");
        std::thread::sleep(Duration::from_millis(40));

        let newer = store.begin_analysis("u1");
        assert_ne!(old, newer);
        assert!(!store.complete_analysis("u1", old, "stale".into()));
        assert!(store.complete_analysis("u1", newer, "fresh".into()));
    }

    #[test]
    fn test_capacity_evicts_least_recently_used() {
        let store = SessionStore::new(NonZeroUsize::new(2).unwrap(), None);
        store.claim_welcome("a");
        store.claim_welcome("b");
        store.get("a");
        store.claim_welcome("c");

        assert_eq!(store.len(), 2);
        assert!(store.get("a").is_some());
        assert!(store.get("b").is_none());
        assert!(store.get("c").is_some());
    }

    #[test]
    fn test_expired_sessions_are_absent_and_purged() {
        let store = SessionStore::new(NonZeroUsize::new(8).unwrap(), Some(Duration::from_millis(20)));
        store.claim_welcome("old");
        std::thread::sleep(Duration::from_millis(40));
        store.claim_welcome("fresh");

        assert_eq!(store.purge_expired(), 1);
        assert!(store.get("old").is_none());
        assert!(store.get("fresh").is_some());

        std::thread::sleep(Duration::from_millis(40));
        assert!(store.get("fresh").is_none());
        // An expired sender is greeted again.
        assert!(store.claim_welcome("fresh"));
    }
}
