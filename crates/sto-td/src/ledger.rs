//! Pending-request ledger.
//!
//! The backend protocol has no request ids, so a request is completed by the
//! next inbound envelope carrying its reply tag. The ledger holds at most one
//! waiter per tag. What happens to a second request for a tag that is still
//! in flight is decided by the [`OverlapPolicy`].
//!
//! `has`/`is_loading_any` are synchronous so UI code can poll them for
//! loading indicators.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use ahash::AHashMap;
use serde_json::Value;
use sto_core::config::OverlapPolicy;
use sto_core::error::StoError;
use tokio::sync::oneshot;
use tracing::{debug, warn};

type Reply = Result<Option<Value>, StoError>;

/// Handle to one registered waiter.
#[derive(Debug)]
pub struct Ticket {
    tag: String,
    id: u64,
    rx: oneshot::Receiver<Reply>,
}

impl Ticket {
    pub fn tag(&self) -> &str {
        &self.tag
    }
}

struct Slot {
    id: u64,
    tx: oneshot::Sender<Reply>,
}

pub struct PendingLedger {
    policy: OverlapPolicy,
    slots: Mutex<AHashMap<String, Slot>>,
    next_id: AtomicU64,
}

impl PendingLedger {
    pub fn new(policy: OverlapPolicy) -> Self {
        Self { policy, slots: Mutex::new(AHashMap::new()), next_id: AtomicU64::new(1) }
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, AHashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a waiter for `tag`.
    ///
    /// Under `Reject` a tag already in flight fails with `RequestInFlight`.
    /// Under `Replace` the earlier waiter is abandoned: it is never resolved
    /// and ends only by its timeout.
    pub fn register(&self, tag: &str) -> Result<Ticket, StoError> {
        let mut slots = self.slots();
        if slots.contains_key(tag) {
            match self.policy {
                OverlapPolicy::Reject => {
                    return Err(StoError::RequestInFlight { op: tag.to_string() });
                }
                OverlapPolicy::Replace => {
                    warn!("[ledger] '{tag}' re-issued while in flight, abandoning earlier waiter");
                }
            }
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        slots.insert(tag.to_string(), Slot { id, tx });
        Ok(Ticket { tag: tag.to_string(), id, rx })
    }

    /// Wait for the reply to `ticket`. `None` timeout waits forever.
    ///
    /// On timeout the waiter's own entry is removed; a newer waiter for the
    /// same tag is left alone.
    pub async fn wait(&self, ticket: Ticket, timeout: Option<Duration>) -> Result<Option<Value>, StoError> {
        let Ticket { tag, id, rx } = ticket;
        let reply = async move {
            match rx.await {
                Ok(reply) => reply,
                // Sender dropped: this waiter was replaced. It stays pending.
                Err(_) => std::future::pending().await,
            }
        };
        let Some(after) = timeout else {
            return reply.await;
        };
        match tokio::time::timeout(after, reply).await {
            Ok(reply) => reply,
            Err(_) => {
                self.forget(&tag, id);
                warn!("[ledger] '{tag}' timed out after {after:?}");
                Err(StoError::RequestTimeout { op: tag, after })
            }
        }
    }

    /// Drop the waiter `id` for `tag` if it is still the registered one.
    pub fn cancel(&self, ticket: &Ticket) {
        self.forget(&ticket.tag, ticket.id);
    }

    fn forget(&self, tag: &str, id: u64) {
        let mut slots = self.slots();
        if slots.get(tag).is_some_and(|slot| slot.id == id) {
            slots.remove(tag);
        }
    }

    /// Complete the waiter for `tag` with `data`. Returns whether one existed.
    pub fn resolve(&self, tag: &str, data: Option<Value>) -> bool {
        self.complete(tag, Ok(data))
    }

    /// Complete the waiter for `tag` with an error, e.g. an undecodable reply.
    pub fn fail(&self, tag: &str, err: StoError) -> bool {
        self.complete(tag, Err(err))
    }

    fn complete(&self, tag: &str, reply: Reply) -> bool {
        let Some(slot) = self.slots().remove(tag) else {
            return false;
        };
        debug!("[ledger] completed '{tag}' ok={}", reply.is_ok());
        // The waiter may have given up already (dropped future); nothing to do.
        let _ = slot.tx.send(reply);
        true
    }

    /// Whether any of `tags` has an outstanding waiter.
    pub fn has(&self, tags: &[&str]) -> bool {
        let slots = self.slots();
        tags.iter().any(|t| slots.contains_key(*t))
    }

    pub fn is_pending(&self, tag: &str) -> bool {
        self.has(&[tag])
    }

    pub fn is_loading_any(&self) -> bool {
        !self.slots().is_empty()
    }

    /// Tags currently in flight, sorted.
    pub fn pending_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.slots().keys().cloned().collect();
        tags.sort();
        tags
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;

    #[test]
    fn resolve_without_waiter_is_noop() {
        let ledger = PendingLedger::new(OverlapPolicy::Reject);
        assert!(!ledger.resolve("positions", Some(json!([]))));
        assert!(!ledger.is_loading_any());
    }

    #[tokio::test]
    async fn resolve_completes_waiter_and_clears_flag() {
        let ledger = PendingLedger::new(OverlapPolicy::Reject);
        let ticket = ledger.register("positions").unwrap();
        assert!(ledger.has(&["symbolInfo", "positions"]));
        assert!(!ledger.has(&["symbolInfo"]));
        assert!(ledger.is_loading_any());

        assert!(ledger.resolve("positions", Some(json!([1]))));
        let data = ledger.wait(ticket, Some(Duration::from_secs(1))).await.unwrap();
        assert_eq!(data, Some(json!([1])));
        assert!(!ledger.is_pending("positions"));
    }

    #[tokio::test]
    async fn fail_hands_the_error_to_the_waiter() {
        let ledger = PendingLedger::new(OverlapPolicy::Reject);
        let ticket = ledger.register("positions").unwrap();
        assert!(ledger.fail("positions", StoError::Parse("'positions' data: bad".into())));
        let err = ledger.wait(ticket, Some(Duration::from_secs(1))).await.unwrap_err();
        assert!(matches!(err, StoError::Parse(_)));
        assert!(!ledger.is_loading_any());
        assert!(!ledger.fail("positions", StoError::Parse("late".into())));
    }

    #[test]
    fn reject_policy_refuses_overlap() {
        let ledger = PendingLedger::new(OverlapPolicy::Reject);
        let _first = ledger.register("strategy").unwrap();
        let err = ledger.register("strategy").unwrap_err();
        assert!(matches!(err, StoError::RequestInFlight { ref op } if op == "strategy"));
    }

    #[tokio::test]
    async fn replace_policy_dispatches_only_to_latest_waiter() {
        let ledger = Arc::new(PendingLedger::new(OverlapPolicy::Replace));
        let first = ledger.register("positions").unwrap();
        let second = ledger.register("positions").unwrap();

        assert!(ledger.resolve("positions", Some(json!("a"))));
        assert!(!ledger.resolve("positions", Some(json!("b"))));

        let got = ledger.wait(second, Some(Duration::from_secs(1))).await.unwrap();
        assert_eq!(got, Some(json!("a")));

        // The abandoned waiter is never resolved, only timed out.
        let err = ledger.wait(first, Some(Duration::from_millis(20))).await.unwrap_err();
        assert!(matches!(err, StoError::RequestTimeout { .. }));
    }

    #[tokio::test]
    async fn timeout_removes_only_its_own_entry() {
        let ledger = Arc::new(PendingLedger::new(OverlapPolicy::Replace));
        let stale = ledger.register("accountInfo").unwrap();
        let fresh = ledger.register("accountInfo").unwrap();

        let err = ledger.wait(stale, Some(Duration::from_millis(10))).await.unwrap_err();
        assert!(matches!(err, StoError::RequestTimeout { ref op, .. } if op == "accountInfo"));
        assert!(ledger.is_pending("accountInfo"));

        let err = ledger.wait(fresh, Some(Duration::from_millis(10))).await.unwrap_err();
        assert!(matches!(err, StoError::RequestTimeout { .. }));
        assert!(!ledger.is_loading_any());
    }

    #[tokio::test]
    async fn resolve_from_another_task() {
        let ledger = Arc::new(PendingLedger::new(OverlapPolicy::Reject));
        let ticket = ledger.register("symbolInfo").unwrap();
        let resolver = Arc::clone(&ledger);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            resolver.resolve("symbolInfo", None);
        });
        assert_eq!(ledger.wait(ticket, None).await.unwrap(), None);
        assert_eq!(ledger.pending_tags(), Vec::<String>::new());
    }
}
