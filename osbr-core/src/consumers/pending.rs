//! Per-identifier buffers for events produced before anyone listens.
//!
//! Each identifier gets its own async lock, created on first use and
//! retired once its buffer is empty, no flush is running and nobody else
//! holds or waits on it. A consumer holds a [`PendingGuard`] for "check
//! connection, then append or hand off" and for "install connection, then
//! drain", so the two can never interleave for the same identifier. No
//! network call is made while a guard is held.

use crate::identifier::Identifier;
use osbr_sdk::objects::StreamEvent;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// An event waiting for its first connection.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEvent {
    pub event: StreamEvent,
    /// Close the stream after delivering this event.
    pub terminal: bool,
}

#[derive(Default)]
struct PendingQueue {
    events: Vec<PendingEvent>,
    /// A flush task owns delivery for this identifier until it clears this.
    flushing: bool,
}

type Slot = Arc<AsyncMutex<PendingQueue>>;
type SlotMap = Arc<Mutex<HashMap<Identifier, Slot>>>;

#[derive(Default, Clone)]
pub struct PendingBuffers {
    slots: SlotMap,
}

impl PendingBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the buffer for `identifier`, creating it if needed.
    pub async fn lock(&self, identifier: &Identifier) -> PendingGuard {
        let slot = {
            let mut slots = lock_slots(&self.slots);
            slots.entry(identifier.clone()).or_default().clone()
        };
        let guard = slot.clone().lock_owned().await;

        PendingGuard {
            identifier: identifier.clone(),
            slots: self.slots.clone(),
            slot,
            guard,
        }
    }

    /// Number of events waiting for `identifier`.
    pub async fn len(&self, identifier: &Identifier) -> usize {
        self.lock(identifier).await.len()
    }

    /// Number of identifiers that currently own a buffer.
    pub fn tracked(&self) -> usize {
        lock_slots(&self.slots).len()
    }
}

/// Exclusive access to one identifier's buffer.
pub struct PendingGuard {
    identifier: Identifier,
    slots: SlotMap,
    slot: Slot,
    guard: OwnedMutexGuard<PendingQueue>,
}

impl PendingGuard {
    /// Whether a flush task is still delivering this identifier's events.
    pub fn is_flushing(&self) -> bool {
        self.guard.flushing
    }

    pub fn set_flushing(&mut self, flushing: bool) {
        self.guard.flushing = flushing;
    }

    /// Drain the buffer, keeping the slot.
    pub fn take(&mut self) -> Vec<PendingEvent> {
        std::mem::take(&mut self.guard.events)
    }
}

impl Deref for PendingGuard {
    type Target = Vec<PendingEvent>;

    fn deref(&self) -> &Self::Target {
        &self.guard.events
    }
}

impl DerefMut for PendingGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard.events
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if !self.guard.events.is_empty() || self.guard.flushing {
            return;
        }

        let mut slots = lock_slots(&self.slots);
        // Holders: the map, `self.slot` and the owned guard. Anyone else
        // would be waiting on the lock, and new clones need the map lock.
        if Arc::strong_count(&self.slot) == 3 {
            let ours = slots
                .get(&self.identifier)
                .is_some_and(|current| Arc::ptr_eq(current, &self.slot));
            if ours {
                slots.remove(&self.identifier);
            }
        }
    }
}

fn lock_slots(slots: &SlotMap) -> MutexGuard<'_, HashMap<Identifier, Slot>> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::Namespace;
    use std::time::Duration;

    fn id(local: &str) -> Identifier {
        Namespace::new("task").unwrap().identifier(local).unwrap()
    }

    fn pending(n: i64) -> PendingEvent {
        PendingEvent {
            event: StreamEvent::new("tick", serde_json::json!(n)),
            terminal: false,
        }
    }

    #[tokio::test]
    async fn test_buffer_keeps_order_and_retires_when_empty() {
        let buffers = PendingBuffers::new();

        {
            let mut guard = buffers.lock(&id("b")).await;
            guard.push(pending(1));
            guard.push(pending(2));
        }
        assert_eq!(buffers.tracked(), 1);

        {
            let mut guard = buffers.lock(&id("b")).await;
            assert_eq!(*guard, vec![pending(1), pending(2)]);
            guard.clear();
        }
        assert_eq!(buffers.tracked(), 0);
    }

    #[tokio::test]
    async fn test_lock_is_exclusive_per_identifier() {
        let buffers = Arc::new(PendingBuffers::new());
        let held = buffers.lock(&id("a")).await;

        // Another identifier is not blocked.
        let other = tokio::time::timeout(Duration::from_millis(100), buffers.lock(&id("b"))).await;
        assert!(other.is_ok());
        drop(other);

        let waiter = {
            let buffers = buffers.clone();
            tokio::spawn(async move {
                let mut guard = buffers.lock(&id("a")).await;
                guard.push(pending(9));
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(held);
        waiter.await.unwrap();
        assert_eq!(buffers.len(&id("a")).await, 1);
    }

    #[tokio::test]
    async fn test_slot_survives_while_waiter_queued() {
        let buffers = Arc::new(PendingBuffers::new());
        let held = buffers.lock(&id("a")).await;

        let waiter = {
            let buffers = buffers.clone();
            tokio::spawn(async move {
                let mut guard = buffers.lock(&id("a")).await;
                guard.push(pending(1));
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Empty on release, but the waiter still holds the slot.
        drop(held);
        waiter.await.unwrap();
        assert_eq!(buffers.tracked(), 1);
        assert_eq!(buffers.len(&id("a")).await, 1);
    }

    #[tokio::test]
    async fn test_slot_survives_while_flushing() {
        let buffers = PendingBuffers::new();

        {
            let mut guard = buffers.lock(&id("f")).await;
            guard.push(pending(1));
            let drained = guard.take();
            assert_eq!(drained, vec![pending(1)]);
            guard.set_flushing(true);
        }
        assert_eq!(buffers.tracked(), 1);

        {
            let mut guard = buffers.lock(&id("f")).await;
            assert!(guard.is_flushing());
            assert!(guard.is_empty());
            guard.set_flushing(false);
        }
        assert_eq!(buffers.tracked(), 0);
    }
}
