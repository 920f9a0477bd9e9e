//! In-memory state store.
//!
//! A faithful in-process stand-in for the Redis backend: same per-operation
//! atomicity, same blocking-pop wakeup behavior, same TTL lapse semantics.
//! Everything the dispatch core observes through the contract behaves
//! identically, which is what makes the scheduler and worker loops testable
//! without a network.
//!
//! Interior state lives under one `std` mutex; no lock is ever held across
//! an await point. Blocking pops park on a [`Notify`] that every list push
//! pulses.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::contract::StateStore;
use crate::error::StoreResult;

#[derive(Default)]
struct Shared {
    lists: HashMap<String, VecDeque<String>>,
    hashes: HashMap<String, HashMap<String, String>>,
    sets: HashMap<String, BTreeSet<String>>,
    strings: HashMap<String, (String, Option<Instant>)>,
}

/// In-process state store for tests and single-node experiments.
#[derive(Default)]
pub struct MemoryStore {
    shared: Mutex<Shared>,
    wakeup: Notify,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn pop_now(&self, key: &str) -> Option<String> {
        let mut shared = self.shared.lock().expect("store mutex poisoned");
        shared.lists.get_mut(key).and_then(VecDeque::pop_front)
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn list_push_tail(&self, key: &str, value: &str) -> StoreResult<()> {
        {
            let mut shared = self.shared.lock().expect("store mutex poisoned");
            shared
                .lists
                .entry(key.to_string())
                .or_default()
                .push_back(value.to_string());
        }
        self.wakeup.notify_waiters();
        Ok(())
    }

    async fn list_push_head(&self, key: &str, value: &str) -> StoreResult<()> {
        {
            let mut shared = self.shared.lock().expect("store mutex poisoned");
            shared
                .lists
                .entry(key.to_string())
                .or_default()
                .push_front(value.to_string());
        }
        self.wakeup.notify_waiters();
        Ok(())
    }

    async fn list_index(&self, key: &str, index: usize) -> StoreResult<Option<String>> {
        let shared = self.shared.lock().expect("store mutex poisoned");
        Ok(shared
            .lists
            .get(key)
            .and_then(|list| list.get(index))
            .cloned())
    }

    async fn list_len(&self, key: &str) -> StoreResult<usize> {
        let shared = self.shared.lock().expect("store mutex poisoned");
        Ok(shared.lists.get(key).map_or(0, VecDeque::len))
    }

    async fn list_remove_first(&self, key: &str, value: &str) -> StoreResult<bool> {
        let mut shared = self.shared.lock().expect("store mutex poisoned");
        let Some(list) = shared.lists.get_mut(key) else {
            return Ok(false);
        };
        match list.iter().position(|item| item == value) {
            Some(index) => {
                list.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_pop_head_blocking(
        &self,
        key: &str,
        timeout: Duration,
    ) -> StoreResult<Option<String>> {
        let deadline = Instant::now() + timeout;
        loop {
            // Register interest before the emptiness check so a push racing
            // with the check still wakes us.
            let notified = self.wakeup.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(value) = self.pop_now(key) {
                return Ok(Some(value));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            let _ = tokio::time::timeout_at(deadline, notified).await;
        }
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        let mut shared = self.shared.lock().expect("store mutex poisoned");
        shared
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn hash_get(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        let shared = self.shared.lock().expect("store mutex poisoned");
        Ok(shared
            .hashes
            .get(key)
            .and_then(|hash| hash.get(field))
            .cloned())
    }

    async fn hash_set_all(&self, key: &str, entries: Vec<(String, String)>) -> StoreResult<()> {
        let mut shared = self.shared.lock().expect("store mutex poisoned");
        let hash = shared.hashes.entry(key.to_string()).or_default();
        for (field, value) in entries {
            hash.insert(field, value);
        }
        Ok(())
    }

    async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let shared = self.shared.lock().expect("store mutex poisoned");
        Ok(shared.hashes.get(key).cloned().unwrap_or_default())
    }

    async fn set_add(&self, key: &str, member: &str) -> StoreResult<()> {
        let mut shared = self.shared.lock().expect("store mutex poisoned");
        shared
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        let shared = self.shared.lock().expect("store mutex poisoned");
        Ok(shared
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn string_set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> StoreResult<()> {
        let mut shared = self.shared.lock().expect("store mutex poisoned");
        shared.strings.insert(
            key.to_string(),
            (value.to_string(), Some(Instant::now() + ttl)),
        );
        Ok(())
    }

    async fn string_get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut shared = self.shared.lock().expect("store mutex poisoned");
        match shared.strings.get(key) {
            Some((_, Some(expiry))) if *expiry <= Instant::now() => {
                shared.strings.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
