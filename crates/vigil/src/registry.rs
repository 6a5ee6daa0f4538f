//! Endpoint registry: the authoritative id → record mapping.
//!
//! Locks are plain `std::sync` locks held only for in-memory copies, never
//! across an `.await`. Lock order is always membership → config → health.
//! Each record keeps its user-editable config and its scheduler-owned health
//! behind separate locks so an edit and a status write-back do not contend.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tracing::debug;

use crate::error::RegistryError;
use crate::model::{Endpoint, EndpointConfig, Health, ProbeOutcome, ProbeRecord, StatusEvent};

/// Default number of probe results kept per endpoint
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

struct Slot {
    /// Unique per creation; a deleted and re-created id gets a new epoch
    epoch: u64,
    config: RwLock<EndpointConfig>,
    health: Mutex<HealthState>,
}

#[derive(Default)]
struct HealthState {
    health: Health,
    history: VecDeque<ProbeRecord>,
}

#[derive(Default)]
struct Members {
    order: Vec<String>,
    slots: HashMap<String, Arc<Slot>>,
}

/// The scheduler's view of one enabled endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub epoch: u64,
    pub config: EndpointConfig,
}

/// Point-in-time copy of all records, in insertion order.
///
/// Iterating is restartable and never observes later registry changes.
#[derive(Debug, Clone)]
pub struct Snapshot {
    records: Arc<[Endpoint]>,
}

impl Snapshot {
    pub fn iter(&self) -> std::slice::Iter<'_, Endpoint> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn to_vec(&self) -> Vec<Endpoint> {
        self.records.to_vec()
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a Endpoint;
    type IntoIter = std::slice::Iter<'a, Endpoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct Registry {
    members: RwLock<Members>,
    next_epoch: AtomicU64,
    changed: Notify,
    history_limit: usize,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_history_limit(history_limit: usize) -> Self {
        Self {
            members: RwLock::new(Members::default()),
            next_epoch: AtomicU64::new(1),
            changed: Notify::new(),
            history_limit: history_limit.max(1),
        }
    }

    /// Probe results kept per record
    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Insert a new record with `unknown` health
    pub fn create(&self, config: EndpointConfig) -> Result<Endpoint, RegistryError> {
        let mut members = write(&self.members);
        if members.slots.contains_key(&config.id) {
            return Err(RegistryError::DuplicateId(config.id));
        }

        let id = config.id.clone();
        let endpoint = Endpoint { config: config.clone(), health: Health::default() };
        members.order.push(id.clone());
        members.slots.insert(id.clone(), Arc::new(self.new_slot(config)));
        drop(members);

        debug!(id = %id, "endpoint created");
        self.changed.notify_one();
        Ok(endpoint)
    }

    /// Replace every config field of an existing record except its id.
    /// Health is preserved.
    pub fn update(&self, id: &str, mut config: EndpointConfig) -> Result<Endpoint, RegistryError> {
        let members = read(&self.members);
        let slot = members.slots.get(id).ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        config.id = id.to_string();
        *write(&slot.config) = config.clone();
        let health = lock(&slot.health).health.clone();
        drop(members);

        debug!(id = %id, "endpoint updated");
        self.changed.notify_one();
        Ok(Endpoint { config, health })
    }

    /// Remove a record. A probe already in flight for it will have its result
    /// rejected by [`Registry::record_probe`].
    pub fn delete(&self, id: &str) -> Result<(), RegistryError> {
        let mut members = write(&self.members);
        if members.slots.remove(id).is_none() {
            return Err(RegistryError::NotFound(id.to_string()));
        }
        members.order.retain(|existing| existing != id);
        drop(members);

        debug!(id = %id, "endpoint deleted");
        self.changed.notify_one();
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Endpoint, RegistryError> {
        let members = read(&self.members);
        members
            .slots
            .get(id)
            .map(|slot| slot.endpoint())
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        read(&self.members).slots.contains_key(id)
    }

    pub fn len(&self) -> usize {
        read(&self.members).order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn list(&self) -> Snapshot {
        let members = read(&self.members);
        let records: Vec<Endpoint> = members
            .order
            .iter()
            .filter_map(|id| members.slots.get(id))
            .map(|slot| slot.endpoint())
            .collect();
        Snapshot { records: records.into() }
    }

    /// Configs of all records in insertion order, without health
    pub fn configs(&self) -> Vec<EndpointConfig> {
        let members = read(&self.members);
        members
            .order
            .iter()
            .filter_map(|id| members.slots.get(id))
            .map(|slot| read(&slot.config).clone())
            .collect()
    }

    /// Atomically replace the whole record set.
    ///
    /// Ids present before and after keep their health and epoch; everything
    /// else starts over as `unknown`. Duplicate ids reject the batch without
    /// touching the registry.
    pub fn replace_all(&self, configs: Vec<EndpointConfig>) -> Result<(), RegistryError> {
        let mut seen = HashSet::new();
        for config in &configs {
            if !seen.insert(config.id.as_str()) {
                return Err(RegistryError::DuplicateId(config.id.clone()));
            }
        }

        let mut members = write(&self.members);
        let mut next = Members::default();
        for config in configs {
            let id = config.id.clone();
            let slot = match members.slots.remove(&id) {
                Some(existing) => {
                    *write(&existing.config) = config;
                    existing
                }
                None => Arc::new(self.new_slot(config)),
            };
            next.order.push(id.clone());
            next.slots.insert(id, slot);
        }
        *members = next;
        drop(members);

        self.changed.notify_one();
        Ok(())
    }

    pub fn history(&self, id: &str) -> Result<Vec<ProbeRecord>, RegistryError> {
        let members = read(&self.members);
        let slot = members.slots.get(id).ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        let state = lock(&slot.health);
        Ok(state.history.iter().cloned().collect())
    }

    /// Enabled records, as the scheduler should run them
    pub fn assignments(&self) -> Vec<Assignment> {
        let members = read(&self.members);
        members
            .order
            .iter()
            .filter_map(|id| members.slots.get(id))
            .filter_map(|slot| slot.assignment())
            .collect()
    }

    /// Current assignment for one id, if it is still enabled and was not
    /// re-created since `epoch`
    pub fn assignment(&self, id: &str, epoch: u64) -> Option<Assignment> {
        let members = read(&self.members);
        members.slots.get(id).filter(|slot| slot.epoch == epoch).and_then(|slot| slot.assignment())
    }

    /// Write a probe result back.
    ///
    /// The write is accepted only if the record still exists with the same
    /// epoch and is enabled; otherwise the result is discarded and `None` is
    /// returned. The membership lock is held for the whole write so a
    /// concurrent delete is either fully before or fully after it.
    pub fn record_probe(
        &self,
        id: &str,
        epoch: u64,
        outcome: &ProbeOutcome,
        checked_at: DateTime<Utc>,
    ) -> Option<StatusEvent> {
        let members = read(&self.members);
        let slot = members.slots.get(id).filter(|slot| slot.epoch == epoch)?;
        let config = read(&slot.config);
        if !config.enabled {
            return None;
        }

        let mut state = lock(&slot.health);
        let previous = state.health.status;
        state.health = Health {
            status: outcome.status,
            last_check: Some(checked_at),
            reason: outcome.reason,
            latency_ms: outcome.latency_ms,
        };
        state.history.push_back(ProbeRecord {
            checked_at,
            status: outcome.status,
            reason: outcome.reason,
            http_status: outcome.http_status,
            latency_ms: outcome.latency_ms,
            detail: outcome.detail.clone(),
        });
        while state.history.len() > self.history_limit {
            state.history.pop_front();
        }

        Some(StatusEvent {
            id: config.id.clone(),
            name: config.name.clone(),
            url: config.url.clone(),
            previous,
            current: outcome.status,
            reason: outcome.reason,
            detail: outcome.detail.clone(),
            checked_at,
        })
    }

    /// Resolves after the next mutation (or immediately if one happened since
    /// the last call). Only one waiter is expected: the scheduler.
    pub async fn changed(&self) {
        self.changed.notified().await;
    }

    fn new_slot(&self, config: EndpointConfig) -> Slot {
        Slot {
            epoch: self.next_epoch.fetch_add(1, Ordering::Relaxed),
            config: RwLock::new(config),
            health: Mutex::new(HealthState::default()),
        }
    }
}

impl Slot {
    fn endpoint(&self) -> Endpoint {
        let config = read(&self.config).clone();
        let health = lock(&self.health).health.clone();
        Endpoint { config, health }
    }

    fn assignment(&self) -> Option<Assignment> {
        let config = read(&self.config);
        config.enabled.then(|| Assignment { epoch: self.epoch, config: config.clone() })
    }
}

// A panic while holding one of these locks cannot leave a record half-written
// (every write is a single assignment), so poisoning is ignored.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
