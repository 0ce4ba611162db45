//! Shared test harness: scripted device mock, store decorators, and a
//! manager wired up with fast retry timings.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use secrecy::SecretString;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use roslease::clock::ManualClock;
use roslease::core::{AuditAction, LeaseFilter, LeaseId, LeaseRecord, LeaseState, StoreError};
use roslease::store::{LeaseStore, MemoryLeaseStore, StateFields};
use roslease::{
    AccountCounts, AuditRecorder, Confirmation, DeviceAddress, DeviceCommander, DeviceError,
    DeviceResult, LeaseManager, ManagerConfig, MemoryAuditSink, RetryPolicy,
};

/// Scripted in-memory stand-in for a RouterOS device.
///
/// Keeps the remote account table as a set, counts calls, and serves
/// queued failures: a global queue for creates, per-username queues
/// for deletes.
#[derive(Default)]
pub struct MockDevice {
    accounts: Mutex<HashSet<(String, String)>>,
    create_failures: Mutex<VecDeque<DeviceError>>,
    delete_failures: Mutex<HashMap<String, VecDeque<DeviceError>>>,
    delete_delay: Mutex<Option<Duration>>,
    pub create_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an error for the next create call.
    pub fn fail_next_create(&self, error: DeviceError) {
        self.create_failures.lock().push_back(error);
    }

    /// Queue errors for delete calls targeting `username`.
    pub fn fail_deletes_for(&self, username: &str, errors: Vec<DeviceError>) {
        self.delete_failures
            .lock()
            .entry(username.to_string())
            .or_default()
            .extend(errors);
    }

    /// Delay every delete call, to widen race windows.
    pub fn set_delete_delay(&self, delay: Duration) {
        *self.delete_delay.lock() = Some(delay);
    }

    pub fn has_account(&self, device: &DeviceAddress, username: &str) -> bool {
        self.accounts
            .lock()
            .contains(&(device.to_string(), username.to_string()))
    }

    pub fn account_count(&self) -> usize {
        self.accounts.lock().len()
    }

    pub fn timeout_error(operation: &'static str) -> DeviceError {
        DeviceError::Timeout {
            device: "10.0.0.1:8728".to_string(),
            operation,
        }
    }
}

#[async_trait]
impl DeviceCommander for MockDevice {
    async fn create_account(
        &self,
        device: &DeviceAddress,
        username: &str,
        _group: &str,
        _password: &SecretString,
        _comment: &str,
    ) -> DeviceResult<Confirmation> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.create_failures.lock().pop_front() {
            return Err(error);
        }
        self.accounts
            .lock()
            .insert((device.to_string(), username.to_string()));
        Ok(Confirmation {
            device: device.clone(),
            username: username.to_string(),
        })
    }

    async fn delete_account(
        &self,
        device: &DeviceAddress,
        username: &str,
    ) -> DeviceResult<Confirmation> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delete_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self
            .delete_failures
            .lock()
            .get_mut(username)
            .and_then(VecDeque::pop_front);
        if let Some(error) = scripted {
            return Err(error);
        }
        self.accounts
            .lock()
            .remove(&(device.to_string(), username.to_string()));
        Ok(Confirmation {
            device: device.clone(),
            username: username.to_string(),
        })
    }

    async fn account_exists(&self, device: &DeviceAddress, username: &str) -> DeviceResult<bool> {
        Ok(self.has_account(device, username))
    }

    async fn check_reachable(&self, _device: &DeviceAddress) -> DeviceResult<bool> {
        Ok(true)
    }

    async fn fetch_identity(&self, _device: &DeviceAddress) -> DeviceResult<Option<String>> {
        Ok(Some("mock-router".to_string()))
    }

    async fn count_accounts(&self, device: &DeviceAddress) -> DeviceResult<AccountCounts> {
        let accounts = self.accounts.lock();
        let total = accounts.iter().filter(|(d, _)| *d == device.to_string()).count();
        Ok(AccountCounts {
            total,
            temporary: total,
        })
    }
}

/// Store decorator that rejects the first `n` inserts with a conflict,
/// simulating username collisions deterministically.
pub struct ConflictingStore {
    inner: MemoryLeaseStore,
    conflicts_left: AtomicUsize,
}

impl ConflictingStore {
    pub fn new(conflicts: usize) -> Self {
        Self {
            inner: MemoryLeaseStore::new(),
            conflicts_left: AtomicUsize::new(conflicts),
        }
    }
}

#[async_trait]
impl LeaseStore for ConflictingStore {
    async fn insert(&self, record: LeaseRecord) -> Result<(), StoreError> {
        if self
            .conflicts_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::Conflict {
                device: record.device.to_string(),
                username: record.username,
            });
        }
        self.inner.insert(record).await
    }

    async fn update_state(
        &self,
        id: LeaseId,
        expected: LeaseState,
        new: LeaseState,
        fields: StateFields,
    ) -> Result<LeaseRecord, StoreError> {
        self.inner.update_state(id, expected, new, fields).await
    }

    async fn find_by_id(&self, id: LeaseId) -> Result<Option<LeaseRecord>, StoreError> {
        self.inner.find_by_id(id).await
    }

    async fn find_live_by_device_user(
        &self,
        device: &DeviceAddress,
        username: &str,
    ) -> Result<Option<LeaseRecord>, StoreError> {
        self.inner.find_live_by_device_user(device, username).await
    }

    async fn find_due_for_expiry(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<LeaseRecord>, StoreError> {
        self.inner.find_due_for_expiry(now).await
    }

    async fn list(&self, filter: &LeaseFilter) -> Result<Vec<LeaseRecord>, StoreError> {
        self.inner.list(filter).await
    }
}

/// Store decorator that fails the first `n` state updates with a
/// backend error, for exercising the activation rollback path.
pub struct FlakyUpdateStore {
    inner: MemoryLeaseStore,
    failures_left: AtomicUsize,
}

impl FlakyUpdateStore {
    pub fn new(failures: usize) -> Self {
        Self {
            inner: MemoryLeaseStore::new(),
            failures_left: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl LeaseStore for FlakyUpdateStore {
    async fn insert(&self, record: LeaseRecord) -> Result<(), StoreError> {
        self.inner.insert(record).await
    }

    async fn update_state(
        &self,
        id: LeaseId,
        expected: LeaseState,
        new: LeaseState,
        fields: StateFields,
    ) -> Result<LeaseRecord, StoreError> {
        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::Backend {
                detail: "injected write failure".to_string(),
            });
        }
        self.inner.update_state(id, expected, new, fields).await
    }

    async fn find_by_id(&self, id: LeaseId) -> Result<Option<LeaseRecord>, StoreError> {
        self.inner.find_by_id(id).await
    }

    async fn find_live_by_device_user(
        &self,
        device: &DeviceAddress,
        username: &str,
    ) -> Result<Option<LeaseRecord>, StoreError> {
        self.inner.find_live_by_device_user(device, username).await
    }

    async fn find_due_for_expiry(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<LeaseRecord>, StoreError> {
        self.inner.find_due_for_expiry(now).await
    }

    async fn list(&self, filter: &LeaseFilter) -> Result<Vec<LeaseRecord>, StoreError> {
        self.inner.list(filter).await
    }
}

/// Everything a test needs to drive the manager and inspect the world.
pub struct Harness {
    pub manager: Arc<LeaseManager>,
    pub store: Arc<MemoryLeaseStore>,
    pub device: Arc<MockDevice>,
    pub sink: Arc<MemoryAuditSink>,
    pub clock: Arc<ManualClock>,
}

/// Retry timings fast enough for tests; semantics unchanged.
pub fn fast_config() -> ManagerConfig {
    ManagerConfig {
        retry: RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_millis(5),
        },
        ..ManagerConfig::default()
    }
}

pub fn test_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

pub fn harness() -> Harness {
    harness_with_config(fast_config())
}

pub fn harness_with_config(config: ManagerConfig) -> Harness {
    let store = Arc::new(MemoryLeaseStore::new());
    let device = Arc::new(MockDevice::new());
    let sink = Arc::new(MemoryAuditSink::new());
    let clock = Arc::new(ManualClock::new(test_start()));
    let manager = Arc::new(LeaseManager::new(
        store.clone(),
        device.clone(),
        AuditRecorder::new(sink.clone(), config.audit_attempts),
        clock.clone(),
        config,
    ));
    Harness {
        manager,
        store,
        device,
        sink,
        clock,
    }
}

/// Manager over a custom store, with the mock device and manual clock.
pub fn manager_with_store(
    store: Arc<dyn LeaseStore>,
) -> (Arc<LeaseManager>, Arc<MockDevice>, Arc<MemoryAuditSink>) {
    let config = fast_config();
    let device = Arc::new(MockDevice::new());
    let sink = Arc::new(MemoryAuditSink::new());
    let clock = Arc::new(ManualClock::new(test_start()));
    let manager = Arc::new(LeaseManager::new(
        store,
        device.clone(),
        AuditRecorder::new(sink.clone(), config.audit_attempts),
        clock,
        config,
    ));
    (manager, device, sink)
}

/// Number of audit entries with the given action.
pub fn audit_count(sink: &MemoryAuditSink, action: AuditAction) -> usize {
    sink.entries().iter().filter(|e| e.action == action).count()
}
