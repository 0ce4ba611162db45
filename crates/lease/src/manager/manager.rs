//! The lifecycle manager: issue, revoke, sweep, recover.

use chrono::{DateTime, Utc};
use roslease_device::{
    AccountCounts, DeviceAddress, DeviceCommander, DeviceError, TEMP_ACCOUNT_MARKER,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::config::ManagerConfig;
use super::credentials;
use crate::audit::AuditRecorder;
use crate::clock::Clock;
use crate::core::{
    AccessRole, AuditAction, AuditEntry, LeaseFilter, LeaseId, LeaseRecord, LeaseState,
    ManagerError, ManagerResult, StoreError, ValidationError,
};
use crate::store::{LeaseStore, StateFields};

/// Actor name the expiry sweep acts under.
pub const SYSTEM_ACTOR: &str = "system";

/// A request to issue a temporary credential.
#[derive(Debug, Clone)]
pub struct IssueRequest {
    /// Target device.
    pub device: DeviceAddress,
    /// Capability level for the account.
    pub role: AccessRole,
    /// How long the credential should live.
    pub duration: Duration,
    /// Why the access is needed.
    pub purpose: String,
}

/// A freshly issued lease.
///
/// The password is handed out exactly once, here; it is never stored.
#[derive(Debug)]
pub struct IssuedLease {
    /// The activated record.
    pub record: LeaseRecord,
    /// Generated device password.
    pub password: SecretString,
}

/// Outcome tally of one sweep run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Leases moved to `Revoked`.
    pub revoked: usize,
    /// Leases moved to `Failed` after retry exhaustion.
    pub failed: usize,
    /// Leases another actor handled first.
    pub skipped: usize,
}

/// Operator-facing device summary.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Whether the API port accepted a connection.
    pub reachable: bool,
    /// Device identity name, when readable.
    pub identity: Option<String>,
    /// Account counts, when readable.
    pub accounts: Option<AccountCounts>,
}

/// Outcome of one revoke attempt chain on an `Active` record.
enum RevokeOutcome {
    Revoked(LeaseRecord),
    /// A concurrent sweep or manual revoke committed first.
    AlreadyHandled,
}

/// Orchestrates the lease state machine.
///
/// Sole writer of record state transitions; every transition goes
/// through the store's compare-and-set, so a sweep and a manual
/// revoke racing on one record commit exactly once between them.
pub struct LeaseManager {
    store: Arc<dyn LeaseStore>,
    device: Arc<dyn DeviceCommander>,
    audit: AuditRecorder,
    clock: Arc<dyn Clock>,
    config: ManagerConfig,
    /// Per-device fan-out limits, created lazily per address.
    device_limits: parking_lot::Mutex<HashMap<DeviceAddress, Arc<Semaphore>>>,
}

impl LeaseManager {
    /// Assemble a manager from its collaborators.
    pub fn new(
        store: Arc<dyn LeaseStore>,
        device: Arc<dyn DeviceCommander>,
        audit: AuditRecorder,
        clock: Arc<dyn Clock>,
        config: ManagerConfig,
    ) -> Self {
        Self {
            store,
            device,
            audit,
            clock,
            config,
            device_limits: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// The injected clock.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// The active configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Issue a temporary credential on a device.
    ///
    /// Inserts the record as `Pending`, creates the remote account,
    /// then activates the record. A device failure leaves the record in
    /// `Failed` for operator reconciliation; it is never deleted. If
    /// the activation write itself fails, the remote account is
    /// best-effort rolled back, since record consistency outranks
    /// device-side success.
    pub async fn issue(&self, request: IssueRequest, actor: &str) -> ManagerResult<IssuedLease> {
        self.issue_internal(request, actor, None).await
    }

    /// Issue a successor lease for an `Active` one.
    ///
    /// Deadlines are immutable, so extending never touches the old
    /// record: a new lease on the same device and role is issued with
    /// `extends` pointing at the original, which keeps expiring on its
    /// own schedule.
    pub async fn extend(
        &self,
        id: LeaseId,
        duration: Duration,
        actor: &str,
    ) -> ManagerResult<IssuedLease> {
        let original = self.load(id).await?;
        if original.state != LeaseState::Active {
            return Err(ManagerError::InvalidState {
                id,
                actual: original.state,
                required: LeaseState::Active,
            });
        }
        let request = IssueRequest {
            device: original.device,
            role: original.role,
            duration,
            purpose: original.purpose,
        };
        self.issue_internal(request, actor, Some(id)).await
    }

    async fn issue_internal(
        &self,
        request: IssueRequest,
        actor: &str,
        extends: Option<LeaseId>,
    ) -> ManagerResult<IssuedLease> {
        self.validate(&request, actor)?;

        let now = self.clock.now();
        let expires_at = now
            + chrono::Duration::from_std(request.duration)
                .map_err(|_| ValidationError::DurationTooLong {
                    requested_secs: request.duration.as_secs(),
                    max_secs: self.config.max_duration.as_secs(),
                })?;

        // Enrichment only; an unreadable identity never blocks issue.
        let device_identity = match self.device.fetch_identity(&request.device).await {
            Ok(identity) => identity,
            Err(e) => {
                debug!(device = %request.device, error = %e, "identity lookup failed");
                None
            }
        };

        let password = credentials::generate_password(self.config.password_length);
        let record = self
            .insert_pending(&request, actor, now, expires_at, device_identity, extends)
            .await?;
        let id = record.id;

        info!(
            lease_id = %id,
            device = %record.device,
            username = %record.username,
            role = %record.role,
            expires_at = %record.expires_at,
            "issuing lease"
        );

        let comment = format!("{TEMP_ACCOUNT_MARKER} for {actor}: {}", record.purpose);
        let created = self
            .device
            .create_account(
                &record.device,
                &record.username,
                record.role.device_group(),
                &password,
                &comment,
            )
            .await;

        match created {
            Ok(_) => self.activate(record, password, actor).await,
            Err(device_error) => {
                warn!(
                    lease_id = %id,
                    device = %record.device,
                    error = %device_error,
                    indeterminate = device_error.is_indeterminate(),
                    "account creation failed"
                );
                self.mark_failed(
                    id,
                    LeaseState::Pending,
                    actor,
                    format!("create failed: {device_error}"),
                )
                .await;
                Err(ManagerError::Device(device_error))
            }
        }
    }

    /// Insert the `Pending` record, regenerating the username once on
    /// a store conflict.
    async fn insert_pending(
        &self,
        request: &IssueRequest,
        actor: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        device_identity: Option<String>,
        extends: Option<LeaseId>,
    ) -> ManagerResult<LeaseRecord> {
        let mut attempt = 0;
        loop {
            let username =
                credentials::generate_username(actor, now, self.config.username_prefix_len);
            let record = LeaseRecord {
                id: LeaseId::new(),
                device: request.device.clone(),
                username,
                role: request.role,
                purpose: request.purpose.clone(),
                issued_by: actor.to_string(),
                device_identity: device_identity.clone(),
                created_at: now,
                expires_at,
                state: LeaseState::Pending,
                revoked_at: None,
                revoked_by: None,
                remote_confirmed: false,
                extends,
            };
            match self.store.insert(record.clone()).await {
                Ok(()) => return Ok(record),
                Err(StoreError::Conflict { username, .. }) if attempt == 0 => {
                    warn!(
                        device = %request.device,
                        username = %username,
                        "generated username collided, regenerating"
                    );
                    attempt += 1;
                }
                Err(e) => return Err(ManagerError::Store(e)),
            }
        }
    }

    /// CAS `Pending -> Active` after remote creation, rolling the
    /// remote account back when the write fails.
    async fn activate(
        &self,
        record: LeaseRecord,
        password: SecretString,
        actor: &str,
    ) -> ManagerResult<IssuedLease> {
        let id = record.id;
        let updated = self
            .store
            .update_state(
                id,
                LeaseState::Pending,
                LeaseState::Active,
                StateFields::confirmed(),
            )
            .await;

        match updated {
            Ok(active) => {
                self.audit_entry(
                    id,
                    actor,
                    AuditAction::Issue,
                    format!(
                        "issued {} on {} as {} until {}",
                        active.username, active.device, active.role, active.expires_at
                    ),
                )
                .await;
                info!(lease_id = %id, username = %active.username, "lease active");
                Ok(IssuedLease {
                    record: active,
                    password,
                })
            }
            Err(store_error) => {
                error!(
                    lease_id = %id,
                    error = %store_error,
                    "activation write failed, rolling back remote account"
                );
                if let Err(e) = self
                    .device
                    .delete_account(&record.device, &record.username)
                    .await
                {
                    error!(
                        lease_id = %id,
                        device = %record.device,
                        username = %record.username,
                        error = %e,
                        "rollback failed, account may be orphaned on device"
                    );
                }
                self.audit_entry(
                    id,
                    actor,
                    AuditAction::Fail,
                    format!("activation write failed: {store_error}"),
                )
                .await;
                Err(ManagerError::Store(store_error))
            }
        }
    }

    /// Manually revoke an `Active` lease.
    pub async fn revoke(&self, id: LeaseId, actor: &str) -> ManagerResult<LeaseRecord> {
        let record = self.load(id).await?;
        if record.state != LeaseState::Active {
            return Err(ManagerError::InvalidState {
                id,
                actual: record.state,
                required: LeaseState::Active,
            });
        }
        match self.revoke_active(record, actor, AuditAction::Revoke).await? {
            RevokeOutcome::Revoked(updated) => Ok(updated),
            // The sweep (or another operator) got there first; the
            // account is gone either way.
            RevokeOutcome::AlreadyHandled => self.load(id).await,
        }
    }

    /// Revoke every lease overdue at `now`.
    ///
    /// Records are processed concurrently under the global fan-out
    /// bound and a per-device limit; one record's failure never stops
    /// the others. Re-running with the same `now` is a no-op thanks to
    /// the compare-and-set guards.
    pub async fn sweep(self: &Arc<Self>, now: DateTime<Utc>) -> ManagerResult<SweepReport> {
        let due = self.store.find_due_for_expiry(now).await?;
        if due.is_empty() {
            debug!("sweep found nothing due");
            return Ok(SweepReport::default());
        }
        info!(due = due.len(), "sweep starting");

        let fan_out = Arc::new(Semaphore::new(self.config.sweep_fan_out));
        let mut tasks = JoinSet::new();
        for record in due {
            let manager = Arc::clone(self);
            let fan_out = Arc::clone(&fan_out);
            tasks.spawn(async move {
                // Semaphores are never closed here.
                let Ok(_global) = fan_out.acquire().await else {
                    return SweepReport::default();
                };
                let device_limit = manager.device_limit(&record.device);
                let Ok(_per_device) = device_limit.acquire().await else {
                    return SweepReport::default();
                };

                let id = record.id;
                match manager
                    .revoke_active(record, SYSTEM_ACTOR, AuditAction::ExpireAuto)
                    .await
                {
                    Ok(RevokeOutcome::Revoked(_)) => SweepReport {
                        revoked: 1,
                        ..SweepReport::default()
                    },
                    Ok(RevokeOutcome::AlreadyHandled) => SweepReport {
                        skipped: 1,
                        ..SweepReport::default()
                    },
                    Err(ManagerError::RetryExhausted { .. }) => SweepReport {
                        failed: 1,
                        ..SweepReport::default()
                    },
                    Err(e) => {
                        error!(lease_id = %id, error = %e, "sweep revoke errored");
                        SweepReport {
                            failed: 1,
                            ..SweepReport::default()
                        }
                    }
                }
            });
        }

        let mut report = SweepReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(partial) => {
                    report.revoked += partial.revoked;
                    report.failed += partial.failed;
                    report.skipped += partial.skipped;
                }
                Err(e) => {
                    error!(error = %e, "sweep task panicked");
                    report.failed += 1;
                }
            }
        }
        info!(
            revoked = report.revoked,
            failed = report.failed,
            skipped = report.skipped,
            "sweep finished"
        );
        Ok(report)
    }

    /// Delete the remote account with bounded retries, then commit the
    /// matching transition.
    async fn revoke_active(
        &self,
        record: LeaseRecord,
        actor: &str,
        action: AuditAction,
    ) -> ManagerResult<RevokeOutcome> {
        let id = record.id;
        let policy = &self.config.retry;
        let mut last_error: Option<DeviceError> = None;

        for attempt in 0..policy.max_attempts {
            match self
                .device
                .delete_account(&record.device, &record.username)
                .await
            {
                Ok(_) => {
                    return self.commit_revoked(id, actor, action).await;
                }
                Err(e) => {
                    warn!(
                        lease_id = %id,
                        device = %record.device,
                        attempt = attempt + 1,
                        max_attempts = policy.max_attempts,
                        error = %e,
                        indeterminate = e.is_indeterminate(),
                        "account deletion failed"
                    );
                    last_error = Some(e);
                    if attempt + 1 < policy.max_attempts {
                        tokio::time::sleep(policy.backoff_duration(attempt)).await;
                    }
                }
            }
        }

        let last_error = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempts made".to_string());
        match self
            .store
            .update_state(
                id,
                LeaseState::Active,
                LeaseState::Failed,
                StateFields::default(),
            )
            .await
        {
            Ok(_) => {
                self.audit_entry(
                    id,
                    actor,
                    AuditAction::Fail,
                    format!("revoke retries exhausted: {last_error}"),
                )
                .await;
                error!(lease_id = %id, last_error = %last_error, "lease marked failed");
                Err(ManagerError::RetryExhausted {
                    id,
                    attempts: policy.max_attempts,
                    last_error,
                })
            }
            Err(StoreError::StaleState { actual, .. }) => {
                debug!(lease_id = %id, actual = %actual, "lost failure race, other actor committed");
                Ok(RevokeOutcome::AlreadyHandled)
            }
            Err(e) => Err(ManagerError::Store(e)),
        }
    }

    /// CAS `Active -> Revoked`. A stale-state loss means the other
    /// actor committed; no second audit entry and no further device
    /// calls.
    async fn commit_revoked(
        &self,
        id: LeaseId,
        actor: &str,
        action: AuditAction,
    ) -> ManagerResult<RevokeOutcome> {
        let now = self.clock.now();
        match self
            .store
            .update_state(
                id,
                LeaseState::Active,
                LeaseState::Revoked,
                StateFields::revoked(now, actor),
            )
            .await
        {
            Ok(updated) => {
                self.audit_entry(
                    id,
                    actor,
                    action,
                    format!("removed {} from {}", updated.username, updated.device),
                )
                .await;
                info!(lease_id = %id, revoked_by = actor, "lease revoked");
                Ok(RevokeOutcome::Revoked(updated))
            }
            Err(StoreError::StaleState { actual, .. }) => {
                debug!(lease_id = %id, actual = %actual, "lost revoke race, treating as done");
                Ok(RevokeOutcome::AlreadyHandled)
            }
            Err(e) => Err(ManagerError::Store(e)),
        }
    }

    /// Operator recovery for a `Failed` lease.
    ///
    /// Re-checks whether the account still exists on the device,
    /// deletes it if so, and closes the record as `Revoked`. `Failed`
    /// records form a manual queue; nothing retries them automatically.
    pub async fn retry_failed(&self, id: LeaseId, actor: &str) -> ManagerResult<LeaseRecord> {
        let record = self.load(id).await?;
        if record.state != LeaseState::Failed {
            return Err(ManagerError::InvalidState {
                id,
                actual: record.state,
                required: LeaseState::Failed,
            });
        }

        let exists = self
            .device
            .account_exists(&record.device, &record.username)
            .await?;
        if exists {
            self.device
                .delete_account(&record.device, &record.username)
                .await?;
            info!(lease_id = %id, username = %record.username, "recovered orphaned account");
        } else {
            debug!(lease_id = %id, "account already absent on device");
        }

        let now = self.clock.now();
        let updated = self
            .store
            .update_state(
                id,
                LeaseState::Failed,
                LeaseState::Revoked,
                StateFields::revoked(now, actor),
            )
            .await?;
        self.audit_entry(
            id,
            actor,
            AuditAction::Revoke,
            format!(
                "operator recovery: {} on {} ({})",
                updated.username,
                updated.device,
                if exists { "deleted" } else { "already absent" }
            ),
        )
        .await;
        Ok(updated)
    }

    /// The lease with this id, with its read-time state applied.
    pub async fn get(&self, id: LeaseId) -> ManagerResult<LeaseRecord> {
        let mut record = self.load(id).await?;
        record.state = record.derived_state(self.clock.now(), self.config.expiring_soon_window);
        Ok(record)
    }

    /// Leases matching `filter`, newest first, with read-time states
    /// applied. `ExpiringSoon` in the filter matches active leases
    /// inside the warning window.
    pub async fn list(&self, filter: &LeaseFilter) -> ManagerResult<Vec<LeaseRecord>> {
        let identity_only = LeaseFilter {
            state: None,
            ..filter.clone()
        };
        let now = self.clock.now();
        let mut records = self.store.list(&identity_only).await?;
        for record in &mut records {
            record.state = record.derived_state(now, self.config.expiring_soon_window);
        }
        if let Some(state) = filter.state {
            records.retain(|r| r.state == state);
        }
        Ok(records)
    }

    /// Reachability, identity and account counts for one device.
    pub async fn device_info(&self, device: &DeviceAddress) -> ManagerResult<DeviceInfo> {
        let reachable = self.device.check_reachable(device).await?;
        if !reachable {
            return Ok(DeviceInfo {
                reachable: false,
                identity: None,
                accounts: None,
            });
        }
        let identity = match self.device.fetch_identity(device).await {
            Ok(identity) => identity,
            Err(e) => {
                warn!(device = %device, error = %e, "identity lookup failed");
                None
            }
        };
        let accounts = match self.device.count_accounts(device).await {
            Ok(counts) => Some(counts),
            Err(e) => {
                warn!(device = %device, error = %e, "account count failed");
                None
            }
        };
        Ok(DeviceInfo {
            reachable: true,
            identity,
            accounts,
        })
    }

    fn validate(&self, request: &IssueRequest, actor: &str) -> Result<(), ValidationError> {
        if actor.trim().is_empty() {
            return Err(ValidationError::EmptyActor);
        }
        if request.duration < self.config.min_duration {
            return Err(ValidationError::DurationTooShort {
                requested_secs: request.duration.as_secs(),
                min_secs: self.config.min_duration.as_secs(),
            });
        }
        if request.duration > self.config.max_duration {
            return Err(ValidationError::DurationTooLong {
                requested_secs: request.duration.as_secs(),
                max_secs: self.config.max_duration.as_secs(),
            });
        }
        Ok(())
    }

    async fn load(&self, id: LeaseId) -> ManagerResult<LeaseRecord> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(ManagerError::NotFound { id })
    }

    fn device_limit(&self, device: &DeviceAddress) -> Arc<Semaphore> {
        let mut limits = self.device_limits.lock();
        Arc::clone(
            limits
                .entry(device.clone())
                .or_insert_with(|| Arc::new(Semaphore::new(self.config.per_device_concurrency))),
        )
    }

    /// CAS into `Failed` from `expected`; losses mean another actor
    /// already settled the record.
    async fn mark_failed(&self, id: LeaseId, expected: LeaseState, actor: &str, detail: String) {
        match self
            .store
            .update_state(id, expected, LeaseState::Failed, StateFields::default())
            .await
        {
            Ok(_) => {
                self.audit_entry(id, actor, AuditAction::Fail, detail).await;
            }
            Err(StoreError::StaleState { actual, .. }) => {
                warn!(lease_id = %id, actual = %actual, "failure transition lost a race");
            }
            Err(e) => {
                error!(lease_id = %id, error = %e, "could not record failure state");
            }
        }
    }

    async fn audit_entry(&self, id: LeaseId, actor: &str, action: AuditAction, detail: String) {
        let entry = AuditEntry::new(id, actor, action, self.clock.now(), detail);
        self.audit.record(entry).await;
    }
}
