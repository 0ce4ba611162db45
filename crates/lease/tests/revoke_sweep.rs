//! Revocation and expiry-sweep behavior: the happy expiry path, retry
//! exhaustion, idempotence, races, and operator recovery.

mod support;

use pretty_assertions::assert_eq;
use std::sync::atomic::Ordering;
use std::time::Duration;

use roslease::core::{AuditAction, LeaseState, ManagerError};
use roslease::{AccessRole, Clock, IssueRequest, LeaseStore, SweepReport};

use support::{MockDevice, audit_count, harness};

fn request(device: &str, duration: Duration) -> IssueRequest {
    IssueRequest {
        device: device.parse().unwrap(),
        role: AccessRole::ReadOnly,
        duration,
        purpose: "maintenance".to_string(),
    }
}

#[tokio::test]
async fn five_minute_lease_expires_on_sweep() {
    // GIVEN a five-minute read-only lease
    let h = harness();
    let issued = h
        .manager
        .issue(request("10.0.0.1", Duration::from_secs(5 * 60)), "admin")
        .await
        .unwrap();
    assert_eq!(issued.record.state, LeaseState::Active);

    // WHEN six minutes pass and a sweep runs
    h.clock.advance(Duration::from_secs(6 * 60));
    let report = h.manager.sweep(h.clock.now()).await.unwrap();

    // THEN the lease is revoked by the system actor
    assert_eq!(
        report,
        SweepReport {
            revoked: 1,
            failed: 0,
            skipped: 0
        }
    );
    let record = h.manager.get(issued.record.id).await.unwrap();
    assert_eq!(record.state, LeaseState::Revoked);
    assert_eq!(record.revoked_by.as_deref(), Some("system"));
    assert_eq!(record.revoked_at, Some(h.clock.now()));
    assert!(!h.device.has_account(&record.device, &record.username));

    // AND exactly one ExpireAuto audit entry exists
    assert_eq!(audit_count(&h.sink, AuditAction::ExpireAuto), 1);
}

#[tokio::test]
async fn sweep_is_idempotent() {
    // GIVEN a lease already revoked by one sweep
    let h = harness();
    h.manager
        .issue(request("10.0.0.1", Duration::from_secs(5 * 60)), "admin")
        .await
        .unwrap();
    h.clock.advance(Duration::from_secs(6 * 60));
    h.manager.sweep(h.clock.now()).await.unwrap();
    let deletes_after_first = h.device.delete_calls.load(Ordering::SeqCst);
    let entries_after_first = h.sink.entries().len();

    // WHEN sweeping again at the same instant
    let report = h.manager.sweep(h.clock.now()).await.unwrap();

    // THEN nothing happened: no device calls, no audit entries
    assert_eq!(report, SweepReport::default());
    assert_eq!(h.device.delete_calls.load(Ordering::SeqCst), deletes_after_first);
    assert_eq!(h.sink.entries().len(), entries_after_first);
}

#[tokio::test]
async fn one_failing_record_does_not_abort_the_sweep() {
    // GIVEN two due leases, one of which the device refuses to delete
    let h = harness();
    let stubborn = h
        .manager
        .issue(request("10.0.0.1", Duration::from_secs(5 * 60)), "admin")
        .await
        .unwrap();
    let healthy = h
        .manager
        .issue(request("10.0.0.2", Duration::from_secs(5 * 60)), "admin")
        .await
        .unwrap();
    h.device.fail_deletes_for(
        &stubborn.record.username,
        (0..3)
            .map(|_| MockDevice::timeout_error("/user/remove"))
            .collect(),
    );

    // WHEN the sweep runs
    h.clock.advance(Duration::from_secs(6 * 60));
    let report = h.manager.sweep(h.clock.now()).await.unwrap();

    // THEN the healthy lease is revoked and the stubborn one is Failed
    assert_eq!(
        report,
        SweepReport {
            revoked: 1,
            failed: 1,
            skipped: 0
        }
    );
    let failed = h.manager.get(stubborn.record.id).await.unwrap();
    assert_eq!(failed.state, LeaseState::Failed);
    let revoked = h.manager.get(healthy.record.id).await.unwrap();
    assert_eq!(revoked.state, LeaseState::Revoked);

    // AND the failure is audited alongside the auto-expiry
    assert_eq!(audit_count(&h.sink, AuditAction::Fail), 1);
    assert_eq!(audit_count(&h.sink, AuditAction::ExpireAuto), 1);
}

#[tokio::test]
async fn manual_revoke_requires_active_state() {
    // GIVEN a lease that is already revoked
    let h = harness();
    let issued = h
        .manager
        .issue(request("10.0.0.1", Duration::from_secs(3600)), "alice")
        .await
        .unwrap();
    h.manager.revoke(issued.record.id, "alice").await.unwrap();

    // WHEN revoking again
    let err = h
        .manager
        .revoke(issued.record.id, "alice")
        .await
        .unwrap_err();

    // THEN the call is rejected, not silently repeated
    assert!(matches!(
        err,
        ManagerError::InvalidState {
            actual: LeaseState::Revoked,
            ..
        }
    ));
    assert_eq!(audit_count(&h.sink, AuditAction::Revoke), 1);
}

#[tokio::test]
async fn concurrent_revoke_and_sweep_commit_exactly_once() {
    // GIVEN a due lease and slow device deletes to widen the race
    let h = harness();
    let issued = h
        .manager
        .issue(request("10.0.0.1", Duration::from_secs(5 * 60)), "admin")
        .await
        .unwrap();
    let id = issued.record.id;
    h.clock.advance(Duration::from_secs(6 * 60));
    h.device.set_delete_delay(Duration::from_millis(50));

    // WHEN a manual revoke and a sweep race on it
    let manual = h.manager.revoke(id, "operator");
    let sweep = h.manager.sweep(h.clock.now());
    let (manual_result, sweep_result) = tokio::join!(manual, sweep);

    // THEN both calls succeed from their caller's point of view
    let record = manual_result.unwrap();
    assert_eq!(record.state, LeaseState::Revoked);
    let report = sweep_result.unwrap();
    assert_eq!(report.revoked + report.skipped, 1);
    assert_eq!(report.failed, 0);

    // AND exactly one transition committed: one terminal audit entry,
    // and no delete call after the winning commit
    let terminal_entries = audit_count(&h.sink, AuditAction::Revoke)
        + audit_count(&h.sink, AuditAction::ExpireAuto);
    assert_eq!(terminal_entries, 1);
    assert!(h.device.delete_calls.load(Ordering::SeqCst) <= 2);

    // AND the committed state survives further sweeps untouched
    let deletes_before = h.device.delete_calls.load(Ordering::SeqCst);
    h.manager.sweep(h.clock.now()).await.unwrap();
    assert_eq!(h.device.delete_calls.load(Ordering::SeqCst), deletes_before);
}

#[tokio::test]
async fn retry_exhaustion_marks_failed_and_reports_to_caller() {
    // GIVEN a device that refuses every delete for this account
    let h = harness();
    let issued = h
        .manager
        .issue(request("10.0.0.1", Duration::from_secs(3600)), "alice")
        .await
        .unwrap();
    h.device.fail_deletes_for(
        &issued.record.username,
        (0..3)
            .map(|_| MockDevice::timeout_error("/user/remove"))
            .collect(),
    );

    // WHEN revoking manually
    let err = h
        .manager
        .revoke(issued.record.id, "alice")
        .await
        .unwrap_err();

    // THEN the caller learns retries are exhausted
    match err {
        ManagerError::RetryExhausted { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected RetryExhausted, got {other:?}"),
    }

    // AND the record is Failed but still listed, awaiting an operator
    let record = h.manager.get(issued.record.id).await.unwrap();
    assert_eq!(record.state, LeaseState::Failed);
    assert_eq!(h.device.delete_calls.load(Ordering::SeqCst), 3);
    assert_eq!(audit_count(&h.sink, AuditAction::Fail), 1);
}

#[tokio::test]
async fn operator_recovery_closes_a_failed_lease() {
    // GIVEN a lease left Failed with its account still on the device
    let h = harness();
    let issued = h
        .manager
        .issue(request("10.0.0.1", Duration::from_secs(3600)), "alice")
        .await
        .unwrap();
    h.device.fail_deletes_for(
        &issued.record.username,
        (0..3)
            .map(|_| MockDevice::timeout_error("/user/remove"))
            .collect(),
    );
    h.manager.revoke(issued.record.id, "alice").await.unwrap_err();
    assert!(h.device.has_account(&issued.record.device, &issued.record.username));

    // WHEN an operator retries the failed lease
    let recovered = h
        .manager
        .retry_failed(issued.record.id, "operator")
        .await
        .unwrap();

    // THEN the orphaned account is removed and the record closed
    assert_eq!(recovered.state, LeaseState::Revoked);
    assert_eq!(recovered.revoked_by.as_deref(), Some("operator"));
    assert!(!h.device.has_account(&issued.record.device, &issued.record.username));
    assert_eq!(audit_count(&h.sink, AuditAction::Revoke), 1);
}

#[tokio::test]
async fn recovery_of_an_absent_account_just_closes_the_record() {
    // GIVEN a Failed lease whose account never made it to the device
    let h = harness();
    h.device
        .fail_next_create(MockDevice::timeout_error("/user/add"));
    let err = h
        .manager
        .issue(request("10.0.0.1", Duration::from_secs(3600)), "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, ManagerError::Device(_)));
    let records = h.manager.list(&roslease::LeaseFilter::default()).await.unwrap();
    let failed = &records[0];

    // WHEN an operator retries it
    let recovered = h.manager.retry_failed(failed.id, "operator").await.unwrap();

    // THEN no delete was attempted and the record is closed
    assert_eq!(recovered.state, LeaseState::Revoked);
    assert_eq!(h.device.delete_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn sweep_ignores_leases_that_are_not_yet_due() {
    // GIVEN a lease whose deadline is still an hour away
    let h = harness();
    h.manager
        .issue(request("10.0.0.1", Duration::from_secs(3600)), "alice")
        .await
        .unwrap();

    // WHEN sweeping now
    let report = h.manager.sweep(h.clock.now()).await.unwrap();

    // THEN nothing is due
    assert_eq!(report, SweepReport::default());
    assert_eq!(
        h.store
            .find_due_for_expiry(h.clock.now())
            .await
            .unwrap()
            .len(),
        0
    );
}
