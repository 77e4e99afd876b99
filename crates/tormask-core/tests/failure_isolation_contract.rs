//! Contract Test: Failure Isolation
//!
//! Constraints verified:
//! - A failed step skips the rest of its cycle
//! - A failed cycle never stops the loop
//! - Nothing is logged unless an identity was resolved
//! - A failed append still counts as a rotation

mod common;

use common::*;
use std::time::Duration;
use tormask_core::SchedulerEvent;
use tormask_core::engine::RotationStage;

#[tokio::test(start_paused = true)]
async fn rejected_authentication_skips_identity_and_continues() {
    let doubles = Doubles::new();
    let control = MockControlChannel::new(ControlBehavior::RejectAuth);
    let mut components = doubles.components();
    components.control = Box::new(control.clone());

    let mut session = start(components, 1);

    match session
        .wait_for(|e| matches!(e, SchedulerEvent::RotationFailed { .. }))
        .await
    {
        SchedulerEvent::RotationFailed { stage, error } => {
            assert_eq!(stage, RotationStage::Control);
            assert!(error.contains("515"), "error: {}", error);
        }
        _ => unreachable!(),
    }

    tokio::time::sleep(Duration::from_millis(2500)).await;

    let stats = session.statistics().await;
    assert_eq!(control.call_count(), 3, "loop keeps running after failures");
    assert_eq!(stats.failed_rotations, 3);
    assert_eq!(stats.rotations, 0);
    assert_eq!(doubles.identity.call_count(), 0);
    assert!(doubles.log.is_empty().await);

    session.request_shutdown("test").await;
    session.join().await;
}

#[tokio::test(start_paused = true)]
async fn rejected_signal_is_a_control_failure() {
    let doubles = Doubles::new();
    let mut components = doubles.components();
    components.control = Box::new(MockControlChannel::new(ControlBehavior::RejectSignal));

    let mut session = start(components, 5);

    match session
        .wait_for(|e| matches!(e, SchedulerEvent::RotationFailed { .. }))
        .await
    {
        SchedulerEvent::RotationFailed { stage, .. } => assert_eq!(stage, RotationStage::Control),
        _ => unreachable!(),
    }
    assert_eq!(doubles.identity.call_count(), 0);

    session.request_shutdown("test").await;
    session.join().await;
}

#[tokio::test(start_paused = true)]
async fn missing_cookie_never_reaches_control_port() {
    let doubles = Doubles::new();
    let cookies = MockCookieSource::missing();
    let mut components = doubles.components();
    components.cookies = Box::new(cookies.clone());

    let mut session = start(components, 1);
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let stats = session.statistics().await;
    assert_eq!(cookies.call_count(), 2, "cookie is re-read every cycle");
    assert_eq!(doubles.control.call_count(), 0);
    assert_eq!(stats.failed_rotations, 2);

    session.request_shutdown("test").await;
    let (_, events) = session.join().await;
    assert!(matches!(events.last(), Some(SchedulerEvent::Stopped { .. })));
}

#[tokio::test(start_paused = true)]
async fn unreachable_control_port_is_reported() {
    let doubles = Doubles::new();
    let mut components = doubles.components();
    components.control = Box::new(MockControlChannel::new(ControlBehavior::Unreachable));

    let mut session = start(components, 5);

    match session
        .wait_for(|e| matches!(e, SchedulerEvent::RotationFailed { .. }))
        .await
    {
        SchedulerEvent::RotationFailed { stage, error } => {
            assert_eq!(stage, RotationStage::Control);
            assert!(error.contains("connection refused"));
        }
        _ => unreachable!(),
    }

    session.request_shutdown("test").await;
    session.join().await;
}

#[tokio::test(start_paused = true)]
async fn unavailable_identity_writes_no_log_entry() {
    let doubles = Doubles::new();
    let identity = MockIdentitySource::unavailable();
    let mut components = doubles.components();
    components.identity = Box::new(identity.clone());

    let mut session = start(components, 1);
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let stats = session.statistics().await;
    assert_eq!(identity.call_count(), 2);
    assert_eq!(doubles.control.call_count(), 2, "rotation itself succeeded");
    assert_eq!(stats.rotations, 0);
    assert_eq!(stats.failed_rotations, 2);
    assert!(doubles.log.is_empty().await);

    session.request_shutdown("test").await;
    session.join().await;
}

#[tokio::test(start_paused = true)]
async fn failed_append_is_reported_but_counted() {
    let doubles = Doubles::new();
    let log = FailingChangeLog::default();
    let mut components = doubles.components();
    components.change_log = Box::new(log.clone());

    let mut session = start(components, 1);

    match session
        .wait_for(|e| matches!(e, SchedulerEvent::LogWriteFailed { .. }))
        .await
    {
        SchedulerEvent::LogWriteFailed { error } => assert!(error.contains("disk full")),
        _ => unreachable!(),
    }

    tokio::time::sleep(Duration::from_millis(1500)).await;

    let stats = session.statistics().await;
    assert_eq!(log.attempt_count(), 2);
    assert_eq!(stats.rotations, 2);
    assert_eq!(stats.log_write_failures, 2);
    assert_eq!(stats.failed_rotations, 0);

    session.request_shutdown("test").await;
    session.join().await;
}
