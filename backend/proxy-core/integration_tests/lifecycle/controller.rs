use crate::helpers::{
    Event, EventLog, FakeHost, FakeProcessManager, FakeStopper, event_log, events,
};

use proxy_core::error::lifecycle::LifecycleError;
use proxy_core::lifecycle::{LifecycleController, ShutdownOutcome};

use models::{QuitOptions, ShutdownRequest};

use std::sync::Arc;

fn controller(
    own_pid: u32,
    processes: Option<Vec<u32>>,
    can_clear: bool,
    log: &EventLog,
) -> LifecycleController {
    LifecycleController::new(
        Arc::new(FakeProcessManager {
            own_pid,
            processes,
            can_clear,
            log: Arc::clone(log),
        }),
        Arc::new(FakeStopper {
            log: Arc::clone(log),
        }),
        Arc::new(FakeHost {
            log: Arc::clone(log),
        }),
        QuitOptions {
            sanitize_on_exit: true,
        },
    )
}

/// **VALUE**: Verifies that requests without `stop` have zero side effects, whatever `purge` says.
///
/// **WHY THIS MATTERS**: Purge is destructive. A purge-only request (malformed or spoofed)
/// must never wipe data or kill processes.
///
/// **BUG THIS CATCHES**: Would catch the purge branch being checked before the stop flag.
#[test]
fn given_requests_without_stop_when_handled_then_nothing_happens() {
    // GIVEN: Every combination with stop absent or false
    let requests = [
        ShutdownRequest::default(),
        ShutdownRequest {
            stop: None,
            purge: Some(true),
        },
        ShutdownRequest {
            stop: Some(false),
            purge: Some(true),
        },
        ShutdownRequest {
            stop: Some(false),
            purge: Some(false),
        },
    ];

    for request in requests {
        let log = event_log();
        let controller = controller(100, Some(vec![100, 101]), true, &log);

        // WHEN: Handling the request
        let outcome = controller.handle_shutdown_request(&request).unwrap();

        // THEN: Ignored with no recorded events
        assert_eq!(outcome, ShutdownOutcome::Ignored, "request: {request:?}");
        assert!(events(&log).is_empty(), "request: {request:?}");
    }
}

/// **VALUE**: Verifies that a plain stop delegates to graceful shutdown exactly once.
///
/// **WHY THIS MATTERS**: A plain stop must go through the normal quit pathway so session
/// state and sanitize settings are honored. Killing the process here would lose them.
///
/// **BUG THIS CATCHES**: Would catch a plain stop killing processes or skipping the quit.
#[test]
fn given_stop_request_when_handled_then_stops_service_then_quits_without_kills() {
    // GIVEN: A stop-only request
    let log = event_log();
    let controller = controller(100, Some(vec![100, 101]), true, &log);

    // WHEN: Handling it
    let outcome = controller
        .handle_shutdown_request(&ShutdownRequest::stop())
        .unwrap();

    // THEN: Exactly stop-service then quit, no kills
    assert_eq!(outcome, ShutdownOutcome::Stopped);
    assert_eq!(
        events(&log),
        vec![
            Event::StopService,
            Event::Quit(QuitOptions {
                sanitize_on_exit: true
            })
        ]
    );
}

/// **VALUE**: Verifies purge ordering: siblings killed, data cleared, self killed last.
///
/// **WHY THIS MATTERS**: If the caller died first, the remaining kills and the data clear
/// would never happen. If data were cleared before siblings died, they could write it back.
///
/// **BUG THIS CATCHES**: Would catch any reordering of the purge steps, or the purge falling
/// through to graceful shutdown.
#[test]
fn given_stop_and_purge_when_handled_then_kills_sibling_clears_data_then_kills_self() {
    // GIVEN: Self PID 100 with a sibling 101
    let log = event_log();
    let controller = controller(100, Some(vec![100, 101]), true, &log);

    // WHEN: Handling a purge
    let outcome = controller
        .handle_shutdown_request(&ShutdownRequest::stop_and_purge())
        .unwrap();

    // THEN: kill(101), clear, kill(100), and nothing else
    assert_eq!(outcome, ShutdownOutcome::Purged);
    assert_eq!(
        events(&log),
        vec![Event::Kill(101), Event::ClearData, Event::Kill(100)]
    );
}

/// **VALUE**: Verifies self is killed last even when listed first and siblings repeat.
///
/// **WHY THIS MATTERS**: Process enumeration order is arbitrary.
///
/// **BUG THIS CATCHES**: Would catch killing in enumeration order or killing a PID twice.
#[test]
fn given_self_listed_first_when_purged_then_self_is_still_last() {
    // GIVEN: Self first, duplicate siblings
    let log = event_log();
    let controller = controller(7, Some(vec![7, 12, 9, 12]), true, &log);

    // WHEN: Purging
    controller.handle_shutdown_flags(true, true).unwrap();

    // THEN: Siblings once each, self last
    let recorded = events(&log);
    assert_eq!(recorded.last(), Some(&Event::Kill(7)));
    assert_eq!(
        recorded,
        vec![
            Event::Kill(9),
            Event::Kill(12),
            Event::ClearData,
            Event::Kill(7)
        ]
    );
}

/// **VALUE**: Verifies that an unavailable process service is skipped silently.
///
/// **WHY THIS MATTERS**: Sibling termination is best-effort cleanup; the purge must still
/// clear data and terminate the caller.
///
/// **BUG THIS CATCHES**: Would catch an error or early return when enumeration fails.
#[test]
fn given_process_service_unavailable_when_purged_then_still_clears_and_kills_self() {
    // GIVEN: No process enumeration
    let log = event_log();
    let controller = controller(100, None, true, &log);

    // WHEN: Purging
    let outcome = controller.handle_shutdown_flags(true, true).unwrap();

    // THEN: Clear then self-kill
    assert_eq!(outcome, ShutdownOutcome::Purged);
    assert_eq!(events(&log), vec![Event::ClearData, Event::Kill(100)]);
}

/// **VALUE**: Verifies that a failed data clear propagates and the caller survives.
///
/// **WHY THIS MATTERS**: Purging where clearing is unsupported is an inconsistency the user
/// must see, not something to mask.
///
/// **BUG THIS CATCHES**: Would catch the error being swallowed, or self being killed anyway.
#[test]
fn given_clear_unsupported_when_purged_then_returns_error() {
    // GIVEN: A system without the clear-data capability
    let log = event_log();
    let controller = controller(100, Some(vec![100, 101]), false, &log);
    assert!(!controller.can_purge());

    // WHEN: Purging anyway
    let result = controller.handle_shutdown_request(&ShutdownRequest::stop_and_purge());

    // THEN: Error, sibling already killed, self not killed
    assert!(matches!(result, Err(LifecycleError::Unsupported { .. })));
    assert_eq!(events(&log), vec![Event::Kill(101)]);
}

/// **VALUE**: Verifies repeated delivery of the same stop request does not fail.
///
/// **WHY THIS MATTERS**: The OS may redeliver broadcasts.
///
/// **BUG THIS CATCHES**: Would catch the controller erroring on a second stop.
#[test]
fn given_repeated_stop_when_handled_then_each_succeeds() {
    // GIVEN: A controller
    let log = event_log();
    let controller = controller(100, Some(vec![100]), true, &log);

    // WHEN: Handling stop twice
    let first = controller.handle_shutdown_request(&ShutdownRequest::stop());
    let second = controller.handle_shutdown_request(&ShutdownRequest::stop());

    // THEN: Both succeed
    assert!(first.is_ok() && second.is_ok());
    assert!(controller.can_purge());
}
