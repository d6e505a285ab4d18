// Unit tests for process module private functions
// Integration tests for public API are in integration_tests/lifecycle/process.rs

use crate::lifecycle::process::{format_command, with_process};

/// **VALUE**: Tests that `format_command()` produces a command line for a live process.
///
/// **WHY THIS MATTERS**: Kill logging uses the command line to identify what was killed
/// during a purge. An empty or panicking formatter would hide that information.
///
/// **BUG THIS CATCHES**: Would catch if `format_command()` stops joining the arguments.
#[test]
fn given_valid_process_when_format_command_called_then_returns_command_string() {
    // GIVEN: A valid process (using our own PID)
    let our_pid = std::process::id();

    // WHEN: Calling format_command on the process
    let result = with_process(our_pid, format_command);

    // THEN: Should return Some with non-empty command string
    assert!(result.is_some(), "Should find the process");
    assert!(
        !result.unwrap().is_empty(),
        "Command string should not be empty"
    );
}

/// **VALUE**: Tests that `with_process()` returns None for PIDs that don't exist.
///
/// **WHY THIS MATTERS**: Sibling processes can die between enumeration and the kill.
/// The purge must keep going instead of crashing on a vanished PID.
///
/// **BUG THIS CATCHES**: Would catch if `with_process()` panics on missing processes.
#[test]
fn given_nonexistent_pid_when_with_process_called_then_returns_none() {
    // GIVEN: A PID that doesn't exist
    let fake_pid = u32::MAX;

    // WHEN: Calling with_process with the invalid PID
    let result = with_process(fake_pid, |_| true);

    // THEN: Should return None
    assert!(result.is_none(), "Should return None for non-existent process");
}

/// **VALUE**: Tests that `with_process()` runs the closure against the right process.
///
/// **WHY THIS MATTERS**: Every kill goes through `with_process()`. If it handed the closure
/// a different process, a purge could signal the wrong PID.
///
/// **BUG THIS CATCHES**: Would catch a lookup returning the wrong process.
#[test]
fn given_valid_pid_when_with_process_called_then_executes_closure() {
    // GIVEN: A valid PID (our own process)
    let our_pid = std::process::id();

    // WHEN: Calling with_process with a closure that returns the PID
    let result = with_process(our_pid, |p| p.pid().as_u32());

    // THEN: Should execute closure and return the PID
    assert_eq!(result, Some(our_pid));
}
