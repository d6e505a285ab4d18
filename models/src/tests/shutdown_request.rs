use crate::ShutdownRequest;

/// **VALUE**: Verifies that the purge request is a superset of the stop request.
///
/// **WHY THIS MATTERS**: The controller rejects purge without stop. If the purge helper
/// forgot to set `stop`, every purge sent by the notification action would be ignored.
///
/// **BUG THIS CATCHES**: Would catch if `stop_and_purge()` stops carrying `stop`.
#[test]
fn given_helpers_when_compared_then_purge_contains_stop() {
    // GIVEN: Both helper requests
    let stop = ShutdownRequest::stop();
    let purge = ShutdownRequest::stop_and_purge();

    // THEN: Purge carries the stop flag and adds purge
    assert_eq!(purge.stop, stop.stop);
    assert!(stop.is_stop() && !stop.is_purge());
    assert!(purge.is_stop() && purge.is_purge());
}

/// **VALUE**: Verifies that purge without stop is not considered a purge.
///
/// **WHY THIS MATTERS**: Purge is only meaningful as part of a stop.
///
/// **BUG THIS CATCHES**: Would catch if `is_purge()` ignores the stop flag.
#[test]
fn given_purge_without_stop_when_checked_then_is_neither() {
    // GIVEN: A purge-only request
    let request = ShutdownRequest {
        stop: None,
        purge: Some(true),
    };

    // THEN: Neither stop nor purge
    assert!(!request.is_stop());
    assert!(!request.is_purge());
}

/// **VALUE**: Verifies that absent flags decode from the wire as `None`.
///
/// **WHY THIS MATTERS**: Requests posted by other components may omit either flag.
///
/// **BUG THIS CATCHES**: Would catch if the fields become required in deserialization.
#[test]
fn given_json_without_flags_when_deserialized_then_flags_are_none() {
    // GIVEN: An empty JSON object
    let json = "{}";

    // WHEN: Deserializing
    let request: ShutdownRequest = serde_json::from_str(json).expect("valid request json");

    // THEN: No flags and not a stop
    assert_eq!(request, ShutdownRequest::default());
    assert!(!request.is_stop());
}
