use crate::error::ServiceAppError;
use crate::requests::{InboundRequest, parse_request};

use models::ShutdownRequest;

/// **VALUE**: Verifies that request lines decode into typed shutdown requests.
///
/// **WHY THIS MATTERS**: This is how cooperating components ask the service to stop or purge.
///
/// **BUG THIS CATCHES**: Would catch field name drift between sender and receiver.
#[test]
fn given_shutdown_lines_when_parsed_then_match_helpers() {
    // GIVEN/WHEN: The two canonical requests
    let stop = parse_request(r#"{"stop":true}"#).unwrap();
    let purge = parse_request(r#" {"stop":true,"purge":true} "#).unwrap();

    // THEN: They equal the helper-built requests
    assert_eq!(stop, Some(InboundRequest::Shutdown(ShutdownRequest::stop())));
    assert_eq!(
        purge,
        Some(InboundRequest::Shutdown(ShutdownRequest::stop_and_purge()))
    );
}

/// **VALUE**: Verifies that a start request is recognized.
///
/// **WHY THIS MATTERS**: With `auto_start` off, this line is the only way to bring the
/// proxy up.
///
/// **BUG THIS CATCHES**: Would catch `start` being swallowed as an ignored shutdown request.
#[test]
fn given_start_line_when_parsed_then_start_request() {
    // GIVEN/WHEN: A start request, and one explicitly not starting
    let start = parse_request(r#"{"start":true}"#).unwrap();
    let not_start = parse_request(r#"{"start":false}"#).unwrap();

    // THEN: Start, and an ignorable shutdown request
    assert_eq!(start, Some(InboundRequest::Start));
    assert_eq!(
        not_start,
        Some(InboundRequest::Shutdown(ShutdownRequest::default()))
    );
}

/// **VALUE**: Verifies blank lines are skipped and junk or contradictions are errors.
///
/// **WHY THIS MATTERS**: A stray newline must not be treated as a request, and malformed
/// input must be reported rather than guessed at.
///
/// **BUG THIS CATCHES**: Would catch junk being parsed as a default (ignored) request, or a
/// start-and-stop line silently picking one.
#[test]
fn given_blank_invalid_or_contradictory_lines_when_parsed_then_none_or_error() {
    // GIVEN/WHEN: Blank, invalid and contradictory lines
    let blank = parse_request("   ");
    let invalid = parse_request("stop please");
    let both = parse_request(r#"{"start":true,"stop":true}"#);

    // THEN: None and Request errors
    assert!(matches!(blank, Ok(None)));
    assert!(matches!(invalid, Err(ServiceAppError::Request { .. })));
    assert!(matches!(both, Err(ServiceAppError::Request { .. })));
}
