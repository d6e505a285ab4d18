use crate::RedactedSecret;

/// **VALUE**: Verifies that injector credentials never appear in Debug or Display output.
///
/// **WHY THIS MATTERS**: Configuration records are logged at debug level. A leaking
/// Debug impl would write injector credentials into the log file.
///
/// **BUG THIS CATCHES**: Would catch if someone replaces the manual Debug impl with a derive.
#[test]
fn given_secret_when_formatted_then_value_is_redacted() {
    // GIVEN: A secret
    let secret = RedactedSecret::new("user:hunter2");

    // WHEN: Formatting with Debug and Display
    let debug = format!("{secret:?}");
    let display = format!("{secret}");

    // THEN: Neither should contain the secret
    assert!(!debug.contains("hunter2"));
    assert!(!display.contains("hunter2"));
    assert_eq!(secret.expose(), "user:hunter2");
    assert_eq!(secret.len(), 12);
}

/// **VALUE**: Verifies that serializing a secret fails instead of writing it out.
///
/// **WHY THIS MATTERS**: Saving configuration must never persist credentials by accident.
///
/// **BUG THIS CATCHES**: Would catch if the Serialize impl is replaced with a derive.
#[test]
fn given_secret_when_serialized_then_returns_error() {
    // GIVEN: A secret
    let secret = RedactedSecret::new("user:hunter2");

    // WHEN: Serializing to JSON
    let result = serde_json::to_string(&secret);

    // THEN: Should fail
    assert!(result.is_err(), "Secrets must not serialize");
}
