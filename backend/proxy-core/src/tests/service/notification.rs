use crate::service::notification::{CHANNEL_ID, ForegroundNotification};

use models::ShutdownRequest;

/// **VALUE**: Verifies that the purge action only appears when purging is supported.
///
/// **WHY THIS MATTERS**: Offering purge on a system that cannot clear data leads to a fatal
/// error when the user taps it.
///
/// **BUG THIS CATCHES**: Would catch the capability flag being ignored.
#[test]
fn given_purge_unsupported_when_notification_built_then_only_stop_action() {
    // GIVEN/WHEN: Notifications with and without purge support
    let without = ForegroundNotification::running(false);
    let with = ForegroundNotification::running(true);

    // THEN: Stop always present; purge only with support
    assert_eq!(without.actions.len(), 1);
    assert_eq!(without.actions[0].request, ShutdownRequest::stop());
    assert_eq!(with.actions.len(), 2);
    assert_eq!(with.actions[1].request, ShutdownRequest::stop_and_purge());
    assert_eq!(with.channel_id, CHANNEL_ID);
}
