use crate::service::routing::{
    HTTP_PROXY_HOST, HTTP_PROXY_PORT, HTTPS_PROXY_HOST, HTTPS_PROXY_PORT,
    NO_PROXY_HOSTS, apply_loopback_routing, clear_property, get_property, http_proxy_url,
    https_proxy_url, proxy_env, set_property,
};

use serial_test::serial;

fn clear_routing() {
    for key in [HTTP_PROXY_HOST, HTTP_PROXY_PORT, HTTPS_PROXY_HOST, HTTPS_PROXY_PORT] {
        clear_property(key);
    }
}

/// **VALUE**: Verifies that both cleartext and TLS routing point at 127.0.0.1:8077.
///
/// **WHY THIS MATTERS**: If only one of the two is set, some traffic bypasses the proxy.
///
/// **BUG THIS CATCHES**: Would catch a missing HTTPS property or a wrong port.
#[test]
#[serial]
fn given_no_routing_when_apply_loopback_routing_called_then_both_schemes_use_proxy() {
    // GIVEN: No routing configured
    clear_routing();
    assert!(http_proxy_url().is_none());

    // WHEN: Applying loopback routing
    apply_loopback_routing();

    // THEN: Both properties point at the local proxy
    assert_eq!(get_property(HTTP_PROXY_HOST).as_deref(), Some("127.0.0.1"));
    assert_eq!(get_property(HTTPS_PROXY_PORT).as_deref(), Some("8077"));
    assert_eq!(http_proxy_url().as_deref(), Some("http://127.0.0.1:8077"));
    assert_eq!(https_proxy_url().as_deref(), Some("http://127.0.0.1:8077"));

    clear_routing();
}

/// **VALUE**: Verifies that applying routing twice yields the same result.
///
/// **WHY THIS MATTERS**: Every start re-applies routing; a restart must not corrupt it.
///
/// **BUG THIS CATCHES**: Would catch values being appended instead of replaced.
#[test]
#[serial]
fn given_custom_value_when_apply_loopback_routing_called_then_value_is_replaced() {
    // GIVEN: A stale value
    set_property(HTTP_PROXY_PORT, "3128");

    // WHEN: Applying routing twice
    apply_loopback_routing();
    apply_loopback_routing();

    // THEN: Port is the proxy port
    assert_eq!(get_property(HTTP_PROXY_PORT).as_deref(), Some("8077"));

    clear_routing();
}

/// **VALUE**: Verifies the routing registry is exported as proxy environment variables.
///
/// **WHY THIS MATTERS**: Other processes only see the proxy through these variables. An
/// empty list before routing keeps them from pointing at a proxy that is not up yet.
///
/// **BUG THIS CATCHES**: Would catch `proxy_env()` reading anything but the registry, or
/// a missing loopback exclusion that would loop the proxy through itself.
#[test]
#[serial]
fn given_routing_state_when_proxy_env_called_then_mirrors_registry() {
    // GIVEN: No routing
    clear_routing();

    // WHEN/THEN: Nothing to export yet
    assert!(proxy_env().is_empty());

    // WHEN: Routing is applied
    apply_loopback_routing();
    let env = proxy_env();

    // THEN: Both schemes and the loopback exclusion are exported
    assert!(env.contains(&("HTTP_PROXY", "http://127.0.0.1:8077".to_string())));
    assert!(env.contains(&("https_proxy", "http://127.0.0.1:8077".to_string())));
    assert!(env.contains(&("NO_PROXY", NO_PROXY_HOSTS.to_string())));

    clear_routing();
}

/// **VALUE**: Verifies the registry keeps working after a thread panicked holding its lock.
///
/// **WHY THIS MATTERS**: Routing is written from detached workers. A poisoned lock must
/// not silently drop every later write.
///
/// **BUG THIS CATCHES**: Would catch poisoned-lock writes being discarded.
#[test]
#[serial]
fn given_poisoned_registry_when_property_set_then_value_is_stored() {
    // GIVEN: A thread that panics while holding the registry lock
    let _ = std::thread::spawn(|| {
        crate::service::routing::poison_for_tests();
    })
    .join();

    // WHEN: Setting a property
    set_property(HTTP_PROXY_PORT, "8077");

    // THEN: The value is readable
    assert_eq!(get_property(HTTP_PROXY_PORT).as_deref(), Some("8077"));

    clear_routing();
}
