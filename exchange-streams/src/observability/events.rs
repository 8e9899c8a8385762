//! Canonical structured event names used across `exchange-streams`.

// Stream registry events.
pub const REGISTRY_PUBLISHER_CREATE: &str = "registry_publisher_create";
pub const REGISTRY_SUBSCRIBER_CREATE: &str = "registry_subscriber_create";
pub const REGISTRY_CLOSE_ALL: &str = "registry_close_all";
pub const REGISTRY_CREATE_REJECTED: &str = "registry_create_rejected";

// Publisher adapter events.
pub const PUBLISHER_BUFFERED: &str = "publisher_buffered";
pub const PUBLISHER_DELIVER: &str = "publisher_deliver";
pub const PUBLISHER_BUFFER_OVERFLOW: &str = "publisher_buffer_overflow";
pub const PUBLISHER_SUBSCRIBE_OK: &str = "publisher_subscribe_ok";
pub const PUBLISHER_SUBSCRIBE_REJECTED: &str = "publisher_subscribe_rejected";
pub const PUBLISHER_CANCEL: &str = "publisher_cancel";
pub const PUBLISHER_INVALID_REQUEST: &str = "publisher_invalid_request";
pub const PUBLISHER_CLOSED: &str = "publisher_closed";
pub const PRODUCER_ATTACH: &str = "producer_attach";
pub const PRODUCER_ATTACH_REJECTED: &str = "producer_attach_rejected";
pub const PRODUCER_DETACH: &str = "producer_detach";

// Subscriber adapter events.
pub const SUBSCRIBER_UPSTREAM_SUBSCRIBE: &str = "subscriber_upstream_subscribe";
pub const SUBSCRIBER_UPSTREAM_REJECTED: &str = "subscriber_upstream_rejected";
pub const SUBSCRIBER_REQUEST_DEMAND: &str = "subscriber_request_demand";
pub const SUBSCRIBER_HANDOFF: &str = "subscriber_handoff";
pub const SUBSCRIBER_EXCHANGE_FAILED: &str = "subscriber_exchange_failed";
pub const SUBSCRIBER_BUFFER_OVERFLOW: &str = "subscriber_buffer_overflow";
pub const SUBSCRIBER_UPSTREAM_COMPLETE: &str = "subscriber_upstream_complete";
pub const SUBSCRIBER_UPSTREAM_ERROR: &str = "subscriber_upstream_error";
pub const SUBSCRIBER_CLOSED: &str = "subscriber_closed";
pub const CONSUMER_ATTACH: &str = "consumer_attach";
pub const CONSUMER_ATTACH_REJECTED: &str = "consumer_attach_rejected";
pub const CONSUMER_DETACH: &str = "consumer_detach";

// Request/reply events.
pub const REQUEST_START: &str = "request_start";
pub const REQUEST_NO_CONSUMER: &str = "request_no_consumer";
pub const DEFERRED_RESOLVED: &str = "deferred_resolved";
pub const DEFERRED_FAILED: &str = "deferred_failed";
pub const DEFERRED_ALREADY_TERMINAL: &str = "deferred_already_terminal";
pub const DEFERRED_SUBSCRIBE_REJECTED: &str = "deferred_subscribe_rejected";
pub const DEFERRED_DISPATCH: &str = "deferred_dispatch";

// Conversion events.
pub const CONVERSION_FAILED: &str = "conversion_failed";
pub const PROCESSOR_UNWRAP: &str = "processor_unwrap";
pub const PROCESSOR_FAILED: &str = "processor_failed";
pub const PROCESSOR_ATTACH: &str = "processor_attach";

// Locator binding events.
pub const BIND_START: &str = "bind_start";
pub const BIND_REUSE: &str = "bind_reuse";
pub const BIND_OK: &str = "bind_ok";
pub const BIND_FAILED: &str = "bind_failed";

// Runtime events.
pub const RUNTIME_SPAWN_OK: &str = "runtime_spawn_ok";
pub const RUNTIME_SPAWN_FAILED: &str = "runtime_spawn_failed";
pub const RUNTIME_DISPATCH_REJECTED: &str = "runtime_dispatch_rejected";
pub const RUNTIME_SHUTDOWN: &str = "runtime_shutdown";
pub const BRIDGE_START: &str = "bridge_start";
pub const BRIDGE_SHUTDOWN: &str = "bridge_shutdown";
