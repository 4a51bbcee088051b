//! Process configuration.
//!
//! Loaded from environment variables with sensible local-development defaults,
//! so the pipeline runs broker-less out of the box.

use std::time::Duration;

use tracing::warn;

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Whether the transport is wired at all. When false, publishing degrades
    /// to log-only emission and the consumer never starts.
    pub transport_enabled: bool,
    /// Topic the publisher emits order events to.
    pub order_topic: String,
    /// Subscription the consumer receives order events from.
    pub order_subscription: String,
    /// Reorder level assigned to lazily created inventory records.
    pub default_reorder_level: i64,
    /// Width of the consumer's worker pool.
    pub worker_count: usize,
    /// How long a publish waits for broker-level acknowledgment of receipt.
    pub publish_ack_timeout: Duration,
    /// How long `stop()` waits for in-flight deliveries before abandoning workers.
    pub shutdown_grace: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            transport_enabled: true,
            order_topic: "order-events".to_string(),
            order_subscription: "inventory-order-subscription".to_string(),
            default_reorder_level: 10,
            worker_count: 10,
            publish_ack_timeout: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

impl Settings {
    /// Load settings from `STOCKPIPE_*` environment variables, falling back to
    /// defaults for anything unset or unparsable (with a warning).
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`Settings::from_env`], but with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            transport_enabled: parse(
                &lookup,
                "STOCKPIPE_TRANSPORT_ENABLED",
                defaults.transport_enabled,
                parse_bool,
            ),
            order_topic: lookup("STOCKPIPE_ORDER_TOPIC").unwrap_or(defaults.order_topic),
            order_subscription: lookup("STOCKPIPE_ORDER_SUBSCRIPTION")
                .unwrap_or(defaults.order_subscription),
            default_reorder_level: parse(
                &lookup,
                "STOCKPIPE_DEFAULT_REORDER_LEVEL",
                defaults.default_reorder_level,
                |s| s.parse().ok(),
            ),
            worker_count: parse(&lookup, "STOCKPIPE_WORKER_COUNT", defaults.worker_count, |s| {
                s.parse().ok().filter(|&n: &usize| n > 0)
            }),
            publish_ack_timeout: parse(
                &lookup,
                "STOCKPIPE_PUBLISH_ACK_TIMEOUT_SECS",
                defaults.publish_ack_timeout,
                parse_secs,
            ),
            shutdown_grace: parse(
                &lookup,
                "STOCKPIPE_SHUTDOWN_GRACE_SECS",
                defaults.shutdown_grace,
                parse_secs,
            ),
        }
    }

    pub fn with_transport_enabled(mut self, enabled: bool) -> Self {
        self.transport_enabled = enabled;
        self
    }

    pub fn with_order_topic(mut self, topic: impl Into<String>) -> Self {
        self.order_topic = topic.into();
        self
    }

    pub fn with_order_subscription(mut self, subscription: impl Into<String>) -> Self {
        self.order_subscription = subscription.into();
        self
    }

    pub fn with_default_reorder_level(mut self, level: i64) -> Self {
        self.default_reorder_level = level;
        self
    }

    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    pub fn with_publish_ack_timeout(mut self, timeout: Duration) -> Self {
        self.publish_ack_timeout = timeout;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}

fn parse<T>(
    lookup: impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
    parser: impl Fn(&str) -> Option<T>,
) -> T {
    match lookup(key) {
        None => default,
        Some(raw) => match parser(&raw) {
            Some(value) => value,
            None => {
                warn!(key, raw, "unparsable setting; using default");
                default
            }
        },
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn parse_secs(s: &str) -> Option<Duration> {
    s.parse::<u64>().ok().map(Duration::from_secs)
}
