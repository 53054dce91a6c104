//! Metric names recorded by the broker.
//!
//! Recording goes through the `metrics` facade; the server installs the
//! exporter. Without a recorder every call is a no-op.

/// Connect callbacks that installed a mapping (counter).
pub const BROKER_CONNECTS_TOTAL: &str = "broker_connects_total";
/// Connects that replaced a live mapping for the same identifier (counter).
pub const BROKER_RECONNECTS_TOTAL: &str = "broker_reconnects_total";
/// Disconnect callbacks (counter, labels: result = removed | stale | unknown).
pub const BROKER_DISCONNECTS_TOTAL: &str = "broker_disconnects_total";
/// Outbound deliveries (counter, labels: outcome).
pub const BROKER_DELIVERIES_TOTAL: &str = "broker_deliveries_total";
/// Wall time of one outbound delivery (histogram, seconds).
pub const BROKER_DELIVERY_DURATION_SECONDS: &str = "broker_delivery_duration_seconds";
/// Live identifier mappings (gauge).
pub const BROKER_CONNECTIONS_ACTIVE: &str = "broker_connections_active";
/// Events parked in a pending buffer (counter, labels: namespace).
pub const BROKER_PENDING_EVENTS_TOTAL: &str = "broker_pending_events_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_are_snake_case() {
        let names = [
            BROKER_CONNECTS_TOTAL,
            BROKER_RECONNECTS_TOTAL,
            BROKER_DISCONNECTS_TOTAL,
            BROKER_DELIVERIES_TOTAL,
            BROKER_DELIVERY_DURATION_SECONDS,
            BROKER_CONNECTIONS_ACTIVE,
            BROKER_PENDING_EVENTS_TOTAL,
        ];
        for name in names {
            assert!(name.starts_with("broker_"));
            assert!(name.chars().all(|c| c.is_ascii_lowercase() || c == '_'));
        }
    }
}
