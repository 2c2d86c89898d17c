//! Tick sink that pushes frames to every live `WebSocket` session.
//!
//! Each [`TickFrame`] is serialized once and offered to the
//! [`ConnectionRegistry`]. The registry never waits on a slow client, so
//! publishing never stalls the driver loop.

use std::sync::Arc;

use paddock_core::runner::{TickFrame, TickSink};
use paddock_gateway::ConnectionRegistry;
use tracing::{debug, warn};

/// Sink that bridges the driver loop to the gateway's sessions.
pub struct RegistrySink {
    registry: Arc<ConnectionRegistry>,
}

impl RegistrySink {
    /// Create a sink that broadcasts through `registry`.
    pub const fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }
}

impl TickSink for RegistrySink {
    fn publish(&self, frame: &TickFrame) {
        let text = match serde_json::to_string(frame) {
            Ok(text) => text,
            Err(e) => {
                warn!(tick = frame.tick, error = %e, "Failed to serialize tick frame");
                return;
            }
        };

        let report = self.registry.broadcast(&text);
        debug!(
            tick = frame.tick,
            targets = report.targets,
            delivered = report.delivered,
            lagging = report.lagging,
            closed = report.closed,
            "Tick broadcast sent"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    #[tokio::test]
    async fn publish_reaches_registered_sessions() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (tx, mut rx) = mpsc::channel(4);
        let _guard = registry.register(tx);

        let sink = RegistrySink::new(Arc::clone(&registry));
        sink.publish(&TickFrame {
            tick: 3,
            time_left: 12.5,
            payload: serde_json::json!({ "race": 1 }),
        });

        let text = rx.recv().await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["tick"], 3);
        assert_eq!(json["timeleft"], 12.5);
        assert_eq!(json["payload"]["race"], 1);
    }

    #[test]
    fn publish_with_no_sessions_is_a_no_op() {
        let sink = RegistrySink::new(Arc::new(ConnectionRegistry::new()));
        sink.publish(&TickFrame {
            tick: 1,
            time_left: 1.0,
            payload: serde_json::Value::Null,
        });
    }
}
