//! Connectivity signal consumed by the sync service
//!
//! Detection itself happens elsewhere; whatever detects network changes
//! publishes them through a [`ConnectivityMonitor`], and the core reads the
//! current value or subscribes to changes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Kind of network link reported by the platform
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    Wifi,
    Cellular,
    Ethernet,
    None,
    #[default]
    Unknown,
}

/// Network status at one point in time
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectivityStatus {
    pub connected: bool,
    pub connection_type: ConnectionType,
}

impl ConnectivityStatus {
    /// Status before anything has been detected; reads as connected
    pub const UNKNOWN: Self = Self {
        connected: true,
        connection_type: ConnectionType::Unknown,
    };

    pub const OFFLINE: Self = Self {
        connected: false,
        connection_type: ConnectionType::None,
    };

    pub fn online(connection_type: ConnectionType) -> Self {
        Self {
            connected: true,
            connection_type,
        }
    }
}

/// Source of the "is online" signal
#[async_trait]
pub trait ConnectivitySignal: Send + Sync {
    /// Current status
    async fn current_status(&self) -> ConnectivityStatus;

    /// Receive future status changes until the subscription is dropped
    fn subscribe(&self) -> StatusSubscription;

    async fn is_online(&self) -> bool {
        self.current_status().await.connected
    }
}

/// A live subscription to status changes. Dropping it unsubscribes.
pub struct StatusSubscription {
    rx: watch::Receiver<ConnectivityStatus>,
}

impl StatusSubscription {
    /// Wait for the next change. `None` once the monitor is gone.
    pub async fn changed(&mut self) -> Option<ConnectivityStatus> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }

    /// The most recent status seen by this subscription
    pub fn latest(&self) -> ConnectivityStatus {
        *self.rx.borrow()
    }
}

/// Single source of truth for connectivity, shared by reference
pub struct ConnectivityMonitor {
    tx: watch::Sender<ConnectivityStatus>,
}

impl ConnectivityMonitor {
    pub fn new(initial: ConnectivityStatus) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// Start as "unknown", which counts as connected until told otherwise
    pub fn optimistic() -> Self {
        Self::new(ConnectivityStatus::UNKNOWN)
    }

    /// Publish a new status. Subscribers are only woken when it changes.
    pub fn set_status(&self, status: ConnectivityStatus) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
        if changed {
            tracing::debug!(
                "Connectivity changed: connected={} type={:?}",
                status.connected,
                status.connection_type
            );
        }
    }

    pub fn set_online(&self, connected: bool) {
        self.set_status(if connected {
            ConnectivityStatus::online(ConnectionType::Unknown)
        } else {
            ConnectivityStatus::OFFLINE
        });
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[async_trait]
impl ConnectivitySignal for ConnectivityMonitor {
    async fn current_status(&self) -> ConnectivityStatus {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> StatusSubscription {
        StatusSubscription {
            rx: self.tx.subscribe(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_reads_as_online() {
        let monitor = ConnectivityMonitor::optimistic();
        assert!(monitor.is_online().await);
        assert_eq!(
            monitor.current_status().await.connection_type,
            ConnectionType::Unknown
        );
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let monitor = ConnectivityMonitor::optimistic();
        let mut sub = monitor.subscribe();

        monitor.set_online(false);
        assert_eq!(sub.changed().await, Some(ConnectivityStatus::OFFLINE));
        assert!(!monitor.is_online().await);

        monitor.set_status(ConnectivityStatus::online(ConnectionType::Wifi));
        let status = sub.changed().await.unwrap();
        assert!(status.connected);
        assert_eq!(sub.latest().connection_type, ConnectionType::Wifi);
    }

    #[tokio::test]
    async fn test_repeated_status_does_not_notify() {
        let monitor = ConnectivityMonitor::new(ConnectivityStatus::OFFLINE);
        let mut sub = monitor.subscribe();

        monitor.set_status(ConnectivityStatus::OFFLINE);
        monitor.set_online(true);
        // The only wake-up is the real change
        assert!(sub.changed().await.unwrap().connected);
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let monitor = ConnectivityMonitor::optimistic();
        let sub = monitor.subscribe();
        assert_eq!(monitor.subscriber_count(), 1);
        drop(sub);
        assert_eq!(monitor.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_subscription_ends_with_monitor() {
        let monitor = ConnectivityMonitor::optimistic();
        let mut sub = monitor.subscribe();
        drop(monitor);
        assert_eq!(sub.changed().await, None);
    }
}
