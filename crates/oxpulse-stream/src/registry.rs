use crate::error::{Result, StreamError};
use chrono::{DateTime, Utc};
use oxpulse_common::types::{AlertEvent, Measurement, ServerMessage};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, RwLock};

/// Channel sender half for pushing messages to one subscriber connection.
pub type SubscriberSender = mpsc::UnboundedSender<ServerMessage>;

/// Identifies one particular connection under a client ID, so a stale
/// connection's teardown can never evict its replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionToken(u64);

/// One live subscriber: its outbound channel and its interest set, kept
/// together so disconnect removes both atomically.
struct ClientEntry {
    sender: SubscriberSender,
    subscriptions: HashSet<String>,
    token: ConnectionToken,
    #[allow(dead_code)]
    connected_at: DateTime<Utc>,
}

/// Connection lifecycle and subscription-filtered fan-out.
///
/// Thread-safe via one interior `RwLock`; designed to be wrapped in `Arc`
/// and shared across tasks. The transport layer owns the receiver half of
/// each client channel and forwards messages to the actual socket, so a
/// send here never suspends and a slow socket never stalls the fan-out.
pub struct SubscriptionRegistry {
    clients: RwLock<HashMap<String, ClientEntry>>,
    next_token: AtomicU64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            next_token: AtomicU64::new(0),
        }
    }

    /// Register a client and return the receiver half of its outbound
    /// channel plus the token identifying this particular connection. A
    /// repeat connect with the same ID silently replaces the previous
    /// mapping; the old receiver sees its channel close.
    pub async fn connect(
        &self,
        client_id: &str,
    ) -> (mpsc::UnboundedReceiver<ServerMessage>, ConnectionToken) {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = ConnectionToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        let entry = ClientEntry {
            sender: tx,
            subscriptions: HashSet::new(),
            token,
            connected_at: Utc::now(),
        };
        let replaced = self
            .clients
            .write()
            .await
            .insert(client_id.to_string(), entry)
            .is_some();
        tracing::info!(client_id, replaced, "Client connected");
        (rx, token)
    }

    /// Remove the client's entry only if it still belongs to the
    /// connection identified by `token`. A connection that was already
    /// replaced by a reconnect tears down as a no-op, leaving the
    /// replacement's registration intact.
    pub async fn disconnect_if_current(&self, client_id: &str, token: ConnectionToken) {
        let mut clients = self.clients.write().await;
        if clients.get(client_id).is_some_and(|e| e.token == token) {
            clients.remove(client_id);
            tracing::info!(client_id, "Client disconnected");
        }
    }

    /// Remove a client's channel and interest set atomically, whichever
    /// connection currently holds the ID.
    pub async fn disconnect(&self, client_id: &str) {
        if self.clients.write().await.remove(client_id).is_some() {
            tracing::info!(client_id, "Client disconnected");
        }
    }

    /// Add metric names to a client's interest set. Unknown clients are a
    /// no-op, not an error.
    pub async fn subscribe(&self, client_id: &str, metric_names: &[String]) {
        let mut clients = self.clients.write().await;
        if let Some(entry) = clients.get_mut(client_id) {
            entry
                .subscriptions
                .extend(metric_names.iter().cloned());
            tracing::info!(client_id, metrics = ?metric_names, "Client subscribed");
        }
    }

    /// Remove metric names from a client's interest set. Unknown clients
    /// are a no-op.
    pub async fn unsubscribe(&self, client_id: &str, metric_names: &[String]) {
        let mut clients = self.clients.write().await;
        if let Some(entry) = clients.get_mut(client_id) {
            for name in metric_names {
                entry.subscriptions.remove(name);
            }
            tracing::info!(client_id, metrics = ?metric_names, "Client unsubscribed");
        }
    }

    /// Send one message to one client. A closed channel disconnects the
    /// client and returns [`StreamError::DeliveryFailed`].
    pub async fn send_to_client(&self, client_id: &str, message: ServerMessage) -> Result<()> {
        let delivered = {
            let clients = self.clients.read().await;
            match clients.get(client_id) {
                Some(entry) => entry.sender.send(message).is_ok(),
                None => return Err(StreamError::ClientNotConnected(client_id.to_string())),
            }
        };
        if delivered {
            Ok(())
        } else {
            tracing::error!(client_id, "Delivery failed, disconnecting client");
            self.disconnect(client_id).await;
            Err(StreamError::DeliveryFailed(client_id.to_string()))
        }
    }

    /// Deliver a measurement to every client whose interest set contains
    /// its metric name. Each send is independent: one broken subscriber is
    /// disconnected without affecting delivery to the others.
    pub async fn broadcast_measurement(&self, measurement: &Measurement) {
        let mut failed = Vec::new();
        {
            let clients = self.clients.read().await;
            for (client_id, entry) in clients.iter() {
                if !entry.subscriptions.contains(&measurement.metric_name) {
                    continue;
                }
                let message = ServerMessage::MetricUpdate {
                    data: measurement.clone(),
                };
                if entry.sender.send(message).is_err() {
                    failed.push(client_id.clone());
                }
            }
        }
        self.reap(failed).await;
    }

    /// Deliver an alert to every connected client, independent of
    /// subscription filters.
    pub async fn broadcast_alert(&self, event: &AlertEvent) {
        let mut failed = Vec::new();
        {
            let clients = self.clients.read().await;
            for (client_id, entry) in clients.iter() {
                let message = ServerMessage::Alert {
                    data: event.clone(),
                };
                if entry.sender.send(message).is_err() {
                    failed.push(client_id.clone());
                }
            }
        }
        self.reap(failed).await;
    }

    async fn reap(&self, failed: Vec<String>) {
        for client_id in failed {
            tracing::error!(client_id = %client_id, "Delivery failed, disconnecting client");
            self.disconnect(&client_id).await;
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Drop every connection. Used during graceful shutdown; receivers see
    /// their channels close and tear their sockets down.
    pub async fn shutdown_all(&self) {
        let mut clients = self.clients.write().await;
        let count = clients.len();
        clients.clear();
        tracing::info!(count, "Closed all subscriber connections");
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
