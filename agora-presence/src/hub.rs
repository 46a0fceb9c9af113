use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use agora_core::metrics::{ACTIVE_CONNECTIONS, FANOUT_DELIVERIES_TOTAL};
use agora_core::models::ConnectionId;

use crate::events::ServerEvent;

/// Item placed in a connection's outbound mailbox
#[derive(Debug, Clone)]
pub enum Delivery {
    Event(ServerEvent),
    /// The transport should close the socket
    Close,
}

/// Audience of a delivery, used for metrics and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Conference,
    Room,
    Direct,
}

impl Scope {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Conference => "conference",
            Self::Room => "room",
            Self::Direct => "direct",
        }
    }
}

/// Outbound mailboxes of every attached connection
///
/// The hub knows nothing about conferences; callers resolve the audience and
/// hand over connection IDs.
#[derive(Clone)]
pub struct ConnectionHub {
    mailboxes: Arc<DashMap<ConnectionId, mpsc::Sender<Delivery>>>,
    buffer: usize,
}

impl ConnectionHub {
    /// Create a hub whose mailboxes hold up to `buffer` pending deliveries
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        Self {
            mailboxes: Arc::new(DashMap::new()),
            buffer: buffer.max(1),
        }
    }

    /// Attach a connection and return the receiving end of its mailbox
    pub fn attach(&self, connection_id: ConnectionId) -> mpsc::Receiver<Delivery> {
        let (tx, rx) = mpsc::channel(self.buffer);
        if self.mailboxes.insert(connection_id.clone(), tx).is_none() {
            ACTIVE_CONNECTIONS.inc();
        }

        info!(
            connection_id = %connection_id,
            total_connections = self.mailboxes.len(),
            "Connection attached"
        );

        rx
    }

    /// Drop a connection's mailbox
    pub fn detach(&self, connection_id: &ConnectionId) {
        if self.mailboxes.remove(connection_id).is_some() {
            ACTIVE_CONNECTIONS.dec();
            info!(connection_id = %connection_id, "Connection detached");
        }
    }

    /// Deliver an event to a single connection
    pub fn send_to(&self, connection_id: &ConnectionId, event: ServerEvent) -> bool {
        let delivered = self.push(connection_id, Delivery::Event(event));
        if delivered {
            FANOUT_DELIVERIES_TOTAL
                .with_label_values(&[Scope::Direct.as_str()])
                .inc();
        }
        delivered
    }

    /// Deliver an event to every listed connection, returning how many accepted it
    pub fn fan_out<'a>(
        &self,
        targets: impl IntoIterator<Item = &'a ConnectionId>,
        event: &ServerEvent,
        scope: Scope,
    ) -> usize {
        let mut sent_count = 0;

        for connection_id in targets {
            if self.push(connection_id, Delivery::Event(event.clone())) {
                sent_count += 1;
            }
        }

        if sent_count > 0 {
            FANOUT_DELIVERIES_TOTAL
                .with_label_values(&[scope.as_str()])
                .inc_by(sent_count as u64);
            debug!(
                scope = scope.as_str(),
                sent_count = sent_count,
                event_type = event.event_type(),
                "Event fan-out complete"
            );
        }

        sent_count
    }

    /// Ask the transport behind a connection to close it
    pub fn close(&self, connection_id: &ConnectionId) {
        self.push(connection_id, Delivery::Close);
    }

    #[must_use]
    pub fn is_attached(&self, connection_id: &ConnectionId) -> bool {
        self.mailboxes.contains_key(connection_id)
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.mailboxes.len()
    }

    fn push(&self, connection_id: &ConnectionId, delivery: Delivery) -> bool {
        // Clone the sender so no map guard is held while detaching below
        let Some(sender) = self.mailboxes.get(connection_id).map(|s| s.value().clone()) else {
            debug!(connection_id = %connection_id, "No mailbox for connection, delivery skipped");
            return false;
        };

        match sender.try_send(delivery) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    connection_id = %connection_id,
                    "Mailbox full, client too slow to consume events; delivery dropped"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(
                    connection_id = %connection_id,
                    "Mailbox closed, detaching connection"
                );
                self.detach(connection_id);
                false
            }
        }
    }
}

impl Default for ConnectionHub {
    fn default() -> Self {
        Self::new(1024)
    }
}
