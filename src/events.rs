//! In-process domain events.
//!
//! Workflows publish onto a bounded mpsc channel; a background consumer
//! drains it. Delivery is best-effort: a full or closed channel is logged
//! and never fails the originating request.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    UserRegistered {
        user_id: Uuid,
    },
    OrderCreated {
        order_id: Uuid,
        order_code: String,
    },
    OrderCancelled {
        order_id: Uuid,
    },
    PaymentInitiated {
        transaction_id: Uuid,
        order_id: Uuid,
        provider_ref: String,
    },
    PaymentSettled {
        transaction_id: Uuid,
        order_id: Uuid,
        succeeded: bool,
    },
    TicketsIssued {
        order_id: Uuid,
        count: u64,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Publish an event, logging instead of failing when the consumer is
    /// gone or the channel is saturated.
    pub async fn publish(&self, event: Event) {
        if let Err(e) = self.sender.send(event).await {
            warn!(error = %e, "failed to publish domain event");
        }
    }
}

/// Background consumer for the event channel.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::PaymentSettled {
                order_id,
                succeeded,
                ..
            } => {
                info!(%order_id, succeeded, "payment settled");
            }
            other => info!(event = ?other, "domain event"),
        }
    }
    info!("event channel closed, consumer exiting");
}
