use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Domain events published by the services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Catalog events
    ProductCreated(Uuid),
    ProductUpdated(Uuid),
    ProductArchived(Uuid),
    VariantCreated { product_id: Uuid, variant_id: Uuid },
    VariantUpdated(Uuid),
    VariantDeleted(Uuid),

    // Cart events
    CartCreated(Uuid),
    CartItemAdded { cart_id: Uuid, product_id: Uuid },
    CartItemUpdated { cart_id: Uuid, product_id: Uuid },
    CartItemRemoved { cart_id: Uuid, product_id: Uuid },
    CartCleared(Uuid),

    // Payment events
    PaymentIntentCreated { intent_id: Uuid, amount: i64 },
    PaymentCaptured(Uuid),
    PaymentFailed(Uuid),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, surfacing channel failures to the caller.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("failed to send event: {e}"))
    }

    /// Sends an event, logging instead of failing when the channel is down.
    /// Event delivery is best-effort; losing one never fails a request.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("{e}");
        }
    }
}

/// Background consumer for the event channel.
///
/// Spawned once at startup; runs until every sender is dropped.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    info!("event processor started");
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::PaymentCaptured(intent_id) => {
                info!(%intent_id, "payment captured");
            }
            Event::PaymentFailed(intent_id) => {
                warn!(%intent_id, "payment failed");
            }
            other => debug!(event = ?other, "event processed"),
        }
    }
    info!("event processor stopped");
}
