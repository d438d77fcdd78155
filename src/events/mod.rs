use crate::db::DbPool;
use crate::entities::OrderStatus;
use crate::services::mailer::{self, MailTemplate, Mailer};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Domain events emitted after a transaction commits. Everything that must
/// be atomic with the order (stock, coupon, notification rows) happens
/// inside the transaction; these events only drive post-commit effects such
/// as outbound mail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
    OrderCancelled(Uuid),
    OrderShipped(Uuid),
    PaymentCaptured(Uuid),
    PaymentFailed(Uuid),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Post-commit effect loop: fans events out to the mailer. Delivery
/// failures are logged, never propagated — order durability does not depend
/// on them.
pub async fn process_events(
    mut rx: mpsc::Receiver<Event>,
    db: Arc<DbPool>,
    mailer: Arc<dyn Mailer>,
    order_link_base: String,
) {
    while let Some(event) = rx.recv().await {
        match event {
            Event::OrderCreated(order_id) => {
                if let Err(e) = mailer::send_order_mail(
                    &db,
                    mailer.as_ref(),
                    &order_link_base,
                    MailTemplate::OrderCreated,
                    order_id,
                )
                .await
                {
                    warn!(%order_id, error = %e, "Failed to send order confirmation mail");
                }
            }
            Event::OrderShipped(order_id) => {
                if let Err(e) = mailer::send_order_mail(
                    &db,
                    mailer.as_ref(),
                    &order_link_base,
                    MailTemplate::OrderShipped,
                    order_id,
                )
                .await
                {
                    warn!(%order_id, error = %e, "Failed to send shipped confirmation mail");
                }
            }
            other => {
                debug!(event = ?other, "event processed");
            }
        }
    }
}
