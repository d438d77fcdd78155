use crate::{
    db::DbPool,
    entities::{order, OrderStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    services::gateway::{self, PaymentGateway, SessionContext},
    services::orders::{CreateOrderRequest, OrderService},
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Payment-method tag routed through the external gateway; every other tag
/// settles offline and stays on the shipping track only.
pub const GATEWAY_PAYMENT_METHOD: &str = "gateway";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentRedirect {
    pub order_id: Uuid,
    pub method: String,
    /// Empty for payment methods that settle offline.
    pub redirect_url: String,
}

/// Bridges order creation to the external payment gateway and reconciles
/// its asynchronous return callback into a status transition.
pub struct PaymentService {
    db: Arc<DbPool>,
    orders: Arc<OrderService>,
    gateway: Arc<dyn PaymentGateway>,
    event_sender: Option<EventSender>,
}

impl PaymentService {
    pub fn new(
        db: Arc<DbPool>,
        orders: Arc<OrderService>,
        gateway: Arc<dyn PaymentGateway>,
        event_sender: Option<EventSender>,
    ) -> Self {
        Self {
            db,
            orders,
            gateway,
            event_sender,
        }
    }

    /// Full checkout: the order is created (and durable) first, then a
    /// gateway session is opened for online payments. The gateway call runs
    /// with no database transaction held open; the `Unpaid` advance is a
    /// short follow-up write.
    #[instrument(skip(self, request, ctx), fields(user_id = %request.user_id))]
    pub async fn checkout(
        &self,
        request: CreateOrderRequest,
        ctx: SessionContext,
    ) -> Result<PaymentRedirect, ServiceError> {
        let order = self.orders.create_order(request).await?;
        let method = order.payment_method.clone();

        if !method.eq_ignore_ascii_case(GATEWAY_PAYMENT_METHOD) {
            return Ok(PaymentRedirect {
                order_id: order.id,
                method,
                redirect_url: String::new(),
            });
        }

        let redirect_url = self
            .gateway
            .create_session(order.total_money, order.id, &ctx)
            .await?;

        self.write_status(order.id, OrderStatus::Unpaid).await?;
        info!(order_id = %order.id, "order awaiting gateway confirmation");

        Ok(PaymentRedirect {
            order_id: order.id,
            method,
            redirect_url,
        })
    }

    /// Reconciles the gateway's return callback. The order is located
    /// strictly by the correlation id the callback carries; a verified code
    /// of 1 marks it `Paid`, anything else `Unpaid`. Re-delivery of a
    /// callback for an already-paid order is a no-op.
    #[instrument(skip(self, params))]
    pub async fn gateway_return(
        &self,
        params: HashMap<String, String>,
    ) -> Result<i32, ServiceError> {
        let code = self.gateway.verify_callback(&params).await?;

        let order_ref = params
            .get(gateway::PARAM_ORDER_REF)
            .ok_or_else(|| ServiceError::NotFound("Callback carries no order reference".to_string()))?;
        let order_id = Uuid::parse_str(order_ref)
            .map_err(|_| ServiceError::NotFound(format!("Order {} not found", order_ref)))?;

        let order = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if order.status == OrderStatus::Paid {
            info!(%order_id, "duplicate payment callback ignored; order already paid");
            return Ok(code);
        }

        let new_status = if code == gateway::RESULT_CAPTURED {
            OrderStatus::Paid
        } else {
            OrderStatus::Unpaid
        };

        let mut active: order::ActiveModel = order.into();
        active.status = Set(new_status);
        active.updated_at = Set(Some(Utc::now()));
        active.update(&*self.db).await?;

        info!(%order_id, code, status = %new_status, "payment callback reconciled");

        if let Some(sender) = &self.event_sender {
            let event = if new_status == OrderStatus::Paid {
                Event::PaymentCaptured(order_id)
            } else {
                Event::PaymentFailed(order_id)
            };
            if let Err(e) = sender.send(event).await {
                warn!(error = %e, %order_id, "Failed to send payment event");
            }
        }

        Ok(code)
    }

    /// Direct status write for the payment track. Payment transitions are
    /// not part of the notifying lifecycle table.
    async fn write_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        let order = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        let mut active: order::ActiveModel = order.into();
        active.status = Set(status);
        active.updated_at = Set(Some(Utc::now()));
        Ok(active.update(&*self.db).await?)
    }
}
