use crate::{
    db::DbPool,
    entities::{cart_item, order, order_item, product, user, OrderStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    services::{coupons, notifications},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// One cart line of an order request. When `cart_item_id` is set, the
/// stored cart row is consumed (deleted) by the creation transaction.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartLine {
    pub cart_item_id: Option<Uuid>,
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    pub user_id: Uuid,
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub cart_items: Vec<CartLine>,
    pub coupon_code: Option<String>,
    #[validate(length(min = 1, message = "Shipping address is required"))]
    pub address: String,
    #[validate(length(min = 1, message = "Recipient name is required"))]
    pub full_name: String,
    #[validate(length(min = 1, message = "Recipient phone is required"))]
    pub phone_number: String,
    #[validate(length(min = 1, message = "Payment method is required"))]
    pub payment_method: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
    /// Optional shipping-address edit riding along with the transition.
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub price: Decimal,
    pub quantity: i32,
    pub total_money: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub coupon_code: Option<String>,
    pub address: String,
    pub full_name: String,
    pub phone_number: String,
    pub payment_method: String,
    pub total_money: Decimal,
    pub status: OrderStatus,
    pub feedback: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Line items, populated on single-order reads and creation.
    pub items: Vec<OrderItemResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Order total: discount-adjusted sum of the line totals, rounded to two
/// decimal places.
pub fn order_total(items: &[order_item::Model], discount: Decimal) -> Decimal {
    let subtotal: Decimal = items.iter().map(|item| item.total_money).sum();
    (subtotal * (Decimal::from(100) - discount) / Decimal::from(100)).round_dp(2)
}

/// Service owning the order aggregate: creation from cart lines and the
/// fulfillment lifecycle with its side effects.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    event_sender: Option<EventSender>,
}

impl OrderService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Converts cart lines into a persisted order with its line items.
    ///
    /// Everything here — coupon decrement, stock decrements, order and item
    /// rows, cart-row deletes, the creation notification — commits or rolls
    /// back as one transaction. Stock never goes negative: the guarded
    /// decrement re-checks the counter on the row itself, so a racing order
    /// on the same product loses cleanly with `InsufficientStock`.
    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db;
        let now = Utc::now();
        let order_id = Uuid::new_v4();

        let txn = db.begin().await?;

        let user = user::Entity::find_by_id(request.user_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", request.user_id)))?;

        let coupon = match &request.coupon_code {
            Some(code) => Some(coupons::redeem(&txn, code).await?),
            None => None,
        };
        let discount = coupon
            .as_ref()
            .map(|c| c.discount)
            .unwrap_or(Decimal::ZERO);

        let order_model = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(user.id),
            coupon_code: Set(request.coupon_code.clone()),
            address: Set(request.address.clone()),
            full_name: Set(request.full_name.clone()),
            phone_number: Set(request.phone_number.clone()),
            payment_method: Set(request.payment_method.clone()),
            total_money: Set(Decimal::ZERO),
            status: Set(OrderStatus::Pending),
            feedback: Set(false),
            created_at: Set(now),
            updated_at: Set(None),
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(request.cart_items.len());
        for line in &request.cart_items {
            if line.quantity < 1 {
                return Err(ServiceError::ValidationError(
                    "Line quantity must be at least 1".to_string(),
                ));
            }

            let product = product::Entity::find_by_id(line.product_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", line.product_id))
                })?;

            if product.quantity < line.quantity {
                return Err(ServiceError::InsufficientStock(format!(
                    "Product {} has {} in stock, {} requested",
                    product.title, product.quantity, line.quantity
                )));
            }

            // Guarded decrement: the quantity >= n filter re-checks the
            // counter on the row, so a concurrent order cannot drive it
            // negative.
            let updated = product::Entity::update_many()
                .col_expr(
                    product::Column::Quantity,
                    Expr::col(product::Column::Quantity).sub(line.quantity),
                )
                .filter(product::Column::Id.eq(line.product_id))
                .filter(product::Column::Quantity.gte(line.quantity))
                .exec(&txn)
                .await?;
            if updated.rows_affected == 0 {
                return Err(ServiceError::InsufficientStock(format!(
                    "Product {} has {} in stock, {} requested",
                    product.title, product.quantity, line.quantity
                )));
            }

            // Price snapshot at purchase time; later catalog price changes
            // must not rewrite this line.
            let price = product.sale_price;
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(product.id),
                price: Set(price),
                quantity: Set(line.quantity),
                total_money: Set(price * Decimal::from(line.quantity)),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;
            items.push(item);

            if let Some(cart_item_id) = line.cart_item_id {
                cart_item::Entity::delete_by_id(cart_item_id)
                    .exec(&txn)
                    .await?;
            }
        }

        notifications::record(
            &txn,
            user.id,
            Some(order_id),
            "Order placed",
            &format!(
                "Order {} has been created successfully. You can track it from your orders page.",
                order_id
            ),
        )
        .await?;

        let total = order_total(&items, discount);
        let mut order_update: order::ActiveModel = order_model.into();
        order_update.total_money = Set(total);
        let order_model = order_update.update(&txn).await?;

        txn.commit().await?;

        info!(%order_id, user_id = %user.id, %total, "Order created");

        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(Event::OrderCreated(order_id)).await {
                warn!(error = %e, %order_id, "Failed to send order created event");
            }
        }

        Ok(Self::to_response(order_model, items))
    }

    /// Applies a lifecycle transition and its side effects.
    ///
    /// Exactly one notification row is written per transition, inside the
    /// transaction. A `Cancelled` transition restores every line's stock.
    /// Transition legality is deliberately not enforced; the table drives
    /// effects, not permissions.
    #[instrument(skip(self, request), fields(order_id = %order_id, new_status = %request.status))]
    pub async fn update_order_status(
        &self,
        order_id: Uuid,
        request: UpdateOrderStatusRequest,
    ) -> Result<OrderResponse, ServiceError> {
        let db = &*self.db;
        let txn = db.begin().await?;

        let order = order::Entity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        let old_status = order.status;

        let (title, content) = match request.status {
            OrderStatus::Processed => (
                "Order processed",
                "Your order has been processed and will be handed to the carrier shortly."
                    .to_string(),
            ),
            OrderStatus::Shipping => (
                "Order out for delivery",
                "Your order is with the carrier. Keep your phone nearby, it will reach you soon."
                    .to_string(),
            ),
            OrderStatus::Shipped => (
                "Order delivered",
                "Your order has been delivered. Share your experience by leaving a review."
                    .to_string(),
            ),
            OrderStatus::Cancelled => ("Order cancelled", "Your order has been cancelled.".to_string()),
            other => (
                "Order status updated",
                format!("Your order is now {}.", other),
            ),
        };

        if request.status == OrderStatus::Cancelled {
            // Reverse of the creation decrement, line by line, in the same
            // transaction as the status write.
            let items = order_item::Entity::find()
                .filter(order_item::Column::OrderId.eq(order_id))
                .all(&txn)
                .await?;
            for item in &items {
                product::Entity::update_many()
                    .col_expr(
                        product::Column::Quantity,
                        Expr::col(product::Column::Quantity).add(item.quantity),
                    )
                    .filter(product::Column::Id.eq(item.product_id))
                    .exec(&txn)
                    .await?;
            }
        }

        notifications::record(&txn, order.user_id, Some(order_id), title, &content).await?;

        let mut active: order::ActiveModel = order.into();
        active.status = Set(request.status);
        if let Some(address) = request.address {
            active.address = Set(address);
        }
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        info!(%order_id, %old_status, new_status = %updated.status, "Order status updated");

        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender
                .send(Event::OrderStatusChanged {
                    order_id,
                    old_status,
                    new_status: updated.status,
                })
                .await
            {
                warn!(error = %e, %order_id, "Failed to send status changed event");
            }
            let follow_up = match updated.status {
                OrderStatus::Shipped => Some(Event::OrderShipped(order_id)),
                OrderStatus::Cancelled => Some(Event::OrderCancelled(order_id)),
                _ => None,
            };
            if let Some(event) = follow_up {
                if let Err(e) = sender.send(event).await {
                    warn!(error = %e, %order_id, "Failed to send transition event");
                }
            }
        }

        Ok(Self::to_response(updated, Vec::new()))
    }

    /// Orders are the financial audit trail; deleting one is deliberately a
    /// no-op.
    #[instrument(skip(self))]
    pub async fn delete_order(&self, order_id: Uuid) -> Result<(), ServiceError> {
        info!(%order_id, "Order delete requested; orders are never hard-deleted");
        Ok(())
    }

    /// Retrieves an order with its line items.
    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderResponse, ServiceError> {
        let db = &*self.db;
        let order = order::Entity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(db)
            .await?;
        Ok(Self::to_response(order, items))
    }

    /// Lists orders with pagination, newest first.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListResponse, ServiceError> {
        self.list_by_filter(None, None, None, page, per_page).await
    }

    /// Lists a user's orders, optionally narrowed by status and a keyword
    /// matched against recipient name, phone, and address.
    #[instrument(skip(self))]
    pub async fn find_by_user(
        &self,
        user_id: Uuid,
        status: Option<OrderStatus>,
        keyword: Option<String>,
    ) -> Result<Vec<OrderResponse>, ServiceError> {
        let db = &*self.db;
        let mut query = order::Entity::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt);
        if let Some(status) = status {
            query = query.filter(order::Column::Status.eq(status));
        }
        if let Some(keyword) = keyword.filter(|k| !k.trim().is_empty()) {
            let pattern = format!("%{}%", keyword.trim());
            query = query.filter(
                Condition::any()
                    .add(order::Column::FullName.like(pattern.clone()))
                    .add(order::Column::PhoneNumber.like(pattern.clone()))
                    .add(order::Column::Address.like(pattern)),
            );
        }
        let orders = query.all(db).await?;
        Ok(orders
            .into_iter()
            .map(|order| Self::to_response(order, Vec::new()))
            .collect())
    }

    /// Paginated orders filtered by creation date range and status. An
    /// open-ended range with only a start date runs up to now.
    #[instrument(skip(self))]
    pub async fn list_by_filter(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        status: Option<OrderStatus>,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListResponse, ServiceError> {
        let db = &*self.db;
        let page = page.max(1);
        let per_page = per_page.max(1);

        let end = match (start, end) {
            (Some(_), None) => Some(Utc::now()),
            _ => end,
        };

        let mut query = order::Entity::find().order_by_desc(order::Column::CreatedAt);
        if let Some(start) = start {
            query = query.filter(order::Column::CreatedAt.gte(start));
        }
        if let Some(end) = end {
            query = query.filter(order::Column::CreatedAt.lte(end));
        }
        if let Some(status) = status {
            query = query.filter(order::Column::Status.eq(status));
        }

        let paginator = query.paginate(db, per_page);
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page - 1).await?;

        Ok(OrderListResponse {
            orders: orders
                .into_iter()
                .map(|order| Self::to_response(order, Vec::new()))
                .collect(),
            total,
            page,
            per_page,
        })
    }

    /// Flags an order as having received post-delivery feedback.
    #[instrument(skip(self))]
    pub async fn submit_feedback(&self, order_id: Uuid) -> Result<OrderResponse, ServiceError> {
        let db = &*self.db;
        let order = order::Entity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let mut active: order::ActiveModel = order.into();
        active.feedback = Set(true);
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(db).await?;
        Ok(Self::to_response(updated, Vec::new()))
    }

    fn to_response(model: order::Model, items: Vec<order_item::Model>) -> OrderResponse {
        OrderResponse {
            id: model.id,
            user_id: model.user_id,
            coupon_code: model.coupon_code,
            address: model.address,
            full_name: model.full_name,
            phone_number: model.phone_number,
            payment_method: model.payment_method,
            total_money: model.total_money,
            status: model.status,
            feedback: model.feedback,
            created_at: model.created_at,
            updated_at: model.updated_at,
            items: items
                .into_iter()
                .map(|item| OrderItemResponse {
                    id: item.id,
                    product_id: item.product_id,
                    price: item.price,
                    quantity: item.quantity,
                    total_money: item.total_money,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(price: Decimal, quantity: i32) -> order_item::Model {
        order_item::Model {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            price,
            quantity,
            total_money: price * Decimal::from(quantity),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn order_total_without_discount_is_line_sum() {
        let items = vec![item(dec!(25000), 2), item(dec!(10000), 3)];
        assert_eq!(order_total(&items, Decimal::ZERO), dec!(80000));
    }

    #[test]
    fn order_total_applies_percentage_discount() {
        let items = vec![item(dec!(50000), 2)];
        assert_eq!(order_total(&items, dec!(10)), dec!(90000));
    }

    #[test]
    fn order_total_rounds_to_two_decimals() {
        let items = vec![item(dec!(99.99), 1)];
        // 99.99 * 85 / 100 = 84.9915 -> 84.99
        assert_eq!(order_total(&items, dec!(15)), dec!(84.99));
    }

    #[test]
    fn empty_order_totals_zero() {
        assert_eq!(order_total(&[], dec!(50)), Decimal::ZERO);
    }
}
