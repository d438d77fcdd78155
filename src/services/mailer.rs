use crate::db::DbPool;
use crate::entities::{coupon, order, order_item, user};
use crate::errors::ServiceError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use std::collections::HashMap;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Named mail templates the order core renders through the mail service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailTemplate {
    OrderCreated,
    OrderShipped,
}

impl MailTemplate {
    pub fn key(&self) -> &'static str {
        match self {
            MailTemplate::OrderCreated => "order-created",
            MailTemplate::OrderShipped => "order-shipped",
        }
    }

    pub fn subject(&self) -> &'static str {
        match self {
            MailTemplate::OrderCreated => "Your order has been placed",
            MailTemplate::OrderShipped => "Your order has been delivered",
        }
    }
}

/// Email/template collaborator: render a named template with a key/value
/// context and deliver it. Fire-and-forget from the order core's
/// perspective; callers log failures instead of propagating them.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_template_mail(
        &self,
        to: &str,
        subject: &str,
        template: MailTemplate,
        context: HashMap<String, String>,
    ) -> Result<(), ServiceError>;
}

/// Mailer backed by an HTTP mail API (JSON POST per message).
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    sender: String,
}

impl HttpMailer {
    pub fn new(endpoint: String, api_key: Option<String>, sender: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            sender,
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send_template_mail(
        &self,
        to: &str,
        subject: &str,
        template: MailTemplate,
        context: HashMap<String, String>,
    ) -> Result<(), ServiceError> {
        let payload = serde_json::json!({
            "from": self.sender,
            "to": to,
            "subject": subject,
            "template": template.key(),
            "context": context,
        });

        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.header("X-Api-Key", key);
        }

        let response = request.send().await.map_err(|e| {
            error!(error = %e, "mail transport error");
            ServiceError::ExternalServiceError(format!("mail transport error: {}", e))
        })?;

        if !response.status().is_success() {
            return Err(ServiceError::ExternalServiceError(format!(
                "mail API returned {}",
                response.status()
            )));
        }

        info!(to = %to, template = template.key(), "mail dispatched");
        Ok(())
    }
}

/// Mailer used when no mail endpoint is configured (and in tests): logs the
/// send and succeeds.
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send_template_mail(
        &self,
        to: &str,
        subject: &str,
        template: MailTemplate,
        _context: HashMap<String, String>,
    ) -> Result<(), ServiceError> {
        debug!(to = %to, subject = %subject, template = template.key(), "mail delivery disabled; skipping");
        Ok(())
    }
}

/// Builds the template context for order mail: customer and recipient
/// fields, totals, and the discount breakdown when a coupon was applied.
pub fn order_mail_context(
    order: &order::Model,
    items: &[order_item::Model],
    user: &user::Model,
    coupon: Option<&coupon::Model>,
    link_base: &str,
) -> HashMap<String, String> {
    let mut context = HashMap::new();
    context.insert("CUSTOMER_NAME".to_string(), user.full_name.clone());
    context.insert("CUSTOMER_EMAIL".to_string(), user.email.clone());
    context.insert(
        "CUSTOMER_RECEIVE_NAME".to_string(),
        order.full_name.clone(),
    );
    context.insert("CUSTOMER_PHONE".to_string(), order.phone_number.clone());
    context.insert("CUSTOMER_ADDRESS".to_string(), order.address.clone());
    context.insert(
        "ORDER_DATE".to_string(),
        order.created_at.format("%d-%m-%Y %H:%M:%S").to_string(),
    );
    context.insert("ORDER_ITEM_COUNT".to_string(), items.len().to_string());
    context.insert("ORDER_TOTAL".to_string(), order.total_money.to_string());
    context.insert(
        "ORDER_LINK".to_string(),
        format!("{}{}", link_base, order.id),
    );

    let mut total_before_discount = order.total_money;
    if let Some(coupon) = coupon {
        if coupon.discount > Decimal::ZERO {
            let undiscounted = (order.total_money * Decimal::from(100)
                / (Decimal::from(100) - coupon.discount))
                .round_dp(2);
            let discount_amount = undiscounted - order.total_money;
            context.insert(
                "ORDER_DISCOUNT_PRICE".to_string(),
                discount_amount.to_string(),
            );
            total_before_discount = undiscounted;
        }
        context.insert("ORDER_COUPON_CODE".to_string(), coupon.code.clone());
    }
    context.insert(
        "ORDER_TOTAL_NOT_DISCOUNT".to_string(),
        total_before_discount.to_string(),
    );

    context
}

/// Loads the order aggregate and dispatches the given template to its
/// owner. Used by the post-commit event loop.
pub async fn send_order_mail(
    db: &DbPool,
    mailer: &dyn Mailer,
    link_base: &str,
    template: MailTemplate,
    order_id: Uuid,
) -> Result<(), ServiceError> {
    let order = order::Entity::find_by_id(order_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

    let user = user::Entity::find_by_id(order.user_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", order.user_id)))?;

    let items = order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .all(db)
        .await?;

    let coupon = match &order.coupon_code {
        Some(code) => coupon::Entity::find_by_id(code.clone()).one(db).await?,
        None => None,
    };

    let context = order_mail_context(&order, &items, &user, coupon.as_ref(), link_base);
    mailer
        .send_template_mail(&user.email, template.subject(), template, context)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn sample_order(total: Decimal, coupon_code: Option<&str>) -> order::Model {
        order::Model {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            coupon_code: coupon_code.map(|c| c.to_string()),
            address: "12 Elm Street".to_string(),
            full_name: "Recipient Name".to_string(),
            phone_number: "0123456789".to_string(),
            payment_method: "cod".to_string(),
            total_money: total,
            status: crate::entities::OrderStatus::Pending,
            feedback: false,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn sample_user() -> user::Model {
        user::Model {
            id: Uuid::new_v4(),
            email: "buyer@example.com".to_string(),
            full_name: "Buyer".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn context_without_coupon_keeps_total() {
        let order = sample_order(dec!(90000), None);
        let user = sample_user();
        let context = order_mail_context(&order, &[], &user, None, "https://shop.example/orders/");

        assert_eq!(context["ORDER_TOTAL"], "90000");
        assert_eq!(context["ORDER_TOTAL_NOT_DISCOUNT"], "90000");
        assert!(!context.contains_key("ORDER_COUPON_CODE"));
        assert!(context["ORDER_LINK"].starts_with("https://shop.example/orders/"));
    }

    #[test]
    fn context_with_coupon_reports_discount() {
        // 10% off an undiscounted 100000 leaves 90000
        let order = sample_order(dec!(90000), Some("SALE10"));
        let user = sample_user();
        let coupon = coupon::Model {
            code: "SALE10".to_string(),
            discount: dec!(10),
            quantity: 5,
        };
        let context =
            order_mail_context(&order, &[], &user, Some(&coupon), "https://shop.example/o/");

        assert_eq!(context["ORDER_COUPON_CODE"], "SALE10");
        assert_eq!(
            context["ORDER_TOTAL_NOT_DISCOUNT"].parse::<Decimal>().unwrap(),
            dec!(100000)
        );
        assert_eq!(
            context["ORDER_DISCOUNT_PRICE"].parse::<Decimal>().unwrap(),
            dec!(10000)
        );
    }
}
