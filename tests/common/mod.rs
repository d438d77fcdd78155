#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use tokio::sync::mpsc;
use uuid::Uuid;

use shopfront_api::{
    config::AppConfig,
    db,
    entities::{cart_item, coupon, notification, product, user},
    errors::ServiceError,
    events::{self, EventSender},
    handlers::AppServices,
    services::gateway::{
        PaymentGateway, SessionContext, PARAM_RESPONSE_CODE, RESULT_CAPTURED, RESULT_DECLINED,
    },
    services::mailer::NoopMailer,
    services::orders::{CartLine, CreateOrderRequest},
    AppState,
};

/// Gateway double: sessions are deterministic URLs and callbacks are
/// approved exactly when the response code is "00".
pub struct MockGateway;

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_session(
        &self,
        amount: Decimal,
        order_id: Uuid,
        _ctx: &SessionContext,
    ) -> Result<String, ServiceError> {
        Ok(format!(
            "https://gateway.test/pay?order_ref={}&amount={}",
            order_id, amount
        ))
    }

    async fn verify_callback(
        &self,
        params: &HashMap<String, String>,
    ) -> Result<i32, ServiceError> {
        Ok(match params.get(PARAM_RESPONSE_CODE).map(String::as_str) {
            Some("00") => RESULT_CAPTURED,
            _ => RESULT_DECLINED,
        })
    }
}

/// Test harness: real services over an in-memory SQLite database with the
/// schema applied by the migrator.
pub struct TestApp {
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            0,
            "test".to_string(),
        );

        // A single connection keeps the in-memory database alive and shared.
        let db_cfg = db::DbConfig {
            url: cfg.database_url.clone(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        };
        let pool = db::establish_connection_with_config(&db_cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db = Arc::new(pool);

        let (tx, rx) = mpsc::channel(64);
        let event_sender = EventSender::new(tx);
        let event_task = tokio::spawn(events::process_events(
            rx,
            db.clone(),
            Arc::new(NoopMailer),
            "http://localhost/orders/".to_string(),
        ));

        let services = AppServices::new(db.clone(), event_sender.clone(), Arc::new(MockGateway));
        let state = AppState {
            db,
            config: cfg,
            event_sender,
            services,
        };

        Self {
            state,
            _event_task: event_task,
        }
    }

    pub async fn seed_user(&self) -> user::Model {
        self.state
            .services
            .users
            .create("buyer@example.com", "Buyer One")
            .await
            .expect("seed user")
    }

    pub async fn seed_product(&self, title: &str, price: Decimal, quantity: i32) -> product::Model {
        self.state
            .services
            .products
            .create(title, price, quantity)
            .await
            .expect("seed product")
    }

    pub async fn seed_coupon(&self, code: &str, discount: Decimal, quantity: i32) -> coupon::Model {
        coupon::ActiveModel {
            code: Set(code.to_string()),
            discount: Set(discount),
            quantity: Set(quantity),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed coupon")
    }

    pub async fn seed_cart_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> cart_item::Model {
        cart_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            product_id: Set(product_id),
            quantity: Set(quantity),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed cart item")
    }

    pub async fn product_quantity(&self, id: Uuid) -> i32 {
        self.state
            .services
            .products
            .get_by_id(id)
            .await
            .expect("product lookup")
            .quantity
    }

    pub async fn coupon_quantity(&self, code: &str) -> i32 {
        self.state
            .services
            .coupons
            .get_coupon(code)
            .await
            .expect("coupon lookup")
            .quantity
    }

    pub async fn notifications_for(&self, user_id: Uuid) -> Vec<notification::Model> {
        self.state
            .services
            .notifications
            .list_for_user(user_id)
            .await
            .expect("notification listing")
    }
}

/// Builds an order request without stored cart rows.
pub fn order_request(
    user_id: Uuid,
    lines: &[(Uuid, i32)],
    coupon: Option<&str>,
    payment_method: &str,
) -> CreateOrderRequest {
    CreateOrderRequest {
        user_id,
        cart_items: lines
            .iter()
            .map(|&(product_id, quantity)| CartLine {
                cart_item_id: None,
                product_id,
                quantity,
            })
            .collect(),
        coupon_code: coupon.map(str::to_string),
        address: "12 Elm Street".to_string(),
        full_name: "Buyer One".to_string(),
        phone_number: "0123456789".to_string(),
        payment_method: payment_method.to_string(),
    }
}
