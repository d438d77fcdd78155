pub mod orders;
pub mod payments;
pub mod reports;

use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{
    coupons::CouponService, gateway::PaymentGateway, notifications::NotificationService,
    orders::OrderService, payments::PaymentService, products::ProductService,
    reports::ReportService, users::UserService,
};
use std::sync::Arc;

/// Aggregated service set shared by the HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
    pub coupons: Arc<CouponService>,
    pub products: Arc<ProductService>,
    pub users: Arc<UserService>,
    pub notifications: Arc<NotificationService>,
    pub reports: Arc<ReportService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: EventSender,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let orders = Arc::new(OrderService::new(db.clone(), Some(event_sender.clone())));
        let payments = Arc::new(PaymentService::new(
            db.clone(),
            orders.clone(),
            gateway,
            Some(event_sender),
        ));
        Self {
            orders,
            payments,
            coupons: Arc::new(CouponService::new(db.clone())),
            products: Arc::new(ProductService::new(db.clone())),
            users: Arc::new(UserService::new(db.clone())),
            notifications: Arc::new(NotificationService::new(db.clone())),
            reports: Arc::new(ReportService::new(db)),
        }
    }
}
