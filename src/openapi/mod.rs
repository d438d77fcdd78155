use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Shopfront Order API",
        version = "0.3.0",
        description = r#"
Order-processing core of the Shopfront e-commerce platform.

Converts carts into durable orders, keeps inventory and coupon counters
consistent with order creation and cancellation, drives the fulfillment
lifecycle with its notification side effects, reconciles asynchronous
payment-gateway callbacks, and serves time-bucketed revenue statistics.
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Orders", description = "Order creation and lifecycle"),
        (name = "Payments", description = "Gateway session and callback reconciliation"),
        (name = "Statistics", description = "Revenue and product-sales reports"),
        (name = "Health", description = "Service probes")
    ),
    paths(
        crate::handlers::orders::create_order,
        crate::handlers::orders::get_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::list_user_orders,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::submit_feedback,
        crate::handlers::orders::delete_order,
        crate::handlers::payments::payment_return,
        crate::handlers::reports::yearly_revenue,
        crate::handlers::reports::monthly_revenue,
        crate::handlers::reports::daily_revenue,
        crate::handlers::reports::weekly_revenue,
        crate::handlers::reports::product_sales,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::entities::OrderStatus,
        crate::services::orders::CartLine,
        crate::services::orders::CreateOrderRequest,
        crate::services::orders::UpdateOrderStatusRequest,
        crate::services::orders::OrderItemResponse,
        crate::services::orders::OrderResponse,
        crate::services::orders::OrderListResponse,
        crate::services::payments::PaymentRedirect,
        crate::handlers::payments::PaymentReturnResponse,
        crate::services::reports::MonthlyRevenue,
        crate::services::reports::DailyRevenue,
        crate::services::reports::WeeklyRevenue,
        crate::services::reports::ProductSales,
    ))
)]
pub struct ApiDoc;

/// Swagger UI mounted at /docs, serving the generated document.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
