//! Integration tests for the order aggregate: creation arithmetic, stock
//! and coupon consistency, rollback on failure, and the lifecycle state
//! machine's side effects.

mod common;

use common::{order_request, TestApp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;
use shopfront_api::entities::{cart_item, order, OrderStatus};
use shopfront_api::errors::ServiceError;
use shopfront_api::services::orders::{CartLine, UpdateOrderStatusRequest};
use uuid::Uuid;

#[tokio::test]
async fn create_order_computes_totals_and_decrements_stock() {
    let app = TestApp::new().await;
    let user = app.seed_user().await;
    let tea = app.seed_product("Green Tea", dec!(25000), 10).await;
    let mugs = app.seed_product("Ceramic Mug", dec!(10000), 5).await;

    let order = app
        .state
        .services
        .orders
        .create_order(order_request(
            user.id,
            &[(tea.id, 2), (mugs.id, 3)],
            None,
            "cod",
        ))
        .await
        .expect("order should be created");

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total_money, dec!(80000));
    assert_eq!(order.items.len(), 2);
    for item in &order.items {
        assert_eq!(item.total_money, item.price * Decimal::from(item.quantity));
    }

    assert_eq!(app.product_quantity(tea.id).await, 8);
    assert_eq!(app.product_quantity(mugs.id).await, 2);

    let notifications = app.notifications_for(user.id).await;
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].title, "Order placed");
    assert_eq!(notifications[0].order_id, Some(order.id));
}

#[tokio::test]
async fn create_order_with_coupon_applies_discount_and_consumes_one_use() {
    let app = TestApp::new().await;
    let user = app.seed_user().await;
    let tea = app.seed_product("Green Tea", dec!(50000), 10).await;
    app.seed_coupon("SALE10", dec!(10), 5).await;

    let order = app
        .state
        .services
        .orders
        .create_order(order_request(user.id, &[(tea.id, 2)], Some("SALE10"), "cod"))
        .await
        .expect("order should be created");

    // 100000 minus 10 percent
    assert_eq!(order.total_money, dec!(90000));
    assert_eq!(order.coupon_code.as_deref(), Some("SALE10"));
    assert_eq!(app.coupon_quantity("SALE10").await, 4);
}

#[tokio::test]
async fn insufficient_stock_rolls_back_every_write() {
    let app = TestApp::new().await;
    let user = app.seed_user().await;
    let tea = app.seed_product("Green Tea", dec!(25000), 10).await;
    let mugs = app.seed_product("Ceramic Mug", dec!(10000), 2).await;
    app.seed_coupon("SALE10", dec!(10), 1).await;

    // The first line is satisfiable; the second is not. Nothing may stick.
    let err = app
        .state
        .services
        .orders
        .create_order(order_request(
            user.id,
            &[(tea.id, 2), (mugs.id, 3)],
            Some("SALE10"),
            "cod",
        ))
        .await
        .expect_err("order must fail on the second line");
    assert!(matches!(err, ServiceError::InsufficientStock(_)));

    assert_eq!(app.product_quantity(tea.id).await, 10);
    assert_eq!(app.product_quantity(mugs.id).await, 2);
    assert_eq!(app.coupon_quantity("SALE10").await, 1);
    assert!(app.notifications_for(user.id).await.is_empty());
    assert!(app
        .state
        .services
        .orders
        .find_by_user(user.id, None, None)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn stock_exhaustion_across_sequential_orders() {
    let app = TestApp::new().await;
    let user = app.seed_user().await;
    let tea = app.seed_product("Green Tea", dec!(25000), 5).await;

    app.state
        .services
        .orders
        .create_order(order_request(user.id, &[(tea.id, 3)], None, "cod"))
        .await
        .expect("first order fits the stock");

    let err = app
        .state
        .services
        .orders
        .create_order(order_request(user.id, &[(tea.id, 3)], None, "cod"))
        .await
        .expect_err("second order exceeds the remaining stock");
    assert!(matches!(err, ServiceError::InsufficientStock(_)));

    assert_eq!(app.product_quantity(tea.id).await, 2);
}

#[tokio::test]
async fn one_use_coupon_allows_exactly_one_redemption() {
    let app = TestApp::new().await;
    let user = app.seed_user().await;
    let tea = app.seed_product("Green Tea", dec!(50000), 10).await;
    app.seed_coupon("LAST1", dec!(10), 1).await;

    app.state
        .services
        .orders
        .create_order(order_request(user.id, &[(tea.id, 1)], Some("LAST1"), "cod"))
        .await
        .expect("first redemption succeeds");

    let err = app
        .state
        .services
        .orders
        .create_order(order_request(user.id, &[(tea.id, 1)], Some("LAST1"), "cod"))
        .await
        .expect_err("second redemption must fail");
    assert!(matches!(err, ServiceError::InvalidInput(_)));

    assert_eq!(app.coupon_quantity("LAST1").await, 0);
}

#[tokio::test]
async fn concurrent_redemptions_of_a_one_use_coupon_allow_exactly_one_success() {
    let app = TestApp::new().await;
    let user = app.seed_user().await;
    let tea = app.seed_product("Green Tea", dec!(50000), 10).await;
    app.seed_coupon("SALE10", dec!(10), 1).await;

    let orders = &app.state.services.orders;
    let (a, b) = tokio::join!(
        orders.create_order(order_request(user.id, &[(tea.id, 1)], Some("SALE10"), "cod")),
        orders.create_order(order_request(user.id, &[(tea.id, 1)], Some("SALE10"), "cod")),
    );

    assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
    let failure = if a.is_err() {
        a.unwrap_err()
    } else {
        b.unwrap_err()
    };
    assert!(matches!(failure, ServiceError::InvalidInput(_)));
    assert_eq!(app.coupon_quantity("SALE10").await, 0);
}

#[tokio::test]
async fn concurrent_orders_cannot_oversell_stock() {
    let app = TestApp::new().await;
    let user = app.seed_user().await;
    let tea = app.seed_product("Green Tea", dec!(25000), 5).await;

    let orders = &app.state.services.orders;
    let (a, b) = tokio::join!(
        orders.create_order(order_request(user.id, &[(tea.id, 3)], None, "cod")),
        orders.create_order(order_request(user.id, &[(tea.id, 3)], None, "cod")),
    );

    assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
    let failure = if a.is_err() {
        a.unwrap_err()
    } else {
        b.unwrap_err()
    };
    assert!(matches!(failure, ServiceError::InsufficientStock(_)));

    // The winner took three units; stock never went negative.
    assert_eq!(app.product_quantity(tea.id).await, 2);
}

#[tokio::test]
async fn exhausted_coupon_is_rejected_up_front() {
    let app = TestApp::new().await;
    let user = app.seed_user().await;
    let tea = app.seed_product("Green Tea", dec!(50000), 10).await;
    app.seed_coupon("SPENT", dec!(20), 0).await;

    let err = app
        .state
        .services
        .orders
        .create_order(order_request(user.id, &[(tea.id, 1)], Some("SPENT"), "cod"))
        .await
        .expect_err("exhausted coupon must be rejected");
    assert!(matches!(err, ServiceError::InvalidInput(_)));

    assert_eq!(app.product_quantity(tea.id).await, 10);
}

#[tokio::test]
async fn unknown_references_fail_not_found() {
    let app = TestApp::new().await;
    let user = app.seed_user().await;
    let tea = app.seed_product("Green Tea", dec!(25000), 10).await;

    let err = app
        .state
        .services
        .orders
        .create_order(order_request(Uuid::new_v4(), &[(tea.id, 1)], None, "cod"))
        .await
        .expect_err("unknown user");
    assert!(matches!(err, ServiceError::NotFound(_)));

    let err = app
        .state
        .services
        .orders
        .create_order(order_request(user.id, &[(Uuid::new_v4(), 1)], None, "cod"))
        .await
        .expect_err("unknown product");
    assert!(matches!(err, ServiceError::NotFound(_)));

    let err = app
        .state
        .services
        .orders
        .create_order(order_request(user.id, &[(tea.id, 1)], Some("NOPE"), "cod"))
        .await
        .expect_err("unknown coupon");
    assert!(matches!(err, ServiceError::NotFound(_)));

    // None of the failures may have touched the stock.
    assert_eq!(app.product_quantity(tea.id).await, 10);
}

#[tokio::test]
async fn referenced_cart_rows_are_consumed() {
    let app = TestApp::new().await;
    let user = app.seed_user().await;
    let tea = app.seed_product("Green Tea", dec!(25000), 10).await;
    let cart_row = app.seed_cart_item(user.id, tea.id, 2).await;

    let mut request = order_request(user.id, &[], None, "cod");
    request.cart_items = vec![CartLine {
        cart_item_id: Some(cart_row.id),
        product_id: tea.id,
        quantity: cart_row.quantity,
    }];

    app.state
        .services
        .orders
        .create_order(request)
        .await
        .expect("order should be created");

    let remaining = cart_item::Entity::find_by_id(cart_row.id)
        .one(&*app.state.db)
        .await
        .unwrap();
    assert!(remaining.is_none(), "cart row must be consumed");
}

#[tokio::test]
async fn line_item_prices_survive_catalog_price_changes() {
    let app = TestApp::new().await;
    let user = app.seed_user().await;
    let tea = app.seed_product("Green Tea", dec!(25000), 10).await;

    let first = app
        .state
        .services
        .orders
        .create_order(order_request(user.id, &[(tea.id, 1)], None, "cod"))
        .await
        .unwrap();
    assert_eq!(first.items[0].price, dec!(25000));

    app.state
        .services
        .products
        .save(shopfront_api::entities::product::ActiveModel {
            id: sea_orm::Set(tea.id),
            sale_price: sea_orm::Set(dec!(30000)),
            ..Default::default()
        })
        .await
        .unwrap();

    let second = app
        .state
        .services
        .orders
        .create_order(order_request(user.id, &[(tea.id, 1)], None, "cod"))
        .await
        .unwrap();
    assert_eq!(second.items[0].price, dec!(30000));

    // The historical line keeps the price snapshot taken at purchase time.
    let first_again = app
        .state
        .services
        .orders
        .get_order(first.id)
        .await
        .unwrap();
    assert_eq!(first_again.items[0].price, dec!(25000));
}

#[tokio::test]
async fn cancellation_restores_stock_and_notifies() {
    let app = TestApp::new().await;
    let user = app.seed_user().await;
    let tea = app.seed_product("Green Tea", dec!(50000), 5).await;

    let order = app
        .state
        .services
        .orders
        .create_order(order_request(user.id, &[(tea.id, 3)], None, "cod"))
        .await
        .expect("order should be created");
    assert_eq!(app.product_quantity(tea.id).await, 2);
    assert_eq!(order.total_money, dec!(150000));

    let cancelled = app
        .state
        .services
        .orders
        .update_order_status(
            order.id,
            UpdateOrderStatusRequest {
                status: OrderStatus::Cancelled,
                address: None,
            },
        )
        .await
        .expect("cancellation should succeed");
    assert_eq!(cancelled.status, OrderStatus::Cancelled);

    // Stock back at the pre-order level.
    assert_eq!(app.product_quantity(tea.id).await, 5);

    let notifications = app.notifications_for(user.id).await;
    assert_eq!(notifications.len(), 2);
    assert!(notifications
        .iter()
        .any(|n| n.title == "Order cancelled" && n.order_id == Some(order.id)));
}

#[tokio::test]
async fn every_transition_writes_exactly_one_notification() {
    let app = TestApp::new().await;
    let user = app.seed_user().await;
    let tea = app.seed_product("Green Tea", dec!(25000), 10).await;

    let order = app
        .state
        .services
        .orders
        .create_order(order_request(user.id, &[(tea.id, 1)], None, "cod"))
        .await
        .unwrap();

    for (status, title) in [
        (OrderStatus::Processed, "Order processed"),
        (OrderStatus::Shipping, "Order out for delivery"),
        (OrderStatus::Shipped, "Order delivered"),
    ] {
        let before = app.notifications_for(user.id).await.len();
        let updated = app
            .state
            .services
            .orders
            .update_order_status(
                order.id,
                UpdateOrderStatusRequest {
                    status,
                    address: None,
                },
            )
            .await
            .expect("transition should succeed");
        assert_eq!(updated.status, status);

        let after = app.notifications_for(user.id).await;
        assert_eq!(after.len(), before + 1);
        assert_eq!(after.iter().filter(|n| n.title == title).count(), 1);
    }
}

#[tokio::test]
async fn address_edit_rides_along_with_a_transition() {
    let app = TestApp::new().await;
    let user = app.seed_user().await;
    let tea = app.seed_product("Green Tea", dec!(25000), 10).await;

    let order = app
        .state
        .services
        .orders
        .create_order(order_request(user.id, &[(tea.id, 1)], None, "cod"))
        .await
        .unwrap();

    let updated = app
        .state
        .services
        .orders
        .update_order_status(
            order.id,
            UpdateOrderStatusRequest {
                status: OrderStatus::Processed,
                address: Some("99 Oak Avenue".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.address, "99 Oak Avenue");
}

#[tokio::test]
async fn feedback_flag_is_recorded() {
    let app = TestApp::new().await;
    let user = app.seed_user().await;
    let tea = app.seed_product("Green Tea", dec!(25000), 10).await;

    let order = app
        .state
        .services
        .orders
        .create_order(order_request(user.id, &[(tea.id, 1)], None, "cod"))
        .await
        .unwrap();
    assert!(!order.feedback);

    let updated = app
        .state
        .services
        .orders
        .submit_feedback(order.id)
        .await
        .unwrap();
    assert!(updated.feedback);
}

#[tokio::test]
async fn delete_is_a_noop_and_keeps_the_order() {
    let app = TestApp::new().await;
    let user = app.seed_user().await;
    let tea = app.seed_product("Green Tea", dec!(25000), 10).await;

    let created = app
        .state
        .services
        .orders
        .create_order(order_request(user.id, &[(tea.id, 1)], None, "cod"))
        .await
        .unwrap();

    app.state
        .services
        .orders
        .delete_order(created.id)
        .await
        .unwrap();

    let still_there = order::Entity::find_by_id(created.id)
        .one(&*app.state.db)
        .await
        .unwrap();
    assert!(still_there.is_some(), "orders are the audit trail");
}

#[tokio::test]
async fn find_by_user_filters_on_status_and_keyword() {
    let app = TestApp::new().await;
    let user = app.seed_user().await;
    let tea = app.seed_product("Green Tea", dec!(25000), 20).await;

    let first = app
        .state
        .services
        .orders
        .create_order(order_request(user.id, &[(tea.id, 1)], None, "cod"))
        .await
        .unwrap();
    app.state
        .services
        .orders
        .create_order(order_request(user.id, &[(tea.id, 2)], None, "cod"))
        .await
        .unwrap();

    app.state
        .services
        .orders
        .update_order_status(
            first.id,
            UpdateOrderStatusRequest {
                status: OrderStatus::Shipped,
                address: None,
            },
        )
        .await
        .unwrap();

    let shipped = app
        .state
        .services
        .orders
        .find_by_user(user.id, Some(OrderStatus::Shipped), None)
        .await
        .unwrap();
    assert_eq!(shipped.len(), 1);
    assert_eq!(shipped[0].id, first.id);

    let by_keyword = app
        .state
        .services
        .orders
        .find_by_user(user.id, None, Some("Elm".to_string()))
        .await
        .unwrap();
    assert_eq!(by_keyword.len(), 2);

    let no_match = app
        .state
        .services
        .orders
        .find_by_user(user.id, None, Some("Nowhere".to_string()))
        .await
        .unwrap();
    assert!(no_match.is_empty());
}
