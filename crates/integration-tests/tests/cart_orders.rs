//! Cart, checkout, cancellation and fulfilment.
//!
//! These tests require a running API server, database and
//! `GEMVAULT_TEST_ADMIN_EMAIL`/`_PASSWORD`.

use gemvault_integration_tests::{
    Account, client, create_address, json_body, listed_gem, register_buyer, url,
};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

fn amount(value: &Value) -> f64 {
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| panic!("expected decimal string, got {value}"))
}

async fn add_to_cart(client: &Client, buyer: &Account, gem_id: i64, quantity: i32) -> reqwest::Response {
    client
        .post(url("/api/cart/items"))
        .bearer_auth(&buyer.token)
        .json(&json!({ "gem_id": gem_id, "quantity": quantity }))
        .send()
        .await
        .expect("Failed to add to cart")
}

async fn gem_stock(client: &Client, owner: &Account, gem_id: i64) -> (i64, String) {
    let resp = client
        .get(url(&format!("/api/gems/{gem_id}")))
        .bearer_auth(&owner.token)
        .send()
        .await
        .expect("Failed to get gem");
    let body = json_body(resp).await;
    (
        body["stock_quantity"].as_i64().expect("stock_quantity"),
        body["status"].as_str().expect("status").to_string(),
    )
}

async fn checkout(client: &Client, buyer: &Account, address_id: i64) -> reqwest::Response {
    client
        .post(url("/api/orders/checkout"))
        .bearer_auth(&buyer.token)
        .json(&json!({ "shipping_address_id": address_id, "payment_method": "card" }))
        .send()
        .await
        .expect("Failed to check out")
}

// ============================================================================
// Cart
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API server, database and admin credentials"]
async fn test_cart_respects_stock() {
    let client = client();
    let Some((_admin, _seller, gem_id)) = listed_gem(&client, "250.00", 2).await else {
        return;
    };
    let buyer = register_buyer(&client).await;

    let resp = add_to_cart(&client, &buyer, gem_id, 2).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cart = json_body(resp).await;
    assert_eq!(cart["item_count"], 2);
    assert!((amount(&cart["subtotal"]) - 500.0).abs() < f64::EPSILON);

    let too_many = add_to_cart(&client, &buyer, gem_id, 1).await;
    assert_eq!(too_many.status(), StatusCode::BAD_REQUEST);

    let set_zero = client
        .put(url(&format!("/api/cart/items/{gem_id}")))
        .bearer_auth(&buyer.token)
        .json(&json!({ "quantity": 0 }))
        .send()
        .await
        .expect("Failed to update cart");
    assert_eq!(set_zero.status(), StatusCode::OK);
    assert_eq!(json_body(set_zero).await["item_count"], 0);
}

#[tokio::test]
#[ignore = "Requires running API server, database and admin credentials"]
async fn test_seller_cannot_buy_own_gem() {
    let client = client();
    let Some((_admin, seller, gem_id)) = listed_gem(&client, "80.00", 1).await else {
        return;
    };
    let resp = add_to_cart(&client, &seller, gem_id, 1).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Checkout
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_checkout_empty_cart_rejected() {
    let client = client();
    let buyer = register_buyer(&client).await;
    let address_id = create_address(&client, &buyer).await;

    let resp = checkout(&client, &buyer, address_id).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running API server, database and admin credentials"]
async fn test_checkout_decrements_stock_and_cancel_restores_it() {
    let client = client();
    let Some((_admin, seller, gem_id)) = listed_gem(&client, "1200.00", 1).await else {
        return;
    };
    let buyer = register_buyer(&client).await;
    let address_id = create_address(&client, &buyer).await;

    assert_eq!(add_to_cart(&client, &buyer, gem_id, 1).await.status(), StatusCode::OK);
    let resp = checkout(&client, &buyer, address_id).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let order = json_body(resp).await;
    let order_id = order["id"].as_i64().expect("order id");
    assert_eq!(order["status"], "pending");
    assert!((amount(&order["total_amount"]) - 1200.0).abs() < f64::EPSILON);
    assert_eq!(order["shipping_address"]["city"], "Antwerp");

    assert_eq!(gem_stock(&client, &seller, gem_id).await, (0, "sold_out".to_string()));

    let cart = client
        .get(url("/api/cart"))
        .bearer_auth(&buyer.token)
        .send()
        .await
        .expect("Failed to get cart");
    assert_eq!(json_body(cart).await["item_count"], 0);

    let cancelled = client
        .post(url(&format!("/api/orders/{order_id}/cancel")))
        .bearer_auth(&buyer.token)
        .send()
        .await
        .expect("Failed to cancel");
    assert_eq!(cancelled.status(), StatusCode::OK);
    assert_eq!(json_body(cancelled).await["status"], "cancelled");

    assert_eq!(gem_stock(&client, &seller, gem_id).await, (1, "approved".to_string()));
}

#[tokio::test]
#[ignore = "Requires running API server, database and admin credentials"]
async fn test_order_visibility_and_seller_fulfilment() {
    let client = client();
    let Some((_admin, seller, gem_id)) = listed_gem(&client, "410.00", 5).await else {
        return;
    };
    let buyer = register_buyer(&client).await;
    let stranger = register_buyer(&client).await;
    let address_id = create_address(&client, &buyer).await;

    add_to_cart(&client, &buyer, gem_id, 1).await;
    let order = json_body(checkout(&client, &buyer, address_id).await).await;
    let order_id = order["id"].as_i64().expect("order id");
    let order_url = url(&format!("/api/orders/{order_id}"));

    let hidden = client
        .get(&order_url)
        .bearer_auth(&stranger.token)
        .send()
        .await
        .expect("Failed to get order");
    assert_eq!(hidden.status(), StatusCode::NOT_FOUND);

    let seller_view = client
        .get(&order_url)
        .bearer_auth(&seller.token)
        .send()
        .await
        .expect("Failed to get order");
    assert_eq!(seller_view.status(), StatusCode::OK);

    let buyer_update = client
        .patch(url(&format!("/api/orders/{order_id}/status")))
        .bearer_auth(&buyer.token)
        .json(&json!({ "status": "confirmed" }))
        .send()
        .await
        .expect("Failed to update status");
    assert_eq!(buyer_update.status(), StatusCode::FORBIDDEN);

    let skip_ahead = client
        .patch(url(&format!("/api/orders/{order_id}/status")))
        .bearer_auth(&seller.token)
        .json(&json!({ "status": "delivered" }))
        .send()
        .await
        .expect("Failed to update status");
    assert_eq!(skip_ahead.status(), StatusCode::CONFLICT);

    for status in ["confirmed", "processing", "shipped", "delivered"] {
        let resp = client
            .patch(url(&format!("/api/orders/{order_id}/status")))
            .bearer_auth(&seller.token)
            .json(&json!({ "status": status, "note": format!("now {status}") }))
            .send()
            .await
            .expect("Failed to update status");
        assert_eq!(resp.status(), StatusCode::OK, "transition to {status}");
    }

    let detail = json_body(
        client
            .get(&order_url)
            .bearer_auth(&buyer.token)
            .send()
            .await
            .expect("Failed to get order"),
    )
    .await;
    assert_eq!(detail["status"], "delivered");
    assert_eq!(detail["history"].as_array().map(Vec::len), Some(5));

    let late_cancel = client
        .post(url(&format!("/api/orders/{order_id}/cancel")))
        .bearer_auth(&buyer.token)
        .send()
        .await
        .expect("Failed to cancel");
    assert_eq!(late_cancel.status(), StatusCode::CONFLICT);

    let seller_orders = client
        .get(url("/api/seller/orders"))
        .bearer_auth(&seller.token)
        .send()
        .await
        .expect("Failed to list seller orders");
    let seller_orders = json_body(seller_orders).await;
    assert!(
        seller_orders
            .as_array()
            .expect("array")
            .iter()
            .any(|o| o["id"].as_i64() == Some(order_id))
    );

    // Delivered purchase unlocks one review of the seller
    let review_url = url(&format!("/api/sellers/{}/reviews", seller.id));
    let review = client
        .post(&review_url)
        .bearer_auth(&buyer.token)
        .json(&json!({ "rating": 5, "comment": "Exactly as described" }))
        .send()
        .await
        .expect("Failed to review");
    assert_eq!(review.status(), StatusCode::CREATED);

    let second = client
        .post(&review_url)
        .bearer_auth(&buyer.token)
        .json(&json!({ "rating": 4 }))
        .send()
        .await
        .expect("Failed to review");
    assert_eq!(second.status(), StatusCode::CONFLICT);

    let not_a_customer = client
        .post(&review_url)
        .bearer_auth(&stranger.token)
        .json(&json!({ "rating": 1 }))
        .send()
        .await
        .expect("Failed to review");
    assert_eq!(not_a_customer.status(), StatusCode::FORBIDDEN);
}
