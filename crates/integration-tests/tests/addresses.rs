//! Shipping address book.
//!
//! These tests require a running API server and database.

use gemvault_integration_tests::{client, create_address, json_body, register_buyer, url};
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_first_address_is_default_and_default_moves() {
    let client = client();
    let buyer = register_buyer(&client).await;

    let first = create_address(&client, &buyer).await;
    let second = create_address(&client, &buyer).await;

    let list = json_body(
        client
            .get(url("/api/addresses"))
            .bearer_auth(&buyer.token)
            .send()
            .await
            .expect("Failed to list addresses"),
    )
    .await;
    let list = list.as_array().expect("array");
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["id"].as_i64(), Some(first));
    assert_eq!(list[0]["is_default"], true);

    let resp = client
        .post(url(&format!("/api/addresses/{second}/default")))
        .bearer_auth(&buyer.token)
        .send()
        .await
        .expect("Failed to set default");
    assert_eq!(resp.status(), StatusCode::OK);

    let list = json_body(
        client
            .get(url("/api/addresses"))
            .bearer_auth(&buyer.token)
            .send()
            .await
            .expect("Failed to list addresses"),
    )
    .await;
    let defaults: Vec<i64> = list
        .as_array()
        .expect("array")
        .iter()
        .filter(|a| a["is_default"] == true)
        .filter_map(|a| a["id"].as_i64())
        .collect();
    assert_eq!(defaults, vec![second]);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_missing_fields_and_foreign_addresses() {
    let client = client();
    let buyer = register_buyer(&client).await;
    let other = register_buyer(&client).await;

    let incomplete = client
        .post(url("/api/addresses"))
        .bearer_auth(&buyer.token)
        .json(&json!({ "full_name": "Only A Name" }))
        .send()
        .await
        .expect("Failed to create address");
    assert_eq!(incomplete.status(), StatusCode::BAD_REQUEST);
    let message = json_body(incomplete).await["message"]
        .as_str()
        .expect("message")
        .to_string();
    assert!(message.contains("address_line1"));

    let address = create_address(&client, &buyer).await;
    let foreign = client
        .delete(url(&format!("/api/addresses/{address}")))
        .bearer_auth(&other.token)
        .send()
        .await
        .expect("Failed to delete address");
    assert_eq!(foreign.status(), StatusCode::NOT_FOUND);

    let own = client
        .delete(url(&format!("/api/addresses/{address}")))
        .bearer_auth(&buyer.token)
        .send()
        .await
        .expect("Failed to delete address");
    assert_eq!(own.status(), StatusCode::NO_CONTENT);
}
