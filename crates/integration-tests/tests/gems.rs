//! Listing lifecycle: creation, moderation visibility, search and ownership.
//!
//! These tests require a running API server and database. Tests that need an
//! approved listing also need `GEMVAULT_TEST_ADMIN_EMAIL`/`_PASSWORD`.

use gemvault_integration_tests::{
    admin_login, client, create_gem, gem_form, gem_form_with_certificate, json_body, listed_gem,
    png_part, register_buyer, register_seller, unique_certificate, url, verify_seller,
};
use reqwest::{StatusCode, multipart};
use serde_json::json;

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_public_search_shape() {
    let resp = client()
        .get(url("/api/gems?sort=price_asc&per_page=5&page=1"))
        .send()
        .await
        .expect("Failed to search gems");
    assert_eq!(resp.status(), StatusCode::OK);

    let body = json_body(resp).await;
    assert!(body["items"].is_array());
    assert!(body["total"].is_i64());
    assert_eq!(body["page"], 1);
    assert_eq!(body["per_page"], 5);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_types_endpoint() {
    let resp = client()
        .get(url("/api/gems/types"))
        .send()
        .await
        .expect("Failed to list gem types");
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(json_body(resp).await.is_array());
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_unverified_seller_and_buyer_cannot_list() {
    let client = client();

    let seller = register_seller(&client).await;
    let resp = client
        .post(url("/api/gems"))
        .bearer_auth(&seller.token)
        .multipart(gem_form("Pending Seller Stone", "120.00", 1))
        .send()
        .await
        .expect("Failed to post gem");
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let buyer = register_buyer(&client).await;
    let resp = client
        .post(url("/api/gems"))
        .bearer_auth(&buyer.token)
        .multipart(gem_form("Buyer Stone", "120.00", 1))
        .send()
        .await
        .expect("Failed to post gem");
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "Requires running API server, database and admin credentials"]
async fn test_pending_gem_visible_only_to_owner_and_admin() {
    let client = client();
    let Some(admin) = admin_login(&client).await else {
        return;
    };
    let seller = register_seller(&client).await;
    verify_seller(&client, &admin, &seller).await;
    let gem_id = create_gem(&client, &seller, "310.00", 1).await;
    let gem_url = url(&format!("/api/gems/{gem_id}"));

    let anonymous = client.get(&gem_url).send().await.expect("Failed to get gem");
    assert_eq!(anonymous.status(), StatusCode::NOT_FOUND);

    let owner = client
        .get(&gem_url)
        .bearer_auth(&seller.token)
        .send()
        .await
        .expect("Failed to get gem");
    assert_eq!(owner.status(), StatusCode::OK);
    let detail = json_body(owner).await;
    assert_eq!(detail["status"], "pending");
    assert_eq!(detail["images"].as_array().map(Vec::len), Some(1));
    assert_eq!(detail["images"][0]["is_primary"], true);

    let as_admin = client
        .get(&gem_url)
        .bearer_auth(&admin.token)
        .send()
        .await
        .expect("Failed to get gem");
    assert_eq!(as_admin.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running API server, database and admin credentials"]
async fn test_rejection_requires_reason() {
    let client = client();
    let Some(admin) = admin_login(&client).await else {
        return;
    };
    let seller = register_seller(&client).await;
    verify_seller(&client, &admin, &seller).await;
    let gem_id = create_gem(&client, &seller, "95.00", 1).await;
    let review_url = url(&format!("/api/admin/gems/{gem_id}/review"));

    let no_reason = client
        .patch(&review_url)
        .bearer_auth(&admin.token)
        .json(&json!({ "status": "rejected" }))
        .send()
        .await
        .expect("Failed to review gem");
    assert_eq!(no_reason.status(), StatusCode::BAD_REQUEST);

    let rejected = client
        .patch(&review_url)
        .bearer_auth(&admin.token)
        .json(&json!({ "status": "rejected", "reason": "Photos are blurry" }))
        .send()
        .await
        .expect("Failed to review gem");
    assert_eq!(rejected.status(), StatusCode::OK);
    let body = json_body(rejected).await;
    assert_eq!(body["status"], "rejected");
    assert_eq!(body["rejection_reason"], "Photos are blurry");
}

#[tokio::test]
#[ignore = "Requires running API server, database and admin credentials"]
async fn test_edit_sends_approved_gem_back_to_review() {
    let client = client();
    let Some((_admin, seller, gem_id)) = listed_gem(&client, "720.00", 3).await else {
        return;
    };
    let gem_url = url(&format!("/api/gems/{gem_id}"));

    let public = client.get(&gem_url).send().await.expect("Failed to get gem");
    assert_eq!(public.status(), StatusCode::OK);

    let updated = client
        .put(&gem_url)
        .bearer_auth(&seller.token)
        .json(&json!({ "price": "680.00" }))
        .send()
        .await
        .expect("Failed to update gem");
    assert_eq!(updated.status(), StatusCode::OK);
    assert_eq!(json_body(updated).await["status"], "pending");

    let hidden = client.get(&gem_url).send().await.expect("Failed to get gem");
    assert_eq!(hidden.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running API server, database and admin credentials"]
async fn test_only_owner_may_modify() {
    let client = client();
    let Some((admin, _seller, gem_id)) = listed_gem(&client, "150.00", 1).await else {
        return;
    };
    let other = register_seller(&client).await;
    verify_seller(&client, &admin, &other).await;

    let resp = client
        .put(url(&format!("/api/gems/{gem_id}")))
        .bearer_auth(&other.token)
        .json(&json!({ "name": "Not mine" }))
        .send()
        .await
        .expect("Failed to update gem");
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = client
        .delete(url(&format!("/api/gems/{gem_id}")))
        .bearer_auth(&other.token)
        .send()
        .await
        .expect("Failed to delete gem");
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "Requires running API server, database and admin credentials"]
async fn test_owner_deletes_unsold_gem() {
    let client = client();
    let Some((_admin, seller, gem_id)) = listed_gem(&client, "60.00", 1).await else {
        return;
    };
    let gem_url = url(&format!("/api/gems/{gem_id}"));

    let resp = client
        .delete(&gem_url)
        .bearer_auth(&seller.token)
        .send()
        .await
        .expect("Failed to delete gem");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let gone = client
        .get(&gem_url)
        .bearer_auth(&seller.token)
        .send()
        .await
        .expect("Failed to get gem");
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running API server, database and admin credentials"]
async fn test_certificate_numbers_are_unique() {
    let client = client();
    let Some(admin) = admin_login(&client).await else {
        return;
    };
    let seller = register_seller(&client).await;
    verify_seller(&client, &admin, &seller).await;
    let certificate = unique_certificate();

    let first = client
        .post(url("/api/gems"))
        .bearer_auth(&seller.token)
        .multipart(gem_form_with_certificate("First Ruby", "900.00", 1, &certificate))
        .send()
        .await
        .expect("Failed to create gem");
    assert_eq!(first.status(), StatusCode::CREATED);

    let duplicate = client
        .post(url("/api/gems"))
        .bearer_auth(&seller.token)
        .multipart(gem_form_with_certificate("Second Ruby", "950.00", 1, &certificate))
        .send()
        .await
        .expect("Failed to create gem");
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let other_id = create_gem(&client, &seller, "400.00", 1).await;
    let update = client
        .put(url(&format!("/api/gems/{other_id}")))
        .bearer_auth(&seller.token)
        .json(&json!({ "certificate_number": certificate }))
        .send()
        .await
        .expect("Failed to update gem");
    assert_eq!(update.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires running API server, database and admin credentials"]
async fn test_listing_image_limit_spans_requests() {
    let client = client();
    let Some(admin) = admin_login(&client).await else {
        return;
    };
    let seller = register_seller(&client).await;
    verify_seller(&client, &admin, &seller).await;
    let gem_id = create_gem(&client, &seller, "310.00", 1).await;
    let images_url = url(&format!("/api/gems/{gem_id}/images"));

    let seven = (0..7).fold(multipart::Form::new(), |form, _| form.part("images", png_part()));
    let filled = client
        .post(&images_url)
        .bearer_auth(&seller.token)
        .multipart(seven)
        .send()
        .await
        .expect("Failed to add images");
    assert_eq!(filled.status(), StatusCode::CREATED);
    assert_eq!(json_body(filled).await.as_array().map(Vec::len), Some(8));

    let ninth = client
        .post(&images_url)
        .bearer_auth(&seller.token)
        .multipart(multipart::Form::new().part("images", png_part()))
        .send()
        .await
        .expect("Failed to add images");
    assert_eq!(ninth.status(), StatusCode::BAD_REQUEST);
}
