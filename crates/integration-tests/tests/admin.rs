//! Admin moderation endpoints and role enforcement.
//!
//! Role enforcement tests only need a running API server and database; the
//! rest also need `GEMVAULT_TEST_ADMIN_EMAIL`/`_PASSWORD`.

use gemvault_integration_tests::{
    TEST_PASSWORD, admin_login, client, json_body, register_buyer, register_seller, unique_email,
    url,
};
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_admin_routes_reject_non_admins() {
    let client = client();
    let buyer = register_buyer(&client).await;
    let seller = register_seller(&client).await;

    for path in ["/api/admin/dashboard", "/api/admin/users", "/api/admin/gems", "/api/admin/orders"] {
        let anonymous = client.get(url(path)).send().await.expect("request");
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED, "{path}");

        for account in [&buyer, &seller] {
            let resp = client
                .get(url(path))
                .bearer_auth(&account.token)
                .send()
                .await
                .expect("request");
            assert_eq!(resp.status(), StatusCode::FORBIDDEN, "{path}");
        }
    }
}

#[tokio::test]
#[ignore = "Requires running API server, database and admin credentials"]
async fn test_dashboard_and_listings() {
    let client = client();
    let Some(admin) = admin_login(&client).await else {
        return;
    };

    let dashboard = client
        .get(url("/api/admin/dashboard"))
        .bearer_auth(&admin.token)
        .send()
        .await
        .expect("Failed to get dashboard");
    assert_eq!(dashboard.status(), StatusCode::OK);
    let dashboard = json_body(dashboard).await;
    assert!(dashboard.is_object());

    let users = client
        .get(url("/api/admin/users?role=buyer&per_page=5"))
        .bearer_auth(&admin.token)
        .send()
        .await
        .expect("Failed to list users");
    assert_eq!(users.status(), StatusCode::OK);
    let users = json_body(users).await;
    assert_eq!(users["per_page"], 5);
    assert!(
        users["items"]
            .as_array()
            .expect("items")
            .iter()
            .all(|u| u["role"] == "buyer")
    );

    let pending = client
        .get(url("/api/admin/sellers?status=pending"))
        .bearer_auth(&admin.token)
        .send()
        .await
        .expect("Failed to list sellers");
    assert_eq!(pending.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running API server, database and admin credentials"]
async fn test_deactivated_user_is_locked_out() {
    let client = client();
    let Some(admin) = admin_login(&client).await else {
        return;
    };
    let buyer = register_buyer(&client).await;

    let self_disable = client
        .patch(url(&format!("/api/admin/users/{}/status", admin.id)))
        .bearer_auth(&admin.token)
        .json(&json!({ "is_active": false }))
        .send()
        .await
        .expect("Failed to update status");
    assert_eq!(self_disable.status(), StatusCode::BAD_REQUEST);

    let resp = client
        .patch(url(&format!("/api/admin/users/{}/status", buyer.id)))
        .bearer_auth(&admin.token)
        .json(&json!({ "is_active": false }))
        .send()
        .await
        .expect("Failed to update status");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["is_active"], false);

    let me = client
        .get(url("/api/auth/me"))
        .bearer_auth(&buyer.token)
        .send()
        .await
        .expect("Failed to get /me");
    assert_eq!(me.status(), StatusCode::FORBIDDEN);

    let login = client
        .post(url("/api/auth/login"))
        .json(&json!({ "email": buyer.email, "password": TEST_PASSWORD }))
        .send()
        .await
        .expect("Failed to log in");
    assert_eq!(login.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "Requires running API server, database and admin credentials"]
async fn test_super_admin_only_actions() {
    let client = client();
    let Some(admin) = admin_login(&client).await else {
        return;
    };
    let body = json!({
        "email": unique_email("ops"),
        "password": TEST_PASSWORD,
        "first_name": "Ops",
        "last_name": "Admin",
        "role": "admin",
    });
    let resp = client
        .post(url("/api/admin/admins"))
        .bearer_auth(&admin.token)
        .json(&body)
        .send()
        .await
        .expect("Failed to create admin");

    let me = json_body(
        client
            .get(url("/api/auth/me"))
            .bearer_auth(&admin.token)
            .send()
            .await
            .expect("Failed to get /me"),
    )
    .await;
    if me["role"] == "super_admin" {
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(json_body(resp).await["role"], "admin");
    } else {
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}

#[tokio::test]
#[ignore = "Requires running API server, database and admin credentials"]
async fn test_promoted_seller_gets_a_profile() {
    let client = client();
    let Some(admin) = admin_login(&client).await else {
        return;
    };
    let me = json_body(
        client
            .get(url("/api/auth/me"))
            .bearer_auth(&admin.token)
            .send()
            .await
            .expect("Failed to get /me"),
    )
    .await;
    if me["role"] != "super_admin" {
        return;
    }

    let buyer = register_buyer(&client).await;
    let resp = client
        .patch(url(&format!("/api/admin/users/{}/role", buyer.id)))
        .bearer_auth(&admin.token)
        .json(&json!({ "role": "seller" }))
        .send()
        .await
        .expect("Failed to change role");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["role"], "seller");

    let profile = client
        .get(url("/api/seller/profile"))
        .bearer_auth(&buyer.token)
        .send()
        .await
        .expect("Failed to get seller profile");
    assert_eq!(profile.status(), StatusCode::OK);
    let profile = json_body(profile).await;
    assert_eq!(profile["verification_status"], "pending");
    assert!(!profile["business_name"].as_str().expect("business_name").is_empty());

    let renamed = client
        .put(url("/api/seller/profile"))
        .bearer_auth(&buyer.token)
        .json(&json!({ "business_name": "Promoted Gems" }))
        .send()
        .await
        .expect("Failed to update seller profile");
    assert_eq!(renamed.status(), StatusCode::OK);
    assert_eq!(json_body(renamed).await["business_name"], "Promoted Gems");
}
