//! Integration tests for the GemVault API.
//!
//! # Running Tests
//!
//! ```bash
//! # Start the database, migrate and run the API
//! cargo run -p gemvault-cli -- migrate
//! cargo run -p gemvault-api
//!
//! # Run integration tests against it
//! GEMVAULT_TEST_BASE_URL=http://localhost:5000 cargo test -p gemvault-integration-tests -- --ignored
//! ```
//!
//! Tests that need moderation (verifying sellers, approving gems) read an
//! existing admin's credentials from `GEMVAULT_TEST_ADMIN_EMAIL` and
//! `GEMVAULT_TEST_ADMIN_PASSWORD` and return early without them.
//!
//! Every test registers fresh accounts with unique emails, so runs do not
//! interfere with each other.

#![allow(clippy::missing_panics_doc)]

use reqwest::{Client, Response, StatusCode, multipart};
use serde_json::{Value, json};
use uuid::Uuid;

pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// 1x1 transparent PNG.
pub const TINY_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

/// Base URL for the API (configurable via environment).
#[must_use]
pub fn base_url() -> String {
    std::env::var("GEMVAULT_TEST_BASE_URL").unwrap_or_else(|_| "http://localhost:5000".to_string())
}

/// Absolute URL for an API path.
#[must_use]
pub fn url(path: &str) -> String {
    format!("{}{path}", base_url().trim_end_matches('/'))
}

#[must_use]
pub fn client() -> Client {
    Client::builder()
        .build()
        .expect("Failed to create HTTP client")
}

#[must_use]
pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@example.com", Uuid::new_v4().simple())
}

/// Parse a JSON body, panicking with the status on failure.
pub async fn json_body(resp: Response) -> Value {
    let status = resp.status();
    resp.json()
        .await
        .unwrap_or_else(|e| panic!("Expected JSON body (status {status}): {e}"))
}

/// A registered account and its bearer token.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: i64,
    pub email: String,
    pub token: String,
}

impl Account {
    fn from_auth_response(body: &Value) -> Self {
        Self {
            id: body["user"]["id"].as_i64().expect("user.id"),
            email: body["user"]["email"]
                .as_str()
                .expect("user.email")
                .to_string(),
            token: body["token"].as_str().expect("token").to_string(),
        }
    }
}

/// Register a buyer and return the account.
pub async fn register_buyer(client: &Client) -> Account {
    let resp = client
        .post(url("/api/auth/register"))
        .json(&json!({
            "email": unique_email("buyer"),
            "password": TEST_PASSWORD,
            "first_name": "Bea",
            "last_name": "Buyer",
        }))
        .send()
        .await
        .expect("Failed to register buyer");
    assert_eq!(resp.status(), StatusCode::CREATED);
    Account::from_auth_response(&json_body(resp).await)
}

/// Register a seller (pending verification) and return the account.
pub async fn register_seller(client: &Client) -> Account {
    let resp = client
        .post(url("/api/auth/register"))
        .json(&json!({
            "email": unique_email("seller"),
            "password": TEST_PASSWORD,
            "first_name": "Sam",
            "last_name": "Seller",
            "role": "seller",
            "seller": { "business_name": "Sam's Stones" },
        }))
        .send()
        .await
        .expect("Failed to register seller");
    assert_eq!(resp.status(), StatusCode::CREATED);
    Account::from_auth_response(&json_body(resp).await)
}

/// Log in an existing admin from the environment, if configured.
pub async fn admin_login(client: &Client) -> Option<Account> {
    let email = std::env::var("GEMVAULT_TEST_ADMIN_EMAIL").ok()?;
    let password = std::env::var("GEMVAULT_TEST_ADMIN_PASSWORD").ok()?;
    let resp = client
        .post(url("/api/auth/login"))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to log in admin");
    assert_eq!(resp.status(), StatusCode::OK);
    Some(Account::from_auth_response(&json_body(resp).await))
}

/// Mark a seller verified.
pub async fn verify_seller(client: &Client, admin: &Account, seller: &Account) {
    let resp = client
        .patch(url(&format!("/api/admin/sellers/{}/verification", seller.id)))
        .bearer_auth(&admin.token)
        .json(&json!({ "status": "verified" }))
        .send()
        .await
        .expect("Failed to verify seller");
    assert_eq!(resp.status(), StatusCode::OK);
}

/// A PNG file part for the `images` field.
#[must_use]
pub fn png_part() -> multipart::Part {
    multipart::Part::bytes(TINY_PNG.to_vec())
        .file_name("stone.png")
        .mime_str("image/png")
        .expect("valid mime")
}

/// A certificate number no other test uses.
#[must_use]
pub fn unique_certificate() -> String {
    format!("TEST-{}", Uuid::new_v4().simple())
}

/// Multipart form for a new listing with one image.
#[must_use]
pub fn gem_form(name: &str, price: &str, stock: i32) -> multipart::Form {
    gem_form_with_certificate(name, price, stock, &unique_certificate())
}

/// Multipart form for a new listing with one image and a given certificate.
#[must_use]
pub fn gem_form_with_certificate(
    name: &str,
    price: &str,
    stock: i32,
    certificate_number: &str,
) -> multipart::Form {
    multipart::Form::new()
        .text("name", name.to_string())
        .text("gem_type", "sapphire")
        .text("price", price.to_string())
        .text("carat", "1.25")
        .text("color", "blue")
        .text("certificate_number", certificate_number.to_string())
        .text("stock_quantity", stock.to_string())
        .part("images", png_part())
}

/// Create a listing as `seller` and return its id.
pub async fn create_gem(client: &Client, seller: &Account, price: &str, stock: i32) -> i64 {
    let resp = client
        .post(url("/api/gems"))
        .bearer_auth(&seller.token)
        .multipart(gem_form("Test Sapphire", price, stock))
        .send()
        .await
        .expect("Failed to create gem");
    assert_eq!(resp.status(), StatusCode::CREATED);
    json_body(resp).await["id"].as_i64().expect("gem id")
}

/// Approve a listing.
pub async fn approve_gem(client: &Client, admin: &Account, gem_id: i64) {
    let resp = client
        .patch(url(&format!("/api/admin/gems/{gem_id}/review")))
        .bearer_auth(&admin.token)
        .json(&json!({ "status": "approved" }))
        .send()
        .await
        .expect("Failed to approve gem");
    assert_eq!(resp.status(), StatusCode::OK);
}

/// A verified seller with one approved gem, or `None` without admin credentials.
pub async fn listed_gem(client: &Client, price: &str, stock: i32) -> Option<(Account, Account, i64)> {
    let admin = admin_login(client).await?;
    let seller = register_seller(client).await;
    verify_seller(client, &admin, &seller).await;
    let gem_id = create_gem(client, &seller, price, stock).await;
    approve_gem(client, &admin, gem_id).await;
    Some((admin, seller, gem_id))
}

/// Add a shipping address for `account` and return its id.
pub async fn create_address(client: &Client, account: &Account) -> i64 {
    let resp = client
        .post(url("/api/addresses"))
        .bearer_auth(&account.token)
        .json(&json!({
            "full_name": "Bea Buyer",
            "address_line1": "1 Quartz Lane",
            "city": "Antwerp",
            "postal_code": "2000",
            "country": "BE",
        }))
        .send()
        .await
        .expect("Failed to create address");
    assert_eq!(resp.status(), StatusCode::CREATED);
    json_body(resp).await["id"].as_i64().expect("address id")
}
