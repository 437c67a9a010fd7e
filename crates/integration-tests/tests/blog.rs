//! Blog publishing and the public read path.
//!
//! These tests require a running API server, database and
//! `GEMVAULT_TEST_ADMIN_EMAIL`/`_PASSWORD`.

use gemvault_integration_tests::{admin_login, client, json_body, url};
use reqwest::{StatusCode, multipart};
use uuid::Uuid;

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_public_blog_list() {
    let resp = client()
        .get(url("/api/blog?per_page=3"))
        .send()
        .await
        .expect("Failed to list posts");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert!(body["items"].is_array());
    assert_eq!(body["per_page"], 3);
}

#[tokio::test]
#[ignore = "Requires running API server, database and admin credentials"]
async fn test_draft_publish_and_slug_dedupe() {
    let client = client();
    let Some(admin) = admin_login(&client).await else {
        return;
    };
    let title = format!("Caring for Opals {}", Uuid::new_v4().simple());

    let draft = client
        .post(url("/api/admin/blog"))
        .bearer_auth(&admin.token)
        .multipart(
            multipart::Form::new()
                .text("title", title.clone())
                .text("content", "Keep them away from heat."),
        )
        .send()
        .await
        .expect("Failed to create post");
    assert_eq!(draft.status(), StatusCode::CREATED);
    let draft = json_body(draft).await;
    assert_eq!(draft["status"], "draft");
    assert!(draft["published_at"].is_null());
    let slug = draft["slug"].as_str().expect("slug").to_string();
    let id = draft["id"].as_i64().expect("id");

    let hidden = client
        .get(url(&format!("/api/blog/{slug}")))
        .send()
        .await
        .expect("Failed to get post");
    assert_eq!(hidden.status(), StatusCode::NOT_FOUND);

    let published = client
        .put(url(&format!("/api/admin/blog/{id}")))
        .bearer_auth(&admin.token)
        .multipart(multipart::Form::new().text("status", "published"))
        .send()
        .await
        .expect("Failed to publish post");
    assert_eq!(published.status(), StatusCode::OK);
    let published = json_body(published).await;
    assert!(published["published_at"].is_string());
    assert_eq!(published["slug"], slug.as_str());

    let visible = client
        .get(url(&format!("/api/blog/{slug}")))
        .send()
        .await
        .expect("Failed to get post");
    assert_eq!(visible.status(), StatusCode::OK);

    let twin = client
        .post(url("/api/admin/blog"))
        .bearer_auth(&admin.token)
        .multipart(
            multipart::Form::new()
                .text("title", title)
                .text("content", "Same title, new slug."),
        )
        .send()
        .await
        .expect("Failed to create post");
    let twin = json_body(twin).await;
    assert_eq!(twin["slug"], format!("{slug}-2"));

    let bad_status = client
        .put(url(&format!("/api/admin/blog/{id}")))
        .bearer_auth(&admin.token)
        .multipart(multipart::Form::new().text("status", "live"))
        .send()
        .await
        .expect("Failed to update post");
    assert_eq!(bad_status.status(), StatusCode::BAD_REQUEST);

    for post in [id, twin["id"].as_i64().expect("id")] {
        let resp = client
            .delete(url(&format!("/api/admin/blog/{post}")))
            .bearer_auth(&admin.token)
            .send()
            .await
            .expect("Failed to delete post");
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    let gone = client
        .get(url(&format!("/api/blog/{slug}")))
        .send()
        .await
        .expect("Failed to get post");
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}
