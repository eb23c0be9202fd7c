//! HTTP surface tests: owner identity, home/room/link management, short links

mod helpers;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use helpers::{item, TestApp, OTHER_OWNER, OWNER};
use serde_json::json;
use tower::util::ServiceExt;

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::new().await;
    let (status, body) = app.call(Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "homie-inspect");
    assert_eq!(body["active_sessions"], 0);
}

#[tokio::test]
async fn test_owner_routes_require_identity() {
    let app = TestApp::new().await;
    let (status, body) = app.call(Method::GET, "/homes", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn test_other_owner_is_denied() {
    let app = TestApp::new().await;
    let home_id = app.create_home("Maple Cottage").await;

    let (status, body) = app
        .call(Method::GET, &format!("/homes/{}", home_id), Some(OTHER_OWNER), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "PERMISSION_DENIED");

    let (status, _) = app
        .call(Method::POST, &format!("/homes/{}/links", home_id), Some(OTHER_OWNER), Some(json!({ "tenant_name": "Mallory" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.call(Method::GET, "/homes", Some(OTHER_OWNER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_home_crud() {
    let app = TestApp::new().await;
    let (status, created) = app
        .owner_post(
            "/homes",
            json!({ "name": "  Maple Cottage ", "owner_email": "pat@example.com", "address": "1 Elm St" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["name"], "Maple Cottage");
    assert_eq!(created["owner_display_name"], "Home Owner");
    assert_eq!(created["owner_id"], OWNER);
    let home_id = created["id"].as_str().unwrap();

    let (status, updated) = app
        .call(
            Method::PATCH,
            &format!("/homes/{}", home_id),
            Some(OWNER),
            Some(json!({ "owner_display_name": "Pat", "address": null })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", updated);
    assert_eq!(updated["owner_display_name"], "Pat");
    assert!(updated["address"].is_null());
    assert_eq!(updated["name"], "Maple Cottage");

    let (status, list) = app.owner_get("/homes").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, _) = app.owner_delete(&format!("/homes/{}", home_id)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app.owner_get(&format!("/homes/{}", home_id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_cover_image_set_and_remove() {
    let app = TestApp::new().await;
    let home_id = app.create_home("Maple Cottage").await;

    let (status, home) = app
        .call(
            Method::PUT,
            &format!("/homes/{}/cover", home_id),
            Some(OWNER),
            Some(json!({ "photo": helpers::png_payload() })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", home);
    let cover = home["cover_image_url"].as_str().unwrap().to_string();
    assert!(cover.starts_with(&format!("/photos/covers/{}/{}/", OWNER, home_id)));

    let (status, _) = app.call(Method::GET, &cover, None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, home) = app.owner_delete(&format!("/homes/{}/cover", home_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(home["cover_image_url"].is_null());
    let (status, _) = app.call(Method::GET, &cover, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rejects_non_image_upload() {
    let app = TestApp::new().await;
    let home_id = app.create_home("Maple Cottage").await;
    let room_id = app.create_room(&home_id, "Kitchen").await;

    let (status, body) = app
        .owner_post(
            &format!("/homes/{}/rooms/{}/photos", home_id, room_id),
            json!({ "photos": [{ "mime_type": "image/png", "data": "bm90IGFuIGltYWdl" }] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert_eq!(app.vision.describe_calls(), 0);
}

#[tokio::test]
async fn test_room_crud() {
    let app = TestApp::new().await;
    let home_id = app.create_home("Maple Cottage").await;
    let room_id = app.create_room(&home_id, "Kitchen").await;

    let (status, room) = app.owner_get(&format!("/homes/{}/rooms/{}", home_id, room_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(room["analyzed_objects"], json!([]));
    assert_eq!(room["is_analyzing"], false);

    let (status, room) = app
        .call(
            Method::PATCH,
            &format!("/homes/{}/rooms/{}", home_id, room_id),
            Some(OWNER),
            Some(json!({ "name": "Galley Kitchen" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(room["name"], "Galley Kitchen");

    let (status, _) = app.owner_delete(&format!("/homes/{}/rooms/{}", home_id, room_id)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, rooms) = app.owner_get(&format!("/homes/{}/rooms", home_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rooms, json!([]));
}

#[tokio::test]
async fn test_link_creation_and_short_link_redirect() {
    let app = TestApp::new().await;
    let home_id = app.create_home("Maple Cottage").await;
    let (link_id, body) = app.create_link(&home_id, "Jane").await;

    assert_eq!(body["link"]["is_active"], true);
    assert_eq!(body["link"]["access_count"], 0);
    assert_eq!(body["link"]["owner_display_name"], "Pat");
    assert_eq!(
        body["inspection_url"],
        format!("https://homie.test/inspect/{}/links/{}", home_id, link_id)
    );

    let short_url = body["short_url"].as_str().unwrap();
    let code = short_url.strip_prefix("https://homie.test/go/").unwrap();
    assert_eq!(code.len(), 6);

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri(format!("/go/{}", code)).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers()["location"],
        format!("/inspect/{}/links/{}", home_id, link_id).as_str()
    );

    let (status, _) = app.call(Method::GET, "/go/nope00", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, count) = app.owner_get(&format!("/homes/{}/links/active-count", home_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(count["active_count"], 1);
}

#[tokio::test]
async fn test_link_requires_tenant_name() {
    let app = TestApp::new().await;
    let home_id = app.create_home("Maple Cottage").await;

    let (status, _) = app
        .owner_post(&format!("/homes/{}/links", home_id), json!({ "tenant_name": "  " }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_and_expired_links_are_distinguished() {
    let app = TestApp::new().await;
    let home_id = app.create_home("Maple Cottage").await;
    app.create_room(&home_id, "Kitchen").await;

    let (status, body) = app
        .tenant_post(&format!("/inspect/{}/links/{}/open", home_id, uuid::Uuid::new_v4()), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "LINK_NOT_FOUND");

    let (status, body) = app
        .owner_post(
            &format!("/homes/{}/links", home_id),
            json!({ "tenant_name": "Jane", "valid_until": "2020-01-01T00:00:00Z" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let link_id = body["link"]["id"].as_str().unwrap();

    let (status, body) = app
        .tenant_post(&format!("/inspect/{}/links/{}/open", home_id, link_id), None)
        .await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["error"]["code"], "LINK_EXPIRED");
}

#[tokio::test]
async fn test_delete_home_removes_children() {
    let app = TestApp::new().await;
    let home_id = app.create_home("Maple Cottage").await;
    let room_id = app.create_room(&home_id, "Lounge").await;
    let (status, room) = app.upload(&home_id, &room_id, 1, vec![item("Sofa", 1)]).await;
    assert_eq!(status, StatusCode::OK);
    let photo_url = room["analyzed_photo_urls"][0].as_str().unwrap().to_string();
    let (link_id, _) = app.create_link(&home_id, "Jane").await;

    let (status, _) = app.owner_delete(&format!("/homes/{}", home_id)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.call(Method::GET, &photo_url, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .tenant_post(&format!("/inspect/{}/links/{}/open", home_id, link_id), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
