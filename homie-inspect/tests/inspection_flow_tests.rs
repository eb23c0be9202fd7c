//! Tenant inspection sessions end to end

mod helpers;

use axum::http::StatusCode;
use helpers::{item, photos_body, TestApp};
use serde_json::json;

use homie_inspect::services::inspection_controller::EMAIL_WARNING;

#[tokio::test]
async fn test_owner_inventory_to_tenant_report() {
    let app = TestApp::new().await;
    let home_id = app.create_home("Maple Cottage").await;
    let room_id = app.create_room(&home_id, "Living Room").await;

    let (_, room) = app.upload(&home_id, &room_id, 2, vec![item("Sofa", 1)]).await;
    assert_eq!(room["analyzed_objects"], json!([{ "name": "Sofa", "count": 1 }]));
    let (_, room) = app.upload(&home_id, &room_id, 1, vec![item("Lamp", 1)]).await;
    assert_eq!(
        room["analyzed_objects"],
        json!([{ "name": "Lamp", "count": 1 }, { "name": "Sofa", "count": 1 }])
    );

    let (link_id, created) = app.create_link(&home_id, "Jane").await;
    assert_eq!(created["link"]["is_active"], true);

    let session_id = app.open_session(&home_id, &link_id).await;
    let (_, link) = app.owner_get(&format!("/homes/{}/links/{}", home_id, link_id)).await;
    assert_eq!(link["access_count"], 1);

    app.vision.script(vec![item("sofa", 1)]);
    let (status, view) = app
        .tenant_post(&format!("/inspect/sessions/{}/analyze", session_id), Some(photos_body(1)))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", view);
    let pending = &view["current_room"]["pending"];
    assert_eq!(
        pending["discrepancies"],
        json!([{ "name": "Lamp", "expected_count": 1, "actual_count": 0, "note": "Missing" }])
    );
    assert!(pending["missing_item_suggestion"].as_str().unwrap().contains("Lamp"));

    let (status, view) = app
        .tenant_post(
            &format!("/inspect/sessions/{}/confirm", session_id),
            Some(json!({ "notes": "  Lamp went to storage  " })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["completed_rooms"], 1);

    let (status, outcome) = app
        .tenant_post(&format!("/inspect/sessions/{}/submit", session_id), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{}", outcome);
    assert_eq!(outcome["overall_status"], "Completed with discrepancies");
    assert_eq!(outcome["discrepancy_count"], 1);
    assert_eq!(outcome["email_sent"], true);
    assert!(outcome.get("warning").is_none());
    let report_id = outcome["report_id"].as_str().unwrap();

    let (_, link) = app.owner_get(&format!("/homes/{}/links/{}", home_id, link_id)).await;
    assert_eq!(link["is_active"], false);
    assert_eq!(link["report_id"], report_id);

    let (status, report) = app.owner_get(&format!("/reports/{}", report_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["inspected_by"], "Jane");
    assert_eq!(report["home_owner_name"], "Pat");
    assert_eq!(report["rooms"][0]["tenant_notes"], "Lamp went to storage");
    assert_eq!(
        report["rooms"][0]["expected_items"],
        json!([{ "name": "Lamp", "count": 1 }, { "name": "Sofa", "count": 1 }])
    );

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to_email, "owner@example.com");
    assert!(sent[0].subject.starts_with("Inspection Report for Maple Cottage - "));
    assert!(sent[0].attachment.is_some());
}

#[tokio::test]
async fn test_reopening_consumed_link_shows_completion() {
    let app = TestApp::new().await;
    let home_id = app.create_home("Maple Cottage").await;
    let room_id = app.create_room(&home_id, "Kitchen").await;
    app.upload(&home_id, &room_id, 1, vec![item("Chair", 2)]).await;
    let (link_id, _) = app.create_link(&home_id, "Jane").await;

    let session_id = app.open_session(&home_id, &link_id).await;
    app.inspect_room(&session_id, vec![item("Chair", 3)]).await;
    let (_, outcome) = app
        .tenant_post(&format!("/inspect/sessions/{}/submit", session_id), None)
        .await;
    assert_eq!(outcome["overall_status"], "Completed - All Clear");
    assert_eq!(outcome["discrepancy_count"], 0);

    let (status, body) = app
        .tenant_post(&format!("/inspect/{}/links/{}/open", home_id, link_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "already_completed");
    assert_eq!(body["completion"]["report_id"], outcome["report_id"]);
    assert_eq!(body["completion"]["inspected_by"], "Jane");

    // Access counting stopped with consumption
    let (_, link) = app.owner_get(&format!("/homes/{}/links/{}", home_id, link_id)).await;
    assert_eq!(link["access_count"], 1);
}

#[tokio::test]
async fn test_deleting_report_reactivates_link() {
    let app = TestApp::new().await;
    let home_id = app.create_home("Maple Cottage").await;
    app.create_room(&home_id, "Kitchen").await;
    let (link_id, _) = app.create_link(&home_id, "Jane").await;

    let session_id = app.open_session(&home_id, &link_id).await;
    app.inspect_room(&session_id, vec![]).await;
    let (_, outcome) = app
        .tenant_post(&format!("/inspect/sessions/{}/submit", session_id), None)
        .await;
    let report_id = outcome["report_id"].as_str().unwrap();

    let (_, count) = app.owner_get(&format!("/homes/{}/links/active-count", home_id)).await;
    assert_eq!(count["active_count"], 0);

    let (status, body) = app.owner_delete(&format!("/reports/{}", report_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);

    let (_, link) = app.owner_get(&format!("/homes/{}/links/{}", home_id, link_id)).await;
    assert_eq!(link["is_active"], true);
    assert!(link["report_id"].is_null());

    app.open_session(&home_id, &link_id).await;
    let (_, link) = app.owner_get(&format!("/homes/{}/links/{}", home_id, link_id)).await;
    assert_eq!(link["access_count"], 2);
}

#[tokio::test]
async fn test_empty_expected_inventory_skips_comparison() {
    let app = TestApp::new().await;
    let home_id = app.create_home("Maple Cottage").await;
    app.create_room(&home_id, "Attic").await;
    let (link_id, _) = app.create_link(&home_id, "Jane").await;

    let session_id = app.open_session(&home_id, &link_id).await;
    let (status, view) = app
        .tenant_post(&format!("/inspect/sessions/{}/analyze", session_id), Some(photos_body(1)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["current_room"]["pending"]["discrepancies"], json!([]));
    assert!(!view["current_room"]["pending"]["missing_item_suggestion"]
        .as_str()
        .unwrap()
        .is_empty());
    assert_eq!(app.vision.compare_calls(), 0);
}

#[tokio::test]
async fn test_incomplete_submission_is_rejected() {
    let app = TestApp::new().await;
    let home_id = app.create_home("Maple Cottage").await;
    for name in ["Kitchen", "Bedroom", "Bath"] {
        app.create_room(&home_id, name).await;
    }
    let (link_id, _) = app.create_link(&home_id, "Jane").await;
    let session_id = app.open_session(&home_id, &link_id).await;

    // Next is refused until the room is confirmed
    let (status, _) = app
        .tenant_post(&format!("/inspect/sessions/{}/next", session_id), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    app.inspect_room(&session_id, vec![]).await;
    app.tenant_post(&format!("/inspect/sessions/{}/next", session_id), None).await;
    app.inspect_room(&session_id, vec![]).await;
    let (status, view) = app
        .tenant_post(&format!("/inspect/sessions/{}/next", session_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["current_room"]["index"], 2);
    assert_eq!(view["current_room"]["is_last"], true);

    let (status, body) = app
        .tenant_post(&format!("/inspect/sessions/{}/submit", session_id), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INCOMPLETE_INSPECTION");
    assert_eq!(body["error"]["details"], json!({ "completed": 2, "total": 3 }));

    let (_, reports) = app.owner_get(&format!("/homes/{}/reports", home_id)).await;
    assert_eq!(reports, json!([]));
    let (_, link) = app.owner_get(&format!("/homes/{}/links/{}", home_id, link_id)).await;
    assert_eq!(link["is_active"], true);

    // Going back keeps confirmed results without re-analysis
    let (status, view) = app
        .tenant_post(&format!("/inspect/sessions/{}/previous", session_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["current_room"]["index"], 1);
    assert!(view["current_room"]["confirmed"].is_object());
}

#[tokio::test]
async fn test_reanalysis_replaces_pending_result() {
    let app = TestApp::new().await;
    let home_id = app.create_home("Maple Cottage").await;
    let room_id = app.create_room(&home_id, "Kitchen").await;
    app.upload(&home_id, &room_id, 1, vec![item("Chair", 4)]).await;
    let (link_id, _) = app.create_link(&home_id, "Jane").await;
    let session_id = app.open_session(&home_id, &link_id).await;

    app.vision.script(vec![item("Chair", 1)]);
    app.tenant_post(&format!("/inspect/sessions/{}/analyze", session_id), Some(photos_body(1)))
        .await;
    app.vision.script(vec![item("Chair", 4)]);
    let (_, view) = app
        .tenant_post(&format!("/inspect/sessions/{}/analyze", session_id), Some(photos_body(2)))
        .await;
    assert_eq!(view["current_room"]["pending"]["discrepancies"], json!([]));
}

#[tokio::test]
async fn test_email_failure_keeps_report_and_resend_works() {
    let app = TestApp::new().await;
    let home_id = app.create_home("Maple Cottage").await;
    app.create_room(&home_id, "Kitchen").await;
    let (link_id, _) = app.create_link(&home_id, "Jane").await;
    let session_id = app.open_session(&home_id, &link_id).await;
    app.inspect_room(&session_id, vec![]).await;

    app.mailer.set_failing(true);
    let (status, outcome) = app
        .tenant_post(&format!("/inspect/sessions/{}/submit", session_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["email_sent"], false);
    assert_eq!(outcome["warning"], EMAIL_WARNING);
    let report_id = outcome["report_id"].as_str().unwrap();

    let (_, link) = app.owner_get(&format!("/homes/{}/links/{}", home_id, link_id)).await;
    assert_eq!(link["is_active"], false);
    let (_, health) = app.call(axum::http::Method::GET, "/health", None, None).await;
    assert!(health["last_error"].as_str().unwrap().contains(report_id));

    let (status, body) = app.owner_post(&format!("/reports/{}/resend", report_id), json!({})).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "MAIL_FAILED");

    app.mailer.set_failing(false);
    let (status, body) = app.owner_post(&format!("/reports/{}/resend", report_id), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email_sent"], true);
    assert_eq!(app.mailer.sent().len(), 1);
}

#[tokio::test]
async fn test_session_survives_only_until_finished() {
    let app = TestApp::new().await;
    let home_id = app.create_home("Maple Cottage").await;
    app.create_room(&home_id, "Kitchen").await;
    let (link_id, _) = app.create_link(&home_id, "Jane").await;
    let session_id = app.open_session(&home_id, &link_id).await;
    app.inspect_room(&session_id, vec![]).await;
    app.tenant_post(&format!("/inspect/sessions/{}/submit", session_id), None).await;

    let (status, view) = app
        .call(axum::http::Method::GET, &format!("/inspect/sessions/{}", session_id), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["state"], "complete");

    let (status, _) = app
        .tenant_post(&format!("/inspect/sessions/{}/submit", session_id), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (_, reports) = app.owner_get(&format!("/homes/{}/reports", home_id)).await;
    assert_eq!(reports.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_link_removes_bound_report() {
    let app = TestApp::new().await;
    let home_id = app.create_home("Maple Cottage").await;
    app.create_room(&home_id, "Kitchen").await;
    let (link_id, _) = app.create_link(&home_id, "Jane").await;
    let session_id = app.open_session(&home_id, &link_id).await;
    app.inspect_room(&session_id, vec![]).await;
    let (_, outcome) = app
        .tenant_post(&format!("/inspect/sessions/{}/submit", session_id), None)
        .await;

    let (status, body) = app.owner_delete(&format!("/homes/{}/links/{}", home_id, link_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted_report_id"], outcome["report_id"]);

    let (status, _) = app
        .owner_get(&format!("/reports/{}", outcome["report_id"].as_str().unwrap()))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .call(axum::http::Method::GET, &format!("/inspect/sessions/{}", session_id), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
