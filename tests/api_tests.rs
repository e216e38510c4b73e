mod common;

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::json;
use uuid::Uuid;

use labelq::db;
use labelq::models::QueueStatus;

// ── Health ──────────────────────────────────────────────────────

#[tokio::test]
async fn health_returns_ok() {
    let app = common::spawn_app().await;

    let resp = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    assert_eq!(resp.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn index_lists_endpoints() {
    let app = common::spawn_app().await;

    let (body, status) = app.get("/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "labelq");
    assert!(body["endpoints"]
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e == "POST /print"));
}

// ── Print ───────────────────────────────────────────────────────

#[tokio::test]
async fn print_fast_path_does_not_queue() {
    let app = common::spawn_app().await;

    let (body, status) = app.print(&common::label_body()).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert!(body.get("queueId").is_none());

    assert_eq!(db::print_queue::count(&app.pool).await.unwrap(), 0);

    let sent = app.printer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, common::PRINTER);
    assert!(sent[0].1.starts_with("^XA"));
    assert!(sent[0].1.contains("HEX BOLT M8"));
}

#[tokio::test]
async fn print_failure_queues_exactly_once() {
    let app = common::spawn_app().await;
    app.printer.set_default_outcome(false);

    let (body, status) = app.print(&common::label_body()).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);

    let id: Uuid = body["queueId"].as_str().unwrap().parse().unwrap();
    assert_eq!(db::print_queue::count(&app.pool).await.unwrap(), 1);

    let entry = db::print_queue::get_by_id(&app.pool, id).await.unwrap().unwrap();
    assert_eq!(entry.status, QueueStatus::Pending);
    assert_eq!(entry.attempts, 0);
    assert_eq!(entry.payload, common::label_body());
    assert_eq!(app.printer.send_count(), 1);
}

#[tokio::test]
async fn print_to_unavailable_printer_queues_without_sending() {
    let app = common::spawn_app().await;
    app.printer.set_available(false);

    let mut request = common::label_body();
    request["printerName"] = json!("zebra");

    let (body, status) = app.print(&request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().contains("queued"));

    let id: Uuid = body["queueId"].as_str().unwrap().parse().unwrap();
    let entry = db::print_queue::get_by_id(&app.pool, id).await.unwrap().unwrap();
    assert_eq!(entry.printer_name.as_deref(), Some("zebra"));
    assert_eq!(entry.payload, common::label_body());
    assert_eq!(app.printer.send_count(), 0);
}

#[tokio::test]
async fn print_with_invalid_markup_queues_without_sending() {
    let app = common::spawn_app().await;

    let request = json!({
        "labelType": "shelf",
        "data": { "sku": "1" },
        "markupTemplate": "^FD{sku}^FS"
    });
    let (body, status) = app.print(&request).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["message"].as_str().unwrap().contains("Invalid label markup"));

    let id: Uuid = body["queueId"].as_str().unwrap().parse().unwrap();
    let entry = db::print_queue::get_by_id(&app.pool, id).await.unwrap().unwrap();
    assert_eq!(entry.status, QueueStatus::Pending);
    assert_eq!(entry.payload, request);
    assert_eq!(app.printer.send_count(), 0);
}

#[tokio::test]
async fn print_with_empty_template_prints_product_label() {
    let app = common::spawn_app().await;

    let (body, status) = app
        .print(&json!({
            "labelType": "shelf",
            "data": { "description": "WING NUT" },
            "markupTemplate": ""
        }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body.get("queueId").is_none());

    assert_eq!(db::print_queue::count(&app.pool).await.unwrap(), 0);
    let sent = app.printer.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.contains("WING NUT"));
}

#[tokio::test]
async fn fast_path_and_dispatcher_take_turns_on_one_printer() {
    let app = common::spawn_app().await;
    app.printer.set_available(false);
    for _ in 0..3 {
        app.print(&common::label_body()).await;
    }
    app.printer.set_available(true);
    app.printer.set_send_delay(Duration::from_millis(30));

    let body_a = common::label_body();
    let body_b = common::label_body();
    let (processed, (first, _), (second, _)) = tokio::join!(
        app.state.dispatcher.process_now(),
        app.print(&body_a),
        app.print(&body_b),
    );

    assert_eq!(processed.unwrap(), 3);
    assert!(first.get("queueId").is_none(), "{first}");
    assert!(second.get("queueId").is_none(), "{second}");
    assert_eq!(app.printer.send_count(), 5);
    assert_eq!(app.printer.max_in_flight(), 1);
}

#[tokio::test]
async fn print_rejects_malformed_bodies() {
    let app = common::spawn_app().await;

    let resp = app
        .client
        .post(app.url("/print"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("Invalid JSON"));

    let (_, status) = app.print(&json!({ "labelType": "product" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, status) = app.print(&json!(["data"])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(db::print_queue::count(&app.pool).await.unwrap(), 0);
}

#[tokio::test]
async fn print_rejects_oversized_body() {
    let mut config = common::test_config();
    config.max_body_size = 64;
    let app = common::spawn_app_with(config).await;

    let mut request = common::label_body();
    request["data"]["description"] = json!("X".repeat(256));

    let (_, status) = app.print(&request).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(db::print_queue::count(&app.pool).await.unwrap(), 0);
}

// ── Status ──────────────────────────────────────────────────────

#[tokio::test]
async fn status_reports_printer_and_queue_stats() {
    let app = common::spawn_app().await;

    let (body, status) = app.get("/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "online");
    assert_eq!(body["printerAvailable"], true);
    assert_eq!(body["printerName"], common::PRINTER);

    app.printer.set_available(false);
    app.print(&common::label_body()).await;
    app.print(&common::label_body()).await;

    let (body, _) = app.get("/status").await;
    assert_eq!(body["printerAvailable"], false);
    assert_eq!(
        body["queueStats"],
        json!({ "pending": 2, "processing": 0, "completed": 0, "failed": 0 })
    );
}

#[tokio::test]
async fn printers_lists_devices() {
    let app = common::spawn_app().await;

    let (body, status) = app.get("/printers").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["printers"], json!([common::PRINTER]));
    assert_eq!(body["default"], common::PRINTER);
    assert_eq!(body["count"], 1);
}

// ── Queue ───────────────────────────────────────────────────────

#[tokio::test]
async fn queue_lists_newest_first_and_filters() {
    let app = common::spawn_app().await;
    app.printer.set_available(false);

    let (first, _) = app.print(&common::label_body()).await;
    let (second, _) = app.print(&common::label_body()).await;

    let (body, status) = app.get("/queue").await;
    assert_eq!(status, StatusCode::OK);
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["id"], second["queueId"]);
    assert_eq!(items[1]["id"], first["queueId"]);
    assert_eq!(items[0]["status"], "pending");
    assert_eq!(items[0]["attempts"], 0);
    assert!(items[0].get("payload").is_none());

    let (body, _) = app.get("/queue?status=PENDING&limit=1").await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (body, _) = app.get("/queue?status=completed").await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn queue_rejects_unknown_status() {
    let app = common::spawn_app().await;

    let (body, status) = app.get("/queue?status=bogus").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("Invalid status: bogus"));
    assert!(message.contains("pending, processing, completed, failed"));
}

#[tokio::test]
async fn queue_entry_by_id() {
    let app = common::spawn_app().await;
    app.printer.set_available(false);

    let (queued, _) = app.print(&common::label_body()).await;
    let id = queued["queueId"].as_str().unwrap();

    let (body, status) = app.get(&format!("/queue/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id);
    assert_eq!(body["payload"], common::label_body());
    assert!(body["updatedAt"].is_string());

    let (_, status) = app.get(&format!("/queue/{}", Uuid::now_v7())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, status) = app.get("/queue/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn process_prints_queued_requests() {
    let app = common::spawn_app().await;
    app.printer.set_available(false);

    app.print(&common::label_body()).await;
    app.print(&common::label_body()).await;
    app.printer.set_available(true);

    let (body, status) = app.post("/queue/process").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["processed"], 2);

    let stats = db::print_queue::get_stats(&app.pool).await.unwrap();
    assert_eq!(stats.completed, 2);
    assert_eq!(stats.pending, 0);

    let (body, _) = app.post("/queue/process").await;
    assert_eq!(body["processed"], 0);
}

// ── API key ─────────────────────────────────────────────────────

#[tokio::test]
async fn api_key_is_enforced_when_configured() {
    let mut config = common::test_config();
    config.api_key = Some("s3cret".to_string());
    let app = common::spawn_app_with(config).await;

    let (body, status) = app.get("/status").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].as_str().unwrap().contains("X-API-Key"));

    let resp = app
        .client
        .get(app.url("/status"))
        .header("X-API-Key", "wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app
        .client
        .post(app.url("/print"))
        .header("X-API-Key", "s3cret")
        .json(&common::label_body())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // health stays open
    let resp = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
