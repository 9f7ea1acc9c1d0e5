//! Integration tests using the EditdTest harness

mod common;

use common::EditdTest;
use editd::testing::{image_chunk, text_chunk};
use serde_json::{json, Value};

const SOURCE_JPEG: &[u8] = &[0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10, 0x4a, 0x46];
const RESULT_JPEG: &[u8] = &[0xff, 0xd8, 0xff, 0xdb, 0x01, 0x02, 0x03];

#[tokio::test]
async fn test_health_endpoint() {
    let editd = EditdTest::start(vec![]).await.expect("Failed to start server");

    let resp = editd.get("/health").await.expect("Failed to get health");
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["api_key_set"], true);
    assert_eq!(body["remote_storage"], false);
}

#[tokio::test]
async fn test_root_endpoint() {
    let editd = EditdTest::start(vec![]).await.expect("Failed to start server");

    let resp = editd.get("/").await.expect("Failed to get root");
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.expect("Failed to parse JSON");
    assert_eq!(body["name"], "editd");
}

#[tokio::test]
async fn test_parallel_servers_are_isolated() {
    let editd1 = EditdTest::start(vec![]).await.expect("Failed to start server 1");
    let editd2 = EditdTest::start(vec![]).await.expect("Failed to start server 2");
    assert_ne!(editd1.addr, editd2.addr);

    let id = editd1.create_session().await.unwrap();
    let path = format!("/api/session/{}", id);
    assert_eq!(editd1.get(&path).await.unwrap().status(), 200);
    assert_eq!(editd2.get(&path).await.unwrap().status(), 404);
}

#[tokio::test]
async fn test_session_create_and_fetch() {
    let editd = EditdTest::start(vec![]).await.expect("Failed to start server");

    let resp = editd.post_empty("/api/session").await.unwrap();
    assert_eq!(resp.status(), 201);
    let created: Value = resp.json().await.unwrap();
    let id = created["id"].as_str().unwrap();
    assert!(id.starts_with("sess_"));
    assert_eq!(id.len(), 17);
    assert_eq!(created["history"], json!([]));
    assert_eq!(created["metadata"], json!([]));

    let fetched: Value = editd
        .get(&format!("/api/session/{}", id))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["id"], id);
    assert_eq!(fetched["created_at"], created["created_at"]);

    // The snapshot is also served as a JSON artifact
    let snapshot = editd.get(&format!("/json/{}.json", id)).await.unwrap();
    assert_eq!(snapshot.status(), 200);
    assert_eq!(snapshot.headers()["content-type"], "application/json");
}

#[tokio::test]
async fn test_unknown_session_is_404() {
    let editd = EditdTest::start(vec![]).await.expect("Failed to start server");

    let resp = editd.get("/api/session/sess_ffffffffffff").await.unwrap();
    assert_eq!(resp.status(), 404);

    let resp = editd.get("/api/session/not-a-session").await.unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_update_session_metadata() {
    let editd = EditdTest::start(vec![]).await.expect("Failed to start server");
    let id = editd.create_session().await.unwrap();

    let resp = editd
        .put(
            &format!("/api/session/{}", id),
            &json!({"history": ["http://x/images/a.jpg"], "metadata": "[{\"step\": 1}]"}),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let updated: Value = resp.json().await.unwrap();
    assert_eq!(updated["history"], json!(["http://x/images/a.jpg"]));
    assert_eq!(updated["metadata"], json!([{"step": 1}]));

    let resp = editd
        .put(&format!("/api/session/{}", id), &json!({"metadata": "not json"}))
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Rejected update leaves the session untouched
    let fetched: Value = editd
        .get(&format!("/api/session/{}", id))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["metadata"], json!([{"step": 1}]));
}

#[tokio::test]
async fn test_edit_with_session_records_history() {
    let editd = EditdTest::start(vec![
        Ok(text_chunk("Here is ")),
        Ok(text_chunk("your hat.")),
        Ok(image_chunk(RESULT_JPEG)),
    ])
    .await
    .expect("Failed to start server");
    let id = editd.create_session().await.unwrap();

    let resp = editd
        .post_image(
            "/api/edit",
            SOURCE_JPEG,
            &[("prompt", "add a hat"), ("session_id", id.as_str()), ("aspect_ratio", "1:1")],
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["text"], "Here is your hat.");

    let urls = body["image_urls"].as_array().unwrap();
    assert_eq!(urls.len(), 1);
    let url = urls[0].as_str().unwrap();
    assert!(url.starts_with(&format!("{}/images/", editd.base_url())));
    assert!(url.ends_with(".jpg"));

    // The generator saw the uploaded bytes and the edit parameters
    let request = editd.generator.last_request().unwrap();
    assert_eq!(request.image, SOURCE_JPEG);
    assert_eq!(request.mime_type, "image/jpeg");
    assert_eq!(request.prompt, "add a hat");
    assert_eq!(request.aspect_ratio.as_deref(), Some("1:1"));

    // The result is served back
    let image = editd.client.get(url).send().await.unwrap();
    assert_eq!(image.status(), 200);
    assert_eq!(image.bytes().await.unwrap().as_ref(), RESULT_JPEG);

    let session: Value = editd
        .get(&format!("/api/session/{}", id))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(session["history"], json!([url]));
    assert!(session["updated_at"].is_string());
}

#[tokio::test]
async fn test_edit_without_image_output() {
    let editd = EditdTest::start(vec![Ok(text_chunk("I can't do that."))])
        .await
        .expect("Failed to start server");

    let body: Value = editd
        .post_image("/api/edit", SOURCE_JPEG, &[("prompt", "add a hat")])
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "No image was generated");
    assert_eq!(body["text"], "I can't do that.");
}

#[tokio::test]
async fn test_edit_with_unknown_session() {
    let editd = EditdTest::start(vec![Ok(image_chunk(RESULT_JPEG))])
        .await
        .expect("Failed to start server");

    let body: Value = editd
        .post_image(
            "/api/edit",
            SOURCE_JPEG,
            &[("prompt", "add a hat"), ("session_id", "sess_000000000000")],
        )
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("sess_000000000000"));
    assert_eq!(editd.generator.calls(), 0);
}

#[tokio::test]
async fn test_edit_requires_prompt() {
    let editd = EditdTest::start(vec![]).await.expect("Failed to start server");

    let resp = editd.post_image("/api/edit", SOURCE_JPEG, &[]).await.unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_upload_then_edit_from_path() {
    let editd = EditdTest::start(vec![Ok(image_chunk(RESULT_JPEG))])
        .await
        .expect("Failed to start server");

    let resp = editd.post_image("/api/upload", SOURCE_JPEG, &[]).await.unwrap();
    assert_eq!(resp.status(), 200);
    let upload: Value = resp.json().await.unwrap();
    assert_eq!(upload["status"], "success");
    let file_path = upload["file_path"].as_str().unwrap().to_string();
    assert!(file_path.ends_with(".jpg"));

    // The upload is retrievable under /input
    let input = editd.get(&format!("/input/{}", file_path)).await.unwrap();
    assert_eq!(input.status(), 200);
    assert_eq!(input.bytes().await.unwrap().as_ref(), SOURCE_JPEG);

    let body: Value = editd
        .post_form(
            "/api/edit-from-path",
            &[("file_path", file_path.as_str()), ("prompt", "make it blue")],
        )
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["image_urls"].as_array().unwrap().len(), 1);
    assert_eq!(editd.generator.last_request().unwrap().image, SOURCE_JPEG);
}

#[tokio::test]
async fn test_edit_from_missing_path() {
    let editd = EditdTest::start(vec![Ok(image_chunk(RESULT_JPEG))])
        .await
        .expect("Failed to start server");

    let body: Value = editd
        .post_form(
            "/api/edit-from-path",
            &[("file_path", "nowhere.jpg"), ("prompt", "make it blue")],
        )
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Image not found: nowhere.jpg");
    assert_eq!(editd.generator.calls(), 0);
}
