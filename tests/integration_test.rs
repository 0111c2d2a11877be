//! Integration tests using the ArtbotTest harness

mod common;

use std::path::PathBuf;

use common::ArtbotTest;

use artbot::api::DrawRequest;
use artbot::bot::NO_KEYS_REPLY;
use artbot::chat::{ChatEvent, Segment};
use artbot::images::{encode_png, ImageRef};
use artbot::Config;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::{Rgba, RgbaImage};
use mockito::Matcher;

/// A tiny PNG, base64-encoded, for inline references and mock responses
fn tiny_png_base64() -> String {
    let mut img = RgbaImage::new(2, 2);
    img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
    img.put_pixel(1, 1, Rgba([0, 0, 255, 255]));
    let png = encode_png(&img).expect("encode png");
    BASE64.encode(png)
}

/// A generateContent response carrying one text part and one image part
fn gemini_body(text: &str, png_b64: &str) -> String {
    serde_json::json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [
                    { "text": text },
                    { "inlineData": { "mimeType": "image/png", "data": png_b64 } }
                ]
            },
            "finishReason": "STOP"
        }]
    })
    .to_string()
}

#[tokio::test]
async fn test_server_starts_and_stops() {
    let bot = ArtbotTest::start().await.expect("Failed to start server");
    // Server shuts down automatically when the harness is dropped
    drop(bot);
}

#[tokio::test]
async fn test_health_endpoint() {
    let bot = ArtbotTest::start().await.expect("Failed to start server");

    let resp = bot.get("/health").await.expect("Failed to get health");
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["keys_configured"], 0);
}

#[tokio::test]
async fn test_root_endpoint() {
    let bot = ArtbotTest::start().await.expect("Failed to start server");

    let resp = bot.get("/").await.expect("Failed to get root");
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.expect("Failed to parse JSON");
    assert_eq!(body["name"], "artbot");
}

#[tokio::test]
async fn test_parallel_servers() {
    // Start multiple servers to verify port isolation
    let bot1 = ArtbotTest::start().await.expect("Failed to start server 1");
    let bot2 = ArtbotTest::start().await.expect("Failed to start server 2");

    assert_ne!(bot1.addr, bot2.addr);

    // Both should respond
    let resp1 = bot1.get("/health").await.expect("Failed to get health 1");
    let resp2 = bot2.get("/health").await.expect("Failed to get health 2");

    assert_eq!(resp1.status(), 200);
    assert_eq!(resp2.status(), 200);
}

#[tokio::test]
async fn test_event_records_reference_images() {
    let bot = ArtbotTest::start().await.expect("Failed to start server");

    let event = ChatEvent::new("u1")
        .in_conversation("room-9")
        .with_segment(Segment::text("look at these"))
        .with_segment(Segment::image(ImageRef::url("https://cdn.example/a.png")))
        .with_segment(Segment::image(ImageRef::url("https://cdn.example/b.png")));

    let resp = bot.post("/event", &event).await.expect("Failed to post event");
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.expect("Failed to parse JSON");
    assert_eq!(body["recorded"], 2);

    assert_eq!(bot.bot().gallery().len("u1", "room-9").await, 2);
}

#[tokio::test]
async fn test_draw_without_keys_reports_missing_config() {
    let bot = ArtbotTest::start().await.expect("Failed to start server");

    let request = DrawRequest {
        event: ChatEvent::new("u1").in_conversation("room-1"),
        prompt: "a fox in the snow".into(),
        image_index: 0,
    };

    let resp = bot.post("/draw", &request).await.expect("Failed to post draw");
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.expect("Failed to parse JSON");
    assert_eq!(body[0]["type"], "text");
    assert_eq!(body[0]["text"], NO_KEYS_REPLY);
}

#[tokio::test]
async fn test_draw_round_trip_with_cached_reference() {
    let mut gemini = mockito::Server::new_async().await;
    let mock = gemini
        .mock("POST", "/v1beta/models/test-model:generateContent")
        .match_query(Matcher::UrlEncoded("key".into(), "key-a".into()))
        .match_body(Matcher::Regex("inlineData".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(gemini_body("Here you go.", &tiny_png_base64()))
        .create_async()
        .await;

    let config = Config {
        api_keys: vec!["key-a".into()],
        api_base_url: gemini.url(),
        model: "test-model".into(),
        ..Config::default()
    };
    let bot = ArtbotTest::start_with(config)
        .await
        .expect("Failed to start server");

    // Seed the gallery with an inline reference image
    let seed = ChatEvent::new("u1")
        .in_conversation("room-1")
        .with_segment(Segment::image(ImageRef::inline(tiny_png_base64(), "image/png")));
    let resp = bot.post("/event", &seed).await.expect("Failed to post event");
    assert_eq!(resp.status(), 200);

    // Draw against the cached reference
    let request = DrawRequest {
        event: ChatEvent::new("u1").in_conversation("room-1"),
        prompt: "add a little hat".into(),
        image_index: 1,
    };
    let resp = bot.post("/draw", &request).await.expect("Failed to post draw");
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.expect("Failed to parse JSON");
    mock.assert_async().await;

    assert_eq!(body[0]["type"], "chain");
    let parts = body[0]["parts"].as_array().expect("chain parts");
    assert_eq!(parts[0]["type"], "text");
    assert_eq!(parts[0]["text"], "Here you go.");
    assert_eq!(parts[1]["type"], "image");
    let path = PathBuf::from(parts[1]["path"].as_str().expect("image path"));
    assert!(path.exists(), "generated file should exist until swept");
}

#[tokio::test]
async fn test_shutdown_sweeps_work_dir() {
    let bot = ArtbotTest::start().await.expect("Failed to start server");

    let work_dir = bot.bot().config().temp_dir.clone();
    let leftover = work_dir.join("gen_leftover.png");
    std::fs::write(&leftover, b"stale").expect("Failed to write leftover file");

    bot.stop().await;

    assert!(!leftover.exists(), "final sweep removes remaining temp files");
    assert!(!work_dir.exists(), "empty work dir is removed");
}
