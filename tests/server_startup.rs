//! Server Startup Tests
//!
//! Tests for router assembly, the health check and the Twilio voice webhook.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use tower::util::ServiceExt;

use waav_call_bridge::{
    AppState, ServerConfig,
    core::realtime::{OpenAIRealtimeAudioFormat, OpenAIRealtimeVoice},
    core::session::LogNotifier,
    routes,
};

/// Helper function to create a minimal test configuration
fn create_minimal_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        openai_api_key: Some("sk-test".to_string()),
        openai_realtime_model: "gpt-4o-realtime-preview-2024-10-01".to_string(),
        openai_realtime_voice: OpenAIRealtimeVoice::Alloy,
        openai_realtime_url: None,
        audio_format: OpenAIRealtimeAudioFormat::G711Ulaw,
        assistant_instructions: None,
        temperature: None,
        twilio_account_sid: None,
        twilio_auth_token: None,
        default_from_number: None,
        summary_notify_number: None,
        recording_dir: None,
        hangup_drain_timeout_seconds: 15,
        summary_timeout_seconds: 20,
        notify_timeout_seconds: 10,
    }
}

fn test_router() -> axum::Router {
    let state = AppState::with_notifier(create_minimal_config(), Arc::new(LogNotifier));
    routes::create_router(state)
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_state_without_twilio_uses_log_notifier() {
    // No Twilio credentials: building the state must not fail
    let state = AppState::new(create_minimal_config());
    assert!(state.is_ok());
}

#[tokio::test]
async fn test_state_with_twilio_credentials() {
    let mut config = create_minimal_config();
    config.twilio_account_sid = Some("AC123".to_string());
    config.twilio_auth_token = Some("token".to_string());
    config.default_from_number = Some("+15550000000".to_string());

    assert!(AppState::new(config).is_ok());
}

#[tokio::test]
async fn test_health_check() {
    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = test_router().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["status"], "OK");
    assert_eq!(body["message"], "AI Server is running");
}

#[tokio::test]
async fn test_voice_webhook_returns_stream_twiml() {
    let request = Request::builder()
        .method("POST")
        .uri("/call")
        .header(header::HOST, "bridge.example.com")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(
            "CallSid=CA123&From=%2B15551112222&Called=%2B15553334444&Direction=inbound",
        ))
        .unwrap();

    let response = test_router().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/xml"
    );

    let twiml = body_string(response).await;
    assert!(twiml.contains("<Connect>"));
    assert!(twiml.contains(r#"<Stream url="wss://bridge.example.com/call">"#));
    assert!(twiml.contains(r#"<Parameter name="caller" value="+15551112222" />"#));
    assert!(twiml.contains(r#"<Parameter name="called" value="+15553334444" />"#));
}

#[tokio::test]
async fn test_voice_webhook_without_numbers() {
    let request = Request::builder()
        .method("POST")
        .uri("/call")
        .header(header::HOST, "bridge.example.com")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("CallSid=CA123"))
        .unwrap();

    let response = test_router().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let twiml = body_string(response).await;
    assert!(twiml.contains(r#"<Parameter name="caller" value="" />"#));
}

#[tokio::test]
async fn test_voice_webhook_requires_host() {
    let request = Request::builder()
        .method("POST")
        .uri("/call")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("CallSid=CA123&From=%2B15551112222"))
        .unwrap();

    let response = test_router().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert!(body["error"].as_str().unwrap().contains("Host"));
}

#[tokio::test]
async fn test_media_stream_requires_upgrade() {
    let request = Request::builder()
        .uri("/call")
        .header(header::HOST, "bridge.example.com")
        .body(Body::empty())
        .unwrap();

    let response = test_router().oneshot(request).await.unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_unknown_route() {
    let request = Request::builder()
        .uri("/speak")
        .body(Body::empty())
        .unwrap();

    let response = test_router().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
