use axum::body::Bytes;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use base64::Engine;
use futures_util::StreamExt;
use serde_json::{json, Value};
use wingman_types::ConversationTurn;
use wingman_voice::{
    http_client, Completer, FalSynthesizer, FalTranscriber, OpenRouterCompleter, Synthesizer,
    Transcriber, VoiceConfig, VoiceError,
};

fn header<'a>(headers: &'a HeaderMap, name: axum::http::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn stt(headers: HeaderMap, body: Bytes) -> Result<Json<Value>, StatusCode> {
    if header(&headers, AUTHORIZATION) != Some("Key fal-test") {
        return Err(StatusCode::UNAUTHORIZED);
    }
    let body = String::from_utf8_lossy(&body);
    if !body.contains("name=\"file\"") || !body.contains("name=\"language\"") {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(Json(json!({ "text": "  merhaba dünya \n" })))
}

async fn chat(headers: HeaderMap, Json(req): Json<Value>) -> Response {
    if header(&headers, AUTHORIZATION) != Some("Bearer or-test") {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if req["stream"] != json!(true) || req["messages"][0]["role"] != "system" {
        return StatusCode::BAD_REQUEST.into_response();
    }
    let body = [
        json!({ "choices": [{ "delta": { "role": "assistant" } }] }),
        json!({ "choices": [{ "delta": { "content": "Merhaba" } }] }),
        json!({ "choices": [{ "delta": { "content": ", hoş geldin." } }] }),
    ]
    .iter()
    .map(|chunk| format!("data: {chunk}\n\n"))
    .collect::<String>()
        + "data: [DONE]\n\n";
    ([(CONTENT_TYPE, "text/event-stream")], body).into_response()
}

async fn tts_stream(headers: HeaderMap, Json(req): Json<Value>) -> Response {
    if header(&headers, AUTHORIZATION) != Some("Key fal-test") || req["input"].is_null() {
        return StatusCode::BAD_REQUEST.into_response();
    }
    let b64 = base64::engine::general_purpose::STANDARD;
    let body = format!(
        "data: {}\n\ndata: {}\n\n",
        json!({ "audio": b64.encode([1u8, 2, 3]) }),
        json!({ "audio": b64.encode([4u8]), "done": true }),
    );
    ([(CONTENT_TYPE, "text/event-stream")], body).into_response()
}

async fn tts_speech(Json(req): Json<Value>) -> Response {
    if req["response_format"] != "pcm" {
        return StatusCode::BAD_REQUEST.into_response();
    }
    vec![7u8; 32].into_response()
}

async fn unavailable() -> StatusCode {
    StatusCode::SERVICE_UNAVAILABLE
}

async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn config(base: &str) -> VoiceConfig {
    VoiceConfig {
        stt_url: base.to_string(),
        tts_url: base.to_string(),
        llm_url: base.to_string(),
        fal_key: "fal-test".to_string(),
        openrouter_api_key: "or-test".to_string(),
        ..VoiceConfig::default()
    }
}

async fn healthy_services() -> VoiceConfig {
    let router = Router::new()
        .route("/audio/transcriptions", post(stt))
        .route("/chat/completions", post(chat))
        .route("/stream", post(tts_stream))
        .route("/audio/speech", post(tts_speech));
    config(&spawn(router).await)
}

#[tokio::test]
async fn transcriber_posts_multipart_and_trims_text() {
    let config = healthy_services().await;
    let stt = FalTranscriber::new(http_client().unwrap(), &config);

    let text = stt.transcribe(vec![0u8; 2048], "tr").await.unwrap();
    assert_eq!(text, "merhaba dünya");
}

#[tokio::test]
async fn completer_streams_content_tokens() {
    let config = healthy_services().await;
    let llm = OpenRouterCompleter::new(http_client().unwrap(), &config);

    let messages = vec![
        ConversationTurn::system("Sen bir mülakatçısın."),
        ConversationTurn::user("Merhaba"),
    ];
    let tokens: Vec<String> = llm
        .stream(&messages)
        .await
        .unwrap()
        .map(|t| t.unwrap())
        .collect()
        .await;
    assert_eq!(tokens, vec!["Merhaba", ", hoş geldin."]);
}

#[tokio::test]
async fn synthesizer_streams_frames_and_supports_fallback() {
    let config = healthy_services().await;
    let tts = FalSynthesizer::new(http_client().unwrap(), &config);

    let frames: Vec<Vec<u8>> = tts
        .open_stream("Merhaba.", 1.0)
        .await
        .unwrap()
        .map(|f| f.unwrap())
        .collect()
        .await;
    assert_eq!(frames, vec![vec![1, 2, 3], vec![4]]);

    let full = tts.synthesize_full("Merhaba.", 1.0).await.unwrap();
    assert_eq!(full, vec![7u8; 32]);
}

#[tokio::test]
async fn synthesizer_rejects_out_of_range_speed_before_network() {
    // Nothing listens here; validation must fail first.
    let tts = FalSynthesizer::new(http_client().unwrap(), &config("http://127.0.0.1:9"));
    assert!(matches!(
        tts.open_stream("Merhaba.", 42.0).await,
        Err(VoiceError::Config(_))
    ));
}

#[tokio::test]
async fn non_success_status_maps_to_service_errors() {
    let router = Router::new().fallback(unavailable);
    let config = config(&spawn(router).await);
    let http = http_client().unwrap();

    let stt = FalTranscriber::new(http.clone(), &config);
    match stt.transcribe(vec![1u8; 2048], "tr").await {
        Err(VoiceError::Stt(msg)) => assert!(msg.contains("503")),
        other => panic!("expected Stt error, got {other:?}"),
    }

    let llm = OpenRouterCompleter::new(http.clone(), &config);
    match llm.stream(&[ConversationTurn::user("hi")]).await {
        Err(VoiceError::Llm(msg)) => assert!(msg.contains("503")),
        Err(other) => panic!("expected Llm error, got {other:?}"),
        Ok(_) => panic!("expected Llm error, got a stream"),
    }

    let tts = FalSynthesizer::new(http, &config);
    assert!(matches!(
        tts.open_stream("Merhaba.", 1.0).await,
        Err(VoiceError::Tts(_))
    ));
    assert!(matches!(
        tts.synthesize_full("Merhaba.", 1.0).await,
        Err(VoiceError::Tts(_))
    ));
}
