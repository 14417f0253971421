use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use parley_server::{app, AppState};
use parley_types::ROOM_PREFIX;
use parley_voice::{AgentDispatchConfig, CredentialIssuer, LiveKitConfig};
use serde_json::Value;
use tower::ServiceExt;

const SERVER_URL: &str = "wss://voice.example.com";
const API_KEY: &str = "APItestkey";
const API_SECRET: &str = "test-secret-with-enough-length-for-hs256";

fn test_app(dispatch: Option<AgentDispatchConfig>) -> Router {
    let mut issuer = CredentialIssuer::new(LiveKitConfig::new(SERVER_URL, API_KEY, API_SECRET));
    if let Some(dispatch) = dispatch {
        issuer = issuer.with_agent_dispatch(dispatch);
    }
    app(AppState::new(issuer))
}

async fn post_token(app: Router, body: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/token")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

fn claims(token: &str) -> Value {
    let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    decode::<Value>(
        token,
        &DecodingKey::from_secret(API_SECRET.as_bytes()),
        &validation,
    )
    .unwrap()
    .claims
}

#[tokio::test]
async fn empty_request_generates_identity() {
    let (status, json) = post_token(test_app(None), "{}").await;

    assert_eq!(status, StatusCode::OK);
    assert!(!json["token"].as_str().unwrap().is_empty());
    assert_eq!(json["server_url"], SERVER_URL);
    assert_eq!(json["expires_in"], 1800);

    let room = json["room_name"].as_str().unwrap();
    assert!(room.starts_with(ROOM_PREFIX));
    let identity = &room[ROOM_PREFIX.len()..];
    assert!(identity.starts_with("user-"));

    let claims = claims(json["token"].as_str().unwrap());
    assert_eq!(claims["sub"], identity);
    assert_eq!(claims["video"]["room"], room);
}

#[tokio::test]
async fn same_user_gets_same_room() {
    let (_, first) = post_token(test_app(None), r#"{"user_id":"alice"}"#).await;
    let (_, second) = post_token(test_app(None), r#"{"user_id":"alice"}"#).await;

    assert_eq!(first["room_name"], "voice-alice");
    assert_eq!(second["room_name"], "voice-alice");

    let claims = claims(first["token"].as_str().unwrap());
    assert_eq!(claims["sub"], "alice");
    assert_eq!(claims["name"], "User alice");
    assert_eq!(claims["video"]["roomJoin"], true);
    assert_eq!(claims["video"]["canPublish"], true);
    assert_eq!(claims["video"]["canSubscribe"], true);
    assert_eq!(claims["video"]["canPublishData"], true);
}

#[tokio::test]
async fn null_user_id_is_generated() {
    let (status, json) = post_token(test_app(None), r#"{"user_id":null}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["room_name"]
        .as_str()
        .unwrap()
        .starts_with("voice-user-"));
}

#[tokio::test]
async fn empty_user_id_is_generated() {
    let (status, json) = post_token(test_app(None), r#"{"user_id":""}"#).await;
    assert_eq!(status, StatusCode::OK);
    let room = json["room_name"].as_str().unwrap();
    assert!(room.starts_with("voice-user-"), "room: {room}");

    let claims = claims(json["token"].as_str().unwrap());
    assert_eq!(claims["video"]["room"], room);
}

#[tokio::test]
async fn whitespace_user_id_is_rejected() {
    let (status, json) = post_token(test_app(None), r#"{"user_id":"   "}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().is_some());
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let (status, json) = post_token(test_app(None), r#"{"user_id": 42"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().is_some());
}

#[tokio::test]
async fn missing_signing_keys_is_server_error() {
    let app = app(AppState::new(CredentialIssuer::new(LiveKitConfig::new(
        SERVER_URL, "", "",
    ))));
    let (status, json) = post_token(app, "{}").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["error"].as_str().unwrap().contains("configuration"));
}

#[tokio::test]
async fn dispatch_omits_room_and_expiry() {
    let (status, json) = post_token(
        test_app(Some(AgentDispatchConfig::enabled("voice-assistant"))),
        r#"{"user_id":"bob"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(json.get("room_name").is_none());
    assert!(json.get("expires_in").is_none());
    assert_eq!(json["server_url"], SERVER_URL);

    let claims = claims(json["token"].as_str().unwrap());
    assert_eq!(claims["video"]["room"], "voice-bob");
    let raw = claims.to_string();
    assert!(raw.contains("voice-assistant"), "claims: {raw}");
    assert!(raw.contains("token_server"), "claims: {raw}");
}

#[tokio::test]
async fn cors_allows_any_origin() {
    let response = test_app(None)
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/token")
                .header(header::ORIGIN, "https://app.example.com")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    let methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
    assert!(methods.contains("POST"));
    assert!(methods.contains("GET"));
}
