//! Handshake and wire-protocol tests for the socket endpoint, run entirely
//! in-process: token issuance/verification and frame parsing need no
//! listening server.

use axum::http::{header::AUTHORIZATION, HeaderMap, HeaderValue};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use uuid::Uuid;

use chat_service::middleware::auth::{self, Claims};
use chat_service::websocket::events::{parse_client_frame, ClientEvent};
use chat_service::websocket::handlers::{extract_credential, WsParams};

const SECRET: &str = "protocol-test-secret";

fn issue_token(user_id: Uuid, ttl_seconds: i64) -> String {
    encode(
        &Header::default(),
        &Claims {
            sub: user_id.to_string(),
            exp: chrono::Utc::now().timestamp() + ttl_seconds,
        },
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn bearer(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    );
    headers
}

#[test]
fn handshake_accepts_a_fresh_token_from_any_slot() {
    let user_id = Uuid::new_v4();
    let token = issue_token(user_id, 600);

    // auth query field
    let params = WsParams {
        auth: Some(token.clone()),
        token: None,
    };
    let credential = extract_credential(&params, &HeaderMap::new()).unwrap();
    assert_eq!(auth::authenticate(&credential, SECRET).unwrap(), user_id);

    // bearer header
    let params = WsParams::default();
    let credential = extract_credential(&params, &bearer(&token)).unwrap();
    assert_eq!(auth::authenticate(&credential, SECRET).unwrap(), user_id);

    // legacy token query parameter
    let params = WsParams {
        auth: None,
        token: Some(token.clone()),
    };
    let credential = extract_credential(&params, &HeaderMap::new()).unwrap();
    assert_eq!(auth::authenticate(&credential, SECRET).unwrap(), user_id);
}

#[test]
fn handshake_prefers_the_explicit_auth_field() {
    let preferred = Uuid::new_v4();
    let other = Uuid::new_v4();

    let params = WsParams {
        auth: Some(issue_token(preferred, 600)),
        token: Some(issue_token(other, 600)),
    };
    let headers = bearer(&issue_token(other, 600));

    let credential = extract_credential(&params, &headers).unwrap();
    assert_eq!(auth::authenticate(&credential, SECRET).unwrap(), preferred);
}

#[test]
fn expired_token_is_rejected_before_any_channel_join() {
    let token = issue_token(Uuid::new_v4(), -600);
    let params = WsParams {
        auth: Some(token),
        token: None,
    };

    let credential = extract_credential(&params, &HeaderMap::new()).unwrap();
    assert!(auth::authenticate(&credential, SECRET).is_err());
}

#[test]
fn missing_credential_never_reaches_verification() {
    assert!(extract_credential(&WsParams::default(), &HeaderMap::new()).is_none());
}

#[test]
fn token_signed_with_another_secret_is_rejected() {
    let token = encode(
        &Header::default(),
        &Claims {
            sub: Uuid::new_v4().to_string(),
            exp: chrono::Utc::now().timestamp() + 600,
        },
        &EncodingKey::from_secret(b"some-other-secret"),
    )
    .unwrap();

    assert!(auth::authenticate(&token, SECRET).is_err());
}

#[test]
fn inbound_vocabulary_is_typing_delivered_and_ping() {
    let conversation_id = Uuid::new_v4();
    let message_id = Uuid::new_v4();

    let typing = json!({
        "event": "messages:typing",
        "payload": { "conversation_id": conversation_id, "on": true },
    });
    assert_eq!(
        parse_client_frame(&typing.to_string()),
        Some(ClientEvent::Typing {
            conversation_id,
            on: true
        })
    );

    let delivered = json!({
        "event": "messages:delivered",
        "payload": { "conversation_id": conversation_id, "message_id": message_id },
    });
    assert_eq!(
        parse_client_frame(&delivered.to_string()),
        Some(ClientEvent::Delivered {
            conversation_id,
            message_id
        })
    );

    assert!(matches!(
        parse_client_frame(r#"{"event":"ping","payload":{"seq":1}}"#),
        Some(ClientEvent::Ping { .. })
    ));
}

#[test]
fn server_push_names_are_not_accepted_inbound() {
    // The pull vocabulary is closed; a client cannot inject server events.
    for event in ["message:new", "message:read", "notifications:dirty", "pong"] {
        let frame = json!({
            "event": event,
            "payload": { "conversation_id": Uuid::new_v4() },
        });
        assert_eq!(parse_client_frame(&frame.to_string()), None);
    }
}
