//! End-to-end tests of the HTTP contract against mocked collaborators.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use async_trait::async_trait;

use {
    charla_assistant::{AssistantDriver, AssistantPage, PageFactory, ReplySnapshot},
    charla_common::{Error, Result},
    charla_config::{AssistantConfig, SessionsConfig},
    charla_connector::{ChatSummary, ClientOp, Connector, ConnectorEvent, OpOutput},
    charla_gateway::{AppState, build_router},
    charla_sessions::{SessionManager, TokenValidator},
};

#[derive(Default)]
struct MockConnector;

#[async_trait]
impl Connector for MockConnector {
    async fn login(&self, _token: &str, _auth_dir: Option<String>) -> Result<()> {
        Ok(())
    }

    async fn logout(&self, _token: &str) -> Result<()> {
        Ok(())
    }

    async fn close(&self, _token: &str) -> Result<()> {
        Ok(())
    }

    async fn invoke(&self, _token: &str, op: ClientOp) -> Result<OpOutput> {
        match op {
            ClientOp::GetChats => Ok(OpOutput::Chats(vec![ChatSummary {
                id: "5215512345678@c.us".into(),
                name: Some("Ana".into()),
                is_group: false,
                unread_count: 1,
            }])),
            ClientOp::GetState => Ok(OpOutput::State {
                state: "CONNECTED".into(),
            }),
            _ => Ok(OpOutput::Ack),
        }
    }
}

struct AlwaysValid;

#[async_trait]
impl TokenValidator for AlwaysValid {
    async fn validate(&self, _token: &str) -> Result<bool> {
        Ok(true)
    }
}

struct ScriptedPage;

#[async_trait]
impl AssistantPage for ScriptedPage {
    async fn reload(&self) -> Result<()> {
        Ok(())
    }

    async fn input_ready(&self) -> bool {
        true
    }

    async fn submit_prompt(&self, _text: &str) -> Result<()> {
        Ok(())
    }

    async fn wait_for_echo(&self, _timeout: std::time::Duration) -> Result<()> {
        Ok(())
    }

    async fn last_reply(&self) -> Result<Option<ReplySnapshot>> {
        Ok(Some(ReplySnapshot {
            id: "r1".into(),
            text: "hola desde el asistente".into(),
        }))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

struct ScriptedFactory;

#[async_trait]
impl PageFactory for ScriptedFactory {
    async fn open(&self) -> Result<Box<dyn AssistantPage>> {
        Ok(Box::new(ScriptedPage))
    }
}

async fn spawn_app() -> (String, Arc<SessionManager>) {
    let sessions = Arc::new(SessionManager::new(
        Arc::new(MockConnector),
        Arc::new(AlwaysValid),
        SessionsConfig {
            admin_secret: "s3cret".into(),
            ..SessionsConfig::default()
        },
    ));
    let assistant = Arc::new(AssistantDriver::new(
        Arc::new(ScriptedFactory),
        AssistantConfig::default(),
    ));
    let state = AppState {
        sessions: Arc::clone(&sessions),
        assistant,
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, build_router(state)).await;
    });

    (format!("http://{addr}"), sessions)
}

async fn post(
    base: &str,
    path: &str,
    body: serde_json::Value,
) -> (reqwest::StatusCode, serde_json::Value) {
    let response = reqwest::Client::new()
        .post(format!("{base}{path}"))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = response.status();
    let body = response.json().await.unwrap();
    (status, body)
}

#[tokio::test]
async fn initialize_then_track_login_state() {
    let (base, sessions) = spawn_app().await;

    let (status, body) = post(
        &base,
        "/api/session/initialize",
        serde_json::json!({"token": "t1"}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "initialized");
    assert_eq!(body["isLoggedIn"], false);

    // Second initialize is a no-op.
    let (status, body) = post(
        &base,
        "/api/session/initialize",
        serde_json::json!({"token": "t1"}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "already initialized");

    let (status, body) = post(
        &base,
        "/api/session/check-session",
        serde_json::json!({"token": "t1"}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["isLoggedIn"], false);

    sessions
        .apply_event(ConnectorEvent::Ready { token: "t1".into() })
        .await;

    let (_, body) = post(
        &base,
        "/api/session/check-session",
        serde_json::json!({"token": "t1"}),
    )
    .await;
    assert_eq!(body["isLoggedIn"], true);
}

#[tokio::test]
async fn unknown_token_is_not_initialized() {
    let (base, _sessions) = spawn_app().await;
    let (status, body) = post(
        &base,
        "/api/session/check-session",
        serde_json::json!({"token": "ghost"}),
    )
    .await;
    assert_eq!(status, 404);
    assert!(body["message"].as_str().unwrap().contains("not initialized"));
}

#[tokio::test]
async fn qr_lifecycle_over_http() {
    let (base, sessions) = spawn_app().await;
    post(
        &base,
        "/api/session/initialize",
        serde_json::json!({"token": "t1"}),
    )
    .await;

    // No QR issued yet.
    let (status, _) = post(
        &base,
        "/api/session/generate-qr",
        serde_json::json!({"token": "t1"}),
    )
    .await;
    assert_eq!(status, 404);

    sessions
        .apply_event(ConnectorEvent::Qr {
            token: "t1".into(),
            payload: "1@QRDATA".into(),
        })
        .await;

    let (status, body) = post(
        &base,
        "/api/session/generate-qr",
        serde_json::json!({"token": "t1"}),
    )
    .await;
    assert_eq!(status, 200);
    assert!(
        body["qrCode"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,")
    );
}

#[tokio::test]
async fn passthroughs_are_guarded_then_delegate() {
    let (base, sessions) = spawn_app().await;
    post(
        &base,
        "/api/session/initialize",
        serde_json::json!({"token": "t1"}),
    )
    .await;

    let (status, _) = post(
        &base,
        "/api/session/send-message",
        serde_json::json!({"token": "t1", "number": "5215512345678", "message": "hola"}),
    )
    .await;
    assert_eq!(status, 400);

    sessions
        .apply_event(ConnectorEvent::Ready { token: "t1".into() })
        .await;

    let (status, body) = post(
        &base,
        "/api/session/send-message",
        serde_json::json!({"token": "t1", "number": "5215512345678", "message": "hola"}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "message sent");

    let (status, body) = post(
        &base,
        "/api/session/get-chats",
        serde_json::json!({"token": "t1"}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body[0]["id"], "5215512345678@c.us");

    let (status, body) = post(
        &base,
        "/api/session/get-state",
        serde_json::json!({"token": "t1"}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["state"], "CONNECTED");
}

#[tokio::test]
async fn bulk_shutdown_requires_the_secret() {
    let (base, sessions) = spawn_app().await;
    post(
        &base,
        "/api/session/initialize",
        serde_json::json!({"token": "t1"}),
    )
    .await;

    let (status, _) = post(
        &base,
        "/api/admin/shutdown-all",
        serde_json::json!({"token": "wrong"}),
    )
    .await;
    assert_eq!(status, 403);
    assert_eq!(sessions.session_count().await, 1);

    let (status, body) = post(
        &base,
        "/api/admin/shutdown-all",
        serde_json::json!({"token": "s3cret"}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["closed"], 1);
    assert_eq!(sessions.session_count().await, 0);
}

#[tokio::test]
async fn assistant_session_round_trip() {
    let (base, _sessions) = spawn_app().await;

    let (status, body) = post(
        &base,
        "/api/assistant/init",
        serde_json::json!({"token": "ext1"}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "session initialized");

    let (status, body) = post(
        &base,
        "/api/assistant/init",
        serde_json::json!({"token": "ext1"}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "session already initialized");

    let (status, body) = post(
        &base,
        "/api/assistant/close-session",
        serde_json::json!({"token": "ext1"}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "session closed");

    let (status, _) = post(
        &base,
        "/api/assistant/close-session",
        serde_json::json!({"token": "ext1"}),
    )
    .await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn assistant_chat_requires_a_session() {
    let (base, _sessions) = spawn_app().await;
    let (status, _) = post(
        &base,
        "/api/assistant/chat",
        serde_json::json!({"token": "ghost", "message": "hola"}),
    )
    .await;
    assert_eq!(status, 404);
}
