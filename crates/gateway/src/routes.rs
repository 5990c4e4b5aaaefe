//! API routes: session operations, assistant automation, administration.

use {
    axum::{Json, Router, extract::State, routing::post},
    serde::Deserialize,
    serde_json::{Value, json},
};

use {
    charla_common::contact_jid,
    charla_connector::{ClientOp, OpOutput},
};

use crate::{error::ApiResult, server::AppState};

#[derive(Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub token: String,
    pub number: String,
    pub message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMediaRequest {
    pub token: String,
    pub number: String,
    pub media_url: String,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub token: String,
    pub chat_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessagesRequest {
    pub token: String,
    pub chat_id: String,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Deserialize)]
pub struct ContactRequest {
    pub token: String,
    pub number: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSubjectRequest {
    pub token: String,
    pub group_id: String,
    pub subject: String,
}

#[derive(Deserialize)]
pub struct AssistantChatRequest {
    pub token: String,
    pub message: String,
}

/// Default history window for `get-chat-messages`.
const DEFAULT_MESSAGE_LIMIT: u32 = 50;

async fn initialize(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> ApiResult<Json<Value>> {
    let outcome = state.sessions.initialize(&req.token).await?;
    Ok(Json(json!({
        "message": outcome.message,
        "isLoggedIn": outcome.logged_in,
    })))
}

async fn generate_qr(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> ApiResult<Json<Value>> {
    let qr = state.sessions.generate_qr(&req.token).await?;
    Ok(Json(json!({ "qrCode": qr })))
}

async fn check_session(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> ApiResult<Json<Value>> {
    let logged_in = state.sessions.check_session(&req.token).await?;
    Ok(Json(json!({ "isLoggedIn": logged_in })))
}

async fn logout(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> ApiResult<Json<Value>> {
    state.sessions.logout(&req.token).await?;
    Ok(Json(json!({ "message": "logged out" })))
}

async fn send_message(
    State(state): State<AppState>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<Json<Value>> {
    state
        .sessions
        .execute(&req.token, ClientOp::SendText {
            to: contact_jid(&req.number),
            body: req.message,
        })
        .await?;
    Ok(Json(json!({ "message": "message sent" })))
}

async fn send_media(
    State(state): State<AppState>,
    Json(req): Json<SendMediaRequest>,
) -> ApiResult<Json<Value>> {
    state
        .sessions
        .execute(&req.token, ClientOp::SendMedia {
            to: contact_jid(&req.number),
            media_url: req.media_url,
            caption: req.caption,
        })
        .await?;
    Ok(Json(json!({ "message": "media sent" })))
}

async fn get_chats(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> ApiResult<Json<OpOutput>> {
    Ok(Json(
        state.sessions.execute(&req.token, ClientOp::GetChats).await?,
    ))
}

async fn get_contacts(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> ApiResult<Json<OpOutput>> {
    Ok(Json(
        state
            .sessions
            .execute(&req.token, ClientOp::GetContacts)
            .await?,
    ))
}

async fn get_chat_by_id(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<Json<OpOutput>> {
    Ok(Json(
        state
            .sessions
            .execute(&req.token, ClientOp::GetChatById {
                chat_id: req.chat_id,
            })
            .await?,
    ))
}

async fn get_chat_messages(
    State(state): State<AppState>,
    Json(req): Json<ChatMessagesRequest>,
) -> ApiResult<Json<OpOutput>> {
    Ok(Json(
        state
            .sessions
            .execute(&req.token, ClientOp::FetchMessages {
                chat_id: req.chat_id,
                limit: req.limit.unwrap_or(DEFAULT_MESSAGE_LIMIT),
            })
            .await?,
    ))
}

async fn get_profile_pic_url(
    State(state): State<AppState>,
    Json(req): Json<ContactRequest>,
) -> ApiResult<Json<OpOutput>> {
    Ok(Json(
        state
            .sessions
            .execute(&req.token, ClientOp::GetProfilePic {
                contact_id: contact_jid(&req.number),
            })
            .await?,
    ))
}

async fn get_state(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> ApiResult<Json<OpOutput>> {
    Ok(Json(
        state.sessions.execute(&req.token, ClientOp::GetState).await?,
    ))
}

async fn block_contact(
    State(state): State<AppState>,
    Json(req): Json<ContactRequest>,
) -> ApiResult<Json<Value>> {
    state
        .sessions
        .execute(&req.token, ClientOp::BlockContact {
            contact_id: contact_jid(&req.number),
        })
        .await?;
    Ok(Json(json!({ "message": "contact blocked" })))
}

async fn archive_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<Json<Value>> {
    state
        .sessions
        .execute(&req.token, ClientOp::ArchiveChat {
            chat_id: req.chat_id,
        })
        .await?;
    Ok(Json(json!({ "message": "chat archived" })))
}

async fn set_group_subject(
    State(state): State<AppState>,
    Json(req): Json<GroupSubjectRequest>,
) -> ApiResult<Json<Value>> {
    state
        .sessions
        .execute(&req.token, ClientOp::SetGroupSubject {
            group_id: req.group_id,
            subject: req.subject,
        })
        .await?;
    Ok(Json(json!({ "message": "group subject updated" })))
}

async fn assistant_init(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> ApiResult<Json<Value>> {
    use charla_assistant::AssistantInit;
    let message = match state.assistant.init(&req.token).await? {
        AssistantInit::Created => "session initialized",
        AssistantInit::Existing => "session already initialized",
    };
    Ok(Json(json!({ "message": message })))
}

async fn assistant_chat(
    State(state): State<AppState>,
    Json(req): Json<AssistantChatRequest>,
) -> ApiResult<Json<Value>> {
    let response = state
        .assistant
        .send_and_receive(&req.token, &req.message)
        .await?;
    Ok(Json(json!({ "response": response })))
}

async fn assistant_close(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> ApiResult<Json<Value>> {
    state.assistant.close(&req.token).await?;
    Ok(Json(json!({ "message": "session closed" })))
}

async fn assistant_close_all(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let closed = state.assistant.close_all().await;
    Ok(Json(json!({
        "message": "all sessions closed",
        "closed": closed,
    })))
}

async fn shutdown_all(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> ApiResult<Json<Value>> {
    let report = state.sessions.shutdown_all(&req.token).await?;
    Ok(Json(json!({
        "message": "all sessions destroyed",
        "closed": report.closed,
        "errors": report.errors,
    })))
}

/// Session lifecycle plus the delegated pass-through operations.
pub fn session_router() -> Router<AppState> {
    Router::new()
        .route("/initialize", post(initialize))
        .route("/generate-qr", post(generate_qr))
        .route("/check-session", post(check_session))
        .route("/logout", post(logout))
        .route("/send-message", post(send_message))
        .route("/send-media", post(send_media))
        .route("/get-chats", post(get_chats))
        .route("/get-contacts", post(get_contacts))
        .route("/get-chat-by-id", post(get_chat_by_id))
        .route("/get-chat-messages", post(get_chat_messages))
        .route("/get-profile-pic-url", post(get_profile_pic_url))
        .route("/get-state", post(get_state))
        .route("/block-contact", post(block_contact))
        .route("/archive-chat", post(archive_chat))
        .route("/set-group-subject", post(set_group_subject))
}

/// Chat-assistant automation routes.
pub fn assistant_router() -> Router<AppState> {
    Router::new()
        .route("/init", post(assistant_init))
        .route("/chat", post(assistant_chat))
        .route("/close-session", post(assistant_close))
        .route("/close-all-sessions", post(assistant_close_all))
}

/// Administrative routes.
pub fn admin_router() -> Router<AppState> {
    Router::new().route("/shutdown-all", post(shutdown_all))
}
