//! Wire types for communication with the messaging sidecar.

use {
    serde::{Deserialize, Serialize},
    serde_json::Value,
};

use charla_common::{Error, InboundMessage, Result};

/// Commands sent to the sidecar.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConnectorCommand {
    Login {
        token: String,
        #[serde(rename = "authDir", skip_serializing_if = "Option::is_none")]
        auth_dir: Option<String>,
    },
    Logout {
        token: String,
        #[serde(rename = "requestId")]
        request_id: String,
    },
    Close {
        token: String,
    },
    Invoke {
        token: String,
        #[serde(rename = "requestId")]
        request_id: String,
        #[serde(flatten)]
        op: ClientOp,
    },
}

/// Delegated client operations, one variant per pass-through.
///
/// Each operation declares its output shape via [`ClientOp::parse_output`];
/// sidecar payloads that do not match are rejected rather than forwarded
/// untyped.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ClientOp {
    SendText {
        to: String,
        body: String,
    },
    SendMedia {
        to: String,
        #[serde(rename = "mediaUrl")]
        media_url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
    GetChats,
    GetContacts,
    GetChatById {
        #[serde(rename = "chatId")]
        chat_id: String,
    },
    FetchMessages {
        #[serde(rename = "chatId")]
        chat_id: String,
        limit: u32,
    },
    GetProfilePic {
        #[serde(rename = "contactId")]
        contact_id: String,
    },
    GetState,
    BlockContact {
        #[serde(rename = "contactId")]
        contact_id: String,
    },
    ArchiveChat {
        #[serde(rename = "chatId")]
        chat_id: String,
    },
    SetGroupSubject {
        #[serde(rename = "groupId")]
        group_id: String,
        subject: String,
    },
}

/// Events received from the sidecar.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConnectorEvent {
    Qr {
        token: String,
        payload: String,
    },
    Ready {
        token: String,
    },
    Authenticated {
        token: String,
    },
    AuthFailure {
        token: String,
        message: String,
    },
    Disconnected {
        token: String,
        reason: String,
    },
    Message {
        token: String,
        #[serde(rename = "messageId")]
        message_id: String,
        #[serde(rename = "chatJid")]
        chat_jid: String,
        #[serde(rename = "senderJid")]
        sender_jid: String,
        body: String,
        #[serde(rename = "isGroup")]
        is_group: bool,
        #[serde(rename = "mediaType", default)]
        media_type: Option<String>,
    },
    CommandResult {
        #[serde(rename = "requestId")]
        request_id: String,
        success: bool,
        #[serde(default)]
        data: Option<Value>,
        #[serde(default)]
        error: Option<String>,
    },
}

impl ConnectorEvent {
    /// Convert a `Message` event into the shared inbound message type.
    pub fn into_inbound(self) -> Option<(String, InboundMessage)> {
        match self {
            Self::Message {
                token,
                message_id,
                chat_jid,
                sender_jid,
                body,
                is_group,
                media_type,
            } => Some((token, InboundMessage {
                id: message_id,
                chat_id: chat_jid,
                sender: sender_jid,
                body,
                is_group,
                media_type,
            })),
            _ => None,
        }
    }
}

/// Chat summary returned by chat-listing operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSummary {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "isGroup", default)]
    pub is_group: bool,
    #[serde(rename = "unreadCount", default)]
    pub unread_count: u32,
}

/// Contact returned by `get_contacts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "isBlocked", default)]
    pub is_blocked: bool,
}

/// Message record returned by `fetch_messages`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub body: String,
    #[serde(rename = "fromMe", default)]
    pub from_me: bool,
    #[serde(default)]
    pub timestamp: f64,
}

/// Typed output of a delegated operation.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OpOutput {
    Ack,
    Chats(Vec<ChatSummary>),
    Contacts(Vec<Contact>),
    Chat(ChatSummary),
    Messages(Vec<MessageRecord>),
    ProfilePic { url: Option<String> },
    State { state: String },
}

fn parse<T: serde::de::DeserializeOwned>(data: Option<Value>, what: &str) -> Result<T> {
    let value = data.ok_or_else(|| Error::UpstreamError(format!("missing {what} payload")))?;
    serde_json::from_value(value)
        .map_err(|e| Error::UpstreamError(format!("malformed {what} payload: {e}")))
}

impl ClientOp {
    /// Parse the sidecar's result payload into this operation's output type.
    pub fn parse_output(&self, data: Option<Value>) -> Result<OpOutput> {
        match self {
            Self::SendText { .. }
            | Self::SendMedia { .. }
            | Self::BlockContact { .. }
            | Self::ArchiveChat { .. }
            | Self::SetGroupSubject { .. } => Ok(OpOutput::Ack),
            Self::GetChats => Ok(OpOutput::Chats(parse(data, "chats")?)),
            Self::GetContacts => Ok(OpOutput::Contacts(parse(data, "contacts")?)),
            Self::GetChatById { .. } => Ok(OpOutput::Chat(parse(data, "chat")?)),
            Self::FetchMessages { .. } => Ok(OpOutput::Messages(parse(data, "messages")?)),
            Self::GetProfilePic { .. } => {
                #[derive(Deserialize)]
                struct Pic {
                    #[serde(default)]
                    url: Option<String>,
                }
                let pic: Pic = parse(data, "profile picture")?;
                Ok(OpOutput::ProfilePic { url: pic.url })
            },
            Self::GetState => {
                #[derive(Deserialize)]
                struct State {
                    state: String,
                }
                let s: State = parse(data, "state")?;
                Ok(OpOutput::State { state: s.state })
            },
        }
    }
}
