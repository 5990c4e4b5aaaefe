//! Chat identifiers and inbound message shape.

use serde::{Deserialize, Serialize};

/// Suffix for direct-contact chat identifiers.
const CONTACT_SUFFIX: &str = "@c.us";
/// Suffix for group chat identifiers.
const GROUP_SUFFIX: &str = "@g.us";

/// Build a contact chat id from a bare phone number.
///
/// Numbers that already carry a suffix are returned unchanged.
pub fn contact_jid(number: &str) -> String {
    if number.contains('@') {
        number.to_string()
    } else {
        format!("{number}{CONTACT_SUFFIX}")
    }
}

/// Build a group chat id from a bare group identifier.
pub fn group_jid(id: &str) -> String {
    if id.contains('@') {
        id.to_string()
    } else {
        format!("{id}{GROUP_SUFFIX}")
    }
}

/// Whether a chat id refers to a group conversation.
pub fn is_group_jid(jid: &str) -> bool {
    jid.ends_with(GROUP_SUFFIX)
}

/// An inbound message delivered by the underlying messaging connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Message id assigned by the underlying client.
    pub id: String,
    /// Chat the message arrived in (reply target).
    pub chat_id: String,
    /// Sender chat id.
    pub sender: String,
    /// Text body; empty for pure media messages.
    pub body: String,
    /// Whether the originating chat is a group conversation.
    pub is_group: bool,
    /// Media type when the message carries non-text media.
    #[serde(default)]
    pub media_type: Option<String>,
}

impl InboundMessage {
    /// Whether the message carries non-text media.
    pub fn has_media(&self) -> bool {
        self.media_type.is_some()
    }
}
