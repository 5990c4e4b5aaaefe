//! Automatic replies for inbound messages.
//!
//! Every inbound message of a logged-in session flows through
//! [`AutoReplyRouter`]: group and media messages are dropped, prefixed
//! messages go to the chat assistant, everything else is checked against the
//! keyword-matching collaborator.

pub mod keyword;
pub mod router;

pub use {
    keyword::{HttpKeywordMatcher, KeywordMatch, KeywordMatcher},
    router::{AssistantRelay, AutoReplyRouter, ReplySender},
};
