//! Browser automation of a web chat assistant.
//!
//! One isolated browser session per external token. The assistant's UI has
//! no completion signal, so responses are extracted by bounded polling with
//! content-identity comparison (see [`driver::AssistantDriver`]).

pub mod driver;
pub mod page;

pub use {
    driver::{AssistantDriver, AssistantInit, spawn_idle_sweeper},
    page::{AssistantPage, ChromiumPageFactory, PageFactory, ReplySnapshot},
};
