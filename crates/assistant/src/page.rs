//! Browser page surface for the assistant UI.
//!
//! [`AssistantPage`] is the seam between the polling extractor and the real
//! browser, so the driver can be exercised against scripted page states.
//! The production implementation drives a Chromium instance via CDP.

use std::{path::PathBuf, time::Duration};

use {
    async_trait::async_trait,
    chromiumoxide::{Browser, BrowserConfig, Page},
    futures::StreamExt,
    serde::Deserialize,
    tokio::sync::Mutex,
    tracing::{debug, warn},
    uuid::Uuid,
};

use {
    charla_common::{Error, Result},
    charla_config::AssistantConfig,
};

/// Message-input control of the assistant UI.
const INPUT_SELECTOR: &str = "textarea";
/// The caller's own submitted message.
const ECHO_SELECTOR: &str = r#"[data-message-author-role="user"]"#;
/// How long one `input_ready` probe keeps looking for the input control.
const INPUT_WAIT: Duration = Duration::from_secs(10);
/// Spacing between element probes.
const PROBE_INTERVAL: Duration = Duration::from_millis(500);

/// Identity and text of the newest assistant-authored message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReplySnapshot {
    pub id: String,
    pub text: String,
}

/// One open assistant page.
#[async_trait]
pub trait AssistantPage: Send + Sync {
    /// Reload the page between init attempts.
    async fn reload(&self) -> Result<()>;

    /// Probe for the message-input control, waiting a bounded time.
    async fn input_ready(&self) -> bool;

    /// Type the prompt into the input and submit it.
    async fn submit_prompt(&self, text: &str) -> Result<()>;

    /// Wait until the submitted prompt appears as the user's own message.
    async fn wait_for_echo(&self, timeout: Duration) -> Result<()>;

    /// Snapshot of the last assistant-authored message, if any.
    async fn last_reply(&self) -> Result<Option<ReplySnapshot>>;

    /// Tear the page and its browser down.
    async fn close(&self) -> Result<()>;
}

/// Opens fresh assistant pages.
#[async_trait]
pub trait PageFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn AssistantPage>>;
}

/// Chromium-backed factory; each page gets its own browser process and
/// profile directory.
pub struct ChromiumPageFactory {
    config: AssistantConfig,
}

impl ChromiumPageFactory {
    pub fn new(config: AssistantConfig) -> Self {
        Self { config }
    }

    fn browser_executable(&self) -> Result<PathBuf> {
        if let Some(path) = &self.config.browser_path {
            return Ok(path.clone());
        }
        ["chromium", "chromium-browser", "google-chrome", "chrome"]
            .iter()
            .find_map(|name| which::which(name).ok())
            .ok_or_else(|| {
                Error::InitializationFailed("no chromium-compatible browser found".into())
            })
    }
}

#[async_trait]
impl PageFactory for ChromiumPageFactory {
    async fn open(&self) -> Result<Box<dyn AssistantPage>> {
        let target = url::Url::parse(&self.config.url)
            .map_err(|e| Error::InitializationFailed(format!("assistant url: {e}")))?;
        let executable = self.browser_executable()?;
        let profile_dir = std::env::temp_dir()
            .join("charla-assistant")
            .join(Uuid::new_v4().to_string());

        let browser_config = BrowserConfig::builder()
            .chrome_executable(executable)
            .user_data_dir(&profile_dir)
            .build()
            .map_err(Error::InitializationFailed)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| Error::InitializationFailed(format!("browser launch: {e}")))?;

        // The CDP handler stream must be polled for the connection to make
        // progress; it ends when the browser goes away.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser handler event error");
                }
            }
        });

        let page = browser
            .new_page(target.as_str())
            .await
            .map_err(|e| Error::InitializationFailed(format!("page open: {e}")))?;

        Ok(Box::new(ChromiumPage {
            browser: Mutex::new(browser),
            page,
        }))
    }
}

/// A page in a dedicated Chromium instance.
pub struct ChromiumPage {
    browser: Mutex<Browser>,
    page: Page,
}

const LAST_REPLY_JS: &str = r#"
(() => {
    const replies = document.querySelectorAll('[data-message-author-role="assistant"]');
    const last = replies[replies.length - 1];
    if (!last) return null;
    const content = last.querySelector('.markdown.prose.w-full.break-words');
    return {
        id: last.getAttribute('data-message-id') || '',
        text: content ? content.innerText : '',
    };
})()
"#;

#[async_trait]
impl AssistantPage for ChromiumPage {
    async fn reload(&self) -> Result<()> {
        self.page
            .reload()
            .await
            .map_err(|e| Error::UpstreamError(format!("page reload: {e}")))?;
        Ok(())
    }

    async fn input_ready(&self) -> bool {
        let deadline = tokio::time::Instant::now() + INPUT_WAIT;
        loop {
            if self.page.find_element(INPUT_SELECTOR).await.is_ok() {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(PROBE_INTERVAL).await;
        }
    }

    async fn submit_prompt(&self, text: &str) -> Result<()> {
        let input = self
            .page
            .find_element(INPUT_SELECTOR)
            .await
            .map_err(|e| Error::UpstreamError(format!("input lookup: {e}")))?;
        input
            .click()
            .await
            .map_err(|e| Error::UpstreamError(format!("input focus: {e}")))?;
        input
            .type_str(text)
            .await
            .map_err(|e| Error::UpstreamError(format!("typing prompt: {e}")))?;
        input
            .press_key("Enter")
            .await
            .map_err(|e| Error::UpstreamError(format!("submitting prompt: {e}")))?;
        Ok(())
    }

    async fn wait_for_echo(&self, timeout: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.page.find_element(ECHO_SELECTOR).await.is_ok() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(Error::UpstreamError(
                    "submitted prompt never appeared in the conversation".into(),
                ));
            }
            tokio::time::sleep(PROBE_INTERVAL).await;
        }
    }

    async fn last_reply(&self) -> Result<Option<ReplySnapshot>> {
        let evaluated = self
            .page
            .evaluate(LAST_REPLY_JS)
            .await
            .map_err(|e| Error::UpstreamError(format!("reply extraction: {e}")))?;
        evaluated
            .into_value::<Option<ReplySnapshot>>()
            .map_err(|e| Error::UpstreamError(format!("reply shape: {e}")))
    }

    async fn close(&self) -> Result<()> {
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            warn!(error = %e, "browser close failed");
        }
        browser
            .wait()
            .await
            .map_err(|e| Error::UpstreamError(format!("browser shutdown: {e}")))?;
        Ok(())
    }
}
