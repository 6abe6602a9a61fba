use std::time::{Duration, Instant};

use headless_chrome::{Element, Tab};
use tracing::{debug, info};

use crate::locator::{ElementQuery, Locator};
use crate::retry::{RetryOutcome, RetryPolicy};
use crate::utils::error::{self, AutomationError, Result};

/// Performs one user-intent action at a time: locate, scroll into view where
/// needed, re-confirm actionability immediately before acting, then click or
/// type. A handle located a moment ago is never assumed to still be
/// actionable.
#[derive(Clone)]
pub struct ActionExecutor {
    locator: Locator,
    locate_timeout: Duration,
}

impl ActionExecutor {
    pub fn new(locator: Locator, locate_timeout: Duration) -> Self {
        Self {
            locator,
            locate_timeout,
        }
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn locate_timeout(&self) -> Duration {
        self.locate_timeout
    }

    /// True iff a click was delivered before exhausting attempts. Every
    /// attempt performs a fresh lookup; a handle from a failed attempt is
    /// never reused.
    pub async fn click_with_retry(
        &self,
        tab: &Tab,
        query: &ElementQuery,
        policy: &RetryPolicy,
    ) -> bool {
        let outcome = policy
            .retry("click", || async move {
                let element = self.locate_one(tab, query).await?;
                self.deliver_click(&element, &query.selector).await
            })
            .await;
        outcome.is_success()
    }

    /// Clear the input, type `text`, then click a separately located submit
    /// control. One user action, two element operations that fail
    /// independently; the caller owns any retry policy around the pair.
    pub async fn type_and_submit(
        &self,
        tab: &Tab,
        input: &ElementQuery,
        text: &str,
        submit: &ElementQuery,
    ) -> Result<()> {
        let field = self.locate_one(tab, input).await?;
        // Field state must not accumulate input from a previous attempt.
        field
            .call_js_fn("function() { this.value = ''; }", Vec::new(), false)
            .map_err(|e| error::from_browser("clear input", e))?;
        field
            .type_into(text)
            .map_err(|e| error::from_browser("type into input", e))?;
        debug!(selector = %input.selector, "text entered");

        let button = self.locate_one(tab, submit).await?;
        self.deliver_click(&button, &submit.selector).await?;
        Ok(())
    }

    /// Click a prompt that only sometimes renders. Absence within the timeout
    /// is success, not an error. Returns whether the prompt was dismissed.
    pub async fn dismiss_optional_prompt(
        &self,
        tab: &Tab,
        query: &ElementQuery,
        timeout: Duration,
    ) -> Result<bool> {
        match self.locator.locate(tab, query, timeout).await {
            RetryOutcome::Success(located) => {
                let element = located.into_one().ok_or_else(|| {
                    AutomationError::Browser(format!(
                        "prompt selector '{}' resolved to a list",
                        query.selector
                    ))
                })?;
                self.deliver_click(&element, &query.selector).await?;
                info!(selector = %query.selector, "optional prompt dismissed");
                Ok(true)
            }
            RetryOutcome::ExhaustedRetries => {
                debug!(selector = %query.selector, "optional prompt did not appear");
                Ok(false)
            }
        }
    }

    /// Scroll into view, wait until the element is actionable, then click.
    pub(crate) async fn deliver_click(&self, element: &Element<'_>, context: &str) -> Result<()> {
        element
            .scroll_into_view()
            .map_err(|e| error::from_browser(context, e))?;
        self.wait_actionable(element, context).await?;
        element.click().map_err(|e| error::from_browser(context, e))?;
        debug!(context, "click delivered");
        Ok(())
    }

    async fn wait_actionable(&self, element: &Element<'_>, context: &str) -> Result<()> {
        let deadline = Instant::now() + self.locate_timeout;
        loop {
            if element.get_box_model().is_ok() {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(AutomationError::NotActionable(context.to_string()));
            }
            tokio::time::sleep(self.locator.poll_interval().min(deadline - now)).await;
        }
    }

    async fn locate_one<'a>(&self, tab: &'a Tab, query: &ElementQuery) -> Result<Element<'a>> {
        match self.locator.locate(tab, query, self.locate_timeout).await {
            RetryOutcome::Success(located) => located.into_one().ok_or_else(|| {
                AutomationError::Browser(format!(
                    "selector '{}' resolved to a list",
                    query.selector
                ))
            }),
            RetryOutcome::ExhaustedRetries => Err(AutomationError::TransientNotFound {
                selector: query.selector.clone(),
            }),
        }
    }
}
