use std::time::{Duration, Instant};

use headless_chrome::{Element, Tab};
use tracing::trace;

use crate::retry::RetryOutcome;

/// Readiness an element must reach before a lookup resolves. The list states
/// make the presence-versus-visibility choice explicit per call site instead
/// of leaving it to whichever wait helper happens to be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedState {
    /// Attached to the document.
    Present,
    /// Attached and laid out, so a click can be delivered.
    Clickable,
    /// At least one match, every match attached.
    PresentAll,
    /// At least one match, every match attached and laid out.
    VisibleAll,
}

/// A logical element lookup: selector plus the state it must reach.
/// Constructed fresh per call site and discarded after use.
#[derive(Debug, Clone)]
pub struct ElementQuery {
    pub selector: String,
    pub expected_state: ExpectedState,
}

impl ElementQuery {
    pub fn present(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            expected_state: ExpectedState::Present,
        }
    }

    pub fn clickable(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            expected_state: ExpectedState::Clickable,
        }
    }

    pub fn all(selector: impl Into<String>, expected_state: ExpectedState) -> Self {
        Self {
            selector: selector.into(),
            expected_state,
        }
    }
}

/// Live handle(s) a lookup resolved to.
pub enum Located<'a> {
    One(Element<'a>),
    Many(Vec<Element<'a>>),
}

impl<'a> Located<'a> {
    pub fn into_one(self) -> Option<Element<'a>> {
        match self {
            Located::One(element) => Some(element),
            Located::Many(_) => None,
        }
    }

    pub fn into_many(self) -> Vec<Element<'a>> {
        match self {
            Located::One(element) => vec![element],
            Located::Many(elements) => elements,
        }
    }
}

/// Polls the live document until a query's expected state holds or the
/// timeout elapses. Absence inside the window is always "not yet rendered",
/// never a terminal verdict: the page renders asynchronously and an element
/// missing on one poll may be attached on the next.
#[derive(Debug, Clone)]
pub struct Locator {
    poll_interval: Duration,
}

impl Locator {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub async fn locate<'a>(
        &self,
        tab: &'a Tab,
        query: &ElementQuery,
        timeout: Duration,
    ) -> RetryOutcome<Located<'a>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(found) = self.probe(tab, query) {
                return RetryOutcome::Success(found);
            }
            let now = Instant::now();
            if now >= deadline {
                trace!(selector = %query.selector, "lookup timed out");
                return RetryOutcome::ExhaustedRetries;
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    fn probe<'a>(&self, tab: &'a Tab, query: &ElementQuery) -> Option<Located<'a>> {
        match query.expected_state {
            ExpectedState::Present => tab
                .find_element(&query.selector)
                .ok()
                .map(Located::One),
            ExpectedState::Clickable => tab
                .find_element(&query.selector)
                .ok()
                .filter(is_laid_out)
                .map(Located::One),
            ExpectedState::PresentAll => tab
                .find_elements(&query.selector)
                .ok()
                .filter(|elements| !elements.is_empty())
                .map(Located::Many),
            ExpectedState::VisibleAll => tab
                .find_elements(&query.selector)
                .ok()
                .filter(|elements| !elements.is_empty() && elements.iter().all(is_laid_out))
                .map(Located::Many),
        }
    }
}

// A detached or display:none node has no box model.
fn is_laid_out(element: &Element<'_>) -> bool {
    element.get_box_model().is_ok()
}
