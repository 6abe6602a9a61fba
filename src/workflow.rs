use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::actions::ActionExecutor;
use crate::catalog::{CartAction, CatalogScanner, MatchCriteria, MatchOutcome};
use crate::config::AppConfig;
use crate::export::{sanitize_term, ProductExporter};
use crate::locator::{ElementQuery, ExpectedState, Locator};
use crate::retry::RetryPolicy;
use crate::session::BrowserSession;
use crate::utils::error::{AutomationError, Result};

#[derive(Debug, Clone, Serialize)]
pub struct TermOutcome {
    pub term: String,
    pub rows_exported: usize,
    pub screenshot_taken: bool,
    pub error: Option<String>,
}

impl TermOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    fn failed(term: &str, err: &AutomationError) -> Self {
        Self {
            term: term.to_string(),
            rows_exported: 0,
            screenshot_taken: false,
            error: Some(err.to_string()),
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct BatchReport {
    pub outcomes: Vec<TermOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Drives the ordered pipeline for each search term: search, settle,
/// screenshot, scan, export. Every term runs inside its own failure boundary;
/// a term that blows up is logged into the report and the batch moves on.
pub struct SessionWorkflow {
    session: BrowserSession,
    locator: Locator,
    executor: ActionExecutor,
    scanner: CatalogScanner,
    exporter: ProductExporter,
    policy: RetryPolicy,
    config: AppConfig,
}

impl SessionWorkflow {
    pub fn new(session: BrowserSession, config: AppConfig) -> Result<Self> {
        let locator = Locator::new(Duration::from_millis(config.retry.poll_interval_ms));
        let policy = RetryPolicy::new(
            config.retry.max_attempts,
            Duration::from_millis(config.retry.delay_ms),
        );
        let executor = ActionExecutor::new(
            locator.clone(),
            Duration::from_millis(config.retry.locate_timeout_ms),
        );
        let entry_state = if config.workflow.require_visible_entries {
            ExpectedState::VisibleAll
        } else {
            ExpectedState::PresentAll
        };
        let scanner = CatalogScanner::new(
            config.store.selectors.clone(),
            executor.clone(),
            policy,
            entry_state,
            config.workflow.max_cart_quantity,
        )?;
        let exporter = ProductExporter::new(config.export.output_dir.clone());
        Ok(Self {
            session,
            locator,
            executor,
            scanner,
            exporter,
            policy,
            config,
        })
    }

    /// Navigate to the storefront and clear the entry gates: cookie banner,
    /// postal code, and the conditional account prompt.
    pub async fn open_store(&self) -> Result<()> {
        let store = &self.config.store;
        self.session.navigate(&store.base_url)?;
        info!(url = %store.base_url, "storefront opened");

        let cookie_query = ElementQuery::clickable(store.selectors.cookie_reject.clone());
        if self
            .executor
            .click_with_retry(self.session.tab(), &cookie_query, &self.policy)
            .await
        {
            info!("cookie banner rejected");
        } else {
            // Some regions render no banner at all; the gate continues.
            warn!("cookie banner not dismissed after retries");
        }

        self.executor
            .type_and_submit(
                self.session.tab(),
                &ElementQuery::present(store.selectors.postal_input.clone()),
                &store.postal_code,
                &ElementQuery::clickable(store.selectors.postal_submit.clone()),
            )
            .await?;
        info!(postal_code = %store.postal_code, "postal code submitted");

        if self
            .executor
            .dismiss_optional_prompt(
                self.session.tab(),
                &ElementQuery::clickable(store.selectors.account_prompt_dismiss.clone()),
                self.locate_timeout(),
            )
            .await?
        {
            info!("account prompt dismissed");
        }
        Ok(())
    }

    /// Process every term in order. A failing term is recorded and never
    /// stops the terms after it.
    pub async fn run_batch(&self, terms: &[String]) -> BatchReport {
        let mut report = BatchReport::default();
        for term in terms {
            tokio::time::sleep(Duration::from_millis(
                self.config.workflow.inter_term_delay_ms,
            ))
            .await;
            match self.scrape_term(term).await {
                Ok(outcome) => {
                    info!(term = %term, rows = outcome.rows_exported, "term completed");
                    report.outcomes.push(outcome);
                }
                Err(err) => {
                    error!(term = %term, error = %err, "term failed; continuing with next");
                    report.outcomes.push(TermOutcome::failed(term, &err));
                }
            }
        }
        report
    }

    /// One term's pipeline: search, settle, screenshot, scan, export.
    async fn scrape_term(&self, term: &str) -> Result<TermOutcome> {
        let stem = sanitize_term(term);
        self.search(term).await?;
        tokio::time::sleep(Duration::from_millis(self.config.workflow.settle_delay_ms)).await;

        let screenshot_taken = if self.config.workflow.screenshots {
            self.capture_results(&stem).await
        } else {
            false
        };

        let entries = match self.scanner.collect_all(self.session.tab()).await {
            Ok(entries) => entries,
            Err(AutomationError::ExhaustedRetries { .. }) => {
                // Nothing rendered for this term. An empty catalog is a
                // result: the export still happens, header only.
                warn!(term, "no product cells rendered; exporting empty catalog");
                Vec::new()
            }
            Err(err) => return Err(err),
        };

        let path = self.exporter.write_catalog(&stem, &entries)?;
        debug!(path = %path.display(), "catalog written");
        Ok(TermOutcome {
            term: term.to_string(),
            rows_exported: entries.len(),
            screenshot_taken,
            error: None,
        })
    }

    /// Search for a matching product and apply a cart action to the first
    /// entry that matches the criteria.
    pub async fn cart_action(
        &self,
        term: &str,
        criteria: &MatchCriteria,
        action: CartAction,
    ) -> Result<MatchOutcome> {
        self.search(term).await?;
        tokio::time::sleep(Duration::from_millis(self.config.workflow.settle_delay_ms)).await;

        let outcome = self
            .scanner
            .find_and_act(self.session.tab(), criteria, action)
            .await?;
        match outcome {
            MatchOutcome::Acted { clicks } => {
                info!(term, clicks, "cart action applied");
            }
            MatchOutcome::NoMatch => {
                warn!(term, name = %criteria.name, label = %criteria.label, "no product entry matched");
            }
        }

        // The first addition in a fresh session can trigger the account
        // prompt; clear it so later pipeline steps see an unobstructed page.
        if matches!(action, CartAction::Add(_)) && matches!(outcome, MatchOutcome::Acted { .. }) {
            self.executor
                .dismiss_optional_prompt(
                    self.session.tab(),
                    &ElementQuery::clickable(
                        self.config.store.selectors.account_prompt_dismiss.clone(),
                    ),
                    self.locate_timeout(),
                )
                .await?;
        }
        Ok(outcome)
    }

    async fn search(&self, term: &str) -> Result<()> {
        let store = &self.config.store;
        self.executor
            .type_and_submit(
                self.session.tab(),
                &ElementQuery::present(store.selectors.search_input.clone()),
                term,
                &ElementQuery::clickable(store.selectors.search_button.clone()),
            )
            .await?;
        info!(term, "search submitted");
        Ok(())
    }

    /// Best-effort screenshot of the results; waits for the first product
    /// cell so an empty page is captured as such, and never fails the term.
    async fn capture_results(&self, stem: &str) -> bool {
        let query = ElementQuery::present(self.config.store.selectors.product_cell.clone());
        if !self
            .locator
            .locate(self.session.tab(), &query, self.locate_timeout())
            .await
            .is_success()
        {
            warn!(stem, "no results rendered before screenshot");
            return false;
        }

        let path = match self.exporter.screenshot_path(stem) {
            Ok(path) => path,
            Err(err) => {
                warn!(stem, error = %err, "could not prepare screenshot path");
                return false;
            }
        };
        match self.session.screenshot_to(&path) {
            Ok(()) => {
                info!(path = %path.display(), "screenshot saved");
                true
            }
            Err(err) => {
                warn!(stem, error = %err, "screenshot failed");
                false
            }
        }
    }

    fn locate_timeout(&self) -> Duration {
        Duration::from_millis(self.config.retry.locate_timeout_ms)
    }
}
