use std::sync::OnceLock;
use std::time::Duration;

use headless_chrome::{Element, Tab};
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::actions::ActionExecutor;
use crate::config::SelectorTable;
use crate::locator::{ElementQuery, ExpectedState, Locator};
use crate::retry::{RetryOutcome, RetryPolicy};
use crate::utils::error::{self, AutomationError, Result};

/// Hard ceiling on repeated cart additions, regardless of configuration.
pub const MAX_CART_QUANTITY: u32 = 10;

/// One rendered product record. Rebuilt on every scan; the DOM is the source
/// of truth and no collection survives past the pass that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductEntry {
    pub name: String,
    pub label: String,
    pub format: String,
    pub price: String,
}

/// Criteria selecting exactly one entry among many. Name compares exactly
/// after trimming, label exactly after normalization, and the optional detail
/// as a substring of a secondary per-entry field.
#[derive(Debug, Clone)]
pub struct MatchCriteria {
    pub name: String,
    pub label: String,
    pub detail_substring: Option<String>,
}

impl MatchCriteria {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            label: label.into(),
            detail_substring: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail_substring = Some(detail.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartAction {
    /// Add the matched entry this many times (already clamped by the caller;
    /// clamped again here as an invariant).
    Add(u32),
    /// Remove the matched entry from the cart once.
    Remove,
}

/// Terminal state of an action-oriented scan: either the first matching entry
/// was acted on, or no rendered entry matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Acted { clicks: u32 },
    NoMatch,
}

/// Clamp a requested cart quantity to `[0, bound]`, where `bound` itself
/// never exceeds the hard ceiling. Negative requests attempt nothing.
pub fn clamp_quantity(requested: i64, bound: u32) -> u32 {
    let bound = bound.min(MAX_CART_QUANTITY);
    requested.clamp(0, i64::from(bound)) as u32
}

/// Canonical label token: every character outside `A-Za-z` stripped, case
/// preserved. The storefront renders labels with inconsistent punctuation and
/// spacing around the token itself.
pub fn normalize_label(raw: &str) -> String {
    static FILTER: OnceLock<Regex> = OnceLock::new();
    let filter = FILTER.get_or_init(|| Regex::new("[^A-Za-z]").expect("static regex"));
    filter.replace_all(raw, "").into_owned()
}

// Per-entry field selectors, parsed once at scanner construction.
struct ParsedSelectors {
    name: Selector,
    label: Selector,
    format: Selector,
    price: Selector,
    detail: Selector,
}

impl ParsedSelectors {
    fn new(selectors: &SelectorTable) -> Result<Self> {
        Ok(Self {
            name: parse_selector(&selectors.product_name)?,
            label: parse_selector(&selectors.product_label)?,
            format: parse_selector(&selectors.product_format)?,
            price: parse_selector(&selectors.product_price)?,
            detail: parse_selector(&selectors.product_detail)?,
        })
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| AutomationError::Selector(format!("'{selector}': {e:?}")))
}

fn select_text(fragment: &Html, selector: &Selector) -> Option<String> {
    fragment
        .select(selector)
        .next()
        .map(|element| element.text().collect::<Vec<_>>().join(" ").trim().to_string())
}

/// One scan pass over the currently rendered product cells. Collect mode
/// extracts every entry in order, skipping cells with incomplete fields.
/// Action mode stops at the first entry matching the criteria and clicks the
/// cart controls inside that cell; a wrong match is worse than a missed one,
/// so extraction failures abort the pass instead of being skipped.
pub struct CatalogScanner {
    selectors: SelectorTable,
    parsed: ParsedSelectors,
    locator: Locator,
    executor: ActionExecutor,
    policy: RetryPolicy,
    locate_timeout: Duration,
    entry_state: ExpectedState,
    max_quantity: u32,
}

impl CatalogScanner {
    pub fn new(
        selectors: SelectorTable,
        executor: ActionExecutor,
        policy: RetryPolicy,
        entry_state: ExpectedState,
        max_quantity: u32,
    ) -> Result<Self> {
        let parsed = ParsedSelectors::new(&selectors)?;
        let locator = executor.locator().clone();
        let locate_timeout = executor.locate_timeout();
        Ok(Self {
            selectors,
            parsed,
            locator,
            executor,
            policy,
            locate_timeout,
            entry_state,
            max_quantity: max_quantity.min(MAX_CART_QUANTITY),
        })
    }

    /// Extract every rendered entry as an ordered sequence. Cells whose
    /// required fields cannot be read are logged and skipped; completeness of
    /// the sequence matters more than completeness per entry.
    pub async fn collect_all(&self, tab: &Tab) -> Result<Vec<ProductEntry>> {
        let cells = self.locate_entries(tab).await?;
        info!(count = cells.len(), "product cells located");

        let mut entries = Vec::with_capacity(cells.len());
        for (index, cell) in cells.iter().enumerate() {
            let html = match cell.get_content() {
                Ok(html) => html,
                Err(err) => {
                    warn!(index, error = %err, "skipping unreadable product cell");
                    continue;
                }
            };
            match self.parse_entry(&html) {
                Ok(entry) => {
                    debug!(name = %entry.name, price = %entry.price, "scanned product");
                    entries.push(entry);
                }
                Err(err) => {
                    warn!(index, error = %err, "skipping product cell with incomplete fields");
                }
            }
        }
        Ok(entries)
    }

    /// Scan until the first entry matching `criteria`, act on it, and stop.
    /// Entries after the match are never inspected. A stale cell read forces
    /// one fresh lookup of the whole list; extraction failures abort the pass.
    pub async fn find_and_act(
        &self,
        tab: &Tab,
        criteria: &MatchCriteria,
        action: CartAction,
    ) -> Result<MatchOutcome> {
        let mut cells = self.locate_entries(tab).await?;
        info!(count = cells.len(), "product cells located");

        let mut index = 0;
        let mut refreshed = false;
        while index < cells.len() {
            let html = match cells[index].get_content() {
                Ok(html) => html,
                Err(err) => {
                    let classified = error::from_browser("read product cell", err);
                    if matches!(classified, AutomationError::StaleElement(_)) && !refreshed {
                        // The list re-rendered under us. No action has been
                        // taken yet, so restarting with fresh handles is safe.
                        debug!("product cells went stale; re-locating");
                        cells = self.locate_entries(tab).await?;
                        refreshed = true;
                        index = 0;
                        continue;
                    }
                    return Err(classified);
                }
            };

            if self.evaluate_match(&html, criteria)? {
                info!(index, name = %criteria.name, "matched product entry");
                let clicks = match action {
                    CartAction::Add(quantity) => self.add_times(&cells[index], quantity).await?,
                    CartAction::Remove => self.remove_once(&cells[index]).await?,
                };
                return Ok(MatchOutcome::Acted { clicks });
            }
            index += 1;
        }
        Ok(MatchOutcome::NoMatch)
    }

    /// Parse one cell's HTML into a complete entry. All four fields are
    /// required here; collect mode decides what to do with the failure.
    pub fn parse_entry(&self, cell_html: &str) -> Result<ProductEntry> {
        let fragment = Html::parse_fragment(cell_html);
        let name = select_text(&fragment, &self.parsed.name)
            .ok_or_else(|| AutomationError::Extraction("product name missing".to_string()))?;
        let label_raw = select_text(&fragment, &self.parsed.label)
            .ok_or_else(|| AutomationError::Extraction("product label missing".to_string()))?;
        let format = select_text(&fragment, &self.parsed.format)
            .ok_or_else(|| AutomationError::Extraction("product format missing".to_string()))?;
        let price = select_text(&fragment, &self.parsed.price)
            .ok_or_else(|| AutomationError::Extraction("product price missing".to_string()))?;
        Ok(ProductEntry {
            name,
            label: normalize_label(&label_raw),
            format,
            price,
        })
    }

    /// Strict match evaluation for action mode. Name and label must be
    /// readable; a specified detail whose field is unreachable fails closed
    /// and never matches by default.
    pub fn evaluate_match(&self, cell_html: &str, criteria: &MatchCriteria) -> Result<bool> {
        let fragment = Html::parse_fragment(cell_html);
        let name = select_text(&fragment, &self.parsed.name)
            .ok_or_else(|| AutomationError::Extraction("product name missing".to_string()))?;
        if name != criteria.name {
            return Ok(false);
        }
        let label_raw = select_text(&fragment, &self.parsed.label)
            .ok_or_else(|| AutomationError::Extraction("product label missing".to_string()))?;
        if normalize_label(&label_raw) != criteria.label {
            return Ok(false);
        }
        Ok(match &criteria.detail_substring {
            Some(wanted) if !wanted.is_empty() => select_text(&fragment, &self.parsed.detail)
                .is_some_and(|detail| detail.contains(wanted.as_str())),
            _ => true,
        })
    }

    /// Locate the current set of rendered cells, retry-wrapped. Exhaustion is
    /// reported upward; the caller decides whether an empty catalog is an
    /// error for its pipeline.
    async fn locate_entries<'a>(&self, tab: &'a Tab) -> Result<Vec<Element<'a>>> {
        let query = ElementQuery::all(self.selectors.product_cell.clone(), self.entry_state);
        self.policy
            .retry("locate product cells", || {
                let query = query.clone();
                async move {
                    match self.locator.locate(tab, &query, self.locate_timeout).await {
                        RetryOutcome::Success(located) => Ok(located.into_many()),
                        RetryOutcome::ExhaustedRetries => Err(AutomationError::TransientNotFound {
                            selector: query.selector.clone(),
                        }),
                    }
                }
            })
            .await
            .into_result("locate product cells", self.policy.max_attempts)
    }

    /// First addition goes through the add control, every subsequent one
    /// through the increment control; they are different elements in the
    /// rendered cell. Each click independently scrolls into view and waits
    /// for actionability. A failed iteration aborts the rest; the partial
    /// addition stands.
    async fn add_times(&self, cell: &Element<'_>, quantity: u32) -> Result<u32> {
        let quantity = quantity.min(self.max_quantity);
        let mut delivered = 0;
        for i in 0..quantity {
            let selector = if i == 0 {
                &self.selectors.add_button
            } else {
                &self.selectors.increment_button
            };
            let control = match cell.find_element(selector) {
                Ok(control) => control,
                Err(err) => {
                    warn!(iteration = i + 1, quantity, error = %err, "cart control not found; stopping additions");
                    break;
                }
            };
            if let Err(err) = self.executor.deliver_click(&control, selector).await {
                warn!(iteration = i + 1, quantity, error = %err, "add-to-cart click failed; stopping additions");
                break;
            }
            delivered += 1;
            debug!(delivered, quantity, "added to cart");
        }
        Ok(delivered)
    }

    async fn remove_once(&self, cell: &Element<'_>) -> Result<u32> {
        let control = cell
            .find_element(&self.selectors.remove_button)
            .map_err(|e| error::from_browser("locate remove control", e))?;
        self.executor
            .deliver_click(&control, &self.selectors.remove_button)
            .await?;
        info!("removed from cart");
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("0,26 € /ud.", "ud")]
    #[case("2,10 € /pack", "pack")]
    #[case("  ud  ", "ud")]
    #[case("1,60 €", "")]
    #[case("", "")]
    fn test_normalize_label(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_label(raw), expected);
    }

    #[test]
    fn test_normalize_label_is_idempotent_and_alphabetic() {
        for raw in ["0,26 € /ud.", "pack (6)", "x", "ñ-ud", "..."] {
            let once = normalize_label(raw);
            assert!(once.chars().all(|c| c.is_ascii_alphabetic()));
            assert_eq!(normalize_label(&once), once);
        }
    }

    #[rstest]
    #[case(15, 10)]
    #[case(10, 10)]
    #[case(3, 3)]
    #[case(0, 0)]
    #[case(-4, 0)]
    fn test_clamp_quantity(#[case] requested: i64, #[case] expected: u32) {
        assert_eq!(clamp_quantity(requested, MAX_CART_QUANTITY), expected);
    }

    #[test]
    fn test_clamp_quantity_respects_tighter_bound() {
        assert_eq!(clamp_quantity(8, 5), 5);
        // A configured bound can never raise the hard ceiling.
        assert_eq!(clamp_quantity(50, 99), 10);
    }

    #[test]
    fn test_match_criteria_trims_name() {
        let criteria = MatchCriteria::new("  Manzana Golden  ", "ud");
        assert_eq!(criteria.name, "Manzana Golden");
        assert!(criteria.detail_substring.is_none());

        let criteria = criteria.with_detail("6 mini bricks x 200 ml");
        assert_eq!(
            criteria.detail_substring.as_deref(),
            Some("6 mini bricks x 200 ml")
        );
    }
}
