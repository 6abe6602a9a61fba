// Extraction and matching behavior over static HTML fragments. These tests
// exercise the same parsing path the live scanner feeds with each rendered
// product cell's markup, without needing a browser.

use std::time::Duration;

use cesta::actions::ActionExecutor;
use cesta::catalog::{CatalogScanner, MatchCriteria, ProductEntry};
use cesta::config::SelectorTable;
use cesta::locator::{ExpectedState, Locator};
use cesta::retry::RetryPolicy;
use cesta::AutomationError;

fn selectors() -> SelectorTable {
    SelectorTable {
        cookie_reject: "button.cookie-reject".to_string(),
        postal_input: "input.postal".to_string(),
        postal_submit: "input.postal-submit".to_string(),
        account_prompt_dismiss: "button.account-dismiss".to_string(),
        search_input: "input.search".to_string(),
        search_button: "span.search-go".to_string(),
        product_cell: "div[data-testid=\"product-cell\"]".to_string(),
        product_name: "h4[data-testid=\"product-cell-name\"]".to_string(),
        product_label: "p.product-price__extra-price.subhead1-r".to_string(),
        product_format: "div.product-format.product-format__size--cell".to_string(),
        product_price: "p.product-price__unit-price[data-testid=\"product-price\"]".to_string(),
        product_detail: "span.footnote1-r".to_string(),
        add_button: "button[data-testid=\"product-quantity-button\"]".to_string(),
        increment_button: "i.icon-plus-28[data-testid=\"icon\"]".to_string(),
        remove_button: "i.icon-delete-28[data-testid=\"icon\"]".to_string(),
    }
}

fn scanner() -> CatalogScanner {
    let locator = Locator::new(Duration::from_millis(50));
    let executor = ActionExecutor::new(locator, Duration::from_millis(200));
    let policy = RetryPolicy::new(1, Duration::ZERO);
    CatalogScanner::new(selectors(), executor, policy, ExpectedState::PresentAll, 10).unwrap()
}

const FULL_CELL: &str = r#"
    <div data-testid="product-cell">
        <h4 data-testid="product-cell-name"> Manzana Golden </h4>
        <p class="product-price__extra-price subhead1-r">0,26 € /ud.</p>
        <div class="product-format product-format__size--cell">Pieza 200 g aprox.</div>
        <p class="product-price__unit-price" data-testid="product-price">0,52 €</p>
        <span class="footnote1-r">6 mini bricks x 200 ml</span>
    </div>
"#;

const CELL_WITHOUT_DETAIL: &str = r#"
    <div data-testid="product-cell">
        <h4 data-testid="product-cell-name">Manzana Golden</h4>
        <p class="product-price__extra-price subhead1-r">ud</p>
        <div class="product-format product-format__size--cell">Pieza 200 g aprox.</div>
        <p class="product-price__unit-price" data-testid="product-price">0,52 €</p>
    </div>
"#;

const CELL_WITHOUT_PRICE: &str = r#"
    <div data-testid="product-cell">
        <h4 data-testid="product-cell-name">Manzana Golden</h4>
        <p class="product-price__extra-price subhead1-r">ud</p>
        <div class="product-format product-format__size--cell">Pieza 200 g aprox.</div>
    </div>
"#;

#[test]
fn parse_entry_extracts_all_fields() {
    let entry = scanner().parse_entry(FULL_CELL).unwrap();
    assert_eq!(
        entry,
        ProductEntry {
            name: "Manzana Golden".to_string(),
            label: "ud".to_string(),
            format: "Pieza 200 g aprox.".to_string(),
            price: "0,52 €".to_string(),
        }
    );
}

#[test]
fn parse_entry_normalizes_label_to_letters_only() {
    let entry = scanner().parse_entry(FULL_CELL).unwrap();
    assert!(entry.label.chars().all(|c| c.is_ascii_alphabetic()));
}

#[test]
fn parse_entry_fails_on_missing_price() {
    let err = scanner().parse_entry(CELL_WITHOUT_PRICE).unwrap_err();
    assert!(matches!(err, AutomationError::Extraction(_)));
    assert!(err.to_string().contains("price"));
}

#[test]
fn match_is_reflexive_with_null_detail() {
    let scanner = scanner();
    let criteria = MatchCriteria::new("Manzana Golden", "ud");
    assert!(scanner.evaluate_match(FULL_CELL, &criteria).unwrap());
    assert!(scanner.evaluate_match(CELL_WITHOUT_DETAIL, &criteria).unwrap());
}

#[test]
fn match_requires_exact_name_after_trim() {
    let scanner = scanner();
    assert!(!scanner
        .evaluate_match(FULL_CELL, &MatchCriteria::new("Manzana", "ud"))
        .unwrap());
    // The fixture name carries surrounding whitespace; trimming makes it equal.
    assert!(scanner
        .evaluate_match(FULL_CELL, &MatchCriteria::new("  Manzana Golden ", "ud"))
        .unwrap());
}

#[test]
fn match_requires_exact_normalized_label() {
    let scanner = scanner();
    assert!(!scanner
        .evaluate_match(FULL_CELL, &MatchCriteria::new("Manzana Golden", "pack"))
        .unwrap());
}

#[test]
fn match_checks_detail_substring() {
    let scanner = scanner();
    let criteria = MatchCriteria::new("Manzana Golden", "ud").with_detail("x 200 ml");
    assert!(scanner.evaluate_match(FULL_CELL, &criteria).unwrap());

    let criteria = MatchCriteria::new("Manzana Golden", "ud").with_detail("x 500 ml");
    assert!(!scanner.evaluate_match(FULL_CELL, &criteria).unwrap());
}

#[test]
fn match_fails_closed_when_detail_field_is_unreachable() {
    // Name and label agree, but the detail span is absent from the cell: the
    // entry must never match by default.
    let scanner = scanner();
    let criteria = MatchCriteria::new("Manzana Golden", "ud").with_detail("x 200 ml");
    assert!(!scanner.evaluate_match(CELL_WITHOUT_DETAIL, &criteria).unwrap());
}

#[test]
fn empty_detail_criteria_behaves_like_no_detail() {
    let scanner = scanner();
    let criteria = MatchCriteria::new("Manzana Golden", "ud").with_detail("");
    assert!(scanner.evaluate_match(CELL_WITHOUT_DETAIL, &criteria).unwrap());
}

#[test]
fn strict_evaluation_reports_missing_required_fields() {
    let scanner = scanner();
    let criteria = MatchCriteria::new("Manzana Golden", "ud");
    let err = scanner
        .evaluate_match("<div data-testid=\"product-cell\"></div>", &criteria)
        .unwrap_err();
    assert!(matches!(err, AutomationError::Extraction(_)));
}
