use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use url::Url;

use crate::catalog::MAX_CART_QUANTITY;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub browser: BrowserConfig,
    pub retry: RetryConfig,
    pub store: StoreConfig,
    pub workflow: WorkflowConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    pub headless: bool,
    pub chrome_path: Option<String>,
    pub user_agent: Option<String>,
    pub window_width: u32,
    pub window_height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay_ms: u64,
    pub locate_timeout_ms: u64,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub base_url: String,
    pub postal_code: String,
    pub search_terms: Vec<String>,
    pub selectors: SelectorTable,
}

/// Site-specific CSS selectors are configuration data, not code. The defaults
/// in `config/default.toml` target the storefront this tool was built for;
/// pointing the tool at a redesigned page means editing the table, not the
/// source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorTable {
    pub cookie_reject: String,
    pub postal_input: String,
    pub postal_submit: String,
    pub account_prompt_dismiss: String,
    pub search_input: String,
    pub search_button: String,
    pub product_cell: String,
    pub product_name: String,
    pub product_label: String,
    pub product_format: String,
    pub product_price: String,
    pub product_detail: String,
    pub add_button: String,
    pub increment_button: String,
    pub remove_button: String,
}

impl SelectorTable {
    pub fn entries(&self) -> [(&'static str, &str); 15] {
        [
            ("cookie_reject", &self.cookie_reject),
            ("postal_input", &self.postal_input),
            ("postal_submit", &self.postal_submit),
            ("account_prompt_dismiss", &self.account_prompt_dismiss),
            ("search_input", &self.search_input),
            ("search_button", &self.search_button),
            ("product_cell", &self.product_cell),
            ("product_name", &self.product_name),
            ("product_label", &self.product_label),
            ("product_format", &self.product_format),
            ("product_price", &self.product_price),
            ("product_detail", &self.product_detail),
            ("add_button", &self.add_button),
            ("increment_button", &self.increment_button),
            ("remove_button", &self.remove_button),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub settle_delay_ms: u64,
    pub inter_term_delay_ms: u64,
    pub screenshots: bool,
    pub require_visible_entries: bool,
    pub max_cart_quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    pub output_dir: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default"))
            // Add environment-specific config
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix "CESTA_"
            .add_source(Environment::with_prefix("CESTA").separator("__"))
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;

        // Add Chrome path from environment if not set
        if config.browser.chrome_path.is_none() {
            config.browser.chrome_path = env::var("CHROME_PATH").ok();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if Url::parse(&self.store.base_url).is_err() {
            return Err(ConfigError::Message("Invalid store base URL".into()));
        }

        if self.store.postal_code.trim().is_empty() {
            return Err(ConfigError::Message("Postal code must not be empty".into()));
        }

        if self.store.search_terms.iter().any(|t| t.trim().is_empty()) {
            return Err(ConfigError::Message(
                "Search terms must not be empty".into(),
            ));
        }

        for (field, selector) in self.store.selectors.entries() {
            if selector.trim().is_empty() {
                return Err(ConfigError::Message(format!(
                    "Selector '{field}' must not be empty"
                )));
            }
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Message(
                "Retry max_attempts must be greater than 0".into(),
            ));
        }

        if self.retry.poll_interval_ms == 0
            || self.retry.poll_interval_ms > self.retry.locate_timeout_ms
        {
            return Err(ConfigError::Message(
                "Poll interval must be between 1 ms and the locate timeout".into(),
            ));
        }

        if self.workflow.max_cart_quantity == 0
            || self.workflow.max_cart_quantity > MAX_CART_QUANTITY
        {
            return Err(ConfigError::Message(format!(
                "max_cart_quantity must be between 1 and {MAX_CART_QUANTITY}"
            )));
        }

        if self.browser.window_width == 0 || self.browser.window_height == 0 {
            return Err(ConfigError::Message(
                "Browser window size must be greater than 0".into(),
            ));
        }

        if self.export.output_dir.trim().is_empty() {
            return Err(ConfigError::Message(
                "Export output_dir must not be empty".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        AppConfig {
            browser: BrowserConfig {
                headless: true,
                chrome_path: None,
                user_agent: Some("CestaBot/1.0".to_string()),
                window_width: 1366,
                window_height: 900,
            },
            retry: RetryConfig {
                max_attempts: 3,
                delay_ms: 2000,
                locate_timeout_ms: 5000,
                poll_interval_ms: 250,
            },
            store: StoreConfig {
                base_url: "https://www.mercadona.es/".to_string(),
                postal_code: "46007".to_string(),
                search_terms: vec!["manzanas".to_string(), "peras".to_string()],
                selectors: SelectorTable {
                    cookie_reject: "button.ui-button--tertiary.ui-button--positive".to_string(),
                    postal_input: "input[aria-label=\"Código postal\"]".to_string(),
                    postal_submit: "input.postal-code-form__button[type=\"submit\"]".to_string(),
                    account_prompt_dismiss:
                        "button.ui-button--quaternary.ui-button--positive.ui-button--full-width"
                            .to_string(),
                    search_input: "input[data-testid=\"search-input\"]".to_string(),
                    search_button: "span.search__button".to_string(),
                    product_cell: "div[data-testid=\"product-cell\"]".to_string(),
                    product_name: "h4[data-testid=\"product-cell-name\"]".to_string(),
                    product_label: "p.product-price__extra-price.subhead1-r".to_string(),
                    product_format: "div.product-format.product-format__size--cell".to_string(),
                    product_price: "p.product-price__unit-price[data-testid=\"product-price\"]"
                        .to_string(),
                    product_detail: "span.footnote1-r".to_string(),
                    add_button: "button[data-testid=\"product-quantity-button\"]".to_string(),
                    increment_button: "i.icon-plus-28[data-testid=\"icon\"]".to_string(),
                    remove_button: "i.icon-delete-28[data-testid=\"icon\"]".to_string(),
                },
            },
            workflow: WorkflowConfig {
                settle_delay_ms: 5000,
                inter_term_delay_ms: 2000,
                screenshots: true,
                require_visible_entries: false,
                max_cart_quantity: 10,
            },
            export: ExportConfig {
                output_dir: "exports".to_string(),
            },
        }
    }

    #[test]
    fn test_config_validation_valid() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_base_url() {
        let mut config = valid_config();
        config.store.base_url = "not-a-valid-url".to_string();

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("base URL"));
    }

    #[test]
    fn test_config_validation_empty_postal_code() {
        let mut config = valid_config();
        config.store.postal_code = "  ".to_string();

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Postal code"));
    }

    #[test]
    fn test_config_validation_blank_search_term() {
        let mut config = valid_config();
        config.store.search_terms.push(String::new());

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_empty_selector() {
        let mut config = valid_config();
        config.store.selectors.product_cell = String::new();

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("product_cell"));
    }

    #[test]
    fn test_config_validation_zero_attempts() {
        let mut config = valid_config();
        config.retry.max_attempts = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_poll_interval_bounds() {
        let mut config = valid_config();
        config.retry.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.retry.poll_interval_ms = config.retry.locate_timeout_ms + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_cart_quantity_bounds() {
        let mut config = valid_config();
        config.workflow.max_cart_quantity = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.workflow.max_cart_quantity = 11;
        let result = config.validate();
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("between 1 and 10")
        );
    }

    #[test]
    fn test_config_validation_empty_output_dir() {
        let mut config = valid_config();
        config.export.output_dir = String::new();

        assert!(config.validate().is_err());
    }
}
