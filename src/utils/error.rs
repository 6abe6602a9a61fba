use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Element not yet rendered: {selector}")]
    TransientNotFound { selector: String },

    #[error("Stale element reference: {0}")]
    StaleElement(String),

    #[error("Element never became actionable: {0}")]
    NotActionable(String),

    #[error("Retries exhausted after {attempts} attempts: {operation}")]
    ExhaustedRetries { operation: String, attempts: u32 },

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Invalid selector: {0}")]
    Selector(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Export error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AutomationError>;

// Message fragments CDP surfaces when a node handle no longer maps to a live
// document node.
const STALE_MARKERS: &[&str] = &[
    "could not find node",
    "node with given id",
    "detached from",
    "no longer attached",
];

/// Classify a browser-layer failure. Detached-node errors are separated out so
/// retry scopes force a fresh lookup instead of reusing a dead handle; anything
/// unrecognized stays a plain browser error and remains retryable.
pub fn from_browser(context: &str, err: anyhow::Error) -> AutomationError {
    let text = format!("{err:#}").to_lowercase();
    if STALE_MARKERS.iter().any(|marker| text.contains(marker)) {
        AutomationError::StaleElement(format!("{context}: {err}"))
    } else {
        AutomationError::Browser(format!("{context}: {err}"))
    }
}
