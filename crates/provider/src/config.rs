//! Settings for talking to the directory service.

use orgaudit_core::error::{OrgAuditError, OrgAuditResult};
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Max items per page the GitHub REST API allows.
const DEFAULT_PER_PAGE: u8 = 100;

/// Default in-flight team / repository fetches.
/// Kept low so large orgs don't trip the secondary rate limit.
pub const DEFAULT_CONCURRENCY: usize = 4;

const DEFAULT_MAX_RETRIES: u32 = 5;

/// Rate-limit sleeps allowed per request. Separate from `max_retries`, since
/// waiting out a quota window is expected on large orgs.
const DEFAULT_MAX_RATE_LIMIT_WAITS: u32 = 30;

/// Wait applied when the server signals a rate limit without saying how long.
const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

/// Provider configuration with builder-style overrides.
///
/// ```ignore
/// let config = ProviderConfig::new("https://ghe.example.com/api/v3")?
///     .with_concurrency(8)
///     .with_max_retries(3);
/// ```
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_url: Url,
    pub per_page: u8,
    pub max_concurrent: usize,
    pub max_retries: u32,
    /// First retry delay for transient failures; doubles per attempt.
    pub initial_backoff: Duration,
    pub rate_limit_wait: Duration,
    pub max_rate_limit_waits: u32,
    pub user_agent: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_url: Url::parse(DEFAULT_API_URL).expect("default API URL is valid"),
            per_page: DEFAULT_PER_PAGE,
            max_concurrent: DEFAULT_CONCURRENCY,
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: Duration::from_millis(200),
            rate_limit_wait: DEFAULT_RATE_LIMIT_WAIT,
            max_rate_limit_waits: DEFAULT_MAX_RATE_LIMIT_WAITS,
            user_agent: concat!("orgaudit/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ProviderConfig {
    pub fn new(api_url: &str) -> OrgAuditResult<Self> {
        let api_url = Url::parse(api_url)
            .map_err(|e| OrgAuditError::InvalidInput(format!("invalid API URL {api_url}: {e}")))?;
        if api_url.cannot_be_a_base() {
            return Err(OrgAuditError::InvalidInput(format!(
                "API URL {api_url} cannot be used as a base"
            )));
        }
        Ok(Self {
            api_url,
            ..Default::default()
        })
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.max_concurrent = n.max(1);
        self
    }

    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    pub fn with_initial_backoff(mut self, delay: Duration) -> Self {
        self.initial_backoff = delay;
        self
    }

    pub fn with_rate_limit_wait(mut self, wait: Duration) -> Self {
        self.rate_limit_wait = wait;
        self
    }

    pub fn with_max_rate_limit_waits(mut self, n: u32) -> Self {
        self.max_rate_limit_waits = n;
        self
    }

    pub fn with_per_page(mut self, n: u8) -> Self {
        self.per_page = n.clamp(1, DEFAULT_PER_PAGE);
        self
    }

    /// Delay before retry number `attempt` (1-based).
    pub(crate) fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}
