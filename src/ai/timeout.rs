//! Request Timeouts
//!
//! Every LLM round-trip is bounded here; the generation pipeline itself
//! never applies timeouts.
//!
//! ## Usage
//!
//! ```ignore
//! use crate::ai::timeout::{TimeoutConfig, with_timeout};
//!
//! let config = TimeoutConfig::from_secs(120);
//! let response = with_timeout(config.llm_request, provider.ask(prompt), "chapter outline").await?;
//! ```

use std::future::Future;
use std::time::Duration;

use crate::constants::network as net_constants;
use crate::types::{NovelError, Result};

/// Timeouts applied by the LLM layer
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// One LLM request, including response download (default: 5 minutes)
    pub llm_request: Duration,
    /// Provider health check (default: 5 seconds)
    pub health_check: Duration,
    /// TCP connect (default: 30 seconds)
    pub connection: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            llm_request: Duration::from_secs(net_constants::DEFAULT_TIMEOUT_SECS),
            health_check: Duration::from_secs(net_constants::HEALTH_CHECK_TIMEOUT_SECS),
            connection: Duration::from_secs(net_constants::CONNECTION_TIMEOUT_SECS),
        }
    }
}

impl TimeoutConfig {
    /// Config with a custom request timeout and default health check timeout
    pub fn from_secs(llm_request_secs: u64) -> Self {
        Self {
            llm_request: Duration::from_secs(llm_request_secs),
            ..Self::default()
        }
    }
}

/// Execute an async operation with a timeout
///
/// Returns `NovelError::Timeout` if the operation doesn't complete in time.
pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(NovelError::timeout(operation_name, timeout)),
    }
}
