//! Run Cost Tracking
//!
//! Accumulates the per-call cost of a generation run, plus call and token
//! counters for the end-of-run summary. Shared between the pipeline and the
//! CLI via `Arc`.
//!
//! ## Usage
//!
//! ```ignore
//! let tracker = create_shared_tracker();
//! tracker.record(&response)?;
//! let info = tracker.total();
//! ```

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::ai::provider::LlmResponse;
use crate::types::{CostInfo, NovelError, Result};

// =============================================================================
// Cost Tracker
// =============================================================================

/// Thread-safe running total of per-call cost
pub struct CostTracker {
    cost: Mutex<CostInfo>,
    start_time: Instant,
    api_calls: AtomicU32,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
    total_latency_ms: AtomicU64,
}

/// Counters reported after a run
#[derive(Debug, Clone)]
pub struct CostSummary {
    pub total_duration_ms: u64,
    pub api_calls: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub avg_latency_ms: f64,
    pub total_cost_usd: f64,
}

pub type SharedCostTracker = Arc<CostTracker>;

pub fn create_shared_tracker() -> SharedCostTracker {
    Arc::new(CostTracker::new())
}

impl Default for CostTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl CostTracker {
    pub fn new() -> Self {
        Self {
            cost: Mutex::new(CostInfo::default()),
            start_time: Instant::now(),
            api_calls: AtomicU32::new(0),
            input_tokens: AtomicU64::new(0),
            output_tokens: AtomicU64::new(0),
            total_latency_ms: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CostInfo> {
        self.cost.lock().unwrap_or_else(|poisoned| {
            tracing::error!("Cost tracker mutex poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Add one call's cost; negative or non-finite amounts are rejected
    pub fn add(&self, amount: f64) -> Result<()> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(NovelError::InvalidCost(amount));
        }
        let mut cost = self.lock();
        cost.accumulated += amount;
        cost.history.push(amount);
        Ok(())
    }

    /// Record cost, tokens and latency of one LLM response
    pub fn record(&self, response: &LlmResponse) -> Result<()> {
        self.add(response.cost_usd)?;
        self.api_calls.fetch_add(1, Ordering::Relaxed);
        self.input_tokens
            .fetch_add(response.usage.input_tokens as u64, Ordering::Relaxed);
        self.output_tokens
            .fetch_add(response.usage.output_tokens as u64, Ordering::Relaxed);
        self.total_latency_ms
            .fetch_add(response.timing.total_ms, Ordering::Relaxed);
        Ok(())
    }

    /// Seed from a checkpointed snapshot, replacing the current cost
    pub fn restore(&self, info: CostInfo) {
        *self.lock() = info;
    }

    pub fn total(&self) -> CostInfo {
        self.lock().clone()
    }

    pub fn get(&self) -> CostInfo {
        self.total()
    }

    /// Counters for calls made by this process (restored cost included)
    pub fn summary(&self) -> CostSummary {
        let api_calls = self.api_calls.load(Ordering::Relaxed);
        let total_latency_ms = self.total_latency_ms.load(Ordering::Relaxed);

        CostSummary {
            total_duration_ms: self.start_time.elapsed().as_millis() as u64,
            api_calls,
            input_tokens: self.input_tokens.load(Ordering::Relaxed),
            output_tokens: self.output_tokens.load(Ordering::Relaxed),
            avg_latency_ms: if api_calls > 0 {
                total_latency_ms as f64 / api_calls as f64
            } else {
                0.0
            },
            total_cost_usd: self.lock().accumulated,
        }
    }
}
