//! Scripted provider for tests
//!
//! Replays canned responses in call order. Individual calls (1-based) can be
//! scheduled to fail without consuming a response.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{LlmProvider, LlmResponse, ResponseMetadata, TokenUsage};
use crate::types::{ErrorCategory, LlmError, NovelError, Result};

pub(crate) struct ScriptedProvider {
    name: String,
    responses: Mutex<VecDeque<String>>,
    failures: HashMap<usize, ErrorCategory>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    cost_per_call: f64,
}

impl ScriptedProvider {
    pub fn new(name: &str, responses: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            responses: Mutex::new(responses.into()),
            failures: HashMap::new(),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            cost_per_call: 0.0,
        }
    }

    /// Fail the given 1-based call with an error of this category
    pub fn fail_on(mut self, call: usize, category: ErrorCategory) -> Self {
        self.failures.insert(call, category);
        self
    }

    /// Fail every call from 1 to `count` inclusive
    pub fn fail_first(mut self, count: usize, category: ErrorCategory) -> Self {
        for call in 1..=count {
            self.failures.insert(call, category);
        }
        self
    }

    pub fn with_cost(mut self, cost_per_call: f64) -> Self {
        self.cost_per_call = cost_per_call;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn ask(&self, prompt: &str) -> Result<LlmResponse> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.prompts.lock().unwrap().push(prompt.to_string());

        if let Some(category) = self.failures.get(&call) {
            return Err(LlmError::with_provider(
                *category,
                format!("scripted failure on call {}", call),
                self.name.clone(),
            )
            .into());
        }

        let content = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| NovelError::LlmApi(format!("script exhausted at call {}", call)))?;

        Ok(LlmResponse {
            usage: TokenUsage::new(prompt.chars().count() as u32, content.chars().count() as u32),
            content,
            cost_usd: self.cost_per_call,
            timing: Default::default(),
            metadata: ResponseMetadata {
                model: "scripted".to_string(),
                provider: self.name.clone(),
            },
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        "scripted"
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}
