//! NovelWeave - Resumable LLM Pipeline for Serialized Web Novels
//!
//! Drives a language model through a fixed sequence of prompts to write a
//! long-form novel: intent, rough outline, then per chapter an outline, a
//! detailed outline and the chapter text. Every stage is checkpointed, so an
//! interrupted run resumes from its last completed chapter.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use novelweave::{NovelConfig, NovelPipeline};
//! use novelweave::ai::{ProviderChain, ProviderConfig, ChainConfig};
//!
//! let chain = ProviderChain::from_configs(&ProviderConfig::default(), None, ChainConfig::default())?;
//! let pipeline = NovelPipeline::new(Arc::new(chain), NovelConfig::default());
//! let novel = pipeline.generate_novel("an office worker gains a system", None).await?;
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: LLM provider abstraction, retry chain, cost tracking
//! - [`generation`]: the staged pipeline, checkpoints, parsing
//! - [`config`]: layered configuration
//! - [`types`]: domain records and errors

pub mod ai;
pub mod cli;
pub mod config;
pub mod constants;
pub mod generation;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

pub use config::{Config, ConfigLoader, LlmConfig, NovelConfig};

pub use types::{
    Chapter, ChapterOutline, CostInfo, DetailedOutline, Intent, Novel, NovelError, Outline,
    OutlineKind, Result, ResultExt, RoughOutline, RunId, Volume,
};

pub use generation::{
    CheckpointStore, GenerationStage, NovelPipeline, ResultAssembler, RunState, RunSummary,
};

pub use ai::{
    CostTracker, LlmProvider, LlmResponse, ProviderChain, SharedCostTracker, SharedProvider,
    TimeoutConfig, with_timeout,
};
