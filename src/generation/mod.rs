//! Novel Generation
//!
//! The staged pipeline and its building blocks:
//!
//! - [`extractor`]: tagged outline parsing
//! - [`context`]: sliding window over prior material
//! - [`prompts`]: one template per stage
//! - [`parse`]: intent and chapter response parsing
//! - [`state`] / [`store`]: checkpointed run state on disk
//! - [`assembler`]: final `Novel` assembly
//! - [`pipeline`]: the state machine tying them together

pub mod assembler;
pub mod context;
pub mod extractor;
pub mod parse;
pub mod pipeline;
pub mod prompts;
pub mod state;
pub mod store;

pub use assembler::ResultAssembler;
pub use context::ContextWindow;
pub use extractor::{extract, extract_chapter, extract_detailed, extract_rough};
pub use pipeline::NovelPipeline;
pub use state::{GenerationStage, RunState};
pub use store::{CheckpointStore, RunSummary};
