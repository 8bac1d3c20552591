//! Generate Command
//!
//! Runs the novel pipeline, fresh or resumed from a checkpoint.
//!
//! Usage:
//!   novelweave generate "an office worker gains a system" --volumes 2 --chapters 5
//!   novelweave generate --input-file request.txt --optimize
//!   novelweave generate --resume offic_20240101_093000

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::runtime::Runtime;
use tracing::{info, warn};

use crate::ai::{CostSummary, ProviderChain, SharedProvider, TimeoutConfig, with_timeout};
use crate::cli::ui::Output;
use crate::config::{Config, ConfigLoader};
use crate::generation::NovelPipeline;
use crate::types::{Novel, NovelError, Result, RunId};

/// Generate options (CLI flags, all optional overrides of the config)
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Request text
    pub input: Option<String>,
    /// Read the request from a file instead
    pub input_file: Option<PathBuf>,
    /// Run id to resume
    pub resume: Option<String>,
    pub volumes: Option<u32>,
    pub chapters: Option<u32>,
    pub window: Option<usize>,
    pub words: Option<u32>,
    pub optimize: bool,
    pub summarize: bool,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub workspace: Option<PathBuf>,
    /// Skip the provider health check
    pub skip_health_check: bool,
    pub quiet: bool,
}

impl GenerateOptions {
    /// Apply CLI overrides on top of the loaded configuration
    pub fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(volumes) = self.volumes {
            config.novel.volume_count = volumes;
        }
        if let Some(chapters) = self.chapters {
            config.novel.chapter_count_per_volume = chapters;
        }
        if let Some(window) = self.window {
            config.novel.sliding_window_size = window;
        }
        if let Some(words) = self.words {
            config.novel.section_word_count = words;
        }
        if self.optimize {
            config.novel.need_optimize = true;
        }
        if self.summarize {
            config.novel.summarize_volumes = true;
        }
        if let Some(provider) = &self.provider {
            config.llm.provider = provider.clone();
        }
        if let Some(model) = &self.model {
            config.llm.model = Some(model.clone());
        }
        if let Some(workspace) = &self.workspace {
            config.novel.workspace = workspace.clone();
        }
        config.validate()
    }

    /// Request text from the argument or the input file
    ///
    /// Empty when resuming without one; the stored request is used then.
    pub fn user_input(&self) -> Result<String> {
        let text = match (&self.input, &self.input_file) {
            (Some(_), Some(_)) => {
                return Err(NovelError::Config(
                    "Pass the request either inline or with --input-file, not both".to_string(),
                ));
            }
            (Some(text), None) => text.clone(),
            (None, Some(path)) => fs::read_to_string(path).map_err(|e| NovelError::persistence(path, e))?,
            (None, None) => String::new(),
        };

        let text = text.trim().to_string();
        if text.is_empty() && self.resume.is_none() {
            return Err(NovelError::Config(
                "No request given. Pass it as an argument or with --input-file".to_string(),
            ));
        }
        Ok(text)
    }
}

/// Run the generate command
pub fn run(options: GenerateOptions) -> Result<()> {
    let out = Output::quiet(options.quiet);

    let mut config = ConfigLoader::load()?;
    options.apply(&mut config)?;
    let user_input = options.user_input()?;
    let resume = options.resume.as_deref().map(RunId::from);

    let provider = build_provider(&config)?;
    info!(provider = provider.name(), model = provider.model(), "Using LLM provider");

    let rt = Runtime::new()?;
    if !options.skip_health_check {
        rt.block_on(check_provider(&provider, &config.llm.timeout_config(), &out));
    }

    match &resume {
        Some(run_id) => out.header(&format!("Resuming run {}", run_id)),
        None => out.header("Generating novel"),
    }
    out.field("Volumes", config.novel.volume_count);
    out.field("Chapters/volume", config.novel.chapter_count_per_volume);
    out.field("Workspace", config.novel.workspace.display());

    let pipeline = NovelPipeline::new(provider, config.novel.clone());
    let cost = pipeline.cost().clone();

    match rt.block_on(pipeline.generate_novel(&user_input, resume.as_ref())) {
        Ok(novel) => {
            print_result(&out, &novel, &cost.summary(), &config);
            Ok(())
        }
        Err(e) => {
            out.error(&format!("Generation failed: {}", e));
            if e.is_parse_error() {
                out.hint("The model answered in an unexpected format; a stronger model may help");
            }
            if let Some(run_id) = resumable_run(&pipeline) {
                out.hint(&format!(
                    "Progress saved. Continue with: novelweave generate --resume {}",
                    run_id
                ));
            }
            Err(e)
        }
    }
}

/// The failed run, if it left a checkpoint behind
fn resumable_run(pipeline: &NovelPipeline) -> Option<RunId> {
    let run_id = pipeline.run_id()?;
    match pipeline.store().load(&run_id) {
        Ok(Some(_)) => Some(run_id),
        _ => None,
    }
}

/// Primary provider wrapped in a retrying chain, with the configured fallback
fn build_provider(config: &Config) -> Result<SharedProvider> {
    let primary = config.llm.provider_config();
    let fallback = config.llm.fallback_config();
    if let Some(fallback) = &fallback {
        info!(
            primary = %primary.provider,
            fallback = %fallback.provider,
            "Provider chain with fallback"
        );
    }
    let chain = ProviderChain::from_configs(&primary, fallback.as_ref(), config.llm.chain_config())?;
    Ok(Arc::new(chain))
}

/// Warn early when the provider cannot be reached; the run still proceeds
async fn check_provider(provider: &SharedProvider, timeouts: &TimeoutConfig, out: &Output) {
    match with_timeout(timeouts.health_check, provider.health_check(), "health check").await {
        Ok(true) => {}
        Ok(false) => out.warning(&format!("Provider '{}' reported unhealthy", provider.name())),
        Err(e) => {
            warn!(error = %e, "Provider health check failed");
            out.warning(&format!("Provider '{}' health check failed: {}", provider.name(), e));
        }
    }
}

fn print_result(out: &Output, novel: &Novel, summary: &CostSummary, config: &Config) {
    out.success(&format!("\"{}\" complete", novel.intent.title));
    out.section("Summary");
    out.field("Genre", &novel.intent.genre);
    out.field("Volumes", novel.volumes.len());
    out.field("Chapters", novel.chapter_count());
    out.field("LLM calls", summary.api_calls);
    out.field(
        "Tokens",
        format!("{} in / {} out", summary.input_tokens, summary.output_tokens),
    );
    out.field("Cost", format!("${:.4}", novel.cost_info.accumulated));
    out.field("Duration", format!("{:.1}s", summary.total_duration_ms as f64 / 1000.0));
    out.field("Output", config.novel.workspace.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::mock::ScriptedProvider;
    use crate::config::NovelConfig;
    use crate::generation::RunState;
    use crate::types::ErrorCategory;
    use tempfile::TempDir;

    fn scripted_pipeline(dir: &TempDir, provider: ScriptedProvider) -> NovelPipeline {
        let config = NovelConfig {
            workspace: dir.path().to_path_buf(),
            ..NovelConfig::default()
        };
        NovelPipeline::new(Arc::new(provider), config)
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = Config::default();
        let options = GenerateOptions {
            volumes: Some(2),
            chapters: Some(4),
            window: Some(0),
            optimize: true,
            model: Some("gpt-4o-mini".to_string()),
            workspace: Some(PathBuf::from("out")),
            ..Default::default()
        };
        options.apply(&mut config).unwrap();

        assert_eq!(config.novel.volume_count, 2);
        assert_eq!(config.novel.chapter_count_per_volume, 4);
        assert_eq!(config.novel.sliding_window_size, 0);
        assert!(config.novel.need_optimize);
        assert_eq!(config.llm.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(config.novel.workspace, PathBuf::from("out"));
    }

    #[test]
    fn test_apply_rejects_zero_volumes() {
        let mut config = Config::default();
        let options = GenerateOptions {
            volumes: Some(0),
            ..Default::default()
        };
        assert!(options.apply(&mut config).is_err());
    }

    #[test]
    fn test_user_input_sources() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("request.txt");
        fs::write(&file, "  a clerk gains a system\n").unwrap();

        let from_file = GenerateOptions {
            input_file: Some(file.clone()),
            ..Default::default()
        };
        assert_eq!(from_file.user_input().unwrap(), "a clerk gains a system");

        let both = GenerateOptions {
            input: Some("x".to_string()),
            input_file: Some(file),
            ..Default::default()
        };
        assert!(both.user_input().is_err());
    }

    #[test]
    fn test_user_input_required_unless_resuming() {
        assert!(GenerateOptions::default().user_input().is_err());

        let resume = GenerateOptions {
            resume: Some("offic_20240101_000000".to_string()),
            ..Default::default()
        };
        assert_eq!(resume.user_input().unwrap(), "");
    }

    #[tokio::test]
    async fn test_no_resume_hint_when_intent_fails() {
        let dir = TempDir::new().unwrap();
        let provider = ScriptedProvider::new("scripted", vec![]).fail_on(1, ErrorCategory::Network);
        let pipeline = scripted_pipeline(&dir, provider);

        assert!(pipeline.generate_novel("a clerk gains a system", None).await.is_err());
        assert!(pipeline.run_id().is_none());
        assert!(resumable_run(&pipeline).is_none());
    }

    #[tokio::test]
    async fn test_resume_hint_names_the_failed_run() {
        let dir = TempDir::new().unwrap();
        let script = vec![
            r#"{"title": "职场系统", "description": "a clerk gains a system", "genre": "urban"}"#.to_string(),
            "<worldview_system>A city of hidden systems</worldview_system>\n\
             <character_system>Lin Fan, an overworked clerk</character_system>\n\
             <volume_design>The system awakens at midnight</volume_design>"
                .to_string(),
        ];
        let provider = ScriptedProvider::new("scripted", script).fail_on(3, ErrorCategory::BadRequest);
        let pipeline = scripted_pipeline(&dir, provider);

        assert!(pipeline.generate_novel("a clerk gains a system", None).await.is_err());
        let failed = pipeline.run_id().unwrap();

        let mut newer = RunState::new(RunId::new("other_29991231_235959"), "another request", 1, 1);
        newer.checkpoint_at = "2999-12-31T23:59:59+00:00".to_string();
        pipeline.store().save(&newer.run_id.clone(), &newer).unwrap();
        assert_eq!(pipeline.store().list_runs().unwrap()[0].run_id, "other_29991231_235959");

        assert_eq!(resumable_run(&pipeline), Some(failed));
    }
}
