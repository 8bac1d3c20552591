//! Novel Generation Pipeline
//!
//! Drives the LLM through the stage sequence
//!
//! ```text
//! Start → IntentAnalyzed → RoughOutlined
//!       → { ChapterOutlined → DetailedOutlined → ChapterGenerated
//!           [→ ChapterOptimized] → ChapterAppended }* → VolumeAppended
//!       → NovelAssembled
//! ```
//!
//! and checkpoints the run after every stage. A resumed run continues from
//! the first incomplete volume, keeps the chapters already appended to it,
//! and regenerates the interrupted chapter from scratch.

use std::sync::{Mutex, MutexGuard};

use chrono::Local;
use tracing::{debug, error, info, instrument, warn};

use super::assembler::ResultAssembler;
use super::context::ContextWindow;
use super::extractor;
use super::parse::{parse_chapter, parse_intent};
use super::prompts::{self, ChapterContext};
use super::state::{GenerationStage, RunState};
use super::store::CheckpointStore;
use crate::ai::{SharedCostTracker, SharedProvider, create_shared_tracker};
use crate::config::NovelConfig;
use crate::constants::generation::FIRST_VOLUME_SUMMARY;
use crate::types::{
    Chapter, ChapterOutline, CostInfo, DetailedOutline, Intent, Novel, NovelError, Outline,
    OutlineKind, Result, RoughOutline, RunId, Volume,
};

/// Resumable novel generator bound to one provider and one workspace
pub struct NovelPipeline {
    provider: SharedProvider,
    store: CheckpointStore,
    config: NovelConfig,
    window: ContextWindow,
    cost: SharedCostTracker,
    active_run: Mutex<Option<RunId>>,
}

impl NovelPipeline {
    pub fn new(provider: SharedProvider, config: NovelConfig) -> Self {
        Self {
            provider,
            store: CheckpointStore::new(&config.workspace),
            window: ContextWindow::new(config.sliding_window_size),
            config,
            cost: create_shared_tracker(),
            active_run: Mutex::new(None),
        }
    }

    /// Share a cost tracker with the caller (e.g. for the CLI summary)
    pub fn with_cost_tracker(mut self, cost: SharedCostTracker) -> Self {
        self.cost = cost;
        self
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    pub fn cost(&self) -> &SharedCostTracker {
        &self.cost
    }

    /// Run started or resumed by the last `generate_novel` call
    ///
    /// `None` until a run id exists, i.e. while the intent is still unknown.
    pub fn run_id(&self) -> Option<RunId> {
        self.active_run().clone()
    }

    fn active_run(&self) -> MutexGuard<'_, Option<RunId>> {
        self.active_run.lock().unwrap_or_else(|poisoned| {
            error!("Active run mutex poisoned, recovering");
            poisoned.into_inner()
        })
    }

    // =========================================================================
    // Entry Point
    // =========================================================================

    /// Generate a novel, or continue the run `resume` from its checkpoint
    ///
    /// When resuming, `user_input` is ignored in favour of the stored request.
    pub async fn generate_novel(&self, user_input: &str, resume: Option<&RunId>) -> Result<Novel> {
        match resume {
            Some(run_id) => self
                .resume(run_id)
                .await
                .map_err(|e| NovelError::resume(run_id.as_str(), e)),
            None => self.start(user_input).await,
        }
    }

    async fn start(&self, user_input: &str) -> Result<Novel> {
        *self.active_run() = None;
        self.cost.restore(CostInfo::default());

        let intent = self.analyze_intent(user_input).await?;
        let run_id = RunId::generate(&intent.description, Local::now());
        *self.active_run() = Some(run_id.clone());
        info!(
            run_id = %run_id,
            title = %intent.title,
            volumes = self.config.volume_count,
            chapters_per_volume = self.config.chapter_count_per_volume,
            "Starting novel generation"
        );

        let mut state = RunState::new(
            run_id,
            user_input,
            self.config.volume_count,
            self.config.chapter_count_per_volume,
        );
        state.intent = Some(intent);
        state.stage = GenerationStage::IntentAnalyzed;
        self.checkpoint(&mut state);

        self.drive(&mut state).await
    }

    async fn resume(&self, run_id: &RunId) -> Result<Novel> {
        *self.active_run() = Some(run_id.clone());
        let mut state = self
            .store
            .load(run_id)?
            .ok_or_else(|| NovelError::CheckpointNotFound(run_id.to_string()))?;
        self.cost.restore(state.cost_info.clone());

        info!(
            run_id = %run_id,
            stage = %state.stage,
            volumes_completed = state.volumes.len(),
            chapters_completed = state.chapters_completed(),
            "Resuming novel generation"
        );

        if state.volume_count != self.config.volume_count
            || state.chapter_count_per_volume != self.config.chapter_count_per_volume
        {
            info!(
                volumes = state.volume_count,
                chapters_per_volume = state.chapter_count_per_volume,
                "Keeping the novel shape stored in the checkpoint"
            );
        }

        if state.stage.is_terminal() {
            return self.assemble(&state);
        }

        if state.intent.is_none() {
            let intent = self.analyze_intent(&state.user_input).await?;
            state.intent = Some(intent);
            state.stage = GenerationStage::IntentAnalyzed;
            self.checkpoint(&mut state);
        }

        state.discard_in_flight();
        let next_volume = state.volumes.len() as u32 + 1;
        if let Some(volume) = &state.current_volume
            && (volume.volume_number != next_volume || !volume.is_lockstep())
        {
            warn!(
                volume = volume.volume_number,
                expected = next_volume,
                "Discarding inconsistent in-progress volume"
            );
            state.current_volume = None;
        }

        self.drive(&mut state).await
    }

    /// Run the remaining stages; on failure, persist what was reached
    async fn drive(&self, state: &mut RunState) -> Result<Novel> {
        match self.run_stages(state).await {
            Ok(novel) => Ok(novel),
            Err(e) => {
                error!(
                    run_id = %state.run_id,
                    stage = %state.stage,
                    error = %e,
                    "Generation stopped; progress saved for resume"
                );
                self.checkpoint(state);
                Err(e)
            }
        }
    }

    async fn run_stages(&self, state: &mut RunState) -> Result<Novel> {
        let intent = required(state.intent.as_ref(), "intent")?.clone();

        if state.rough_outline.is_none() {
            let rough = self
                .generate_rough_outline(&state.user_input, &intent, state.volume_count)
                .await?;
            state.rough_outline = Some(rough);
            state.stage = GenerationStage::RoughOutlined;
            self.checkpoint(state);
        }

        for volume_number in (state.volumes.len() as u32 + 1)..=state.volume_count {
            let volume = self.generate_volume(state, volume_number).await?;
            state.volumes.push(volume);
            state.current_volume = None;
            state.current_chapter_num = 0;
            state.stage = GenerationStage::VolumeAppended;
            self.checkpoint(state);
            info!(volume = volume_number, "Volume complete");
        }

        let novel = self.assemble(state)?;
        state.stage = GenerationStage::NovelAssembled;
        state.cost_info = self.cost.get();
        state.touch();
        self.store.save(&state.run_id.clone(), state)?;

        match self.store.save_novel_text(&state.run_id, &novel) {
            Ok(path) => info!(path = %path.display(), "Novel written"),
            Err(e) => warn!(error = %e, "Failed to write novel text"),
        }

        info!(
            run_id = %state.run_id,
            chapters = novel.chapter_count(),
            cost_usd = novel.cost_info.accumulated,
            "Novel assembled"
        );
        Ok(novel)
    }

    fn assemble(&self, state: &RunState) -> Result<Novel> {
        ResultAssembler::assemble(
            required(state.intent.as_ref(), "intent")?.clone(),
            required(state.rough_outline.as_ref(), "rough_outline")?.clone(),
            state.volumes.clone(),
            self.cost.get(),
        )
    }

    // =========================================================================
    // Volume Loop
    // =========================================================================

    /// Generate the remaining chapters of one volume and its summary
    ///
    /// Chapters already appended to `state.current_volume` are kept. The
    /// returned volume is no longer held by `state`.
    #[instrument(skip(self, state), fields(run_id = %state.run_id))]
    pub async fn generate_volume(&self, state: &mut RunState, volume_number: u32) -> Result<Volume> {
        let intent = required(state.intent.as_ref(), "intent")?.clone();
        let rough = required(state.rough_outline.as_ref(), "rough_outline")?.clone();
        let user_input = state.user_input.clone();
        let prior_summary = prior_summary(&state.volumes, volume_number);

        if state.current_volume.as_ref().map(|v| v.volume_number) != Some(volume_number) {
            state.current_volume = Some(Volume::new(volume_number));
        }
        state.current_volume_num = volume_number;

        let design = rough.volume_design_for(volume_number);
        if design.is_empty() {
            warn!(volume = volume_number, "No volume design for this volume");
        }

        let done = in_progress(state)?.chapter_count() as u32;
        for chapter_number in (done + 1)..=state.chapter_count_per_volume {
            let ctx = ChapterContext {
                intent: &intent,
                rough: &rough,
                volume_number,
                chapter_number,
                volume_design: design,
                section_word_count: self.config.section_word_count,
            };
            state.current_chapter_num = chapter_number;
            debug!(volume = volume_number, chapter = chapter_number, "Generating chapter");

            let chapter_outline = self
                .generate_chapter_outline(&ctx, &user_input, &prior_summary, in_progress(state)?)
                .await?;
            state.current_chapter_outline = Some(chapter_outline.clone());
            state.stage = GenerationStage::ChapterOutlined;
            self.checkpoint(state);

            let detailed_outline = self
                .generate_detailed_outline(
                    &ctx,
                    &prior_summary,
                    &chapter_outline,
                    in_progress(state)?,
                )
                .await?;
            state.current_detailed_outline = Some(detailed_outline.clone());
            state.stage = GenerationStage::DetailedOutlined;
            self.checkpoint(state);

            let mut chapter = self
                .generate_chapter(
                    &ctx,
                    &chapter_outline,
                    &detailed_outline,
                    in_progress(state)?,
                )
                .await?;
            state.current_chapter = Some(chapter.clone());
            state.stage = GenerationStage::ChapterGenerated;
            self.checkpoint(state);

            if self.config.need_optimize {
                chapter = self.optimize_chapter(&chapter).await?;
                state.current_chapter = Some(chapter.clone());
                state.stage = GenerationStage::ChapterOptimized;
                self.checkpoint(state);
            }

            state
                .current_volume
                .as_mut()
                .ok_or_else(|| missing("current_volume"))?
                .push_chapter(chapter_outline, detailed_outline, chapter.clone());
            state.discard_in_flight();
            state.stage = GenerationStage::ChapterAppended;

            if let Err(e) =
                self.store
                    .save_chapter_text(&state.run_id, volume_number, chapter_number, &chapter)
            {
                warn!(error = %e, "Failed to write chapter text");
            }
            self.checkpoint(state);
            info!(
                volume = volume_number,
                chapter = chapter_number,
                title = %chapter.title(),
                "Chapter appended"
            );
        }

        let summary = self.summarize_volume(in_progress(state)?).await?;
        let mut volume = state
            .current_volume
            .take()
            .ok_or_else(|| missing("current_volume"))?;
        volume.summary = Some(summary);
        Ok(volume)
    }

    // =========================================================================
    // Stages
    // =========================================================================

    /// Ask the model what novel the user wants
    #[instrument(skip_all)]
    pub async fn analyze_intent(&self, user_input: &str) -> Result<Intent> {
        let response = self.ask(&prompts::intent(user_input), "intent").await?;
        let intent = parse_intent(&response)?;
        info!(title = %intent.title, genre = %intent.genre, "Intent analyzed");
        Ok(intent)
    }

    #[instrument(skip(self, user_input, intent))]
    pub async fn generate_rough_outline(
        &self,
        user_input: &str,
        intent: &Intent,
        volume_count: u32,
    ) -> Result<RoughOutline> {
        let prompt = prompts::rough_outline(user_input, intent, volume_count);
        let response = self.ask(&prompt, "rough_outline").await?;

        let rough = match checked_outline(&response, OutlineKind::Rough)? {
            Outline::Rough(rough) => rough,
            other => return Err(unexpected(other)),
        };
        if rough.volume_design.len() != volume_count as usize {
            warn!(
                expected = volume_count,
                actual = rough.volume_design.len(),
                "Volume design count does not match volume count"
            );
        }
        Ok(rough)
    }

    pub async fn generate_chapter_outline(
        &self,
        ctx: &ChapterContext<'_>,
        user_input: &str,
        prior_summary: &str,
        volume: &Volume,
    ) -> Result<ChapterOutline> {
        let previous = self.window.latest(&volume.chapter_outlines);
        let prompt = prompts::chapter_outline(ctx, user_input, prior_summary, previous);
        let response = self.ask(&prompt, "chapter_outline").await?;

        match checked_outline(&response, OutlineKind::Chapter)? {
            Outline::Chapter(outline) => Ok(outline),
            other => Err(unexpected(other)),
        }
    }

    pub async fn generate_detailed_outline(
        &self,
        ctx: &ChapterContext<'_>,
        prior_summary: &str,
        chapter_outline: &ChapterOutline,
        volume: &Volume,
    ) -> Result<DetailedOutline> {
        let previous = self.window.latest(&volume.detailed_outlines);
        let prompt = prompts::detailed_outline(ctx, prior_summary, chapter_outline, previous);
        let response = self.ask(&prompt, "detailed_outline").await?;

        match checked_outline(&response, OutlineKind::Detailed)? {
            Outline::Detailed(outline) => Ok(outline),
            other => Err(unexpected(other)),
        }
    }

    pub async fn generate_chapter(
        &self,
        ctx: &ChapterContext<'_>,
        chapter_outline: &ChapterOutline,
        detailed_outline: &DetailedOutline,
        volume: &Volume,
    ) -> Result<Chapter> {
        let previous = self.window.latest(&volume.chapters);
        let prompt = prompts::chapter(ctx, chapter_outline, detailed_outline, previous);
        let response = self.ask(&prompt, "chapter").await?;
        parse_chapter(&response)
    }

    /// Rewrite a chapter's content, keeping its title
    ///
    /// A heading echoed back by the model is stripped.
    pub async fn optimize_chapter(&self, chapter: &Chapter) -> Result<Chapter> {
        let response = self.ask(&prompts::optimize(chapter), "optimize").await?;
        let content = match parse_chapter(&response) {
            Ok(echoed) => echoed.content().to_string(),
            Err(_) => response.trim().to_string(),
        };
        chapter.with_content(content)
    }

    async fn summarize_volume(&self, volume: &Volume) -> Result<String> {
        if self.config.summarize_volumes {
            let prompt = prompts::volume_summary(volume.volume_number, &volume.detailed_outlines);
            let response = self.ask(&prompt, "volume_summary").await?;
            return Ok(response.trim().to_string());
        }

        let overviews: Vec<String> = volume
            .chapter_outlines
            .iter()
            .enumerate()
            .map(|(idx, outline)| format!("Chapter {}: {}", idx + 1, outline.chapter_overview))
            .collect();
        Ok(format!(
            "Volume {}:\n{}",
            volume.volume_number,
            overviews.join("\n")
        ))
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn ask(&self, prompt: &str, stage: &'static str) -> Result<String> {
        debug!(
            stage,
            provider = self.provider.name(),
            prompt_chars = prompt.chars().count(),
            "Sending prompt"
        );
        let response = self.provider.ask(prompt).await?;
        self.cost.record(&response)?;
        Ok(response.content)
    }

    /// Save the snapshot; failures are logged and swallowed
    fn checkpoint(&self, state: &mut RunState) {
        state.cost_info = self.cost.get();
        state.touch();
        let run_id = state.run_id.clone();
        if let Err(e) = self.store.save(&run_id, state) {
            warn!(run_id = %run_id, stage = %state.stage, error = %e, "Checkpoint save failed");
        }
    }
}

fn prior_summary(volumes: &[Volume], volume_number: u32) -> String {
    if volume_number <= 1 {
        return FIRST_VOLUME_SUMMARY.to_string();
    }
    volumes
        .get(volume_number as usize - 2)
        .and_then(|v| v.summary.clone())
        .unwrap_or_default()
}

fn checked_outline(response: &str, kind: OutlineKind) -> Result<Outline> {
    let outline = extractor::extract(response, kind)?;
    if let Err(e) = outline.validate() {
        warn!(kind = %kind, error = %e, "Outline field looks too short");
    }
    Ok(outline)
}

fn unexpected(outline: Outline) -> NovelError {
    NovelError::InvalidOutline {
        field: outline.kind().to_string(),
    }
}

fn in_progress(state: &RunState) -> Result<&Volume> {
    state
        .current_volume
        .as_ref()
        .ok_or_else(|| missing("current_volume"))
}

fn required<'a, T>(value: Option<&'a T>, name: &str) -> Result<&'a T> {
    value.ok_or_else(|| missing(name))
}

fn missing(name: &str) -> NovelError {
    NovelError::InvalidNovelStructure(format!("run state has no {}", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::mock::ScriptedProvider;
    use crate::types::ErrorCategory;
    use std::sync::Arc;
    use tempfile::TempDir;

    const INTENT: &str = r#"{"title": "职场系统", "description": "office worker gains a system", "genre": "urban"}"#;

    fn rough(volumes: u32) -> String {
        let mut out = "<worldview_system>A modern megacity run by quiet systems</worldview_system>\n\
             <character_system>Lin Fan, an overworked clerk, and his manager</character_system>\n"
            .to_string();
        for v in 1..=volumes {
            out.push_str(&format!(
                "<volume_design>Design of volume {v}: the clerk climbs higher</volume_design>\n"
            ));
        }
        out
    }

    fn overview(v: u32, c: u32) -> String {
        format!("Overview of volume {v} chapter {c} events")
    }

    fn chapter_outline(v: u32, c: u32) -> String {
        format!(
            "<chapter_overview>{}</chapter_overview>\n<characters_content>Lin Fan and his colleagues</characters_content>",
            overview(v, c)
        )
    }

    fn detailed(v: u32, c: u32) -> String {
        format!("<storyline>Scene by scene storyline of volume {v} chapter {c}</storyline>")
    }

    fn body(v: u32, c: u32) -> String {
        format!("第{v}卷第{c}章正文。") + &"林凡盯着屏幕上的提示，心跳越来越快。".repeat(8)
    }

    fn chapter(v: u32, c: u32) -> String {
        format!("## 第{c}章 标题{v}-{c}\n\n{}", body(v, c))
    }

    fn volume_responses(v: u32, chapters: u32) -> Vec<String> {
        (1..=chapters)
            .flat_map(|c| [chapter_outline(v, c), detailed(v, c), chapter(v, c)])
            .collect()
    }

    fn full_script(volumes: u32, chapters: u32) -> Vec<String> {
        let mut script = vec![INTENT.to_string(), rough(volumes)];
        for v in 1..=volumes {
            script.extend(volume_responses(v, chapters));
        }
        script
    }

    fn config(dir: &TempDir, volumes: u32, chapters: u32) -> NovelConfig {
        NovelConfig {
            volume_count: volumes,
            chapter_count_per_volume: chapters,
            workspace: dir.path().to_path_buf(),
            ..NovelConfig::default()
        }
    }

    fn pipeline(provider: &Arc<ScriptedProvider>, config: NovelConfig) -> NovelPipeline {
        NovelPipeline::new(provider.clone(), config)
    }

    fn only_run(store: &CheckpointStore) -> RunId {
        let runs = store.list_runs().unwrap();
        assert_eq!(runs.len(), 1);
        RunId::new(runs[0].run_id.clone())
    }

    #[tokio::test]
    async fn test_end_to_end_two_by_two() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(ScriptedProvider::new("scripted", full_script(2, 2)).with_cost(0.01));
        let pipeline = pipeline(&provider, config(&dir, 2, 2));

        let novel = pipeline.generate_novel("office worker gains a system", None).await.unwrap();

        assert_eq!(provider.call_count(), 14);
        assert_eq!(novel.intent.title, "职场系统");
        assert_eq!(novel.volumes.len(), 2);
        for (idx, volume) in novel.volumes.iter().enumerate() {
            assert_eq!(volume.volume_number, idx as u32 + 1);
            assert!(volume.is_complete(2));
            assert_eq!(volume.chapters[1].title(), format!("## 第2章 标题{}-2", idx + 1));
        }
        assert_eq!(novel.cost_info.history.len(), 14);
        assert!((novel.cost_info.accumulated - 0.14).abs() < 1e-9);

        let run_id = only_run(pipeline.store());
        assert!(run_id.as_str().starts_with("offic_"));
        let state = pipeline.store().load(&run_id).unwrap().unwrap();
        assert_eq!(state.stage, GenerationStage::NovelAssembled);
        assert!(pipeline.store().chapter_path(&run_id, 2, 2).exists());
        assert!(pipeline.store().run_dir(&run_id).join("novel/novel.md").exists());
    }

    #[tokio::test]
    async fn test_interrupted_run_resumes_from_last_chapter() {
        let dir = TempDir::new().unwrap();
        let failing = Arc::new(
            ScriptedProvider::new("scripted", full_script(2, 2)).fail_on(6, ErrorCategory::BadRequest),
        );
        let first = pipeline(&failing, config(&dir, 2, 2));

        let err = first.generate_novel("office worker gains a system", None).await.unwrap_err();
        assert!(matches!(err, NovelError::Llm(_)));
        assert_eq!(failing.call_count(), 6);

        let run_id = only_run(first.store());
        let snapshot = first.store().load(&run_id).unwrap().unwrap();
        assert_eq!(snapshot.stage, GenerationStage::ChapterAppended);
        assert_eq!(snapshot.current_volume_num, 1);
        assert!(snapshot.volumes.is_empty());
        let partial = snapshot.current_volume.clone().unwrap();
        assert_eq!(partial.chapter_count(), 1);

        let mut script = volume_responses(1, 2).split_off(3);
        script.extend(volume_responses(2, 2));
        let resumed_provider = Arc::new(ScriptedProvider::new("scripted", script));
        let second = pipeline(&resumed_provider, config(&dir, 2, 2));

        let novel = second.generate_novel("ignored", Some(&run_id)).await.unwrap();
        assert_eq!(resumed_provider.call_count(), 9);
        assert_eq!(novel.volumes[0].chapters[0], partial.chapters[0]);
        assert_eq!(novel.volumes[0].chapters[1].title(), "## 第2章 标题1-2");
        assert_eq!(novel.chapter_count(), 4);
        assert!(resumed_provider.prompts()[0].contains("chapter 2 of volume 1"));
    }

    #[tokio::test]
    async fn test_priced_run_resumes_with_cost_history() {
        let dir = TempDir::new().unwrap();
        let failing = Arc::new(
            ScriptedProvider::new("scripted", full_script(2, 2))
                .with_cost(0.01)
                .fail_on(6, ErrorCategory::BadRequest),
        );
        let first = pipeline(&failing, config(&dir, 2, 2));
        assert!(first.generate_novel("office worker gains a system", None).await.is_err());

        let run_id = only_run(first.store());
        assert_eq!(first.run_id(), Some(run_id.clone()));
        let snapshot = first.store().load(&run_id).unwrap().unwrap();
        assert_eq!(snapshot.cost_info.history, vec![0.01; 5]);

        let mut script = volume_responses(1, 2).split_off(3);
        script.extend(volume_responses(2, 2));
        let priced = Arc::new(ScriptedProvider::new("scripted", script).with_cost(0.0123));
        let second = pipeline(&priced, config(&dir, 2, 2));

        let novel = second.generate_novel("ignored", Some(&run_id)).await.unwrap();
        assert_eq!(priced.call_count(), 9);
        assert_eq!(novel.cost_info.history.len(), 14);
        assert!((novel.cost_info.accumulated - (0.05 + 9.0 * 0.0123)).abs() < 1e-9);

        let stored = second.store().load(&run_id).unwrap().unwrap();
        assert_eq!(stored.stage, GenerationStage::NovelAssembled);
        assert_eq!(stored.cost_info, novel.cost_info);
    }

    #[tokio::test]
    async fn test_resume_missing_checkpoint() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(ScriptedProvider::new("scripted", vec![]));
        let pipeline = pipeline(&provider, config(&dir, 1, 1));

        let err = pipeline
            .generate_novel("x", Some(&RunId::new("ghost_20240101_000000")))
            .await
            .unwrap_err();
        match err {
            NovelError::ResumeGeneration { run_id, source } => {
                assert_eq!(run_id, "ghost_20240101_000000");
                assert!(matches!(*source, NovelError::CheckpointNotFound(_)));
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_resume_assembled_run_makes_no_calls() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(ScriptedProvider::new("scripted", full_script(1, 2)).with_cost(0.5));
        let novel = pipeline(&provider, config(&dir, 1, 2))
            .generate_novel("office worker gains a system", None)
            .await
            .unwrap();

        let idle = Arc::new(ScriptedProvider::new("scripted", vec![]));
        let again = pipeline(&idle, config(&dir, 1, 2));
        let run_id = only_run(again.store());
        let reassembled = again.generate_novel("", Some(&run_id)).await.unwrap();

        assert_eq!(idle.call_count(), 0);
        assert_eq!(reassembled, novel);
    }

    #[tokio::test]
    async fn test_window_bounds_prior_outlines() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(ScriptedProvider::new("scripted", full_script(1, 3)));
        let mut cfg = config(&dir, 1, 3);
        cfg.sliding_window_size = 1;
        pipeline(&provider, cfg).generate_novel("req", None).await.unwrap();

        let prompts = provider.prompts();
        // intent, rough, then (outline, detailed, chapter) per chapter
        let third_outline = &prompts[8];
        assert!(third_outline.contains("chapter 3 of volume 1"));
        assert!(third_outline.contains(&overview(1, 2)));
        assert!(!third_outline.contains(&overview(1, 1)));

        let third_chapter = &prompts[10];
        assert!(third_chapter.contains("标题1-2"));
        assert!(!third_chapter.contains("标题1-1"));
    }

    #[tokio::test]
    async fn test_zero_window_sends_no_history() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(ScriptedProvider::new("scripted", full_script(1, 2)));
        let mut cfg = config(&dir, 1, 2);
        cfg.sliding_window_size = 0;
        pipeline(&provider, cfg).generate_novel("req", None).await.unwrap();

        let second_outline = &provider.prompts()[5];
        assert!(!second_outline.contains(&overview(1, 1)));
        assert!(second_outline.contains("(none)"));
    }

    #[tokio::test]
    async fn test_prior_summary_flows_into_next_volume() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(ScriptedProvider::new("scripted", full_script(2, 1)));
        let novel = pipeline(&provider, config(&dir, 2, 1))
            .generate_novel("req", None)
            .await
            .unwrap();

        let prompts = provider.prompts();
        assert!(prompts[2].contains(FIRST_VOLUME_SUMMARY));
        assert!(prompts[5].contains(&format!("Chapter 1: {}", overview(1, 1))));
        assert!(prompts[5].contains("Design of volume 2"));
        assert!(novel.volumes[0].summary.is_some());
    }

    #[tokio::test]
    async fn test_llm_volume_summary() {
        let dir = TempDir::new().unwrap();
        let mut script = vec![INTENT.to_string(), rough(2)];
        script.extend(volume_responses(1, 1));
        script.push("SUMMARY-OF-VOLUME-ONE".to_string());
        script.extend(volume_responses(2, 1));
        script.push("SUMMARY-OF-VOLUME-TWO".to_string());
        let provider = Arc::new(ScriptedProvider::new("scripted", script));
        let mut cfg = config(&dir, 2, 1);
        cfg.summarize_volumes = true;

        let novel = pipeline(&provider, cfg).generate_novel("req", None).await.unwrap();

        assert_eq!(provider.call_count(), 10);
        assert_eq!(novel.volumes[0].summary.as_deref(), Some("SUMMARY-OF-VOLUME-ONE"));
        assert!(provider.prompts()[6].contains("SUMMARY-OF-VOLUME-ONE"));
    }

    #[tokio::test]
    async fn test_optimize_replaces_content_only() {
        let dir = TempDir::new().unwrap();
        let mut script = full_script(1, 1);
        let polished = "润色后的正文。".repeat(20);
        script.push(format!("## 第1章 新标题\n{polished}"));
        let provider = Arc::new(ScriptedProvider::new("scripted", script));
        let mut cfg = config(&dir, 1, 1);
        cfg.need_optimize = true;

        let novel = pipeline(&provider, cfg).generate_novel("req", None).await.unwrap();

        assert_eq!(provider.call_count(), 6);
        let chapter = &novel.volumes[0].chapters[0];
        assert_eq!(chapter.title(), "## 第1章 标题1-1");
        assert_eq!(chapter.content(), polished);
    }

    #[tokio::test]
    async fn test_parse_failure_persists_partial_stage() {
        let dir = TempDir::new().unwrap();
        let mut script = full_script(1, 1);
        script[4] = body(1, 1);
        let provider = Arc::new(ScriptedProvider::new("scripted", script));
        let pipeline = pipeline(&provider, config(&dir, 1, 1));

        let err = pipeline.generate_novel("req", None).await.unwrap_err();
        assert!(matches!(err, NovelError::ChapterTitleNotFound));
        assert_eq!(provider.call_count(), 5);

        let state = pipeline.store().load(&only_run(pipeline.store())).unwrap().unwrap();
        assert_eq!(state.stage, GenerationStage::DetailedOutlined);
        assert!(state.current_detailed_outline.is_some());
        assert_eq!(state.chapters_completed(), 0);
    }

    #[tokio::test]
    async fn test_missing_tag_stops_run() {
        let dir = TempDir::new().unwrap();
        let mut script = full_script(1, 1);
        script[2] = "<chapter_overview>only the overview is here</chapter_overview>".to_string();
        let provider = Arc::new(ScriptedProvider::new("scripted", script));

        let err = pipeline(&provider, config(&dir, 1, 1))
            .generate_novel("req", None)
            .await
            .unwrap_err();
        match err {
            NovelError::MissingContent { tag } => assert_eq!(tag, "characters_content"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failed_intent_leaves_no_run() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(ScriptedProvider::new("scripted", vec!["no json here".to_string()]));
        let pipeline = pipeline(&provider, config(&dir, 1, 1));

        assert!(matches!(
            pipeline.generate_novel("req", None).await,
            Err(NovelError::IntentParse(_))
        ));
        assert!(pipeline.store().list_runs().unwrap().is_empty());
    }

    #[test]
    fn test_prior_summary_selection() {
        let mut first = Volume::new(1);
        first.summary = Some("one".to_string());
        assert_eq!(prior_summary(&[], 1), FIRST_VOLUME_SUMMARY);
        assert_eq!(prior_summary(&[first], 2), "one");
        assert_eq!(prior_summary(&[], 3), "");
    }
}
