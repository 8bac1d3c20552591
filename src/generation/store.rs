//! Checkpoint Store
//!
//! File-backed persistence keyed by run id:
//!
//! ```text
//! {workspace}/{run_id}/checkpoints/checkpoint.json
//! {workspace}/{run_id}/novel/volume_{v}/chapter_{c}.txt
//! {workspace}/{run_id}/novel/novel.md
//! ```
//!
//! Checkpoints are written to a temporary file and renamed over the target,
//! so a crash mid-write leaves the previous snapshot intact. One writer per
//! run id is assumed.

use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use super::state::{GenerationStage, RunState};
use crate::constants::layout;
use crate::types::{Chapter, Novel, NovelError, Result, ResultExt, RunId};

/// Overview of one stored run, used by `status`
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub title: Option<String>,
    pub stage: GenerationStage,
    pub volumes_completed: usize,
    pub volume_count: u32,
    pub chapters_completed: usize,
    pub chapter_count_per_volume: u32,
    pub current_volume_num: u32,
    pub current_chapter_num: u32,
    pub cost_usd: f64,
    pub checkpoint_at: String,
}

impl From<&RunState> for RunSummary {
    fn from(state: &RunState) -> Self {
        Self {
            run_id: state.run_id.to_string(),
            title: state.intent.as_ref().map(|i| i.title.clone()),
            stage: state.stage,
            volumes_completed: state.volumes.len(),
            volume_count: state.volume_count,
            chapters_completed: state.chapters_completed(),
            chapter_count_per_volume: state.chapter_count_per_volume,
            current_volume_num: state.current_volume_num,
            current_chapter_num: state.current_chapter_num,
            cost_usd: state.cost_info.accumulated,
            checkpoint_at: state.checkpoint_at.clone(),
        }
    }
}

/// Durable run storage rooted at a workspace directory
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    workspace: PathBuf,
}

impl CheckpointStore {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
        }
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn run_dir(&self, run_id: &RunId) -> PathBuf {
        self.workspace.join(run_id.as_str())
    }

    pub fn checkpoint_path(&self, run_id: &RunId) -> PathBuf {
        self.run_dir(run_id)
            .join(layout::CHECKPOINTS_DIR)
            .join(layout::CHECKPOINT_FILE)
    }

    fn novel_dir(&self, run_id: &RunId) -> PathBuf {
        self.run_dir(run_id).join(layout::NOVEL_DIR)
    }

    pub fn chapter_path(&self, run_id: &RunId, volume: u32, chapter_number: u32) -> PathBuf {
        self.novel_dir(run_id)
            .join(format!("volume_{}", volume))
            .join(format!("chapter_{}.txt", chapter_number))
    }

    /// Overwrite the run's checkpoint
    pub fn save(&self, run_id: &RunId, state: &RunState) -> Result<()> {
        check_run_id(run_id)?;
        let path = self.checkpoint_path(run_id);
        let json = state.to_json()?;
        write_atomic(&path, json.as_bytes())?;

        debug!(
            run_id = %run_id,
            stage = %state.stage,
            path = %path.display(),
            "Checkpoint saved"
        );
        Ok(())
    }

    /// Load the run's checkpoint; `None` when the run has never been saved
    pub fn load(&self, run_id: &RunId) -> Result<Option<RunState>> {
        check_run_id(run_id)?;
        let path = self.checkpoint_path(run_id);
        if !path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&path).persist_context(&path)?;
        RunState::from_json(&json).map(Some)
    }

    /// Write one chapter as `title`, blank line, `content`
    pub fn save_chapter_text(
        &self,
        run_id: &RunId,
        volume: u32,
        chapter_number: u32,
        chapter: &Chapter,
    ) -> Result<PathBuf> {
        let path = self.chapter_path(run_id, volume, chapter_number);
        let text = format!("{}\n\n{}", chapter.title(), chapter.content());
        write_atomic(&path, text.as_bytes())?;
        Ok(path)
    }

    /// Write the assembled novel as a single markdown file
    pub fn save_novel_text(&self, run_id: &RunId, novel: &Novel) -> Result<PathBuf> {
        let path = self.novel_dir(run_id).join(layout::NOVEL_FILE);
        write_atomic(&path, novel.to_markdown().as_bytes())?;
        Ok(path)
    }

    /// Summaries of every run in the workspace, most recent first
    ///
    /// Unreadable checkpoints are skipped with a warning.
    pub fn list_runs(&self) -> Result<Vec<RunSummary>> {
        if !self.workspace.exists() {
            return Ok(Vec::new());
        }

        let mut runs = Vec::new();
        for entry in fs::read_dir(&self.workspace).persist_context(&self.workspace)? {
            let entry = entry.persist_context(&self.workspace)?;
            if !entry.path().is_dir() {
                continue;
            }
            let run_id = RunId::new(entry.file_name().to_string_lossy().into_owned());
            match self.load(&run_id) {
                Ok(Some(state)) => runs.push(RunSummary::from(&state)),
                Ok(None) => {}
                Err(e) => warn!(run_id = %run_id, error = %e, "Skipping unreadable checkpoint"),
            }
        }

        runs.sort_by(|a, b| b.checkpoint_at.cmp(&a.checkpoint_at));
        Ok(runs)
    }
}

/// Run ids name a directory directly under the workspace
fn check_run_id(run_id: &RunId) -> Result<()> {
    let mut components = Path::new(run_id.as_str()).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(NovelError::InvalidRunId(run_id.to_string())),
    }
}

/// Write to a sibling temp file, then rename over the target
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).persist_context(parent)?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, bytes).persist_context(&tmp)?;
    fs::rename(&tmp, path).persist_context(path)?;
    Ok(())
}
