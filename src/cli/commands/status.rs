//! Status Command
//!
//! Lists the runs in the workspace, or details of one run.

use std::path::PathBuf;

use serde_json::json;

use crate::cli::ui::Output;
use crate::config::ConfigLoader;
use crate::generation::{CheckpointStore, RunSummary};
use crate::types::{NovelError, Result, RunId};

pub fn run(run_id: Option<&str>, format: &str, workspace: Option<PathBuf>) -> Result<()> {
    let workspace = match workspace {
        Some(dir) => dir,
        None => ConfigLoader::load()?.novel.workspace,
    };
    let store = CheckpointStore::new(workspace);
    let json_output = format == "json";

    let runs = match run_id {
        Some(id) => {
            let run_id = RunId::from(id);
            let state = store
                .load(&run_id)?
                .ok_or_else(|| NovelError::CheckpointNotFound(run_id.to_string()))?;
            vec![RunSummary::from(&state)]
        }
        None => store.list_runs()?,
    };

    if json_output {
        let entries: Vec<_> = runs.iter().map(to_json).collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    let out = Output::new();
    out.header("NovelWeave Status");
    if runs.is_empty() {
        out.info(&format!("No runs in {}", store.workspace().display()));
        out.hint("Start one with: novelweave generate \"<request>\"");
        return Ok(());
    }

    for run in &runs {
        print_run(&out, &store, run);
    }
    Ok(())
}

fn to_json(run: &RunSummary) -> serde_json::Value {
    json!({
        "run_id": run.run_id,
        "title": run.title,
        "stage": run.stage.as_u8(),
        "stage_name": run.stage.name(),
        "complete": run.stage.is_terminal(),
        "volumes": {
            "completed": run.volumes_completed,
            "planned": run.volume_count,
        },
        "chapters": {
            "completed": run.chapters_completed,
            "planned": run.volume_count as usize * run.chapter_count_per_volume as usize,
        },
        "current": {
            "volume": run.current_volume_num,
            "chapter": run.current_chapter_num,
        },
        "cost_usd": run.cost_usd,
        "checkpoint_at": run.checkpoint_at,
    })
}

fn print_run(out: &Output, store: &CheckpointStore, run: &RunSummary) {
    out.section(&run.run_id);
    if let Some(title) = &run.title {
        out.field("Title", title);
    }
    out.field("Stage", run.stage);
    out.field(
        "Volumes",
        format!("{}/{}", run.volumes_completed, run.volume_count),
    );
    out.field(
        "Chapters",
        format!(
            "{}/{}",
            run.chapters_completed,
            run.volume_count as usize * run.chapter_count_per_volume as usize
        ),
    );
    out.field("Cost", format!("${:.4}", run.cost_usd));
    out.field("Last checkpoint", &run.checkpoint_at);
    out.field("Directory", store.run_dir(&RunId::from(run.run_id.as_str())).display());

    if !run.stage.is_terminal() {
        out.hint(&format!("Resume with: novelweave generate --resume {}", run.run_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::{GenerationStage, RunState};
    use tempfile::TempDir;

    #[test]
    fn test_json_shape() {
        let mut state = RunState::new(RunId::new("offic_20240101_000000"), "req", 2, 3);
        state.stage = GenerationStage::RoughOutlined;
        let value = to_json(&RunSummary::from(&state));

        assert_eq!(value["stage"], 2);
        assert_eq!(value["stage_name"], "Rough Outlined");
        assert_eq!(value["chapters"]["planned"], 6);
        assert_eq!(value["complete"], false);
    }

    #[test]
    fn test_unknown_run_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = run(Some("missing"), "json", Some(dir.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, NovelError::CheckpointNotFound(_)));
    }

    #[test]
    fn test_empty_workspace_is_ok() {
        let dir = TempDir::new().unwrap();
        assert!(run(None, "json", Some(dir.path().to_path_buf())).is_ok());
    }
}
