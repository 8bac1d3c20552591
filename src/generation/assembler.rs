//! Result assembly: folds finished volumes into the final `Novel`.

use crate::types::{CostInfo, Intent, Novel, NovelError, Result, RoughOutline, Volume};

pub struct ResultAssembler;

impl ResultAssembler {
    /// Build the novel, rejecting volume lists that are not numbered `1..=N`
    /// or whose chapter sequences are out of step
    pub fn assemble(
        intent: Intent,
        rough_outline: RoughOutline,
        volumes: Vec<Volume>,
        cost_info: CostInfo,
    ) -> Result<Novel> {
        for (idx, volume) in volumes.iter().enumerate() {
            let expected = idx as u32 + 1;
            if volume.volume_number != expected {
                return Err(NovelError::InvalidNovelStructure(format!(
                    "volume at position {} is numbered {}, expected {}",
                    idx, volume.volume_number, expected
                )));
            }
            if !volume.is_lockstep() {
                return Err(NovelError::InvalidNovelStructure(format!(
                    "volume {} has {} chapter outlines, {} detailed outlines and {} chapters",
                    volume.volume_number,
                    volume.chapter_outlines.len(),
                    volume.detailed_outlines.len(),
                    volume.chapters.len()
                )));
            }
        }

        Ok(Novel {
            intent,
            rough_outline,
            volumes,
            cost_info,
        })
    }
}
