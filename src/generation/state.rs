//! Run State
//!
//! The checkpointed snapshot of a generation run and the stage enum that
//! marks how far it got.
//!
//! ## Schema
//!
//! - `version`: rejected on load when newer than this build supports
//! - `checksum`: CRC32 of the serialized snapshot with `checksum = 0`
//! - `volumes`: completed volumes only
//! - `current_volume`: the in-progress volume, completed chapters only
//! - `current_*` fragments: the chapter being generated, discarded on resume

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::generation::CHECKPOINT_VERSION;
use crate::types::{
    Chapter, ChapterOutline, CostInfo, DetailedOutline, Intent, NovelError, Result, RoughOutline,
    RunId, Volume,
};

// =============================================================================
// Generation Stage
// =============================================================================

/// Last stage a run completed, in strict forward order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum GenerationStage {
    Start = 0,
    IntentAnalyzed = 1,
    RoughOutlined = 2,
    ChapterOutlined = 3,
    DetailedOutlined = 4,
    ChapterGenerated = 5,
    ChapterOptimized = 6,
    ChapterAppended = 7,
    VolumeAppended = 8,
    NovelAssembled = 9,
}

impl GenerationStage {
    /// Total number of stages
    pub const COUNT: usize = 10;

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "Start",
            Self::IntentAnalyzed => "Intent Analyzed",
            Self::RoughOutlined => "Rough Outlined",
            Self::ChapterOutlined => "Chapter Outlined",
            Self::DetailedOutlined => "Detailed Outlined",
            Self::ChapterGenerated => "Chapter Generated",
            Self::ChapterOptimized => "Chapter Optimized",
            Self::ChapterAppended => "Chapter Appended",
            Self::VolumeAppended => "Volume Appended",
            Self::NovelAssembled => "Novel Assembled",
        }
    }

    pub fn from_u8(stage: u8) -> Option<Self> {
        match stage {
            0 => Some(Self::Start),
            1 => Some(Self::IntentAnalyzed),
            2 => Some(Self::RoughOutlined),
            3 => Some(Self::ChapterOutlined),
            4 => Some(Self::DetailedOutlined),
            5 => Some(Self::ChapterGenerated),
            6 => Some(Self::ChapterOptimized),
            7 => Some(Self::ChapterAppended),
            8 => Some(Self::VolumeAppended),
            9 => Some(Self::NovelAssembled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self == Self::NovelAssembled
    }
}

impl std::fmt::Display for GenerationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl From<GenerationStage> for u8 {
    fn from(stage: GenerationStage) -> Self {
        stage.as_u8()
    }
}

impl TryFrom<u8> for GenerationStage {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        Self::from_u8(value).ok_or_else(|| format!("unknown generation stage {}", value))
    }
}

// =============================================================================
// Run State
// =============================================================================

fn default_version() -> u32 {
    CHECKPOINT_VERSION
}

/// Durable snapshot of a generation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub checksum: u32,

    pub run_id: RunId,
    pub user_input: String,

    /// Planned shape, fixed when the run starts
    pub volume_count: u32,
    pub chapter_count_per_volume: u32,

    pub stage: GenerationStage,

    #[serde(default)]
    pub intent: Option<Intent>,
    #[serde(default)]
    pub rough_outline: Option<RoughOutline>,

    /// Completed volumes, numbered 1..=len
    #[serde(default)]
    pub volumes: Vec<Volume>,
    #[serde(default)]
    pub current_volume: Option<Volume>,

    #[serde(default)]
    pub current_volume_num: u32,
    #[serde(default)]
    pub current_chapter_num: u32,
    #[serde(default)]
    pub current_chapter_outline: Option<ChapterOutline>,
    #[serde(default)]
    pub current_detailed_outline: Option<DetailedOutline>,
    #[serde(default)]
    pub current_chapter: Option<Chapter>,

    #[serde(default)]
    pub cost_info: CostInfo,

    pub checkpoint_at: String,
}

impl RunState {
    pub fn new(
        run_id: RunId,
        user_input: impl Into<String>,
        volume_count: u32,
        chapter_count_per_volume: u32,
    ) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            checksum: 0,
            run_id,
            user_input: user_input.into(),
            volume_count,
            chapter_count_per_volume,
            stage: GenerationStage::Start,
            intent: None,
            rough_outline: None,
            volumes: Vec::new(),
            current_volume: None,
            current_volume_num: 0,
            current_chapter_num: 0,
            current_chapter_outline: None,
            current_detailed_outline: None,
            current_chapter: None,
            cost_info: CostInfo::default(),
            checkpoint_at: chrono::Local::now().to_rfc3339(),
        }
    }

    /// Update checkpoint timestamp
    pub fn touch(&mut self) {
        self.checkpoint_at = chrono::Local::now().to_rfc3339();
    }

    /// Drop the fragments of a chapter that was not yet appended
    pub fn discard_in_flight(&mut self) {
        self.current_chapter_outline = None;
        self.current_detailed_outline = None;
        self.current_chapter = None;
    }

    /// Number of chapters completed across finished and in-progress volumes
    pub fn chapters_completed(&self) -> usize {
        self.volumes.iter().map(Volume::chapter_count).sum::<usize>()
            + self
                .current_volume
                .as_ref()
                .map(Volume::chapter_count)
                .unwrap_or(0)
    }

    /// Serialize with checksum for storage
    pub fn to_json(&self) -> Result<String> {
        let mut value = serde_json::to_value(self)?;
        let checksum = checksum_of(&mut value)?;
        value["checksum"] = Value::from(checksum);
        Ok(serde_json::to_string_pretty(&value)?)
    }

    /// Deserialize, rejecting newer schemas and checksum mismatches
    pub fn from_json(json: &str) -> Result<Self> {
        let mut value: Value = serde_json::from_str(json)
            .map_err(|e| NovelError::CheckpointCorrupted(format!("invalid JSON: {}", e)))?;

        let version = value
            .get("version")
            .and_then(Value::as_u64)
            .unwrap_or(CHECKPOINT_VERSION as u64);
        if version > CHECKPOINT_VERSION as u64 {
            return Err(NovelError::CheckpointCorrupted(format!(
                "checkpoint version {} is newer than supported version {}",
                version, CHECKPOINT_VERSION
            )));
        }

        let stored = value.get("checksum").and_then(Value::as_u64).unwrap_or(0);
        if stored != 0 {
            let computed = checksum_of(&mut value)?;
            if stored != computed as u64 {
                return Err(NovelError::CheckpointCorrupted(format!(
                    "checksum mismatch (expected {}, got {})",
                    stored, computed
                )));
            }
            value["checksum"] = Value::from(stored);
        }

        serde_json::from_value(value)
            .map_err(|e| NovelError::CheckpointCorrupted(format!("invalid snapshot: {}", e)))
    }
}

/// CRC32 over the compact serialization with the checksum field zeroed
fn checksum_of(value: &mut Value) -> Result<u32> {
    if let Some(obj) = value.as_object_mut() {
        obj.insert("checksum".to_string(), Value::from(0u32));
    }
    let bytes = serde_json::to_vec(value)?;
    Ok(crc32fast::hash(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> RunState {
        let mut state = RunState::new(
            RunId::new("office_20240101_000000"),
            "office worker gains a system",
            2,
            2,
        );
        state.stage = GenerationStage::ChapterOutlined;
        state.intent = Some(Intent {
            title: "System Clerk".to_string(),
            description: "office worker gains a system".to_string(),
            genre: "urban".to_string(),
        });
        state.current_volume = Some(Volume::new(1));
        state.current_volume_num = 1;
        state.current_chapter_num = 1;
        state.current_chapter_outline = Some(ChapterOutline {
            chapter_overview: "The clerk hears a mechanical voice".to_string(),
            characters_content: "Lin Fan, his manager".to_string(),
        });
        state.cost_info = CostInfo {
            accumulated: 0.3,
            history: vec![0.1, 0.2],
        };
        state
    }

    #[test]
    fn test_stage_roundtrip_u8() {
        for n in 0..GenerationStage::COUNT as u8 {
            let stage = GenerationStage::from_u8(n).unwrap();
            assert_eq!(stage.as_u8(), n);
        }
        assert_eq!(GenerationStage::from_u8(10), None);
    }

    #[test]
    fn test_stage_order() {
        assert!(GenerationStage::Start < GenerationStage::IntentAnalyzed);
        assert!(GenerationStage::ChapterAppended < GenerationStage::VolumeAppended);
        assert!(GenerationStage::NovelAssembled.is_terminal());
        assert_eq!(GenerationStage::RoughOutlined.name(), "Rough Outlined");
    }

    #[test]
    fn test_stage_serializes_as_number() {
        let json = serde_json::to_string(&GenerationStage::DetailedOutlined).unwrap();
        assert_eq!(json, "4");
        assert!(serde_json::from_str::<GenerationStage>("42").is_err());
    }

    #[test]
    fn test_json_roundtrip_with_checksum() {
        let state = sample_state();
        let json = state.to_json().unwrap();
        let loaded = RunState::from_json(&json).unwrap();

        assert_ne!(loaded.checksum, 0);
        assert_eq!(RunState { checksum: 0, ..loaded }, state);
    }

    #[test]
    fn test_checksum_survives_inexact_costs() {
        let mut state = sample_state();
        state.cost_info = CostInfo {
            accumulated: 0.1 + 0.2,
            history: vec![6.1499999999999996e-6, 0.030000000000000002, 0.1 + 0.2],
        };
        let loaded = RunState::from_json(&state.to_json().unwrap()).unwrap();
        assert_eq!(loaded.cost_info, state.cost_info);

        for tokens in 1..500u32 {
            state.cost_info.history = (0..14)
                .map(|i| f64::from(tokens + i) * 0.00015 / 1000.0)
                .collect();
            state.cost_info.accumulated = state.cost_info.history.iter().sum();
            let json = state.to_json().unwrap();
            assert!(RunState::from_json(&json).is_ok(), "tokens={tokens}");
        }
    }

    #[test]
    fn test_tampered_checkpoint_rejected() {
        let json = sample_state().to_json().unwrap();
        let tampered = json.replace("urban", "xianxia");
        assert!(matches!(
            RunState::from_json(&tampered),
            Err(NovelError::CheckpointCorrupted(_))
        ));
    }

    #[test]
    fn test_zero_checksum_skips_verification() {
        let mut value = serde_json::to_value(sample_state()).unwrap();
        value["checksum"] = Value::from(0);
        value["user_input"] = Value::from("edited by hand");
        let loaded = RunState::from_json(&value.to_string()).unwrap();
        assert_eq!(loaded.user_input, "edited by hand");
    }

    #[test]
    fn test_newer_version_rejected() {
        let mut value = serde_json::to_value(sample_state()).unwrap();
        value["version"] = Value::from(CHECKPOINT_VERSION + 1);
        let err = RunState::from_json(&value.to_string()).unwrap_err();
        assert!(err.to_string().contains("newer"));
    }

    #[test]
    fn test_discard_in_flight() {
        let mut state = sample_state();
        state.discard_in_flight();
        assert!(state.current_chapter_outline.is_none());
        assert_eq!(state.current_volume, Some(Volume::new(1)));
        assert_eq!(state.chapters_completed(), 0);
    }
}
