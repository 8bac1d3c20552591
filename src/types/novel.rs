//! Novel domain records
//!
//! Intent, the three outline levels, chapters, volumes and the assembled
//! novel. Records that carry invariants can only be built through
//! validating constructors, and deserialization goes through the same path.

use serde::{Deserialize, Serialize};

use super::error::{NovelError, Result};
use crate::constants::generation::{MIN_CHAPTER_CONTENT_CHARS, MIN_OUTLINE_FIELD_CHARS};

// =============================================================================
// Intent
// =============================================================================

/// What the user asked for, as understood by the first LLM call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub title: String,
    pub description: String,
    pub genre: String,
}

// =============================================================================
// Outlines
// =============================================================================

/// Outline granularity, selects the required tags during extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlineKind {
    Rough,
    Chapter,
    Detailed,
}

impl OutlineKind {
    /// Tags that must be present in a response of this kind
    pub fn required_tags(&self) -> &'static [&'static str] {
        match self {
            Self::Rough => &["worldview_system", "character_system", "volume_design"],
            Self::Chapter => &["chapter_overview", "characters_content"],
            Self::Detailed => &["storyline"],
        }
    }
}

impl std::fmt::Display for OutlineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rough => write!(f, "rough"),
            Self::Chapter => write!(f, "chapter"),
            Self::Detailed => write!(f, "detailed"),
        }
    }
}

/// Novel-level outline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoughOutline {
    pub worldview_system: String,
    pub character_system: String,
    /// One design text per planned volume
    pub volume_design: Vec<String>,
}

impl RoughOutline {
    /// Design text for a 1-based volume number, empty when the outline is short
    pub fn volume_design_for(&self, volume_number: u32) -> &str {
        (volume_number as usize)
            .checked_sub(1)
            .and_then(|idx| self.volume_design.get(idx))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Per-chapter outline, produced before the detailed outline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterOutline {
    pub chapter_overview: String,
    pub characters_content: String,
}

impl std::fmt::Display for ChapterOutline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Overview: {}\nCharacters: {}",
            self.chapter_overview, self.characters_content
        )
    }
}

/// Per-chapter storyline, consumed by content generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailedOutline {
    pub storyline: String,
}

impl std::fmt::Display for DetailedOutline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.storyline)
    }
}

/// Any of the three outline levels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outline_type", rename_all = "lowercase")]
pub enum Outline {
    Rough(RoughOutline),
    Chapter(ChapterOutline),
    Detailed(DetailedOutline),
}

impl Outline {
    pub fn kind(&self) -> OutlineKind {
        match self {
            Self::Rough(_) => OutlineKind::Rough,
            Self::Chapter(_) => OutlineKind::Chapter,
            Self::Detailed(_) => OutlineKind::Detailed,
        }
    }

    /// Reject fields that are blank or too short to be meaningful
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Rough(rough) => {
                check_field("worldview_system", &rough.worldview_system)?;
                check_field("character_system", &rough.character_system)?;
                if rough.volume_design.is_empty() {
                    return Err(NovelError::InvalidOutline {
                        field: "volume_design".to_string(),
                    });
                }
                for (idx, design) in rough.volume_design.iter().enumerate() {
                    check_field(&format!("volume_design[{}]", idx), design)?;
                }
                Ok(())
            }
            Self::Chapter(chapter) => {
                check_field("chapter_overview", &chapter.chapter_overview)?;
                check_field("characters_content", &chapter.characters_content)
            }
            Self::Detailed(detailed) => check_field("storyline", &detailed.storyline),
        }
    }

    /// Canonical tagged form, the inverse of extraction
    pub fn to_tagged(&self) -> String {
        let mut out = String::new();
        match self {
            Self::Rough(rough) => {
                push_tag(&mut out, "worldview_system", &rough.worldview_system);
                push_tag(&mut out, "character_system", &rough.character_system);
                for design in &rough.volume_design {
                    push_tag(&mut out, "volume_design", design);
                }
            }
            Self::Chapter(chapter) => {
                push_tag(&mut out, "chapter_overview", &chapter.chapter_overview);
                push_tag(&mut out, "characters_content", &chapter.characters_content);
            }
            Self::Detailed(detailed) => push_tag(&mut out, "storyline", &detailed.storyline),
        }
        out
    }
}

fn check_field(field: &str, value: &str) -> Result<()> {
    if value.trim().chars().count() < MIN_OUTLINE_FIELD_CHARS {
        return Err(NovelError::InvalidOutline {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn push_tag(out: &mut String, tag: &str, value: &str) {
    out.push_str(&format!("<{tag}>\n{value}\n</{tag}>\n"));
}

// =============================================================================
// Chapter
// =============================================================================

/// A generated chapter with a heading-style title and non-trivial content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawChapter")]
pub struct Chapter {
    title: String,
    content: String,
}

#[derive(Deserialize)]
struct RawChapter {
    title: String,
    content: String,
}

impl TryFrom<RawChapter> for Chapter {
    type Error = NovelError;

    fn try_from(raw: RawChapter) -> Result<Self> {
        Chapter::new(raw.title, raw.content)
    }
}

impl Chapter {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Result<Self> {
        let title = title.into();
        let content = content.into();

        if title.trim().is_empty() {
            return Err(NovelError::InvalidChapter("title is empty".to_string()));
        }

        let len = content.chars().count();
        if len < MIN_CHAPTER_CONTENT_CHARS {
            return Err(NovelError::InvalidChapter(format!(
                "content has {} characters, at least {} required",
                len, MIN_CHAPTER_CONTENT_CHARS
            )));
        }

        Ok(Self { title, content })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Replace the content, keeping the title
    pub fn with_content(&self, content: impl Into<String>) -> Result<Self> {
        Self::new(self.title.clone(), content)
    }

    /// Title and content as fed back into continuation prompts
    pub fn render(&self) -> String {
        format!("{}\n{}", self.title, self.content)
    }
}

// =============================================================================
// Volume
// =============================================================================

/// A volume whose outline and chapter sequences grow in lock-step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub volume_number: u32,
    #[serde(default)]
    pub chapter_outlines: Vec<ChapterOutline>,
    #[serde(default)]
    pub detailed_outlines: Vec<DetailedOutline>,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
    /// Outline summary handed to the next volume
    #[serde(default)]
    pub summary: Option<String>,
}

impl Volume {
    pub fn new(volume_number: u32) -> Self {
        Self {
            volume_number,
            chapter_outlines: Vec::new(),
            detailed_outlines: Vec::new(),
            chapters: Vec::new(),
            summary: None,
        }
    }

    /// Append one completed chapter together with its outlines
    pub fn push_chapter(
        &mut self,
        chapter_outline: ChapterOutline,
        detailed_outline: DetailedOutline,
        chapter: Chapter,
    ) {
        self.chapter_outlines.push(chapter_outline);
        self.detailed_outlines.push(detailed_outline);
        self.chapters.push(chapter);
    }

    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_lockstep(&self) -> bool {
        self.chapter_outlines.len() == self.chapters.len()
            && self.detailed_outlines.len() == self.chapters.len()
    }

    pub fn is_complete(&self, chapters_per_volume: u32) -> bool {
        self.is_lockstep() && self.chapters.len() == chapters_per_volume as usize
    }
}

// =============================================================================
// Cost Snapshot
// =============================================================================

/// Accumulated cost of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostInfo {
    pub accumulated: f64,
    #[serde(default)]
    pub history: Vec<f64>,
}

// =============================================================================
// Novel
// =============================================================================

/// Terminal artifact of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Novel {
    pub intent: Intent,
    pub rough_outline: RoughOutline,
    pub volumes: Vec<Volume>,
    #[serde(default)]
    pub cost_info: CostInfo,
}

impl Novel {
    pub fn chapter_count(&self) -> usize {
        self.volumes.iter().map(Volume::chapter_count).sum()
    }

    /// Render the whole novel as a single markdown document
    pub fn to_markdown(&self) -> String {
        let mut out = format!("# {}\n\n", self.intent.title);
        for volume in &self.volumes {
            out.push_str(&format!("# Volume {}\n\n", volume.volume_number));
            for chapter in &volume.chapters {
                out.push_str(chapter.title());
                out.push_str("\n\n");
                out.push_str(chapter.content());
                out.push_str("\n\n");
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_text(seed: &str) -> String {
        seed.repeat(MIN_CHAPTER_CONTENT_CHARS / seed.chars().count() + 1)
    }

    #[test]
    fn test_chapter_rejects_short_content() {
        let err = Chapter::new("## 第1章 开端", "太短了").unwrap_err();
        assert!(matches!(err, NovelError::InvalidChapter(_)));
    }

    #[test]
    fn test_chapter_rejects_empty_title() {
        let err = Chapter::new("  ", long_text("内容")).unwrap_err();
        assert!(matches!(err, NovelError::InvalidChapter(_)));
    }

    #[test]
    fn test_chapter_counts_characters_not_bytes() {
        // 100 CJK characters are 300 bytes, exactly at the limit
        let content = "字".repeat(MIN_CHAPTER_CONTENT_CHARS);
        assert!(Chapter::new("## 第1章 开端", content).is_ok());

        let content = "字".repeat(MIN_CHAPTER_CONTENT_CHARS - 1);
        assert!(Chapter::new("## 第1章 开端", content).is_err());
    }

    #[test]
    fn test_chapter_with_content_keeps_title() {
        let chapter = Chapter::new("## 第2章 转折", long_text("原文")).unwrap();
        let rewritten = chapter.with_content(long_text("新文")).unwrap();
        assert_eq!(rewritten.title(), "## 第2章 转折");
        assert!(rewritten.content().starts_with("新文"));
    }

    #[test]
    fn test_chapter_deserialize_validates() {
        let json = r###"{"title": "## 第1章 开端", "content": "short"}"###;
        assert!(serde_json::from_str::<Chapter>(json).is_err());
    }

    #[test]
    fn test_volume_design_out_of_range_is_empty() {
        let rough = RoughOutline {
            worldview_system: "a world of office politics".to_string(),
            character_system: "an ordinary clerk and rivals".to_string(),
            volume_design: vec!["volume one: the system awakens".to_string()],
        };
        assert_eq!(rough.volume_design_for(1), "volume one: the system awakens");
        assert_eq!(rough.volume_design_for(2), "");
        assert_eq!(rough.volume_design_for(0), "");
    }

    #[test]
    fn test_outline_validate_names_field() {
        let outline = Outline::Chapter(ChapterOutline {
            chapter_overview: "the hero meets the system".to_string(),
            characters_content: "hi".to_string(),
        });
        match outline.validate() {
            Err(NovelError::InvalidOutline { field }) => assert_eq!(field, "characters_content"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_volume_lockstep() {
        let mut volume = Volume::new(1);
        assert!(volume.is_lockstep());
        assert!(!volume.is_complete(1));

        volume.push_chapter(
            ChapterOutline {
                chapter_overview: "overview text".to_string(),
                characters_content: "characters text".to_string(),
            },
            DetailedOutline {
                storyline: "storyline text".to_string(),
            },
            Chapter::new("## 第1章 开端", long_text("正文")).unwrap(),
        );
        assert!(volume.is_complete(1));
        assert_eq!(volume.chapter_count(), 1);
    }
}
