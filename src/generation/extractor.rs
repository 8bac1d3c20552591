//! Outline Extraction
//!
//! Pulls `<tag>...</tag>` sections out of an LLM response and builds the
//! outline record for the requested kind. Scalar tags take the first match,
//! `volume_design` takes every match. Captured text is trimmed.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::types::{
    ChapterOutline, DetailedOutline, NovelError, Outline, OutlineKind, Result, RoughOutline,
};

/// One compiled pattern per known tag
static TAG_PATTERNS: LazyLock<HashMap<&'static str, Regex>> = LazyLock::new(|| {
    [
        OutlineKind::Rough,
        OutlineKind::Chapter,
        OutlineKind::Detailed,
    ]
    .iter()
    .flat_map(|kind| kind.required_tags().iter().copied())
    .map(|tag| {
        let re = Regex::new(&format!(r"(?s)<{tag}>(.*?)</{tag}>")).expect("Valid tag regex");
        (tag, re)
    })
    .collect()
});

fn pattern(tag: &str) -> Result<&'static Regex> {
    TAG_PATTERNS
        .get(tag)
        .ok_or_else(|| NovelError::missing_content(tag))
}

/// First occurrence of `tag`, trimmed
fn first(response: &str, tag: &str) -> Result<String> {
    pattern(tag)?
        .captures(response)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .ok_or_else(|| NovelError::missing_content(tag))
}

/// Every occurrence of `tag`, trimmed; at least one is required
fn all(response: &str, tag: &str) -> Result<Vec<String>> {
    let found: Vec<String> = pattern(tag)?
        .captures_iter(response)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .collect();

    if found.is_empty() {
        return Err(NovelError::missing_content(tag));
    }
    Ok(found)
}

/// Parse a tagged response into an outline of the given kind
pub fn extract(response: &str, kind: OutlineKind) -> Result<Outline> {
    Ok(match kind {
        OutlineKind::Rough => Outline::Rough(extract_rough(response)?),
        OutlineKind::Chapter => Outline::Chapter(extract_chapter(response)?),
        OutlineKind::Detailed => Outline::Detailed(extract_detailed(response)?),
    })
}

pub fn extract_rough(response: &str) -> Result<RoughOutline> {
    Ok(RoughOutline {
        worldview_system: first(response, "worldview_system")?,
        character_system: first(response, "character_system")?,
        volume_design: all(response, "volume_design")?,
    })
}

pub fn extract_chapter(response: &str) -> Result<ChapterOutline> {
    Ok(ChapterOutline {
        chapter_overview: first(response, "chapter_overview")?,
        characters_content: first(response, "characters_content")?,
    })
}

pub fn extract_detailed(response: &str) -> Result<DetailedOutline> {
    Ok(DetailedOutline {
        storyline: first(response, "storyline")?,
    })
}
