//! Prompt Templates
//!
//! One format function per stage. Each template names the tags or heading
//! format the response parsers expect.

use crate::types::{Chapter, ChapterOutline, DetailedOutline, Intent, RoughOutline};

/// Shared inputs of the per-chapter templates
pub struct ChapterContext<'a> {
    pub intent: &'a Intent,
    pub rough: &'a RoughOutline,
    pub volume_number: u32,
    pub chapter_number: u32,
    pub volume_design: &'a str,
    pub section_word_count: u32,
}

fn join_blocks<T: std::fmt::Display>(items: &[T]) -> String {
    if items.is_empty() {
        return "(none)".to_string();
    }
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn intent(user_input: &str) -> String {
    format!(
        r#"Analyze the following request for a web novel and identify what the author wants.

Request:
{user_input}

Answer with a single JSON object and nothing else:
{{"title": "<novel title>", "description": "<one paragraph premise>", "genre": "<genre>"}}"#
    )
}

pub fn rough_outline(user_input: &str, intent: &Intent, volume_count: u32) -> String {
    format!(
        r#"Design the overall outline of a web novel.

Request: {user_input}
Title: {title}
Genre: {genre}
Premise: {description}
Number of volumes: {volume_count}

Write the worldview inside <worldview_system></worldview_system>, the cast inside
<character_system></character_system>, and exactly {volume_count} volume plans, each
inside its own <volume_design></volume_design> tag, in volume order."#,
        title = intent.title,
        genre = intent.genre,
        description = intent.description,
    )
}

pub fn chapter_outline(
    ctx: &ChapterContext<'_>,
    user_input: &str,
    prior_summary: &str,
    previous: &[ChapterOutline],
) -> String {
    format!(
        r#"Plan chapter {chapter} of volume {volume}.

Request: {user_input}
Premise: {description}
Worldview: {worldview}
Characters: {characters}
Volume plan: {design}
Previous volumes: {prior_summary}
Target length: about {words} words

Recent chapter outlines of this volume:
{previous}

Describe the chapter inside <chapter_overview></chapter_overview> and the characters
who appear inside <characters_content></characters_content>."#,
        chapter = ctx.chapter_number,
        volume = ctx.volume_number,
        description = ctx.intent.description,
        worldview = ctx.rough.worldview_system,
        characters = ctx.rough.character_system,
        design = ctx.volume_design,
        words = ctx.section_word_count,
        previous = join_blocks(previous),
    )
}

pub fn detailed_outline(
    ctx: &ChapterContext<'_>,
    prior_summary: &str,
    chapter_outline: &ChapterOutline,
    previous: &[DetailedOutline],
) -> String {
    format!(
        r#"Expand chapter {chapter} of volume {volume} into a scene-by-scene storyline.

Premise: {description}
Worldview: {worldview}
Characters: {characters}
Volume plan: {design}
Previous volumes: {prior_summary}
Target length: about {words} words

Chapter outline:
{chapter_outline}

Recent storylines of this volume:
{previous}

Write the storyline inside <storyline></storyline>."#,
        chapter = ctx.chapter_number,
        volume = ctx.volume_number,
        description = ctx.intent.description,
        worldview = ctx.rough.worldview_system,
        characters = ctx.rough.character_system,
        design = ctx.volume_design,
        words = ctx.section_word_count,
        previous = join_blocks(previous),
    )
}

pub fn chapter(
    ctx: &ChapterContext<'_>,
    chapter_outline: &ChapterOutline,
    detailed_outline: &DetailedOutline,
    previous: &[Chapter],
) -> String {
    let previous: Vec<String> = previous.iter().map(Chapter::render).collect();
    format!(
        r###"Write chapter {chapter} of the novel "{title}".

Premise: {description}
Worldview: {worldview}
Characters: {characters}
Volume plan: {design}

Chapter outline:
{chapter_outline}

Storyline:
{detailed_outline}

Most recent chapters, for continuity:
{previous}

Write about {words} words in Chinese. Start with a heading line of the form
"## 第{chapter}章 <chapter title>" followed by the chapter text."###,
        chapter = ctx.chapter_number,
        title = ctx.intent.title,
        description = ctx.intent.description,
        worldview = ctx.rough.worldview_system,
        characters = ctx.rough.character_system,
        design = ctx.volume_design,
        words = ctx.section_word_count,
        previous = join_blocks(&previous),
    )
}

pub fn optimize(chapter: &Chapter) -> String {
    format!(
        r#"Polish the following chapter. Keep the plot and length; improve pacing,
dialogue and description. Reply with the rewritten chapter text only, without
a heading.

{content}"#,
        content = chapter.content(),
    )
}

pub fn volume_summary(volume_number: u32, detailed_outlines: &[DetailedOutline]) -> String {
    format!(
        r#"Summarize the plot of volume {volume_number} in one paragraph, based on its
chapter storylines:

{storylines}"#,
        storylines = join_blocks(detailed_outlines),
    )
}
