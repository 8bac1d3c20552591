//! Response Parsing
//!
//! Turns raw LLM text into an `Intent` or a `Chapter`. Both parsers fail
//! loudly instead of guessing; parse failures are never retried.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::ai::extract_json;
use crate::types::{Chapter, Intent, NovelError, Result};

/// `## 第<n>章 <title>` with Arabic or Chinese numerals
static CHAPTER_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(## 第[0-9零一二三四五六七八九十百千两]+章 .+?)[ \t]*\r?$")
        .expect("Valid chapter heading regex")
});

/// Parse the intent JSON object out of an analysis response
pub fn parse_intent(response: &str) -> Result<Intent> {
    let value = extract_json(response).ok_or_else(|| {
        NovelError::IntentParse(format!(
            "no JSON object in response: {}",
            response.chars().take(120).collect::<String>()
        ))
    })?;

    let field = |name: &str| -> Result<String> {
        value
            .get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| NovelError::IntentParse(format!("missing field '{}'", name)))
    };

    Ok(Intent {
        title: field("title")?,
        description: field("description")?,
        genre: field("genre")?,
    })
}

/// Split a chapter response into heading and body
///
/// The title is the first heading line; the content is everything else,
/// trimmed.
pub fn parse_chapter(response: &str) -> Result<Chapter> {
    let heading = CHAPTER_HEADING
        .captures(response)
        .ok_or(NovelError::ChapterTitleNotFound)?;

    let (Some(line), Some(title)) = (heading.get(0), heading.get(1)) else {
        return Err(NovelError::ChapterTitleNotFound);
    };

    let content = format!(
        "{}{}",
        &response[..line.start()],
        &response[line.end()..]
    );
    Chapter::new(title.as_str().trim(), content.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body() -> String {
        "林凡盯着屏幕上的提示，心跳越来越快。".repeat(8)
    }

    #[test]
    fn test_parse_intent_from_fenced_json() {
        let response = "好的，分析如下：\n```json\n{\"title\": \"职场系统\", \"description\": \"一个社畜获得系统\", \"genre\": \"都市\"}\n```";
        let intent = parse_intent(response).unwrap();
        assert_eq!(intent.title, "职场系统");
        assert_eq!(intent.description, "一个社畜获得系统");
        assert_eq!(intent.genre, "都市");
    }

    #[test]
    fn test_parse_intent_missing_field() {
        let err = parse_intent(r#"{"title": "t", "description": "d"}"#).unwrap_err();
        match err {
            NovelError::IntentParse(msg) => assert!(msg.contains("genre")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_parse_intent_blank_field() {
        assert!(parse_intent(r#"{"title": " ", "description": "d", "genre": "g"}"#).is_err());
    }

    #[test]
    fn test_parse_intent_no_json() {
        assert!(matches!(
            parse_intent("I would rather not."),
            Err(NovelError::IntentParse(_))
        ));
    }

    #[test]
    fn test_heading_pattern_matches_arabic_and_chinese_numerals() {
        for heading in ["## 第7章 加班", "## 第两百零一章 终局", "  ## 第3章 尾随空白  "] {
            let caps = CHAPTER_HEADING.captures(heading).unwrap();
            assert_eq!(&caps[1], heading.trim());
        }
        assert!(CHAPTER_HEADING.captures("## 第X章 错误").is_none());
    }

    #[test]
    fn test_parse_chapter_splits_title() {
        let response = format!("## 第1章 系统觉醒\n\n{}\n", body());
        let chapter = parse_chapter(&response).unwrap();
        assert_eq!(chapter.title(), "## 第1章 系统觉醒");
        assert_eq!(chapter.content(), body());
    }

    #[test]
    fn test_parse_chapter_heading_after_preamble() {
        let response = format!("前言文字\n## 第十二章 加薪\n{}", body());
        let chapter = parse_chapter(&response).unwrap();
        assert_eq!(chapter.title(), "## 第十二章 加薪");
        assert!(chapter.content().starts_with("前言文字"));
        assert!(!chapter.content().contains("## 第"));
    }

    #[test]
    fn test_parse_chapter_first_heading_wins() {
        let response = format!("## 第2章 上\n{}\n## 第3章 下\n", body());
        let chapter = parse_chapter(&response).unwrap();
        assert_eq!(chapter.title(), "## 第2章 上");
        assert!(chapter.content().ends_with("## 第3章 下"));
    }

    #[test]
    fn test_parse_chapter_without_heading() {
        assert!(matches!(
            parse_chapter(&body()),
            Err(NovelError::ChapterTitleNotFound)
        ));
        assert!(matches!(
            parse_chapter(&format!("# Chapter 1\n{}", body())),
            Err(NovelError::ChapterTitleNotFound)
        ));
    }

    #[test]
    fn test_parse_chapter_short_content() {
        assert!(matches!(
            parse_chapter("## 第1章 开端\n太短"),
            Err(NovelError::InvalidChapter(_))
        ));
    }
}
