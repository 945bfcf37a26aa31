//! Chapter identity and the content units moved around by the engine.
//!
//! A chapter is addressed by `ChapterKey` everywhere: the content source,
//! the table of contents and the session controller all agree on
//! `(novel_id, chapter_number)` as the one canonical identity.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use ts_rs::TS;

/// Lowest chapter number a novel can start at.
pub const FIRST_CHAPTER_NUMBER: u32 = 1;

/// Structural identity of a content unit.
///
/// Keys are only comparable within the same novel; `partial_cmp` returns
/// `None` across novels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ChapterKey {
    pub novel_id: String,
    pub chapter_number: u32,
}

impl ChapterKey {
    pub fn new(novel_id: impl Into<String>, chapter_number: u32) -> Self {
        Self {
            novel_id: novel_id.into(),
            chapter_number,
        }
    }

    /// `None` once chapter numbers are exhausted.
    pub fn successor(&self) -> Option<Self> {
        Some(Self {
            novel_id: self.novel_id.clone(),
            chapter_number: self.chapter_number.checked_add(1)?,
        })
    }

    pub fn predecessor(&self) -> Option<Self> {
        let previous = self.chapter_number.checked_sub(1)?;
        if previous < FIRST_CHAPTER_NUMBER {
            return None;
        }
        Some(Self {
            novel_id: self.novel_id.clone(),
            chapter_number: previous,
        })
    }

    pub fn neighbor(&self, direction: Direction) -> Option<Self> {
        match direction {
            Direction::Previous => self.predecessor(),
            Direction::Next => self.successor(),
        }
    }
}

impl PartialOrd for ChapterKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.novel_id != other.novel_id {
            return None;
        }
        Some(self.chapter_number.cmp(&other.chapter_number))
    }
}

impl fmt::Display for ChapterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.novel_id, self.chapter_number)
    }
}

/// One delivered content unit.
///
/// `has_next` is the content source's hint that a successor exists; nothing
/// verifies it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Chapter {
    pub key: ChapterKey,
    pub title: String,
    pub content: String,
    pub has_next: bool,
}

/// Presentation mode supplied by the settings collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ReadingMode {
    #[default]
    Single,
    Continuous,
}

impl fmt::Display for ReadingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ReadingMode::Single => "single",
            ReadingMode::Continuous => "continuous",
        };
        write!(f, "{}", label)
    }
}

/// Explicit previous/next navigation in single mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Direction {
    Previous,
    Next,
}

/// One row of a novel's full chapter index.
///
/// `locked` comes from the paywall collaborator and is only displayed; the
/// engine never enforces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TocEntry {
    pub chapter_number: u32,
    pub title: String,
    #[serde(default)]
    pub locked: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_order_by_chapter_number_within_a_novel() {
        let a = ChapterKey::new("novel-42", 5);
        let b = ChapterKey::new("novel-42", 6);
        assert!(a < b);
        assert_eq!(a.successor(), Some(b.clone()));
        assert_eq!(b.predecessor(), Some(a));
    }

    #[test]
    fn keys_from_different_novels_are_unordered() {
        let a = ChapterKey::new("novel-1", 5);
        let b = ChapterKey::new("novel-2", 6);
        assert_eq!(a.partial_cmp(&b), None);
        assert_ne!(a, b);
    }

    #[test]
    fn first_chapter_has_no_predecessor() {
        let first = ChapterKey::new("novel-42", FIRST_CHAPTER_NUMBER);
        assert_eq!(first.predecessor(), None);
        assert_eq!(first.neighbor(Direction::Previous), None);
        assert_eq!(
            first.neighbor(Direction::Next),
            Some(ChapterKey::new("novel-42", 2))
        );
    }

    #[test]
    fn last_representable_chapter_has_no_successor() {
        let last = ChapterKey::new("novel-42", u32::MAX);
        assert_eq!(last.successor(), None);
        assert_eq!(last.neighbor(Direction::Next), None);
    }

    #[test]
    fn toc_entry_defaults_to_unlocked() {
        let entry: TocEntry =
            serde_json::from_str(r#"{"chapterNumber":3,"title":"Embers"}"#).unwrap();
        assert_eq!(entry.chapter_number, 3);
        assert!(!entry.locked);
    }
}
