//! Plain-text rendering for the terminal reader.

use crate::chapter::Chapter;
use crate::session::{LoadStatus, SessionSnapshot};
use crate::toc::TocPage;
use std::fmt::Write as _;
use tracing::warn;

/// Render one chapter: a heading line followed by the de-marked body.
pub fn render_chapter(chapter: &Chapter, width: usize) -> String {
    let width = width.max(20);
    let body = match html2text::from_read(chapter.content.as_bytes(), width) {
        Ok(clean) => clean,
        Err(err) => {
            warn!(chapter = %chapter.key, "html2text failed: {err}");
            chapter.content.clone()
        }
    };
    let heading = format!("Chapter {}: {}", chapter.key.chapter_number, chapter.title);
    let rule = "=".repeat(heading.chars().count().min(width));
    format!("{heading}\n{rule}\n\n{}\n", body.trim_end())
}

pub fn render_toc_page(page: &TocPage) -> String {
    let mut out = format!(
        "Contents, page {}/{} ({} chapters)\n",
        page.page_number, page.page_count, page.total_entries
    );
    for entry in &page.entries {
        let lock = if entry.locked { " [locked]" } else { "" };
        let _ = writeln!(out, "{:>5}  {}{lock}", entry.chapter_number, entry.title);
    }
    out
}

/// One-line summary of where the session stands.
pub fn render_status(snapshot: &SessionSnapshot) -> String {
    let position = snapshot
        .cursor
        .as_ref()
        .or(snapshot.route.as_ref())
        .map_or_else(|| "-".to_string(), ToString::to_string);
    let state = match &snapshot.status {
        LoadStatus::Idle => "idle".to_string(),
        LoadStatus::Loading => "loading".to_string(),
        LoadStatus::Ready if snapshot.end_of_archive => "end of archive".to_string(),
        LoadStatus::Ready if snapshot.loading_more => "loading more".to_string(),
        LoadStatus::Ready => "ready".to_string(),
        LoadStatus::Failed { message } => format!("failed: {message}"),
    };
    format!(
        "[{position} | {} | {} loaded | {state}]",
        snapshot.mode,
        snapshot.chapters.len()
    )
}
