//! The reading session controller.
//!
//! State changes happen in one place, `ReadingSession::reduce`, which turns a
//! `SessionMessage` into a list of `SessionEffect`s. The reducer never awaits
//! and never touches the network; the runtime task executes the effects and
//! feeds their outcomes back in as messages. That keeps every ordering rule
//! of the session testable without a runtime.

mod reducer;
mod runtime;

pub use runtime::{ReadingSessionController, SessionHandle, SessionServices, SessionSettings};

use crate::chapter::{Chapter, ChapterKey, Direction, ReadingMode, TocEntry};
use crate::error::{FetchError, FetchFailure};
use crate::guard::{RequestGuard, RequestToken};
use crate::telemetry::ProgressHints;
use serde::Serialize;
use std::sync::Arc;
use ts_rs::TS;

/// Identifies one proximity subscription: the generation it belongs to and
/// the tail chapter it watches. Near-end signals carry the sentinel they
/// were subscribed with so signals aimed at an old tail are recognisable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sentinel {
    pub generation: u64,
    pub tail: u32,
}

#[derive(Debug)]
pub enum SessionMessage {
    Open {
        novel_id: String,
        chapter_number: u32,
        mode: ReadingMode,
    },
    /// Re-run of the view's setup hook. Never issues a second initial fetch.
    Setup,
    Advance(Direction),
    SwitchMode(ReadingMode),
    Retry,
    SelectTocEntry(u32),
    NearEnd(Sentinel),
    FetchCompleted {
        token: RequestToken,
        result: Result<Chapter, FetchFailure>,
    },
    TocLoaded {
        novel_id: String,
        /// Id of the `LoadToc` this answers; superseded loads are dropped.
        request: u64,
        result: Result<Vec<TocEntry>, FetchError>,
    },
    SetVisible(bool),
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEffect {
    Fetch(RequestToken),
    Subscribe(Sentinel),
    Unsubscribe,
    StartHeartbeat { novel_id: String },
    StopHeartbeat,
    LoadToc { novel_id: String, request: u64 },
    SetVisible(bool),
    Shutdown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, TS)]
#[serde(tag = "state", rename_all = "camelCase")]
#[ts(export)]
pub enum LoadStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed {
        message: String,
    },
}

/// Everything a view needs to render the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SessionSnapshot {
    pub novel_id: Option<String>,
    pub mode: ReadingMode,
    #[ts(type = "number")]
    pub generation: u64,
    pub route: Option<ChapterKey>,
    pub cursor: Option<ChapterKey>,
    /// Shared with the session, so publishing a snapshot never copies content.
    pub chapters: Vec<Arc<Chapter>>,
    pub status: LoadStatus,
    pub has_next: bool,
    pub loading_more: bool,
    pub end_of_archive: bool,
    pub last_error: Option<String>,
    /// Size of the loaded chapter index; zero until it arrives or if it failed.
    pub toc_entries: usize,
}

/// Session state owned by the controller task.
#[derive(Debug, Default)]
pub struct ReadingSession {
    novel_id: Option<String>,
    mode: ReadingMode,
    /// Chapter the session was opened on. Does not move as chapters append.
    route: Option<ChapterKey>,
    /// Last chapter in the content list.
    cursor: Option<ChapterKey>,
    guard: RequestGuard,
    chapters: Vec<Arc<Chapter>>,
    has_next: bool,
    status: LoadStatus,
    last_error: Option<String>,
    sentinel: Option<Sentinel>,
    toc: Arc<Vec<TocEntry>>,
    toc_request: u64,
    closed: bool,
}

impl ReadingSession {
    /// `mode` is used until an open request names its own.
    pub fn new(mode: ReadingMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn novel_id(&self) -> Option<&str> {
        self.novel_id.as_deref()
    }

    pub fn mode(&self) -> ReadingMode {
        self.mode
    }

    pub fn generation(&self) -> u64 {
        self.guard.generation()
    }

    pub fn chapters(&self) -> &[Arc<Chapter>] {
        &self.chapters
    }

    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    pub fn sentinel(&self) -> Option<Sentinel> {
        self.sentinel
    }

    pub fn toc(&self) -> Arc<Vec<TocEntry>> {
        Arc::clone(&self.toc)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            novel_id: self.novel_id.clone(),
            mode: self.mode,
            generation: self.guard.generation(),
            route: self.route.clone(),
            cursor: self.cursor.clone(),
            chapters: self.chapters.clone(),
            status: self.status.clone(),
            has_next: self.has_next,
            loading_more: self.guard.flags().next_fetch_in_flight,
            end_of_archive: self.mode == ReadingMode::Continuous
                && self.status == LoadStatus::Ready
                && !self.has_next,
            last_error: self.last_error.clone(),
            toc_entries: self.toc.len(),
        }
    }

    pub fn progress(&self) -> ProgressHints {
        ProgressHints {
            chapter_number: self
                .cursor
                .as_ref()
                .or(self.route.as_ref())
                .map(|key| key.chapter_number),
            mode: self.mode,
            loaded_chapters: self.chapters.len(),
        }
    }
}
