use super::{LoadStatus, ReadingSession, Sentinel, SessionEffect, SessionMessage};
use crate::chapter::{Chapter, ChapterKey, Direction, FIRST_CHAPTER_NUMBER, ReadingMode, TocEntry};
use crate::error::{FetchError, FetchFailure};
use crate::guard::{Completion, FetchKind, RequestToken};
use std::sync::Arc;
use tracing::{debug, info, warn};

impl ReadingSession {
    pub fn reduce(&mut self, message: SessionMessage) -> Vec<SessionEffect> {
        let mut effects = Vec::new();
        if self.closed {
            debug!(?message, "Ignoring message for closed reading session");
            return effects;
        }

        match message {
            SessionMessage::Open {
                novel_id,
                chapter_number,
                mode,
            } => self.handle_open(novel_id, chapter_number, mode, &mut effects),
            SessionMessage::Setup => self.handle_setup(&mut effects),
            SessionMessage::Advance(direction) => self.handle_advance(direction, &mut effects),
            SessionMessage::SwitchMode(mode) => self.handle_switch_mode(mode, &mut effects),
            SessionMessage::Retry => self.handle_retry(&mut effects),
            SessionMessage::SelectTocEntry(chapter_number) => {
                self.handle_select_toc_entry(chapter_number, &mut effects)
            }
            SessionMessage::NearEnd(sentinel) => self.handle_near_end(sentinel, &mut effects),
            SessionMessage::FetchCompleted { token, result } => {
                self.handle_fetch_completed(token, result)
            }
            SessionMessage::TocLoaded {
                novel_id,
                request,
                result,
            } => self.handle_toc_loaded(novel_id, request, result),
            SessionMessage::SetVisible(visible) => effects.push(SessionEffect::SetVisible(visible)),
            SessionMessage::Close => self.handle_close(),
        }

        self.sync_proximity(&mut effects);
        if self.closed {
            effects.push(SessionEffect::StopHeartbeat);
            effects.push(SessionEffect::Shutdown);
        }
        effects
    }

    fn handle_open(
        &mut self,
        novel_id: String,
        chapter_number: u32,
        mode: ReadingMode,
        effects: &mut Vec<SessionEffect>,
    ) {
        if chapter_number < FIRST_CHAPTER_NUMBER {
            warn!(%novel_id, chapter_number, "Ignoring open request below first chapter");
            return;
        }
        let novel_changed = self.novel_id.as_deref() != Some(novel_id.as_str());
        let generation = self.guard.advance_generation();
        let route = ChapterKey::new(novel_id.clone(), chapter_number);
        info!(
            chapter = %route,
            %mode,
            generation,
            "Opening reading session"
        );

        self.mode = mode;
        self.route = Some(route);
        self.cursor = None;
        self.chapters.clear();
        self.has_next = false;
        self.status = LoadStatus::Loading;
        self.last_error = None;

        if novel_changed {
            self.novel_id = Some(novel_id.clone());
            self.toc = Arc::new(Vec::new());
            effects.push(SessionEffect::StartHeartbeat {
                novel_id: novel_id.clone(),
            });
            self.toc_request = self.toc_request.wrapping_add(1);
            effects.push(SessionEffect::LoadToc {
                novel_id,
                request: self.toc_request,
            });
        }
        self.issue_initial_fetch(effects);
    }

    fn handle_setup(&mut self, effects: &mut Vec<SessionEffect>) {
        if self.route.is_none() {
            debug!("Setup before any session was opened");
            return;
        }
        self.issue_initial_fetch(effects);
    }

    fn handle_advance(&mut self, direction: Direction, effects: &mut Vec<SessionEffect>) {
        if self.mode != ReadingMode::Single {
            debug!(?direction, mode = %self.mode, "Ignoring advance outside single mode");
            return;
        }
        let Some(route) = self.route.clone() else {
            return;
        };
        if direction == Direction::Next && self.status == LoadStatus::Ready && !self.has_next {
            debug!(chapter = %route, "Ignoring advance past the last chapter");
            return;
        }
        let Some(target) = route.neighbor(direction) else {
            debug!(chapter = %route, ?direction, "No chapter in that direction");
            return;
        };
        self.handle_open(
            target.novel_id,
            target.chapter_number,
            ReadingMode::Single,
            effects,
        );
    }

    fn handle_switch_mode(&mut self, mode: ReadingMode, effects: &mut Vec<SessionEffect>) {
        if mode == self.mode {
            debug!(%mode, "Mode unchanged");
            return;
        }
        let Some(route) = self.route.clone() else {
            // Nothing open yet; the next open picks the mode up.
            self.mode = mode;
            return;
        };

        let generation = self.guard.advance_generation();
        info!(from = %self.mode, to = %mode, generation, chapter = %route, "Switching reading mode");
        self.mode = mode;
        match mode {
            ReadingMode::Single => self.chapters.retain(|chapter| chapter.key == route),
            ReadingMode::Continuous => self.chapters.clear(),
        }
        self.cursor = self.chapters.last().map(|chapter| chapter.key.clone());
        self.has_next = self.chapters.last().is_some_and(|chapter| chapter.has_next);
        self.status = LoadStatus::Loading;
        self.last_error = None;
        self.issue_initial_fetch(effects);
    }

    fn handle_retry(&mut self, effects: &mut Vec<SessionEffect>) {
        let Some(route) = self.route.clone() else {
            debug!("Nothing to retry");
            return;
        };
        info!(chapter = %route, "Retrying chapter");
        self.handle_open(route.novel_id, route.chapter_number, self.mode, effects);
    }

    fn handle_select_toc_entry(&mut self, chapter_number: u32, effects: &mut Vec<SessionEffect>) {
        let Some(novel_id) = self.novel_id.clone() else {
            debug!(chapter_number, "TOC selection without an open novel");
            return;
        };
        if let Some(entry) = self
            .toc
            .iter()
            .find(|entry| entry.chapter_number == chapter_number)
            && entry.locked
        {
            debug!(chapter_number, "Selected chapter is marked locked");
        }
        self.handle_open(novel_id, chapter_number, self.mode, effects);
    }

    fn handle_near_end(&mut self, sentinel: Sentinel, effects: &mut Vec<SessionEffect>) {
        if self.sentinel != Some(sentinel) {
            debug!(?sentinel, current = ?self.sentinel, "Ignoring near-end signal for a stale edge");
            return;
        }
        if self.mode != ReadingMode::Continuous || self.status != LoadStatus::Ready {
            return;
        }
        if !self.has_next {
            debug!(tail = sentinel.tail, "End of archive; not fetching further");
            return;
        }
        let Some(cursor) = self.cursor.as_ref() else {
            return;
        };
        let Some(next) = cursor.successor() else {
            info!(chapter = %cursor, "Chapter numbers exhausted; treating as end of archive");
            self.has_next = false;
            return;
        };
        if let Some(token) = self.guard.try_begin_successor(&next) {
            debug!(chapter = %next, generation = token.generation, "Fetching next chapter");
            effects.push(SessionEffect::Fetch(token));
        }
    }

    fn handle_fetch_completed(
        &mut self,
        token: RequestToken,
        result: Result<Chapter, FetchFailure>,
    ) {
        if self.guard.complete(&token) == Completion::Stale {
            debug!(
                chapter = %token.key,
                token = token.generation,
                generation = self.guard.generation(),
                "Ignoring stale chapter response"
            );
            return;
        }
        match (token.kind, result) {
            (FetchKind::Initial, Ok(chapter)) => {
                info!(chapter = %chapter.key, title = %chapter.title, "Chapter loaded");
                self.has_next = chapter.has_next;
                self.cursor = Some(token.key);
                self.chapters = vec![Arc::new(chapter)];
                self.status = LoadStatus::Ready;
                self.last_error = None;
            }
            (FetchKind::Initial, Err(failure)) => {
                warn!(chapter = %failure.key, "Initial chapter fetch failed: {}", failure.cause);
                self.status = LoadStatus::Failed {
                    message: failure.cause.user_message().to_string(),
                };
                self.last_error = Some(failure.to_string());
            }
            (FetchKind::Successor, Ok(chapter)) => self.append_successor(token, chapter),
            (FetchKind::Successor, Err(failure)) => {
                warn!(chapter = %failure.key, "Next chapter fetch failed: {}", failure.cause);
                self.last_error = Some(failure.to_string());
            }
        }
    }

    fn append_successor(&mut self, token: RequestToken, chapter: Chapter) {
        let expected = self.cursor.as_ref().and_then(ChapterKey::successor);
        let tail = self.chapters.last().map(|last| last.key.chapter_number);
        let advances = tail.is_none_or(|tail| token.key.chapter_number > tail);
        if expected.as_ref() != Some(&token.key) || chapter.key != token.key || !advances {
            warn!(
                chapter = %chapter.key,
                expected = ?expected,
                "Discarding out-of-order chapter"
            );
            return;
        }
        info!(chapter = %chapter.key, has_next = chapter.has_next, "Appended chapter");
        if !chapter.has_next {
            info!(chapter = %chapter.key, "Reached end of archive");
        }
        self.has_next = chapter.has_next;
        self.cursor = Some(token.key);
        self.chapters.push(Arc::new(chapter));
        self.last_error = None;
    }

    fn handle_toc_loaded(
        &mut self,
        novel_id: String,
        request: u64,
        result: Result<Vec<TocEntry>, FetchError>,
    ) {
        if request != self.toc_request || self.novel_id.as_deref() != Some(novel_id.as_str()) {
            debug!(
                %novel_id,
                request,
                current = self.toc_request,
                "Ignoring superseded chapter index"
            );
            return;
        }
        match result {
            Ok(entries) => {
                info!(%novel_id, entries = entries.len(), "Chapter index loaded");
                self.toc = Arc::new(entries);
            }
            Err(err) => {
                warn!(%novel_id, "Chapter index unavailable: {err}");
                self.toc = Arc::new(Vec::new());
            }
        }
    }

    fn handle_close(&mut self) {
        let generation = self.guard.advance_generation();
        info!(novel_id = ?self.novel_id, generation, "Closing reading session");
        self.closed = true;
    }

    fn issue_initial_fetch(&mut self, effects: &mut Vec<SessionEffect>) {
        let Some(route) = self.route.as_ref() else {
            return;
        };
        if let Some(token) = self.guard.try_begin_initial(route) {
            effects.push(SessionEffect::Fetch(token));
        }
    }

    /// Keep exactly one subscription, watching the current tail, while
    /// continuous mode has content.
    fn sync_proximity(&mut self, effects: &mut Vec<SessionEffect>) {
        let desired = match (self.closed, self.mode, self.chapters.last()) {
            (false, ReadingMode::Continuous, Some(tail)) => Some(Sentinel {
                generation: self.guard.generation(),
                tail: tail.key.chapter_number,
            }),
            _ => None,
        };
        if desired == self.sentinel {
            return;
        }
        if self.sentinel.take().is_some() {
            effects.push(SessionEffect::Unsubscribe);
        }
        if let Some(sentinel) = desired {
            effects.push(SessionEffect::Subscribe(sentinel));
            self.sentinel = Some(sentinel);
        }
    }
}
