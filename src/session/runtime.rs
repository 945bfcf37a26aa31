use super::{ReadingSession, Sentinel, SessionEffect, SessionMessage, SessionSnapshot};
use crate::chapter::{Direction, ReadingMode, TocEntry};
use crate::config::AppConfig;
use crate::error::{FetchError, FetchFailure, SessionError};
use crate::fetcher::ContentFetcher;
use crate::guard::RequestToken;
use crate::proximity::{ProximityTrigger, SubscriptionHandle};
use crate::telemetry::{Heartbeat, ProgressHints, TelemetrySink};
use crate::toc::{TocPage, TocPaginator};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace, warn};

/// Collaborators the controller drives.
#[derive(Clone)]
pub struct SessionServices {
    pub fetcher: Arc<dyn ContentFetcher>,
    pub trigger: Arc<dyn ProximityTrigger>,
    /// `None` disables the heartbeat.
    pub telemetry: Option<Arc<dyn TelemetrySink>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub fetch_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub initial_mode: ReadingMode,
    pub toc_window_size: usize,
}

impl From<&AppConfig> for SessionSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            fetch_timeout: config.fetch_timeout(),
            heartbeat_interval: config.heartbeat_interval(),
            initial_mode: config.reading_mode,
            toc_window_size: config.toc_window_size,
        }
    }
}

type TocIndex = Arc<Vec<TocEntry>>;

/// Task owning the `ReadingSession`. Messages are handled strictly one at a
/// time, so effects of one message never interleave with another.
pub struct ReadingSessionController {
    session: ReadingSession,
    services: SessionServices,
    settings: SessionSettings,
    inbox: mpsc::UnboundedReceiver<SessionMessage>,
    outbox: mpsc::WeakUnboundedSender<SessionMessage>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    progress_tx: watch::Sender<ProgressHints>,
    visible_tx: watch::Sender<bool>,
    toc_tx: watch::Sender<TocIndex>,
    subscription: Option<SubscriptionHandle>,
    heartbeat: Option<Heartbeat>,
}

impl ReadingSessionController {
    /// Start the controller on the current tokio runtime.
    ///
    /// The task stops on `SessionHandle::close` or once every handle is
    /// dropped.
    pub fn spawn(services: SessionServices, settings: SessionSettings) -> SessionHandle {
        let (commands, inbox) = mpsc::unbounded_channel();
        let session = ReadingSession::new(settings.initial_mode);
        let (snapshot_tx, snapshot) = watch::channel(session.snapshot());
        let (progress_tx, _) = watch::channel(session.progress());
        let (visible_tx, _) = watch::channel(true);
        let (toc_tx, toc) = watch::channel(session.toc());
        let toc_window_size = settings.toc_window_size;

        let controller = Self {
            session,
            services,
            settings,
            inbox,
            outbox: commands.downgrade(),
            snapshot_tx,
            progress_tx,
            visible_tx,
            toc_tx,
            subscription: None,
            heartbeat: None,
        };
        tokio::spawn(controller.run());

        SessionHandle {
            commands,
            snapshot,
            toc,
            toc_window_size,
        }
    }

    async fn run(mut self) {
        while let Some(message) = self.inbox.recv().await {
            if !self.handle(message) {
                break;
            }
        }
        self.teardown();
        debug!("Reading session controller stopped");
    }

    fn handle(&mut self, message: SessionMessage) -> bool {
        let effects = self.session.reduce(message);
        let mut running = true;
        for effect in effects {
            running &= self.run_effect(effect);
        }
        self.publish();
        running
    }

    fn run_effect(&mut self, effect: SessionEffect) -> bool {
        match effect {
            SessionEffect::Fetch(token) => self.spawn_fetch(token),
            SessionEffect::Subscribe(sentinel) => self.subscribe(sentinel),
            SessionEffect::Unsubscribe => self.unsubscribe(),
            SessionEffect::StartHeartbeat { novel_id } => self.start_heartbeat(novel_id),
            SessionEffect::StopHeartbeat => self.stop_heartbeat(),
            SessionEffect::LoadToc { novel_id, request } => {
                self.spawn_toc_load(novel_id, request)
            }
            SessionEffect::SetVisible(visible) => {
                self.visible_tx.send_replace(visible);
            }
            SessionEffect::Shutdown => return false,
        }
        true
    }

    fn spawn_fetch(&self, token: RequestToken) {
        let fetcher = Arc::clone(&self.services.fetcher);
        let outbox = self.outbox.clone();
        let timeout = self.settings.fetch_timeout;
        tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, fetcher.fetch(&token.key)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        chapter = %token.key,
                        timeout_secs = timeout.as_secs_f32(),
                        "Chapter fetch timed out"
                    );
                    Err(FetchFailure::new(
                        token.key.clone(),
                        FetchError::Timeout { after: timeout },
                    ))
                }
            };
            deliver(&outbox, SessionMessage::FetchCompleted { token, result });
        });
    }

    fn spawn_toc_load(&self, novel_id: String, request: u64) {
        let fetcher = Arc::clone(&self.services.fetcher);
        let outbox = self.outbox.clone();
        let timeout = self.settings.fetch_timeout;
        tokio::spawn(async move {
            let result = tokio::time::timeout(timeout, fetcher.fetch_index(&novel_id))
                .await
                .unwrap_or(Err(FetchError::Timeout { after: timeout }));
            deliver(
                &outbox,
                SessionMessage::TocLoaded {
                    novel_id,
                    request,
                    result,
                },
            );
        });
    }

    fn subscribe(&mut self, sentinel: Sentinel) {
        self.unsubscribe();
        let outbox = self.outbox.clone();
        let handle = self.services.trigger.subscribe(Box::new(move || {
            deliver(&outbox, SessionMessage::NearEnd(sentinel));
        }));
        trace!(?sentinel, "Watching for the end of rendered content");
        self.subscription = Some(handle);
    }

    fn unsubscribe(&mut self) {
        if let Some(handle) = self.subscription.take() {
            self.services.trigger.unsubscribe(handle);
        }
    }

    fn start_heartbeat(&mut self, novel_id: String) {
        self.stop_heartbeat();
        let Some(sink) = self.services.telemetry.as_ref() else {
            debug!(novel_id = %novel_id, "Telemetry disabled; no heartbeat");
            return;
        };
        self.heartbeat = Some(Heartbeat::start(
            Arc::clone(sink),
            self.settings.heartbeat_interval,
            novel_id,
            self.progress_tx.subscribe(),
            self.visible_tx.subscribe(),
        ));
    }

    fn stop_heartbeat(&mut self) {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.stop();
        }
    }

    fn publish(&self) {
        let snapshot = self.session.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot;
            true
        });

        let progress = self.session.progress();
        self.progress_tx.send_if_modified(|current| {
            if *current == progress {
                return false;
            }
            *current = progress;
            true
        });

        let toc = self.session.toc();
        self.toc_tx.send_if_modified(|current| {
            if Arc::ptr_eq(current, &toc) {
                return false;
            }
            *current = toc;
            true
        });
    }

    fn teardown(&mut self) {
        self.unsubscribe();
        self.stop_heartbeat();
    }
}

/// Hand a message back to the controller if it is still running.
fn deliver(outbox: &mpsc::WeakUnboundedSender<SessionMessage>, message: SessionMessage) {
    let Some(sender) = outbox.upgrade() else {
        trace!("Controller gone; dropping message");
        return;
    };
    if sender.send(message).is_err() {
        trace!("Controller stopped; dropping message");
    }
}

/// Command and observation surface for the presentation layer.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionMessage>,
    snapshot: watch::Receiver<SessionSnapshot>,
    toc: watch::Receiver<TocIndex>,
    toc_window_size: usize,
}

impl SessionHandle {
    fn send(&self, message: SessionMessage) -> Result<(), SessionError> {
        self.commands
            .send(message)
            .map_err(|_| SessionError::Closed)
    }

    pub fn open_session(
        &self,
        novel_id: impl Into<String>,
        chapter_number: u32,
        mode: ReadingMode,
    ) -> Result<(), SessionError> {
        self.send(SessionMessage::Open {
            novel_id: novel_id.into(),
            chapter_number,
            mode,
        })
    }

    /// Previous/next chapter. Only honoured in single mode.
    pub fn advance(&self, direction: Direction) -> Result<(), SessionError> {
        self.send(SessionMessage::Advance(direction))
    }

    pub fn switch_mode(&self, mode: ReadingMode) -> Result<(), SessionError> {
        self.send(SessionMessage::SwitchMode(mode))
    }

    pub fn retry(&self) -> Result<(), SessionError> {
        self.send(SessionMessage::Retry)
    }

    pub fn setup(&self) -> Result<(), SessionError> {
        self.send(SessionMessage::Setup)
    }

    pub fn select_toc_entry(&self, chapter_number: u32) -> Result<(), SessionError> {
        self.send(SessionMessage::SelectTocEntry(chapter_number))
    }

    pub fn set_visible(&self, visible: bool) -> Result<(), SessionError> {
        self.send(SessionMessage::SetVisible(visible))
    }

    pub fn close(&self) -> Result<(), SessionError> {
        self.send(SessionMessage::Close)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    /// Resolve with the first snapshot matching `predicate`.
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> Result<SessionSnapshot, SessionError> {
        let mut snapshot = self.snapshot.clone();
        let matched = snapshot
            .wait_for(predicate)
            .await
            .map_err(|_| SessionError::Closed)?
            .clone();
        Ok(matched)
    }

    /// Page `page_number` of the open novel's index, filtered first.
    /// `window_size` falls back to the configured window.
    pub fn toc_page(
        &self,
        page_number: usize,
        window_size: Option<usize>,
        filter: Option<&str>,
    ) -> Option<TocPage> {
        let entries: Vec<TocEntry> = self.toc.borrow().iter().cloned().collect();
        let paginator = TocPaginator::new(entries, window_size.unwrap_or(self.toc_window_size));
        match filter {
            Some(filter) => paginator.filtered(filter).page(page_number),
            None => paginator.page(page_number),
        }
    }

    /// Page of the index holding `chapter_number`, unfiltered.
    pub fn toc_page_for(&self, chapter_number: u32) -> Option<TocPage> {
        let entries: Vec<TocEntry> = self.toc.borrow().iter().cloned().collect();
        let paginator = TocPaginator::new(entries, self.toc_window_size);
        paginator
            .page_containing(chapter_number)
            .and_then(|page| paginator.page(page))
    }

    /// Resolves once the controller task has stopped.
    pub async fn closed(&self) {
        self.commands.closed().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chapter::{Chapter, ChapterKey};
    use crate::error::TelemetryError;
    use crate::proximity::ManualProximityTrigger;
    use crate::session::LoadStatus;
    use crate::telemetry::HeartbeatPayload;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::future::Future;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::Semaphore;
    use tokio::time::Instant;

    const WAIT: Duration = Duration::from_secs(60);

    struct Library {
        last_chapter: AtomicU32,
        calls: Mutex<Vec<ChapterKey>>,
        gates: Mutex<HashMap<u32, Arc<Semaphore>>>,
        index_fails: bool,
    }

    impl Library {
        fn new(last_chapter: u32) -> Arc<Self> {
            Self::build(last_chapter, false)
        }

        fn build(last_chapter: u32, index_fails: bool) -> Arc<Self> {
            Arc::new(Self {
                last_chapter: AtomicU32::new(last_chapter),
                calls: Mutex::new(Vec::new()),
                gates: Mutex::new(HashMap::new()),
                index_fails,
            })
        }

        /// Hold fetches of `chapter_number` until a permit is added.
        fn gate(&self, chapter_number: u32) -> Arc<Semaphore> {
            let gate = Arc::new(Semaphore::new(0));
            self.gates
                .lock()
                .unwrap()
                .insert(chapter_number, Arc::clone(&gate));
            gate
        }

        fn calls_for(&self, chapter_number: u32) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|key| key.chapter_number == chapter_number)
                .count()
        }
    }

    #[async_trait]
    impl ContentFetcher for Library {
        async fn fetch(&self, key: &ChapterKey) -> Result<Chapter, FetchFailure> {
            self.calls.lock().unwrap().push(key.clone());
            let gate = self.gates.lock().unwrap().get(&key.chapter_number).cloned();
            if let Some(gate) = gate {
                let _permit = gate.acquire().await;
            }
            let last = self.last_chapter.load(Ordering::SeqCst);
            let n = key.chapter_number;
            if n > last {
                return Err(FetchFailure::new(key.clone(), FetchError::NotFound));
            }
            Ok(Chapter {
                key: key.clone(),
                title: if n == 5 {
                    "Ashes".to_string()
                } else {
                    format!("Chapter {n}")
                },
                content: format!("<p>Body of chapter {n}</p>"),
                has_next: n < last,
            })
        }

        async fn fetch_index(&self, _novel_id: &str) -> Result<Vec<TocEntry>, FetchError> {
            if self.index_fails {
                return Err(FetchError::Status { status: 500 });
            }
            let last = self.last_chapter.load(Ordering::SeqCst);
            Ok((1..=last)
                .map(|n| TocEntry {
                    chapter_number: n,
                    title: format!("Chapter {n}"),
                    locked: n > 100,
                })
                .collect())
        }
    }

    struct RecordingSink {
        started: Instant,
        sent: Mutex<Vec<(u64, HeartbeatPayload)>>,
    }

    #[async_trait]
    impl TelemetrySink for RecordingSink {
        async fn send(&self, beat: &HeartbeatPayload) -> Result<(), TelemetryError> {
            self.sent
                .lock()
                .unwrap()
                .push((self.started.elapsed().as_secs(), beat.clone()));
            Ok(())
        }
    }

    fn settings() -> SessionSettings {
        SessionSettings {
            fetch_timeout: Duration::from_secs(15),
            heartbeat_interval: Duration::from_secs(30),
            initial_mode: ReadingMode::Single,
            toc_window_size: 50,
        }
    }

    fn start(
        library: &Arc<Library>,
        trigger: &Arc<ManualProximityTrigger>,
        telemetry: Option<Arc<dyn TelemetrySink>>,
    ) -> SessionHandle {
        let fetcher: Arc<dyn ContentFetcher> = library.clone();
        let trigger: Arc<dyn ProximityTrigger> = trigger.clone();
        ReadingSessionController::spawn(
            SessionServices {
                fetcher,
                trigger,
                telemetry,
            },
            settings(),
        )
    }

    async fn within<T>(future: impl Future<Output = Result<T, SessionError>>) -> T {
        tokio::time::timeout(WAIT, future)
            .await
            .expect("timed out waiting for the session")
            .expect("session closed")
    }

    /// Let the controller and spawned fetches drain their queues.
    async fn settle() {
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
    }

    fn numbers(snapshot: &SessionSnapshot) -> Vec<u32> {
        snapshot
            .chapters
            .iter()
            .map(|chapter| chapter.key.chapter_number)
            .collect()
    }

    #[tokio::test]
    async fn two_rapid_signals_fetch_the_successor_once() {
        let library = Library::new(20);
        let gate = library.gate(6);
        let trigger = Arc::new(ManualProximityTrigger::new());
        let handle = start(&library, &trigger, None);

        handle
            .open_session("novel-42", 5, ReadingMode::Continuous)
            .unwrap();
        let ready = within(handle.wait_for(|s| s.status == LoadStatus::Ready)).await;
        assert_eq!(numbers(&ready), vec![5]);
        assert_eq!(ready.chapters[0].title, "Ashes");
        assert_eq!(trigger.subscriber_count(), 1);

        trigger.request_more();
        trigger.request_more();
        within(handle.wait_for(|s| s.loading_more)).await;
        settle().await;
        assert_eq!(library.calls_for(6), 1);

        gate.add_permits(1);
        let grown = within(handle.wait_for(|s| s.chapters.len() == 2)).await;
        assert_eq!(numbers(&grown), vec![5, 6]);
        assert!(!grown.loading_more);
        assert_eq!(library.calls_for(6), 1);
        assert_eq!(trigger.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn repeated_setup_fetches_the_first_chapter_once() {
        let library = Library::new(20);
        let gate = library.gate(3);
        let trigger = Arc::new(ManualProximityTrigger::new());
        let handle = start(&library, &trigger, None);

        handle.open_session("novel-42", 3, ReadingMode::Single).unwrap();
        for _ in 0..5 {
            handle.setup().unwrap();
        }
        settle().await;
        assert_eq!(library.calls_for(3), 1);

        gate.add_permits(1);
        within(handle.wait_for(|s| s.status == LoadStatus::Ready)).await;
        handle.setup().unwrap();
        settle().await;
        assert_eq!(library.calls_for(3), 1);
        assert_eq!(trigger.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn successor_arriving_after_a_mode_switch_is_dropped() {
        let library = Library::new(20);
        let gate = library.gate(6);
        let trigger = Arc::new(ManualProximityTrigger::new());
        let handle = start(&library, &trigger, None);

        handle
            .open_session("novel-42", 5, ReadingMode::Continuous)
            .unwrap();
        within(handle.wait_for(|s| s.status == LoadStatus::Ready)).await;
        trigger.request_more();
        within(handle.wait_for(|s| s.loading_more)).await;

        handle.switch_mode(ReadingMode::Single).unwrap();
        within(handle.wait_for(|s| {
            s.mode == ReadingMode::Single && s.status == LoadStatus::Ready
        }))
        .await;
        assert_eq!(trigger.subscriber_count(), 0);

        gate.add_permits(1);
        settle().await;
        let snapshot = handle.snapshot();
        assert_eq!(numbers(&snapshot), vec![5]);
        assert!(!snapshot.loading_more);
        assert_eq!(library.calls_for(6), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_successor_times_out_and_frees_the_guard() {
        let library = Library::new(20);
        let _gate = library.gate(6);
        let trigger = Arc::new(ManualProximityTrigger::new());
        let handle = start(&library, &trigger, None);

        handle
            .open_session("novel-42", 5, ReadingMode::Continuous)
            .unwrap();
        within(handle.wait_for(|s| s.status == LoadStatus::Ready)).await;
        trigger.request_more();
        within(handle.wait_for(|s| s.loading_more)).await;

        let failed =
            within(handle.wait_for(|s| !s.loading_more && s.last_error.is_some())).await;
        assert_eq!(numbers(&failed), vec![5]);
        assert!(
            failed
                .last_error
                .as_deref()
                .is_some_and(|err| err.contains("no response after 15s"))
        );

        trigger.request_more();
        within(handle.wait_for(|s| s.loading_more)).await;
        settle().await;
        assert_eq!(library.calls_for(6), 2);
    }

    #[tokio::test]
    async fn failed_first_chapter_recovers_on_retry() {
        let library = Library::new(3);
        let trigger = Arc::new(ManualProximityTrigger::new());
        let handle = start(&library, &trigger, None);

        handle.open_session("novel-42", 9, ReadingMode::Single).unwrap();
        let failed =
            within(handle.wait_for(|s| matches!(s.status, LoadStatus::Failed { .. }))).await;
        assert!(failed.chapters.is_empty());
        assert_eq!(
            failed.status,
            LoadStatus::Failed {
                message: "This chapter does not exist.".to_string()
            }
        );

        library.last_chapter.store(12, Ordering::SeqCst);
        handle.retry().unwrap();
        let ready = within(handle.wait_for(|s| s.status == LoadStatus::Ready)).await;
        assert_eq!(numbers(&ready), vec![9]);
        assert!(ready.generation > failed.generation);
        assert!(ready.last_error.is_none());
    }

    #[tokio::test]
    async fn toc_pages_come_from_the_loaded_index() {
        let library = Library::new(175);
        let trigger = Arc::new(ManualProximityTrigger::new());
        let handle = start(&library, &trigger, None);

        handle.open_session("novel-42", 1, ReadingMode::Single).unwrap();
        within(handle.wait_for(|s| s.toc_entries == 175)).await;

        assert_eq!(handle.toc_page(4, None, None).unwrap().entries.len(), 25);
        assert_eq!(handle.toc_page(1, None, None).unwrap().page_count, 4);
        assert!(handle.toc_page(5, None, None).is_none());
        let filtered = handle.toc_page(1, Some(10), Some("chapter 17")).unwrap();
        assert_eq!(filtered.total_entries, 7);
        assert_eq!(handle.toc_page_for(120).unwrap().page_number, 3);

        handle.select_toc_entry(120).unwrap();
        let opened = within(handle.wait_for(|s| {
            s.status == LoadStatus::Ready
                && s.route.as_ref().is_some_and(|key| key.chapter_number == 120)
        }))
        .await;
        assert_eq!(numbers(&opened), vec![120]);
    }

    #[tokio::test]
    async fn unavailable_index_leaves_reading_intact() {
        let library = Library::build(20, true);
        let trigger = Arc::new(ManualProximityTrigger::new());
        let handle = start(&library, &trigger, None);

        handle.open_session("novel-42", 2, ReadingMode::Single).unwrap();
        let ready = within(handle.wait_for(|s| s.status == LoadStatus::Ready)).await;
        settle().await;

        assert_eq!(numbers(&ready), vec![2]);
        assert_eq!(handle.snapshot().toc_entries, 0);
        assert!(handle.toc_page(1, None, None).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_spans_navigation_and_stops_on_close() {
        let library = Library::new(20);
        let trigger = Arc::new(ManualProximityTrigger::new());
        let sink = Arc::new(RecordingSink {
            started: Instant::now(),
            sent: Mutex::new(Vec::new()),
        });
        let telemetry: Arc<dyn TelemetrySink> = sink.clone();
        let handle = start(&library, &trigger, Some(telemetry));

        handle.open_session("novel-42", 5, ReadingMode::Single).unwrap();
        tokio::time::sleep(Duration::from_secs(20)).await;
        handle.advance(Direction::Next).unwrap();
        tokio::time::sleep(Duration::from_secs(11)).await;
        handle.set_visible(false).unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
        handle.set_visible(true).unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        handle.close().unwrap();
        tokio::time::timeout(WAIT, handle.closed()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(120)).await;

        let sent = sink.sent.lock().unwrap();
        let offsets: Vec<u64> = sent.iter().map(|(at, _)| *at).collect();
        assert_eq!(offsets, vec![30, 120]);
        assert_eq!(sent[0].1.novel_id, "novel-42");
        assert_eq!(sent[0].1.progress_hints.chapter_number, Some(6));
    }

    #[tokio::test]
    async fn close_unsubscribes_and_rejects_further_commands() {
        let library = Library::new(20);
        let trigger = Arc::new(ManualProximityTrigger::new());
        let handle = start(&library, &trigger, None);

        handle
            .open_session("novel-42", 5, ReadingMode::Continuous)
            .unwrap();
        within(handle.wait_for(|s| s.status == LoadStatus::Ready)).await;
        assert_eq!(trigger.subscriber_count(), 1);

        handle.close().unwrap();
        tokio::time::timeout(WAIT, handle.closed()).await.unwrap();

        assert_eq!(trigger.subscriber_count(), 0);
        assert_eq!(trigger.request_more(), 0);
        assert_eq!(handle.retry(), Err(SessionError::Closed));
    }
}
