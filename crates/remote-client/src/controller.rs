//! Controller — single-owner event loop for the panel session.
//!
//! The controller exclusively owns `SessionState` (action-id tracker and
//! connection monitor), the action registry, the location list and one
//! `UpdateQueue` per edited field.  Network requests and timers run as
//! spawned tasks that report back through `ControlEvent`s, so nothing else
//! ever touches that state.  The UI talks to it through a `PanelHandle` and
//! observes it through a `broadcast` of `PanelEvent`s.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use remote_proto::config::UiSettings;
use remote_proto::protocol::{paths, ActionList, Payload, StatusResponse, RESYNC_ACTION_ID};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::actions::{trigger_payload, ActionRegistry};
use crate::command::CommandSender;
use crate::connection::{ConnectionMonitor, Transition};
use crate::error::{ApplicationError, ControllerGone, TransportError};
use crate::load::{LoadIndicator, Spinner};
use crate::poller::{ActionTracker, Poller, Reconcile};
use crate::transport::{cancellable, Transport};
use crate::update_queue::UpdateQueue;

const EVENT_CAPACITY: usize = 256;
const UPDATE_CAPACITY: usize = 256;

// ── Messages ──────────────────────────────────────────────────────────────────

/// All inputs into the controller loop.
#[derive(Debug)]
pub enum ControlEvent {
    /// Issue a status poll.  `requeue` re-arms the periodic poll afterwards.
    Poll { requeue: bool },
    PollFinished {
        requeue: bool,
        result: Result<StatusResponse, TransportError>,
    },
    ActionsFetched(Result<ActionList, TransportError>),
    LocationsFetched(Result<Vec<String>, TransportError>),
    /// A message the user must see.
    Alert(String),
    Request(PanelRequest),
}

/// Requests from the UI.
#[derive(Debug, Clone)]
pub enum PanelRequest {
    /// POST immediately.
    Send { path: String, payload: Payload },
    /// POST through the debounce queue of `path`.
    Edit { path: String, payload: Payload },
    ToggleAction(String),
    /// One status poll outside the periodic schedule.
    Refresh,
    ReloadActions,
    ReloadLocations,
}

/// Everything the UI needs to render.
#[derive(Debug, Clone)]
pub enum PanelEvent {
    Status(Arc<StatusResponse>),
    Actions(Arc<ActionList>),
    Locations(Arc<Vec<String>>),
    /// Open the blocking "no response" modal.
    ConnectionLost,
    /// Close it again.
    ConnectionRestored,
    /// Seconds since the last successful status, while disconnected.
    Disconnected { secs: u64 },
    Alert(String),
    /// Show or hide the load indicator.
    Busy(bool),
    /// The latest debounced edit for `path` has been sent.
    EditFlushed { path: String },
}

// ── Session state ─────────────────────────────────────────────────────────────

/// Outcome of one successful poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollReport {
    pub transition: Option<Transition>,
    pub reconcile: Reconcile,
}

/// Mutable state of one panel session.
#[derive(Debug, Clone)]
pub struct SessionState {
    tracker: ActionTracker,
    monitor: ConnectionMonitor,
    last_status: Option<Arc<StatusResponse>>,
}

impl SessionState {
    pub fn new(now: Instant) -> Self {
        Self {
            tracker: ActionTracker::new(),
            monitor: ConnectionMonitor::new(now),
            last_status: None,
        }
    }

    pub fn last_action_id(&self) -> i64 {
        self.tracker.last_id()
    }

    pub fn monitor(&self) -> &ConnectionMonitor {
        &self.monitor
    }

    pub fn last_status(&self) -> Option<&Arc<StatusResponse>> {
        self.last_status.as_ref()
    }

    pub fn on_poll_success(
        &mut self,
        status: StatusResponse,
        now: Instant,
        actions: &mut ActionRegistry,
    ) -> PollReport {
        let reconcile = self
            .tracker
            .reconcile(&status.action_changes, |changes| actions.apply_changes(changes));
        self.last_status = Some(Arc::new(status));
        let transition = self.monitor.on_success(now);
        PollReport {
            transition,
            reconcile,
        }
    }

    pub fn on_poll_failure(&mut self) -> Option<Transition> {
        self.tracker.reset();
        self.monitor.on_failure()
    }
}

// ── Handle ────────────────────────────────────────────────────────────────────

/// Cloneable front door to a running controller.
#[derive(Clone)]
pub struct PanelHandle {
    events: mpsc::Sender<ControlEvent>,
    updates: broadcast::Sender<PanelEvent>,
    shutdown: CancellationToken,
}

impl PanelHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<PanelEvent> {
        self.updates.subscribe()
    }

    pub async fn request(&self, request: PanelRequest) -> Result<(), ControllerGone> {
        self.events
            .send(ControlEvent::Request(request))
            .await
            .map_err(|_| ControllerGone)
    }

    pub async fn send(&self, path: &str, payload: Payload) -> Result<(), ControllerGone> {
        self.request(PanelRequest::Send {
            path: path.to_string(),
            payload,
        })
        .await
    }

    pub async fn edit(&self, path: &str, payload: Payload) -> Result<(), ControllerGone> {
        self.request(PanelRequest::Edit {
            path: path.to_string(),
            payload,
        })
        .await
    }

    pub async fn toggle_action(&self, id: &str) -> Result<(), ControllerGone> {
        self.request(PanelRequest::ToggleAction(id.to_string()))
            .await
    }

    pub async fn refresh(&self) -> Result<(), ControllerGone> {
        self.request(PanelRequest::Refresh).await
    }

    /// Stop the controller, cancelling pending edits and in-flight requests.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

// ── Controller ────────────────────────────────────────────────────────────────

pub struct Controller<T> {
    settings: UiSettings,
    session: SessionState,
    actions: ActionRegistry,
    actions_loading: bool,
    locations: Arc<Vec<String>>,
    transport: Arc<T>,
    poller: Poller<T>,
    sender: CommandSender<T>,
    queues: HashMap<String, UpdateQueue<T>>,
    load: LoadIndicator,
    load_rx: watch::Receiver<usize>,
    spinner: Spinner,
    /// Last value published as `Disconnected`.
    reported_secs: Option<u64>,
    events_tx: mpsc::Sender<ControlEvent>,
    events_rx: Option<mpsc::Receiver<ControlEvent>>,
    updates: broadcast::Sender<PanelEvent>,
    shutdown: CancellationToken,
}

impl<T: Transport> Controller<T> {
    pub fn new(transport: Arc<T>, settings: UiSettings) -> (Self, PanelHandle) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CAPACITY);
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        let shutdown = CancellationToken::new();
        let (load, load_rx) = LoadIndicator::new();

        let handle = PanelHandle {
            events: events_tx.clone(),
            updates: updates.clone(),
            shutdown: shutdown.clone(),
        };

        let controller = Self {
            spinner: Spinner::new(settings.spinner_delay()),
            settings,
            session: SessionState::new(Instant::now()),
            actions: ActionRegistry::new(),
            actions_loading: false,
            locations: Arc::new(Vec::new()),
            poller: Poller::new(Arc::clone(&transport)),
            sender: CommandSender::new(Arc::clone(&transport), events_tx.clone(), load.clone()),
            transport,
            queues: HashMap::new(),
            load,
            load_rx,
            reported_secs: None,
            events_tx,
            events_rx: Some(events_rx),
            updates,
            shutdown,
        };
        (controller, handle)
    }

    /// Run until `PanelHandle::shutdown` is called.
    pub async fn run(mut self) {
        let Some(mut events_rx) = self.events_rx.take() else {
            return;
        };
        info!(
            "controller: starting, poll={} every {:?}",
            self.settings.update_poll,
            self.settings.update_interval()
        );

        self.reload_actions();
        self.reload_locations();
        self.start_poll(true);

        let shutdown = self.shutdown.clone();
        let mut load_rx = self.load_rx.clone();
        let mut animation = tokio::time::interval(self.settings.animation_period());
        animation.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            let spinner_at = self.spinner.deadline();
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("controller: shutdown requested");
                    break;
                }

                evt = events_rx.recv() => match evt {
                    Some(evt) => self.handle_event(evt),
                    None => break,
                },

                _ = animation.tick() => self.on_animation_tick(Instant::now()),

                changed = load_rx.changed() => {
                    if changed.is_ok() {
                        let in_flight = *load_rx.borrow_and_update();
                        if let Some(busy) = self.spinner.on_in_flight(in_flight, Instant::now()) {
                            self.publish(PanelEvent::Busy(busy));
                        }
                    }
                }

                _ = tokio::time::sleep_until(spinner_at.unwrap_or_else(Instant::now)), if spinner_at.is_some() => {
                    if let Some(busy) = self.spinner.on_deadline(self.load.in_flight()) {
                        self.publish(PanelEvent::Busy(busy));
                    }
                }
            }
        }

        // Dropping the queues cancels timers that have not fired yet.
        self.queues.clear();
        self.shutdown.cancel();
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    fn handle_event(&mut self, event: ControlEvent) {
        match event {
            ControlEvent::Poll { requeue } => self.start_poll(requeue),
            ControlEvent::PollFinished { requeue, result } => {
                self.on_poll_finished(requeue, result)
            }
            ControlEvent::ActionsFetched(result) => self.on_actions_fetched(result),
            ControlEvent::LocationsFetched(result) => self.on_locations_fetched(result),
            ControlEvent::Alert(message) => self.publish(PanelEvent::Alert(message)),
            ControlEvent::Request(request) => self.on_request(request),
        }
    }

    fn on_request(&mut self, request: PanelRequest) {
        debug!("controller: request {:?}", request);
        match request {
            PanelRequest::Send { path, payload } => self.send_now(path, payload),
            PanelRequest::Edit { path, payload } => self.enqueue_edit(path, payload),
            PanelRequest::ToggleAction(id) => {
                self.send_now(paths::ACTION_DO.to_string(), trigger_payload(&id))
            }
            PanelRequest::Refresh => self.start_poll(false),
            PanelRequest::ReloadActions => self.reload_actions(),
            PanelRequest::ReloadLocations => self.reload_locations(),
        }
    }

    // ── Polling ───────────────────────────────────────────────────────────────

    fn start_poll(&mut self, requeue: bool) {
        let action_id = self.session.last_action_id();
        let poller = self.poller.clone();
        let events = self.events_tx.clone();
        let cancel = self.shutdown.child_token();
        let busy = self.load.begin();
        tokio::spawn(async move {
            let result = poller.fetch(action_id, &cancel).await;
            drop(busy);
            let _ = events
                .send(ControlEvent::PollFinished { requeue, result })
                .await;
        });
    }

    fn schedule_poll(&self) {
        let events = self.events_tx.clone();
        let cancel = self.shutdown.clone();
        let interval = self.settings.update_interval();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(interval) => {
                    let _ = events.send(ControlEvent::Poll { requeue: true }).await;
                }
            }
        });
    }

    fn on_poll_finished(&mut self, requeue: bool, result: Result<StatusResponse, TransportError>) {
        match result {
            Err(e) if e.is_cancelled() => return,
            Ok(status) => self.on_status(status),
            Err(e) => {
                warn!("error fetching updates: {}", e);
                if self.session.on_poll_failure() == Some(Transition::Lost) {
                    info!("controller: connection lost");
                    self.publish(PanelEvent::ConnectionLost);
                }
            }
        }

        // Re-arm regardless of the outcome: a failing server is retried at
        // the normal interval.
        if requeue && self.settings.update_poll {
            self.schedule_poll();
        }
    }

    fn on_status(&mut self, status: StatusResponse) {
        let report = self
            .session
            .on_poll_success(status, Instant::now(), &mut self.actions);

        if let Some(status) = self.session.last_status() {
            self.publish(PanelEvent::Status(Arc::clone(status)));
        }

        match report.reconcile {
            Reconcile::Unchanged => {}
            Reconcile::Applied { from, to, changed } => {
                debug!("action changes {} -> {}: {} changed", from, to, changed);
                if changed > 0 || from == RESYNC_ACTION_ID {
                    self.publish_actions();
                }
            }
            Reconcile::Deferred(e) => {
                warn!(
                    "action change error, resending same id: {}",
                    ApplicationError::from(e)
                );
                if !self.actions_loading {
                    self.reload_actions();
                }
            }
        }

        if report.transition == Some(Transition::Restored) {
            info!("controller: connection restored");
            self.reported_secs = None;
            self.publish(PanelEvent::ConnectionRestored);
            // The server may have restarted with a different action set.
            if !self.actions_loading {
                self.reload_actions();
            }
            if self.locations.is_empty() {
                self.reload_locations();
            }
        }
    }

    fn on_animation_tick(&mut self, now: Instant) {
        match self.session.monitor().disconnected_secs(now) {
            Some(secs) if self.reported_secs != Some(secs) => {
                self.reported_secs = Some(secs);
                self.publish(PanelEvent::Disconnected { secs });
            }
            Some(_) => {}
            None => self.reported_secs = None,
        }
    }

    // ── Lists ─────────────────────────────────────────────────────────────────

    fn reload_actions(&mut self) {
        self.actions_loading = true;
        let transport = Arc::clone(&self.transport);
        let events = self.events_tx.clone();
        let cancel = self.shutdown.child_token();
        let busy = self.load.begin();
        tokio::spawn(async move {
            let result = cancellable(&cancel, transport.action_list()).await;
            drop(busy);
            let _ = events.send(ControlEvent::ActionsFetched(result)).await;
        });
    }

    fn on_actions_fetched(&mut self, result: Result<ActionList, TransportError>) {
        self.actions_loading = false;
        match result {
            Ok(list) => {
                self.actions.load(list);
                info!("controller: loaded {} actions", self.actions.len());
                self.publish_actions();
            }
            Err(e) if e.is_cancelled() => {}
            Err(e) => warn!("could not load action list: {}", e),
        }
    }

    fn reload_locations(&mut self) {
        let transport = Arc::clone(&self.transport);
        let events = self.events_tx.clone();
        let cancel = self.shutdown.child_token();
        let busy = self.load.begin();
        tokio::spawn(async move {
            let result = cancellable(&cancel, transport.location_list()).await;
            drop(busy);
            let _ = events.send(ControlEvent::LocationsFetched(result)).await;
        });
    }

    fn on_locations_fetched(&mut self, result: Result<Vec<String>, TransportError>) {
        match result {
            Ok(mut list) => {
                list.sort_by_key(|name| name.to_lowercase());
                info!("controller: loaded {} locations", list.len());
                self.locations = Arc::new(list);
                self.publish(PanelEvent::Locations(Arc::clone(&self.locations)));
            }
            Err(e) if e.is_cancelled() => {}
            Err(e) => warn!("could not load location list: {}", e),
        }
    }

    fn publish_actions(&self) {
        self.publish(PanelEvent::Actions(Arc::new(self.actions.groups().clone())));
    }

    // ── Commands ──────────────────────────────────────────────────────────────

    fn send_now(&self, path: String, payload: Payload) {
        let sender = self.sender.clone();
        let cancel = self.shutdown.child_token();
        tokio::spawn(async move {
            // Alerts and the follow-up poll are handled by the sender.
            let _ = sender.send(&path, &payload, &cancel).await;
        });
    }

    fn enqueue_edit(&mut self, path: String, payload: Payload) {
        let queue = match self.queues.entry(path) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let updates = self.updates.clone();
                let flushed = entry.key().clone();
                let queue = UpdateQueue::new(
                    entry.key().clone(),
                    self.settings.edit_update_delay(),
                    self.sender.clone(),
                    self.events_tx.clone(),
                    self.shutdown.child_token(),
                )
                .on_finished(move |settled| {
                    // A newer edit behind this one keeps the path pending.
                    if settled {
                        let _ = updates.send(PanelEvent::EditFlushed {
                            path: flushed.clone(),
                        });
                    }
                });
                entry.insert(queue)
            }
        };
        queue.enqueue(payload);
    }

    fn publish(&self, event: PanelEvent) {
        // No subscribers is fine.
        let _ = self.updates.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remote_proto::protocol::{ActionChanges, ActionInfo};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::broadcast::error::TryRecvError;

    enum Scripted {
        Ok(StatusResponse),
        Fail,
    }

    struct RecordedPost {
        path: String,
        payload: Payload,
        started: Instant,
        finished: Instant,
    }

    /// In-memory server.  Unscripted polls answer with action change set
    /// `SERVER_ACTION_ID`.
    struct FakeTransport {
        script: Mutex<VecDeque<Scripted>>,
        fail_all: AtomicBool,
        actions_available: AtomicBool,
        fail_posts: AtomicBool,
        status_latency: Duration,
        post_latency: Duration,
        reply: Mutex<String>,
        status_ids: Mutex<Vec<i64>>,
        posts: Mutex<Vec<RecordedPost>>,
    }

    const SERVER_ACTION_ID: i64 = 5;

    impl FakeTransport {
        fn new() -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
                fail_all: AtomicBool::new(false),
                actions_available: AtomicBool::new(true),
                fail_posts: AtomicBool::new(false),
                status_latency: Duration::ZERO,
                post_latency: Duration::ZERO,
                reply: Mutex::new("ok".to_string()),
                status_ids: Mutex::new(Vec::new()),
                posts: Mutex::new(Vec::new()),
            }
        }

        fn status_ids(&self) -> Vec<i64> {
            self.status_ids.lock().unwrap().clone()
        }

        fn status_calls(&self) -> usize {
            self.status_ids.lock().unwrap().len()
        }

        fn post_payloads(&self) -> Vec<(String, Payload)> {
            self.posts
                .lock()
                .unwrap()
                .iter()
                .map(|p| (p.path.clone(), p.payload.clone()))
                .collect()
        }
    }

    fn server_status(id: i64) -> StatusResponse {
        StatusResponse {
            action_changes: ActionChanges {
                id,
                changes: serde_json::json!({"actionShow_Stars": false})
                    .as_object()
                    .cloned()
                    .unwrap(),
            },
            ..Default::default()
        }
    }

    impl Transport for FakeTransport {
        async fn status(&self, action_id: i64) -> Result<StatusResponse, TransportError> {
            self.status_ids.lock().unwrap().push(action_id);
            if !self.status_latency.is_zero() {
                tokio::time::sleep(self.status_latency).await;
            }
            if self.fail_all.load(Ordering::SeqCst) {
                return Err(TransportError::Status(503));
            }
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Scripted::Ok(status)) => Ok(status),
                Some(Scripted::Fail) => Err(TransportError::Status(503)),
                None => Ok(server_status(SERVER_ACTION_ID)),
            }
        }

        async fn post(&self, path: &str, payload: &Payload) -> Result<String, TransportError> {
            let started = Instant::now();
            if !self.post_latency.is_zero() {
                tokio::time::sleep(self.post_latency).await;
            }
            self.posts.lock().unwrap().push(RecordedPost {
                path: path.to_string(),
                payload: payload.clone(),
                started,
                finished: Instant::now(),
            });
            if self.fail_posts.load(Ordering::SeqCst) {
                return Err(TransportError::Status(502));
            }
            let reply = self.reply.lock().unwrap().clone();
            Ok(reply)
        }

        async fn action_list(&self) -> Result<ActionList, TransportError> {
            if !self.actions_available.load(Ordering::SeqCst) {
                return Err(TransportError::Status(404));
            }
            let mut list = ActionList::new();
            list.insert(
                "Display".into(),
                vec![ActionInfo {
                    id: "actionShow_Stars".into(),
                    text: "Stars".into(),
                    is_checkable: true,
                    is_checked: true,
                }],
            );
            Ok(list)
        }

        async fn location_list(&self) -> Result<Vec<String>, TransportError> {
            Ok(vec!["Vienna".into(), "Paris".into()])
        }
    }

    fn settings() -> UiSettings {
        UiSettings {
            update_poll: false,
            update_interval_ms: 1000,
            use_animation_frame: false,
            animation_delay_ms: 250,
            edit_update_delay_ms: 500,
            spinner_delay_ms: 100,
        }
    }

    fn start(
        transport: FakeTransport,
        settings: UiSettings,
    ) -> (Arc<FakeTransport>, PanelHandle, broadcast::Receiver<PanelEvent>) {
        let transport = Arc::new(transport);
        let (controller, handle) = Controller::new(Arc::clone(&transport), settings);
        let rx = handle.subscribe();
        tokio::spawn(controller.run());
        (transport, handle, rx)
    }

    fn drain(rx: &mut broadcast::Receiver<PanelEvent>) -> Vec<PanelEvent> {
        let mut out = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(evt) => out.push(evt),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        out
    }

    fn alerts(events: &[PanelEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                PanelEvent::Alert(m) => Some(m.clone()),
                _ => None,
            })
            .collect()
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[test]
    fn test_session_same_id_is_not_applied_twice() {
        let now = Instant::now();
        let mut session = SessionState::new(now);
        let mut actions = ActionRegistry::new();
        actions.load(ActionList::from([(
            "Display".to_string(),
            vec![ActionInfo {
                id: "actionShow_Stars".into(),
                text: "Stars".into(),
                is_checkable: true,
                is_checked: true,
            }],
        )]));

        let first = session.on_poll_success(server_status(5), now, &mut actions);
        assert!(matches!(first.reconcile, Reconcile::Applied { to: 5, changed: 1, .. }));
        let second = session.on_poll_success(server_status(5), now, &mut actions);
        assert_eq!(second.reconcile, Reconcile::Unchanged);
        assert_eq!(session.last_action_id(), 5);
    }

    #[test]
    fn test_session_failure_resets_to_sentinel() {
        let now = Instant::now();
        let mut session = SessionState::new(now);
        let mut actions = ActionRegistry::new();
        actions.load(ActionList::new());
        session.on_poll_success(
            StatusResponse {
                action_changes: ActionChanges {
                    id: 8,
                    changes: Default::default(),
                },
                ..Default::default()
            },
            now,
            &mut actions,
        );
        assert_eq!(session.last_action_id(), 8);

        assert_eq!(session.on_poll_failure(), Some(Transition::Lost));
        assert_eq!(session.last_action_id(), RESYNC_ACTION_ID);
        assert_eq!(session.on_poll_failure(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_burst_sends_last_payload_only() {
        let (transport, handle, mut rx) = start(FakeTransport::new(), settings());
        settle().await;

        for fov in [10, 20, 30] {
            handle
                .edit(paths::FOV, Payload::new().field("fov", fov))
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        tokio::time::sleep(Duration::from_millis(1000)).await;

        let posts = transport.post_payloads();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].0, paths::FOV);
        assert_eq!(posts[0].1.get("fov"), Some("30"));

        let events = drain(&mut rx);
        assert!(events
            .iter()
            .any(|e| matches!(e, PanelEvent::EditFlushed { path } if path == paths::FOV)));
        handle.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_edits_to_different_fields_are_independent() {
        let (transport, handle, _rx) = start(FakeTransport::new(), settings());
        settle().await;

        handle
            .edit(paths::FOV, Payload::new().field("fov", 45))
            .await
            .unwrap();
        handle
            .edit(paths::TIME, Payload::new().field("timerate", 0.001))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(700)).await;

        let mut paths_sent: Vec<String> =
            transport.post_payloads().into_iter().map(|(p, _)| p).collect();
        paths_sent.sort();
        assert_eq!(paths_sent, vec![paths::FOV.to_string(), paths::TIME.to_string()]);
        handle.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_ok_reply_polls_without_alert() {
        let (transport, handle, mut rx) = start(FakeTransport::new(), settings());
        settle().await;
        let before = transport.status_calls();
        drain(&mut rx);

        handle
            .send(paths::FOV, Payload::new().field("fov", 60))
            .await
            .unwrap();
        settle().await;

        assert!(transport.status_calls() > before);
        assert!(alerts(&drain(&mut rx)).is_empty());
        handle.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_soft_error_alerts_and_still_polls() {
        let fake = FakeTransport::new();
        *fake.reply.lock().unwrap() = "Invalid parameter".to_string();
        let (transport, handle, mut rx) = start(fake, settings());
        settle().await;
        let before = transport.status_calls();
        drain(&mut rx);

        handle
            .send(paths::FOV, Payload::new().field("fov", -3))
            .await
            .unwrap();
        settle().await;

        assert_eq!(alerts(&drain(&mut rx)), vec!["Invalid parameter".to_string()]);
        assert!(transport.status_calls() > before);
        handle.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_command_alerts_without_retry_or_poll() {
        let fake = FakeTransport::new();
        fake.fail_posts.store(true, Ordering::SeqCst);
        let (transport, handle, mut rx) = start(fake, settings());
        settle().await;
        let before = transport.status_calls();
        drain(&mut rx);

        handle
            .send(paths::FOV, Payload::new().field("fov", 12))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(3000)).await;

        assert_eq!(
            alerts(&drain(&mut rx)),
            vec!["Error sending command to server: server answered HTTP 502".to_string()]
        );
        assert_eq!(transport.post_payloads().len(), 1);
        assert_eq!(transport.status_calls(), before);
        handle.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_stays_pending_while_newer_edit_queued() {
        let mut fake = FakeTransport::new();
        fake.post_latency = Duration::from_millis(800);
        let (transport, handle, mut rx) = start(fake, settings());
        settle().await;
        drain(&mut rx);

        handle
            .edit(paths::FOV, Payload::new().field("fov", 10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;
        handle
            .edit(paths::FOV, Payload::new().field("fov", 20))
            .await
            .unwrap();

        let flushed = |events: &[PanelEvent]| {
            events
                .iter()
                .filter(|e| matches!(e, PanelEvent::EditFlushed { path } if path == paths::FOV))
                .count()
        };

        // The first POST has completed, the second edit is still queued.
        tokio::time::sleep(Duration::from_millis(750)).await;
        assert_eq!(transport.post_payloads().len(), 1);
        assert_eq!(flushed(&drain(&mut rx)), 0);

        tokio::time::sleep(Duration::from_millis(900)).await;
        let posts = transport.post_payloads();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[1].1.get("fov"), Some("20"));
        assert_eq!(flushed(&drain(&mut rx)), 1);
        handle.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_action_posts_trigger() {
        let (transport, handle, _rx) = start(FakeTransport::new(), settings());
        settle().await;

        handle.toggle_action("actionShow_Stars").await.unwrap();
        settle().await;

        let posts = transport.post_payloads();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].0, paths::ACTION_DO);
        assert_eq!(posts[0].1.get("id"), Some("actionShow_Stars"));
        handle.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_resyncs_and_reports_once() {
        let mut fake = FakeTransport::new();
        fake.status_latency = Duration::from_millis(10);
        {
            let mut script = fake.script.lock().unwrap();
            script.push_back(Scripted::Ok(server_status(SERVER_ACTION_ID)));
            script.push_back(Scripted::Fail);
            script.push_back(Scripted::Fail);
        }
        let mut ui = settings();
        ui.update_poll = true;
        let (transport, handle, mut rx) = start(fake, ui);

        tokio::time::sleep(Duration::from_millis(3500)).await;

        let ids = transport.status_ids();
        assert!(ids.len() >= 4, "ids: {:?}", ids);
        assert_eq!(&ids[..4], &[RESYNC_ACTION_ID, SERVER_ACTION_ID, RESYNC_ACTION_ID, RESYNC_ACTION_ID]);

        let events = drain(&mut rx);
        let lost = events
            .iter()
            .position(|e| matches!(e, PanelEvent::ConnectionLost))
            .expect("connection lost");
        let restored = events
            .iter()
            .position(|e| matches!(e, PanelEvent::ConnectionRestored))
            .expect("connection restored");
        assert!(lost < restored);
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, PanelEvent::ConnectionLost))
                .count(),
            1
        );
        handle.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_unapplied_change_set_is_requested_again() {
        let fake = FakeTransport::new();
        fake.actions_available.store(false, Ordering::SeqCst);
        let mut ui = settings();
        ui.update_poll = true;
        let (transport, handle, mut rx) = start(fake, ui);

        tokio::time::sleep(Duration::from_millis(2500)).await;
        let ids = transport.status_ids();
        assert_eq!(ids.len(), 3);
        assert!(ids.iter().all(|&id| id == RESYNC_ACTION_ID));

        // Once the list can be loaded the set applies and the id advances.
        transport.actions_available.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert_eq!(transport.status_ids().last(), Some(&SERVER_ACTION_ID));
        assert!(drain(&mut rx)
            .iter()
            .any(|e| matches!(e, PanelEvent::Actions(_))));
        handle.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnected_counter_ticks_each_second() {
        let fake = FakeTransport::new();
        fake.fail_all.store(true, Ordering::SeqCst);
        let mut ui = settings();
        ui.update_poll = true;
        let (_transport, handle, mut rx) = start(fake, ui);

        tokio::time::sleep(Duration::from_millis(3200)).await;

        let secs: Vec<u64> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                PanelEvent::Disconnected { secs } => Some(secs),
                _ => None,
            })
            .collect();
        assert!(secs.windows(2).all(|w| w[0] < w[1]), "secs: {:?}", secs);
        assert_eq!(secs.last(), Some(&3));
        handle.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_spinner_only_for_slow_requests() {
        let mut fake = FakeTransport::new();
        fake.status_latency = Duration::from_millis(300);
        let (_transport, handle, mut rx) = start(fake, settings());

        tokio::time::sleep(Duration::from_millis(400)).await;
        let busy: Vec<bool> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                PanelEvent::Busy(b) => Some(b),
                _ => None,
            })
            .collect();
        assert_eq!(busy, vec![true, false]);
        handle.shutdown();

        let (_transport, handle, mut rx) = start(FakeTransport::new(), settings());
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(!drain(&mut rx).iter().any(|e| matches!(e, PanelEvent::Busy(_))));
        handle.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_sends_do_not_overlap() {
        let mut fake = FakeTransport::new();
        fake.post_latency = Duration::from_millis(800);
        let (transport, handle, _rx) = start(fake, settings());
        settle().await;

        handle
            .edit(paths::FOV, Payload::new().field("fov", 10))
            .await
            .unwrap();
        // First edit fires at ~500 ms and is in flight until ~1300 ms.
        tokio::time::sleep(Duration::from_millis(600)).await;
        handle
            .edit(paths::FOV, Payload::new().field("fov", 20))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;

        let posts = transport.posts.lock().unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].payload.get("fov"), Some("10"));
        assert_eq!(posts[1].payload.get("fov"), Some("20"));
        assert!(posts[1].started >= posts[0].finished);
        drop(posts);
        handle.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drops_pending_edit() {
        let (transport, handle, _rx) = start(FakeTransport::new(), settings());
        settle().await;

        handle
            .edit(paths::FOV, Payload::new().field("fov", 10))
            .await
            .unwrap();
        settle().await;
        handle.shutdown();
        tokio::time::sleep(Duration::from_millis(1000)).await;

        assert!(transport.post_payloads().is_empty());
        assert_eq!(handle.refresh().await, Err(ControllerGone));
    }
}
