//! App — component-based event loop.
//!
//! Architecture:
//! - `App` owns all components and `AppState` (shared read-only data for components).
//! - A `tokio::mpsc` channel carries `AppMessage` events in from background tasks.
//! - The event loop draws each frame, then awaits the next message.
//! - Components return `Vec<Action>`; App dispatches each Action.
//! - Requests to the controller flow out through the `PanelHandle`.

use std::io;
use std::time::{Duration, Instant};

use ratatui::crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::Style,
    widgets::Block,
    Terminal,
};
use remote_client::{PanelEvent, PanelHandle, PanelRequest};
use remote_proto::config::UiSettings;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::{
    action::{Action, Tab},
    app_state::AppState,
    component::Component,
    components::{
        actions_panel::ActionsPanel, help_overlay::HelpOverlay, location_panel::LocationPanel,
        main_panel::MainPanel, no_response::NoResponse, view_panel::ViewPanel,
    },
    tabs::{draw_tabs, TabMemory},
    theme::C_BG,
    widgets::{
        status_bar::{self, InputMode, StatusLine},
        toast::ToastManager,
    },
};

// ── Internal event bus ────────────────────────────────────────────────────────

enum AppMessage {
    Event(Event),
    Panel(PanelEvent),
    /// A warning or error from the log, for the status bar.
    Log(String),
}

pub struct App {
    state: AppState,
    panel: PanelHandle,
    settings: UiSettings,

    tab: Tab,
    tab_memory: TabMemory,

    main_panel: MainPanel,
    actions_panel: ActionsPanel,
    location_panel: LocationPanel,
    view_panel: ViewPanel,
    help_overlay: HelpOverlay,
    no_response: NoResponse,

    toast: ToastManager,
    spinner_frame: usize,
    should_quit: bool,
}

impl App {
    pub fn new(panel: PanelHandle, tab_memory: TabMemory, settings: UiSettings) -> Self {
        let tab = tab_memory.restore();
        Self {
            state: AppState::new(Instant::now()),
            panel,
            settings,
            tab,
            tab_memory,
            main_panel: MainPanel::new(),
            actions_panel: ActionsPanel::new(),
            location_panel: LocationPanel::new(),
            view_panel: ViewPanel::new(),
            help_overlay: HelpOverlay::new(),
            no_response: NoResponse::new(),
            toast: ToastManager::new(),
            spinner_frame: 0,
            should_quit: false,
        }
    }

    // ── Main run loop ─────────────────────────────────────────────────────────

    pub async fn run(
        mut self,
        updates: broadcast::Receiver<PanelEvent>,
        logs: broadcast::Receiver<String>,
    ) -> anyhow::Result<()> {
        debug!("run(): enabling raw mode");
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        debug!("run(): terminal created, size={:?}", terminal.size());

        let result = self.event_loop(&mut terminal, updates, logs).await;

        // ── Teardown ──────────────────────────────────────────────────────────
        self.panel.shutdown();
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    async fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
        updates: broadcast::Receiver<PanelEvent>,
        logs: broadcast::Receiver<String>,
    ) -> anyhow::Result<()> {
        let (tx, mut rx) = mpsc::channel::<AppMessage>(1024);

        // ── Background task: keyboard events ──────────────────────────────────
        let event_tx = tx.clone();
        // Polls with a timeout so the thread notices the loop has ended.
        tokio::task::spawn_blocking(move || loop {
            if event_tx.is_closed() {
                break;
            }
            match event::poll(Duration::from_millis(250)) {
                Ok(true) => match event::read() {
                    Ok(ev) => {
                        if event_tx.blocking_send(AppMessage::Event(ev)).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                },
                Ok(false) => {}
                Err(_) => break,
            }
        });

        // ── Background tasks: controller events and log lines ─────────────────
        tokio::spawn(forward(updates, tx.clone(), AppMessage::Panel));
        tokio::spawn(forward(logs, tx.clone(), AppMessage::Log));

        // ── Periodic timers ───────────────────────────────────────────────────
        // Simulation clock: advances the displayed time between polls.
        let mut animation_tick = tokio::time::interval(self.settings.animation_period());
        animation_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // Toast expiry, tooltip expiry and spinner animation.
        let mut ui_tick = tokio::time::interval(Duration::from_millis(100));
        ui_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // ── Main loop ─────────────────────────────────────────────────────────
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal.draw(|f| self.draw(f))?;
            }
            needs_redraw = false;

            if self.should_quit {
                break;
            }

            tokio::select! {
                msg = rx.recv() => {
                    let Some(msg) = msg else { break };
                    const MAX_DRAIN: usize = 256;
                    let mut redraw = self.handle_message(msg).await;
                    let mut drained = 0usize;
                    while drained < MAX_DRAIN {
                        let Ok(next) = rx.try_recv() else { break };
                        drained += 1;
                        redraw |= self.handle_message(next).await;
                    }
                    needs_redraw = redraw;
                }

                _ = animation_tick.tick() => {
                    self.state.now = Instant::now();
                    needs_redraw = self.state.status.is_some();
                }

                _ = ui_tick.tick() => {
                    self.toast.tick(Instant::now());
                    if self.state.busy {
                        self.spinner_frame = self.spinner_frame.wrapping_add(1);
                    }
                    let tick_actions: Vec<Action> = {
                        let s = &self.state;
                        let mut all = Vec::new();
                        all.extend(self.main_panel.tick(s));
                        all.extend(self.actions_panel.tick(s));
                        all.extend(self.location_panel.tick(s));
                        all.extend(self.view_panel.tick(s));
                        all
                    };
                    for action in tick_actions {
                        self.dispatch(action).await;
                    }
                    needs_redraw = true;
                }
            }
        }
        info!("event loop finished");
        Ok(())
    }

    /// Returns whether a redraw is needed.
    async fn handle_message(&mut self, msg: AppMessage) -> bool {
        match msg {
            AppMessage::Event(Event::Key(key)) => {
                if key.kind == KeyEventKind::Release {
                    return false;
                }
                let actions = self.handle_key(key);
                for a in actions {
                    self.dispatch(a).await;
                }
                true
            }
            AppMessage::Event(Event::Resize(..)) => true,
            AppMessage::Event(_) => false,
            AppMessage::Panel(event) => {
                self.on_panel_event(event);
                true
            }
            AppMessage::Log(line) => {
                self.state.last_log = Some(line);
                true
            }
        }
    }

    fn on_panel_event(&mut self, event: PanelEvent) {
        if !self.state.apply(&event, Instant::now()) {
            if let PanelEvent::Alert(message) = &event {
                self.toast.error(message.clone());
            }
            return;
        }
        match &event {
            PanelEvent::ConnectionRestored => self.toast.info("Connection restored"),
            PanelEvent::Busy(false) => self.spinner_frame = 0,
            _ => {}
        }
        let s = &self.state;
        self.main_panel.on_update(&event, s);
        self.actions_panel.on_update(&event, s);
        self.location_panel.on_update(&event, s);
        self.view_panel.on_update(&event, s);
    }

    fn handle_key(&mut self, key: KeyEvent) -> Vec<Action> {
        if key.code == KeyCode::Char('c') && key.modifiers == KeyModifiers::CONTROL {
            return vec![Action::Quit];
        }

        // The disconnected modal swallows everything but quit.
        if NoResponse::is_visible(&self.state) {
            return self.no_response.handle_key(key, &self.state);
        }

        // Help overlay captures all keys when visible
        if self.help_overlay.visible {
            let actions = self.help_overlay.handle_key(key, &self.state);
            if !actions.is_empty() {
                return actions;
            }
            // Any other key closes the overlay
            return vec![Action::ToggleHelp];
        }

        // Tab / Shift-Tab always switch tabs; leaving a text field first.
        match key.code {
            KeyCode::Tab => return vec![Action::NextTab],
            KeyCode::BackTab => return vec![Action::PrevTab],
            _ => {}
        }

        if self.state.input_mode == InputMode::Edit {
            return self.focused_handle_key(key);
        }

        if key.modifiers == KeyModifiers::NONE || key.modifiers == KeyModifiers::SHIFT {
            match key.code {
                KeyCode::Char('q') => return vec![Action::Quit],
                KeyCode::Char('?') => return vec![Action::ToggleHelp],
                KeyCode::Char('r') => return vec![Action::Refresh],
                KeyCode::Char('R') => return vec![Action::ReloadLists],
                KeyCode::Char(c @ '1'..='4') => {
                    let idx = c as usize - '1' as usize;
                    if let Some(tab) = Tab::from_index(idx) {
                        return vec![Action::SwitchTab(tab)];
                    }
                }
                _ => {}
            }
        }

        self.focused_handle_key(key)
    }

    fn focused_handle_key(&mut self, key: KeyEvent) -> Vec<Action> {
        let s = &self.state;
        let focused: &mut dyn Component = match self.tab {
            Tab::Main => &mut self.main_panel,
            Tab::Actions => &mut self.actions_panel,
            Tab::Location => &mut self.location_panel,
            Tab::View => &mut self.view_panel,
        };
        debug_assert_eq!(focused.id(), self.tab.component());
        focused.handle_key(key, s)
    }

    async fn dispatch(&mut self, action: Action) {
        // Broadcast action to all components first
        let secondary: Vec<Action> = {
            let s = &self.state;
            let mut out = Vec::new();
            out.extend(self.main_panel.on_action(&action, s));
            out.extend(self.actions_panel.on_action(&action, s));
            out.extend(self.location_panel.on_action(&action, s));
            out.extend(self.view_panel.on_action(&action, s));
            out.extend(self.help_overlay.on_action(&action, s));
            out
        };

        // Secondary actions first: a field left by a tab switch commits
        // before the switch.
        for a in secondary {
            self.apply_action(a).await;
        }
        self.apply_action(action).await;
    }

    async fn apply_action(&mut self, action: Action) {
        if !matches!(action, Action::Noop) {
            debug!("apply_action: {:?}", action);
        }
        let sent = match action {
            // ── Navigation ────────────────────────────────────────────────────
            Action::SwitchTab(tab) => {
                self.switch_tab(tab);
                Ok(())
            }
            Action::NextTab => {
                self.switch_tab(self.tab.next());
                Ok(())
            }
            Action::PrevTab => {
                self.switch_tab(self.tab.prev());
                Ok(())
            }

            // ── Server commands ───────────────────────────────────────────────
            Action::Send { path, payload } => self.panel.send(&path, payload).await,
            Action::Edit { path, payload } => {
                self.state.pending_edits.insert(path.clone());
                self.panel.edit(&path, payload).await
            }
            Action::ToggleAction(id) => self.panel.toggle_action(&id).await,
            Action::Refresh => self.panel.refresh().await,
            Action::ReloadLists => {
                self.toast.info("Reloading actions and locations");
                match self.panel.request(PanelRequest::ReloadActions).await {
                    Ok(()) => self.panel.request(PanelRequest::ReloadLocations).await,
                    Err(e) => Err(e),
                }
            }

            // ── UI ────────────────────────────────────────────────────────────
            Action::Editing(editing) => {
                self.state.input_mode = if editing {
                    InputMode::Edit
                } else {
                    InputMode::Normal
                };
                Ok(())
            }
            Action::ToggleHelp => Ok(()),

            // ── System ────────────────────────────────────────────────────────
            Action::Quit => {
                self.should_quit = true;
                Ok(())
            }
            Action::Noop => Ok(()),
        };

        if let Err(e) = sent {
            error!("request dropped: {}", e);
            self.should_quit = true;
        }
    }

    fn switch_tab(&mut self, tab: Tab) {
        if tab != self.tab {
            self.tab = tab;
            self.tab_memory.remember(tab);
        }
    }

    // ── Drawing ───────────────────────────────────────────────────────────────

    fn draw(&mut self, frame: &mut ratatui::Frame) {
        let area = frame.area();
        frame.render_widget(Block::default().style(Style::default().bg(C_BG)), area);

        let outer = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(area);

        draw_tabs(frame, outer[0], self.tab);

        let body = outer[1];
        let s = &self.state;
        match self.tab {
            Tab::Main => self.main_panel.draw(frame, body, true, s),
            Tab::Actions => self.actions_panel.draw(frame, body, true, s),
            Tab::Location => self.location_panel.draw(frame, body, true, s),
            Tab::View => self.view_panel.draw(frame, body, true, s),
        }

        status_bar::draw_status_bar(
            frame,
            outer[2],
            &StatusLine {
                connected: s.connected,
                spinner: s.busy.then_some(self.spinner_frame),
                last_log: s.last_log.as_deref(),
                mode: s.input_mode,
                tab: self.tab,
            },
        );

        // ── Overlays ──────────────────────────────────────────────────────────
        self.no_response.draw(frame, area, false, s);
        self.help_overlay.draw(frame, area, false, s);

        // ── Toast notifications (topmost layer) ──────────────────────────────
        self.toast.draw(frame, area);
    }
}

/// Pump a broadcast receiver into the app channel until either side closes.
async fn forward<T, F>(mut rx: broadcast::Receiver<T>, tx: mpsc::Sender<AppMessage>, wrap: F)
where
    T: Clone + Send + 'static,
    F: Fn(T) -> AppMessage + Send + 'static,
{
    loop {
        match rx.recv().await {
            Ok(msg) => {
                if tx.send(wrap(msg)).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("broadcast receiver lagged by {} messages", n);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
