use std::{
    io::{self, Stdout},
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use crossterm::{
    event::{
        self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::debug;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};

use crate::{
    command::{CommandError, CommandRegistry, Outcome, RpcAction, Views},
    config::AppConfig,
    keychain::{Keychain, Press},
    list::ListModel,
    model::{
        format_bytes, format_eta, format_progress, format_speed, Entry, FileItem, PeerItem,
        Snapshot, TorrentItem, TrackerItem, ViewContext,
    },
    prompt::{InteractiveSession, SessionState},
    rates::RateEstimator,
    rpc::{DaemonClient, RpcResult},
};

type Backend = ratatui::backend::CrosstermBackend<Stdout>;

pub fn run(config: AppConfig) -> Result<()> {
    let client =
        DaemonClient::new(config.rpc.clone()).context("failed to construct daemon RPC client")?;
    let mut terminal = setup_terminal()?;
    let (event_tx, event_rx) = unbounded();
    let (rpc_tx, rpc_rx) = unbounded();

    let input_handle = spawn_input_thread(event_tx.clone());
    let worker_handle = spawn_rpc_worker(client, rpc_rx, event_tx.clone(), config.poll_interval);

    let mut app = App::new(&config)?;
    app.set_status(StatusUpdate::info("Connecting to daemon…"));

    if rpc_tx.send(RpcAction::Refresh).is_err() {
        app.set_status(StatusUpdate::error(
            "RPC worker not available; shutting down",
        ));
    }

    let loop_result = run_loop(&mut terminal, &mut app, event_rx, rpc_tx.clone());

    drop(rpc_tx);
    drop(event_tx);

    restore_terminal(&mut terminal)?;
    input_handle.join().ok();
    worker_handle.join().ok();

    loop_result
}

fn run_loop(
    terminal: &mut Terminal<Backend>,
    app: &mut App,
    events: Receiver<AppEvent>,
    rpc_tx: Sender<RpcAction>,
) -> Result<()> {
    terminal.draw(|f| app.render(f))?;
    loop {
        let event = match events.recv() {
            Ok(event) => event,
            Err(_) => break,
        };
        if app.process_event(event, &rpc_tx)? {
            break;
        }
        terminal.draw(|f| app.render(f))?;
        if app.should_quit {
            break;
        }
    }
    Ok(())
}

fn setup_terminal() -> Result<Terminal<Backend>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(terminal: &mut Terminal<Backend>) -> Result<()> {
    disable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, DisableBracketedPaste, LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn spawn_input_thread(tx: Sender<AppEvent>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let tick_rate = Duration::from_millis(250);
        loop {
            match event::poll(tick_rate) {
                Ok(true) => match event::read() {
                    Ok(evt) => {
                        if tx.send(AppEvent::Input(evt)).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        let _ = tx.send(AppEvent::Status(StatusUpdate::error(format!(
                            "Input error: {err}"
                        ))));
                    }
                },
                Ok(false) | Err(_) => {
                    if tx.send(AppEvent::Tick).is_err() {
                        break;
                    }
                }
            }
        }
    })
}

fn spawn_rpc_worker(
    client: DaemonClient,
    rx: Receiver<RpcAction>,
    tx: Sender<AppEvent>,
    poll_interval: Duration,
) -> thread::JoinHandle<()> {
    thread::spawn(move || rpc_worker_loop(client, rx, tx, poll_interval))
}

fn rpc_worker_loop(
    client: DaemonClient,
    rx: Receiver<RpcAction>,
    tx: Sender<AppEvent>,
    poll_interval: Duration,
) {
    let poll_enabled = poll_interval > Duration::ZERO;
    if !poll_enabled {
        while let Ok(action) = rx.recv() {
            handle_action(&client, action, &tx);
        }
        return;
    }
    loop {
        match rx.recv_timeout(poll_interval) {
            Ok(action) => handle_action(&client, action, &tx),
            Err(RecvTimeoutError::Timeout) => send_snapshot(&client, &tx),
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn handle_action(client: &DaemonClient, action: RpcAction, tx: &Sender<AppEvent>) {
    match action {
        RpcAction::Refresh => send_snapshot(client, tx),
        RpcAction::AddMagnet(magnet) => handle_add(client, &magnet, tx),
        RpcAction::Remove { ids, delete_data } => {
            report(client, tx, "Removed", client.remove_torrents(&ids, delete_data))
        }
        RpcAction::Resume { ids } => report(client, tx, "Resumed", client.start_torrents(&ids)),
        RpcAction::Pause { ids } => report(client, tx, "Paused", client.stop_torrents(&ids)),
        RpcAction::Announce { ids } => {
            report(client, tx, "Announced", client.reannounce_torrents(&ids))
        }
        RpcAction::SetFilePriority {
            torrent_id,
            indices,
            priority,
        } => report(
            client,
            tx,
            "Updated priority of",
            client.set_file_priority(torrent_id, &indices, priority),
        ),
    }
}

fn report(client: &DaemonClient, tx: &Sender<AppEvent>, verb: &str, result: RpcResult<()>) {
    match result {
        Ok(()) => {
            let _ = tx.send(AppEvent::Status(StatusUpdate::success(format!(
                "{verb} selection"
            ))));
            send_snapshot(client, tx);
        }
        Err(err) => {
            let _ = tx.send(AppEvent::Status(StatusUpdate::error(format!(
                "{verb} failed: {err}"
            ))));
        }
    }
}

fn send_snapshot(client: &DaemonClient, tx: &Sender<AppEvent>) {
    let result = client.fetch_snapshot();
    let _ = tx.send(AppEvent::Snapshot(result));
}

fn handle_add(client: &DaemonClient, magnet: &str, tx: &Sender<AppEvent>) {
    match client.add_magnet(magnet) {
        Ok(outcome) => {
            let label = outcome
                .name
                .clone()
                .unwrap_or_else(|| "torrent".to_string());
            let status = if outcome.duplicate {
                StatusUpdate::warning(format!("Already present ({label})"))
            } else if outcome.added {
                StatusUpdate::success(format!("Queued ({label})"))
            } else {
                StatusUpdate::success(format!("Processed ({label})"))
            };
            let _ = tx.send(AppEvent::Status(status));
            if let Some(id) = outcome.torrent_id {
                let _ = tx.send(AppEvent::FocusTorrent(id));
            }
            send_snapshot(client, tx);
        }
        Err(err) => {
            let _ = tx.send(AppEvent::Status(StatusUpdate::error(format!(
                "Add failed: {err}"
            ))));
        }
    }
}

enum AppEvent {
    Input(Event),
    Tick,
    Snapshot(RpcResult<Snapshot>),
    Status(StatusUpdate),
    FocusTorrent(i64),
}

#[derive(Clone)]
struct StatusUpdate {
    text: String,
    level: StatusLevel,
}

impl StatusUpdate {
    fn info(message: impl Into<String>) -> Self {
        Self {
            text: message.into(),
            level: StatusLevel::Info,
        }
    }

    fn success(message: impl Into<String>) -> Self {
        Self {
            text: message.into(),
            level: StatusLevel::Success,
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            text: message.into(),
            level: StatusLevel::Warning,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            text: message.into(),
            level: StatusLevel::Error,
        }
    }
}

#[derive(Clone, Copy)]
enum StatusLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Clone)]
struct StatusMessage {
    text: String,
    level: StatusLevel,
    expires_at: Option<Instant>,
}

impl StatusMessage {
    fn from_update(update: StatusUpdate) -> Self {
        let duration = match update.level {
            StatusLevel::Info => Duration::from_secs(4),
            StatusLevel::Success => Duration::from_secs(5),
            StatusLevel::Warning => Duration::from_secs(6),
            StatusLevel::Error => Duration::from_secs(8),
        };
        Self {
            text: update.text,
            level: update.level,
            expires_at: Some(Instant::now() + duration),
        }
    }
}

/// Current input mode. At most one interactive session exists at a time; it
/// lives inside `Prompt` and dies with it.
enum InputMode {
    Normal,
    CommandLine { buffer: String },
    Prompt { session: InteractiveSession, buffer: String },
    Help,
}

struct App {
    connection_label: String,
    version: Option<String>,
    session_stats: Option<SessionStatsLine>,
    views: Views,
    keychain: Keychain,
    registry: CommandRegistry,
    down_rates: RateEstimator,
    up_rates: RateEstimator,
    poll_interval: Duration,
    last_snapshot_at: Option<Instant>,
    status: Option<StatusMessage>,
    toast: Option<StatusMessage>,
    mode: InputMode,
    should_quit: bool,
}

#[derive(Clone)]
struct SessionStatsLine {
    download_speed: i64,
    upload_speed: i64,
    active: i64,
    paused: i64,
    total: i64,
}

impl App {
    fn new(config: &AppConfig) -> Result<Self> {
        let mut keychain = Keychain::new(config.keychain_timeout);
        for binding in &config.bindings {
            let keys: Vec<&str> = binding.keys.iter().map(String::as_str).collect();
            keychain.register(binding.context, &keys, binding.command.clone());
        }
        Ok(Self {
            connection_label: config.rpc.endpoint(),
            version: None,
            session_stats: None,
            views: Views::new(),
            keychain,
            registry: CommandRegistry::new(),
            down_rates: RateEstimator::new(config.smoothing)?,
            up_rates: RateEstimator::new(config.smoothing)?,
            poll_interval: config.poll_interval,
            last_snapshot_at: None,
            status: None,
            toast: None,
            mode: InputMode::Normal,
            should_quit: false,
        })
    }

    fn process_event(&mut self, event: AppEvent, rpc_tx: &Sender<RpcAction>) -> Result<bool> {
        match event {
            AppEvent::Input(event) => self.handle_input(event, rpc_tx),
            AppEvent::Tick => {
                self.expire_status();
                self.keychain.expire(Instant::now());
                Ok(false)
            }
            AppEvent::Snapshot(result) => {
                self.apply_snapshot(result);
                Ok(false)
            }
            AppEvent::Status(update) => {
                self.set_status(update);
                Ok(false)
            }
            AppEvent::FocusTorrent(id) => {
                // The snapshot carrying the new torrent may not have landed
                // yet; in that case the focus simply stays where it is.
                self.views.torrents.focus_id(id);
                Ok(false)
            }
        }
    }

    fn handle_input(&mut self, event: Event, rpc_tx: &Sender<RpcAction>) -> Result<bool> {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
                    self.should_quit = true;
                    return Ok(true);
                }
                match &mut self.mode {
                    InputMode::Normal => self.handle_normal_key(key, rpc_tx),
                    InputMode::CommandLine { buffer } => {
                        match key.code {
                            KeyCode::Enter => {
                                let line = buffer.trim().to_string();
                                self.mode = InputMode::Normal;
                                self.run_command(&line, rpc_tx);
                            }
                            KeyCode::Esc => {
                                self.mode = InputMode::Normal;
                            }
                            KeyCode::Backspace => {
                                buffer.pop();
                            }
                            KeyCode::Char(c) => {
                                buffer.push(c);
                            }
                            _ => {}
                        }
                        Ok(false)
                    }
                    InputMode::Prompt { session, buffer } => {
                        match key.code {
                            KeyCode::Enter => {
                                let value = std::mem::take(buffer);
                                match session.submit_current(&value) {
                                    Err(err) => {
                                        // Stay collecting; the same prompt is
                                        // shown again.
                                        self.set_status(StatusUpdate::warning(err.to_string()));
                                    }
                                    Ok(()) => {
                                        if session.state() == SessionState::Ready {
                                            let line = session.take_command();
                                            self.mode = InputMode::Normal;
                                            match line {
                                                Ok(line) => self.run_command(&line, rpc_tx),
                                                Err(err) => self.set_status(
                                                    StatusUpdate::error(err.to_string()),
                                                ),
                                            }
                                        }
                                    }
                                }
                            }
                            KeyCode::Esc => {
                                session.cancel();
                                self.mode = InputMode::Normal;
                                self.set_status(StatusUpdate::info(
                                    CommandError::Cancelled.to_string(),
                                ));
                            }
                            KeyCode::Backspace => {
                                buffer.pop();
                            }
                            KeyCode::Char(c) => {
                                buffer.push(c);
                            }
                            _ => {}
                        }
                        Ok(false)
                    }
                    InputMode::Help => {
                        match key.code {
                            KeyCode::Char('?')
                            | KeyCode::Esc
                            | KeyCode::Enter
                            | KeyCode::Char('q') => {
                                self.mode = InputMode::Normal;
                            }
                            _ => {}
                        }
                        Ok(false)
                    }
                }
            }
            Event::Paste(data) => {
                match &mut self.mode {
                    InputMode::CommandLine { buffer } => buffer.push_str(&data),
                    InputMode::Prompt { buffer, .. } => buffer.push_str(&data),
                    _ => {}
                }
                Ok(false)
            }
            _ => Ok(false),
        }
    }

    /// Normal-mode keys route through the keychain dispatcher; nothing is
    /// hardcoded here except the command-line opener and the chain abort.
    fn handle_normal_key(&mut self, key: KeyEvent, rpc_tx: &Sender<RpcAction>) -> Result<bool> {
        if key.code == KeyCode::Char(':') {
            self.mode = InputMode::CommandLine {
                buffer: String::new(),
            };
            return Ok(false);
        }
        if key.code == KeyCode::Esc {
            self.keychain.abort(self.views.active);
            return Ok(false);
        }
        let Some(id) = key_id(&key) else {
            return Ok(false);
        };
        match self.keychain.press(self.views.active, &id, Instant::now()) {
            Press::Dispatch(command) => self.run_command(&command, rpc_tx),
            Press::Pending => {}
            Press::NoMatch => debug!("unbound key {id:?} in {}", self.views.active.label()),
        }
        Ok(false)
    }

    fn run_command(&mut self, line: &str, rpc_tx: &Sender<RpcAction>) {
        match self.registry.dispatch(line, &mut self.views) {
            Ok(Outcome::Done(message)) => {
                if let Some(message) = message {
                    self.set_status(StatusUpdate::success(message));
                }
            }
            Ok(Outcome::NeedsInput(session)) => {
                self.mode = InputMode::Prompt {
                    session,
                    buffer: String::new(),
                };
            }
            Ok(Outcome::Rpc(action)) => {
                if rpc_tx.send(action).is_err() {
                    self.set_status(StatusUpdate::error("RPC worker is gone"));
                }
            }
            Ok(Outcome::Help) => {
                self.mode = InputMode::Help;
            }
            Ok(Outcome::Quit) => {
                self.should_quit = true;
            }
            Err(err) => {
                self.set_status(StatusUpdate::error(err.to_string()));
            }
        }
    }

    fn apply_snapshot(&mut self, result: RpcResult<Snapshot>) {
        match result {
            Ok(mut snapshot) => {
                self.smooth_peer_rates(&mut snapshot);
                self.version = Some(snapshot.version.clone());
                self.session_stats = Some(SessionStatsLine {
                    download_speed: snapshot.download_speed,
                    upload_speed: snapshot.upload_speed,
                    active: snapshot.active_torrents,
                    paused: snapshot.paused_torrents,
                    total: snapshot.total_torrents,
                });
                self.views.apply_snapshot(&snapshot);
            }
            Err(err) => {
                self.set_status(StatusUpdate::error(format!("RPC error: {err}")));
            }
        }
    }

    /// Folds each peer's raw rates into its EMA and rewrites the displayed
    /// values. Peers gone from this snapshot lose their estimator state.
    fn smooth_peer_rates(&mut self, snapshot: &mut Snapshot) {
        let now = Instant::now();
        let elapsed = self
            .last_snapshot_at
            .map_or(self.poll_interval, |at| now - at);
        self.last_snapshot_at = Some(now);

        let mut live = Vec::new();
        for torrent in &mut snapshot.torrents {
            for peer in &mut torrent.peers {
                live.push(peer.peer_id);
                peer.rate_down_smoothed =
                    self.down_rates
                        .update(peer.peer_id, peer.rate_down as f64, elapsed);
                peer.rate_up_smoothed =
                    self.up_rates
                        .update(peer.peer_id, peer.rate_up as f64, elapsed);
            }
        }
        self.down_rates.retain_live(|id| live.contains(&id));
        self.up_rates.retain_live(|id| live.contains(&id));
        debug!("smoothing rates for {} peers", self.down_rates.tracked());
    }

    fn expire_status(&mut self) {
        if let Some(status) = &self.status {
            if let Some(expiry) = status.expires_at {
                if Instant::now() >= expiry {
                    self.status = None;
                }
            }
        }
        if let Some(toast) = &self.toast {
            if let Some(expiry) = toast.expires_at {
                if Instant::now() >= expiry {
                    self.toast = None;
                }
            }
        }
    }

    fn set_status(&mut self, update: StatusUpdate) {
        let message = StatusMessage::from_update(update.clone());
        if matches!(update.level, StatusLevel::Warning | StatusLevel::Error) {
            self.toast = Some(message.clone());
        }
        self.status = Some(message);
    }

    fn render(&mut self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(6),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(frame.size());
        self.render_header(frame, chunks[0]);
        self.render_body(frame, chunks[1]);
        self.render_footer(frame, chunks[2]);
        self.render_toast(frame);
        match &self.mode {
            InputMode::CommandLine { buffer } => {
                let area = centered_rect(60, 20, frame.size());
                let block = Block::default()
                    .title(Span::raw(" Command "))
                    .borders(Borders::ALL);
                let text = vec![
                    Line::from("Enter a command (Esc to cancel)"),
                    Line::from(format!(":{buffer}")),
                ];
                let paragraph = Paragraph::new(text).block(block).wrap(Wrap { trim: true });
                frame.render_widget(Clear, area);
                frame.render_widget(paragraph, area);
            }
            InputMode::Prompt { session, buffer } => {
                let prompt = session
                    .current_prompt()
                    .map(|(_, prompt)| prompt.to_string())
                    .unwrap_or_default();
                let area = centered_rect(60, 20, frame.size());
                let block = Block::default()
                    .title(Span::raw(format!(" {prompt} ")))
                    .borders(Borders::ALL);
                let text = vec![
                    Line::from("Enter a value and press Enter (Esc to cancel)"),
                    Line::from(format!("> {buffer}")),
                ];
                let paragraph = Paragraph::new(text).block(block).wrap(Wrap { trim: true });
                frame.render_widget(Clear, area);
                frame.render_widget(paragraph, area);
            }
            InputMode::Help => {
                let area = centered_rect(70, 80, frame.size());
                let block = Block::default()
                    .title(" Key Bindings & Commands ")
                    .borders(Borders::ALL);
                let lines = self.help_lines();
                let paragraph = Paragraph::new(lines)
                    .block(block)
                    .wrap(Wrap { trim: false });
                frame.render_widget(Clear, area);
                frame.render_widget(paragraph, area);
            }
            InputMode::Normal => {}
        }
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let mut lines = Vec::new();
        lines.push(Line::from(vec![
            Span::styled("torterm", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("  |  "),
            Span::raw(self.connection_label.as_str()),
        ]));
        if let Some(stats) = &self.session_stats {
            lines.push(Line::from(vec![Span::raw(format!(
                "DL {}  UL {}  | Active {}  Paused {}  Total {}  | Version {}",
                format_speed(stats.download_speed as f64),
                format_speed(stats.upload_speed as f64),
                stats.active,
                stats.paused,
                stats.total,
                self.version.as_deref().unwrap_or("unknown")
            ))]));
        } else {
            lines.push(Line::from("Waiting for session stats…"));
        }
        if let Some(torrent) = self.views.torrents.focused_item() {
            let note = torrent.error.as_deref().unwrap_or(torrent.download_dir.as_str());
            lines.push(Line::from(format!("▶ {}  {}", torrent.name, note)));
        }
        if let Some(status) = &self.status {
            lines.push(Line::from(Span::styled(
                status.text.clone(),
                status_style(status.level),
            )));
        }
        let paragraph = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .title(Span::raw(" Session ")),
        );
        frame.render_widget(paragraph, area);
    }

    fn render_body(&mut self, frame: &mut Frame, area: Rect) {
        let (rows, selected) = match self.views.active {
            ViewContext::Torrents => view_rows(&self.views.torrents, torrent_line),
            ViewContext::Peers => view_rows(&self.views.peers, peer_line),
            ViewContext::Trackers => view_rows(&self.views.trackers, tracker_line),
            ViewContext::Files => view_rows(&self.views.files, file_line),
        };
        let mut items: Vec<ListItem> = rows.into_iter().map(ListItem::new).collect();
        if items.is_empty() {
            items.push(ListItem::new(Line::from("Nothing to show")));
        }
        let title = self.view_title();
        let block = Block::default()
            .borders(Borders::ALL)
            .title(Span::raw(title));
        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().fg(Color::Yellow))
            .highlight_symbol("> ");
        let mut state = ListState::default();
        state.select(selected);
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn view_title(&self) -> String {
        let (visible, total, marked, filters, sort) = match self.views.active {
            ViewContext::Torrents => view_summary(&self.views.torrents),
            ViewContext::Peers => view_summary(&self.views.peers),
            ViewContext::Trackers => view_summary(&self.views.trackers),
            ViewContext::Files => view_summary(&self.views.files),
        };
        let mut title = format!(" {} [{visible}/{total}]", self.views.active.label());
        if marked > 0 {
            title.push_str(&format!(" {marked} marked"));
        }
        if !filters.is_empty() {
            title.push_str(&format!(" /{}", filters.join(" & ")));
        }
        if let Some(sort) = sort {
            title.push_str(&format!(" {{{sort}}}"));
        }
        title.push(' ');
        title
    }

    fn render_footer(&self, frame: &mut Frame, area: Rect) {
        let tabs = ViewContext::ALL
            .iter()
            .enumerate()
            .map(|(i, context)| {
                if *context == self.views.active {
                    format!("[{}:{}]", i + 1, context.label())
                } else {
                    format!(" {}:{} ", i + 1, context.label())
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
        let pending = self
            .keychain
            .pending_keys(self.views.active)
            .map(|keys| format!("  keys: {keys}…"))
            .unwrap_or_default();
        let summary = Line::from(format!("{tabs}{pending}"));
        let sections = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(0), Constraint::Length(20)])
            .split(area);
        let left = Paragraph::new(summary).wrap(Wrap { trim: true });
        frame.render_widget(left, sections[0]);
        let help_label = Paragraph::new(Line::from(Span::raw("Help [?]  Cmd [:]")))
            .alignment(Alignment::Right);
        frame.render_widget(help_label, sections[1]);
    }

    fn render_toast(&self, frame: &mut Frame) {
        if !matches!(self.mode, InputMode::Normal) {
            return;
        }
        let Some(toast) = &self.toast else {
            return;
        };
        let frame_area = frame.size();
        if frame_area.width < 20 || frame_area.height < 5 {
            return;
        }
        let padding = 2;
        let max_width = frame_area.width.saturating_sub(padding * 2);
        let width = max_width.clamp(20, 60);
        let height = 3;
        let x = frame_area
            .x
            .saturating_add(frame_area.width.saturating_sub(width + padding));
        let y = frame_area
            .y
            .saturating_add(frame_area.height.saturating_sub(height + padding));
        let area = Rect::new(x, y, width, height);
        let text = Line::from(Span::styled(toast.text.clone(), status_style(toast.level)));
        let paragraph = Paragraph::new(text).alignment(Alignment::Center).block(
            Block::default()
                .borders(Borders::ALL)
                .title(Span::raw(" Notice ")),
        );
        frame.render_widget(Clear, area);
        frame.render_widget(paragraph, area);
    }

    fn help_lines(&self) -> Vec<Line<'static>> {
        let heading = |text: &'static str| {
            Line::from(Span::styled(
                text,
                Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            ))
        };
        let mut lines = vec![heading("Bindings (current view)")];
        for (context, keys, command) in self.keychain.bindings() {
            if context == self.views.active {
                lines.push(Line::from(format!("  {keys:<10} {command}")));
            }
        }
        lines.push(Line::from(""));
        lines.push(heading("Commands"));
        for def in self.registry.commands() {
            lines.push(Line::from(format!("  {:<40} {}", def.usage, def.description)));
        }
        lines.push(Line::from(""));
        lines.push(Line::from("  : opens the command line, Esc aborts a key chain"));
        lines
    }
}

/// Formatted rows for one view plus the index of the focused row.
fn view_rows<E: Entry>(
    model: &ListModel<E>,
    format: impl Fn(&E) -> String,
) -> (Vec<Line<'static>>, Option<usize>) {
    let rows = model
        .visible_items()
        .into_iter()
        .map(|item| {
            let marker = if model.is_marked(item.id()) { "*" } else { " " };
            Line::from(format!("{marker} {}", format(item)))
        })
        .collect();
    (rows, model.focus_position())
}

fn view_summary<E: Entry>(
    model: &ListModel<E>,
) -> (usize, usize, usize, Vec<String>, Option<String>) {
    let filters = model
        .filters()
        .iter()
        .map(|p| p.describe())
        .collect::<Vec<_>>();
    let sort = model
        .sort_stack()
        .first()
        .map(|criterion| criterion.field.to_string());
    (
        model.visible_items().len(),
        model.items().len(),
        model.marked_count(),
        filters,
        sort,
    )
}

fn torrent_line(torrent: &TorrentItem) -> String {
    format!(
        "{:<40.40}  {:<11}  {:>6}  DL {:>7}  UL {:>7}  ETA {:>5}",
        torrent.name,
        torrent.status,
        format_progress(torrent.percent_done),
        format_speed(torrent.rate_download as f64),
        format_speed(torrent.rate_upload as f64),
        format_eta(torrent.eta)
    )
}

fn peer_line(peer: &PeerItem) -> String {
    format!(
        "{:<22.22}  {:<18.18}  {:>6}  DL {:>7}  UL {:>7}  {:<20.20}",
        peer.address,
        peer.client,
        format_progress(peer.progress),
        format_speed(peer.rate_down_smoothed),
        format_speed(peer.rate_up_smoothed),
        peer.torrent_name
    )
}

fn tracker_line(tracker: &TrackerItem) -> String {
    format!(
        "{:<48.48}  tier {}  S {:>4}  L {:>4}  {:<20.20}",
        tracker.url, tracker.tier, tracker.seeder_count, tracker.leecher_count, tracker.torrent_name
    )
}

fn file_line(file: &FileItem) -> String {
    let priority = match file.priority {
        p if p < 0 => "low",
        0 => "normal",
        _ => "high",
    };
    format!(
        "{:<44.44}  {:>9}  {:>6}  {:<6}  {}",
        file.name,
        format_bytes(file.size_total),
        format_progress(file.progress()),
        priority,
        if file.wanted { "" } else { "skipped" }
    )
}

/// Translates a crossterm key event into the identifier space keychains are
/// registered with. Returns `None` for keys that cannot start or extend a
/// chain.
fn key_id(key: &KeyEvent) -> Option<String> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        if let KeyCode::Char(c) = key.code {
            return Some(format!("ctrl-{}", c.to_ascii_lowercase()));
        }
        return None;
    }
    let id = match key.code {
        KeyCode::Char(c) => c.to_string(),
        KeyCode::Enter => "enter".to_string(),
        KeyCode::Tab => "tab".to_string(),
        KeyCode::Backspace => "backspace".to_string(),
        KeyCode::Up => "up".to_string(),
        KeyCode::Down => "down".to_string(),
        KeyCode::Left => "left".to_string(),
        KeyCode::Right => "right".to_string(),
        KeyCode::PageUp => "pageup".to_string(),
        KeyCode::PageDown => "pagedown".to_string(),
        KeyCode::Home => "home".to_string(),
        KeyCode::End => "end".to_string(),
        _ => return None,
    };
    Some(id)
}

fn status_style(level: StatusLevel) -> Style {
    match level {
        StatusLevel::Info => Style::default().fg(Color::Blue),
        StatusLevel::Success => Style::default().fg(Color::Green),
        StatusLevel::Warning => Style::default().fg(Color::Yellow),
        StatusLevel::Error => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    let vertical = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1]);
    vertical[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_bindings;
    use crate::model::sample_torrent;
    use crossterm::event::KeyEventState;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn default_keychain() -> Keychain {
        let mut keychain = Keychain::new(Duration::from_secs(2));
        for binding in default_bindings() {
            let keys: Vec<&str> = binding.keys.iter().map(String::as_str).collect();
            keychain.register(binding.context, &keys, binding.command);
        }
        keychain
    }

    // Full path from keypress to completed command: the bound key produces an
    // interactive command, the session collects one value, and the completed
    // line dispatches exactly once.
    #[test]
    fn bound_key_drives_an_interactive_command_to_dispatch() {
        let registry = CommandRegistry::new();
        let mut views = Views::new();
        views.torrents.replace_items(vec![
            sample_torrent(1, "debian", 700),
            sample_torrent(2, "fedora", 800),
        ]);
        let mut keychain = default_keychain();

        let Press::Dispatch(line) = keychain.press(ViewContext::Torrents, "/", Instant::now())
        else {
            panic!("expected / to dispatch an interactive command");
        };
        let Outcome::NeedsInput(mut session) = registry.dispatch(&line, &mut views).unwrap()
        else {
            panic!("expected a collecting session");
        };
        assert_eq!(
            session.current_prompt(),
            Some(("expr", "Filter expression"))
        );
        session.submit_current("name~debian").unwrap();
        let completed = session.take_command().unwrap();
        assert_eq!(completed, "filter name~debian");
        registry.dispatch(&completed, &mut views).unwrap();
        assert_eq!(views.torrents.visible_items().len(), 1);
        // The session hands out its command only once.
        assert!(session.take_command().is_err());
    }

    #[test]
    fn two_stage_delete_chain_survives_the_default_bindings() {
        let registry = CommandRegistry::new();
        let mut views = Views::new();
        views
            .torrents
            .replace_items(vec![sample_torrent(7, "debian", 700)]);
        let mut keychain = default_keychain();
        let t = Instant::now();

        assert_eq!(keychain.press(ViewContext::Torrents, "d", t), Press::Pending);
        let Press::Dispatch(line) = keychain.press(ViewContext::Torrents, "d", t) else {
            panic!("expected dd to dispatch");
        };
        match registry.dispatch(&line, &mut views).unwrap() {
            Outcome::Rpc(RpcAction::Remove { ids, delete_data }) => {
                assert_eq!(ids, vec![7]);
                assert!(!delete_data);
            }
            other => panic!("expected a remove action, got {other:?}"),
        }
    }

    #[test]
    fn key_ids_match_the_binding_identifier_space() {
        assert_eq!(
            key_id(&key(KeyCode::Char('g'), KeyModifiers::NONE)).as_deref(),
            Some("g")
        );
        assert_eq!(
            key_id(&key(KeyCode::Char('G'), KeyModifiers::SHIFT)).as_deref(),
            Some("G")
        );
        assert_eq!(
            key_id(&key(KeyCode::Char('d'), KeyModifiers::CONTROL)).as_deref(),
            Some("ctrl-d")
        );
        assert_eq!(
            key_id(&key(KeyCode::Down, KeyModifiers::NONE)).as_deref(),
            Some("down")
        );
        assert_eq!(key_id(&key(KeyCode::F(1), KeyModifiers::NONE)), None);
    }
}
