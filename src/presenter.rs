//! The terminal presenter: deck area, navigation bar, progress rail, go-to
//! prompt, reload and the export worker.

use std::io;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{KeyEventKind, MouseEvent, MouseEventKind};
use crossterm::{execute, terminal::SetTitle};
use flume::{Receiver, TryRecvError};
use log::{debug, error, info, warn};
use ratatui::{
    Frame, Terminal,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::content_source::ContentSource;
use crate::deck::Deck;
use crate::deck_session::{DeckSession, NavRequest};
use crate::event_source::{Event, EventSource, KeyCode, KeyEvent, KeyModifiers};
use crate::export::{
    Artifact, BuiltinLoader, ExportError, ExportJob, ExportPipeline, ExportProgress, ExportState,
    IntervalClock, Libraries, artifact_file_name,
};
use crate::status::{StatusLine, Tone, Topic};
use crate::render::revealed_count;
use crate::render::terminal::{ProgressRail, SlideCard, render_clipped};
use crate::settings::Settings;
use crate::slide_builder::render_deck;
use crate::theme::{DeckPalette, ThemeId};
use crate::viewport::Viewport;
use crate::visibility::VisibilityTracker;

const SCROLL_ROWS: f32 = 3.0;
const MAX_GOTO_DIGITS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppAction {
    Quit,
}

enum ExportMessage {
    Progress(ExportProgress),
    Finished(Result<Artifact, ExportError>),
}

struct ExportTask {
    messages: Receiver<ExportMessage>,
    progress: Option<ExportProgress>,
}

struct Reveal {
    generation: u64,
    index: usize,
    started: Instant,
}

pub struct App {
    source: ContentSource,
    settings: Settings,
    deck: Option<Deck>,
    pub session: DeckSession,
    viewport: Viewport,
    tracker: VisibilityTracker,
    pipeline: Arc<ExportPipeline>,
    export: Option<ExportTask>,
    pub status: StatusLine,
    load_error: Option<String>,
    pending_load: bool,
    goto_input: Option<String>,
    reveal: Option<Reveal>,
    last_artifact: Option<Artifact>,
    sync_window_title: bool,
    shown_title: Option<String>,
}

impl App {
    pub fn new(source: ContentSource, settings: Settings, pipeline: Arc<ExportPipeline>) -> Self {
        let viewport = Viewport::new(1, settings.smooth_scroll);
        Self {
            source,
            settings,
            deck: None,
            session: DeckSession::new(),
            viewport,
            tracker: VisibilityTracker::new(),
            pipeline,
            export: None,
            status: StatusLine::new(),
            load_error: None,
            pending_load: true,
            goto_input: None,
            reveal: None,
            last_artifact: None,
            sync_window_title: false,
            shown_title: None,
        }
    }

    /// Let the run loop keep the terminal window title in step with the deck.
    pub fn with_window_title(mut self) -> Self {
        self.sync_window_title = true;
        self
    }

    /// Presenter wired to the built-in export libraries.
    pub fn with_settings(source: ContentSource, settings: Settings) -> Self {
        let pipeline = default_pipeline(&settings);
        Self::new(source, settings, Arc::new(pipeline))
    }

    pub fn source(&self) -> &ContentSource {
        &self.source
    }

    pub fn deck(&self) -> Option<&Deck> {
        self.deck.as_ref()
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.pending_load
    }

    pub fn is_exporting(&self) -> bool {
        self.export.is_some()
    }

    pub fn goto_input(&self) -> Option<&str> {
        self.goto_input.as_deref()
    }

    pub fn last_artifact(&self) -> Option<&Artifact> {
        self.last_artifact.as_ref()
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn window_title(&self) -> String {
        let title = self.deck.as_ref().map(Deck::title).unwrap_or("FlowPitch");
        format!("{title} — FlowPitch")
    }

    fn title_change(&mut self) -> Option<String> {
        if !self.sync_window_title {
            return None;
        }
        let title = self.window_title();
        if self.shown_title.as_deref() == Some(title.as_str()) {
            return None;
        }
        self.shown_title = Some(title.clone());
        Some(title)
    }

    fn theme(&self) -> ThemeId {
        self.deck.as_ref().map(Deck::theme).unwrap_or_default()
    }

    fn palette(&self) -> &'static DeckPalette {
        self.theme().palette()
    }

    pub fn request_reload(&mut self) {
        self.pending_load = true;
    }

    pub fn perform_pending_load(&mut self) -> bool {
        if !self.pending_load {
            return false;
        }
        self.reload();
        true
    }

    /// Fetch and render the deck. On failure the current deck stays and the
    /// error panel shows the message.
    pub fn reload(&mut self) {
        self.pending_load = false;
        info!("Loading deck from {}", self.source);
        let outcome = self
            .source
            .load()
            .map_err(|e| e.to_string())
            .and_then(|deck| {
                render_deck(&deck)
                    .map(|units| (deck, units))
                    .map_err(|e| e.to_string())
            });

        match outcome {
            Ok((deck, units)) => {
                self.session.load(units);
                self.tracker.attach(&mut self.viewport, &self.session);
                self.tracker.sync(&mut self.session);
                self.load_error = None;
                self.status.clear(Topic::Deck);
                self.goto_input = None;
                info!(
                    "Presenting '{}' ({} slides, {} theme)",
                    deck.title(),
                    self.session.len(),
                    deck.theme().name()
                );
                self.deck = Some(deck);
                self.reveal = None;
                self.refresh_reveal();
            }
            Err(message) => {
                error!("Failed to load deck: {message}");
                self.status.error(Topic::Deck, "Could not load the deck");
                self.load_error = Some(message);
            }
        }
    }

    fn request_nav(&mut self, request: NavRequest) {
        if let Some(target) = self.session.target_of(request) {
            debug!("Navigation {request:?} -> scroll to {target}");
            self.viewport.scroll_to_unit(target);
            self.sync_visibility();
        }
    }

    fn sync_visibility(&mut self) -> bool {
        let moved = self.tracker.sync(&mut self.session);
        self.refresh_reveal();
        moved
    }

    fn refresh_reveal(&mut self) {
        let Some(index) = self.session.current_index() else {
            self.reveal = None;
            return;
        };
        let generation = self.session.generation();
        let unchanged = self
            .reveal
            .as_ref()
            .is_some_and(|reveal| reveal.index == index && reveal.generation == generation);
        if !unchanged {
            self.reveal = Some(Reveal {
                generation,
                index,
                started: Instant::now(),
            });
        }
    }

    fn reveal_step(&self) -> Duration {
        Duration::from_millis(self.settings.reveal_step_ms)
    }

    fn revealed_for(&self, index: usize) -> usize {
        let Some(unit) = self.session.units().get(index) else {
            return 0;
        };
        if !unit.active {
            return 0;
        }
        match &self.reveal {
            Some(reveal) if reveal.index == index && !self.is_exporting() => revealed_count(
                reveal.started.elapsed(),
                self.reveal_step(),
                unit.animated_count(),
            ),
            _ => usize::MAX,
        }
    }

    fn reveal_in_progress(&self) -> bool {
        self.reveal.as_ref().is_some_and(|reveal| {
            self.session
                .units()
                .get(reveal.index)
                .is_some_and(|unit| self.revealed_for(reveal.index) < unit.animated_count())
        })
    }

    pub fn is_animating(&self) -> bool {
        self.viewport.is_animating() || self.reveal_in_progress()
    }

    pub fn start_export(&mut self) {
        if self.export.is_some() || self.pipeline.is_running() {
            debug!("Export trigger ignored while a run is in flight");
            return;
        }
        if self.session.is_empty() {
            self.status.warn(Topic::Export, "Nothing to export");
            return;
        }

        let job = ExportJob {
            units: self.session.units().to_vec(),
            theme: self.theme(),
            title: self
                .deck
                .as_ref()
                .map(|deck| deck.title().to_string())
                .unwrap_or_default(),
            destination: self
                .settings
                .export_dir
                .join(artifact_file_name(&self.settings.export_file_name)),
            scale: self.settings.export_scale(),
        };

        self.session.mark_all_active();
        let (tx, rx) = flume::unbounded();
        let pipeline = Arc::clone(&self.pipeline);
        let spawned = thread::Builder::new()
            .name("flowpitch-export".to_string())
            .spawn(move || {
                let progress = tx.clone();
                let result = pipeline.export(job, &mut |update| {
                    let _ = progress.send(ExportMessage::Progress(update));
                });
                let _ = tx.send(ExportMessage::Finished(result));
            });

        match spawned {
            Ok(_) => {
                self.status.info(
                    Topic::Export,
                    format!("Exporting {} slides", self.session.len()),
                );
                self.export = Some(ExportTask {
                    messages: rx,
                    progress: None,
                });
            }
            Err(e) => {
                error!("Failed to start export worker: {e}");
                self.session.restore_active();
                self.status.error(Topic::Export, format!("Export failed: {e}"));
            }
        }
    }

    /// Drain worker messages. Returns true if anything changed.
    pub fn poll_export(&mut self) -> bool {
        let Some(task) = self.export.as_mut() else {
            return false;
        };
        let mut changed = false;
        let finished = loop {
            match task.messages.try_recv() {
                Ok(ExportMessage::Progress(progress)) => {
                    task.progress = Some(progress);
                    changed = true;
                }
                Ok(ExportMessage::Finished(result)) => break Some(result),
                Err(TryRecvError::Empty) => break None,
                Err(TryRecvError::Disconnected) => {
                    break Some(Err(ExportError::Compose(
                        "export worker stopped unexpectedly".to_string(),
                    )));
                }
            }
        };

        if let Some(result) = finished {
            self.export = None;
            self.session.restore_active();
            match result {
                Ok(artifact) => {
                    self.status.info(
                        Topic::Export,
                        format!(
                            "Exported {} pages to {}",
                            artifact.pages,
                            artifact.path.display()
                        ),
                    );
                    self.last_artifact = Some(artifact);
                }
                Err(e) => {
                    warn!("Export failed: {e}");
                    self.status.error(Topic::Export, format!("Export failed: {e}"));
                }
            }
            changed = true;
        }
        changed
    }

    /// Periodic work. Returns true if a redraw is needed.
    pub fn on_tick(&mut self) -> bool {
        let mut changed = self.status.expire();
        let was_scrolling = self.viewport.is_animating();
        if self.viewport.tick() || was_scrolling {
            changed = true;
        }
        if self.sync_visibility() {
            changed = true;
        }
        if self.poll_export() {
            changed = true;
        }
        changed || self.is_animating()
    }

    pub fn handle_key_event(&mut self, key: KeyEvent) -> Option<AppAction> {
        if key.kind == KeyEventKind::Release {
            return None;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(AppAction::Quit);
        }

        if self.goto_input.is_some() {
            self.handle_goto_key(key);
            return None;
        }

        match key.code {
            KeyCode::Char(' ') if key.modifiers.contains(KeyModifiers::SHIFT) => {
                self.request_nav(NavRequest::Prev)
            }
            KeyCode::Char(' ') | KeyCode::Right | KeyCode::PageDown => {
                self.request_nav(NavRequest::Next)
            }
            KeyCode::Left | KeyCode::PageUp => self.request_nav(NavRequest::Prev),
            KeyCode::Home => self.request_nav(NavRequest::First),
            KeyCode::End => self.request_nav(NavRequest::Last),
            KeyCode::Char('j') | KeyCode::Down => self.scroll_by(SCROLL_ROWS),
            KeyCode::Char('k') | KeyCode::Up => self.scroll_by(-SCROLL_ROWS),
            KeyCode::Char('g') => {
                if !self.session.is_empty() {
                    self.goto_input = Some(String::new());
                }
            }
            KeyCode::Char('e') => self.start_export(),
            KeyCode::Char('r') => self.request_reload(),
            KeyCode::Char('q') => return Some(AppAction::Quit),
            KeyCode::Esc => {
                self.status.dismiss();
            }
            _ => {}
        }
        None
    }

    fn handle_goto_key(&mut self, key: KeyEvent) {
        let Some(input) = self.goto_input.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Char(c) if c.is_ascii_digit() && input.len() < MAX_GOTO_DIGITS => {
                input.push(c)
            }
            KeyCode::Backspace => {
                input.pop();
            }
            KeyCode::Esc => self.goto_input = None,
            KeyCode::Enter => {
                let requested = input.parse::<i64>().ok();
                self.goto_input = None;
                if let Some(number) = requested {
                    self.request_nav(NavRequest::Index(number - 1));
                }
            }
            _ => {}
        }
    }

    fn scroll_by(&mut self, rows: f32) {
        self.viewport.scroll_by(rows);
        self.sync_visibility();
    }

    pub fn handle_mouse_event(&mut self, mouse: MouseEvent) {
        match mouse.kind {
            MouseEventKind::ScrollDown => self.scroll_by(SCROLL_ROWS),
            MouseEventKind::ScrollUp => self.scroll_by(-SCROLL_ROWS),
            _ => {}
        }
    }

    pub fn draw(&mut self, f: &mut Frame) {
        let palette = self.palette();
        let area = f.area();
        f.render_widget(
            Block::default().style(Style::default().bg(palette.background.color())),
            area,
        );

        let [nav_area, main_area, status_area] = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Min(0), Constraint::Length(1)])
            .areas(area);
        let [deck_area, rail_area] = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(0), Constraint::Length(1)])
            .areas(main_area);

        self.viewport.set_height(deck_area.height);
        self.sync_visibility();

        self.draw_navigation_bar(f, nav_area, palette);
        self.draw_deck(f, deck_area, palette);
        f.render_widget(ProgressRail::new(self.session.progress(), palette), rail_area);
        self.draw_status_line(f, status_area, palette);

        if let Some(message) = &self.load_error {
            draw_error_panel(f, deck_area, message, palette);
        }
    }

    fn draw_navigation_bar(&self, f: &mut Frame, area: Rect, palette: &DeckPalette) {
        let title = self.deck.as_ref().map(Deck::title).unwrap_or("FlowPitch");
        let counter = match self.session.current_index() {
            Some(index) => format!("{} / {}", index + 1, self.session.len()),
            None => "– / –".to_string(),
        };
        let export = match &self.export {
            Some(task) => match task.progress {
                Some(ExportProgress {
                    state: ExportState::Staging | ExportState::Capturing | ExportState::Composing,
                    slide,
                    total,
                }) => format!("Exporting {}/{total}…", slide + 1),
                Some(ExportProgress { state, .. }) => format!("Exporting ({state})…"),
                None => "Exporting…".to_string(),
            },
            None => "Export PDF [e]".to_string(),
        };

        let bar = Style::default().bg(palette.frame.color());
        let [left, center, right] = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(40),
                Constraint::Percentage(20),
                Constraint::Percentage(40),
            ])
            .areas(area);
        f.render_widget(
            Paragraph::new(Line::from(Span::styled(
                format!(" {title}"),
                Style::default()
                    .fg(palette.text.color())
                    .add_modifier(Modifier::BOLD),
            )))
            .style(bar),
            left,
        );
        f.render_widget(
            Paragraph::new(Span::styled(counter, Style::default().fg(palette.muted.color())))
                .alignment(Alignment::Center)
                .style(bar),
            center,
        );
        let export_style = if self.export.is_some() {
            Style::default().fg(palette.muted.color())
        } else {
            Style::default().fg(palette.accent.color())
        };
        f.render_widget(
            Paragraph::new(Span::styled(format!("{export} "), export_style))
                .alignment(Alignment::Right)
                .style(bar),
            right,
        );
    }

    fn draw_deck(&self, f: &mut Frame, area: Rect, palette: &DeckPalette) {
        if self.session.is_empty() {
            let message = if self.pending_load {
                "Loading deck…"
            } else if self.load_error.is_some() {
                ""
            } else {
                "This deck has no slides"
            };
            let y = area.y + area.height / 2;
            f.render_widget(
                Paragraph::new(Span::styled(message, Style::default().fg(palette.muted.color())))
                    .alignment(Alignment::Center),
                Rect { y, height: area.height.min(1), ..area },
            );
            return;
        }

        let len = self.session.len();
        let units = self.session.units();
        for card in self.viewport.visible_cards() {
            let Some(unit) = units.get(card.index) else {
                continue;
            };
            let widget = SlideCard::new(unit, palette, card.index, len)
                .revealed(self.revealed_for(card.index));
            render_clipped(widget, card.top, area, f.buffer_mut());
        }

        if self.pending_load {
            let badge = " Reloading… ";
            let width = (badge.width() as u16).min(area.width);
            let rect = Rect {
                x: area.x + area.width.saturating_sub(width + 1),
                y: area.y,
                width,
                height: area.height.min(1),
            };
            f.render_widget(
                Paragraph::new(badge).style(
                    Style::default()
                        .fg(palette.frame.color())
                        .bg(palette.accent.color()),
                ),
                rect,
            );
        }
    }

    fn draw_status_line(&self, f: &mut Frame, area: Rect, palette: &DeckPalette) {
        let line = if let Some(input) = &self.goto_input {
            Line::from(vec![
                Span::styled(" Go to slide: ", Style::default().fg(palette.kicker.color())),
                Span::styled(format!("{input}█"), Style::default().fg(palette.text.color())),
                Span::styled(
                    format!("  (1-{}, Enter to jump, Esc to cancel)", self.session.len()),
                    Style::default().fg(palette.muted.color()),
                ),
            ])
        } else if let Some(message) = self.status.current() {
            let colour = match message.tone {
                Tone::Info => palette.accent,
                Tone::Warning => palette.kicker,
                Tone::Error => palette.error,
            };
            Line::from(Span::styled(
                format!(" {}", message.text),
                Style::default().fg(colour.color()),
            ))
        } else {
            Line::from(Span::styled(
                " ←/→ slide · g go to · e export · r reload · q quit",
                Style::default().fg(palette.muted.color()),
            ))
        };
        f.render_widget(Paragraph::new(line), area);
    }
}

fn draw_error_panel(f: &mut Frame, area: Rect, message: &str, palette: &DeckPalette) {
    let width = area.width.saturating_sub(4).min(72);
    let height = area.height.min(8);
    let rect = Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    };
    f.render_widget(Clear, rect);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(palette.error.color()))
        .title(" Could not load the deck ")
        .style(Style::default().bg(palette.frame.color()));
    let text = vec![
        Line::from(Span::styled(message.to_string(), Style::default().fg(palette.text.color()))),
        Line::default(),
        Line::from(Span::styled(
            "Press r to retry",
            Style::default().fg(palette.muted.color()),
        )),
    ];
    f.render_widget(
        Paragraph::new(text).block(block).wrap(Wrap { trim: true }),
        rect,
    );
}

pub fn default_pipeline(settings: &Settings) -> ExportPipeline {
    let libraries = Libraries::new(BuiltinLoader::new(settings.font_dirs.clone()));
    ExportPipeline::new(
        Arc::new(libraries),
        IntervalClock::new(Duration::from_millis(settings.frame_interval_ms)),
    )
}

pub fn run_app_with_event_source<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    event_source: &mut dyn EventSource,
) -> Result<()>
where
    B::Error: Send + Sync + 'static,
{
    let tick_rate = Duration::from_millis(app.settings.tick_rate_ms.max(1));
    let frame_interval = Duration::from_millis(app.settings.frame_interval_ms.max(1));
    let mut last_tick = Instant::now();
    let mut first_render = true;
    loop {
        let mut events_processed = 0;
        let mut should_quit = false;
        while event_source.poll(Duration::from_millis(0))? && events_processed < 50 {
            let event = event_source.read()?;
            events_processed += 1;
            match event {
                Event::Key(key) => {
                    if app.handle_key_event(key) == Some(AppAction::Quit) {
                        should_quit = true;
                    }
                }
                Event::Mouse(mouse) => app.handle_mouse_event(mouse),
                Event::Resize(cols, rows) => debug!("Terminal resized to {cols}x{rows}"),
                _ => {}
            }
            if should_quit {
                break;
            }
        }
        if should_quit {
            info!("Quit requested");
            return Ok(());
        }

        let mut needs_redraw = events_processed > 0 || first_render;
        let animating = app.is_animating();
        if animating || last_tick.elapsed() >= tick_rate {
            if app.on_tick() {
                needs_redraw = true;
            }
            last_tick = Instant::now();
        }

        if needs_redraw {
            terminal.draw(|f| app.draw(f))?;
            first_render = false;
        }

        if app.perform_pending_load() {
            terminal.draw(|f| app.draw(f))?;
        }
        if let Some(title) = app.title_change() {
            execute!(io::stdout(), SetTitle(title))?;
        }

        if events_processed == 0 {
            let wait = if animating { frame_interval } else { tick_rate };
            let timeout = wait.checked_sub(last_tick.elapsed()).unwrap_or_default();
            event_source.poll(timeout)?;
        }
    }
}
