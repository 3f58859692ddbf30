use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use flowpitch::content_source::ContentSource;
use flowpitch::event_source::KeyCode;
use flowpitch::export::{
    Composer, ExportError, ExportPipeline, FrameClock, Libraries, LibraryLoader, PdfComposer,
    Rasterizer,
};
use flowpitch::presenter::{App, run_app_with_event_source};
use flowpitch::settings::Settings;
use flowpitch::test_utils::test_helpers::*;
use image::RgbaImage;
use tempfile::TempDir;

struct NoWait;

impl FrameClock for NoWait {
    fn next_frame(&self) {}
}

/// Holds every frame boundary until the sender side is dropped.
struct GatedClock(flume::Receiver<()>);

impl FrameClock for GatedClock {
    fn next_frame(&self) {
        let _ = self.0.recv();
    }
}

struct TinyRasterizer;

impl Rasterizer for TinyRasterizer {
    fn rasterize(&self, _: &str, _: u32, _: u32, _: u32) -> Result<RgbaImage, String> {
        Ok(RgbaImage::new(4, 4))
    }
}

struct FakeLoader {
    rasterizer_available: bool,
}

impl LibraryLoader for FakeLoader {
    fn load_rasterizer(&self) -> Result<Arc<dyn Rasterizer>, ExportError> {
        if self.rasterizer_available {
            Ok(Arc::new(TinyRasterizer))
        } else {
            Err(ExportError::LibraryUnavailable {
                library: "rasterizer",
                reason: "blocked by test".into(),
            })
        }
    }

    fn load_composer(&self) -> Result<Arc<dyn Composer>, ExportError> {
        Ok(Arc::new(PdfComposer))
    }
}

fn settings_for(dir: &Path) -> Settings {
    Settings {
        export_dir: dir.to_path_buf(),
        export_file_name: "pitch.pdf".into(),
        smooth_scroll: false,
        reveal_step_ms: 0,
        ..Settings::default()
    }
}

fn app_with(dir: &Path, json: &str, rasterizer_available: bool) -> App {
    let path = write_deck(dir, json);
    let libraries = Libraries::new(FakeLoader { rasterizer_available });
    let pipeline = ExportPipeline::new(Arc::new(libraries), NoWait);
    let mut app = App::new(ContentSource::File(path), settings_for(dir), Arc::new(pipeline));
    app.reload();
    app
}

fn press(app: &mut App, code: KeyCode) {
    if let flowpitch::event_source::Event::Key(key) =
        flowpitch::event_source::SimulatedEventSource::key_event(
            code,
            flowpitch::event_source::KeyModifiers::empty(),
        )
    {
        app.handle_key_event(key);
    }
}

fn wait_for_export(app: &mut App) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while app.is_exporting() {
        app.poll_export();
        assert!(Instant::now() < deadline, "export never finished");
        thread::sleep(Duration::from_millis(5));
    }
}

fn render(app: &mut App) -> String {
    let mut terminal = create_test_terminal(80, 24);
    terminal.draw(|f| app.draw(f)).unwrap();
    capture_terminal_state(&terminal)
}

#[test]
fn first_slide_is_presented_after_load() {
    let dir = TempDir::new().unwrap();
    let mut app = app_with(dir.path(), SAMPLE_DECK, true);

    assert_eq!(app.session.len(), 4);
    assert_eq!(app.session.current_index(), Some(0));
    assert_eq!(app.window_title(), "Quarterly Pitch — FlowPitch");

    let screen = render(&mut app);
    assert!(screen.contains("Quarterly Pitch"), "{screen}");
    assert!(screen.contains("1 / 4"), "{screen}");
    assert!(screen.contains("Launch"), "{screen}");
    assert!(screen.contains("Q3 plan"), "{screen}");
    assert!(screen.contains("01 / 04"), "{screen}");
}

#[test]
fn staggered_reveal_starts_with_heading_only() {
    let dir = TempDir::new().unwrap();
    let path = write_deck(dir.path(), SAMPLE_DECK);
    let settings = Settings {
        reveal_step_ms: 60_000,
        ..settings_for(dir.path())
    };
    let mut app = App::with_settings(ContentSource::File(path), settings);
    app.reload();

    let screen = render(&mut app);
    assert!(screen.contains("Launch"), "{screen}");
    assert!(!screen.contains("Q3 plan"), "{screen}");
    assert!(app.is_animating());
}

#[test]
fn keyboard_navigation_moves_through_the_run_loop() {
    let dir = TempDir::new().unwrap();
    let mut app = app_with(dir.path(), SAMPLE_DECK, true);
    let mut terminal = create_test_terminal(80, 24);
    let mut events = TestScenarioBuilder::new()
        .next_slide()
        .press_char(' ')
        .next_slide()
        .prev_slide()
        .quit()
        .build();

    run_app_with_event_source(&mut terminal, &mut app, &mut events).unwrap();

    assert_eq!(app.session.current_index(), Some(2));
    assert_eq!(app.session.active_indices(), vec![2]);
}

#[test]
fn goto_prompt_clamps_to_deck_bounds() {
    let dir = TempDir::new().unwrap();
    let mut app = app_with(dir.path(), SAMPLE_DECK, true);
    let mut terminal = create_test_terminal(80, 24);
    let mut events = TestScenarioBuilder::new().goto("9").quit().build();
    run_app_with_event_source(&mut terminal, &mut app, &mut events).unwrap();
    assert_eq!(app.session.current_index(), Some(3));

    let mut events = TestScenarioBuilder::new().goto("0").quit().build();
    run_app_with_event_source(&mut terminal, &mut app, &mut events).unwrap();
    assert_eq!(app.session.current_index(), Some(0));
}

#[test]
fn goto_prompt_swallows_other_keys() {
    let dir = TempDir::new().unwrap();
    let mut app = app_with(dir.path(), SAMPLE_DECK, true);

    press(&mut app, KeyCode::Char('g'));
    assert_eq!(app.goto_input(), Some(""));
    assert_eq!(app.handle_key_event(key('q')), None);
    press(&mut app, KeyCode::Right);
    assert_eq!(app.session.current_index(), Some(0));

    let screen = render(&mut app);
    assert!(screen.contains("Go to slide:"), "{screen}");

    press(&mut app, KeyCode::Esc);
    assert_eq!(app.goto_input(), None);
    press(&mut app, KeyCode::Right);
    assert_eq!(app.session.current_index(), Some(1));
}

fn key(c: char) -> flowpitch::event_source::KeyEvent {
    match flowpitch::event_source::SimulatedEventSource::char_key(c) {
        flowpitch::event_source::Event::Key(key) => key,
        _ => unreachable!(),
    }
}

#[test]
fn failed_reload_keeps_current_deck() {
    let dir = TempDir::new().unwrap();
    let mut app = app_with(dir.path(), SAMPLE_DECK, true);
    press(&mut app, KeyCode::End);
    assert_eq!(app.session.current_index(), Some(3));

    write_deck(dir.path(), "{ not json");
    press(&mut app, KeyCode::Char('r'));
    assert!(app.is_loading());
    assert!(app.perform_pending_load());

    assert!(app.load_error().is_some());
    assert_eq!(app.session.len(), 4);
    assert_eq!(app.session.current_index(), Some(3));
    let screen = render(&mut app);
    assert!(screen.contains("Could not load the deck"), "{screen}");
    assert!(screen.contains("Press r to retry"), "{screen}");

    write_deck(dir.path(), SAMPLE_DECK);
    app.reload();
    assert!(app.load_error().is_none());
    assert_eq!(app.session.current_index(), Some(0));
    assert!(app.status.current().is_none());
}

#[test]
fn reload_ignores_visibility_from_previous_deck() {
    let dir = TempDir::new().unwrap();
    let mut app = app_with(dir.path(), SAMPLE_DECK, true);
    render(&mut app);
    press(&mut app, KeyCode::Right);
    press(&mut app, KeyCode::Right);
    assert_eq!(app.session.current_index(), Some(2));
    let before = app.session.generation();

    app.reload();
    app.on_tick();

    assert!(app.session.generation() > before);
    assert_eq!(app.session.current_index(), Some(0));
    assert_eq!(app.session.active_indices(), vec![0]);
}

#[test]
fn export_writes_one_page_per_slide() {
    let dir = TempDir::new().unwrap();
    let mut app = app_with(dir.path(), SAMPLE_DECK, true);
    press(&mut app, KeyCode::Right);

    press(&mut app, KeyCode::Char('e'));
    assert!(app.is_exporting());
    wait_for_export(&mut app);

    let artifact = app.last_artifact().expect("artifact");
    assert_eq!(artifact.pages, 4);
    assert_eq!(artifact.path, dir.path().join("pitch.pdf"));
    let bytes = std::fs::read(&artifact.path).unwrap();
    assert!(bytes.starts_with(b"%PDF-"));
    assert!(
        app.status
            .current()
            .is_some_and(|m| m.text.starts_with("Exported 4 pages"))
    );
    assert_eq!(app.session.current_index(), Some(1));
    assert_eq!(app.session.active_indices(), vec![1]);
}

#[test]
fn navigation_during_export_keeps_every_slide_active() {
    let dir = TempDir::new().unwrap();
    let path = write_deck(dir.path(), SAMPLE_DECK);
    let (release, gate) = flume::unbounded::<()>();
    let libraries = Libraries::new(FakeLoader { rasterizer_available: true });
    let pipeline = ExportPipeline::new(Arc::new(libraries), GatedClock(gate));
    let mut app = App::new(
        ContentSource::File(path),
        settings_for(dir.path()),
        Arc::new(pipeline),
    );
    app.reload();

    press(&mut app, KeyCode::Char('e'));
    assert!(app.is_exporting());
    press(&mut app, KeyCode::Right);
    press(&mut app, KeyCode::Right);
    app.on_tick();
    render(&mut app);

    assert!(app.is_exporting());
    assert_eq!(app.session.current_index(), Some(2));
    assert_eq!(app.session.active_indices(), vec![0, 1, 2, 3]);

    drop(release);
    wait_for_export(&mut app);
    assert_eq!(app.session.current_index(), Some(2));
    assert_eq!(app.session.active_indices(), vec![2]);
}

#[test]
fn failed_export_leaves_session_untouched() {
    let dir = TempDir::new().unwrap();
    let mut app = app_with(dir.path(), SAMPLE_DECK, false);
    press(&mut app, KeyCode::Right);
    press(&mut app, KeyCode::Right);

    press(&mut app, KeyCode::Char('e'));
    wait_for_export(&mut app);

    assert!(app.last_artifact().is_none());
    assert!(!dir.path().join("pitch.pdf").exists());
    assert_eq!(app.session.current_index(), Some(2));
    assert_eq!(app.session.active_indices(), vec![2]);
    assert!(
        app.status
            .current()
            .is_some_and(|m| m.text.starts_with("Export failed"))
    );
}

#[test]
fn empty_deck_shows_placeholder_and_refuses_export() {
    let dir = TempDir::new().unwrap();
    let mut app = app_with(dir.path(), r#"{"meta":{"title":"Blank"},"slides":[]}"#, true);

    let screen = render(&mut app);
    assert!(screen.contains("This deck has no slides"), "{screen}");

    press(&mut app, KeyCode::Char('e'));
    assert!(!app.is_exporting());
    assert_eq!(app.status.current().unwrap().text, "Nothing to export");
}
