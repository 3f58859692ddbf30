pub mod test_helpers {
    use std::path::{Path, PathBuf};

    use crate::event_source::{Event, KeyCode, KeyModifiers, MouseEventKind, SimulatedEventSource};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    /// Builder for creating test scenarios with simulated user input
    #[derive(Default)]
    pub struct TestScenarioBuilder {
        events: Vec<Event>,
    }

    impl TestScenarioBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn press_key(mut self, code: KeyCode) -> Self {
            self.events
                .push(SimulatedEventSource::key_event(code, KeyModifiers::empty()));
            self
        }

        pub fn press_char(mut self, c: char) -> Self {
            self.events.push(SimulatedEventSource::char_key(c));
            self
        }

        pub fn press_ctrl_char(mut self, c: char) -> Self {
            self.events.push(SimulatedEventSource::ctrl_char_key(c));
            self
        }

        pub fn press_enter(self) -> Self {
            self.press_key(KeyCode::Enter)
        }

        pub fn press_esc(self) -> Self {
            self.press_key(KeyCode::Esc)
        }

        /// Next slide (Right arrow)
        pub fn next_slide(self) -> Self {
            self.press_key(KeyCode::Right)
        }

        /// Previous slide (Left arrow)
        pub fn prev_slide(self) -> Self {
            self.press_key(KeyCode::Left)
        }

        /// Open the go-to prompt, type the one-based `number` and confirm.
        pub fn goto(mut self, number: &str) -> Self {
            self = self.press_char('g');
            for c in number.chars() {
                self = self.press_char(c);
            }
            self.press_enter()
        }

        pub fn scroll_down(mut self, times: usize) -> Self {
            for _ in 0..times {
                self.events
                    .push(SimulatedEventSource::scroll_event(MouseEventKind::ScrollDown));
            }
            self
        }

        pub fn export(self) -> Self {
            self.press_char('e')
        }

        pub fn reload(self) -> Self {
            self.press_char('r')
        }

        pub fn quit(self) -> Self {
            self.press_char('q')
        }

        pub fn build(self) -> SimulatedEventSource {
            SimulatedEventSource::new(self.events)
        }
    }

    pub fn create_test_terminal(width: u16, height: u16) -> Terminal<TestBackend> {
        let backend = TestBackend::new(width, height);
        Terminal::new(backend).unwrap()
    }

    /// Capture the current terminal buffer as a string
    pub fn capture_terminal_state(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let mut lines = Vec::new();

        for y in 0..buffer.area.height {
            let mut line = String::new();
            for x in 0..buffer.area.width {
                line.push_str(buffer[(x, y)].symbol());
            }
            lines.push(line.trim_end().to_string());
        }

        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }

        lines.join("\n")
    }

    /// Write a deck document into `dir` and return its path.
    pub fn write_deck(dir: &Path, json: &str) -> PathBuf {
        let path = dir.join("content.json");
        std::fs::write(&path, json).unwrap();
        path
    }

    pub const SAMPLE_DECK: &str = r#"{
  "meta": { "title": "Quarterly Pitch", "theme": "blue" },
  "slides": [
    { "type": "title", "headline": "Launch", "subheadline": "Q3 plan" },
    { "type": "content", "headline": "Why now", "bullets": ["Demand is up", "Costs are down"] },
    { "type": "content", "headline": "Plan",
      "left": { "title": "Build", "bullets": ["API", "CLI"] },
      "right": { "title": "Sell", "bullets": ["Partners"] } },
    { "type": "closing", "headline": "Thanks" }
  ]
}"#;
}
