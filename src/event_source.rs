use anyhow::Result;
pub use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyEventState, KeyModifiers, MouseEvent,
    MouseEventKind,
};
use std::time::Duration;

/// Where the presenter reads terminal input from.
pub trait EventSource {
    fn poll(&mut self, timeout: Duration) -> Result<bool>;

    fn read(&mut self) -> Result<Event>;
}

pub struct KeyboardEventSource;

impl EventSource for KeyboardEventSource {
    fn poll(&mut self, timeout: Duration) -> Result<bool> {
        Ok(crossterm::event::poll(timeout)?)
    }

    fn read(&mut self) -> Result<Event> {
        Ok(crossterm::event::read()?)
    }
}

/// Replays a fixed list of events, then reports `q` forever.
pub struct SimulatedEventSource {
    events: Vec<Event>,
    current_index: usize,
}

impl SimulatedEventSource {
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            events,
            current_index: 0,
        }
    }

    pub fn key_event(code: KeyCode, modifiers: KeyModifiers) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::empty(),
        })
    }

    pub fn char_key(c: char) -> Event {
        Self::key_event(KeyCode::Char(c), KeyModifiers::empty())
    }

    pub fn ctrl_char_key(c: char) -> Event {
        Self::key_event(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    pub fn scroll_event(kind: MouseEventKind) -> Event {
        Event::Mouse(MouseEvent {
            kind,
            column: 0,
            row: 0,
            modifiers: KeyModifiers::empty(),
        })
    }

    pub fn remaining(&self) -> usize {
        self.events.len() - self.current_index
    }
}

impl EventSource for SimulatedEventSource {
    fn poll(&mut self, _timeout: Duration) -> Result<bool> {
        Ok(self.current_index < self.events.len())
    }

    fn read(&mut self) -> Result<Event> {
        match self.events.get(self.current_index) {
            Some(event) => {
                self.current_index += 1;
                Ok(event.clone())
            }
            None => Ok(SimulatedEventSource::char_key('q')),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_events_then_quits() {
        let mut source = SimulatedEventSource::new(vec![
            SimulatedEventSource::key_event(KeyCode::Right, KeyModifiers::empty()),
            SimulatedEventSource::char_key(' '),
        ]);

        assert!(source.poll(Duration::ZERO).unwrap());
        match source.read().unwrap() {
            Event::Key(key) => assert_eq!(key.code, KeyCode::Right),
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(source.remaining(), 1);
        source.read().unwrap();

        assert!(!source.poll(Duration::ZERO).unwrap());
        match source.read().unwrap() {
            Event::Key(key) => assert_eq!(key.code, KeyCode::Char('q')),
            other => panic!("unexpected event {other:?}"),
        }
    }
}
