//! Derives the current slide from what the viewport actually shows.
//!
//! Explicit navigation only asks the viewport to scroll; the cursor moves when
//! the target becomes the dominant unit and its event reaches the tracker.

use flume::{Receiver, Sender};
use log::{debug, trace};

use crate::deck_session::{DeckSession, UnitId};

/// Intersection ratio at which a unit counts as the dominant one.
pub const VISIBILITY_THRESHOLD: f32 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DominantUnitChanged {
    pub unit: UnitId,
    pub ratio: f32,
}

/// Anything that can report which watched unit crossed the visibility
/// threshold.
pub trait VisibilityEventSource {
    /// Start watching `watch`, replacing any earlier subscription. Events for
    /// units reaching `threshold` are sent to `sink`.
    fn subscribe(&mut self, watch: Vec<UnitId>, threshold: f32, sink: Sender<DominantUnitChanged>);

    /// Drop the current subscription; no further events are sent.
    fn teardown(&mut self);
}

#[derive(Default)]
pub struct VisibilityTracker {
    events: Option<Receiver<DominantUnitChanged>>,
    watched: Vec<UnitId>,
}

impl VisibilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Watch the session's current units, discarding the previous watch list.
    pub fn attach(&mut self, source: &mut dyn VisibilityEventSource, session: &DeckSession) {
        source.teardown();
        let (tx, rx) = flume::unbounded();
        self.watched = session.unit_ids();
        self.events = Some(rx);
        debug!("Visibility tracker watching {} units", self.watched.len());
        source.subscribe(self.watched.clone(), VISIBILITY_THRESHOLD, tx);
    }

    pub fn detach(&mut self, source: &mut dyn VisibilityEventSource) {
        source.teardown();
        self.events = None;
        self.watched.clear();
    }

    pub fn is_watching(&self, id: UnitId) -> bool {
        self.watched.contains(&id)
    }

    /// Apply pending events to the session. Returns true if the cursor moved.
    pub fn sync(&mut self, session: &mut DeckSession) -> bool {
        let Some(events) = &self.events else {
            return false;
        };
        let before = session.current_index();
        for event in events.try_iter() {
            if !self.watched.contains(&event.unit) {
                trace!("Ignoring event for unwatched unit {:?}", event.unit);
                continue;
            }
            match session.index_of(event.unit) {
                Some(index) => session.go_to(index as i64),
                None => trace!("Ignoring stale visibility event {:?}", event.unit),
            }
        }
        session.current_index() != before
    }
}
