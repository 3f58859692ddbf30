//! Owns the built slide units and the current-slide cursor.

use log::debug;

use crate::slide_builder::SlideUnit;

/// Identity of a unit within one loaded deck.
///
/// The generation changes on every [`DeckSession::load`], so ids handed out
/// for a previous deck never resolve against the live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnitId {
    pub generation: u64,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavRequest {
    Next,
    Prev,
    First,
    Last,
    Index(i64),
}

#[derive(Debug, Default)]
pub struct DeckSession {
    units: Vec<SlideUnit>,
    current: Option<usize>,
    generation: u64,
    /// Set between `mark_all_active` and `restore_active`.
    all_active: bool,
}

impl DeckSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the deck. The cursor resets to the first unit.
    pub fn load(&mut self, units: Vec<SlideUnit>) {
        self.generation += 1;
        self.units = units;
        for unit in &mut self.units {
            unit.active = self.all_active;
        }
        self.current = if self.units.is_empty() { None } else { Some(0) };
        if let Some(first) = self.units.first_mut() {
            first.active = true;
        }
        debug!(
            "Session loaded {} units (generation {})",
            self.units.len(),
            self.generation
        );
    }

    /// Move the cursor, clamping to the valid range. No-op when empty.
    ///
    /// Inside the export bracket the cursor moves but every unit stays active.
    pub fn go_to(&mut self, index: i64) {
        let Some(target) = self.clamp(index) else {
            return;
        };
        if !self.all_active {
            for unit in &mut self.units {
                unit.active = false;
            }
        }
        self.units[target].active = true;
        if self.current != Some(target) {
            debug!("Current slide {:?} -> {target}", self.current);
        }
        self.current = Some(target);
    }

    pub fn next(&mut self) {
        if let Some(current) = self.current {
            self.go_to(current as i64 + 1);
        }
    }

    pub fn prev(&mut self) {
        if let Some(current) = self.current {
            self.go_to(current as i64 - 1);
        }
    }

    /// Fraction of the deck reached, `(current + 1) / len`; 0 when empty.
    pub fn progress(&self) -> f32 {
        match self.current {
            Some(current) if !self.units.is_empty() => {
                (current + 1) as f32 / self.units.len() as f32
            }
            _ => 0.0,
        }
    }

    /// Resolve a navigation request without moving the cursor.
    pub fn target_of(&self, request: NavRequest) -> Option<usize> {
        let current = self.current? as i64;
        let wanted = match request {
            NavRequest::Next => current + 1,
            NavRequest::Prev => current - 1,
            NavRequest::First => 0,
            NavRequest::Last => self.units.len() as i64 - 1,
            NavRequest::Index(index) => index,
        };
        self.clamp(wanted)
    }

    fn clamp(&self, index: i64) -> Option<usize> {
        if self.units.is_empty() {
            return None;
        }
        let last = self.units.len() as i64 - 1;
        Some(index.clamp(0, last) as usize)
    }

    /// First half of the export bracket: reveal every unit.
    pub fn mark_all_active(&mut self) {
        self.all_active = true;
        for unit in &mut self.units {
            unit.active = true;
        }
    }

    /// Second half of the export bracket: only the cursor's unit stays active.
    pub fn restore_active(&mut self) {
        self.all_active = false;
        for (idx, unit) in self.units.iter_mut().enumerate() {
            unit.active = Some(idx) == self.current;
        }
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn units(&self) -> &[SlideUnit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn unit_ids(&self) -> Vec<UnitId> {
        (0..self.units.len())
            .map(|index| UnitId {
                generation: self.generation,
                index,
            })
            .collect()
    }

    /// `None` for ids from a previous deck or out of range.
    pub fn index_of(&self, id: UnitId) -> Option<usize> {
        (id.generation == self.generation && id.index < self.units.len()).then_some(id.index)
    }

    pub fn active_indices(&self) -> Vec<usize> {
        self.units
            .iter()
            .enumerate()
            .filter(|(_, unit)| unit.active)
            .map(|(idx, _)| idx)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck::SlideType;

    fn units(n: usize) -> Vec<SlideUnit> {
        (0..n)
            .map(|position| SlideUnit {
                position,
                slide_type: SlideType::Content,
                blocks: Vec::new(),
                active: false,
            })
            .collect()
    }

    fn session(n: usize) -> DeckSession {
        let mut session = DeckSession::new();
        session.load(units(n));
        session
    }

    #[test]
    fn load_resets_cursor_and_activates_first() {
        let mut session = session(4);
        session.go_to(3);
        session.load(units(2));
        assert_eq!(session.current_index(), Some(0));
        assert_eq!(session.active_indices(), vec![0]);
    }

    #[test]
    fn load_empty_has_no_cursor() {
        let session = session(0);
        assert_eq!(session.current_index(), None);
        assert_eq!(session.progress(), 0.0);
    }

    #[test]
    fn go_to_clamps_any_integer() {
        let mut session = session(5);
        let cases = [
            (-10, 0),
            (-1, 0),
            (0, 0),
            (3, 3),
            (4, 4),
            (5, 4),
            (i64::MAX, 4),
            (i64::MIN, 0),
        ];
        for (requested, expected) in cases {
            session.go_to(requested);
            assert_eq!(session.current_index(), Some(expected), "go_to({requested})");
            assert_eq!(session.active_indices(), vec![expected]);
        }
    }

    #[test]
    fn go_to_on_empty_is_noop() {
        let mut session = session(0);
        session.go_to(3);
        session.next();
        session.prev();
        assert_eq!(session.current_index(), None);
        assert!(session.active_indices().is_empty());
    }

    #[test]
    fn next_and_prev_stop_at_edges() {
        let mut session = session(3);
        session.prev();
        assert_eq!(session.current_index(), Some(0));
        session.next();
        session.next();
        session.next();
        assert_eq!(session.current_index(), Some(2));
        session.prev();
        assert_eq!(session.current_index(), Some(1));
    }

    #[test]
    fn progress_matches_cursor() {
        let mut session = session(4);
        for idx in 0..4 {
            session.go_to(idx);
            assert_eq!(session.progress(), (idx + 1) as f32 / 4.0);
        }
        assert_eq!(self::session(1).progress(), 1.0);
    }

    #[test]
    fn target_of_does_not_move_cursor() {
        let mut session = session(6);
        session.go_to(2);
        assert_eq!(session.target_of(NavRequest::Next), Some(3));
        assert_eq!(session.target_of(NavRequest::Prev), Some(1));
        assert_eq!(session.target_of(NavRequest::First), Some(0));
        assert_eq!(session.target_of(NavRequest::Last), Some(5));
        assert_eq!(session.target_of(NavRequest::Index(40)), Some(5));
        assert_eq!(session.current_index(), Some(2));
        assert_eq!(DeckSession::new().target_of(NavRequest::Next), None);
    }

    #[test]
    fn export_bracket_restores_cursor_marking() {
        let mut session = session(3);
        session.go_to(1);
        session.mark_all_active();
        assert_eq!(session.active_indices(), vec![0, 1, 2]);
        session.restore_active();
        assert_eq!(session.active_indices(), vec![1]);
        assert_eq!(session.current_index(), Some(1));
    }

    #[test]
    fn navigation_inside_export_bracket_keeps_every_unit_active() {
        let mut session = session(4);
        session.mark_all_active();
        session.go_to(2);
        session.next();
        assert_eq!(session.current_index(), Some(3));
        assert_eq!(session.active_indices(), vec![0, 1, 2, 3]);

        session.load(units(2));
        assert_eq!(session.active_indices(), vec![0, 1]);

        session.restore_active();
        assert_eq!(session.active_indices(), vec![0]);
        session.go_to(1);
        assert_eq!(session.active_indices(), vec![1]);
    }

    #[test]
    fn stale_ids_do_not_resolve() {
        let mut session = session(3);
        let old = session.unit_ids();
        assert_eq!(session.index_of(old[2]), Some(2));

        session.load(units(3));
        assert_eq!(session.index_of(old[2]), None);
        let fresh = session.unit_ids();
        assert_eq!(session.index_of(fresh[2]), Some(2));
        assert_eq!(
            session.index_of(UnitId {
                generation: session.generation(),
                index: 9
            }),
            None
        );
    }
}
