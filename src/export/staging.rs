use std::thread;
use std::time::Duration;

use log::trace;

use crate::render::scene::{STAGE_HEIGHT, STAGE_WIDTH, scene_svg};
use crate::slide_builder::SlideUnit;
use crate::theme::DeckPalette;

/// Frame boundaries the export waits on so a staged slide can settle.
pub trait FrameClock: Send + Sync {
    fn next_frame(&self);
}

/// Waits one fixed frame interval per boundary.
#[derive(Debug, Clone, Copy)]
pub struct IntervalClock {
    interval: Duration,
}

impl IntervalClock {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl FrameClock for IntervalClock {
    fn next_frame(&self) {
        if !self.interval.is_zero() {
            thread::sleep(self.interval);
        }
    }
}

/// Isolated, fixed-size area holding at most one staged slide.
pub struct StagingArea {
    width: u32,
    height: u32,
    palette: &'static DeckPalette,
    staged: Option<Staged>,
    torn_down: bool,
}

struct Staged {
    position: usize,
    scene: String,
}

impl StagingArea {
    pub fn new(palette: &'static DeckPalette) -> Self {
        Self {
            width: STAGE_WIDTH,
            height: STAGE_HEIGHT,
            palette,
            staged: None,
            torn_down: false,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn clear(&mut self) {
        self.staged = None;
    }

    /// Insert an active copy of `unit`, replacing whatever was staged.
    pub fn stage(&mut self, unit: &SlideUnit) {
        let copy = unit.activated_copy();
        trace!("Staging slide {}", copy.position);
        self.staged = Some(Staged {
            position: copy.position,
            scene: scene_svg(&copy, self.palette),
        });
    }

    /// Stage, then wait two frame boundaries for layout to settle.
    pub fn stage_and_settle(&mut self, unit: &SlideUnit, clock: &dyn FrameClock) {
        self.clear();
        self.stage(unit);
        clock.next_frame();
        clock.next_frame();
    }

    pub fn scene(&self) -> Option<&str> {
        self.staged.as_ref().map(|staged| staged.scene.as_str())
    }

    pub fn staged_position(&self) -> Option<usize> {
        self.staged.as_ref().map(|staged| staged.position)
    }

    pub fn teardown(&mut self) {
        self.staged = None;
        self.torn_down = true;
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}
