//! Scroll model of the deck area: slide cards stacked vertically, each one
//! viewport tall, with an eased scroll towards navigation targets.

use flume::Sender;
use log::{debug, trace};

use crate::deck_session::UnitId;
use crate::visibility::{DominantUnitChanged, VisibilityEventSource};

const SCROLL_EASING: f32 = 0.35;
const SNAP_DISTANCE: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleCard {
    pub index: usize,
    /// Row of the card's top edge relative to the viewport (may be negative).
    pub top: i32,
}

pub struct Viewport {
    card_height: u16,
    offset: f32,
    target: Option<f32>,
    smooth: bool,
    watch: Vec<UnitId>,
    above_threshold: Vec<bool>,
    threshold: f32,
    sink: Option<Sender<DominantUnitChanged>>,
}

impl Viewport {
    pub fn new(height: u16, smooth: bool) -> Self {
        Self {
            card_height: height.max(1),
            offset: 0.0,
            target: None,
            smooth,
            watch: Vec::new(),
            above_threshold: Vec::new(),
            threshold: 1.0,
            sink: None,
        }
    }

    pub fn card_height(&self) -> u16 {
        self.card_height
    }

    pub fn offset(&self) -> f32 {
        self.offset
    }

    pub fn unit_count(&self) -> usize {
        self.watch.len()
    }

    pub fn is_animating(&self) -> bool {
        self.target.is_some()
    }

    /// Resize the viewport, keeping the same relative position in the deck.
    pub fn set_height(&mut self, height: u16) {
        let height = height.max(1);
        if height == self.card_height {
            return;
        }
        let ratio = height as f32 / self.card_height as f32;
        self.offset *= ratio;
        self.target = self.target.map(|target| target * ratio);
        self.card_height = height;
        debug!("Viewport resized to {height} rows");
        self.clamp_offset();
        self.observe();
    }

    /// Ask for the given card to be brought to the top of the viewport.
    pub fn scroll_to_unit(&mut self, index: usize) {
        if self.watch.is_empty() {
            return;
        }
        let index = index.min(self.watch.len() - 1);
        let target = index as f32 * self.card_height as f32;
        if self.smooth {
            self.target = Some(target);
        } else {
            self.offset = target;
            self.target = None;
            self.observe();
        }
    }

    /// Free scrolling (mouse wheel, line keys). Cancels any eased scroll.
    pub fn scroll_by(&mut self, rows: f32) {
        self.target = None;
        self.offset += rows;
        self.clamp_offset();
        self.observe();
    }

    /// Advance the eased scroll by one frame. Returns true while still moving.
    pub fn tick(&mut self) -> bool {
        let Some(target) = self.target else {
            return false;
        };
        let diff = target - self.offset;
        if diff.abs() < SNAP_DISTANCE {
            self.offset = target;
            self.target = None;
        } else {
            self.offset += diff * SCROLL_EASING;
        }
        self.clamp_offset();
        self.observe();
        self.target.is_some()
    }

    /// Fraction of card `index` inside the viewport.
    pub fn intersection_ratio(&self, index: usize) -> f32 {
        let height = self.card_height as f32;
        let top = index as f32 * height;
        let bottom = top + height;
        let visible = (bottom.min(self.offset + height) - top.max(self.offset)).max(0.0);
        visible / height
    }

    /// Cards overlapping the viewport, in deck order.
    pub fn visible_cards(&self) -> Vec<VisibleCard> {
        let height = self.card_height as i32;
        let offset = self.offset.round() as i32;
        (0..self.watch.len())
            .filter_map(|index| {
                let top = index as i32 * height - offset;
                (top < height && top + height > 0).then_some(VisibleCard { index, top })
            })
            .collect()
    }

    fn max_offset(&self) -> f32 {
        self.watch.len().saturating_sub(1) as f32 * self.card_height as f32
    }

    fn clamp_offset(&mut self) {
        self.offset = self.offset.clamp(0.0, self.max_offset());
    }

    fn observe(&mut self) {
        let Some(sink) = &self.sink else {
            return;
        };
        for (index, id) in self.watch.iter().enumerate() {
            let ratio = self.intersection_ratio(index);
            let above = ratio >= self.threshold;
            if above && !self.above_threshold[index] {
                trace!("Unit {index} crossed visibility threshold ({ratio:.2})");
                if sink.send(DominantUnitChanged { unit: *id, ratio }).is_err() {
                    debug!("Visibility sink closed; dropping event");
                }
            }
            self.above_threshold[index] = above;
        }
    }
}

impl VisibilityEventSource for Viewport {
    fn subscribe(&mut self, watch: Vec<UnitId>, threshold: f32, sink: Sender<DominantUnitChanged>) {
        self.above_threshold = vec![false; watch.len()];
        self.watch = watch;
        self.threshold = threshold;
        self.sink = Some(sink);
        self.offset = 0.0;
        self.target = None;
        // Initial observation, like a freshly attached intersection observer.
        self.observe();
    }

    fn teardown(&mut self) {
        self.watch.clear();
        self.above_threshold.clear();
        self.sink = None;
        self.target = None;
        self.offset = 0.0;
    }
}
