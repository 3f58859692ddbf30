//! Turns content-model entries into renderable slide units.
//!
//! Building is pure: the same entry always yields the same block tree with the
//! same animation order, which is what the staggered reveal relies on.

use log::{debug, warn};

use crate::deck::{ColumnSpec, Deck, SlideEntry, SlideSpec, SlideType};

/// Bullet lists are cut to this many items; the rest are dropped silently.
pub const MAX_BULLETS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emphasis {
    Primary,
    Secondary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlock {
    pub text: String,
    pub emphasis: Emphasis,
    pub order: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulletItem {
    pub text: String,
    pub order: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BulletList {
    pub items: Vec<BulletItem>,
}

impl BulletList {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.text.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Column {
    pub label: Option<BulletItem>,
    pub bullets: Option<BulletList>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading(TextBlock),
    Subheading(TextBlock),
    Columns(Vec<Column>),
    Bullets(BulletList),
}

/// A built slide: a block tree plus its active marking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideUnit {
    pub position: usize,
    pub slide_type: SlideType,
    pub blocks: Vec<Block>,
    pub active: bool,
}

impl SlideUnit {
    /// Animation orders in tree order (heading, subheading, then content).
    pub fn animation_orders(&self) -> Vec<usize> {
        let mut orders = Vec::new();
        for block in &self.blocks {
            match block {
                Block::Heading(text) | Block::Subheading(text) => orders.push(text.order),
                Block::Columns(columns) => {
                    for column in columns {
                        if let Some(label) = &column.label {
                            orders.push(label.order);
                        }
                        if let Some(list) = &column.bullets {
                            orders.extend(list.items.iter().map(|item| item.order));
                        }
                    }
                }
                Block::Bullets(list) => orders.extend(list.items.iter().map(|item| item.order)),
            }
        }
        orders
    }

    /// Number of elements that take part in the staggered reveal.
    pub fn animated_count(&self) -> usize {
        self.animation_orders().len()
    }

    pub fn headline(&self) -> Option<&str> {
        self.blocks.iter().find_map(|block| match block {
            Block::Heading(text) => Some(text.text.as_str()),
            _ => None,
        })
    }

    /// Every bullet list in the unit, columns included.
    pub fn bullet_lists(&self) -> Vec<&BulletList> {
        let mut lists = Vec::new();
        for block in &self.blocks {
            match block {
                Block::Bullets(list) => lists.push(list),
                Block::Columns(columns) => {
                    lists.extend(columns.iter().filter_map(|column| column.bullets.as_ref()))
                }
                _ => {}
            }
        }
        lists
    }

    /// A disconnected copy marked active, as used by the export staging area.
    pub fn activated_copy(&self) -> SlideUnit {
        SlideUnit {
            active: true,
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<(), RenderError> {
        for (expected, found) in self.animation_orders().into_iter().enumerate() {
            if expected != found {
                return Err(RenderError::AnimationOrder {
                    slide: self.position,
                    expected,
                    found,
                });
            }
        }
        if let Some(list) = self.bullet_lists().into_iter().find(|list| list.len() > MAX_BULLETS) {
            return Err(RenderError::BulletOverflow {
                slide: self.position,
                count: list.len(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("slide {slide}: animation order {found} found where {expected} was expected")]
    AnimationOrder {
        slide: usize,
        expected: usize,
        found: usize,
    },

    #[error("slide {slide}: bullet list holds {count} items, more than {MAX_BULLETS}")]
    BulletOverflow { slide: usize, count: usize },
}

struct OrderCounter(usize);

impl OrderCounter {
    fn next(&mut self) -> usize {
        let order = self.0;
        self.0 += 1;
        order
    }
}

/// Build one slide. Returns `None` only when the entry is unusable.
pub fn build(entry: &SlideEntry, position: usize) -> Option<SlideUnit> {
    match entry {
        SlideEntry::Spec(spec) => Some(build_spec(spec, position)),
        SlideEntry::Unusable(value) => {
            warn!("Rejecting slide {position}: entry is not an object ({value})");
            None
        }
    }
}

fn build_spec(spec: &SlideSpec, position: usize) -> SlideUnit {
    let mut counter = OrderCounter(0);
    let mut blocks = Vec::new();

    let (heading_emphasis, sub_emphasis) = match spec.slide_type {
        SlideType::Title | SlideType::Closing => (Emphasis::Primary, Emphasis::Primary),
        SlideType::Section | SlideType::Content => (Emphasis::Secondary, Emphasis::Secondary),
    };

    if let Some(text) = non_empty(&spec.headline) {
        blocks.push(Block::Heading(TextBlock {
            text: text.to_string(),
            emphasis: heading_emphasis,
            order: counter.next(),
        }));
    }
    if let Some(text) = non_empty(&spec.subheadline) {
        blocks.push(Block::Subheading(TextBlock {
            text: text.to_string(),
            emphasis: sub_emphasis,
            order: counter.next(),
        }));
    }

    if spec.has_columns() {
        if spec.bullets.is_some() {
            debug!("Slide {position} declares columns and bullets; flat bullets ignored");
        }
        let columns = [&spec.left, &spec.right]
            .into_iter()
            .flatten()
            .map(|column| build_column(column, &mut counter))
            .collect();
        blocks.push(Block::Columns(columns));
    } else if let Some(bullets) = &spec.bullets {
        blocks.push(Block::Bullets(build_bullets(bullets, &mut counter)));
    }

    SlideUnit {
        position,
        slide_type: spec.slide_type,
        blocks,
        active: false,
    }
}

fn build_column(column: &ColumnSpec, counter: &mut OrderCounter) -> Column {
    let label = non_empty(&column.title).map(|title| BulletItem {
        text: title.to_string(),
        order: counter.next(),
    });
    let bullets = column
        .bullets
        .as_ref()
        .map(|bullets| build_bullets(bullets, counter));
    Column { label, bullets }
}

/// Empty strings render nothing, so they take no block and no animation order.
fn non_empty(text: &Option<String>) -> Option<&str> {
    text.as_deref().filter(|text| !text.is_empty())
}

fn build_bullets(bullets: &[String], counter: &mut OrderCounter) -> BulletList {
    BulletList {
        items: bullets
            .iter()
            .take(MAX_BULLETS)
            .map(|text| BulletItem {
                text: text.clone(),
                order: counter.next(),
            })
            .collect(),
    }
}

/// Build every entry in declared order, dropping the ones the builder rejects.
pub fn build_deck(deck: &Deck) -> Vec<SlideUnit> {
    deck.slides
        .iter()
        .enumerate()
        .filter_map(|(idx, entry)| build(entry, idx))
        .collect()
}

/// Render boundary: build the deck and check every unit's invariants.
pub fn render_deck(deck: &Deck) -> Result<Vec<SlideUnit>, RenderError> {
    let units = build_deck(deck);
    for unit in &units {
        unit.validate()?;
    }
    debug!(
        "Built {} slide units from {} entries",
        units.len(),
        deck.slides.len()
    );
    Ok(units)
}
