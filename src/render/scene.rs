//! SVG scene of a single slide at the fixed export stage size.

use std::fmt::Write as _;

use crate::deck::SlideType;
use crate::slide_builder::{Block, BulletList, Column, Emphasis, SlideUnit, TextBlock};
use crate::theme::DeckPalette;

pub const STAGE_WIDTH: u32 = 1920;
pub const STAGE_HEIGHT: u32 = 1080;

const FRAME_INSET: f32 = 96.0;
const FRAME_RADIUS: f32 = 28.0;
const PADDING: f32 = 96.0;
const FONT_FAMILY: &str = "Inter, Helvetica, Arial, sans-serif";

/// Average glyph advance as a fraction of the font size, used for wrapping.
const GLYPH_ADVANCE: f32 = 0.55;

struct Typeset {
    size: f32,
    weight: u16,
    line_height: f32,
}

static PRIMARY_HEADING: Typeset = Typeset { size: 96.0, weight: 800, line_height: 1.1 };
static SECONDARY_HEADING: Typeset = Typeset { size: 64.0, weight: 700, line_height: 1.15 };
static SUBHEADING: Typeset = Typeset { size: 36.0, weight: 400, line_height: 1.35 };
static BULLET: Typeset = Typeset { size: 34.0, weight: 400, line_height: 1.4 };
static LABEL: Typeset = Typeset { size: 24.0, weight: 700, line_height: 1.4 };

/// Produce a standalone SVG document for `unit`. Inactive units render their
/// frame only, matching the live deck before activation.
pub fn scene_svg(unit: &SlideUnit, palette: &DeckPalette) -> String {
    let mut svg = String::with_capacity(4096);
    let w = STAGE_WIDTH as f32;
    let h = STAGE_HEIGHT as f32;
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{STAGE_WIDTH}" height="{STAGE_HEIGHT}" viewBox="0 0 {STAGE_WIDTH} {STAGE_HEIGHT}">"#
    );
    let _ = write!(
        svg,
        r#"<defs><radialGradient id="glow" cx="50%" cy="40%" r="70%"><stop offset="0" stop-color="{glow}" stop-opacity="0.55"/><stop offset="1" stop-color="{bg}" stop-opacity="0"/></radialGradient><linearGradient id="accent" x1="0" y1="0" x2="1" y2="0"><stop offset="0" stop-color="{a}"/><stop offset="1" stop-color="{b}"/></linearGradient></defs>"#,
        glow = palette.backdrop_glow.hex(),
        bg = palette.background.hex(),
        a = palette.accent.hex(),
        b = palette.accent_alt.hex(),
    );
    let _ = write!(
        svg,
        r#"<rect width="{w}" height="{h}" fill="{}"/><rect width="{w}" height="{h}" fill="url(#glow)"/>"#,
        palette.background.hex()
    );

    let frame_w = w - FRAME_INSET * 2.0;
    let frame_h = h - FRAME_INSET * 2.0;
    let _ = write!(
        svg,
        r#"<rect x="{FRAME_INSET}" y="{FRAME_INSET}" width="{frame_w}" height="{frame_h}" rx="{FRAME_RADIUS}" fill="{}" stroke="{}" stroke-width="2"/>"#,
        palette.frame.hex(),
        palette.frame_border.hex()
    );
    for (idx, colour) in [palette.error, palette.kicker, palette.accent].iter().enumerate() {
        let _ = write!(
            svg,
            r#"<circle cx="{}" cy="{}" r="9" fill="{}"/>"#,
            FRAME_INSET + 36.0 + idx as f32 * 30.0,
            FRAME_INSET + 34.0,
            colour.hex()
        );
    }

    if unit.active {
        let mut layout = SceneLayout::new(unit, palette, frame_w - PADDING * 2.0);
        layout.compose();
        let content_h = layout.height();
        let top = if matches!(unit.slide_type, SlideType::Content) {
            FRAME_INSET + PADDING
        } else {
            FRAME_INSET + ((frame_h - content_h) / 2.0).max(PADDING)
        };
        svg.push_str(&layout.emit(FRAME_INSET + PADDING, top));
    }

    svg.push_str("</svg>");
    svg
}

enum Item {
    Text {
        lines: Vec<String>,
        face: &'static Typeset,
        fill: String,
        x_offset: f32,
        marker: Option<String>,
        gap_after: f32,
    },
    Columns(Vec<Vec<Item>>, f32),
}

struct SceneLayout<'a> {
    unit: &'a SlideUnit,
    palette: &'a DeckPalette,
    width: f32,
    items: Vec<Item>,
}

impl<'a> SceneLayout<'a> {
    fn new(unit: &'a SlideUnit, palette: &'a DeckPalette, width: f32) -> Self {
        Self {
            unit,
            palette,
            width,
            items: Vec::new(),
        }
    }

    fn centered(&self) -> bool {
        !matches!(self.unit.slide_type, SlideType::Content)
    }

    fn compose(&mut self) {
        for block in &self.unit.blocks {
            match block {
                Block::Heading(text) => {
                    let item = self.heading(text);
                    self.items.push(item);
                }
                Block::Subheading(text) => {
                    let item = self.subheading(text);
                    self.items.push(item);
                }
                Block::Bullets(list) => {
                    let items = self.bullets(list, self.width);
                    self.items.extend(items);
                }
                Block::Columns(columns) => {
                    let item = self.columns(columns);
                    self.items.push(item);
                }
            }
        }
    }

    fn heading(&self, text: &TextBlock) -> Item {
        let (face, fill) = match text.emphasis {
            Emphasis::Primary => (&PRIMARY_HEADING, "url(#accent)".to_string()),
            Emphasis::Secondary => (&SECONDARY_HEADING, self.palette.text.hex()),
        };
        Item::Text {
            lines: wrap(&text.text, self.width, face.size),
            face,
            fill,
            x_offset: 0.0,
            marker: None,
            gap_after: 32.0,
        }
    }

    fn subheading(&self, text: &TextBlock) -> Item {
        let fill = match text.emphasis {
            Emphasis::Primary => self.palette.text.hex(),
            Emphasis::Secondary => self.palette.muted.hex(),
        };
        Item::Text {
            lines: wrap(&text.text, self.width, SUBHEADING.size),
            face: &SUBHEADING,
            fill,
            x_offset: 0.0,
            marker: None,
            gap_after: 48.0,
        }
    }

    fn bullets(&self, list: &BulletList, width: f32) -> Vec<Item> {
        let indent = BULLET.size * 1.2;
        list.items
            .iter()
            .map(|item| Item::Text {
                lines: wrap(&item.text, width - indent, BULLET.size),
                face: &BULLET,
                fill: self.palette.text.hex(),
                x_offset: indent,
                marker: Some(self.palette.accent.hex()),
                gap_after: 18.0,
            })
            .collect()
    }

    fn columns(&self, columns: &[Column]) -> Item {
        let gutter = 72.0;
        let count = columns.len().max(1) as f32;
        let width = (self.width - gutter * (count - 1.0)) / count;
        let built = columns
            .iter()
            .map(|column| {
                let mut items = Vec::new();
                if let Some(label) = &column.label {
                    items.push(Item::Text {
                        lines: wrap(&label.text.to_uppercase(), width, LABEL.size),
                        face: &LABEL,
                        fill: self.palette.kicker.hex(),
                        x_offset: 0.0,
                        marker: None,
                        gap_after: 16.0,
                    });
                }
                if let Some(list) = &column.bullets {
                    items.extend(self.bullets(list, width));
                }
                items
            })
            .collect();
        Item::Columns(built, width + gutter)
    }

    fn height(&self) -> f32 {
        items_height(&self.items)
    }

    fn emit(&self, x: f32, top: f32) -> String {
        let mut out = String::new();
        let anchor_x = if self.centered() { x + self.width / 2.0 } else { x };
        emit_items(&mut out, &self.items, anchor_x, top, self.centered());
        out
    }
}

fn items_height(items: &[Item]) -> f32 {
    items
        .iter()
        .map(|item| match item {
            Item::Text {
                lines,
                face,
                gap_after,
                ..
            } => lines.len() as f32 * face.size * face.line_height + gap_after,
            Item::Columns(columns, _) => columns
                .iter()
                .map(|column| items_height(column))
                .fold(0.0, f32::max),
        })
        .sum()
}

fn emit_items(out: &mut String, items: &[Item], x: f32, mut y: f32, centered: bool) -> f32 {
    for item in items {
        match item {
            Item::Text {
                lines,
                face,
                fill,
                x_offset,
                marker,
                gap_after,
            } => {
                let line_step = face.size * face.line_height;
                if let Some(marker_fill) = marker {
                    let _ = write!(
                        out,
                        r#"<circle cx="{}" cy="{}" r="{}" fill="{marker_fill}"/>"#,
                        x + face.size * 0.3,
                        y + line_step * 0.5,
                        face.size * 0.16
                    );
                }
                let anchor = if centered { "middle" } else { "start" };
                let _ = write!(
                    out,
                    r#"<text x="{}" y="{}" font-family="{FONT_FAMILY}" font-size="{}" font-weight="{}" fill="{fill}" text-anchor="{anchor}">"#,
                    x + x_offset,
                    y,
                    face.size,
                    face.weight
                );
                for (idx, line) in lines.iter().enumerate() {
                    let _ = write!(
                        out,
                        r#"<tspan x="{}" y="{}">{}</tspan>"#,
                        x + x_offset,
                        y + face.size + idx as f32 * line_step,
                        escape(line)
                    );
                }
                out.push_str("</text>");
                y += lines.len() as f32 * line_step + gap_after;
            }
            Item::Columns(columns, stride) => {
                let mut tallest: f32 = 0.0;
                for (idx, column) in columns.iter().enumerate() {
                    let bottom = emit_items(out, column, x + idx as f32 * stride, y, false);
                    tallest = tallest.max(bottom - y);
                }
                y += tallest;
            }
        }
    }
    y
}

fn wrap(text: &str, width_px: f32, font_size: f32) -> Vec<String> {
    let columns = (width_px / (font_size * GLYPH_ADVANCE)).floor().max(1.0) as usize;
    textwrap::wrap(text, columns)
        .into_iter()
        .map(|line| line.into_owned())
        .collect()
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(ch),
            // Not representable in XML 1.0, even as a character reference.
            c if c < ' ' || matches!(c, '\u{FFFE}' | '\u{FFFF}') => {}
            c => out.push(c),
        }
    }
    out
}
