use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
};

use crate::deck::SlideType;
use crate::slide_builder::{Block as SlideBlock, BulletList, Column, Emphasis, SlideUnit, TextBlock};
use crate::theme::DeckPalette;

const BULLET_MARKER: &str = "▸ ";
const BULLET_INDENT: &str = "  ";
const WINDOW_DOT: &str = "●";

/// One slide drawn as a full-viewport card.
///
/// Elements whose animation order is not below `revealed` keep their space
/// but draw nothing, so the layout does not jump while the reveal runs.
pub struct SlideCard<'a> {
    unit: &'a SlideUnit,
    palette: &'a DeckPalette,
    revealed: usize,
    index: usize,
    deck_len: usize,
}

impl<'a> SlideCard<'a> {
    /// `index` is the unit's place among the built units, not its entry
    /// position in the deck file.
    pub fn new(
        unit: &'a SlideUnit,
        palette: &'a DeckPalette,
        index: usize,
        deck_len: usize,
    ) -> Self {
        Self {
            unit,
            palette,
            revealed: 0,
            index,
            deck_len,
        }
    }

    pub fn revealed(mut self, revealed: usize) -> Self {
        self.revealed = revealed;
        self
    }

    fn centered(&self) -> bool {
        !matches!(self.unit.slide_type, SlideType::Content)
    }

    fn alignment(&self) -> Alignment {
        if self.centered() {
            Alignment::Center
        } else {
            Alignment::Left
        }
    }

    fn frame_block(&self) -> Block<'static> {
        let p = self.palette;
        let dots = Line::from(vec![
            Span::raw(" "),
            Span::styled(WINDOW_DOT, Style::default().fg(p.error.color())),
            Span::raw(" "),
            Span::styled(WINDOW_DOT, Style::default().fg(p.kicker.color())),
            Span::raw(" "),
            Span::styled(WINDOW_DOT, Style::default().fg(p.accent.color())),
            Span::raw(" "),
        ]);
        let position = Line::from(Span::styled(
            format!(" {:02} / {:02} ", self.index + 1, self.deck_len),
            Style::default().fg(p.muted.color()),
        ))
        .right_aligned();

        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(p.frame_border.color()))
            .style(Style::default().bg(p.frame.color()).fg(p.text.color()))
            .title(dots)
            .title(position)
    }

    fn text_lines(&self, block: &TextBlock, heading: bool, width: u16) -> Vec<Line<'static>> {
        let p = self.palette;
        let style = match (heading, block.emphasis) {
            (true, Emphasis::Primary) => Style::default()
                .fg(p.accent.color())
                .add_modifier(Modifier::BOLD),
            (true, Emphasis::Secondary) => Style::default()
                .fg(p.text.color())
                .add_modifier(Modifier::BOLD),
            (false, Emphasis::Primary) => Style::default().fg(p.text.color()),
            (false, Emphasis::Secondary) => Style::default().fg(p.muted.color()),
        };
        self.wrapped(&block.text, width, style, None, block.order)
    }

    fn bullet_lines(&self, list: &BulletList, width: u16) -> Vec<Line<'static>> {
        let marker = Style::default().fg(self.palette.accent.color());
        let text = Style::default().fg(self.palette.text.color());
        list.items
            .iter()
            .flat_map(|item| self.wrapped(&item.text, width, text, Some(marker), item.order))
            .collect()
    }

    fn column_lines(&self, column: &Column, width: u16) -> Vec<Line<'static>> {
        let mut lines = Vec::new();
        if let Some(label) = &column.label {
            let style = Style::default()
                .fg(self.palette.kicker.color())
                .add_modifier(Modifier::BOLD);
            lines.extend(self.wrapped(&label.text.to_uppercase(), width, style, None, label.order));
            lines.push(Line::default());
        }
        if let Some(list) = &column.bullets {
            lines.extend(self.bullet_lines(list, width));
        }
        lines
    }

    /// Wrap `text` to `width`; hidden elements become blank lines of the same
    /// height.
    fn wrapped(
        &self,
        text: &str,
        width: u16,
        style: Style,
        marker: Option<Style>,
        order: usize,
    ) -> Vec<Line<'static>> {
        let indent = if marker.is_some() { BULLET_INDENT.len() } else { 0 };
        let width = (width as usize).saturating_sub(indent).max(1);
        let visible = order < self.revealed;
        textwrap::wrap(text, width)
            .into_iter()
            .enumerate()
            .map(|(idx, chunk)| {
                if !visible {
                    return Line::default();
                }
                let mut spans = Vec::with_capacity(2);
                match marker {
                    Some(marker_style) if idx == 0 => {
                        spans.push(Span::styled(BULLET_MARKER, marker_style))
                    }
                    Some(_) => spans.push(Span::raw(BULLET_INDENT)),
                    None => {}
                }
                spans.push(Span::styled(chunk.into_owned(), style));
                Line::from(spans)
            })
            .collect()
    }
}

impl Widget for SlideCard<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let frame = self.frame_block();
        let inner = frame.inner(area);
        frame.render(area, buf);

        let content = Rect {
            x: inner.x.saturating_add(2),
            y: inner.y.saturating_add(1),
            width: inner.width.saturating_sub(4),
            height: inner.height.saturating_sub(2),
        };
        if content.width == 0 || content.height == 0 {
            return;
        }

        let mut header = Vec::new();
        let mut body = Vec::new();
        let mut columns: Option<&Vec<Column>> = None;
        for block in &self.unit.blocks {
            match block {
                SlideBlock::Heading(text) => {
                    header.extend(self.text_lines(text, true, content.width));
                    header.push(Line::default());
                }
                SlideBlock::Subheading(text) => {
                    header.extend(self.text_lines(text, false, content.width));
                    header.push(Line::default());
                }
                SlideBlock::Bullets(list) => body.extend(self.bullet_lines(list, content.width)),
                SlideBlock::Columns(cols) => columns = Some(cols),
            }
        }

        let alignment = self.alignment();
        match columns {
            Some(cols) if !cols.is_empty() => {
                let gutter = 3u16;
                let count = cols.len() as u16;
                let column_width = content
                    .width
                    .saturating_sub(gutter * (count - 1))
                    / count;
                let column_lines: Vec<Vec<Line<'static>>> = cols
                    .iter()
                    .map(|column| self.column_lines(column, column_width))
                    .collect();
                let body_height = column_lines.iter().map(Vec::len).max().unwrap_or(0) as u16;
                let total = header.len() as u16 + body_height;
                let area = self.vertical_slot(content, total);

                let [header_area, body_area] = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([Constraint::Length(header.len() as u16), Constraint::Min(0)])
                    .areas(area);
                Paragraph::new(header)
                    .alignment(alignment)
                    .render(header_area, buf);

                let mut constraints = Vec::new();
                for idx in 0..cols.len() {
                    if idx > 0 {
                        constraints.push(Constraint::Length(gutter));
                    }
                    constraints.push(Constraint::Ratio(1, count as u32));
                }
                let slots = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints(constraints)
                    .split(body_area);
                for (lines, slot) in column_lines.into_iter().zip(slots.iter().step_by(2)) {
                    Paragraph::new(lines).render(*slot, buf);
                }
            }
            _ => {
                let mut lines = header;
                lines.extend(body);
                let area = self.vertical_slot(content, lines.len() as u16);
                Paragraph::new(lines).alignment(alignment).render(area, buf);
            }
        }
    }
}

impl SlideCard<'_> {
    fn vertical_slot(&self, content: Rect, needed: u16) -> Rect {
        if !self.centered() || needed >= content.height {
            return content;
        }
        let top = (content.height - needed) / 2;
        Rect {
            y: content.y + top,
            height: content.height - top,
            ..content
        }
    }
}

/// Render `card` as if its top edge were at row `top` of `area`, clipping the
/// rows that fall outside. Cards are always `area.height` tall.
pub fn render_clipped(card: SlideCard<'_>, top: i32, area: Rect, buf: &mut Buffer) {
    if area.width == 0 || area.height == 0 {
        return;
    }
    let height = area.height as i32;
    if top >= height || top + height <= 0 {
        return;
    }
    let mut scratch = Buffer::empty(Rect::new(0, 0, area.width, area.height));
    card.render(scratch.area, &mut scratch);

    for src_y in 0..area.height {
        let dst_y = top + src_y as i32;
        if !(0..height).contains(&dst_y) {
            continue;
        }
        for x in 0..area.width {
            buf[(area.x + x, area.y + dst_y as u16)] = scratch[(x, src_y)].clone();
        }
    }
}

/// Vertical progress rail; fills from the top in proportion to `progress`.
pub struct ProgressRail<'a> {
    progress: f32,
    palette: &'a DeckPalette,
}

impl<'a> ProgressRail<'a> {
    pub fn new(progress: f32, palette: &'a DeckPalette) -> Self {
        Self {
            progress: progress.clamp(0.0, 1.0),
            palette,
        }
    }

    pub fn filled_rows(&self, height: u16) -> u16 {
        (self.progress * height as f32).round() as u16
    }
}

impl Widget for ProgressRail<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let filled = self.filled_rows(area.height);
        let fill = Style::default().fg(self.palette.accent.color());
        let track = Style::default().fg(self.palette.muted.color());
        for row in 0..area.height {
            let (symbol, style) = if row < filled { ("█", fill) } else { ("│", track) };
            for x in area.x..area.x + area.width {
                buf[(x, area.y + row)].set_symbol(symbol).set_style(style);
            }
        }
    }
}
