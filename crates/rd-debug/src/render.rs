//! Abstract drawing surface for the debugger panels
//!
//! Panels never talk to a graphics API. They emit rectangles and
//! monospace text lines into a [`Canvas`] supplied by the host UI layer.

/// Axis-aligned region in host pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Number of whole text rows of `line_height` that fit
    pub fn rows(&self, line_height: f32) -> usize {
        if line_height <= 0.0 || self.height <= 0.0 {
            return 0;
        }
        (self.height / line_height) as usize
    }

    /// Baseline of text row `row`
    pub fn row_y(&self, row: usize, line_height: f32) -> f32 {
        self.y + row as f32 * line_height
    }
}

/// RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xFF }
    }

    pub const BACKGROUND: Color = Color::rgb(0x1E, 0x1E, 0x1E);
    pub const HEADER: Color = Color::rgb(0x9C, 0xDC, 0xFE);
    pub const TEXT: Color = Color::rgb(0xD4, 0xD4, 0xD4);
    pub const DIM: Color = Color::rgb(0x80, 0x80, 0x80);
    pub const CHANGED: Color = Color::rgb(0xFF, 0x60, 0x60);
    pub const BREAKPOINT: Color = Color::rgb(0xE5, 0x14, 0x00);
    pub const DISABLED: Color = Color::rgb(0x70, 0x40, 0x40);
    pub const PROGRAM_COUNTER: Color = Color::rgb(0xFF, 0xD7, 0x00);
    pub const CURSOR: Color = Color::rgb(0x26, 0x4F, 0x78);
}

/// Drawing primitives provided by the host
pub trait Canvas {
    fn fill_rect(&mut self, rect: Rect, color: Color);

    fn draw_text(&mut self, x: f32, y: f32, text: &str, color: Color);

    /// Height of one monospace text row
    fn line_height(&self) -> f32 {
        14.0
    }

    /// Width of one monospace character cell
    fn char_width(&self) -> f32 {
        7.0
    }
}

/// One recorded primitive
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    FillRect { rect: Rect, color: Color },
    Text { x: f32, y: f32, text: String, color: Color },
}

/// Canvas that records commands, for headless hosts and tests
#[derive(Debug, Default)]
pub struct DrawList {
    commands: Vec<DrawCommand>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Text lines in draw order
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|cmd| match cmd {
            DrawCommand::Text { text, .. } => Some(text.as_str()),
            DrawCommand::FillRect { .. } => None,
        })
    }

    /// Whether any text line contains `needle`
    pub fn contains_text(&self, needle: &str) -> bool {
        self.texts().any(|text| text.contains(needle))
    }

    /// Color of the first text line containing `needle`
    pub fn text_color(&self, needle: &str) -> Option<Color> {
        self.commands.iter().find_map(|cmd| match cmd {
            DrawCommand::Text { text, color, .. } if text.contains(needle) => Some(*color),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

impl Canvas for DrawList {
    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.commands.push(DrawCommand::FillRect { rect, color });
    }

    fn draw_text(&mut self, x: f32, y: f32, text: &str, color: Color) {
        self.commands.push(DrawCommand::Text {
            x,
            y,
            text: text.to_string(),
            color,
        });
    }
}

/// Background plus a title row; returns the rect left for content
pub(crate) fn panel(canvas: &mut dyn Canvas, rect: Rect, title: &str) -> Rect {
    let line = canvas.line_height();
    canvas.fill_rect(rect, Color::BACKGROUND);
    canvas.draw_text(rect.x, rect.y, title, Color::HEADER);
    Rect::new(
        rect.x,
        rect.y + line,
        rect.width,
        (rect.height - line).max(0.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_rows() {
        let rect = Rect::new(0.0, 10.0, 100.0, 50.0);
        assert_eq!(rect.rows(14.0), 3);
        assert_eq!(rect.row_y(2, 14.0), 38.0);
        assert_eq!(Rect::new(0.0, 0.0, 10.0, -5.0).rows(14.0), 0);
    }

    #[test]
    fn test_draw_list_records() {
        let mut list = DrawList::new();
        let content = panel(&mut list, Rect::new(0.0, 0.0, 200.0, 100.0), "Registers");
        list.draw_text(content.x, content.y, "D0 0x00000000", Color::CHANGED);

        assert_eq!(list.len(), 3);
        assert_eq!(content.y, 14.0);
        assert!(list.contains_text("Registers"));
        assert_eq!(list.text_color("D0"), Some(Color::CHANGED));
        assert_eq!(list.texts().count(), 2);

        list.clear();
        assert!(list.is_empty());
    }
}
