use log::warn;
use ratatui::style::Color;
use std::sync::LazyLock;

/// A 24-bit colour usable both by the terminal renderer and the SVG scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb(pub u32);

impl Rgb {
    pub fn color(self) -> Color {
        Color::Rgb(
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        )
    }

    pub fn hex(self) -> String {
        format!("#{:06X}", self.0 & 0xFF_FFFF)
    }

    pub fn channels(self) -> [u8; 3] {
        [
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        ]
    }
}

// Colour palette structure
#[derive(Clone, Debug)]
pub struct DeckPalette {
    pub background: Rgb,    // Page background
    pub backdrop_glow: Rgb, // Radial glow behind the frame
    pub frame: Rgb,         // Slide card background
    pub frame_border: Rgb,  // Card border
    pub text: Rgb,          // Body text
    pub muted: Rgb,         // Subheadings, dots, hints
    pub accent: Rgb,        // Gradient start, bullet markers
    pub accent_alt: Rgb,    // Gradient end
    pub kicker: Rgb,        // Column labels
    pub error: Rgb,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ThemeId {
    #[default]
    Blue,
    Purple,
    Green,
}

impl ThemeId {
    pub fn name(&self) -> &'static str {
        match self {
            ThemeId::Blue => "blue",
            ThemeId::Purple => "purple",
            ThemeId::Green => "green",
        }
    }

    pub fn all() -> &'static [ThemeId] {
        &[ThemeId::Blue, ThemeId::Purple, ThemeId::Green]
    }

    /// Case-insensitive lookup; unknown names fall back to blue.
    pub fn from_name(name: &str) -> Self {
        let lowered = name.trim().to_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|theme| theme.name() == lowered)
            .unwrap_or_else(|| {
                warn!("Unknown theme {name:?}, falling back to blue");
                ThemeId::Blue
            })
    }

    pub fn palette(&self) -> &'static DeckPalette {
        match self {
            ThemeId::Blue => &BLUE_PALETTE,
            ThemeId::Purple => &PURPLE_PALETTE,
            ThemeId::Green => &GREEN_PALETTE,
        }
    }
}

static BLUE_PALETTE: LazyLock<DeckPalette> = LazyLock::new(|| DeckPalette {
    background: Rgb(0x0B1120),
    backdrop_glow: Rgb(0x1D4ED8),
    frame: Rgb(0x111A2E),
    frame_border: Rgb(0x24324F),
    text: Rgb(0xE2E8F0),
    muted: Rgb(0x94A3B8),
    accent: Rgb(0x38BDF8),
    accent_alt: Rgb(0x6366F1),
    kicker: Rgb(0x7DD3FC),
    error: Rgb(0xF87171),
});

static PURPLE_PALETTE: LazyLock<DeckPalette> = LazyLock::new(|| DeckPalette {
    background: Rgb(0x130B24),
    backdrop_glow: Rgb(0x7C3AED),
    frame: Rgb(0x1C1233),
    frame_border: Rgb(0x3B2A5C),
    text: Rgb(0xEDE9FE),
    muted: Rgb(0xA79BC4),
    accent: Rgb(0xC084FC),
    accent_alt: Rgb(0xF472B6),
    kicker: Rgb(0xD8B4FE),
    error: Rgb(0xFB7185),
});

static GREEN_PALETTE: LazyLock<DeckPalette> = LazyLock::new(|| DeckPalette {
    background: Rgb(0x07140F),
    backdrop_glow: Rgb(0x059669),
    frame: Rgb(0x0E1F18),
    frame_border: Rgb(0x1F3D31),
    text: Rgb(0xD1FAE5),
    muted: Rgb(0x8DB5A3),
    accent: Rgb(0x34D399),
    accent_alt: Rgb(0x22D3EE),
    kicker: Rgb(0x6EE7B7),
    error: Rgb(0xF87171),
});
