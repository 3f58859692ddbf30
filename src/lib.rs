pub mod content_source;
pub mod deck;
pub mod deck_session;
pub mod event_source;
pub mod export;
pub mod panic_handler;
pub mod presenter;
pub mod render;
pub mod settings;
pub mod slide_builder;
pub mod status;
pub mod theme;
pub mod viewport;
pub mod visibility;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use content_source::{ContentSource, LoadError};
pub use deck::{Deck, SlideType};
pub use deck_session::{DeckSession, NavRequest};
pub use export::{ExportError, ExportPipeline};
pub use presenter::{App, run_app_with_event_source};
pub use slide_builder::{SlideUnit, render_deck};
pub use theme::ThemeId;
