//! The rasterizer and the document composer are loaded lazily, at most once
//! per process session, and shared by every later export.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::thread;

use log::{debug, info, warn};

use super::ExportError;
use super::compose::{DocumentBuilder, DocumentInfo, PdfComposer};
use super::raster::Rasterizer;

pub const RASTERIZER: &str = "rasterizer";
pub const COMPOSER: &str = "document composer";

/// Starts new output documents.
pub trait Composer: Send + Sync {
    fn begin(&self, info: DocumentInfo) -> Box<dyn DocumentBuilder>;
}

pub trait LibraryLoader: Send + Sync {
    fn load_rasterizer(&self) -> Result<Arc<dyn Rasterizer>, ExportError>;
    fn load_composer(&self) -> Result<Arc<dyn Composer>, ExportError>;
}

/// Loader for the libraries compiled into this build.
#[derive(Debug, Clone, Default)]
pub struct BuiltinLoader {
    font_dirs: Vec<PathBuf>,
}

impl BuiltinLoader {
    pub fn new(font_dirs: Vec<PathBuf>) -> Self {
        Self { font_dirs }
    }
}

impl LibraryLoader for BuiltinLoader {
    #[cfg(feature = "svg")]
    fn load_rasterizer(&self) -> Result<Arc<dyn Rasterizer>, ExportError> {
        Ok(Arc::new(super::raster::SvgRasterizer::new(&self.font_dirs)))
    }

    #[cfg(not(feature = "svg"))]
    fn load_rasterizer(&self) -> Result<Arc<dyn Rasterizer>, ExportError> {
        warn!("SVG support disabled; enable feature \"svg\" to export decks.");
        Err(ExportError::LibraryUnavailable {
            library: RASTERIZER,
            reason: format!(
                "built without the \"svg\" feature ({} font dirs ignored)",
                self.font_dirs.len()
            ),
        })
    }

    fn load_composer(&self) -> Result<Arc<dyn Composer>, ExportError> {
        Ok(Arc::new(PdfComposer))
    }
}

pub struct Libraries {
    loader: Box<dyn LibraryLoader>,
    rasterizer: OnceLock<Arc<dyn Rasterizer>>,
    composer: OnceLock<Arc<dyn Composer>>,
}

impl Libraries {
    pub fn new(loader: impl LibraryLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            rasterizer: OnceLock::new(),
            composer: OnceLock::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.rasterizer.get().is_some() && self.composer.get().is_some()
    }

    /// Make both libraries available, loading whichever is missing. When both
    /// are missing they load concurrently. A library that loaded stays loaded
    /// even if the other one failed.
    pub fn ensure_loaded(&self) -> Result<(Arc<dyn Rasterizer>, Arc<dyn Composer>), ExportError> {
        let (rasterizer, composer) = match (self.rasterizer.get(), self.composer.get()) {
            (Some(rasterizer), Some(composer)) => {
                return Ok((Arc::clone(rasterizer), Arc::clone(composer)));
            }
            (None, None) => {
                info!("Loading export libraries");
                thread::scope(|scope| {
                    let rasterizer = scope.spawn(|| self.loader.load_rasterizer());
                    let composer = scope.spawn(|| self.loader.load_composer());
                    (
                        joined(rasterizer.join(), RASTERIZER),
                        joined(composer.join(), COMPOSER),
                    )
                })
            }
            (None, Some(composer)) => (self.loader.load_rasterizer(), Ok(Arc::clone(composer))),
            (Some(rasterizer), None) => (Ok(Arc::clone(rasterizer)), self.loader.load_composer()),
        };

        let rasterizer = rasterizer
            .map(|loaded| Arc::clone(self.rasterizer.get_or_init(|| loaded)))
            .inspect_err(|e| warn!("Failed to load {RASTERIZER}: {e}"));
        let composer = composer
            .map(|loaded| Arc::clone(self.composer.get_or_init(|| loaded)))
            .inspect_err(|e| warn!("Failed to load {COMPOSER}: {e}"));
        let pair = (rasterizer?, composer?);
        debug!("Export libraries ready");
        Ok(pair)
    }
}

fn joined<T: ?Sized>(
    result: thread::Result<Result<Arc<T>, ExportError>>,
    library: &'static str,
) -> Result<Arc<T>, ExportError> {
    result.unwrap_or_else(|_| {
        Err(ExportError::LibraryUnavailable {
            library,
            reason: "loader panicked".to_string(),
        })
    })
}
