//! Off-screen capture of every slide into a paginated PDF.

pub mod compose;
pub mod filename;
pub mod libraries;
pub mod pipeline;
pub mod raster;
pub mod staging;

use std::path::PathBuf;

pub use compose::{DocumentBuilder, DocumentInfo, PdfComposer};
pub use filename::{artifact_file_name, sanitize_filename};
pub use libraries::{BuiltinLoader, Composer, Libraries, LibraryLoader};
pub use pipeline::{Artifact, ExportJob, ExportPipeline, ExportProgress, ExportState};
pub use raster::Rasterizer;
pub use staging::{FrameClock, IntervalClock, StagingArea};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("{library} is not available: {reason}")]
    LibraryUnavailable {
        library: &'static str,
        reason: String,
    },

    #[error("failed to capture slide {}: {reason}", slide + 1)]
    Capture { slide: usize, reason: String },

    #[error("failed to assemble the document: {0}")]
    Compose(String),

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("an export is already running")]
    AlreadyRunning,

    #[error("the deck has no slides to export")]
    NothingToExport,
}
