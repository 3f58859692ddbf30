use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, error, info};

use super::ExportError;
use super::compose::DocumentInfo;
use super::libraries::Libraries;
use super::staging::{FrameClock, StagingArea};
use crate::slide_builder::SlideUnit;
use crate::theme::ThemeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    Preparing,
    Staging,
    Capturing,
    Composing,
    Finalizing,
    Failed,
}

impl fmt::Display for ExportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportState::Idle => "idle",
            ExportState::Preparing => "preparing",
            ExportState::Staging => "staging",
            ExportState::Capturing => "capturing",
            ExportState::Composing => "composing",
            ExportState::Finalizing => "finalizing",
            ExportState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Reported on every state transition. `slide` is zero-based and only
/// meaningful inside the per-slide loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportProgress {
    pub state: ExportState,
    pub slide: usize,
    pub total: usize,
}

/// Everything one export run needs; owned so it can move to a worker thread.
#[derive(Debug, Clone)]
pub struct ExportJob {
    pub units: Vec<SlideUnit>,
    pub theme: ThemeId,
    pub title: String,
    pub destination: PathBuf,
    /// Raster scale, at least 2.
    pub scale: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub pages: usize,
    pub bytes: u64,
}

pub struct ExportPipeline {
    libraries: Arc<Libraries>,
    clock: Box<dyn FrameClock>,
    running: AtomicBool,
}

/// Holds the single-run flag; released on drop.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, ExportError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| RunGuard(flag))
            .map_err(|_| ExportError::AlreadyRunning)
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct Transitions<'a> {
    state: ExportState,
    total: usize,
    observer: &'a mut dyn FnMut(ExportProgress),
}

impl Transitions<'_> {
    fn enter(&mut self, state: ExportState, slide: usize) {
        debug!(
            "Export {} -> {state} (slide {}/{})",
            self.state,
            (slide + 1).min(self.total),
            self.total
        );
        self.state = state;
        (self.observer)(ExportProgress {
            state,
            slide,
            total: self.total,
        });
    }
}

impl ExportPipeline {
    pub fn new(libraries: Arc<Libraries>, clock: impl FrameClock + 'static) -> Self {
        Self {
            libraries,
            clock: Box::new(clock),
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn libraries(&self) -> &Arc<Libraries> {
        &self.libraries
    }

    /// Capture every unit in order into one document at `job.destination`.
    ///
    /// On failure nothing is written and partial pages are discarded.
    pub fn export(
        &self,
        job: ExportJob,
        observer: &mut dyn FnMut(ExportProgress),
    ) -> Result<Artifact, ExportError> {
        let _guard = RunGuard::acquire(&self.running)?;
        let mut transitions = Transitions {
            state: ExportState::Idle,
            total: job.units.len(),
            observer,
        };
        info!(
            "Exporting {} slides of '{}' to {}",
            job.units.len(),
            job.title,
            job.destination.display()
        );

        let mut staging = StagingArea::new(job.theme.palette());
        let result = self.run(&job, &mut staging, &mut transitions);
        if !staging.is_torn_down() {
            staging.teardown();
        }

        match &result {
            Ok(artifact) => info!(
                "Export finished: {} pages, {} bytes at {}",
                artifact.pages,
                artifact.bytes,
                artifact.path.display()
            ),
            Err(e) => {
                error!("Export failed: {e}");
                transitions.enter(ExportState::Failed, 0);
            }
        }
        transitions.enter(ExportState::Idle, 0);
        result
    }

    fn run(
        &self,
        job: &ExportJob,
        staging: &mut StagingArea,
        transitions: &mut Transitions<'_>,
    ) -> Result<Artifact, ExportError> {
        transitions.enter(ExportState::Preparing, 0);
        if job.units.is_empty() {
            return Err(ExportError::NothingToExport);
        }
        let units: Vec<SlideUnit> = job.units.iter().map(SlideUnit::activated_copy).collect();
        let (rasterizer, composer) = self.libraries.ensure_loaded()?;
        let (width, height) = staging.size();
        let scale = job.scale.max(crate::settings::MIN_EXPORT_SCALE);
        let mut document = composer.begin(DocumentInfo::new(job.title.clone()));

        for (idx, unit) in units.iter().enumerate() {
            transitions.enter(ExportState::Staging, idx);
            staging.stage_and_settle(unit, self.clock.as_ref());

            transitions.enter(ExportState::Capturing, idx);
            let scene = staging.scene().ok_or_else(|| ExportError::Capture {
                slide: idx,
                reason: "staging area is empty".to_string(),
            })?;
            let image = rasterizer
                .rasterize(scene, width, height, scale)
                .map_err(|reason| ExportError::Capture { slide: idx, reason })?;

            transitions.enter(ExportState::Composing, idx);
            document.add_page(&image)?;
        }

        transitions.enter(ExportState::Finalizing, units.len().saturating_sub(1));
        staging.teardown();
        let pages = document.page_count();
        let bytes = document.finish()?;
        write_atomically(&job.destination, &bytes)?;

        Ok(Artifact {
            path: job.destination.clone(),
            pages,
            bytes: bytes.len() as u64,
        })
    }
}

/// Write through a temp file in the destination directory, then rename.
fn write_atomically(destination: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    let io_error = |source| ExportError::Io {
        path: destination.to_path_buf(),
        source,
    };
    let dir = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(io_error)?;

    let mut file = tempfile::NamedTempFile::new_in(&dir).map_err(io_error)?;
    file.write_all(bytes).map_err(io_error)?;
    file.flush().map_err(io_error)?;
    file.persist(destination).map_err(|e| io_error(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::compose::PdfComposer;
    use crate::export::libraries::{Composer, LibraryLoader};
    use crate::export::raster::Rasterizer;
    use image::RgbaImage;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct NoWait;

    impl FrameClock for NoWait {
        fn next_frame(&self) {}
    }

    /// Encodes the slide position in the image width so page order is visible.
    struct PositionRasterizer;

    impl Rasterizer for PositionRasterizer {
        fn rasterize(&self, scene: &str, _: u32, _: u32, scale: u32) -> Result<RgbaImage, String> {
            let marker = scene
                .split("slide-")
                .nth(1)
                .and_then(|rest| rest.split('<').next())
                .and_then(|digits| digits.parse::<u32>().ok())
                .ok_or("no marker")?;
            Ok(RgbaImage::new(10 + marker, scale))
        }
    }

    struct Loader {
        rasterizer_ok: bool,
    }

    impl LibraryLoader for Loader {
        fn load_rasterizer(&self) -> Result<Arc<dyn Rasterizer>, ExportError> {
            if self.rasterizer_ok {
                Ok(Arc::new(PositionRasterizer))
            } else {
                Err(ExportError::LibraryUnavailable {
                    library: "rasterizer",
                    reason: "blocked".into(),
                })
            }
        }

        fn load_composer(&self) -> Result<Arc<dyn Composer>, ExportError> {
            Ok(Arc::new(PdfComposer))
        }
    }

    fn job(n: usize, destination: PathBuf) -> ExportJob {
        let slides: Vec<String> = (0..n)
            .map(|i| format!(r#"{{"headline":"slide-{i}"}}"#))
            .collect();
        let deck = crate::deck::Deck::from_json(&format!(r#"{{"slides":[{}]}}"#, slides.join(",")))
            .unwrap();
        ExportJob {
            units: crate::slide_builder::build_deck(&deck),
            theme: ThemeId::Blue,
            title: "Test deck".into(),
            destination,
            scale: 1,
        }
    }

    fn pipeline(rasterizer_ok: bool) -> ExportPipeline {
        ExportPipeline::new(Arc::new(Libraries::new(Loader { rasterizer_ok })), NoWait)
    }

    #[test]
    fn exports_one_page_per_unit_in_order() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("out").join("deck.pdf");
        let mut seen = Vec::new();
        let artifact = pipeline(true)
            .export(job(3, destination.clone()), &mut |progress| seen.push(progress))
            .unwrap();

        assert_eq!(artifact.pages, 3);
        assert_eq!(artifact.path, destination);
        let pdf = lopdf::Document::load(&destination).unwrap();
        let images: Vec<(i64, i64)> = pdf
            .get_pages()
            .values()
            .map(|&page_id| {
                let page = pdf.get_dictionary(page_id).unwrap();
                let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
                let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
                let image_id = xobjects.get(b"Im0").unwrap().as_reference().unwrap();
                let dict = &pdf.get_object(image_id).unwrap().as_stream().unwrap().dict;
                (
                    dict.get(b"Width").unwrap().as_i64().unwrap(),
                    dict.get(b"Height").unwrap().as_i64().unwrap(),
                )
            })
            .collect();
        // Scale is raised to the minimum of 2.
        assert_eq!(images, vec![(10, 2), (11, 2), (12, 2)]);

        let states: Vec<ExportState> = seen.iter().map(|p| p.state).collect();
        assert_eq!(states.first(), Some(&ExportState::Preparing));
        assert_eq!(&states[states.len() - 2..], &[ExportState::Finalizing, ExportState::Idle]);
        assert_eq!(
            states.iter().filter(|s| **s == ExportState::Capturing).count(),
            3
        );
        assert!(!states.contains(&ExportState::Failed));
    }

    #[test]
    fn missing_library_fails_without_writing() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("deck.pdf");
        let mut seen = Vec::new();
        let err = pipeline(false)
            .export(job(2, destination.clone()), &mut |p| seen.push(p.state))
            .unwrap_err();
        assert!(matches!(err, ExportError::LibraryUnavailable { .. }));
        assert!(!destination.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
        assert_eq!(seen, vec![ExportState::Preparing, ExportState::Failed, ExportState::Idle]);
    }

    #[test]
    fn capture_failure_discards_partial_pages() {
        struct FailingSecond;
        impl Rasterizer for FailingSecond {
            fn rasterize(&self, scene: &str, _: u32, _: u32, _: u32) -> Result<RgbaImage, String> {
                if scene.contains("slide-1") {
                    Err("boom".into())
                } else {
                    Ok(RgbaImage::new(2, 2))
                }
            }
        }
        struct FailingLoader;
        impl LibraryLoader for FailingLoader {
            fn load_rasterizer(&self) -> Result<Arc<dyn Rasterizer>, ExportError> {
                Ok(Arc::new(FailingSecond))
            }
            fn load_composer(&self) -> Result<Arc<dyn Composer>, ExportError> {
                Ok(Arc::new(PdfComposer))
            }
        }

        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("deck.pdf");
        let pipeline = ExportPipeline::new(Arc::new(Libraries::new(FailingLoader)), NoWait);
        let err = pipeline
            .export(job(3, destination.clone()), &mut |_| {})
            .unwrap_err();
        assert!(matches!(err, ExportError::Capture { slide: 1, .. }));
        assert!(!destination.exists());
        assert!(!pipeline.is_running());
    }

    #[test]
    fn empty_deck_is_rejected() {
        let dir = TempDir::new().unwrap();
        let err = pipeline(true)
            .export(job(0, dir.path().join("deck.pdf")), &mut |_| {})
            .unwrap_err();
        assert!(matches!(err, ExportError::NothingToExport));
    }

    #[test]
    fn second_export_while_running_is_rejected() {
        struct Gate(Mutex<Option<flume::Sender<()>>>, flume::Receiver<()>);
        impl FrameClock for Gate {
            fn next_frame(&self) {
                if let Some(started) = self.0.lock().unwrap().take() {
                    let _ = started.send(());
                    let _ = self.1.recv();
                }
            }
        }

        let (started_tx, started_rx) = flume::bounded(1);
        let (release_tx, release_rx) = flume::bounded(1);
        let pipeline = Arc::new(ExportPipeline::new(
            Arc::new(Libraries::new(Loader { rasterizer_ok: true })),
            Gate(Mutex::new(Some(started_tx)), release_rx),
        ));
        let dir = TempDir::new().unwrap();

        let worker = {
            let pipeline = Arc::clone(&pipeline);
            let destination = dir.path().join("first.pdf");
            std::thread::spawn(move || pipeline.export(job(2, destination), &mut |_| {}))
        };
        started_rx.recv().unwrap();
        assert!(pipeline.is_running());

        let second = pipeline.export(job(2, dir.path().join("second.pdf")), &mut |_| {});
        assert!(matches!(second, Err(ExportError::AlreadyRunning)));

        release_tx.send(()).unwrap();
        let first = worker.join().unwrap().unwrap();
        assert_eq!(first.pages, 2);
        assert!(!pipeline.is_running());
        assert!(!dir.path().join("second.pdf").exists());
    }
}
