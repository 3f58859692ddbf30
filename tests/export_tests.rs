use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use flowpitch::deck::Deck;
use flowpitch::export::{
    Composer, ExportError, ExportJob, ExportPipeline, ExportState, FrameClock, Libraries,
    LibraryLoader, PdfComposer, Rasterizer,
};
use flowpitch::slide_builder::render_deck;
use flowpitch::theme::ThemeId;
use image::RgbaImage;
use lopdf::Document;
use tempfile::TempDir;

struct NoWait;

impl FrameClock for NoWait {
    fn next_frame(&self) {}
}

/// Image width encodes which headline was staged, so page order is visible in
/// the document.
struct HeadlineWidthRasterizer;

impl Rasterizer for HeadlineWidthRasterizer {
    fn rasterize(&self, scene: &str, _: u32, _: u32, scale: u32) -> Result<RgbaImage, String> {
        let width = ["Alpha", "Bravo", "Charlie"]
            .iter()
            .position(|name| scene.contains(name))
            .map(|pos| 20 + pos as u32)
            .ok_or("unknown slide")?;
        Ok(RgbaImage::new(width, scale))
    }
}

#[derive(Default)]
struct CountingLoader {
    loads: Arc<AtomicUsize>,
}

impl LibraryLoader for CountingLoader {
    fn load_rasterizer(&self) -> Result<Arc<dyn Rasterizer>, ExportError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(HeadlineWidthRasterizer))
    }

    fn load_composer(&self) -> Result<Arc<dyn Composer>, ExportError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(PdfComposer))
    }
}

fn page_image_widths(doc: &Document) -> Vec<i64> {
    doc.get_pages()
        .values()
        .map(|&page_id| {
            let page = doc.get_dictionary(page_id).unwrap();
            let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
            let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
            let image_id = xobjects.get(b"Im0").unwrap().as_reference().unwrap();
            let image = doc.get_object(image_id).unwrap().as_stream().unwrap();
            image.dict.get(b"Width").unwrap().as_i64().unwrap()
        })
        .collect()
}

const DECK: &str = r#"{
  "meta": {"title": "Ordering", "theme": "green"},
  "slides": [
    {"type": "title", "headline": "Alpha"},
    {"type": "content", "headline": "Bravo", "bullets": ["one", "two"]},
    {"type": "closing", "headline": "Charlie"}
  ]
}"#;

fn job(dir: &TempDir, name: &str) -> ExportJob {
    let deck = Deck::from_json(DECK).unwrap();
    let mut units = render_deck(&deck).unwrap();
    // Only the live cursor's unit is active; export must not depend on it.
    for (idx, unit) in units.iter_mut().enumerate() {
        unit.active = idx == 0;
    }
    ExportJob {
        units,
        theme: ThemeId::Green,
        title: deck.title().to_string(),
        destination: dir.path().join(name),
        scale: 1,
    }
}

#[test]
fn pages_follow_deck_order() {
    let dir = TempDir::new().unwrap();
    let loader = CountingLoader::default();
    let pipeline = ExportPipeline::new(Arc::new(Libraries::new(loader)), NoWait);

    let mut states = Vec::new();
    let artifact = pipeline
        .export(job(&dir, "ordering.pdf"), &mut |p| states.push(p.state))
        .unwrap();

    assert_eq!(artifact.pages, 3);
    let pdf = Document::load(&artifact.path).unwrap();
    assert_eq!(page_image_widths(&pdf), vec![20, 21, 22]);

    assert_eq!(states.first(), Some(&ExportState::Preparing));
    assert_eq!(states.last(), Some(&ExportState::Idle));
    assert!(!states.contains(&ExportState::Failed));
}

#[test]
fn libraries_load_once_across_exports() {
    let dir = TempDir::new().unwrap();
    let loader = CountingLoader::default();
    let loads = Arc::clone(&loader.loads);
    let pipeline = ExportPipeline::new(Arc::new(Libraries::new(loader)), NoWait);

    pipeline.export(job(&dir, "first.pdf"), &mut |_| {}).unwrap();
    pipeline.export(job(&dir, "second.pdf"), &mut |_| {}).unwrap();

    assert_eq!(loads.load(Ordering::SeqCst), 2);
    assert!(pipeline.libraries().is_loaded());
    assert!(dir.path().join("first.pdf").exists());
    assert!(dir.path().join("second.pdf").exists());
}

#[test]
fn failed_capture_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let pipeline = ExportPipeline::new(
        Arc::new(Libraries::new(CountingLoader::default())),
        NoWait,
    );
    let mut bad = job(&dir, "broken.pdf");
    bad.units.truncate(1);
    bad.units[0].blocks.clear();

    let mut states = Vec::new();
    let err = pipeline
        .export(bad, &mut |p| states.push(p.state))
        .unwrap_err();

    assert!(matches!(err, ExportError::Capture { slide: 0, .. }));
    assert!(!dir.path().join("broken.pdf").exists());
    assert!(states.contains(&ExportState::Failed));
    assert_eq!(states.last(), Some(&ExportState::Idle));
    assert!(!pipeline.is_running());
}
