//! In-crate fakes for driving the pipeline without a real recognizer.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use ocrgate_core::{
    DetectedRegion, EngineError, EngineFactory, EngineOptions, LanguageSet, VisionEngine,
};
use parking_lot::Mutex;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// What the engine was handed on one call.
#[derive(Debug, Clone)]
pub struct SeenImage {
    pub path: PathBuf,
    pub dimensions: Option<(u32, u32)>,
}

#[derive(Default)]
struct Shared {
    constructed: AtomicUsize,
    released: AtomicUsize,
    fail_release: AtomicBool,
    panic_next_recognition: AtomicBool,
    release_delay: Mutex<Duration>,
    fail_next_construction: Mutex<Option<String>>,
    fail_next_recognition: Mutex<Option<String>>,
    regions: Mutex<Vec<DetectedRegion>>,
    seen: Mutex<Vec<SeenImage>>,
    entered: Mutex<Option<UnboundedSender<()>>>,
    hold: Mutex<Option<mpsc::Receiver<()>>>,
}

#[derive(Clone, Default)]
pub struct FakeFactory {
    shared: Arc<Shared>,
}

impl FakeFactory {
    pub fn with_regions(regions: Vec<DetectedRegion>) -> Self {
        let factory = Self::default();
        *factory.shared.regions.lock() = regions;
        factory
    }

    pub fn constructed(&self) -> usize {
        self.shared.constructed.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.shared.released.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<SeenImage> {
        self.shared.seen.lock().clone()
    }

    pub fn fail_next_construction(&self, message: &str) {
        *self.shared.fail_next_construction.lock() = Some(message.to_string());
    }

    pub fn fail_next_recognition(&self, message: &str) {
        *self.shared.fail_next_recognition.lock() = Some(message.to_string());
    }

    pub fn panic_next_recognition(&self) {
        self.shared.panic_next_recognition.store(true, Ordering::SeqCst);
    }

    /// Makes every release sleep for `delay` before completing.
    pub fn slow_release(&self, delay: Duration) {
        *self.shared.release_delay.lock() = delay;
    }

    pub fn fail_release(&self) {
        self.shared.fail_release.store(true, Ordering::SeqCst);
    }

    /// Makes every recognition wait for a release signal. Returns a receiver
    /// that fires when a recognition starts and the sender that lets it finish.
    pub fn hold_recognition(&self) -> (UnboundedReceiver<()>, mpsc::Sender<()>) {
        let (entered_tx, entered_rx) = unbounded_channel();
        let (release_tx, release_rx) = mpsc::channel();
        *self.shared.entered.lock() = Some(entered_tx);
        *self.shared.hold.lock() = Some(release_rx);
        (entered_rx, release_tx)
    }
}

impl EngineFactory for FakeFactory {
    fn name(&self) -> &str {
        "fake"
    }

    fn construct(
        &self,
        languages: &LanguageSet,
        _options: &EngineOptions,
    ) -> Result<Box<dyn VisionEngine>, EngineError> {
        if let Some(message) = self.shared.fail_next_construction.lock().take() {
            return Err(EngineError::Construction {
                languages: languages.to_string(),
                message,
            });
        }
        self.shared.constructed.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeEngine {
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct FakeEngine {
    shared: Arc<Shared>,
}

impl VisionEngine for FakeEngine {
    fn recognize(&mut self, image_path: &Path) -> Result<Vec<DetectedRegion>, EngineError> {
        self.shared.seen.lock().push(SeenImage {
            path: image_path.to_path_buf(),
            dimensions: image::image_dimensions(image_path).ok(),
        });
        if let Some(tx) = self.shared.entered.lock().as_ref() {
            let _ = tx.send(());
        }
        let hold = self.shared.hold.lock().take();
        if let Some(rx) = hold {
            let _ = rx.recv();
            *self.shared.hold.lock() = Some(rx);
        }
        if self.shared.panic_next_recognition.swap(false, Ordering::SeqCst) {
            panic!("engine fault");
        }
        if let Some(message) = self.shared.fail_next_recognition.lock().take() {
            return Err(EngineError::Recognition(message));
        }
        Ok(self.shared.regions.lock().clone())
    }

    fn release(&mut self) -> Result<(), EngineError> {
        let delay = *self.shared.release_delay.lock();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        self.shared.released.fetch_add(1, Ordering::SeqCst);
        if self.shared.fail_release.load(Ordering::SeqCst) {
            return Err(EngineError::Teardown("native handle already gone".into()));
        }
        Ok(())
    }
}

/// Writes a white PNG of the given size and returns its bytes.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([255, 255, 255]));
    let mut out = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut out, image::ImageFormat::Png)
        .expect("encode png");
    out.into_inner()
}

pub fn hello_region() -> DetectedRegion {
    DetectedRegion {
        polygon: vec![(50.4, 60.0), (530.9, 60.0), (530.9, 105.5), (50.4, 105.5)],
        text: "Hello World OCR Test".into(),
        confidence: 0.94,
    }
}
