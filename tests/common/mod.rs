//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, RgbaImage};
use rugcut::{
    ChatTransport, ImageBlob, ImageStrategy, ModelOutput, OutboundArtifact, PhotoSize,
    ProcessingError, ReplyTarget, Result, SegmentationModel, StrategyId,
};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Striped RGB photo so resizing and encoding have something to chew on
pub fn rug_photo(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        if (x / 16 + y / 16) % 2 == 0 {
            Rgb([180, 40, 40])
        } else {
            Rgb([220, 200, 150])
        }
    }))
}

pub fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, format).unwrap();
    out.into_inner()
}

pub fn rug_jpeg(width: u32, height: u32) -> Vec<u8> {
    encode(&rug_photo(width, height), ImageFormat::Jpeg)
}

pub fn rug_png(width: u32, height: u32) -> Vec<u8> {
    encode(&rug_photo(width, height), ImageFormat::Png)
}

/// Segmentation stand-in: keeps an inner ellipse, clears everything else
pub struct EllipseModel {
    calls: AtomicUsize,
    fail: bool,
}

impl EllipseModel {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SegmentationModel for EllipseModel {
    fn transform(&self, image: &DynamicImage) -> Result<ModelOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProcessingError::model("InferenceError", "model exploded"));
        }

        let rgba = image.to_rgba8();
        let (w, h) = rgba.dimensions();
        let (cx, cy) = (f64::from(w) / 2.0, f64::from(h) / 2.0);
        let out = RgbaImage::from_fn(w, h, |x, y| {
            let mut px = *rgba.get_pixel(x, y);
            let dx = (f64::from(x) - cx) / cx;
            let dy = (f64::from(y) - cy) / cy;
            if dx * dx + dy * dy > 0.8 {
                px.0[3] = 0;
            }
            px
        });
        Ok(ModelOutput::Encoded(encode(
            &DynamicImage::ImageRgba8(out),
            ImageFormat::Png,
        )))
    }

    fn name(&self) -> &str {
        "ellipse"
    }
}

/// Strategy that panics on its worker
pub struct PanickingStrategy(pub StrategyId);

#[async_trait]
impl ImageStrategy for PanickingStrategy {
    fn id(&self) -> StrategyId {
        self.0
    }

    fn name(&self) -> &str {
        "panicking"
    }

    async fn apply(&self, _image: ImageBlob) -> Result<ImageBlob> {
        panic!("strategy blew up");
    }
}

/// Strategy that records what it was handed and echoes it back
#[derive(Default)]
pub struct EchoStrategy {
    pub seen: Mutex<Vec<ImageBlob>>,
}

#[async_trait]
impl ImageStrategy for EchoStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::InteriorCompositing
    }

    fn name(&self) -> &str {
        "echo"
    }

    async fn apply(&self, image: ImageBlob) -> Result<ImageBlob> {
        self.seen.lock().unwrap().push(image.clone());
        Ok(image)
    }
}

/// Everything a transport was asked to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text(String),
    Document(OutboundArtifact),
    Photo(OutboundArtifact),
}

/// In-memory transport; photo file ids map to canned bytes
#[derive(Default)]
pub struct RecordingTransport {
    files: Mutex<Vec<(String, Vec<u8>)>>,
    fetched: Mutex<Vec<String>>,
    sent: Mutex<Vec<Sent>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_file(self: &Arc<Self>, file_id: &str, bytes: Vec<u8>) -> Arc<Self> {
        self.files.lock().unwrap().push((file_id.to_string(), bytes));
        Arc::clone(self)
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn fetch_bytes(&self, photo: &PhotoSize) -> Result<Vec<u8>> {
        self.fetched.lock().unwrap().push(photo.file_id.clone());
        self.files
            .lock()
            .unwrap()
            .iter()
            .find(|(id, _)| *id == photo.file_id)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| ProcessingError::transport(format!("file {} expired", photo.file_id)))
    }

    async fn send_text(&self, _target: &ReplyTarget, text: &str) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::Text(text.to_string()));
        Ok(())
    }

    async fn send_document(&self, _target: &ReplyTarget, artifact: OutboundArtifact) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::Document(artifact));
        Ok(())
    }

    async fn send_photo(&self, _target: &ReplyTarget, artifact: OutboundArtifact) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::Photo(artifact));
        Ok(())
    }
}
