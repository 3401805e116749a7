//! Stand-ins for the screen and the OCR collaborator.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use image::{DynamicImage, Rgba, RgbaImage};

use crate::capture::ScreenCapture;
use crate::ocr::TextRecognizer;
use crate::orchestrator::Extractor;
use crate::payload::ImagePayload;

/// A screen that always shows the same image, or cannot be captured at all.
pub struct FixedScreen(pub Option<DynamicImage>);

impl FixedScreen {
    pub fn white(width: u32, height: u32) -> Self {
        Self(Some(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([255, 255, 255, 255]),
        ))))
    }
}

#[async_trait]
impl ScreenCapture for FixedScreen {
    async fn capture(&self) -> Result<DynamicImage> {
        self.0
            .clone()
            .ok_or_else(|| eyre!("Cannot access contents of the page"))
    }
}

/// Returns a canned answer and remembers the size of every image it saw.
pub struct CannedRecognizer {
    answer: std::result::Result<String, String>,
    seen: Mutex<Vec<(u32, u32, String)>>,
}

impl CannedRecognizer {
    pub fn new(answer: std::result::Result<&str, &str>) -> Arc<Self> {
        Arc::new(Self {
            answer: answer.map(String::from).map_err(String::from),
            seen: Mutex::new(vec![]),
        })
    }

    pub fn calls(&self) -> Vec<(u32, u32, String)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextRecognizer for CannedRecognizer {
    async fn recognize(&self, image: &ImagePayload, language: &str) -> Result<String> {
        let decoded = image.decode()?;
        self.seen
            .lock()
            .unwrap()
            .push((decoded.width(), decoded.height(), language.to_owned()));
        self.answer.clone().map_err(|e| eyre!(e))
    }
}

pub fn extractor(screen: FixedScreen, recognizer: Arc<CannedRecognizer>) -> Extractor {
    Extractor::new(Box::new(screen), recognizer, "eng")
}
