//! Text recognition collaborators.
//!
//! Both backends are opaque to the rest of the crate: they take an encoded
//! image and a language code and hand back whatever text they found. An empty
//! string means nothing was recognized; interpreting that is the caller's job.

mod local;
mod remote;

use std::sync::Arc;

use async_trait::async_trait;
use color_eyre::Result;
use tracing::info;

pub use local::LocalOcr;
pub use remote::RemoteOcr;

use crate::configuration::{OcrBackend, OcrConfiguration};
use crate::payload::ImagePayload;

#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, image: &ImagePayload, language: &str) -> Result<String>;
}

pub fn build_recognizer(configuration: &OcrConfiguration) -> Result<Arc<dyn TextRecognizer>> {
    info!("using {:?} OCR backend", configuration.backend);
    let recognizer: Arc<dyn TextRecognizer> = match configuration.backend {
        OcrBackend::Remote => Arc::new(RemoteOcr::new(configuration)?),
        OcrBackend::Local => Arc::new(LocalOcr::new(configuration)),
    };
    Ok(recognizer)
}
