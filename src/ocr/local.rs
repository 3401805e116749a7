use std::sync::Arc;

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use ocrs::{ImageSource, OcrEngine, OcrEngineParams};
use tokio::sync::OnceCell;
use tracing::{info, instrument, warn};

use super::TextRecognizer;
use crate::configuration::OcrConfiguration;
use crate::payload::ImagePayload;

/// Bundled recognition engine backed by `ocrs` models on disk.
///
/// The engine is built the first time it is needed and then kept for the
/// rest of the process. A failed build is not cached, so a later request
/// retries loading the models.
pub struct LocalOcr {
    detection_model: Utf8PathBuf,
    recognition_model: Utf8PathBuf,
    engine: OnceCell<Arc<OcrEngine>>,
}

fn load_engine(detection_model: &Utf8Path, recognition_model: &Utf8Path) -> Result<OcrEngine> {
    let mut params = OcrEngineParams::default();
    params.detection_model = Some(
        rten::Model::load_file(detection_model)
            .map_err(|e| eyre!("unable to load detection model {detection_model}: {e}"))?,
    );
    params.recognition_model = Some(
        rten::Model::load_file(recognition_model)
            .map_err(|e| eyre!("unable to load recognition model {recognition_model}: {e}"))?,
    );
    OcrEngine::new(params).map_err(|e| eyre!("Failed to create engine: {}", e))
}

impl LocalOcr {
    pub fn new(configuration: &OcrConfiguration) -> Self {
        Self {
            detection_model: configuration.detection_model.clone(),
            recognition_model: configuration.recognition_model.clone(),
            engine: OnceCell::new(),
        }
    }

    async fn engine(&self) -> Result<Arc<OcrEngine>> {
        let engine = self
            .engine
            .get_or_try_init(|| async {
                info!("loading OCR models");
                let detection_model = self.detection_model.clone();
                let recognition_model = self.recognition_model.clone();
                let engine = tokio::task::spawn_blocking(move || {
                    load_engine(&detection_model, &recognition_model)
                })
                .await??;
                Ok::<_, color_eyre::Report>(Arc::new(engine))
            })
            .await?;
        Ok(Arc::clone(engine))
    }
}

#[async_trait]
impl TextRecognizer for LocalOcr {
    #[instrument(skip(self, image))]
    async fn recognize(&self, image: &ImagePayload, language: &str) -> Result<String> {
        if language != "eng" {
            warn!("bundled models only cover latin script, ignoring language {language}");
        }

        let engine = self.engine().await?;
        let image = image.decode()?.into_rgb8();

        tokio::task::spawn_blocking(move || {
            let img_source = ImageSource::from_bytes(image.as_raw(), image.dimensions())
                .map_err(|e| eyre!("Failed to read image: {:?}", e))?;
            let input = engine
                .prepare_input(img_source)
                .map_err(|e| eyre!("Failed to prepare input: {}", e))?;
            engine
                .get_text(&input)
                .map_err(|e| eyre!("Failed to get text: {}", e))
        })
        .await?
    }
}
