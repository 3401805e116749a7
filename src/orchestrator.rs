use std::sync::Arc;

use color_eyre::Result;
use tokio::sync::mpsc;
use tracing::{error, info, instrument};

use crate::bus::Presenters;
use crate::capture::ScreenCapture;
use crate::message::{OrchestratorMessage, PresenterMessage};
use crate::ocr::TextRecognizer;
use crate::payload::ImagePayload;
use crate::region::{self, Region};

const NO_TEXT_FOUND: &str = "No text found";
const REQUEST_ABORTED: &str = "Text extraction failed unexpectedly";

/// Runs one request through capture, crop and recognition.
pub struct Extractor {
    capture: Box<dyn ScreenCapture>,
    recognizer: Arc<dyn TextRecognizer>,
    language: String,
}

impl Extractor {
    pub fn new(
        capture: Box<dyn ScreenCapture>,
        recognizer: Arc<dyn TextRecognizer>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            capture,
            recognizer,
            language: language.into(),
        }
    }

    /// Produces the single outcome message for `request`.
    pub async fn handle(&self, request: OrchestratorMessage) -> PresenterMessage {
        let mut debug_image = None;
        let result = match request {
            OrchestratorMessage::CaptureAndExtract { area, .. } => {
                self.capture_and_extract(area, &mut debug_image).await
            }
            OrchestratorMessage::ExtractFromImage { image_data, .. } => {
                let result = self.recognize(&image_data).await;
                debug_image = Some(image_data);
                result
            }
        };

        match result {
            Ok(text) if !text.trim().is_empty() => {
                info!("recognized {} characters", text.len());
                PresenterMessage::ShowResult { text, debug_image }
            }
            Ok(_) => {
                info!("no text recognized");
                PresenterMessage::ShowError {
                    message: NO_TEXT_FOUND.into(),
                    debug_image,
                }
            }
            Err(e) => {
                error!("extraction failed: {e:?}");
                PresenterMessage::ShowError {
                    message: e.to_string(),
                    debug_image,
                }
            }
        }
    }

    #[instrument(skip(self, debug_image))]
    async fn capture_and_extract(
        &self,
        area: Region,
        debug_image: &mut Option<ImagePayload>,
    ) -> Result<String> {
        let screenshot = self.capture.capture().await?;
        let cropped = region::crop(&screenshot, area)?;
        let cropped = ImagePayload::from_image(&cropped)?;
        let text = self.recognize(&cropped).await;
        *debug_image = Some(cropped);
        text
    }

    async fn recognize(&self, image: &ImagePayload) -> Result<String> {
        self.recognizer.recognize(image, &self.language).await
    }
}

/// Background worker draining the orchestrator inbox.
///
/// Every request gets its own task; a request arriving while another is in
/// flight is neither queued behind it nor cancelled.
pub struct Orchestrator {
    rx: mpsc::UnboundedReceiver<OrchestratorMessage>,
    extractor: Arc<Extractor>,
    presenters: Presenters,
}

impl Orchestrator {
    pub fn new(
        rx: mpsc::UnboundedReceiver<OrchestratorMessage>,
        presenters: Presenters,
        extractor: Extractor,
    ) -> Self {
        Self {
            rx,
            extractor: Arc::new(extractor),
            presenters,
        }
    }

    pub async fn start(mut self) -> Result<()> {
        info!("starting orchestrator");
        while let Some(request) = self.rx.recv().await {
            let extractor = Arc::clone(&self.extractor);
            let presenters = self.presenters.clone();
            tokio::spawn(async move {
                let tab = request.tab_id();
                info!("handling request for {tab}");
                let outcome = tokio::spawn(async move { extractor.handle(request).await })
                    .await
                    .unwrap_or_else(|e| {
                        error!("request for {tab} aborted: {e}");
                        PresenterMessage::ShowError {
                            message: REQUEST_ABORTED.into(),
                            debug_image: None,
                        }
                    });
                presenters.send_to_tab(tab, outcome);
            });
        }

        info!("request channel closed, stopping orchestrator");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use image::{DynamicImage, RgbaImage};

    use super::*;
    use crate::bus::Bus;
    use crate::message::TabId;
    use crate::testing::{extractor, CannedRecognizer, FixedScreen};

    fn screen() -> FixedScreen {
        FixedScreen::white(64, 48)
    }

    fn capture_request(area: Region) -> OrchestratorMessage {
        OrchestratorMessage::CaptureAndExtract {
            area,
            tab_id: TabId(1),
        }
    }

    #[tokio::test]
    async fn recognized_text_is_shown_with_the_cropped_image() {
        let recognizer = CannedRecognizer::new(Ok("Invoice #42\n"));
        let extractor = extractor(screen(), recognizer.clone());

        let outcome = extractor
            .handle(capture_request(Region::new(10, 5, 20, 8)))
            .await;

        let PresenterMessage::ShowResult { text, debug_image } = outcome else {
            panic!("expected a result");
        };
        assert_eq!(text, "Invoice #42\n");
        let debug_image = debug_image.unwrap().decode().unwrap();
        assert_eq!((debug_image.width(), debug_image.height()), (20, 8));
        assert_eq!(recognizer.calls(), vec![(20, 8, "eng".to_owned())]);
    }

    #[tokio::test]
    async fn degenerate_region_never_reaches_the_recognizer() {
        let recognizer = CannedRecognizer::new(Ok("text"));
        let extractor = extractor(screen(), recognizer.clone());

        for area in [Region::new(0, 0, 0, 10), Region::new(0, 0, 10, -1)] {
            let outcome = extractor.handle(capture_request(area)).await;
            assert_eq!(
                outcome,
                PresenterMessage::ShowError {
                    message: "Invalid selection area".into(),
                    debug_image: None,
                }
            );
        }
        assert!(recognizer.calls().is_empty());
    }

    #[tokio::test]
    async fn blank_text_is_an_error() {
        for blank in ["", " \r\n "] {
            let extractor = extractor(screen(), CannedRecognizer::new(Ok(blank)));
            let outcome = extractor
                .handle(capture_request(Region::new(0, 0, 4, 4)))
                .await;

            let PresenterMessage::ShowError {
                message,
                debug_image,
            } = outcome
            else {
                panic!("expected an error");
            };
            assert_eq!(message, "No text found");
            assert!(debug_image.is_some());
        }
    }

    #[tokio::test]
    async fn capture_failure_is_reported() {
        let recognizer = CannedRecognizer::new(Ok("text"));
        let extractor = extractor(FixedScreen(None), recognizer.clone());

        let outcome = extractor
            .handle(capture_request(Region::new(0, 0, 4, 4)))
            .await;
        assert_eq!(
            outcome,
            PresenterMessage::ShowError {
                message: "Cannot access contents of the page".into(),
                debug_image: None,
            }
        );
        assert!(recognizer.calls().is_empty());
    }

    #[tokio::test]
    async fn supplied_image_is_recognized_as_is() {
        let recognizer = CannedRecognizer::new(Err("OCR Network/API Error: timed out"));
        let extractor = extractor(screen(), recognizer.clone());
        let image = ImagePayload::from_image(&DynamicImage::ImageRgba8(RgbaImage::new(3, 9)))
            .unwrap();

        let outcome = extractor
            .handle(OrchestratorMessage::ExtractFromImage {
                image_data: image.clone(),
                tab_id: TabId(7),
            })
            .await;

        assert_eq!(
            outcome,
            PresenterMessage::ShowError {
                message: "OCR Network/API Error: timed out".into(),
                debug_image: Some(image),
            }
        );
        assert_eq!(recognizer.calls(), vec![(3, 9, "eng".to_owned())]);
    }

    #[tokio::test]
    async fn each_request_yields_exactly_one_outcome() {
        let (bus, inbox) = Bus::new();
        let mut presenter = bus.register(TabId(1));
        let orchestrator = Orchestrator::new(
            inbox,
            bus.presenters(),
            extractor(screen(), CannedRecognizer::new(Ok("hello"))),
        );
        let running = tokio::spawn(orchestrator.start());

        bus.send_to_orchestrator(capture_request(Region::new(0, 0, 8, 8)))
            .unwrap();
        assert!(matches!(
            presenter.recv().await,
            Some(PresenterMessage::ShowResult { ref text, .. }) if text == "hello"
        ));

        bus.send_to_orchestrator(capture_request(Region::new(0, 0, -8, 8)))
            .unwrap();
        assert!(matches!(
            presenter.recv().await,
            Some(PresenterMessage::ShowError { .. })
        ));

        drop(bus);
        running.await.unwrap().unwrap();
        assert_eq!(presenter.recv().await, None);
    }

    struct BrokenRecognizer;

    #[async_trait]
    impl TextRecognizer for BrokenRecognizer {
        async fn recognize(&self, _image: &ImagePayload, _language: &str) -> Result<String> {
            panic!("recognizer crashed");
        }
    }

    #[tokio::test]
    async fn crashed_request_still_yields_an_error() {
        let (bus, inbox) = Bus::new();
        let mut presenter = bus.register(TabId(2));
        let orchestrator = Orchestrator::new(
            inbox,
            bus.presenters(),
            Extractor::new(Box::new(screen()), Arc::new(BrokenRecognizer), "eng"),
        );
        let running = tokio::spawn(orchestrator.start());

        bus.send_to_orchestrator(OrchestratorMessage::CaptureAndExtract {
            area: Region::new(0, 0, 4, 4),
            tab_id: TabId(2),
        })
        .unwrap();
        assert_eq!(
            presenter.recv().await,
            Some(PresenterMessage::ShowError {
                message: "Text extraction failed unexpectedly".into(),
                debug_image: None,
            })
        );

        drop(bus);
        running.await.unwrap().unwrap();
        assert_eq!(presenter.recv().await, None);
    }
}
