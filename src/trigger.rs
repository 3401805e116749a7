use camino::Utf8Path;
use color_eyre::eyre::OptionExt;
use color_eyre::Result;
use tracing::{info, instrument};

use crate::bus::Bus;
use crate::clipboard::ClipboardSource;
use crate::message::{OrchestratorMessage, PresenterMessage, TabId};
use crate::payload::ImagePayload;
use crate::region::Region;

/// Entry point where the user starts an extraction for a tab.
pub struct Trigger {
    bus: Bus,
    tab: TabId,
}

impl Trigger {
    pub fn new(bus: Bus, tab: TabId) -> Self {
        Self { bus, tab }
    }

    /// Hands region selection to the tab's presenter.
    pub fn select_area(&self) {
        info!("starting selection on {}", self.tab);
        self.bus.send_to_tab(self.tab, PresenterMessage::StartSelection);
    }

    pub fn capture_region(&self, area: Region) -> Result<()> {
        self.bus
            .send_to_orchestrator(OrchestratorMessage::CaptureAndExtract {
                area,
                tab_id: self.tab,
            })
    }

    /// Sends the clipboard image for extraction.
    ///
    /// An empty clipboard is reported here and never reaches the orchestrator.
    #[instrument(skip_all)]
    pub async fn extract_clipboard(&self, clipboard: &dyn ClipboardSource) -> Result<()> {
        let image = clipboard
            .read_image()
            .await?
            .ok_or_eyre("No image found in clipboard.")?;
        info!("found {image:?} in clipboard");
        self.extract_image(image)
    }

    #[instrument(skip(self))]
    pub async fn extract_file(&self, path: &Utf8Path) -> Result<()> {
        let image = ImagePayload::from_file(path).await?;
        self.extract_image(image)
    }

    fn extract_image(&self, image_data: ImagePayload) -> Result<()> {
        self.bus
            .send_to_orchestrator(OrchestratorMessage::ExtractFromImage {
                image_data,
                tab_id: self.tab,
            })
    }
}
