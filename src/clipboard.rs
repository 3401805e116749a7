use arboard::{Clipboard, ImageData};
use async_trait::async_trait;
use color_eyre::eyre::{eyre, OptionExt};
use color_eyre::Result;
use image::{DynamicImage, RgbaImage};
use tracing::{debug, instrument};

use crate::payload::ImagePayload;

#[async_trait]
pub trait ClipboardSource: Send + Sync {
    /// The clipboard image as PNG, or `None` when it holds no image.
    async fn read_image(&self) -> Result<Option<ImagePayload>>;
}

/// The desktop clipboard.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClipboard;

fn to_payload(data: ImageData<'_>) -> Result<ImagePayload> {
    let image = RgbaImage::from_raw(
        data.width as u32,
        data.height as u32,
        data.bytes.into_owned(),
    )
    .ok_or_eyre("clipboard image has an unexpected size")?;
    ImagePayload::from_image(&DynamicImage::ImageRgba8(image))
}

#[async_trait]
impl ClipboardSource for SystemClipboard {
    #[instrument(skip(self))]
    async fn read_image(&self) -> Result<Option<ImagePayload>> {
        tokio::task::spawn_blocking(|| -> Result<Option<ImagePayload>> {
            let mut clipboard =
                Clipboard::new().map_err(|e| eyre!("unable to open clipboard: {e}"))?;
            match clipboard.get_image() {
                Ok(data) => {
                    debug!("clipboard holds a {}x{} image", data.width, data.height);
                    to_payload(data).map(Some)
                }
                Err(arboard::Error::ContentNotAvailable) => Ok(None),
                Err(e) => Err(eyre!("unable to read clipboard: {e}")),
            }
        })
        .await?
    }
}

/// Places recognized text on the desktop clipboard.
pub async fn write_text(text: String) -> Result<()> {
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut clipboard =
            Clipboard::new().map_err(|e| eyre!("unable to open clipboard: {e}"))?;
        clipboard
            .set_text(text)
            .map_err(|e| eyre!("unable to copy text: {e}"))
    })
    .await?
}
