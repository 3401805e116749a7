use std::io::Write;

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use color_eyre::eyre::{bail, eyre};
use color_eyre::Result;
use time::OffsetDateTime;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

use crate::bus::Bus;
use crate::clipboard;
use crate::configuration::PresenterConfiguration;
use crate::message::{OrchestratorMessage, PresenterMessage, TabId};
use crate::payload::ImagePayload;
use crate::region::Region;

/// Lets the user pick the screen region to read.
#[async_trait]
pub trait RegionSelector: Send + Sync {
    /// `None` means the user cancelled the selection.
    async fn select(&self) -> Result<Option<Region>>;
}

/// Asks for `x y width height` on standard input.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptSelector;

fn parse_region(line: &str) -> Result<Option<Region>> {
    let parts: Vec<&str> = line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() {
        return Ok(None);
    }

    let values = parts
        .iter()
        .map(|p| {
            p.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(|v| v.trunc() as i64)
                .ok_or_else(|| eyre!("not a number: {p}"))
        })
        .collect::<Result<Vec<_>>>()?;

    match values[..] {
        [x, y, width, height] => Ok(Some(Region::new(x, y, width, height))),
        _ => bail!("expected x y width height, got {} values", values.len()),
    }
}

#[async_trait]
impl RegionSelector for PromptSelector {
    async fn select(&self) -> Result<Option<Region>> {
        eprint!("region (x y width height, empty to cancel): ");
        std::io::stderr().flush()?;

        let mut line = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await?;
        parse_region(&line)
    }
}

/// Renders the outcome of one request for a tab.
pub struct Presenter<W> {
    tab: TabId,
    bus: Bus,
    rx: mpsc::UnboundedReceiver<PresenterMessage>,
    selector: Box<dyn RegionSelector>,
    out: W,
    configuration: PresenterConfiguration,
}

impl<W: Write + Send> Presenter<W> {
    /// Registers a presenter for `tab` on the bus.
    pub fn new(
        tab: TabId,
        bus: Bus,
        selector: Box<dyn RegionSelector>,
        out: W,
        configuration: PresenterConfiguration,
    ) -> Self {
        let rx = bus.register(tab);
        Self {
            tab,
            bus,
            rx,
            selector,
            out,
            configuration,
        }
    }

    /// Handles messages until the first outcome is rendered or a selection
    /// is cancelled, and returns that outcome.
    pub async fn run(mut self) -> Result<Option<PresenterMessage>> {
        let mut outcome = None;
        while let Some(message) = self.rx.recv().await {
            outcome = match message {
                PresenterMessage::StartSelection => match self.start_selection().await {
                    Ok(true) => continue,
                    Ok(false) => None,
                    Err(e) => Some(PresenterMessage::ShowError {
                        message: e.to_string(),
                        debug_image: None,
                    }),
                },
                outcome => Some(outcome),
            };

            if let Some(outcome) = &outcome {
                self.render(outcome).await?;
            }
            break;
        }

        self.bus.presenters().unregister(self.tab);
        Ok(outcome)
    }

    /// Returns whether a capture request was sent.
    #[instrument(skip(self), fields(tab = %self.tab))]
    async fn start_selection(&mut self) -> Result<bool> {
        let Some(area) = self.selector.select().await? else {
            info!("selection cancelled");
            return Ok(false);
        };

        info!("selected {area:?}");
        self.bus.send_to_orchestrator(OrchestratorMessage::CaptureAndExtract {
            area,
            tab_id: self.tab,
        })?;
        Ok(true)
    }

    async fn render(&mut self, outcome: &PresenterMessage) -> Result<()> {
        match outcome {
            PresenterMessage::ShowResult { text, debug_image } => {
                let text = text.trim();
                writeln!(self.out, "{text}")?;
                self.out.flush()?;

                if self.configuration.copy_to_clipboard {
                    match clipboard::write_text(text.to_owned()).await {
                        Ok(()) => info!("text copied to clipboard"),
                        Err(e) => warn!("failed to copy text: {e}"),
                    }
                }
                self.keep_debug_image(debug_image.as_ref(), "result").await;
            }
            PresenterMessage::ShowError {
                message,
                debug_image,
            } => {
                eprintln!("Error: {message}");
                self.keep_debug_image(debug_image.as_ref(), "error").await;
            }
            PresenterMessage::StartSelection => {}
        }
        Ok(())
    }

    async fn keep_debug_image(&self, image: Option<&ImagePayload>, kind: &str) {
        let (Some(directory), Some(image)) =
            (&self.configuration.debug_image_directory, image)
        else {
            return;
        };

        match save_debug_image(directory, image, kind).await {
            Ok(path) => info!("saved source image to {path}"),
            Err(e) => warn!("failed to save source image: {e}"),
        }
    }
}

async fn save_debug_image(
    directory: &Utf8Path,
    image: &ImagePayload,
    kind: &str,
) -> Result<Utf8PathBuf> {
    tokio::fs::create_dir_all(directory).await?;
    let timestamp = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    let path = directory.join(format!("{timestamp}-{kind}.{}", image.extension()));
    tokio::fs::write(&path, &image.bytes).await?;
    Ok(path)
}
