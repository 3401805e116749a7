use async_trait::async_trait;
use color_eyre::eyre::{bail, eyre, OptionExt};
use color_eyre::Result;
use image::DynamicImage;
use tokio::process::Command;
use tracing::{info, instrument};

use crate::configuration::CaptureConfiguration;

/// Host screenshot primitive: grabs whatever is currently visible.
#[async_trait]
pub trait ScreenCapture: Send + Sync {
    async fn capture(&self) -> Result<DynamicImage>;
}

/// Runs an external screenshot tool that writes a PNG to stdout.
#[derive(Debug, Clone)]
pub struct CommandCapture {
    program: String,
    args: Vec<String>,
}

impl CommandCapture {
    pub fn new(configuration: &CaptureConfiguration) -> Result<Self> {
        let (program, args) = configuration
            .command
            .split_first()
            .ok_or_eyre("no screenshot command configured")?;

        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

#[async_trait]
impl ScreenCapture for CommandCapture {
    #[instrument(skip(self), fields(program = %self.program))]
    async fn capture(&self) -> Result<DynamicImage> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| eyre!("unable to run {}: {e}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "screen capture failed ({}): {}",
                output.status,
                stderr.trim()
            );
        }
        if output.stdout.is_empty() {
            bail!("screen capture produced no image");
        }

        let image = image::load_from_memory(&output.stdout)
            .map_err(|e| eyre!("unable to decode screenshot: {e}"))?;
        info!("captured {}x{} screenshot", image.width(), image.height());
        Ok(image)
    }
}

/// Captures the primary monitor directly.
#[cfg(feature = "native-capture")]
#[derive(Debug, Clone, Copy, Default)]
pub struct MonitorCapture;

#[cfg(feature = "native-capture")]
#[async_trait]
impl ScreenCapture for MonitorCapture {
    #[instrument(skip(self))]
    async fn capture(&self) -> Result<DynamicImage> {
        // xcap may start its own runtime on Wayland
        tokio::task::spawn_blocking(|| -> Result<DynamicImage> {
            let monitors = xcap::Monitor::all()?;
            let mut primary = None;
            for monitor in monitors {
                if monitor.is_primary()? {
                    primary = Some(monitor);
                    break;
                }
            }
            let monitor = primary.ok_or_eyre("no primary monitor detected")?;
            let image = monitor.capture_image()?;
            info!("captured {}x{} screenshot", image.width(), image.height());
            Ok(DynamicImage::ImageRgba8(image))
        })
        .await?
    }
}

/// Picks the capture backend for this build.
///
/// With native capture compiled in, an empty command selects the primary monitor.
#[cfg(feature = "native-capture")]
pub fn build_capture(configuration: &CaptureConfiguration) -> Result<Box<dyn ScreenCapture>> {
    if configuration.command.is_empty() {
        return Ok(Box::new(MonitorCapture));
    }
    Ok(Box::new(CommandCapture::new(configuration)?))
}

#[cfg(not(feature = "native-capture"))]
pub fn build_capture(configuration: &CaptureConfiguration) -> Result<Box<dyn ScreenCapture>> {
    Ok(Box::new(CommandCapture::new(configuration)?))
}
