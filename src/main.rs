use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use color_eyre::Result;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bus::Bus;
use clipboard::SystemClipboard;
use message::{PresenterMessage, TabId};
use orchestrator::{Extractor, Orchestrator};
use presenter::{PromptSelector, Presenter};
use region::Region;
use trigger::Trigger;

mod bus;
mod capture;
mod clipboard;
mod configuration;
mod message;
mod ocr;
mod orchestrator;
mod payload;
mod presenter;
mod region;
mod serve;
#[cfg(test)]
mod testing;
mod trigger;

/// The terminal acts as a single tab.
const TERMINAL: TabId = TabId(0);

#[derive(Parser, Debug)]
#[command(version, about = "Extract text from a screen region or an image")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(flatten)]
    Extract(Source),
    /// Exchange JSON-lines messages over stdin and stdout.
    Serve,
}

#[derive(Subcommand, Debug)]
enum Source {
    /// Pick a region interactively, then read its text.
    Select,
    /// Read the text inside a region of the screen.
    #[command(allow_negative_numbers = true)]
    Region {
        x: i64,
        y: i64,
        width: i64,
        height: i64,
    },
    /// Read the text of the image on the clipboard.
    Clipboard,
    /// Read the text of an image file.
    File { path: Utf8PathBuf },
}

async fn extract_once(
    source: Source,
    bus: Bus,
    configuration: configuration::PresenterConfiguration,
) -> Result<ExitCode> {
    let presenter = Presenter::new(
        TERMINAL,
        bus.clone(),
        Box::new(PromptSelector),
        std::io::stdout(),
        configuration,
    );
    let trigger = Trigger::new(bus, TERMINAL);

    match source {
        Source::Select => trigger.select_area(),
        Source::Region {
            x,
            y,
            width,
            height,
        } => trigger.capture_region(Region::new(x, y, width, height))?,
        Source::Clipboard => trigger.extract_clipboard(&SystemClipboard).await?,
        Source::File { path } => trigger.extract_file(&path).await?,
    }
    drop(trigger);

    match presenter.run().await? {
        Some(PresenterMessage::ShowResult { .. }) => Ok(ExitCode::SUCCESS),
        _ => Ok(ExitCode::FAILURE),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let configuration = configuration::load()?;
    info!("starting up");

    let (bus, inbox) = Bus::new();
    let extractor = Extractor::new(
        capture::build_capture(&configuration.capture)?,
        ocr::build_recognizer(&configuration.ocr)?,
        configuration.ocr.language.clone(),
    );
    let orchestrator = Orchestrator::new(inbox, bus.presenters(), extractor);
    let orchestrator = tokio::spawn(orchestrator.start());

    match args.command {
        Command::Extract(source) => extract_once(source, bus, configuration.presenter).await,
        Command::Serve => {
            let stdin = BufReader::new(tokio::io::stdin());
            serve::serve(bus, stdin, tokio::io::stdout()).await?;
            orchestrator.await??;
            Ok(ExitCode::SUCCESS)
        }
    }
}
