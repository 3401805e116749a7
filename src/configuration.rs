use camino::Utf8PathBuf;
use color_eyre::Result;
use config::Config;
use secrecy::SecretString;
use serde::Deserialize;

/// Which OCR collaborator recognizes text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrBackend {
    /// Hosted OCR.space-compatible HTTP API.
    Remote,
    /// Bundled `ocrs` engine with local model files.
    Local,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OcrConfiguration {
    pub backend: OcrBackend,
    /// Language code passed to the OCR collaborator.
    pub language: String,
    /// Parse endpoint of the hosted API.
    pub endpoint: String,
    pub api_key: SecretString,
    /// Ask the hosted API to upscale low resolution input.
    pub scale: bool,
    pub request_timeout_secs: u64,
    pub detection_model: Utf8PathBuf,
    pub recognition_model: Utf8PathBuf,
}

impl Default for OcrConfiguration {
    fn default() -> Self {
        Self {
            backend: OcrBackend::Remote,
            language: "eng".into(),
            endpoint: "https://api.ocr.space/parse/image".into(),
            // free demo key, rate limited
            api_key: SecretString::new("helloworld".into()),
            scale: true,
            request_timeout_secs: 30,
            detection_model: "models/text-detection.rten".into(),
            recognition_model: "models/text-recognition.rten".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureConfiguration {
    /// Screenshot command writing a PNG of the visible screen to stdout.
    pub command: Vec<String>,
}

impl Default for CaptureConfiguration {
    fn default() -> Self {
        Self {
            command: vec!["grim".into(), "-".into()],
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PresenterConfiguration {
    /// Copy recognized text to the system clipboard.
    pub copy_to_clipboard: bool,
    /// Where source images of each outcome are written, if set.
    pub debug_image_directory: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub ocr: OcrConfiguration,
    pub capture: CaptureConfiguration,
    pub presenter: PresenterConfiguration,
}

pub fn load() -> Result<Configuration> {
    let settings = Config::builder()
        .add_source(config::File::with_name("textsnap").required(false))
        .add_source(
            config::Environment::with_prefix("TEXTSNAP")
                .separator("__")
                .list_separator(" ")
                .with_list_parse_key("capture.command")
                .try_parsing(true),
        )
        .build()?;

    settings.try_deserialize().map_err(From::from)
}
