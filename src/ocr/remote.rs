use std::time::Duration;

use async_trait::async_trait;
use color_eyre::eyre::{bail, eyre};
use color_eyre::Result;
use reqwest::multipart::Form;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, instrument};

use super::TextRecognizer;
use crate::configuration::OcrConfiguration;
use crate::payload::ImagePayload;

/// Client for an OCR.space-compatible `parse/image` endpoint.
pub struct RemoteOcr {
    client: Client,
    endpoint: String,
    api_key: SecretString,
    scale: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorMessage {
    One(String),
    Many(Vec<String>),
}

impl ErrorMessage {
    fn into_text(self) -> String {
        match self {
            ErrorMessage::One(message) => message,
            ErrorMessage::Many(messages) => messages.join(","),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ParsedResult {
    parsed_text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ParseResponse {
    #[serde(default)]
    is_errored_on_processing: bool,
    error_message: Option<ErrorMessage>,
    parsed_results: Option<Vec<ParsedResult>>,
}

impl ParseResponse {
    /// Text of the first parsed result; empty when the service found nothing.
    fn into_text(self) -> Result<String> {
        if self.is_errored_on_processing {
            let message = self
                .error_message
                .map(ErrorMessage::into_text)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "OCR API Error".into());
            bail!(message);
        }

        Ok(self
            .parsed_results
            .and_then(|results| results.into_iter().next())
            .and_then(|result| result.parsed_text)
            .unwrap_or_default())
    }
}

impl RemoteOcr {
    pub fn new(configuration: &OcrConfiguration) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(configuration.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: configuration.endpoint.clone(),
            api_key: configuration.api_key.clone(),
            scale: configuration.scale,
        })
    }

    async fn parse_image(&self, image: &ImagePayload, language: &str) -> Result<String> {
        let form = Form::new()
            .text("base64Image", image.to_data_url())
            .text("language", language.to_owned())
            .text("isOverlayRequired", "false")
            .text("apikey", self.api_key.expose_secret().clone())
            .text("scale", self.scale.to_string());

        let response = self.client.post(&self.endpoint).multipart(form).send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!("OCR API responded with {status}, {} bytes", body.len());

        let parsed: ParseResponse = serde_json::from_str(&body)
            .map_err(|e| eyre!("unexpected response ({status}): {e}"))?;
        parsed.into_text()
    }
}

#[async_trait]
impl TextRecognizer for RemoteOcr {
    #[instrument(skip(self, image), fields(endpoint = %self.endpoint))]
    async fn recognize(&self, image: &ImagePayload, language: &str) -> Result<String> {
        self.parse_image(image, language)
            .await
            .map_err(|e| eyre!("OCR Network/API Error: {e}"))
    }
}
