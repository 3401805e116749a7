use std::fmt;
use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use camino::Utf8Path;
use color_eyre::eyre::{bail, eyre, OptionExt};
use color_eyre::Result;
use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An encoded image travelling over the message bus.
///
/// On the wire it is a `data:<mime>;base64,<data>` URL, the same shape a
/// browser produces from a canvas or a clipboard blob.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            bytes,
        }
    }

    /// Encodes an image as PNG.
    pub fn from_image(image: &DynamicImage) -> Result<Self> {
        let mut bytes = Cursor::new(vec![]);
        image.write_to(&mut bytes, ImageFormat::Png)?;
        Ok(Self::new("image/png", bytes.into_inner()))
    }

    pub fn from_data_url(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_eyre("image data is not a data URL")?;
        let (header, data) = rest
            .split_once(',')
            .ok_or_eyre("data URL has no payload")?;
        let mime = header
            .strip_suffix(";base64")
            .ok_or_eyre("data URL is not base64 encoded")?;
        if !mime.starts_with("image/") {
            bail!("unsupported payload type: {mime}");
        }

        let bytes = STANDARD
            .decode(data.trim())
            .map_err(|e| eyre!("invalid base64 image data: {e}"))?;
        Ok(Self::new(mime, bytes))
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }

    /// Reads an image file, trusting its contents over its extension.
    pub async fn from_file(path: impl AsRef<Utf8Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| eyre!("unable to read {path}: {e}"))?;

        let format = match image::guess_format(&bytes) {
            Ok(format) => format,
            Err(_) => path
                .extension()
                .and_then(|ext| ImageFormat::from_extension(ext))
                .ok_or_else(|| eyre!("{path} is not a recognized image"))?,
        };

        Ok(Self::new(format.to_mime_type(), bytes))
    }

    pub fn decode(&self) -> Result<DynamicImage> {
        image::load_from_memory(&self.bytes).map_err(|e| eyre!("unable to decode image: {e}"))
    }

    /// File extension matching the payload's mime type.
    pub fn extension(&self) -> &'static str {
        ImageFormat::from_mime_type(&self.mime)
            .and_then(|format| format.extensions_str().first().copied())
            .unwrap_or("bin")
    }
}

impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePayload")
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl Serialize for ImagePayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_data_url())
    }
}

impl<'de> Deserialize<'de> for ImagePayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let url = String::deserialize(deserializer)?;
        Self::from_data_url(&url).map_err(serde::de::Error::custom)
    }
}
